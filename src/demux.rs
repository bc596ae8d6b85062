//! Output sinks that sit between the terminal and whoever reads its output.
//!
//! None of these own the stream they forward to in the closing sense:
//! dropping a [`MarkerFilter`] or [`FanOut`] drops only what it was given,
//! so callers pass `&mut W` or a [`SharedSink`] clone and keep the real
//! stream alive (and close it) themselves.

use std::io::{self, Write};
use std::sync::Arc;

use parking_lot::{Mutex, MutexGuard};

/// Forwards only the lines between a begin marker line and an end marker
/// line. The marker lines themselves are never forwarded.
///
/// Input is buffered one line at a time; a trailing partial line is held
/// until its newline arrives.
#[derive(Debug)]
pub struct MarkerFilter<W> {
    inner: W,
    begin: String,
    end: String,
    line: Vec<u8>,
    forwarding: bool,
}

impl<W: Write> MarkerFilter<W> {
    pub fn new(inner: W, begin: impl Into<String>, end: impl Into<String>) -> Self {
        MarkerFilter {
            inner,
            begin: begin.into(),
            end: end.into(),
            line: Vec::new(),
            forwarding: false,
        }
    }

    pub fn is_forwarding(&self) -> bool {
        self.forwarding
    }

    /// Give back the downstream writer.
    pub fn into_inner(self) -> W {
        self.inner
    }

    fn finish_line(&mut self) -> io::Result<()> {
        let text = String::from_utf8_lossy(&self.line);
        if text.contains(&self.begin) {
            self.forwarding = true;
        } else if text.contains(&self.end) {
            self.forwarding = false;
        } else if self.forwarding {
            self.inner.write_all(&self.line)?;
        }
        self.line.clear();
        Ok(())
    }
}

impl<W: Write> Write for MarkerFilter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        for &byte in buf {
            self.line.push(byte);
            if byte == b'\n' {
                self.finish_line()?;
            }
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

/// Writes every byte to each of its sinks.
#[derive(Debug)]
pub struct FanOut<W> {
    sinks: Vec<W>,
}

impl<W> Default for FanOut<W> {
    fn default() -> Self {
        FanOut { sinks: Vec::new() }
    }
}

impl<W: Write> FanOut<W> {
    pub fn new(sinks: Vec<W>) -> Self {
        FanOut { sinks }
    }

    pub fn push(&mut self, sink: W) {
        self.sinks.push(sink);
    }

    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }
}

impl<W: Write> Write for FanOut<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        for sink in &mut self.sinks {
            sink.write_all(buf)?;
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        for sink in &mut self.sinks {
            sink.flush()?;
        }
        Ok(())
    }
}

/// A writer held by several parties. Each clone writes to the same stream,
/// which lives until the last clone is dropped.
pub struct SharedSink<W: ?Sized>(Arc<Mutex<W>>);

impl<W> SharedSink<W> {
    pub fn new(inner: W) -> Self {
        SharedSink(Arc::new(Mutex::new(inner)))
    }
}

impl<W: Write + Send + 'static> SharedSink<W> {
    /// Erase the writer type.
    pub fn into_dyn(self) -> SharedSink<dyn Write + Send> {
        let inner: Arc<Mutex<dyn Write + Send>> = self.0;
        SharedSink(inner)
    }
}

impl<W: ?Sized> SharedSink<W> {
    pub fn lock(&self) -> MutexGuard<'_, W> {
        self.0.lock()
    }
}

impl<W: ?Sized> Clone for SharedSink<W> {
    fn clone(&self) -> Self {
        SharedSink(self.0.clone())
    }
}

impl<W: Write + ?Sized> Write for SharedSink<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.0.lock().flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_forwards_only_between_markers() {
        let mut out = Vec::new();
        let mut filter = MarkerFilter::new(&mut out, "<<BEGIN>>", "<<END>>");
        filter
            .write_all(b"noise\nxx <<BEGIN>> xx\nkeep 1\nkee")
            .unwrap();
        assert!(filter.is_forwarding());
        filter.write_all(b"p 2\n<<END>>\nnoise again\n").unwrap();
        assert!(!filter.is_forwarding());
        drop(filter);
        assert_eq!(out, b"keep 1\nkeep 2\n");
    }

    #[test]
    fn test_partial_line_is_held() {
        let mut filter = MarkerFilter::new(Vec::new(), "B", "E");
        filter.write_all(b"B\nno newline yet").unwrap();
        filter.flush().unwrap();
        assert!(filter.into_inner().is_empty());
    }

    #[test]
    fn test_reopens_after_end() {
        let mut filter = MarkerFilter::new(Vec::new(), "B", "E");
        filter.write_all(b"B\n1\nE\n2\nB\n3\nE\n").unwrap();
        assert_eq!(filter.into_inner(), b"1\n3\n");
    }

    #[test]
    fn test_fan_out_reaches_every_sink() {
        let first = SharedSink::new(Vec::new());
        let second = SharedSink::new(Vec::new());
        {
            let mut fan = FanOut::new(vec![first.clone(), second.clone()]);
            fan.write_all(b"hello").unwrap();
        }
        // Dropping the fan-out leaves both streams usable.
        let mut again = first.clone();
        again.write_all(b"!").unwrap();
        assert_eq!(&*first.lock(), b"hello!");
        assert_eq!(&*second.lock(), b"hello");
    }

    #[test]
    fn test_filter_over_shared_sink() {
        let sink = SharedSink::new(Vec::new());
        let mut filter = MarkerFilter::new(sink.clone().into_dyn(), "B", "E");
        filter.write_all(b"x\nB\ny\nE\n").unwrap();
        drop(filter);
        assert_eq!(&*sink.lock(), b"y\n");
    }

    #[test]
    fn test_fan_out_of_boxed_writers() {
        let sink = SharedSink::new(Vec::new());
        let mut fan: FanOut<Box<dyn Write + Send>> = FanOut::default();
        assert!(fan.is_empty());
        fan.push(Box::new(sink.clone()));
        fan.push(Box::new(io::sink()));
        fan.write_all(b"both").unwrap();
        assert_eq!(&*sink.lock(), b"both");
    }
}
