use std::io::Read;
use std::thread;

use tokio::sync::mpsc::{UnboundedReceiver, unbounded_channel};
use tracing::trace;

/// Spawns a background thread that forwards everything read from a PTY.
///
/// The channel closes at EOF, on a read error, or once the receiver is gone.
pub fn spawn_reader<R: Read + Send + 'static>(mut reader: R) -> UnboundedReceiver<Vec<u8>> {
    let (tx, rx) = unbounded_channel();

    thread::spawn(move || {
        let mut buffer = [0u8; 4096];
        loop {
            match reader.read(&mut buffer) {
                Ok(0) => break, // EOF
                Ok(n) => {
                    if tx.send(buffer[..n].to_vec()).is_err() {
                        break; // Receiver dropped
                    }
                }
                Err(e) => {
                    trace!(error = %e, "pty reader stopped");
                    break;
                }
            }
        }
    });

    rx
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_forwards_until_eof() {
        let mut rx = spawn_reader(&b"hello world"[..]);
        let mut received = Vec::new();
        while let Some(chunk) = rx.recv().await {
            received.extend_from_slice(&chunk);
        }
        assert_eq!(received, b"hello world");
    }

    #[test]
    fn test_stops_when_receiver_dropped() {
        let (done_tx, done_rx) = std::sync::mpsc::channel();
        let endless = std::io::repeat(b'x');
        drop(spawn_reader(Watch(endless, done_tx)));
        assert!(
            done_rx
                .recv_timeout(std::time::Duration::from_secs(5))
                .is_ok()
        );
    }

    /// Signals when the reader thread lets go of it.
    struct Watch<R>(R, std::sync::mpsc::Sender<()>);

    impl<R: Read> Read for Watch<R> {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            self.0.read(buf)
        }
    }

    impl<R> Drop for Watch<R> {
        fn drop(&mut self) {
            let _ = self.1.send(());
        }
    }
}
