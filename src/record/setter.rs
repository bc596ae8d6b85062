//! Record → assignment commands.
//!
//! The interpreter reads at most [`MAX_LINE_WIDTH`] characters per line, so
//! long string values are spread over several lines as a `concat(...)` of
//! quoted chunks. Literals are single-quoted; an embedded single quote is
//! spliced in as `"'"` inside a nested `concat(...)` for that chunk.

use chrono::NaiveDateTime;

use super::{Record, RecordError, Value};

/// Widest line the interpreter accepts.
pub const MAX_LINE_WIDTH: usize = 132;

/// Quote-free chunk that fills a continuation line: two quotes and a comma.
pub const MAX_CHUNK_WIDTH: usize = MAX_LINE_WIDTH - 3;

const SUBMIT: &str = " go";
const CONCAT: &str = "concat(";
const QUOTE_PIECE: &str = "\"'\"";

/// Commands that assign every non-default value of `record` in the interpreter.
///
/// Fields still at the interpreter's default (zero, empty string, zero date)
/// are skipped. Dynamic lists are sized with `alterlist` before their
/// elements are assigned; list indexes are 1-based. A command spanning
/// several lines is returned as one string with embedded newlines.
pub fn setter_commands(record: &Record) -> Result<Vec<String>, RecordError> {
    let mut commands = Vec::new();
    visit(record, &record.name().to_ascii_lowercase(), &mut commands)?;
    Ok(commands)
}

fn visit(record: &Record, path: &str, out: &mut Vec<String>) -> Result<(), RecordError> {
    for (field, value) in record.entries() {
        let target = format!("{path}->{}", field.name().to_ascii_lowercase());
        match value {
            Value::Record(child) => visit(child, &target, out)?,
            Value::List(items) => {
                for (i, item) in items.iter().enumerate() {
                    visit(item, &format!("{target}[{}]", i + 1), out)?;
                }
            }
            Value::DynamicList(items) => {
                if items.is_empty() {
                    continue;
                }
                out.push(format!(
                    "set stat = alterlist({target}, {}){SUBMIT}",
                    items.len()
                ));
                for (i, item) in items.iter().enumerate() {
                    visit(item, &format!("{target}[{}]", i + 1), out)?;
                }
            }
            scalar if scalar.is_default() => {}
            Value::String(s) => out.push(assign_string(&target, s)?),
            Value::I2(v) => out.push(format!("set {target} = {v}{SUBMIT}")),
            Value::I4(v) => out.push(format!("set {target} = {v}{SUBMIT}")),
            Value::F8(v) => out.push(format!("set {target} = {}{SUBMIT}", format_float(*v))),
            Value::DQ8(Some(date)) => {
                out.push(format!("set {target} = {}{SUBMIT}", format_date(date)))
            }
            Value::DQ8(None) => {}
        }
    }
    Ok(())
}

/// Floating point literal with six decimal places.
pub fn format_float(value: f64) -> String {
    format!("{value:.6}")
}

/// Date-construction call for a timestamp, e.g.
/// `cnvtdatetime("15-MAR-2024 13:45:12.000")`.
pub fn format_date(value: &NaiveDateTime) -> String {
    let text = value.format("%d-%b-%Y %H:%M:%S%.3f").to_string();
    format!("cnvtdatetime(\"{}\")", text.to_ascii_uppercase())
}

/// Quote `value` as a string expression, ignoring line width.
pub fn quote_literal(value: &str) -> String {
    let chars: Vec<char> = value.chars().collect();
    render(&chars)
}

/// Lay out `set <target> = <value> go` within the line width.
fn assign_string(target: &str, value: &str) -> Result<String, RecordError> {
    let prefix = format!("set {target} = ");
    let chars: Vec<char> = value.chars().collect();

    let single = render(&chars);
    if width(&prefix) + width(&single) + SUBMIT.len() <= MAX_LINE_WIDTH {
        return Ok(format!("{prefix}{single}{SUBMIT}"));
    }

    let mut lines = Vec::new();
    let mut lead = format!("{prefix}{CONCAT}");
    if width(&lead) > MAX_LINE_WIDTH - 4 {
        if width(&lead) > MAX_LINE_WIDTH {
            return Err(RecordError::InvalidValue {
                field: target.to_string(),
                reason: format!("assignment target exceeds {MAX_LINE_WIDTH} characters"),
            });
        }
        lines.push(std::mem::take(&mut lead));
    }

    let closing = format!("){SUBMIT}");
    let mut rest = &chars[..];
    loop {
        if width(&lead) + width(&render(rest)) + closing.len() <= MAX_LINE_WIDTH {
            lines.push(format!("{lead}{}{closing}", render(rest)));
            break;
        }
        let n = longest_fit(&lead, rest, ",".len());
        if n == 0 {
            lines.push(std::mem::take(&mut lead));
            continue;
        }
        lines.push(format!("{lead}{},", render(&rest[..n])));
        rest = &rest[n..];
        lead.clear();
    }
    Ok(lines.join("\n"))
}

/// Longest proper prefix of `rest` whose rendering fits after `lead` with
/// `tail` characters still to come on the line. Rendered width grows
/// strictly with prefix length, so a binary search applies.
fn longest_fit(lead: &str, rest: &[char], tail: usize) -> usize {
    let budget = MAX_LINE_WIDTH.saturating_sub(width(lead) + tail);
    let fits = |n: usize| width(&render(&rest[..n])) <= budget;
    let (mut lo, mut hi) = (0, rest.len().saturating_sub(1).min(MAX_LINE_WIDTH));
    while lo < hi {
        let mid = (lo + hi).div_ceil(2);
        if fits(mid) {
            lo = mid;
        } else {
            hi = mid - 1;
        }
    }
    lo
}

/// Render a chunk as one literal, or a nested `concat` when it holds quotes.
fn render(chunk: &[char]) -> String {
    let mut pieces: Vec<String> = Vec::new();
    let mut run = String::new();
    for &c in chunk {
        if c == '\'' {
            if !run.is_empty() {
                pieces.push(format!("'{run}'"));
                run.clear();
            }
            pieces.push(QUOTE_PIECE.to_string());
        } else {
            run.push(c);
        }
    }
    if !run.is_empty() {
        pieces.push(format!("'{run}'"));
    }
    match pieces.len() {
        0 => "''".to_string(),
        1 => pieces.remove(0),
        _ => format!("{CONCAT}{})", pieces.join(", ")),
    }
}

fn width(s: &str) -> usize {
    s.chars().count()
}
