//! Status-line parsing for the raw header lines libcurl hands us.

/// Status code from a line like `HTTP/1.1 404 Not Found` or `HTTP/2 200`.
/// Returns `None` for ordinary header lines.
pub(crate) fn parse_status_line(line: &[u8]) -> Option<u32> {
    let line = std::str::from_utf8(line).ok()?.trim_end();
    let rest = line.strip_prefix("HTTP/")?;
    let mut parts = rest.split_whitespace();
    parts.next()?;
    let code = parts.next()?;
    if code.len() != 3 {
        return None;
    }
    code.parse().ok()
}
