//! Response extraction
//!
//! Raw exchange data has the shape
//! `<command>\r\n<response>\r\n[admin@host] > `. The response is everything
//! after the echoed command line up to the trailing prompt.

use regex::Regex;

/// Continuation markers the shell prints inside multi-line blocks.
const CONTINUATION_MARKERS: [&str; 2] = ["\r\n>; ", "\r\n> "];

/// Pull the command output out of raw data read after the command echo.
///
/// If the echo cannot be found the response starts at the beginning of the
/// data; if no prompt is present it runs to the end.
#[must_use]
pub fn extract_response(command: &str, data: &str, prompt: &Regex) -> String {
    let command = normalize_line_endings(command);
    let data = clean_data(data);

    let start = data.find(command.as_str()).map_or(0, |pos| {
        let after = pos + command.len();
        // Skip the first character of the line break following the echo
        data[after..]
            .chars()
            .next()
            .filter(|c| matches!(c, '\r' | '\n'))
            .map_or(after, |c| after + c.len_utf8())
    });
    let end = prompt
        .find_iter(&data)
        .last()
        .map_or(data.len(), |m| m.start());

    if end <= start {
        return String::new();
    }
    data[start..end].to_string()
}

/// Turn every bare `\n` into `\r\n`, the way the shell echoes multi-line input.
fn normalize_line_endings(command: &str) -> String {
    let mut normalized = String::with_capacity(command.len());
    let mut previous = None;
    for c in command.chars() {
        if c == '\n' && previous != Some('\r') {
            normalized.push('\r');
        }
        normalized.push(c);
        previous = Some(c);
    }
    normalized
}

fn clean_data(data: &str) -> String {
    CONTINUATION_MARKERS
        .iter()
        .fold(data.to_string(), |cleaned, marker| cleaned.replace(marker, "\r\n"))
}
