//! Byte-range helpers over the original source buffer.

use std::{fs, ops::Range, path::Path};

/// Number of lines printed above and below the error line by
/// [`location_context`].
const CONTEXT_SIZE: usize = 3;

fn is_ident_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_'
}

/// End of the token starting at (or containing) `pos`: identifier and number
/// tokens are maximal runs of word characters, anything else is a single
/// byte.
fn token_end(bytes: &[u8], pos: usize) -> usize {
    if !is_ident_byte(bytes[pos]) {
        return pos + 1;
    }
    let mut end = pos;
    while end < bytes.len() && is_ident_byte(bytes[end]) {
        end += 1;
    }
    end
}

/// Corrects a range whose end may point at the first character of its last
/// token, extending it to one past that token's last character.
///
/// A range whose end already coincides with a token end is returned
/// unchanged, so double application equals single application.
pub fn correct_token_end(source: &str, range: Range<usize>) -> Range<usize> {
    let bytes = source.as_bytes();
    let start = range.start.min(bytes.len());
    let end = range.end.clamp(start, bytes.len());

    if end > start && end <= bytes.len() {
        let last = bytes[end - 1];
        let continues = end < bytes.len() && is_ident_byte(last) && is_ident_byte(bytes[end]);
        if !last.is_ascii_whitespace() && !continues {
            // Already one past a token.
            return start..end;
        }
    }

    if end < bytes.len() && !bytes[end].is_ascii_whitespace() {
        return start..token_end(bytes, end);
    }

    start..end
}

/// The exact bytes of a corrected range, including the trailing token.
pub fn range_text<'a>(source: &'a str, range: &Range<usize>) -> &'a str {
    &source[range.start.min(source.len())..range.end.min(source.len())]
}

/// Prefixes every ASCII double quote with a backslash. Nothing else is
/// altered.
pub fn escape_quotes(text: &str) -> String {
    let mut result = String::with_capacity(text.len());
    for character in text.chars() {
        if character == '"' {
            result.push('\\');
        }
        result.push(character);
    }
    result
}

/// Number of line breaks inside a snippet.
pub fn count_newlines(text: &str) -> usize {
    text.bytes().filter(|&b| b == b'\n').count()
}

/// Last path component without its extension, used for variant naming.
pub fn file_stem(path: &Path) -> String {
    path.file_stem().map(|stem| stem.to_string_lossy().into_owned()).unwrap_or_default()
}

/// Checks that the error location exists and renders a context window of
/// [`CONTEXT_SIZE`] lines around it, with the error line marked.
///
/// Returns `None` when the file cannot be read or the line is out of bounds.
pub fn location_context(file_path: &Path, line_number: u32) -> Option<Vec<String>> {
    let content = fs::read_to_string(file_path).ok()?;
    let lines: Vec<&str> = content.lines().collect();
    let line_number = line_number as usize;

    if line_number == 0 || line_number > lines.len() {
        return None;
    }

    let start = line_number.saturating_sub(CONTEXT_SIZE).max(1);
    let end = (line_number + CONTEXT_SIZE).min(lines.len());

    let mut window = Vec::with_capacity(end - start + 1);
    for current in start..=end {
        let marker = if current == line_number { "[*] " } else { "    " };
        window.push(format!("{marker}{current}: {}", lines[current - 1]));
    }

    Some(window)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn correction_extends_past_last_token() {
        let source = "return value;";
        // Raw range ends at the first character of `value`.
        let corrected = correct_token_end(source, 0..7);
        assert_eq!(range_text(source, &corrected), "return value");
    }

    #[test]
    fn correction_extends_mid_token_end() {
        let source = "int counter = 0;";
        let corrected = correct_token_end(source, 0..8);
        assert_eq!(range_text(source, &corrected), "int counter");
    }

    #[test]
    fn correction_is_idempotent_under_double_application() {
        let cases = ["return value;", "int counter = 0;", "f(x) + g(y)", "a"];
        for source in cases {
            for start in 0..source.len() {
                for end in start..=source.len() {
                    let once = correct_token_end(source, start..end);
                    let twice = correct_token_end(source, once.clone());
                    assert_eq!(once, twice, "source {source:?}, range {start}..{end}");
                }
            }
        }
    }

    #[test]
    fn correction_clamps_out_of_bounds_ranges() {
        assert_eq!(correct_token_end("ab", 0..10), 0..2);
    }

    #[test]
    fn escape_only_touches_double_quotes() {
        assert_eq!(escape_quotes(r#"puts("hi \n");"#), r#"puts(\"hi \n\");"#);
        assert_eq!(escape_quotes("no quotes"), "no quotes");
    }

    #[test]
    fn newline_counting() {
        assert_eq!(count_newlines("a\nb\nc"), 2);
        assert_eq!(count_newlines(""), 0);
    }

    #[test]
    fn context_window_marks_the_error_line() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("example.c");
        fs::write(&path, "int main() {\n    int x = 0;\n    return x;\n}\n").unwrap();

        let window = location_context(&path, 2).unwrap();
        assert_eq!(window.len(), 4);
        assert!(window[1].starts_with("[*] 2:"));

        // A line outside the file fails the configuration check.
        assert!(location_context(&path, 40).is_none());
        assert!(location_context(&path, 0).is_none());
    }

    #[test]
    fn file_stem_strips_directories_and_extension() {
        assert_eq!(file_stem(Path::new("/tmp/work/example.cpp")), "example");
    }
}
