//! Physical lines with the terminator each one had.

/// Split `content` into lines and their terminators (`"\n"`, `"\r\n"`, or
/// `""` for an unterminated last line).
pub(crate) fn split_terminated(content: &str) -> (Vec<String>, Vec<&'static str>) {
    content
        .split_inclusive('\n')
        .map(|piece| {
            if let Some(text) = piece.strip_suffix("\r\n") {
                (text.to_string(), "\r\n")
            } else if let Some(text) = piece.strip_suffix('\n') {
                (text.to_string(), "\n")
            } else {
                (piece.to_string(), "")
            }
        })
        .unzip()
}

/// Terminator for lines the document did not have: the last one it uses,
/// or `"\n"`.
pub(crate) fn new_line_ending(endings: &[&'static str]) -> &'static str {
    endings
        .iter()
        .rev()
        .find(|e| !e.is_empty())
        .copied()
        .unwrap_or("\n")
}
