const PARAGRAPH_DELIMITER: &str = "\n\n";

/// Splits a document into paragraph chunks on blank lines.
///
/// Each piece is trimmed and pieces that end up empty are dropped.
pub fn chunk_text(text: &str) -> Vec<String> {
    let normalized = text.replace("\r\n", "\n");
    normalized
        .split(PARAGRAPH_DELIMITER)
        .map(str::trim)
        .filter(|chunk| !chunk.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drops_empty_and_whitespace_segments() {
        assert_eq!(chunk_text("A\n\nB\n\n\nC"), vec!["A", "B", "C"]);
        assert_eq!(chunk_text("  \n\n\t\n\nD  "), vec!["D"]);
    }

    #[test]
    fn keeps_single_newlines_inside_a_chunk() {
        assert_eq!(
            chunk_text("line one\nline two\n\nnext"),
            vec!["line one\nline two", "next"]
        );
    }

    #[test]
    fn handles_windows_line_endings() {
        assert_eq!(chunk_text("A\r\n\r\nB\r\n"), vec!["A", "B"]);
    }

    #[test]
    fn empty_document_has_no_chunks() {
        assert!(chunk_text("").is_empty());
        assert!(chunk_text("\n\n\n\n").is_empty());
    }
}
