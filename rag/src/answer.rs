/// Returned when the generated text has no usable line.
pub const FALLBACK_ANSWER: &str = "I'm not sure about that. Could you ask in a different way?";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AnswerSource {
    /// A keyword intent matched; nothing was retrieved or generated.
    Intent,
    Generated,
    /// Generation ran but every line was filtered out.
    Fallback,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AnswerOutcome {
    pub answer: String,
    pub context: Vec<String>,
    pub source: AnswerSource,
}

/// Picks the answer line out of raw model output.
///
/// Lines are scanned from the end. The first one that is non-empty, does not
/// open with `<` and does not mention "answer" is returned trimmed. Genuine
/// answers containing the word "answer" are skipped too; callers get the
/// fallback in that case.
pub fn extract_answer_line(raw: &str) -> Option<String> {
    raw.split('\n')
        .rev()
        .map(str::trim)
        .find(|line| {
            !line.is_empty() && !line.starts_with('<') && !line.to_lowercase().contains("answer")
        })
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn takes_last_qualifying_line() {
        let raw = "<s>\nThe answer is hiking.\nI enjoy hiking and cycling.";
        assert_eq!(
            extract_answer_line(raw).as_deref(),
            Some("I enjoy hiking and cycling.")
        );
    }

    #[test]
    fn skips_trailing_noise() {
        let raw = "I like tea.\n\n  \n<|eot_id|>\nANSWER: done";
        assert_eq!(extract_answer_line(raw).as_deref(), Some("I like tea."));
    }

    #[test]
    fn nothing_usable_yields_none() {
        assert_eq!(extract_answer_line("<tag>\nMy answer is no.\n   \n"), None);
        assert_eq!(extract_answer_line(""), None);
    }

    #[test]
    fn trims_the_selected_line() {
        assert_eq!(extract_answer_line("  hello there  \r").as_deref(), Some("hello there"));
    }
}
