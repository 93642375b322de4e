#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize)]
pub struct Message {
    pub role: String,
    pub content: String,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

/// Builds the system + user messages sent to the generation model.
pub fn build_prompt(question: &str, context_chunks: &[String], persona: &str) -> Vec<Message> {
    let context = context_chunks.join("\n");
    let user_content = format!("Context:\n{}\n\nQuestion: {}", context, question);
    vec![Message::system(persona), Message::user(user_content)]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn joins_context_with_single_newline() {
        let chunks = vec!["I enjoy hiking.".to_string(), "I build chatbots.".to_string()];
        let messages = build_prompt("What do you enjoy?", &chunks, "Be nice.");
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0], Message::system("Be nice."));
        assert_eq!(messages[1].role, "user");
        assert_eq!(
            messages[1].content,
            "Context:\nI enjoy hiking.\nI build chatbots.\n\nQuestion: What do you enjoy?"
        );
    }

    #[test]
    fn is_deterministic() {
        let chunks = vec!["a".to_string()];
        assert_eq!(build_prompt("q", &chunks, "p"), build_prompt("q", &chunks, "p"));
    }
}
