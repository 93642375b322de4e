use std::fs;
use std::path::Path;

use serde::Deserialize;

use crate::error::{RagError, Result};

/// A keyword-triggered canned response that bypasses retrieval and generation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Intent {
    pub name: String,
    pub keywords: Vec<String>,
    pub response: String,
}

impl Intent {
    pub fn new(
        name: impl Into<String>,
        keywords: impl IntoIterator<Item = impl Into<String>>,
        response: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            keywords: keywords
                .into_iter()
                .map(|k| {
                    let k: String = k.into();
                    k.trim().to_lowercase()
                })
                .filter(|k| !k.is_empty())
                .collect(),
            response: response.into(),
        }
    }

    fn matches(&self, lowered_question: &str) -> bool {
        self.keywords
            .iter()
            .any(|keyword| lowered_question.contains(keyword.as_str()))
    }
}

/// Ordered intent list; the first intent whose keyword appears in the question wins.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct IntentTable {
    intents: Vec<Intent>,
}

#[derive(Deserialize)]
struct IntentFile {
    intents: Vec<IntentEntry>,
}

#[derive(Deserialize)]
struct IntentEntry {
    name: String,
    keywords: Vec<String>,
    response: ResponseText,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ResponseText {
    Text(String),
    Lines(Vec<String>),
}

impl IntentTable {
    pub fn new(intents: Vec<Intent>) -> Self {
        Self { intents }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn from_json(raw: &str) -> Result<Self> {
        let file: IntentFile = serde_json::from_str(raw)
            .map_err(|e| RagError::Configuration(format!("invalid intents file: {}", e)))?;
        let intents = file
            .intents
            .into_iter()
            .map(|entry| {
                let response = match entry.response {
                    ResponseText::Text(text) => text,
                    ResponseText::Lines(lines) => lines.join("\n"),
                };
                Intent::new(entry.name, entry.keywords, response)
            })
            .collect();
        Ok(Self { intents })
    }

    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path).map_err(|e| {
            RagError::Configuration(format!("cannot read intents file {}: {}", path.display(), e))
        })?;
        Self::from_json(&raw)
    }

    pub fn intents(&self) -> &[Intent] {
        &self.intents
    }

    /// Case-insensitive substring match of every keyword against `question`.
    pub fn matches(&self, question: &str) -> Option<&Intent> {
        let lowered = question.to_lowercase();
        self.intents.iter().find(|intent| intent.matches(&lowered))
    }

    /// The built-in "list my work" shortcut.
    pub fn builtin() -> Self {
        let projects = [
            "• Personal Website with LLM Integration",
            "• MultiView Synchro (HCI Class Project)",
            "• Privacy and Security of Drones (Ethics Paper)",
            "• Recipe Book Web App",
        ];
        Self::new(vec![Intent::new(
            "projects",
            ["list", "name", "projects", "portfolio", "examples"],
            projects.join("\n"),
        )])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_matches_case_insensitively() {
        let table = IntentTable::builtin();
        let hit = table.matches("Can you LIST your Projects?").unwrap();
        assert_eq!(hit.name, "projects");
        assert!(hit.response.starts_with("• Personal Website"));
        assert_eq!(hit.response.lines().count(), 4);
        assert!(table.matches("What do you enjoy?").is_none());
    }

    #[test]
    fn first_declared_intent_wins() {
        let table = IntentTable::new(vec![
            Intent::new("hobbies", ["hike"], "hiking"),
            Intent::new("work", ["hike", "job"], "engineering"),
        ]);
        assert_eq!(table.matches("do you hike for your job").unwrap().name, "hobbies");
        assert_eq!(table.matches("your job?").unwrap().name, "work");
    }

    #[test]
    fn blank_keywords_never_match() {
        let table = IntentTable::new(vec![Intent::new("x", ["", "   "], "never")]);
        assert!(table.matches("anything at all").is_none());
    }

    #[test]
    fn loads_json_with_line_arrays() {
        let table = IntentTable::from_json(
            r#"{"intents":[
                {"name":"contact","keywords":["Email","reach"],"response":"mail@example.com"},
                {"name":"skills","keywords":["skills"],"response":["Rust","Python"]}
            ]}"#,
        )
        .unwrap();
        assert_eq!(table.intents().len(), 2);
        assert_eq!(table.matches("how do I email you").unwrap().response, "mail@example.com");
        assert_eq!(table.matches("top skills?").unwrap().response, "Rust\nPython");
    }

    #[test]
    fn malformed_json_is_a_configuration_error() {
        assert!(matches!(
            IntentTable::from_json("{\"intents\": 3}"),
            Err(RagError::Configuration(_))
        ));
    }
}
