//! Heuristic task classification from the last message of a conversation.

use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::llm::ChatMessage;

/// Task category a request is routed for. Matches the tags used in `models.strengths`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskType {
    Chat,
    Coding,
    Reasoning,
    Summarization,
    Translation,
    Image,
    AgentStep,
}

impl TaskType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Chat => "chat",
            Self::Coding => "coding",
            Self::Reasoning => "reasoning",
            Self::Summarization => "summarization",
            Self::Translation => "translation",
            Self::Image => "image",
            Self::AgentStep => "agent_step",
        }
    }
}

impl fmt::Display for TaskType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "chat" => Ok(Self::Chat),
            "coding" => Ok(Self::Coding),
            "reasoning" => Ok(Self::Reasoning),
            "summarization" => Ok(Self::Summarization),
            "translation" => Ok(Self::Translation),
            "image" => Ok(Self::Image),
            "agent_step" => Ok(Self::AgentStep),
            other => Err(format!("unknown task type: {}", other)),
        }
    }
}

/// Pattern groups in precedence order. First match wins.
fn patterns() -> &'static [(TaskType, Regex)] {
    static PATTERNS: OnceLock<Vec<(TaskType, Regex)>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        [
            (
                TaskType::Coding,
                r"(?i)\b(code|function|def |class |import |const |let |var |async |await |\.py\b|\.ts\b|\.js\b)",
            ),
            (
                TaskType::Reasoning,
                r"(?i)\b(why|explain|reason|proof|solve|derive|analyze|logic)\b",
            ),
            (
                TaskType::Summarization,
                r"(?i)\b(summarize|summary|tl;dr|brief|outline)\b",
            ),
            (
                TaskType::Translation,
                r"(?i)\b(translate|traduction|übersetzen|翻译)\b",
            ),
            (
                TaskType::Image,
                r"(?i)\b(image|picture|generate|draw|dall|img)\b",
            ),
        ]
        .into_iter()
        .filter_map(|(task, pattern)| match Regex::new(pattern) {
            Ok(re) => Some((task, re)),
            Err(e) => {
                tracing::error!(task = %task, error = %e, "Invalid classifier pattern");
                None
            }
        })
        .collect()
    })
}

/// Classify a conversation by its last message. Empty input is `Chat`.
pub fn classify(messages: &[ChatMessage]) -> TaskType {
    let Some(last) = messages.last() else {
        return TaskType::Chat;
    };
    classify_text(&last.content)
}

pub fn classify_text(text: &str) -> TaskType {
    patterns()
        .iter()
        .find(|(_, re)| re.is_match(text))
        .map(|(task, _)| *task)
        .unwrap_or(TaskType::Chat)
}
