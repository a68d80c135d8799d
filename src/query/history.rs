//! Chat turns and per-session history.

use std::collections::BTreeSet;
use std::time::Duration;

use serde::Serialize;

use crate::llm::ChatMessage;

/// One answered question.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatTurn {
    pub question: String,
    pub answer: String,
    /// Source paths of the chunks used, deduplicated and sorted.
    pub sources: BTreeSet<String>,
    /// Wall-clock time from the question to the completed answer.
    #[serde(rename = "latency_secs", serialize_with = "serialize_secs")]
    pub latency: Duration,
}

impl ChatTurn {
    /// Characters this turn takes when replayed as history.
    pub fn char_count(&self) -> usize {
        self.question.chars().count() + self.answer.chars().count()
    }
}

fn serialize_secs<S: serde::Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_f64(d.as_secs_f64())
}

/// In-memory history of one chat session.
///
/// Never persisted and never rebuilt from logs.
#[derive(Debug, Clone, Default)]
pub struct Conversation {
    turns: Vec<ChatTurn>,
}

impl Conversation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, turn: ChatTurn) {
        self.turns.push(turn);
    }

    pub fn turns(&self) -> &[ChatTurn] {
        &self.turns
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn clear(&mut self) {
        self.turns.clear();
    }

    /// Most recent turns as alternating user/assistant messages, oldest first.
    ///
    /// Whole turns are taken newest first while their text fits in
    /// `budget_chars`; older turns are left out.
    pub fn recent_messages(&self, budget_chars: usize) -> Vec<ChatMessage> {
        let mut used = 0;
        let mut kept = 0;
        for turn in self.turns.iter().rev() {
            let cost = turn.char_count();
            if used + cost > budget_chars {
                break;
            }
            used += cost;
            kept += 1;
        }

        self.turns[self.turns.len() - kept..]
            .iter()
            .flat_map(|turn| {
                [
                    ChatMessage::user(turn.question.clone()),
                    ChatMessage::assistant(turn.answer.clone()),
                ]
            })
            .collect()
    }
}
