//! Exchange Transcript
//!
//! Append-only record of one top-level exchange: the user's utterance,
//! every model decision, and every batch of tool results.

use serde::{Deserialize, Serialize};

use crate::backend::ModelDecision;
use crate::tool::ToolResult;

/// One step of an exchange
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "turn", content = "content", rename_all = "snake_case")]
pub enum Turn {
    /// The user's utterance
    User(String),
    /// A model decision: final text or tool requests
    Model(ModelDecision),
    /// Results for the preceding tool requests, in request order
    Tool(Vec<ToolResult>),
}

/// Ordered turns of a single exchange. Turns are only ever appended.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Transcript {
    turns: Vec<Turn>,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a turn
    pub fn push(&mut self, turn: Turn) {
        self.turns.push(turn);
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn last(&self) -> Option<&Turn> {
        self.turns.last()
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    /// Every tool turn, oldest first
    pub fn tool_turns(&self) -> impl Iterator<Item = &[ToolResult]> {
        self.turns.iter().filter_map(|t| match t {
            Turn::Tool(results) => Some(results.as_slice()),
            _ => None,
        })
    }

    /// Number of tool turns recorded so far
    pub fn tool_turn_count(&self) -> usize {
        self.tool_turns().count()
    }

    /// Number of model turns recorded so far
    pub fn model_turn_count(&self) -> usize {
        self.turns
            .iter()
            .filter(|t| matches!(t, Turn::Model(_)))
            .count()
    }
}
