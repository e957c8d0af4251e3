//! Persisted brush history.
//!
//! The base field is never saved; it is regenerated from its parameters and
//! seed, then the recorded strokes are replayed in order.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::core::types::Result;
use super::brush::Brush;

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct BrushHistory {
    pub brushes: Vec<Brush>,
    #[serde(default)]
    pub falling_enabled: bool,
}

impl BrushHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, brush: Brush) {
        self.brushes.push(brush);
    }

    pub fn pop(&mut self) -> Option<Brush> {
        self.brushes.pop()
    }

    pub fn len(&self) -> usize {
        self.brushes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.brushes.is_empty()
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }
}
