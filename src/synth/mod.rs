//! Incident batch synthesis.
//!
//! Every entry point returns exactly the requested number of rows or an
//! error. Model-backed generation can opt into sentinel rows instead of an
//! error through [`Fallback::Sentinel`].

pub mod faker;
pub mod llm;
pub mod parse;
pub mod schema_fill;

use serde::{Deserialize, Serialize};

use crate::llm::CompletionError;

pub use faker::IncidentFaker;
pub use llm::{GeneratorSettings, IncidentGenerator};
pub use parse::{backfill, parse_label_line, parse_scored_line, parse_scored_text, ParsedText};
pub use schema_fill::{fill_schema, merge_incident_types};

pub const SENTINEL_LABEL: &str = "Error: AI generation failed";
pub const SENTINEL_IMPACT: u8 = 3;
pub const SENTINEL_LIKELIHOOD: u8 = 3;

/// Inclusive bound for impact and likelihood scores.
pub const SCORE_MIN: u8 = 1;
pub const SCORE_MAX: u8 = 6;

#[derive(Debug, thiserror::Error)]
pub enum GenerationError {
    #[error("batch size must be at least 1, got {0}")]
    InvalidCount(usize),
    #[error("completion failed: {0}")]
    Completion(#[from] CompletionError),
    #[error("no usable generation output ({lines} lines, none matched)")]
    NoUsableOutput { lines: usize },
    #[error("generation worker failed: {0}")]
    Worker(String),
    #[error("cannot draw {requested} unique incident numbers from {capacity}")]
    IdSpaceExhausted { requested: usize, capacity: usize },
}

/// What to do when model-backed generation fails outright.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Fallback {
    /// Return the error to the caller.
    Propagate,
    /// Substitute n sentinel rows and record the reason.
    Sentinel,
}

impl Fallback {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "propagate" | "error" | "strict" => Some(Fallback::Propagate),
            "sentinel" | "soft" => Some(Fallback::Sentinel),
            _ => None,
        }
    }
}

/// How many labels the prompt asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PromptVariant {
    /// Exactly n.
    Exact,
    /// ceil(1.5 × n), leaving headroom for rejected lines.
    Surplus,
}

impl PromptVariant {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "exact" => Some(PromptVariant::Exact),
            "surplus" => Some(PromptVariant::Surplus),
            _ => None,
        }
    }

    pub fn requested(&self, n: usize) -> usize {
        match self {
            PromptVariant::Exact => n,
            PromptVariant::Surplus => (3 * n + 1) / 2,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum OutcomeSource {
    Model,
    Sentinel { reason: String },
}

/// A batch of exactly `items.len()` rows and how it was obtained.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchOutcome<T> {
    pub items: Vec<T>,
    /// Rows taken directly from model output.
    pub accepted: usize,
    /// Rows repeated from accepted output to reach the batch size.
    pub padded: usize,
    pub source: OutcomeSource,
}

impl<T> BatchOutcome<T> {
    pub fn is_sentinel(&self) -> bool {
        matches!(self.source, OutcomeSource::Sentinel { .. })
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}
