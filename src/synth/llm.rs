use serde_json::json;
use std::sync::Arc;

use super::parse::{backfill, parse_label_text, parse_scored_text};
use super::{
    BatchOutcome, Fallback, GenerationError, OutcomeSource, PromptVariant, SCORE_MAX, SCORE_MIN, SENTINEL_IMPACT,
    SENTINEL_LABEL, SENTINEL_LIKELIHOOD,
};
use crate::config::Config;
use crate::llm::CompletionClient;
use crate::logging::{self, info, obj, v_str, Domain, ProfileScope};
use crate::record::IncidentScore;

pub const SCORED_MAX_TOKENS: u32 = 2000;
pub const LABEL_MAX_TOKENS: u32 = 500;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeneratorSettings {
    pub variant: PromptVariant,
    /// Overrides both default token budgets when set.
    pub max_tokens: Option<u32>,
}

impl Default for GeneratorSettings {
    fn default() -> Self {
        Self {
            variant: PromptVariant::Surplus,
            max_tokens: None,
        }
    }
}

impl GeneratorSettings {
    pub fn from_config(cfg: &Config) -> Self {
        Self {
            variant: cfg.prompt_variant,
            max_tokens: cfg.llm_max_tokens,
        }
    }
}

pub fn scored_prompt(requested: usize) -> String {
    format!(
        "Generate {requested} unique medical incident types for a hospital incident register.\n\
         For each incident give an impact score and a likelihood score, both whole numbers from {min} to {max}.\n\
         Write one incident per line in exactly this format:\n\
         Incident Type: impact, likelihood\n\
         For example:\n\
         Pressure Ulcer: 4, 5\n\
         Equipment Failure: 5, 3\n\
         Do not number the lines, do not use digits in the incident type, and do not add any other text.",
        requested = requested,
        min = SCORE_MIN,
        max = SCORE_MAX,
    )
}

pub fn label_prompt(n: usize) -> String {
    format!(
        "Generate {n} unique medical incident types for a hospital incident register.\n\
         Write one incident type per line, at most four words each.\n\
         Do not number the lines and do not add any other text.",
        n = n,
    )
}

/// One-shot model-backed batch generation.
#[derive(Clone)]
pub struct IncidentGenerator {
    client: Arc<dyn CompletionClient>,
    settings: GeneratorSettings,
}

impl IncidentGenerator {
    pub fn new(client: Arc<dyn CompletionClient>, settings: GeneratorSettings) -> Self {
        Self { client, settings }
    }

    /// Exactly `n` scored triples, or an error under [`Fallback::Propagate`].
    pub async fn generate(&self, n: usize, fallback: Fallback) -> Result<BatchOutcome<IncidentScore>, GenerationError> {
        if n == 0 {
            return Err(GenerationError::InvalidCount(n));
        }
        let _scope = ProfileScope::with_context("generate_scored", &[("n", json!(n))]);
        match self.try_generate(n).await {
            Ok(outcome) => Ok(outcome),
            Err(err) => apply_fallback(err, n, fallback, || {
                IncidentScore::new(SENTINEL_LABEL, SENTINEL_IMPACT, SENTINEL_LIKELIHOOD)
            }),
        }
    }

    /// Exactly `n` incident-type labels for the schema-fill flow.
    pub async fn generate_labels(&self, n: usize, fallback: Fallback) -> Result<BatchOutcome<String>, GenerationError> {
        if n == 0 {
            return Err(GenerationError::InvalidCount(n));
        }
        let _scope = ProfileScope::with_context("generate_labels", &[("n", json!(n))]);
        match self.try_generate_labels(n).await {
            Ok(outcome) => Ok(outcome),
            Err(err) => apply_fallback(err, n, fallback, || SENTINEL_LABEL.to_string()),
        }
    }

    /// Runs [`generate`](Self::generate) on a spawned tokio task and joins it.
    /// A worker that dies is treated like any other generation failure.
    pub async fn generate_on_worker(
        &self,
        n: usize,
        fallback: Fallback,
    ) -> Result<BatchOutcome<IncidentScore>, GenerationError> {
        let worker = self.clone();
        match tokio::spawn(async move { worker.generate(n, fallback).await }).await {
            Ok(result) => result,
            Err(join) => apply_fallback(GenerationError::Worker(join.to_string()), n, fallback, || {
                IncidentScore::new(SENTINEL_LABEL, SENTINEL_IMPACT, SENTINEL_LIKELIHOOD)
            }),
        }
    }

    pub async fn generate_labels_on_worker(
        &self,
        n: usize,
        fallback: Fallback,
    ) -> Result<BatchOutcome<String>, GenerationError> {
        let worker = self.clone();
        match tokio::spawn(async move { worker.generate_labels(n, fallback).await }).await {
            Ok(result) => result,
            Err(join) => apply_fallback(GenerationError::Worker(join.to_string()), n, fallback, || {
                SENTINEL_LABEL.to_string()
            }),
        }
    }

    async fn try_generate(&self, n: usize) -> Result<BatchOutcome<IncidentScore>, GenerationError> {
        let requested = self.settings.variant.requested(n);
        let max_tokens = self.settings.max_tokens.unwrap_or(SCORED_MAX_TOKENS);
        info(
            Domain::Generate,
            "request",
            obj(&[
                ("kind", v_str("scored")),
                ("n", json!(n)),
                ("requested", json!(requested)),
                ("model", v_str(self.client.model())),
                ("max_tokens", json!(max_tokens)),
            ]),
        );
        let text = self.client.complete(&scored_prompt(requested), max_tokens).await?;
        let parsed = parse_scored_text(&text);
        let accepted = parsed.accepted.len();
        logging::log_parse_summary(parsed.lines, accepted, n);
        let items = backfill(parsed.accepted, n, parsed.lines)?;
        Ok(model_outcome(items, accepted, n))
    }

    async fn try_generate_labels(&self, n: usize) -> Result<BatchOutcome<String>, GenerationError> {
        let max_tokens = self.settings.max_tokens.unwrap_or(LABEL_MAX_TOKENS);
        info(
            Domain::Generate,
            "request",
            obj(&[
                ("kind", v_str("labels")),
                ("n", json!(n)),
                ("model", v_str(self.client.model())),
                ("max_tokens", json!(max_tokens)),
            ]),
        );
        let text = self.client.complete(&label_prompt(n), max_tokens).await?;
        let parsed = parse_label_text(&text);
        let accepted = parsed.accepted.len();
        logging::log_parse_summary(parsed.lines, accepted, n);
        let items = backfill(parsed.accepted, n, parsed.lines)?;
        Ok(model_outcome(items, accepted, n))
    }
}

fn model_outcome<T>(items: Vec<T>, accepted: usize, n: usize) -> BatchOutcome<T> {
    let used = accepted.min(n);
    BatchOutcome {
        items,
        accepted: used,
        padded: n - used,
        source: OutcomeSource::Model,
    }
}

fn apply_fallback<T: Clone>(
    err: GenerationError,
    n: usize,
    fallback: Fallback,
    sentinel: impl Fn() -> T,
) -> Result<BatchOutcome<T>, GenerationError> {
    match fallback {
        Fallback::Propagate => Err(err),
        Fallback::Sentinel => {
            let reason = err.to_string();
            logging::log_fallback(n, &reason);
            Ok(BatchOutcome {
                items: vec![sentinel(); n],
                accepted: 0,
                padded: 0,
                source: OutcomeSource::Sentinel { reason },
            })
        }
    }
}
