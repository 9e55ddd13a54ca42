//! Model-backed generation against scripted completions.

use std::collections::HashSet;
use std::sync::Arc;

use risksynth::llm::{CompletionClient, NullClient, ScriptedClient};
use risksynth::record::{number_scores, scored_csv, IncidentScore};
use risksynth::synth::{
    Fallback, GenerationError, GeneratorSettings, IncidentGenerator, OutcomeSource, PromptVariant, SENTINEL_LABEL,
};

fn generator_with(client: Arc<dyn CompletionClient>) -> IncidentGenerator {
    IncidentGenerator::new(
        client,
        GeneratorSettings {
            variant: PromptVariant::Surplus,
            max_tokens: None,
        },
    )
}

const MIXED_RESPONSE: &str = "Sure! Here are the incidents:\n\
Pressure Ulcer: 4, 5\n\
3. Fall Incident: 10, 11\n\
Equipment Failure: 5, 3\n\
Medication Error: 2,6\n\
Wrong Patient ID: four, five\n";

// ---------------------------------------------------------------------------
// Batch size
// ---------------------------------------------------------------------------

#[tokio::test]
async fn every_batch_is_exactly_n() {
    let gen = generator_with(Arc::new(ScriptedClient::replying(MIXED_RESPONSE)));
    for n in [1usize, 2, 3, 7, 50] {
        let out = gen.generate(n, Fallback::Propagate).await.unwrap();
        assert_eq!(out.items.len(), n, "n={}", n);
        assert_eq!(out.accepted + out.padded, n);
    }
}

#[tokio::test]
async fn accepted_lines_keep_order_and_reject_malformed() {
    let gen = generator_with(Arc::new(ScriptedClient::replying(MIXED_RESPONSE)));
    let out = gen.generate(3, Fallback::Propagate).await.unwrap();
    assert_eq!(
        out.items,
        vec![
            IncidentScore::new("Pressure Ulcer", 4, 5),
            IncidentScore::new("Equipment Failure", 5, 3),
            IncidentScore::new("Medication Error", 2, 6),
        ]
    );
    for s in &out.items {
        assert!(!s.incident_type.is_empty());
        assert!(!s.incident_type.chars().any(|c| c.is_ascii_digit()));
    }
}

// ---------------------------------------------------------------------------
// Backfill
// ---------------------------------------------------------------------------

#[tokio::test]
async fn backfill_draws_only_from_accepted_and_balances() {
    let gen = generator_with(Arc::new(ScriptedClient::replying(MIXED_RESPONSE)));
    let n = 10;
    let out = gen.generate(n, Fallback::Propagate).await.unwrap();
    let accepted: HashSet<&str> = ["Pressure Ulcer", "Equipment Failure", "Medication Error"].into_iter().collect();
    assert_eq!(out.accepted, 3);
    assert_eq!(out.padded, 7);
    for s in &out.items {
        assert!(accepted.contains(s.incident_type.as_str()));
    }
    for label in &accepted {
        let count = out.items.iter().filter(|s| s.incident_type == *label).count();
        assert!(count >= n / accepted.len(), "{} appeared {} times", label, count);
    }
    assert_eq!(out.items[3], out.items[0]);
    assert_eq!(out.items[9], out.items[0]);
}

// ---------------------------------------------------------------------------
// Failure policy
// ---------------------------------------------------------------------------

#[tokio::test]
async fn total_failure_yields_five_sentinels() {
    let gen = generator_with(Arc::new(ScriptedClient::failing("503 service unavailable")));
    let out = gen.generate(5, Fallback::Sentinel).await.unwrap();
    assert_eq!(out.items, vec![IncidentScore::new(SENTINEL_LABEL, 3, 3); 5]);
    assert!(out.is_sentinel());
    assert!(matches!(out.source, OutcomeSource::Sentinel { ref reason } if reason.contains("503")));
}

#[tokio::test]
async fn propagate_surfaces_the_error() {
    let gen = generator_with(Arc::new(ScriptedClient::failing("connection refused")));
    let err = gen.generate(5, Fallback::Propagate).await.unwrap_err();
    assert!(matches!(err, GenerationError::Completion(_)));
}

#[tokio::test]
async fn missing_credentials_fall_back() {
    let gen = generator_with(Arc::new(NullClient));
    let out = gen.generate_on_worker(4, Fallback::Sentinel).await.unwrap();
    assert_eq!(out.items.len(), 4);
    assert!(out.is_sentinel());
}

// ---------------------------------------------------------------------------
// Label-only flow and export
// ---------------------------------------------------------------------------

#[tokio::test]
async fn labels_cycle_to_n() {
    let client = Arc::new(ScriptedClient::replying("Patient Fall\n\n17\nMedication Error\n"));
    let gen = generator_with(client.clone());
    let out = gen.generate_labels_on_worker(5, Fallback::Propagate).await.unwrap();
    assert_eq!(
        out.items,
        vec!["Patient Fall", "Medication Error", "Patient Fall", "Medication Error", "Patient Fall"]
    );
    assert!(client.last_prompt().unwrap().contains("Generate 5 unique"));
}

#[tokio::test]
async fn scored_export_recomputes_risk() {
    let gen = generator_with(Arc::new(ScriptedClient::replying(MIXED_RESPONSE)));
    let out = gen.generate(4, Fallback::Propagate).await.unwrap();
    let records = number_scores(out.items);
    for r in &records {
        assert_eq!(r.risk_score(), r.impact as u32 * r.likelihood as u32);
    }
    let csv = scored_csv(&records);
    let lines: Vec<&str> = csv.lines().collect();
    assert_eq!(lines.len(), 5);
    assert_eq!(lines[1], "1,Pressure Ulcer,4,5,20");
    assert_eq!(lines[4], "4,Pressure Ulcer,4,5,20");
}
