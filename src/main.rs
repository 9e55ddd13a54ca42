use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde_json::json;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use risksynth::config::Config;
use risksynth::data::{self, SchemaDescriptor};
use risksynth::llm::{ClientKind, CompletionClient, ScriptedClient};
use risksynth::logging::{info, obj, v_str, Domain};
use risksynth::metrics::BatchSummary;
use risksynth::record;
use risksynth::risk::{risk_ranking, RiskGrid, RiskMatrix, ScoredRow};
use risksynth::synth::{
    fill_schema, merge_incident_types, Fallback, GeneratorSettings, IncidentFaker, IncidentGenerator, PromptVariant,
};

#[derive(Parser)]
#[command(name = "risksynth")]
#[command(about = "Synthetic medical incident records and risk scoring")]
#[command(version)]
struct Cli {
    /// Seed for reproducible batches (overrides SEED)
    #[arg(long, global = true)]
    seed: Option<u64>,

    /// sentinel or propagate (overrides FALLBACK)
    #[arg(long, global = true, value_parser = parse_fallback)]
    fallback: Option<Fallback>,

    /// exact or surplus (overrides PROMPT_VARIANT)
    #[arg(long, global = true, value_parser = parse_variant)]
    variant: Option<PromptVariant>,

    /// Output token budget for the completion call (overrides LLM_MAX_TOKENS)
    #[arg(long, global = true)]
    max_tokens: Option<u32>,

    /// Base directory for relative --out paths
    #[arg(long, global = true, env = "EXPORT_DIR")]
    export_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the inferred schema of a CSV file as JSON
    Schema {
        /// CSV file with a header row
        input: PathBuf,
    },

    /// Fill rows for an uploaded table's columns and label them with model incident types
    Generate {
        /// CSV file whose header defines the output columns
        input: PathBuf,
        #[arg(short = 'n', long, default_value = "10")]
        count: usize,
        /// Write CSV and manifest here instead of stdout
        #[arg(short, long)]
        out: Option<PathBuf>,
        /// Re-parse a saved model response instead of calling the endpoint
        #[arg(long)]
        replay: Option<PathBuf>,
    },

    /// Scored incident types from the model, numbered 1..n
    GenerateAi {
        #[arg(short = 'n', long, default_value = "10")]
        count: usize,
        #[arg(short, long)]
        out: Option<PathBuf>,
        #[arg(long)]
        replay: Option<PathBuf>,
    },

    /// Fully-formed incidents from fixed category lists
    Incidents {
        #[arg(short = 'n', long, default_value = "5000")]
        count: usize,
        #[arg(short, long)]
        out: Option<PathBuf>,
    },

    /// Risk matrix over a CSV with impact, likelihood and risk score columns
    Categorize {
        input: PathBuf,
    },
}

fn parse_fallback(s: &str) -> std::result::Result<Fallback, String> {
    Fallback::parse(s).ok_or_else(|| format!("unknown fallback policy '{}' (sentinel, propagate)", s))
}

fn parse_variant(s: &str) -> std::result::Result<PromptVariant, String> {
    PromptVariant::parse(s).ok_or_else(|| format!("unknown prompt variant '{}' (exact, surplus)", s))
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();

    let mut cfg = Config::from_env();
    if let Some(seed) = cli.seed {
        cfg.seed = Some(seed);
    }
    if let Some(fallback) = cli.fallback {
        cfg.fallback = fallback;
    }
    if let Some(variant) = cli.variant {
        cfg.prompt_variant = variant;
    }
    if let Some(max_tokens) = cli.max_tokens {
        cfg.llm_max_tokens = Some(max_tokens);
    }
    if let Some(dir) = cli.export_dir {
        cfg.export_dir = dir.display().to_string();
    }
    info(
        Domain::System,
        "startup",
        obj(&[
            ("model", v_str(&cfg.llm_model)),
            ("variant", json!(cfg.prompt_variant)),
            ("fallback", json!(cfg.fallback)),
            ("llm_credentials", json!(cfg.has_llm_credentials())),
            ("seed", json!(cfg.seed)),
        ]),
    );

    match cli.command {
        Commands::Schema { input } => run_schema(&input),
        Commands::Generate {
            input,
            count,
            out,
            replay,
        } => run_generate(&cfg, &input, count, out.as_deref(), replay.as_deref()).await,
        Commands::GenerateAi { count, out, replay } => {
            run_generate_ai(&cfg, count, out.as_deref(), replay.as_deref()).await
        }
        Commands::Incidents { count, out } => run_incidents(&cfg, count, out.as_deref()),
        Commands::Categorize { input } => run_categorize(&input),
    }
}

fn rng_for(cfg: &Config) -> StdRng {
    match cfg.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    }
}

fn client_for(cfg: &Config, replay: Option<&Path>) -> Result<Arc<dyn CompletionClient>> {
    match replay {
        Some(path) => {
            let text = fs::read_to_string(path).with_context(|| format!("reading replay {}", path.display()))?;
            info(Domain::Llm, "client", obj(&[("type", v_str("replay")), ("path", v_str(&path.display().to_string()))]));
            Ok(Arc::new(ScriptedClient::replying(text)))
        }
        None => Ok(ClientKind::from_config(cfg).build(cfg)),
    }
}

fn load_schema(input: &Path) -> Result<SchemaDescriptor> {
    let table = data::load_table_path(input).with_context(|| format!("loading {}", input.display()))?;
    Ok(data::infer_schema(&table))
}

/// Relative export paths resolve against `EXPORT_DIR`.
fn export_path(cfg: &Config, out: &Path) -> PathBuf {
    if out.is_relative() {
        Path::new(&cfg.export_dir).join(out)
    } else {
        out.to_path_buf()
    }
}

fn emit(
    cfg: &Config,
    out: Option<&Path>,
    csv_text: &str,
    columns: Vec<String>,
    rows: usize,
    generator: &str,
    sentinel: bool,
) -> Result<()> {
    match out {
        Some(out) => {
            let path = export_path(cfg, out);
            let manifest = data::write_export(&path, csv_text, columns, rows as u64, generator, sentinel)
                .with_context(|| format!("writing {}", path.display()))?;
            println!("{}", serde_json::to_string_pretty(&manifest)?);
        }
        None => print!("{}", csv_text),
    }
    Ok(())
}

fn run_schema(input: &Path) -> Result<()> {
    let schema = load_schema(input)?;
    println!("{}", serde_json::to_string_pretty(&schema)?);
    Ok(())
}

async fn run_generate(cfg: &Config, input: &Path, count: usize, out: Option<&Path>, replay: Option<&Path>) -> Result<()> {
    if count == 0 {
        bail!("count must be at least 1");
    }
    let schema = load_schema(input)?;
    let mut rng = rng_for(cfg);
    let mut table = fill_schema(&schema, count, &mut rng);

    let generator = IncidentGenerator::new(client_for(cfg, replay)?, GeneratorSettings::from_config(cfg));
    let labels = generator.generate_labels_on_worker(count, cfg.fallback).await?;
    merge_incident_types(&mut table, &labels.items);

    let csv_text = table.to_csv();
    emit(cfg, out, &csv_text, table.header(), table.rows, "schema_fill", labels.is_sentinel())
}

async fn run_generate_ai(cfg: &Config, count: usize, out: Option<&Path>, replay: Option<&Path>) -> Result<()> {
    let generator = IncidentGenerator::new(client_for(cfg, replay)?, GeneratorSettings::from_config(cfg));
    let outcome = generator.generate_on_worker(count, cfg.fallback).await?;
    let sentinel = outcome.is_sentinel();
    info(
        Domain::Generate,
        "batch_ready",
        obj(&[
            ("rows", json!(outcome.len())),
            ("accepted", json!(outcome.accepted)),
            ("padded", json!(outcome.padded)),
            ("sentinel", json!(sentinel)),
        ]),
    );
    let records = record::number_scores(outcome.items);
    let summary = BatchSummary::from_records(&records);
    info(Domain::Risk, "batch_summary", obj(&[("summary", serde_json::to_value(&summary)?)]));
    let csv_text = record::scored_csv(&records);
    let columns = record::SCORED_COLUMNS.iter().map(|c| c.to_string()).collect();
    emit(cfg, out, &csv_text, columns, records.len(), "llm", sentinel)
}

fn run_incidents(cfg: &Config, count: usize, out: Option<&Path>) -> Result<()> {
    let mut rng = rng_for(cfg);
    let records = IncidentFaker::default().generate(count, &mut rng)?;
    let summary = BatchSummary::from_records(&records);
    info(Domain::Risk, "batch_summary", obj(&[("summary", serde_json::to_value(&summary)?)]));
    let csv_text = record::detailed_csv(&records);
    let columns = record::DETAILED_COLUMNS.iter().map(|c| c.to_string()).collect();
    emit(cfg, out, &csv_text, columns, records.len(), "faker", false)
}

/// Impact, likelihood and risk score columns by case-insensitive name; the
/// risk score is derived when the table has none.
fn scored_rows_from_csv(input: &Path) -> Result<Vec<ScoredRow>> {
    let table = data::load_table_path(input).with_context(|| format!("loading {}", input.display()))?;
    let find = |names: &[&str]| {
        table.columns.iter().position(|c| {
            let c = c.trim().to_lowercase();
            names.iter().any(|n| c == *n)
        })
    };
    let (Some(impact), Some(likelihood)) = (find(&["impact"]), find(&["likelihood"])) else {
        bail!("{} has no impact and likelihood columns", input.display());
    };
    let score = find(&["risk_score", "risk score"]);

    let mut rows = Vec::with_capacity(table.rows.len());
    for raw in &table.rows {
        let (Ok(i), Ok(l)) = (raw[impact].trim().parse::<i64>(), raw[likelihood].trim().parse::<i64>()) else {
            continue;
        };
        let mut row = ScoredRow::from_factors(i, l);
        if let Some(s) = score.and_then(|idx| raw[idx].trim().parse::<f64>().ok()) {
            row.risk_score = s;
        }
        rows.push(row);
    }
    info(
        Domain::Risk,
        "rows_loaded",
        obj(&[("rows", json!(rows.len())), ("skipped", json!(table.rows.len() - rows.len()))]),
    );
    Ok(rows)
}

fn run_categorize(input: &Path) -> Result<()> {
    let rows = scored_rows_from_csv(input)?;
    let view = json!({
        "rows": rows.len(),
        "grid": RiskGrid::from_rows(&rows),
        "matrix": RiskMatrix::from_rows(&rows),
        "ranking": risk_ranking(&rows),
    });
    println!("{}", serde_json::to_string_pretty(&view)?);
    Ok(())
}
