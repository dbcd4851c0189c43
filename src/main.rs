use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod config;
mod error;
mod mapping;
mod metrics;
mod models;
mod portfolio;
mod report;
mod stages;
mod webhook;
mod wizard;

use config::Config;
use models::{ClientData, ClientStats};
use portfolio::Portfolio;
use webhook::WebhookClient;
use wizard::{WizardEvent, WizardState};

#[derive(Parser)]
#[command(name = "client-ops")]
#[command(about = "Client onboarding and portfolio monitoring for the agency", long_about = None)]
struct Cli {
    /// TOML file with taxonomy, stage aliases and webhook settings
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List the distinct pipeline stages in a CSV export
    Stages {
        #[arg(long)]
        csv: PathBuf,
    },
    /// Map pipeline stages to categories and submit the client configuration
    Onboard {
        #[arg(long)]
        csv: PathBuf,
        /// JSON object of stage name to category
        #[arg(long)]
        mapping: Option<PathBuf>,
        /// Single assignment as "Stage=Category", overrides the mapping file.
        /// An empty category clears the stage
        #[arg(long = "assign", value_name = "STAGE=CATEGORY")]
        assignments: Vec<String>,
        #[arg(long)]
        subaccount: String,
        #[arg(long)]
        ad_account: String,
        /// Calendar id as "name=id", e.g. "diagnosis=abc123"
        #[arg(long = "calendar", value_name = "NAME=ID", required = true)]
        calendars: Vec<String>,
        /// Print the payload instead of submitting it
        #[arg(long)]
        dry_run: bool,
    },
    /// Aggregate client stats and write a dashboard report
    Portfolio {
        /// Client list as JSON, instead of the clients-list webhook
        #[arg(long)]
        clients: Option<PathBuf>,
        /// Stats keyed by subaccount id as JSON, instead of the live-stats webhook
        #[arg(long)]
        stats: Option<PathBuf>,
        #[arg(long, default_value = "portfolio.md")]
        out: PathBuf,
    },
}

fn env_bool(name: &str) -> bool {
    matches!(
        std::env::var(name).as_deref(),
        Ok("1" | "true" | "TRUE" | "yes" | "YES")
    )
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let layer = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);
    if env_bool("CLIENT_OPS_LOG_JSON") {
        tracing_subscriber::registry()
            .with(filter)
            .with(layer.json())
            .init();
    } else {
        tracing_subscriber::registry().with(filter).with(layer).init();
    }
}

fn split_pair(raw: &str) -> anyhow::Result<(String, String)> {
    let (left, right) = raw
        .split_once('=')
        .with_context(|| format!("expected KEY=VALUE, got \"{raw}\""))?;
    Ok((left.trim().to_string(), right.trim().to_string()))
}

fn read_upload(path: &Path) -> anyhow::Result<(String, String)> {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    stages::check_file_name(&name)?;
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    Ok((name, contents))
}

fn load_assignments(
    mapping: Option<&Path>,
    assignments: &[String],
) -> anyhow::Result<BTreeMap<String, String>> {
    let mut merged: BTreeMap<String, String> = match mapping {
        Some(path) => {
            let raw = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read {}", path.display()))?;
            serde_json::from_str(&raw)
                .with_context(|| format!("{} must be a JSON object of stage to category", path.display()))?
        }
        None => BTreeMap::new(),
    };
    for raw in assignments {
        let (stage, category) = split_pair(raw)?;
        merged.insert(stage, category);
    }
    Ok(merged)
}

async fn onboard(
    config: &Config,
    upload: WizardEvent,
    assignments: BTreeMap<String, String>,
    identifiers: Vec<WizardEvent>,
    dry_run: bool,
) -> anyhow::Result<()> {
    let onboarding = &config.onboarding;
    let mut state = WizardState::default().apply(upload, onboarding)?;
    state = state.apply(WizardEvent::Continue, onboarding)?;
    tracing::info!(file = ?state.file_name, stages = state.mappings.len(), "stages extracted");

    for (stage, category) in &assignments {
        let Some(index) = state.mappings.iter().position(|m| &m.stage_name == stage) else {
            tracing::warn!(%stage, "mapping names a stage not present in the CSV");
            continue;
        };
        let event = if category.is_empty() {
            WizardEvent::ClearCategory { index }
        } else {
            WizardEvent::AssignCategory {
                index,
                category: category.clone(),
            }
        };
        state = state.apply(event, onboarding)?;
    }
    for event in identifiers {
        state = state.apply(event, onboarding)?;
    }

    let unassigned: Vec<&str> = state.unassigned_stages().collect();
    if !unassigned.is_empty() {
        tracing::warn!(stages = ?unassigned, "unmapped stages are left out of the submission");
    }

    state.ready_to_submit()?;
    let payload = state.payload(onboarding);

    if dry_run {
        println!("{}", serde_json::to_string_pretty(payload.fields())?);
        return Ok(());
    }

    let url = config.submit_url()?;
    let client = WebhookClient::new(config.webhooks.clone())?;
    match client.submit(url, &payload).await {
        Ok(receipt) => {
            let state = state.dispatch(WizardEvent::SubmissionSucceeded, onboarding);
            tracing::debug!(step = ?state.step, response = %receipt.data, "wizard reset after submission");
            println!("Client configuration submitted (request {}).", receipt.request_id);
            Ok(())
        }
        Err(err) => {
            let detail = err.detail.clone();
            state = state.dispatch(WizardEvent::SubmissionFailed(err), onboarding);
            let message = state.error.unwrap_or_default();
            match detail {
                Some(detail) => bail!("{message}: {detail}"),
                None => bail!("{message}"),
            }
        }
    }
}

async fn load_clients(path: Option<&Path>, client: &WebhookClient) -> Vec<ClientData> {
    let result = match path {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))
            .and_then(|raw| serde_json::from_str(&raw).context("client list is not JSON"))
            .and_then(webhook::parse_clients_list),
        None => client.fetch_clients().await,
    };
    match result {
        Ok(clients) => clients,
        Err(err) => {
            tracing::warn!(error = %err, "could not load clients");
            Vec::new()
        }
    }
}

async fn portfolio(
    config: &Config,
    clients: Option<&Path>,
    stats: Option<&Path>,
    out: &Path,
) -> anyhow::Result<()> {
    let client = WebhookClient::new(config.webhooks.clone())?;
    let mut portfolio = Portfolio::from_clients(load_clients(clients, &client).await);
    tracing::info!(clients = portfolio.clients().len(), "client list loaded");

    if let Some(path) = stats {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let snapshots: BTreeMap<String, ClientStats> = serde_json::from_str(&raw)
            .with_context(|| format!("{} must map subaccount ids to stats", path.display()))?;
        portfolio
            .refresh(|key| {
                let found = snapshots.get(&key).cloned();
                async move { found.with_context(|| format!("no stats recorded for {key}")) }
            })
            .await;
    } else if client.has_live_stats() {
        portfolio
            .refresh(|key| {
                let client = client.clone();
                async move { client.fetch_live_stats(&key).await }
            })
            .await;
    } else {
        tracing::warn!("no stats source configured, clients remain loading");
    }

    let metrics = portfolio.metrics();
    println!("Executive overview:");
    for line in report::overview_lines(&metrics) {
        println!("- {line}");
    }

    let today = chrono::Local::now().date_naive();
    let report = report::build_report(today, portfolio.clients(), &metrics);
    std::fs::write(out, report).with_context(|| format!("failed to write {}", out.display()))?;
    println!("Report written to {}.", out.display());
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let config = Config::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Stages { csv } => {
            let (_, contents) = read_upload(&csv)?;
            let stages = stages::extract_stages(&contents, &config.onboarding.stage_aliases)?;
            println!("Found {} stages in {}:", stages.len(), csv.display());
            for stage in stages {
                println!("- {stage}");
            }
        }
        Commands::Onboard {
            csv,
            mapping,
            assignments,
            subaccount,
            ad_account,
            calendars,
            dry_run,
        } => {
            let (name, contents) = read_upload(&csv)?;
            let upload = WizardEvent::FileLoaded { name, contents };
            let assignments = load_assignments(mapping.as_deref(), &assignments)?;
            let mut identifiers = vec![
                WizardEvent::SetSubaccount(subaccount),
                WizardEvent::SetAdAccount(ad_account),
            ];
            for raw in &calendars {
                let (name, id) = split_pair(raw)?;
                identifiers.push(WizardEvent::SetCalendar { name, id });
            }
            onboard(&config, upload, assignments, identifiers, dry_run).await?;
        }
        Commands::Portfolio {
            clients,
            stats,
            out,
        } => {
            portfolio(&config, clients.as_deref(), stats.as_deref(), &out).await?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_pair_trims_both_sides() {
        assert_eq!(
            split_pair(" Demo Booked = Demo Set ").unwrap(),
            ("Demo Booked".to_string(), "Demo Set".to_string())
        );
        assert!(split_pair("no-separator").is_err());
    }

    #[test]
    fn cli_parses_onboard_flags() {
        let cli = Cli::try_parse_from([
            "client-ops",
            "onboard",
            "--csv",
            "pipeline.csv",
            "--assign",
            "Closed=Won",
            "--subaccount",
            "sub-1",
            "--ad-account",
            "act-1",
            "--calendar",
            "demo=cal-2",
            "--dry-run",
        ])
        .unwrap();
        match cli.command {
            Commands::Onboard {
                assignments,
                calendars,
                dry_run,
                ..
            } => {
                assert_eq!(assignments, vec!["Closed=Won"]);
                assert_eq!(calendars, vec!["demo=cal-2"]);
                assert!(dry_run);
            }
            _ => panic!("expected onboard"),
        }
    }

    #[test]
    fn assignments_override_mapping_file() {
        let dir = std::env::temp_dir().join(format!("client-ops-{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("mapping.json");
        std::fs::write(&path, r#"{"Closed": "Lost", "Booked": "Demo Set"}"#).unwrap();

        let merged = load_assignments(Some(&path), &["Closed=Won".to_string()]).unwrap();
        assert_eq!(merged.get("Closed").map(String::as_str), Some("Won"));
        assert_eq!(merged.get("Booked").map(String::as_str), Some("Demo Set"));
        std::fs::remove_dir_all(dir).unwrap();
    }

    #[test]
    fn non_csv_upload_is_rejected() {
        assert!(read_upload(Path::new("pipeline.xlsx")).is_err());
    }
}
