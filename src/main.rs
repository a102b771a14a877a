use std::process;

use anyhow::Context;
use anyhow::Result;
use clap::Parser;
use serde::Serialize;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::FmtSubscriber;
use walletforge::api::export::AggregateStats;
use walletforge::api::export::GenerateRequest;
use walletforge::api::export::GenerateResponse;
use walletforge::api::export::ListPolicy;
use walletforge::api::export::SecretEncoding;
use walletforge::api::export::WalletForge;
use walletforge::api::export::WalletRecord;
use walletforge::application::config::cli_args;
use walletforge::application::config::cli_args::Command;

pub fn main() -> Result<()> {
    let tokio_runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_io()
        .enable_time()
        .build()
        .context("Could not create tokio runtime")?;

    let run_result = tokio_runtime.block_on(async {
        let args = cli_args::Args::parse();
        set_up_logger();

        let forge = walletforge::initialize(&args).await?;
        run(&forge, &args).await
    });

    tokio_runtime.shutdown_timeout(tokio::time::Duration::from_secs(10));

    if let Err(e) = run_result {
        eprintln!("error: {e:#}");
        process::exit(1);
    }
    Ok(())
}

/// Configure logger to use ISO-8601, of which rfc3339 is a subset. Install
/// global collector configured based on RUST_LOG env var. Logs go to stderr
/// so stdout carries only command output.
fn set_up_logger() {
    let installed = tracing::subscriber::set_global_default(
        FmtSubscriber::builder()
            .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
            .with_env_filter(
                EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
            )
            .with_thread_ids(true)
            .with_writer(std::io::stderr)
            .finish(),
    );
    if installed.is_err() {
        eprintln!("Unable to set global default subscriber");
    }
}

async fn run(forge: &WalletForge, args: &cli_args::Args) -> Result<()> {
    let encoding = args.encoding;

    match &args.command {
        Command::Generate {
            count,
            prefix,
            no_save,
            show_secrets,
            json,
        } => {
            let request = GenerateRequest::new(*count, prefix.clone());
            let batch = if *no_save {
                forge
                    .preview_batch_at(&request, chrono::Utc::now())
                    .await?
            } else {
                forge.generate_batch(&request).await?
            };

            if *show_secrets {
                let views = batch
                    .records()
                    .iter()
                    .map(|r| SecretView::new(r, encoding))
                    .collect::<Result<Vec<_>>>()?;
                print_records(&views, *json)?;
            } else if *json {
                println!(
                    "{}",
                    serde_json::to_string_pretty(&GenerateResponse::from(&batch))?
                );
            } else {
                println!("batch {} ({} wallets)", batch.id(), batch.len());
                for summary in batch.summaries() {
                    println!("{}  {}", summary.id, summary.public_key);
                }
            }
            if *no_save {
                eprintln!("not saved");
            }
        }
        Command::List { show_secrets, json } => {
            let policy = if *show_secrets {
                ListPolicy::Full
            } else {
                ListPolicy::Redacted
            };
            let records = forge.list(policy).await?;
            let views = records
                .iter()
                .map(|r| SecretView::new(r, encoding))
                .collect::<Result<Vec<_>>>()?;
            print_records(&views, *json)?;
        }
        Command::Get { id, json } => {
            let record = forge.get(id, ListPolicy::Full).await?;
            print_records(&[SecretView::new(&record, encoding)?], *json)?;
        }
        Command::Delete { id } => {
            forge.delete(id).await?;
            println!("deleted {id}");
        }
        Command::Stats { json } => {
            let stats = forge.stats().await?;
            if *json {
                println!("{}", serde_json::to_string_pretty(&StatsView::from(&stats))?);
            } else {
                print_stats(&stats);
            }
        }
        Command::Recover {
            words,
            save,
            prefix,
        } => {
            let phrase = words.join(" ");
            let batch = forge.recover(&phrase, prefix.clone(), *save).await?;
            for summary in batch.summaries() {
                println!("{}  {}", summary.id, summary.public_key);
            }
            if !*save {
                eprintln!("not saved");
            }
        }
        Command::Batches { limit } => {
            for batch in forge.recent_batches(*limit).await? {
                println!(
                    "{}  {}  {} wallets{}",
                    batch.id(),
                    batch.created_at().to_rfc3339(),
                    batch.count(),
                    batch
                        .prefix()
                        .map(|p| format!("  [{p}]"))
                        .unwrap_or_default()
                );
            }
        }
        Command::Audit { repair } => {
            let report = if *repair {
                forge.reconcile().await?
            } else {
                forge.audit().await?
            };
            println!("{}", serde_json::to_string_pretty(&report)?);
            if !*repair && !report.is_consistent() {
                eprintln!("store is inconsistent; run `audit --repair` to fix the counters");
            }
        }
        Command::Verify { id } => {
            if forge.verify(id).await? {
                println!("{id}: ok");
            } else {
                anyhow::bail!("{id}: private key does not match the seed phrase");
            }
        }
    }

    Ok(())
}

/// A record as printed, with the private key in the requested encoding.
/// Redacted records keep their secrets empty.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SecretView<'a> {
    id: &'a str,
    public_key: &'a str,
    #[serde(skip_serializing_if = "String::is_empty")]
    private_key: String,
    #[serde(skip_serializing_if = "str::is_empty")]
    mnemonic: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    prefix: Option<&'a str>,
    created_at: String,
}

impl<'a> SecretView<'a> {
    fn new(record: &'a WalletRecord, encoding: SecretEncoding) -> Result<Self> {
        let private_key = if record.is_redacted() {
            String::new()
        } else {
            record.private_key_as(encoding)?
        };
        Ok(Self {
            id: &record.id,
            public_key: &record.public_key,
            private_key,
            mnemonic: &record.seed_phrase,
            prefix: record.prefix.as_deref(),
            created_at: record
                .created_at
                .to_rfc3339_opts(chrono::SecondsFormat::Millis, true),
        })
    }
}

fn print_records(views: &[SecretView<'_>], json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(views)?);
        return Ok(());
    }
    for view in views {
        println!("{}  {}  {}", view.id, view.created_at, view.public_key);
        if let Some(prefix) = view.prefix {
            println!("    prefix:      {prefix}");
        }
        if !view.private_key.is_empty() {
            println!("    private key: {}", view.private_key);
        }
        if !view.mnemonic.is_empty() {
            println!("    seed phrase: {}", view.mnemonic);
        }
    }
    Ok(())
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct StatsView<'a> {
    #[serde(flatten)]
    stats: &'a AggregateStats,
    database_size: String,
}

impl<'a> From<&'a AggregateStats> for StatsView<'a> {
    fn from(stats: &'a AggregateStats) -> Self {
        Self {
            stats,
            database_size: stats.database_size(),
        }
    }
}

fn print_stats(stats: &AggregateStats) {
    println!("total wallets:   {}", stats.total_wallets);
    println!("generated today: {}", stats.wallets_generated_today);
    println!(
        "last generated:  {}",
        stats
            .last_generated_at
            .map(|t| t.to_rfc3339())
            .unwrap_or_else(|| "never".to_string())
    );
    println!("database size:   {}", stats.database_size());
    if !stats.counters_agree() {
        println!(
            "warning: counter says {} but the index holds {}",
            stats.total_wallets, stats.indexed_wallets
        );
    }
}
