//! proctorchain: administrative CLI for the proctoring event ledger.
//!
//! Opens the ledger named by a TOML config (or the defaults in the working
//! directory) and runs one maintenance or inspection command.
//!
//! Usage:
//!   cargo run -p proctorchain-demo -- simulate --events 25
//!   cargo run -p proctorchain-demo -- verify
//!   cargo run -p proctorchain-demo -- stats
//!   cargo run -p proctorchain-demo -- --config ledger.toml export audit/chain.json

use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use proctorchain_contracts::{
    error::{LedgerError, LedgerResult},
    event::Severity,
};
use proctorchain_core::block_hash;
use proctorchain_ledger::{read_chain_export, verify_export, Ledger, LedgerConfig};
use proctorchain_session::{EmotionFlags, Evidence, ProctorSession};

// ── CLI definition ────────────────────────────────────────────────────────────

/// proctorchain: tamper-evident proctoring event ledger.
#[derive(Parser)]
#[command(
    name = "proctorchain",
    about = "Inspect and maintain the proctoring event ledger",
    long_about = "Inspect and maintain the proctoring event ledger: simulate detector\n\
                  traffic, verify chain integrity and signatures, query events,\n\
                  export audit documents, and clean up old screenshots."
)]
struct Cli {
    /// Ledger configuration file (TOML).  Defaults apply when omitted.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Log synthetic detector events for one session and mine them.
    Simulate {
        /// Number of events to log.
        #[arg(long, default_value_t = 25)]
        events: usize,

        /// Session id to log under; a fresh one is generated when omitted.
        #[arg(long)]
        session: Option<String>,
    },
    /// Verify chain linkage, proof-of-work, Merkle roots, and signatures.
    Verify,
    /// Print ledger statistics as JSON.
    Stats,
    /// Print one block as JSON.
    Block {
        index: u64,
    },
    /// List committed events, newest first.
    Events {
        /// Event type to match, or "all".
        #[arg(long = "type", default_value = "all")]
        event_type: String,

        /// Only events of this severity (low, medium, high, critical).
        #[arg(long)]
        severity: Option<Severity>,

        /// Only events of this exam session.
        #[arg(long)]
        session: Option<String>,

        #[arg(long, default_value_t = 100)]
        limit: usize,
    },
    /// Write the whole chain to a JSON audit document.
    Export {
        path: PathBuf,
    },
    /// Re-verify a previously exported chain document.
    CheckExport {
        path: PathBuf,
    },
    /// Write one session's events to a JSON document.
    ExportSession {
        session: String,
        path: PathBuf,
    },
    /// Delete screenshot files of events older than the given age.
    Cleanup {
        #[arg(long, default_value_t = 30)]
        days: u32,
    },
}

// ── Entry point ───────────────────────────────────────────────────────────────

fn main() {
    // Initialize structured logging.  Set RUST_LOG=info for mining progress.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_target(false)
        .compact()
        .init();

    let cli = Cli::parse();

    match run(cli) {
        Ok(true) => {}
        Ok(false) => std::process::exit(1),
        Err(e) => {
            eprintln!("proctorchain error: {}", e);
            std::process::exit(2);
        }
    }
}

/// Returns `Ok(false)` when a check ran and failed.
fn run(cli: Cli) -> LedgerResult<bool> {
    let config = match &cli.config {
        Some(path) => LedgerConfig::from_file(path)?,
        None => LedgerConfig::default(),
    };

    // check-export needs no database or keys.
    if let Command::CheckExport { path } = &cli.command {
        return check_export(path, config.difficulty);
    }

    let ledger = Arc::new(Ledger::open(&config)?);
    match cli.command {
        Command::Simulate { events, session } => simulate(ledger, events, session),
        Command::Verify => verify(&ledger),
        Command::Stats => print_json(&ledger.get_statistics()?),
        Command::Block { index } => show_block(&ledger, index),
        Command::Events {
            event_type,
            severity,
            session,
            limit,
        } => {
            let events = match (severity, session) {
                (Some(severity), _) => ledger.get_events_by_severity(severity, limit)?,
                (None, Some(session)) => ledger.get_events_by_session(&session, limit)?,
                (None, None) => ledger.get_events_by_type(&event_type, limit)?,
            };
            print_json(&events)
        }
        Command::Export { path } => {
            let metadata = ledger.export_chain(&path)?;
            println!(
                "Exported {} blocks ({} events) to {}",
                metadata.total_blocks,
                metadata.total_events,
                path.display()
            );
            Ok(true)
        }
        Command::ExportSession { session, path } => {
            let export = ProctorSession::with_session_id(ledger, session).export_session_logs(&path)?;
            println!(
                "Exported {} events of session {} to {}",
                export.total_events,
                export.session_id,
                path.display()
            );
            Ok(true)
        }
        Command::Cleanup { days } => {
            let report = ledger.cleanup_old_screenshots(days)?;
            println!(
                "Screenshots older than {} days: {} referenced, {} removed, {} already gone, {} failed",
                days, report.examined, report.removed, report.missing, report.failed
            );
            Ok(report.failed == 0)
        }
        Command::CheckExport { .. } => Ok(true),
    }
}

// ── Commands ──────────────────────────────────────────────────────────────────

fn simulate(ledger: Arc<Ledger>, events: usize, session: Option<String>) -> LedgerResult<bool> {
    let session = match session {
        Some(id) => ProctorSession::with_session_id(ledger, id),
        None => ProctorSession::new(ledger),
    };
    println!("Simulating {} detections for session {}", events, session.session_id());

    let mut rejected = 0usize;
    for i in 0..events {
        // Spread confidences over 0.35..0.95 so every severity shows up.
        let confidence = 0.35 + ((i * 37) % 60) as f64 / 100.0;
        let evidence = Evidence::none().with_metadata("frame", i as u64);
        let logged = match i % 6 {
            0 => session.log_head_misalignment("left", confidence, evidence),
            1 => session.log_eye_misalignment("down", confidence, evidence),
            2 => session.log_mobile_detection(confidence, evidence),
            3 => session.log_lip_movement("moving", i % 4 == 3, confidence, evidence),
            4 => session.log_emotion_detection(
                "fear",
                EmotionFlags {
                    fear: confidence > 0.8,
                    ..EmotionFlags::default()
                },
                confidence,
                evidence,
            ),
            _ => session.log_custom_event(
                "tab_switch",
                "Exam window lost focus",
                Severity::Medium,
                confidence,
                evidence,
            ),
        };
        if !logged {
            rejected += 1;
        }
    }

    // Pending events live only in this process; seal them before exiting.
    if let Some(receipt) = session.flush_pending()? {
        println!(
            "Flushed block {} with {} events (nonce {})",
            receipt.index, receipt.event_count, receipt.nonce
        );
    }

    let stats = session.session_statistics()?;
    info!(
        session_id = %stats.session_id,
        committed = stats.total_session_events,
        rejected,
        "simulation finished"
    );
    println!(
        "Session holds {} committed events; {} rejected",
        stats.total_session_events, rejected
    );
    Ok(rejected == 0)
}

fn verify(ledger: &Ledger) -> LedgerResult<bool> {
    let blocks = ledger.chain_length()?;
    let chain = ledger.check_chain()?;
    let signatures = ledger.verify_signatures()?;

    match &chain {
        Ok(()) => println!("Chain:      OK ({} blocks, difficulty {})", blocks, ledger.difficulty()),
        Err(violation) => println!("Chain:      FAILED: {}", violation),
    }
    println!("Signatures: {}", if signatures { "OK" } else { "FAILED" });

    Ok(chain.is_ok() && signatures)
}

fn show_block(ledger: &Ledger, index: u64) -> LedgerResult<bool> {
    let block = ledger.get_block(index)?.ok_or_else(|| LedgerError::NotFound {
        what: format!("block {}", index),
    })?;
    println!("hash: {}", block_hash(&block)?);
    print_json(&block)
}

fn check_export(path: &Path, difficulty: usize) -> LedgerResult<bool> {
    let export = read_chain_export(path)?;
    match verify_export(&export, difficulty) {
        Ok(()) => {
            println!(
                "{}: OK ({} blocks, {} events)",
                path.display(),
                export.blocks.len(),
                export.metadata.total_events
            );
            Ok(true)
        }
        Err(violation) => {
            println!("{}: FAILED: {}", path.display(), violation);
            Ok(false)
        }
    }
}

fn print_json<T: serde::Serialize>(value: &T) -> LedgerResult<bool> {
    let json = serde_json::to_string_pretty(value).map_err(|e| LedgerError::Serialization {
        reason: e.to_string(),
    })?;
    println!("{}", json);
    Ok(true)
}
