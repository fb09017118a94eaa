//! ledger-audit - command line interface for audit ledgers
//!
//! Appends to, lists and exports a SQLite-backed ledger, and verifies
//! exported ledgers offline without access to the database.

use anyhow::Context;
use clap::{Parser, Subcommand};
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use audit_ledger::core::{
    decode_entries_json, decode_entries_jsonl, encode_entries_jsonl, inspect_chain,
    inspect_from_genesis, inspect_linkage, VerifyError,
};
use audit_ledger::store::SqliteStore;
use audit_ledger::{
    Action, Actor, AuditEntry, AuditTrail, ChainReport, ChainVerdict, ChangeSet, FraudVerdict,
    Ledger, LedgerConfig, RecordId,
};

/// Exit code for a ledger that failed verification.
const EXIT_INVALID: i32 = 1;
/// Exit code for input that could not be read as audit entries.
const EXIT_MALFORMED: i32 = 2;

#[derive(Parser)]
#[command(name = "ledger-audit")]
#[command(about = "Append to, export and verify tamper-evident audit ledgers")]
#[command(version)]
struct Cli {
    /// Path to the ledger database
    #[arg(short, long, default_value = "audit.db")]
    database: PathBuf,

    /// Output format (json or text)
    #[arg(short, long, default_value = "json")]
    format: OutputFormat,

    /// JSON file with ledger configuration
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Enable debug logging (overridden by RUST_LOG)
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
enum OutputFormat {
    Json,
    Text,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
enum VerifyMode {
    /// Predecessor links only
    Linkage,
    /// Links and recomputed digests
    Full,
}

#[derive(Subcommand)]
enum Commands {
    /// Verify an exported ledger (JSON array or JSON Lines)
    Verify {
        /// The exported file, or "-" for stdin
        file: PathBuf,
        /// How much to check
        #[arg(short, long, default_value = "full")]
        mode: VerifyMode,
        /// Also require the first entry to be a genesis entry
        #[arg(long)]
        from_genesis: bool,
    },

    /// Append an entry to a record's ledger
    Append {
        /// The record ID
        record: String,
        /// Changes as a JSON object
        changes: String,
        /// Action tag (create, update, verify, delete, or any other word)
        #[arg(short, long, default_value = "update")]
        action: String,
        /// Actor name
        #[arg(long)]
        actor: Option<String>,
        /// Actor email
        #[arg(long)]
        email: Option<String>,
        /// Mark the mutation as suspected fraud, with this reason
        #[arg(long)]
        flag: Option<String>,
    },

    /// Show a record's ledger and its verification result
    Show {
        /// The record ID
        record: String,
    },

    /// Export a record's ledger as JSON Lines
    Export {
        /// The record ID
        record: String,
        /// Output file (stdout if omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// List records and their entry counts
    Records,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::Verify {
            ref file,
            mode,
            from_genesis,
        } => {
            let entries = match load_entries(file) {
                Ok(entries) => entries,
                Err(e) => {
                    output(
                        cli.format,
                        &serde_json::json!({
                            "status": "malformed",
                            "message": e.to_string()
                        }),
                    );
                    std::process::exit(EXIT_MALFORMED);
                }
            };
            info!(entries = entries.len(), "loaded exported ledger");

            let report = match check(&entries, mode, from_genesis) {
                Ok(report) => report,
                Err(e) => {
                    output(
                        cli.format,
                        &serde_json::json!({
                            "status": "malformed",
                            "message": e.to_string()
                        }),
                    );
                    std::process::exit(EXIT_MALFORMED);
                }
            };

            output_report(cli.format, &report, &entries);
            if !report.is_intact() {
                std::process::exit(EXIT_INVALID);
            }
        }

        Commands::Append {
            ref record,
            ref changes,
            ref action,
            ref actor,
            ref email,
            ref flag,
        } => {
            let ledger = open_ledger(&cli.database, cli.config.as_deref())?;
            let json: serde_json::Value =
                serde_json::from_str(changes).context("changes must be a JSON object")?;
            let changes = ChangeSet::from_json(json)?;
            let actor = match (actor, email) {
                (None, None) => None,
                (name, email) => Some(Actor {
                    id: None,
                    name: name.clone(),
                    email: email.clone(),
                }),
            };
            let verdict = match flag {
                Some(reason) => FraudVerdict::flagged(reason.as_str()),
                None => FraudVerdict::Clean,
            };

            let entry = ledger
                .append(
                    &RecordId::new(record.as_str()),
                    Action::from(action.as_str()),
                    actor,
                    changes,
                    verdict,
                )
                .await?;
            output_entry(cli.format, &entry);
        }

        Commands::Show { ref record } => {
            let ledger = open_ledger(&cli.database, cli.config.as_deref())?;
            let (trail, report) = show_record(&ledger, &RecordId::new(record.as_str())).await?;
            output_report(cli.format, &report, trail.as_slice());
        }

        Commands::Export {
            ref record,
            output: ref destination,
        } => {
            let ledger = open_ledger(&cli.database, cli.config.as_deref())?;
            let trail = ledger.read(&RecordId::new(record.as_str())).await?;
            match destination {
                Some(path) => {
                    let file = File::create(path)
                        .with_context(|| format!("creating {}", path.display()))?;
                    let mut writer = BufWriter::new(file);
                    encode_entries_jsonl(trail.as_slice(), &mut writer)?;
                    writer.flush()?;
                    info!(entries = trail.len(), path = %path.display(), "exported ledger");
                }
                None => {
                    let stdout = std::io::stdout();
                    let mut writer = stdout.lock();
                    encode_entries_jsonl(trail.as_slice(), &mut writer)?;
                    writer.flush()?;
                }
            }
        }

        Commands::Records => {
            let ledger = open_ledger(&cli.database, cli.config.as_deref())?;
            let mut items = Vec::new();
            for record in ledger.records().await? {
                let count = ledger.len(&record).await?;
                items.push(serde_json::json!({
                    "record": record.to_string(),
                    "entries": count
                }));
            }
            output(
                cli.format,
                &serde_json::json!({
                    "count": items.len(),
                    "records": items
                }),
            );
        }
    }

    Ok(())
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn open_ledger(database: &Path, config: Option<&Path>) -> anyhow::Result<Ledger<SqliteStore>> {
    let config = match config {
        Some(path) => LedgerConfig::load(path)?,
        None => LedgerConfig::default(),
    };
    debug!(?config, database = %database.display(), "opening ledger");
    let store = SqliteStore::open(database)
        .with_context(|| format!("opening {}", database.display()))?;
    Ok(Ledger::with_config(store, config))
}

/// Read an export: a JSON array if the text opens with `[`, JSON Lines otherwise.
fn load_entries(path: &Path) -> Result<Vec<AuditEntry>, VerifyError> {
    let text = if path.as_os_str() == "-" {
        std::io::read_to_string(std::io::stdin())?
    } else {
        std::io::read_to_string(BufReader::new(File::open(path)?))?
    };

    if text.trim_start().starts_with('[') {
        decode_entries_json(&text)
    } else {
        decode_entries_jsonl(text.as_bytes())
    }
}

fn check(
    entries: &[AuditEntry],
    mode: VerifyMode,
    from_genesis: bool,
) -> Result<ChainReport, VerifyError> {
    match mode {
        VerifyMode::Full if from_genesis => inspect_from_genesis(entries),
        VerifyMode::Full => inspect_chain(entries),
        VerifyMode::Linkage => {
            let starts_at_genesis = entries.first().map_or(true, AuditEntry::is_genesis);
            if from_genesis && !starts_at_genesis {
                return Ok(ChainReport {
                    entries: entries.len(),
                    verdict: ChainVerdict::MissingGenesis,
                });
            }
            Ok(inspect_linkage(entries))
        }
    }
}

/// A record's entries and their from-genesis verdict. An unknown record is an
/// empty, intact ledger.
async fn show_record(
    ledger: &Ledger<SqliteStore>,
    record: &RecordId,
) -> anyhow::Result<(AuditTrail, ChainReport)> {
    let trail = ledger.read(record).await?;
    let report = ledger.verify(record).await?;
    debug!(record = %record, entries = trail.len(), "loaded ledger for display");
    Ok((trail, report))
}

fn output(format: OutputFormat, value: &serde_json::Value) {
    match format {
        OutputFormat::Json => println!("{value}"),
        OutputFormat::Text => {
            println!(
                "{}",
                serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
            );
        }
    }
}

fn output_entry(format: OutputFormat, entry: &AuditEntry) {
    match format {
        OutputFormat::Json => {
            output(format, &serde_json::to_value(entry).unwrap_or_default());
        }
        OutputFormat::Text => println!("{}", entry.summary()),
    }
}

fn output_report(format: OutputFormat, report: &ChainReport, entries: &[AuditEntry]) {
    match format {
        OutputFormat::Json => output(
            format,
            &serde_json::json!({
                "valid": report.is_intact(),
                "report": report,
                "head": entries.last().map(|e| e.hash.to_hex()),
                "entries": entries
            }),
        ),
        OutputFormat::Text => {
            let failing = report.verdict.failing_index();
            for (i, entry) in entries.iter().enumerate() {
                let marker = if failing == Some(i) { "!" } else { " " };
                println!("{marker} {}", entry.summary());
                if let Some(reason) = entry.verdict().reason() {
                    println!("    flagged: {reason}");
                }
            }
            println!("{} entries: {}", report.entries, report.verdict);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use audit_ledger::core::EntryBuilder;

    fn chain(n: u64) -> Vec<AuditEntry> {
        let record = RecordId::new("prop-cli");
        let mut entries: Vec<AuditEntry> = Vec::new();
        for seq in 1..=n {
            let entry = EntryBuilder::new(record.clone(), seq)
                .action(Action::Update)
                .changes(ChangeSet::new().with("step", seq as i64))
                .prev_opt(entries.last().map(|e| e.hash))
                .build()
                .unwrap();
            entries.push(entry);
        }
        entries
    }

    #[test]
    fn test_suffix_passes_unless_genesis_required() {
        let entries = chain(3);
        let suffix = &entries[1..];

        assert!(check(suffix, VerifyMode::Linkage, false).unwrap().is_intact());
        assert!(check(suffix, VerifyMode::Full, false).unwrap().is_intact());
        assert_eq!(
            check(suffix, VerifyMode::Linkage, true).unwrap().verdict,
            ChainVerdict::MissingGenesis
        );
        assert_eq!(
            check(suffix, VerifyMode::Full, true).unwrap().verdict,
            ChainVerdict::MissingGenesis
        );
    }

    #[test]
    fn test_linkage_mode_ignores_content_edits() {
        let mut entries = chain(3);
        entries[1].changes.insert("step", 99);

        assert!(check(&entries, VerifyMode::Linkage, true).unwrap().is_intact());
        assert_eq!(
            check(&entries, VerifyMode::Full, true).unwrap().verdict,
            ChainVerdict::DigestMismatch { index: 1 }
        );
    }

    #[test]
    fn test_load_entries_accepts_both_layouts() {
        let entries = chain(2);
        let dir = tempfile::tempdir().unwrap();
        let dir = dir.path();

        let array = dir.join("export.json");
        std::fs::write(&array, serde_json::to_string(&entries).unwrap()).unwrap();
        assert_eq!(load_entries(&array).unwrap(), entries);

        let lines = dir.join("export.jsonl");
        let mut buf = Vec::new();
        encode_entries_jsonl(&entries, &mut buf).unwrap();
        std::fs::write(&lines, buf).unwrap();
        assert_eq!(load_entries(&lines).unwrap(), entries);

        let broken = dir.join("broken.jsonl");
        std::fs::write(&broken, "{not json}\n").unwrap();
        assert!(matches!(
            load_entries(&broken),
            Err(VerifyError::Malformed { line: 1, .. })
        ));
    }

    #[test]
    fn test_linkage_mode_reports_broken_link_not_content() {
        let mut entries = chain(3);
        entries[0].changes.insert("step", 99);
        entries.remove(1);

        assert_eq!(
            check(&entries, VerifyMode::Linkage, false).unwrap().verdict,
            ChainVerdict::BrokenLink { index: 1 }
        );
    }

    #[test]
    fn test_linkage_mode_never_encodes_changes() {
        let mut entries = chain(3);
        entries[1].changes.insert(audit_ledger::core::PREV_HASH_KEY, "forged");

        assert!(check(&entries, VerifyMode::Linkage, false).unwrap().is_intact());
        assert!(matches!(
            check(&entries, VerifyMode::Full, false),
            Err(VerifyError::Unencodable { index: 1, .. })
        ));
    }

    #[tokio::test]
    async fn test_show_unknown_record_is_empty_and_intact() {
        let ledger = Ledger::new(SqliteStore::open_memory().unwrap());
        let (trail, report) = show_record(&ledger, &RecordId::new("prop-none")).await.unwrap();

        assert!(trail.is_empty());
        assert_eq!(report.entries, 0);
        assert!(report.is_intact());
    }
}
