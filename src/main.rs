/// tablescout: build and query a table registry from SQL DDL
///
/// Subcommands:
/// - build: run the full pipeline over a DDL script
/// - enrich / batch / retract / seed: layer enrichment onto the registry
/// - lookup / show / select: read the registry and token index
/// - validate: compare the token index with the registry, optionally repair
use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::{non_blocking, rolling};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use tablescout::registry::JoinHint;
use tablescout::selector::TableSelector;
use tablescout::{
    Addition, EnrichmentRequest, Pipeline, RegistryConfig, RegistryWorkspace, SampleQuery,
};

#[derive(Parser)]
#[command(name = "tablescout")]
#[command(about = "Build a searchable table registry from a SQL DDL script", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Scan a DDL script and write schema map, registry and token index
    Build {
        /// DDL script to read
        sql: PathBuf,

        /// Artifact directory
        #[arg(short, long)]
        out_dir: PathBuf,

        /// Configuration file (defaults to <out-dir>/tablescout.toml)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Fail if the written index does not match the registry
        #[arg(long)]
        validate: bool,
    },

    /// Add one alias, neighbor or sample query to a table
    Enrich {
        #[arg(short, long)]
        out_dir: PathBuf,

        /// Table to enrich
        table: String,

        #[command(subcommand)]
        addition: AdditionArg,
    },

    /// Apply a JSON array of enrichment requests
    Batch {
        #[arg(short, long)]
        out_dir: PathBuf,

        /// File holding `[{"table": ..., "kind": ..., ...}]`
        file: PathBuf,
    },

    /// Remove a sample query from a table
    Retract {
        #[arg(short, long)]
        out_dir: PathBuf,

        table: String,

        #[arg(long)]
        query: String,

        /// Join hint as `table=on clause`, repeatable
        #[arg(long = "join", value_parser = parse_join)]
        joins: Vec<JoinHint>,
    },

    /// Add generated starter queries to every table
    Seed {
        #[arg(short, long)]
        out_dir: PathBuf,
    },

    /// Look up tables or columns by token substring
    Lookup {
        #[arg(short, long)]
        out_dir: PathBuf,

        #[arg(value_enum)]
        kind: LookupKind,

        token: String,
    },

    /// Print a registry entry and its columns
    Show {
        #[arg(short, long)]
        out_dir: PathBuf,

        table: String,
    },

    /// Rank tables for a natural-language question
    Select {
        #[arg(short, long)]
        out_dir: PathBuf,

        question: String,

        #[arg(short, long, default_value_t = 5)]
        limit: usize,
    },

    /// Check the token index against the registry
    Validate {
        #[arg(short, long)]
        out_dir: PathBuf,

        /// Rebuild the index when it is inconsistent
        #[arg(long)]
        repair: bool,
    },
}

impl Commands {
    /// Directory for file logs. Read commands log to the console only, and
    /// write commands other than `build` never create the out dir.
    fn log_dir(&self) -> Option<PathBuf> {
        let (out_dir, writes) = match self {
            Commands::Build { out_dir, .. } => return Some(out_dir.join("logs")),
            Commands::Enrich { out_dir, .. }
            | Commands::Batch { out_dir, .. }
            | Commands::Retract { out_dir, .. }
            | Commands::Seed { out_dir }
            | Commands::Validate { out_dir, .. } => (out_dir, true),
            Commands::Lookup { out_dir, .. }
            | Commands::Show { out_dir, .. }
            | Commands::Select { out_dir, .. } => (out_dir, false),
        };
        (writes && out_dir.is_dir()).then(|| out_dir.join("logs"))
    }
}

#[derive(Subcommand)]
enum AdditionArg {
    /// Add an alias
    Alias { alias: String },

    /// Add a related table
    Neighbor { table: String },

    /// Add a sample query
    Sample {
        #[arg(long)]
        query: String,

        #[arg(long)]
        intent: Option<String>,

        #[arg(long, default_value_t = 1.0)]
        confidence: f64,

        /// Join hint as `table=on clause`, repeatable
        #[arg(long = "join", value_parser = parse_join)]
        joins: Vec<JoinHint>,
    },
}

impl From<AdditionArg> for Addition {
    fn from(arg: AdditionArg) -> Self {
        match arg {
            AdditionArg::Alias { alias } => Addition::alias(alias),
            AdditionArg::Neighbor { table } => Addition::neighbor(table),
            AdditionArg::Sample {
                query,
                intent,
                confidence,
                joins,
            } => Addition::SampleQuery(SampleQuery {
                query,
                intent,
                confidence,
                joins,
            }),
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LookupKind {
    Tables,
    Columns,
}

fn parse_join(raw: &str) -> std::result::Result<JoinHint, String> {
    match raw.split_once('=') {
        Some((table, on)) if !table.trim().is_empty() => Ok(JoinHint {
            table: table.trim().to_string(),
            on: on.trim().to_string(),
        }),
        _ => Err(format!("expected `table=on clause`, got `{}`", raw)),
    }
}

/// Console logs go to stderr so stdout stays JSON; file logs, when
/// `logs_dir` is given, roll daily there.
fn init_tracing(logs_dir: Option<&Path>) -> Result<Vec<WorkerGuard>> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("tablescout=info"))
        .context("Invalid log filter")?;

    let mut guards = Vec::new();
    let file_layer = match logs_dir {
        Some(logs_dir) => {
            fs::create_dir_all(logs_dir)
                .with_context(|| format!("Failed to create logs directory {}", logs_dir.display()))?;
            let (non_blocking_file, file_guard) =
                non_blocking(rolling::daily(logs_dir, "tablescout.log"));
            guards.push(file_guard);
            Some(
                fmt::layer()
                    .with_writer(non_blocking_file)
                    .with_target(true)
                    .with_ansi(false)
                    .with_file(true)
                    .with_line_number(true),
            )
        }
        None => None,
    };
    let (non_blocking_console, console_guard) = non_blocking(std::io::stderr());
    guards.push(console_guard);

    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_writer(non_blocking_console)
                .with_target(false)
                .with_ansi(true),
        )
        .with(file_layer)
        .init();

    Ok(guards)
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn open_workspace(out_dir: &Path) -> Result<RegistryWorkspace> {
    RegistryWorkspace::open(out_dir)
        .with_context(|| format!("Failed to open registry workspace at {}", out_dir.display()))
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let _guards = init_tracing(cli.command.log_dir().as_deref())?;
    debug!("tablescout {}", env!("CARGO_PKG_VERSION"));

    match cli.command {
        Commands::Build {
            sql,
            out_dir,
            config,
            validate,
        } => {
            let config = match config {
                Some(path) => RegistryConfig::load(&path)
                    .with_context(|| format!("Failed to load config {}", path.display()))?,
                None => RegistryConfig::load_or_default(&out_dir)?,
            };
            let report = Pipeline::new(config.clone())
                .run_file(&sql, &out_dir)
                .with_context(|| format!("Pipeline failed for {}", sql.display()))?;
            print_json(&report)?;

            if validate {
                RegistryWorkspace::open_with_config(&out_dir, config)?.validate()?;
                info!("Token index validated");
            }
        }

        Commands::Enrich {
            out_dir,
            table,
            addition,
        } => {
            let mut workspace = open_workspace(&out_dir)?;
            let entry = workspace
                .submit_enrichment(&table, &addition.into())
                .with_context(|| format!("Enrichment of '{}' rejected", table))?;
            print_json(&entry)?;
        }

        Commands::Batch { out_dir, file } => {
            let contents = fs::read_to_string(&file)
                .with_context(|| format!("Failed to read {}", file.display()))?;
            let requests: Vec<EnrichmentRequest> = serde_json::from_str(&contents)
                .with_context(|| format!("Failed to parse {}", file.display()))?;

            let mut workspace = open_workspace(&out_dir)?;
            let results = workspace.submit_batch(&requests)?;

            let summary: Vec<serde_json::Value> = requests
                .iter()
                .zip(&results)
                .map(|(request, result)| match result {
                    Ok(_) => serde_json::json!({ "table": request.table, "ok": true }),
                    Err(e) => serde_json::json!({
                        "table": request.table,
                        "ok": false,
                        "error": e.to_string(),
                    }),
                })
                .collect();
            print_json(&summary)?;
        }

        Commands::Retract {
            out_dir,
            table,
            query,
            joins,
        } => {
            let mut workspace = open_workspace(&out_dir)?;
            let entry = workspace.retract_sample_query(&table, &query, &joins)?;
            print_json(&entry)?;
        }

        Commands::Seed { out_dir } => {
            let mut workspace = open_workspace(&out_dir)?;
            let report = workspace.seed_templates()?;
            info!(
                "Seeded {} items ({} sample queries, {} aliases)",
                report.total(),
                report.sample_queries,
                report.aliases
            );
            print_json(&report)?;
        }

        Commands::Lookup {
            out_dir,
            kind,
            token,
        } => {
            let workspace = open_workspace(&out_dir)?;
            match kind {
                LookupKind::Tables => print_json(&workspace.find_tables_by_token(&token)?)?,
                LookupKind::Columns => print_json(&workspace.find_columns_by_token(&token)?)?,
            }
        }

        Commands::Show { out_dir, table } => {
            let workspace = open_workspace(&out_dir)?;
            let entry = workspace.load_entry(&table)?;
            let columns = workspace.load_schema(&table)?;
            print_json(&serde_json::json!({ "entry": entry, "columns": columns }))?;
        }

        Commands::Select {
            out_dir,
            question,
            limit,
        } => {
            let workspace = open_workspace(&out_dir)?;
            let candidates = TableSelector::new(&workspace).select(&question, limit)?;
            print_json(&candidates)?;
        }

        Commands::Validate { out_dir, repair } => {
            let mut workspace = open_workspace(&out_dir)?;
            let report = workspace.check_consistency()?;
            print_json(&report)?;

            if !report.is_consistent() {
                if repair {
                    let version = workspace.repair()?;
                    info!("Token index rebuilt at version {}", version);
                } else {
                    bail!(
                        "Token index inconsistent: {} missing, {} stale (rerun with --repair)",
                        report.missing(),
                        report.stale()
                    );
                }
            }
        }
    }

    Ok(())
}
