use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

mod db;
mod input;
mod models;
mod pipeline;
mod recommend;
mod report;
mod stats;
mod store;
mod validate;

use models::{AnalysisSummary, COMMENTS_COL};
use pipeline::Pipeline;
use store::{MemoryStore, SheetStore, SURVEY_TABLE};

#[derive(Parser)]
#[command(name = "survey-results-analyser")]
#[command(about = "Collect survey responses and track satisfaction trends", long_about = None)]
struct Cli {
    /// Postgres connection string
    #[arg(long, env = "DATABASE_URL", global = true, hide_env_values = true)]
    database_url: Option<String>,

    /// Work on an in-memory copy of the sample data instead of Postgres
    #[arg(long, global = true)]
    dry_run: bool,

    /// Enable debug logging (RUST_LOG takes precedence)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the storage schema and table headers
    InitDb,
    /// Load sample survey responses
    Seed,
    /// Import survey responses from a CSV file
    Import {
        #[arg(long)]
        csv: PathBuf,
    },
    /// Record one response, then refresh trends and recommendations
    Submit {
        /// Seven comma-separated values; prompts on stdin when omitted
        #[arg(long)]
        data: Option<String>,
    },
    /// Refresh trends and recommendations from stored responses
    Analyze {
        #[arg(long)]
        json: bool,
    },
    /// Generate a markdown report
    Report {
        #[arg(long, default_value = "survey_report.md")]
        out: PathBuf,
        #[arg(long, default_value_t = 5)]
        comments: usize,
    },
    /// Show the latest values of one survey column
    Recent {
        #[arg(long, default_value_t = COMMENTS_COL)]
        column: usize,
        #[arg(long, default_value_t = 5)]
        count: usize,
    },
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .init();
}

async fn connect(database_url: Option<&str>) -> anyhow::Result<PgPool> {
    let database_url =
        database_url.context("DATABASE_URL must be set to a production Postgres instance")?;

    PgPoolOptions::new()
        .max_connections(5)
        .connect(database_url)
        .await
        .context("failed to connect to Postgres")
}

fn print_summary(summary: &AnalysisSummary) {
    let Some(average) = summary.average else {
        println!("No valid survey responses yet.");
        return;
    };

    println!("Average satisfaction: {average:.2} across {} responses", summary.rows_read);
    if !summary.monthly_averages.is_empty() {
        println!("Monthly averages:");
        for (month, avg) in summary.monthly_averages.iter() {
            println!("- {month}: {avg:.2}");
        }
    }
    if !summary.monthly_differences.is_empty() {
        println!("Month-over-month change:");
        for (month, diff) in summary.monthly_differences.iter() {
            println!("- {month}: {diff:+.2}");
        }
    }
    match &summary.recommendation {
        Some(text) => println!("Recommendation: {text}"),
        None => println!("No recommendation: no dissatisfied responses."),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    debug!(dry_run = cli.dry_run, "starting");

    let mut pool = None;
    let store: Box<dyn SheetStore> = if cli.dry_run {
        let memory = MemoryStore::with_headers();
        db::seed(&memory).await?;
        info!("using in-memory sample data");
        Box::new(memory)
    } else {
        let connected = connect(cli.database_url.as_deref()).await?;
        pool = Some(connected.clone());
        Box::new(db::PgStore::new(connected))
    };
    let store = store.as_ref();

    match cli.command {
        Commands::InitDb => {
            let pool = pool.context("init-db needs a database; run without --dry-run")?;
            db::init_db(&pool, store).await?;
            println!("Schema ready.");
        }
        Commands::Seed => {
            let inserted = db::seed(store).await?;
            println!("Inserted {inserted} sample responses.");
        }
        Commands::Import { csv } => {
            let inserted = db::import_csv(store, &csv).await?;
            println!("Inserted {inserted} responses from {}.", csv.display());
        }
        Commands::Submit { data } => {
            let record = match data {
                Some(line) => input::parse_line(&line).context("invalid survey data")?,
                None => {
                    println!("Welcome to Survey Data Analysis");
                    let stdin = std::io::stdin();
                    match input::prompt_for_record(stdin.lock(), std::io::stdout())? {
                        Some(record) => record,
                        None => {
                            println!("No survey data entered.");
                            return Ok(());
                        }
                    }
                }
            };
            let summary = Pipeline::new(store).submit(&record).await?;
            print_summary(&summary);
        }
        Commands::Analyze { json } => {
            let summary = Pipeline::new(store).analyze().await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&summary)?);
            } else {
                print_summary(&summary);
            }
        }
        Commands::Report { out, comments } => {
            let rows = store.read_body(SURVEY_TABLE).await?;
            let summary = pipeline::summarize(&rows);
            let tally = recommend::tally_features(&rows);
            let recent = store
                .read_column_tail(SURVEY_TABLE, COMMENTS_COL, comments)
                .await?;
            let report = report::build_report(&summary, &tally, &recent);
            std::fs::write(&out, report)
                .with_context(|| format!("failed to write {}", out.display()))?;
            println!("Report written to {}.", out.display());
        }
        Commands::Recent { column, count } => {
            let values = store.read_column_tail(SURVEY_TABLE, column, count).await?;
            if values.is_empty() {
                println!("No responses recorded.");
            }
            for value in values {
                println!("- {value}");
            }
        }
    }

    Ok(())
}
