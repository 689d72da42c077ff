use std::{path::PathBuf, process::ExitCode, str::FromStr};

use clap::{Parser, Subcommand};
use log::{error, LevelFilter};
use serde::Serialize;
use simplelog::{ColorChoice, ConfigBuilder, TermLogger, TerminalMode};
use time::{format_description::well_known::Rfc3339, OffsetDateTime};

use api::{
    clock::SystemClock,
    csv_processor,
    db::SqliteRepository,
    err::{CustomError, Result},
    AppState,
};

mod api;

#[derive(Parser)]
#[command(name = "student-stats")]
#[command(about = "Aggregate statistics over student records")]
struct Cli {
    /// SQLite database file used to load and save students
    #[arg(long, env = "STUDENT_STATS_DATABASE")]
    database: Option<PathBuf>,

    /// CSV file with seed students, used by `seed` and when the database is empty or absent
    #[arg(long, env = "STUDENT_STATS_SEED_CSV")]
    seed_csv: Option<PathBuf>,

    /// Log level (error, warn, info, debug, trace, off)
    #[arg(long, env = "STUDENT_STATS_LOG_LEVEL", default_value = "warn")]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Students per class and country, average age and average record age
    Stats {
        /// Evaluate as of this RFC 3339 instant instead of now
        #[arg(long)]
        as_of: Option<String>,
    },
    /// Print every student record
    List,
    /// Append " (Updated)" to the named students and save
    Update {
        #[arg(required = true)]
        ids: Vec<i64>,
    },
    /// Replace the stored students with the seed (--seed-csv or the built-in one)
    Seed,
    /// Print the classes and countries lookup tables
    Catalog,
}

#[derive(Serialize)]
struct Catalog {
    classes: Vec<api::db::ClassInfo>,
    countries: Vec<api::db::CountryInfo>,
}

#[tokio::main]
async fn main() -> ExitCode {
    // a missing .env file is fine
    dotenv::dotenv().ok();
    let cli = Cli::parse();

    if let Err(e) = init_logger(&cli.log_level) {
        eprintln!("{}", e);
        return ExitCode::FAILURE;
    }

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn init_logger(level: &str) -> Result<()> {
    let level = LevelFilter::from_str(level)
        .map_err(|_| CustomError::ConfigError(format!("unknown log level: {}", level)))?;
    let config = ConfigBuilder::new().set_time_format_rfc3339().build();
    TermLogger::init(level, config, TerminalMode::Stderr, ColorChoice::Auto)
        .map_err(|e| CustomError::ConfigError(e.to_string()))
}

async fn run(cli: Cli) -> Result<()> {
    let repository = match &cli.database {
        Some(path) => Some(SqliteRepository::open(path).await?),
        None => None,
    };
    let seed = match &cli.seed_csv {
        Some(path) => csv_processor::read_seed_csv(path)?,
        None => csv_processor::default_seed(),
    };

    let state = AppState::new(SystemClock, repository)?;

    match cli.command {
        Command::Stats { as_of } => {
            state.initialize(seed).await?;
            let stats = match as_of {
                Some(as_of) => {
                    let as_of = OffsetDateTime::parse(&as_of, &Rfc3339).map_err(|_| {
                        CustomError::ConfigError(format!("--as-of is not an RFC 3339 instant: {}", as_of))
                    })?;
                    state.statistics_as_of(as_of).await?
                }
                None => state.statistics().await?,
            };
            print_json(&stats)
        }
        Command::List => {
            state.initialize(seed).await?;
            print_json(state.students().await.as_slice())
        }
        Command::Update { ids } => {
            state.initialize(seed).await?;
            let mut updated = Vec::with_capacity(ids.len());
            for id in ids {
                updated.push(state.update_student(id).await?);
            }
            state.persist().await?;
            print_json(&updated)
        }
        Command::Seed => {
            let count = state.reseed(seed).await?;
            println!("saved {} students", count);
            Ok(())
        }
        Command::Catalog => {
            let repository = state.repository().ok_or_else(|| {
                CustomError::ConfigError("catalog needs --database or STUDENT_STATS_DATABASE".to_string())
            })?;
            let catalog = Catalog {
                classes: repository.classes().await?,
                countries: repository.countries().await?,
            };
            print_json(&catalog)
        }
    }
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    let text = serde_json::to_string_pretty(value)?;
    println!("{}", text);
    Ok(())
}
