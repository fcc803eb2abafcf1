use anyhow::Result;
use chrono::NaiveDate;
use futures::future::join_all;
use log::LevelFilter;
use recur::cli::{self, CliArgs, Command};
use recur::clock::{Clock, SystemClock};
use recur::config::Config;
use recur::context::{AppContext, StandardContext};
use recur::controller::{Outcome, Rescheduler};
use recur::error::RescheduleError;
use recur::model::{DATE_FORMAT, RecurrenceEngine, parse_recurrence};
use recur::notify;
use recur::storage::JsonFieldStore;
use simplelog::{ColorChoice, TermLogger, TerminalMode};
use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;

const BINARY_NAME: &str = "recur";
const LOG_ENV: &str = "RECUR_LOG";

#[tokio::main]
async fn main() -> Result<()> {
    let args: Vec<String> = env::args().skip(1).collect();
    let CliArgs { root, command } = match cli::parse_args(&args) {
        Ok(parsed) => parsed,
        Err(e) => {
            eprintln!("Error: {}", e);
            eprintln!();
            cli::print_help(BINARY_NAME);
            std::process::exit(2);
        }
    };

    if command == Command::Help {
        cli::print_help(BINARY_NAME);
        return Ok(());
    }

    let ctx = StandardContext::new(root);
    let config = Config::load_or_default(&ctx)?;
    init_logging(&config);

    match command {
        Command::Help => Ok(()),
        Command::Apply { dir, documents } => apply(&ctx, &config, dir, documents).await,
        Command::Next {
            expression,
            from,
            count,
        } => preview(&config, &expression, from, count),
    }
}

fn init_logging(config: &Config) {
    let level = env::var(LOG_ENV)
        .ok()
        .and_then(|v| LevelFilter::from_str(v.trim()).ok())
        .unwrap_or_else(|| config.level_filter());

    if TermLogger::init(
        level,
        simplelog::Config::default(),
        TerminalMode::Stderr,
        ColorChoice::Auto,
    )
    .is_err()
    {
        eprintln!("Logger was already initialized");
    }
}

async fn apply(
    ctx: &dyn AppContext,
    config: &Config,
    dir: Option<PathBuf>,
    documents: Vec<String>,
) -> Result<()> {
    let dir = match dir {
        Some(dir) => dir,
        None => ctx.get_documents_dir()?,
    };
    let store = JsonFieldStore::new(dir);
    let documents = if documents.is_empty() {
        store.list_documents()?
    } else {
        documents
    };

    let sink = notify::sink_for(config.desktop_notifications);
    let rescheduler = Arc::new(Rescheduler::new(store, sink, SystemClock, config));

    let results = join_all(documents.iter().map(|doc| {
        let rescheduler = rescheduler.clone();
        async move { (doc, rescheduler.handle_document(doc).await) }
    }))
    .await;

    let mut failures = 0;
    for (doc, result) in results {
        match result {
            Ok(Outcome::Skipped) => println!("{}: skipped", doc),
            Ok(Outcome::Reported(msg)) => println!("{}: {}", doc, msg),
            Ok(Outcome::Rescheduled(m)) => {
                println!("{}: {} on {}", doc, m.status, m.scheduled.format(DATE_FORMAT))
            }
            Err(e) => {
                failures += 1;
                eprintln!("{}: {}", doc, e);
            }
        }
    }

    if failures > 0 {
        anyhow::bail!("{} document(s) could not be saved", failures);
    }
    Ok(())
}

fn preview(config: &Config, expression: &str, from: Option<NaiveDate>, count: usize) -> Result<()> {
    let pattern = parse_recurrence(expression)?;
    println!("{}  ({})", pattern, pattern.to_rrule_string());

    let mut anchor = from.unwrap_or_else(|| SystemClock.today());
    for _ in 0..count {
        match RecurrenceEngine::next_from(&pattern, anchor, config.max_initial_period_retries) {
            Some(next) => {
                println!("{}", next.format("%a %Y-%m-%d"));
                anchor = next;
            }
            None => {
                let e = RescheduleError::UnresolvableOccurrence(expression.to_string());
                println!("{}", e);
                break;
            }
        }
    }
    Ok(())
}
