mod clock;
mod config;
mod db;
mod error;
mod memory;
mod models;
mod planner;
mod scheduler;
mod script;
mod tui;

use clap::{Parser, Subcommand};
use serde::Serialize;
use std::fs::OpenOptions;
use std::path::PathBuf;
use std::sync::Mutex;
use tracing::error;
use tracing_subscriber::EnvFilter;

use clock::SystemClock;
use config::{Config, DEFAULT_CONFIG_NAME};
use db::{CardStore, Database};
use error::{Error, Result};
use models::{Card, JsonOutput, Rating};
use planner::{Planner, Round};
use scheduler::Scheduler;
use script::Script;
use tui::RoundKind;

const APP_DIR: &str = "linecue";
const DEFAULT_DB_NAME: &str = "linecue.db";
const LOG_FILE_NAME: &str = "linecue.log";
const DEFAULT_LOG_DIRECTIVE: &str = "linecue=info";

#[derive(Parser)]
#[command(name = "linecue")]
#[command(about = "Spaced-repetition trainer for memorising scripted lines")]
#[command(version)]
struct Cli {
    /// Output as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Card database (overrides LINECUE_DB)
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    /// Config file (overrides LINECUE_CONFIG)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Script to memorise, one line per line, `#` headings start scenes
    #[arg(long, global = true)]
    script: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database
    Init,

    /// Interactive session: learn, ingest, review and scene run-throughs
    Session,

    /// Learn the next unlearnt line
    Learn,

    /// Enter already-known lines from a single rating each
    Ingest,

    /// Review the window around the earliest due line
    Review,

    /// Run through a whole scene
    Scene {
        /// Scene number, starting at 1
        number: usize,
    },

    /// Record a review outcome for a line
    Rate {
        /// Line ID
        id: String,

        /// Rating: again/hard/good/easy (or 1-4)
        rating: String,
    },

    /// List lines that are due or due soon
    Due,

    /// List script lines and their cards
    Lines,

    /// Show card statistics
    Stats,

    /// Delete cards for lines no longer in the script
    Prune,

    /// Delete every card
    Reset {
        /// Confirm the wipe
        #[arg(long)]
        yes: bool,
    },
}

impl Commands {
    fn is_interactive(&self) -> bool {
        matches!(
            self,
            Commands::Session
                | Commands::Learn
                | Commands::Ingest
                | Commands::Review
                | Commands::Scene { .. }
        )
    }
}

#[derive(Serialize)]
struct LineStatus<'a> {
    id: &'a str,
    scene: usize,
    text: &'a str,
    card: Option<Card>,
}

fn app_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR)
}

fn get_config_path(flag: Option<PathBuf>) -> Option<PathBuf> {
    if let Some(path) = flag {
        return Some(path);
    }
    if let Ok(path) = std::env::var("LINECUE_CONFIG") {
        return Some(PathBuf::from(path));
    }
    let default = app_dir().join(DEFAULT_CONFIG_NAME);
    default.exists().then_some(default)
}

fn pick_db_path(flag: Option<PathBuf>, env: Option<String>, config: &Config) -> Option<PathBuf> {
    flag.or_else(|| env.map(PathBuf::from))
        .or_else(|| config.database.clone())
}

fn get_db_path(flag: Option<PathBuf>, config: &Config) -> PathBuf {
    if let Some(path) = pick_db_path(flag, std::env::var("LINECUE_DB").ok(), config) {
        return path;
    }

    let dir = app_dir();
    std::fs::create_dir_all(&dir).ok();
    dir.join(DEFAULT_DB_NAME)
}

// Interactive commands own the terminal, so their logs go to a file.
fn init_logging(interactive: bool) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_DIRECTIVE));

    if interactive {
        let dir = app_dir();
        std::fs::create_dir_all(&dir)?;
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(dir.join(LOG_FILE_NAME))?;
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(Mutex::new(file))
            .with_ansi(false)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    }
    Ok(())
}

fn main() {
    let cli = Cli::parse();
    let json = cli.json;

    if let Err(e) = init_logging(cli.command.is_interactive()) {
        eprintln!("Warning: logging disabled: {}", e);
    }

    if let Err(e) = run(cli) {
        error!(error = %e, contract = e.is_contract_violation(), "command failed");
        if json {
            match serde_json::to_string(&JsonOutput::<()>::err(e.to_string())) {
                Ok(out) => println!("{}", out),
                Err(_) => eprintln!("Error: {}", e),
            }
        } else {
            eprintln!("Error: {}", e);
        }
        std::process::exit(1);
    }
}

fn print_json<T: Serialize>(data: T) -> Result<()> {
    println!("{}", serde_json::to_string(&JsonOutput::ok(data))?);
    Ok(())
}

fn run(cli: Cli) -> Result<()> {
    let config = match get_config_path(cli.config.clone()) {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };
    let db_path = get_db_path(cli.db.clone(), &config);
    let db = Database::open(&db_path)?;

    match cli.command {
        Commands::Init => {
            db.init()?;
            if cli.json {
                print_json(())?;
            } else {
                println!("Database initialized at: {}", db_path.display());
            }
            return Ok(());
        }

        Commands::Reset { yes } => {
            if !yes {
                return Err(Error::InvalidParameters(
                    "reset deletes every card; pass --yes to confirm".into(),
                ));
            }
            db.init()?;
            db.reset()?;
            if cli.json {
                print_json(())?;
            } else {
                println!("All cards deleted.");
            }
            return Ok(());
        }

        _ => {}
    }

    let script_path = cli.script.clone().or_else(|| config.script.clone()).ok_or_else(|| {
        Error::InvalidParameters("no script given; pass --script or set `script` in config".into())
    })?;
    let script = Script::load(&script_path)?;

    db.init()?;
    let model = memory::build(&config, None)?;
    let due_soon = chrono::Duration::hours(config.review.due_soon_hours);
    let mut scheduler =
        Scheduler::new(db, script.clone(), model, Box::new(SystemClock), due_soon)?;
    let planner = Planner::new(config.planner.clone());

    match cli.command {
        Commands::Init | Commands::Reset { .. } => {}

        Commands::Session => {
            tui::run_session(&mut scheduler, &planner, script)?;
        }

        Commands::Learn => {
            let round = tui::run_round(&mut scheduler, &planner, script, RoundKind::Learn)?;
            print_round(cli.json, "Learn", &round)?;
        }

        Commands::Ingest => {
            let round = tui::run_round(&mut scheduler, &planner, script, RoundKind::Ingest)?;
            print_round(cli.json, "Ingest", &round)?;
        }

        Commands::Review => {
            let round = tui::run_round(&mut scheduler, &planner, script, RoundKind::Review)?;
            print_round(cli.json, "Review", &round)?;
        }

        Commands::Scene { number } => {
            let start = script.scene_start(number).ok_or_else(|| {
                Error::InvalidParameters(format!(
                    "scene {} does not exist; the script has {} scene(s)",
                    number,
                    script.scenes().len()
                ))
            })?;
            let label = script.scenes()[number - 1]
                .title
                .clone()
                .unwrap_or_else(|| format!("Scene {}", number));
            let round =
                tui::run_round(&mut scheduler, &planner, script, RoundKind::Scene(start))?;
            print_round(cli.json, &label, &round)?;
        }

        Commands::Rate { id, rating } => {
            let rating = Rating::from_str(&rating)?;
            let card = scheduler.record_review(&id, rating)?;
            if cli.json {
                print_json(&card)?;
            } else {
                println!("Recorded {} for line {}.", rating, id);
                println!("Next due: {}", card.due.format("%Y-%m-%d %H:%M"));
                println!("Hints: {}", card.display.label());
            }
        }

        Commands::Due => {
            let cards = scheduler.reviewable_cards()?;
            if cli.json {
                print_json(&cards)?;
            } else if cards.is_empty() {
                println!("Nothing due.");
            } else {
                println!("{:<16} {:<17} {:<14} LINE", "ID", "DUE", "HINTS");
                println!("{}", "-".repeat(80));
                for card in cards {
                    let text = scheduler.lines().text(&card.id).unwrap_or_default();
                    println!(
                        "{:<16} {:<17} {:<14} {}",
                        card.id,
                        card.due.format("%Y-%m-%d %H:%M"),
                        card.display.label(),
                        truncate(text, 40)
                    );
                }
            }
        }

        Commands::Lines => {
            let mut rows = Vec::with_capacity(script.len());
            for line in script.lines() {
                rows.push(LineStatus {
                    id: &line.id,
                    scene: line.scene + 1,
                    text: &line.text,
                    card: scheduler.card(&line.id)?,
                });
            }
            if cli.json {
                print_json(&rows)?;
            } else if rows.is_empty() {
                println!("The script has no lines.");
            } else {
                println!("{:<16} {:<6} {:<14} LINE", "ID", "SCENE", "HINTS");
                println!("{}", "-".repeat(80));
                for row in rows {
                    let hints = row
                        .card
                        .as_ref()
                        .map_or("unlearnt", |c| c.display.label());
                    println!(
                        "{:<16} {:<6} {:<14} {}",
                        row.id,
                        row.scene,
                        hints,
                        truncate(row.text, 40)
                    );
                }
            }
        }

        Commands::Stats => {
            let stats = scheduler.log_stats()?;
            if cli.json {
                print_json(&stats)?;
            } else {
                println!("=== Card Statistics ===");
                if let Some(scheme) = stats.scheme {
                    println!("Scheme: {}", scheme);
                }
                println!("Cards: {} of {} lines", stats.total, script.len());
                println!("Due now: {}", stats.due);
                println!("Reviewable: {}", stats.reviewable);
                println!();
                println!("By hints:");
                for (display, count) in &stats.by_display {
                    println!("  {:<14} {}", display.label(), count);
                }
                println!("By due day:");
                for (day, count) in &stats.by_due_day {
                    println!("  {:<14} {}", day, count);
                }
                println!("By ease/difficulty:");
                for (bucket, count) in &stats.by_hardness {
                    println!("  {:<14} {}", bucket, count);
                }
                if !stats.by_lifecycle.is_empty() {
                    println!("By state:");
                    for (lifecycle, count) in &stats.by_lifecycle {
                        println!("  {:<14} {}", lifecycle.label(), count);
                    }
                }
            }
        }

        Commands::Prune => {
            let pruned = scheduler.prune_orphaned_lines()?;
            if cli.json {
                print_json(&pruned)?;
            } else if pruned.is_empty() {
                println!("No orphaned cards.");
            } else {
                for id in &pruned {
                    println!("Pruned {}", id);
                }
                println!("{} orphaned card(s) deleted.", pruned.len());
            }
        }
    }

    Ok(())
}

fn print_round(json: bool, label: &str, round: &Round) -> Result<()> {
    if json {
        return print_json(round);
    }
    match round {
        Round::Idle => println!("{}: nothing to do.", label),
        Round::Completed(s) => println!(
            "{}: {} drilled, {} recorded.",
            label, s.drilled, s.recorded
        ),
        Round::Abandoned(s) => println!(
            "{} stopped early; {} recorded.",
            label, s.recorded
        ),
    }
    Ok(())
}

fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}
