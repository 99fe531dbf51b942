use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use recall_core::*;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::Instant;

#[derive(Parser)]
#[command(name = "recall")]
#[command(about = "Spaced-repetition flashcard scheduler", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Override data directory
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Load configuration from this file instead of the default location
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Treat this RFC 3339 timestamp as the current time
    #[arg(long, global = true)]
    at: Option<DateTime<Utc>>,

    /// Log at debug level
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Add a new card to the deck
    Add {
        #[arg(long)]
        front: String,

        #[arg(long)]
        back: String,

        /// Card id (random if omitted)
        #[arg(long)]
        id: Option<String>,
    },

    /// List the cards due now (default)
    Due {
        /// Maximum number of cards (defaults to max_cards_per_day)
        #[arg(long)]
        limit: Option<usize>,
    },

    /// Review the due cards
    Review {
        /// Maximum number of cards (defaults to max_cards_per_day)
        #[arg(long)]
        limit: Option<usize>,

        /// Rate every card with this rating instead of prompting (1-4 or again/hard/good/easy)
        #[arg(long)]
        auto: Option<Rating>,
    },

    /// Show what each rating would do to a card, without saving anything
    Preview { id: String },

    /// Exclude a card from review
    Suspend { id: String },

    /// Return a suspended card to review
    Unsuspend { id: String },

    /// Summarize recent reviews
    Stats {
        /// Window in days
        #[arg(long, default_value_t = 7, value_parser = clap::value_parser!(i64).range(1..=36500))]
        days: i64,
    },

    /// Roll up the review-event WAL to CSV
    Rollup {
        /// Clean up processed WAL files after rollup
        #[arg(long)]
        cleanup: bool,
    },
}

/// File layout under the data directory
struct DataPaths {
    deck: PathBuf,
    wal_dir: PathBuf,
    events_wal: PathBuf,
    sessions_wal: PathBuf,
    events_csv: PathBuf,
}

impl DataPaths {
    fn new(data_dir: &Path) -> Self {
        let wal_dir = data_dir.join("wal");
        Self {
            deck: data_dir.join("deck.json"),
            events_wal: wal_dir.join("review_events.wal"),
            sessions_wal: wal_dir.join("sessions.wal"),
            events_csv: data_dir.join("review_events.csv"),
            wal_dir,
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    if cli.verbose {
        recall_core::logging::init_with_level("debug");
    } else {
        recall_core::logging::init();
    }

    let config = match &cli.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };
    let data_dir = cli
        .data_dir
        .clone()
        .unwrap_or_else(|| config.data.data_dir.clone());
    let paths = DataPaths::new(&data_dir);
    let at = cli.at;

    match cli.command {
        Some(Commands::Add { front, back, id }) => cmd_add(&paths, front, back, id, clock(at)),
        Some(Commands::Due { limit }) => cmd_due(&paths, limit, &config, clock(at)),
        Some(Commands::Review { limit, auto }) => cmd_review(&paths, limit, auto, &config, at),
        Some(Commands::Preview { id }) => cmd_preview(&paths, &id, &config, clock(at)),
        Some(Commands::Suspend { id }) => cmd_suspend(&paths, &id, true),
        Some(Commands::Unsuspend { id }) => cmd_suspend(&paths, &id, false),
        Some(Commands::Stats { days }) => cmd_stats(&paths, days, clock(at)),
        Some(Commands::Rollup { cleanup }) => cmd_rollup(&paths, cleanup),
        None => cmd_due(&paths, None, &config, clock(at)),
    }
}

/// The pinned time if one was given, otherwise the wall clock
fn clock(at: Option<DateTime<Utc>>) -> DateTime<Utc> {
    at.unwrap_or_else(Utc::now)
}

fn daily_limit(limit: Option<usize>, config: &Config) -> usize {
    limit.unwrap_or(config.study.max_cards_per_day as usize)
}

fn cmd_add(
    paths: &DataPaths,
    front: String,
    back: String,
    id: Option<String>,
    now: DateTime<Utc>,
) -> Result<()> {
    let id = id.unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
    let card = Card::new(id.clone(), front, back, now);

    Deck::update(&paths.deck, |deck| deck.add(card))?;

    println!("✓ Added card {}", id);
    Ok(())
}

fn cmd_due(
    paths: &DataPaths,
    limit: Option<usize>,
    config: &Config,
    now: DateTime<Utc>,
) -> Result<()> {
    let deck = Deck::load(&paths.deck)?;
    let counts = due_counts(&deck.cards, now);
    let due = select_due(&deck.cards, now, daily_limit(limit, config));

    if due.is_empty() {
        println!("Nothing due.");
        return Ok(());
    }

    println!(
        "{} due ({} new, {} learning, {} review, {} relearning)",
        counts.total(),
        counts.new,
        counts.learning,
        counts.review,
        counts.relearning
    );
    for card in due {
        println!(
            "  {:<24} {:<10} {}  {}",
            card.id,
            card.scheduling.state.to_string(),
            card.scheduling.due_at.format("%Y-%m-%d %H:%M"),
            card.front
        );
    }

    Ok(())
}

fn cmd_review(
    paths: &DataPaths,
    limit: Option<usize>,
    auto: Option<Rating>,
    config: &Config,
    at: Option<DateTime<Utc>>,
) -> Result<()> {
    let scheduler = Scheduler::new(config.scheduler.clone())?;
    let mut deck = Deck::load(&paths.deck)?;

    let queue: Vec<String> = select_due(&deck.cards, clock(at), daily_limit(limit, config))
        .into_iter()
        .map(|c| c.id.clone())
        .collect();

    if queue.is_empty() {
        println!("Nothing due.");
        return Ok(());
    }

    let mut session = StudySession::start(clock(at));
    let mut event_sink = JsonlSink::new(&paths.events_wal);

    for (position, card_id) in queue.iter().enumerate() {
        let card = deck.card(card_id)?.clone();
        // Preview and commit share one instant so the shown intervals are the saved ones
        let now = clock(at);

        println!();
        println!("[{}/{}] {}", position + 1, queue.len(), card.front);

        let (rating, time_to_answer) = match auto {
            Some(rating) => (rating, None),
            None => {
                let preview = scheduler.preview(&card.scheduling, now)?;
                let shown = Instant::now();
                match prompt_rating(&card, &preview, now)? {
                    Some(rating) => (rating, chrono::Duration::from_std(shown.elapsed()).ok()),
                    None => break,
                }
            }
        };

        let outcome = scheduler.review(&card, session.id, rating, now, time_to_answer)?;

        // Persist after every rating so quitting mid-session keeps finished work
        deck.apply(card_id, outcome.state)?;
        deck.save(&paths.deck)?;
        event_sink.append(&outcome.event)?;
        session.record(rating, time_to_answer)?;

        println!(
            "  {} → {}, due in {}",
            rating,
            outcome.event.after.state,
            format_interval(outcome.event.scheduled_days)
        );
    }

    let finished = session.finish(clock(at)).clone();
    JsonlSink::new(&paths.sessions_wal).append_session(&finished)?;

    display_summary(&finished.summary(clock(at)));
    Ok(())
}

fn cmd_preview(paths: &DataPaths, id: &str, config: &Config, now: DateTime<Utc>) -> Result<()> {
    let scheduler = Scheduler::new(config.scheduler.clone())?;
    let deck = Deck::load(&paths.deck)?;
    let card = deck.card(id)?;
    let preview = scheduler.preview(&card.scheduling, now)?;

    println!("{}  [{}]", card.front, card.scheduling.state);
    println!(
        "  difficulty {:.2}, stability {:.2}d, retrievability {:.0}%",
        card.scheduling.difficulty,
        card.scheduling.stability,
        scheduler.retrievability(&card.scheduling, now) * 100.0
    );
    println!();

    for (rating, next) in preview.iter() {
        let days = (next.due_at - now).num_milliseconds() as f64 / 86_400_000.0;
        println!(
            "  {:<6} → {:<10} due in {:<6} (difficulty {:.2}, stability {:.2}d)",
            rating.to_string(),
            next.state.to_string(),
            format_interval(days),
            next.difficulty,
            next.stability
        );
    }

    Ok(())
}

fn cmd_suspend(paths: &DataPaths, id: &str, suspended: bool) -> Result<()> {
    Deck::update(&paths.deck, |deck| deck.set_suspended(id, suspended))?;

    if suspended {
        println!("✓ Suspended {}", id);
    } else {
        println!("✓ Unsuspended {}", id);
    }
    Ok(())
}

fn cmd_stats(paths: &DataPaths, days: i64, now: DateTime<Utc>) -> Result<()> {
    let events = load_recent_events(&paths.events_wal, &paths.events_csv, days, now)?;
    let stats = ReviewStats::from_events(&events);

    let cutoff = window_start(now, days)?;
    let sessions = recall_core::wal::read_sessions(&paths.sessions_wal)?
        .into_iter()
        .filter(|s| s.started_at >= cutoff)
        .count();

    println!("Last {} days", days);
    println!("  Sessions:  {}", sessions);
    println!("  Reviews:   {} across {} cards", stats.total, stats.distinct_cards);
    println!(
        "  Ratings:   again {}, hard {}, good {}, easy {}",
        stats.histogram.again, stats.histogram.hard, stats.histogram.good, stats.histogram.easy
    );
    println!("  Lapses:    {}", stats.lapses);
    match stats.retention_rate {
        Some(rate) => println!("  Retention: {:.0}%", rate * 100.0),
        None => println!("  Retention: n/a"),
    }

    Ok(())
}

fn cmd_rollup(paths: &DataPaths, cleanup: bool) -> Result<()> {
    if !paths.events_wal.exists() {
        println!("No WAL file found - nothing to roll up.");
        return Ok(());
    }

    let count =
        recall_core::rollup::events_to_csv_and_archive(&paths.events_wal, &paths.events_csv)?;

    if count == 0 {
        println!("WAL is empty - nothing to roll up.");
        return Ok(());
    }

    println!("✓ Rolled up {} review events to CSV", count);
    println!("  CSV: {}", paths.events_csv.display());

    if cleanup {
        let cleaned = recall_core::rollup::cleanup_processed_wals(&paths.wal_dir)?;
        if cleaned > 0 {
            println!("✓ Cleaned up {} processed WAL files", cleaned);
        }
    }

    Ok(())
}

/// Human-sized rendering of a fractional day count
fn format_interval(days: f64) -> String {
    let minutes = days * 24.0 * 60.0;
    if minutes < 60.0 {
        format!("{:.0}m", minutes.max(1.0))
    } else if days < 1.0 {
        format!("{:.0}h", minutes / 60.0)
    } else if days < 30.0 {
        format!("{:.0}d", days)
    } else if days < 365.0 {
        format!("{:.1}mo", days / 30.0)
    } else {
        format!("{:.1}y", days / 365.0)
    }
}

fn display_summary(summary: &SessionSummary) {
    println!();
    println!("╭─────────────────────────────────────────╮");
    println!("│  SESSION COMPLETE");
    println!("╰─────────────────────────────────────────╯");
    println!();
    println!("  Reviewed: {}", summary.reviewed);
    println!(
        "  Correct:  {}  Incorrect: {}",
        summary.correct, summary.incorrect
    );
    if let Some(accuracy) = summary.accuracy {
        println!("  Accuracy: {:.0}%", accuracy * 100.0);
    }
    println!(
        "  Ratings:  again {}, hard {}, good {}, easy {}",
        summary.histogram.again,
        summary.histogram.hard,
        summary.histogram.good,
        summary.histogram.easy
    );
    if let Some(ms) = summary.average_answer_ms {
        println!("  Avg answer: {:.1}s", ms as f64 / 1000.0);
    }
    println!("  Time: {}m {}s", summary.elapsed_seconds / 60, summary.elapsed_seconds % 60);
    println!();
}

/// Read one trimmed line; None at end of input
fn read_line() -> Result<Option<String>> {
    let mut input = String::new();
    if io::stdin().read_line(&mut input)? == 0 {
        return Ok(None);
    }
    Ok(Some(input.trim().to_lowercase()))
}

/// Reveal the answer and ask for a rating; None means the learner quit
fn prompt_rating(card: &Card, preview: &Preview, now: DateTime<Utc>) -> Result<Option<Rating>> {
    print!("  Enter to reveal, 'q' to quit > ");
    io::stdout().flush()?;
    match read_line()? {
        None => return Ok(None),
        Some(input) if input == "q" => return Ok(None),
        Some(_) => {}
    }

    println!("  {}", card.back);
    println!("─────────────────────────────────────────");
    let choices: Vec<String> = preview
        .iter()
        .map(|(rating, next)| {
            let days = (next.due_at - now).num_milliseconds() as f64 / 86_400_000.0;
            format!("{} {} ({})", rating.value(), rating, format_interval(days))
        })
        .collect();
    println!("  {}", choices.join("  "));

    loop {
        print!("> ");
        io::stdout().flush()?;

        let input = match read_line()? {
            None => return Ok(None),
            Some(input) => input,
        };
        if input == "q" {
            return Ok(None);
        }
        match input.parse::<Rating>() {
            Ok(rating) => return Ok(Some(rating)),
            Err(_) => println!("  Please answer 1-4 (or 'q' to quit)"),
        }
    }
}
