//! `todocal` command line tool.
//!
//! # Responsibility
//! - Drive a `CalendarSession` against a local store for inspection.
//! - Print every result as JSON on stdout.

use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use log::info;
use serde_json::json;
use std::path::{Path, PathBuf};
use todocal_core::{
    default_log_level, init_logging, open_db, CalendarConfig, CalendarSession, DateRange,
    MonthId, MonthWindowManager, MutationScope, NewTodo, SqliteRangeGateway,
    SqliteTodoRepository, WeekStart,
};

#[derive(Parser)]
#[command(name = "todocal")]
#[command(about = "Inspect the month-windowed todo calendar engine", version)]
struct Cli {
    /// Absolute directory for rolling log files; logging is off when omitted
    #[arg(long, global = true)]
    log_dir: Option<String>,

    /// trace|debug|info|warn|error
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// JSON file with calendar settings (week_start, max_dots, ...)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check that the core library is linked
    Ping,
    /// Print the initial month window
    Window {
        /// Reference day (YYYY-MM-DD), defaults to today
        #[arg(long)]
        today: Option<NaiveDate>,
    },
    /// Fetch one month through the cache and print it
    Grid {
        #[arg(long)]
        db: PathBuf,
        /// Month to show (YYYY-MM)
        #[arg(long)]
        month: MonthId,
        /// 0 = Sunday, 1 = Monday
        #[arg(long)]
        week_start: Option<u8>,
    },
    /// Print per-day dot summaries
    Strip {
        #[arg(long)]
        db: PathBuf,
        #[arg(long)]
        from: NaiveDate,
        #[arg(long)]
        to: NaiveDate,
        #[arg(long)]
        max_dots: Option<usize>,
    },
    /// Create a todo
    AddTodo(AddTodoArgs),
}

#[derive(Args)]
struct AddTodoArgs {
    #[arg(long)]
    db: PathBuf,
    #[arg(long)]
    title: String,
    /// Single day (YYYY-MM-DD)
    #[arg(long, conflicts_with_all = ["start", "end"])]
    date: Option<NaiveDate>,
    /// Period start, or recurrence anchor
    #[arg(long)]
    start: Option<NaiveDate>,
    /// Period end
    #[arg(long, requires = "start")]
    end: Option<NaiveDate>,
    /// RRULE body, e.g. FREQ=WEEKLY;BYDAY=MO
    #[arg(long)]
    recurrence: Option<String>,
    /// Last day a recurrence may occur
    #[arg(long, requires = "recurrence")]
    recurrence_end: Option<NaiveDate>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    if let Some(dir) = cli.log_dir.as_deref() {
        let level = cli.log_level.as_deref().unwrap_or(default_log_level());
        init_logging(level, dir).map_err(anyhow::Error::msg)?;
    }
    let config = load_config(cli.config.as_deref())?;

    let output = match cli.command {
        Commands::Ping => json!({
            "ping": todocal_core::ping(),
            "version": todocal_core::core_version(),
        }),
        Commands::Window { today } => {
            let today = today.unwrap_or_else(|| chrono::Local::now().date_naive());
            let mut manager = MonthWindowManager::with_limits(
                config.window_ceiling,
                config.window_retention,
                config.initial_span,
            );
            json!({ "today": today, "window": manager.initialize(today) })
        }
        Commands::Grid {
            db,
            month,
            week_start,
        } => {
            let mut config = config;
            if let Some(raw) = week_start {
                config.week_start = WeekStart::try_from(raw).map_err(anyhow::Error::msg)?;
            }
            run_grid(&db, month, config)?
        }
        Commands::Strip {
            db,
            from,
            to,
            max_dots,
        } => {
            let range = DateRange::new(from, to)?;
            let conn = open_db(&db).with_context(|| format!("opening {}", db.display()))?;
            let session = CalendarSession::new(SqliteRangeGateway::try_new(&conn)?, config)?;
            json!({ "range": range, "days": session.get_strip_summary(range, max_dots) })
        }
        Commands::AddTodo(args) => run_add_todo(args)?,
    };

    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

fn load_config(path: Option<&Path>) -> Result<CalendarConfig> {
    let Some(path) = path else {
        return Ok(CalendarConfig::default());
    };
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("reading config {}", path.display()))?;
    Ok(CalendarConfig::from_json_str(&raw)?)
}

fn run_grid(db: &Path, month: MonthId, config: CalendarConfig) -> Result<serde_json::Value> {
    let conn = open_db(db).with_context(|| format!("opening {}", db.display()))?;
    let session = CalendarSession::new(SqliteRangeGateway::try_new(&conn)?, config)?;
    let outcome = session.on_visible_months_changed(&[month], Some(0));
    info!("event=cli_grid module=cli status=ok month={month} outcome={outcome:?}");

    let Some(data) = session.get_grid_view(month) else {
        bail!("month {month} was not cached after fetching");
    };
    Ok(json!({
        "month": month,
        "grid": DateRange::month_grid(month, session.config().week_start),
        "data": data,
    }))
}

fn run_add_todo(args: AddTodoArgs) -> Result<serde_json::Value> {
    let todo = match (args.date, args.start, args.end, args.recurrence) {
        (_, Some(start), None, Some(rule)) => {
            let mut todo = NewTodo::recurring(args.title, start, rule);
            todo.recurrence_end_date = args.recurrence_end;
            todo
        }
        (Some(date), None, None, Some(rule)) => {
            let mut todo = NewTodo::recurring(args.title, date, rule);
            todo.recurrence_end_date = args.recurrence_end;
            todo
        }
        (None, Some(start), Some(end), None) => NewTodo::period(args.title, start, end),
        (Some(date), None, None, None) => NewTodo::on_date(args.title, date),
        (None, Some(start), None, None) => NewTodo::on_date(args.title, start),
        _ => bail!("use --date, or --start [--end], optionally with --recurrence"),
    };

    let conn = open_db(&args.db).with_context(|| format!("opening {}", args.db.display()))?;
    let mutation = SqliteTodoRepository::new(&conn).create_todo(&todo)?;
    let invalidate = match mutation.scope {
        MutationScope::Months(months) => json!(months),
        MutationScope::All => json!("all"),
    };
    Ok(json!({ "todo_id": mutation.todo_id, "invalidate": invalidate }))
}
