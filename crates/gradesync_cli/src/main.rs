//! GradeSync command line front end.
//!
//! # Responsibility
//! - Parse commands and hand them to `gradesync_core`.
//! - Print reports; exit non-zero on any failure.

use clap::{Args, Parser, Subcommand};
use gradesync_core::config::SyncConfig;
use gradesync_core::roster::{checkpoint, CanvasClient, RosterSource};
use gradesync_core::surface::remote::spreadsheet_id_from_url;
use gradesync_core::{
    default_log_level, init_logging, logging_status, GradeSync, RemoteId, RemoteSheetSurface,
    TabularSurface, WorkbookSurface,
};
use log::error;
use std::error::Error;
use std::path::PathBuf;
use std::process::ExitCode;

type CliResult = Result<(), Box<dyn Error>>;

#[derive(Parser)]
#[command(name = "gradesync")]
#[command(about = "Sync LMS assignment scores into grade spreadsheets", long_about = None)]
#[command(version)]
struct Cli {
    /// Configuration file (TOML)
    #[arg(short, long, env = "GRADESYNC_CONFIG")]
    config: Option<PathBuf>,

    /// Log level: trace|debug|info|warn|error
    #[arg(long)]
    log_level: Option<String>,

    /// Directory for rolling log files
    #[arg(long)]
    log_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List active courses
    Courses,
    /// List assignments of a course
    Assignments {
        #[arg(long)]
        course: RemoteId,
    },
    /// Fetch students and scores and write both checkpoint files
    Fetch {
        #[arg(long)]
        course: RemoteId,
        #[arg(long)]
        assignment: RemoteId,
    },
    /// Show the period/activity columns of a destination
    Map {
        #[command(flatten)]
        destination: DestinationArgs,
    },
    /// List the student rows of a destination
    Students {
        #[command(flatten)]
        destination: DestinationArgs,
    },
    /// Write checkpointed scores into one activity column
    Sync {
        #[arg(long)]
        period: String,
        #[arg(long)]
        activity: String,
        /// Scores-to-write file; defaults to the configured checkpoint
        #[arg(long)]
        scores: Option<PathBuf>,
        /// Print the plan without writing
        #[arg(long)]
        dry_run: bool,
        #[command(flatten)]
        destination: DestinationArgs,
    },
}

#[derive(Args)]
#[group(required = true, multiple = false)]
struct DestinationArgs {
    /// Local workbook file
    #[arg(long)]
    xlsx: Option<PathBuf>,
    /// Spreadsheet id or share URL
    #[arg(long)]
    sheet_id: Option<String>,
}

fn open_destination(
    args: &DestinationArgs,
    config: &SyncConfig,
) -> Result<GradeSync<Box<dyn TabularSurface>>, Box<dyn Error>> {
    let surface: Box<dyn TabularSurface> = match (&args.xlsx, &args.sheet_id) {
        (Some(path), _) => Box::new(WorkbookSurface::open(
            path.clone(),
            config.destination.sheet_name.clone(),
        )?),
        (None, Some(raw)) => {
            let id = spreadsheet_id_from_url(raw)
                .ok_or_else(|| format!("`{raw}` is not a spreadsheet id or URL"))?;
            Box::new(RemoteSheetSurface::new(config.remote_sheet_config(&id)?)?)
        }
        (None, None) => return Err("pass --xlsx or --sheet-id".into()),
    };
    Ok(GradeSync::new(
        surface,
        config.destination_layout()?,
        config.matching,
    ))
}

fn run(cli: Cli, config: SyncConfig) -> CliResult {
    match cli.command {
        Command::Courses => {
            let client = CanvasClient::new(config.canvas_config()?)?;
            for course in client.list_active_courses()? {
                println!("{}\t{}", course.id, course.name);
            }
        }
        Command::Assignments { course } => {
            let client = CanvasClient::new(config.canvas_config()?)?;
            for assignment in client.list_assignments(course)? {
                println!("{}\t{}", assignment.id, assignment.name);
            }
        }
        Command::Fetch { course, assignment } => {
            let client = CanvasClient::new(config.canvas_config()?)?;
            let records = checkpoint::fetch_scores_to_write(
                &client,
                course,
                assignment,
                &config.checkpoints.roster_snapshot,
                &config.checkpoints.scores_to_write,
            )?;
            println!(
                "saved {} records to {} (roster in {})",
                records.len(),
                config.checkpoints.scores_to_write.display(),
                config.checkpoints.roster_snapshot.display()
            );
        }
        Command::Map { destination } => {
            let sync = open_destination(&destination, &config)?;
            println!("{}", sync.activity_map()?.summary());
        }
        Command::Students { destination } => {
            let sync = open_destination(&destination, &config)?;
            for (row, name) in sync.destination_students()? {
                println!("{row}\t{name}");
            }
        }
        Command::Sync {
            period,
            activity,
            scores,
            dry_run,
            destination,
        } => {
            let scores_path = scores.unwrap_or_else(|| config.checkpoints.scores_to_write.clone());
            let records = checkpoint::load_scores_to_write(&scores_path)?;
            let mut sync = open_destination(&destination, &config)?;
            let report = sync.reconcile(&records, &period, &activity)?;
            println!("{}", report.render_report());
            if dry_run {
                println!("dry run: nothing written");
                return Ok(());
            }
            let outcome = sync.apply(report.plan)?;
            println!("written: {}", outcome.written);
            if let Some(path) = outcome.backup_path {
                println!("backup: {}", path.display());
            }
            for failure in &outcome.failures {
                println!("failed: {} ({})", failure.cell, failure.message);
            }
        }
    }
    Ok(())
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let config = match SyncConfig::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("error: {err}");
            return ExitCode::FAILURE;
        }
    };

    let level = cli
        .log_level
        .clone()
        .or_else(|| config.logging.level.clone())
        .unwrap_or_else(|| default_log_level().to_string());
    let log_dir = cli
        .log_dir
        .clone()
        .or_else(|| config.logging.dir.clone())
        .unwrap_or_else(|| std::env::temp_dir().join("gradesync"));
    if let Err(err) = init_logging(&level, &log_dir) {
        eprintln!("warning: logging disabled: {err}");
    }

    match run(cli, config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            // Warnings and errors are mirrored to stderr once logging runs.
            if logging_status().is_some() {
                error!("event=cli module=cli status=error error={}", err);
            } else {
                eprintln!("error: {err}");
            }
            ExitCode::FAILURE
        }
    }
}
