use std::fs::File;
use std::io;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use fern::colors::{Color, ColoredLevelConfig};

mod activity;
mod add_command;
mod config;
mod console;
mod duration;
mod export;
mod export_command;
mod reconcile;
mod set_command;
mod start_command;
mod status_command;
mod stop_command;
mod time_entry;
mod timer;
mod timesheet_command;
mod tracker;
mod view_window;

use add_command::{AddArgs, AddCommand};
use config::Config;
use console::{ConsoleMarkdownTable, TimesheetPresenter};
use export_command::{ExportArgs, ExportCommand};
use set_command::{SetArgs, SetCommand};
use start_command::{StartArgs, StartCommand};
use status_command::StatusCommand;
use stop_command::{StopArgs, StopCommand};
use timesheet_command::{TimesheetArgs, TimesheetCommand};
use tracker::TrackerClient;

/// タイムシートを表示・編集するためのCLIアプリケーション。
///
/// # Examples
/// ```
/// $ cargo run -- timesheet --view week
/// $ cargo run -- set --project 2 --task "Design" -d 2024-03-11 -t 1:30
/// ```
#[derive(Debug, Parser)]
#[clap(version, about)]
struct Args {
    #[clap(subcommand)]
    subcommand: SubCommands,
}

/// サブコマンドを表す列挙型。
#[derive(Debug, Subcommand)]
enum SubCommands {
    /// Render the timesheet grid
    Timesheet(TimesheetArgs),
    /// Set one grid cell to a target duration
    Set(SetArgs),
    /// Add a completed line for a day
    Add(AddArgs),
    /// Start tracking a task
    Start(StartArgs),
    /// Stop or discard the active entry
    Stop(StopArgs),
    /// Show the active entry and its elapsed time
    Status,
    /// Export the aggregated activities as csv
    Export(ExportArgs),
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    setup_logger()?;

    let config = Config::load()?;
    let client = TrackerClient::new(&config);

    match args.subcommand {
        SubCommands::Timesheet(timesheet) => {
            let (window, activities) = TimesheetCommand::new(&client).run(timesheet).await?;
            let mut stdout = io::stdout();
            ConsoleMarkdownTable::new(&mut stdout).show_timesheet(&window, &activities)?;
        }
        SubCommands::Set(set) => SetCommand::new(&client).run(set).await?,
        SubCommands::Add(add) => AddCommand::new(&client).run(add).await?,
        SubCommands::Start(start) => StartCommand::new(&client).run(start).await?,
        SubCommands::Stop(stop) => StopCommand::new(&client).run(stop).await?,
        SubCommands::Status => match StatusCommand::new(&client).run().await? {
            Some(report) => println!(
                "{} / {}: {}",
                report.project_name,
                report.task_name,
                duration::format_clock(report.elapsed_seconds)
            ),
            None => println!("No active time entry"),
        },
        SubCommands::Export(export_args) => {
            let (activities, projects) =
                ExportCommand::new(&client).run(export_args.grid).await?;
            match export_args.output {
                Some(path) => {
                    let file = File::create(&path).with_context(|| {
                        format!("Failed to create output file: {}", path.display())
                    })?;
                    export::write_csv(file, &activities, &projects)?;
                }
                None => export::write_csv(io::stdout(), &activities, &projects)?,
            }
        }
    }

    Ok(())
}

/// ロガーを初期化する。ログはstderrへ出力し、グリッドの表示を妨げない。
fn setup_logger() -> Result<()> {
    let colors = ColoredLevelConfig::new()
        .info(Color::Green)
        .warn(Color::Yellow)
        .error(Color::Red);

    fern::Dispatch::new()
        .format(move |out, message, record| {
            out.finish(format_args!(
                "{} [{}] {}",
                chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
                colors.color(record.level()),
                message
            ))
        })
        .level(log::LevelFilter::Info)
        .chain(std::io::stderr())
        .apply()
        .context("Failed to initialize logger")?;

    Ok(())
}
