use std::path::PathBuf;

use anyhow::{Context, Result};
use log::info;

use crate::activity::Activity;
use crate::timesheet_command::{TimesheetArgs, TimesheetCommand};
use crate::tracker::{Project, TrackerRepository};

/// アクティビティ行をCSVとして書き出すためのサブコマンド。
#[derive(Debug, clap::Args)]
pub struct ExportArgs {
    #[clap(flatten)]
    pub grid: TimesheetArgs,

    #[clap(
        short = 'o',
        long = "output",
        help = "Write the csv to the given file instead of stdout"
    )]
    pub output: Option<PathBuf>,
}

pub struct ExportCommand<'a, T: TrackerRepository> {
    repo: &'a T,
}

impl<'a, T: TrackerRepository> ExportCommand<'a, T> {
    /// 新しい`ExportCommand`を返す。
    pub fn new(repo: &'a T) -> Self {
        Self { repo }
    }

    /// `export`サブコマンドの処理を行う。
    ///
    /// タイムシートと同じ集計を行い、顧客名とリージョンを引くための
    /// プロジェクト一覧と合わせて返す。書き出し先の決定は呼び出し側。
    pub async fn run(&self, args: TimesheetArgs) -> Result<(Vec<Activity>, Vec<Project>)> {
        let (_, activities) = TimesheetCommand::new(self.repo).run(args).await?;
        let projects = self
            .repo
            .read_projects()
            .await
            .context("Failed to retrieve projects")?;
        info!("Exporting {} activities", activities.len());

        Ok((activities, projects))
    }
}
