use anyhow::{bail, Context, Result};
use log::info;

use crate::tracker::TrackerRepository;

/// タスクの計測を開始するためのサブコマンド。
#[derive(Debug, clap::Args)]
pub struct StartArgs {
    #[clap(long = "project", help = "Project id of the task")]
    pub project: i64,

    #[clap(long = "task", help = "Task id to start tracking")]
    pub task_id: i64,

    #[clap(long = "description", help = "Optional description of the work")]
    pub description: Option<String>,
}

pub struct StartCommand<'a, T: TrackerRepository> {
    repo: &'a T,
}

impl<'a, T: TrackerRepository> StartCommand<'a, T> {
    /// 新しい`StartCommand`を返す。
    pub fn new(repo: &'a T) -> Self {
        Self { repo }
    }

    /// `start`サブコマンドの処理を行う。
    ///
    /// 指定タスクがプロジェクトに存在することを確認してから計測を開始する。
    pub async fn run(&self, args: StartArgs) -> Result<()> {
        let tasks = self
            .repo
            .read_tasks(args.project)
            .await
            .with_context(|| format!("Failed to retrieve tasks of project {}", args.project))?;
        if tasks.is_empty() {
            bail!("No tasks found for project {}", args.project);
        }
        let task = tasks
            .iter()
            .find(|task| task.id == args.task_id)
            .with_context(|| format!("Task not found: {}", args.task_id))?;

        let entry_id = self
            .repo
            .start_time(args.project, &task.title, args.description.clone())
            .await
            .context("Failed to start time tracking")?;
        info!("Time tracking started for {} (entry {})", task.title, entry_id);

        Ok(())
    }
}
