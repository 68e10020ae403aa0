use anyhow::{bail, Context, Result};
use chrono::{Duration, NaiveDate};
use log::info;

use crate::duration::parse_hhmm;
use crate::reconcile::{canonical_start, create_cell_entry, CellContext};
use crate::tracker::{NewTask, TrackerRepository};
use crate::view_window::parse_date;

/// 完了済みのエントリーを日付と作業時間から手で追加するためのサブコマンド。
#[derive(Debug, clap::Args)]
pub struct AddArgs {
    #[clap(long = "project", help = "Project id of the new line")]
    pub project: i64,

    #[clap(long = "task", help = "Task title of the new line")]
    pub task: String,

    #[clap(
        short = 'd',
        long = "date",
        help = "Day of the new line in the format YYYY-MM-DD",
        parse(try_from_str = parse_date),
    )]
    pub date: NaiveDate,

    #[clap(short = 't', long = "time", help = "Time spent in HH:MM")]
    pub time: String,

    #[clap(long = "description", help = "Optional description of the work")]
    pub description: Option<String>,
}

pub struct AddCommand<'a, T: TrackerRepository> {
    repo: &'a T,
}

impl<'a, T: TrackerRepository> AddCommand<'a, T> {
    /// 新しい`AddCommand`を返す。
    pub fn new(repo: &'a T) -> Self {
        Self { repo }
    }

    /// `add`サブコマンドの処理を行う。
    ///
    /// 入力を検証した後、タスクがプロジェクトに無ければ先に作成し、
    /// 指定日の09:00始まりで作業時間分のエントリーを登録する。
    /// 検証に失敗した場合は何も変更しない。
    pub async fn run(&self, args: AddArgs) -> Result<()> {
        let task_title = args.task.trim();
        if task_title.is_empty() {
            bail!("Task title must not be empty");
        }
        let seconds = parse_hhmm(&args.time)?;
        if seconds == 0 {
            bail!("Time spent must be greater than 0");
        }
        if seconds >= 24 * 3600 {
            bail!("Time spent must be below 24:00");
        }

        let user = self
            .repo
            .read_current_user()
            .await
            .context("User not found")?;
        let tasks = self
            .repo
            .read_tasks(args.project)
            .await
            .with_context(|| format!("Failed to retrieve tasks of project {}", args.project))?;
        if !tasks.iter().any(|task| task.title == task_title) {
            let created = self
                .repo
                .create_task(&NewTask {
                    project_id: args.project,
                    title: task_title.to_string(),
                    description: args.description.clone(),
                })
                .await
                .context("Failed to create task")?;
            info!("Created missing task {} ({})", created.title, created.id);
        }

        let start = canonical_start(args.date)?;
        let context = CellContext {
            user_id: user.id,
            project_id: args.project,
            task_name: task_title.to_string(),
            description: args.description.clone().unwrap_or_default(),
        };
        create_cell_entry(self.repo, &context, start, start + Duration::seconds(seconds)).await?;
        info!("Added {} on {} to task {}", args.time, args.date, task_title);

        Ok(())
    }
}
