use std::collections::{BTreeSet, HashMap};

use anyhow::{Context, Result};
use chrono::NaiveDate;
use log::{error, info};

use crate::activity::{aggregate, Activity, EntryFilter, SearchField};
use crate::timer;
use crate::tracker::{Task, TrackerRepository};
use crate::view_window::{parse_date, ViewMode, ViewWindow};

/// タイムシートのグリッドを表示するためのサブコマンド。
#[derive(Debug, clap::Args)]
pub struct TimesheetArgs {
    #[clap(
        short = 'd',
        long = "date",
        help = "Sets a custom reference date in the format YYYY-MM-DD",
        parse(try_from_str = parse_date),
    )]
    pub date: Option<NaiveDate>,

    #[clap(
        short = 'v',
        long = "view",
        default_value = "week",
        help = "Grid granularity: day, week or month"
    )]
    pub view: ViewMode,

    #[clap(long = "search", help = "Keep only entries matching the search term")]
    pub search: Option<String>,

    #[clap(
        long = "field",
        default_value = "any",
        help = "Search target: task, project, description or any"
    )]
    pub field: SearchField,

    #[clap(long = "project", help = "Keep only entries of the given project id")]
    pub project: Option<i64>,

    #[clap(long = "mine", help = "Keep only my own entries")]
    pub mine: bool,
}

pub struct TimesheetCommand<'a, T: TrackerRepository> {
    repo: &'a T,
}

impl<'a, T: TrackerRepository> TimesheetCommand<'a, T> {
    /// 新しい`TimesheetCommand`を返す。
    pub fn new(repo: &'a T) -> Self {
        Self { repo }
    }

    /// `timesheet`サブコマンドの処理を行う。
    ///
    /// 基準日(未指定ならLocalの今日)と表示粒度から表示期間を組み立て、
    /// フィルターを適用した上でアクティビティ行へ集計する。
    /// アクティビティはリクエストのたびに全体を作り直す。
    pub async fn run(&self, args: TimesheetArgs) -> Result<(ViewWindow, Vec<Activity>)> {
        let today = timer::today();
        let reference = args.date.unwrap_or(today);
        let window = ViewWindow::build(reference, args.view, today)
            .context("Failed to build view window")?;
        info!("View window: {} ~ {}", window.first(), window.last());

        let filter = self
            .build_filter(args.search, args.field, args.project, args.mine)
            .await?;
        let activities = collect_activities(self.repo, &window, &filter).await?;
        info!("Aggregated {} activities", activities.len());

        Ok((window, activities))
    }

    async fn build_filter(
        &self,
        search: Option<String>,
        field: SearchField,
        project: Option<i64>,
        mine: bool,
    ) -> Result<EntryFilter> {
        let user_id = if mine {
            let user = self
                .repo
                .read_current_user()
                .await
                .context("Failed to resolve current user")?;
            Some(user.id)
        } else {
            None
        };

        Ok(EntryFilter {
            search,
            search_field: field,
            project_id: project,
            user_id,
        })
    }
}

/// エントリーと割り当て情報を取得して集計する。
///
/// タスク一覧はエントリーが参照しているプロジェクトの分だけ読み込む。
/// 一部のプロジェクトでタスクが読めなくても、割り当て列が欠けるだけ
/// なので処理は続行する。
pub async fn collect_activities<T: TrackerRepository>(
    repo: &T,
    window: &ViewWindow,
    filter: &EntryFilter,
) -> Result<Vec<Activity>> {
    let entries = repo
        .read_time_entries()
        .await
        .context("Failed to retrieve time entries")?;

    let project_ids: BTreeSet<i64> = entries.iter().filter_map(|entry| entry.project_id).collect();
    let mut tasks_by_project: HashMap<i64, Vec<Task>> = HashMap::new();
    for project_id in project_ids {
        match repo.read_tasks(project_id).await {
            Ok(tasks) => {
                tasks_by_project.insert(project_id, tasks);
            }
            Err(err) => error!("Failed to load tasks for project {}: {:#}", project_id, err),
        }
    }

    Ok(aggregate(&entries, window, filter, &tasks_by_project))
}
