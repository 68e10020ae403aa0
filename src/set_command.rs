use anyhow::{Context, Result};
use chrono::NaiveDate;
use log::info;

use crate::activity::ActivityKey;
use crate::duration::parse_hhmm;
use crate::reconcile::{
    create_cell_entry, delete_cell_entries, entries_for_cell, plan_cell_edit, set_entry_end,
    CellContext, CellPlan,
};
use crate::tracker::TrackerRepository;
use crate::view_window::parse_date;

/// グリッドの1セルを目標時間へ合わせるためのサブコマンド。
#[derive(Debug, clap::Args)]
pub struct SetArgs {
    #[clap(long = "project", help = "Project id of the cell")]
    pub project: i64,

    #[clap(long = "task", help = "Task name of the cell")]
    pub task: String,

    #[clap(
        short = 'd',
        long = "date",
        help = "Day of the cell in the format YYYY-MM-DD",
        parse(try_from_str = parse_date),
    )]
    pub date: NaiveDate,

    #[clap(
        short = 't',
        long = "time",
        help = "Target duration in HH:MM (seconds are not editable)"
    )]
    pub time: String,
}

pub struct SetCommand<'a, T: TrackerRepository> {
    repo: &'a T,
}

impl<'a, T: TrackerRepository> SetCommand<'a, T> {
    /// 新しい`SetCommand`を返す。
    pub fn new(repo: &'a T) -> Self {
        Self { repo }
    }

    /// `set`サブコマンドの処理を行う。
    ///
    /// 指定セルの既存エントリーを集めて編集計画を立て、合計が目標時間に
    /// なるようエントリーを作成・延長・付け替え・削除する。プロジェクトか
    /// 実行ユーザーが解決できない場合は何も変更せずに中断する。
    pub async fn run(&self, args: SetArgs) -> Result<()> {
        let target_seconds = parse_hhmm(&args.time)?;

        let entries = self
            .repo
            .read_time_entries()
            .await
            .context("Failed to retrieve time entries")?;
        let key: ActivityKey = (Some(args.project), args.task.clone());
        let cell = entries_for_cell(&entries, &key, args.date);
        let plan = plan_cell_edit(&cell, args.date, target_seconds)?;

        match plan {
            CellPlan::Noop => {
                info!("Cell already at the requested duration, nothing to do");
            }
            CellPlan::Create { start, end } => {
                let projects = self
                    .repo
                    .read_projects()
                    .await
                    .context("Failed to retrieve projects")?;
                let project = projects
                    .iter()
                    .find(|project| project.id == args.project)
                    .with_context(|| format!("Project not found: {}", args.project))?;
                let user = self
                    .repo
                    .read_current_user()
                    .await
                    .context("User not found")?;
                // 同じアクティビティの既存エントリーから説明文を引き継ぐ
                let description = entries
                    .iter()
                    .filter(|entry| entry.end_time.is_some())
                    .find(|entry| {
                        entry.project_id == key.0 && entry.display_task() == key.1
                    })
                    .and_then(|entry| entry.description.clone())
                    .unwrap_or_default();

                let context = CellContext {
                    user_id: user.id,
                    project_id: project.id,
                    task_name: args.task.clone(),
                    description,
                };
                create_cell_entry(self.repo, &context, start, end).await?;
            }
            CellPlan::SetEnd { entry_id, end } => {
                set_entry_end(self.repo, entry_id, end).await?;
            }
            CellPlan::DeleteAll { entry_ids } => {
                delete_cell_entries(self.repo, &entry_ids).await?;
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Local, TimeZone};

    use super::*;
    use crate::time_entry::TimeEntry;
    use crate::tracker::{MockTrackerRepository, Project, User};

    fn cell_entry(id: i64, start_hour: u32, duration_minutes: i64) -> TimeEntry {
        let start = Local
            .with_ymd_and_hms(2024, 3, 11, start_hour, 0, 0)
            .unwrap();
        TimeEntry {
            id,
            user_id: Some(1),
            user_name: None,
            user_email: None,
            project_id: Some(2),
            project_name: Some("A".to_string()),
            task_name: Some("X".to_string()),
            description: Some("work".to_string()),
            start_time: start.to_utc(),
            end_time: Some((start + Duration::minutes(duration_minutes)).to_utc()),
            total_time: None,
        }
    }

    fn args(time: &str) -> SetArgs {
        SetArgs {
            project: 2,
            task: "X".to_string(),
            date: chrono::NaiveDate::from_ymd_opt(2024, 3, 11).unwrap(),
            time: time.to_string(),
        }
    }

    /// 空のセルへの入力で新規エントリーが作成されることを確認する。
    #[tokio::test]
    async fn test_create_for_empty_cell() {
        let expected_start = Local
            .with_ymd_and_hms(2024, 3, 11, 9, 0, 0)
            .unwrap()
            .to_utc();
        let mut repo = MockTrackerRepository::new();
        repo.expect_read_time_entries().returning(|| Ok(vec![]));
        repo.expect_read_projects().times(1).returning(|| {
            Ok(vec![Project {
                id: 2,
                name: "A".to_string(),
                allocated_time: None,
                customer_name: None,
                region: None,
            }])
        });
        repo.expect_read_current_user().times(1).returning(|| {
            Ok(User {
                id: 7,
                name: None,
                email: "alice@example.com".to_string(),
            })
        });
        repo.expect_create_time_entry()
            .withf(move |entry| {
                entry.user_id == 7
                    && entry.project_id == 2
                    && entry.task_name == "X"
                    && entry.start_time == expected_start.to_rfc3339()
                    && entry.end_time == (expected_start + Duration::seconds(3600)).to_rfc3339()
            })
            .times(1)
            .returning(|_| Ok(()));

        let result = SetCommand::new(&repo).run(args("1:00")).await;

        assert!(result.is_ok());
    }

    /// プロジェクトが解決できない場合に何も変更せず中断することを確認する。
    #[tokio::test]
    async fn test_aborts_when_project_missing() {
        let mut repo = MockTrackerRepository::new();
        repo.expect_read_time_entries().returning(|| Ok(vec![]));
        repo.expect_read_projects().times(1).returning(|| Ok(vec![]));

        let result = SetCommand::new(&repo).run(args("1:00")).await;

        let message = format!("{:#}", result.unwrap_err());
        assert!(message.contains("Project not found: 2"));
    }

    /// 目標が現在値より大きい場合に最後のエントリーが延長されることを確認する。
    #[tokio::test]
    async fn test_extends_last_entry() {
        let last = cell_entry(5, 14, 60);
        let expected_end = last.end_time.unwrap() + Duration::seconds(1800);
        let mut repo = MockTrackerRepository::new();
        repo.expect_read_time_entries()
            .returning(|| Ok(vec![cell_entry(5, 14, 60), cell_entry(4, 9, 60)]));
        repo.expect_update_time_entry()
            .withf(move |id, update| {
                *id == 5 && update.end_time.as_deref() == Some(expected_end.to_rfc3339().as_str())
            })
            .times(1)
            .returning(|_, _| Ok(()));

        let result = SetCommand::new(&repo).run(args("2:30")).await;

        assert!(result.is_ok());
    }

    /// 縮小で最後のエントリーの終了時刻が付け替えられることを確認する。
    #[tokio::test]
    async fn test_shrinks_single_entry() {
        let entry = cell_entry(5, 9, 90);
        let expected_end = entry.start_time + Duration::seconds(3600);
        let mut repo = MockTrackerRepository::new();
        repo.expect_read_time_entries()
            .returning(|| Ok(vec![cell_entry(5, 9, 90)]));
        repo.expect_update_time_entry()
            .withf(move |id, update| {
                *id == 5 && update.end_time.as_deref() == Some(expected_end.to_rfc3339().as_str())
            })
            .times(1)
            .returning(|_, _| Ok(()));

        let result = SetCommand::new(&repo).run(args("1:00")).await;

        assert!(result.is_ok());
    }

    /// 0への編集でセルの全エントリーが削除されることを確認する。
    #[tokio::test]
    async fn test_zero_deletes_cell() {
        let mut repo = MockTrackerRepository::new();
        repo.expect_read_time_entries()
            .returning(|| Ok(vec![cell_entry(4, 9, 60), cell_entry(5, 14, 30)]));
        repo.expect_delete_time_entry()
            .times(2)
            .returning(|_| Ok(()));

        let result = SetCommand::new(&repo).run(args("0:00")).await;

        assert!(result.is_ok());
    }

    /// 目標が現在値と同じ場合に更新が発生しないことを確認する。
    #[tokio::test]
    async fn test_noop_when_unchanged() {
        let mut repo = MockTrackerRepository::new();
        repo.expect_read_time_entries()
            .returning(|| Ok(vec![cell_entry(5, 9, 90)]));

        let result = SetCommand::new(&repo).run(args("1:30")).await;

        assert!(result.is_ok());
    }

    /// 崩れた時間入力が検証エラーになり、取得すら行われないことを確認する。
    #[tokio::test]
    async fn test_invalid_time_rejected() {
        let repo = MockTrackerRepository::new();

        let result = SetCommand::new(&repo).run(args("ninety")).await;

        assert!(result.is_err());
    }
}
