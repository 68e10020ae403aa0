use anyhow::{Context, Result};

use crate::activity::ActivityKey;
use crate::timer::ActivityTimers;
use crate::tracker::TrackerRepository;

/// 計測中エントリーの表示内容。
#[derive(Clone, Debug, PartialEq)]
pub struct StatusReport {
    pub project_name: String,
    pub task_name: String,
    pub elapsed_seconds: i64,
}

pub struct StatusCommand<'a, T: TrackerRepository> {
    repo: &'a T,
}

impl<'a, T: TrackerRepository> StatusCommand<'a, T> {
    /// 新しい`StatusCommand`を返す。
    pub fn new(repo: &'a T) -> Self {
        Self { repo }
    }

    /// `status`サブコマンドの処理を行う。
    ///
    /// 計測中のエントリーをアクティビティのタイマーへ登録し、時計を
    /// サンプリングした経過秒数を返す。計測中でなければ`None`。
    pub async fn run(&self) -> Result<Option<StatusReport>> {
        let active = match self
            .repo
            .read_active_entry()
            .await
            .context("Failed to retrieve active time entry")?
        {
            Some(active) => active,
            None => return Ok(None),
        };

        let key: ActivityKey = (active.project_id, active.display_task().to_string());
        let mut timers = ActivityTimers::new();
        timers.start(key.clone(), active.start_time);

        Ok(Some(StatusReport {
            project_name: active.display_project().to_string(),
            task_name: active.display_task().to_string(),
            elapsed_seconds: timers.elapsed_seconds(&key),
        }))
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::*;
    use crate::time_entry::TimeEntry;
    use crate::timer::mock_clock;
    use crate::tracker::MockTrackerRepository;

    /// 計測中エントリーの経過時間が時計から計算されることを確認する。
    #[tokio::test]
    async fn test_status_running() {
        let started_at = Utc.with_ymd_and_hms(2024, 3, 11, 9, 0, 0).unwrap();
        mock_clock::set_mock_time(Utc.with_ymd_and_hms(2024, 3, 11, 10, 0, 30).unwrap());

        let mut repo = MockTrackerRepository::new();
        repo.expect_read_active_entry().returning(move || {
            Ok(Some(TimeEntry {
                id: 42,
                user_id: Some(1),
                user_name: None,
                user_email: None,
                project_id: Some(2),
                project_name: Some("A".to_string()),
                task_name: Some("X".to_string()),
                description: None,
                start_time: started_at,
                end_time: None,
                total_time: None,
            }))
        });

        let report = StatusCommand::new(&repo).run().await.unwrap();

        assert_eq!(
            report,
            Some(StatusReport {
                project_name: "A".to_string(),
                task_name: "X".to_string(),
                elapsed_seconds: 3630,
            })
        );
        mock_clock::clear_mock_time();
    }

    /// 計測していない場合に`None`になることを確認する。
    #[tokio::test]
    async fn test_status_idle() {
        let mut repo = MockTrackerRepository::new();
        repo.expect_read_active_entry().returning(|| Ok(None));

        let report = StatusCommand::new(&repo).run().await.unwrap();

        assert_eq!(report, None);
    }
}
