use anyhow::{Context, Result};
use log::info;

use crate::tracker::TrackerRepository;

/// 計測中のエントリーを停止または破棄するためのサブコマンド。
#[derive(Debug, clap::Args)]
pub struct StopArgs {
    #[clap(
        long = "discard",
        help = "Delete the active entry instead of stopping it"
    )]
    pub discard: bool,
}

pub struct StopCommand<'a, T: TrackerRepository> {
    repo: &'a T,
}

impl<'a, T: TrackerRepository> StopCommand<'a, T> {
    /// 新しい`StopCommand`を返す。
    pub fn new(repo: &'a T) -> Self {
        Self { repo }
    }

    /// `stop`サブコマンドの処理を行う。
    ///
    /// 停止時はサーバーが分単位の作業時間を記録する。`--discard`の場合は
    /// 記録せずにエントリーを削除する。
    pub async fn run(&self, args: StopArgs) -> Result<()> {
        let active = self
            .repo
            .read_active_entry()
            .await
            .context("Failed to retrieve active time entry")?
            .context("No active time entry found")?;

        if args.discard {
            self.repo
                .delete_time_entry(active.id)
                .await
                .context("Failed to discard time entry")?;
            info!("Discarded time entry {}", active.id);
        } else {
            let minutes = self
                .repo
                .stop_time(active.id)
                .await
                .context("Failed to stop time tracking")?;
            info!("Stopped time entry {} ({} minutes recorded)", active.id, minutes);
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Local, TimeZone};
    use mockall::predicate::eq;

    use super::*;
    use crate::time_entry::TimeEntry;
    use crate::tracker::MockTrackerRepository;

    fn active_entry() -> TimeEntry {
        TimeEntry {
            id: 42,
            user_id: Some(1),
            user_name: None,
            user_email: None,
            project_id: Some(2),
            project_name: Some("A".to_string()),
            task_name: Some("X".to_string()),
            description: None,
            start_time: Local.with_ymd_and_hms(2024, 3, 11, 9, 0, 0).unwrap().to_utc(),
            end_time: None,
            total_time: None,
        }
    }

    /// 計測中のエントリーが停止されることを確認する。
    #[tokio::test]
    async fn test_stop() {
        let mut repo = MockTrackerRepository::new();
        repo.expect_read_active_entry()
            .returning(|| Ok(Some(active_entry())));
        repo.expect_stop_time()
            .with(eq(42))
            .times(1)
            .returning(|_| Ok(90));

        let result = StopCommand::new(&repo).run(StopArgs { discard: false }).await;

        assert!(result.is_ok());
    }

    /// `--discard`でエントリーが削除されることを確認する。
    #[tokio::test]
    async fn test_discard() {
        let mut repo = MockTrackerRepository::new();
        repo.expect_read_active_entry()
            .returning(|| Ok(Some(active_entry())));
        repo.expect_delete_time_entry()
            .with(eq(42))
            .times(1)
            .returning(|_| Ok(()));

        let result = StopCommand::new(&repo).run(StopArgs { discard: true }).await;

        assert!(result.is_ok());
    }

    /// 計測中のエントリーが無い場合にエラーになることを確認する。
    #[tokio::test]
    async fn test_stop_without_active_entry() {
        let mut repo = MockTrackerRepository::new();
        repo.expect_read_active_entry().returning(|| Ok(None));

        let result = StopCommand::new(&repo).run(StopArgs { discard: false }).await;

        let message = format!("{:#}", result.unwrap_err());
        assert!(message.contains("No active time entry found"));
    }
}
