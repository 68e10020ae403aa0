use chrono::{DateTime, Local, NaiveDate, Utc};

/// 1件の作業時間記録を表す構造体。
///
/// `end_time`が`None`の場合は計測中のエントリーを表す。
/// `total_time`はサーバー側で停止時に記録される分単位の作業時間で、
/// start/endから秒数を計算できない場合のフォールバックとして利用する。
#[derive(Clone, Debug, PartialEq)]
pub struct TimeEntry {
    pub id: i64,
    pub user_id: Option<i64>,
    pub user_name: Option<String>,
    pub user_email: Option<String>,
    pub project_id: Option<i64>,
    pub project_name: Option<String>,
    pub task_name: Option<String>,
    pub description: Option<String>,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub total_time: Option<i64>,
}

impl TimeEntry {
    /// start/endの差分を秒単位で返す。
    ///
    /// `end_time`が未設定の場合は0を返す。分単位のフォールバックは
    /// 集計側の責務であり、ここでは適用しない。
    pub fn measured_seconds(&self) -> i64 {
        match self.end_time {
            Some(end) => end.signed_duration_since(self.start_time).num_seconds(),
            None => 0,
        }
    }

    /// 開始時刻をLocalタイムゾーンの日付に正規化して返す。
    pub fn start_day(&self) -> NaiveDate {
        self.start_time.with_timezone(&Local).date_naive()
    }

    /// 表示用のプロジェクト名を返す。
    pub fn display_project(&self) -> &str {
        self.project_name.as_deref().unwrap_or("Unknown Project")
    }

    /// 表示用のタスク名を返す。
    pub fn display_task(&self) -> &str {
        self.task_name.as_deref().unwrap_or("Unnamed Task")
    }
}
