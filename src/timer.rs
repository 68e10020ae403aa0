use std::collections::HashMap;

use chrono::{DateTime, Local, NaiveDate, Utc};

use crate::activity::ActivityKey;

/// 現在のUTC時間を取得する。
#[cfg(not(test))]
pub fn now() -> DateTime<Utc> {
    Utc::now()
}


#[cfg(test)]
pub use mock_clock::now;

/// 今日の日付をLocalタイムゾーンで返す。
pub fn today() -> NaiveDate {
    now().with_timezone(&Local).date_naive()
}

/// 指定時刻からの経過秒数を返す。
pub fn elapsed_since(start: DateTime<Utc>) -> i64 {
    now().signed_duration_since(start).num_seconds()
}

/// 計測中アクティビティの開始時刻を保持するマップ。
///
/// 経過時間は参照のたびに時計をサンプリングして再計算する。
/// 共有の可変カウンターは持たない。
#[derive(Debug, Default)]
pub struct ActivityTimers {
    started: HashMap<ActivityKey, DateTime<Utc>>,
}

impl ActivityTimers {
    pub fn new() -> Self {
        Self::default()
    }

    /// アクティビティの計測開始を記録する。
    pub fn start(&mut self, key: ActivityKey, started_at: DateTime<Utc>) {
        self.started.insert(key, started_at);
    }

    /// アクティビティの計測記録を取り除く。
    pub fn stop(&mut self, key: &ActivityKey) {
        self.started.remove(key);
    }

    /// すべての計測記録を取り除く。
    pub fn clear(&mut self) {
        self.started.clear();
    }

    pub fn is_running(&self, key: &ActivityKey) -> bool {
        self.started.contains_key(key)
    }

    /// 計測中アクティビティの経過秒数を返す。計測していない場合は0。
    pub fn elapsed_seconds(&self, key: &ActivityKey) -> i64 {
        self.started
            .get(key)
            .map(|started_at| elapsed_since(*started_at))
            .unwrap_or(0)
    }
}
