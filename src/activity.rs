use std::collections::HashMap;
use std::str::FromStr;

use anyhow::{bail, Error, Result};
use chrono::NaiveDate;

use crate::duration::allocation_seconds;
use crate::time_entry::TimeEntry;
use crate::tracker::Task;
use crate::view_window::ViewWindow;

/// アクティビティのグループ化キー。(プロジェクトid, タスク名)の組。
pub type ActivityKey = (Option<i64>, String);

/// 1人のユーザーがアクティビティに費やした時間。
#[derive(Clone, Debug, PartialEq)]
pub struct UserTime {
    pub key: String,
    pub name: String,
    pub email: String,
    pub seconds: i64,
}

/// (プロジェクト, タスク)の組ごとに集計された派生行。永続化はしない。
///
/// 不変条件: 表示期間内の完了済みエントリーについて、日別バケットの合計 ==
/// `total_seconds` == ユーザー別バケットの合計。
#[derive(Clone, Debug, PartialEq)]
pub struct Activity {
    pub key: ActivityKey,
    pub project_name: String,
    pub task_name: String,
    pub description: String,
    pub allocated_time: Option<String>,
    pub allocated_seconds: i64,
    pub time_exceeded: bool,
    pub daily_seconds: HashMap<NaiveDate, i64>,
    pub total_seconds: i64,
    pub users: Vec<UserTime>,
}

impl Activity {
    /// 指定日のセル値を秒数で返す。バケットが無い日は0。
    pub fn seconds_for_day(&self, date: NaiveDate) -> i64 {
        self.daily_seconds.get(&date).copied().unwrap_or(0)
    }

    /// このアクティビティで作業したユーザー名の一覧を返す。
    pub fn user_list(&self) -> Vec<&str> {
        self.users
            .iter()
            .map(|user| {
                if user.name.is_empty() {
                    user.email.as_str()
                } else {
                    user.name.as_str()
                }
            })
            .collect()
    }

    /// 名前またはメールアドレスからユーザーの作業時間を引く。
    pub fn seconds_for_user(&self, name: &str) -> i64 {
        self.users
            .iter()
            .find(|user| user.name == name || user.email == name)
            .map(|user| user.seconds)
            .unwrap_or(0)
    }
}

/// テキスト検索の対象フィールド。
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SearchField {
    Task,
    Project,
    Description,
    #[default]
    Any,
}

impl FromStr for SearchField {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "task" => Ok(SearchField::Task),
            "project" => Ok(SearchField::Project),
            "description" => Ok(SearchField::Description),
            "any" => Ok(SearchField::Any),
            other => bail!(
                "Unknown search field: {} (expected task, project, description or any)",
                other
            ),
        }
    }
}

/// 集計前にエントリーへ適用するフィルター。
///
/// 適用順はテキスト検索 → プロジェクト → 所有者。
#[derive(Clone, Debug, Default)]
pub struct EntryFilter {
    pub search: Option<String>,
    pub search_field: SearchField,
    pub project_id: Option<i64>,
    pub user_id: Option<i64>,
}

impl EntryFilter {
    /// エントリーがすべてのフィルターを通過するかを返す。
    ///
    /// テキスト検索は選択フィールドに対する大文字小文字を無視した
    /// 部分一致。空白のみの検索語は無視する。
    pub fn matches(&self, entry: &TimeEntry) -> bool {
        if let Some(term) = self
            .search
            .as_deref()
            .map(str::trim)
            .filter(|term| !term.is_empty())
        {
            let term = term.to_lowercase();
            let hits = |value: Option<&str>| value.unwrap_or("").to_lowercase().contains(&term);
            let hit = match self.search_field {
                SearchField::Task => hits(entry.task_name.as_deref()),
                SearchField::Project => hits(entry.project_name.as_deref()),
                SearchField::Description => hits(entry.description.as_deref()),
                SearchField::Any => {
                    hits(entry.task_name.as_deref())
                        || hits(entry.project_name.as_deref())
                        || hits(entry.description.as_deref())
                }
            };
            if !hit {
                return false;
            }
        }

        if let Some(project_id) = self.project_id {
            if entry.project_id != Some(project_id) {
                return false;
            }
        }

        if let Some(user_id) = self.user_id {
            if entry.user_id != Some(user_id) {
                return false;
            }
        }

        true
    }
}

/// エントリー1件の集計対象秒数を返す。
///
/// start/endの差分が0になる場合は、分単位で保存された`total_time`を
/// 秒数へ変換してフォールバックとする。
fn entry_seconds(entry: &TimeEntry) -> i64 {
    let seconds = entry.measured_seconds();
    if seconds == 0 {
        if let Some(minutes) = entry.total_time {
            return minutes * 60;
        }
    }
    seconds
}

/// エントリー一覧を表示期間とフィルターの下でアクティビティ行へ集計する。
///
/// 計測中(endなし)のエントリーはグリッドに表示しない。開始日が期間外の
/// エントリーは全体を除外する(日付は深夜0時へ正規化して両端含みで比較)。
/// 出力順は初出のエントリー順で安定しており、ソートは行わない。
pub fn aggregate(
    entries: &[TimeEntry],
    window: &ViewWindow,
    filter: &EntryFilter,
    tasks_by_project: &HashMap<i64, Vec<Task>>,
) -> Vec<Activity> {
    let mut activities: Vec<Activity> = Vec::new();
    let mut index: HashMap<ActivityKey, usize> = HashMap::new();

    for entry in entries.iter().filter(|entry| filter.matches(entry)) {
        if entry.end_time.is_none() {
            continue;
        }
        let day = entry.start_day();
        if !window.contains(day) {
            continue;
        }

        let key: ActivityKey = (entry.project_id, entry.display_task().to_string());
        let position = match index.get(&key) {
            Some(&position) => position,
            None => {
                let allocated_time = entry
                    .project_id
                    .and_then(|project_id| tasks_by_project.get(&project_id))
                    .and_then(|tasks| tasks.iter().find(|task| task.title == entry.display_task()))
                    .and_then(|task| task.allocated_time.clone());
                let allocated_seconds = allocated_time
                    .as_deref()
                    .map(allocation_seconds)
                    .unwrap_or(0);

                activities.push(Activity {
                    key: key.clone(),
                    project_name: entry.display_project().to_string(),
                    task_name: entry.display_task().to_string(),
                    description: entry.description.clone().unwrap_or_default(),
                    allocated_time,
                    allocated_seconds,
                    time_exceeded: false,
                    daily_seconds: HashMap::new(),
                    total_seconds: 0,
                    users: Vec::new(),
                });
                index.insert(key, activities.len() - 1);
                activities.len() - 1
            }
        };

        let activity = &mut activities[position];
        let seconds = entry_seconds(entry);

        let user_key = entry
            .user_id
            .map(|id| id.to_string())
            .or_else(|| entry.user_email.clone())
            .unwrap_or_else(|| "Unknown User".to_string());
        match activity.users.iter_mut().find(|user| user.key == user_key) {
            Some(user) => user.seconds += seconds,
            None => activity.users.push(UserTime {
                key: user_key,
                name: entry
                    .user_name
                    .clone()
                    .or_else(|| entry.user_email.clone())
                    .unwrap_or_else(|| "Unknown User".to_string()),
                email: entry
                    .user_email
                    .clone()
                    .unwrap_or_else(|| "Unknown User".to_string()),
                seconds,
            }),
        }

        // 0秒も記録された値として日別バケットを作る
        *activity.daily_seconds.entry(day).or_insert(0) += seconds;
        activity.total_seconds += seconds;
    }

    for activity in &mut activities {
        if activity.allocated_seconds > 0 {
            activity.time_exceeded = activity.total_seconds > activity.allocated_seconds;
        }
    }

    activities
}

/// 指定日の列合計を秒数で返す。
pub fn day_total(activities: &[Activity], date: NaiveDate) -> i64 {
    activities
        .iter()
        .map(|activity| activity.seconds_for_day(date))
        .sum()
}

/// 全アクティビティの総合計を秒数で返す。
pub fn grand_total(activities: &[Activity]) -> i64 {
    activities.iter().map(|activity| activity.total_seconds).sum()
}
