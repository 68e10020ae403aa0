use anyhow::{bail, Context, Result};
use chrono::{DateTime, Duration, Local, NaiveDate, TimeZone, Utc};
use log::{error, info};

use crate::activity::ActivityKey;
use crate::time_entry::TimeEntry;
use crate::tracker::{NewTimeEntry, TimeEntryUpdate, TrackerRepository};

/// セルに新規エントリーを作成する際の固定開始時刻。
const CANONICAL_START_HOUR: u32 = 9;

/// セル編集を解決した結果のエントリー操作。
///
/// 編集は(アクティビティ, 日付)の1セルに対する目標時間として与えられ、
/// 0個以上のエントリー変更に展開される。
#[derive(Clone, Debug, PartialEq)]
pub enum CellPlan {
    Noop,
    Create {
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },
    SetEnd {
        entry_id: i64,
        end: DateTime<Utc>,
    },
    DeleteAll {
        entry_ids: Vec<i64>,
    },
}

/// エントリー作成時に必要になる文脈。プロジェクトと実行ユーザーが
/// 解決できない場合、編集は何も変更せずに中断される。
#[derive(Clone, Debug)]
pub struct CellContext {
    pub user_id: i64,
    pub project_id: i64,
    pub task_name: String,
    pub description: String,
}

/// 指定セル(キー×日付)に属する完了済みエントリーを抽出する。
pub fn entries_for_cell<'a>(
    entries: &'a [TimeEntry],
    key: &ActivityKey,
    date: NaiveDate,
) -> Vec<&'a TimeEntry> {
    entries
        .iter()
        .filter(|entry| entry.end_time.is_some())
        .filter(|entry| entry.project_id == key.0 && entry.display_task() == key.1)
        .filter(|entry| entry.start_day() == date)
        .collect()
}

/// セルの目標時間から必要なエントリー操作を計画する。
///
/// - 既存エントリーなし: 目標 > 0なら09:00始まりの新規作成、0なら何もしない。
/// - 既存エントリーあり: `delta = 目標 − 現在合計`を求め、
///   - `delta == 0`: 何もしない。
///   - `delta > 0`: 開始時刻順で最後のエントリーの終了時刻をdelta秒延長する。
///   - `delta < 0`: 新しい合計が0以下なら全件削除。そうでなければ最後の
///     エントリーの終了時刻を「自身の開始時刻 + 新しい合計」へ付け替える。
///     減算は最後のエントリーだけが吸収し、前のエントリーには触れない。
///
/// 現在合計はstart/endの実測値のみで数え、分単位のフォールバックは使わない。
pub fn plan_cell_edit(
    cell_entries: &[&TimeEntry],
    date: NaiveDate,
    target_seconds: i64,
) -> Result<CellPlan> {
    if cell_entries.is_empty() {
        if target_seconds <= 0 {
            return Ok(CellPlan::Noop);
        }
        let start = canonical_start(date)?;
        return Ok(CellPlan::Create {
            start,
            end: start + Duration::seconds(target_seconds),
        });
    }

    let current: i64 = cell_entries
        .iter()
        .map(|entry| entry.measured_seconds())
        .sum();
    let delta = target_seconds - current;
    if delta == 0 {
        return Ok(CellPlan::Noop);
    }

    let mut sorted: Vec<&TimeEntry> = cell_entries.to_vec();
    sorted.sort_by_key(|entry| entry.start_time);
    let last = sorted[sorted.len() - 1];

    if delta > 0 {
        let end = last
            .end_time
            .context("Last entry has no end time")?
            + Duration::seconds(delta);
        return Ok(CellPlan::SetEnd {
            entry_id: last.id,
            end,
        });
    }

    let new_total = current + delta;
    if new_total <= 0 {
        return Ok(CellPlan::DeleteAll {
            entry_ids: sorted.iter().map(|entry| entry.id).collect(),
        });
    }

    Ok(CellPlan::SetEnd {
        entry_id: last.id,
        end: last.start_time + Duration::seconds(new_total),
    })
}

/// 指定日の09:00(Local)をUTCへ変換して返す。
pub(crate) fn canonical_start(date: NaiveDate) -> Result<DateTime<Utc>> {
    let naive = date
        .and_hms_opt(CANONICAL_START_HOUR, 0, 0)
        .context("Failed to build canonical start time")?;
    let local = Local
        .from_local_datetime(&naive)
        .single()
        .with_context(|| format!("Failed to resolve 09:00 local time on {}", date))?;

    Ok(local.to_utc())
}

/// 新規セルエントリーを作成する。
pub async fn create_cell_entry<T: TrackerRepository>(
    repo: &T,
    context: &CellContext,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
) -> Result<()> {
    let entry = NewTimeEntry {
        user_id: context.user_id,
        project_id: context.project_id,
        task_name: context.task_name.clone(),
        description: context.description.clone(),
        start_time: start.to_rfc3339(),
        end_time: end.to_rfc3339(),
    };
    repo.create_time_entry(&entry)
        .await
        .context("Failed to create time entry")?;
    info!("Created cell entry: {} ~ {}", entry.start_time, entry.end_time);

    Ok(())
}

/// エントリーの終了時刻を付け替える。
pub async fn set_entry_end<T: TrackerRepository>(
    repo: &T,
    entry_id: i64,
    end: DateTime<Utc>,
) -> Result<()> {
    let update = TimeEntryUpdate {
        end_time: Some(end.to_rfc3339()),
        ..Default::default()
    };
    repo.update_time_entry(entry_id, &update)
        .await
        .with_context(|| format!("Failed to update time entry {}", entry_id))?;
    info!("Updated end time of entry {} to {}", entry_id, end.to_rfc3339());

    Ok(())
}

/// セルの全エントリーを削除する。
///
/// 削除は1件ずつ独立して行い、失敗してもロールバックや中断はしない。
/// 1件でも失敗した場合は最後にまとめてエラーを返す。
pub async fn delete_cell_entries<T: TrackerRepository>(
    repo: &T,
    entry_ids: &[i64],
) -> Result<()> {
    let mut failed = 0usize;
    for entry_id in entry_ids {
        if let Err(err) = repo.delete_time_entry(*entry_id).await {
            error!("Failed to delete time entry {}: {:#}", entry_id, err);
            failed += 1;
        }
    }
    if failed > 0 {
        bail!("Failed to delete {} of {} time entries", failed, entry_ids.len());
    }

    Ok(())
}
