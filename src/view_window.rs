use std::str::FromStr;

use anyhow::{bail, Context, Error, Result};
use chrono::{Datelike, Duration, NaiveDate};

/// グリッドの表示粒度。
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ViewMode {
    Day,
    Week,
    Month,
}

impl FromStr for ViewMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "day" => Ok(ViewMode::Day),
            "week" => Ok(ViewMode::Week),
            "month" => Ok(ViewMode::Month),
            other => bail!("Unknown view mode: {} (expected day, week or month)", other),
        }
    }
}

/// 表示期間に含まれる1日分の記述子。
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ViewDay {
    pub date: NaiveDate,
    pub is_today: bool,
}

/// 現在表示している連続した日付の集合。
///
/// 日付は1日刻みで単調増加し、重複や欠落を持たない。
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ViewWindow {
    days: Vec<ViewDay>,
}

impl ViewWindow {
    /// 基準日と表示粒度から表示期間を構築する。
    ///
    /// 週表示はロケールに関わらず月曜始まり。月表示は1日から始まり、
    /// その月の実際の日数(28〜31日)をカレンダーから計算する。
    /// `is_today`は日付の一致で判定する(タイムスタンプの一致ではない)。
    pub fn build(reference: NaiveDate, mode: ViewMode, today: NaiveDate) -> Result<Self> {
        let (start, count) = match mode {
            ViewMode::Day => (reference, 1),
            ViewMode::Week => {
                let offset = reference.weekday().num_days_from_monday() as i64;
                (reference - Duration::days(offset), 7)
            }
            ViewMode::Month => {
                let first = reference
                    .with_day(1)
                    .context("Failed to set first day of month")?;
                (first, days_in_month(first)?)
            }
        };

        let days = (0..count)
            .map(|offset| {
                let date = start + Duration::days(offset);
                ViewDay {
                    date,
                    is_today: date == today,
                }
            })
            .collect();

        Ok(Self { days })
    }

    pub fn days(&self) -> &[ViewDay] {
        &self.days
    }

    pub fn first(&self) -> NaiveDate {
        self.days[0].date
    }

    pub fn last(&self) -> NaiveDate {
        self.days[self.days.len() - 1].date
    }

    /// 日付が表示期間に含まれるかを返す。両端を含む。
    pub fn contains(&self, date: NaiveDate) -> bool {
        self.first() <= date && date <= self.last()
    }
}

/// コマンドラインで指定された日付をパースする。
pub fn parse_date(s: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").with_context(|| format!("Failed to parse date: {}", s))
}

/// 指定された日付を含む月の日数を返す。
fn days_in_month(first: NaiveDate) -> Result<i64> {
    let next_month = if first.month() == 12 {
        NaiveDate::from_ymd_opt(first.year() + 1, 1, 1)
    } else {
        NaiveDate::from_ymd_opt(first.year(), first.month() + 1, 1)
    }
    .context("Failed to compute first day of next month")?;

    Ok((next_month - first).num_days())
}
