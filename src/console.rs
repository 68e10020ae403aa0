use std::io::Write;

use anyhow::{Context, Result};

use crate::activity::{day_total, grand_total, Activity};
use crate::duration::format_cell;
use crate::view_window::{ViewDay, ViewWindow};

/// Consoleにタイムシートを表示するためのtrait。
pub trait TimesheetPresenter {
    /// 表示期間とアクティビティ行からグリッドを表示する。
    fn show_timesheet(&mut self, window: &ViewWindow, activities: &[Activity]) -> Result<()>;
}

/// タイムシートをMarkdownのtable形式で表示する。
///
/// 日付列のヘッダーには曜日・日・月を表示し、今日には`*`を付ける。
/// バケットが無い日は`-`、0秒の記録は`0:00:00`として区別する。
pub struct ConsoleMarkdownTable<'a, W: Write> {
    writer: &'a mut W,
}

impl<'a, W: Write> ConsoleMarkdownTable<'a, W> {
    /// 新しい`ConsoleMarkdownTable`を返す。
    pub fn new(writer: &'a mut W) -> Self {
        Self { writer }
    }
}

/// 日付列のヘッダーを整形する。
fn day_label(day: &ViewDay) -> String {
    let label = day.date.format("%a %-d %b").to_string();
    if day.is_today {
        format!("{}*", label)
    } else {
        label
    }
}

impl<'a, W: Write> TimesheetPresenter for ConsoleMarkdownTable<'a, W> {
    fn show_timesheet(&mut self, window: &ViewWindow, activities: &[Activity]) -> Result<()> {
        let mut header = String::from("| Activity |");
        for day in window.days() {
            header.push_str(&format!(" {} |", day_label(day)));
        }
        header.push_str(" Total | Allocated | Who worked |");
        writeln!(self.writer, "{}", header).context("Failed to write header")?;

        let columns = window.days().len() + 4;
        let separator = format!("|{}", " --- |".repeat(columns));
        writeln!(self.writer, "{}", separator).context("Failed to write separator")?;

        for activity in activities {
            let label = if activity.description.is_empty() {
                format!("{} / {}", activity.project_name, activity.task_name)
            } else {
                format!(
                    "{} / {} ({})",
                    activity.project_name, activity.task_name, activity.description
                )
            };
            let mut row = format!("| {} |", label);
            for day in window.days() {
                match activity.daily_seconds.get(&day.date) {
                    Some(seconds) => row.push_str(&format!(" {} |", format_cell(*seconds))),
                    None => row.push_str(" - |"),
                }
            }
            let total = if activity.time_exceeded {
                format!("{} (!)", format_cell(activity.total_seconds))
            } else {
                format_cell(activity.total_seconds)
            };
            row.push_str(&format!(
                " {} | {} | {} |",
                total,
                activity.allocated_time.as_deref().unwrap_or("-"),
                activity.user_list().join(", "),
            ));
            writeln!(self.writer, "{}", row)
                .with_context(|| format!("Failed to write activity row: {}", activity.task_name))?;
        }

        let mut totals = String::from("| Total |");
        for day in window.days() {
            totals.push_str(&format!(
                " {} |",
                format_cell(day_total(activities, day.date))
            ));
        }
        totals.push_str(&format!(" {} | - | - |", format_cell(grand_total(activities))));
        writeln!(self.writer, "{}", totals).context("Failed to write totals row")?;

        Ok(())
    }
}
