use std::io::Write;

use anyhow::{Context, Result};

use crate::activity::Activity;
use crate::duration::format_cell;
use crate::tracker::Project;

/// アクティビティ行をCSVとして書き出す。
///
/// 顧客名とリージョンはプロジェクト情報から引く。1行が1アクティビティに
/// 対応し、集計済みの合計時間と作業者一覧を含む。
pub fn write_csv<W: Write>(writer: W, activities: &[Activity], projects: &[Project]) -> Result<()> {
    let mut csv_writer = csv::Writer::from_writer(writer);
    csv_writer
        .write_record([
            "Project Name",
            "Customer Name",
            "Region",
            "Task Name",
            "Project Allocated Time",
            "Task Allocated Time",
            "Time Spent",
            "Who Worked",
        ])
        .context("Failed to write csv header")?;

    for activity in activities {
        let project = activity
            .key
            .0
            .and_then(|project_id| projects.iter().find(|project| project.id == project_id));
        let who_worked = activity.user_list().join(", ");

        csv_writer
            .write_record([
                activity.project_name.clone(),
                project
                    .and_then(|project| project.customer_name.clone())
                    .unwrap_or_else(|| "-".to_string()),
                project
                    .and_then(|project| project.region.clone())
                    .unwrap_or_else(|| "-".to_string()),
                activity.task_name.clone(),
                project
                    .and_then(|project| project.allocated_time.clone())
                    .unwrap_or_else(|| "-".to_string()),
                activity
                    .allocated_time
                    .clone()
                    .unwrap_or_else(|| "-".to_string()),
                format_cell(activity.total_seconds),
                if who_worked.is_empty() {
                    "-".to_string()
                } else {
                    who_worked
                },
            ])
            .with_context(|| format!("Failed to write csv row: {}", activity.task_name))?;
    }

    csv_writer.flush().context("Failed to flush csv output")?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use chrono::NaiveDate;

    use super::*;
    use crate::activity::UserTime;

    fn activity(project_id: Option<i64>, total: i64) -> Activity {
        Activity {
            key: (project_id, "X".to_string()),
            project_name: "A".to_string(),
            task_name: "X".to_string(),
            description: String::new(),
            allocated_time: Some("01:00:00".to_string()),
            allocated_seconds: 3600,
            time_exceeded: false,
            daily_seconds: HashMap::from([(
                NaiveDate::from_ymd_opt(2024, 3, 11).unwrap(),
                total,
            )]),
            total_seconds: total,
            users: vec![UserTime {
                key: "1".to_string(),
                name: "Alice".to_string(),
                email: "alice@example.com".to_string(),
                seconds: total,
            }],
        }
    }

    /// プロジェクト情報を含めた1行が書き出されることを確認する。
    #[test]
    fn test_write_csv() {
        let projects = vec![Project {
            id: 1,
            name: "A".to_string(),
            allocated_time: Some("10:00:00".to_string()),
            customer_name: Some("Acme".to_string()),
            region: Some("EU".to_string()),
        }];
        let mut writer = Vec::new();

        write_csv(&mut writer, &[activity(Some(1), 5400)], &projects).unwrap();

        let expected = "\
Project Name,Customer Name,Region,Task Name,Project Allocated Time,Task Allocated Time,Time Spent,Who Worked
A,Acme,EU,X,10:00:00,01:00:00,1:30:00,Alice
";
        assert_eq!(String::from_utf8(writer).unwrap(), expected);
    }

    /// プロジェクトが引けない場合に`-`で埋められることを確認する。
    #[test]
    fn test_write_csv_unresolved_project() {
        let mut writer = Vec::new();

        write_csv(&mut writer, &[activity(None, 0)], &[]).unwrap();

        let output = String::from_utf8(writer).unwrap();
        assert!(output.contains("A,-,-,X,-,01:00:00,0:00:00,Alice"));
    }
}
