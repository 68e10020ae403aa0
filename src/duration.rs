use anyhow::{bail, Context, Result};

/// 割り当て時間の文字列(`HH:MM:SS`または`HH:MM`)を秒数へ変換する。
///
/// 欠損や解釈できないフィールドは0として扱い、エラーにはしない。
/// 割り当てが読めない場合は0秒 = 「割り当てなし」として集計される。
pub fn allocation_seconds(value: &str) -> i64 {
    let parts: Vec<i64> = value
        .split(':')
        .map(|part| part.trim().parse::<i64>().unwrap_or(0))
        .collect();

    match parts.as_slice() {
        [hours, minutes, seconds] => hours * 3600 + minutes * 60 + seconds,
        [hours, minutes] => hours * 3600 + minutes * 60,
        _ => 0,
    }
}

/// セル編集や行追加で入力された`HH:MM`形式の時間を秒数へ変換する。
///
/// 入力は分単位に切り詰められる(秒は編集できない)。末尾の`:SS`と
/// AM/PM表記は取り除いた上で解釈し、形式が崩れている場合はエラーを返す。
pub fn parse_hhmm(value: &str) -> Result<i64> {
    let mut cleaned = value.trim().to_string();
    let lowered = cleaned.to_lowercase();
    if lowered.ends_with("am") || lowered.ends_with("pm") {
        cleaned.truncate(cleaned.len() - 2);
        cleaned = cleaned.trim().to_string();
    }

    let mut parts: Vec<&str> = cleaned.split(':').collect();
    if parts.len() == 3 {
        parts.truncate(2);
    }
    if parts.len() != 2 {
        bail!("Invalid time format: {} (expected HH:MM)", value);
    }

    let hours: i64 = parts[0]
        .trim()
        .parse()
        .with_context(|| format!("Invalid hours in time: {}", value))?;
    let minutes: i64 = parts[1]
        .trim()
        .parse()
        .with_context(|| format!("Invalid minutes in time: {}", value))?;
    if hours < 0 || !(0..60).contains(&minutes) {
        bail!("Time out of range: {}", value);
    }

    Ok(hours * 3600 + minutes * 60)
}

/// グリッドのセルと合計値を`H:MM:SS`形式で整形する。
pub fn format_cell(seconds: i64) -> String {
    let sign = if seconds < 0 { "-" } else { "" };
    let abs = seconds.abs();
    format!(
        "{}{}:{:02}:{:02}",
        sign,
        abs / 3600,
        (abs % 3600) / 60,
        abs % 60
    )
}

/// 計測中の経過時間を`HH:MM:SS`形式で整形する。
pub fn format_clock(seconds: i64) -> String {
    let abs = seconds.max(0);
    format!(
        "{:02}:{:02}:{:02}",
        abs / 3600,
        (abs % 3600) / 60,
        abs % 60
    )
}

/// 編集用の`H:MM`形式で整形する。
pub fn format_hhmm(seconds: i64) -> String {
    let abs = seconds.max(0);
    format!("{}:{:02}", abs / 3600, (abs % 3600) / 60)
}
