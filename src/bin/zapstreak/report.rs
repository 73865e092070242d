//! Human-readable startup and statistics output.

use anyhow::Result;
use chrono::{DateTime, Duration, Local, NaiveTime};
use std::path::Path;
use zapstreak::config::ZapSettings;
use zapstreak::store::{DateRange, EventStore, Statistics};
use zapstreak::streak::StreakClock;

use crate::cli_utils::open_store;

pub(crate) fn startup_lines(
    settings: &ZapSettings,
    clock: &StreakClock,
    now: DateTime<Local>,
) -> Vec<String> {
    let mut lines = vec![
        format!("Logging threshold: {}", settings.logging_threshold),
        if settings.trigger_threshold > 0.0 {
            format!("Trigger threshold: {}", settings.trigger_threshold)
        } else {
            "Trigger threshold: disabled".to_string()
        },
        format!("Cooldown: {}", format_duration(clock.cooldown)),
        format!(
            "Multi-kill window: {}",
            format_duration(clock.multi_kill_window)
        ),
    ];

    let windows = clock.quiet_hours.windows();
    if windows.is_empty() {
        lines.push("Quiet hours: none".to_string());
        return lines;
    }
    for window in windows {
        lines.push(format!("Quiet hours: {window}"));
    }
    match clock.time_until_quiet_hours_end(now) {
        Some(remaining) if clock.during_quiet_hours(now) => lines.push(format!(
            "Quiet hours active; kills count again in {}",
            format_duration(remaining)
        )),
        Some(remaining) => lines.push(format!(
            "Quiet hours begin in {}",
            format_duration(remaining)
        )),
        None => {}
    }
    lines
}

/// `5h 30m`, `12m 5s`, `4s`, `250ms`.
pub(crate) fn format_duration(duration: Duration) -> String {
    let total_ms = duration.num_milliseconds().max(0);
    if total_ms < 1_000 {
        return format!("{total_ms}ms");
    }
    let total_secs = total_ms / 1_000;
    let hours = total_secs / 3_600;
    let minutes = (total_secs % 3_600) / 60;
    let seconds = total_secs % 60;
    match (hours, minutes) {
        (0, 0) => format!("{seconds}s"),
        (0, _) if seconds > 0 => format!("{minutes}m {seconds}s"),
        (0, _) => format!("{minutes}m"),
        _ => format!("{hours}h {minutes}m"),
    }
}

fn format_hour(hour: u32) -> String {
    NaiveTime::from_hms_opt(hour, 0, 0)
        .map(|time| time.format("%-I %p").to_string())
        .unwrap_or_else(|| format!("{hour}:00"))
}

pub(crate) fn statistics_lines(
    today_score: u32,
    week: &Statistics,
    all_time: &Statistics,
) -> Vec<String> {
    let mut lines = vec![format!("Kills today: {today_score}"), "Last 7 days:".to_string()];
    if week.daily_scores.is_empty() {
        lines.push("  no kills recorded".to_string());
    }
    for day in &week.daily_scores {
        lines.push(format!("  {}  {}", day.date.format("%a %Y-%m-%d"), day.score));
    }
    lines.push(format!(
        "Total (7 days): {}  Average per active day: {:.1}",
        week.total_kills, week.average_daily_kills
    ));
    if let Some(best) = &all_time.best_day {
        lines.push(format!(
            "All-time high: {} on {}",
            best.score,
            best.date.format("%Y-%m-%d")
        ));
    }
    lines.push(format!(
        "All-time kills: {}  Average per active day: {:.1}",
        all_time.total_kills, all_time.average_daily_kills
    ));
    if let Some(busiest) = all_time.busiest_hour {
        lines.push(format!(
            "Busiest hour: {} ({} kills)",
            format_hour(busiest.hour),
            busiest.kills
        ));
    }
    if !all_time.hourly.is_empty() {
        lines.push("Kills by hour:".to_string());
        for hour in &all_time.hourly {
            lines.push(format!("  {:>5}  {}", format_hour(hour.hour), hour.kills));
        }
    }
    lines
}

pub(crate) fn print_statistics(database: &Path, now: DateTime<Local>) -> Result<()> {
    let store = open_store(database)?;
    let today = now.date_naive();
    let week = store.statistics(DateRange::last_days(today, 7))?;
    let all_time = store.statistics(DateRange::all())?;
    for line in statistics_lines(store.daily_score(today)?, &week, &all_time) {
        println!("{line}");
    }
    for averages in store.feature_averages()? {
        println!(
            "{} events: {}  avg duration {:.3}s  avg dominant {:.0} Hz  avg high ratio {:.2}",
            if averages.is_zap { "Zap" } else { "Other" },
            averages.count,
            averages.duration,
            averages.dominant_frequency,
            averages.high_energy_ratio
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, TimeZone};
    use zapstreak::store::{DailyScore, HourlyCount};
    use zapstreak::streak::{QuietHours, QuietWindow};

    fn at(hour: u32, minute: u32) -> DateTime<Local> {
        Local
            .with_ymd_and_hms(2026, 6, 15, hour, minute, 0)
            .earliest()
            .expect("valid local time")
    }

    fn quiet_clock() -> StreakClock {
        let window = QuietWindow::parse("00:00", "08:00").expect("window");
        StreakClock {
            quiet_hours: QuietHours::new(vec![window]),
            ..StreakClock::default()
        }
    }

    #[test]
    fn formats_durations() {
        assert_eq!(format_duration(Duration::milliseconds(250)), "250ms");
        assert_eq!(format_duration(Duration::seconds(4)), "4s");
        assert_eq!(format_duration(Duration::seconds(60)), "1m");
        assert_eq!(format_duration(Duration::seconds(725)), "12m 5s");
        assert_eq!(format_duration(Duration::minutes(330)), "5h 30m");
    }

    #[test]
    fn startup_report_inside_quiet_hours() {
        let lines = startup_lines(&ZapSettings::default(), &quiet_clock(), at(3, 0));
        assert!(lines.contains(&"Quiet hours: 12:00 AM to 8:00 AM".to_string()));
        assert!(lines.contains(&"Quiet hours active; kills count again in 5h 0m".to_string()));
    }

    #[test]
    fn startup_report_outside_quiet_hours() {
        let lines = startup_lines(&ZapSettings::default(), &quiet_clock(), at(21, 30));
        assert!(lines.contains(&"Quiet hours begin in 2h 30m".to_string()));
        assert!(lines.contains(&"Cooldown: 4s".to_string()));
    }

    #[test]
    fn statistics_report_lists_days_and_busiest_hour() {
        let day = NaiveDate::from_ymd_opt(2026, 6, 14).expect("date");
        let stats = Statistics {
            daily_scores: vec![DailyScore { date: day, score: 4 }],
            total_kills: 4,
            best_day: Some(DailyScore { date: day, score: 4 }),
            average_daily_kills: 4.0,
            busiest_hour: Some(HourlyCount { hour: 21, kills: 3 }),
            hourly: vec![HourlyCount { hour: 21, kills: 3 }],
        };
        let lines = statistics_lines(2, &stats, &stats);
        assert_eq!(lines[0], "Kills today: 2");
        assert!(lines.contains(&"  Sun 2026-06-14  4".to_string()));
        assert!(lines.contains(&"All-time high: 4 on 2026-06-14".to_string()));
        assert!(lines.contains(&"Busiest hour: 9 PM (3 kills)".to_string()));
        assert_eq!(lines.last().map(String::as_str), Some("   9 PM  3"));
    }
}
