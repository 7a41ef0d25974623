mod auth;
mod calendar;
mod config_cmd;
mod sync_cmd;
mod workspace;

use chrono::{Local, NaiveDate};
use clap::ValueEnum;
use std::io::{self, Write};

pub use auth::AuthCommand;
pub use calendar::CalendarCommand;
pub use config_cmd::ConfigCommand;
pub use sync_cmd::SyncCommand;
pub use workspace::WorkspaceCommand;

#[derive(Clone, ValueEnum, Default)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

/// Parses `YYYY-MM-DD`, defaulting to today.
pub(crate) fn parse_date_or_today(date: Option<&str>) -> Result<NaiveDate, String> {
    match date {
        Some(d) => NaiveDate::parse_from_str(d, "%Y-%m-%d")
            .map_err(|_| format!("Invalid date format '{}'. Use YYYY-MM-DD.", d)),
        None => Ok(Local::now().date_naive()),
    }
}

/// Asks a yes/no question on stdout; anything but `y`/`yes` is no.
pub(crate) fn confirm(question: &str) -> io::Result<bool> {
    print!("{} [y/N] ", question);
    io::stdout().flush()?;

    let mut input = String::new();
    io::stdin().read_line(&mut input)?;
    Ok(matches!(input.trim().to_lowercase().as_str(), "y" | "yes"))
}

/// Formats a byte count for humans.
pub(crate) fn format_bytes(bytes: u64) -> String {
    const KB: f64 = 1024.0;
    const MB: f64 = KB * 1024.0;

    let bytes_f = bytes as f64;
    if bytes_f >= MB {
        format!("{:.2} MB", bytes_f / MB)
    } else if bytes_f >= KB {
        format!("{:.1} KB", bytes_f / KB)
    } else {
        format!("{} B", bytes)
    }
}

/// Shortens `s` to at most `max_chars`, marking the cut with "...".
pub(crate) fn truncate(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_chars.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_date_or_today() {
        assert_eq!(
            parse_date_or_today(Some("2024-02-29")).unwrap(),
            NaiveDate::from_ymd_opt(2024, 2, 29).unwrap()
        );
        assert_eq!(
            parse_date_or_today(None).unwrap(),
            Local::now().date_naive()
        );
    }

    #[test]
    fn test_parse_date_rejects_other_formats() {
        assert!(parse_date_or_today(Some("2024-2-30")).is_err());
        assert!(parse_date_or_today(Some("02/29/2024")).is_err());
    }

    #[test]
    fn test_format_bytes() {
        assert_eq!(format_bytes(512), "512 B");
        assert_eq!(format_bytes(2048), "2.0 KB");
        assert_eq!(format_bytes(5 * 1024 * 1024), "5.00 MB");
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("short", 30), "short");
        assert_eq!(truncate("abcdefghij", 8), "abcde...");
    }
}
