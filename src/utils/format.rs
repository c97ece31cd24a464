use chrono::{DateTime, Duration, Utc};

/// Insert a space before every upper-case ASCII letter after the first
/// character, e.g. `"OnVentilatorCurrently"` -> `"On Ventilator Currently"`.
pub fn add_spaces_to_word(word: &str) -> String {
    let mut spaced = String::with_capacity(word.len() + 4);
    for (i, c) in word.chars().enumerate() {
        if i > 0 && c.is_ascii_uppercase() {
            spaced.push(' ');
        }
        spaced.push(c);
    }
    spaced
}

/// Upper-case the first character, leaving the rest untouched.
pub fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Format a timestamp as `MM/DD/YYYY`
pub fn format_date(timestamp: &DateTime<Utc>) -> String {
    timestamp.format("%m/%d/%Y").to_string()
}

/// Full English weekday name ("Monday")
pub fn weekday_name(timestamp: &DateTime<Utc>) -> String {
    timestamp.format("%A").to_string()
}

/// Coarse age for status lines: "just now", "5m ago", "2h ago", "3d ago".
/// Hours and days are rounded to the nearest unit.
pub fn format_age(age: Duration) -> String {
    const MINUTES_PER_HOUR: i64 = 60;
    const MINUTES_PER_DAY: i64 = 24 * MINUTES_PER_HOUR;

    // Negative ages come from clock skew
    let minutes = age.num_minutes();
    if minutes < 1 {
        "just now".to_string()
    } else if minutes < MINUTES_PER_HOUR {
        format!("{}m ago", minutes)
    } else if minutes < MINUTES_PER_DAY {
        format!("{}h ago", (minutes + MINUTES_PER_HOUR / 2) / MINUTES_PER_HOUR)
    } else {
        format!("{}d ago", (minutes + MINUTES_PER_DAY / 2) / MINUTES_PER_DAY)
    }
}

/// Truncate a string to a maximum length, adding ellipsis if needed
pub fn truncate_string(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else if max_len <= 3 {
        s.chars().take(max_len).collect()
    } else {
        let truncated: String = s.chars().take(max_len - 3).collect();
        format!("{}...", truncated)
    }
}
