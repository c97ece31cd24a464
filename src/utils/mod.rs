//! Utility functions for string and date formatting.

pub mod format;

pub use format::{add_spaces_to_word, capitalize, format_age, format_date, truncate_string, weekday_name};
