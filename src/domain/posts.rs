use time::{format_description::FormatItem, macros::format_description};

/// Number of characters a post contributes to titles and log lines.
pub const SHORT_REPR_CHARS: usize = 15;

pub const HUMAN_DATE_FORMAT: &[FormatItem<'static>] =
    format_description!("[day padding:none] [month repr:long] [year]");
pub const ISO_DATE_FORMAT: &[FormatItem<'static>] =
    format_description!("[year]-[month]-[day]T[hour]:[minute]:[second]Z");

/// The short representation of a post: its first fifteen characters.
pub fn short_repr(text: &str) -> String {
    text.chars().take(SHORT_REPR_CHARS).collect()
}
