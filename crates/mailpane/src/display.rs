//! Derived display fields: avatars and dates.

use chrono::{DateTime, Utc};

/// Avatar background colour, chosen per sender.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AvatarColor {
    /// Purple.
    Purple,
    /// Pink.
    Pink,
    /// Cyan.
    Cyan,
    /// Green.
    Green,
    /// Orange.
    Orange,
}

impl AvatarColor {
    const PALETTE: [Self; 5] = [
        Self::Purple,
        Self::Pink,
        Self::Cyan,
        Self::Green,
        Self::Orange,
    ];

    /// ANSI escape sequence selecting this colour as background.
    #[must_use]
    pub const fn ansi(self) -> &'static str {
        match self {
            Self::Purple => "\x1b[45m",
            Self::Pink => "\x1b[105m",
            Self::Cyan => "\x1b[46m",
            Self::Green => "\x1b[42m",
            Self::Orange => "\x1b[43m",
        }
    }
}

/// Initials for an avatar: first letters of the first and last word.
#[must_use]
pub fn initials(name: &str) -> String {
    let parts: Vec<&str> = name.split_whitespace().collect();
    let first_letter = |word: &str| word.chars().next().unwrap_or('?').to_uppercase().to_string();
    match parts.as_slice() {
        [] => "?".to_string(),
        [only] => first_letter(only),
        [first, .., last] => format!("{}{}", first_letter(first), first_letter(last)),
    }
}

/// Picks the same colour for the same name every time.
#[must_use]
pub fn avatar_color(name: &str) -> AvatarColor {
    let hash: usize = name.bytes().map(usize::from).sum();
    AvatarColor::PALETTE[hash % AvatarColor::PALETTE.len()]
}

/// Short date for list rows: the time for messages from today, otherwise
/// month and day.
#[must_use]
pub fn format_list_date(at: DateTime<Utc>, now: DateTime<Utc>) -> String {
    if at.date_naive() == now.date_naive() {
        at.format("%-I:%M %p").to_string()
    } else {
        at.format("%b %-d").to_string()
    }
}

/// Full date for the message header.
#[must_use]
pub fn format_full_date(at: DateTime<Utc>) -> String {
    at.format("%a, %b %-d, %Y at %-I:%M %p").to_string()
}

/// Shortens `s` to `max_len` characters, ending in `...` when cut.
#[must_use]
pub fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let truncated: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{truncated}...")
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    #[test]
    fn test_initials() {
        assert_eq!(initials("Michael Lee"), "ML");
        assert_eq!(initials("sarah van der berg"), "SB");
        assert_eq!(initials("Cher"), "C");
        assert_eq!(initials("   "), "?");
    }

    #[test]
    fn test_avatar_color_is_stable() {
        assert_eq!(avatar_color("Michael Lee"), avatar_color("Michael Lee"));
        // "A" is 65, 65 % 5 == 0
        assert_eq!(avatar_color("A"), AvatarColor::Purple);
        assert_eq!(avatar_color("B"), AvatarColor::Pink);
    }

    #[test]
    fn test_list_date() {
        let now = Utc.with_ymd_and_hms(2024, 12, 5, 18, 0, 0).unwrap();
        let today = Utc.with_ymd_and_hms(2024, 12, 5, 9, 5, 0).unwrap();
        let earlier = Utc.with_ymd_and_hms(2024, 11, 28, 9, 5, 0).unwrap();

        assert_eq!(format_list_date(today, now), "9:05 AM");
        assert_eq!(format_list_date(earlier, now), "Nov 28");
    }

    #[test]
    fn test_full_date() {
        let at = Utc.with_ymd_and_hms(2024, 12, 5, 14, 30, 0).unwrap();
        assert_eq!(format_full_date(at), "Thu, Dec 5, 2024 at 2:30 PM");
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("a longer subject line", 10), "a longe...");
    }
}
