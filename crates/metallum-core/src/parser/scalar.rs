//! Scalar value parsers shared by all page parsers
//!
//! Durations, genre lists, release dates, server timestamps and ids
//! embedded in URLs.

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, Utc};

/// Placeholder shown for missing or non-positive values
pub const UNKNOWN: &str = "unknown";

/// Hours to add to origin timestamps to get UTC
pub const UTC_OFFSET_HOURS: i64 = 3;

/// Parse a duration string into seconds.
///
/// The last colon group is seconds, the one before it minutes and an
/// optional leading group hours.
///
/// # Examples
/// ```
/// use metallum_core::parser::parse_duration;
///
/// assert_eq!(parse_duration("00:01"), Some(1));
/// assert_eq!(parse_duration("03:33"), Some(213));
/// assert_eq!(parse_duration("01:14:00"), Some(4440));
/// assert_eq!(parse_duration(""), None);
/// ```
pub fn parse_duration(s: &str) -> Option<u32> {
    let parts: Vec<&str> = s.trim().split(':').collect();
    if parts.len() > 3 {
        return None;
    }

    let mut seconds = 0u32;
    let mut unit = 1u32;
    for part in parts.iter().rev() {
        let value: u32 = part.trim().parse().ok()?;
        seconds = seconds.checked_add(value.checked_mul(unit)?)?;
        unit *= 60;
    }
    Some(seconds)
}

/// Render seconds as `H:MM:SS` or `M:SS`; zero and negative values render as
/// [`UNKNOWN`].
///
/// # Examples
/// ```
/// use metallum_core::parser::format_duration;
///
/// assert_eq!(format_duration(313), "5:13");
/// assert_eq!(format_duration(4440), "1:14:00");
/// assert_eq!(format_duration(0), "unknown");
/// ```
pub fn format_duration(seconds: i64) -> String {
    if seconds <= 0 {
        return UNKNOWN.to_string();
    }
    let (minutes, secs) = (seconds / 60, seconds % 60);
    let (hours, minutes) = (minutes / 60, minutes % 60);
    if hours > 0 {
        format!("{}:{:02}:{:02}", hours, minutes, secs)
    } else {
        format!("{}:{:02}", minutes, secs)
    }
}

/// Split a genre string on commas and semicolons outside parentheses.
///
/// # Examples
/// ```
/// use metallum_core::parser::split_genres;
///
/// assert_eq!(
///     split_genres("Heavy Metal/Hard Rock (early, later), Thrash Metal (mid)"),
///     vec!["Heavy Metal/Hard Rock (early, later)", "Thrash Metal (mid)"]
/// );
/// ```
pub fn split_genres(s: &str) -> Vec<String> {
    let mut genres = Vec::new();
    let mut current = String::new();
    let mut depth = 0usize;

    for c in s.chars() {
        match c {
            '(' => {
                depth += 1;
                current.push(c);
            }
            ')' => {
                depth = depth.saturating_sub(1);
                current.push(c);
            }
            ',' | ';' if depth == 0 => {
                push_genre(&mut genres, &current);
                current.clear();
            }
            _ => current.push(c),
        }
    }
    push_genre(&mut genres, &current);

    genres
}

fn push_genre(genres: &mut Vec<String>, raw: &str) {
    let genre = raw.trim();
    if !genre.is_empty() {
        genres.push(genre.to_string());
    }
}

/// Shift an origin timestamp to UTC.
pub fn offset_time(t: NaiveDateTime) -> DateTime<Utc> {
    (t + Duration::hours(UTC_OFFSET_HOURS)).and_utc()
}

/// Parse an origin timestamp such as `2002-07-23 15:47:09` and shift it to UTC.
///
/// Returns `None` for placeholders like `N/A`.
pub fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(s.trim(), "%Y-%m-%d %H:%M:%S")
        .ok()
        .map(offset_time)
}

/// Parse a release date as written on album pages.
///
/// Accepts `March 3rd, 1986`, `March 1986` and `1986`; missing day or
/// month default to the first.
pub fn parse_release_date(s: &str) -> Option<NaiveDate> {
    let re = regex_lite::Regex::new(r"^([A-Za-z]+)\s+(?:(\d{1,2})(?:st|nd|rd|th)?,\s*)?(\d{4})$").ok()?;
    let text = s.trim();

    if let Some(caps) = re.captures(text) {
        let month = caps.get(1)?.as_str();
        let day = caps.get(2).map_or("1", |m| m.as_str());
        let year = caps.get(3)?.as_str();
        return NaiveDate::parse_from_str(&format!("{} {} {}", month, day, year), "%B %d %Y").ok();
    }

    let year: i32 = text.parse().ok()?;
    NaiveDate::from_ymd_opt(year, 1, 1)
}

/// Extract the numeric id at the end of a URL.
///
/// # Examples
/// ```
/// use metallum_core::parser::extract_trailing_id;
///
/// assert_eq!(extract_trailing_id("https://www.metal-archives.com/bands/Metallica/125"), Some(125));
/// assert_eq!(extract_trailing_id("/albums/Metallica/Master_of_Puppets/547/"), Some(547));
/// assert_eq!(extract_trailing_id("javascript:;"), None);
/// ```
pub fn extract_trailing_id(url: &str) -> Option<u64> {
    let trimmed = url.trim().trim_end_matches('/');
    let digits = trimmed.chars().rev().take_while(char::is_ascii_digit).count();
    let id: u64 = trimmed[trimmed.len() - digits..].parse().ok()?;
    (id > 0).then_some(id)
}

/// Collapse runs of whitespace into single spaces.
pub fn squash_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}
