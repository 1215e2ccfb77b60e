//! HTML and JSON parsers for metal-archives.com responses
//!
//! This module contains parsers for extracting entities from fetched pages:
//! - `scalar`: Durations, genres, dates, timestamps and ids
//! - `entity`: Label/value lookups over detail pages
//! - `band`: Band page and discography
//! - `album`: Album page and track list
//! - `lyrics`: Lyrics fragment
//! - `search`: Advanced search JSON rows

pub mod album;
pub mod band;
pub mod entity;
pub mod lyrics;
pub mod scalar;
pub mod search;

use scraper::Selector;

use crate::error::{MetallumError, Result};

// Re-export main parsing functions
pub use album::{parse_album, parse_reviews};
pub use band::{parse_band, parse_discography};
pub use entity::{element_text, EntityView};
pub use lyrics::parse_lyrics;
pub use scalar::{
    extract_trailing_id, format_duration, offset_time, parse_duration, parse_release_date,
    parse_timestamp, split_genres, squash_whitespace, UNKNOWN, UTC_OFFSET_HOURS,
};
pub use search::{decode_cell, parse_envelope, parse_search_page, RawRow, SearchEnvelope, SearchRow};

pub(crate) fn selector(css: &str) -> Result<Selector> {
    Selector::parse(css).map_err(|e| MetallumError::ParseError(format!("selector '{}': {}", css, e)))
}
