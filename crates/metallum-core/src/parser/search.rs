//! Search response parser for metal-archives.com
//!
//! Advanced searches answer with a JSON envelope
//! `{"aaData": [[cell, ...], ...], "iTotalRecords": n}`. Each row is a fixed
//! list of HTML-ish cells whose meaning depends on the search kind. The
//! per-kind column layout lives in one decoding function per row type.

use scraper::{Html, Selector};
use serde::Deserialize;
use serde_json::Value;

use crate::collection::Collection;
use crate::error::{MetallumError, Result};
use crate::types::{
    AlbumRef, AlbumResult, AlbumType, BandRef, BandResult, SearchPage, SongResult,
};

use super::scalar::{extract_trailing_id, split_genres, squash_whitespace};

/// Raw JSON envelope of a search response
#[derive(Debug, Clone, Deserialize)]
pub struct SearchEnvelope {
    /// Rows of the current page
    #[serde(rename = "aaData", default)]
    pub rows: Vec<Vec<Value>>,
    /// Matches across all pages
    #[serde(rename = "iTotalRecords", default)]
    pub total_record_count: u64,
}

/// One search row: decoded cell texts plus the raw markup they came from.
#[derive(Debug, Clone, PartialEq)]
pub struct RawRow {
    /// Cell values after anchor/lyrics-link extraction
    pub cells: Vec<String>,
    /// Cells exactly as received
    pub raw: Vec<String>,
}

impl RawRow {
    /// Build a row from raw cells, extracting anchors as it goes.
    pub fn new(raw: Vec<String>) -> Self {
        let cells = raw.iter().map(|cell| decode_cell(cell)).collect();
        Self { cells, raw }
    }

    fn require(&self, kind: &'static str, expected: usize) -> Result<()> {
        if self.cells.len() < expected {
            return Err(MetallumError::MalformedRow {
                kind,
                expected,
                found: self.cells.len(),
            });
        }
        Ok(())
    }
}

/// Row types produced by a search.
pub trait SearchRow: Sized {
    /// Row kind used in error messages
    const KIND: &'static str;

    /// Decode one row according to this kind's column layout.
    fn from_row(row: RawRow) -> Result<Self>;
}

/// Decode a single cell.
///
/// An anchor carrying a `lyricsLink_<id>` id yields the id; any other anchor
/// yields its visible text; everything else is kept as is.
///
/// # Examples
/// ```
/// use metallum_core::parser::decode_cell;
///
/// assert_eq!(decode_cell(r#"<a href="javascript:;" id="lyricsLink_3449">Show lyrics</a>"#), "3449");
/// assert_eq!(decode_cell(r#"<a href="https://www.metal-archives.com/bands/Metallica/125">Metallica</a>"#), "Metallica");
/// assert_eq!(decode_cell("United States"), "United States");
/// ```
pub fn decode_cell(raw: &str) -> String {
    if !raw.starts_with("<a href") {
        return raw.to_string();
    }

    if let Some(id) = lyrics_link_id(raw) {
        return id;
    }

    anchors(raw)
        .into_iter()
        .map(|(_, text)| text)
        .collect::<Vec<_>>()
        .join(" / ")
}

fn lyrics_link_id(raw: &str) -> Option<String> {
    let re = regex_lite::Regex::new(r#"id="lyricsLink_(\d+)""#).ok()?;
    let caps = re.captures(raw)?;
    Some(caps.get(1)?.as_str().to_string())
}

/// `(href, text)` of every anchor in a markup fragment.
pub fn anchors(fragment: &str) -> Vec<(String, String)> {
    let html = Html::parse_fragment(fragment);
    let Ok(selector) = Selector::parse("a") else {
        return Vec::new();
    };
    html.select(&selector)
        .map(|a| {
            let href = a.value().attr("href").unwrap_or_default().to_string();
            let text = squash_whitespace(&a.text().collect::<String>());
            (href, text)
        })
        .collect()
}

/// `href` of the first anchor in a fragment.
fn first_href(fragment: &str) -> Option<String> {
    anchors(fragment)
        .into_iter()
        .map(|(href, _)| href)
        .find(|href| !href.is_empty())
}

/// Bands linked from a fragment (several on split releases).
fn band_refs(fragment: &str) -> Vec<BandRef> {
    anchors(fragment)
        .into_iter()
        .filter_map(|(href, name)| {
            let id = extract_trailing_id(&href)?;
            Some(BandRef { id, name })
        })
        .collect()
}

/// Text of a cell with HTML comments and tags stripped.
fn plain_text(cell: &str) -> String {
    let html = Html::parse_fragment(cell);
    squash_whitespace(&html.root_element().text().collect::<String>())
}

/// Date hidden in a `<!-- 1986-03-03 -->` comment.
fn comment_date(cell: &str) -> Option<chrono::NaiveDate> {
    let re = regex_lite::Regex::new(r"<!--\s*(\d{4})-(\d{2})-(\d{2})\s*-->").ok()?;
    let caps = re.captures(cell)?;
    let year: i32 = caps.get(1)?.as_str().parse().ok()?;
    let month: u32 = caps.get(2)?.as_str().parse().ok()?;
    let day: u32 = caps.get(3)?.as_str().parse().ok()?;
    chrono::NaiveDate::from_ymd_opt(year, month.max(1), day.max(1))
}

fn cell_string(value: Value) -> String {
    match value {
        Value::String(s) => s,
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Decode the JSON envelope of a search response.
///
/// # Errors
/// Returns `MetallumError::Json` if the body is not a valid envelope.
pub fn parse_envelope(body: &str) -> Result<SearchEnvelope> {
    Ok(serde_json::from_str(body)?)
}

/// Decode a search response into a page of typed rows.
///
/// # Errors
/// - `MetallumError::Json` - body is not a search envelope
/// - `MetallumError::MalformedRow` - a row is shorter than its kind requires
pub fn parse_search_page<T: SearchRow>(body: &str, page_start: u64) -> Result<SearchPage<T>> {
    let envelope = parse_envelope(body)?;
    let results = envelope
        .rows
        .into_iter()
        .map(|row| T::from_row(RawRow::new(row.into_iter().map(cell_string).collect())))
        .collect::<Result<Collection<T>>>()?;

    Ok(SearchPage::new(results, envelope.total_record_count, page_start))
}

/// Band rows: `[name link, genre, country, ...other]`.
impl SearchRow for BandResult {
    const KIND: &'static str = "band";

    fn from_row(row: RawRow) -> Result<Self> {
        row.require(Self::KIND, 3)?;

        let id = first_href(&row.raw[0])
            .as_deref()
            .and_then(extract_trailing_id)
            .ok_or_else(|| MetallumError::ElementNotFound("band link in search row".to_string()))?;

        let mut cells = row.cells.into_iter();
        let name = cells.next().unwrap_or_default();
        let genres = split_genres(&cells.next().unwrap_or_default());
        let country = cells.next().unwrap_or_default();
        let other = cells.map(|cell| plain_text(&cell)).collect();

        Ok(Self {
            id,
            name,
            genres,
            country,
            other,
        })
    }
}

/// Album rows: `[band link(s), album link, type, ...other (date first)]`.
impl SearchRow for AlbumResult {
    const KIND: &'static str = "album";

    fn from_row(row: RawRow) -> Result<Self> {
        row.require(Self::KIND, 3)?;

        let id = first_href(&row.raw[1])
            .as_deref()
            .and_then(extract_trailing_id)
            .ok_or_else(|| MetallumError::ElementNotFound("album link in search row".to_string()))?;
        let bands = band_refs(&row.raw[0]);
        let release_date = row.raw.get(3).and_then(|cell| comment_date(cell));

        let mut cells = row.cells.into_iter();
        let band_name = cells.next().unwrap_or_default();
        let title = cells.next().unwrap_or_default();
        let album_type = AlbumType::from_label(&cells.next().unwrap_or_default());
        let other = cells.map(|cell| plain_text(&cell)).collect();

        Ok(Self {
            id,
            title,
            album_type,
            band_name,
            bands,
            release_date,
            other,
        })
    }
}

/// Song rows: `[band link(s), album link, type, title, genres, lyrics link]`.
impl SearchRow for SongResult {
    const KIND: &'static str = "song";

    fn from_row(row: RawRow) -> Result<Self> {
        row.require(Self::KIND, 6)?;

        let bands = band_refs(&row.raw[0]);
        let album = first_href(&row.raw[1])
            .as_deref()
            .and_then(extract_trailing_id)
            .map(|id| AlbumRef {
                id,
                title: row.cells[1].clone(),
            });
        let id = row.cells[5].trim().parse().ok();
        let genres = row.cells[4]
            .split(" | ")
            .flat_map(|group| split_genres(group.trim()))
            .collect();

        let mut cells = row.cells.into_iter();
        let band_name = cells.next().unwrap_or_default();
        let album_name = cells.next().unwrap_or_default();
        let album_type = AlbumType::from_label(&cells.next().unwrap_or_default());
        let title = cells.next().unwrap_or_default();

        Ok(Self {
            id,
            title,
            album_type,
            band_name,
            bands,
            album_name,
            album,
            genres,
        })
    }
}
