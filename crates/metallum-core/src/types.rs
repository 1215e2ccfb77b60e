//! Data types for the Metallum scraper
//!
//! This module contains the entities, references and search rows used
//! throughout the library. All types implement Serialize and Deserialize.
//!
//! References (`BandRef`, `AlbumRef`, `LyricsRef`) are plain values; turning
//! one into an entity is an explicit, fallible `resolve` step.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::collection::{Collection, Queryable};
use crate::error::Result;
use crate::parser::format_duration;
use crate::scraper::MetallumScraper;

/// Release type of an album
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum AlbumType {
    FullLength,
    Ep,
    Single,
    Demo,
    Video,
    Compilation,
    Dvd,
    LiveAlbum,
    Split,
    /// Any label the site uses that is not listed above
    Other(String),
}

impl AlbumType {
    /// Label used by the site, e.g. `Full-length`
    pub fn label(&self) -> &str {
        match self {
            Self::FullLength => "Full-length",
            Self::Ep => "EP",
            Self::Single => "Single",
            Self::Demo => "Demo",
            Self::Video => "Video/VHS",
            Self::Compilation => "Compilation",
            Self::Dvd => "DVD",
            Self::LiveAlbum => "Live album",
            Self::Split => "Split",
            Self::Other(label) => label,
        }
    }

    /// Map a site label to a type, ignoring case.
    pub fn from_label(label: &str) -> Self {
        let label = label.trim();
        match label.to_lowercase().as_str() {
            "full-length" => Self::FullLength,
            "ep" => Self::Ep,
            "single" => Self::Single,
            "demo" => Self::Demo,
            "video/vhs" | "video" => Self::Video,
            "compilation" => Self::Compilation,
            "dvd" => Self::Dvd,
            "live album" => Self::LiveAlbum,
            "split" => Self::Split,
            _ => Self::Other(label.to_string()),
        }
    }
}

impl fmt::Display for AlbumType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for AlbumType {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(Self::from_label(s))
    }
}

impl From<String> for AlbumType {
    fn from(label: String) -> Self {
        Self::from_label(&label)
    }
}

impl From<AlbumType> for String {
    fn from(album_type: AlbumType) -> Self {
        album_type.label().to_string()
    }
}

/// Reference to a band page
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BandRef {
    /// Metal Archives band id
    pub id: u64,
    /// Band name as shown where the reference was found
    pub name: String,
}

impl BandRef {
    /// Relative URL of the band page
    pub fn url(&self) -> String {
        format!("bands/_/{}", self.id)
    }

    /// Fetch the band.
    pub async fn resolve(&self, scraper: &MetallumScraper) -> Result<Band> {
        scraper.band_for_id(self.id).await
    }
}

/// Reference to an album page
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlbumRef {
    /// Metal Archives album id
    pub id: u64,
    /// Album title as shown where the reference was found
    pub title: String,
}

impl AlbumRef {
    /// Relative URL of the album page
    pub fn url(&self) -> String {
        format!("albums/_/_/{}", self.id)
    }

    /// Fetch the album.
    pub async fn resolve(&self, scraper: &MetallumScraper) -> Result<Album> {
        scraper.album_for_id(self.id).await
    }
}

/// Reference to the lyrics of a song
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LyricsRef {
    /// Lyrics id (same as the song id)
    pub id: u64,
}

impl LyricsRef {
    /// Relative URL of the lyrics fragment
    pub fn url(&self) -> String {
        format!("release/ajax-view-lyrics/id/{}", self.id)
    }

    /// Fetch the lyrics.
    pub async fn resolve(&self, scraper: &MetallumScraper) -> Result<Lyrics> {
        scraper.lyrics_for_id(self.id).await
    }
}

/// Band detail page
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Band {
    /// Metal Archives band id
    pub id: u64,
    /// Band name
    pub name: String,
    /// Country of origin
    pub country: String,
    /// City/region
    pub location: String,
    /// Status, e.g. "Active" or "Split-up"
    pub status: String,
    /// Year of formation as written on the page
    pub formed_in: String,
    /// Genres, split on top-level commas and semicolons
    pub genres: Vec<String>,
    /// Lyrical themes
    pub themes: Vec<String>,
    /// Current (or last known) label
    pub label: String,
    /// Years active as written on the page
    pub years_active: String,
    /// Logo image URL
    pub logo_url: Option<String>,
    /// When the entry was added, in UTC
    pub added: Option<DateTime<Utc>>,
    /// When the entry was last modified, in UTC
    pub modified: Option<DateTime<Utc>>,
    /// Complete discography
    pub albums: Collection<AlbumEntry>,
}

impl Band {
    /// Reference back to this band
    pub fn reference(&self) -> BandRef {
        BandRef {
            id: self.id,
            name: self.name.clone(),
        }
    }
}

/// One row of a band's discography
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlbumEntry {
    /// Metal Archives album id
    pub id: u64,
    /// Album title
    pub title: String,
    /// Release type
    pub album_type: AlbumType,
    /// Release year
    pub year: Option<i32>,
    /// Number of reviews
    pub review_count: u32,
    /// Average review score in percent
    pub score: Option<u32>,
}

impl AlbumEntry {
    /// Reference to the album page
    pub fn reference(&self) -> AlbumRef {
        AlbumRef {
            id: self.id,
            title: self.title.clone(),
        }
    }

    /// Fetch the full album.
    pub async fn get(&self, scraper: &MetallumScraper) -> Result<Album> {
        scraper.album_for_id(self.id).await
    }
}

impl Queryable for AlbumEntry {
    const ENTITY: &'static str = "album entry";
    const ATTRIBUTES: &'static [(&'static str, fn(&Self) -> String)] = &[
        ("id", |a: &AlbumEntry| a.id.to_string()),
        ("title", |a: &AlbumEntry| a.title.clone()),
        ("type", |a: &AlbumEntry| a.album_type.to_string()),
        ("year", |a: &AlbumEntry| a.year.map(|y| y.to_string()).unwrap_or_default()),
        ("review_count", |a: &AlbumEntry| a.review_count.to_string()),
        ("score", |a: &AlbumEntry| a.score.map(|s| s.to_string()).unwrap_or_default()),
    ];
}

/// Album detail page
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Album {
    /// Metal Archives album id
    pub id: u64,
    /// Album title
    pub title: String,
    /// Release type
    pub album_type: AlbumType,
    /// Bands credited (several for splits)
    pub bands: Vec<BandRef>,
    /// Release date, when it can be parsed
    pub release_date: Option<NaiveDate>,
    /// Release date as written on the page
    pub release_date_text: String,
    /// Catalog number
    pub catalog_id: String,
    /// Version description
    pub version_description: String,
    /// Label
    pub label: String,
    /// Format, e.g. "12\" vinyl"
    pub format: String,
    /// Number of reviews
    pub review_count: u32,
    /// Average review score in percent
    pub score: Option<u32>,
    /// Total running time in seconds
    pub duration: u32,
    /// Number of discs
    pub disc_count: u32,
    /// Cover image URL
    pub cover_url: Option<String>,
    /// When the entry was added, in UTC
    pub added: Option<DateTime<Utc>>,
    /// When the entry was last modified, in UTC
    pub modified: Option<DateTime<Utc>>,
    /// Track list across all discs
    pub tracks: Collection<Track>,
}

impl Album {
    /// Name of the first credited band, or an empty string
    pub fn band_name(&self) -> &str {
        self.bands.first().map_or("", |b| b.name.as_str())
    }

    /// Sum of all track durations in seconds
    pub fn tracks_duration(&self) -> u32 {
        self.tracks.iter().map(|t| t.duration).sum()
    }

    /// Running time as `M:SS` / `H:MM:SS`, or "unknown"
    pub fn duration_display(&self) -> String {
        format_duration(i64::from(self.duration))
    }
}

impl Queryable for Album {
    const ENTITY: &'static str = "album";
    const ATTRIBUTES: &'static [(&'static str, fn(&Self) -> String)] = &[
        ("id", |a: &Album| a.id.to_string()),
        ("title", |a: &Album| a.title.clone()),
        ("type", |a: &Album| a.album_type.to_string()),
        ("band_name", |a: &Album| a.band_name().to_string()),
        ("label", |a: &Album| a.label.clone()),
        ("format", |a: &Album| a.format.clone()),
        ("catalog_id", |a: &Album| a.catalog_id.clone()),
        ("disc_count", |a: &Album| a.disc_count.to_string()),
        ("year", |a: &Album| {
            a.release_date
                .map(|d| chrono::Datelike::year(&d).to_string())
                .unwrap_or_default()
        }),
    ];
}

/// Track of an album
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Track {
    /// Metal Archives song id
    pub id: Option<u64>,
    /// Disc the track is on (1-based)
    pub disc_number: u32,
    /// Position on its disc (1-based)
    pub number: u32,
    /// Position across all discs (1-based)
    pub overall_number: u32,
    /// Track title
    pub title: String,
    /// Performing band (differs per track on splits)
    pub band_name: String,
    /// Running time in seconds, 0 when unknown
    pub duration: u32,
    /// Marked as instrumental
    pub instrumental: bool,
    /// Lyrics are available
    pub has_lyrics: bool,
}

impl Track {
    /// Lyrics reference, when the site has lyrics for this track
    pub fn lyrics_ref(&self) -> Option<LyricsRef> {
        match (self.id, self.has_lyrics) {
            (Some(id), true) => Some(LyricsRef { id }),
            _ => None,
        }
    }

    /// Running time as `M:SS` / `H:MM:SS`, or "unknown"
    pub fn duration_display(&self) -> String {
        format_duration(i64::from(self.duration))
    }
}

impl Queryable for Track {
    const ENTITY: &'static str = "track";
    const ATTRIBUTES: &'static [(&'static str, fn(&Self) -> String)] = &[
        ("id", |t: &Track| t.id.map(|id| id.to_string()).unwrap_or_default()),
        ("title", |t: &Track| t.title.clone()),
        ("band_name", |t: &Track| t.band_name.clone()),
        ("number", |t: &Track| t.number.to_string()),
        ("overall_number", |t: &Track| t.overall_number.to_string()),
        ("disc_number", |t: &Track| t.disc_number.to_string()),
        ("duration", |t: &Track| t.duration.to_string()),
        ("instrumental", |t: &Track| t.instrumental.to_string()),
    ];
}

/// Lyrics of a song
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lyrics {
    /// Lyrics id
    pub id: u64,
    /// Cleaned lyrics text, lines separated by `\n`
    pub text: String,
}

impl fmt::Display for Lyrics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

/// Band row of a band search
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BandResult {
    /// Metal Archives band id
    pub id: u64,
    /// Band name
    pub name: String,
    /// Genres
    pub genres: Vec<String>,
    /// Country of origin
    pub country: String,
    /// Remaining columns (status, formation year, ...) as shown
    pub other: Vec<String>,
}

impl BandResult {
    /// Relative URL of the band page
    pub fn url(&self) -> String {
        self.reference().url()
    }

    /// Reference to the band page
    pub fn reference(&self) -> BandRef {
        BandRef {
            id: self.id,
            name: self.name.clone(),
        }
    }

    /// Fetch the band this row points to.
    pub async fn get(&self, scraper: &MetallumScraper) -> Result<Band> {
        scraper.band_for_id(self.id).await
    }
}

impl Queryable for BandResult {
    const ENTITY: &'static str = "band result";
    const ATTRIBUTES: &'static [(&'static str, fn(&Self) -> String)] = &[
        ("id", |b: &BandResult| b.id.to_string()),
        ("name", |b: &BandResult| b.name.clone()),
        ("genres", |b: &BandResult| b.genres.join(", ")),
        ("country", |b: &BandResult| b.country.clone()),
    ];
}

/// Album row of an album search
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlbumResult {
    /// Metal Archives album id
    pub id: u64,
    /// Album title
    pub title: String,
    /// Release type
    pub album_type: AlbumType,
    /// Band name(s) as shown
    pub band_name: String,
    /// Bands linked from the row
    pub bands: Vec<BandRef>,
    /// Release date, when the row carries one
    pub release_date: Option<NaiveDate>,
    /// Remaining columns as shown
    pub other: Vec<String>,
}

impl AlbumResult {
    /// Relative URL of the album page
    pub fn url(&self) -> String {
        self.reference().url()
    }

    /// Reference to the album page
    pub fn reference(&self) -> AlbumRef {
        AlbumRef {
            id: self.id,
            title: self.title.clone(),
        }
    }

    /// Fetch the album this row points to.
    pub async fn get(&self, scraper: &MetallumScraper) -> Result<Album> {
        scraper.album_for_id(self.id).await
    }
}

impl Queryable for AlbumResult {
    const ENTITY: &'static str = "album result";
    const ATTRIBUTES: &'static [(&'static str, fn(&Self) -> String)] = &[
        ("id", |a: &AlbumResult| a.id.to_string()),
        ("title", |a: &AlbumResult| a.title.clone()),
        ("type", |a: &AlbumResult| a.album_type.to_string()),
        ("band_name", |a: &AlbumResult| a.band_name.clone()),
    ];
}

/// Song row of a song search
///
/// Songs have no page of their own; the row is the entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SongResult {
    /// Song id taken from the lyrics link, when the row has one
    pub id: Option<u64>,
    /// Song title
    pub title: String,
    /// Release type of the album the song is on
    pub album_type: AlbumType,
    /// Band name(s) as shown
    pub band_name: String,
    /// Bands linked from the row
    pub bands: Vec<BandRef>,
    /// Album title
    pub album_name: String,
    /// Album the song is on
    pub album: Option<AlbumRef>,
    /// Genres of the performing band(s)
    pub genres: Vec<String>,
}

impl SongResult {
    /// A song row is already the full entity.
    pub fn get(&self) -> &SongResult {
        self
    }

    /// Lyrics reference, when the row carries a song id
    pub fn lyrics_ref(&self) -> Option<LyricsRef> {
        self.id.map(|id| LyricsRef { id })
    }

    /// Fetch the song's lyrics.
    ///
    /// Returns `Ok(None)` when the row has no lyrics id.
    pub async fn lyrics(&self, scraper: &MetallumScraper) -> Result<Option<Lyrics>> {
        match self.lyrics_ref() {
            Some(lyrics) => lyrics.resolve(scraper).await.map(Some),
            None => Ok(None),
        }
    }
}

impl Queryable for SongResult {
    const ENTITY: &'static str = "song result";
    const ATTRIBUTES: &'static [(&'static str, fn(&Self) -> String)] = &[
        ("id", |s: &SongResult| s.id.map(|id| id.to_string()).unwrap_or_default()),
        ("title", |s: &SongResult| s.title.clone()),
        ("type", |s: &SongResult| s.album_type.to_string()),
        ("band_name", |s: &SongResult| s.band_name.clone()),
        ("album_name", |s: &SongResult| s.album_name.clone()),
        ("genres", |s: &SongResult| s.genres.join(", ")),
    ];
}

/// One page of search results
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchPage<T> {
    /// Rows on the current page
    pub results: Collection<T>,
    /// Matches across all pages
    pub total_record_count: u64,
    /// Offset of the first row of this page
    pub page_start: u64,
}

impl<T> SearchPage<T> {
    /// Create a new search page
    pub fn new(results: Collection<T>, total_record_count: u64, page_start: u64) -> Self {
        Self {
            results,
            total_record_count,
            page_start,
        }
    }

    /// Create an empty first page
    pub fn empty() -> Self {
        Self::new(Collection::default(), 0, 0)
    }

    /// Whether rows exist past this page
    pub fn has_next_page(&self) -> bool {
        self.page_start + (self.results.len() as u64) < self.total_record_count
    }

    /// Offset to request for the following page
    pub fn next_page_start(&self) -> u64 {
        self.page_start + self.results.len() as u64
    }
}
