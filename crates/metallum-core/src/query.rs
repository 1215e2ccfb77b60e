//! Advanced search argument sets
//!
//! Each search form takes a typed argument struct. Argument names are mapped
//! to the site's query parameter names through a static table per form;
//! names missing from the table are sent as they are. Unset arguments are
//! left out of the query string.

use crate::parser::SearchRow;
use crate::types::{AlbumResult, BandResult, SongResult};

const SEARCH_PATH: &str = "search/ajax-advanced/searching";

/// A search form: its endpoint, parameter names and decoded row type.
pub trait SearchQuery {
    /// Row type the search returns
    type Row: SearchRow;

    /// Last path segment of the search endpoint, e.g. `bands`
    const ENDPOINT: &'static str;

    /// Argument name to query parameter name
    const PARAMETER_NAMES: &'static [(&'static str, &'static str)];

    /// Arguments under their own names, unset ones omitted
    fn arguments(&self) -> Vec<(&'static str, String)>;

    /// Offset of the first row requested
    fn page_start(&self) -> u64;

    /// Query parameter name for an argument.
    fn parameter_name(argument: &'static str) -> &'static str {
        Self::PARAMETER_NAMES
            .iter()
            .find(|(name, _)| *name == argument)
            .map_or(argument, |(_, parameter)| *parameter)
    }

    /// `(parameter, value)` pairs in argument order.
    fn parameters(&self) -> Vec<(&'static str, String)> {
        self.arguments()
            .into_iter()
            .map(|(argument, value)| (Self::parameter_name(argument), value))
            .collect()
    }

    /// Relative URL of the search request.
    fn path(&self) -> String {
        let query = self
            .parameters()
            .iter()
            .map(|(name, value)| format!("{}={}", urlencoding::encode(name), urlencoding::encode(value)))
            .collect::<Vec<_>>()
            .join("&");
        format!("{}/{}/?{}", SEARCH_PATH, Self::ENDPOINT, query)
    }
}

/// Ordered argument list builder.
#[derive(Default)]
struct Arguments {
    pairs: Vec<(&'static str, String)>,
}

impl Arguments {
    fn value(mut self, name: &'static str, value: impl ToString) -> Self {
        self.pairs.push((name, value.to_string()));
        self
    }

    fn optional<V: ToString>(self, name: &'static str, value: Option<V>) -> Self {
        match value {
            Some(v) => self.value(name, v),
            None => self,
        }
    }

    fn flag(self, name: &'static str, value: bool) -> Self {
        self.value(name, if value { "1" } else { "0" })
    }

    fn list(mut self, name: &'static str, values: &[String]) -> Self {
        for value in values {
            self.pairs.push((name, value.clone()));
        }
        self
    }

    fn build(self) -> Vec<(&'static str, String)> {
        self.pairs
    }
}

/// Band search arguments.
///
/// # Example
/// ```
/// use metallum_core::{BandSearch, SearchQuery};
///
/// let query = BandSearch::new("metallica");
/// assert_eq!(
///     query.path(),
///     "search/ajax-advanced/searching/bands/?bandName=metallica&exactBandMatch=1&iDisplayStart=0"
/// );
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BandSearch {
    pub name: String,
    pub strict: bool,
    pub genre: Option<String>,
    pub countries: Vec<String>,
    pub year_created_from: Option<i32>,
    pub year_created_to: Option<i32>,
    pub status: Vec<String>,
    pub themes: Option<String>,
    pub location: Option<String>,
    pub label: Option<String>,
    pub additional_notes: Option<String>,
    pub page_start: u64,
}

impl BandSearch {
    /// Strict search for `name`, everything else unset
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }
}

impl Default for BandSearch {
    fn default() -> Self {
        Self {
            name: String::new(),
            strict: true,
            genre: None,
            countries: Vec::new(),
            year_created_from: None,
            year_created_to: None,
            status: Vec::new(),
            themes: None,
            location: None,
            label: None,
            additional_notes: None,
            page_start: 0,
        }
    }
}

impl SearchQuery for BandSearch {
    type Row = BandResult;
    const ENDPOINT: &'static str = "bands";
    const PARAMETER_NAMES: &'static [(&'static str, &'static str)] = &[
        ("name", "bandName"),
        ("strict", "exactBandMatch"),
        ("countries", "country[]"),
        ("year_created_from", "yearCreationFrom"),
        ("year_created_to", "yearCreationTo"),
        ("status", "status[]"),
        ("label", "bandLabelName"),
        ("additional_notes", "bandNotes"),
        ("page_start", "iDisplayStart"),
    ];

    fn arguments(&self) -> Vec<(&'static str, String)> {
        Arguments::default()
            .value("name", &self.name)
            .flag("strict", self.strict)
            .optional("genre", self.genre.as_ref())
            .list("countries", &self.countries)
            .optional("year_created_from", self.year_created_from)
            .optional("year_created_to", self.year_created_to)
            .list("status", &self.status)
            .optional("themes", self.themes.as_ref())
            .optional("location", self.location.as_ref())
            .optional("label", self.label.as_ref())
            .optional("additional_notes", self.additional_notes.as_ref())
            .value("page_start", self.page_start)
            .build()
    }

    fn page_start(&self) -> u64 {
        self.page_start
    }
}

/// Album search arguments.
///
/// A year bound without a month bound searches from January / up to
/// December of that year.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlbumSearch {
    pub title: String,
    pub strict: bool,
    pub band: Option<String>,
    pub band_strict: bool,
    pub year_from: Option<i32>,
    pub year_to: Option<i32>,
    pub month_from: Option<u32>,
    pub month_to: Option<u32>,
    pub countries: Vec<String>,
    pub location: Option<String>,
    pub label: Option<String>,
    pub indie_label: bool,
    pub genre: Option<String>,
    pub catalog_number: Option<String>,
    pub identifiers: Option<String>,
    pub recording_info: Option<String>,
    pub version_description: Option<String>,
    pub additional_notes: Option<String>,
    pub types: Vec<String>,
    pub page_start: u64,
    pub formats: Vec<String>,
}

impl AlbumSearch {
    /// Strict search for `title`, everything else unset
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Self::default()
        }
    }
}

impl Default for AlbumSearch {
    fn default() -> Self {
        Self {
            title: String::new(),
            strict: true,
            band: None,
            band_strict: true,
            year_from: None,
            year_to: None,
            month_from: None,
            month_to: None,
            countries: Vec::new(),
            location: None,
            label: None,
            indie_label: false,
            genre: None,
            catalog_number: None,
            identifiers: None,
            recording_info: None,
            version_description: None,
            additional_notes: None,
            types: Vec::new(),
            page_start: 0,
            formats: Vec::new(),
        }
    }
}

impl SearchQuery for AlbumSearch {
    type Row = AlbumResult;
    const ENDPOINT: &'static str = "albums";
    const PARAMETER_NAMES: &'static [(&'static str, &'static str)] = &[
        ("title", "releaseTitle"),
        ("strict", "exactReleaseMatch"),
        ("band", "bandName"),
        ("band_strict", "exactBandMatch"),
        ("year_from", "releaseYearFrom"),
        ("year_to", "releaseYearTo"),
        ("month_from", "releaseMonthFrom"),
        ("month_to", "releaseMonthTo"),
        ("countries", "country[]"),
        ("label", "releaseLabelName"),
        ("indie_label", "indieLabel"),
        ("catalog_number", "releaseCatalogNumber"),
        ("identifiers", "releaseIdentifiers"),
        ("recording_info", "releaseRecordingInfo"),
        ("version_description", "releaseDescription"),
        ("additional_notes", "releaseNotes"),
        ("types", "releaseType[]"),
        ("formats", "releaseFormat[]"),
        ("page_start", "iDisplayStart"),
    ];

    fn arguments(&self) -> Vec<(&'static str, String)> {
        let month_from = self.month_from.or(self.year_from.map(|_| 1));
        let month_to = self.month_to.or(self.year_to.map(|_| 12));

        Arguments::default()
            .value("title", &self.title)
            .flag("strict", self.strict)
            .optional("band", self.band.as_ref())
            .flag("band_strict", self.band_strict)
            .optional("year_from", self.year_from)
            .optional("year_to", self.year_to)
            .optional("month_from", month_from)
            .optional("month_to", month_to)
            .list("countries", &self.countries)
            .optional("location", self.location.as_ref())
            .optional("label", self.label.as_ref())
            .flag("indie_label", self.indie_label)
            .optional("genre", self.genre.as_ref())
            .optional("catalog_number", self.catalog_number.as_ref())
            .optional("identifiers", self.identifiers.as_ref())
            .optional("recording_info", self.recording_info.as_ref())
            .optional("version_description", self.version_description.as_ref())
            .optional("additional_notes", self.additional_notes.as_ref())
            .list("types", &self.types)
            .value("page_start", self.page_start)
            .list("formats", &self.formats)
            .build()
    }

    fn page_start(&self) -> u64 {
        self.page_start
    }
}

/// Song search arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SongSearch {
    pub title: String,
    pub strict: bool,
    pub band: Option<String>,
    pub band_strict: bool,
    pub release: Option<String>,
    pub release_strict: bool,
    pub lyrics: Option<String>,
    /// Sent as `*` when unset or blank
    pub genre: Option<String>,
    pub types: Vec<String>,
    pub page_start: u64,
}

impl SongSearch {
    /// Strict search for `title`, everything else unset
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Self::default()
        }
    }
}

impl Default for SongSearch {
    fn default() -> Self {
        Self {
            title: String::new(),
            strict: true,
            band: None,
            band_strict: true,
            release: None,
            release_strict: true,
            lyrics: None,
            genre: None,
            types: Vec::new(),
            page_start: 0,
        }
    }
}

impl SearchQuery for SongSearch {
    type Row = SongResult;
    const ENDPOINT: &'static str = "songs";
    const PARAMETER_NAMES: &'static [(&'static str, &'static str)] = &[
        ("title", "songTitle"),
        ("strict", "exactSongMatch"),
        ("band", "bandName"),
        ("band_strict", "exactBandMatch"),
        ("release", "releaseTitle"),
        ("release_strict", "exactReleaseMatch"),
        ("types", "releaseType[]"),
        ("page_start", "iDisplayStart"),
    ];

    fn arguments(&self) -> Vec<(&'static str, String)> {
        let genre = self
            .genre
            .as_deref()
            .map(str::trim)
            .filter(|g| !g.is_empty())
            .unwrap_or("*");

        Arguments::default()
            .value("title", &self.title)
            .flag("strict", self.strict)
            .optional("band", self.band.as_ref())
            .flag("band_strict", self.band_strict)
            .optional("release", self.release.as_ref())
            .flag("release_strict", self.release_strict)
            .optional("lyrics", self.lyrics.as_ref())
            .value("genre", genre)
            .list("types", &self.types)
            .value("page_start", self.page_start)
            .build()
    }

    fn page_start(&self) -> u64 {
        self.page_start
    }
}
