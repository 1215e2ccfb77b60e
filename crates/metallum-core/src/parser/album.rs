//! Album page parser for metal-archives.com
//!
//! Parses album attributes from the label/value block and the track list
//! from the `table_lyrics` table. Multi-disc releases separate discs with
//! `discRow` rows; split releases prefix track titles with the band name.

use scraper::ElementRef;

use crate::error::{MetallumError, Result};
use crate::types::{Album, AlbumType, BandRef, Track};

use super::entity::{element_text, EntityView};
use super::selector;
use super::scalar::{extract_trailing_id, parse_duration, parse_release_date};

/// Parse album detail from an album page.
///
/// # Arguments
/// * `html` - Raw HTML content of the album page
/// * `id` - Album id (used in the result)
///
/// # Returns
/// * `Ok(Album)` with parsed attributes and tracks
/// * `Err(MetallumError::ElementNotFound)` if the page has no album title
pub fn parse_album(html: &str, id: u64) -> Result<Album> {
    let view = EntityView::parse(html);

    let title = view
        .first_text("h1.album_name")
        .ok_or_else(|| MetallumError::ElementNotFound("album title".to_string()))?;

    let bands: Vec<BandRef> = view
        .select_all("h2.band_name a")
        .iter()
        .filter_map(|a| {
            let id = a.value().attr("href").and_then(extract_trailing_id)?;
            Some(BandRef {
                id,
                name: element_text(a),
            })
        })
        .collect();

    let release_date_text = view.label_value("Release date:");
    let (review_count, score) = parse_reviews(&view.label_value("Reviews:"));
    let (added, modified) = view.audit_trail();

    let listing = parse_tracks(&view, &bands)?;
    let duration = listing
        .total
        .unwrap_or_else(|| listing.tracks.iter().map(|t| t.duration).sum());

    Ok(Album {
        id,
        title,
        album_type: AlbumType::from_label(&view.label_value("Type:")),
        bands,
        release_date: parse_release_date(&release_date_text),
        release_date_text,
        catalog_id: view.label_value("Catalog ID:"),
        version_description: view.label_value("Version desc.:"),
        label: view.label_value("Label:"),
        format: view.label_value("Format:"),
        review_count,
        score,
        duration,
        disc_count: listing.disc_count,
        cover_url: view.first_attr("a#cover", "href"),
        added,
        modified,
        tracks: listing.tracks.into(),
    })
}

/// Parse the album page "Reviews:" value, e.g. `43 reviews (avg. 81%)`.
///
/// Anything else (e.g. "None yet") counts as no reviews.
pub fn parse_reviews(text: &str) -> (u32, Option<u32>) {
    let Ok(re) = regex_lite::Regex::new(r"(\d+)\s+reviews?\s+\(avg\.\s*(\d+)%\)") else {
        return (0, None);
    };
    match re.captures(text) {
        Some(caps) => {
            let count = caps.get(1).and_then(|m| m.as_str().parse().ok()).unwrap_or(0);
            let score = caps.get(2).and_then(|m| m.as_str().parse().ok());
            (count, score)
        }
        None => (0, None),
    }
}

struct TrackListing {
    tracks: Vec<Track>,
    total: Option<u32>,
    disc_count: u32,
}

fn parse_tracks(view: &EntityView, bands: &[BandRef]) -> Result<TrackListing> {
    let cell_selector = selector("td")?;
    let total_selector = selector("strong")?;
    let anchor_selector = selector("a[name]")?;
    let lyrics_selector = selector("a.lyricsButton")?;

    let mut tracks = Vec::new();
    let mut total = None;
    let mut disc = 0u32;
    let mut number_on_disc = 0u32;

    for row in view.select_all("table.table_lyrics tr") {
        let classes: Vec<&str> = row.value().classes().collect();

        if classes.contains(&"discRow") {
            disc += 1;
            number_on_disc = 0;
            continue;
        }
        if classes.contains(&"displayNone") {
            continue;
        }

        if !classes.contains(&"odd") && !classes.contains(&"even") {
            if let Some(strong) = row.select(&total_selector).next() {
                total = parse_duration(&element_text(&strong)).filter(|d| *d > 0);
            }
            continue;
        }

        let cells: Vec<ElementRef<'_>> = row.select(&cell_selector).collect();
        if cells.len() < 3 {
            continue;
        }

        number_on_disc += 1;
        let disc_number = disc.max(1);
        let id = cells[0]
            .select(&anchor_selector)
            .next()
            .and_then(|a| a.value().attr("name"))
            .and_then(|name| name.trim().parse().ok());
        let number = element_text(&cells[0])
            .trim_end_matches('.')
            .parse()
            .unwrap_or(number_on_disc);

        let (band_name, title) = split_track_title(&element_text(&cells[1]), bands);
        let extra = cells.get(3).map(element_text).unwrap_or_default();
        let has_lyrics = cells
            .get(3)
            .is_some_and(|cell| cell.select(&lyrics_selector).next().is_some());

        tracks.push(Track {
            id,
            disc_number,
            number,
            overall_number: tracks.len() as u32 + 1,
            title,
            band_name,
            duration: parse_duration(&element_text(&cells[2])).unwrap_or(0),
            instrumental: extra.to_lowercase().contains("instrumental"),
            has_lyrics,
        });
    }

    tracing::debug!(count = tracks.len(), discs = disc.max(1), "Parsed track list");

    Ok(TrackListing {
        tracks,
        total,
        disc_count: disc.max(1),
    })
}

/// Split `Band - Title` on split releases; otherwise credit the first band.
fn split_track_title(text: &str, bands: &[BandRef]) -> (String, String) {
    if bands.len() > 1 {
        for band in bands {
            if let Some(rest) = text.strip_prefix(&format!("{} - ", band.name)) {
                return (band.name.clone(), rest.to_string());
            }
        }
    }
    let band_name = bands.first().map(|b| b.name.clone()).unwrap_or_default();
    (band_name, text.to_string())
}
