//! Band page and discography parser for metal-archives.com
//!
//! A band is built from two documents: the band page itself (label/value
//! pairs, logo, audit trail) and the `discography/tab/all` fragment that
//! lists every release.

use scraper::Html;

use crate::collection::Collection;
use crate::error::{MetallumError, Result};
use crate::types::{AlbumEntry, AlbumType, Band};

use super::entity::{element_text, EntityView};
use super::selector;
use super::scalar::{extract_trailing_id, split_genres};

/// Parse a band from its page and its discography fragment.
///
/// # Arguments
/// * `html` - Raw HTML of the band page
/// * `discography_html` - Raw HTML of the discography fragment
/// * `id` - Band id (used in the result)
///
/// # Returns
/// * `Ok(Band)` with parsed attributes and albums
/// * `Err(MetallumError::ElementNotFound)` if the page has no band name
pub fn parse_band(html: &str, discography_html: &str, id: u64) -> Result<Band> {
    let view = EntityView::parse(html);

    let name = view
        .first_text("h1.band_name")
        .ok_or_else(|| MetallumError::ElementNotFound("band name".to_string()))?;

    let (added, modified) = view.audit_trail();

    Ok(Band {
        id,
        name,
        country: view.label_value("Country of origin:"),
        location: view.label_value("Location:"),
        status: view.label_value("Status:"),
        formed_in: view.label_value("Formed in:"),
        genres: split_genres(&view.label_value("Genre:")),
        themes: split_genres(&view.label_value_any(&["Themes:", "Lyrical themes:"])),
        label: view.label_value_any(&["Current label:", "Last label:"]),
        years_active: view.label_value("Years active:"),
        logo_url: view.first_attr("a#logo", "href"),
        added,
        modified,
        albums: parse_discography(discography_html)?,
    })
}

/// Parse the discography table of a band.
///
/// Rows without an album link (e.g. "Nothing entered yet") are skipped.
pub fn parse_discography(html: &str) -> Result<Collection<AlbumEntry>> {
    let document = Html::parse_fragment(html);
    let row_selector = selector("table.discog tbody tr")?;
    let cell_selector = selector("td")?;
    let link_selector = selector("a")?;

    let mut albums = Vec::new();
    for row in document.select(&row_selector) {
        let cells: Vec<_> = row.select(&cell_selector).collect();
        if cells.len() < 3 {
            continue;
        }

        let Some(link) = cells[0].select(&link_selector).next() else {
            continue;
        };
        let Some(id) = link.value().attr("href").and_then(extract_trailing_id) else {
            continue;
        };

        let (review_count, score) = cells
            .get(3)
            .map(|cell| parse_review_cell(&element_text(cell)))
            .unwrap_or((0, None));

        albums.push(AlbumEntry {
            id,
            title: element_text(&link),
            album_type: AlbumType::from_label(&element_text(&cells[1])),
            year: element_text(&cells[2]).parse().ok(),
            review_count,
            score,
        });
    }

    tracing::debug!(count = albums.len(), "Parsed discography");
    Ok(albums.into())
}

/// Parse a discography review cell such as `5 (78%)`.
fn parse_review_cell(text: &str) -> (u32, Option<u32>) {
    let mut parts = text.split_whitespace();
    let count = parts.next().and_then(|c| c.parse().ok()).unwrap_or(0);
    let score = parts
        .next()
        .map(|s| s.trim_matches(|c: char| c == '(' || c == ')' || c == '%'))
        .and_then(|s| s.parse().ok());
    (count, score)
}
