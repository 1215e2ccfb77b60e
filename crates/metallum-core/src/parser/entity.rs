//! Label/value view over entity detail pages
//!
//! Band and album pages describe their attributes as `<dt>` labels followed by
//! `<dd>` values. The Nth label belongs to the Nth value in document order;
//! that positional pairing is the only contract the markup offers.

use chrono::{DateTime, Utc};
use scraper::{ElementRef, Html, Selector};

use super::scalar::{parse_timestamp, squash_whitespace};

/// Parsed entity page supporting label-indexed lookups.
pub struct EntityView {
    document: Html,
}

impl EntityView {
    /// Parse a full HTML document.
    pub fn parse(html: &str) -> Self {
        Self {
            document: Html::parse_document(html),
        }
    }

    /// The underlying document.
    pub fn document(&self) -> &Html {
        &self.document
    }

    /// All elements matching `css`, in document order.
    pub fn select_all(&self, css: &str) -> Vec<ElementRef<'_>> {
        match Selector::parse(css) {
            Ok(selector) => self.document.select(&selector).collect(),
            Err(_) => Vec::new(),
        }
    }

    /// Squashed text of the first element matching `css`, if non-empty.
    pub fn first_text(&self, css: &str) -> Option<String> {
        self.select_all(css)
            .into_iter()
            .map(|el| element_text(&el))
            .find(|text| !text.is_empty())
    }

    /// Attribute `attr` of the first element matching `css`.
    pub fn first_attr(&self, css: &str, attr: &str) -> Option<String> {
        self.select_all(css)
            .into_iter()
            .find_map(|el| el.value().attr(attr).map(str::to_string))
    }

    /// Label texts in document order.
    pub fn labels(&self) -> Vec<String> {
        self.select_all("dt").iter().map(element_text).collect()
    }

    /// Value element paired with `label`.
    ///
    /// The first label whose text equals `label` picks position `i`; the
    /// result is the `i`th value element, whether or not the two lists line up.
    pub fn label_element(&self, label: &str) -> Option<ElementRef<'_>> {
        let wanted = label.trim();
        let index = self.labels().iter().position(|l| l == wanted)?;
        self.select_all("dd").into_iter().nth(index)
    }

    /// Text of the value paired with `label`, or an empty string.
    pub fn label_value(&self, label: &str) -> String {
        self.label_element(label)
            .map(|el| element_text(&el))
            .unwrap_or_default()
    }

    /// First non-empty value among several label spellings.
    pub fn label_value_any(&self, labels: &[&str]) -> String {
        labels
            .iter()
            .map(|label| self.label_value(label))
            .find(|value| !value.is_empty())
            .unwrap_or_default()
    }

    /// Creation and modification times from the audit trail, in UTC.
    pub fn audit_trail(&self) -> (Option<DateTime<Utc>>, Option<DateTime<Utc>>) {
        let mut added = None;
        let mut modified = None;

        for cell in self.select_all("#auditTrail td") {
            let text = element_text(&cell);
            if let Some(rest) = text.strip_prefix("Added on:") {
                added = parse_timestamp(rest);
            } else if let Some(rest) = text.strip_prefix("Last modified on:") {
                modified = parse_timestamp(rest);
            }
        }

        (added, modified)
    }
}

/// Whitespace-squashed text content of an element.
pub fn element_text(el: &ElementRef<'_>) -> String {
    squash_whitespace(&el.text().collect::<String>())
}
