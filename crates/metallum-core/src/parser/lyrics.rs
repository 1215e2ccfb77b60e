//! Lyrics fragment parser
//!
//! The lyrics endpoint answers with a bare HTML fragment: text lines
//! separated by `<br />` and carriage returns.

use scraper::node::Node;
use scraper::Html;

use crate::types::Lyrics;

const CARRIAGE_RETURN_ENTITY: &str = "&#13;";

/// Extract clean lyrics text from the lyrics fragment.
///
/// Each `<br>` becomes a newline, carriage returns and source line breaks are
/// dropped, and trailing whitespace is trimmed per line.
pub fn parse_lyrics(html: &str, id: u64) -> Lyrics {
    let fragment = Html::parse_fragment(html);
    let mut text = String::new();

    for node in fragment.root_element().descendants() {
        match node.value() {
            Node::Text(t) => {
                text.extend(t.chars().filter(|c| *c != '\r' && *c != '\n'));
            }
            Node::Element(el) if el.name() == "br" => text.push('\n'),
            _ => {}
        }
    }

    let text = text
        .replace(CARRIAGE_RETURN_ENTITY, "")
        .lines()
        .map(str::trim_end)
        .collect::<Vec<_>>()
        .join("\n")
        .trim()
        .to_string();

    Lyrics { id, text }
}
