use feed_rs::model::Entry;
use feed_rs::parser;
use url::Url;

use crate::domain::{ParsedFeed, ParsedItem};
use crate::errors::{PithyError, PithyResult};

/// Normalizes an RSS, Atom or JSON Feed body.
///
/// Items are returned in document order. An item without a resolvable
/// http(s) URL is dropped; a body that is not a feed at all fails as a whole.
pub fn parse_feed(bytes: &[u8], feed_url: &str) -> PithyResult<ParsedFeed> {
    let feed = parser::parse(bytes).map_err(|e| PithyError::FeedParse(e.to_string()))?;
    let base = Url::parse(feed_url).ok();

    let items = feed
        .entries
        .into_iter()
        .filter_map(|entry| parse_entry(entry, base.as_ref()))
        .collect();

    let title = feed
        .title
        .map(|t| t.content.trim().to_string())
        .filter(|t| !t.is_empty());

    Ok(ParsedFeed { title, items })
}

fn parse_entry(entry: Entry, base: Option<&Url>) -> Option<ParsedItem> {
    let url = entry_url(&entry, base)?;

    let title = entry
        .title
        .map(|t| t.content.trim().to_string())
        .unwrap_or_default();

    // Unknown publication time stays unknown; fetch time is not substituted.
    let publication_time = entry.published.or(entry.updated);

    Some(ParsedItem {
        title,
        url,
        publication_time,
    })
}

fn entry_url(entry: &Entry, base: Option<&Url>) -> Option<String> {
    let alternate = entry
        .links
        .iter()
        .find(|link| link.rel.as_deref() == Some("alternate"))
        .or_else(|| entry.links.first())
        .and_then(|link| resolve(&link.href, base));

    alternate.or_else(|| {
        Url::parse(&entry.id)
            .ok()
            .filter(is_http)
            .map(String::from)
    })
}

fn resolve(href: &str, base: Option<&Url>) -> Option<String> {
    let href = href.trim();
    if href.is_empty() {
        return None;
    }

    let resolved = match base {
        Some(base) => base.join(href).ok()?,
        None => Url::parse(href).ok()?,
    };

    is_http(&resolved).then(|| resolved.into())
}

fn is_http(url: &Url) -> bool {
    matches!(url.scheme(), "http" | "https")
}
