use feed_rs::model::Entry;
use herald_core::error::AppError;
use herald_core::models::{ParsedFeed, ParsedItem, UNTITLED_FEED};
use herald_core::timestamp::parse_timestamp;

/// Parse an RSS 0.9x/1.0/2.0, Atom or JSON Feed document.
///
/// Item ids are only reported when the document declares them; no
/// synthetic ids are generated from links or titles.
pub fn parse_feed(body: &[u8]) -> Result<ParsedFeed, AppError> {
    let parser = feed_rs::parser::Builder::new()
        .timestamp_parser(parse_timestamp)
        .id_generator(|_links, _title, _uri| String::new())
        .build();

    let feed = parser
        .parse(body)
        .map_err(|e| AppError::ParseError(format!("Failed to parse feed: {e}")))?;

    let title = feed
        .title
        .map(|t| t.content.trim().to_string())
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| UNTITLED_FEED.to_string());
    let description = feed
        .description
        .map(|d| d.content)
        .filter(|d| !d.trim().is_empty());
    let updated_at = feed.updated.or(feed.published);

    let items = feed.entries.into_iter().map(parse_item).collect();

    Ok(ParsedFeed {
        title,
        description,
        updated_at,
        items,
    })
}

fn parse_item(entry: Entry) -> ParsedItem {
    let id = Some(entry.id.trim().to_string()).filter(|id| !id.is_empty());
    let link = entry
        .links
        .first()
        .map(|l| l.href.trim().to_string())
        .filter(|href| !href.is_empty());
    let title = entry.title.map(|t| t.content);
    let content_or_summary = entry
        .content
        .and_then(|c| c.body)
        .or(entry.summary.map(|s| s.content));
    let published_at = entry.published.or(entry.updated);

    ParsedItem {
        link,
        id,
        title,
        content_or_summary,
        published_at,
    }
}
