//! Insert-if-absent reconciliation of parsed items against stored entries.

use std::collections::HashSet;

use crate::error::AppError;
use crate::models::{EntryProbe, Feed, NewEntry, ParsedItem};
use crate::traits::FeedTransaction;

/// Store every item of `items` that has no matching entry under `feed`.
///
/// An item matches a stored entry when every non-empty identifying field
/// (link, id, title) is equal. Items with no identifying field are skipped,
/// as are repeats within the same batch. Existing entries are never
/// modified. Returns the number of entries inserted.
pub async fn reconcile_entries<T: FeedTransaction>(
    tx: &mut T,
    feed: &Feed,
    items: &[ParsedItem],
) -> Result<usize, AppError> {
    let mut seen = HashSet::new();
    let mut added = 0;

    for item in items {
        let probe = EntryProbe::from_item(item);
        if probe.is_empty() {
            tracing::debug!(feed_id = %feed.id, "Skipping item without link, id or title");
            continue;
        }
        if !seen.insert(probe.clone()) {
            continue;
        }

        if tx.find_entry_matching(feed.id, &probe).await?.is_some() {
            continue;
        }

        tx.insert_entry(&new_entry(feed, item)).await?;
        added += 1;
    }

    if added > 0 {
        tracing::info!(feed_id = %feed.id, entries_added = added, "Stored new entries");
    } else {
        tracing::debug!(feed_id = %feed.id, "No new entries");
    }

    Ok(added)
}

fn new_entry(feed: &Feed, item: &ParsedItem) -> NewEntry {
    NewEntry {
        feed_id: feed.id,
        title: item.title.clone(),
        url: item.link.clone(),
        guid: item.id.clone(),
        content: item.content_or_summary.clone().unwrap_or_default(),
        publish_date: item.published_at,
    }
}
