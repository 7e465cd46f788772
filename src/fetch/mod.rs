//! Cursor-paginated fetching with cutoff-based early termination.
//!
//! One page-walk shape, reused for repository collections, the author
//! feed, and blob listings. Traversal stops when a page comes back
//! empty, when the oldest real timestamp in a page falls below the
//! cutoff, when the server stops handing out cursors, or when the page
//! ceiling is reached.
//!
//! A fetch failure mid-loop never aborts the run: it is logged and the
//! walk returns whatever was accumulated.

use crate::error::AuditError;
use crate::http::{build_url, FetchClient};
use crate::models::{parse_timestamp, CollectionInfo, CollectionRecord, FeedPost, ProfileView};
use chrono::{DateTime, Utc};
use serde_json::Value;
use tracing::{debug, warn};

/// Pagination tuning knobs.
#[derive(Debug, Clone)]
pub struct PageSettings {
    /// Records requested per page.
    pub page_size: usize,
    /// Ceiling on pages walked per collection. Guards against unbounded
    /// traversal over clock-skewed or malformed data.
    pub max_pages: usize,
}

impl Default for PageSettings {
    fn default() -> Self {
        Self {
            page_size: 100,
            max_pages: 50,
        }
    }
}

/// What to do after classifying one page against the cutoff.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageDecision {
    Continue,
    Stop,
}

/// Split one page of timestamped items at the cutoff.
///
/// Items without a timestamp are always kept, and a missing timestamp
/// never advances the minimum-timestamp bookkeeping or drives the stop
/// decision. When the minimum real timestamp falls below the cutoff,
/// the in-window items of this boundary page are kept and the walk
/// stops: every later page is older.
pub fn split_page_at_cutoff<T>(
    items: Vec<(Option<DateTime<Utc>>, T)>,
    cutoff: Option<DateTime<Utc>>,
) -> (Vec<T>, PageDecision) {
    let Some(cutoff) = cutoff else {
        let kept = items.into_iter().map(|(_, item)| item).collect();
        return (kept, PageDecision::Continue);
    };

    let mut kept = Vec::new();
    let mut min_seen: Option<DateTime<Utc>> = None;

    for (ts, item) in items {
        match ts {
            Some(ts) => {
                min_seen = Some(min_seen.map_or(ts, |m| m.min(ts)));
                if ts >= cutoff {
                    kept.push(item);
                }
            }
            None => kept.push(item),
        }
    }

    let decision = if min_seen.is_some_and(|m| m < cutoff) {
        PageDecision::Stop
    } else {
        PageDecision::Continue
    };

    (kept, decision)
}

/// One raw page as returned by the server.
struct RawPage {
    items: Vec<Value>,
    cursor: Option<String>,
}

fn parse_page(value: &Value, items_key: &str) -> RawPage {
    let items = value
        .get(items_key)
        .and_then(|v| v.as_array())
        .cloned()
        .unwrap_or_default();
    let cursor = value
        .get("cursor")
        .and_then(|v| v.as_str())
        .map(String::from);
    RawPage { items, cursor }
}

/// Paginated fetcher over a run's HTTP client.
pub struct Fetcher<'a> {
    http: &'a FetchClient,
    settings: PageSettings,
}

impl<'a> Fetcher<'a> {
    pub fn new(http: &'a FetchClient, settings: PageSettings) -> Self {
        Self { http, settings }
    }

    /// Walk one paginated endpoint, converting items as they arrive.
    ///
    /// `convert` maps a raw item to its timestamp plus typed value;
    /// items it rejects are dropped. Never returns an error: a failed
    /// page fetch ends the walk with whatever was accumulated.
    async fn walk<T, F>(
        &self,
        base: &str,
        params: &[(&str, &str)],
        items_key: &str,
        cutoff: Option<DateTime<Utc>>,
        mut convert: F,
    ) -> Vec<T>
    where
        F: FnMut(&Value) -> Option<(Option<DateTime<Utc>>, T)>,
    {
        let limit = self.settings.page_size.to_string();
        let mut out = Vec::new();
        let mut cursor: Option<String> = None;
        let mut pages_walked = 0;

        loop {
            if pages_walked >= self.settings.max_pages {
                debug!("page ceiling reached for {}", base);
                break;
            }

            let mut query: Vec<(&str, &str)> = params.to_vec();
            query.push(("limit", limit.as_str()));
            if let Some(ref c) = cursor {
                query.push(("cursor", c.as_str()));
            }

            let url = match build_url(base, &query) {
                Ok(url) => url,
                Err(e) => {
                    warn!("could not build page URL for {}: {}", base, e);
                    break;
                }
            };

            let value = match self.http.get_json_cached(&url).await {
                Ok(value) => value,
                Err(e) => {
                    warn!("page fetch failed for {}: {}", base, e);
                    break;
                }
            };

            pages_walked += 1;
            let page = parse_page(&value, items_key);
            if page.items.is_empty() {
                break;
            }

            let typed: Vec<_> = page.items.iter().filter_map(&mut convert).collect();
            let (kept, decision) = split_page_at_cutoff(typed, cutoff);
            out.extend(kept);

            if decision == PageDecision::Stop {
                break;
            }

            // never revisit a consumed cursor
            match page.cursor {
                Some(next) if Some(&next) != cursor.as_ref() => cursor = Some(next),
                _ => break,
            }
        }

        debug!(
            "walked {} page(s) of {}, kept {} item(s)",
            pages_walked,
            base,
            out.len()
        );
        out
    }

    /// Records of one repository collection within the cutoff, newest
    /// first as the server returns them.
    pub async fn list_records(
        &self,
        pds: &str,
        repo: &str,
        collection: &str,
        cutoff: Option<DateTime<Utc>>,
    ) -> Vec<CollectionRecord> {
        let base = format!(
            "{}/xrpc/com.atproto.repo.listRecords",
            pds.trim_end_matches('/')
        );

        self.walk(
            &base,
            &[("repo", repo), ("collection", collection)],
            "records",
            cutoff,
            |item| {
                let uri = item.get("uri").and_then(|v| v.as_str())?.to_string();
                let value = item.get("value").cloned().unwrap_or(Value::Null);
                let record = CollectionRecord::from_parts(collection, uri, value);
                Some((record.created_at, record))
            },
        )
        .await
    }

    /// Author feed items within the cutoff, reduced to own-post
    /// counters.
    pub async fn author_feed(
        &self,
        appview: &str,
        actor: &str,
        cutoff: Option<DateTime<Utc>>,
    ) -> Vec<FeedPost> {
        let base = format!(
            "{}/xrpc/app.bsky.feed.getAuthorFeed",
            appview.trim_end_matches('/')
        );

        self.walk(&base, &[("actor", actor)], "feed", cutoff, |item| {
            let post = parse_feed_post(item)?;
            Some((post.created_at, post))
        })
        .await
    }

    /// Count blobs held by the repository. Items may be bare CID strings
    /// or objects; objects with a `createdAt` at or after the cutoff (or
    /// none at all) count when a cutoff is given.
    pub async fn blob_count(
        &self,
        pds: &str,
        did: &str,
        cutoff: Option<DateTime<Utc>>,
    ) -> usize {
        let base = format!(
            "{}/xrpc/com.atproto.sync.listBlobs",
            pds.trim_end_matches('/')
        );

        self.walk(&base, &[("did", did)], "cids", cutoff, |item| {
            let ts = item
                .get("createdAt")
                .and_then(|v| v.as_str())
                .and_then(parse_timestamp);
            Some((ts, ()))
        })
        .await
        .len()
    }

    /// The repository's collection list, each name tagged with its
    /// namespace at ingestion.
    pub async fn describe_repo(
        &self,
        pds: &str,
        repo: &str,
    ) -> Result<Vec<CollectionInfo>, AuditError> {
        let base = format!(
            "{}/xrpc/com.atproto.repo.describeRepo",
            pds.trim_end_matches('/')
        );
        let url = build_url(&base, &[("repo", repo)])?;
        let value = self.http.get_json_cached(&url).await?;

        let collections = value
            .get("collections")
            .and_then(|v| v.as_array())
            .map(|names| {
                names
                    .iter()
                    .filter_map(|v| v.as_str())
                    .map(|name| CollectionInfo::new(name.to_string()))
                    .collect()
            })
            .unwrap_or_default();

        Ok(collections)
    }

    /// The account's profile view from the public feed aggregator.
    pub async fn get_profile(
        &self,
        appview: &str,
        actor: &str,
    ) -> Result<ProfileView, AuditError> {
        let base = format!(
            "{}/xrpc/app.bsky.actor.getProfile",
            appview.trim_end_matches('/')
        );
        let url = build_url(&base, &[("actor", actor)])?;
        let value = self.http.get_json_cached(&url).await?;

        serde_json::from_value(value).map_err(|e| AuditError::InvalidDocument {
            url,
            message: e.to_string(),
        })
    }
}

/// Reduce one author-feed item (shape `{ post: {...} }`) to the post's
/// own counters. Counters on nested and quoted posts are never read.
fn parse_feed_post(item: &Value) -> Option<FeedPost> {
    let post = item.get("post")?;

    let created_at = post
        .get("record")
        .and_then(|r| r.get("createdAt"))
        .and_then(|v| v.as_str())
        .or_else(|| post.get("indexedAt").and_then(|v| v.as_str()))
        .and_then(parse_timestamp);

    Some(FeedPost {
        uri: post.get("uri").and_then(|v| v.as_str())?.to_string(),
        author_did: post
            .get("author")
            .and_then(|a| a.get("did"))
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string(),
        like_count: post.get("likeCount").and_then(|v| v.as_u64()).unwrap_or(0),
        repost_count: post
            .get("repostCount")
            .and_then(|v| v.as_u64())
            .unwrap_or(0),
        quote_count: post
            .get("quoteCount")
            .and_then(|v| v.as_u64())
            .unwrap_or(0),
        reply_count: post
            .get("replyCount")
            .and_then(|v| v.as_u64())
            .unwrap_or(0),
        created_at,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn ts(day: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, day, 0, 0, 0).unwrap()
    }

    #[test]
    fn test_all_fresh_page_continues() {
        let items = vec![(Some(ts(20)), "a"), (Some(ts(18)), "b")];
        let (kept, decision) = split_page_at_cutoff(items, Some(ts(10)));
        assert_eq!(kept, vec!["a", "b"]);
        assert_eq!(decision, PageDecision::Continue);
    }

    #[test]
    fn test_boundary_page_keeps_in_window_records_and_stops() {
        // first record inside the window, second one past the cutoff
        let items = vec![(Some(ts(15)), "fresh"), (Some(ts(5)), "stale")];
        let (kept, decision) = split_page_at_cutoff(items, Some(ts(10)));
        assert_eq!(kept, vec!["fresh"]);
        assert_eq!(decision, PageDecision::Stop);
    }

    #[test]
    fn test_timestampless_items_are_always_kept() {
        let items = vec![(None, "mystery"), (Some(ts(20)), "fresh")];
        let (kept, decision) = split_page_at_cutoff(items, Some(ts(10)));
        assert_eq!(kept, vec!["mystery", "fresh"]);
        // the missing timestamp never drives the stop decision
        assert_eq!(decision, PageDecision::Continue);
    }

    #[test]
    fn test_timestampless_item_on_boundary_page_survives() {
        let items = vec![(Some(ts(5)), "stale"), (None, "mystery")];
        let (kept, decision) = split_page_at_cutoff(items, Some(ts(10)));
        assert_eq!(kept, vec!["mystery"]);
        assert_eq!(decision, PageDecision::Stop);
    }

    #[test]
    fn test_no_cutoff_keeps_everything() {
        let items = vec![(Some(ts(1)), "old"), (None, "mystery")];
        let (kept, decision) = split_page_at_cutoff(items, None);
        assert_eq!(kept, vec!["old", "mystery"]);
        assert_eq!(decision, PageDecision::Continue);
    }

    #[test]
    fn test_parse_page_extracts_cursor() {
        let value = json!({
            "records": [{ "uri": "at://x/y/1", "value": {} }],
            "cursor": "next-page"
        });
        let page = parse_page(&value, "records");
        assert_eq!(page.items.len(), 1);
        assert_eq!(page.cursor.as_deref(), Some("next-page"));

        let value = json!({ "records": [] });
        let page = parse_page(&value, "records");
        assert!(page.items.is_empty());
        assert!(page.cursor.is_none());
    }

    #[test]
    fn test_parse_feed_post_reads_own_counters_only() {
        let item = json!({
            "post": {
                "uri": "at://did:plc:owner/app.bsky.feed.post/1",
                "author": { "did": "did:plc:owner", "handle": "owner.bsky.social" },
                "likeCount": 7,
                "repostCount": 2,
                "quoteCount": 1,
                "replyCount": 4,
                "indexedAt": "2025-06-15T00:00:00Z",
                "record": { "createdAt": "2025-06-14T12:00:00Z" },
                "embed": {
                    "record": { "likeCount": 9999 }
                }
            }
        });

        let post = parse_feed_post(&item).unwrap();
        assert_eq!(post.like_count, 7);
        assert_eq!(post.reply_count, 4);
        assert_eq!(post.author_did, "did:plc:owner");
        // record.createdAt wins over indexedAt
        assert_eq!(post.created_at, Some(ts(14) + chrono::Duration::hours(12)));
    }

    #[test]
    fn test_parse_feed_post_falls_back_to_indexed_at() {
        let item = json!({
            "post": {
                "uri": "at://did:plc:owner/app.bsky.feed.post/2",
                "author": { "did": "did:plc:owner" },
                "indexedAt": "2025-06-15T00:00:00Z",
                "record": {}
            }
        });
        let post = parse_feed_post(&item).unwrap();
        assert_eq!(post.created_at, Some(ts(15)));
    }
}
