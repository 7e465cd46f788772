//! Engagement aggregation over the author feed.

use crate::models::{EngagementSnapshot, FeedPost};

/// Sum the directly-attributed interaction counters over a window's
/// feed items.
///
/// Only counters on the post's own view are summed, and only for items
/// whose author DID equals the owner. The author filter holds even on
/// an author-scoped feed, which may carry pinned or reposted foreign
/// posts.
pub fn aggregate_engagement(feed: &[FeedPost], owner_did: &str) -> EngagementSnapshot {
    let mut snapshot = EngagementSnapshot::default();

    for post in feed.iter().filter(|p| p.author_did == owner_did) {
        snapshot.likes_received += post.like_count;
        snapshot.reposts_received += post.repost_count;
        snapshot.quotes_received += post.quote_count;
        snapshot.replies_received += post.reply_count;
    }

    snapshot
}
