//! Post classification and statistics.
//!
//! `compute_post_stats` turns a merged set of post and repost records
//! into typed counts, per-day rates, and percentages. It classifies each
//! post along independent axes: reply vs. top-level (self vs. other),
//! quote vs. repost (self vs. other), media kind, and alt-text coverage.

use crate::analysis::{round_to_two, safe_div};
use crate::models::{CollectionRecord, Embed, FacetFeature, PostRecord, PostStats, RecordValue};

/// Media classification for a single post. Mutually exclusive; the
/// embed type wins over facet-derived detection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MediaKind {
    Image,
    Video,
    Link,
    Mention,
    TextOnly,
}

/// Compute post statistics for one window.
///
/// `records` is the merged post + repost set for the window; other
/// record kinds are ignored. Rates divide by `period_days` (0 when the
/// period is 0); percentages use safe division throughout.
pub fn compute_post_stats(
    records: &[CollectionRecord],
    owner_did: &str,
    period_days: i64,
) -> PostStats {
    let mut stats = PostStats::default();

    for record in records {
        match &record.value {
            RecordValue::Post(post) => {
                stats.posts_count += 1;

                if let Some(reply) = &post.reply {
                    stats.replies_count += 1;
                    if uri_embeds_did(&reply.parent.uri, owner_did) {
                        stats.self_replies_count += 1;
                    }
                }

                if let Some(subject_uri) = quoted_subject(post) {
                    stats.quotes_count += 1;
                    if uri_embeds_did(subject_uri, owner_did) {
                        stats.self_quotes_count += 1;
                    }
                }

                match media_kind(post) {
                    MediaKind::Image => {
                        stats.posts_with_images += 1;
                        if has_alt_text(post) {
                            stats.posts_with_alt_text += 1;
                        }
                    }
                    MediaKind::Video => stats.posts_with_video += 1,
                    MediaKind::Link => stats.posts_with_links += 1,
                    MediaKind::Mention => stats.posts_with_mentions += 1,
                    MediaKind::TextOnly => stats.text_only_posts += 1,
                }
            }
            RecordValue::Repost(repost) => {
                stats.reposts_count += 1;
                if uri_embeds_did(&repost.subject.uri, owner_did) {
                    stats.self_reposts_count += 1;
                }
            }
            _ => {}
        }
    }

    let days = period_days as f64;
    let posts = stats.posts_count as f64;
    let reposts = stats.reposts_count as f64;
    let media_posts =
        (stats.posts_with_images + stats.posts_with_video + stats.posts_with_links) as f64;

    stats.posts_per_day = safe_div(posts, days);
    stats.replies_per_day = safe_div(stats.replies_count as f64, days);
    stats.reposts_per_day = safe_div(reposts, days);
    stats.reply_percentage = safe_div(stats.replies_count as f64, posts);
    stats.quote_percentage = safe_div(stats.quotes_count as f64, posts);
    stats.repost_percentage = safe_div(reposts, posts + reposts);
    stats.media_percentage = safe_div(media_posts, posts);
    stats.alt_text_percentage = safe_div(
        stats.posts_with_alt_text as f64,
        stats.posts_with_images as f64,
    );

    stats
}

impl PostStats {
    /// Copy with every rate and percentage rounded to two decimals.
    /// Used when packaging the output document only.
    pub fn rounded(&self) -> Self {
        let mut out = self.clone();
        out.posts_per_day = round_to_two(out.posts_per_day);
        out.replies_per_day = round_to_two(out.replies_per_day);
        out.reposts_per_day = round_to_two(out.reposts_per_day);
        out.reply_percentage = round_to_two(out.reply_percentage);
        out.quote_percentage = round_to_two(out.quote_percentage);
        out.repost_percentage = round_to_two(out.repost_percentage);
        out.media_percentage = round_to_two(out.media_percentage);
        out.alt_text_percentage = round_to_two(out.alt_text_percentage);
        out
    }
}

/// Whether a record URI references the given DID as its repository.
fn uri_embeds_did(uri: &str, did: &str) -> bool {
    !did.is_empty() && uri.contains(did)
}

/// The subject URI of a quote post, if the post embeds another record.
fn quoted_subject(post: &PostRecord) -> Option<&str> {
    match post.embed.as_ref()? {
        Embed::Record { record } => Some(record.uri.as_str()),
        Embed::RecordWithMedia { record, .. } => Some(record.record.uri.as_str()),
        _ => None,
    }
}

fn media_kind(post: &PostRecord) -> MediaKind {
    if let Some(kind) = embed_media_kind(post.embed.as_ref()) {
        return kind;
    }

    let mut has_link = false;
    let mut has_mention = false;
    for facet in &post.facets {
        for feature in &facet.features {
            match feature {
                FacetFeature::Link {} => has_link = true,
                FacetFeature::Mention {} => has_mention = true,
                _ => {}
            }
        }
    }

    if has_link {
        MediaKind::Link
    } else if has_mention {
        MediaKind::Mention
    } else {
        MediaKind::TextOnly
    }
}

fn embed_media_kind(embed: Option<&Embed>) -> Option<MediaKind> {
    match embed? {
        Embed::Images { .. } => Some(MediaKind::Image),
        Embed::Video {} => Some(MediaKind::Video),
        Embed::External {} => Some(MediaKind::Link),
        Embed::RecordWithMedia { media, .. } => embed_media_kind(Some(media)),
        Embed::Record { .. } | Embed::Unsupported => None,
    }
}

/// Whether any image on the post carries non-empty alt text (trimmed).
fn has_alt_text(post: &PostRecord) -> bool {
    fn images_have_alt(embed: &Embed) -> bool {
        match embed {
            Embed::Images { images } => images.iter().any(|img| !img.alt.trim().is_empty()),
            Embed::RecordWithMedia { media, .. } => images_have_alt(media),
            _ => false,
        }
    }
    post.embed.as_ref().is_some_and(images_have_alt)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::CollectionRecord;
    use serde_json::json;

    const OWNER: &str = "did:plc:owner";

    fn post_record(value: serde_json::Value) -> CollectionRecord {
        CollectionRecord::from_parts(
            "app.bsky.feed.post",
            format!("at://{OWNER}/app.bsky.feed.post/{}", value["text"]),
            value,
        )
    }

    fn repost_record(subject_uri: &str) -> CollectionRecord {
        CollectionRecord::from_parts(
            "app.bsky.feed.repost",
            format!("at://{OWNER}/app.bsky.feed.repost/r1"),
            json!({
                "$type": "app.bsky.feed.repost",
                "subject": { "uri": subject_uri, "cid": "x" },
                "createdAt": "2025-06-01T00:00:00Z"
            }),
        )
    }

    #[test]
    fn test_empty_window_yields_all_zeros() {
        let stats = compute_post_stats(&[], OWNER, 30);
        assert_eq!(stats.posts_count, 0);
        assert_eq!(stats.posts_per_day, 0.0);
        assert_eq!(stats.alt_text_percentage, 0.0);
        assert_eq!(stats.reply_percentage, 0.0);
        assert!(stats.repost_percentage.is_finite());
    }

    #[test]
    fn test_zero_period_days_produces_zero_rates() {
        let records = vec![post_record(json!({
            "$type": "app.bsky.feed.post",
            "text": "a",
            "createdAt": "2025-06-01T00:00:00Z"
        }))];
        let stats = compute_post_stats(&records, OWNER, 0);
        assert_eq!(stats.posts_count, 1);
        assert_eq!(stats.posts_per_day, 0.0);
        assert_eq!(stats.replies_per_day, 0.0);
    }

    #[test]
    fn test_self_vs_other_reply_classification() {
        let records = vec![
            post_record(json!({
                "$type": "app.bsky.feed.post",
                "text": "self",
                "createdAt": "2025-06-01T00:00:00Z",
                "reply": {
                    "root": { "uri": format!("at://{OWNER}/app.bsky.feed.post/1"), "cid": "a" },
                    "parent": { "uri": format!("at://{OWNER}/app.bsky.feed.post/1"), "cid": "a" }
                }
            })),
            post_record(json!({
                "$type": "app.bsky.feed.post",
                "text": "other",
                "createdAt": "2025-06-01T00:00:00Z",
                "reply": {
                    "root": { "uri": "at://did:plc:someone/app.bsky.feed.post/1", "cid": "b" },
                    "parent": { "uri": "at://did:plc:someone/app.bsky.feed.post/1", "cid": "b" }
                }
            })),
        ];

        let stats = compute_post_stats(&records, OWNER, 30);
        assert_eq!(stats.replies_count, 2);
        assert_eq!(stats.self_replies_count, 1);
    }

    #[test]
    fn test_quote_and_repost_self_detection() {
        let records = vec![
            post_record(json!({
                "$type": "app.bsky.feed.post",
                "text": "selfquote",
                "createdAt": "2025-06-01T00:00:00Z",
                "embed": {
                    "$type": "app.bsky.embed.record",
                    "record": { "uri": format!("at://{OWNER}/app.bsky.feed.post/7"), "cid": "c" }
                }
            })),
            repost_record("at://did:plc:someone/app.bsky.feed.post/3"),
            repost_record(&format!("at://{OWNER}/app.bsky.feed.post/4")),
        ];

        let stats = compute_post_stats(&records, OWNER, 30);
        assert_eq!(stats.quotes_count, 1);
        assert_eq!(stats.self_quotes_count, 1);
        assert_eq!(stats.reposts_count, 2);
        assert_eq!(stats.self_reposts_count, 1);
        // 2 reposts over 1 post + 2 reposts
        assert!((stats.repost_percentage - 2.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_embed_wins_over_facet_link() {
        // images embed + link facet: classified as image, not link
        let records = vec![post_record(json!({
            "$type": "app.bsky.feed.post",
            "text": "pic with link",
            "createdAt": "2025-06-01T00:00:00Z",
            "embed": {
                "$type": "app.bsky.embed.images",
                "images": [{ "alt": "  ", "image": {} }]
            },
            "facets": [
                { "features": [{ "$type": "app.bsky.richtext.facet#link", "uri": "https://x.example" }] }
            ]
        }))];

        let stats = compute_post_stats(&records, OWNER, 30);
        assert_eq!(stats.posts_with_images, 1);
        assert_eq!(stats.posts_with_links, 0);
        // whitespace-only alt does not count
        assert_eq!(stats.posts_with_alt_text, 0);
    }

    #[test]
    fn test_mention_and_text_only_classification() {
        let records = vec![
            post_record(json!({
                "$type": "app.bsky.feed.post",
                "text": "@someone hi",
                "createdAt": "2025-06-01T00:00:00Z",
                "facets": [
                    { "features": [{ "$type": "app.bsky.richtext.facet#mention", "did": "did:plc:someone" }] }
                ]
            })),
            post_record(json!({
                "$type": "app.bsky.feed.post",
                "text": "plain",
                "createdAt": "2025-06-01T00:00:00Z"
            })),
        ];

        let stats = compute_post_stats(&records, OWNER, 30);
        assert_eq!(stats.posts_with_mentions, 1);
        assert_eq!(stats.text_only_posts, 1);
    }

    #[test]
    fn test_alt_text_percentage_bounds() {
        let records = vec![
            post_record(json!({
                "$type": "app.bsky.feed.post",
                "text": "with alt",
                "createdAt": "2025-06-01T00:00:00Z",
                "embed": {
                    "$type": "app.bsky.embed.images",
                    "images": [{ "alt": "described", "image": {} }]
                }
            })),
            post_record(json!({
                "$type": "app.bsky.feed.post",
                "text": "no alt",
                "createdAt": "2025-06-01T00:00:00Z",
                "embed": {
                    "$type": "app.bsky.embed.images",
                    "images": [{ "alt": "", "image": {} }]
                }
            })),
        ];

        let stats = compute_post_stats(&records, OWNER, 30);
        assert_eq!(stats.alt_text_percentage, 0.5);
        assert!(stats.alt_text_percentage >= 0.0 && stats.alt_text_percentage <= 1.0);
    }

    #[test]
    fn test_compute_post_stats_is_referentially_pure() {
        let records = vec![
            post_record(json!({
                "$type": "app.bsky.feed.post",
                "text": "a",
                "createdAt": "2025-06-01T00:00:00Z"
            })),
            repost_record("at://did:plc:someone/app.bsky.feed.post/3"),
        ];

        let first = compute_post_stats(&records, OWNER, 30);
        let second = compute_post_stats(&records, OWNER, 30);
        assert_eq!(first, second);
    }

    #[test]
    fn test_rounded_only_touches_rates() {
        let records = vec![post_record(json!({
            "$type": "app.bsky.feed.post",
            "text": "a",
            "createdAt": "2025-06-01T00:00:00Z"
        }))];
        let stats = compute_post_stats(&records, OWNER, 30);
        let rounded = stats.rounded();
        assert_eq!(rounded.posts_count, stats.posts_count);
        assert_eq!(rounded.posts_per_day, 0.03);
    }
}
