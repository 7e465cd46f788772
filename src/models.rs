//! Data models for the aggregation pipeline.
//!
//! This module contains the core data structures: resolved identities,
//! repository records with their typed payloads, period windows, post
//! statistics, and the nested score-input document.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Namespace prefixes that mark a collection as belonging to the
/// flagship Bluesky application.
pub const BLUESKY_NAMESPACE_PREFIXES: [&str; 2] = ["app.bsky.", "chat.bsky."];

/// The default handle domain handed out at registration.
pub const DEFAULT_HANDLE_DOMAIN: &str = ".bsky.social";

/// Which application namespace a collection belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Namespace {
    Bluesky,
    Other,
}

/// A repository collection name with its namespace tag.
///
/// The tag is computed once at ingestion and carried as a field; nothing
/// downstream re-derives it from the name.
#[derive(Debug, Clone)]
pub struct CollectionInfo {
    pub name: String,
    pub namespace: Namespace,
}

impl CollectionInfo {
    pub fn new(name: String) -> Self {
        let namespace = if BLUESKY_NAMESPACE_PREFIXES
            .iter()
            .any(|prefix| name.starts_with(prefix))
        {
            Namespace::Bluesky
        } else {
            Namespace::Other
        };
        Self { name, namespace }
    }
}

/// A resolved identity. Built once per run, immutable thereafter.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Identity {
    pub handle: String,
    pub did: String,
    pub service_endpoint: String,
}

/// Identity metrics derived from the PLC operation log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IdentityHistory {
    /// Number of operations in the audit log.
    pub plc_operations: usize,
    /// Rotation keys on the latest operation.
    pub rotation_key_count: usize,
    /// alsoKnownAs values on the latest operation.
    pub current_aka: Vec<String>,
    /// Size of the union of alsoKnownAs values across all operations.
    pub historical_aka_count: usize,
}

impl IdentityHistory {
    /// Fixed defaults for `did:web` identities, which have no PLC log.
    pub fn did_web_default(handle: &str) -> Self {
        Self {
            plc_operations: 0,
            rotation_key_count: 1,
            current_aka: vec![format!("at://{handle}")],
            historical_aka_count: 1,
        }
    }
}

/// Profile view fetched once from the public feed aggregator.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProfileView {
    pub did: String,
    pub handle: String,
    pub display_name: Option<String>,
    pub description: Option<String>,
    pub banner: Option<String>,
    pub avatar: Option<String>,
    pub followers_count: u64,
    pub follows_count: u64,
    pub posts_count: u64,
    pub created_at: Option<DateTime<Utc>>,
}

/// One record pulled from a repository collection.
///
/// Held only during aggregation; never persisted.
#[derive(Debug, Clone)]
pub struct CollectionRecord {
    #[allow(dead_code)] // Carried for logging and future per-record output
    pub uri: String,
    #[allow(dead_code)] // Carried for logging and future per-record output
    pub collection: String,
    pub value: RecordValue,
    pub created_at: Option<DateTime<Utc>>,
}

impl CollectionRecord {
    /// Build a record from a `listRecords` entry, parsing the payload
    /// into a typed schema for known collections. Anything unrecognized
    /// (or malformed) keeps its raw JSON and gets a bounded fallback
    /// scan for a creation timestamp.
    pub fn from_parts(collection: &str, uri: String, value: serde_json::Value) -> Self {
        let parsed = match collection {
            "app.bsky.feed.post" => serde_json::from_value::<PostRecord>(value.clone())
                .map(RecordValue::Post)
                .ok(),
            "app.bsky.feed.repost" => serde_json::from_value::<SubjectRecord>(value.clone())
                .map(RecordValue::Repost)
                .ok(),
            "app.bsky.feed.like" => serde_json::from_value::<SubjectRecord>(value.clone())
                .map(RecordValue::Like)
                .ok(),
            "app.bsky.graph.follow" => serde_json::from_value::<FollowRecord>(value.clone())
                .map(RecordValue::Follow)
                .ok(),
            _ => None,
        };

        let value = parsed.unwrap_or(RecordValue::Unknown(value));
        let created_at = match &value {
            RecordValue::Post(post) => post.created_at.as_deref().and_then(parse_timestamp),
            RecordValue::Repost(subject) | RecordValue::Like(subject) => {
                subject.created_at.as_deref().and_then(parse_timestamp)
            }
            RecordValue::Follow(follow) => follow.created_at.as_deref().and_then(parse_timestamp),
            RecordValue::Unknown(raw) => find_created_at(raw, 3),
        };

        Self {
            uri,
            collection: collection.to_string(),
            value,
            created_at,
        }
    }
}

/// Typed payload of a repository record. Known kinds carry explicit
/// schemas with an optional timestamp; unrecognized collections keep
/// their raw JSON.
#[derive(Debug, Clone)]
pub enum RecordValue {
    Post(PostRecord),
    Repost(SubjectRecord),
    Like(SubjectRecord),
    Follow(FollowRecord),
    Unknown(serde_json::Value),
}

/// A post record (`app.bsky.feed.post`).
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostRecord {
    #[serde(default)]
    #[allow(dead_code)] // Schema field; classification never reads the body
    pub text: String,
    pub created_at: Option<String>,
    pub reply: Option<ReplyRef>,
    pub embed: Option<Embed>,
    #[serde(default)]
    pub facets: Vec<Facet>,
}

/// A repost or like record: a subject reference plus a timestamp.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubjectRecord {
    pub subject: StrongRef,
    pub created_at: Option<String>,
}

/// A follow record: subject is a bare DID.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FollowRecord {
    #[serde(default)]
    #[allow(dead_code)] // Schema field; only the timestamp feeds the tallies
    pub subject: String,
    pub created_at: Option<String>,
}

/// Reference to the parent post of a reply.
#[derive(Debug, Clone, Deserialize)]
pub struct ReplyRef {
    pub parent: StrongRef,
}

/// A URI reference to another record.
#[derive(Debug, Clone, Deserialize)]
pub struct StrongRef {
    #[serde(default)]
    pub uri: String,
}

/// Post embed, tagged by lexicon `$type`.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "$type")]
pub enum Embed {
    #[serde(rename = "app.bsky.embed.images")]
    Images { images: Vec<ImageItem> },
    #[serde(rename = "app.bsky.embed.video")]
    Video {},
    #[serde(rename = "app.bsky.embed.external")]
    External {},
    #[serde(rename = "app.bsky.embed.record")]
    Record { record: StrongRef },
    #[serde(rename = "app.bsky.embed.recordWithMedia")]
    RecordWithMedia {
        record: EmbedRecordRef,
        media: Box<Embed>,
    },
    #[serde(other)]
    Unsupported,
}

/// The record half of a record-with-media embed.
#[derive(Debug, Clone, Deserialize)]
pub struct EmbedRecordRef {
    pub record: StrongRef,
}

/// An image in an images embed.
#[derive(Debug, Clone, Deserialize)]
pub struct ImageItem {
    #[serde(default)]
    pub alt: String,
}

/// A rich-text facet on a post.
#[derive(Debug, Clone, Deserialize)]
pub struct Facet {
    #[serde(default)]
    pub features: Vec<FacetFeature>,
}

/// A facet feature, tagged by lexicon `$type`.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "$type")]
pub enum FacetFeature {
    #[serde(rename = "app.bsky.richtext.facet#link")]
    Link {},
    #[serde(rename = "app.bsky.richtext.facet#mention")]
    Mention {},
    #[serde(rename = "app.bsky.richtext.facet#tag")]
    Tag {},
    #[serde(other)]
    Unsupported,
}

/// One item from the author feed, reduced to the post's own counters.
///
/// Counters are read from the top-level post view only; metrics on
/// nested or quoted posts are never attributed to the author.
#[derive(Debug, Clone, Default)]
pub struct FeedPost {
    #[allow(dead_code)] // Carried for logging and future per-post output
    pub uri: String,
    pub author_did: String,
    pub like_count: u64,
    pub repost_count: u64,
    pub quote_count: u64,
    pub reply_count: u64,
    pub created_at: Option<DateTime<Utc>>,
}

/// One analysis window: a day span and its fixed cutoff.
///
/// The cutoff is computed once when the window is built and never
/// recomputed mid-aggregation.
#[derive(Debug, Clone, Copy)]
pub struct PeriodWindow {
    pub days: i64,
    pub cutoff: DateTime<Utc>,
}

impl PeriodWindow {
    pub fn new(days: i64, now: DateTime<Utc>) -> Self {
        Self {
            days,
            cutoff: now - chrono::Duration::days(days),
        }
    }
}

/// Classified post counts, per-day rates, and derived percentages for
/// one window. Rates and percentages stay unrounded until packaging.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PostStats {
    pub posts_count: usize,
    pub replies_count: usize,
    pub self_replies_count: usize,
    pub quotes_count: usize,
    pub self_quotes_count: usize,
    pub reposts_count: usize,
    pub self_reposts_count: usize,
    pub posts_with_images: usize,
    pub posts_with_video: usize,
    pub posts_with_links: usize,
    pub posts_with_mentions: usize,
    pub text_only_posts: usize,
    pub posts_with_alt_text: usize,
    pub posts_per_day: f64,
    pub replies_per_day: f64,
    pub reposts_per_day: f64,
    pub reply_percentage: f64,
    pub quote_percentage: f64,
    pub repost_percentage: f64,
    pub media_percentage: f64,
    pub alt_text_percentage: f64,
}

/// Interaction totals directly attributed to the account's own posts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EngagementSnapshot {
    pub likes_received: u64,
    pub reposts_received: u64,
    pub quotes_received: u64,
    pub replies_received: u64,
}

impl EngagementSnapshot {
    pub fn total(&self) -> u64 {
        self.likes_received + self.reposts_received + self.quotes_received + self.replies_received
    }
}

/// The assembled score input for one window: raw metrics grouped into
/// categories, each with a score field the external scorer fills in.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreInputDocument {
    pub handle: String,
    pub did: String,
    pub period_days: i64,
    pub generated_at: DateTime<Utc>,
    pub bluesky_categories: BlueskyCategories,
    pub atproto_categories: AtprotoCategories,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlueskyCategories {
    pub profile_quality: ProfileQuality,
    pub community_engagement: CommunityEngagement,
    pub content_activity: ContentActivity,
    pub recognition_status: RecognitionStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileQuality {
    pub profile_completion: String,
    pub alt_text_percentage: f64,
    pub domain_rarity: String,
    pub custom_domain: bool,
    #[serde(default)]
    pub score: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommunityEngagement {
    pub engagement: EngagementSnapshot,
    pub engagement_rate: f64,
    pub followers_count: u64,
    pub follows_count: u64,
    pub follow_ratio: f64,
    pub social_status: String,
    #[serde(default)]
    pub score: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentActivity {
    pub stats: PostStats,
    pub records_per_day: f64,
    pub total_records: u64,
    pub activity_status: String,
    pub posting_style: String,
    pub bluesky_weekly_activity: Vec<u64>,
    #[serde(default)]
    pub score: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecognitionStatus {
    pub era: String,
    pub account_age_days: i64,
    pub age_percentile: f64,
    #[serde(default)]
    pub score: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AtprotoCategories {
    pub decentralization: Decentralization,
    pub protocol_activity: ProtocolActivity,
    pub account_maturity: AccountMaturity,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Decentralization {
    pub pds_host: String,
    pub pds_host_kind: String,
    pub did_method: String,
    pub custom_domain: bool,
    pub rotation_key_count: usize,
    #[serde(default)]
    pub score: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProtocolActivity {
    pub collections_total: usize,
    pub non_bluesky_collections: usize,
    pub non_bluesky_records: u64,
    pub blob_count: u64,
    pub other_weekly_activity: Vec<u64>,
    #[serde(default)]
    pub score: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountMaturity {
    pub account_age_days: i64,
    pub plc_operations: usize,
    pub historical_aka_count: usize,
    pub era: String,
    #[serde(default)]
    pub score: f64,
}

/// Everything one resolution run produces: the identity plus the two
/// window documents and their narratives.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolveOutcome {
    pub identity: Identity,
    pub window_30: ScoreInputDocument,
    pub window_90: ScoreInputDocument,
    pub narrative_30: String,
    pub narrative_90: String,
}

/// Parse an RFC 3339 timestamp, returning `None` on any malformation.
///
/// Callers treat a missing timestamp as "include the record anyway", so
/// a parse failure must degrade to `None` rather than drop the record.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|ts| ts.with_timezone(&Utc))
}

/// Bounded scan for a `createdAt` field in an unrecognized record shape.
///
/// Looks at the top level first, then descends into nested objects up to
/// `depth` levels. Arrays are not traversed.
fn find_created_at(value: &serde_json::Value, depth: u8) -> Option<DateTime<Utc>> {
    let obj = value.as_object()?;
    if let Some(raw) = obj.get("createdAt").and_then(|v| v.as_str()) {
        return parse_timestamp(raw);
    }
    if depth == 0 {
        return None;
    }
    obj.values()
        .filter(|v| v.is_object())
        .find_map(|v| find_created_at(v, depth - 1))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_collection_namespace_tagging() {
        assert_eq!(
            CollectionInfo::new("app.bsky.feed.post".to_string()).namespace,
            Namespace::Bluesky
        );
        assert_eq!(
            CollectionInfo::new("chat.bsky.actor.declaration".to_string()).namespace,
            Namespace::Bluesky
        );
        assert_eq!(
            CollectionInfo::new("fyi.unravel.frontpage.post".to_string()).namespace,
            Namespace::Other
        );
    }

    #[test]
    fn test_post_record_parses_reply_and_embed() {
        let value = json!({
            "$type": "app.bsky.feed.post",
            "text": "hello",
            "createdAt": "2025-06-01T12:00:00Z",
            "reply": {
                "root": { "uri": "at://did:plc:abc/app.bsky.feed.post/1", "cid": "x" },
                "parent": { "uri": "at://did:plc:abc/app.bsky.feed.post/2", "cid": "y" }
            },
            "embed": {
                "$type": "app.bsky.embed.images",
                "images": [{ "alt": "a cat", "image": {} }]
            }
        });

        let record = CollectionRecord::from_parts(
            "app.bsky.feed.post",
            "at://did:plc:abc/app.bsky.feed.post/3".to_string(),
            value,
        );

        assert!(record.created_at.is_some());
        let RecordValue::Post(post) = &record.value else {
            panic!("expected a post payload");
        };
        assert_eq!(
            post.reply.as_ref().map(|r| r.parent.uri.as_str()),
            Some("at://did:plc:abc/app.bsky.feed.post/2")
        );
        assert!(matches!(post.embed, Some(Embed::Images { .. })));
    }

    #[test]
    fn test_unknown_collection_keeps_raw_value_and_scans_timestamp() {
        let value = json!({
            "$type": "fyi.unravel.frontpage.post",
            "content": { "createdAt": "2025-05-01T00:00:00Z" }
        });

        let record = CollectionRecord::from_parts(
            "fyi.unravel.frontpage.post",
            "at://did:plc:abc/fyi.unravel.frontpage.post/1".to_string(),
            value,
        );

        assert!(matches!(record.value, RecordValue::Unknown(_)));
        assert!(record.created_at.is_some());
    }

    #[test]
    fn test_fallback_scan_is_depth_bounded() {
        // createdAt buried five objects deep stays undiscovered
        let value = json!({
            "a": { "b": { "c": { "d": { "e": { "createdAt": "2025-05-01T00:00:00Z" } } } } }
        });
        assert!(find_created_at(&value, 3).is_none());
    }

    #[test]
    fn test_malformed_timestamp_degrades_to_none() {
        let value = json!({
            "$type": "app.bsky.feed.post",
            "text": "no clock",
            "createdAt": "not-a-date"
        });
        let record = CollectionRecord::from_parts(
            "app.bsky.feed.post",
            "at://did:plc:abc/app.bsky.feed.post/4".to_string(),
            value,
        );
        assert!(record.created_at.is_none());
        assert!(matches!(record.value, RecordValue::Post(_)));
    }

    #[test]
    fn test_record_with_media_embed_parses_nested_media() {
        let value = json!({
            "$type": "app.bsky.feed.post",
            "text": "quote with pics",
            "createdAt": "2025-06-01T12:00:00Z",
            "embed": {
                "$type": "app.bsky.embed.recordWithMedia",
                "record": { "record": { "uri": "at://did:plc:other/app.bsky.feed.post/9", "cid": "z" } },
                "media": {
                    "$type": "app.bsky.embed.images",
                    "images": [{ "alt": "", "image": {} }]
                }
            }
        });

        let record = CollectionRecord::from_parts(
            "app.bsky.feed.post",
            "at://did:plc:abc/app.bsky.feed.post/5".to_string(),
            value,
        );
        let RecordValue::Post(post) = &record.value else {
            panic!("expected a post payload");
        };
        match &post.embed {
            Some(Embed::RecordWithMedia { record, media }) => {
                assert_eq!(record.record.uri, "at://did:plc:other/app.bsky.feed.post/9");
                assert!(matches!(media.as_ref(), Embed::Images { .. }));
            }
            other => panic!("unexpected embed: {other:?}"),
        }
    }

    #[test]
    fn test_period_window_cutoff_arithmetic() {
        let now = Utc::now();
        let window = PeriodWindow::new(30, now);
        assert_eq!((now - window.cutoff).num_milliseconds(), 30 * 86_400_000);

        let window = PeriodWindow::new(90, now);
        assert_eq!((now - window.cutoff).num_milliseconds(), 90 * 86_400_000);
    }

    #[test]
    fn test_engagement_snapshot_total() {
        let snapshot = EngagementSnapshot {
            likes_received: 10,
            reposts_received: 3,
            quotes_received: 2,
            replies_received: 5,
        };
        assert_eq!(snapshot.total(), 20);
    }

    #[test]
    fn test_did_web_default_history() {
        let history = IdentityHistory::did_web_default("alice.example.com");
        assert_eq!(history.plc_operations, 0);
        assert_eq!(history.rotation_key_count, 1);
        assert_eq!(history.current_aka, vec!["at://alice.example.com"]);
    }
}
