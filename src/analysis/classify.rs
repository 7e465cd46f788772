//! Composite classifiers, expressed as ordered threshold tables.
//!
//! Every classifier here is a pure function over already-computed
//! metrics. Ladders are data (`(threshold, label)` rows scanned top to
//! bottom), so each classification can be audited and tested without
//! re-reading control flow.

use crate::models::{PostStats, DEFAULT_HANDLE_DOMAIN};
use chrono::{DateTime, Datelike, Utc};

/// Activity ladder over total records per day, busiest first.
const ACTIVITY_LADDER: &[(f64, &str)] = &[
    (10.0, "hyperactive"),
    (3.0, "very active"),
    (1.0, "active"),
    (0.2, "casual"),
];

/// How busy the account is, from records per day across all collections.
pub fn activity_status(records_per_day: f64) -> &'static str {
    for &(min, label) in ACTIVITY_LADDER {
        if records_per_day >= min {
            return label;
        }
    }
    if records_per_day > 0.0 {
        "lurker"
    } else {
        "dormant"
    }
}

/// Dominant posting behavior, from composition percentages. An account
/// with no outgoing timeline at all gets the fixed fallback label.
pub fn posting_style(stats: &PostStats) -> &'static str {
    if stats.posts_count + stats.reposts_count == 0 {
        return "inactive";
    }

    let rules = [
        (stats.reply_percentage > 0.6, "conversationalist"),
        (stats.repost_percentage > 0.5, "curator"),
        (stats.quote_percentage > 0.3, "commentator"),
        (stats.media_percentage > 0.5, "visual storyteller"),
        (
            stats.reply_percentage < 0.2 && stats.media_percentage < 0.2,
            "broadcaster",
        ),
    ];

    rules
        .iter()
        .find(|(hit, _)| *hit)
        .map_or("balanced", |(_, label)| label)
}

/// Standing in the network, from audience size, follow ratio, account
/// age and per-post engagement.
pub fn social_status(
    followers_count: u64,
    follow_ratio: f64,
    account_age_days: i64,
    engagement_rate: f64,
) -> &'static str {
    let rules = [
        (followers_count >= 100_000, "celebrity"),
        (
            followers_count >= 10_000 && follow_ratio >= 2.0,
            "influencer",
        ),
        (
            followers_count >= 1_000 && follow_ratio >= 1.0,
            "community figure",
        ),
        (
            engagement_rate >= 5.0 && followers_count >= 100,
            "rising voice",
        ),
        (account_age_days < 30, "newcomer"),
        (
            followers_count < 10 && account_age_days >= 180,
            "quiet observer",
        ),
    ];

    rules
        .iter()
        .find(|(hit, _)| *hit)
        .map_or("member", |(_, label)| label)
}

/// Profile completeness from the presence of the three display fields.
pub fn profile_completion(
    display_name: Option<&str>,
    description: Option<&str>,
    banner: Option<&str>,
) -> &'static str {
    let filled = [display_name, description, banner]
        .iter()
        .filter(|field| field.is_some_and(|v| !v.trim().is_empty()))
        .count();

    match filled {
        3 => "complete",
        0 => "minimal",
        _ => "partial",
    }
}

/// Name-length ladder for handles on the default registration domain.
const DEFAULT_DOMAIN_LADDER: &[(usize, &str)] = &[
    (2, "legendary"),
    (3, "epic"),
    (4, "rare"),
    (5, "uncommon"),
    (8, "common"),
];

/// Full-length ladder for custom-domain handles.
const CUSTOM_DOMAIN_LADDER: &[(usize, &str)] = &[
    (8, "legendary"),
    (12, "epic"),
    (15, "rare"),
    (17, "uncommon"),
    (20, "common"),
];

/// How rare the handle is, from its length bucket. A pure function of
/// the handle string alone; default-domain and custom-domain handles use
/// distinct tables, and anything without a dot is unclassifiable.
pub fn domain_rarity(handle: &str) -> &'static str {
    if let Some(name) = handle.strip_suffix(DEFAULT_HANDLE_DOMAIN) {
        return ladder_label(DEFAULT_DOMAIN_LADDER, name.chars().count(), "very common");
    }
    if handle.contains('.') {
        return ladder_label(CUSTOM_DOMAIN_LADDER, handle.chars().count(), "very common");
    }
    "unknown"
}

fn ladder_label(ladder: &[(usize, &'static str)], length: usize, fallback: &'static str) -> &'static str {
    ladder
        .iter()
        .find(|(max, _)| length <= *max)
        .map_or(fallback, |(_, label)| label)
}

/// Registration era, from three fixed historical date ranges.
pub fn account_era(created_at: DateTime<Utc>) -> &'static str {
    if before(created_at, 2023, 2, 1) {
        "private beta"
    } else if before(created_at, 2024, 2, 6) {
        "invite era"
    } else {
        "open registration"
    }
}

/// Percentile breakpoints: accounts created before each date are older
/// than roughly this share of the network.
const AGE_PERCENTILE_TABLE: &[((i32, u32, u32), f64)] = &[
    ((2023, 2, 1), 0.99),
    ((2023, 7, 1), 0.95),
    ((2024, 2, 6), 0.85),
    ((2025, 2, 1), 0.5),
];

/// Rough share of the network this account predates.
pub fn age_percentile(created_at: DateTime<Utc>) -> f64 {
    for &((y, m, d), percentile) in AGE_PERCENTILE_TABLE {
        if before(created_at, y, m, d) {
            return percentile;
        }
    }
    0.2
}

/// Who operates the hosting PDS, from its hostname.
pub fn pds_host_kind(host: &str) -> &'static str {
    if host.ends_with(".host.bsky.network") || host == "bsky.social" {
        "bluesky-operated"
    } else {
        "independent"
    }
}

fn before(ts: DateTime<Utc>, year: i32, month: u32, day: u32) -> bool {
    (ts.year(), ts.month(), ts.day()) < (year, month, day)
}
