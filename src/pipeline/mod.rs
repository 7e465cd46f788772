//! Aggregation orchestrator: one run per handle.
//!
//! Builds an explicit run context (HTTP client + cache), resolves the
//! identity once, then processes the 30- and 90-day windows
//! sequentially. Windows share nothing beyond the resolved identity,
//! profile, history and collection list.

use crate::analysis::classify::{
    account_era, activity_status, age_percentile, domain_rarity, pds_host_kind,
    posting_style, profile_completion, social_status,
};
use crate::analysis::{aggregate_engagement, compute_post_stats, round_to_two, safe_div};
use crate::config::Config;
use crate::error::AuditError;
use crate::fetch::{Fetcher, PageSettings};
use crate::http::{FetchClient, HttpSettings};
use crate::identity::Resolver;
use crate::models::{
    AccountMaturity, AtprotoCategories, BlueskyCategories, CollectionInfo, CommunityEngagement,
    ContentActivity, Decentralization, Identity, IdentityHistory, Namespace, PeriodWindow,
    ProfileQuality, ProfileView, ProtocolActivity, RecognitionStatus, ResolveOutcome,
    ScoreInputDocument, DEFAULT_HANDLE_DOMAIN,
};
use crate::{narrative, scoring};
use chrono::{DateTime, Utc};
use std::time::Duration;
use tracing::{info, warn};

/// Everything the window aggregations share, resolved once per run.
struct RunState<'a> {
    http: &'a FetchClient,
    fetcher: Fetcher<'a>,
    config: &'a Config,
    identity: &'a Identity,
    profile: ProfileView,
    history: IdentityHistory,
    collections: Vec<CollectionInfo>,
    blob_count: u64,
    now: DateTime<Utc>,
}

/// Resolve a handle and aggregate both analysis windows.
///
/// Identity resolution failures are fatal; everything downstream
/// degrades to partial metrics instead of failing the run.
pub async fn resolve(handle: &str, config: &Config) -> Result<ResolveOutcome, AuditError> {
    let http = FetchClient::new(&HttpSettings {
        timeout: Duration::from_secs(config.network.timeout_seconds),
        ..HttpSettings::default()
    });

    let resolver = Resolver::new(&http, &config.network.appview_url, &config.network.plc_url);
    let identity = resolver.resolve_identity(handle).await?;
    info!(
        "identity resolved: {} hosted at {}",
        identity.did, identity.service_endpoint
    );

    let history = match resolver
        .identity_history(&identity.did, &identity.handle)
        .await
    {
        Ok(history) => history,
        Err(e) => {
            warn!("identity history unavailable: {}", e);
            IdentityHistory::did_web_default(&identity.handle)
        }
    };

    let fetcher = Fetcher::new(
        &http,
        PageSettings {
            page_size: config.pagination.page_size,
            max_pages: config.pagination.max_pages,
        },
    );

    let profile = match fetcher
        .get_profile(&config.network.appview_url, &identity.did)
        .await
    {
        Ok(profile) => profile,
        Err(e) => {
            warn!("profile unavailable, social metrics degrade to zero: {}", e);
            ProfileView {
                did: identity.did.clone(),
                handle: identity.handle.clone(),
                ..ProfileView::default()
            }
        }
    };

    // account-wide blob count, independent of any window
    let blob_count = fetcher
        .blob_count(&identity.service_endpoint, &identity.did, None)
        .await as u64;

    let collections = match fetcher
        .describe_repo(&identity.service_endpoint, &identity.did)
        .await
    {
        Ok(collections) => collections,
        Err(e) => {
            warn!("collection list unavailable, tallies degrade to zero: {}", e);
            Vec::new()
        }
    };
    info!("repository exposes {} collection(s)", collections.len());

    let now = Utc::now();
    let state = RunState {
        http: &http,
        fetcher,
        config,
        identity: &identity,
        profile,
        history,
        collections,
        blob_count,
        now,
    };

    let window_30 = aggregate_window(&state, PeriodWindow::new(30, now)).await;
    let window_90 = aggregate_window(&state, PeriodWindow::new(90, now)).await;

    let narrative_30 = narrative::build_narrative(&window_30);
    let narrative_90 = narrative::build_narrative(&window_90);

    info!(
        "run complete, {} response(s) cached",
        http.cached_responses().await
    );

    Ok(ResolveOutcome {
        identity,
        window_30,
        window_90,
        narrative_30,
        narrative_90,
    })
}

/// Aggregate one window into its score-input document, then submit it
/// for scoring. The cutoff is computed once here and holds for the
/// whole window.
async fn aggregate_window(state: &RunState<'_>, window: PeriodWindow) -> ScoreInputDocument {
    let identity = state.identity;
    let pds = &identity.service_endpoint;
    let appview = &state.config.network.appview_url;
    let cutoff = window.cutoff;

    let buckets = bucket_count(window.days);
    let mut bluesky_weekly = vec![0u64; buckets];
    let mut other_weekly = vec![0u64; buckets];
    let mut total_records: u64 = 0;
    let mut non_bluesky_records: u64 = 0;

    for collection in &state.collections {
        let records = state
            .fetcher
            .list_records(pds, &identity.did, &collection.name, Some(cutoff))
            .await;

        total_records += records.len() as u64;
        if collection.namespace == Namespace::Other {
            non_bluesky_records += records.len() as u64;
        }

        let weekly = match collection.namespace {
            Namespace::Bluesky => &mut bluesky_weekly,
            Namespace::Other => &mut other_weekly,
        };
        for record in &records {
            if let Some(ts) = record.created_at {
                if let Some(index) = week_bucket(cutoff, ts, buckets) {
                    weekly[index] += 1;
                }
            }
        }
    }

    // posts then reposts, one after the other; the run cache makes the
    // second pass over these collections free
    let mut merged = state
        .fetcher
        .list_records(pds, &identity.did, "app.bsky.feed.post", Some(cutoff))
        .await;
    let reposts = state
        .fetcher
        .list_records(pds, &identity.did, "app.bsky.feed.repost", Some(cutoff))
        .await;
    merged.extend(reposts);

    let stats = compute_post_stats(&merged, &identity.did, window.days);

    let feed = state
        .fetcher
        .author_feed(appview, &identity.did, Some(cutoff))
        .await;
    let engagement = aggregate_engagement(&feed, &identity.did);

    let profile = &state.profile;
    let records_per_day = safe_div(total_records as f64, window.days as f64);
    let engagement_rate = safe_div(engagement.total() as f64, stats.posts_count as f64);
    let follow_ratio = safe_div(
        profile.followers_count as f64,
        profile.follows_count as f64,
    );
    let account_age_days = profile
        .created_at
        .map_or(0, |created| (state.now - created).num_days().max(0));
    let (era, percentile) = profile
        .created_at
        .map_or(("unknown", 0.0), |created| {
            (account_era(created), age_percentile(created))
        });

    let custom_domain = !identity.handle.ends_with(DEFAULT_HANDLE_DOMAIN);
    let non_bluesky_collections = state
        .collections
        .iter()
        .filter(|c| c.namespace == Namespace::Other)
        .count();
    let pds_host = host_of(pds);

    let draft = ScoreInputDocument {
        handle: identity.handle.clone(),
        did: identity.did.clone(),
        period_days: window.days,
        generated_at: state.now,
        bluesky_categories: BlueskyCategories {
            profile_quality: ProfileQuality {
                profile_completion: profile_completion(
                    profile.display_name.as_deref(),
                    profile.description.as_deref(),
                    profile.banner.as_deref(),
                )
                .to_string(),
                alt_text_percentage: round_to_two(stats.alt_text_percentage),
                domain_rarity: domain_rarity(&identity.handle).to_string(),
                custom_domain,
                score: 0.0,
            },
            community_engagement: CommunityEngagement {
                engagement,
                engagement_rate: round_to_two(engagement_rate),
                followers_count: profile.followers_count,
                follows_count: profile.follows_count,
                follow_ratio: round_to_two(follow_ratio),
                social_status: social_status(
                    profile.followers_count,
                    follow_ratio,
                    account_age_days,
                    engagement_rate,
                )
                .to_string(),
                score: 0.0,
            },
            content_activity: ContentActivity {
                activity_status: activity_status(records_per_day).to_string(),
                posting_style: posting_style(&stats).to_string(),
                stats: stats.rounded(),
                records_per_day: round_to_two(records_per_day),
                total_records,
                bluesky_weekly_activity: bluesky_weekly,
                score: 0.0,
            },
            recognition_status: RecognitionStatus {
                era: era.to_string(),
                account_age_days,
                age_percentile: percentile,
                score: 0.0,
            },
        },
        atproto_categories: AtprotoCategories {
            decentralization: Decentralization {
                pds_host_kind: pds_host_kind(&pds_host).to_string(),
                pds_host,
                did_method: identity
                    .did
                    .split(':')
                    .nth(1)
                    .unwrap_or("unknown")
                    .to_string(),
                custom_domain,
                rotation_key_count: state.history.rotation_key_count,
                score: 0.0,
            },
            protocol_activity: ProtocolActivity {
                collections_total: state.collections.len(),
                non_bluesky_collections,
                non_bluesky_records,
                blob_count: state.blob_count,
                other_weekly_activity: other_weekly,
                score: 0.0,
            },
            account_maturity: AccountMaturity {
                account_age_days,
                plc_operations: state.history.plc_operations,
                historical_aka_count: state.history.historical_aka_count,
                era: era.to_string(),
                score: 0.0,
            },
        },
    };

    if !state.config.scoring.enabled {
        info!("scoring disabled, returning {}d draft", window.days);
        return draft;
    }

    match scoring::score_document(state.http, &state.config.scoring, &draft).await {
        Ok(scored) => scored,
        Err(e) => {
            // an unscored draft beats a missing window; scores stay at
            // their placeholder values
            warn!("scoring failed for {}d window: {}", window.days, e);
            draft
        }
    }
}

/// Number of week buckets needed to cover a window.
fn bucket_count(days: i64) -> usize {
    ((days + 6) / 7).max(1) as usize
}

/// Week-of-window bucket for a timestamp, `None` when the timestamp
/// predates the cutoff. Future-dated records (clock skew) clamp into
/// the newest bucket.
fn week_bucket(cutoff: DateTime<Utc>, ts: DateTime<Utc>, buckets: usize) -> Option<usize> {
    let days_since_cutoff = (ts - cutoff).num_days();
    if days_since_cutoff < 0 {
        return None;
    }
    Some(((days_since_cutoff / 7) as usize).min(buckets - 1))
}

/// Hostname of a service endpoint URL.
fn host_of(endpoint: &str) -> String {
    reqwest::Url::parse(endpoint)
        .ok()
        .and_then(|url| url.host_str().map(str::to_string))
        .unwrap_or_else(|| endpoint.trim_start_matches("https://").to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_bucket_count_covers_windows() {
        assert_eq!(bucket_count(30), 5);
        assert_eq!(bucket_count(90), 13);
        assert_eq!(bucket_count(7), 1);
    }

    #[test]
    fn test_week_bucket_boundaries() {
        let cutoff = Utc.with_ymd_and_hms(2025, 6, 1, 0, 0, 0).unwrap();
        let day = |d: i64| cutoff + chrono::Duration::days(d);

        assert_eq!(week_bucket(cutoff, day(0), 5), Some(0));
        assert_eq!(week_bucket(cutoff, day(6), 5), Some(0));
        assert_eq!(week_bucket(cutoff, day(7), 5), Some(1));
        assert_eq!(week_bucket(cutoff, day(29), 5), Some(4));
        // pre-cutoff records have no bucket
        assert_eq!(week_bucket(cutoff, day(-1), 5), None);
        // future-dated records clamp into the newest bucket
        assert_eq!(week_bucket(cutoff, day(40), 5), Some(4));
    }

    #[test]
    fn test_host_of() {
        assert_eq!(
            host_of("https://morel.us-east.host.bsky.network"),
            "morel.us-east.host.bsky.network"
        );
        assert_eq!(host_of("https://pds.example.org:2583"), "pds.example.org");
    }
}
