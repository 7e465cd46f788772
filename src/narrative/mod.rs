//! Narrative generation and report rendering.
//!
//! `build_narrative` is a pure function over one assembled window
//! document: three paragraphs produced by threshold tests against fixed
//! breakpoints. No network access; identical input yields identical
//! text.

use crate::models::{ResolveOutcome, ScoreInputDocument};
use anyhow::Result;

/// Build the three-paragraph narrative for one window document.
pub fn build_narrative(doc: &ScoreInputDocument) -> String {
    [
        identity_paragraph(doc),
        protocol_paragraph(doc),
        social_paragraph(doc),
    ]
    .join("\n\n")
}

/// Paragraph one: account history and infrastructure.
fn identity_paragraph(doc: &ScoreInputDocument) -> String {
    let maturity = &doc.atproto_categories.account_maturity;
    let decentralization = &doc.atproto_categories.decentralization;
    let recognition = &doc.bluesky_categories.recognition_status;

    let mut sentences = Vec::new();

    sentences.push(match maturity.era.as_str() {
        "private beta" => format!(
            "{} dates back to the network's private beta, before invites existed.",
            doc.handle
        ),
        "invite era" => format!(
            "{} joined during the invite-only era, when an account still required a referral.",
            doc.handle
        ),
        _ => format!("{} registered after the network opened to the public.", doc.handle),
    });

    if recognition.age_percentile >= 0.9 {
        sentences.push(format!(
            "The account is older than roughly {}% of the network.",
            (recognition.age_percentile * 100.0) as u32
        ));
    } else if recognition.age_percentile >= 0.5 {
        sentences.push("It predates a majority of accounts on the network.".to_string());
    }

    if decentralization.custom_domain {
        sentences.push("The handle lives on a custom domain, which takes deliberate setup.".to_string());
    }
    if maturity.historical_aka_count >= 2 {
        sentences.push(format!(
            "Its identity log shows {} distinct handles over time.",
            maturity.historical_aka_count
        ));
    }

    if decentralization.rotation_key_count >= 2 {
        sentences.push("Multiple rotation keys are registered, so account recovery is provisioned.".to_string());
    }

    sentences.push(match decentralization.pds_host_kind.as_str() {
        "independent" => format!(
            "Data is hosted on an independent PDS at {}.",
            decentralization.pds_host
        ),
        _ => "Data is hosted on Bluesky's own infrastructure.".to_string(),
    });

    sentences.join(" ")
}

/// Paragraph two: protocol usage breadth and depth.
fn protocol_paragraph(doc: &ScoreInputDocument) -> String {
    let protocol = &doc.atproto_categories.protocol_activity;
    let maturity = &doc.atproto_categories.account_maturity;
    let bluesky_collections = protocol
        .collections_total
        .saturating_sub(protocol.non_bluesky_collections);

    let mut sentences = Vec::new();

    sentences.push(if bluesky_collections >= 8 {
        "The repository spans most of the flagship app's record types.".to_string()
    } else if bluesky_collections >= 4 {
        "The repository covers a solid spread of the flagship app's record types.".to_string()
    } else {
        "The repository uses only a narrow slice of the flagship app's features.".to_string()
    });

    if protocol.non_bluesky_collections >= 3 {
        sentences.push(format!(
            "Beyond the flagship app, {} third-party collections show real activity across the wider protocol.",
            protocol.non_bluesky_collections
        ));
    } else if protocol.non_bluesky_collections >= 1 {
        sentences.push("There is a first footprint in third-party protocol applications.".to_string());
    } else {
        sentences.push("All activity is confined to the flagship application.".to_string());
    }

    if maturity.plc_operations > 5 {
        sentences.push(format!(
            "The identity itself has been actively maintained, with {} operations on record.",
            maturity.plc_operations
        ));
    }

    sentences.join(" ")
}

/// Paragraph three: posting behavior and social standing.
fn social_paragraph(doc: &ScoreInputDocument) -> String {
    let content = &doc.bluesky_categories.content_activity;
    let community = &doc.bluesky_categories.community_engagement;

    let mut sentences = Vec::new();

    sentences.push(match content.posting_style.as_str() {
        "conversationalist" => "In this window the account mostly converses, replying far more than it broadcasts.".to_string(),
        "curator" => "In this window the account acts as a curator, amplifying others more than posting.".to_string(),
        "commentator" => "In this window the account leans on quote posts to comment on others.".to_string(),
        "visual storyteller" => "In this window the account tells its story visually, with media in most posts.".to_string(),
        "broadcaster" => "In this window the account broadcasts original text posts with little back-and-forth.".to_string(),
        "inactive" => "The account published nothing in this window.".to_string(),
        _ => "In this window the account mixes original posts, replies and shares evenly.".to_string(),
    });

    sentences.push(format!(
        "Its overall pace rates as {} and its standing as {}.",
        content.activity_status, community.social_status
    ));

    if community.engagement_rate >= 10.0 {
        sentences.push("Each post draws strong engagement from the community.".to_string());
    } else if community.engagement_rate >= 1.0 {
        sentences.push("Posts reliably draw some engagement.".to_string());
    } else if community.engagement_rate > 0.0 {
        sentences.push("Engagement on posts is light.".to_string());
    } else {
        sentences.push("No engagement was recorded on posts in this window.".to_string());
    }

    sentences.join(" ")
}

/// Render the full outcome as a JSON report.
pub fn render_json_report(outcome: &ResolveOutcome) -> Result<String> {
    serde_json::to_string_pretty(outcome).map_err(Into::into)
}

/// Render the full outcome as a Markdown report.
pub fn render_markdown_report(outcome: &ResolveOutcome) -> String {
    let mut output = String::new();

    output.push_str("# Skyaudit Report\n\n");
    output.push_str(&metadata_section(outcome));
    output.push_str(&window_section(&outcome.window_30, &outcome.narrative_30));
    output.push_str(&window_section(&outcome.window_90, &outcome.narrative_90));

    output
}

fn metadata_section(outcome: &ResolveOutcome) -> String {
    let mut section = String::new();

    section.push_str("## Identity\n\n");
    section.push_str(&format!("- **Handle:** {}\n", outcome.identity.handle));
    section.push_str(&format!("- **DID:** `{}`\n", outcome.identity.did));
    section.push_str(&format!(
        "- **PDS:** {}\n",
        outcome.identity.service_endpoint
    ));
    section.push_str(&format!(
        "- **Generated:** {}\n\n",
        outcome.window_30.generated_at.format("%Y-%m-%d %H:%M:%S UTC")
    ));

    section
}

fn window_section(doc: &ScoreInputDocument, narrative: &str) -> String {
    let content = &doc.bluesky_categories.content_activity;
    let community = &doc.bluesky_categories.community_engagement;
    let mut section = String::new();

    section.push_str(&format!("## {}-Day Window\n\n", doc.period_days));
    section.push_str(narrative);
    section.push_str("\n\n");

    section.push_str("| Metric | Value |\n");
    section.push_str("|:---|:---:|\n");
    section.push_str(&format!("| Posts | {} |\n", content.stats.posts_count));
    section.push_str(&format!(
        "| Posts per day | {} |\n",
        content.stats.posts_per_day
    ));
    section.push_str(&format!("| Reposts | {} |\n", content.stats.reposts_count));
    section.push_str(&format!(
        "| Engagement received | {} |\n",
        community.engagement.total()
    ));
    section.push_str(&format!("| Followers | {} |\n", community.followers_count));
    section.push_str(&format!(
        "| Activity status | {} |\n",
        content.activity_status
    ));
    section.push_str(&format!("| Posting style | {} |\n", content.posting_style));
    section.push_str("\n");

    section.push_str("| Category | Score |\n");
    section.push_str("|:---|:---:|\n");
    section.push_str(&format!(
        "| Profile quality | {} |\n",
        doc.bluesky_categories.profile_quality.score
    ));
    section.push_str(&format!("| Community engagement | {} |\n", community.score));
    section.push_str(&format!("| Content activity | {} |\n", content.score));
    section.push_str(&format!(
        "| Recognition status | {} |\n",
        doc.bluesky_categories.recognition_status.score
    ));
    section.push_str(&format!(
        "| Decentralization | {} |\n",
        doc.atproto_categories.decentralization.score
    ));
    section.push_str(&format!(
        "| Protocol activity | {} |\n",
        doc.atproto_categories.protocol_activity.score
    ));
    section.push_str(&format!(
        "| Account maturity | {} |\n",
        doc.atproto_categories.account_maturity.score
    ));
    section.push_str("\n");

    section
}
