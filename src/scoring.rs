//! Client for the external scoring service.
//!
//! The scorer is a black box: the draft document goes out, a scored
//! copy comes back. Called once per window.

use crate::config::ScoringConfig;
use crate::error::AuditError;
use crate::http::FetchClient;
use crate::models::ScoreInputDocument;
use serde::{Deserialize, Serialize};
use tracing::debug;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ScoringRequest<'a> {
    draft_document: &'a ScoreInputDocument,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ScoringResponse {
    scored_document: ScoreInputDocument,
}

/// Submit a draft document and return the scored copy.
pub async fn score_document(
    http: &FetchClient,
    config: &ScoringConfig,
    draft: &ScoreInputDocument,
) -> Result<ScoreInputDocument, AuditError> {
    debug!(
        "submitting {}d window draft for {}",
        draft.period_days, draft.handle
    );

    let body = serde_json::to_value(ScoringRequest {
        draft_document: draft,
    })
    .map_err(|e| AuditError::Scoring(format!("could not serialize draft: {e}")))?;

    let value = http
        .post_json(&config.url, &body)
        .await
        .map_err(|e| AuditError::Scoring(e.to_string()))?;

    let response: ScoringResponse = serde_json::from_value(value)
        .map_err(|e| AuditError::Scoring(format!("malformed scoring response: {e}")))?;

    Ok(response.scored_document)
}
