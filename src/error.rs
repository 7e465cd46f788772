//! Error taxonomy for the aggregation pipeline.
//!
//! Identity-resolution failures are fatal to a run; everything that can
//! happen inside a collection's pagination loop degrades to partial
//! results instead of surfacing one of these.

use thiserror::Error;

/// Errors surfaced by the resolution and aggregation pipeline.
#[derive(Debug, Error)]
pub enum AuditError {
    /// The handle-resolution endpoint returned no DID.
    #[error("handle {0} could not be resolved to a DID")]
    Resolution(String),

    /// No usable PDS service entry in the DID document, or an
    /// unsupported DID method.
    #[error("no usable PDS service endpoint for {0}")]
    EndpointNotFound(String),

    /// Any non-2xx response, carrying the status code.
    #[error("HTTP {status} from {url}")]
    Http { status: u16, url: String },

    /// The request never produced a response (timeout, refused
    /// connection, DNS failure).
    #[error("network error for {url}: {message}")]
    Network { url: String, message: String },

    /// The response body did not match the expected JSON shape.
    #[error("malformed response from {url}: {message}")]
    InvalidDocument { url: String, message: String },

    /// The external scoring service was unreachable or rejected the
    /// draft document.
    #[error("scoring service error: {0}")]
    Scoring(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_http_error_display_carries_status() {
        let err = AuditError::Http {
            status: 502,
            url: "https://pds.example/xrpc/com.atproto.repo.listRecords".to_string(),
        };
        let rendered = err.to_string();
        assert!(rendered.contains("502"));
        assert!(rendered.contains("listRecords"));
    }

    #[test]
    fn test_resolution_error_names_handle() {
        let err = AuditError::Resolution("ghost.bsky.social".to_string());
        assert!(err.to_string().contains("ghost.bsky.social"));
    }
}
