//! Identity resolution: handle → DID → PDS endpoint.
//!
//! Also ingests the PLC operation log for `did:plc` identities, which
//! feeds the rotation-key and alsoKnownAs metrics. `did:web` identities
//! have no log and use fixed defaults.

use crate::error::AuditError;
use crate::http::{build_url, FetchClient};
use crate::models::{Identity, IdentityHistory};
use serde::Deserialize;
use std::collections::BTreeSet;
use tracing::{debug, info, warn};

/// Service type marking the hosting PDS inside a DID document.
pub const PDS_SERVICE_TYPE: &str = "AtprotoPersonalDataServer";

/// Simplified DID document: only what endpoint selection needs.
#[derive(Debug, Clone, Deserialize)]
pub struct DidDocument {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub service: Vec<ServiceEntry>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServiceEntry {
    #[serde(rename = "type", default)]
    pub service_type: String,
    #[serde(rename = "serviceEndpoint", default)]
    pub service_endpoint: String,
}

/// One entry of the PLC audit log.
#[derive(Debug, Clone, Deserialize)]
pub struct AuditLogEntry {
    #[serde(default)]
    pub operation: PlcOperation,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PlcOperation {
    pub rotation_keys: Vec<String>,
    pub also_known_as: Vec<String>,
}

/// Resolver over the public handle-resolution endpoint and the PLC
/// directory. Borrows the run's fetch client; holds no other state.
pub struct Resolver<'a> {
    http: &'a FetchClient,
    appview_url: String,
    plc_url: String,
}

impl<'a> Resolver<'a> {
    pub fn new(http: &'a FetchClient, appview_url: &str, plc_url: &str) -> Self {
        Self {
            http,
            appview_url: appview_url.trim_end_matches('/').to_string(),
            plc_url: plc_url.trim_end_matches('/').to_string(),
        }
    }

    /// Resolve a handle to its DID. Any failure here (network, non-2xx,
    /// missing field) means the handle is unresolvable.
    pub async fn resolve_handle(&self, handle: &str) -> Result<String, AuditError> {
        let url = build_url(
            &format!("{}/xrpc/com.atproto.identity.resolveHandle", self.appview_url),
            &[("handle", handle)],
        )?;

        let value = self
            .http
            .get_json_cached(&url)
            .await
            .map_err(|e| {
                debug!("handle resolution request failed: {}", e);
                AuditError::Resolution(handle.to_string())
            })?;

        let did = value
            .get("did")
            .and_then(|v| v.as_str())
            .ok_or_else(|| AuditError::Resolution(handle.to_string()))?;

        info!("resolved {} -> {}", handle, did);
        Ok(did.to_string())
    }

    /// Resolve the PDS endpoint for a DID, branching on its method.
    pub async fn service_endpoint(&self, did: &str) -> Result<String, AuditError> {
        let (url, is_did_web) = if let Some(domain) = did.strip_prefix("did:web:") {
            (format!("https://{domain}/.well-known/did.json"), true)
        } else if did.starts_with("did:plc:") {
            (format!("{}/{}", self.plc_url, did), false)
        } else {
            return Err(AuditError::EndpointNotFound(did.to_string()));
        };

        let value = self.http.get_json_cached(&url).await?;
        let document: DidDocument =
            serde_json::from_value(value).map_err(|e| AuditError::InvalidDocument {
                url,
                message: e.to_string(),
            })?;

        if !document.id.is_empty() && document.id != did {
            warn!(
                "DID document id mismatch: expected {}, got {}",
                did, document.id
            );
        }

        select_pds_endpoint(&document, is_did_web)
            .ok_or_else(|| AuditError::EndpointNotFound(did.to_string()))
    }

    /// Convenience wrapper producing a full identity value.
    pub async fn resolve_identity(&self, handle: &str) -> Result<Identity, AuditError> {
        let did = self.resolve_handle(handle).await?;
        let service_endpoint = self.service_endpoint(&did).await?;
        Ok(Identity {
            handle: handle.to_string(),
            did,
            service_endpoint,
        })
    }

    /// Identity metrics from the PLC operation history. `did:web`
    /// identities skip the fetch entirely and use fixed defaults.
    pub async fn identity_history(
        &self,
        did: &str,
        handle: &str,
    ) -> Result<IdentityHistory, AuditError> {
        if !did.starts_with("did:plc:") {
            return Ok(IdentityHistory::did_web_default(handle));
        }

        let url = format!("{}/{}/log/audit", self.plc_url, did);
        let value = self.http.get_json_cached(&url).await?;
        let entries: Vec<AuditLogEntry> =
            serde_json::from_value(value).map_err(|e| AuditError::InvalidDocument {
                url,
                message: e.to_string(),
            })?;

        Ok(history_from_entries(&entries))
    }
}

/// Pick the PDS service entry out of a DID document. `did:web`
/// documents may fall back to the first listed service when no entry
/// carries the PDS type.
fn select_pds_endpoint(document: &DidDocument, allow_fallback: bool) -> Option<String> {
    if let Some(entry) = document
        .service
        .iter()
        .find(|s| s.service_type == PDS_SERVICE_TYPE)
    {
        return Some(entry.service_endpoint.clone());
    }

    if allow_fallback {
        return document
            .service
            .first()
            .map(|s| s.service_endpoint.clone());
    }

    None
}

/// Reduce an ordered audit log to the derived metrics: operation count,
/// rotation keys and AKAs from the latest entry, and the union of every
/// historical AKA value.
fn history_from_entries(entries: &[AuditLogEntry]) -> IdentityHistory {
    let historical: BTreeSet<&str> = entries
        .iter()
        .flat_map(|e| e.operation.also_known_as.iter().map(String::as_str))
        .collect();

    let latest = entries.last();

    IdentityHistory {
        plc_operations: entries.len(),
        rotation_key_count: latest.map_or(0, |e| e.operation.rotation_keys.len()),
        current_aka: latest.map_or_else(Vec::new, |e| e.operation.also_known_as.clone()),
        historical_aka_count: historical.len(),
    }
}
