//! Request-time entry resolution.
//!
//! # Responsibilities
//! - Pick the provider entry for a layer, honoring a requested id and the
//!   role's default id
//! - Check the entry serves the requested role
//! - Decide the effective policy pair
//!
//! # Design Decisions
//! - Pure function of one snapshot; `Registry::resolve` loads the snapshot once
//! - "No entry" is an answer, not an error: a layer without modules is valid
//! - Policies come as a pair: if the caller supplies either one, both are the
//!   caller's, even when the other is `None`
//! - Nothing to enforce means nothing to instantiate: both policies `None`
//!   yields no entry

use crate::model::{ConfigSnapshot, MessagePolicy, ResolvedEntry, Role};
use crate::observability::metrics;
use crate::registry::Registry;

/// Resolve the module entry for `layer` against `snapshot`.
pub fn resolve(
    snapshot: &ConfigSnapshot,
    layer: &str,
    requested_id: Option<&str>,
    request_policy: Option<&MessagePolicy>,
    response_policy: Option<&MessagePolicy>,
    role: Role,
) -> Option<ResolvedEntry> {
    let Some(intercept) = snapshot.layer(layer).filter(|e| !e.id_map.is_empty()) else {
        tracing::debug!(layer = %layer, "Module config has no IDs configured for layer");
        return None;
    };

    let requested = requested_id.and_then(|id| intercept.id_map.get(id).map(|entry| (id, entry)));
    let (provider_id, id_entry) = match requested {
        Some(found) => found,
        None => {
            tracing::debug!(
                layer = %layer,
                requested_id = ?requested_id,
                "No requested ID, or requested ID not configured; looking for default ID"
            );
            let default_entry = intercept
                .default_id(role)
                .and_then(|id| intercept.id_map.get(id).map(|entry| (id, entry)));
            match default_entry {
                Some(found) => found,
                None => {
                    tracing::debug!(layer = %layer, role = %role, "No default config ID for layer");
                    return None;
                }
            }
        }
    };

    if !id_entry.provider_type.supports(role) {
        tracing::debug!(
            layer = %layer,
            provider_id = %provider_id,
            role = %role,
            provider_type = id_entry.provider_type.as_str(),
            "Requested role does not match configured provider type"
        );
        return None;
    }

    let caller_supplied = request_policy.is_some() || response_policy.is_some();
    let (effective_request, effective_response) = if caller_supplied {
        (request_policy.cloned(), response_policy.cloned())
    } else {
        (id_entry.request_policy.clone(), id_entry.response_policy.clone())
    };

    if effective_request.is_none() && effective_response.is_none() {
        tracing::debug!(layer = %layer, provider_id = %provider_id, "No policy applies");
        return None;
    }

    let entry = ResolvedEntry {
        module: id_entry.module.clone(),
        request_policy: effective_request,
        response_policy: effective_response,
        options: id_entry.options.clone(),
    };

    tracing::debug!(
        layer = %layer,
        provider_id = %provider_id,
        module = %entry.module,
        options = ?entry.options,
        request_policy = ?entry.request_policy,
        response_policy = ?entry.response_policy,
        generation = snapshot.generation,
        "Resolved module entry"
    );
    Some(entry)
}

impl Registry {
    /// Resolve against the live snapshot.
    ///
    /// The snapshot is loaded once, so a concurrent install is observed either
    /// entirely or not at all.
    pub fn resolve(
        &self,
        layer: &str,
        requested_id: Option<&str>,
        request_policy: Option<&MessagePolicy>,
        response_policy: Option<&MessagePolicy>,
        role: Role,
    ) -> Option<ResolvedEntry> {
        let snapshot = self.current_snapshot();
        let entry = resolve(&snapshot, layer, requested_id, request_policy, response_policy, role);
        metrics::record_resolution(layer, if entry.is_some() { "resolved" } else { "none" });
        entry
    }
}
