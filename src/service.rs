//! Consumer-facing service layer
//!
//! `AttributeService` is the single entry point for callers: it owns the
//! shared resolver graph plus named resolution profiles, and runs one
//! fresh [`ResolutionContext`] per request. Protocol frontends (SAML,
//! CAS, ...) call the service — they never reach into the engine
//! directly.

use std::collections::HashMap;
use std::sync::Arc;

use thiserror::Error;
use tracing::debug;

use crate::attribute::Attribute;
use crate::resolver::{
    AttributeResolver, PluginId, ResolutionContext, ResolutionRequest, ResolveError,
};

/// Errors surfaced by the service layer
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("unknown resolution profile: {0}")]
    UnknownProfile(String),

    #[error(transparent)]
    Resolve(#[from] ResolveError),
}

/// Single entry point for attribute resolution requests.
///
/// Cheap to clone; clones share the underlying graph. Safe for
/// concurrent use — per-request state never leaves this method.
#[derive(Debug, Clone)]
pub struct AttributeService {
    resolver: Arc<AttributeResolver>,
    profiles: Arc<HashMap<String, Vec<PluginId>>>,
}

impl AttributeService {
    /// Create a service over an initialized resolver with named profiles
    /// (ordered lists of top-level plugin ids to resolve per request
    /// kind).
    pub fn new(resolver: AttributeResolver, profiles: HashMap<String, Vec<PluginId>>) -> Self {
        Self {
            resolver: Arc::new(resolver),
            profiles: Arc::new(profiles),
        }
    }

    /// The profile names this service can resolve
    pub fn profile_names(&self) -> Vec<&str> {
        self.profiles.keys().map(String::as_str).collect()
    }

    /// Resolve a request under a named profile.
    ///
    /// Returns the externally visible attribute map: definition outputs
    /// plus raw exports of connectors the profile requests directly.
    /// Best-effort plugin failures leave gaps; configuration errors and
    /// fail-fast failures abort with `Err`.
    pub fn resolve(
        &self,
        profile: &str,
        request: ResolutionRequest,
    ) -> Result<HashMap<String, Attribute>, ServiceError> {
        let requested = self
            .profiles
            .get(profile)
            .ok_or_else(|| ServiceError::UnknownProfile(profile.to_string()))?;

        let mut ctx = ResolutionContext::new(request);
        debug!(
            context = %ctx.id,
            profile,
            principal = %ctx.request.principal,
            relying_party = %ctx.request.relying_party,
            "resolving attributes"
        );
        self.resolver.resolve(&mut ctx, requested)?;

        let attributes = ctx.exported_attributes(requested);
        debug!(
            context = %ctx.id,
            count = attributes.len(),
            "resolution complete"
        );
        Ok(attributes)
    }
}
