//! Topology model: the canonical description of one gateway deployment.
//!
//! A [`Topology`] is the frozen routing/provider graph produced from one
//! descriptor document: the backend [`Service`]s the gateway proxies to and
//! the cross-cutting [`Provider`]s (authentication, identity assertion, ...)
//! that run in front of them. It is built once per successful parse and
//! replaced wholesale on redeploy, never mutated in place.

pub mod builder;
pub mod live;
pub mod loader;
pub mod rules;

pub use builder::TopologyBuilder;
pub use live::LiveTopology;
pub use loader::TopologyLoader;
pub use rules::{DialectHint, DialectRules};

use std::collections::BTreeMap;

use serde::Serialize;

/// The frozen routing/provider graph for one gateway deployment.
#[derive(Debug, Clone, Serialize)]
pub struct Topology {
    pub(crate) name: String,
    pub(crate) timestamp: Option<i64>,
    pub(crate) services: Vec<Service>,
    pub(crate) providers: Vec<Provider>,
}

impl Topology {
    /// Deployment-unique topology name
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Last-modified marker of the source descriptor (epoch millis), used for
    /// staleness detection on reload. `None` for descriptors loaded from
    /// strings.
    #[must_use]
    pub fn timestamp(&self) -> Option<i64> {
        self.timestamp
    }

    /// All proxied backend services
    #[must_use]
    pub fn services(&self) -> &[Service] {
        &self.services
    }

    /// All cross-cutting providers
    #[must_use]
    pub fn providers(&self) -> &[Provider] {
        &self.providers
    }

    /// Look up a service by role and optional name.
    ///
    /// A `None` (or empty) name is a wildcard: the first service of the role
    /// wins, whether or not it carries an explicit name.
    #[must_use]
    pub fn service(&self, role: &str, name: Option<&str>) -> Option<&Service> {
        let want = name.filter(|n| !n.is_empty());
        self.services
            .iter()
            .find(|s| s.role == role && want.is_none_or(|n| s.name.as_deref() == Some(n)))
    }

    /// Look up a provider by role and optional name, with the same
    /// wildcard-name semantics as [`service`](Self::service).
    #[must_use]
    pub fn provider(&self, role: &str, name: Option<&str>) -> Option<&Provider> {
        let want = name.filter(|n| !n.is_empty());
        self.providers
            .iter()
            .find(|p| p.role == role && want.is_none_or(|n| p.name.as_deref() == Some(n)))
    }
}

/// Equality is semantic: same name, same services and providers as sets.
/// The timestamp is a provenance marker, not part of the model's identity.
impl PartialEq for Topology {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
            && set_equal(&self.services, &other.services)
            && set_equal(&self.providers, &other.providers)
    }
}

/// One proxied backend capability: a role, an optional discriminator name,
/// one or more endpoint URLs and free-form parameters.
#[derive(Debug, Clone, Serialize)]
pub struct Service {
    pub(crate) role: String,
    pub(crate) name: Option<String>,
    pub(crate) urls: Vec<String>,
    pub(crate) params: BTreeMap<String, String>,
}

impl Service {
    /// Backend-system identifier, e.g. `WEBHDFS`
    #[must_use]
    pub fn role(&self) -> &str {
        &self.role
    }

    /// Optional discriminator when multiple services share a role
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Backend endpoint URLs, in encounter order. Never empty after a
    /// successful parse.
    #[must_use]
    pub fn urls(&self) -> &[String] {
        &self.urls
    }

    /// Free-form parameters
    #[must_use]
    pub fn params(&self) -> &BTreeMap<String, String> {
        &self.params
    }
}

/// URL order is an artifact of descriptor layout, so equality treats the
/// url list as a set.
impl PartialEq for Service {
    fn eq(&self, other: &Self) -> bool {
        self.role == other.role
            && self.name == other.name
            && set_equal(&self.urls, &other.urls)
            && self.params == other.params
    }
}

/// One unit of cross-cutting gateway behavior (authentication, identity
/// assertion, authorization, ...).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Provider {
    pub(crate) role: String,
    pub(crate) name: Option<String>,
    pub(crate) enabled: bool,
    pub(crate) params: BTreeMap<String, String>,
}

impl Provider {
    /// Role classification, e.g. `authentication`
    #[must_use]
    pub fn role(&self) -> &str {
        &self.role
    }

    /// Optional implementation selector within the role
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Whether the provider participates in request processing.
    ///
    /// Descriptors that omit the flag get `true`: configuration is fail-open
    /// by default. For security roles this default is deliberate and worth
    /// knowing about: an authentication provider is live unless a descriptor
    /// explicitly disables it. Disabled providers stay in the model so they
    /// can be toggled at runtime.
    #[must_use]
    pub fn enabled(&self) -> bool {
        self.enabled
    }

    /// Free-form parameters
    #[must_use]
    pub fn params(&self) -> &BTreeMap<String, String> {
        &self.params
    }
}

fn set_equal<T: PartialEq>(a: &[T], b: &[T]) -> bool {
    a.len() == b.len() && a.iter().all(|x| b.contains(x))
}
