//! Dialect rule tables.
//!
//! Each supported descriptor dialect is one declarative table mapping element
//! paths onto [`TopologyBuilder`](super::TopologyBuilder) operations, plus a
//! rule for where each argument comes from (attributes at element start, or
//! the element's collected text). The loader walks the document's event
//! stream and executes whatever the table says; elements with no entry are
//! skipped, so unknown extension elements never fail a parse.
//!
//! Two dialects ship built in:
//!
//! - **native** (`<topology>` root): every field is a child element, params
//!   are `<param><name>..</name><value>..</value></param>` blocks, and a
//!   provider's enabled flag is the text of an `<enabled>` element.
//! - **cluster** (`<configuration>` root, conventionally `*.conf`): a
//!   re-purposed cluster-descriptor format where fields are attributes and a
//!   provider's enabled flag is an `enabled` attribute.
//!
//! Both tables normalize to the same builder calls, so semantically
//! equivalent descriptors yield equal topologies regardless of dialect.

use std::str::FromStr;

/// Explicit dialect selection, for callers that know what they are loading.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DialectHint {
    /// The native element-based format (`<topology>` root)
    Native,
    /// The attribute-based cluster format (`<configuration>` root)
    Cluster,
}

impl DialectHint {
    pub(crate) fn rules_name(self) -> &'static str {
        match self {
            Self::Native => "native",
            Self::Cluster => "cluster",
        }
    }
}

impl FromStr for DialectHint {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "native" => Ok(Self::Native),
            "cluster" => Ok(Self::Cluster),
            _ => Err(()),
        }
    }
}

/// Builder operation triggered when an element in the table opens.
#[derive(Debug, Clone, Copy)]
pub(crate) enum StartAction {
    /// Topology name from the `name` attribute
    TopologyName,
    /// Open a service; role/name from attributes when present
    StartService,
    /// Open a provider; role/name/enabled from attributes when present
    StartProvider,
    /// Open a param accumulator (element-style params)
    StartParam,
    /// Whole param from `name`/`value` attributes (attribute-style params)
    ParamFromAttrs,
}

/// Builder operation fed with the element's collected text at element close.
#[derive(Debug, Clone, Copy)]
pub(crate) enum TextAction {
    /// Topology name
    TopologyName,
    /// Role of the open entity
    Role,
    /// Name of the open entity
    EntityName,
    /// Enabled flag of the open provider
    Enabled,
    /// Endpoint URL of the open service
    Url,
    /// Key of the open param
    ParamName,
    /// Value of the open param
    ParamValue,
}

/// Builder operation triggered when an element in the table closes.
#[derive(Debug, Clone, Copy)]
pub(crate) enum EndAction {
    /// Finalize the open service
    EndService,
    /// Finalize the open provider
    EndProvider,
    /// Finalize the open param
    EndParam,
}

/// One row of a dialect table.
#[derive(Debug)]
pub(crate) struct Rule {
    pub(crate) path: &'static str,
    pub(crate) on_start: Option<StartAction>,
    pub(crate) on_text: Option<TextAction>,
    pub(crate) on_end: Option<EndAction>,
}

const fn rule(path: &'static str) -> Rule {
    Rule {
        path,
        on_start: None,
        on_text: None,
        on_end: None,
    }
}

impl Rule {
    const fn start(mut self, action: StartAction) -> Self {
        self.on_start = Some(action);
        self
    }

    const fn text(mut self, action: TextAction) -> Self {
        self.on_text = Some(action);
        self
    }

    const fn end(mut self, action: EndAction) -> Self {
        self.on_end = Some(action);
        self
    }
}

/// An immutable rule table for one descriptor dialect.
///
/// Constructed once (usually via [`builtin`]) and injected into the
/// [`TopologyLoader`](super::TopologyLoader); there is no global registry.
#[derive(Debug)]
pub struct DialectRules {
    name: &'static str,
    root: &'static str,
    rules: Vec<Rule>,
}

impl DialectRules {
    /// Dialect name, as used by hints and configuration
    #[must_use]
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Root element this dialect is detected by
    #[must_use]
    pub fn root(&self) -> &'static str {
        self.root
    }

    pub(crate) fn find(&self, path: &str) -> Option<&Rule> {
        self.rules.iter().find(|r| r.path == path)
    }
}

/// The native element-based dialect.
#[must_use]
pub fn native() -> DialectRules {
    use EndAction as End;
    use StartAction as Start;
    use TextAction as Text;

    DialectRules {
        name: "native",
        root: "topology",
        rules: vec![
            rule("topology/name").text(Text::TopologyName),
            rule("topology/gateway/provider")
                .start(Start::StartProvider)
                .end(End::EndProvider),
            rule("topology/gateway/provider/role").text(Text::Role),
            rule("topology/gateway/provider/name").text(Text::EntityName),
            rule("topology/gateway/provider/enabled").text(Text::Enabled),
            rule("topology/gateway/provider/param")
                .start(Start::StartParam)
                .end(End::EndParam),
            rule("topology/gateway/provider/param/name").text(Text::ParamName),
            rule("topology/gateway/provider/param/value").text(Text::ParamValue),
            rule("topology/service")
                .start(Start::StartService)
                .end(End::EndService),
            rule("topology/service/role").text(Text::Role),
            rule("topology/service/name").text(Text::EntityName),
            rule("topology/service/url").text(Text::Url),
            rule("topology/service/param")
                .start(Start::StartParam)
                .end(End::EndParam),
            rule("topology/service/param/name").text(Text::ParamName),
            rule("topology/service/param/value").text(Text::ParamValue),
        ],
    }
}

/// The attribute-based cluster dialect.
#[must_use]
pub fn cluster() -> DialectRules {
    use EndAction as End;
    use StartAction as Start;
    use TextAction as Text;

    DialectRules {
        name: "cluster",
        root: "configuration",
        rules: vec![
            rule("configuration").start(Start::TopologyName),
            rule("configuration/service")
                .start(Start::StartService)
                .end(End::EndService),
            rule("configuration/service/url").text(Text::Url),
            rule("configuration/service/param").start(Start::ParamFromAttrs),
            rule("configuration/provider")
                .start(Start::StartProvider)
                .end(End::EndProvider),
            rule("configuration/provider/param").start(Start::ParamFromAttrs),
        ],
    }
}

/// Both built-in dialect tables, in detection order.
#[must_use]
pub fn builtin() -> Vec<DialectRules> {
    vec![native(), cluster()]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_dialects_have_distinct_roots() {
        let dialects = builtin();
        assert_eq!(dialects.len(), 2);
        assert_eq!(dialects[0].root(), "topology");
        assert_eq!(dialects[1].root(), "configuration");
    }

    #[test]
    fn unknown_paths_have_no_rule() {
        let native = native();
        assert!(native.find("topology/service").is_some());
        assert!(native.find("topology/extension/whatever").is_none());
    }

    #[test]
    fn hint_names_round_trip() {
        assert_eq!("native".parse(), Ok(DialectHint::Native));
        assert_eq!("cluster".parse(), Ok(DialectHint::Cluster));
        assert_eq!(DialectHint::Cluster.rules_name(), "cluster");
        assert!("yaml".parse::<DialectHint>().is_err());
    }
}
