//! Topology descriptor loader.
//!
//! Walks a descriptor's XML event stream and executes whatever the selected
//! [`DialectRules`] table says for each element path. The loader is
//! format-agnostic at its boundary: callers pass a document (and optionally a
//! [`DialectHint`]) and get back a frozen [`Topology`], never needing to know
//! which dialect was detected. Every call owns a private
//! [`TopologyBuilder`], so concurrent loads share nothing.

use std::fs;
use std::io;
use std::path::Path;
use std::time::UNIX_EPOCH;

use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};
use tracing::{debug, info, warn};

use super::builder::TopologyBuilder;
use super::rules::{self, DialectHint, DialectRules, EndAction, StartAction, TextAction};
use super::Topology;
use crate::{Error, Result};

/// Multi-dialect descriptor loader.
pub struct TopologyLoader {
    dialects: Vec<DialectRules>,
}

impl Default for TopologyLoader {
    fn default() -> Self {
        Self::new(rules::builtin())
    }
}

impl TopologyLoader {
    /// Create a loader over an explicit set of dialect tables.
    #[must_use]
    pub fn new(dialects: Vec<DialectRules>) -> Self {
        Self { dialects }
    }

    /// Parse a descriptor held in a string.
    ///
    /// The descriptor must declare its own topology name; there is no file
    /// stem to fall back on.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Parse`] for malformed markup, an unsupported root
    /// element, or an invariant violation in the resulting graph.
    pub fn load_str(&self, xml: &str, hint: Option<DialectHint>) -> Result<Topology> {
        self.parse("<inline>", None, None, xml, hint)
    }

    /// Parse a descriptor file.
    ///
    /// The file stem becomes the topology name when the descriptor declares
    /// none, and the file's mtime becomes the topology timestamp.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if the file cannot be read, otherwise as
    /// [`load_str`](Self::load_str).
    pub fn load_file(&self, path: &Path, hint: Option<DialectHint>) -> Result<Topology> {
        let descriptor = path.display().to_string();
        let xml = fs::read_to_string(path)?;
        let fallback = path
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned());
        let timestamp = fs::metadata(path)
            .ok()
            .and_then(|meta| meta.modified().ok())
            .and_then(|mtime| mtime.duration_since(UNIX_EPOCH).ok())
            .and_then(|elapsed| i64::try_from(elapsed.as_millis()).ok());
        self.parse(&descriptor, fallback.as_deref(), timestamp, &xml, hint)
    }

    /// Load every descriptor (`*.xml`, `*.conf`) in a directory.
    ///
    /// Individual descriptors that fail to parse are logged and skipped so
    /// one broken file cannot take down the rest of the deployment.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if `dir` is not a directory.
    pub fn load_dir(&self, dir: &Path) -> Result<Vec<Topology>> {
        if !dir.is_dir() {
            return Err(Error::Config(format!(
                "Topologies path is not a directory: {}",
                dir.display()
            )));
        }

        let mut paths: Vec<_> = fs::read_dir(dir)?
            .map(|entry| entry.map(|e| e.path()))
            .collect::<io::Result<_>>()?;
        paths.sort();

        let mut topologies = Vec::new();
        for path in paths {
            if path
                .file_name()
                .is_some_and(|n| n.to_string_lossy().starts_with('.'))
            {
                continue;
            }
            if !path
                .extension()
                .is_some_and(|ext| ext == "xml" || ext == "conf")
            {
                continue;
            }
            match self.load_file(&path, None) {
                Ok(topology) => {
                    debug!(name = %topology.name(), path = %path.display(), "Loaded topology");
                    topologies.push(topology);
                }
                Err(e) => {
                    warn!(error = %e, path = %path.display(), "Failed to load topology");
                }
            }
        }

        info!(
            count = topologies.len(),
            path = %dir.display(),
            "Loaded topologies"
        );

        Ok(topologies)
    }

    fn parse(
        &self,
        descriptor: &str,
        fallback_name: Option<&str>,
        timestamp: Option<i64>,
        xml: &str,
        hint: Option<DialectHint>,
    ) -> Result<Topology> {
        let root = root_element(descriptor, xml)?;
        let dialect = match hint {
            Some(hint) => self
                .dialects
                .iter()
                .find(|d| d.name() == hint.rules_name())
                .ok_or_else(|| {
                    Error::Config(format!("No rules registered for dialect {hint:?}"))
                })?,
            None => self
                .dialects
                .iter()
                .find(|d| d.root() == root)
                .ok_or_else(|| {
                    Error::parse(descriptor, format!("unsupported root element <{root}>"))
                })?,
        };
        if dialect.root() != root {
            return Err(Error::parse(
                descriptor,
                format!(
                    "root element <{root}> does not match the {} dialect",
                    dialect.name()
                ),
            ));
        }
        debug!(descriptor = %descriptor, dialect = dialect.name(), "Parsing descriptor");
        self.run(dialect, descriptor, fallback_name, timestamp, xml)
    }

    /// Drive the event stream through the rule table into a fresh builder.
    fn run(
        &self,
        dialect: &DialectRules,
        descriptor: &str,
        fallback_name: Option<&str>,
        timestamp: Option<i64>,
        xml: &str,
    ) -> Result<Topology> {
        let mut builder = TopologyBuilder::new(descriptor);
        if let Some(name) = fallback_name {
            builder.set_fallback_name(name);
        }
        if let Some(ts) = timestamp {
            builder.set_timestamp(ts);
        }

        let mut reader = Reader::from_str(xml);
        reader.config_mut().trim_text(true);

        let mut path: Vec<String> = Vec::new();
        let mut text = String::new();

        loop {
            match reader.read_event() {
                Ok(Event::Start(e)) => {
                    path.push(local_name(&e));
                    text.clear();
                    if let Some(rule) = dialect.find(&path.join("/")) {
                        if let Some(action) = rule.on_start {
                            apply_start(&mut builder, action, &e, descriptor)?;
                        }
                    }
                }
                Ok(Event::Empty(e)) => {
                    // Self-closing element: start and end, no text in between
                    path.push(local_name(&e));
                    if let Some(rule) = dialect.find(&path.join("/")) {
                        if let Some(action) = rule.on_start {
                            apply_start(&mut builder, action, &e, descriptor)?;
                        }
                        if let Some(action) = rule.on_end {
                            apply_end(&mut builder, action)?;
                        }
                    }
                    path.pop();
                }
                Ok(Event::Text(t)) => {
                    let chunk = t
                        .unescape()
                        .map_err(|e| Error::parse(descriptor, e.to_string()))?;
                    text.push_str(&chunk);
                }
                Ok(Event::End(_)) => {
                    if let Some(rule) = dialect.find(&path.join("/")) {
                        if let Some(action) = rule.on_text {
                            apply_text(&mut builder, action, text.trim(), descriptor)?;
                        }
                        if let Some(action) = rule.on_end {
                            apply_end(&mut builder, action)?;
                        }
                    }
                    path.pop();
                    text.clear();
                }
                Ok(Event::Eof) => break,
                Ok(_) => {}
                Err(e) => {
                    return Err(Error::parse(
                        descriptor,
                        format!("{e} at byte {}", reader.buffer_position()),
                    ));
                }
            }
        }

        builder.build()
    }
}

fn apply_start(
    builder: &mut TopologyBuilder,
    action: StartAction,
    element: &BytesStart<'_>,
    descriptor: &str,
) -> Result<()> {
    match action {
        StartAction::TopologyName => {
            if let Some(name) = attr(element, "name", descriptor)? {
                builder.set_name(name);
            }
            Ok(())
        }
        StartAction::StartService => {
            builder.start_service(
                attr(element, "role", descriptor)?,
                attr(element, "name", descriptor)?,
            );
            Ok(())
        }
        StartAction::StartProvider => {
            let enabled = attr(element, "enabled", descriptor)?
                .map(|v| parse_enabled(&v, descriptor))
                .transpose()?;
            builder.start_provider(
                attr(element, "role", descriptor)?,
                attr(element, "name", descriptor)?,
                enabled,
            );
            Ok(())
        }
        StartAction::StartParam => {
            builder.start_param();
            Ok(())
        }
        StartAction::ParamFromAttrs => {
            let Some(name) = attr(element, "name", descriptor)? else {
                return Err(Error::parse(descriptor, "<param> missing 'name' attribute"));
            };
            let value = attr(element, "value", descriptor)?.unwrap_or_default();
            builder.add_param(name, value)
        }
    }
}

fn apply_text(
    builder: &mut TopologyBuilder,
    action: TextAction,
    text: &str,
    descriptor: &str,
) -> Result<()> {
    match action {
        TextAction::TopologyName => {
            builder.set_name(text);
            Ok(())
        }
        TextAction::Role => builder.set_role(text),
        TextAction::EntityName => builder.set_entity_name(text),
        TextAction::Enabled => {
            let enabled = parse_enabled(text, descriptor)?;
            builder.set_enabled(enabled)
        }
        TextAction::Url => builder.add_url(text),
        TextAction::ParamName => builder.set_param_name(text),
        TextAction::ParamValue => builder.set_param_value(text),
    }
}

fn apply_end(builder: &mut TopologyBuilder, action: EndAction) -> Result<()> {
    match action {
        EndAction::EndService => builder.end_service(),
        EndAction::EndProvider => builder.end_provider(),
        EndAction::EndParam => builder.end_param(),
    }
}

/// First start element of the document, for dialect detection.
fn root_element(descriptor: &str, xml: &str) -> Result<String> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);
    loop {
        match reader.read_event() {
            Ok(Event::Start(e) | Event::Empty(e)) => return Ok(local_name(&e)),
            Ok(Event::Eof) => return Err(Error::parse(descriptor, "empty descriptor")),
            Ok(_) => {}
            Err(e) => return Err(Error::parse(descriptor, e.to_string())),
        }
    }
}

fn local_name(element: &BytesStart<'_>) -> String {
    String::from_utf8_lossy(element.name().local_name().as_ref()).into_owned()
}

fn attr(element: &BytesStart<'_>, key: &str, descriptor: &str) -> Result<Option<String>> {
    for attribute in element.attributes() {
        let attribute = attribute.map_err(|e| Error::parse(descriptor, e.to_string()))?;
        if attribute.key.local_name().as_ref() == key.as_bytes() {
            let value = attribute
                .unescape_value()
                .map_err(|e| Error::parse(descriptor, e.to_string()))?;
            return Ok(Some(value.into_owned()));
        }
    }
    Ok(None)
}

fn parse_enabled(value: &str, descriptor: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" => Ok(true),
        "false" => Ok(false),
        other => Err(Error::parse(
            descriptor,
            format!("invalid enabled flag '{other}'"),
        )),
    }
}
