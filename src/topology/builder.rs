//! Construction-time accumulator for one in-flight descriptor parse.

use std::collections::BTreeMap;

use super::{Provider, Service, Topology};
use crate::{Error, Result};

/// Accumulates partially-built entities while a descriptor is being read,
/// then freezes them into an immutable [`Topology`].
///
/// The builder keeps an explicit stack of open entities. Dialect rules push
/// with `start_*`, fill fields in whatever order their grammar yields them,
/// and pop with `end_*`; `add_param` applies to whichever entity is open, so
/// one parameter rule serves services and providers alike.
///
/// [`build`](Self::build) consumes the builder; a frozen topology cannot be
/// reached through it again.
#[derive(Debug)]
pub struct TopologyBuilder {
    descriptor: String,
    name: Option<String>,
    fallback_name: Option<String>,
    timestamp: Option<i64>,
    services: Vec<Service>,
    providers: Vec<Provider>,
    stack: Vec<Open>,
}

#[derive(Debug)]
enum Open {
    Service {
        role: Option<String>,
        name: Option<String>,
        urls: Vec<String>,
        params: BTreeMap<String, String>,
    },
    Provider {
        role: Option<String>,
        name: Option<String>,
        enabled: Option<bool>,
        params: BTreeMap<String, String>,
    },
    Param {
        name: Option<String>,
        value: Option<String>,
    },
}

impl TopologyBuilder {
    /// Create a builder for the named descriptor. The name is only used to
    /// give parse errors a source to point at.
    #[must_use]
    pub fn new(descriptor: impl Into<String>) -> Self {
        Self {
            descriptor: descriptor.into(),
            name: None,
            fallback_name: None,
            timestamp: None,
            services: Vec::new(),
            providers: Vec::new(),
            stack: Vec::new(),
        }
    }

    /// Set the topology name from the descriptor itself.
    pub fn set_name(&mut self, name: impl Into<String>) {
        let name = name.into();
        if !name.is_empty() {
            self.name = Some(name);
        }
    }

    /// Name to fall back on when the descriptor declares none (typically the
    /// descriptor file's stem).
    pub fn set_fallback_name(&mut self, name: impl Into<String>) {
        self.fallback_name = Some(name.into());
    }

    /// Last-modified marker of the source descriptor, epoch millis.
    pub fn set_timestamp(&mut self, timestamp: i64) {
        self.timestamp = Some(timestamp);
    }

    /// Open a service. Role and name may arrive now (attribute dialects) or
    /// later via [`set_role`](Self::set_role) / [`set_entity_name`](Self::set_entity_name).
    pub fn start_service(&mut self, role: Option<String>, name: Option<String>) {
        self.stack.push(Open::Service {
            role: role.filter(|r| !r.is_empty()),
            name: name.filter(|n| !n.is_empty()),
            urls: Vec::new(),
            params: BTreeMap::new(),
        });
    }

    /// Open a provider. `enabled == None` defaults to enabled at
    /// [`end_provider`](Self::end_provider).
    pub fn start_provider(
        &mut self,
        role: Option<String>,
        name: Option<String>,
        enabled: Option<bool>,
    ) {
        self.stack.push(Open::Provider {
            role: role.filter(|r| !r.is_empty()),
            name: name.filter(|n| !n.is_empty()),
            enabled,
            params: BTreeMap::new(),
        });
    }

    /// Set the role of the currently open service or provider.
    pub fn set_role(&mut self, role: &str) -> Result<()> {
        match self.stack.last_mut() {
            Some(Open::Service { role: slot, .. } | Open::Provider { role: slot, .. }) => {
                *slot = non_empty(role);
                Ok(())
            }
            _ => Err(self.err("'role' outside a service or provider")),
        }
    }

    /// Set the name of the currently open service or provider.
    pub fn set_entity_name(&mut self, name: &str) -> Result<()> {
        match self.stack.last_mut() {
            Some(Open::Service { name: slot, .. } | Open::Provider { name: slot, .. }) => {
                *slot = non_empty(name);
                Ok(())
            }
            _ => Err(self.err("'name' outside a service or provider")),
        }
    }

    /// Set the enabled flag of the currently open provider.
    pub fn set_enabled(&mut self, enabled: bool) -> Result<()> {
        match self.stack.last_mut() {
            Some(Open::Provider { enabled: slot, .. }) => {
                *slot = Some(enabled);
                Ok(())
            }
            _ => Err(self.err("'enabled' outside a provider")),
        }
    }

    /// Append an endpoint URL to the currently open service.
    pub fn add_url(&mut self, url: &str) -> Result<()> {
        match self.stack.last_mut() {
            Some(Open::Service { urls, .. }) => {
                if !url.is_empty() {
                    urls.push(url.to_string());
                }
                Ok(())
            }
            _ => Err(self.err("'url' outside a service")),
        }
    }

    /// Open a parameter accumulator, for dialects that spell parameters as
    /// nested `<name>`/`<value>` elements.
    pub fn start_param(&mut self) {
        self.stack.push(Open::Param {
            name: None,
            value: None,
        });
    }

    /// Set the key of the currently open parameter.
    pub fn set_param_name(&mut self, name: &str) -> Result<()> {
        match self.stack.last_mut() {
            Some(Open::Param { name: slot, .. }) => {
                *slot = non_empty(name);
                Ok(())
            }
            _ => Err(self.err("param 'name' outside a param")),
        }
    }

    /// Set the value of the currently open parameter.
    pub fn set_param_value(&mut self, value: &str) -> Result<()> {
        match self.stack.last_mut() {
            Some(Open::Param { value: slot, .. }) => {
                *slot = Some(value.to_string());
                Ok(())
            }
            _ => Err(self.err("param 'value' outside a param")),
        }
    }

    /// Close the open parameter and attach it to the enclosing entity.
    pub fn end_param(&mut self) -> Result<()> {
        match self.stack.pop() {
            Some(Open::Param { name, value }) => {
                let Some(name) = name else {
                    return Err(self.err("param is missing a name"));
                };
                self.add_param(name, value.unwrap_or_default())
            }
            _ => Err(self.err("unbalanced param end")),
        }
    }

    /// Attach a parameter to whichever entity is currently open.
    /// Duplicate keys overwrite: last write wins.
    pub fn add_param(&mut self, key: String, value: String) -> Result<()> {
        match self.stack.last_mut() {
            Some(Open::Service { params, .. } | Open::Provider { params, .. }) => {
                params.insert(key, value);
                Ok(())
            }
            _ => Err(self.err("param outside a service or provider")),
        }
    }

    /// Close the open service, enforcing its invariants (non-empty role, at
    /// least one URL).
    pub fn end_service(&mut self) -> Result<()> {
        match self.stack.pop() {
            Some(Open::Service {
                role,
                name,
                urls,
                params,
            }) => {
                let Some(role) = role else {
                    return Err(self.err("service is missing a role"));
                };
                if urls.is_empty() {
                    return Err(self.err(format!("service '{role}' declares no urls")));
                }
                self.services.push(Service {
                    role,
                    name,
                    urls,
                    params,
                });
                Ok(())
            }
            _ => Err(self.err("unbalanced service end")),
        }
    }

    /// Close the open provider, enforcing its invariants (non-empty role).
    pub fn end_provider(&mut self) -> Result<()> {
        match self.stack.pop() {
            Some(Open::Provider {
                role,
                name,
                enabled,
                params,
            }) => {
                let Some(role) = role else {
                    return Err(self.err("provider is missing a role"));
                };
                self.providers.push(Provider {
                    role,
                    name,
                    // enabled defaults to true when the descriptor omits it
                    enabled: enabled.unwrap_or(true),
                    params,
                });
                Ok(())
            }
            _ => Err(self.err("unbalanced provider end")),
        }
    }

    /// Freeze the accumulated entities into an immutable [`Topology`].
    ///
    /// Consumes the builder; there is no way to mutate the result through it.
    pub fn build(mut self) -> Result<Topology> {
        if !self.stack.is_empty() {
            return Err(self.err("descriptor ended with an unclosed element"));
        }
        let Some(name) = self.name.take().or_else(|| self.fallback_name.take()) else {
            return Err(self.err("topology has no name"));
        };
        Ok(Topology {
            name,
            timestamp: self.timestamp,
            services: self.services,
            providers: self.providers,
        })
    }

    fn err(&self, detail: impl Into<String>) -> Error {
        Error::parse(&self.descriptor, detail)
    }
}

fn non_empty(value: &str) -> Option<String> {
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}
