//! Static service registry
//!
//! Maps service names to the base URL of the downstream that serves them.
//! The registry is built once from configuration and never mutated, so it
//! can be shared across request tasks without locking.

use std::collections::{BTreeMap, HashMap};

use anyhow::{Context, Result};
use url::Url;

/// A downstream service the gateway can forward to.
#[derive(Debug, Clone)]
pub struct Service {
    pub name: String,
    pub base_url: Url,
}

impl Service {
    pub fn new(name: impl Into<String>, base_url: &str) -> Result<Self> {
        let name = name.into();
        if name.is_empty() {
            anyhow::bail!("service name must not be empty");
        }
        if name.contains('/') {
            anyhow::bail!("service name '{name}' must not contain '/'");
        }

        let base_url = Url::parse(base_url)
            .with_context(|| format!("service '{name}' has an invalid base URL '{base_url}'"))?;

        if base_url.scheme() != "http" {
            anyhow::bail!(
                "service '{name}' uses scheme '{}', only http:// base URLs are supported",
                base_url.scheme()
            );
        }
        if base_url.host_str().is_none() {
            anyhow::bail!("service '{name}' base URL has no host");
        }
        if base_url.query().is_some() || base_url.fragment().is_some() {
            anyhow::bail!("service '{name}' base URL must not carry a query or fragment");
        }

        Ok(Self { name, base_url })
    }

    /// `host:port` to open a TCP connection to.
    pub fn socket_addr(&self) -> String {
        let host = self.base_url.host_str().unwrap_or_default();
        let port = self.base_url.port_or_known_default().unwrap_or(80);
        format!("{host}:{port}")
    }

    /// Value for a `Host` header naming this service.
    pub fn authority(&self) -> String {
        let host = self.base_url.host_str().unwrap_or_default();
        match self.base_url.port() {
            Some(port) => format!("{host}:{port}"),
            None => host.to_string(),
        }
    }

    /// Builds the downstream request-target: base path, `/`, `path`, then the
    /// raw query when one is present. `path` is not re-encoded or normalised.
    pub fn request_target(&self, path: &str, query: Option<&str>) -> String {
        let base_path = self.base_url.path().trim_end_matches('/');
        let mut target = format!("{base_path}/{path}");
        if let Some(query) = query {
            target.push('?');
            target.push_str(query);
        }
        target
    }

    /// Absolute URL of a downstream request, for logs and error messages.
    pub fn url_for(&self, target: &str) -> String {
        format!("{}://{}{}", self.base_url.scheme(), self.authority(), target)
    }
}

/// Read-only mapping from service name to [`Service`].
#[derive(Debug, Clone, Default)]
pub struct ServiceRegistry {
    services: HashMap<String, Service>,
}

impl ServiceRegistry {
    /// Builds the registry from `name -> base URL` entries.
    pub fn from_config(entries: &BTreeMap<String, String>) -> Result<Self> {
        let services = entries
            .iter()
            .map(|(name, url)| Ok((name.clone(), Service::new(name.clone(), url)?)))
            .collect::<Result<HashMap<_, _>>>()?;

        Ok(Self { services })
    }

    /// Looks a service up by exact (case-sensitive) name.
    pub fn resolve(&self, name: &str) -> Option<&Service> {
        self.services.get(name)
    }

    pub fn len(&self) -> usize {
        self.services.len()
    }

    pub fn is_empty(&self) -> bool {
        self.services.is_empty()
    }

    /// Registered service names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.services.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}
