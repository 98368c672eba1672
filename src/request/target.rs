//! Request targets and their resolution into host, port and path.

use std::fmt;

use url::Url;

use crate::error::ConfigurationError;

/// Transport scheme of a target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scheme {
    Http,
    Https,
}

impl Scheme {
    pub fn parse(s: &str) -> Result<Self, ConfigurationError> {
        match s.trim_end_matches(':').to_ascii_lowercase().as_str() {
            "http" => Ok(Scheme::Http),
            "https" => Ok(Scheme::Https),
            other => Err(ConfigurationError::UnsupportedScheme(other.to_string())),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Scheme::Http => "http",
            Scheme::Https => "https",
        }
    }

    pub fn default_port(&self) -> u16 {
        match self {
            Scheme::Http => 80,
            Scheme::Https => 443,
        }
    }

    pub fn is_secure(&self) -> bool {
        matches!(self, Scheme::Https)
    }
}

impl fmt::Display for Scheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A target that was already split into components.
///
/// Missing components fall back to `http`, `localhost`, the scheme's
/// default port and `/`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TargetParts {
    pub scheme: Option<String>,
    pub host: Option<String>,
    pub port: Option<u16>,
    pub path: Option<String>,
}

/// Where a request goes: a URL or pre-split components.
#[derive(Debug, Clone)]
pub enum Target {
    Url(String),
    Parsed(Url),
    Parts(TargetParts),
}

impl From<&str> for Target {
    fn from(s: &str) -> Self {
        Target::Url(s.to_string())
    }
}

impl From<String> for Target {
    fn from(s: String) -> Self {
        Target::Url(s)
    }
}

impl From<&String> for Target {
    fn from(s: &String) -> Self {
        Target::Url(s.clone())
    }
}

impl From<Url> for Target {
    fn from(url: Url) -> Self {
        Target::Parsed(url)
    }
}

impl From<TargetParts> for Target {
    fn from(parts: TargetParts) -> Self {
        Target::Parts(parts)
    }
}

impl Target {
    pub fn resolve(&self) -> Result<ResolvedTarget, ConfigurationError> {
        match self {
            Target::Url(s) => {
                let url = Url::parse(s).map_err(|e| ConfigurationError::InvalidUrl {
                    url: s.clone(),
                    reason: e.to_string(),
                })?;
                ResolvedTarget::from_url(&url)
            }
            Target::Parsed(url) => ResolvedTarget::from_url(url),
            Target::Parts(parts) => ResolvedTarget::from_parts(parts),
        }
    }
}

/// A target reduced to what the transport needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedTarget {
    pub scheme: Scheme,
    /// Host as written in a URL; IPv6 literals keep their brackets.
    pub host: String,
    pub port: u16,
    /// Path including the query string, always starting with `/`.
    pub path: String,
}

impl ResolvedTarget {
    fn from_url(url: &Url) -> Result<Self, ConfigurationError> {
        let scheme = Scheme::parse(url.scheme())?;
        let host = match url.host_str() {
            Some(h) if !h.is_empty() => h.to_string(),
            _ => "localhost".to_string(),
        };
        let port = url.port().unwrap_or_else(|| scheme.default_port());
        let mut path = url.path().to_string();
        if path.is_empty() {
            path.push('/');
        }
        if let Some(query) = url.query() {
            path.push('?');
            path.push_str(query);
        }
        Ok(Self {
            scheme,
            host,
            port,
            path,
        })
    }

    fn from_parts(parts: &TargetParts) -> Result<Self, ConfigurationError> {
        let scheme = match &parts.scheme {
            Some(s) => Scheme::parse(s)?,
            None => Scheme::Http,
        };
        let host = match parts.host.as_deref().map(str::trim) {
            Some(h) if !h.is_empty() => h.to_string(),
            _ => "localhost".to_string(),
        };
        if host.contains(&['/', ' ', '?', '#'][..]) {
            return Err(ConfigurationError::InvalidUrl {
                url: host,
                reason: "host contains illegal characters".to_string(),
            });
        }
        let path = match parts.path.as_deref() {
            None | Some("") => "/".to_string(),
            Some(p) if p.starts_with('/') => p.to_string(),
            Some(p) => return Err(ConfigurationError::InvalidPath(p.to_string())),
        };
        Ok(Self {
            scheme,
            host,
            port: parts.port.unwrap_or_else(|| scheme.default_port()),
            path,
        })
    }

    /// Value for the `Host` header; default ports are omitted.
    pub fn authority(&self) -> String {
        if self.port == self.scheme.default_port() {
            self.host.clone()
        } else {
            format!("{}:{}", self.host, self.port)
        }
    }

    /// Host without IPv6 brackets, suitable for socket connect and SNI.
    pub fn socket_host(&self) -> &str {
        self.host.trim_start_matches('[').trim_end_matches(']')
    }

    /// The URL as reported in error context.
    pub fn url(&self) -> String {
        format!("{}://{}{}", self.scheme, self.authority(), self.path)
    }
}
