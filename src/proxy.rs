use std::fmt::Display;

use rand::Rng;

use crate::logging::HordeLogger;

/// One SOCKS4 forward proxy endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxyEndpoint {
    pub host: String,
    pub port: u16,
}

impl Display for ProxyEndpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[error("Malformed proxy entry '{line}': {reason}")]
pub struct MalformedProxyEntry {
    pub line: String,
    pub reason: &'static str,
}

impl ProxyEndpoint {
    /// Parses one `ip:port` line. Rejected lines carry the reason instead of
    /// silently producing a bogus port.
    pub fn parse(line: &str) -> Result<Self, MalformedProxyEntry> {
        let trimmed = line.trim();
        let Some((host, port)) = trimmed.rsplit_once(':') else {
            return Err(MalformedProxyEntry {
                line: trimmed.to_owned(),
                reason: "missing port",
            });
        };

        if host.is_empty() {
            return Err(MalformedProxyEntry {
                line: trimmed.to_owned(),
                reason: "missing host",
            });
        }

        let port: u16 = port.parse().map_err(|_| MalformedProxyEntry {
            line: trimmed.to_owned(),
            reason: "port is not a number in 1..=65535",
        })?;

        Ok(Self {
            host: host.to_owned(),
            port,
        })
    }
}

/// Read-only pool of proxy endpoints, populated once at startup and shared
/// across every session. `pick` only ever reads a random index, so no lock
/// is needed.
#[derive(Debug, Default)]
pub struct ProxyPool {
    proxies: Vec<ProxyEndpoint>,
}

impl ProxyPool {
    pub const fn empty() -> Self {
        Self {
            proxies: Vec::new(),
        }
    }

    /// Parses a newline-delimited list. Malformed lines are logged and
    /// dropped; the rest of the list still loads.
    pub fn parse(text: &str) -> Self {
        let mut proxies = Vec::new();
        for line in text.lines() {
            if line.trim().is_empty() {
                continue;
            }
            match ProxyEndpoint::parse(line) {
                Ok(endpoint) => proxies.push(endpoint),
                Err(err) => HordeLogger::malformed_proxy_entry(&err),
            }
        }
        Self { proxies }
    }

    /// Fetches and parses the remote list.
    pub async fn fetch(url: &str) -> anyhow::Result<Self> {
        let text = reqwest::get(url).await?.error_for_status()?.text().await?;
        Ok(Self::parse(&text))
    }

    pub fn pick(&self) -> Option<&ProxyEndpoint> {
        if self.proxies.is_empty() {
            return None;
        }
        let idx = rand::thread_rng().gen_range(0..self.proxies.len());
        self.proxies.get(idx)
    }

    pub fn len(&self) -> usize {
        self.proxies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.proxies.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::{ProxyEndpoint, ProxyPool};

    #[test]
    fn parses_well_formed_entries() {
        let endpoint = ProxyEndpoint::parse(" 203.0.113.7:1080 \n").unwrap();
        assert_eq!(endpoint.host, "203.0.113.7");
        assert_eq!(endpoint.port, 1080);
    }

    #[test]
    fn rejects_malformed_entries() {
        assert_eq!(ProxyEndpoint::parse("203.0.113.7").unwrap_err().reason, "missing port");
        assert_eq!(ProxyEndpoint::parse(":1080").unwrap_err().reason, "missing host");
        assert!(ProxyEndpoint::parse("203.0.113.7:notaport").is_err());
        assert!(ProxyEndpoint::parse("203.0.113.7:70000").is_err());
    }

    #[test]
    fn pool_drops_bad_lines_and_blanks() {
        let pool = ProxyPool::parse("203.0.113.7:1080\n\n  \nbadline\n198.51.100.2:4145\n");
        assert_eq!(pool.len(), 2);
    }

    #[test]
    fn empty_pool_picks_nothing() {
        let pool = ProxyPool::empty();
        assert!(pool.pick().is_none());

        let pool = ProxyPool::parse("");
        assert!(pool.is_empty());
        assert!(pool.pick().is_none());
    }

    #[test]
    fn pick_returns_a_pool_member() {
        let pool = ProxyPool::parse("203.0.113.7:1080\n198.51.100.2:4145");
        for _ in 0..16 {
            let picked = pool.pick().unwrap();
            assert!(picked.port == 1080 || picked.port == 4145);
        }
    }
}
