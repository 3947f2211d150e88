// BinWatch: Report Client
//
// Sends the current fullness to the collector as a partial update:
//   PATCH http://{host}:{port}/bins/{id}   {"fullness": N}
// If the request by hostname does not succeed, the hostname is resolved
// directly and the identical request is repeated once against the address.
// `.local` discovery is flaky on some networks while the address route works.

use std::net::{IpAddr, ToSocketAddrs};

use serde::Serialize;

use crate::events::{BinIdentity, FillLevel, ReportOutcome};

/// Sends one JSON PATCH request and returns the HTTP status code.
pub trait Transport {
    fn patch(&mut self, url: &str, body: &[u8]) -> anyhow::Result<u16>;
}

/// Resolves a hostname to a network address.
pub trait Resolver {
    fn resolve(&mut self, host: &str) -> anyhow::Result<IpAddr>;
}

/// Platform resolver (`getaddrinfo`). On ESP-IDF this also answers `.local`
/// names through mDNS when `CONFIG_LWIP_DNS_SUPPORT_MDNS_QUERIES` is set.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemResolver;

impl Resolver for SystemResolver {
    fn resolve(&mut self, host: &str) -> anyhow::Result<IpAddr> {
        let addrs: Vec<IpAddr> = (host, 0).to_socket_addrs()?.map(|a| a.ip()).collect();
        addrs
            .iter()
            .find(|ip| ip.is_ipv4())
            .or_else(|| addrs.first())
            .copied()
            .ok_or_else(|| anyhow::anyhow!("no address found for {host}"))
    }
}

/// Body of the partial update; only `fullness` is touched on the collector.
#[derive(Debug, Serialize)]
struct FullnessPatch {
    fullness: u8,
}

pub struct ReportClient<T, R> {
    transport: T,
    resolver: R,
}

impl<T: Transport, R: Resolver> ReportClient<T, R> {
    pub fn new(transport: T, resolver: R) -> Self {
        Self {
            transport,
            resolver,
        }
    }

    /// Deliver `level` for `bin`. Never fails: every problem is logged and
    /// folded into the returned outcome.
    pub fn deliver(&mut self, bin: &BinIdentity, level: FillLevel) -> ReportOutcome {
        let patch = FullnessPatch {
            fullness: level.percent(),
        };
        let body = match serde_json::to_vec(&patch) {
            Ok(body) => body,
            Err(e) => {
                log::error!("Could not encode report body: {}", e);
                return ReportOutcome::TransportFailed;
            }
        };

        let outcome = self.attempt(&bin.url(), &body);
        if outcome.is_delivered() {
            return outcome;
        }

        // Fallback: bypass name-based addressing once.
        match self.resolver.resolve(bin.host) {
            Ok(ip) => {
                let ip_url = bin.url_via(&ip.to_string());
                log::info!("Retry via IP {}", ip_url);
                self.attempt(&ip_url, &body)
            }
            Err(e) => {
                log::error!("Could not resolve {}: {}", bin.host, e);
                ReportOutcome::TransportFailed
            }
        }
    }

    fn attempt(&mut self, url: &str, body: &[u8]) -> ReportOutcome {
        match self.transport.patch(url, body) {
            Ok(status) => {
                let outcome = ReportOutcome::from_status(status);
                if outcome.is_delivered() {
                    log::info!("PATCH {} -> {}", url, status);
                } else {
                    log::warn!("PATCH {} -> {}", url, status);
                }
                outcome
            }
            Err(e) => {
                log::warn!("PATCH {} -> error: {}", url, e);
                ReportOutcome::TransportFailed
            }
        }
    }

    #[cfg(test)]
    pub(crate) fn transport(&self) -> &T {
        &self.transport
    }
}
