//! Token-bucket rate limiter per client identity.
//!
//! Two tiers — general and sensitive — each with its own capacity/refill
//! rate. Client identity is the immediate peer address; a forwarded-IP
//! header is only trusted when the peer itself is inside a configured set
//! of trusted proxy networks, otherwise it is ignored outright as an
//! anti-spoofing measure.

use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::Mutex;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy)]
pub struct BucketConfig {
    pub capacity: f64,
    pub refill_per_sec: f64,
}

struct Bucket {
    tokens: f64,
    last_refill: Instant,
}

impl Bucket {
    fn new(capacity: f64) -> Self {
        Self {
            tokens: capacity,
            last_refill: Instant::now(),
        }
    }

    fn try_take(&mut self, cfg: &BucketConfig) -> bool {
        let now = Instant::now();
        let elapsed = now.duration_since(self.last_refill).as_secs_f64();
        self.tokens = (self.tokens + elapsed * cfg.refill_per_sec).min(cfg.capacity);
        self.last_refill = now;
        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            true
        } else {
            false
        }
    }
}

/// A single tier's set of per-client buckets.
pub struct RateLimiter {
    config: BucketConfig,
    buckets: Mutex<HashMap<String, Bucket>>,
}

impl RateLimiter {
    pub fn new(config: BucketConfig) -> Self {
        Self {
            config,
            buckets: Mutex::new(HashMap::new()),
        }
    }

    /// Attempt to consume one token for `client_id`. Returns `true` if
    /// admitted, `false` if the client is currently over budget.
    pub fn check(&self, client_id: &str) -> bool {
        let mut g = self.buckets.lock().unwrap();
        let bucket = g
            .entry(client_id.to_string())
            .or_insert_with(|| Bucket::new(self.config.capacity));
        bucket.try_take(&self.config)
    }
}

/// A named, CIDR-like trusted proxy network (kept minimal: exact IP or
/// prefix match over octets — full CIDR parsing lives with the inbound
/// HTTP stack, not in this pure resilience primitive).
#[derive(Debug, Clone)]
pub struct TrustedProxyNetwork {
    pub network: IpAddr,
    pub prefix_len: u8,
}

impl TrustedProxyNetwork {
    pub fn contains(&self, addr: IpAddr) -> bool {
        match (self.network, addr) {
            (IpAddr::V4(net), IpAddr::V4(ip)) => {
                let mask = if self.prefix_len == 0 {
                    0
                } else {
                    u32::MAX << (32 - self.prefix_len.min(32))
                };
                (u32::from(net) & mask) == (u32::from(ip) & mask)
            }
            (IpAddr::V6(net), IpAddr::V6(ip)) => {
                let mask = if self.prefix_len == 0 {
                    0u128
                } else {
                    u128::MAX << (128 - self.prefix_len.min(128))
                };
                (u128::from(net) & mask) == (u128::from(ip) & mask)
            }
            _ => false,
        }
    }
}

/// Resolve the client identity for rate-limiting purposes.
///
/// `peer` is the actual TCP peer address (never spoofable). `forwarded_ip`
/// is the value of a forwarded-IP header, if present. The forwarded value
/// is used only when `peer` belongs to one of `trusted_proxies` -- in every
/// other case the peer address itself is the identity, regardless of what
/// the header claims.
pub fn resolve_client_identity(
    peer: IpAddr,
    forwarded_ip: Option<IpAddr>,
    trusted_proxies: &[TrustedProxyNetwork],
) -> IpAddr {
    let peer_is_trusted = trusted_proxies.iter().any(|n| n.contains(peer));
    match (peer_is_trusted, forwarded_ip) {
        (true, Some(fwd)) => fwd,
        _ => peer,
    }
}

/// Two named tiers: general and sensitive-endpoints.
pub struct TieredRateLimiter {
    pub general: RateLimiter,
    pub sensitive: RateLimiter,
}

impl TieredRateLimiter {
    pub fn new(general: BucketConfig, sensitive: BucketConfig) -> Self {
        Self {
            general: RateLimiter::new(general),
            sensitive: RateLimiter::new(sensitive),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    #[test]
    fn bucket_admits_up_to_capacity_then_blocks() {
        let limiter = RateLimiter::new(BucketConfig {
            capacity: 3.0,
            refill_per_sec: 0.0,
        });
        assert!(limiter.check("client-a"));
        assert!(limiter.check("client-a"));
        assert!(limiter.check("client-a"));
        assert!(!limiter.check("client-a"));
    }

    #[test]
    fn buckets_are_independent_per_client() {
        let limiter = RateLimiter::new(BucketConfig {
            capacity: 1.0,
            refill_per_sec: 0.0,
        });
        assert!(limiter.check("client-a"));
        assert!(limiter.check("client-b"));
        assert!(!limiter.check("client-a"));
    }

    #[test]
    fn forwarded_header_ignored_from_untrusted_peer() {
        let peer: IpAddr = Ipv4Addr::new(203, 0, 113, 5).into();
        let forwarded: IpAddr = Ipv4Addr::new(10, 0, 0, 99).into();
        let identity = resolve_client_identity(peer, Some(forwarded), &[]);
        assert_eq!(identity, peer);
    }

    #[test]
    fn forwarded_header_honored_from_trusted_proxy() {
        let peer: IpAddr = Ipv4Addr::new(10, 0, 0, 1).into();
        let forwarded: IpAddr = Ipv4Addr::new(203, 0, 113, 7).into();
        let trusted = TrustedProxyNetwork {
            network: Ipv4Addr::new(10, 0, 0, 0).into(),
            prefix_len: 8,
        };
        let identity = resolve_client_identity(peer, Some(forwarded), &[trusted]);
        assert_eq!(identity, forwarded);
    }

    #[test]
    fn network_contains_checks_prefix() {
        let net = TrustedProxyNetwork {
            network: Ipv4Addr::new(10, 0, 0, 0).into(),
            prefix_len: 8,
        };
        assert!(net.contains(Ipv4Addr::new(10, 5, 6, 7).into()));
        assert!(!net.contains(Ipv4Addr::new(11, 0, 0, 1).into()));
    }
}
