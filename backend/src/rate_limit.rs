//! Sliding-window request limiting per client.
//!
//! Each client keeps the instants of its admitted requests. On every request
//! the instants older than the window are dropped, and the request is admitted
//! only while fewer than `max_requests` remain. Rejected requests are not
//! recorded, so hammering a full window does not extend it.

use crate::error::ApiError;
use axum::{
    extract::{ConnectInfo, Request, State},
    middleware::Next,
    response::Response,
};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

/// Key shared by every request whose peer address is unavailable.
pub const UNKNOWN_CLIENT: &str = "unknown";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RateLimitConfig {
    pub window: Duration,
    pub max_requests: usize,
}

impl RateLimitConfig {
    pub fn new(window_secs: u64, max_requests: usize) -> Self {
        Self {
            window: Duration::from_secs(window_secs),
            max_requests,
        }
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self::new(60, 60)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Decision {
    /// Admitted and recorded. `remaining` is what is left in the current window.
    Admitted { remaining: usize },
    Rejected,
}

impl Decision {
    pub fn is_admitted(&self) -> bool {
        matches!(self, Decision::Admitted { .. })
    }
}

/// Per-client sliding-window limiter. One instance is shared by all requests.
///
/// Clients that stop sending keep their entry until [`RateLimiter::evict_idle`]
/// runs or they come back.
#[derive(Debug)]
pub struct RateLimiter {
    config: RateLimitConfig,
    clients: Mutex<HashMap<String, Vec<Instant>>>,
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            config,
            clients: Mutex::new(HashMap::new()),
        }
    }

    pub fn check(&self, client: &str) -> Decision {
        self.check_at(client, Instant::now())
    }

    /// Prune, count and record as one step under the lock, so two concurrent
    /// requests from the same client can never both take the last slot.
    pub fn check_at(&self, client: &str, now: Instant) -> Decision {
        let window = self.config.window;
        let mut clients = self.lock();
        let timestamps = clients.entry(client.to_owned()).or_default();

        timestamps.retain(|&t| now.saturating_duration_since(t) < window);
        if timestamps.len() >= self.config.max_requests {
            return Decision::Rejected;
        }

        timestamps.push(now);
        Decision::Admitted {
            remaining: self.config.max_requests - timestamps.len(),
        }
    }

    pub fn evict_idle(&self) -> usize {
        self.evict_idle_at(Instant::now())
    }

    /// Drops clients with no request inside the window. Returns how many went.
    pub fn evict_idle_at(&self, now: Instant) -> usize {
        let window = self.config.window;
        let mut clients = self.lock();
        let before = clients.len();
        clients.retain(|_, timestamps| {
            timestamps
                .iter()
                .any(|&t| now.saturating_duration_since(t) < window)
        });
        before - clients.len()
    }

    pub fn tracked_clients(&self) -> usize {
        self.lock().len()
    }

    // A panic while holding the lock cannot leave the map half-updated.
    fn lock(&self) -> MutexGuard<'_, HashMap<String, Vec<Instant>>> {
        self.clients.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn client_key(request: &Request) -> String {
    request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_else(|| UNKNOWN_CLIENT.to_owned())
}

/// Middleware gate in front of every route.
pub async fn rate_limit(
    State(limiter): State<Arc<RateLimiter>>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let client = client_key(&request);
    match limiter.check(&client) {
        Decision::Admitted { .. } => Ok(next.run(request).await),
        Decision::Rejected => {
            tracing::warn!(%client, "Rate limit exceeded");
            Err(ApiError::RateLimited)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECOND: Duration = Duration::from_secs(1);

    fn limiter(window_secs: u64, max_requests: usize) -> RateLimiter {
        RateLimiter::new(RateLimitConfig::new(window_secs, max_requests))
    }

    #[test]
    fn admits_up_to_limit_then_rejects() {
        let limiter = limiter(60, 3);
        let start = Instant::now();

        for i in 0..3 {
            let decision = limiter.check_at("1.2.3.4", start + SECOND * i);
            assert_eq!(
                decision,
                Decision::Admitted {
                    remaining: 2 - i as usize
                }
            );
        }
        assert_eq!(
            limiter.check_at("1.2.3.4", start + SECOND * 3),
            Decision::Rejected
        );
    }

    #[test]
    fn window_is_measured_in_seconds() {
        let limiter = limiter(60, 1);
        let start = Instant::now();

        assert!(limiter.check_at("a", start).is_admitted());
        assert!(!limiter.check_at("a", start + SECOND * 59).is_admitted());
        assert!(limiter.check_at("a", start + SECOND * 60).is_admitted());
    }

    #[test]
    fn rejections_are_not_recorded() {
        let limiter = limiter(10, 2);
        let start = Instant::now();

        assert!(limiter.check_at("a", start).is_admitted());
        assert!(limiter.check_at("a", start + SECOND).is_admitted());
        for s in 2..10 {
            assert_eq!(
                limiter.check_at("a", start + SECOND * s),
                Decision::Rejected
            );
        }

        // Only the two admitted requests age out; the rejected ones left no trace.
        assert!(limiter.check_at("a", start + SECOND * 10).is_admitted());
        assert!(limiter.check_at("a", start + SECOND * 11).is_admitted());
        assert_eq!(
            limiter.check_at("a", start + SECOND * 12),
            Decision::Rejected
        );
    }

    #[test]
    fn window_slides_rather_than_resets() {
        let limiter = limiter(10, 2);
        let start = Instant::now();

        assert!(limiter.check_at("a", start).is_admitted());
        assert!(limiter.check_at("a", start + SECOND * 8).is_admitted());
        // The first request expired, the second has not.
        assert!(limiter.check_at("a", start + SECOND * 10).is_admitted());
        assert!(!limiter.check_at("a", start + SECOND * 11).is_admitted());
    }

    #[test]
    fn clients_are_limited_independently() {
        let limiter = limiter(60, 1);
        let now = Instant::now();

        assert!(limiter.check_at("a", now).is_admitted());
        assert!(limiter.check_at("b", now).is_admitted());
        assert!(!limiter.check_at("a", now).is_admitted());
        assert!(limiter.check_at(UNKNOWN_CLIENT, now).is_admitted());
    }

    #[test]
    fn zero_limit_rejects_everything() {
        let limiter = limiter(60, 0);

        assert_eq!(limiter.check("a"), Decision::Rejected);
    }

    #[test]
    fn evict_idle_drops_only_quiet_clients() {
        let limiter = limiter(10, 5);
        let start = Instant::now();
        limiter.check_at("quiet", start);
        limiter.check_at("busy", start + SECOND * 9);

        let evicted = limiter.evict_idle_at(start + SECOND * 12);

        assert_eq!(evicted, 1);
        assert_eq!(limiter.tracked_clients(), 1);
        assert!(limiter.check_at("busy", start + SECOND * 12).is_admitted());
    }

    #[test]
    fn concurrent_checks_never_exceed_the_limit() {
        let limiter = Arc::new(limiter(60, 50));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let limiter = limiter.clone();
                std::thread::spawn(move || {
                    (0..20)
                        .filter(|_| limiter.check("shared").is_admitted())
                        .count()
                })
            })
            .collect();
        let admitted: usize = handles.into_iter().map(|h| h.join().unwrap()).sum();

        assert_eq!(admitted, 50);
    }
}
