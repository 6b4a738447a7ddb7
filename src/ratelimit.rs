use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use axum::{
    extract::{ConnectInfo, State},
    http::{Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use tracing::warn;

use crate::types::AppState;

/// Fixed-window counter per source address.  Blunt admission control over the
/// whole surface, not a fairness mechanism.
pub struct RateLimiter {
    max_requests: u32,
    window: Duration,
    windows: Mutex<Windows>,
}

struct Windows {
    last_sweep: Instant,
    // ip => (window start, requests seen in window)
    by_ip: HashMap<IpAddr, (Instant, u32)>,
}

impl RateLimiter {
    pub fn new(max_requests: u32, window: Duration) -> Self {
        Self {
            max_requests,
            window,
            windows: Mutex::new(Windows {
                last_sweep: Instant::now(),
                by_ip: HashMap::new(),
            }),
        }
    }

    /// Counts a request from `ip`; false when the window is exhausted.
    pub fn allow(&self, ip: IpAddr) -> bool {
        let now = Instant::now();
        let mut windows = self.windows.lock().unwrap();

        // Drop addresses whose window has lapsed, at most once per window.
        if now.duration_since(windows.last_sweep) >= self.window {
            let window = self.window;
            windows
                .by_ip
                .retain(|_, (start, _)| now.duration_since(*start) < window);
            windows.last_sweep = now;
        }

        let entry = windows.by_ip.entry(ip).or_insert((now, 0));
        if now.duration_since(entry.0) >= self.window {
            *entry = (now, 0);
        }
        entry.1 += 1;
        entry.1 <= self.max_requests
    }

    #[cfg(test)]
    fn tracked_addresses(&self) -> usize {
        self.windows.lock().unwrap().by_ip.len()
    }
}

pub async fn rate_limit_middleware<B>(
    State(state): State<Arc<AppState>>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    req: Request<B>,
    next: Next<B>,
) -> Response {
    if !state.rate_limiter.allow(addr.ip()) {
        warn!(ip=%addr.ip(), "rate limit exceeded");
        return (
            StatusCode::TOO_MANY_REQUESTS,
            "Too many requests from this IP, please try again later.",
        )
            .into_response();
    }
    next.run(req).await
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ip(last: u8) -> IpAddr {
        IpAddr::from([127, 0, 0, last])
    }

    #[test]
    fn allows_up_to_the_limit_then_rejects() {
        let limiter = RateLimiter::new(3, Duration::from_secs(60));
        assert!(limiter.allow(ip(1)));
        assert!(limiter.allow(ip(1)));
        assert!(limiter.allow(ip(1)));
        assert!(!limiter.allow(ip(1)));
        assert!(!limiter.allow(ip(1)));
    }

    #[test]
    fn addresses_are_counted_independently() {
        let limiter = RateLimiter::new(1, Duration::from_secs(60));
        assert!(limiter.allow(ip(1)));
        assert!(!limiter.allow(ip(1)));
        assert!(limiter.allow(ip(2)));
    }

    #[test]
    fn window_resets_after_it_elapses() {
        let limiter = RateLimiter::new(1, Duration::from_millis(20));
        assert!(limiter.allow(ip(1)));
        assert!(!limiter.allow(ip(1)));
        std::thread::sleep(Duration::from_millis(25));
        assert!(limiter.allow(ip(1)));
    }

    #[test]
    fn idle_addresses_are_evicted_when_their_window_lapses() {
        let limiter = RateLimiter::new(5, Duration::from_millis(20));
        assert!(limiter.allow(ip(1)));
        assert!(limiter.allow(ip(2)));
        assert_eq!(limiter.tracked_addresses(), 2);

        std::thread::sleep(Duration::from_millis(25));
        assert!(limiter.allow(ip(3)));
        assert_eq!(limiter.tracked_addresses(), 1);
    }
}
