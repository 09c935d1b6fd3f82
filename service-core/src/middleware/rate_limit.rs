use axum::{
    extract::{ConnectInfo, Request, State},
    middleware::Next,
    response::Response,
};
use governor::{
    Quota, RateLimiter,
    clock::{Clock, DefaultClock},
    state::keyed::DashMapStateStore,
};
use crate::error::AppError;
use std::{
    collections::HashSet,
    net::{IpAddr, SocketAddr},
    num::NonZeroU32,
    sync::Arc,
    time::Duration,
};

type KeyedLimiter = RateLimiter<IpAddr, DashMapStateStore<IpAddr>, DefaultClock>;

/// Rate limiter keyed by client IP address.
///
/// The key is the socket peer. `x-forwarded-for` is only read when the peer
/// is one of the configured trusted proxies.
#[derive(Clone)]
pub struct IpRateLimiter {
    limiter: Arc<KeyedLimiter>,
    trusted_proxies: Arc<HashSet<IpAddr>>,
}

impl IpRateLimiter {
    pub fn with_trusted_proxies(mut self, proxies: impl IntoIterator<Item = IpAddr>) -> Self {
        self.trusted_proxies = Arc::new(proxies.into_iter().collect());
        self
    }

    /// Resolve the caller's IP.
    ///
    /// Behind trusted proxies this is the right-most `x-forwarded-for` hop that
    /// is not itself a trusted proxy. Hops to its left are client-controlled.
    pub fn client_ip(&self, request: &Request) -> Option<IpAddr> {
        let peer = request
            .extensions()
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.ip())?;

        if !self.trusted_proxies.contains(&peer) {
            return Some(peer);
        }

        let forwarded = request
            .headers()
            .get_all("x-forwarded-for")
            .iter()
            .filter_map(|v| v.to_str().ok())
            .flat_map(|s| s.split(','))
            .filter_map(|hop| hop.trim().parse::<IpAddr>().ok())
            .collect::<Vec<_>>();

        Some(
            forwarded
                .into_iter()
                .rev()
                .find(|hop| !self.trusted_proxies.contains(hop))
                .unwrap_or(peer),
        )
    }
}

/// Create a keyed rate limiter allowing `attempts` requests per `window_seconds` per IP.
pub fn create_ip_rate_limiter(attempts: u32, window_seconds: u64) -> IpRateLimiter {
    let attempts = NonZeroU32::new(attempts.max(1)).unwrap_or(NonZeroU32::MIN);
    let period_ms = (window_seconds.max(1) * 1000) / u64::from(attempts.get());
    let quota = Quota::with_period(Duration::from_millis(period_ms.max(1)))
        .unwrap_or_else(|| Quota::per_second(attempts))
        .allow_burst(attempts);

    IpRateLimiter {
        limiter: Arc::new(RateLimiter::dashmap(quota)),
        trusted_proxies: Arc::new(HashSet::new()),
    }
}

/// Middleware for IP-based rate limiting
pub async fn ip_rate_limit_middleware(
    State(limiter): State<IpRateLimiter>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let Some(ip) = limiter.client_ip(&request) else {
        tracing::warn!("Could not determine IP for rate limiting");
        return Ok(next.run(request).await);
    };

    match limiter.limiter.check_key(&ip) {
        Ok(_) => Ok(next.run(request).await),
        Err(negative) => {
            let wait_time = negative.wait_time_from(DefaultClock::default().now());
            tracing::warn!(client_ip = %ip, "Rate limit exceeded");
            Err(AppError::TooManyRequests(
                "Too many requests from this IP. Please try again later.".to_string(),
                Some(wait_time.as_secs().max(1)),
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        Router,
        body::Body,
        http::{Request as HttpRequest, StatusCode},
        middleware::from_fn_with_state,
        routing::get,
    };
    use tower::util::ServiceExt;

    const PROXY: &str = "10.0.0.1";

    fn app(limiter: IpRateLimiter) -> Router {
        Router::new()
            .route("/", get(|| async { "ok" }))
            .layer(from_fn_with_state(limiter, ip_rate_limit_middleware))
    }

    fn request(peer: &str, forwarded_for: Option<&str>) -> HttpRequest<Body> {
        let mut builder = HttpRequest::builder().uri("/");
        if let Some(xff) = forwarded_for {
            builder = builder.header("x-forwarded-for", xff);
        }
        let mut request = builder.body(Body::empty()).unwrap();
        let addr: SocketAddr = format!("{}:40000", peer).parse().unwrap();
        request.extensions_mut().insert(ConnectInfo(addr));
        request
    }

    #[tokio::test]
    async fn test_blocks_after_burst() {
        let app = app(create_ip_rate_limiter(2, 60));

        for _ in 0..2 {
            let res = app.clone().oneshot(request("203.0.113.5", None)).await.unwrap();
            assert_eq!(res.status(), StatusCode::OK);
        }

        let res = app.clone().oneshot(request("203.0.113.5", None)).await.unwrap();
        assert_eq!(res.status(), StatusCode::TOO_MANY_REQUESTS);
        assert!(res.headers().contains_key(axum::http::header::RETRY_AFTER));

        // Another client has its own bucket
        let res = app.oneshot(request("203.0.113.6", None)).await.unwrap();
        assert_eq!(res.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_forwarded_for_ignored_from_untrusted_peer() {
        let app = app(create_ip_rate_limiter(1, 60));

        let res = app
            .clone()
            .oneshot(request("203.0.113.5", Some("198.51.100.1")))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);

        // Rotating the header does not buy a fresh bucket
        let res = app
            .oneshot(request("203.0.113.5", Some("198.51.100.2")))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::TOO_MANY_REQUESTS);
    }

    #[tokio::test]
    async fn test_trusted_proxy_uses_rightmost_untrusted_hop() {
        let limiter = create_ip_rate_limiter(1, 60)
            .with_trusted_proxies([PROXY.parse::<IpAddr>().unwrap()]);

        let first = request(PROXY, Some("198.51.100.1, 203.0.113.9"));
        assert_eq!(
            limiter.client_ip(&first),
            Some("203.0.113.9".parse::<IpAddr>().unwrap())
        );

        let app = app(limiter);
        let res = app
            .clone()
            .oneshot(request(PROXY, Some("198.51.100.1, 203.0.113.9")))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);

        // A spoofed left-most hop still lands in the same bucket
        let res = app
            .clone()
            .oneshot(request(PROXY, Some("198.51.100.2, 203.0.113.9")))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::TOO_MANY_REQUESTS);

        // A different client behind the same proxy is separate
        let res = app
            .oneshot(request(PROXY, Some("203.0.113.10")))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_unknown_ip_passes_through() {
        let app = app(create_ip_rate_limiter(1, 60));
        for _ in 0..3 {
            let res = app
                .clone()
                .oneshot(
                    HttpRequest::builder()
                        .uri("/")
                        .header("x-forwarded-for", "198.51.100.1")
                        .body(Body::empty())
                        .unwrap(),
                )
                .await
                .unwrap();
            assert_eq!(res.status(), StatusCode::OK);
        }
    }
}
