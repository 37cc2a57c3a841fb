//! Per-client request throttling
//!
//! Every client IP gets a fixed budget of requests per minute
//! (`RATE_LIMIT` in the environment, carried on [`ServerConfig`]).
//! The bucket refills one request at a time, so a client that spends
//! its whole budget waits a single refill interval, not a full minute
//! window. Clients over budget receive 429.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use axum::Router;
use tower_governor::{governor::GovernorConfigBuilder, GovernorLayer};

/// Wrap `router` so each client may issue at most `per_minute`
/// requests per minute.
///
/// Keys on the peer IP, which requires the server to run with
/// connect-info (see `main`). A budget of zero is rejected at
/// configuration validation, so the clamp here only guards direct
/// callers.
pub fn throttle(router: Router, per_minute: u32) -> anyhow::Result<Router> {
    let per_minute = per_minute.max(1);
    let refill = Duration::from_secs(60) / per_minute;

    let limiter = GovernorConfigBuilder::default()
        .period(refill)
        .burst_size(per_minute)
        .finish()
        .with_context(|| {
            format!("rate limiter rejected {per_minute} requests/minute (refill {refill:?})")
        })?;

    Ok(router.layer(GovernorLayer {
        config: Arc::new(limiter),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_throttle_wraps_router() {
        assert!(throttle(Router::new(), 60).is_ok());
    }

    #[test]
    fn test_zero_budget_clamps_instead_of_failing() {
        assert!(throttle(Router::new(), 0).is_ok());
    }
}
