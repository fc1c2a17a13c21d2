//! Request budget for the chat API

use std::num::NonZeroU32;
use std::sync::Arc;

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};
use governor::{
    Quota, RateLimiter,
    clock::{Clock, DefaultClock},
    state::{InMemoryState, NotKeyed},
};

use super::ChatState;
use super::chat::ChatError;

/// Shared per-minute budget across all chat API clients
#[derive(Clone)]
pub struct ChatThrottle {
    limiter: Arc<RateLimiter<NotKeyed, InMemoryState, DefaultClock>>,
    clock: DefaultClock,
}

impl ChatThrottle {
    /// Allow `requests_per_minute` requests, all of which may arrive at once
    ///
    /// Zero is treated as one so a misconfigured budget never locks the API.
    #[must_use]
    pub fn per_minute(requests_per_minute: u32) -> Self {
        let burst = NonZeroU32::new(requests_per_minute).unwrap_or(NonZeroU32::MIN);
        Self {
            limiter: Arc::new(RateLimiter::direct(Quota::per_minute(burst))),
            clock: DefaultClock::default(),
        }
    }

    /// Spend one request; `Err` carries whole seconds until the next slot
    pub fn admit(&self) -> Result<(), u64> {
        self.limiter.check().map_err(|not_until| {
            let wait = not_until.wait_time_from(self.clock.now());
            wait.as_secs() + u64::from(wait.subsec_nanos() > 0)
        })
    }
}

/// Reject chat API requests once the budget is spent
pub async fn throttle_chat_api(
    State(state): State<Arc<ChatState>>,
    req: Request,
    next: Next,
) -> Response {
    if let Some(throttle) = &state.throttle {
        if let Err(retry_after) = throttle.admit() {
            tracing::warn!(path = %req.uri().path(), retry_after, "chat API budget spent");
            return ChatError::Throttled(retry_after).into_response();
        }
    }
    next.run(req).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_burst_then_wait() {
        let throttle = ChatThrottle::per_minute(2);
        assert!(throttle.admit().is_ok());
        assert!(throttle.admit().is_ok());

        let wait = throttle.admit().unwrap_err();
        assert!((1..=30).contains(&wait), "waited {wait}s");
    }

    #[test]
    fn test_zero_budget_admits_one() {
        let throttle = ChatThrottle::per_minute(0);
        assert!(throttle.admit().is_ok());
        assert!(throttle.admit().unwrap_err() <= 60);
    }

    #[test]
    fn test_clones_share_budget() {
        let throttle = ChatThrottle::per_minute(1);
        let other = throttle.clone();
        assert!(throttle.admit().is_ok());
        assert!(other.admit().is_err());
    }
}
