//! Rate limiting utilities

use governor::{
    clock::DefaultClock,
    state::{InMemoryState, NotKeyed},
    Quota, RateLimiter,
};
use std::num::NonZeroU32;
use std::sync::Arc;

/// Rate limiter type alias
pub type Limiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// Create a rate limiter with the specified requests per second
pub fn create_limiter(requests_per_second: u32) -> Arc<Limiter> {
    let quota = Quota::per_second(NonZeroU32::new(requests_per_second).unwrap_or(NonZeroU32::MIN));
    Arc::new(RateLimiter::direct(quota))
}

/// Max inbound messages per second per peer. Clients send one `inputs`
/// message per rendered frame, so this leaves headroom above 60Hz.
pub const PEER_MESSAGE_RATE_LIMIT: u32 = 120;

/// Per-peer rate limiter state
#[derive(Clone)]
pub struct PeerRateLimiter {
    message_limiter: Arc<Limiter>,
}

impl PeerRateLimiter {
    pub fn new() -> Self {
        Self::with_rate(PEER_MESSAGE_RATE_LIMIT)
    }

    pub fn with_rate(per_second: u32) -> Self {
        Self {
            message_limiter: create_limiter(per_second),
        }
    }

    /// Check if an inbound message is allowed (returns true if allowed)
    pub fn check_message(&self) -> bool {
        self.message_limiter.check().is_ok()
    }
}

impl Default for PeerRateLimiter {
    fn default() -> Self {
        Self::new()
    }
}
