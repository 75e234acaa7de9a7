//! Time utilities for the host loop

use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

/// Get current Unix timestamp in milliseconds
pub fn unix_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::ZERO)
        .as_millis() as u64
}

/// Server start time for uptime tracking
static SERVER_START: std::sync::OnceLock<Instant> = std::sync::OnceLock::new();

/// Initialize server start time (call once at startup)
pub fn init_server_time() {
    SERVER_START.get_or_init(Instant::now);
}

/// Get server uptime in seconds
pub fn uptime_secs() -> u64 {
    SERVER_START
        .get()
        .map(|start| start.elapsed().as_secs())
        .unwrap_or(0)
}

/// Default simulation tick rate (display-refresh cadence)
pub const DEFAULT_TICK_HZ: u32 = 60;
/// Fastest room tick the scheduler is asked for
pub const MAX_TICK_HZ: u32 = 1000;
/// Default snapshot broadcast rate
pub const DEFAULT_BROADCAST_HZ: u32 = 30;
/// Longest frame the simulation will advance in one step
pub const DEFAULT_MAX_FRAME_SECS: f32 = 0.05;
/// Seconds between latency pings
pub const PING_INTERVAL_SECS: f32 = 2.0;

/// Measures wall-clock time between frames and clamps it so a stalled
/// host never advances the world by a huge step.
#[derive(Debug, Clone)]
pub struct FrameClock {
    last: Instant,
    max_dt: f32,
}

impl FrameClock {
    pub fn new(max_dt: f32) -> Self {
        Self {
            last: Instant::now(),
            max_dt,
        }
    }

    /// Seconds since the previous call, clamped to `max_dt`
    pub fn tick(&mut self) -> f32 {
        let now = Instant::now();
        let dt = now.duration_since(self.last).as_secs_f32();
        self.last = now;
        clamp_dt(dt, self.max_dt)
    }
}

/// Clamp a frame delta to `[0, max_dt]`
pub fn clamp_dt(dt: f32, max_dt: f32) -> f32 {
    if dt.is_finite() {
        dt.clamp(0.0, max_dt)
    } else {
        0.0
    }
}

/// Fixed-rate accumulator used to decouple snapshot broadcasts from the
/// simulation tick rate.
#[derive(Debug, Clone)]
pub struct RateTimer {
    elapsed: f32,
    period: f32,
}

impl RateTimer {
    pub fn from_hz(hz: u32) -> Self {
        Self::from_period(1.0 / hz.max(1) as f32)
    }

    pub fn from_period(period: f32) -> Self {
        Self {
            elapsed: 0.0,
            period,
        }
    }

    /// Advance by `dt`; returns true when a period has elapsed
    pub fn advance(&mut self, dt: f32) -> bool {
        self.elapsed += dt;
        if self.elapsed >= self.period {
            self.elapsed = 0.0;
            true
        } else {
            false
        }
    }

    pub fn reset(&mut self) {
        self.elapsed = 0.0;
    }
}
