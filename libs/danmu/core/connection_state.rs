//! Lock-free connection state and counters shared between the session,
//! the supervisor and the client handle.

use std::sync::atomic::{AtomicU32, AtomicU64, AtomicU8, Ordering};

/// Where the client currently is in its lifecycle
///
/// `Connecting` through `Closing` are written by the session,
/// `Disconnected` and `Stopped` by the supervisor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ConnectionState {
    Disconnected = 0,
    Connecting = 1,
    Authenticating = 2,
    Active = 3,
    Closing = 4,
    Stopped = 5,
}

impl ConnectionState {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => ConnectionState::Connecting,
            2 => ConnectionState::Authenticating,
            3 => ConnectionState::Active,
            4 => ConnectionState::Closing,
            5 => ConnectionState::Stopped,
            _ => ConnectionState::Disconnected,
        }
    }
}

#[derive(Debug)]
pub struct AtomicConnectionState {
    inner: AtomicU8,
}

impl AtomicConnectionState {
    pub fn new(state: ConnectionState) -> Self {
        Self {
            inner: AtomicU8::new(state as u8),
        }
    }

    #[inline]
    pub fn get(&self) -> ConnectionState {
        ConnectionState::from_u8(self.inner.load(Ordering::Acquire))
    }

    #[inline]
    pub fn set(&self, state: ConnectionState) {
        self.inner.store(state as u8, Ordering::Release);
    }

    #[inline]
    pub fn is_active(&self) -> bool {
        self.get() == ConnectionState::Active
    }
}

impl Default for AtomicConnectionState {
    fn default() -> Self {
        Self::new(ConnectionState::Disconnected)
    }
}

/// Running counters, updated with relaxed atomics
#[derive(Debug, Default)]
pub struct AtomicMetrics {
    frames_received: AtomicU64,
    frames_sent: AtomicU64,
    events_dispatched: AtomicU64,
    frames_skipped: AtomicU64,
    reconnect_count: AtomicU64,
    last_popularity: AtomicU32,
}

impl AtomicMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn increment_received(&self) {
        self.frames_received.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn increment_sent(&self) {
        self.frames_sent.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn increment_dispatched(&self) {
        self.events_dispatched.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn increment_skipped(&self) {
        self.frames_skipped.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn increment_reconnects(&self) {
        self.reconnect_count.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn set_popularity(&self, value: u32) {
        self.last_popularity.store(value, Ordering::Relaxed);
    }

    pub fn frames_received(&self) -> u64 {
        self.frames_received.load(Ordering::Relaxed)
    }

    pub fn frames_sent(&self) -> u64 {
        self.frames_sent.load(Ordering::Relaxed)
    }

    pub fn events_dispatched(&self) -> u64 {
        self.events_dispatched.load(Ordering::Relaxed)
    }

    pub fn frames_skipped(&self) -> u64 {
        self.frames_skipped.load(Ordering::Relaxed)
    }

    pub fn reconnect_count(&self) -> u64 {
        self.reconnect_count.load(Ordering::Relaxed)
    }

    pub fn last_popularity(&self) -> u32 {
        self.last_popularity.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_roundtrip() {
        let state = AtomicConnectionState::default();
        assert_eq!(state.get(), ConnectionState::Disconnected);

        for s in [
            ConnectionState::Connecting,
            ConnectionState::Authenticating,
            ConnectionState::Active,
            ConnectionState::Closing,
            ConnectionState::Stopped,
        ] {
            state.set(s);
            assert_eq!(state.get(), s);
        }
        assert_eq!(state.get(), ConnectionState::Stopped);
        assert!(!state.is_active());
    }

    #[test]
    fn test_metrics_counters() {
        let metrics = AtomicMetrics::new();
        metrics.increment_received();
        metrics.increment_received();
        metrics.increment_sent();
        metrics.increment_skipped();
        metrics.set_popularity(77);

        assert_eq!(metrics.frames_received(), 2);
        assert_eq!(metrics.frames_sent(), 1);
        assert_eq!(metrics.frames_skipped(), 1);
        assert_eq!(metrics.events_dispatched(), 0);
        assert_eq!(metrics.last_popularity(), 77);
    }
}
