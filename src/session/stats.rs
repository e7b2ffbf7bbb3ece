use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

/// Counters shared between the session task and its observers
#[derive(Debug, Default)]
pub struct SessionStats {
    connect_attempts: AtomicU64,
    connections: AtomicU64,
    disconnects: AtomicU64,
    errors: AtomicU64,
    frames_decoded: AtomicU64,
    frames_dropped: AtomicU64,
    alarms_emitted: AtomicU64,
}

/// Point-in-time copy of [`SessionStats`]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SessionStatsSnapshot {
    pub connect_attempts: u64,
    pub connections: u64,
    pub disconnects: u64,
    pub errors: u64,
    pub frames_decoded: u64,
    pub frames_dropped: u64,
    pub alarms_emitted: u64,
}

impl SessionStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_connect_attempt(&self) {
        self.connect_attempts.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_connection(&self) {
        self.connections.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_disconnect(&self) {
        self.disconnects.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_error(&self) {
        self.errors.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_frame_decoded(&self) {
        self.frames_decoded.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_frames_dropped(&self, count: u64) {
        self.frames_dropped.fetch_add(count, Ordering::Relaxed);
    }

    pub(crate) fn record_alarms_emitted(&self, count: u64) {
        self.alarms_emitted.fetch_add(count, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> SessionStatsSnapshot {
        SessionStatsSnapshot {
            connect_attempts: self.connect_attempts.load(Ordering::Relaxed),
            connections: self.connections.load(Ordering::Relaxed),
            disconnects: self.disconnects.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
            frames_decoded: self.frames_decoded.load(Ordering::Relaxed),
            frames_dropped: self.frames_dropped.load(Ordering::Relaxed),
            alarms_emitted: self.alarms_emitted.load(Ordering::Relaxed),
        }
    }
}
