use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

use crate::event_model::PointerKind;

/// 读线程和 UI 线程共享的计数器
///
/// 全部是 `Relaxed` 原子操作，数值只用于诊断，不参与任何逻辑判断。
#[derive(Debug, Default)]
pub struct InputStatistics {
    records_decoded: AtomicU64,
    short_reads: AtomicU64,
    protocol_anomalies: AtomicU64,
    sync_dropped: AtomicU64,
    pointer_down: AtomicU64,
    pointer_move: AtomicU64,
    pointer_up: AtomicU64,
    key_events: AtomicU64,
    source_cancels: AtomicU64,
    queue_dropped_oldest: AtomicU64,
    queue_rejected: AtomicU64,
    clicks: AtomicU64,
    vertical_drags: AtomicU64,
    horizontal_swipes: AtomicU64,
    holds: AtomicU64,
    gesture_cancels: AtomicU64,
}

/// 某一时刻的计数快照
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatisticsSnapshot {
    pub records_decoded: u64,
    pub short_reads: u64,
    pub protocol_anomalies: u64,
    pub sync_dropped: u64,
    pub pointer_down: u64,
    pub pointer_move: u64,
    pub pointer_up: u64,
    pub key_events: u64,
    pub source_cancels: u64,
    pub queue_dropped_oldest: u64,
    pub queue_rejected: u64,
    pub clicks: u64,
    pub vertical_drags: u64,
    pub horizontal_swipes: u64,
    pub holds: u64,
    pub gesture_cancels: u64,
}

fn bump(counter: &AtomicU64) {
    counter.fetch_add(1, Ordering::Relaxed);
}

impl InputStatistics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_decoded(&self) {
        bump(&self.records_decoded);
    }

    pub fn short_read(&self) {
        bump(&self.short_reads);
    }

    pub fn protocol_anomaly(&self) {
        bump(&self.protocol_anomalies);
    }

    pub fn sync_dropped(&self) {
        bump(&self.sync_dropped);
    }

    pub fn pointer(&self, kind: PointerKind) {
        match kind {
            PointerKind::Down => bump(&self.pointer_down),
            PointerKind::Move => bump(&self.pointer_move),
            PointerKind::Up => bump(&self.pointer_up),
        }
    }

    pub fn key_event(&self) {
        bump(&self.key_events);
    }

    pub fn source_cancel(&self) {
        bump(&self.source_cancels);
    }

    pub fn queue_dropped_oldest(&self) {
        bump(&self.queue_dropped_oldest);
    }

    pub fn queue_rejected(&self) {
        bump(&self.queue_rejected);
    }

    pub fn click(&self) {
        bump(&self.clicks);
    }

    pub fn vertical_drag(&self) {
        bump(&self.vertical_drags);
    }

    pub fn horizontal_swipe(&self) {
        bump(&self.horizontal_swipes);
    }

    pub fn hold(&self) {
        bump(&self.holds);
    }

    pub fn gesture_cancel(&self) {
        bump(&self.gesture_cancels);
    }

    pub fn snapshot(&self) -> StatisticsSnapshot {
        let load = |counter: &AtomicU64| counter.load(Ordering::Relaxed);
        StatisticsSnapshot {
            records_decoded: load(&self.records_decoded),
            short_reads: load(&self.short_reads),
            protocol_anomalies: load(&self.protocol_anomalies),
            sync_dropped: load(&self.sync_dropped),
            pointer_down: load(&self.pointer_down),
            pointer_move: load(&self.pointer_move),
            pointer_up: load(&self.pointer_up),
            key_events: load(&self.key_events),
            source_cancels: load(&self.source_cancels),
            queue_dropped_oldest: load(&self.queue_dropped_oldest),
            queue_rejected: load(&self.queue_rejected),
            clicks: load(&self.clicks),
            vertical_drags: load(&self.vertical_drags),
            horizontal_swipes: load(&self.horizontal_swipes),
            holds: load(&self.holds),
            gesture_cancels: load(&self.gesture_cancels),
        }
    }
}

impl StatisticsSnapshot {
    pub fn queue_losses(&self) -> u64 {
        self.queue_dropped_oldest + self.queue_rejected
    }
}
