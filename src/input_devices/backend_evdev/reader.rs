use std::{
    io::{ErrorKind, Read},
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    time::Duration,
};

use tracing::{debug, warn};

use super::device::TouchDevice;
use crate::{
    event_model::{MonotonicClock, NormalizedPointerEvent},
    event_router::EventSink,
    input_devices::{SharedStatus, SourceStatus},
    statistics::InputStatistics,
    touch_driver::{MAX_SLOTS, RECORD_SIZE, Records, SlotTracker},
};

/// 一次 read 最多读取的记录数
const READ_BATCH: usize = 64;

/// 读线程独占的全部状态
pub(super) struct Reader {
    pub device: TouchDevice,
    pub tracker: SlotTracker,
    pub sink: EventSink,
    pub clock: MonotonicClock,
    pub stop: Arc<AtomicBool>,
    pub status: SharedStatus,
    pub stats: Arc<InputStatistics>,
    pub poll_interval: Duration,
}

impl Reader {
    /// 读循环；设备拔出或读失败时退出，已占用的 slot 不做释放
    pub fn run(mut self) {
        let mut buf = [0u8; RECORD_SIZE * READ_BATCH];
        let mut batch: Vec<NormalizedPointerEvent> = Vec::with_capacity(MAX_SLOTS * 2);

        while !self.stop.load(Ordering::Acquire) {
            match self.device.read(&mut buf) {
                Ok(0) => {
                    warn!("touch device reached end of stream");
                    self.status.set(SourceStatus::Disconnected);
                    return;
                }
                Ok(len) => {
                    let now_ms = self.clock.now_ms();
                    let mut records = Records::new(&buf[..len]);
                    for record in records.by_ref() {
                        self.tracker.feed(&record, now_ms, &mut batch);
                    }
                    if records.trailing_bytes() > 0 {
                        debug!(bytes = records.trailing_bytes(), "short read");
                        self.stats.short_read();
                    }
                    if !batch.is_empty() {
                        self.sink.push_all(batch.drain(..));
                    }
                }
                Err(err) if err.kind() == ErrorKind::WouldBlock => {
                    std::thread::sleep(self.poll_interval);
                }
                Err(err) if err.kind() == ErrorKind::Interrupted => {}
                Err(err) if err.raw_os_error() == Some(libc::ENODEV) => {
                    warn!("touch device disconnected");
                    self.status.set(SourceStatus::Disconnected);
                    return;
                }
                Err(err) => {
                    warn!(%err, "touch device read failed");
                    self.status.set(SourceStatus::Failed);
                    return;
                }
            }
        }
        self.status.set(SourceStatus::Stopped);
    }
}
