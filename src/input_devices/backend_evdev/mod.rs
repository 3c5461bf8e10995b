//! # evdev 硬件后端
//!
//! 直接读取内核设备节点，每个实例最多一个读线程。
//! 设备能力通过 libevdev (`evdev-rs`) 探测，事件记录自己解码，避免在读线程里再做一次拷贝。

mod device;
mod discovery;
mod reader;

use std::{
    path::PathBuf,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    thread::JoinHandle,
    time::Duration,
};

use serde::Deserialize;
use tracing::{info, warn};

pub use device::{DeviceProfile, TouchDevice, probe};
pub use discovery::{discover, event_nodes};

use super::{Capabilities, InputSource, SharedStatus, SourceError, SourceKind, SourceStatus};
use crate::{
    event_model::MonotonicClock, event_router::EventSink, statistics::InputStatistics,
    touch_driver::SlotTracker,
};

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct DeviceConfig {
    /// 指定设备节点；为空时扫描 `discovery_dir`
    pub path: Option<PathBuf>,
    pub discovery_dir: PathBuf,
    /// `EAGAIN` 后的休眠时间
    pub poll_interval_ms: u64,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            path: None,
            discovery_dir: PathBuf::from("/dev/input"),
            poll_interval_ms: 4,
        }
    }
}

struct Worker {
    stop: Arc<AtomicBool>,
    handle: JoinHandle<()>,
}

pub struct DeviceSource {
    config: DeviceConfig,
    clock: MonotonicClock,
    stats: Arc<InputStatistics>,
    profile: Option<DeviceProfile>,
    status: SharedStatus,
    worker: Option<Worker>,
}

impl DeviceSource {
    pub fn new(config: DeviceConfig, clock: MonotonicClock, stats: Arc<InputStatistics>) -> Self {
        Self {
            config,
            clock,
            stats,
            profile: None,
            status: SharedStatus::new(SourceStatus::Uninitialized),
            worker: None,
        }
    }

    pub fn profile(&self) -> Option<&DeviceProfile> {
        self.profile.as_ref()
    }
}

impl InputSource for DeviceSource {
    fn kind(&self) -> SourceKind {
        SourceKind::Device
    }

    fn initialize(&mut self) -> Result<(), SourceError> {
        self.stop();
        self.profile = None;
        self.status.set(SourceStatus::Uninitialized);

        let profile = match &self.config.path {
            Some(path) => probe(path)?,
            None => discover(&self.config.discovery_dir)?,
        };
        info!(
            path = %profile.path.display(),
            name = %profile.name,
            mode = ?profile.mode,
            max_contacts = profile.max_contacts,
            "touch device probed"
        );
        self.profile = Some(profile);
        self.status.set(SourceStatus::Ready);
        Ok(())
    }

    fn start(&mut self, sink: EventSink) -> Result<(), SourceError> {
        let profile = self.profile.as_ref().ok_or(SourceError::NotInitialized)?;
        if self.worker.is_some() {
            return Ok(());
        }

        let device = TouchDevice::open(&profile.path).map_err(|source| SourceError::Open {
            path: profile.path.clone(),
            source,
        })?;
        let stop = Arc::new(AtomicBool::new(false));
        let reader = reader::Reader {
            device,
            tracker: SlotTracker::new(profile.mode, profile.geometry, self.stats.clone()),
            sink,
            clock: self.clock,
            stop: stop.clone(),
            status: self.status.clone(),
            stats: self.stats.clone(),
            poll_interval: Duration::from_millis(self.config.poll_interval_ms.max(1)),
        };

        // 先标记为运行中，读线程可能马上就发现设备已经拔掉
        self.status.set(SourceStatus::Running);
        let handle = std::thread::Builder::new()
            .name("touchd-evdev".into())
            .spawn(move || reader.run())
            .map_err(|err| {
                self.status.set(SourceStatus::Ready);
                SourceError::Spawn(err)
            })?;
        self.worker = Some(Worker { stop, handle });
        Ok(())
    }

    fn stop(&mut self) {
        let Some(worker) = self.worker.take() else {
            return;
        };
        worker.stop.store(true, Ordering::Release);
        if worker.handle.join().is_err() {
            warn!("evdev reader thread panicked");
            self.status.set(SourceStatus::Failed);
        }
        // 读线程自己退出时已经写好了原因，这里只处理仍在运行的情况
        if !self.status.get().is_stopped() {
            self.status.set(SourceStatus::Stopped);
        }
    }

    fn capabilities(&self) -> Capabilities {
        self.profile
            .as_ref()
            .map(DeviceProfile::capabilities)
            .unwrap_or_default()
    }

    fn status(&self) -> SourceStatus {
        self.status.get()
    }

    fn cleanup(&mut self) {
        self.stop();
        self.profile = None;
        self.status.set(SourceStatus::Uninitialized);
    }
}

impl Drop for DeviceSource {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;
    use crate::{
        event_model::{InputEvent, PointerKind},
        event_router::{EventQueue, OverflowPolicy},
        touch_driver::{
            AbsCode, AxisRange, DeviceGeometry, TrackingMode,
            record::tests::{abs, syn},
        },
    };

    fn recorded_stream() -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        let records = [
            abs(AbsCode::MtSlot, 0),
            abs(AbsCode::MtTrackingId, 5),
            abs(AbsCode::MtPositionX, 100),
            abs(AbsCode::MtPositionY, 100),
            abs(AbsCode::MtSlot, 1),
            abs(AbsCode::MtTrackingId, 7),
            abs(AbsCode::MtPositionX, 900),
            abs(AbsCode::MtPositionY, 900),
            syn(),
            abs(AbsCode::MtSlot, 0),
            abs(AbsCode::MtTrackingId, -1),
            abs(AbsCode::MtSlot, 1),
            abs(AbsCode::MtTrackingId, -1),
            syn(),
        ];
        for record in records {
            file.write_all(&record.encode()).unwrap();
        }
        // 结尾半条记录
        file.write_all(&[0u8; 3]).unwrap();
        file.flush().unwrap();
        file
    }

    fn source_for(path: PathBuf, stats: Arc<InputStatistics>) -> DeviceSource {
        let mut source = DeviceSource::new(DeviceConfig::default(), MonotonicClock::start(), stats);
        source.profile = Some(DeviceProfile {
            path,
            name: "recorded".into(),
            mode: TrackingMode::MultiTouch,
            geometry: DeviceGeometry {
                x: AxisRange::new("x", 0, 1000).unwrap(),
                y: AxisRange::new("y", 0, 1000).unwrap(),
                pressure: None,
            },
            max_contacts: 10,
            has_mouse: false,
            has_keyboard: false,
        });
        source.status.set(SourceStatus::Ready);
        source
    }

    fn wait_until_stopped(source: &DeviceSource) {
        for _ in 0..200 {
            if source.status().is_stopped() {
                return;
            }
            std::thread::sleep(Duration::from_millis(5));
        }
        panic!("reader did not stop");
    }

    #[test]
    fn reader_thread_delivers_recorded_stream_then_reports_disconnect() {
        let stream = recorded_stream();
        let stats = Arc::new(InputStatistics::new());
        let mut queue = EventQueue::new(64, OverflowPolicy::RejectNewest, stats.clone());
        let mut source = source_for(stream.path().to_path_buf(), stats.clone());

        source.start(queue.sink()).unwrap();
        wait_until_stopped(&source);
        assert_eq!(source.status(), SourceStatus::Disconnected);

        let events: Vec<_> = queue
            .drain()
            .map(|event| match event {
                InputEvent::Pointer(pointer) => (pointer.kind, pointer.finger_id),
                other => panic!("unexpected {other:?}"),
            })
            .collect();
        assert_eq!(
            events,
            vec![
                (PointerKind::Down, 0),
                (PointerKind::Down, 1),
                (PointerKind::Up, 0),
                (PointerKind::Up, 1),
            ]
        );
        assert_eq!(stats.snapshot().short_reads, 1);

        source.stop();
        source.stop();
        assert_eq!(source.status(), SourceStatus::Disconnected);
    }

    #[test]
    fn stop_is_idempotent_and_joins_reader() {
        let stats = Arc::new(InputStatistics::new());
        let queue = EventQueue::new(8, OverflowPolicy::DropOldest, stats.clone());
        let mut source = source_for(PathBuf::from("/dev/null"), stats);
        source.stop();
        assert_eq!(source.status(), SourceStatus::Ready);

        source.start(queue.sink()).unwrap();
        source.stop();
        let after_first = source.status();
        assert!(after_first.is_stopped());
        source.stop();
        assert_eq!(source.status(), after_first);
        assert!(source.worker.is_none());
    }

    #[test]
    fn start_before_initialize_fails() {
        let stats = Arc::new(InputStatistics::new());
        let queue = EventQueue::new(8, OverflowPolicy::DropOldest, stats.clone());
        let mut source = DeviceSource::new(DeviceConfig::default(), MonotonicClock::start(), stats);
        assert!(matches!(
            source.start(queue.sink()),
            Err(SourceError::NotInitialized)
        ));
    }

    #[test]
    fn failed_initialize_keeps_no_profile() {
        let dir = tempfile::tempdir().unwrap();
        let stats = Arc::new(InputStatistics::new());
        let mut source = source_for(PathBuf::from("/dev/null"), stats);
        source.config.path = Some(dir.path().join("event7"));

        assert!(source.initialize().is_err());
        assert!(source.profile().is_none());
        assert_eq!(source.status(), SourceStatus::Uninitialized);
        assert_eq!(source.capabilities(), Capabilities::default());
    }
}
