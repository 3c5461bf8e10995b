//! 输入源
//!
//! 三种后端实现同一个 [`InputSource`]，输出同样的归一化事件，手势状态机不关心事件来自哪里。

/// 读取 `/dev/input/event*` 的硬件后端
pub mod backend_evdev;
/// 按脚本生成事件的模拟后端，没有硬件时使用
pub mod backend_mock;
/// 读取 wayland 混成器原生输入事件的后端
pub mod backend_wayland;

use std::{
    io,
    path::PathBuf,
    sync::{
        Arc,
        atomic::{AtomicU8, Ordering},
    },
};

use num_enum::{IntoPrimitive, TryFromPrimitive};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

pub use backend_evdev::{DeviceConfig, DeviceProfile, DeviceSource};
pub use backend_mock::{ScriptStep, ScriptedSource, TracePoint};
pub use backend_wayland::{HostEvent, NativeTranslator, WaylandSource};

use crate::{
    event_model::MonotonicClock, event_router::EventSink, statistics::InputStatistics,
    touch_driver::AxisError,
};

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("failed to open {}: {source}", path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("{} does not report touch axes", path.display())]
    NotTouchDevice { path: PathBuf },
    #[error("failed to scan {}: {source}", dir.display())]
    Scan {
        dir: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("no touch device found under {}", dir.display())]
    NoDeviceFound { dir: PathBuf },
    #[error(transparent)]
    Axis(#[from] AxisError),
    #[error("failed to connect to wayland display: {0}")]
    WaylandConnect(#[from] wayland_client::ConnectError),
    #[error("wayland dispatch failed: {0}")]
    WaylandDispatch(#[from] wayland_client::DispatchError),
    #[error("compositor advertises no wl_seat")]
    NoSeat,
    #[error("mock script is empty")]
    EmptyScript,
    #[error("source is not initialized")]
    NotInitialized,
    #[error("failed to spawn reader thread: {0}")]
    Spawn(#[source] io::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SourceKind {
    Device,
    Wayland,
    Scripted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, TryFromPrimitive, IntoPrimitive)]
#[repr(u8)]
pub enum SourceStatus {
    Uninitialized,
    Ready,
    Running,
    /// 调用方主动停止
    Stopped,
    /// 设备被拔出
    Disconnected,
    /// 读设备出现不可恢复的错误(比如权限被收回)
    Failed,
}

impl SourceStatus {
    pub fn is_stopped(self) -> bool {
        matches!(self, Self::Stopped | Self::Disconnected | Self::Failed)
    }
}

/// 读线程和 UI 线程共享的状态
#[derive(Debug, Clone)]
pub struct SharedStatus(Arc<AtomicU8>);

impl SharedStatus {
    pub fn new(status: SourceStatus) -> Self {
        Self(Arc::new(AtomicU8::new(status.into())))
    }

    pub fn get(&self) -> SourceStatus {
        SourceStatus::try_from(self.0.load(Ordering::Acquire)).unwrap_or(SourceStatus::Failed)
    }

    pub fn set(&self, status: SourceStatus) {
        self.0.store(status.into(), Ordering::Release);
    }
}

/// 原始坐标范围，只用于诊断
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TouchRange {
    pub x: (i32, i32),
    pub y: (i32, i32),
}

/// 输入源的能力描述，只用于日志，手势逻辑不读它
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Capabilities {
    pub name: String,
    pub has_touch: bool,
    pub has_mouse: bool,
    pub has_keyboard: bool,
    pub multitouch: bool,
    pub max_contacts: u8,
    pub touch_range: Option<TouchRange>,
}

pub trait InputSource {
    fn kind(&self) -> SourceKind;

    /// 打开并探测后端；失败时不保留任何中间状态，调用方可以换一个后端重试
    fn initialize(&mut self) -> Result<(), SourceError>;

    /// 开始产出事件
    fn start(&mut self, sink: EventSink) -> Result<(), SourceError>;

    /// 没有独立线程的后端在这里把事件推进队列，由 UI 线程每轮调用一次
    fn poll(&mut self, _now_ms: u64) {}

    /// 幂等；返回后不会再有事件进入队列
    fn stop(&mut self);

    fn capabilities(&self) -> Capabilities;

    fn status(&self) -> SourceStatus;

    fn cleanup(&mut self);
}

/// 各后端的带标签联合
pub enum AnySource {
    Device(DeviceSource),
    Wayland(WaylandSource),
    Scripted(ScriptedSource),
}

macro_rules! delegate {
    ($self:ident, $source:ident => $body:expr) => {
        match $self {
            AnySource::Device($source) => $body,
            AnySource::Wayland($source) => $body,
            AnySource::Scripted($source) => $body,
        }
    };
}

impl InputSource for AnySource {
    fn kind(&self) -> SourceKind {
        delegate!(self, source => source.kind())
    }

    fn initialize(&mut self) -> Result<(), SourceError> {
        delegate!(self, source => source.initialize())
    }

    fn start(&mut self, sink: EventSink) -> Result<(), SourceError> {
        delegate!(self, source => source.start(sink))
    }

    fn poll(&mut self, now_ms: u64) {
        delegate!(self, source => source.poll(now_ms))
    }

    fn stop(&mut self) {
        delegate!(self, source => source.stop())
    }

    fn capabilities(&self) -> Capabilities {
        delegate!(self, source => source.capabilities())
    }

    fn status(&self) -> SourceStatus {
        delegate!(self, source => source.status())
    }

    fn cleanup(&mut self) {
        delegate!(self, source => source.cleanup())
    }
}

impl From<DeviceSource> for AnySource {
    fn from(source: DeviceSource) -> Self {
        Self::Device(source)
    }
}

impl From<WaylandSource> for AnySource {
    fn from(source: WaylandSource) -> Self {
        Self::Wayland(source)
    }
}

impl From<ScriptedSource> for AnySource {
    fn from(source: ScriptedSource) -> Self {
        Self::Scripted(source)
    }
}

/// 配置里选择的输入源
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum SourceSelection {
    /// 依次尝试 evdev、wayland、mock
    #[default]
    Auto,
    Device,
    Wayland,
    Mock,
}

/// 创建并初始化输入源
///
/// `Auto` 时按 evdev → wayland → mock 的顺序尝试，返回第一个初始化成功的后端。
pub fn open_source(
    selection: SourceSelection,
    device: &DeviceConfig,
    script: &[ScriptStep],
    loop_script: bool,
    clock: MonotonicClock,
    stats: Arc<InputStatistics>,
) -> Result<AnySource, SourceError> {
    let candidates: &[SourceSelection] = match selection {
        SourceSelection::Auto => &[
            SourceSelection::Device,
            SourceSelection::Wayland,
            SourceSelection::Mock,
        ],
        SourceSelection::Device => &[SourceSelection::Device],
        SourceSelection::Wayland => &[SourceSelection::Wayland],
        SourceSelection::Mock => &[SourceSelection::Mock],
    };

    let mut last_error = SourceError::NotInitialized;
    for candidate in candidates {
        let mut source: AnySource = match candidate {
            SourceSelection::Device => {
                DeviceSource::new(device.clone(), clock, stats.clone()).into()
            }
            SourceSelection::Wayland => WaylandSource::new(clock).into(),
            SourceSelection::Mock | SourceSelection::Auto => {
                ScriptedSource::new(script.to_vec(), loop_script).into()
            }
        };
        match source.initialize() {
            Ok(()) => {
                info!(kind = ?source.kind(), capabilities = ?source.capabilities(), "input source ready");
                return Ok(source);
            }
            Err(err) => {
                warn!(?candidate, %err, "input source unavailable");
                last_error = err;
            }
        }
    }
    Err(last_error)
}
