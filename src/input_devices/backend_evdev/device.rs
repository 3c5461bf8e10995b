use std::{
    fs::{File, OpenOptions},
    io::{self, Read},
    os::unix::fs::OpenOptionsExt,
    path::{Path, PathBuf},
};

use evdev_rs::{
    Device, DeviceWrapper,
    enums::{EV_ABS, EV_KEY, EV_REL, EventCode},
};
use serde::Serialize;

use crate::{
    input_devices::{Capabilities, SourceError, TouchRange},
    touch_driver::{AxisRange, DeviceGeometry, MAX_SLOTS, TrackingMode},
};

#[derive(Debug)]
/// 设备节点的简单包装，非阻塞读
pub struct TouchDevice(File);

/// 和 `File` 一样，通过 `as_fd()` 暴露内部文件描述符
impl std::os::unix::io::AsFd for TouchDevice {
    fn as_fd(&self) -> std::os::unix::io::BorrowedFd<'_> {
        self.0.as_fd()
    }
}

impl TouchDevice {
    pub fn open(path: &Path) -> io::Result<Self> {
        let mut options = OpenOptions::new();
        options.read(true);
        options.custom_flags(libc::O_NONBLOCK | libc::O_CLOEXEC);
        Ok(TouchDevice(options.open(path)?))
    }
}

impl Read for TouchDevice {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.0.read(buf)
    }
}

/// 探测结果：设备打开时查询一次，之后不再变化
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeviceProfile {
    pub path: PathBuf,
    pub name: String,
    #[serde(skip)]
    pub mode: TrackingMode,
    pub geometry: DeviceGeometry,
    pub max_contacts: u8,
    pub has_mouse: bool,
    pub has_keyboard: bool,
}

impl DeviceProfile {
    pub fn capabilities(&self) -> Capabilities {
        Capabilities {
            name: self.name.clone(),
            has_touch: true,
            has_mouse: self.has_mouse,
            has_keyboard: self.has_keyboard,
            multitouch: self.mode == TrackingMode::MultiTouch,
            max_contacts: self.max_contacts,
            touch_range: Some(TouchRange {
                x: (self.geometry.x.min, self.geometry.x.max),
                y: (self.geometry.y.min, self.geometry.y.max),
            }),
        }
    }
}

/// 通过 libevdev 读取设备的能力位图和坐标范围
///
/// 优先使用 protocol B 多点触控轴；只有 `ABS_X/ABS_Y/BTN_TOUCH` 的设备走单点模式。
pub fn probe(path: &Path) -> Result<DeviceProfile, SourceError> {
    let device = Device::new_from_path(path).map_err(|source| SourceError::Open {
        path: path.to_path_buf(),
        source,
    })?;
    let has_abs = |code: EV_ABS| device.has(EventCode::EV_ABS(code));

    let multitouch = has_abs(EV_ABS::ABS_MT_SLOT)
        && has_abs(EV_ABS::ABS_MT_TRACKING_ID)
        && has_abs(EV_ABS::ABS_MT_POSITION_X)
        && has_abs(EV_ABS::ABS_MT_POSITION_Y);
    let single_touch = has_abs(EV_ABS::ABS_X)
        && has_abs(EV_ABS::ABS_Y)
        && device.has(EventCode::EV_KEY(EV_KEY::BTN_TOUCH));

    let (mode, x_code, y_code, pressure_code) = if multitouch {
        (
            TrackingMode::MultiTouch,
            EV_ABS::ABS_MT_POSITION_X,
            EV_ABS::ABS_MT_POSITION_Y,
            EV_ABS::ABS_MT_PRESSURE,
        )
    } else if single_touch {
        (
            TrackingMode::SingleTouch,
            EV_ABS::ABS_X,
            EV_ABS::ABS_Y,
            EV_ABS::ABS_PRESSURE,
        )
    } else {
        return Err(SourceError::NotTouchDevice {
            path: path.to_path_buf(),
        });
    };

    let range = |axis: &'static str, code: EV_ABS| -> Result<AxisRange, SourceError> {
        let info = device
            .abs_info(&EventCode::EV_ABS(code))
            .ok_or_else(|| SourceError::NotTouchDevice {
                path: path.to_path_buf(),
            })?;
        Ok(AxisRange::new(axis, info.minimum, info.maximum)?)
    };

    let geometry = DeviceGeometry {
        x: range("x", x_code)?,
        y: range("y", y_code)?,
        // 压力轴范围异常时只是不报告压力，不影响设备可用性
        pressure: range("pressure", pressure_code).ok(),
    };

    let max_contacts = match mode {
        TrackingMode::MultiTouch => device
            .abs_info(&EventCode::EV_ABS(EV_ABS::ABS_MT_SLOT))
            .map(|info| info.maximum.saturating_add(1))
            .unwrap_or(1)
            .clamp(1, MAX_SLOTS as i32) as u8,
        TrackingMode::SingleTouch => 1,
    };

    Ok(DeviceProfile {
        path: path.to_path_buf(),
        name: device.name().unwrap_or("unknown").to_string(),
        mode,
        geometry,
        max_contacts,
        has_mouse: device.has(EventCode::EV_REL(EV_REL::REL_X))
            && device.has(EventCode::EV_KEY(EV_KEY::BTN_LEFT)),
        has_keyboard: device.has(EventCode::EV_KEY(EV_KEY::KEY_ENTER)),
    })
}
