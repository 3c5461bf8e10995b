/// 设备坐标范围和归一化
pub mod axis;
/// `input_event` 二进制记录解码
pub mod record;
/// 多点触控 slot 状态跟踪
pub mod slot_tracker;

pub use axis::{AxisError, AxisRange, DeviceGeometry};
pub use record::{AbsCode, KeyCode, RECORD_SIZE, RawRecord, Record, Records, SynCode};
pub use slot_tracker::{MAX_SLOTS, SlotTracker, TouchSlot, TrackingMode};
