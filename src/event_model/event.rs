use serde::{Deserialize, Serialize};

/// 手指数量上限，和 evdev 后端的 slot 池大小一致
pub const MAX_FINGERS: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PointerKind {
    Down,
    Move,
    Up,
}

/// 所有输入源输出的统一事件
///
/// 坐标归一化到当前显示表面的 [0, 1]，`timestamp_ms` 是子系统启动以来的单调毫秒数。
/// 同一个 `finger_id` 必须先有一次 `Down`，在它的 `Up` 送达之前不会被复用。
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NormalizedPointerEvent {
    pub kind: PointerKind,
    pub finger_id: u8,
    pub x: f32,
    pub y: f32,
    pub pressure: f32,
    pub timestamp_ms: u64,
}

impl NormalizedPointerEvent {
    pub fn new(kind: PointerKind, finger_id: u8, x: f32, y: f32, timestamp_ms: u64) -> Self {
        Self {
            kind,
            finger_id,
            x,
            y,
            pressure: 1.0,
            timestamp_ms,
        }
    }

    pub fn with_pressure(mut self, pressure: Option<f32>) -> Self {
        self.pressure = pressure.unwrap_or(1.0).clamp(0.0, 1.0);
        self
    }

    pub fn down(finger_id: u8, x: f32, y: f32, timestamp_ms: u64) -> Self {
        Self::new(PointerKind::Down, finger_id, x, y, timestamp_ms)
    }

    pub fn moved(finger_id: u8, x: f32, y: f32, timestamp_ms: u64) -> Self {
        Self::new(PointerKind::Move, finger_id, x, y, timestamp_ms)
    }

    pub fn up(finger_id: u8, x: f32, y: f32, timestamp_ms: u64) -> Self {
        Self::new(PointerKind::Up, finger_id, x, y, timestamp_ms)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum KeyState {
    Pressed,
    Released,
}

/// 键盘事件原样透传，不参与手势识别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyEvent {
    pub keycode: u32,
    pub state: KeyState,
    pub timestamp_ms: u64,
}

/// 队列里流动的事件
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum InputEvent {
    Pointer(NormalizedPointerEvent),
    Key(KeyEvent),
    /// 输入源要求取消当前手势(窗口失去焦点、混成器取消触摸序列)
    Cancel,
}

impl From<NormalizedPointerEvent> for InputEvent {
    fn from(event: NormalizedPointerEvent) -> Self {
        Self::Pointer(event)
    }
}

impl From<KeyEvent> for InputEvent {
    fn from(event: KeyEvent) -> Self {
        Self::Key(event)
    }
}
