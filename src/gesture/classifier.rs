use serde::Deserialize;
use tracing::{debug, trace};

use crate::event_model::{NormalizedPointerEvent, PointerKind};

/// 手势阈值
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default)]
pub struct GestureConfig {
    /// 超过这个像素距离才算拖动
    pub drag_threshold_px: f32,
    pub hold_threshold_ms: u64,
    pub click_timeout_ms: u64,
}

impl Default for GestureConfig {
    fn default() -> Self {
        Self {
            drag_threshold_px: 10.0,
            hold_threshold_ms: 500,
            click_timeout_ms: 300,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Phase {
    #[default]
    Idle,
    Potential,
    /// 点击在抬起时当场完成，不会停留在这个阶段
    Click,
    DraggingVertical,
    DraggingHorizontal,
    Holding,
}

impl Phase {
    pub fn in_flight(self) -> bool {
        !matches!(self, Self::Idle | Self::Click)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Origin {
    pub x: f32,
    pub y: f32,
    pub timestamp_ms: u64,
}

/// 当前手势的状态，只有一个实例，归分类器所有
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GestureContext {
    pub phase: Phase,
    pub origin: Origin,
    pub last_position: (f32, f32),
    pub active_finger_id: Option<u8>,
    /// 按下时命中的元素，-1 表示没有
    pub target_index: i32,
    pub origin_page: u32,
}

impl Default for GestureContext {
    fn default() -> Self {
        Self {
            phase: Phase::Idle,
            origin: Origin::default(),
            last_position: (0.0, 0.0),
            active_finger_id: None,
            target_index: -1,
            origin_page: 0,
        }
    }
}

/// 分类结果
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum GestureEvent {
    Click { target: i32 },
    HoldStarted { target: i32 },
    /// 距上一次回调的纵向位移(像素)
    VerticalDrag { delta_px: f32 },
    /// 距按下位置的横向位移(归一化)
    HorizontalSwipe { delta: f32, complete: bool },
    Cancelled,
}

/// `(x, y, current_page) -> target_index`
pub type HitTest = Box<dyn FnMut(f32, f32, u32) -> i32>;

pub struct GestureClassifier {
    config: GestureConfig,
    surface: (f32, f32),
    current_page: u32,
    hit_test: Option<HitTest>,
    context: GestureContext,
}

impl GestureClassifier {
    pub fn new(config: GestureConfig, (width, height): (u32, u32)) -> Self {
        Self {
            config,
            surface: (width.max(1) as f32, height.max(1) as f32),
            current_page: 0,
            hit_test: None,
            context: GestureContext::default(),
        }
    }

    pub fn config(&self) -> &GestureConfig {
        &self.config
    }

    /// 只影响之后的距离计算，不会打断进行中的手势
    pub fn set_surface_size(&mut self, width: u32, height: u32) {
        self.surface = (width.max(1) as f32, height.max(1) as f32);
    }

    pub fn current_page(&self) -> u32 {
        self.current_page
    }

    pub fn set_current_page(&mut self, page: u32) {
        self.current_page = page;
    }

    pub fn set_hit_test(&mut self, hit_test: Option<HitTest>) {
        self.hit_test = hit_test;
    }

    pub fn phase(&self) -> Phase {
        self.context.phase
    }

    pub fn context(&self) -> &GestureContext {
        &self.context
    }

    fn to_px(&self, dx: f32, dy: f32) -> (f32, f32) {
        (dx * self.surface.0, dy * self.surface.1)
    }

    fn distance_from_origin(&self, x: f32, y: f32) -> (f32, f32, f32) {
        let (dx, dy) = self.to_px(x - self.context.origin.x, y - self.context.origin.y);
        (dx, dy, dx.hypot(dy))
    }

    fn reset(&mut self) {
        self.context = GestureContext::default();
    }

    pub fn handle(&mut self, event: &NormalizedPointerEvent) -> Option<GestureEvent> {
        if self.context.phase.in_flight() && self.context.active_finger_id != Some(event.finger_id)
        {
            trace!(finger_id = event.finger_id, "ignoring secondary finger");
            return None;
        }

        match (self.context.phase, event.kind) {
            (Phase::Idle, PointerKind::Down) => {
                self.begin(event);
                None
            }
            (Phase::Idle, _) => None,
            // 同一根手指重复按下说明丢了 Up，按新手势处理
            (_, PointerKind::Down) => {
                self.begin(event);
                None
            }
            (Phase::Potential, PointerKind::Move) => self.potential_move(event),
            (Phase::Potential, PointerKind::Up) => self.potential_up(event),
            (Phase::DraggingVertical, PointerKind::Move) => self.vertical_delta(event),
            (Phase::DraggingVertical, PointerKind::Up) => {
                let delta = self.vertical_delta(event);
                self.reset();
                delta
            }
            (Phase::DraggingHorizontal, kind) => {
                let complete = kind == PointerKind::Up;
                let delta = event.x - self.context.origin.x;
                self.context.last_position = (event.x, event.y);
                if complete {
                    debug!(delta, "horizontal swipe complete");
                    self.reset();
                }
                Some(GestureEvent::HorizontalSwipe { delta, complete })
            }
            (Phase::Holding, PointerKind::Move) => {
                self.context.last_position = (event.x, event.y);
                None
            }
            (Phase::Holding, PointerKind::Up) | (Phase::Click, _) => {
                self.reset();
                None
            }
        }
    }

    fn begin(&mut self, event: &NormalizedPointerEvent) {
        let target_index = match &mut self.hit_test {
            Some(hit_test) => hit_test(event.x, event.y, self.current_page),
            None => -1,
        };
        self.context = GestureContext {
            phase: Phase::Potential,
            origin: Origin {
                x: event.x,
                y: event.y,
                timestamp_ms: event.timestamp_ms,
            },
            last_position: (event.x, event.y),
            active_finger_id: Some(event.finger_id),
            target_index,
            origin_page: self.current_page,
        };
        trace!(target_index, finger_id = event.finger_id, "gesture started");
    }

    fn potential_move(&mut self, event: &NormalizedPointerEvent) -> Option<GestureEvent> {
        let (dx, dy, distance) = self.distance_from_origin(event.x, event.y);
        if distance <= self.config.drag_threshold_px {
            return None;
        }
        // 方向一旦确定，整个手势期间不再改变
        if dx.abs() >= dy.abs() {
            self.context.phase = Phase::DraggingHorizontal;
            self.context.last_position = (event.x, event.y);
            debug!(dx, dy, "horizontal drag");
            Some(GestureEvent::HorizontalSwipe {
                delta: event.x - self.context.origin.x,
                complete: false,
            })
        } else {
            self.context.phase = Phase::DraggingVertical;
            debug!(dx, dy, "vertical drag");
            self.vertical_delta(event)
        }
    }

    fn potential_up(&mut self, event: &NormalizedPointerEvent) -> Option<GestureEvent> {
        let (_, _, distance) = self.distance_from_origin(event.x, event.y);
        let elapsed = event
            .timestamp_ms
            .saturating_sub(self.context.origin.timestamp_ms);
        let target = self.context.target_index;
        let same_page = self.context.origin_page == self.current_page;

        let click = elapsed < self.config.click_timeout_ms
            && distance < self.config.drag_threshold_px;
        self.reset();
        if click && !same_page {
            debug!(target, "page changed during press, click suppressed");
        }
        (click && same_page).then_some(GestureEvent::Click { target })
    }

    fn vertical_delta(&mut self, event: &NormalizedPointerEvent) -> Option<GestureEvent> {
        let (_, delta_px) = self.to_px(0.0, event.y - self.context.last_position.1);
        if delta_px == 0.0 {
            return None;
        }
        self.context.last_position = (event.x, event.y);
        Some(GestureEvent::VerticalDrag { delta_px })
    }

    /// 周期调用，检测长按
    pub fn tick(&mut self, now_ms: u64) -> Option<GestureEvent> {
        if self.context.phase != Phase::Potential {
            return None;
        }
        let elapsed = now_ms.saturating_sub(self.context.origin.timestamp_ms);
        if elapsed < self.config.hold_threshold_ms {
            return None;
        }
        self.context.phase = Phase::Holding;
        debug!(elapsed, target = self.context.target_index, "hold");
        Some(GestureEvent::HoldStarted {
            target: self.context.target_index,
        })
    }

    /// 丢弃进行中的手势，不产生完成回调
    pub fn cancel(&mut self) -> Option<GestureEvent> {
        let was_active = self.context.phase.in_flight();
        self.reset();
        was_active.then_some(GestureEvent::Cancelled)
    }
}
