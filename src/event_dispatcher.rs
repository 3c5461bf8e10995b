use std::sync::Arc;

use tracing::trace;

use crate::{event_model::KeyEvent, gesture::GestureEvent, statistics::InputStatistics};

pub type ClickCallback = Box<dyn FnMut(i32)>;
pub type VerticalDragCallback = Box<dyn FnMut(f32)>;
pub type HorizontalSwipeCallback = Box<dyn FnMut(f32, bool)>;
pub type HoldCallback = Box<dyn FnMut(i32)>;
pub type CancelCallback = Box<dyn FnMut()>;
pub type KeyCallback = Box<dyn FnMut(KeyEvent)>;

/// 每种回调各一个，可以随时替换，传 `None` 解除
pub struct GestureDispatcher {
    on_click: Option<ClickCallback>,
    on_vertical_drag: Option<VerticalDragCallback>,
    on_horizontal_swipe: Option<HorizontalSwipeCallback>,
    on_hold: Option<HoldCallback>,
    on_cancel: Option<CancelCallback>,
    on_key: Option<KeyCallback>,
    stats: Arc<InputStatistics>,
}

impl GestureDispatcher {
    pub fn new(stats: Arc<InputStatistics>) -> Self {
        Self {
            on_click: None,
            on_vertical_drag: None,
            on_horizontal_swipe: None,
            on_hold: None,
            on_cancel: None,
            on_key: None,
            stats,
        }
    }

    pub fn set_on_click(&mut self, callback: Option<ClickCallback>) {
        self.on_click = callback;
    }

    /// 参数是距上一次回调的纵向位移(像素)
    pub fn set_on_vertical_drag(&mut self, callback: Option<VerticalDragCallback>) {
        self.on_vertical_drag = callback;
    }

    /// 参数是距按下位置的横向位移(归一化)和是否已经松手
    pub fn set_on_horizontal_swipe(&mut self, callback: Option<HorizontalSwipeCallback>) {
        self.on_horizontal_swipe = callback;
    }

    pub fn set_on_hold(&mut self, callback: Option<HoldCallback>) {
        self.on_hold = callback;
    }

    pub fn set_on_cancel(&mut self, callback: Option<CancelCallback>) {
        self.on_cancel = callback;
    }

    pub fn set_on_key(&mut self, callback: Option<KeyCallback>) {
        self.on_key = callback;
    }

    pub fn dispatch(&mut self, event: GestureEvent) {
        trace!(?event, "dispatch");
        match event {
            GestureEvent::Click { target } => {
                self.stats.click();
                if let Some(callback) = &mut self.on_click {
                    callback(target);
                }
            }
            GestureEvent::HoldStarted { target } => {
                self.stats.hold();
                if let Some(callback) = &mut self.on_hold {
                    callback(target);
                }
            }
            GestureEvent::VerticalDrag { delta_px } => {
                self.stats.vertical_drag();
                if let Some(callback) = &mut self.on_vertical_drag {
                    callback(delta_px);
                }
            }
            GestureEvent::HorizontalSwipe { delta, complete } => {
                if complete {
                    self.stats.horizontal_swipe();
                }
                if let Some(callback) = &mut self.on_horizontal_swipe {
                    callback(delta, complete);
                }
            }
            GestureEvent::Cancelled => {
                self.stats.gesture_cancel();
                if let Some(callback) = &mut self.on_cancel {
                    callback();
                }
            }
        }
    }

    pub fn key(&mut self, event: KeyEvent) {
        if let Some(callback) = &mut self.on_key {
            callback(event);
        }
    }
}
