use crate::event_model::{
    InputEvent, KeyEvent, KeyState, MAX_FINGERS, NormalizedPointerEvent, PointerKind,
};

/// linux/input-event-codes.h 里的 `BTN_LEFT`
pub const BTN_LEFT: u32 = 0x110;

/// 混成器送来的原生事件，坐标是 surface 局部坐标(像素)
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum HostEvent {
    PointerEnter { x: f64, y: f64 },
    PointerMotion { x: f64, y: f64 },
    PointerButton { button: u32, pressed: bool },
    PointerLeave,
    TouchDown { id: i32, x: f64, y: f64 },
    TouchMotion { id: i32, x: f64, y: f64 },
    TouchUp { id: i32 },
    TouchCancel,
    Key { keycode: u32, pressed: bool },
    KeyboardLeave,
}

#[derive(Debug, Clone, Copy)]
struct ActiveTouch {
    host_id: i32,
    finger_id: u8,
    position: (f32, f32),
}

/// 把原生事件转换成和 evdev 后端一致的归一化事件
///
/// 鼠标左键按下当作一根手指；触摸 id 映射到最小的空闲手指编号。
/// 触摸被取消、按住时指针离开、键盘失去焦点都会产出 `Cancel` 并清空全部手指。
#[derive(Debug)]
pub struct NativeTranslator {
    surface: (u32, u32),
    pointer: (f32, f32),
    pointer_finger: Option<u8>,
    touches: Vec<ActiveTouch>,
    in_use: u16,
}

impl NativeTranslator {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            surface: (width.max(1), height.max(1)),
            pointer: (0.0, 0.0),
            pointer_finger: None,
            touches: Vec::with_capacity(MAX_FINGERS),
            in_use: 0,
        }
    }

    pub fn set_surface_size(&mut self, width: u32, height: u32) {
        self.surface = (width.max(1), height.max(1));
    }

    pub fn active_fingers(&self) -> usize {
        self.in_use.count_ones() as usize
    }

    fn normalize(&self, x: f64, y: f64) -> (f32, f32) {
        (
            (x / self.surface.0 as f64).clamp(0.0, 1.0) as f32,
            (y / self.surface.1 as f64).clamp(0.0, 1.0) as f32,
        )
    }

    fn allocate(&mut self) -> Option<u8> {
        let finger = (0..MAX_FINGERS as u8).find(|bit| self.in_use & (1u16 << *bit) == 0)?;
        self.in_use |= 1 << finger;
        Some(finger)
    }

    fn free(&mut self, finger: u8) {
        self.in_use &= !(1 << finger);
    }

    fn cancel(&mut self, out: &mut Vec<InputEvent>) {
        self.pointer_finger = None;
        self.touches.clear();
        self.in_use = 0;
        out.push(InputEvent::Cancel);
    }

    pub fn translate(&mut self, event: HostEvent, now_ms: u64, out: &mut Vec<InputEvent>) {
        let pointer = |kind, finger_id, (x, y): (f32, f32)| {
            InputEvent::Pointer(NormalizedPointerEvent::new(kind, finger_id, x, y, now_ms))
        };

        match event {
            HostEvent::PointerEnter { x, y } | HostEvent::PointerMotion { x, y } => {
                self.pointer = self.normalize(x, y);
                if let Some(finger) = self.pointer_finger {
                    out.push(pointer(PointerKind::Move, finger, self.pointer));
                }
            }
            HostEvent::PointerButton {
                button: BTN_LEFT,
                pressed: true,
            } => {
                if self.pointer_finger.is_none() {
                    if let Some(finger) = self.allocate() {
                        self.pointer_finger = Some(finger);
                        out.push(pointer(PointerKind::Down, finger, self.pointer));
                    }
                }
            }
            HostEvent::PointerButton {
                button: BTN_LEFT,
                pressed: false,
            } => {
                if let Some(finger) = self.pointer_finger.take() {
                    self.free(finger);
                    out.push(pointer(PointerKind::Up, finger, self.pointer));
                }
            }
            HostEvent::PointerButton { .. } => {}
            HostEvent::PointerLeave => {
                if self.pointer_finger.is_some() {
                    self.cancel(out);
                }
            }
            HostEvent::TouchDown { id, x, y } => {
                if self.touches.iter().any(|touch| touch.host_id == id) {
                    return;
                }
                if let Some(finger_id) = self.allocate() {
                    let position = self.normalize(x, y);
                    self.touches.push(ActiveTouch {
                        host_id: id,
                        finger_id,
                        position,
                    });
                    out.push(pointer(PointerKind::Down, finger_id, position));
                }
            }
            HostEvent::TouchMotion { id, x, y } => {
                let position = self.normalize(x, y);
                if let Some(touch) = self.touches.iter_mut().find(|touch| touch.host_id == id) {
                    touch.position = position;
                    out.push(pointer(PointerKind::Move, touch.finger_id, position));
                }
            }
            HostEvent::TouchUp { id } => {
                if let Some(index) = self.touches.iter().position(|touch| touch.host_id == id) {
                    let touch = self.touches.swap_remove(index);
                    self.free(touch.finger_id);
                    out.push(pointer(PointerKind::Up, touch.finger_id, touch.position));
                }
            }
            HostEvent::TouchCancel | HostEvent::KeyboardLeave => self.cancel(out),
            HostEvent::Key { keycode, pressed } => out.push(InputEvent::Key(KeyEvent {
                keycode,
                state: if pressed {
                    KeyState::Pressed
                } else {
                    KeyState::Released
                },
                timestamp_ms: now_ms,
            })),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(translator: &mut NativeTranslator, events: &[HostEvent]) -> Vec<InputEvent> {
        let mut out = Vec::new();
        for (n, event) in events.iter().enumerate() {
            translator.translate(*event, n as u64, &mut out);
        }
        out
    }

    fn pointer_kinds(events: &[InputEvent]) -> Vec<(PointerKind, u8)> {
        events
            .iter()
            .filter_map(|event| match event {
                InputEvent::Pointer(p) => Some((p.kind, p.finger_id)),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn left_button_drag_becomes_finger_zero() {
        let mut translator = NativeTranslator::new(800, 400);
        let events = run(
            &mut translator,
            &[
                HostEvent::PointerEnter { x: 400.0, y: 200.0 },
                HostEvent::PointerMotion { x: 200.0, y: 100.0 },
                HostEvent::PointerButton {
                    button: BTN_LEFT,
                    pressed: true,
                },
                HostEvent::PointerMotion { x: 600.0, y: 100.0 },
                HostEvent::PointerButton {
                    button: BTN_LEFT,
                    pressed: false,
                },
            ],
        );
        assert_eq!(
            pointer_kinds(&events),
            vec![
                (PointerKind::Down, 0),
                (PointerKind::Move, 0),
                (PointerKind::Up, 0)
            ]
        );
        match events[0] {
            InputEvent::Pointer(p) => {
                assert_eq!((p.x, p.y), (0.25, 0.25));
                assert_eq!(p.timestamp_ms, 2);
            }
            _ => unreachable!(),
        }
        match events[2] {
            InputEvent::Pointer(p) => assert_eq!(p.x, 0.75),
            _ => unreachable!(),
        }
    }

    #[test]
    fn hover_and_other_buttons_produce_nothing() {
        let mut translator = NativeTranslator::new(100, 100);
        let events = run(
            &mut translator,
            &[
                HostEvent::PointerMotion { x: 10.0, y: 10.0 },
                HostEvent::PointerButton {
                    button: 0x111,
                    pressed: true,
                },
                HostEvent::PointerLeave,
            ],
        );
        assert!(events.is_empty());
    }

    #[test]
    fn touch_ids_map_to_lowest_free_finger() {
        let mut translator = NativeTranslator::new(100, 100);
        let events = run(
            &mut translator,
            &[
                HostEvent::TouchDown { id: 41, x: 10.0, y: 10.0 },
                HostEvent::TouchDown { id: 42, x: 20.0, y: 20.0 },
                HostEvent::TouchUp { id: 41 },
                HostEvent::TouchDown { id: 43, x: 30.0, y: 30.0 },
                HostEvent::TouchMotion { id: 42, x: 25.0, y: 20.0 },
                HostEvent::TouchMotion { id: 99, x: 25.0, y: 20.0 },
            ],
        );
        assert_eq!(
            pointer_kinds(&events),
            vec![
                (PointerKind::Down, 0),
                (PointerKind::Down, 1),
                (PointerKind::Up, 0),
                (PointerKind::Down, 0),
                (PointerKind::Move, 1),
            ]
        );
        assert_eq!(translator.active_fingers(), 2);
    }

    #[test]
    fn focus_loss_cancels_and_forgets_fingers() {
        let mut translator = NativeTranslator::new(100, 100);
        let events = run(
            &mut translator,
            &[
                HostEvent::TouchDown { id: 1, x: 10.0, y: 10.0 },
                HostEvent::KeyboardLeave,
                HostEvent::TouchUp { id: 1 },
            ],
        );
        assert_eq!(events.len(), 2);
        assert_eq!(events[1], InputEvent::Cancel);
        assert_eq!(translator.active_fingers(), 0);
    }

    #[test]
    fn keys_pass_through() {
        let mut translator = NativeTranslator::new(100, 100);
        let events = run(
            &mut translator,
            &[HostEvent::Key {
                keycode: 28,
                pressed: true,
            }],
        );
        assert_eq!(
            events,
            vec![InputEvent::Key(KeyEvent {
                keycode: 28,
                state: KeyState::Pressed,
                timestamp_ms: 0
            })]
        );
    }

    #[test]
    fn resize_changes_normalization() {
        let mut translator = NativeTranslator::new(100, 100);
        translator.set_surface_size(200, 100);
        let events = run(
            &mut translator,
            &[HostEvent::TouchDown { id: 1, x: 100.0, y: 50.0 }],
        );
        match events[0] {
            InputEvent::Pointer(p) => assert_eq!((p.x, p.y), (0.5, 0.5)),
            _ => unreachable!(),
        }
    }
}
