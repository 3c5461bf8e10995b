//! # Wayland 原生输入后端
//!
//! 绑定 `wl_seat`，按 seat 能力获取 `wl_pointer`/`wl_touch`/`wl_keyboard`。
//! 没有独立线程，UI 线程每轮 `poll` 时非阻塞地读取 socket 并分发。
//!
//! 指针和触摸事件只会发给有焦点的 surface，所以正常使用时应该通过
//! [`WaylandSource::with_connection`] 共用 UI 自己的连接。

mod translate;

use std::io::ErrorKind;

use tracing::{debug, warn};
use wayland_client::{
    Connection, Dispatch, DispatchError, EventQueue, QueueHandle, WEnum,
    backend::WaylandError,
    protocol::{wl_keyboard, wl_pointer, wl_registry, wl_seat, wl_touch},
};

pub use translate::{BTN_LEFT, HostEvent, NativeTranslator};

use super::{Capabilities, InputSource, SourceError, SourceKind, SourceStatus};
use crate::{
    event_model::{InputEvent, MAX_FINGERS, MonotonicClock},
    event_router::EventSink,
};

/// 支持的最高 `wl_seat` 版本
const SEAT_VERSION: u32 = 7;

struct WaylandState {
    seat: Option<wl_seat::WlSeat>,
    pointer: Option<wl_pointer::WlPointer>,
    touch: Option<wl_touch::WlTouch>,
    keyboard: Option<wl_keyboard::WlKeyboard>,
    seat_name: Option<String>,
    translator: NativeTranslator,
    pending: Vec<InputEvent>,
    clock: MonotonicClock,
}

impl WaylandState {
    fn host(&mut self, event: HostEvent) {
        let now_ms = self.clock.now_ms();
        self.translator.translate(event, now_ms, &mut self.pending);
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities {
            name: self
                .seat_name
                .clone()
                .unwrap_or_else(|| "wayland seat".into()),
            has_touch: self.touch.is_some(),
            has_mouse: self.pointer.is_some(),
            has_keyboard: self.keyboard.is_some(),
            multitouch: self.touch.is_some(),
            max_contacts: if self.touch.is_some() {
                MAX_FINGERS as u8
            } else {
                1
            },
            touch_range: None,
        }
    }
}

impl Dispatch<wl_registry::WlRegistry, ()> for WaylandState {
    fn event(
        state: &mut Self,
        registry: &wl_registry::WlRegistry,
        event: wl_registry::Event,
        _: &(),
        _: &Connection,
        qhandle: &QueueHandle<Self>,
    ) {
        if let wl_registry::Event::Global {
            name,
            interface,
            version,
        } = event
        {
            // 只用第一个 seat，kiosk 上通常也只有一个
            if interface == "wl_seat" && state.seat.is_none() {
                debug!(name, version, "binding wl_seat");
                let seat = registry.bind::<wl_seat::WlSeat, _, _>(
                    name,
                    version.min(SEAT_VERSION),
                    qhandle,
                    (),
                );
                state.seat = Some(seat);
            }
        }
    }
}

impl Dispatch<wl_seat::WlSeat, ()> for WaylandState {
    fn event(
        state: &mut Self,
        seat: &wl_seat::WlSeat,
        event: wl_seat::Event,
        _: &(),
        _: &Connection,
        qhandle: &QueueHandle<Self>,
    ) {
        // https://wayland.app/protocols/wayland#wl_seat
        match event {
            wl_seat::Event::Capabilities {
                capabilities: WEnum::Value(capabilities),
            } => {
                let pointer = capabilities.contains(wl_seat::Capability::Pointer);
                match (&state.pointer, pointer) {
                    (None, true) => state.pointer = Some(seat.get_pointer(qhandle, ())),
                    (Some(_), false) => {
                        if let Some(pointer) = state.pointer.take() {
                            pointer.release();
                        }
                    }
                    _ => {}
                }

                let touch = capabilities.contains(wl_seat::Capability::Touch);
                match (&state.touch, touch) {
                    (None, true) => state.touch = Some(seat.get_touch(qhandle, ())),
                    (Some(_), false) => {
                        if let Some(touch) = state.touch.take() {
                            touch.release();
                        }
                        state.host(HostEvent::TouchCancel);
                    }
                    _ => {}
                }

                let keyboard = capabilities.contains(wl_seat::Capability::Keyboard);
                match (&state.keyboard, keyboard) {
                    (None, true) => state.keyboard = Some(seat.get_keyboard(qhandle, ())),
                    (Some(_), false) => {
                        if let Some(keyboard) = state.keyboard.take() {
                            keyboard.release();
                        }
                    }
                    _ => {}
                }
                debug!(?capabilities, "seat capabilities");
            }
            wl_seat::Event::Name { name } => state.seat_name = Some(name),
            _ => {}
        }
    }
}

impl Dispatch<wl_pointer::WlPointer, ()> for WaylandState {
    fn event(
        state: &mut Self,
        _: &wl_pointer::WlPointer,
        event: wl_pointer::Event,
        _: &(),
        _: &Connection,
        _: &QueueHandle<Self>,
    ) {
        match event {
            wl_pointer::Event::Enter {
                surface_x,
                surface_y,
                ..
            } => state.host(HostEvent::PointerEnter {
                x: surface_x,
                y: surface_y,
            }),
            wl_pointer::Event::Motion {
                surface_x,
                surface_y,
                ..
            } => state.host(HostEvent::PointerMotion {
                x: surface_x,
                y: surface_y,
            }),
            wl_pointer::Event::Button {
                button,
                state: button_state,
                ..
            } => state.host(HostEvent::PointerButton {
                button,
                pressed: button_state == WEnum::Value(wl_pointer::ButtonState::Pressed),
            }),
            wl_pointer::Event::Leave { .. } => state.host(HostEvent::PointerLeave),
            _ => {}
        }
    }
}

impl Dispatch<wl_touch::WlTouch, ()> for WaylandState {
    fn event(
        state: &mut Self,
        _: &wl_touch::WlTouch,
        event: wl_touch::Event,
        _: &(),
        _: &Connection,
        _: &QueueHandle<Self>,
    ) {
        match event {
            wl_touch::Event::Down { id, x, y, .. } => state.host(HostEvent::TouchDown { id, x, y }),
            wl_touch::Event::Motion { id, x, y, .. } => {
                state.host(HostEvent::TouchMotion { id, x, y })
            }
            wl_touch::Event::Up { id, .. } => state.host(HostEvent::TouchUp { id }),
            wl_touch::Event::Cancel => state.host(HostEvent::TouchCancel),
            _ => {}
        }
    }
}

impl Dispatch<wl_keyboard::WlKeyboard, ()> for WaylandState {
    fn event(
        state: &mut Self,
        _: &wl_keyboard::WlKeyboard,
        event: wl_keyboard::Event,
        _: &(),
        _: &Connection,
        _: &QueueHandle<Self>,
    ) {
        match event {
            wl_keyboard::Event::Key {
                key,
                state: key_state,
                ..
            } => state.host(HostEvent::Key {
                keycode: key,
                pressed: key_state == WEnum::Value(wl_keyboard::KeyState::Pressed),
            }),
            wl_keyboard::Event::Leave { .. } => state.host(HostEvent::KeyboardLeave),
            _ => {}
        }
    }
}

struct Session {
    connection: Connection,
    queue: EventQueue<WaylandState>,
    state: WaylandState,
}

impl Session {
    /// 非阻塞地读取并分发所有已到达的事件
    fn pump(&mut self) -> Result<(), DispatchError> {
        self.queue.dispatch_pending(&mut self.state)?;
        self.connection.flush().map_err(DispatchError::Backend)?;
        if let Some(guard) = self.queue.prepare_read() {
            match guard.read() {
                Ok(_) => {}
                Err(WaylandError::Io(err)) if err.kind() == ErrorKind::WouldBlock => {}
                Err(err) => return Err(DispatchError::Backend(err)),
            }
        }
        self.queue.dispatch_pending(&mut self.state)?;
        Ok(())
    }
}

pub struct WaylandSource {
    clock: MonotonicClock,
    connection: Option<Connection>,
    surface: (u32, u32),
    session: Option<Session>,
    sink: Option<EventSink>,
    status: SourceStatus,
}

impl WaylandSource {
    /// 初始化时从 `WAYLAND_DISPLAY` 建立新连接
    pub fn new(clock: MonotonicClock) -> Self {
        Self {
            clock,
            connection: None,
            surface: (1, 1),
            session: None,
            sink: None,
            status: SourceStatus::Uninitialized,
        }
    }

    /// 共用 UI 已有的连接
    pub fn with_connection(connection: Connection, clock: MonotonicClock) -> Self {
        let mut source = Self::new(clock);
        source.connection = Some(connection);
        source
    }

    /// UI 收到 configure 后报告 surface 尺寸，用于坐标归一化
    pub fn set_surface_size(&mut self, width: u32, height: u32) {
        self.surface = (width, height);
        if let Some(session) = &mut self.session {
            session.state.translator.set_surface_size(width, height);
        }
    }

    pub fn surface_size(&self) -> (u32, u32) {
        self.surface
    }

    pub(crate) fn translator(&self) -> NativeTranslator {
        NativeTranslator::new(self.surface.0, self.surface.1)
    }

    fn connect(&self) -> Result<Session, SourceError> {
        let connection = match &self.connection {
            Some(connection) => connection.clone(),
            None => Connection::connect_to_env()?,
        };
        let mut queue = connection.new_event_queue();
        let qhandle = queue.handle();
        connection.display().get_registry(&qhandle, ());

        let mut state = WaylandState {
            seat: None,
            pointer: None,
            touch: None,
            keyboard: None,
            seat_name: None,
            translator: self.translator(),
            pending: Vec::new(),
            clock: self.clock,
        };
        // 第一次往返拿到 globals，第二次拿到 seat 能力
        queue.roundtrip(&mut state)?;
        if state.seat.is_none() {
            return Err(SourceError::NoSeat);
        }
        queue.roundtrip(&mut state)?;
        state.pending.clear();

        Ok(Session {
            connection,
            queue,
            state,
        })
    }
}

impl InputSource for WaylandSource {
    fn kind(&self) -> SourceKind {
        SourceKind::Wayland
    }

    fn initialize(&mut self) -> Result<(), SourceError> {
        self.cleanup();
        let session = self.connect()?;
        debug!(capabilities = ?session.state.capabilities(), "wayland seat ready");
        self.session = Some(session);
        self.status = SourceStatus::Ready;
        Ok(())
    }

    fn start(&mut self, sink: EventSink) -> Result<(), SourceError> {
        let session = self.session.as_mut().ok_or(SourceError::NotInitialized)?;
        if self.sink.is_none() {
            session.state.pending.clear();
            self.sink = Some(sink);
            self.status = SourceStatus::Running;
        }
        Ok(())
    }

    fn poll(&mut self, _now_ms: u64) {
        let (Some(session), Some(sink)) = (&mut self.session, &self.sink) else {
            return;
        };
        if let Err(err) = session.pump() {
            warn!(%err, "wayland connection lost");
            self.sink = None;
            self.status = SourceStatus::Disconnected;
            return;
        }
        if !session.state.pending.is_empty() {
            sink.push_all(session.state.pending.drain(..));
        }
    }

    fn stop(&mut self) {
        if self.sink.take().is_some() {
            self.status = SourceStatus::Stopped;
        }
    }

    fn capabilities(&self) -> Capabilities {
        self.session
            .as_ref()
            .map(|session| session.state.capabilities())
            .unwrap_or_default()
    }

    fn status(&self) -> SourceStatus {
        self.status
    }

    fn cleanup(&mut self) {
        self.stop();
        if let Some(session) = self.session.take() {
            let state = session.state;
            if let Some(pointer) = state.pointer {
                pointer.release();
            }
            if let Some(touch) = state.touch {
                touch.release();
            }
            if let Some(keyboard) = state.keyboard {
                keyboard.release();
            }
            let _ = session.connection.flush();
        }
        self.status = SourceStatus::Uninitialized;
    }
}

impl Drop for WaylandSource {
    fn drop(&mut self) {
        self.cleanup();
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::{
        event_router::{EventQueue, OverflowPolicy},
        statistics::InputStatistics,
    };

    #[test]
    fn uninitialized_source_cannot_start() {
        let stats = Arc::new(InputStatistics::new());
        let queue = EventQueue::new(8, OverflowPolicy::DropOldest, stats);
        let mut source = WaylandSource::new(MonotonicClock::start());
        assert!(matches!(
            source.start(queue.sink()),
            Err(SourceError::NotInitialized)
        ));
        source.stop();
        source.stop();
        assert_eq!(source.status(), SourceStatus::Uninitialized);
        assert_eq!(source.capabilities(), Capabilities::default());
    }
}
