pub mod queue;

use std::sync::Arc;

use tracing::{debug, info, warn};

pub use queue::{EventQueue, EventSink, OverflowPolicy, PushOutcome};

use crate::{
    event_dispatcher::GestureDispatcher,
    event_model::{InputEvent, MonotonicClock},
    gesture::{GestureClassifier, GestureConfig, HitTest},
    input_devices::{AnySource, Capabilities, InputSource, SourceError, SourceStatus},
    statistics::{InputStatistics, StatisticsSnapshot},
};

/// UI 线程上的消费端
///
/// 每轮 [`pump`](Self::pump) 依次：轮询输入源、取空队列送进手势状态机、检查输入源是否已经停止、检测长按。
pub struct EventRouter {
    queue: EventQueue,
    source: Option<AnySource>,
    source_stopped: bool,
    classifier: GestureClassifier,
    surface: (u32, u32),
    dispatcher: GestureDispatcher,
    clock: MonotonicClock,
    stats: Arc<InputStatistics>,
}

impl EventRouter {
    pub fn new(
        queue: EventQueue,
        gesture: GestureConfig,
        surface: (u32, u32),
        clock: MonotonicClock,
        stats: Arc<InputStatistics>,
    ) -> Self {
        Self {
            queue,
            source: None,
            source_stopped: false,
            classifier: GestureClassifier::new(gesture, surface),
            surface,
            dispatcher: GestureDispatcher::new(stats.clone()),
            clock,
            stats,
        }
    }

    /// 启动输入源并接管它，之前的输入源会先被停止
    pub fn attach_source(&mut self, mut source: AnySource) -> Result<(), SourceError> {
        self.stop_source();
        self.fit_surface(&mut source);
        source.start(self.queue.sink())?;
        info!(kind = ?source.kind(), "input source attached");
        self.source = Some(source);
        self.source_stopped = false;
        Ok(())
    }

    /// wayland 后端按像素上报，需要和手势状态机用同一个 surface 尺寸归一化
    fn fit_surface(&self, source: &mut AnySource) {
        if let AnySource::Wayland(source) = source {
            source.set_surface_size(self.surface.0, self.surface.1);
        }
    }

    /// 停止输入源，视为一次取消；队列里剩下的事件全部丢弃
    pub fn stop_source(&mut self) {
        if let Some(source) = &mut self.source {
            source.stop();
        }
        self.source_stopped = true;
        self.queue.clear();
        self.cancel();
    }

    pub fn detach_source(&mut self) -> Option<AnySource> {
        self.stop_source();
        self.source.take()
    }

    /// 给不经过 [`InputSource`] 的生产者用
    pub fn sink(&self) -> EventSink {
        self.queue.sink()
    }

    pub fn pump(&mut self) {
        self.pump_at(self.clock.now_ms());
    }

    pub fn pump_at(&mut self, now_ms: u64) {
        if let Some(source) = &mut self.source {
            source.poll(now_ms);
        }

        for event in self.queue.drain() {
            match event {
                InputEvent::Pointer(pointer) => {
                    self.stats.pointer(pointer.kind);
                    if let Some(gesture) = self.classifier.handle(&pointer) {
                        self.dispatcher.dispatch(gesture);
                    }
                }
                InputEvent::Key(key) => {
                    self.stats.key_event();
                    self.dispatcher.key(key);
                }
                InputEvent::Cancel => {
                    debug!("source requested cancel");
                    self.stats.source_cancel();
                    if let Some(gesture) = self.classifier.cancel() {
                        self.dispatcher.dispatch(gesture);
                    }
                }
            }
        }

        let status = self.source.as_ref().map(InputSource::status);
        if let Some(status) = status {
            if status.is_stopped() && !self.source_stopped {
                self.source_stopped = true;
                warn!(?status, "input source stopped, cancelling gesture");
                self.stats.source_cancel();
                self.cancel();
            }
        }

        if let Some(gesture) = self.classifier.tick(now_ms) {
            self.dispatcher.dispatch(gesture);
        }
    }

    fn cancel(&mut self) {
        if let Some(gesture) = self.classifier.cancel() {
            self.dispatcher.dispatch(gesture);
        }
    }

    pub fn source_status(&self) -> Option<SourceStatus> {
        self.source.as_ref().map(InputSource::status)
    }

    pub fn capabilities(&self) -> Option<Capabilities> {
        self.source.as_ref().map(InputSource::capabilities)
    }

    pub fn statistics(&self) -> StatisticsSnapshot {
        self.stats.snapshot()
    }

    pub fn dispatcher_mut(&mut self) -> &mut GestureDispatcher {
        &mut self.dispatcher
    }

    pub fn classifier(&self) -> &GestureClassifier {
        &self.classifier
    }

    pub fn set_hit_test(&mut self, hit_test: Option<HitTest>) {
        self.classifier.set_hit_test(hit_test);
    }

    pub fn set_current_page(&mut self, page: u32) {
        self.classifier.set_current_page(page);
    }

    /// 同时更新手势阈值换算和 wayland 后端的坐标归一化
    pub fn set_surface_size(&mut self, width: u32, height: u32) {
        self.classifier.set_surface_size(width, height);
        self.surface = (width, height);
        if let Some(AnySource::Wayland(source)) = &mut self.source {
            source.set_surface_size(width, height);
        }
    }
}

impl Drop for EventRouter {
    fn drop(&mut self) {
        if let Some(source) = &mut self.source {
            source.stop();
        }
    }
}
