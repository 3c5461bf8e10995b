//! # 脚本模拟后端
//!
//! 没有硬件时按脚本生成确定的事件序列。没有独立线程，UI 线程每轮 `poll` 一次，
//! 到时间的事件按计划时间戳(而不是轮询时间)推进队列。

mod script;

use tracing::debug;

pub use script::{STEP_GAP_MS, Scheduled, ScriptStep, TracePoint, demo_script, expand};

use super::{Capabilities, InputSource, SourceError, SourceKind, SourceStatus};
use crate::event_router::EventSink;

pub struct ScriptedSource {
    script: Vec<ScriptStep>,
    looping: bool,
    schedule: Vec<Scheduled>,
    cycle_ms: u64,
    cursor: usize,
    origin_ms: Option<u64>,
    sink: Option<EventSink>,
    status: SourceStatus,
}

impl ScriptedSource {
    pub fn new(script: Vec<ScriptStep>, looping: bool) -> Self {
        Self {
            script,
            looping,
            schedule: Vec::new(),
            cycle_ms: 0,
            cursor: 0,
            origin_ms: None,
            sink: None,
            status: SourceStatus::Uninitialized,
        }
    }

    /// 非循环脚本是否已经全部发完
    pub fn is_finished(&self) -> bool {
        !self.looping && self.cursor >= self.schedule.len()
    }
}

impl InputSource for ScriptedSource {
    fn kind(&self) -> SourceKind {
        SourceKind::Scripted
    }

    fn initialize(&mut self) -> Result<(), SourceError> {
        self.cleanup();
        let (schedule, total_ms) = expand(&self.script);
        if schedule.is_empty() {
            return Err(SourceError::EmptyScript);
        }
        debug!(events = schedule.len(), total_ms, "script expanded");
        self.schedule = schedule;
        self.cycle_ms = total_ms + STEP_GAP_MS;
        self.status = SourceStatus::Ready;
        Ok(())
    }

    fn start(&mut self, sink: EventSink) -> Result<(), SourceError> {
        if self.schedule.is_empty() {
            return Err(SourceError::NotInitialized);
        }
        if self.sink.is_none() {
            self.sink = Some(sink);
            self.cursor = 0;
            self.origin_ms = None;
            self.status = SourceStatus::Running;
        }
        Ok(())
    }

    fn poll(&mut self, now_ms: u64) {
        let Some(sink) = &self.sink else {
            return;
        };
        let origin = self.origin_ms.get_or_insert(now_ms);

        loop {
            while let Some(next) = self.schedule.get(self.cursor) {
                if *origin + next.at_ms > now_ms {
                    return;
                }
                sink.push(next.materialize(*origin));
                self.cursor += 1;
            }
            if !self.looping {
                return;
            }
            *origin += self.cycle_ms;
            // 落后超过一整轮时跳过错过的轮次，只回放当前这一轮
            let behind = now_ms.saturating_sub(*origin);
            *origin += behind / self.cycle_ms * self.cycle_ms;
            self.cursor = 0;
        }
    }

    fn stop(&mut self) {
        if self.sink.take().is_some() {
            self.status = SourceStatus::Stopped;
        }
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities {
            name: "scripted".into(),
            has_touch: true,
            has_mouse: false,
            has_keyboard: false,
            multitouch: true,
            max_contacts: 2,
            touch_range: None,
        }
    }

    fn status(&self) -> SourceStatus {
        self.status
    }

    fn cleanup(&mut self) {
        self.stop();
        self.schedule.clear();
        self.cycle_ms = 0;
        self.cursor = 0;
        self.origin_ms = None;
        self.status = SourceStatus::Uninitialized;
    }
}
