//! 输入源线程到 UI 线程的有界 FIFO
//!
//! 生产端 [`EventSink`] 可以克隆给任意线程，消费端 [`EventQueue`] 只有一个。
//! 推送永远不会等待消费者，满了以后按 [`OverflowPolicy`] 丢事件并计数。

use std::{
    collections::VecDeque,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use serde::Deserialize;
use tracing::debug;

use crate::{event_model::InputEvent, statistics::InputStatistics};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OverflowPolicy {
    /// 丢掉最旧的事件，保证最新的触摸状态能进来
    #[default]
    DropOldest,
    /// 拒绝新事件
    RejectNewest,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushOutcome {
    Accepted,
    DroppedOldest,
    Rejected,
}

struct Shared {
    events: Mutex<VecDeque<InputEvent>>,
    capacity: usize,
    policy: OverflowPolicy,
    stats: Arc<InputStatistics>,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, VecDeque<InputEvent>> {
        // 持锁期间不会 panic，中毒了也直接拿数据
        self.events.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// 生产端句柄
#[derive(Clone)]
pub struct EventSink {
    shared: Arc<Shared>,
}

impl EventSink {
    pub fn push(&self, event: impl Into<InputEvent>) -> PushOutcome {
        let event = event.into();
        let mut events = self.shared.lock();
        if events.len() < self.shared.capacity {
            events.push_back(event);
            return PushOutcome::Accepted;
        }
        match self.shared.policy {
            OverflowPolicy::DropOldest => {
                events.pop_front();
                events.push_back(event);
                drop(events);
                self.shared.stats.queue_dropped_oldest();
                debug!("event queue full, dropped oldest event");
                PushOutcome::DroppedOldest
            }
            OverflowPolicy::RejectNewest => {
                drop(events);
                self.shared.stats.queue_rejected();
                debug!("event queue full, rejected new event");
                PushOutcome::Rejected
            }
        }
    }

    /// 批量推送，同一批事件在一次加锁内入队，保持顺序
    pub fn push_all<I>(&self, batch: I)
    where
        I: IntoIterator,
        I::Item: Into<InputEvent>,
    {
        let mut events = self.shared.lock();
        for event in batch {
            if events.len() >= self.shared.capacity {
                match self.shared.policy {
                    OverflowPolicy::DropOldest => {
                        events.pop_front();
                        self.shared.stats.queue_dropped_oldest();
                    }
                    OverflowPolicy::RejectNewest => {
                        self.shared.stats.queue_rejected();
                        continue;
                    }
                }
            }
            events.push_back(event.into());
        }
    }
}

/// 消费端，只属于 UI 线程
pub struct EventQueue {
    shared: Arc<Shared>,
    backlog: VecDeque<InputEvent>,
}

impl EventQueue {
    pub fn new(capacity: usize, policy: OverflowPolicy, stats: Arc<InputStatistics>) -> Self {
        let capacity = capacity.max(1);
        Self {
            shared: Arc::new(Shared {
                events: Mutex::new(VecDeque::with_capacity(capacity)),
                capacity,
                policy,
                stats,
            }),
            backlog: VecDeque::with_capacity(capacity),
        }
    }

    pub fn sink(&self) -> EventSink {
        EventSink {
            shared: self.shared.clone(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.shared.capacity
    }

    pub fn policy(&self) -> OverflowPolicy {
        self.shared.policy
    }

    pub fn len(&self) -> usize {
        self.shared.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// 取出当前所有事件，按入队顺序迭代
    ///
    /// 交换缓冲区后立刻释放锁，生产端不会被消费速度拖住。
    pub fn drain(&mut self) -> std::collections::vec_deque::Drain<'_, InputEvent> {
        {
            let mut events = self.shared.lock();
            std::mem::swap(&mut *events, &mut self.backlog);
        }
        self.backlog.drain(..)
    }

    pub fn clear(&mut self) {
        self.shared.lock().clear();
        self.backlog.clear();
    }
}
