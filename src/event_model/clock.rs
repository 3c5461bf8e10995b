use std::time::Instant;

/// 子系统启动以来的单调毫秒时钟
///
/// `Copy` 的，输入源线程和 UI 线程各拿一份，读到的是同一个时间轴。
#[derive(Debug, Clone, Copy)]
pub struct MonotonicClock {
    start: Instant,
}

impl MonotonicClock {
    pub fn start() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    pub fn now_ms(&self) -> u64 {
        self.start.elapsed().as_millis() as u64
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::start()
    }
}
