use serde::Deserialize;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default)]
pub struct PagingConfig {
    /// 首页向右、末页向左拖动时的跟手比例
    pub elastic_resistance: f32,
    /// 松手时位移超过屏幕宽度的这个比例才翻页
    pub commit_fraction: f32,
}

impl Default for PagingConfig {
    fn default() -> Self {
        Self {
            elastic_resistance: 0.3,
            commit_fraction: 0.3,
        }
    }
}

/// 松手后的结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageOutcome {
    Changed { from: u32, to: u32 },
    SnappedBack,
}

/// 横向滑动驱动的翻页
///
/// `offset` 是页面当前跟手的偏移，单位是屏幕宽度。向左滑(负位移)翻到下一页。
#[derive(Debug, Clone)]
pub struct PageSwiper {
    config: PagingConfig,
    page_count: u32,
    current: u32,
    offset: f32,
}

impl PageSwiper {
    pub fn new(config: PagingConfig, page_count: u32) -> Self {
        Self {
            config,
            page_count: page_count.max(1),
            current: 0,
            offset: 0.0,
        }
    }

    pub fn current_page(&self) -> u32 {
        self.current
    }

    pub fn page_count(&self) -> u32 {
        self.page_count
    }

    pub fn offset(&self) -> f32 {
        self.offset
    }

    pub fn set_page_count(&mut self, page_count: u32) {
        self.page_count = page_count.max(1);
        self.current = self.current.min(self.page_count - 1);
    }

    fn at_edge(&self, delta: f32) -> bool {
        (delta > 0.0 && self.current == 0) || (delta < 0.0 && self.current + 1 >= self.page_count)
    }

    /// 处理一次横向滑动回调，只有 `complete` 时才可能返回结果
    pub fn on_swipe(&mut self, delta: f32, complete: bool) -> Option<PageOutcome> {
        if !complete {
            self.offset = if self.at_edge(delta) {
                delta * self.config.elastic_resistance
            } else {
                delta
            };
            return None;
        }

        self.offset = 0.0;
        if delta.abs() <= self.config.commit_fraction || self.at_edge(delta) {
            debug!(delta, page = self.current, "swipe snapped back");
            return Some(PageOutcome::SnappedBack);
        }
        let from = self.current;
        self.current = if delta < 0.0 { from + 1 } else { from - 1 };
        debug!(from, to = self.current, "page changed");
        Some(PageOutcome::Changed {
            from,
            to: self.current,
        })
    }

    /// 手势被取消时回到原位
    pub fn reset_offset(&mut self) {
        self.offset = 0.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn follows_finger_between_pages() {
        let mut swiper = PageSwiper::new(PagingConfig::default(), 3);
        assert_eq!(swiper.on_swipe(-0.2, false), None);
        assert_eq!(swiper.offset(), -0.2);
    }

    #[test]
    fn resists_past_first_and_last_page() {
        let mut swiper = PageSwiper::new(PagingConfig::default(), 2);
        swiper.on_swipe(0.5, false);
        assert!((swiper.offset() - 0.15).abs() < 1e-6);

        assert_eq!(
            swiper.on_swipe(-0.5, true),
            Some(PageOutcome::Changed { from: 0, to: 1 })
        );
        swiper.on_swipe(-0.5, false);
        assert!((swiper.offset() + 0.15).abs() < 1e-6);
        assert_eq!(swiper.on_swipe(-0.9, true), Some(PageOutcome::SnappedBack));
        assert_eq!(swiper.current_page(), 1);
        assert_eq!(swiper.offset(), 0.0);
    }

    #[test]
    fn short_swipe_snaps_back() {
        let mut swiper = PageSwiper::new(PagingConfig::default(), 3);
        assert_eq!(swiper.on_swipe(-0.3, true), Some(PageOutcome::SnappedBack));
        assert_eq!(swiper.current_page(), 0);
        assert_eq!(
            swiper.on_swipe(-0.31, true),
            Some(PageOutcome::Changed { from: 0, to: 1 })
        );
        assert_eq!(
            swiper.on_swipe(0.8, true),
            Some(PageOutcome::Changed { from: 1, to: 0 })
        );
    }

    #[test]
    fn shrinking_page_count_clamps_current() {
        let mut swiper = PageSwiper::new(PagingConfig::default(), 5);
        swiper.on_swipe(-0.5, true);
        swiper.on_swipe(-0.5, true);
        swiper.set_page_count(2);
        assert_eq!(swiper.current_page(), 1);
        swiper.set_page_count(0);
        assert_eq!(swiper.page_count(), 1);
        assert_eq!(swiper.current_page(), 0);
    }
}
