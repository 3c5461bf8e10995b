//! 把归一化的指针事件流分类成点击、纵向拖动、横向翻页和长按
//!
//! 状态机只在 UI 线程上运行。长按是唯一由时间触发的转换，靠消费端每轮调用 [`GestureClassifier::tick`] 检测。

mod classifier;
mod paging;

pub use classifier::{
    GestureClassifier, GestureConfig, GestureContext, GestureEvent, HitTest, Origin, Phase,
};
pub use paging::{PageOutcome, PageSwiper, PagingConfig};
