mod clock;
mod event;

pub use clock::MonotonicClock;
pub use event::{
    InputEvent, KeyEvent, KeyState, MAX_FINGERS, NormalizedPointerEvent, PointerKind,
};
