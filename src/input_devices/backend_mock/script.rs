use std::f32::consts::TAU;

use serde::Deserialize;

use crate::event_model::{NormalizedPointerEvent, PointerKind};

/// 相邻两个步骤之间的间隔
pub const STEP_GAP_MS: u64 = 200;

fn default_tap_ms() -> u64 {
    80
}

fn default_steps() -> u32 {
    8
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct TracePoint {
    pub t_ms: u64,
    pub x: f32,
    pub y: f32,
}

/// 脚本中的一个步骤，坐标都是归一化坐标
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ScriptStep {
    Tap {
        x: f32,
        y: f32,
        #[serde(default = "default_tap_ms")]
        duration_ms: u64,
    },
    Swipe {
        from: (f32, f32),
        to: (f32, f32),
        duration_ms: u64,
        #[serde(default = "default_steps")]
        steps: u32,
    },
    Circle {
        center: (f32, f32),
        radius: f32,
        duration_ms: u64,
        #[serde(default = "default_steps")]
        steps: u32,
    },
    /// 两指水平对称地张开或合拢
    Pinch {
        center: (f32, f32),
        from_span: f32,
        to_span: f32,
        duration_ms: u64,
        #[serde(default = "default_steps")]
        steps: u32,
    },
    /// 逐点给出的单指轨迹，第一个点按下，最后一个点之后 `lift_after_ms` 抬起
    Trace {
        points: Vec<TracePoint>,
        #[serde(default)]
        lift_after_ms: u64,
    },
    Pause {
        duration_ms: u64,
    },
}

/// 相对脚本起点的计划事件
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Scheduled {
    pub at_ms: u64,
    pub kind: PointerKind,
    pub finger_id: u8,
    pub x: f32,
    pub y: f32,
}

impl Scheduled {
    pub fn materialize(&self, origin_ms: u64) -> NormalizedPointerEvent {
        NormalizedPointerEvent::new(
            self.kind,
            self.finger_id,
            self.x.clamp(0.0, 1.0),
            self.y.clamp(0.0, 1.0),
            origin_ms + self.at_ms,
        )
    }
}

fn lerp(a: f32, b: f32, t: f32) -> f32 {
    a + (b - a) * t
}

struct Builder {
    events: Vec<Scheduled>,
    start: u64,
}

impl Builder {
    fn push(&mut self, offset: u64, kind: PointerKind, finger_id: u8, (x, y): (f32, f32)) {
        self.events.push(Scheduled {
            at_ms: self.start + offset,
            kind,
            finger_id,
            x,
            y,
        });
    }

    /// 在 `duration_ms` 内按 `steps` 步采样 `path(t)`，t ∈ (0, 1]
    fn stroke(
        &mut self,
        finger_id: u8,
        duration_ms: u64,
        steps: u32,
        path: impl Fn(f32) -> (f32, f32),
    ) {
        let steps = steps.max(1);
        self.push(0, PointerKind::Down, finger_id, path(0.0));
        for step in 1..=steps {
            let t = step as f32 / steps as f32;
            let offset = duration_ms * step as u64 / steps as u64;
            self.push(offset, PointerKind::Move, finger_id, path(t));
        }
        self.push(duration_ms, PointerKind::Up, finger_id, path(1.0));
    }
}

/// 把脚本展开成按时间排序的事件，返回事件和整段脚本的时长
pub fn expand(script: &[ScriptStep]) -> (Vec<Scheduled>, u64) {
    let mut builder = Builder {
        events: Vec::new(),
        start: 0,
    };

    for (index, step) in script.iter().enumerate() {
        if index > 0 {
            builder.start += STEP_GAP_MS;
        }
        let duration = match step {
            ScriptStep::Tap { x, y, duration_ms } => {
                builder.push(0, PointerKind::Down, 0, (*x, *y));
                builder.push(*duration_ms, PointerKind::Up, 0, (*x, *y));
                *duration_ms
            }
            ScriptStep::Swipe {
                from,
                to,
                duration_ms,
                steps,
            } => {
                let (from, to) = (*from, *to);
                builder.stroke(0, *duration_ms, *steps, |t| {
                    (lerp(from.0, to.0, t), lerp(from.1, to.1, t))
                });
                *duration_ms
            }
            ScriptStep::Circle {
                center,
                radius,
                duration_ms,
                steps,
            } => {
                let (center, radius) = (*center, *radius);
                builder.stroke(0, *duration_ms, *steps, |t| {
                    let angle = t * TAU;
                    (center.0 + radius * angle.cos(), center.1 + radius * angle.sin())
                });
                *duration_ms
            }
            ScriptStep::Pinch {
                center,
                from_span,
                to_span,
                duration_ms,
                steps,
            } => {
                let (center, from_span, to_span) = (*center, *from_span, *to_span);
                let finger = |side: f32| {
                    move |t: f32| (center.0 + side * lerp(from_span, to_span, t) / 2.0, center.1)
                };
                // 两根手指交错排列，保证同一时刻的事件按手指顺序
                let mut left = Builder {
                    events: Vec::new(),
                    start: builder.start,
                };
                left.stroke(0, *duration_ms, *steps, finger(-1.0));
                let mut right = Builder {
                    events: Vec::new(),
                    start: builder.start,
                };
                right.stroke(1, *duration_ms, *steps, finger(1.0));
                for (a, b) in left.events.into_iter().zip(right.events) {
                    builder.events.push(a);
                    builder.events.push(b);
                }
                *duration_ms
            }
            ScriptStep::Trace {
                points,
                lift_after_ms,
            } => match points.split_first() {
                Some((first, rest)) => {
                    builder.push(first.t_ms, PointerKind::Down, 0, (first.x, first.y));
                    let mut last = *first;
                    for point in rest {
                        let t_ms = point.t_ms.max(last.t_ms);
                        builder.push(t_ms, PointerKind::Move, 0, (point.x, point.y));
                        last = TracePoint { t_ms, ..*point };
                    }
                    let end = last.t_ms + lift_after_ms;
                    builder.push(end, PointerKind::Up, 0, (last.x, last.y));
                    end
                }
                None => 0,
            },
            ScriptStep::Pause { duration_ms } => *duration_ms,
        };
        builder.start += duration;
    }

    (builder.events, builder.start)
}

/// 没有配置脚本时使用的演示序列：点击、翻页、滚动、画圈、双指缩放、长按
pub fn demo_script() -> Vec<ScriptStep> {
    vec![
        ScriptStep::Tap {
            x: 0.5,
            y: 0.5,
            duration_ms: default_tap_ms(),
        },
        ScriptStep::Swipe {
            from: (0.8, 0.5),
            to: (0.2, 0.5),
            duration_ms: 240,
            steps: default_steps(),
        },
        ScriptStep::Swipe {
            from: (0.5, 0.7),
            to: (0.5, 0.3),
            duration_ms: 300,
            steps: default_steps(),
        },
        ScriptStep::Circle {
            center: (0.5, 0.5),
            radius: 0.2,
            duration_ms: 600,
            steps: 24,
        },
        ScriptStep::Pinch {
            center: (0.5, 0.5),
            from_span: 0.1,
            to_span: 0.5,
            duration_ms: 300,
            steps: default_steps(),
        },
        ScriptStep::Trace {
            points: vec![TracePoint {
                t_ms: 0,
                x: 0.3,
                y: 0.3,
            }],
            lift_after_ms: 800,
        },
        ScriptStep::Pause { duration_ms: 1000 },
    ]
}
