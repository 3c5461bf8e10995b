use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AxisError {
    #[error("axis {axis} has a degenerate range [{min}, {max}]")]
    Degenerate {
        axis: &'static str,
        min: i32,
        max: i32,
    },
}

/// 设备打开时查询到的原始坐标范围
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AxisRange {
    pub min: i32,
    pub max: i32,
}

impl AxisRange {
    /// `min >= max` 时无法归一化，视为设备配置错误
    pub fn new(axis: &'static str, min: i32, max: i32) -> Result<Self, AxisError> {
        if min >= max {
            return Err(AxisError::Degenerate { axis, min, max });
        }
        Ok(Self { min, max })
    }

    /// 线性映射到 [0, 1]，越界值被截断
    pub fn normalize(&self, raw: i32) -> f32 {
        let span = (self.max as i64 - self.min as i64) as f32;
        ((raw as i64 - self.min as i64) as f32 / span).clamp(0.0, 1.0)
    }
}

/// 一个触摸设备的坐标几何信息
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DeviceGeometry {
    pub x: AxisRange,
    pub y: AxisRange,
    /// 设备不报告压力时为 `None`，事件压力默认为 1.0
    pub pressure: Option<AxisRange>,
}

impl DeviceGeometry {
    pub fn normalize(&self, x: i32, y: i32) -> (f32, f32) {
        (self.x.normalize(x), self.y.normalize(y))
    }

    pub fn normalize_pressure(&self, raw: Option<i32>) -> Option<f32> {
        match (self.pressure, raw) {
            (Some(range), Some(raw)) => Some(range.normalize(raw)),
            _ => None,
        }
    }
}
