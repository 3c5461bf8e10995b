use std::path::Path;

use anyhow::Context;
use serde::Deserialize;

use crate::{
    event_router::OverflowPolicy,
    gesture::{GestureConfig, PagingConfig},
    input_devices::{DeviceConfig, ScriptStep, SourceSelection, backend_mock::demo_script},
};

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub source: SourceConfig,
    pub queue: QueueConfig,
    pub gesture: GestureConfig,
    pub paging: PagingConfig,
    pub surface: SurfaceConfig,
    pub script: ScriptConfig,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    pub kind: SourceSelection,
    pub device: DeviceConfig,
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
    pub capacity: usize,
    pub overflow: OverflowPolicy,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            capacity: 256,
            overflow: OverflowPolicy::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct SurfaceConfig {
    pub width: u32,
    pub height: u32,
    /// 翻页的总页数
    pub pages: u32,
}

impl Default for SurfaceConfig {
    fn default() -> Self {
        Self {
            width: 800,
            height: 480,
            pages: 3,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ScriptConfig {
    #[serde(rename = "loop")]
    pub looping: bool,
    pub steps: Vec<ScriptStep>,
}

impl Default for ScriptConfig {
    fn default() -> Self {
        Self {
            looping: true,
            steps: demo_script(),
        }
    }
}

impl Config {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        toml::from_str(&text).with_context(|| format!("failed to parse config {}", path.display()))
    }
}
