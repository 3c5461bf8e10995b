use std::path::{Path, PathBuf};

use tracing::{debug, info};

use super::device::{DeviceProfile, probe};
use crate::{input_devices::SourceError, touch_driver::TrackingMode};

/// 列出目录下的 `eventN` 节点，按 N 排序
pub fn event_nodes(dir: &Path) -> Result<Vec<PathBuf>, SourceError> {
    let entries = std::fs::read_dir(dir).map_err(|source| SourceError::Scan {
        dir: dir.to_path_buf(),
        source,
    })?;

    let mut nodes: Vec<(u32, PathBuf)> = entries
        .filter_map(Result::ok)
        .filter_map(|entry| {
            let name = entry.file_name();
            let index = name.to_str()?.strip_prefix("event")?.parse::<u32>().ok()?;
            Some((index, entry.path()))
        })
        .collect();
    nodes.sort_by_key(|(index, _)| *index);
    Ok(nodes.into_iter().map(|(_, path)| path).collect())
}

/// 扫描目录，返回第一个多点触控设备；没有的话退回第一个单点触摸设备
pub fn discover(dir: &Path) -> Result<DeviceProfile, SourceError> {
    let mut fallback = None;
    for path in event_nodes(dir)? {
        match probe(&path) {
            Ok(profile) if profile.mode == TrackingMode::MultiTouch => {
                info!(path = %path.display(), name = %profile.name, "found multi-touch device");
                return Ok(profile);
            }
            Ok(profile) => {
                debug!(path = %path.display(), name = %profile.name, "single-touch candidate");
                fallback.get_or_insert(profile);
            }
            Err(err) => debug!(path = %path.display(), %err, "skipping"),
        }
    }
    fallback.ok_or_else(|| SourceError::NoDeviceFound {
        dir: dir.to_path_buf(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_nodes_are_sorted_numerically() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["event10", "event2", "mouse0", "event1", "eventx", "by-id"] {
            std::fs::write(dir.path().join(name), b"").unwrap();
        }
        let names: Vec<_> = event_nodes(dir.path())
            .unwrap()
            .into_iter()
            .map(|path| path.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["event1", "event2", "event10"]);
    }

    #[test]
    fn directory_without_touch_devices_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("event0"), b"not a device").unwrap();
        assert!(matches!(
            discover(dir.path()),
            Err(SourceError::NoDeviceFound { .. })
        ));
    }

    #[test]
    fn missing_directory_is_a_scan_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            discover(&dir.path().join("missing")),
            Err(SourceError::Scan { .. })
        ));
    }
}
