//! ServiceSnapshot - Capture Orchestrator 发布的只读状态
//!
//! 每个 tick 整体替换一次, 供外部 (dashboard/API) 读取。

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::{DetectionKind, ExposureMetrics, ExposureState};

/// 服务状态快照
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ServiceSnapshot {
    /// 冷却期内的告警状态
    pub detecting: bool,

    /// 最近一次检测的时间戳
    pub last_detection_ts: Option<f64>,

    /// 最近一帧的时间戳
    pub last_frame_ts: Option<f64>,

    /// 已处理帧数
    pub total_frames: u64,

    /// 已提交保存的帧数
    pub saved_images: u64,

    /// 当前是否布防
    pub armed: bool,

    pub exposure_state: ExposureState,
    pub exposure: ExposureMetrics,

    /// 当前检测间隔 (每 N 帧检测一次)
    pub detect_stride: u32,

    /// 按类型累计的检测次数
    pub detection_counts: BTreeMap<DetectionKind, u64>,

    pub bias: f64,
    pub gain: f64,
    pub shutter_us: f64,
    pub shutter_manual: bool,

    /// 调整窗口是否暂停了检测
    pub paused: bool,
    pub reseed_pending: bool,
}

impl ServiceSnapshot {
    pub fn detections_of(&self, kind: DetectionKind) -> u64 {
        self.detection_counts.get(&kind).copied().unwrap_or(0)
    }

    pub fn total_detections(&self) -> u64 {
        self.detection_counts.values().sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_json_uses_kind_keys() {
        let mut snapshot = ServiceSnapshot::default();
        snapshot.detection_counts.insert(DetectionKind::Motion, 3);
        snapshot.detection_counts.insert(DetectionKind::FullFrame, 1);

        let json = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(json["detection_counts"]["motion"], 3);
        assert_eq!(json["detection_counts"]["full_frame"], 1);
        assert_eq!(snapshot.total_detections(), 4);
    }
}
