//! 多点触控 slot 跟踪
//!
//! 对应 Linux multi-touch protocol B：`ABS_MT_SLOT` 选择 slot，`ABS_MT_TRACKING_ID` 分配/释放，
//! 坐标和压力只更新状态，到 `SYN_REPORT` 时按 slot 顺序统一产出事件。
//! 不支持 slot 的老设备走单点兼容路径，由 `ABS_X/ABS_Y/BTN_TOUCH` 驱动 slot 0。

use std::sync::Arc;

use tracing::trace;

use super::{
    axis::DeviceGeometry,
    record::{AbsCode, KeyCode, RawRecord, Record, SynCode},
};
use crate::{
    event_model::{NormalizedPointerEvent, PointerKind},
    statistics::InputStatistics,
};

/// slot 池大小，同时也是最多同时触点数
pub const MAX_SLOTS: usize = 10;

const FREE_TRACKING_ID: i32 = -1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackingMode {
    /// protocol B，每个触点一个 slot
    MultiTouch,
    /// 只有 `ABS_X/ABS_Y` 和 `BTN_TOUCH` 的单点设备
    SingleTouch,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct PendingUp {
    x: i32,
    y: i32,
    pressure: Option<i32>,
}

/// 单个 slot 的状态，坐标是设备原始值
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TouchSlot {
    pub tracking_id: i32,
    pub x: i32,
    pub y: i32,
    pub pressure: Option<i32>,
    /// 当前 tracking id 是否已经发出过 `Down`
    pub sent_down: bool,
    /// 本批次内释放的触点，`SYN_REPORT` 时发出 `Up`
    pending_up: Option<PendingUp>,
}

impl TouchSlot {
    const FREE: Self = Self {
        tracking_id: FREE_TRACKING_ID,
        x: 0,
        y: 0,
        pressure: None,
        sent_down: false,
        pending_up: None,
    };

    pub fn is_claimed(&self) -> bool {
        self.tracking_id != FREE_TRACKING_ID
    }
}

pub struct SlotTracker {
    slots: [TouchSlot; MAX_SLOTS],
    current: usize,
    mode: TrackingMode,
    geometry: DeviceGeometry,
    stats: Arc<InputStatistics>,
    /// 收到 `SYN_DROPPED` 后丢弃记录直到下一个 `SYN_REPORT`
    dropping: bool,
}

impl SlotTracker {
    pub fn new(mode: TrackingMode, geometry: DeviceGeometry, stats: Arc<InputStatistics>) -> Self {
        Self {
            slots: [TouchSlot::FREE; MAX_SLOTS],
            current: 0,
            mode,
            geometry,
            stats,
            dropping: false,
        }
    }

    pub fn mode(&self) -> TrackingMode {
        self.mode
    }

    pub fn slots(&self) -> &[TouchSlot] {
        &self.slots
    }

    pub fn active_slot(&self) -> usize {
        self.current
    }

    pub fn claimed(&self) -> usize {
        self.slots.iter().filter(|slot| slot.is_claimed()).count()
    }

    /// 处理一条记录，`SYN_REPORT` 时把产出的事件追加到 `out`
    pub fn feed(&mut self, record: &RawRecord, now_ms: u64, out: &mut Vec<NormalizedPointerEvent>) {
        self.stats.record_decoded();
        let record = record.classify();

        if self.dropping {
            if record == Record::Sync(SynCode::Report) {
                self.dropping = false;
            }
            return;
        }

        match record {
            Record::Sync(SynCode::Report) => self.flush(now_ms, out),
            Record::Sync(SynCode::Dropped) => {
                trace!("kernel buffer overrun, dropping until next report");
                self.stats.sync_dropped();
                self.dropping = true;
            }
            Record::Sync(SynCode::MtReport) => {
                // protocol A 设备不在支持范围内
                self.stats.protocol_anomaly();
            }
            Record::Sync(SynCode::Config) | Record::Misc => {}
            Record::Abs(code, value) => match self.mode {
                TrackingMode::MultiTouch => self.multi_touch_axis(code, value),
                TrackingMode::SingleTouch => self.single_touch_axis(code, value),
            },
            Record::Key(code, value) => {
                if self.mode == TrackingMode::SingleTouch && code == u16::from(KeyCode::BtnTouch) {
                    self.legacy_contact(value != 0);
                }
            }
            Record::Unknown { type_, code, value } => {
                trace!(type_, code, value, "unknown record");
                self.stats.protocol_anomaly();
            }
        }
    }

    fn multi_touch_axis(&mut self, code: AbsCode, value: i32) {
        match code {
            AbsCode::MtSlot => self.select_slot(value),
            AbsCode::MtTrackingId => self.assign_tracking_id(self.current, value),
            AbsCode::MtPositionX => self.slots[self.current].x = value,
            AbsCode::MtPositionY => self.slots[self.current].y = value,
            AbsCode::MtPressure => self.slots[self.current].pressure = Some(value),
            // 内核为老程序模拟的单点轴，这里已经有 slot 数据了
            _ => {}
        }
    }

    fn single_touch_axis(&mut self, code: AbsCode, value: i32) {
        match code {
            AbsCode::X => self.slots[0].x = value,
            AbsCode::Y => self.slots[0].y = value,
            AbsCode::Pressure => self.slots[0].pressure = Some(value),
            _ => {}
        }
    }

    fn select_slot(&mut self, value: i32) {
        let clamped = value.clamp(0, MAX_SLOTS as i32 - 1);
        if clamped != value {
            trace!(value, clamped, "slot index out of range");
            self.stats.protocol_anomaly();
        }
        self.current = clamped as usize;
    }

    fn assign_tracking_id(&mut self, index: usize, tracking_id: i32) {
        if tracking_id == FREE_TRACKING_ID {
            self.release(index);
            return;
        }
        let slot = &mut self.slots[index];
        if slot.tracking_id == tracking_id {
            return;
        }
        if slot.is_claimed() {
            // 没有经过 -1 直接换了 id，相当于旧触点抬起
            self.release(index);
        }
        let slot = &mut self.slots[index];
        // 坐标和压力沿用上一个触点的值，内核不会重发相同的值
        slot.tracking_id = tracking_id;
        slot.sent_down = false;
    }

    fn legacy_contact(&mut self, touching: bool) {
        if touching {
            if !self.slots[0].is_claimed() {
                self.assign_tracking_id(0, 0);
            }
        } else {
            self.release(0);
        }
    }

    fn release(&mut self, index: usize) {
        let slot = &mut self.slots[index];
        if !slot.is_claimed() {
            return;
        }
        if slot.sent_down {
            slot.pending_up = Some(PendingUp {
                x: slot.x,
                y: slot.y,
                pressure: slot.pressure,
            });
        }
        slot.tracking_id = FREE_TRACKING_ID;
        slot.sent_down = false;
    }

    fn flush(&mut self, now_ms: u64, out: &mut Vec<NormalizedPointerEvent>) {
        for (index, slot) in self.slots.iter_mut().enumerate() {
            let finger_id = index as u8;
            if let Some(up) = slot.pending_up.take() {
                let (x, y) = self.geometry.normalize(up.x, up.y);
                let pressure = self.geometry.normalize_pressure(up.pressure);
                out.push(
                    NormalizedPointerEvent::new(PointerKind::Up, finger_id, x, y, now_ms)
                        .with_pressure(pressure),
                );
            }
            if !slot.is_claimed() {
                continue;
            }
            let kind = if slot.sent_down {
                PointerKind::Move
            } else {
                slot.sent_down = true;
                PointerKind::Down
            };
            let (x, y) = self.geometry.normalize(slot.x, slot.y);
            let pressure = self.geometry.normalize_pressure(slot.pressure);
            out.push(
                NormalizedPointerEvent::new(kind, finger_id, x, y, now_ms).with_pressure(pressure),
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::touch_driver::{
        axis::AxisRange,
        record::{
            EventType, RawRecord,
            tests::{abs, raw, syn},
        },
    };

    fn geometry() -> DeviceGeometry {
        DeviceGeometry {
            x: AxisRange::new("x", 0, 1000).unwrap(),
            y: AxisRange::new("y", 0, 1000).unwrap(),
            pressure: Some(AxisRange::new("pressure", 0, 255).unwrap()),
        }
    }

    fn tracker(mode: TrackingMode) -> (SlotTracker, Arc<InputStatistics>) {
        let stats = Arc::new(InputStatistics::new());
        (SlotTracker::new(mode, geometry(), stats.clone()), stats)
    }

    fn run(tracker: &mut SlotTracker, records: &[RawRecord], now_ms: u64) -> Vec<NormalizedPointerEvent> {
        let mut out = Vec::new();
        for record in records {
            tracker.feed(record, now_ms, &mut out);
        }
        out
    }

    fn kinds(events: &[NormalizedPointerEvent]) -> Vec<(PointerKind, u8)> {
        events.iter().map(|e| (e.kind, e.finger_id)).collect()
    }

    fn touch(slot: i32, tracking_id: i32, x: i32, y: i32) -> [RawRecord; 4] {
        [
            abs(AbsCode::MtSlot, slot),
            abs(AbsCode::MtTrackingId, tracking_id),
            abs(AbsCode::MtPositionX, x),
            abs(AbsCode::MtPositionY, y),
        ]
    }

    #[test]
    fn two_slots_released_in_one_report_emit_two_ups_in_slot_order() {
        let (mut tracker, stats) = tracker(TrackingMode::MultiTouch);

        let mut down = touch(0, 5, 100, 200).to_vec();
        down.extend(touch(1, 7, 800, 600));
        down.push(syn());
        let events = run(&mut tracker, &down, 10);
        assert_eq!(
            kinds(&events),
            vec![(PointerKind::Down, 0), (PointerKind::Down, 1)]
        );
        assert!((events[0].x - 0.1).abs() < 1e-6);
        assert!((events[1].y - 0.6).abs() < 1e-6);

        // 释放顺序故意倒过来，输出仍然按 slot 排序
        let release = [
            abs(AbsCode::MtSlot, 1),
            abs(AbsCode::MtTrackingId, -1),
            abs(AbsCode::MtSlot, 0),
            abs(AbsCode::MtTrackingId, -1),
            syn(),
        ];
        let events = run(&mut tracker, &release, 20);
        assert_eq!(kinds(&events), vec![(PointerKind::Up, 0), (PointerKind::Up, 1)]);
        assert!((events[1].x - 0.8).abs() < 1e-6);
        assert_eq!(events[0].timestamp_ms, 20);
        assert_eq!(tracker.claimed(), 0);

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.protocol_anomalies, 0);
        assert_eq!(snapshot.records_decoded, (down.len() + release.len()) as u64);
    }

    #[test]
    fn every_claimed_slot_reports_once_per_sync() {
        let (mut tracker, _) = tracker(TrackingMode::MultiTouch);
        let mut records = touch(3, 11, 10, 10).to_vec();
        records.extend(touch(1, 12, 20, 20));
        records.push(syn());
        run(&mut tracker, &records, 0);

        // 只有 slot 1 移动，slot 3 仍然报一次 Move
        let events = run(
            &mut tracker,
            &[
                abs(AbsCode::MtSlot, 1),
                abs(AbsCode::MtPositionX, 40),
                syn(),
            ],
            16,
        );
        assert_eq!(
            kinds(&events),
            vec![(PointerKind::Move, 1), (PointerKind::Move, 3)]
        );
        assert!((events[0].x - 0.04).abs() < 1e-6);
    }

    #[test]
    fn claim_and_release_inside_one_report_is_silent() {
        let (mut tracker, _) = tracker(TrackingMode::MultiTouch);
        let mut records = touch(0, 1, 10, 10).to_vec();
        records.push(abs(AbsCode::MtTrackingId, -1));
        records.push(syn());
        assert!(run(&mut tracker, &records, 0).is_empty());
    }

    #[test]
    fn replaced_tracking_id_emits_up_before_new_down() {
        let (mut tracker, _) = tracker(TrackingMode::MultiTouch);
        let mut records = touch(2, 40, 500, 500).to_vec();
        records.push(syn());
        run(&mut tracker, &records, 0);

        let mut records = touch(2, 41, 100, 100).to_vec();
        records.push(syn());
        let events = run(&mut tracker, &records, 8);
        assert_eq!(
            kinds(&events),
            vec![(PointerKind::Up, 2), (PointerKind::Down, 2)]
        );
        assert!((events[0].x - 0.5).abs() < 1e-6);
        assert!((events[1].x - 0.1).abs() < 1e-6);
    }

    #[test]
    fn out_of_range_slot_is_clamped_and_counted() {
        let (mut tracker, stats) = tracker(TrackingMode::MultiTouch);
        run(&mut tracker, &[abs(AbsCode::MtSlot, 42)], 0);
        assert_eq!(tracker.active_slot(), MAX_SLOTS - 1);
        run(&mut tracker, &[abs(AbsCode::MtSlot, -3)], 0);
        assert_eq!(tracker.active_slot(), 0);
        assert_eq!(stats.snapshot().protocol_anomalies, 2);
    }

    #[test]
    fn unknown_records_are_counted_and_dropped() {
        let (mut tracker, stats) = tracker(TrackingMode::MultiTouch);
        let events = run(
            &mut tracker,
            &[raw(EventType::Rel, 0, 3), raw(EventType::Abs, 0x28, 1), syn()],
            0,
        );
        assert!(events.is_empty());
        assert_eq!(stats.snapshot().protocol_anomalies, 2);
    }

    #[test]
    fn pressure_is_normalized_and_defaults_to_one() {
        let (mut tracker, _) = tracker(TrackingMode::MultiTouch);
        let mut records = touch(0, 9, 0, 0).to_vec();
        records.push(syn());
        let events = run(&mut tracker, &records, 0);
        assert_eq!(events[0].pressure, 1.0);

        let events = run(&mut tracker, &[abs(AbsCode::MtPressure, 51), syn()], 5);
        assert!((events[0].pressure - 0.2).abs() < 1e-6);
    }

    #[test]
    fn new_contact_in_slot_keeps_previous_pressure() {
        let (mut tracker, _) = tracker(TrackingMode::MultiTouch);
        let mut records = touch(0, 4, 100, 100).to_vec();
        records.push(abs(AbsCode::MtPressure, 102));
        records.push(syn());
        records.push(abs(AbsCode::MtTrackingId, -1));
        records.push(syn());
        run(&mut tracker, &records, 0);

        // 同样的压力不会再发 ABS_MT_PRESSURE
        let events = run(&mut tracker, &[abs(AbsCode::MtTrackingId, 5), syn()], 10);
        assert_eq!(kinds(&events), vec![(PointerKind::Down, 0)]);
        assert!((events[0].pressure - 0.4).abs() < 1e-6);
    }

    #[test]
    fn sync_dropped_discards_until_next_report() {
        let (mut tracker, stats) = tracker(TrackingMode::MultiTouch);
        let mut records = vec![raw(EventType::Syn, SynCode::Dropped.into(), 0)];
        records.extend(touch(0, 3, 10, 10));
        records.push(syn());
        assert!(run(&mut tracker, &records, 0).is_empty());
        assert_eq!(tracker.claimed(), 0);
        assert_eq!(stats.snapshot().sync_dropped, 1);

        let mut records = touch(0, 3, 10, 10).to_vec();
        records.push(syn());
        assert_eq!(
            kinds(&run(&mut tracker, &records, 1)),
            vec![(PointerKind::Down, 0)]
        );
    }

    #[test]
    fn legacy_single_touch_drives_slot_zero() {
        let (mut tracker, _) = tracker(TrackingMode::SingleTouch);
        let btn = |value| raw(EventType::Key, KeyCode::BtnTouch.into(), value);

        let events = run(
            &mut tracker,
            &[btn(1), abs(AbsCode::X, 250), abs(AbsCode::Y, 750), syn()],
            0,
        );
        assert_eq!(kinds(&events), vec![(PointerKind::Down, 0)]);
        assert!((events[0].x - 0.25).abs() < 1e-6);

        // 单点模式下 MT 轴被忽略
        let events = run(
            &mut tracker,
            &[abs(AbsCode::MtPositionX, 999), abs(AbsCode::X, 300), syn()],
            10,
        );
        assert_eq!(kinds(&events), vec![(PointerKind::Move, 0)]);
        assert!((events[0].x - 0.3).abs() < 1e-6);

        let events = run(&mut tracker, &[btn(0), syn()], 20);
        assert_eq!(kinds(&events), vec![(PointerKind::Up, 0)]);
        assert!((events[0].y - 0.75).abs() < 1e-6);
    }

    #[test]
    fn multi_touch_mode_ignores_legacy_emulation() {
        let (mut tracker, _) = tracker(TrackingMode::MultiTouch);
        let events = run(
            &mut tracker,
            &[
                raw(EventType::Key, KeyCode::BtnTouch.into(), 1),
                abs(AbsCode::X, 10),
                syn(),
            ],
            0,
        );
        assert!(events.is_empty());
    }
}
