//! 内核 `struct input_event` 解码
//!
//! 记录布局是 `timeval` (两个 `c_long`) 加 `type: u16`, `code: u16`, `value: i32`，本机字节序。

use std::{iter::FusedIterator, mem::size_of};

use num_enum::{IntoPrimitive, TryFromPrimitive};

const LONG: usize = size_of::<libc::c_long>();

/// 一条记录的字节数，64 位系统上是 24
pub const RECORD_SIZE: usize = 2 * LONG + 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq, TryFromPrimitive, IntoPrimitive)]
#[repr(u16)]
pub enum EventType {
    Syn = 0x00,
    Key = 0x01,
    Rel = 0x02,
    Abs = 0x03,
    Msc = 0x04,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, TryFromPrimitive, IntoPrimitive)]
#[repr(u16)]
pub enum SynCode {
    Report = 0,
    Config = 1,
    MtReport = 2,
    Dropped = 3,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, TryFromPrimitive, IntoPrimitive)]
#[repr(u16)]
pub enum AbsCode {
    X = 0x00,
    Y = 0x01,
    Pressure = 0x18,
    MtSlot = 0x2f,
    MtTouchMajor = 0x30,
    MtTouchMinor = 0x31,
    MtWidthMajor = 0x32,
    MtWidthMinor = 0x33,
    MtOrientation = 0x34,
    MtPositionX = 0x35,
    MtPositionY = 0x36,
    MtToolType = 0x37,
    MtBlobId = 0x38,
    MtTrackingId = 0x39,
    MtPressure = 0x3a,
    MtDistance = 0x3b,
    MtToolX = 0x3c,
    MtToolY = 0x3d,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, TryFromPrimitive, IntoPrimitive)]
#[repr(u16)]
pub enum KeyCode {
    BtnTouch = 0x14a,
}

/// 解码后、尚未分类的记录
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawRecord {
    pub sec: i64,
    pub usec: i64,
    pub type_: u16,
    pub code: u16,
    pub value: i32,
}

/// 分类后的记录
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Record {
    Sync(SynCode),
    Abs(AbsCode, i32),
    /// 原始按键码，触摸屏上通常只关心 `BTN_TOUCH`
    Key(u16, i32),
    /// `EV_MSC`(比如 `MSC_TIMESTAMP`)，合法但用不上
    Misc,
    Unknown { type_: u16, code: u16, value: i32 },
}

fn read_long(bytes: &[u8]) -> i64 {
    let mut raw = [0u8; LONG];
    raw.copy_from_slice(&bytes[..LONG]);
    libc::c_long::from_ne_bytes(raw) as i64
}

impl RawRecord {
    /// 从恰好 `RECORD_SIZE` 字节的切片里解码，长度不对返回 `None`
    pub fn decode(bytes: &[u8]) -> Option<Self> {
        if bytes.len() != RECORD_SIZE {
            return None;
        }
        let (time, rest) = bytes.split_at(2 * LONG);
        Some(Self {
            sec: read_long(&time[..LONG]),
            usec: read_long(&time[LONG..]),
            type_: u16::from_ne_bytes([rest[0], rest[1]]),
            code: u16::from_ne_bytes([rest[2], rest[3]]),
            value: i32::from_ne_bytes([rest[4], rest[5], rest[6], rest[7]]),
        })
    }

    pub fn classify(&self) -> Record {
        let unknown = Record::Unknown {
            type_: self.type_,
            code: self.code,
            value: self.value,
        };
        match EventType::try_from(self.type_) {
            Ok(EventType::Syn) => SynCode::try_from(self.code)
                .map(Record::Sync)
                .unwrap_or(unknown),
            Ok(EventType::Abs) => AbsCode::try_from(self.code)
                .map(|code| Record::Abs(code, self.value))
                .unwrap_or(unknown),
            Ok(EventType::Key) => Record::Key(self.code, self.value),
            Ok(EventType::Msc) => Record::Misc,
            Ok(EventType::Rel) | Err(_) => unknown,
        }
    }

    #[cfg(test)]
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(RECORD_SIZE);
        out.extend_from_slice(&(self.sec as libc::c_long).to_ne_bytes());
        out.extend_from_slice(&(self.usec as libc::c_long).to_ne_bytes());
        out.extend_from_slice(&self.type_.to_ne_bytes());
        out.extend_from_slice(&self.code.to_ne_bytes());
        out.extend_from_slice(&self.value.to_ne_bytes());
        out
    }
}

/// 一次 `read()` 得到的缓冲区里的完整记录
///
/// 不分配内存。结尾不足一条记录的字节由 [`Records::trailing_bytes`] 报告，由调用方计数后丢弃。
pub struct Records<'a> {
    chunks: std::slice::ChunksExact<'a, u8>,
}

impl<'a> Records<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self {
            chunks: buf.chunks_exact(RECORD_SIZE),
        }
    }

    pub fn trailing_bytes(&self) -> usize {
        self.chunks.remainder().len()
    }
}

impl Iterator for Records<'_> {
    type Item = RawRecord;

    fn next(&mut self) -> Option<RawRecord> {
        self.chunks.next().and_then(RawRecord::decode)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.chunks.size_hint()
    }
}

impl FusedIterator for Records<'_> {}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub fn raw(type_: EventType, code: u16, value: i32) -> RawRecord {
        RawRecord {
            sec: 1_700_000_000,
            usec: 250_000,
            type_: type_.into(),
            code,
            value,
        }
    }

    pub fn abs(code: AbsCode, value: i32) -> RawRecord {
        raw(EventType::Abs, code.into(), value)
    }

    pub fn syn() -> RawRecord {
        raw(EventType::Syn, SynCode::Report.into(), 0)
    }

    #[test]
    fn record_size_matches_kernel_struct() {
        assert_eq!(RECORD_SIZE, size_of::<libc::input_event>());
    }

    #[test]
    fn decodes_fields_in_native_order() {
        let record = abs(AbsCode::MtTrackingId, -1);
        let decoded = RawRecord::decode(&record.encode()).unwrap();
        assert_eq!(decoded, record);
        assert_eq!(decoded.classify(), Record::Abs(AbsCode::MtTrackingId, -1));
    }

    #[test]
    fn short_buffer_is_reported_not_decoded() {
        let mut buf = abs(AbsCode::MtPositionX, 100).encode();
        buf.extend_from_slice(&syn().encode());
        buf.extend_from_slice(&[0u8; 5]);

        let mut records = Records::new(&buf);
        assert_eq!(records.by_ref().count(), 2);
        assert_eq!(records.trailing_bytes(), 5);
        assert!(RawRecord::decode(&buf[..RECORD_SIZE - 1]).is_none());
    }

    #[test]
    fn classifies_unknown_and_ignored_records() {
        assert_eq!(raw(EventType::Msc, 0x05, 1234).classify(), Record::Misc);
        assert_eq!(
            raw(EventType::Abs, 0x28, 7).classify(),
            Record::Unknown {
                type_: 3,
                code: 0x28,
                value: 7
            }
        );
        assert!(matches!(
            RawRecord {
                type_: 0x15,
                ..syn()
            }
            .classify(),
            Record::Unknown { type_: 0x15, .. }
        ));
        assert_eq!(
            raw(EventType::Key, KeyCode::BtnTouch.into(), 1).classify(),
            Record::Key(0x14a, 1)
        );
        assert_eq!(
            raw(EventType::Syn, SynCode::Dropped.into(), 0).classify(),
            Record::Sync(SynCode::Dropped)
        );
    }
}
