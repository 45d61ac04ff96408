//! Decoded STDF records.
//!
//! Records are produced by an external decoder. This crate only relies on the
//! record kind, the byte offset, and a handful of well-known fields; every
//! other field is carried through untouched in [`Record::fields`].

pub mod kind;

pub use kind::RecordKind;

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::rc::Rc;

/// Shared handle to a decoded record
pub type RecordRef = Rc<Record>;

/// Well-known STDF field names
pub mod fields {
    pub const HEAD_NUM: &str = "head_num";
    pub const SITE_NUM: &str = "site_num";
    pub const TEST_NUM: &str = "test_num";
    pub const PART_CNT: &str = "part_cnt";
    pub const RTST_CNT: &str = "rtst_cnt";
    pub const GOOD_CNT: &str = "good_cnt";
    pub const PART_FLG: &str = "part_flg";
    pub const HARD_BIN: &str = "hard_bin";
    pub const SOFT_BIN: &str = "soft_bin";
    pub const RESULT: &str = "result";
    pub const TEST_FLG: &str = "test_flg";
    pub const WAFER_ID: &str = "wafer_id";
    pub const LOT_ID: &str = "lot_id";
    pub const START_T: &str = "start_t";
    pub const FINISH_T: &str = "finish_t";
}

/// A single decoded field value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Null,
    Bool(bool),
    UInt(u64),
    Int(i64),
    Float(f64),
    Str(String),
}

impl FieldValue {
    pub fn as_u64(&self) -> Option<u64> {
        match *self {
            FieldValue::UInt(v) => Some(v),
            FieldValue::Int(v) => u64::try_from(v).ok(),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match *self {
            FieldValue::Int(v) => Some(v),
            FieldValue::UInt(v) => i64::try_from(v).ok(),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match *self {
            FieldValue::Float(v) => Some(v),
            FieldValue::Int(v) => Some(v as f64),
            FieldValue::UInt(v) => Some(v as f64),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match *self {
            FieldValue::Bool(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            FieldValue::Str(s) => Some(s),
            _ => None,
        }
    }
}

impl From<u8> for FieldValue {
    fn from(v: u8) -> Self {
        FieldValue::UInt(v as u64)
    }
}

impl From<u32> for FieldValue {
    fn from(v: u32) -> Self {
        FieldValue::UInt(v as u64)
    }
}

impl From<u64> for FieldValue {
    fn from(v: u64) -> Self {
        FieldValue::UInt(v)
    }
}

impl From<i64> for FieldValue {
    fn from(v: i64) -> Self {
        FieldValue::Int(v)
    }
}

impl From<f64> for FieldValue {
    fn from(v: f64) -> Self {
        FieldValue::Float(v)
    }
}

impl From<bool> for FieldValue {
    fn from(v: bool) -> Self {
        FieldValue::Bool(v)
    }
}

impl From<&str> for FieldValue {
    fn from(v: &str) -> Self {
        FieldValue::Str(v.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(v: String) -> Self {
        FieldValue::Str(v)
    }
}

/// A decoded record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    /// Position in the stream, assigned when the stream is enumerated
    #[serde(default)]
    pub index: usize,
    /// Byte offset of the record header in the file
    pub offset: u64,
    pub kind: RecordKind,
    /// Kind-specific payload, keyed by lower-case STDF field name
    #[serde(default)]
    pub fields: BTreeMap<String, FieldValue>,
}

impl Record {
    pub fn new(kind: RecordKind, offset: u64) -> Self {
        Self {
            index: 0,
            offset,
            kind,
            fields: BTreeMap::new(),
        }
    }

    pub fn with_field(mut self, name: &str, value: impl Into<FieldValue>) -> Self {
        self.fields.insert(name.to_string(), value.into());
        self
    }

    pub fn with_head_site(self, head: u8, site: u8) -> Self {
        self.with_field(fields::HEAD_NUM, head)
            .with_field(fields::SITE_NUM, site)
    }

    pub fn with_index(mut self, index: usize) -> Self {
        self.index = index;
        self
    }

    pub fn field(&self, name: &str) -> Option<&FieldValue> {
        self.fields.get(name)
    }

    pub fn head(&self) -> Option<u8> {
        self.field(fields::HEAD_NUM)
            .and_then(FieldValue::as_u64)
            .and_then(|v| u8::try_from(v).ok())
    }

    pub fn site(&self) -> Option<u8> {
        self.field(fields::SITE_NUM)
            .and_then(FieldValue::as_u64)
            .and_then(|v| u8::try_from(v).ok())
    }

    /// The (head, site) pair, if the record carries both
    pub fn head_site(&self) -> Option<(u8, u8)> {
        Some((self.head()?, self.site()?))
    }

    /// Whether this record belongs to the given head/site
    pub fn matches_site(&self, head_site: (u8, u8)) -> bool {
        self.head_site() == Some(head_site)
    }
}

/// A raw, restartable record enumerator.
///
/// Every call to [`RecordSource::records`] starts a fresh single forward pass
/// over the underlying log.
pub trait RecordSource {
    fn records(&self) -> Box<dyn Iterator<Item = Record> + '_>;
}

impl RecordSource for [Record] {
    fn records(&self) -> Box<dyn Iterator<Item = Record> + '_> {
        Box::new(self.iter().cloned())
    }
}

impl RecordSource for Vec<Record> {
    fn records(&self) -> Box<dyn Iterator<Item = Record> + '_> {
        self.as_slice().records()
    }
}
