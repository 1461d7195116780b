//! Scalar values carried in change notifications.
//!
//! The value palette is closed: these are exactly the types a store row
//! can hand across the notification boundary, including asset descriptors
//! and nested records.

use serde::{Deserialize, Serialize};

use crate::bucket::ValuesBucket;
use crate::error::CodecError;

/// Lifecycle state of an asset attachment.
///
/// Carried as an int32 on the wire and range-checked on decode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssetStatus {
    Normal,
    Downloading,
    Abnormal,
    Insert,
    Delete,
    Update,
}

impl AssetStatus {
    /// Returns the stable wire code for this status.
    #[must_use]
    pub const fn code(self) -> i32 {
        match self {
            Self::Normal => 0,
            Self::Downloading => 1,
            Self::Abnormal => 2,
            Self::Insert => 3,
            Self::Delete => 4,
            Self::Update => 5,
        }
    }

    /// Parses a wire code.
    ///
    /// # Errors
    ///
    /// Returns `CodecError::EnumOutOfRange` for codes outside the defined set.
    pub const fn from_code(code: i32) -> Result<Self, CodecError> {
        match code {
            0 => Ok(Self::Normal),
            1 => Ok(Self::Downloading),
            2 => Ok(Self::Abnormal),
            3 => Ok(Self::Insert),
            4 => Ok(Self::Delete),
            5 => Ok(Self::Update),
            _ => Err(CodecError::EnumOutOfRange {
                what: "AssetStatus",
                value: code,
            }),
        }
    }
}

impl Default for AssetStatus {
    fn default() -> Self {
        Self::Normal
    }
}

/// Descriptor of an asset attachment referenced by a store row.
///
/// Assets are immutable value types here; the bytes they name travel on
/// a different channel.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Asset {
    pub version: i32,
    pub name: String,
    pub uri: String,
    pub create_time: i64,
    pub modify_time: i64,
    pub size: i64,
    pub hash: String,
    pub status: AssetStatus,
}

impl Asset {
    /// Creates an asset with the given name and URI; all other fields default.
    #[must_use]
    pub fn new(name: impl Into<String>, uri: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            uri: uri.into(),
            ..Self::default()
        }
    }
}

/// Possible values a store row field can hold.
///
/// # Examples
///
/// ```
/// use syncbell::ScalarValue;
///
/// let bool_val = ScalarValue::Bool(true);
/// let int_val = ScalarValue::Int64(42);
/// let text_val = ScalarValue::Text("hello".to_string());
///
/// assert!(bool_val.is_bool());
/// assert!(int_val.is_int64());
/// assert!(text_val.is_text());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum ScalarValue {
    Null,
    Bool(bool),
    Int32(i32),
    Int64(i64),
    Double(f64),
    Text(String),
    Blob(Vec<u8>),
    Asset(Asset),
    Record(ValuesBucket),
}

impl ScalarValue {
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    pub const fn is_bool(&self) -> bool {
        matches!(self, Self::Bool(_))
    }

    pub const fn is_int32(&self) -> bool {
        matches!(self, Self::Int32(_))
    }

    pub const fn is_int64(&self) -> bool {
        matches!(self, Self::Int64(_))
    }

    pub const fn is_double(&self) -> bool {
        matches!(self, Self::Double(_))
    }

    pub const fn is_text(&self) -> bool {
        matches!(self, Self::Text(_))
    }

    pub const fn is_blob(&self) -> bool {
        matches!(self, Self::Blob(_))
    }

    pub const fn is_asset(&self) -> bool {
        matches!(self, Self::Asset(_))
    }

    pub const fn is_record(&self) -> bool {
        matches!(self, Self::Record(_))
    }

    pub const fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(v) => Some(*v),
            _ => None,
        }
    }

    pub const fn as_int32(&self) -> Option<i32> {
        match self {
            Self::Int32(v) => Some(*v),
            _ => None,
        }
    }

    pub const fn as_int64(&self) -> Option<i64> {
        match self {
            Self::Int64(v) => Some(*v),
            Self::Int32(v) => Some(*v as i64),
            _ => None,
        }
    }

    pub const fn as_double(&self) -> Option<f64> {
        match self {
            Self::Double(v) => Some(*v),
            Self::Int32(v) => Some(*v as f64),
            Self::Int64(v) => Some(*v as f64),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_blob(&self) -> Option<&[u8]> {
        match self {
            Self::Blob(v) => Some(v),
            _ => None,
        }
    }

    pub const fn as_asset(&self) -> Option<&Asset> {
        match self {
            Self::Asset(v) => Some(v),
            _ => None,
        }
    }

    pub const fn as_record(&self) -> Option<&ValuesBucket> {
        match self {
            Self::Record(v) => Some(v),
            _ => None,
        }
    }

    /// Returns a human-readable type name.
    #[must_use]
    pub const fn type_name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "bool",
            Self::Int32(_) => "int32",
            Self::Int64(_) => "int64",
            Self::Double(_) => "double",
            Self::Text(_) => "text",
            Self::Blob(_) => "blob",
            Self::Asset(_) => "asset",
            Self::Record(_) => "record",
        }
    }
}

impl Default for ScalarValue {
    fn default() -> Self {
        Self::Null
    }
}

impl std::fmt::Display for ScalarValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Null => write!(f, "null"),
            Self::Bool(v) => write!(f, "{v}"),
            Self::Int32(v) => write!(f, "{v}"),
            Self::Int64(v) => write!(f, "{v}"),
            Self::Double(v) => write!(f, "{v}"),
            Self::Text(v) => write!(f, "{v:?}"),
            Self::Blob(v) => write!(f, "blob[{}]", v.len()),
            Self::Asset(v) => write!(f, "asset:{}", v.name),
            Self::Record(v) => write!(f, "record[{}]", v.len()),
        }
    }
}

// Convenient From implementations
impl From<bool> for ScalarValue {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<i32> for ScalarValue {
    fn from(v: i32) -> Self {
        Self::Int32(v)
    }
}

impl From<i64> for ScalarValue {
    fn from(v: i64) -> Self {
        Self::Int64(v)
    }
}

impl From<f64> for ScalarValue {
    fn from(v: f64) -> Self {
        Self::Double(v)
    }
}

impl From<String> for ScalarValue {
    fn from(v: String) -> Self {
        Self::Text(v)
    }
}

impl From<&str> for ScalarValue {
    fn from(v: &str) -> Self {
        Self::Text(v.to_string())
    }
}

impl From<Vec<u8>> for ScalarValue {
    fn from(v: Vec<u8>) -> Self {
        Self::Blob(v)
    }
}

impl From<Asset> for ScalarValue {
    fn from(v: Asset) -> Self {
        Self::Asset(v)
    }
}

impl From<ValuesBucket> for ScalarValue {
    fn from(v: ValuesBucket) -> Self {
        Self::Record(v)
    }
}
