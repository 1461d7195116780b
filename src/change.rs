//! Change notification model.
//!
//! A store surfaces two kinds of change notices: brief device-list changes
//! (which devices wrote) and detailed per-table changes (which primary keys
//! were inserted, updated, or deleted, and where the change came from).
//! Sync operations complete with a per-device result map.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::CodecError;
use crate::value::ScalarValue;

/// A primary-key tuple identifying one changed row.
pub type PrimaryKey = Vec<ScalarValue>;

/// Kind of row mutation a detailed change describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeOp {
    Insert,
    Update,
    Delete,
}

impl ChangeOp {
    /// Number of operation kinds; key sequences are indexed by this range.
    pub const COUNT: usize = 3;

    /// All kinds, in wire order.
    pub const ALL: [Self; Self::COUNT] = [Self::Insert, Self::Update, Self::Delete];

    /// Returns the stable sequence index for this kind.
    #[must_use]
    pub const fn index(self) -> usize {
        match self {
            Self::Insert => 0,
            Self::Update => 1,
            Self::Delete => 2,
        }
    }

    /// Parses a sequence index.
    ///
    /// # Errors
    ///
    /// Returns `CodecError::EnumOutOfRange` if the index is at or beyond
    /// `ChangeOp::COUNT`.
    pub const fn from_index(index: usize) -> Result<Self, CodecError> {
        match index {
            0 => Ok(Self::Insert),
            1 => Ok(Self::Update),
            2 => Ok(Self::Delete),
            _ => Err(CodecError::EnumOutOfRange {
                what: "ChangeOp",
                value: index as i32,
            }),
        }
    }
}

impl std::fmt::Display for ChangeOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Insert => write!(f, "insert"),
            Self::Update => write!(f, "update"),
            Self::Delete => write!(f, "delete"),
        }
    }
}

/// Detailed changes to one table: the primary keys touched by each
/// operation kind, in the order the store observed them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChangedData {
    pub table_name: String,
    primaries: [Vec<PrimaryKey>; ChangeOp::COUNT],
}

impl ChangedData {
    /// Creates an empty change set for the given table.
    #[must_use]
    pub fn new(table_name: impl Into<String>) -> Self {
        Self {
            table_name: table_name.into(),
            primaries: Default::default(),
        }
    }

    /// Primary keys touched by the given operation kind.
    #[must_use]
    pub fn keys(&self, op: ChangeOp) -> &[PrimaryKey] {
        &self.primaries[op.index()]
    }

    /// Appends one primary key under the given operation kind.
    pub fn push_key(&mut self, op: ChangeOp, key: PrimaryKey) {
        self.primaries[op.index()].push(key);
    }

    /// Replaces the key sequence for the given operation kind.
    pub fn set_keys(&mut self, op: ChangeOp, keys: Vec<PrimaryKey>) {
        self.primaries[op.index()] = keys;
    }

    /// Returns true if no operation kind has any keys.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.primaries.iter().all(Vec::is_empty)
    }
}

/// Attribution of a change to its source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Origin {
    Local,
    Remote { device: String },
    Cloud,
}

impl Origin {
    /// Returns the stable wire kind for this origin.
    #[must_use]
    pub const fn kind(&self) -> i32 {
        match self {
            Self::Local => 0,
            Self::Remote { .. } => 1,
            Self::Cloud => 2,
        }
    }

    /// Rebuilds an origin from its wire parts.
    ///
    /// The device string is meaningful only for remote origins and is
    /// ignored otherwise.
    ///
    /// # Errors
    ///
    /// Returns `CodecError::EnumOutOfRange` for kinds outside `[0, 3)`.
    pub fn from_parts(kind: i32, device: String) -> Result<Self, CodecError> {
        match kind {
            0 => Ok(Self::Local),
            1 => Ok(Self::Remote { device }),
            2 => Ok(Self::Cloud),
            _ => Err(CodecError::EnumOutOfRange {
                what: "Origin",
                value: kind,
            }),
        }
    }

    /// The remote device identifier, if this origin is remote.
    #[must_use]
    pub fn device(&self) -> Option<&str> {
        match self {
            Self::Remote { device } => Some(device),
            _ => None,
        }
    }

    pub const fn is_local(&self) -> bool {
        matches!(self, Self::Local)
    }

    pub const fn is_remote(&self) -> bool {
        matches!(self, Self::Remote { .. })
    }

    pub const fn is_cloud(&self) -> bool {
        matches!(self, Self::Cloud)
    }
}

impl std::fmt::Display for Origin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Local => write!(f, "local"),
            Self::Remote { device } => write!(f, "remote({device})"),
            Self::Cloud => write!(f, "cloud"),
        }
    }
}

/// Payload kinds a change notice can carry.
///
/// Brief device-list changes and detailed per-table changes are distinct
/// end to end; one logical mutation may surface as both and consumers
/// must not assume deduplication.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "data", rename_all = "snake_case")]
pub enum ChangePayload {
    /// Identifiers of the devices whose writes changed the store.
    Devices(Vec<String>),
    /// Per-table primary keys plus the attribution of the change.
    Details {
        changes: Vec<ChangedData>,
        origin: Origin,
    },
}

/// One change notification addressed to a store's observers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeNotice {
    pub store_name: String,
    pub payload: ChangePayload,
}

impl ChangeNotice {
    /// Creates a brief device-list notice.
    #[must_use]
    pub fn devices(store_name: impl Into<String>, devices: Vec<String>) -> Self {
        Self {
            store_name: store_name.into(),
            payload: ChangePayload::Devices(devices),
        }
    }

    /// Creates a detailed notice.
    #[must_use]
    pub fn details(
        store_name: impl Into<String>,
        changes: Vec<ChangedData>,
        origin: Origin,
    ) -> Self {
        Self {
            store_name: store_name.into(),
            payload: ChangePayload::Details { changes, origin },
        }
    }
}

/// Result of one sync operation: per-device int32 result codes.
///
/// A completion is delivered as a single atomic event; it is never split
/// across deliveries.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncCompletion {
    pub results: BTreeMap<String, i32>,
}

impl SyncCompletion {
    /// Result code for a device that synced cleanly.
    pub const OK: i32 = 0;

    /// Result code delivered when a pending sync is aborted because the
    /// engine connection was lost.
    pub const INTERRUPTED: i32 = -1;

    /// Creates an empty completion.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records the result code for one device.
    pub fn insert(&mut self, device: impl Into<String>, code: i32) {
        self.results.insert(device.into(), code);
    }

    /// Looks up the result code for one device.
    #[must_use]
    pub fn get(&self, device: &str) -> Option<i32> {
        self.results.get(device).copied()
    }

    /// Number of devices reported on.
    #[must_use]
    pub fn len(&self) -> usize {
        self.results.len()
    }

    /// Returns true if no device results were reported.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    /// Returns true if every reported device finished with `OK`.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.results.values().all(|&code| code == Self::OK)
    }
}

impl FromIterator<(String, i32)> for SyncCompletion {
    fn from_iter<T: IntoIterator<Item = (String, i32)>>(iter: T) -> Self {
        Self {
            results: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_change_op_indices() {
        assert_eq!(ChangeOp::Insert.index(), 0);
        assert_eq!(ChangeOp::Update.index(), 1);
        assert_eq!(ChangeOp::Delete.index(), 2);
        assert_eq!(ChangeOp::from_index(2).unwrap(), ChangeOp::Delete);
        assert!(ChangeOp::from_index(3).is_err());
        assert_eq!(ChangeOp::ALL.len(), ChangeOp::COUNT);
    }

    #[test]
    fn test_changed_data_keys() {
        let mut data = ChangedData::new("orders");
        assert!(data.is_empty());

        data.push_key(ChangeOp::Insert, vec![ScalarValue::Int64(1)]);
        data.push_key(ChangeOp::Insert, vec![ScalarValue::Int64(2)]);
        data.set_keys(ChangeOp::Delete, vec![vec![ScalarValue::Text("k".into())]]);

        assert_eq!(data.keys(ChangeOp::Insert).len(), 2);
        assert!(data.keys(ChangeOp::Update).is_empty());
        assert_eq!(data.keys(ChangeOp::Delete).len(), 1);
        assert!(!data.is_empty());
        assert_eq!(data.table_name, "orders");
    }

    #[test]
    fn test_origin_kinds() {
        assert_eq!(Origin::Local.kind(), 0);
        let remote = Origin::Remote {
            device: "dev-B".into(),
        };
        assert_eq!(remote.kind(), 1);
        assert_eq!(remote.device(), Some("dev-B"));
        assert_eq!(Origin::Cloud.kind(), 2);

        assert_eq!(
            Origin::from_parts(1, "dev-B".into()).unwrap(),
            Origin::Remote {
                device: "dev-B".into()
            }
        );
        assert_eq!(Origin::from_parts(0, String::new()).unwrap(), Origin::Local);
        assert!(Origin::from_parts(3, String::new()).is_err());
        assert!(Origin::from_parts(-1, String::new()).is_err());
    }

    #[test]
    fn test_notice_constructors() {
        let brief = ChangeNotice::devices("orders", vec!["dev-A".into()]);
        assert_eq!(brief.store_name, "orders");
        let ChangePayload::Devices(devices) = &brief.payload else {
            panic!("expected a devices payload");
        };
        assert_eq!(devices.len(), 1);

        let detailed = ChangeNotice::details(
            "orders",
            vec![ChangedData::new("orders")],
            Origin::Cloud,
        );
        let ChangePayload::Details { changes, origin } = &detailed.payload else {
            panic!("expected a details payload");
        };
        assert_eq!(changes.len(), 1);
        assert!(origin.is_cloud());
    }

    #[test]
    fn test_sync_completion() {
        let mut completion = SyncCompletion::new();
        assert!(completion.is_empty());
        completion.insert("dev-A", SyncCompletion::OK);
        completion.insert("dev-B", 13);

        assert_eq!(completion.len(), 2);
        assert_eq!(completion.get("dev-A"), Some(0));
        assert_eq!(completion.get("dev-C"), None);
        assert!(!completion.is_success());

        let clean: SyncCompletion = [("dev-A".to_string(), 0)].into_iter().collect();
        assert!(clean.is_success());
    }

    #[test]
    fn test_notice_serde_round_trip() {
        let mut data = ChangedData::new("test");
        data.push_key(ChangeOp::Update, vec![ScalarValue::Int64(2)]);
        let notice = ChangeNotice::details(
            "test",
            vec![data],
            Origin::Remote {
                device: "dev-B".into(),
            },
        );
        let json = serde_json::to_string(&notice).unwrap();
        let back: ChangeNotice = serde_json::from_str(&json).unwrap();
        assert_eq!(notice, back);
    }
}
