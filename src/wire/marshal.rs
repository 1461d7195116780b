//! `Marshal` implementations for the domain types.
//!
//! Composites encode as an ordered concatenation of their field
//! encodings; sequences and maps carry a u32 count. Enums travel as
//! int32 and are range-checked through their `from_code` parsers, so an
//! out-of-range code fails the decode instead of saturating.

use crate::bucket::ValuesBucket;
use crate::change::{ChangeOp, ChangedData, Origin, PrimaryKey, SyncCompletion};
use crate::error::CodecError;
use crate::sharing::{Confirmation, Participant, Privilege, Role, SharingCode};
use crate::value::{Asset, AssetStatus, ScalarValue};
use crate::wire::{Marshal, Parcel, ParcelReader};

const TAG_NULL: u8 = 0;
const TAG_BOOL: u8 = 1;
const TAG_INT32: u8 = 2;
const TAG_INT64: u8 = 3;
const TAG_DOUBLE: u8 = 4;
const TAG_TEXT: u8 = 5;
const TAG_BLOB: u8 = 6;
const TAG_ASSET: u8 = 7;
const TAG_RECORD: u8 = 8;

/// Sizes a decode-side `Vec` so a lying count cannot force a huge
/// allocation: every element costs at least one byte of input.
fn seq_capacity(count: usize, reader: &ParcelReader<'_>) -> usize {
    count.min(reader.remaining())
}

impl Marshal for String {
    fn marshal(&self, parcel: &mut Parcel) {
        parcel.write_string(self);
    }

    fn unmarshal(reader: &mut ParcelReader<'_>) -> Result<Self, CodecError> {
        reader.read_string()
    }
}

impl<T: Marshal> Marshal for Vec<T> {
    fn marshal(&self, parcel: &mut Parcel) {
        parcel.write_u32(self.len() as u32);
        for item in self {
            item.marshal(parcel);
        }
    }

    fn unmarshal(reader: &mut ParcelReader<'_>) -> Result<Self, CodecError> {
        let count = reader.read_u32()? as usize;
        let mut items = Self::with_capacity(seq_capacity(count, reader));
        for _ in 0..count {
            items.push(T::unmarshal(reader)?);
        }
        Ok(items)
    }
}

impl Marshal for ScalarValue {
    fn marshal(&self, parcel: &mut Parcel) {
        match self {
            Self::Null => parcel.write_u8(TAG_NULL),
            Self::Bool(v) => {
                parcel.write_u8(TAG_BOOL);
                parcel.write_bool(*v);
            }
            Self::Int32(v) => {
                parcel.write_u8(TAG_INT32);
                parcel.write_i32(*v);
            }
            Self::Int64(v) => {
                parcel.write_u8(TAG_INT64);
                parcel.write_i64(*v);
            }
            Self::Double(v) => {
                parcel.write_u8(TAG_DOUBLE);
                parcel.write_f64(*v);
            }
            Self::Text(v) => {
                parcel.write_u8(TAG_TEXT);
                parcel.write_string(v);
            }
            Self::Blob(v) => {
                parcel.write_u8(TAG_BLOB);
                parcel.write_blob(v);
            }
            Self::Asset(v) => {
                parcel.write_u8(TAG_ASSET);
                v.marshal(parcel);
            }
            Self::Record(v) => {
                parcel.write_u8(TAG_RECORD);
                v.marshal(parcel);
            }
        }
    }

    fn unmarshal(reader: &mut ParcelReader<'_>) -> Result<Self, CodecError> {
        let tag = reader.read_u8()?;
        match tag {
            TAG_NULL => Ok(Self::Null),
            TAG_BOOL => Ok(Self::Bool(reader.read_bool()?)),
            TAG_INT32 => Ok(Self::Int32(reader.read_i32()?)),
            TAG_INT64 => Ok(Self::Int64(reader.read_i64()?)),
            TAG_DOUBLE => Ok(Self::Double(reader.read_f64()?)),
            TAG_TEXT => Ok(Self::Text(reader.read_string()?)),
            TAG_BLOB => Ok(Self::Blob(reader.read_blob()?)),
            TAG_ASSET => Ok(Self::Asset(Asset::unmarshal(reader)?)),
            TAG_RECORD => Ok(Self::Record(ValuesBucket::unmarshal(reader)?)),
            tag => Err(CodecError::UnknownTag { tag }),
        }
    }
}

impl Marshal for AssetStatus {
    fn marshal(&self, parcel: &mut Parcel) {
        parcel.write_i32(self.code());
    }

    fn unmarshal(reader: &mut ParcelReader<'_>) -> Result<Self, CodecError> {
        Self::from_code(reader.read_i32()?)
    }
}

// The first five fields and their order are the wire contract shared with
// other language bindings; the trailing three complete the value so the
// round-trip law holds for non-default metadata.
impl Marshal for Asset {
    fn marshal(&self, parcel: &mut Parcel) {
        parcel.write_i32(self.version);
        parcel.write_string(&self.name);
        parcel.write_i64(self.size);
        parcel.write_i64(self.modify_time);
        parcel.write_string(&self.uri);
        parcel.write_i64(self.create_time);
        parcel.write_string(&self.hash);
        self.status.marshal(parcel);
    }

    fn unmarshal(reader: &mut ParcelReader<'_>) -> Result<Self, CodecError> {
        let version = reader.read_i32()?;
        let name = reader.read_string()?;
        let size = reader.read_i64()?;
        let modify_time = reader.read_i64()?;
        let uri = reader.read_string()?;
        let create_time = reader.read_i64()?;
        let hash = reader.read_string()?;
        let status = AssetStatus::unmarshal(reader)?;
        Ok(Self {
            version,
            name,
            uri,
            create_time,
            modify_time,
            size,
            hash,
            status,
        })
    }
}

impl Marshal for ValuesBucket {
    fn marshal(&self, parcel: &mut Parcel) {
        parcel.write_u32(self.len() as u32);
        for (name, value) in self.iter() {
            parcel.write_string(name);
            value.marshal(parcel);
        }
    }

    fn unmarshal(reader: &mut ParcelReader<'_>) -> Result<Self, CodecError> {
        let count = reader.read_u32()? as usize;
        let mut bucket = Self::new();
        for _ in 0..count {
            let name = reader.read_string()?;
            let value = ScalarValue::unmarshal(reader)?;
            bucket.put(name, value);
        }
        Ok(bucket)
    }
}

impl Marshal for ChangedData {
    fn marshal(&self, parcel: &mut Parcel) {
        parcel.write_string(&self.table_name);
        for op in ChangeOp::ALL {
            let keys = self.keys(op);
            parcel.write_u32(keys.len() as u32);
            for key in keys {
                key.marshal(parcel);
            }
        }
    }

    fn unmarshal(reader: &mut ParcelReader<'_>) -> Result<Self, CodecError> {
        let table_name = reader.read_string()?;
        let mut data = Self::new(table_name);
        for op in ChangeOp::ALL {
            data.set_keys(op, Vec::<PrimaryKey>::unmarshal(reader)?);
        }
        Ok(data)
    }
}

impl Marshal for Origin {
    fn marshal(&self, parcel: &mut Parcel) {
        parcel.write_i32(self.kind());
        parcel.write_string(self.device().unwrap_or(""));
    }

    fn unmarshal(reader: &mut ParcelReader<'_>) -> Result<Self, CodecError> {
        let kind = reader.read_i32()?;
        let device = reader.read_string()?;
        Self::from_parts(kind, device)
    }
}

impl Marshal for SyncCompletion {
    fn marshal(&self, parcel: &mut Parcel) {
        parcel.write_u32(self.len() as u32);
        for (device, code) in &self.results {
            parcel.write_string(device);
            parcel.write_i32(*code);
        }
    }

    fn unmarshal(reader: &mut ParcelReader<'_>) -> Result<Self, CodecError> {
        let count = reader.read_u32()? as usize;
        let mut completion = Self::new();
        for _ in 0..count {
            let device = reader.read_string()?;
            let code = reader.read_i32()?;
            completion.insert(device, code);
        }
        Ok(completion)
    }
}

impl Marshal for Privilege {
    fn marshal(&self, parcel: &mut Parcel) {
        parcel.write_bool(self.writable);
        parcel.write_bool(self.readable);
        parcel.write_bool(self.creatable);
        parcel.write_bool(self.deletable);
        parcel.write_bool(self.shareable);
    }

    fn unmarshal(reader: &mut ParcelReader<'_>) -> Result<Self, CodecError> {
        Ok(Self {
            writable: reader.read_bool()?,
            readable: reader.read_bool()?,
            creatable: reader.read_bool()?,
            deletable: reader.read_bool()?,
            shareable: reader.read_bool()?,
        })
    }
}

impl Marshal for Role {
    fn marshal(&self, parcel: &mut Parcel) {
        parcel.write_i32(self.code());
    }

    fn unmarshal(reader: &mut ParcelReader<'_>) -> Result<Self, CodecError> {
        Self::from_code(reader.read_i32()?)
    }
}

impl Marshal for Confirmation {
    fn marshal(&self, parcel: &mut Parcel) {
        parcel.write_i32(self.code());
    }

    fn unmarshal(reader: &mut ParcelReader<'_>) -> Result<Self, CodecError> {
        Self::from_code(reader.read_i32()?)
    }
}

impl Marshal for SharingCode {
    fn marshal(&self, parcel: &mut Parcel) {
        parcel.write_i32(self.code());
    }

    fn unmarshal(reader: &mut ParcelReader<'_>) -> Result<Self, CodecError> {
        Self::from_code(reader.read_i32()?)
    }
}

impl Marshal for Participant {
    fn marshal(&self, parcel: &mut Parcel) {
        parcel.write_string(&self.identity);
        self.role.marshal(parcel);
        self.status.marshal(parcel);
        self.privilege.marshal(parcel);
        parcel.write_string(&self.attach_info);
    }

    fn unmarshal(reader: &mut ParcelReader<'_>) -> Result<Self, CodecError> {
        let identity = reader.read_string()?;
        let role = Role::unmarshal(reader)?;
        let status = Confirmation::unmarshal(reader)?;
        let privilege = Privilege::unmarshal(reader)?;
        let attach_info = reader.read_string()?;
        Ok(Self {
            identity,
            role,
            status,
            privilege,
            attach_info,
        })
    }
}
