//! Wire codec for notification parcels.
//!
//! Everything crossing the notification boundary is encoded as:
//! - little-endian fixed-width primitives
//! - u32 length-prefixed strings and blobs
//! - 1-byte tags for scalar values
//! - int32 enums, range-checked on decode
//!
//! Composite types encode as an ordered concatenation of their field
//! encodings. Field order is part of the wire contract and never changes.

pub mod frame;
pub mod marshal;
pub mod parcel;

pub use frame::{Frame, StreamConfig};
pub use parcel::{Parcel, ParcelReader};

use crate::error::CodecError;

/// Types that cross the wire inside notification parcels.
pub trait Marshal: Sized {
    /// Appends this value's encoding to the parcel.
    fn marshal(&self, parcel: &mut Parcel);

    /// Decodes one value from the reader.
    ///
    /// # Errors
    ///
    /// Returns a `CodecError` describing the first malformed byte.
    fn unmarshal(reader: &mut ParcelReader<'_>) -> Result<Self, CodecError>;
}
