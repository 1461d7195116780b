//! Collaboration model for shared stores.
//!
//! Participants, their privileges, and the result codes of sharing
//! operations. Every enum here crosses the wire as an int32 and is
//! range-checked on decode; out-of-range codes fail instead of
//! saturating.

use serde::{Deserialize, Serialize};

use crate::error::CodecError;

/// Role of a participant in a shared store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Inviter,
    Invitee,
}

impl Role {
    /// Returns the stable wire code for this role.
    #[must_use]
    pub const fn code(self) -> i32 {
        match self {
            Self::Inviter => 0,
            Self::Invitee => 1,
        }
    }

    /// Parses a wire code.
    ///
    /// # Errors
    ///
    /// Returns `CodecError::EnumOutOfRange` for codes outside the defined set.
    pub const fn from_code(code: i32) -> Result<Self, CodecError> {
        match code {
            0 => Ok(Self::Inviter),
            1 => Ok(Self::Invitee),
            _ => Err(CodecError::EnumOutOfRange {
                what: "Role",
                value: code,
            }),
        }
    }
}

/// Invitation state of a participant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Confirmation {
    Unknown,
    Accepted,
    Rejected,
    Suspended,
    Unavailable,
}

impl Confirmation {
    /// Returns the stable wire code for this state.
    #[must_use]
    pub const fn code(self) -> i32 {
        match self {
            Self::Unknown => 0,
            Self::Accepted => 1,
            Self::Rejected => 2,
            Self::Suspended => 3,
            Self::Unavailable => 4,
        }
    }

    /// Parses a wire code.
    ///
    /// # Errors
    ///
    /// Returns `CodecError::EnumOutOfRange` for codes outside the defined set.
    pub const fn from_code(code: i32) -> Result<Self, CodecError> {
        match code {
            0 => Ok(Self::Unknown),
            1 => Ok(Self::Accepted),
            2 => Ok(Self::Rejected),
            3 => Ok(Self::Suspended),
            4 => Ok(Self::Unavailable),
            _ => Err(CodecError::EnumOutOfRange {
                what: "Confirmation",
                value: code,
            }),
        }
    }
}

impl Default for Confirmation {
    fn default() -> Self {
        Self::Unknown
    }
}

/// Result code of a sharing operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SharingCode {
    Success,
    RepeatedRequest,
    NotInviter,
    NotInviterOrInvitee,
    OverQuota,
    TooManyParticipants,
    InvalidArgs,
    NetworkError,
    CloudDisabled,
    ServerError,
    InnerError,
}

impl SharingCode {
    /// Returns the stable wire code for this result.
    #[must_use]
    pub const fn code(self) -> i32 {
        match self {
            Self::Success => 0,
            Self::RepeatedRequest => 1,
            Self::NotInviter => 2,
            Self::NotInviterOrInvitee => 3,
            Self::OverQuota => 4,
            Self::TooManyParticipants => 5,
            Self::InvalidArgs => 6,
            Self::NetworkError => 7,
            Self::CloudDisabled => 8,
            Self::ServerError => 9,
            Self::InnerError => 10,
        }
    }

    /// Parses a wire code.
    ///
    /// # Errors
    ///
    /// Returns `CodecError::EnumOutOfRange` for codes outside the defined set.
    pub const fn from_code(code: i32) -> Result<Self, CodecError> {
        match code {
            0 => Ok(Self::Success),
            1 => Ok(Self::RepeatedRequest),
            2 => Ok(Self::NotInviter),
            3 => Ok(Self::NotInviterOrInvitee),
            4 => Ok(Self::OverQuota),
            5 => Ok(Self::TooManyParticipants),
            6 => Ok(Self::InvalidArgs),
            7 => Ok(Self::NetworkError),
            8 => Ok(Self::CloudDisabled),
            9 => Ok(Self::ServerError),
            10 => Ok(Self::InnerError),
            _ => Err(CodecError::EnumOutOfRange {
                what: "SharingCode",
                value: code,
            }),
        }
    }

    /// Returns true for `Success`.
    #[must_use]
    pub const fn is_success(self) -> bool {
        matches!(self, Self::Success)
    }
}

/// Per-participant capabilities, five independent switches.
///
/// The field order is the wire order.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Privilege {
    pub writable: bool,
    pub readable: bool,
    pub creatable: bool,
    pub deletable: bool,
    pub shareable: bool,
}

impl Privilege {
    /// Full capabilities.
    #[must_use]
    pub const fn all() -> Self {
        Self {
            writable: true,
            readable: true,
            creatable: true,
            deletable: true,
            shareable: true,
        }
    }

    /// Read-only capabilities.
    #[must_use]
    pub const fn read_only() -> Self {
        Self {
            writable: false,
            readable: true,
            creatable: false,
            deletable: false,
            shareable: false,
        }
    }
}

/// One collaborator on a shared store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Participant {
    pub identity: String,
    pub role: Role,
    pub status: Confirmation,
    pub privilege: Privilege,
    pub attach_info: String,
}

impl Participant {
    /// Creates a participant with default privilege and no attachment info.
    #[must_use]
    pub fn new(identity: impl Into<String>, role: Role, status: Confirmation) -> Self {
        Self {
            identity: identity.into(),
            role,
            status,
            privilege: Privilege::default(),
            attach_info: String::new(),
        }
    }
}
