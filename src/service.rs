//! Notifier service stub and proxy.
//!
//! The engine process tells the host about sync completions and data
//! changes through a narrow opcode-dispatched service. [`NotifierProxy`]
//! is the engine-side sender; [`NotifierStub`] is the host-side receiver
//! that authenticates the caller, decodes the payload, and hands it to
//! the registry. Every request is answered with a single int32 status;
//! nothing a caller sends can fail the host.

use std::fmt;
use std::sync::Arc;

use tracing::warn;

use crate::change::{ChangedData, Origin, SyncCompletion};
use crate::error::{ServiceError, SyncbellResult};
use crate::transport::{RemoteCaller, RemoteEndpoint};
use crate::wire::{Marshal, Parcel, ParcelReader};

/// Token every request parcel must open with.
pub const INTERFACE_TOKEN: &str = "syncbell.notifier.v1";

/// Request handled.
pub const STATUS_OK: i32 = 0;
/// Interface token missing or wrong.
pub const STATUS_UNAUTHORIZED: i32 = 1;
/// Opcode outside the closed set.
pub const STATUS_UNKNOWN_OPCODE: i32 = 2;
/// Payload failed to decode.
pub const STATUS_MALFORMED: i32 = 3;

/// The closed set of notifier operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Opcode {
    SyncComplete,
    DataChange,
    DataDetails,
}

impl Opcode {
    /// Number of operations; codes at or beyond this are unknown.
    pub const COUNT: u32 = 3;

    /// Stable wire code for this operation.
    #[must_use]
    pub const fn code(self) -> u32 {
        match self {
            Self::SyncComplete => 0,
            Self::DataChange => 1,
            Self::DataDetails => 2,
        }
    }

    /// Parses a wire code.
    ///
    /// # Errors
    ///
    /// Returns `ServiceError::UnknownOpcode` for codes at or beyond
    /// [`COUNT`](Self::COUNT).
    pub const fn from_code(code: u32) -> Result<Self, ServiceError> {
        match code {
            0 => Ok(Self::SyncComplete),
            1 => Ok(Self::DataChange),
            2 => Ok(Self::DataDetails),
            _ => Err(ServiceError::UnknownOpcode { code }),
        }
    }
}

type SyncCompleteHandler = Box<dyn Fn(u32, SyncCompletion) + Send + Sync>;
type DataChangeHandler = Box<dyn Fn(String, Vec<String>) + Send + Sync>;
type DataDetailsHandler = Box<dyn Fn(String, Vec<ChangedData>, Origin) + Send + Sync>;

/// Host-side request handler.
///
/// Dispatch is fixed at construction: one handler per opcode, invoked
/// synchronously on the request thread. Handlers are expected to do no
/// more than enqueue into delivery queues.
pub struct NotifierStub {
    on_sync_complete: SyncCompleteHandler,
    on_data_change: DataChangeHandler,
    on_data_details: DataDetailsHandler,
}

impl NotifierStub {
    /// Builds a stub from one handler per opcode.
    pub fn new(
        on_sync_complete: impl Fn(u32, SyncCompletion) + Send + Sync + 'static,
        on_data_change: impl Fn(String, Vec<String>) + Send + Sync + 'static,
        on_data_details: impl Fn(String, Vec<ChangedData>, Origin) + Send + Sync + 'static,
    ) -> Self {
        Self {
            on_sync_complete: Box::new(on_sync_complete),
            on_data_change: Box::new(on_data_change),
            on_data_details: Box::new(on_data_details),
        }
    }

    /// Handles one raw request and returns the status reply parcel.
    ///
    /// Never fails outward: authentication, opcode, and decode problems
    /// are logged and answered with the matching status code.
    #[must_use]
    pub fn on_request(&self, code: u32, request: &[u8]) -> Vec<u8> {
        let status = match self.dispatch(code, request) {
            Ok(()) => STATUS_OK,
            Err(err) => {
                warn!("rejecting notifier request (opcode {}): {}", code, err);
                status_for(&err)
            }
        };
        let mut reply = Parcel::new();
        reply.write_i32(status);
        reply.into_bytes()
    }

    fn dispatch(&self, code: u32, request: &[u8]) -> Result<(), ServiceError> {
        let mut reader = ParcelReader::new(request);
        let token = reader.read_string()?;
        if token != INTERFACE_TOKEN {
            return Err(ServiceError::UnauthorizedCaller);
        }
        match Opcode::from_code(code)? {
            Opcode::SyncComplete => {
                let seq = reader.read_u32()?;
                let completion = SyncCompletion::unmarshal(&mut reader)?;
                (self.on_sync_complete)(seq, completion);
            }
            Opcode::DataChange => {
                let store_name = reader.read_string()?;
                let devices = Vec::<String>::unmarshal(&mut reader)?;
                (self.on_data_change)(store_name, devices);
            }
            Opcode::DataDetails => {
                let store_name = reader.read_string()?;
                let changes = Vec::<ChangedData>::unmarshal(&mut reader)?;
                let origin = Origin::unmarshal(&mut reader)?;
                (self.on_data_details)(store_name, changes, origin);
            }
        }
        Ok(())
    }
}

impl fmt::Debug for NotifierStub {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NotifierStub").finish_non_exhaustive()
    }
}

impl RemoteEndpoint for NotifierStub {
    fn on_request(&self, opcode: u32, request: &[u8]) -> Vec<u8> {
        Self::on_request(self, opcode, request)
    }
}

/// Maps a rejection to the status written into the reply parcel.
const fn status_for(err: &ServiceError) -> i32 {
    match err {
        ServiceError::UnauthorizedCaller => STATUS_UNAUTHORIZED,
        ServiceError::UnknownOpcode { .. } => STATUS_UNKNOWN_OPCODE,
        ServiceError::MalformedPayload(_) => STATUS_MALFORMED,
        ServiceError::Rejected { status } => *status,
    }
}

/// Engine-side sender for the three notifier operations.
#[derive(Clone)]
pub struct NotifierProxy {
    caller: Arc<dyn RemoteCaller>,
}

impl NotifierProxy {
    /// Wraps a transport caller.
    pub fn new(caller: Arc<dyn RemoteCaller>) -> Self {
        Self { caller }
    }

    /// Reports the completion of the sync tracked under `seq`.
    ///
    /// # Errors
    ///
    /// Transport failures, or `ServiceError::Rejected` when the remote
    /// answers with a non-zero status.
    pub fn notify_sync_complete(
        &self,
        seq: u32,
        completion: &SyncCompletion,
    ) -> SyncbellResult<()> {
        let mut parcel = request_parcel();
        parcel.write_u32(seq);
        completion.marshal(&mut parcel);
        self.invoke(Opcode::SyncComplete, &parcel)
    }

    /// Reports a brief device-list change to one store.
    ///
    /// # Errors
    ///
    /// Transport failures, or `ServiceError::Rejected` when the remote
    /// answers with a non-zero status.
    pub fn notify_data_change(&self, store_name: &str, devices: &[String]) -> SyncbellResult<()> {
        let mut parcel = request_parcel();
        parcel.write_string(store_name);
        parcel.write_u32(devices.len() as u32);
        for device in devices {
            parcel.write_string(device);
        }
        self.invoke(Opcode::DataChange, &parcel)
    }

    /// Reports detailed per-table changes to one store.
    ///
    /// # Errors
    ///
    /// Transport failures, or `ServiceError::Rejected` when the remote
    /// answers with a non-zero status.
    pub fn notify_data_details(
        &self,
        store_name: &str,
        changes: &[ChangedData],
        origin: &Origin,
    ) -> SyncbellResult<()> {
        let mut parcel = request_parcel();
        parcel.write_string(store_name);
        parcel.write_u32(changes.len() as u32);
        for change in changes {
            change.marshal(&mut parcel);
        }
        origin.marshal(&mut parcel);
        self.invoke(Opcode::DataDetails, &parcel)
    }

    fn invoke(&self, opcode: Opcode, parcel: &Parcel) -> SyncbellResult<()> {
        let reply = self.caller.call(opcode.code(), parcel.as_bytes())?;
        let mut reader = ParcelReader::new(&reply);
        let status = reader.read_i32().map_err(ServiceError::from)?;
        if status != STATUS_OK {
            return Err(ServiceError::Rejected { status }.into());
        }
        Ok(())
    }
}

impl fmt::Debug for NotifierProxy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NotifierProxy").finish_non_exhaustive()
    }
}

fn request_parcel() -> Parcel {
    let mut parcel = Parcel::new();
    parcel.write_string(INTERFACE_TOKEN);
    parcel
}
