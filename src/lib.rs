//! # syncbell - ordered change notification and sync completion delivery
//!
//! syncbell carries change notifications and sync completions from a
//! storage engine to consumer callbacks, preserving order end to end.
//! Values cross the boundary through a compact tagged parcel codec; an
//! authenticated opcode-dispatched service decodes requests on the host
//! side; a registry routes each notice to matching subscriptions; and
//! bounded per-subscription queues hand events to callbacks on execution
//! contexts the consumer owns.
//!
//! ## Core Concepts
//!
//! - **ScalarValue / ValuesBucket**: typed cells and named rows with a stable wire form
//! - **ChangeNotice**: brief device-list changes and detailed per-table changes with origin
//! - **ObserverRegistry**: store-keyed subscriptions plus one-shot sync waiters
//! - **DeliveryQueue / EventLoop**: bounded, ordered delivery on consumer-owned contexts
//! - **NotifierStub / NotifierProxy**: authenticated opcode dispatch over a pluggable transport
//!
//! ## Usage
//!
//! ```
//! use std::sync::{Arc, Mutex};
//!
//! use syncbell::{ChangeNotice, EventLoop, ObserverRegistry, SubscribeMode};
//!
//! let registry = Arc::new(ObserverRegistry::new());
//! let event_loop = EventLoop::new();
//!
//! // Observe remote writes to one store.
//! let seen = Arc::new(Mutex::new(Vec::new()));
//! let sink = Arc::clone(&seen);
//! let _handle = registry.subscribe(
//!     "orders.db",
//!     SubscribeMode::Remote,
//!     Arc::new(move |notice: ChangeNotice| sink.lock().unwrap().push(notice.store_name)),
//!     &event_loop.handle(),
//! )?;
//!
//! // The engine reports which devices wrote to the store.
//! registry.dispatch_change(ChangeNotice::devices("orders", vec!["dev-A".into()]));
//!
//! // Callbacks run only when the owning context pumps its loop.
//! event_loop.run_until_idle();
//! assert_eq!(seen.lock().unwrap().as_slice(), ["orders"]);
//! # Ok::<(), syncbell::SyncbellError>(())
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

// Data model
pub mod bucket;
pub mod change;
pub mod error;
pub mod sharing;
pub mod value;

// Wire codec and transport seam
pub mod transport;
pub mod wire;

// Delivery pipeline
pub mod context;
pub mod cursor;
pub mod queue;
pub mod registry;
pub mod service;

// Re-export primary types at crate root for convenience
pub use bucket::ValuesBucket;
pub use change::{
    ChangeNotice, ChangeOp, ChangePayload, ChangedData, Origin, PrimaryKey, SyncCompletion,
};
pub use context::{ContextHandle, EventLoop};
pub use cursor::{ColumnType, RowCursor, RowsCursor};
pub use error::{
    CodecError, CursorError, QueueError, RegistryError, ServiceError, SyncbellError,
    SyncbellResult, TransportError,
};
pub use queue::{DeliveryQueue, QueueConfig, QueueStats};
pub use registry::{
    ChangeObserver, ObserverRegistry, SubscribeMode, SubscriptionHandle, SubscriptionId,
    SyncObserver,
};
pub use service::{NotifierProxy, NotifierStub, Opcode, INTERFACE_TOKEN};
pub use sharing::{Confirmation, Participant, Privilege, Role, SharingCode};
pub use transport::{RemoteCaller, RemoteEndpoint};
pub use value::{Asset, AssetStatus, ScalarValue};
pub use wire::{Marshal, Parcel, ParcelReader};
