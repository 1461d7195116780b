//! Observer registry: subscriptions, sync waiters, and change dispatch.
//!
//! The registry keys change subscriptions by normalized store name and
//! routes each incoming notice to the subscriptions whose mode matches
//! the notice's origin. Sync waiters are one-shot observers keyed by a
//! caller-visible sequence number. Both paths deliver through bounded
//! [`DeliveryQueue`]s, so no registry lock is ever held while a consumer
//! callback runs.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::change::{ChangeNotice, ChangePayload, ChangedData, Origin, SyncCompletion};
use crate::context::ContextHandle;
use crate::error::RegistryError;
use crate::queue::{DeliveryQueue, QueueConfig};
use crate::service::NotifierStub;

/// Which change source a subscription listens for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscribeMode {
    /// Writes made by this process.
    Local,
    /// Writes synced in from peer devices.
    Remote,
    /// Writes synced down from the cloud.
    Cloud,
}

impl SubscribeMode {
    /// Mode a payload is addressed to.
    ///
    /// Brief device-list notices always describe peer writes; detailed
    /// notices follow their origin.
    #[must_use]
    pub fn for_payload(payload: &ChangePayload) -> Self {
        match payload {
            ChangePayload::Devices(_) => Self::Remote,
            ChangePayload::Details { origin, .. } => Self::from_origin(origin),
        }
    }

    /// Mode matching an origin kind.
    #[must_use]
    pub const fn from_origin(origin: &Origin) -> Self {
        match origin {
            Origin::Local => Self::Local,
            Origin::Remote { .. } => Self::Remote,
            Origin::Cloud => Self::Cloud,
        }
    }
}

/// Unique identity of one subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SubscriptionId(Uuid);

impl SubscriptionId {
    /// Allocates a fresh random id.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Wraps an existing uuid.
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// The underlying uuid.
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for SubscriptionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Receives change notices for one store, on the subscription's context.
pub trait ChangeObserver: Send + Sync {
    /// Called once per delivered notice.
    fn on_change(&self, notice: ChangeNotice);
}

impl<F> ChangeObserver for F
where
    F: Fn(ChangeNotice) + Send + Sync,
{
    fn on_change(&self, notice: ChangeNotice) {
        self(notice);
    }
}

/// Receives the completion of one tracked sync operation.
pub trait SyncObserver: Send + Sync {
    /// Called exactly once for the sequence number the observer was
    /// registered under.
    fn on_sync_complete(&self, seq: u32, completion: SyncCompletion);
}

impl<F> SyncObserver for F
where
    F: Fn(u32, SyncCompletion) + Send + Sync,
{
    fn on_sync_complete(&self, seq: u32, completion: SyncCompletion) {
        self(seq, completion);
    }
}

struct Subscription {
    id: SubscriptionId,
    mode: SubscribeMode,
    observer: Arc<dyn ChangeObserver>,
    queue: Weak<DeliveryQueue<ChangeNotice>>,
}

/// Keeps one subscription's delivery queue alive and names it for
/// [`ObserverRegistry::unsubscribe`].
///
/// Dropping the handle without unsubscribing lets the registry prune the
/// subscription lazily on the next dispatch to its store.
pub struct SubscriptionHandle {
    id: SubscriptionId,
    store: String,
    mode: SubscribeMode,
    queue: Arc<DeliveryQueue<ChangeNotice>>,
}

impl SubscriptionHandle {
    /// This subscription's identity.
    #[must_use]
    pub const fn id(&self) -> SubscriptionId {
        self.id
    }

    /// Normalized store name the subscription is keyed under.
    #[must_use]
    pub fn store(&self) -> &str {
        &self.store
    }

    /// Mode the subscription listens in.
    #[must_use]
    pub const fn mode(&self) -> SubscribeMode {
        self.mode
    }

    /// Counters for the subscription's delivery queue.
    #[must_use]
    pub fn queue_stats(&self) -> crate::queue::QueueStats {
        self.queue.stats()
    }
}

impl fmt::Debug for SubscriptionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubscriptionHandle")
            .field("id", &self.id)
            .field("store", &self.store)
            .field("mode", &self.mode)
            .finish_non_exhaustive()
    }
}

type SyncQueue = Arc<DeliveryQueue<(u32, SyncCompletion)>>;

/// Routes change notices and sync completions to registered observers.
pub struct ObserverRegistry {
    subs: Mutex<HashMap<String, Vec<Subscription>>>,
    waiters: Mutex<HashMap<u32, SyncQueue>>,
    next_seq: AtomicU32,
    queue_config: QueueConfig,
}

impl ObserverRegistry {
    /// Creates a registry with default queue tuning.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(QueueConfig::default())
    }

    /// Creates a registry whose subscription queues use `config`.
    #[must_use]
    pub fn with_config(config: QueueConfig) -> Self {
        Self {
            subs: Mutex::new(HashMap::new()),
            waiters: Mutex::new(HashMap::new()),
            next_seq: AtomicU32::new(0),
            queue_config: config,
        }
    }

    /// Registers an observer for one store and mode.
    ///
    /// Notices drain on `ctx`; the returned handle keeps the delivery
    /// queue alive.
    ///
    /// # Errors
    ///
    /// `AlreadyRegistered` when the same observer (by `Arc` identity) is
    /// already subscribed to this store and mode; `ContextTornDown` when
    /// `ctx` is no longer alive.
    pub fn subscribe(
        &self,
        store_name: &str,
        mode: SubscribeMode,
        observer: Arc<dyn ChangeObserver>,
        ctx: &ContextHandle,
    ) -> Result<SubscriptionHandle, RegistryError> {
        if !ctx.is_alive() {
            return Err(RegistryError::ContextTornDown);
        }
        let store = normalize_store_name(store_name).to_string();

        let mut subs = self.lock_subs();
        let slot = subs.entry(store.clone()).or_default();
        if slot
            .iter()
            .any(|sub| sub.mode == mode && Arc::ptr_eq(&sub.observer, &observer))
        {
            return Err(RegistryError::AlreadyRegistered { store, mode });
        }

        let id = SubscriptionId::new();
        let queue = {
            let observer = Arc::clone(&observer);
            DeliveryQueue::new(
                format!("{store}/{mode:?}"),
                self.queue_config,
                ctx.clone(),
                move |notice| observer.on_change(notice),
            )
        };
        slot.push(Subscription {
            id,
            mode,
            observer,
            queue: Arc::downgrade(&queue),
        });
        debug!("subscribed {} to '{}' in {:?} mode", id, store, mode);

        Ok(SubscriptionHandle {
            id,
            store,
            mode,
            queue,
        })
    }

    /// Removes a subscription and retires its queue.
    ///
    /// # Errors
    ///
    /// `NotRegistered` when the handle was already unsubscribed.
    pub fn unsubscribe(&self, handle: &SubscriptionHandle) -> Result<(), RegistryError> {
        {
            let mut subs = self.lock_subs();
            let Some(slot) = subs.get_mut(&handle.store) else {
                return Err(RegistryError::NotRegistered);
            };
            let before = slot.len();
            slot.retain(|sub| sub.id != handle.id);
            if slot.len() == before {
                return Err(RegistryError::NotRegistered);
            }
            if slot.is_empty() {
                subs.remove(&handle.store);
            }
        }
        handle.queue.retire();
        debug!("unsubscribed {} from '{}'", handle.id, handle.store);
        Ok(())
    }

    /// Routes one notice to every live subscription matching its store
    /// and mode.
    ///
    /// Matches are collected under the lock and posted after it is
    /// released; subscriptions whose queue is gone are pruned here.
    pub fn dispatch_change(&self, notice: ChangeNotice) {
        let mode = SubscribeMode::for_payload(&notice.payload);
        let store = normalize_store_name(&notice.store_name).to_string();

        let queues: Vec<Arc<DeliveryQueue<ChangeNotice>>> = {
            let mut subs = self.lock_subs();
            let Some(slot) = subs.get_mut(&store) else {
                return;
            };
            slot.retain(|sub| sub.queue.strong_count() > 0);
            let queues = slot
                .iter()
                .filter(|sub| sub.mode == mode)
                .filter_map(|sub| sub.queue.upgrade())
                .collect();
            if slot.is_empty() {
                subs.remove(&store);
            }
            queues
        };

        debug!(
            "dispatching {:?} change for '{}' to {} observer(s)",
            mode,
            store,
            queues.len()
        );
        for queue in queues {
            queue.post(notice.clone());
        }
    }

    /// Registers a one-shot waiter for a sync operation and returns its
    /// sequence number.
    ///
    /// Sequence numbers are monotonic, wrap, and skip 0 so a zeroed
    /// field can never alias a live waiter.
    pub fn track_sync(&self, observer: Arc<dyn SyncObserver>, ctx: &ContextHandle) -> u32 {
        let seq = self.next_seq();
        let queue = DeliveryQueue::new(
            format!("sync#{seq}"),
            self.queue_config,
            ctx.clone(),
            move |(seq, completion)| observer.on_sync_complete(seq, completion),
        );
        self.lock_waiters().insert(seq, queue);
        debug!("tracking sync seq {}", seq);
        seq
    }

    /// Delivers a sync completion to its waiter and forgets the seq.
    ///
    /// A completion for an unknown or already-completed seq is logged
    /// and dropped.
    pub fn complete_sync(&self, seq: u32, completion: SyncCompletion) {
        let Some(queue) = self.lock_waiters().remove(&seq) else {
            warn!("sync completion for unknown seq {}, dropping", seq);
            return;
        };
        queue.post((seq, completion));
    }

    /// Fails every pending sync waiter with `code` under the empty
    /// device key, then clears the waiter table.
    ///
    /// Called when the engine connection is lost, so no waiter is
    /// stranded by a completion that will never arrive.
    pub fn abort_pending_syncs(&self, code: i32) {
        let waiters = std::mem::take(&mut *self.lock_waiters());
        if waiters.is_empty() {
            return;
        }
        warn!(
            "aborting {} pending sync waiter(s) with code {}",
            waiters.len(),
            code
        );
        for (seq, queue) in waiters {
            let mut completion = SyncCompletion::new();
            completion.insert("", code);
            queue.post((seq, completion));
        }
    }

    /// Number of sync waiters still pending.
    #[must_use]
    pub fn pending_syncs(&self) -> usize {
        self.lock_waiters().len()
    }

    /// Builds a notifier stub whose handlers feed this registry.
    #[must_use]
    pub fn stub(self: &Arc<Self>) -> NotifierStub {
        let on_sync = {
            let registry = Arc::clone(self);
            move |seq: u32, completion: SyncCompletion| registry.complete_sync(seq, completion)
        };
        let on_change = {
            let registry = Arc::clone(self);
            move |store: String, devices: Vec<String>| {
                registry.dispatch_change(ChangeNotice::devices(store, devices));
            }
        };
        let on_details = {
            let registry = Arc::clone(self);
            move |store: String, changes: Vec<ChangedData>, origin: Origin| {
                registry.dispatch_change(ChangeNotice::details(store, changes, origin));
            }
        };
        NotifierStub::new(on_sync, on_change, on_details)
    }

    fn next_seq(&self) -> u32 {
        loop {
            let seq = self.next_seq.fetch_add(1, Ordering::Relaxed).wrapping_add(1);
            if seq != 0 {
                return seq;
            }
        }
    }

    fn lock_subs(&self) -> MutexGuard<'_, HashMap<String, Vec<Subscription>>> {
        self.subs.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_waiters(&self) -> MutexGuard<'_, HashMap<u32, SyncQueue>> {
        self.waiters.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for ObserverRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ObserverRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObserverRegistry")
            .field("stores", &self.lock_subs().len())
            .field("pending_syncs", &self.lock_waiters().len())
            .finish_non_exhaustive()
    }
}

/// Strips the conventional `.db` file suffix so both spellings of a
/// store name land in the same slot. The bare suffix is left alone.
fn normalize_store_name(name: &str) -> &str {
    match name.strip_suffix(".db") {
        Some(stem) if !stem.is_empty() => stem,
        _ => name,
    }
}
