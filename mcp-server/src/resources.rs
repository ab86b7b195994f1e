//! Resource registration, reads, and update subscriptions.
//!
//! Static resources capture their content at registration; dynamic ones
//! resolve through a handler at read time. Subscriptions are stored as
//! `(uri, callback id)` pairs with the callbacks themselves in a separate
//! ownership table, so fan-out looks callbacks up by id and nothing in
//! the graph owns the registry back. Fan-out snapshots the callback list
//! under the lock and invokes after release, each callback under an
//! arena of its own; one failing callback never starves the rest.

use crate::arena::Arena;
use crate::arena::ArenaPool;
use crate::errors::McpError;
use crate::errors::RegistryError;
use mcp_types::Resource;
use mcp_types::ResourceContents;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::PoisonError;
use std::sync::RwLock;
use std::sync::RwLockReadGuard;
use std::sync::RwLockWriteGuard;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;
use tracing::warn;

/// Resolves a dynamic resource's content at read time.
pub type ResourceHandler =
    Box<dyn Fn(&mut Arena, &str) -> Result<ResourceContents, McpError> + Send + Sync>;

/// Invoked on `notify_update` for a subscribed URI. Failures are logged
/// and do not abort the fan-out.
pub type SubscriptionCallback =
    Box<dyn Fn(&mut Arena, &str) -> Result<(), McpError> + Send + Sync>;

/// Identifies one callback in the ownership table. A given id may be
/// subscribed to a URI at most once; re-subscribing is idempotent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CallbackId(u64);

impl CallbackId {
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// A fresh process-unique id, for callers that do not bring their own
    /// keying scheme.
    pub fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1 << 32);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

enum ResourceBacking {
    Static(ResourceContents),
    Dynamic(Arc<ResourceHandler>),
}

struct RegisteredResource {
    descriptor: Resource,
    backing: ResourceBacking,
}

struct CallbackEntry {
    callback: Arc<SubscriptionCallback>,
    /// Number of URIs this callback is subscribed to.
    uses: usize,
}

#[derive(Default)]
struct ResourceState {
    resources: Vec<RegisteredResource>,
    index: HashMap<String, usize>,
    /// Per-URI subscriber ids, in subscription order.
    subscriptions: HashMap<String, Vec<CallbackId>>,
    callbacks: HashMap<CallbackId, CallbackEntry>,
}

pub struct ResourceRegistry {
    supports_subscriptions: bool,
    arenas: Arc<ArenaPool>,
    state: RwLock<ResourceState>,
}

impl ResourceRegistry {
    pub fn new(supports_subscriptions: bool, arenas: Arc<ArenaPool>) -> Self {
        Self {
            supports_subscriptions,
            arenas,
            state: RwLock::new(ResourceState::default()),
        }
    }

    pub fn supports_subscriptions(&self) -> bool {
        self.supports_subscriptions
    }

    /// Registers a resource whose content is fixed at registration time.
    pub fn register_static(
        &self,
        descriptor: Resource,
        contents: ResourceContents,
    ) -> Result<(), RegistryError> {
        self.register(descriptor, ResourceBacking::Static(contents))
    }

    /// Registers a resource resolved through `handler` on every read.
    pub fn register_dynamic(
        &self,
        descriptor: Resource,
        handler: ResourceHandler,
    ) -> Result<(), RegistryError> {
        self.register(descriptor, ResourceBacking::Dynamic(Arc::new(handler)))
    }

    fn register(
        &self,
        descriptor: Resource,
        backing: ResourceBacking,
    ) -> Result<(), RegistryError> {
        let mut state = self.write_state();
        if state.index.contains_key(&descriptor.uri) {
            return Err(RegistryError::DuplicateName(descriptor.uri));
        }
        let slot = state.resources.len();
        state.index.insert(descriptor.uri.clone(), slot);
        state.resources.push(RegisteredResource { descriptor, backing });
        Ok(())
    }

    /// Removes a resource and drops every subscription attached to it.
    /// Unknown URIs are a no-op.
    pub fn deregister(&self, uri: &str) {
        let mut state = self.write_state();
        let Some(slot) = state.index.remove(uri) else {
            return;
        };
        state.resources.remove(slot);
        // Slots after the removed one shift down by a position.
        for index in state.index.values_mut() {
            if *index > slot {
                *index -= 1;
            }
        }
        if let Some(ids) = state.subscriptions.remove(uri) {
            for id in ids {
                release_callback(&mut state, id);
            }
        }
    }

    /// Owned snapshot of the registered descriptors, in registration
    /// order. The registry keeps no reference to the returned list.
    pub fn list(&self) -> Vec<Resource> {
        self.read_state()
            .resources
            .iter()
            .map(|resource| resource.descriptor.clone())
            .collect()
    }

    pub fn count(&self) -> usize {
        self.read_state().resources.len()
    }

    /// Resolves a resource's content: the handler for dynamic resources,
    /// the captured literal for static ones.
    pub fn read(&self, arena: &mut Arena, uri: &str) -> Result<ResourceContents, McpError> {
        let backing = {
            let state = self.read_state();
            let Some(&slot) = state.index.get(uri) else {
                return Err(McpError::resource_not_found(uri));
            };
            match &state.resources[slot].backing {
                ResourceBacking::Static(contents) => return Ok(contents.clone()),
                ResourceBacking::Dynamic(handler) => Arc::clone(handler),
            }
        };
        (*backing)(arena, uri)
    }

    /// Subscribes `callback` (keyed by `id`) to updates of `uri`.
    /// Subscribing an id that is already attached to the URI is a no-op.
    pub fn subscribe(
        &self,
        uri: &str,
        id: CallbackId,
        callback: SubscriptionCallback,
    ) -> Result<(), RegistryError> {
        if !self.supports_subscriptions {
            return Err(RegistryError::SubscriptionsDisabled);
        }
        let mut state = self.write_state();
        if !state.index.contains_key(uri) {
            return Err(RegistryError::ResourceNotFound(uri.to_string()));
        }
        let subscribers = state.subscriptions.entry(uri.to_string()).or_default();
        if subscribers.contains(&id) {
            return Ok(());
        }
        subscribers.push(id);
        match state.callbacks.entry(id) {
            std::collections::hash_map::Entry::Occupied(mut entry) => {
                entry.get_mut().uses += 1;
            }
            std::collections::hash_map::Entry::Vacant(entry) => {
                entry.insert(CallbackEntry {
                    callback: Arc::new(callback),
                    uses: 1,
                });
            }
        }
        Ok(())
    }

    /// Detaches a callback from a URI. Unknown URIs or ids, including
    /// URIs already deregistered, are a no-op.
    pub fn unsubscribe(&self, uri: &str, id: CallbackId) -> Result<(), RegistryError> {
        if !self.supports_subscriptions {
            return Err(RegistryError::SubscriptionsDisabled);
        }
        let mut state = self.write_state();
        let Some(subscribers) = state.subscriptions.get_mut(uri) else {
            return Ok(());
        };
        let Some(position) = subscribers.iter().position(|entry| *entry == id) else {
            return Ok(());
        };
        subscribers.remove(position);
        if subscribers.is_empty() {
            state.subscriptions.remove(uri);
        }
        release_callback(&mut state, id);
        Ok(())
    }

    /// Invokes every callback subscribed to `uri` at the moment of the
    /// call, in subscription order, each under an independent arena.
    /// URIs not currently registered notify nobody.
    pub fn notify_update(&self, uri: &str) {
        let snapshot: Vec<(CallbackId, Arc<SubscriptionCallback>)> = {
            let state = self.read_state();
            if !state.index.contains_key(uri) {
                return;
            }
            let Some(subscribers) = state.subscriptions.get(uri) else {
                return;
            };
            subscribers
                .iter()
                .filter_map(|id| {
                    state
                        .callbacks
                        .get(id)
                        .map(|entry| (*id, Arc::clone(&entry.callback)))
                })
                .collect()
        };

        for (id, callback) in snapshot {
            let mut arena = self.arenas.acquire();
            if let Err(err) = (*callback)(&mut arena, uri) {
                warn!(uri, callback = ?id, "subscription callback failed: {err}");
            }
        }
    }

    /// Detaches a callback from every URI it is subscribed to. Used when
    /// the owner of the callback (typically a connection) goes away.
    pub fn remove_subscriber(&self, id: CallbackId) {
        let mut state = self.write_state();
        let mut removed = 0;
        for subscribers in state.subscriptions.values_mut() {
            if let Some(position) = subscribers.iter().position(|entry| *entry == id) {
                subscribers.remove(position);
                removed += 1;
            }
        }
        state.subscriptions.retain(|_uri, subscribers| !subscribers.is_empty());
        for _ in 0..removed {
            release_callback(&mut state, id);
        }
    }

    pub fn subscription_count(&self, uri: &str) -> usize {
        self.read_state()
            .subscriptions
            .get(uri)
            .map_or(0, Vec::len)
    }

    fn read_state(&self) -> RwLockReadGuard<'_, ResourceState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_state(&self) -> RwLockWriteGuard<'_, ResourceState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }
}

fn release_callback(state: &mut ResourceState, id: CallbackId) {
    if let Some(entry) = state.callbacks.get_mut(&id) {
        entry.uses -= 1;
        if entry.uses == 0 {
            state.callbacks.remove(&id);
        }
    }
}
