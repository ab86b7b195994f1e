//! Method dispatch with lifecycle hooks.
//!
//! A dispatcher maps method names to handlers and carries four optional
//! hook kinds, keyed by method with a global slot: `on_before`,
//! `on_after`, `on_error`, `on_fallback`. Hooks and handlers are plain
//! closures registered at startup; the tables are behind read-mostly
//! locks and are not meant to change once connections are being served.
//! Dispatch snapshots the hook chain under the lock and runs everything
//! after release, so handlers may consult the dispatcher re-entrantly.

use crate::arena::Arena;
use crate::connection::ConnectionId;
use crate::errors::McpError;
use crate::errors::RegistryError;
use crate::outgoing_message::OutgoingMessageSender;
use crate::progress::ProgressTracker;
use crate::session::SessionState;
use mcp_types::RequestId;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::PoisonError;
use std::sync::RwLock;
use std::sync::RwLockReadGuard;
use std::sync::RwLockWriteGuard;

/// The outcome of one dispatch: a result payload or a structured error.
pub type DispatchResult = Result<Value, McpError>;

pub type MethodHandler = Arc<dyn Fn(&mut RequestCx<'_>) -> DispatchResult + Send + Sync>;
pub type BeforeHook = Arc<dyn Fn(&RequestCx<'_>) + Send + Sync>;
pub type AfterHook = Arc<dyn Fn(&RequestCx<'_>, &Value) + Send + Sync>;
pub type ErrorHook = Arc<dyn Fn(&mut RequestCx<'_>, McpError) -> DispatchResult + Send + Sync>;
pub type FallbackHook = Arc<dyn Fn(&mut RequestCx<'_>) -> DispatchResult + Send + Sync>;

/// Everything a handler sees for one request: the envelope fields, the
/// request's arena, the connection's session state and outgoing sender,
/// and the progress tracker when the request carried a progress token.
pub struct RequestCx<'a> {
    pub method: &'a str,
    /// None for notifications.
    pub request_id: Option<&'a RequestId>,
    pub params: Option<&'a Value>,
    pub arena: &'a mut Arena,
    pub session: &'a mut SessionState,
    pub outgoing: &'a Arc<OutgoingMessageSender>,
    pub progress: Option<&'a ProgressTracker>,
}

impl RequestCx<'_> {
    pub fn connection(&self) -> ConnectionId {
        self.outgoing.connection()
    }

    /// Deserializes the request params into a typed struct, mapping
    /// failures to invalid-params errors that name the method.
    pub fn parse_params<P>(&self) -> Result<P, McpError>
    where
        P: serde::de::DeserializeOwned,
    {
        serde_json::from_value(self.params.cloned().unwrap_or(Value::Null)).map_err(|err| {
            McpError::invalid_params(format!("invalid params for {}: {err}", self.method))
        })
    }
}

#[derive(Default, Clone)]
struct HookSet {
    before: Vec<BeforeHook>,
    after: Vec<AfterHook>,
    on_error: Option<ErrorHook>,
    on_fallback: Option<FallbackHook>,
}

#[derive(Default)]
pub struct Dispatcher {
    handlers: RwLock<HashMap<String, MethodHandler>>,
    method_hooks: RwLock<HashMap<String, HookSet>>,
    global_hooks: RwLock<HookSet>,
}

impl Dispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_method<F>(
        &self,
        method: impl Into<String>,
        handler: F,
    ) -> Result<(), RegistryError>
    where
        F: Fn(&mut RequestCx<'_>) -> DispatchResult + Send + Sync + 'static,
    {
        let method = method.into();
        let mut handlers = self.write_handlers();
        if handlers.contains_key(&method) {
            return Err(RegistryError::DuplicateName(method));
        }
        handlers.insert(method, Arc::new(handler));
        Ok(())
    }

    pub fn has_method(&self, method: &str) -> bool {
        self.read_handlers().contains_key(method)
    }

    /// Adds a before hook; `method: None` targets the global slot.
    pub fn on_before<F>(&self, method: Option<&str>, hook: F)
    where
        F: Fn(&RequestCx<'_>) + Send + Sync + 'static,
    {
        self.with_hook_set(method, |set| set.before.push(Arc::new(hook)));
    }

    pub fn on_after<F>(&self, method: Option<&str>, hook: F)
    where
        F: Fn(&RequestCx<'_>, &Value) + Send + Sync + 'static,
    {
        self.with_hook_set(method, |set| set.after.push(Arc::new(hook)));
    }

    /// Installs the error hook; its return value becomes the final
    /// dispatch outcome.
    pub fn on_error<F>(&self, method: Option<&str>, hook: F)
    where
        F: Fn(&mut RequestCx<'_>, McpError) -> DispatchResult + Send + Sync + 'static,
    {
        self.with_hook_set(method, |set| set.on_error = Some(Arc::new(hook)));
    }

    /// Installs the fallback invoked when no handler is registered.
    pub fn on_fallback<F>(&self, method: Option<&str>, hook: F)
    where
        F: Fn(&mut RequestCx<'_>) -> DispatchResult + Send + Sync + 'static,
    {
        self.with_hook_set(method, |set| set.on_fallback = Some(Arc::new(hook)));
    }

    /// Runs one request or notification through the dispatch sequence:
    /// phase gate, before hooks (method then global), handler or
    /// fallback, then after hooks in mirrored order on success or the
    /// error hook on failure.
    pub fn dispatch(&self, ctx: &mut RequestCx<'_>) -> DispatchResult {
        if ctx.request_id.is_some() && !ctx.session.allows_request(ctx.method) {
            return Err(McpError::not_initialized());
        }

        let handler = self.read_handlers().get(ctx.method).cloned();
        let chain = self.snapshot_hooks(ctx.method);

        for hook in &chain.before {
            (**hook)(ctx);
        }

        let outcome = match handler {
            Some(handler) => (*handler)(ctx),
            None => match &chain.on_fallback {
                Some(fallback) => (**fallback)(ctx),
                None => Err(McpError::method_not_found(ctx.method)),
            },
        };

        match outcome {
            Ok(value) => {
                for hook in &chain.after {
                    (**hook)(ctx, &value);
                }
                Ok(value)
            }
            Err(err) => match &chain.on_error {
                Some(hook) => (**hook)(ctx, err),
                None => Err(err),
            },
        }
    }

    fn snapshot_hooks(&self, method: &str) -> HookSet {
        let global = self.read_global();
        let methods = self.read_method_hooks();
        let per_method = methods.get(method);

        // Before: method-specific first, then global, each in insertion
        // order. After mirrors that at the key level: global first, then
        // method-specific.
        let mut before = per_method.map(|set| set.before.clone()).unwrap_or_default();
        before.extend(global.before.iter().cloned());

        let mut after = global.after.clone();
        if let Some(set) = per_method {
            after.extend(set.after.iter().cloned());
        }

        HookSet {
            before,
            after,
            on_error: per_method
                .and_then(|set| set.on_error.clone())
                .or_else(|| global.on_error.clone()),
            on_fallback: per_method
                .and_then(|set| set.on_fallback.clone())
                .or_else(|| global.on_fallback.clone()),
        }
    }

    fn with_hook_set(&self, method: Option<&str>, mutate: impl FnOnce(&mut HookSet)) {
        match method {
            Some(method) => {
                let mut methods = self.write_method_hooks();
                mutate(methods.entry(method.to_string()).or_default());
            }
            None => {
                let mut global = self.write_global();
                mutate(&mut global);
            }
        }
    }

    fn read_handlers(&self) -> RwLockReadGuard<'_, HashMap<String, MethodHandler>> {
        self.handlers.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_handlers(&self) -> RwLockWriteGuard<'_, HashMap<String, MethodHandler>> {
        self.handlers.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn read_method_hooks(&self) -> RwLockReadGuard<'_, HashMap<String, HookSet>> {
        self.method_hooks.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_method_hooks(&self) -> RwLockWriteGuard<'_, HashMap<String, HookSet>> {
        self.method_hooks.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn read_global(&self) -> RwLockReadGuard<'_, HookSet> {
        self.global_hooks.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_global(&self) -> RwLockWriteGuard<'_, HookSet> {
        self.global_hooks.write().unwrap_or_else(PoisonError::into_inner)
    }
}
