//! Concurrent keyed registry of live interactive sessions.
//!
//! The map is guarded by one coarse mutex; expected cardinality is the number of
//! in-progress minigames on this process. Every entry is a [`SessionHandle`], which wraps
//! the session in its own mutex so two interactions racing on the same key serialize
//! instead of writing session fields concurrently.
//!
//! The registry never expires entries. Idle cleanup is the caller's job (see
//! `GameServer::sweep_idle_sessions`).

use std::collections::HashMap;
use std::fmt::{self, Display};
use std::hash::Hash;
use std::sync::{Arc, Mutex, MutexGuard};

use log::debug;

use crate::errors::RegistryError;

/// Shared, lockable reference to one live session.
pub struct SessionHandle<S> {
    inner: Arc<Mutex<S>>,
}

impl<S> Clone for SessionHandle<S> {
    fn clone(&self) -> Self {
        SessionHandle {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<S: fmt::Debug> fmt::Debug for SessionHandle<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.inner.try_lock() {
            Ok(session) => f.debug_tuple("SessionHandle").field(&*session).finish(),
            Err(_) => f.write_str("SessionHandle(<locked>)"),
        }
    }
}

impl<S> SessionHandle<S> {
    fn new(session: S) -> Self {
        SessionHandle {
            inner: Arc::new(Mutex::new(session)),
        }
    }

    /// Exclusive access to the session. A panic in a previous holder does not lock the
    /// session out; the session's own methods keep its fields valid between calls.
    pub fn lock(&self) -> MutexGuard<'_, S> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Run `f` with exclusive access and return its result.
    pub fn with<R>(&self, f: impl FnOnce(&mut S) -> R) -> R {
        let mut guard = self.lock();
        f(&mut guard)
    }

    /// True when both handles refer to the same registered session.
    pub fn same_session(&self, other: &SessionHandle<S>) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

pub struct SessionRegistry<K, S> {
    sessions: Mutex<HashMap<K, SessionHandle<S>>>,
}

impl<K, S> Default for SessionRegistry<K, S> {
    fn default() -> Self {
        SessionRegistry {
            sessions: Mutex::new(HashMap::new()),
        }
    }
}

impl<K, S> SessionRegistry<K, S>
where
    K: Eq + Hash + Clone + Display,
{
    pub fn new() -> Self {
        Self::default()
    }

    fn map(&self) -> MutexGuard<'_, HashMap<K, SessionHandle<S>>> {
        self.sessions.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Register a new session. Fails without touching the existing entry if `key` is taken.
    pub fn add(&self, key: K, session: S) -> Result<SessionHandle<S>, RegistryError> {
        let mut map = self.map();
        if map.contains_key(&key) {
            return Err(RegistryError::DuplicateKey(key.to_string()));
        }
        let handle = SessionHandle::new(session);
        debug!("session {} registered ({} live)", key, map.len() + 1);
        map.insert(key, handle.clone());
        Ok(handle)
    }

    pub fn try_remove(&self, key: &K) -> Option<SessionHandle<S>> {
        let removed = self.map().remove(key);
        if removed.is_some() {
            debug!("session {} removed", key);
        }
        removed
    }

    pub fn try_get(&self, key: &K) -> Option<SessionHandle<S>> {
        self.map().get(key).cloned()
    }

    /// Point-in-time copy of every live entry. Later adds/removes do not affect it.
    pub fn get_all(&self) -> Vec<(K, SessionHandle<S>)> {
        self.map()
            .iter()
            .map(|(k, h)| (k.clone(), h.clone()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.map().len()
    }

    pub fn is_empty(&self) -> bool {
        self.map().is_empty()
    }
}
