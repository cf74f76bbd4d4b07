//! In-memory session store.
//!
//! A hierarchical JSON store with the same path, merge and subscribe
//! behavior the client expects from a hosted realtime database. Clones share
//! one store, so several clients in one process see each other's writes.
//!
//! Also the test double for [`ReplicationPort`]: writes are logged and
//! failures can be injected.

use super::{presence_path, session_path, PortError, ReplicationPort, Subscription};
use async_trait::async_trait;
use bgtimer_types::{
    DeviceId, PresenceEntry, SessionCode, SessionDocument, SessionSnapshot, TypesError,
};
use serde_json::{Map, Value};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::mpsc;

/// One write the store accepted.
#[derive(Debug, Clone, PartialEq)]
pub enum StoreWrite {
    /// Value replaced at a path.
    Set {
        /// Store path.
        path: String,
        /// New value.
        value: Value,
    },
    /// Keys merged into the object at a path.
    Merge {
        /// Store path.
        path: String,
        /// Merged keys.
        value: Value,
    },
    /// Value deleted at a path.
    Remove {
        /// Store path.
        path: String,
    },
}

impl StoreWrite {
    /// Path the write targeted.
    pub fn path(&self) -> &str {
        match self {
            StoreWrite::Set { path, .. }
            | StoreWrite::Merge { path, .. }
            | StoreWrite::Remove { path } => path,
        }
    }
}

/// Shared in-memory store.
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<MemoryStoreInner>>,
}

#[derive(Debug, Default)]
struct MemoryStoreInner {
    root: Map<String, Value>,
    subscribers: Vec<(SessionCode, mpsc::UnboundedSender<SessionDocument>)>,
    writes: Vec<StoreWrite>,
    unavailable: Option<String>,
    latency: Option<Duration>,
    fail_next_write: Option<String>,
    fail_next_read: Option<String>,
    fail_next_subscribe: Option<String>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, MemoryStoreInner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Every accepted write, oldest first.
    pub fn writes(&self) -> Vec<StoreWrite> {
        self.lock().writes.clone()
    }

    /// Values of accepted merge writes (host publishes), oldest first.
    pub fn publishes(&self) -> Vec<Value> {
        self.lock()
            .writes
            .iter()
            .filter_map(|w| match w {
                StoreWrite::Merge { value, .. } => Some(value.clone()),
                _ => None,
            })
            .collect()
    }

    /// Forget the write log.
    pub fn clear_writes(&self) {
        self.lock().writes.clear();
    }

    /// Raw value stored at a path.
    pub fn value_at(&self, path: &str) -> Option<Value> {
        let inner = self.lock();
        value_at(&inner.root, &segments(path)).cloned()
    }

    /// Decoded session document, if one is stored.
    pub fn document(&self, code: &SessionCode) -> Option<SessionDocument> {
        self.value_at(&session_path(code))
            .and_then(|value| SessionDocument::from_value(value).ok())
    }

    /// Number of open subscriptions to a session.
    pub fn subscriber_count(&self, code: &SessionCode) -> usize {
        let mut inner = self.lock();
        inner.subscribers.retain(|(_, tx)| !tx.is_closed());
        inner.subscribers.iter().filter(|(c, _)| c == code).count()
    }

    /// Make every call fail with [`PortError::Unavailable`] until cleared
    /// with `None`.
    pub fn set_unavailable(&self, reason: Option<&str>) {
        self.lock().unavailable = reason.map(str::to_string);
    }

    /// Delay every call by `latency`.
    pub fn set_latency(&self, latency: Option<Duration>) {
        self.lock().latency = latency;
    }

    /// Cause the next write to fail with the given error.
    pub fn fail_next_write(&self, error: &str) {
        self.lock().fail_next_write = Some(error.to_string());
    }

    /// Cause the next read to fail with the given error.
    pub fn fail_next_read(&self, error: &str) {
        self.lock().fail_next_read = Some(error.to_string());
    }

    /// Cause the next subscribe to fail with the given error.
    pub fn fail_next_subscribe(&self, error: &str) {
        self.lock().fail_next_subscribe = Some(error.to_string());
    }

    async fn simulate_latency(&self) -> Result<(), PortError> {
        let latency = {
            let inner = self.lock();
            if let Some(reason) = &inner.unavailable {
                return Err(PortError::Unavailable(reason.clone()));
            }
            inner.latency
        };
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
        Ok(())
    }

    fn write(&self, code: &SessionCode, write: StoreWrite) -> Result<(), PortError> {
        let mut inner = self.lock();
        if let Some(reason) = &inner.unavailable {
            return Err(PortError::Unavailable(reason.clone()));
        }
        if let Some(error) = inner.fail_next_write.take() {
            return Err(PortError::WriteRejected(error));
        }

        let path = segments(write.path());
        match &write {
            StoreWrite::Set { value, .. } => set_at(&mut inner.root, &path, value.clone()),
            StoreWrite::Merge { value, .. } => merge_at(&mut inner.root, &path, value),
            StoreWrite::Remove { .. } => {
                remove_at(&mut inner.root, &path);
            }
        }
        inner.writes.push(write);
        inner.notify(code);
        Ok(())
    }
}

impl Clone for MemoryStore {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl MemoryStoreInner {
    fn snapshot(&self, code: &SessionCode) -> Option<SessionDocument> {
        let value = value_at(&self.root, &["sessions", code.as_str()])?;
        match SessionDocument::from_value(value.clone()) {
            Ok(doc) => Some(doc),
            Err(e) => {
                tracing::warn!("Undecodable session document {}: {}", code, e);
                None
            }
        }
    }

    fn notify(&mut self, code: &SessionCode) {
        let Some(doc) = self.snapshot(code) else {
            return;
        };
        self.subscribers
            .retain(|(c, tx)| c != code || tx.send(doc.clone()).is_ok());
    }
}

fn segments(path: &str) -> Vec<&str> {
    path.split('/').filter(|s| !s.is_empty()).collect()
}

fn value_at<'a>(root: &'a Map<String, Value>, path: &[&str]) -> Option<&'a Value> {
    let (first, rest) = path.split_first()?;
    let mut current = root.get(*first)?;
    for segment in rest {
        current = current.get(*segment)?;
    }
    Some(current)
}

fn object_at<'a>(root: &'a mut Map<String, Value>, path: &[&str]) -> &'a mut Map<String, Value> {
    let mut current = root;
    for segment in path {
        let entry = current
            .entry(segment.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
        if !entry.is_object() {
            *entry = Value::Object(Map::new());
        }
        let Value::Object(map) = entry else {
            unreachable!("entry was just replaced with an object");
        };
        current = map;
    }
    current
}

fn set_at(root: &mut Map<String, Value>, path: &[&str], value: Value) {
    let Some((last, parents)) = path.split_last() else {
        return;
    };
    object_at(root, parents).insert(last.to_string(), value);
}

fn merge_at(root: &mut Map<String, Value>, path: &[&str], value: &Value) {
    let target = object_at(root, path);
    if let Value::Object(keys) = value {
        for (key, value) in keys {
            target.insert(key.clone(), value.clone());
        }
    }
}

fn remove_at(root: &mut Map<String, Value>, path: &[&str]) -> bool {
    let Some((last, parents)) = path.split_last() else {
        return false;
    };
    let mut current = root;
    for segment in parents {
        match current.get_mut(*segment) {
            Some(Value::Object(map)) => current = map,
            _ => return false,
        }
    }
    current.remove(*last).is_some()
}

#[async_trait]
impl ReplicationPort for MemoryStore {
    async fn create_session(
        &self,
        code: &SessionCode,
        doc: &SessionDocument,
    ) -> Result<(), PortError> {
        self.simulate_latency().await?;
        let value = doc.to_value()?;
        self.write(
            code,
            StoreWrite::Set {
                path: session_path(code),
                value,
            },
        )
    }

    async fn read_session(&self, code: &SessionCode) -> Result<Option<SessionDocument>, PortError> {
        self.simulate_latency().await?;
        let mut inner = self.lock();
        if let Some(error) = inner.fail_next_read.take() {
            return Err(PortError::ReadFailed(error));
        }
        match value_at(&inner.root, &["sessions", code.as_str()]) {
            Some(value) => Ok(Some(SessionDocument::from_value(value.clone())?)),
            None => Ok(None),
        }
    }

    async fn publish(
        &self,
        code: &SessionCode,
        snapshot: &SessionSnapshot,
    ) -> Result<(), PortError> {
        self.simulate_latency().await?;
        let value = snapshot.to_value()?;
        self.write(
            code,
            StoreWrite::Merge {
                path: session_path(code),
                value,
            },
        )
    }

    async fn subscribe(&self, code: &SessionCode) -> Result<Subscription, PortError> {
        self.simulate_latency().await?;
        let mut inner = self.lock();
        if let Some(error) = inner.fail_next_subscribe.take() {
            return Err(PortError::SubscribeFailed(error));
        }
        let (tx, rx) = mpsc::unbounded_channel();
        if let Some(doc) = inner.snapshot(code) {
            let _ = tx.send(doc);
        }
        inner.subscribers.push((code.clone(), tx));
        Ok(Subscription::new(rx))
    }

    async fn put_presence(
        &self,
        code: &SessionCode,
        entry: &PresenceEntry,
    ) -> Result<(), PortError> {
        self.simulate_latency().await?;
        let value = serde_json::to_value(entry).map_err(TypesError::from)?;
        self.write(
            code,
            StoreWrite::Set {
                path: presence_path(code, &entry.device_id),
                value,
            },
        )
    }

    async fn remove_presence(
        &self,
        code: &SessionCode,
        device_id: &DeviceId,
    ) -> Result<(), PortError> {
        self.simulate_latency().await?;
        self.write(
            code,
            StoreWrite::Remove {
                path: presence_path(code, device_id),
            },
        )
    }
}
