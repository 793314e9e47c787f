//! In-memory cluster client for testing
//!
//! Holds objects per kind, can be scripted to fail lists or deletes, and can
//! keep deleted objects visible for a number of subsequent lists to mimic
//! finalizers. Every call is recorded in order.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use crate::client::{ClusterClient, ClusterError, ClusterErrorKind};
use crate::resources::{ObjectRef, ResourceKind};

/// A recorded client call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientCall {
    List { namespace: String, kind: ResourceKind },
    Delete(ObjectRef),
}

#[derive(Debug, Clone, Copy)]
struct ListFailure {
    /// Lists that succeed before failures start
    after: usize,
    kind: ClusterErrorKind,
}

#[derive(Default)]
struct MockState {
    objects: Vec<ObjectRef>,
    /// Deleted objects still visible, with the number of lists left
    terminating: Vec<(ObjectRef, usize)>,
    /// Kind name -> lists a deleted object stays visible for
    finalize_after: HashMap<&'static str, usize>,
    list_failures: HashMap<&'static str, ListFailure>,
    delete_failures: HashMap<&'static str, ClusterErrorKind>,
    list_counts: HashMap<&'static str, usize>,
    calls: Vec<ClientCall>,
}

/// Scripted in-memory [`ClusterClient`]
#[derive(Clone, Default)]
pub struct MockClusterClient {
    state: Arc<RwLock<MockState>>,
}

impl MockClusterClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed objects of a kind
    pub fn with_objects(self, kind: ResourceKind, namespace: &str, names: &[&str]) -> Self {
        {
            let mut state = self.state.write().unwrap();
            for name in names {
                state.objects.push(ObjectRef::new(kind, namespace, *name));
            }
        }
        self
    }

    /// Fail every list of `kind`
    pub fn fail_list(self, kind: ResourceKind, error: ClusterErrorKind) -> Self {
        self.fail_list_after(kind, 0, error)
    }

    /// Let `successes` lists of `kind` through, then fail every later one
    pub fn fail_list_after(
        self,
        kind: ResourceKind,
        successes: usize,
        error: ClusterErrorKind,
    ) -> Self {
        self.state.write().unwrap().list_failures.insert(
            kind.kind,
            ListFailure {
                after: successes,
                kind: error,
            },
        );
        self
    }

    /// Fail every delete of `kind`
    pub fn fail_delete(self, kind: ResourceKind, error: ClusterErrorKind) -> Self {
        self.state
            .write()
            .unwrap()
            .delete_failures
            .insert(kind.kind, error);
        self
    }

    /// Keep deleted objects of `kind` visible for `lists` further lists
    pub fn finalize_after(self, kind: ResourceKind, lists: usize) -> Self {
        self.state
            .write()
            .unwrap()
            .finalize_after
            .insert(kind.kind, lists);
        self
    }

    /// Deleted objects of `kind` never disappear
    pub fn never_finalize(self, kind: ResourceKind) -> Self {
        self.finalize_after(kind, usize::MAX)
    }

    /// All calls in order
    pub fn calls(&self) -> Vec<ClientCall> {
        self.state.read().unwrap().calls.clone()
    }

    /// Deleted objects in order
    pub fn deletes(&self) -> Vec<ObjectRef> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                ClientCall::Delete(obj) => Some(obj),
                ClientCall::List { .. } => None,
            })
            .collect()
    }

    /// Number of lists issued for `kind`
    pub fn list_count(&self, kind: &ResourceKind) -> usize {
        self.state
            .read()
            .unwrap()
            .list_counts
            .get(kind.kind)
            .copied()
            .unwrap_or(0)
    }

    /// Whether any call touched `kind`
    pub fn touched(&self, kind: &ResourceKind) -> bool {
        self.calls().iter().any(|call| match call {
            ClientCall::List { kind: k, .. } => k == kind,
            ClientCall::Delete(obj) => &obj.kind == kind,
        })
    }
}

#[async_trait]
impl ClusterClient for MockClusterClient {
    async fn list(
        &self,
        namespace: &str,
        kind: &ResourceKind,
    ) -> Result<Vec<ObjectRef>, ClusterError> {
        let mut state = self.state.write().unwrap();
        state.calls.push(ClientCall::List {
            namespace: namespace.to_string(),
            kind: *kind,
        });

        let count = state.list_counts.entry(kind.kind).or_insert(0);
        let previous = *count;
        *count += 1;

        if let Some(failure) = state.list_failures.get(kind.kind)
            && previous >= failure.after
        {
            return Err(ClusterError::new(
                failure.kind,
                format!("{} list failed ({})", kind.plural, failure.kind),
            ));
        }

        let matches = |obj: &ObjectRef| obj.kind == *kind && obj.namespace == namespace;

        let mut items: Vec<ObjectRef> = state
            .objects
            .iter()
            .filter(|&o| matches(o))
            .cloned()
            .collect();

        for (obj, remaining) in state.terminating.iter_mut() {
            if matches(&*obj) {
                items.push(obj.clone());
                if *remaining != usize::MAX {
                    *remaining -= 1;
                }
            }
        }
        state.terminating.retain(|(_, remaining)| *remaining > 0);

        Ok(items)
    }

    async fn delete(&self, object: &ObjectRef) -> Result<(), ClusterError> {
        let mut state = self.state.write().unwrap();
        state.calls.push(ClientCall::Delete(object.clone()));

        if let Some(kind) = state.delete_failures.get(object.kind.kind) {
            return Err(ClusterError::new(*kind, format!("delete of {} failed", object)));
        }

        let Some(position) = state.objects.iter().position(|o| o == object) else {
            return Err(ClusterError::new(
                ClusterErrorKind::NotFound,
                format!("{} not found", object),
            ));
        };
        let removed = state.objects.remove(position);

        let lingering = state
            .finalize_after
            .get(object.kind.kind)
            .copied()
            .unwrap_or(0);
        if lingering > 0 {
            state.terminating.push((removed, lingering));
        }

        Ok(())
    }
}
