use std::collections::{HashMap, HashSet};
use std::sync::RwLock;

use chrono::{DateTime, Utc};

#[derive(Debug, Clone)]
pub struct ClientMetadata {
    pub client_id: String,
    pub accepted_at: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
    pub groups: HashSet<String>,
}

/// Active connection registry plus group membership index. Mutated only
/// under a short-held lock for lookup-and-modify (§5 shared-resource
/// policy) — there is no long-lived per-connection ownership of this
/// table, unlike the batcher/dedup state which belongs to one task.
#[derive(Default)]
pub struct ConnectionTable {
    clients: RwLock<HashMap<String, ClientMetadata>>,
    group_index: RwLock<HashMap<String, HashSet<String>>>,
}

impl ConnectionTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, client_id: &str, group: &str, now: DateTime<Utc>) {
        let mut clients = self.clients.write().expect("connection table lock poisoned");
        let mut groups = HashSet::new();
        groups.insert(group.to_string());
        clients.insert(
            client_id.to_string(),
            ClientMetadata { client_id: client_id.to_string(), accepted_at: now, last_activity: now, groups },
        );
        drop(clients);
        self.group_index
            .write()
            .expect("group index lock poisoned")
            .entry(group.to_string())
            .or_default()
            .insert(client_id.to_string());
    }

    pub fn join_group(&self, client_id: &str, group: &str) {
        if let Some(metadata) = self.clients.write().expect("connection table lock poisoned").get_mut(client_id) {
            metadata.groups.insert(group.to_string());
        } else {
            return;
        }
        self.group_index
            .write()
            .expect("group index lock poisoned")
            .entry(group.to_string())
            .or_default()
            .insert(client_id.to_string());
    }

    pub fn touch_activity(&self, client_id: &str, now: DateTime<Utc>) {
        if let Some(metadata) = self.clients.write().expect("connection table lock poisoned").get_mut(client_id) {
            metadata.last_activity = now;
        }
    }

    /// Removes a client from the table and every group it belonged to
    /// (§4.6 cancellation semantics).
    pub fn remove(&self, client_id: &str) {
        let groups = {
            let mut clients = self.clients.write().expect("connection table lock poisoned");
            clients.remove(client_id).map(|m| m.groups).unwrap_or_default()
        };
        let mut index = self.group_index.write().expect("group index lock poisoned");
        for group in groups {
            if let Some(members) = index.get_mut(&group) {
                members.remove(client_id);
            }
        }
    }

    /// Resolves the target set once, for a broadcast caller to fan out
    /// against without re-locking per send (§4.6 broadcast semantics).
    pub fn members_of(&self, group: &str) -> Vec<String> {
        self.group_index
            .read()
            .expect("group index lock poisoned")
            .get(group)
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn all_client_ids(&self) -> Vec<String> {
        self.clients.read().expect("connection table lock poisoned").keys().cloned().collect()
    }

    pub fn metadata(&self, client_id: &str) -> Option<ClientMetadata> {
        self.clients.read().expect("connection table lock poisoned").get(client_id).cloned()
    }

    /// Clients whose `last_activity` is older than `cutoff` — the cleanup
    /// task's idle-disconnect candidate set (§4.6).
    pub fn idle_clients(&self, cutoff: DateTime<Utc>) -> Vec<String> {
        self.clients
            .read()
            .expect("connection table lock poisoned")
            .values()
            .filter(|m| m.last_activity < cutoff)
            .map(|m| m.client_id.clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.clients.read().expect("connection table lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
