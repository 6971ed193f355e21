use parking_lot::RwLock;
use std::collections::{HashMap, HashSet};
use tracing::{debug, info};

/// Human approvals keyed by `(session_id, operation_key)`.
///
/// Grants never expire on their own; they live until revoked or until the
/// owning session is torn down via [`GrantStore::clear_session`].
#[derive(Debug, Default)]
pub struct GrantStore {
    grants: RwLock<HashMap<String, HashSet<String>>>,
}

impl GrantStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an approval. Visible to every subsequent check immediately.
    pub fn grant(&self, session_id: &str, operation_key: &str) {
        let inserted = self
            .grants
            .write()
            .entry(session_id.to_string())
            .or_default()
            .insert(operation_key.to_string());

        if inserted {
            info!(session = session_id, operation = operation_key, "Authorization granted");
        }
    }

    pub fn is_granted(&self, session_id: &str, operation_key: &str) -> bool {
        self.grants
            .read()
            .get(session_id)
            .is_some_and(|keys| keys.contains(operation_key))
    }

    pub fn revoke(&self, session_id: &str, operation_key: &str) -> bool {
        let mut grants = self.grants.write();
        let Some(keys) = grants.get_mut(session_id) else {
            return false;
        };

        let removed = keys.remove(operation_key);
        if keys.is_empty() {
            grants.remove(session_id);
        }
        removed
    }

    /// Drop every grant held by a session. Returns how many were removed.
    pub fn clear_session(&self, session_id: &str) -> usize {
        let removed = self
            .grants
            .write()
            .remove(session_id)
            .map(|keys| keys.len())
            .unwrap_or(0);

        debug!(session = session_id, removed, "Cleared session grants");
        removed
    }

    /// Granted operation keys for a session, sorted.
    pub fn granted_keys(&self, session_id: &str) -> Vec<String> {
        let mut keys: Vec<String> = self
            .grants
            .read()
            .get(session_id)
            .map(|keys| keys.iter().cloned().collect())
            .unwrap_or_default();
        keys.sort();
        keys
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_grant_is_scoped_to_session_and_key() {
        let store = GrantStore::new();
        store.grant("s1", "file_operations.read_file");

        assert!(store.is_granted("s1", "file_operations.read_file"));
        assert!(!store.is_granted("s1", "file_operations.create_file"));
        assert!(!store.is_granted("s2", "file_operations.read_file"));
    }

    #[test]
    fn test_revoke_and_clear() {
        let store = GrantStore::new();
        store.grant("s1", "a");
        store.grant("s1", "b");
        store.grant("s2", "a");

        assert!(store.revoke("s1", "a"));
        assert!(!store.revoke("s1", "a"));
        assert_eq!(store.granted_keys("s1"), vec!["b".to_string()]);

        assert_eq!(store.clear_session("s1"), 1);
        assert_eq!(store.clear_session("s1"), 0);
        assert!(store.is_granted("s2", "a"));
    }

    #[test]
    fn test_concurrent_grants_are_all_visible() {
        let store = Arc::new(GrantStore::new());
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let store = store.clone();
                std::thread::spawn(move || {
                    for j in 0..50 {
                        store.grant(&format!("s{}", i), &format!("op{}", j));
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        for i in 0..8 {
            assert_eq!(store.granted_keys(&format!("s{}", i)).len(), 50);
        }
    }
}
