use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use crate::core::error::{LauncherError, LauncherResult};

/// At most one installation-affecting operation per instance id.
///
/// A second request while one is in flight is rejected with `Busy` rather
/// than queued: queuing silently against a partially-written tree is how
/// trees get corrupted. Operations on different ids run in parallel.
#[derive(Default, Clone)]
pub struct OperationGate {
    active: Arc<Mutex<HashSet<i64>>>,
}

impl OperationGate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn try_acquire(&self, instance_id: i64, label: &str) -> LauncherResult<OperationPermit> {
        let mut active = self.active.lock().unwrap();
        if !active.insert(instance_id) {
            return Err(LauncherError::Busy(label.to_string()));
        }
        Ok(OperationPermit {
            active: Arc::clone(&self.active),
            instance_id,
        })
    }

    pub fn is_busy(&self, instance_id: i64) -> bool {
        self.active.lock().unwrap().contains(&instance_id)
    }
}

/// Releases the slot on drop, whichever way the operation ends.
pub struct OperationPermit {
    active: Arc<Mutex<HashSet<i64>>>,
    instance_id: i64,
}

impl Drop for OperationPermit {
    fn drop(&mut self) {
        self.active.lock().unwrap().remove(&self.instance_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_acquire_is_rejected_not_queued() {
        let gate = OperationGate::new();

        let permit = gate.try_acquire(7, "skyblock").unwrap();
        let second = gate.try_acquire(7, "skyblock");
        assert!(matches!(second, Err(LauncherError::Busy(_))));

        // Other instances are unaffected.
        let other = gate.try_acquire(8, "other");
        assert!(other.is_ok());

        drop(permit);
        assert!(gate.try_acquire(7, "skyblock").is_ok());
    }

    #[tokio::test]
    async fn concurrent_acquires_admit_exactly_one() {
        let gate = OperationGate::new();
        let _held = gate.try_acquire(1, "race").unwrap();

        let mut handles = Vec::new();
        for _ in 0..8 {
            let gate = gate.clone();
            handles.push(tokio::spawn(async move {
                gate.try_acquire(1, "race").is_ok()
            }));
        }

        for handle in handles {
            assert!(!handle.await.unwrap());
        }
        assert!(gate.is_busy(1));
    }
}
