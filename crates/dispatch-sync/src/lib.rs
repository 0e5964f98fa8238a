//! Inline dispatch for deterministic simulation.
//!
//! [`SyncDispatch`] runs every closure on the calling thread before
//! returning, so verification results are enqueued in exactly the order the
//! player asked for them.

use concord_dispatch::Dispatch;

/// Dispatch that runs closures inline.
#[derive(Debug, Default, Clone, Copy)]
pub struct SyncDispatch;

impl SyncDispatch {
    pub fn new() -> Self {
        Self
    }
}

impl Dispatch for SyncDispatch {
    fn spawn_consensus_crypto(&self, f: impl FnOnce() + Send + 'static) {
        f();
    }

    fn spawn_crypto(&self, f: impl FnOnce() + Send + 'static) {
        f();
    }

    fn map_crypto<T, R>(&self, items: &[T], f: impl Fn(&T) -> R + Send + Sync) -> Vec<R>
    where
        T: Sync,
        R: Send,
    {
        items.iter().map(f).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[test]
    fn test_spawns_run_in_call_order() {
        let dispatch = SyncDispatch::new();
        let log = Arc::new(Mutex::new(Vec::new()));

        let l = log.clone();
        dispatch.spawn_crypto(move || l.lock().unwrap().push("bundle"));
        let l = log.clone();
        dispatch.spawn_consensus_crypto(move || l.lock().unwrap().push("vote"));
        let l = log.clone();
        dispatch.spawn_crypto(move || l.lock().unwrap().push("payload"));

        assert_eq!(*log.lock().unwrap(), vec!["bundle", "vote", "payload"]);
    }

    #[test]
    fn test_map_crypto_preserves_order() {
        let dispatch = SyncDispatch::new();
        let weights = [3u64, 1, 4, 1, 5];
        let doubled = dispatch.map_crypto(&weights, |w| w * 2);
        assert_eq!(doubled, vec![6, 2, 8, 2, 10]);
    }
}
