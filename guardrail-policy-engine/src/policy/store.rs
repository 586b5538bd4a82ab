// SPDX-License-Identifier: Apache-2.0
// Copyright 2024-2026 CAB Ingénierie / Christophe ABOULICAM
//! Current-snapshot holder with atomic replacement.
//!
//! Readers clone the `Arc` under a short read lock and evaluate against that
//! clone without holding any lock. A reload builds its snapshot elsewhere and
//! swaps the pointer in one write, so an evaluation that started on
//! generation N never sees any part of generation N+1.

use std::sync::{Arc, PoisonError, RwLock};

use crate::policy::snapshot::Snapshot;

struct Published<M> {
    generation: u64,
    snapshot: Arc<Snapshot<M>>,
}

pub struct SnapshotStore<M> {
    current: RwLock<Published<M>>,
}

impl<M> SnapshotStore<M> {
    /// Create a store whose first snapshot is generation 1.
    pub fn new(snapshot: Snapshot<M>) -> Self {
        Self {
            current: RwLock::new(Published {
                generation: 1,
                snapshot: Arc::new(snapshot),
            }),
        }
    }

    pub fn current(&self) -> Arc<Snapshot<M>> {
        let published = self.current.read().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(&published.snapshot)
    }

    pub fn generation(&self) -> u64 {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .generation
    }

    /// Replace the current snapshot and return its generation number.
    pub fn publish(&self, snapshot: Snapshot<M>) -> u64 {
        let snapshot = Arc::new(snapshot);
        let mut published = self.current.write().unwrap_or_else(PoisonError::into_inner);
        published.generation += 1;
        published.snapshot = snapshot;
        published.generation
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::snapshot::PolicyModule;
    use serde_json::json;

    #[test]
    fn test_publish_swaps_and_bumps_generation() {
        let store = SnapshotStore::new(Snapshot::<()>::empty());
        assert_eq!(store.generation(), 1);

        let before = store.current();
        let generation = store.publish(Snapshot::new(
            vec![PolicyModule::new("p.yaml", "a.b", ())],
            json!({}),
        ));

        assert_eq!(generation, 2);
        assert_eq!(store.generation(), 2);
        assert_eq!(store.current().module_count(), 1);
        // A reader holding the old snapshot is unaffected by the swap.
        assert_eq!(before.module_count(), 0);
    }

    #[test]
    fn test_concurrent_readers_during_publish() {
        let store = Arc::new(SnapshotStore::new(Snapshot::<()>::empty()));

        let readers: Vec<_> = (0..4)
            .map(|_| {
                let store = Arc::clone(&store);
                std::thread::spawn(move || {
                    for _ in 0..1000 {
                        let snapshot = store.current();
                        // Every observed snapshot is complete: 0 or 2 modules, never 1.
                        assert!(snapshot.module_count() == 0 || snapshot.module_count() == 2);
                    }
                })
            })
            .collect();

        for _ in 0..50 {
            store.publish(Snapshot::new(
                vec![
                    PolicyModule::new("a.yaml", "a", ()),
                    PolicyModule::new("b.yaml", "a", ()),
                ],
                json!({}),
            ));
        }

        for reader in readers {
            reader.join().unwrap();
        }
        assert_eq!(store.generation(), 51);
    }
}
