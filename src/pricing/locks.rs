use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// One async mutex per product id; different products never contend
#[derive(Default)]
pub struct ProductLocks {
    locks: DashMap<i64, Arc<Mutex<()>>>,
}

impl ProductLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Waits until no other evaluation of this product is running
    pub async fn acquire(&self, product_id: i64) -> OwnedMutexGuard<()> {
        self.prune();
        // the map shard lock is released before awaiting the product lock
        let lock = Arc::clone(self.locks.entry(product_id).or_default().value());
        lock.lock_owned().await
    }

    /// Drops locks nobody holds or waits on; the map only ever owns one reference
    fn prune(&self) {
        self.locks.retain(|_, lock| Arc::strong_count(lock) > 1);
    }

    pub fn len(&self) -> usize {
        self.locks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}
