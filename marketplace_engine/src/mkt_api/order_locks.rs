use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::db_types::OrderId;

/// One async mutex per order, created on demand. Holding an [`OrderGuard`] makes the holder the only in-process
/// writer for that order; different orders never contend.
#[derive(Clone, Default)]
pub struct OrderLocks {
    locks: Arc<DashMap<OrderId, Arc<Mutex<()>>>>,
}

impl OrderLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn lock(&self, order_id: OrderId) -> OrderGuard {
        // The clone happens under the shard lock, so it cannot race with the clean-up in `OrderGuard::drop`
        let mutex = Arc::clone(self.locks.entry(order_id).or_default().value());
        let guard = mutex.lock_owned().await;
        OrderGuard { locks: Arc::clone(&self.locks), order_id, guard: Some(guard) }
    }

    /// The number of orders with a live lock entry
    pub fn len(&self) -> usize {
        self.locks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}

pub struct OrderGuard {
    locks: Arc<DashMap<OrderId, Arc<Mutex<()>>>>,
    order_id: OrderId,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for OrderGuard {
    fn drop(&mut self) {
        drop(self.guard.take());
        // Nobody else holds or waits on this mutex, so the entry can go
        self.locks.remove_if(&self.order_id, |_, mutex| Arc::strong_count(mutex) == 1);
    }
}

#[cfg(test)]
mod test {
    use std::{
        sync::atomic::{AtomicUsize, Ordering},
        time::Duration,
    };

    use super::*;

    #[tokio::test]
    async fn same_order_is_serialised() {
        let locks = OrderLocks::new();
        let active = Arc::new(AtomicUsize::new(0));
        let max_active = Arc::new(AtomicUsize::new(0));
        let mut tasks = vec![];
        for _ in 0..8 {
            let locks = locks.clone();
            let active = active.clone();
            let max_active = max_active.clone();
            tasks.push(tokio::spawn(async move {
                let _guard = locks.lock(OrderId(1)).await;
                let now = active.fetch_add(1, Ordering::SeqCst) + 1;
                max_active.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(5)).await;
                active.fetch_sub(1, Ordering::SeqCst);
            }));
        }
        for task in tasks {
            task.await.unwrap();
        }
        assert_eq!(max_active.load(Ordering::SeqCst), 1);
        assert!(locks.is_empty());
    }

    #[tokio::test]
    async fn different_orders_do_not_block() {
        let locks = OrderLocks::new();
        let _a = locks.lock(OrderId(1)).await;
        let b = tokio::time::timeout(Duration::from_millis(100), locks.lock(OrderId(2))).await;
        assert!(b.is_ok());
        assert_eq!(locks.len(), 2);
    }
}
