use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use crate::domain::order::Order;

/// Process-wide `order_uid -> Order` map.
///
/// Sharded, so readers only contend with writers touching the same shard.
/// Entries are never replaced or removed.
#[derive(Debug, Default)]
pub struct OrderCache {
    orders: DashMap<String, Arc<Order>>,
}

impl OrderCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, order_uid: &str) -> Option<Arc<Order>> {
        self.orders.get(order_uid).map(|entry| Arc::clone(entry.value()))
    }

    pub fn contains(&self, order_uid: &str) -> bool {
        self.orders.contains_key(order_uid)
    }

    /// Insert unless the key is already present. Returns `true` if this call
    /// inserted; an existing entry is left untouched.
    pub fn put(&self, order_uid: impl Into<String>, order: Order) -> bool {
        match self.orders.entry(order_uid.into()) {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                slot.insert(Arc::new(order));
                true
            }
        }
    }

    pub fn size(&self) -> usize {
        self.orders.len()
    }
}
