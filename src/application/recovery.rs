use thiserror::Error;

use crate::cache::OrderCache;
use crate::domain::errors::StoreError;
use crate::domain::order::Order;
use crate::domain::ports::OrderStore;

#[derive(Debug, Error)]
pub enum RecoveryError {
    #[error("Cannot read orders from the store: {0}")]
    Scan(#[from] StoreError),
    #[error("Stored order {order_id} is not a valid order: {source}")]
    Parse {
        order_id: String,
        source: serde_json::Error,
    },
}

/// Rebuild the cache from every stored row. Returns the number of orders
/// loaded. Any unreadable row aborts recovery.
pub fn restore_cache<S: OrderStore + ?Sized>(
    store: &S,
    cache: &OrderCache,
) -> Result<usize, RecoveryError> {
    let mut restored = 0;
    for row in store.scan_all()? {
        let row = row?;
        let order = Order::from_value(row.order_info).map_err(|source| RecoveryError::Parse {
            order_id: row.order_id.clone(),
            source,
        })?;
        if cache.put(row.order_id, order) {
            restored += 1;
        }
    }
    log::info!("Cache recovery: restored {} orders", restored);
    Ok(restored)
}
