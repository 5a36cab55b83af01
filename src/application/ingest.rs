use std::sync::Arc;

use crate::cache::OrderCache;
use crate::domain::errors::IngestError;
use crate::domain::order::Order;
use crate::domain::ports::{InsertOutcome, OrderStore};

/// What happened to one delivered payload.
#[derive(Debug)]
pub enum IngestOutcome {
    /// Stored, then cached.
    Committed { order_uid: String },
    /// Already known; nothing changed.
    Duplicate { order_uid: String },
    /// Parse or validation failure. Redelivery cannot fix it.
    Dropped(IngestError),
    /// The store write failed. The cache was not touched.
    Failed(IngestError),
}

impl IngestOutcome {
    /// Whether the subscriber may acknowledge the message.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, IngestOutcome::Failed(_))
    }
}

/// Parse -> validate -> deduplicate -> store -> cache.
///
/// The store is written first and is the authority on uniqueness; the cache
/// is only filled after the store has the row.
pub struct IngestService<S> {
    store: S,
    cache: Arc<OrderCache>,
}

impl<S: OrderStore> IngestService<S> {
    pub fn new(store: S, cache: Arc<OrderCache>) -> Self {
        Self { store, cache }
    }

    pub fn ingest(&self, raw: &[u8]) -> IngestOutcome {
        let order = match accept(raw) {
            Ok(order) => order,
            Err(e) => {
                log::warn!("Dropping message: {}", e);
                return IngestOutcome::Dropped(e);
            }
        };

        if self.cache.contains(&order.order_uid) {
            log::info!("Order {} is already known, skipping", order.order_uid);
            return IngestOutcome::Duplicate {
                order_uid: order.order_uid,
            };
        }

        let order_info = match order.to_value() {
            Ok(value) => value,
            Err(e) => {
                log::warn!("Dropping order {}: {}", order.order_uid, e);
                return IngestOutcome::Dropped(e.into());
            }
        };

        match self.store.insert_if_absent(&order.order_uid, &order_info) {
            Ok(InsertOutcome::Inserted) => {
                let order_uid = order.order_uid.clone();
                self.cache.put(order_uid.clone(), order);
                log::info!("Added order {}", order_uid);
                IngestOutcome::Committed { order_uid }
            }
            Ok(InsertOutcome::AlreadyExists) => {
                // The writer that won the insert fills the cache with the
                // stored content. This payload may differ from it.
                log::info!("Order {} is already stored, skipping", order.order_uid);
                IngestOutcome::Duplicate {
                    order_uid: order.order_uid,
                }
            }
            Err(e) => {
                log::error!("Failed to store order {}: {}", order.order_uid, e);
                IngestOutcome::Failed(e.into())
            }
        }
    }

    pub fn cache(&self) -> &Arc<OrderCache> {
        &self.cache
    }
}

fn accept(raw: &[u8]) -> Result<Order, IngestError> {
    let order = Order::parse(raw)?;
    order.check()?;
    Ok(order)
}
