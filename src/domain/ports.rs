use super::errors::StoreError;

/// Result of [`OrderStore::insert_if_absent`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    Inserted,
    AlreadyExists,
}

/// A stored `(order_id, order_info)` row.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredOrder {
    pub order_id: String,
    pub order_info: serde_json::Value,
}

/// Durable key/record storage for orders.
///
/// `insert_if_absent` must be atomic per `order_id`: of any number of
/// concurrent calls for the same id, exactly one observes `Inserted`.
pub trait OrderStore: Send + Sync + 'static {
    fn insert_if_absent(
        &self,
        order_id: &str,
        order_info: &serde_json::Value,
    ) -> Result<InsertOutcome, StoreError>;

    /// Every stored row, lazily. A failing row ends the scan with an error.
    fn scan_all(
        &self,
    ) -> Result<Box<dyn Iterator<Item = Result<StoredOrder, StoreError>> + '_>, StoreError>;
}

impl<T: OrderStore> OrderStore for std::sync::Arc<T> {
    fn insert_if_absent(
        &self,
        order_id: &str,
        order_info: &serde_json::Value,
    ) -> Result<InsertOutcome, StoreError> {
        (**self).insert_if_absent(order_id, order_info)
    }

    fn scan_all(
        &self,
    ) -> Result<Box<dyn Iterator<Item = Result<StoredOrder, StoreError>> + '_>, StoreError> {
        (**self).scan_all()
    }
}
