//! Fixtures shared by the unit tests.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use crate::domain::errors::StoreError;
use crate::domain::order::Order;
use crate::domain::ports::{InsertOutcome, OrderStore, StoredOrder};

pub fn sample_payload(order_uid: &str) -> String {
    format!(
        r#"{{
  "order_uid": "{order_uid}",
  "track_number": "WBILMTESTTRACK",
  "entry": "WBIL",
  "delivery": {{
    "name": "Test Testov",
    "phone": "+9720000000",
    "zip": "2639809",
    "city": "Kiryat Mozkin",
    "address": "Ploshad Mira 15",
    "region": "Kraiot",
    "email": "test@gmail.com"
  }},
  "payment": {{
    "transaction": "{order_uid}",
    "request_id": "",
    "currency": "USD",
    "provider": "wbpay",
    "amount": 1817,
    "payment_dt": 1637907727,
    "bank": "alpha",
    "delivery_cost": 1500,
    "goods_total": 317,
    "custom_fee": 0
  }},
  "items": [
    {{
      "chrt_id": 9934930,
      "track_number": "WBILMTESTTRACK",
      "price": 453,
      "rid": "ab4219087a764ae0btest",
      "name": "Mascaras",
      "sale": 30,
      "size": "0",
      "total_price": 317,
      "nm_id": 2389212,
      "brand": "Vivienne Sabo",
      "status": 202
    }}
  ],
  "locale": "en",
  "internal_signature": "",
  "customer_id": "test",
  "delivery_service": "meest",
  "shardkey": "9",
  "sm_id": 99,
  "date_created": "2021-11-26T06:22:19Z",
  "oof_shard": "1"
}}"#
    )
}

pub fn sample_order(order_uid: &str) -> Order {
    Order::parse(sample_payload(order_uid).as_bytes()).expect("sample payload is valid JSON")
}

/// `OrderStore` backed by a map, with switchable failure injection.
#[derive(Default)]
pub struct InMemoryStore {
    rows: Mutex<BTreeMap<String, serde_json::Value>>,
    fail_writes: Mutex<bool>,
    fail_scan_after: Mutex<Option<usize>>,
    pub insert_calls: AtomicUsize,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_rows(rows: impl IntoIterator<Item = (String, serde_json::Value)>) -> Self {
        let store = Self::new();
        store.rows.lock().expect("poisoned").extend(rows);
        store
    }

    pub fn set_fail_writes(&self, fail: bool) {
        *self.fail_writes.lock().expect("poisoned") = fail;
    }

    /// Make `scan_all` yield `n` rows and then an error.
    pub fn fail_scan_after(&self, n: usize) {
        *self.fail_scan_after.lock().expect("poisoned") = Some(n);
    }

    pub fn row_count(&self) -> usize {
        self.rows.lock().expect("poisoned").len()
    }

    pub fn row(&self, order_id: &str) -> Option<serde_json::Value> {
        self.rows.lock().expect("poisoned").get(order_id).cloned()
    }
}

impl OrderStore for InMemoryStore {
    fn insert_if_absent(
        &self,
        order_id: &str,
        order_info: &serde_json::Value,
    ) -> Result<InsertOutcome, StoreError> {
        self.insert_calls.fetch_add(1, Ordering::SeqCst);
        if *self.fail_writes.lock().expect("poisoned") {
            return Err(StoreError::Unavailable("injected write failure".to_string()));
        }
        let mut rows = self.rows.lock().expect("poisoned");
        if rows.contains_key(order_id) {
            return Ok(InsertOutcome::AlreadyExists);
        }
        rows.insert(order_id.to_string(), order_info.clone());
        Ok(InsertOutcome::Inserted)
    }

    fn scan_all(
        &self,
    ) -> Result<Box<dyn Iterator<Item = Result<StoredOrder, StoreError>> + '_>, StoreError> {
        let rows: Vec<StoredOrder> = self
            .rows
            .lock()
            .expect("poisoned")
            .iter()
            .map(|(order_id, order_info)| StoredOrder {
                order_id: order_id.clone(),
                order_info: order_info.clone(),
            })
            .collect();
        let fail_after = *self.fail_scan_after.lock().expect("poisoned");
        let iter = rows.into_iter().map(Ok::<StoredOrder, StoreError>);
        match fail_after {
            None => Ok(Box::new(iter)),
            Some(n) => Ok(Box::new(iter.take(n).chain(std::iter::once(Err(
                StoreError::Query("injected scan failure".to_string()),
            ))))),
        }
    }
}
