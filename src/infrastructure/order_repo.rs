use diesel::prelude::*;

use crate::db::DbPool;
use crate::domain::errors::StoreError;
use crate::domain::ports::{InsertOutcome, OrderStore, StoredOrder};
use crate::schema::orders;

use super::models::{NewOrderRow, OrderRow};

/// Rows fetched per round trip while scanning.
const SCAN_PAGE_SIZE: i64 = 500;

// ── Error conversions (infrastructure concern only) ──────────────────────────

impl From<diesel::result::Error> for StoreError {
    fn from(e: diesel::result::Error) -> Self {
        StoreError::Query(e.to_string())
    }
}

impl From<r2d2::Error> for StoreError {
    fn from(e: r2d2::Error) -> Self {
        StoreError::Unavailable(e.to_string())
    }
}

// ── Store ─────────────────────────────────────────────────────────────────────

#[derive(Clone)]
pub struct DieselOrderStore {
    pool: DbPool,
}

impl DieselOrderStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

impl OrderStore for DieselOrderStore {
    fn insert_if_absent(
        &self,
        order_id: &str,
        order_info: &serde_json::Value,
    ) -> Result<InsertOutcome, StoreError> {
        let mut conn = self.pool.get()?;

        // ON CONFLICT makes the primary key the arbiter between racing inserts.
        let inserted = diesel::insert_into(orders::table)
            .values(&NewOrderRow {
                order_id: order_id.to_string(),
                order_info: order_info.clone(),
            })
            .on_conflict(orders::order_id)
            .do_nothing()
            .execute(&mut conn)?;

        Ok(if inserted == 0 {
            InsertOutcome::AlreadyExists
        } else {
            InsertOutcome::Inserted
        })
    }

    fn scan_all(
        &self,
    ) -> Result<Box<dyn Iterator<Item = Result<StoredOrder, StoreError>> + '_>, StoreError> {
        Ok(Box::new(ScanPages {
            pool: &self.pool,
            after: None,
            buffer: Vec::new().into_iter(),
            exhausted: false,
        }))
    }
}

/// Keyset-paginated scan over `orders`, ordered by `order_id`.
struct ScanPages<'a> {
    pool: &'a DbPool,
    after: Option<String>,
    buffer: std::vec::IntoIter<OrderRow>,
    exhausted: bool,
}

impl ScanPages<'_> {
    fn fetch(&self) -> Result<Vec<OrderRow>, StoreError> {
        let mut conn = self.pool.get()?;
        let mut query = orders::table
            .select(OrderRow::as_select())
            .order(orders::order_id.asc())
            .limit(SCAN_PAGE_SIZE)
            .into_boxed();
        if let Some(after) = &self.after {
            query = query.filter(orders::order_id.gt(after.clone()));
        }
        Ok(query.load(&mut conn)?)
    }
}

impl Iterator for ScanPages<'_> {
    type Item = Result<StoredOrder, StoreError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(row) = self.buffer.next() {
                self.after = Some(row.order_id.clone());
                return Some(Ok(row.into()));
            }
            if self.exhausted {
                return None;
            }
            match self.fetch() {
                Ok(rows) => {
                    self.exhausted = (rows.len() as i64) < SCAN_PAGE_SIZE;
                    self.buffer = rows.into_iter();
                }
                Err(e) => {
                    self.exhausted = true;
                    return Some(Err(e));
                }
            }
        }
    }
}
