use diesel::prelude::*;
use serde_json::Value;

use crate::domain::ports::StoredOrder;
use crate::schema::orders;

#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = orders)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct OrderRow {
    pub order_id: String,
    pub order_info: Value,
}

impl From<OrderRow> for StoredOrder {
    fn from(row: OrderRow) -> Self {
        StoredOrder {
            order_id: row.order_id,
            order_info: row.order_info,
        }
    }
}

#[derive(Debug, Insertable)]
#[diesel(table_name = orders)]
pub struct NewOrderRow {
    pub order_id: String,
    pub order_info: Value,
}
