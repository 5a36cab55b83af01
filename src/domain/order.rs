use serde::{Deserialize, Serialize};
use serde_json::ser::PrettyFormatter;
use utoipa::ToSchema;
use validator::{Validate, ValidationErrors};

// Every field defaults so that an absent key reaches validation and is
// reported by name instead of failing the JSON parse.

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, Validate, ToSchema)]
#[serde(default)]
pub struct Delivery {
    #[validate(length(min = 1))]
    pub name: String,
    #[validate(length(min = 1))]
    pub phone: String,
    #[validate(length(min = 1))]
    pub zip: String,
    #[validate(length(min = 1))]
    pub city: String,
    #[validate(length(min = 1))]
    pub address: String,
    #[validate(length(min = 1))]
    pub region: String,
    #[validate(length(min = 1))]
    pub email: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, Validate, ToSchema)]
#[serde(default)]
pub struct Payment {
    #[validate(length(min = 1))]
    pub transaction: String,
    pub request_id: String,
    #[validate(length(min = 1))]
    pub currency: String,
    #[validate(length(min = 1))]
    pub provider: String,
    #[validate(range(min = 1))]
    pub amount: i64,
    /// Unix seconds.
    #[validate(range(min = 1))]
    pub payment_dt: i64,
    #[validate(length(min = 1))]
    pub bank: String,
    #[validate(range(min = 1))]
    pub delivery_cost: i64,
    #[validate(range(min = 1))]
    pub goods_total: i64,
    pub custom_fee: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, Validate, ToSchema)]
#[serde(default)]
pub struct Item {
    #[validate(range(min = 1))]
    pub chrt_id: i64,
    #[validate(length(min = 1))]
    pub track_number: String,
    #[validate(range(min = 1))]
    pub price: i64,
    #[validate(length(min = 1))]
    pub rid: String,
    #[validate(length(min = 1))]
    pub name: String,
    /// Discount percentage.
    #[validate(range(min = 1))]
    pub sale: i64,
    #[validate(length(min = 1))]
    pub size: String,
    #[validate(range(min = 1))]
    pub total_price: i64,
    #[validate(range(min = 1))]
    pub nm_id: i64,
    #[validate(length(min = 1))]
    pub brand: String,
    #[validate(range(min = 1))]
    pub status: i64,
}

/// An order as published on the bus, stored in `orders.order_info` and
/// served from the cache. Field names follow the wire format.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, Validate, ToSchema)]
#[serde(default)]
pub struct Order {
    #[validate(length(min = 1))]
    pub order_uid: String,
    #[validate(length(min = 1))]
    pub track_number: String,
    #[validate(length(min = 1))]
    pub entry: String,
    #[validate(nested)]
    pub delivery: Delivery,
    #[validate(nested)]
    pub payment: Payment,
    #[validate(length(min = 1), nested)]
    pub items: Vec<Item>,
    #[validate(length(min = 1))]
    pub locale: String,
    pub internal_signature: String,
    #[validate(length(min = 1))]
    pub customer_id: String,
    #[validate(length(min = 1))]
    pub delivery_service: String,
    #[validate(length(min = 1))]
    pub shardkey: String,
    #[validate(range(min = 1))]
    pub sm_id: i64,
    #[validate(length(min = 1))]
    pub date_created: String,
    #[validate(length(min = 1))]
    pub oof_shard: String,
}

impl Order {
    /// Decode a bus payload. Missing fields are left at their zero value and
    /// caught by [`Order::check`].
    pub fn parse(raw: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(raw)
    }

    /// Enforce the required-field rules.
    pub fn check(&self) -> Result<(), ValidationErrors> {
        self.validate()
    }

    pub fn to_value(&self) -> Result<serde_json::Value, serde_json::Error> {
        serde_json::to_value(self)
    }

    pub fn from_value(value: serde_json::Value) -> Result<Self, serde_json::Error> {
        serde_json::from_value(value)
    }

    /// Human-readable rendering with single-space indentation.
    pub fn to_indented_json(&self) -> Result<String, serde_json::Error> {
        let mut buf = Vec::new();
        let mut ser =
            serde_json::Serializer::with_formatter(&mut buf, PrettyFormatter::with_indent(b" "));
        self.serialize(&mut ser)?;
        // serde_json only ever emits valid UTF-8.
        Ok(String::from_utf8_lossy(&buf).into_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{sample_order, sample_payload};

    #[test]
    fn sample_payload_parses_and_passes_validation() {
        let order = Order::parse(sample_payload("b563feb7b2b84b6test").as_bytes())
            .expect("payload should parse");
        assert_eq!(order.order_uid, "b563feb7b2b84b6test");
        assert_eq!(order.items.len(), 1);
        assert_eq!(order.payment.custom_fee, 0);
        order.check().expect("sample order should be valid");
    }

    #[test]
    fn malformed_json_is_a_parse_error() {
        assert!(Order::parse(b"{\"order_uid\": ").is_err());
        assert!(Order::parse(b"not json at all").is_err());
    }

    #[test]
    fn wrong_field_type_is_a_parse_error() {
        let raw = sample_payload("x").replace("\"sm_id\": 99", "\"sm_id\": \"ninety-nine\"");
        assert!(Order::parse(raw.as_bytes()).is_err());
    }

    #[test]
    fn empty_nested_email_fails_validation() {
        let mut order = sample_order("x");
        order.delivery.email.clear();
        let err = order.check().expect_err("empty email must be rejected");
        assert!(err.errors().contains_key("delivery"));
        assert!(err.to_string().contains("email"));
    }

    #[test]
    fn missing_top_level_field_fails_validation() {
        let mut value = sample_order("x").to_value().expect("serialize");
        value
            .as_object_mut()
            .expect("object")
            .remove("track_number");
        let order = Order::parse(value.to_string().as_bytes()).expect("still parses");
        let err = order.check().expect_err("missing track_number must be rejected");
        assert!(err.field_errors().contains_key("track_number"));
    }

    #[test]
    fn empty_items_fails_validation() {
        let mut order = sample_order("x");
        order.items.clear();
        let err = order.check().expect_err("empty items must be rejected");
        assert!(err.field_errors().contains_key("items"));
    }

    #[test]
    fn item_with_missing_brand_fails_validation() {
        let mut order = sample_order("x");
        order.items[0].brand.clear();
        assert!(order.check().is_err());
    }

    #[test]
    fn optional_fields_may_be_empty() {
        let mut order = sample_order("x");
        order.internal_signature.clear();
        order.payment.request_id.clear();
        order.payment.custom_fee = 0;
        order.check().expect("optional fields may be empty");
    }

    #[test]
    fn date_created_is_free_form_but_required() {
        let mut order = sample_order("x");
        order.date_created = "2021-11-26 06:22:19".to_string();
        order.check().expect("any non-empty timestamp text is accepted");

        order.date_created.clear();
        let errors = order.check().expect_err("empty date_created");
        assert!(errors.field_errors().contains_key("date_created"));
    }

    #[test]
    fn value_conversion_preserves_content() {
        let order = sample_order("roundtrip");
        let back = Order::from_value(order.to_value().expect("to value")).expect("from value");
        assert_eq!(back, order);
    }

    #[test]
    fn indented_json_uses_single_space() {
        let text = sample_order("b563feb7b2b84b6test")
            .to_indented_json()
            .expect("render");
        assert!(text.starts_with("{\n \"order_uid\": \"b563feb7b2b84b6test\""));
        assert!(text.contains("\n  \"name\""));
    }
}
