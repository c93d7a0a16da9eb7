//! Text projection of source rows
//!
//! Renders a row image into the text that gets embedded. Projection is
//! total: absent fields become `""` or `0`, never an error.

use serde_json::Value;
use std::fmt;
use vecsync_core::{EntityKind, Record};

/// Order lifecycle states as stored in the `Status` column
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderStatus {
    Pending = 0,
    Processing = 1,
    Shipped = 2,
    Delivered = 3,
    Cancelled = 4,
}

impl OrderStatus {
    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            0 => Some(Self::Pending),
            1 => Some(Self::Processing),
            2 => Some(Self::Shipped),
            3 => Some(Self::Delivered),
            4 => Some(Self::Cancelled),
            _ => None,
        }
    }

    /// An absent column counts as Pending; null or non-integer values do not
    fn from_field(value: Option<&Value>) -> Option<Self> {
        match value {
            None => Some(Self::Pending),
            Some(v) => v.as_i64().and_then(Self::from_code),
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Pending => "Pending",
            Self::Processing => "Processing",
            Self::Shipped => "Shipped",
            Self::Delivered => "Delivered",
            Self::Cancelled => "Cancelled",
        };
        f.write_str(label)
    }
}

/// Render `record` as embedding input for an entity of kind `kind`
pub fn project(kind: EntityKind, record: &Record) -> String {
    match kind {
        EntityKind::Product => project_product(record),
        EntityKind::Order => project_order(record),
        EntityKind::OrderItem => project_order_item(record),
    }
}

fn project_product(r: &Record) -> String {
    [
        format!("Product: {}", text(r, "Name")),
        format!("Description: {}", text(r, "Description")),
        format!("Category: {}", text(r, "Category")),
        format!("Price: ${}", number(r, "Price")),
        format!("Stock: {} units", number(r, "StockQuantity")),
    ]
    .join("\n")
}

fn project_order(r: &Record) -> String {
    let status = OrderStatus::from_field(r.get("Status"))
        .map_or_else(|| "Unknown".to_string(), |s| s.to_string());

    [
        format!("Order for: {}", text(r, "CustomerName")),
        format!("Email: {}", text(r, "CustomerEmail")),
        format!("Address: {}", text(r, "CustomerAddress")),
        format!("Status: {status}"),
        format!("Total: ${}", number(r, "TotalAmount")),
    ]
    .join("\n")
}

fn project_order_item(r: &Record) -> String {
    [
        format!(
            "Order Item: Order #{} - Product #{}",
            text(r, "OrderId"),
            text(r, "ProductId")
        ),
        format!("Quantity: {}", number(r, "Quantity")),
        format!("Unit Price: ${}", number(r, "UnitPrice")),
        format!("Total: ${}", number(r, "TotalPrice")),
    ]
    .join("\n")
}

fn text(r: &Record, field: &str) -> String {
    match r.get(field) {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

fn number(r: &Record, field: &str) -> String {
    match r.get(field) {
        None | Some(Value::Null) => "0".to_string(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    fn record(value: Value) -> Record {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_product_projection() {
        let r = record(json!({
            "Id": 1,
            "Name": "Widget",
            "Description": "A small widget",
            "Category": "Tools",
            "Price": 9.99,
            "StockQuantity": 12
        }));

        assert_eq!(
            project(EntityKind::Product, &r),
            "Product: Widget\nDescription: A small widget\nCategory: Tools\nPrice: $9.99\nStock: 12 units"
        );
    }

    #[test]
    fn test_missing_fields_render_placeholders() {
        let r = record(json!({"Id": 1, "Name": null}));

        assert_eq!(
            project(EntityKind::Product, &r),
            "Product: \nDescription: \nCategory: \nPrice: $0\nStock: 0 units"
        );
        assert_eq!(
            project(EntityKind::OrderItem, &r),
            "Order Item: Order # - Product #\nQuantity: 0\nUnit Price: $0\nTotal: $0"
        );
    }

    #[test]
    fn test_order_projection() {
        let r = record(json!({
            "CustomerName": "Ada",
            "CustomerEmail": "ada@example.com",
            "CustomerAddress": "1 Main St",
            "Status": 2,
            "TotalAmount": "120.50"
        }));

        assert_eq!(
            project(EntityKind::Order, &r),
            "Order for: Ada\nEmail: ada@example.com\nAddress: 1 Main St\nStatus: Shipped\nTotal: $120.50"
        );
    }

    #[test]
    fn test_order_status_labels() {
        let status_line = |status: Value| {
            let text = project(EntityKind::Order, &record(json!({ "Status": status })));
            text.lines().nth(3).unwrap().to_string()
        };

        assert_eq!(status_line(json!(0)), "Status: Pending");
        assert_eq!(status_line(json!(4)), "Status: Cancelled");
        assert_eq!(status_line(json!(7)), "Status: Unknown");
        assert_eq!(status_line(json!(-1)), "Status: Unknown");
        assert_eq!(status_line(json!("Shipped")), "Status: Unknown");
        assert_eq!(status_line(Value::Null), "Status: Unknown");

        let missing = project(EntityKind::Order, &Record::new());
        assert!(missing.contains("Status: Pending"));
    }

    #[test]
    fn test_order_item_projection() {
        let r = record(json!({
            "OrderId": 10,
            "ProductId": 3,
            "Quantity": 2,
            "UnitPrice": 4.5,
            "TotalPrice": 9.0
        }));

        assert_eq!(
            project(EntityKind::OrderItem, &r),
            "Order Item: Order #10 - Product #3\nQuantity: 2\nUnit Price: $4.5\nTotal: $9.0"
        );
    }

    fn arb_value() -> impl Strategy<Value = Value> {
        prop_oneof![
            Just(Value::Null),
            any::<bool>().prop_map(Value::from),
            any::<i64>().prop_map(Value::from),
            any::<f64>().prop_map(Value::from),
            ".{0,16}".prop_map(Value::from),
        ]
    }

    proptest! {
        #[test]
        fn projection_is_total_and_deterministic(
            fields in proptest::collection::hash_map(
                prop_oneof![
                    Just("Name".to_string()),
                    Just("Price".to_string()),
                    Just("Status".to_string()),
                    Just("Quantity".to_string()),
                    "[A-Za-z]{1,8}",
                ],
                arb_value(),
                0..8,
            )
        ) {
            let r: Record = fields.into_iter().collect();
            for kind in [EntityKind::Product, EntityKind::Order, EntityKind::OrderItem] {
                let first = project(kind, &r);
                let expected_lines = if kind == EntityKind::OrderItem { 4 } else { 5 };
                prop_assert_eq!(first.lines().count(), expected_lines);
                prop_assert_eq!(first, project(kind, &r));
            }
        }
    }
}
