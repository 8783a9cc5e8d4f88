//! Typed CRM records with residual property bags.
//!
//! Zoho records mix a handful of well-known keys with arbitrary module
//! fields and `$`-prefixed metadata. Known keys decode into typed fields;
//! every `$` key lands in [`Record::properties`] and every other unknown key
//! in [`Record::fields`].

use std::collections::BTreeMap;

use chrono::{DateTime, FixedOffset};
use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::Result;

/// Keys decoded into typed [`Record`] fields.
pub const STANDARD_FIELDS: [&str; 8] = [
    "id",
    "Product_Details",
    "$line_tax",
    "Owner",
    "Created_By",
    "Modified_By",
    "Created_Time",
    "Modified_Time",
];

/// Prefix Zoho uses for system metadata keys.
pub const PROPERTY_PREFIX: char = '$';

/// Untyped values keyed by their API name.
pub type PropertyBag = BTreeMap<String, Value>;

/// One decoded CRM entity.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Record {
    pub id: Option<String>,
    pub line_items: Option<Vec<InventoryLineItem>>,
    pub line_taxes: Option<Vec<Tax>>,
    pub owner: Option<User>,
    pub created_by: Option<User>,
    pub modified_by: Option<User>,
    pub created_time: Option<String>,
    pub modified_time: Option<String>,
    /// Every `$`-prefixed key, `$line_tax` included.
    pub properties: PropertyBag,
    /// Every key that is neither standard nor `$`-prefixed.
    pub fields: PropertyBag,
}

impl Record {
    /// Split a raw JSON object into typed fields and bags.
    pub fn from_map(map: Map<String, Value>) -> std::result::Result<Self, serde_json::Error> {
        let known: KnownFields = serde_json::from_value(Value::Object(map.clone()))?;
        let mut properties = PropertyBag::new();
        let mut fields = PropertyBag::new();
        for (key, value) in map {
            if key.starts_with(PROPERTY_PREFIX) {
                properties.insert(key, value);
            } else if !STANDARD_FIELDS.contains(&key.as_str()) {
                fields.insert(key, value);
            }
        }

        Ok(Self {
            id: known.id.map(id_to_string),
            line_items: known.line_items,
            line_taxes: known.line_taxes,
            owner: known.owner,
            created_by: known.created_by,
            modified_by: known.modified_by,
            created_time: known.created_time,
            modified_time: known.modified_time,
            properties,
            fields,
        })
    }

    /// Module field by API name.
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    /// `$` metadata by key, prefix included.
    pub fn property(&self, key: &str) -> Option<&Value> {
        self.properties.get(key)
    }

    pub fn created_at(&self) -> Option<DateTime<FixedOffset>> {
        parse_timestamp(self.created_time.as_deref())
    }

    pub fn modified_at(&self) -> Option<DateTime<FixedOffset>> {
        parse_timestamp(self.modified_time.as_deref())
    }
}

impl<'de> Deserialize<'de> for Record {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let map = Map::<String, Value>::deserialize(deserializer)?;
        Record::from_map(map).map_err(de::Error::custom)
    }
}

#[derive(Deserialize)]
struct KnownFields {
    id: Option<Value>,
    #[serde(rename = "Product_Details")]
    line_items: Option<Vec<InventoryLineItem>>,
    #[serde(rename = "$line_tax")]
    line_taxes: Option<Vec<Tax>>,
    #[serde(rename = "Owner")]
    owner: Option<User>,
    #[serde(rename = "Created_By")]
    created_by: Option<User>,
    #[serde(rename = "Modified_By")]
    modified_by: Option<User>,
    #[serde(rename = "Created_Time")]
    created_time: Option<String>,
    #[serde(rename = "Modified_Time")]
    modified_time: Option<String>,
}

/// Owner / creator / modifier reference.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct User {
    #[serde(default, deserialize_with = "lenient_id")]
    pub id: Option<String>,
    pub name: Option<String>,
}

/// One row of `Product_Details` on inventory modules.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InventoryLineItem {
    #[serde(default, deserialize_with = "lenient_id")]
    pub id: Option<String>,
    #[serde(default)]
    pub product: Product,
    #[serde(default, deserialize_with = "null_as_zero")]
    pub list_price: f64,
    #[serde(default = "default_quantity", deserialize_with = "null_as_one")]
    pub quantity: f64,
    #[serde(rename = "product_description")]
    pub description: Option<String>,
    #[serde(default, deserialize_with = "null_as_zero")]
    pub total: f64,
    #[serde(rename = "Discount", default, deserialize_with = "null_as_zero")]
    pub discount: f64,
    #[serde(default, skip_serializing)]
    pub discount_percentage: f64,
    #[serde(default, deserialize_with = "null_as_zero")]
    pub total_after_discount: f64,
    #[serde(rename = "Tax", default, deserialize_with = "null_as_zero")]
    pub tax: f64,
    #[serde(rename = "$line_tax")]
    pub line_taxes: Option<Vec<Tax>>,
    #[serde(default, deserialize_with = "null_as_zero")]
    pub net_total: f64,
    #[serde(default, skip_serializing)]
    pub delete_flag: bool,
}

impl Default for InventoryLineItem {
    fn default() -> Self {
        Self {
            id: None,
            product: Product::default(),
            list_price: 0.0,
            quantity: default_quantity(),
            description: None,
            total: 0.0,
            discount: 0.0,
            discount_percentage: 0.0,
            total_after_discount: 0.0,
            tax: 0.0,
            line_taxes: None,
            net_total: 0.0,
            delete_flag: false,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Product {
    #[serde(default, deserialize_with = "lenient_id")]
    pub id: Option<String>,
    pub name: Option<String>,
    #[serde(rename = "Product_Code")]
    pub code: Option<String>,
}

/// Tax applied to a record or line item.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Tax {
    pub name: Option<String>,
    pub percentage: Option<f64>,
    pub value: Option<f64>,
}

/// Paging block Zoho returns next to `data`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PageInfo {
    pub per_page: Option<u32>,
    pub count: Option<u32>,
    pub page: Option<u32>,
    #[serde(default)]
    pub more_records: bool,
}

/// Records plus paging info from one list response.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct RecordPage {
    #[serde(default)]
    pub data: Vec<Record>,
    pub info: Option<PageInfo>,
}

/// Decode a `{ "data": [...] }` body; empty bodies yield an empty page.
pub fn decode_page(body: &str) -> Result<RecordPage> {
    if body.trim().is_empty() {
        return Ok(RecordPage::default());
    }
    Ok(serde_json::from_str(body)?)
}

/// Decode the records of a list response.
pub fn decode_records(body: &str) -> Result<Vec<Record>> {
    decode_page(body).map(|page| page.data)
}

fn default_quantity() -> f64 {
    1.0
}

fn null_as_zero<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<f64, D::Error> {
    Ok(Option::<f64>::deserialize(deserializer)?.unwrap_or(0.0))
}

fn null_as_one<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<f64, D::Error> {
    Ok(Option::<f64>::deserialize(deserializer)?.unwrap_or_else(default_quantity))
}

// Zoho ids are numeric strings, but some endpoints send bare numbers.
fn lenient_id<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> std::result::Result<Option<String>, D::Error> {
    Ok(Option::<Value>::deserialize(deserializer)?.and_then(|value| match value {
        Value::Null => None,
        other => Some(id_to_string(other)),
    }))
}

fn id_to_string(value: Value) -> String {
    match value {
        Value::String(s) => s,
        other => other.to_string(),
    }
}

fn parse_timestamp(raw: Option<&str>) -> Option<DateTime<FixedOffset>> {
    raw.and_then(|value| DateTime::parse_from_rfc3339(value).ok())
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;

    fn purchase_order() -> Value {
        json!({
            "data": [{
                "id": "3477061000000419001",
                "Owner": {"name": "Patricia Boyle", "id": "3477061000000173021"},
                "Created_By": {"name": "Patricia Boyle", "id": "3477061000000173021"},
                "Modified_By": {"name": "Patricia Boyle", "id": "3477061000000173021"},
                "Created_Time": "2018-03-05T10:12:41+05:30",
                "Modified_Time": "2018-03-05T10:12:41+05:30",
                "Subject": "PO-100",
                "Status": "Created",
                "Grand_Total": 960.0,
                "$currency_symbol": "$",
                "$approved": true,
                "$line_tax": [{"percentage": 10.0, "name": "Sales Tax", "value": 96.0}],
                "Product_Details": [{
                    "product": {"Product_Code": "SKU-1", "name": "Widget", "id": "3477061000000123001"},
                    "quantity": 4.0,
                    "Discount": 0,
                    "total_after_discount": 800.0,
                    "net_total": 896.0,
                    "Tax": 96.0,
                    "list_price": 200.0,
                    "total": 800.0,
                    "product_description": null,
                    "$line_tax": [{"percentage": 12.0, "name": "VAT", "value": 96.0}],
                    "id": "3477061000000419003"
                }]
            }],
            "info": {"per_page": 200, "count": 1, "page": 1, "more_records": false}
        })
    }

    #[test]
    fn splits_known_fields_properties_and_residual_fields() {
        let records = decode_records(&purchase_order().to_string()).unwrap();
        assert_eq!(records.len(), 1);
        let record = &records[0];

        assert_eq!(record.id.as_deref(), Some("3477061000000419001"));
        assert_eq!(
            record.owner.as_ref().and_then(|u| u.name.as_deref()),
            Some("Patricia Boyle")
        );
        assert_eq!(
            record.properties.keys().cloned().collect::<Vec<_>>(),
            vec!["$approved", "$currency_symbol", "$line_tax"]
        );
        assert_eq!(
            record.fields.keys().cloned().collect::<Vec<_>>(),
            vec!["Grand_Total", "Status", "Subject"]
        );
        assert_eq!(record.field("Subject"), Some(&json!("PO-100")));
        assert_eq!(record.property("$approved"), Some(&json!(true)));
        assert_eq!(record.line_taxes.as_ref().map(Vec::len), Some(1));
        assert!(record.created_at().is_some());
    }

    #[test]
    fn decodes_line_items() {
        let records = decode_records(&purchase_order().to_string()).unwrap();
        let items = records[0].line_items.as_ref().unwrap();
        let item = &items[0];
        assert_eq!(item.product.code.as_deref(), Some("SKU-1"));
        assert_eq!(item.product.name.as_deref(), Some("Widget"));
        assert_eq!(item.quantity, 4.0);
        assert_eq!(item.list_price, 200.0);
        assert_eq!(item.net_total, 896.0);
        assert_eq!(item.description, None);
        assert_eq!(
            item.line_taxes.as_ref().and_then(|t| t[0].name.as_deref()),
            Some("VAT")
        );
        assert!(!item.delete_flag);
    }

    #[test]
    fn line_item_defaults_apply_to_missing_and_null_values() {
        let item: InventoryLineItem =
            serde_json::from_value(json!({"product": {"name": "Widget"}, "list_price": null}))
                .unwrap();
        assert_eq!(item.quantity, 1.0);
        assert_eq!(item.list_price, 0.0);
        assert_eq!(item.total, 0.0);
        assert_eq!(item.line_taxes, None);
    }

    #[test]
    fn empty_body_and_missing_data_decode_to_no_records() {
        assert!(decode_records("").unwrap().is_empty());
        assert!(decode_records("  \n").unwrap().is_empty());
        assert!(decode_records("{}").unwrap().is_empty());
    }

    #[test]
    fn page_info_is_exposed() {
        let page = decode_page(&purchase_order().to_string()).unwrap();
        let info = page.info.unwrap();
        assert_eq!(info.count, Some(1));
        assert!(!info.more_records);
    }

    #[test]
    fn numeric_ids_are_stringified() {
        let record: Record =
            serde_json::from_value(json!({"id": 42, "Owner": {"id": 7, "name": "A"}})).unwrap();
        assert_eq!(record.id.as_deref(), Some("42"));
        assert_eq!(record.owner.unwrap().id.as_deref(), Some("7"));
    }

    #[test]
    fn malformed_body_is_a_serialization_error() {
        let err = decode_records("{\"data\": 5}").unwrap_err();
        assert!(matches!(err, crate::error::ZcrmError::Serialization(_)));
    }
}
