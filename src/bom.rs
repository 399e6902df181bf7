//! Flattening of the nested BOM tree returned by the structure method.
//!
//! The backend answers with `{"Item": {...}}` where every item may carry
//! `Relationships.Item` (one object or a list), each pointing at a child via
//! `related_id.Item`. The tree becomes one row per item, parents first.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One item of a flattened BOM
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BomRow {
    pub id: Value,
    pub item_number: Value,
    pub aer_title: Value,
    pub aer_major_rev: Value,
    #[serde(rename = "parentId")]
    pub parent_id: Value,
}

/// Flatten the method reply. A reply without `Item` yields no rows.
pub fn flatten_reply(reply: &Value) -> Vec<BomRow> {
    reply.get("Item").map(flatten_bom).unwrap_or_default()
}

/// Depth-first flattening of a root item (or a list of roots)
pub fn flatten_bom(root: &Value) -> Vec<BomRow> {
    let mut rows = Vec::new();
    match root {
        Value::Array(roots) => {
            for item in roots {
                collect(item, Value::Null, &mut rows);
            }
        }
        item @ Value::Object(_) => collect(item, Value::Null, &mut rows),
        _ => {}
    }
    rows
}

fn collect(item: &Value, parent_id: Value, rows: &mut Vec<BomRow>) {
    let id = field(item, "@aras.id");
    rows.push(BomRow {
        id: id.clone(),
        item_number: field(item, "item_number"),
        aer_title: title(item.get("aer_title")),
        aer_major_rev: field(item, "aer_major_rev"),
        parent_id,
    });

    let relationships = match item.get("Relationships").and_then(|r| r.get("Item")) {
        Some(Value::Array(list)) => list.iter().collect(),
        Some(single @ Value::Object(_)) => vec![single],
        _ => Vec::new(),
    };

    for relationship in relationships {
        if let Some(child @ Value::Object(_)) =
            relationship.get("related_id").and_then(|r| r.get("Item"))
        {
            collect(child, id.clone(), rows);
        }
    }
}

fn field(item: &Value, key: &str) -> Value {
    item.get(key).cloned().unwrap_or(Value::Null)
}

// Keyed references carry the display text in `@aras.keyed_name`
fn title(value: Option<&Value>) -> Value {
    match value {
        Some(Value::Object(reference)) => {
            let is_null = reference
                .get("@aras.is_null")
                .map(is_truthy)
                .unwrap_or(false);
            if is_null {
                Value::Null
            } else {
                reference
                    .get("@aras.keyed_name")
                    .cloned()
                    .unwrap_or(Value::Null)
            }
        }
        Some(other) => other.clone(),
        None => Value::Null,
    }
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(true),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}
