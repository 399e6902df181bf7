//! URL construction for the backend's OData addressing scheme.
//!
//! Collections live at `{base}/{item_type}`, single items at
//! `{base}/{item_type}('{id}')`, lists at `{base}/List('{id}')` and server
//! methods at either `{base}/method.{name}` or `{base}/Method('{name}')`.

use crate::config::MethodAddressing;
use percent_encoding::{utf8_percent_encode, AsciiSet, CONTROLS};
use serde::{Deserialize, Serialize};

/// Escaped inside a query option value. `,` `'` `(` `)` `$` stay literal.
const QUERY_VALUE: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'&')
    .add(b'+')
    .add(b'<')
    .add(b'=')
    .add(b'>')
    .add(b'?')
    .add(b'`')
    .add(b'{')
    .add(b'}');

/// Escaped inside a path segment such as a quoted key or method name
const PATH_SEGMENT: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'/')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'`')
    .add(b'{')
    .add(b'}');

/// Optional OData system query options for collection reads
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemQuery {
    #[serde(default)]
    pub expand: Option<String>,
    #[serde(default)]
    pub filter: Option<String>,
    #[serde(default)]
    pub select: Option<String>,
}

impl ItemQuery {
    pub fn expand(mut self, value: impl Into<String>) -> Self {
        self.expand = Some(value.into());
        self
    }

    pub fn filter(mut self, value: impl Into<String>) -> Self {
        self.filter = Some(value.into());
        self
    }

    pub fn select(mut self, value: impl Into<String>) -> Self {
        self.select = Some(value.into());
        self
    }

    /// `$expand=..&$filter=..&$select=..`, skipping absent or empty options.
    /// Values are percent-encoded.
    pub fn to_query_string(&self) -> Option<String> {
        let params: Vec<String> = [
            ("expand", &self.expand),
            ("filter", &self.filter),
            ("select", &self.select),
        ]
        .into_iter()
        .filter_map(|(key, value)| {
            value
                .as_deref()
                .filter(|v| !v.is_empty())
                .map(|v| format!("${key}={}", utf8_percent_encode(v, QUERY_VALUE)))
        })
        .collect();

        if params.is_empty() {
            None
        } else {
            Some(params.join("&"))
        }
    }
}

/// An item type, optionally narrowed to a single item by id
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemAddress {
    pub item_type: String,
    pub item_id: Option<String>,
}

impl ItemAddress {
    pub fn collection(item_type: impl Into<String>) -> Self {
        Self {
            item_type: item_type.into(),
            item_id: None,
        }
    }

    pub fn item(item_type: impl Into<String>, item_id: impl Into<String>) -> Self {
        Self {
            item_type: item_type.into(),
            item_id: Some(item_id.into()),
        }
    }

    pub fn to_url(&self, base: &str) -> String {
        match &self.item_id {
            Some(id) => format!(
                "{base}/{}({})",
                self.item_type,
                encode_segment(&quote_key(id))
            ),
            None => format!("{base}/{}", self.item_type),
        }
    }
}

/// Quote an entity key, doubling embedded single quotes
pub fn quote_key(key: &str) -> String {
    format!("'{}'", key.replace('\'', "''"))
}

fn encode_segment(segment: &str) -> String {
    utf8_percent_encode(segment, PATH_SEGMENT).to_string()
}

pub fn items_url(base: &str, item_type: &str, query: &ItemQuery) -> String {
    append_query(ItemAddress::collection(item_type).to_url(base), query)
}

pub fn list_url(base: &str, list_id: &str, expand: Option<&str>) -> String {
    let query = ItemQuery {
        expand: expand.map(str::to_string),
        ..ItemQuery::default()
    };
    append_query(ItemAddress::item("List", list_id).to_url(base), &query)
}

pub fn method_url(base: &str, method_name: &str, addressing: MethodAddressing) -> String {
    match addressing {
        MethodAddressing::Dotted => format!("{base}/method.{}", encode_segment(method_name)),
        MethodAddressing::Quoted => {
            format!("{base}/Method({})", encode_segment(&quote_key(method_name)))
        }
    }
}

fn append_query(url: String, query: &ItemQuery) -> String {
    match query.to_query_string() {
        Some(qs) => format!("{url}?{qs}"),
        None => url,
    }
}
