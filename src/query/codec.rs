use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use serde::{Deserialize, Serialize};

use crate::navigation::RawQuery;

pub const PAGE_FIELD: &str = "page";
pub const PAGE_SIZE_FIELD: &str = "pageSize";
pub const DEFAULT_PAGE: u64 = 1;

/// Characters left readable in encoded query components.
const QUERY_COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~')
    .remove(b',')
    .remove(b'+')
    .remove(b'/')
    .remove(b':');

pub fn escape_component(raw: &str) -> String {
    utf8_percent_encode(raw, QUERY_COMPONENT).to_string()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    String,
    Array,
    Boolean,
}

/// What happens to raw query fields that the widget did not declare.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum UnknownFieldPolicy {
    #[default]
    Drop,
    Passthrough,
}

/// Declared query fields in declaration order. `page` and `pageSize` are always
/// reserved and need not be declared.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TypeMap {
    fields: Vec<(String, FieldType)>,
}

impl TypeMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn field(mut self, name: impl Into<String>, kind: FieldType) -> Self {
        let name = name.into();
        if is_reserved(&name) {
            return self;
        }
        match self.fields.iter_mut().find(|(existing, _)| *existing == name) {
            Some(slot) => slot.1 = kind,
            None => self.fields.push((name, kind)),
        }
        self
    }

    pub fn string(self, name: impl Into<String>) -> Self {
        self.field(name, FieldType::String)
    }

    pub fn array(self, name: impl Into<String>) -> Self {
        self.field(name, FieldType::Array)
    }

    pub fn boolean(self, name: impl Into<String>) -> Self {
        self.field(name, FieldType::Boolean)
    }

    pub fn get(&self, name: &str) -> Option<FieldType> {
        self.fields
            .iter()
            .find(|(existing, _)| existing == name)
            .map(|(_, kind)| *kind)
    }

    pub fn declares(&self, name: &str) -> bool {
        is_reserved(name) || self.get(name).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, FieldType)> {
        self.fields.iter().map(|(name, kind)| (name.as_str(), *kind))
    }
}

fn is_reserved(name: &str) -> bool {
    name == PAGE_FIELD || name == PAGE_SIZE_FIELD
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum QueryValue {
    Text(String),
    List(Vec<String>),
    Flag(bool),
    Number(u64),
}

/// Decoded query. Keeps insertion order for encoding; equality ignores order.
#[derive(Debug, Clone, Default, Serialize)]
pub struct TypedQuery {
    entries: Vec<(String, QueryValue)>,
}

impl TypedQuery {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces a field. A replaced field keeps its original position.
    pub fn insert(&mut self, name: impl Into<String>, value: QueryValue) -> &mut Self {
        let name = name.into();
        match self.entries.iter_mut().find(|(existing, _)| *existing == name) {
            Some(slot) => slot.1 = value,
            None => self.entries.push((name, value)),
        }
        self
    }

    pub fn with(mut self, name: impl Into<String>, value: QueryValue) -> Self {
        self.insert(name, value);
        self
    }

    pub fn remove(&mut self, name: &str) -> Option<QueryValue> {
        let index = self.entries.iter().position(|(existing, _)| existing == name)?;
        Some(self.entries.remove(index).1)
    }

    pub fn get(&self, name: &str) -> Option<&QueryValue> {
        self.entries
            .iter()
            .find(|(existing, _)| existing == name)
            .map(|(_, value)| value)
    }

    pub fn text(&self, name: &str) -> Option<&str> {
        match self.get(name)? {
            QueryValue::Text(value) => Some(value),
            _ => None,
        }
    }

    pub fn list(&self, name: &str) -> &[String] {
        match self.get(name) {
            Some(QueryValue::List(values)) => values,
            _ => &[],
        }
    }

    pub fn flag(&self, name: &str) -> bool {
        matches!(self.get(name), Some(QueryValue::Flag(true)))
    }

    pub fn page(&self) -> u64 {
        match self.get(PAGE_FIELD) {
            Some(QueryValue::Number(page)) => *page,
            _ => DEFAULT_PAGE,
        }
    }

    pub fn page_size_or(&self, default_page_size: u64) -> u64 {
        match self.get(PAGE_SIZE_FIELD) {
            Some(QueryValue::Number(size)) => *size,
            _ => default_page_size,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &QueryValue)> {
        self.entries.iter().map(|(name, value)| (name.as_str(), value))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl PartialEq for TypedQuery {
    fn eq(&self, other: &Self) -> bool {
        self.entries.len() == other.entries.len()
            && self
                .entries
                .iter()
                .all(|(name, value)| other.get(name) == Some(value))
    }
}

/// Per-widget codec: the declared fields plus the configured default page size.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryCodec {
    type_map: TypeMap,
    page_size: u64,
    unknown: UnknownFieldPolicy,
}

impl QueryCodec {
    pub fn new(type_map: TypeMap, page_size: u64) -> Self {
        Self {
            type_map,
            page_size: page_size.max(1),
            unknown: UnknownFieldPolicy::Drop,
        }
    }

    pub fn with_unknown_fields(mut self, policy: UnknownFieldPolicy) -> Self {
        self.unknown = policy;
        self
    }

    pub fn type_map(&self) -> &TypeMap {
        &self.type_map
    }

    pub fn page_size(&self) -> u64 {
        self.page_size
    }

    pub fn decode(&self, raw: &RawQuery) -> TypedQuery {
        let mut typed = TypedQuery::new();
        for (name, kind) in self.type_map.iter() {
            let Some(value) = raw.get(name) else {
                continue;
            };
            typed.insert(name, decode_value(kind, value));
        }
        if let Some(value) = raw.get(PAGE_FIELD) {
            typed.insert(PAGE_FIELD, QueryValue::Number(parse_number(value, DEFAULT_PAGE)));
        }
        if let Some(value) = raw.get(PAGE_SIZE_FIELD) {
            typed.insert(
                PAGE_SIZE_FIELD,
                QueryValue::Number(parse_number(value, self.page_size)),
            );
        }
        if self.unknown == UnknownFieldPolicy::Passthrough {
            for (name, value) in raw {
                if !self.type_map.declares(name) {
                    typed.insert(name.clone(), QueryValue::Text(value.clone()));
                }
            }
        }
        typed
    }

    /// Fields at their default value are left out entirely.
    pub fn encode(&self, typed: &TypedQuery) -> String {
        self.encoded_pairs(typed)
            .into_iter()
            .map(|(name, value)| {
                format!("{}={}", escape_component(&name), escape_component(&value))
            })
            .collect::<Vec<_>>()
            .join("&")
    }

    pub fn to_raw(&self, typed: &TypedQuery) -> RawQuery {
        self.encoded_pairs(typed).into_iter().collect()
    }

    fn encoded_pairs(&self, typed: &TypedQuery) -> Vec<(String, String)> {
        let mut pairs = Vec::with_capacity(typed.len());
        for (name, value) in typed.iter() {
            if !self.type_map.declares(name) && self.unknown == UnknownFieldPolicy::Drop {
                continue;
            }
            let encoded = match value {
                QueryValue::Text(text) if text.is_empty() => continue,
                QueryValue::Text(text) => text.clone(),
                QueryValue::List(values) if values.is_empty() => continue,
                QueryValue::List(values) => values.join(","),
                QueryValue::Flag(false) => continue,
                QueryValue::Flag(true) => "true".to_string(),
                QueryValue::Number(number) if name == PAGE_FIELD && *number == DEFAULT_PAGE => {
                    continue;
                }
                QueryValue::Number(number)
                    if name == PAGE_SIZE_FIELD && *number == self.page_size =>
                {
                    continue;
                }
                QueryValue::Number(number) => number.to_string(),
            };
            pairs.push((name.to_string(), encoded));
        }
        pairs
    }
}

pub fn decode(raw: &RawQuery, type_map: &TypeMap, page_size: u64) -> TypedQuery {
    QueryCodec::new(type_map.clone(), page_size).decode(raw)
}

pub fn encode(typed: &TypedQuery, type_map: &TypeMap, page_size: u64) -> String {
    QueryCodec::new(type_map.clone(), page_size).encode(typed)
}

fn decode_value(kind: FieldType, raw: &str) -> QueryValue {
    match kind {
        FieldType::String => QueryValue::Text(raw.to_string()),
        FieldType::Array if raw.is_empty() => QueryValue::List(Vec::new()),
        FieldType::Array => QueryValue::List(raw.split(',').map(str::to_string).collect()),
        FieldType::Boolean => QueryValue::Flag(raw != "false"),
    }
}

fn parse_number(raw: &str, fallback: u64) -> u64 {
    raw.trim()
        .parse::<u64>()
        .ok()
        .filter(|value| *value > 0)
        .unwrap_or(fallback)
}
