use std::cmp::Ordering;
use std::convert::Infallible;
use std::fmt;
use std::str::FromStr;

use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SortField {
    pub field: String,
    pub is_desc: bool,
}

impl SortField {
    pub fn asc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            is_desc: false,
        }
    }

    pub fn desc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            is_desc: true,
        }
    }
}

/// Multi-column sort, first entry is the primary key. Field names are unique.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SortSpec {
    fields: Vec<SortField>,
}

impl SortSpec {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses `-name,+size` style strings. Anything not starting with `+` or `-` is
    /// ascending; repeated fields keep their first position.
    pub fn parse(raw: &str) -> Self {
        let mut spec = Self::new();
        for token in raw.split(',').map(str::trim).filter(|token| !token.is_empty()) {
            let field = match token.as_bytes()[0] {
                b'-' => SortField::desc(&token[1..]),
                b'+' => SortField::asc(&token[1..]),
                _ => SortField::asc(token),
            };
            if field.field.is_empty() {
                continue;
            }
            spec.push(field);
        }
        spec
    }

    /// Appends `field` unless it is already present.
    pub fn push(&mut self, field: SortField) -> bool {
        if self.position(&field.field).is_some() {
            return false;
        }
        self.fields.push(field);
        true
    }

    /// Column-header behavior: clicking the primary column flips its direction, any
    /// other column becomes the ascending primary key.
    pub fn toggle_primary(&mut self, field: &str) {
        if let Some(primary) = self.fields.first_mut()
            && primary.field == field
        {
            primary.is_desc = !primary.is_desc;
            return;
        }
        if let Some(index) = self.position(field) {
            self.fields.remove(index);
        }
        self.fields.insert(0, SortField::asc(field));
    }

    pub fn remove(&mut self, field: &str) -> Option<SortField> {
        let index = self.position(field)?;
        Some(self.fields.remove(index))
    }

    pub fn fields(&self) -> &[SortField] {
        &self.fields
    }

    pub fn primary(&self) -> Option<&SortField> {
        self.fields.first()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    fn position(&self, field: &str) -> Option<usize> {
        self.fields.iter().position(|entry| entry.field == field)
    }
}

impl fmt::Display for SortSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (index, entry) in self.fields.iter().enumerate() {
            if index > 0 {
                f.write_str(",")?;
            }
            let sign = if entry.is_desc { '-' } else { '+' };
            write!(f, "{sign}{}", entry.field)?;
        }
        Ok(())
    }
}

impl FromStr for SortSpec {
    type Err = Infallible;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        Ok(Self::parse(raw))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SortValue {
    Bool(bool),
    Number(f64),
    Text(String),
}

impl SortValue {
    fn rank(&self) -> u8 {
        match self {
            Self::Bool(_) => 0,
            Self::Number(_) => 1,
            Self::Text(_) => 2,
        }
    }

    pub fn compare(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Self::Bool(a), Self::Bool(b)) => a.cmp(b),
            (Self::Number(a), Self::Number(b)) => a.partial_cmp(b).unwrap_or(Ordering::Equal),
            (Self::Text(a), Self::Text(b)) => a.cmp(b),
            _ => self.rank().cmp(&other.rank()),
        }
    }
}

/// Field lookup used by [`multi_sort`]. `None` means the value is absent.
pub trait SortKey {
    fn sort_value(&self, field: &str) -> Option<SortValue>;
}

impl SortKey for serde_json::Value {
    fn sort_value(&self, field: &str) -> Option<SortValue> {
        match self.get(field)? {
            serde_json::Value::Null => None,
            serde_json::Value::Bool(value) => Some(SortValue::Bool(*value)),
            serde_json::Value::Number(value) => value.as_f64().map(SortValue::Number),
            serde_json::Value::String(value) => Some(SortValue::Text(value.clone())),
            other => Some(SortValue::Text(other.to_string())),
        }
    }
}

pub fn compare_by<T: SortKey + ?Sized>(a: &T, b: &T, spec: &SortSpec) -> Ordering {
    for entry in spec.fields() {
        let ordering = match (a.sort_value(&entry.field), b.sort_value(&entry.field)) {
            (None, None) => continue,
            (None, Some(_)) => Ordering::Less,
            (Some(_), None) => Ordering::Greater,
            (Some(left), Some(right)) => left.compare(&right),
        };
        let ordering = if entry.is_desc {
            ordering.reverse()
        } else {
            ordering
        };
        if ordering != Ordering::Equal {
            return ordering;
        }
    }
    Ordering::Equal
}

/// Stable sort by every field of `spec` in priority order.
pub fn multi_sort<T: SortKey>(items: &mut [T], spec: &SortSpec) {
    if spec.is_empty() {
        return;
    }
    items.sort_by(|a, b| compare_by(a, b, spec));
}

#[cfg(test)]
mod tests {
    use serde_json::{Value, json};

    use super::{SortField, SortSpec, multi_sort};

    fn names(items: &[Value]) -> Vec<&str> {
        items
            .iter()
            .map(|item| item["name"].as_str().unwrap_or_default())
            .collect()
    }

    #[test]
    fn parse_reads_signs_and_round_trips() {
        let spec = SortSpec::parse("-name,+size");
        assert_eq!(
            spec.fields(),
            [SortField::desc("name"), SortField::asc("size")]
        );
        assert_eq!(spec.to_string(), "-name,+size");
    }

    #[test]
    fn parse_treats_unsigned_tokens_as_ascending_and_dedupes() {
        let spec = SortSpec::parse("name, size,-name,,-");
        assert_eq!(
            spec.fields(),
            [SortField::asc("name"), SortField::asc("size")]
        );
        assert_eq!(spec.to_string(), "+name,+size");
    }

    #[test]
    fn toggle_primary_flips_or_promotes() {
        let mut spec = SortSpec::parse("+name,-size");
        spec.toggle_primary("name");
        assert_eq!(spec.to_string(), "-name,-size");
        spec.toggle_primary("size");
        assert_eq!(spec.to_string(), "+size,-name");
    }

    #[test]
    fn multi_sort_orders_by_priority_with_absent_values_first_when_ascending() {
        let mut items = vec![
            json!({"name": "b", "size": 2}),
            json!({"name": "a", "size": 2}),
            json!({"name": "c"}),
            json!({"name": "d", "size": 1}),
        ];
        multi_sort(&mut items, &SortSpec::parse("+size,-name"));
        assert_eq!(names(&items), ["c", "d", "b", "a"]);

        multi_sort(&mut items, &SortSpec::parse("-size,+name"));
        assert_eq!(names(&items), ["a", "b", "d", "c"]);
    }

    #[test]
    fn multi_sort_skips_fields_absent_on_both_sides() {
        let mut items = vec![
            json!({"name": "b", "kind": null}),
            json!({"name": "a"}),
        ];
        multi_sort(&mut items, &SortSpec::parse("kind,name"));
        assert_eq!(names(&items), ["a", "b"]);
    }

    #[test]
    fn multi_sort_is_idempotent() {
        let mut items = vec![
            json!({"name": "x", "size": 3, "modified": "2024"}),
            json!({"name": "y", "size": 3}),
            json!({"name": "z", "size": null, "modified": "2023"}),
            json!({"name": "w", "size": 1, "modified": "2024"}),
        ];
        let spec = SortSpec::parse("-modified,+size");
        multi_sort(&mut items, &spec);
        let once = items.clone();
        multi_sort(&mut items, &spec);
        assert_eq!(items, once);
    }
}
