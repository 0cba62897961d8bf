use std::collections::BTreeMap;

use percent_encoding::percent_decode_str;
use serde::Serialize;
use url::Url;

use crate::error::{AppError, AppResult};
use crate::query::escape_component;

const BASE_URL: &str = "http://navsync.local/";

pub type RawQuery = BTreeMap<String, String>;

/// Immutable snapshot of where the user is. A navigation replaces the whole value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Location {
    pub pathname: String,
    pub query: RawQuery,
    pub hash: String,
}

impl Location {
    /// Parses an absolute URL or a path relative to the site root.
    ///
    /// Query values are percent-decoded but `+` is kept literally, so sort strings such as
    /// `-name,+size` survive unchanged.
    pub fn parse(input: &str) -> AppResult<Self> {
        let base = Url::parse(BASE_URL)
            .map_err(|err| AppError::invalid_argument(format!("bad base url: {err}")))?;
        let url = base.join(input.trim()).map_err(|err| {
            AppError::invalid_argument(format!("invalid location `{input}`: {err}"))
        })?;

        Ok(Self {
            pathname: url.path().to_string(),
            query: url.query().map(parse_query).unwrap_or_default(),
            hash: url
                .fragment()
                .map(|fragment| decode(fragment))
                .unwrap_or_default(),
        })
    }

    pub fn root() -> Self {
        Self {
            pathname: "/".to_string(),
            query: RawQuery::new(),
            hash: String::new(),
        }
    }

    /// Decoded, non-empty path segments.
    pub fn segments(&self) -> Vec<String> {
        path_segments(&self.pathname)
    }

    pub fn same_path(&self, other: &Location) -> bool {
        self.pathname == other.pathname
    }

    pub fn with_query(&self, query: RawQuery) -> Self {
        Self {
            pathname: self.pathname.clone(),
            query,
            hash: String::new(),
        }
    }

    pub fn to_url(&self) -> String {
        let mut out = self.pathname.clone();
        if !self.query.is_empty() {
            out.push('?');
            let pairs: Vec<String> = self
                .query
                .iter()
                .map(|(key, value)| {
                    format!("{}={}", escape_component(key), escape_component(value))
                })
                .collect();
            out.push_str(&pairs.join("&"));
        }
        if !self.hash.is_empty() {
            out.push('#');
            out.push_str(&escape_component(&self.hash));
        }
        out
    }
}

pub fn path_segments(pathname: &str) -> Vec<String> {
    pathname
        .split('/')
        .filter(|segment| !segment.is_empty())
        .map(decode)
        .collect()
}

pub fn parse_query(raw: &str) -> RawQuery {
    let mut query = RawQuery::new();
    for pair in raw.trim_start_matches('?').split('&') {
        if pair.is_empty() {
            continue;
        }
        let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
        query.insert(decode(key), decode(value));
    }
    query
}

fn decode(raw: &str) -> String {
    percent_decode_str(raw).decode_utf8_lossy().into_owned()
}
