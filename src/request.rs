//! Request parameter sources.
//!
//! Filters never read the HTTP request directly. They ask a [`ParameterSource`]
//! whether a parameter is present and what its raw value is. [`QueryParams`] is
//! the source built from a URL query string and doubles as an axum extractor.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::convert::Infallible;

/// Raw value of a request parameter: `?title=lorem` or `?title[]=lorem&title[]=ipsum`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Single(String),
    List(Vec<String>),
}

impl ParamValue {
    #[must_use]
    pub fn is_list(&self) -> bool {
        matches!(self, Self::List(_))
    }

    #[must_use]
    pub fn as_single(&self) -> Option<&str> {
        match self {
            Self::Single(value) => Some(value),
            Self::List(_) => None,
        }
    }

    #[must_use]
    pub fn as_list(&self) -> Option<&[String]> {
        match self {
            Self::Single(_) => None,
            Self::List(values) => Some(values),
        }
    }
}

impl From<&str> for ParamValue {
    fn from(value: &str) -> Self {
        Self::Single(value.to_string())
    }
}

impl From<String> for ParamValue {
    fn from(value: String) -> Self {
        Self::Single(value)
    }
}

impl From<Vec<String>> for ParamValue {
    fn from(values: Vec<String>) -> Self {
        Self::List(values)
    }
}

impl From<Vec<&str>> for ParamValue {
    fn from(values: Vec<&str>) -> Self {
        Self::List(values.into_iter().map(str::to_string).collect())
    }
}

/// Key-value lookup the filters read request data through.
///
/// `has` is a presence test: a parameter sent with an empty value is present.
pub trait ParameterSource {
    fn has(&self, name: &str) -> bool;

    fn get(&self, name: &str) -> Option<ParamValue>;
}

impl ParameterSource for HashMap<String, ParamValue> {
    fn has(&self, name: &str) -> bool {
        self.contains_key(name)
    }

    fn get(&self, name: &str) -> Option<ParamValue> {
        HashMap::get(self, name).cloned()
    }
}

impl<T: ParameterSource + ?Sized> ParameterSource for &T {
    fn has(&self, name: &str) -> bool {
        (**self).has(name)
    }

    fn get(&self, name: &str) -> Option<ParamValue> {
        (**self).get(name)
    }
}

/// Parameters decoded from a URL query string.
///
/// `key[]=a&key[]=b` collects a list, a plain `key=v` is a scalar and the last
/// occurrence of a key wins.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct QueryParams {
    params: HashMap<String, ParamValue>,
}

impl QueryParams {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode an `application/x-www-form-urlencoded` query string (without the leading `?`)
    #[must_use]
    pub fn parse(query: &str) -> Self {
        let mut params = Self::new();
        for (key, value) in url::form_urlencoded::parse(query.as_bytes()) {
            if let Some(list_key) = key.strip_suffix("[]") {
                params.append(list_key, value.into_owned());
            } else {
                params.insert(key.into_owned(), ParamValue::Single(value.into_owned()));
            }
        }
        params
    }

    /// Set a parameter, replacing any previous value
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<ParamValue>) {
        self.params.insert(name.into(), value.into());
    }

    /// Push onto a list parameter, turning a scalar into a fresh list
    pub fn append(&mut self, name: &str, value: String) {
        match self.params.get_mut(name) {
            Some(ParamValue::List(values)) => values.push(value),
            _ => {
                self.params
                    .insert(name.to_string(), ParamValue::List(vec![value]));
            }
        }
    }

    /// Builder-style [`insert`](Self::insert)
    #[must_use]
    pub fn with(mut self, name: impl Into<String>, value: impl Into<ParamValue>) -> Self {
        self.insert(name, value);
        self
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.params.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }
}

impl ParameterSource for QueryParams {
    fn has(&self, name: &str) -> bool {
        self.params.contains_key(name)
    }

    fn get(&self, name: &str) -> Option<ParamValue> {
        self.params.get(name).cloned()
    }
}

impl From<HashMap<String, ParamValue>> for QueryParams {
    fn from(params: HashMap<String, ParamValue>) -> Self {
        Self { params }
    }
}

impl<S> FromRequestParts<S> for QueryParams
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self::parse(parts.uri.query().unwrap_or_default()))
    }
}
