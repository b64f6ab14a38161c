use crate::errors::FunnelError;
use crate::request::{ParamValue, ParameterSource};

/// A named request value, normalized once for use in a predicate.
///
/// Normalization order matters: searchability is decided before
/// multi-valuedness, so a searchable comma list such as `lorem, ipsum` is
/// wrapped as a single `%lorem, ipsum%` token. Only real lists are wrapped
/// element by element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Parameter {
    name: String,
    searchable: bool,
    raw: ParamValue,
    value: ParamValue,
}

impl Parameter {
    #[must_use]
    pub fn new(name: impl Into<String>, searchable: bool, raw: impl Into<ParamValue>) -> Self {
        let raw = raw.into();
        let value = format_value(&raw, searchable);
        Self {
            name: name.into(),
            searchable,
            raw,
            value,
        }
    }

    /// Look the raw value up in `source`, `None` when the parameter is absent
    pub fn from_source<S>(name: &str, searchable: bool, source: &S) -> Option<Self>
    where
        S: ParameterSource + ?Sized,
    {
        source
            .get(name)
            .map(|raw| Self::new(name, searchable, raw))
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn is_searchable(&self) -> bool {
        self.searchable
    }

    #[must_use]
    pub fn raw_value(&self) -> &ParamValue {
        &self.raw
    }

    /// The normalized value
    #[must_use]
    pub fn value(&self) -> &ParamValue {
        &self.value
    }

    #[must_use]
    pub fn is_array(&self) -> bool {
        self.raw.is_list()
    }

    #[must_use]
    pub fn is_comma_delimited(&self) -> bool {
        self.raw.as_single().is_some_and(|raw| raw.contains(','))
    }

    #[must_use]
    pub fn is_multi_value(&self) -> bool {
        self.is_array() || self.is_comma_delimited()
    }

    /// Split a comma list, or return the list as-is. Items are not trimmed.
    ///
    /// # Errors
    ///
    /// Returns [`FunnelError::InvalidOperation`] for a scalar without commas.
    pub fn to_array(&self) -> Result<Vec<String>, FunnelError> {
        match &self.raw {
            ParamValue::List(values) => Ok(values.clone()),
            ParamValue::Single(raw) if raw.contains(',') => Ok(split_commas(raw)),
            ParamValue::Single(_) => Err(FunnelError::invalid_operation(
                "Could not convert to array. Param is neither an array, nor comma-delimited.",
            )),
        }
    }

    /// `lorem` becomes `%lorem%`
    ///
    /// # Errors
    ///
    /// Returns [`FunnelError::InvalidOperation`] when the value is a list.
    pub fn to_like_friendly(&self) -> Result<String, FunnelError> {
        match &self.raw {
            ParamValue::Single(raw) => Ok(wrap_wildcards(raw)),
            ParamValue::List(_) => Err(FunnelError::invalid_operation(
                "Could not convert to like-friendly. Param is not a string.",
            )),
        }
    }

    /// Wrap every list element in `%` wildcards
    ///
    /// # Errors
    ///
    /// Returns [`FunnelError::InvalidOperation`] when the value is a scalar.
    pub fn to_like_friendly_array(&self) -> Result<Vec<String>, FunnelError> {
        match &self.raw {
            ParamValue::List(values) => Ok(values.iter().map(|v| wrap_wildcards(v)).collect()),
            ParamValue::Single(_) => Err(FunnelError::invalid_operation(
                "Could not map non-array element to array.",
            )),
        }
    }
}

fn format_value(raw: &ParamValue, searchable: bool) -> ParamValue {
    match raw {
        ParamValue::List(values) if searchable => {
            ParamValue::List(values.iter().map(|v| wrap_wildcards(v)).collect())
        }
        ParamValue::Single(value) if searchable => ParamValue::Single(wrap_wildcards(value)),
        ParamValue::Single(value) if value.contains(',') => ParamValue::List(split_commas(value)),
        other => other.clone(),
    }
}

fn wrap_wildcards(value: &str) -> String {
    format!("%{value}%")
}

fn split_commas(value: &str) -> Vec<String> {
    value.split(',').map(str::to_string).collect()
}
