use std::fmt;
use std::sync::Arc;

use super::{Attribute, Operator, Parameter};
use crate::config::FunnelConfig;
use crate::errors::FunnelError;
use crate::query::{ConditionBuilder, QueryBuilder, SortDirection};
use crate::request::{ParamValue, ParameterSource};

/// Body of a [`FilterClause::Custom`] filter
pub type CustomClause<Q> =
    Arc<dyn Fn(Q, &Parameter, &Attribute) -> Result<Q, FunnelError> + Send + Sync>;

/// What a filter does with its parameter once it is present.
pub enum FilterClause<Q> {
    /// `attribute operator value`, OR-expanded for lists and scoped for relations
    Where,
    /// `ORDER BY attribute <value>`, the value being `asc` or `desc`
    OrderBy,
    /// Caller-supplied body
    Custom(CustomClause<Q>),
}

impl<Q> Clone for FilterClause<Q> {
    fn clone(&self) -> Self {
        match self {
            Self::Where => Self::Where,
            Self::OrderBy => Self::OrderBy,
            Self::Custom(body) => Self::Custom(Arc::clone(body)),
        }
    }
}

impl<Q> fmt::Debug for FilterClause<Q> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Where => f.write_str("Where"),
            Self::OrderBy => f.write_str("OrderBy"),
            Self::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

/// One request parameter mapped onto one attribute.
///
/// ```rust,ignore
/// // GET /posts?published=1
/// let published = Filter::new("published", "is_published", "=")?;
/// // GET /posts?reply=hi  =>  posts with a comment with a reply "hi"
/// let reply = Filter::new("reply", "comments.replies.body", "=")?;
/// // GET /posts?sort=desc
/// let sort = Filter::sort("sort", "created_at");
/// ```
pub struct Filter<Q> {
    parameter: String,
    attribute: Attribute,
    operator: Operator,
    clause: FilterClause<Q>,
}

impl<Q> Filter<Q> {
    /// A where-filter
    ///
    /// # Errors
    ///
    /// Returns [`FunnelError::UnsupportedOperator`] for an unknown operator.
    pub fn new(
        parameter: impl Into<String>,
        attribute: &str,
        operator: &str,
    ) -> Result<Self, FunnelError> {
        Ok(Self {
            parameter: parameter.into(),
            attribute: Attribute::new(attribute),
            operator: operator.parse()?,
            clause: FilterClause::Where,
        })
    }

    /// An order-by filter
    #[must_use]
    pub fn sort(parameter: impl Into<String>, attribute: &str) -> Self {
        Self {
            parameter: parameter.into(),
            attribute: Attribute::new(attribute),
            operator: Operator::Eq,
            clause: FilterClause::OrderBy,
        }
    }

    #[must_use]
    pub fn with_clause(mut self, clause: FilterClause<Q>) -> Self {
        self.clause = clause;
        self
    }

    /// Replace the default body
    #[must_use]
    pub fn custom<F>(self, body: F) -> Self
    where
        F: Fn(Q, &Parameter, &Attribute) -> Result<Q, FunnelError> + Send + Sync + 'static,
    {
        self.with_clause(FilterClause::Custom(Arc::new(body)))
    }

    #[must_use]
    pub fn parameter(&self) -> &str {
        &self.parameter
    }

    #[must_use]
    pub fn attribute(&self) -> &Attribute {
        &self.attribute
    }

    #[must_use]
    pub fn operator(&self) -> Operator {
        self.operator
    }

    #[must_use]
    pub fn clause(&self) -> &FilterClause<Q> {
        &self.clause
    }

    /// # Errors
    ///
    /// Returns [`FunnelError::ReservedParameter`] when the filter listens on
    /// the eager-load key.
    pub fn ensure_not_reserved(&self, config: &FunnelConfig) -> Result<(), FunnelError> {
        if config.is_reserved(&self.parameter) {
            return Err(FunnelError::reserved_parameter(&self.parameter));
        }
        Ok(())
    }
}

impl<Q: QueryBuilder> Filter<Q> {
    /// Apply this filter if `source` carries its parameter, otherwise pass the
    /// query through unchanged.
    ///
    /// # Errors
    ///
    /// Returns [`FunnelError::InvalidOperation`] for values of the wrong shape
    /// and [`FunnelError::UnknownRelation`] when the builder cannot resolve the
    /// attribute's relation.
    pub fn apply<S>(&self, query: Q, source: &S) -> Result<Q, FunnelError>
    where
        S: ParameterSource + ?Sized,
    {
        let Some(parameter) =
            Parameter::from_source(&self.parameter, self.operator.is_searchable(), source)
        else {
            return Ok(query);
        };

        tracing::debug!(
            parameter = %self.parameter,
            attribute = %self.attribute,
            operator = %self.operator,
            clause = ?self.clause,
            "Applying filter"
        );

        match &self.clause {
            FilterClause::Where => where_clause(query, &self.attribute, self.operator, &parameter),
            FilterClause::OrderBy => self.order_clause(query, &parameter),
            FilterClause::Custom(body) => body(query, &parameter, &self.attribute),
        }
    }

    fn order_clause(&self, query: Q, parameter: &Parameter) -> Result<Q, FunnelError> {
        if self.attribute.has_relation() {
            return Err(FunnelError::invalid_operation(format!(
                "Could not order by relation attribute `{}`.",
                self.attribute
            )));
        }
        let direction = parameter
            .value()
            .as_single()
            .map(SortDirection::parse)
            .ok_or_else(|| {
                FunnelError::invalid_operation("Could not order by a multi-value parameter.")
            })?;
        Ok(query.order_by(self.attribute.name(), direction))
    }
}

impl<Q> Clone for Filter<Q> {
    fn clone(&self) -> Self {
        Self {
            parameter: self.parameter.clone(),
            attribute: self.attribute.clone(),
            operator: self.operator,
            clause: self.clause.clone(),
        }
    }
}

impl<Q> fmt::Debug for Filter<Q> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Filter")
            .field("parameter", &self.parameter)
            .field("attribute", &self.attribute)
            .field("operator", &self.operator)
            .field("clause", &self.clause)
            .finish()
    }
}

/// The default where body: one comparison for a scalar, an OR group for a
/// list, wrapped in a relation-existence scope when the attribute is dotted.
///
/// # Errors
///
/// Propagates errors from the query builder.
pub fn where_clause<B: ConditionBuilder>(
    query: B,
    attribute: &Attribute,
    operator: Operator,
    parameter: &Parameter,
) -> Result<B, FunnelError> {
    if attribute.has_relation() {
        let relation = attribute.extract_relation()?;
        let column = attribute.extract_attribute()?;
        query.where_has(&relation, |scoped| {
            where_value(scoped, column, operator, parameter.value())
        })
    } else {
        where_value(query, attribute.name(), operator, parameter.value())
    }
}

fn where_value<B: ConditionBuilder>(
    query: B,
    column: &str,
    operator: Operator,
    value: &ParamValue,
) -> Result<B, FunnelError> {
    match value {
        ParamValue::Single(value) => Ok(query.and_where(column, operator, value)),
        ParamValue::List(values) if values.is_empty() => Ok(query),
        ParamValue::List(values) => query.where_group(|group| {
            Ok(values
                .iter()
                .enumerate()
                .fold(group, |group, (index, value)| {
                    if index == 0 {
                        group.and_where(column, operator, value)
                    } else {
                        group.or_where(column, operator, value)
                    }
                }))
        }),
    }
}
