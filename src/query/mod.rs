//! # Query Builder Collaborators
//!
//! Filters do not generate SQL. They talk to a query builder through the two
//! traits in this module and leave storage concerns to the implementation:
//!
//! - **[`ConditionBuilder`]**: `WHERE` clauses, `OR` clauses, grouped clauses and
//!   relation-existence scopes.
//! - **[`QueryBuilder`]**: the top-level query. Adds ordering, eager loading and
//!   knowledge of the entity's relations.
//!
//! Two implementations ship with the crate:
//!
//! - **[`FilterQuery`](clauses::FilterQuery)**: a storage-agnostic clause tree
//!   that renders to SQL-like text and evaluates against JSON documents.
//! - **[`FilterSelect`](sea::FilterSelect)**: composes a Sea-ORM `Select<E>`,
//!   turning relation scopes into `EXISTS` sub-queries.
//!
//! Builders are threaded by value: every call returns the next query state.
//! Clauses combine with SQL precedence, so `a AND b OR c` reads as
//! `(a AND b) OR c`.

pub mod clauses;
pub mod sea;

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::errors::FunnelError;
use crate::filtering::Operator;

pub use clauses::FilterQuery;
pub use sea::{FilterSelect, RelationCatalog};

/// How a clause joins the clauses before it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Boolean {
    And,
    Or,
}

impl fmt::Display for Boolean {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::And => f.write_str("AND"),
            Self::Or => f.write_str("OR"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SortDirection {
    Asc,
    Desc,
}

impl SortDirection {
    /// `asc` in any case is ascending, anything else descending
    #[must_use]
    pub fn parse(direction: &str) -> Self {
        if direction.trim().eq_ignore_ascii_case("asc") {
            Self::Asc
        } else {
            Self::Desc
        }
    }
}

impl fmt::Display for SortDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Asc => f.write_str("ASC"),
            Self::Desc => f.write_str("DESC"),
        }
    }
}

/// Accumulates predicates for one scope of a query.
pub trait ConditionBuilder: Sized {
    /// Builder handed to grouped and relation-scoped closures
    type Scope: ConditionBuilder;

    /// `AND column operator value`
    #[must_use]
    fn and_where(self, column: &str, operator: Operator, value: &str) -> Self;

    /// `OR column operator value`
    #[must_use]
    fn or_where(self, column: &str, operator: Operator, value: &str) -> Self;

    /// `AND ( ... )` with the clauses built by `scope`
    ///
    /// # Errors
    ///
    /// Propagates errors returned by `scope`.
    fn where_group<F>(self, scope: F) -> Result<Self, FunnelError>
    where
        F: FnOnce(Self::Scope) -> Result<Self::Scope, FunnelError>;

    /// `AND EXISTS (related rows matching ...)`. A dotted `relation` nests one
    /// existence scope per segment.
    ///
    /// # Errors
    ///
    /// Returns [`FunnelError::UnknownRelation`] when the builder cannot resolve
    /// the relation, and propagates errors returned by `scope`.
    fn where_has<F>(self, relation: &str, scope: F) -> Result<Self, FunnelError>
    where
        F: FnOnce(Self::Scope) -> Result<Self::Scope, FunnelError>;
}

/// The top-level query a filter chain runs against.
pub trait QueryBuilder: ConditionBuilder {
    #[must_use]
    fn order_by(self, column: &str, direction: SortDirection) -> Self;

    /// Request that these relations be loaded alongside the results
    #[must_use]
    fn eager_load(self, relations: Vec<String>) -> Self;

    /// Whether the queried entity exposes a relation under this name
    fn has_relation(&self, relation: &str) -> bool;
}
