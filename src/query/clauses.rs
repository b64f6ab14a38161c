//! Storage-agnostic query builder.
//!
//! [`FilterQuery`] records the clauses a filter chain produces as a small tree.
//! The tree renders to SQL-like text (handy for logs and assertions) and can
//! be evaluated against JSON documents, where a relation is an array (or
//! object) field holding the related documents:
//!
//! ```rust,ignore
//! let query = FilterQuery::with_relations(["comments"])
//!     .where_has("comments.replies", |q| Ok(q.and_where("body", Operator::Eq, "hi")))?;
//! assert_eq!(
//!     query.to_string(),
//!     "WHERE EXISTS (comments WHERE EXISTS (replies WHERE body = 'hi'))"
//! );
//! ```

use serde_json::Value;
use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::fmt;

use super::{Boolean, ConditionBuilder, QueryBuilder, SortDirection};
use crate::errors::FunnelError;
use crate::filtering::Operator;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Clause {
    /// `column operator 'value'`
    Compare {
        column: String,
        operator: Operator,
        value: String,
    },
    /// Parenthesized clauses
    Group(Vec<WhereClause>),
    /// At least one related row matches the clauses
    Exists {
        relation: String,
        clauses: Vec<WhereClause>,
    },
}

/// A clause and the boolean joining it to the previous one
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WhereClause {
    pub boolean: Boolean,
    pub clause: Clause,
}

impl WhereClause {
    #[must_use]
    pub fn and(clause: Clause) -> Self {
        Self {
            boolean: Boolean::And,
            clause,
        }
    }

    #[must_use]
    pub fn or(clause: Clause) -> Self {
        Self {
            boolean: Boolean::Or,
            clause,
        }
    }
}

/// Clauses of a grouped or relation-scoped closure
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClauseScope {
    clauses: Vec<WhereClause>,
}

impl ClauseScope {
    #[must_use]
    pub fn clauses(&self) -> &[WhereClause] {
        &self.clauses
    }
}

/// Recorded query: where-clauses, ordering and eager-load requests.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterQuery {
    relations: BTreeSet<String>,
    clauses: Vec<WhereClause>,
    orders: Vec<(String, SortDirection)>,
    eager: Vec<String>,
}

impl FilterQuery {
    /// A query over an entity without relations
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A query over an entity exposing these relation accessors
    pub fn with_relations<I, S>(relations: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            relations: relations.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn clauses(&self) -> &[WhereClause] {
        &self.clauses
    }

    #[must_use]
    pub fn orders(&self) -> &[(String, SortDirection)] {
        &self.orders
    }

    #[must_use]
    pub fn eager_relations(&self) -> &[String] {
        &self.eager
    }

    /// Whether `record` satisfies every recorded where-clause
    #[must_use]
    pub fn matches(&self, record: &Value) -> bool {
        eval_clauses(&self.clauses, record)
    }

    /// Matching records, sorted by the recorded `ORDER BY`s
    #[must_use]
    pub fn apply<'a>(&self, records: &'a [Value]) -> Vec<&'a Value> {
        let mut matched: Vec<&Value> = records.iter().filter(|r| self.matches(r)).collect();
        matched.sort_by(|a, b| {
            for (column, direction) in &self.orders {
                let ordering = compare_fields(a.get(column), b.get(column));
                let ordering = match direction {
                    SortDirection::Asc => ordering,
                    SortDirection::Desc => ordering.reverse(),
                };
                if ordering != Ordering::Equal {
                    return ordering;
                }
            }
            Ordering::Equal
        });
        matched
    }
}

impl ConditionBuilder for ClauseScope {
    type Scope = ClauseScope;

    fn and_where(mut self, column: &str, operator: Operator, value: &str) -> Self {
        self.clauses.push(WhereClause::and(compare(column, operator, value)));
        self
    }

    fn or_where(mut self, column: &str, operator: Operator, value: &str) -> Self {
        self.clauses.push(WhereClause::or(compare(column, operator, value)));
        self
    }

    fn where_group<F>(mut self, scope: F) -> Result<Self, FunnelError>
    where
        F: FnOnce(Self::Scope) -> Result<Self::Scope, FunnelError>,
    {
        push_group(&mut self.clauses, scope)?;
        Ok(self)
    }

    fn where_has<F>(mut self, relation: &str, scope: F) -> Result<Self, FunnelError>
    where
        F: FnOnce(Self::Scope) -> Result<Self::Scope, FunnelError>,
    {
        push_exists(&mut self.clauses, relation, scope)?;
        Ok(self)
    }
}

impl ConditionBuilder for FilterQuery {
    type Scope = ClauseScope;

    fn and_where(mut self, column: &str, operator: Operator, value: &str) -> Self {
        self.clauses.push(WhereClause::and(compare(column, operator, value)));
        self
    }

    fn or_where(mut self, column: &str, operator: Operator, value: &str) -> Self {
        self.clauses.push(WhereClause::or(compare(column, operator, value)));
        self
    }

    fn where_group<F>(mut self, scope: F) -> Result<Self, FunnelError>
    where
        F: FnOnce(Self::Scope) -> Result<Self::Scope, FunnelError>,
    {
        push_group(&mut self.clauses, scope)?;
        Ok(self)
    }

    fn where_has<F>(mut self, relation: &str, scope: F) -> Result<Self, FunnelError>
    where
        F: FnOnce(Self::Scope) -> Result<Self::Scope, FunnelError>,
    {
        push_exists(&mut self.clauses, relation, scope)?;
        Ok(self)
    }
}

impl QueryBuilder for FilterQuery {
    fn order_by(mut self, column: &str, direction: SortDirection) -> Self {
        self.orders.push((column.to_string(), direction));
        self
    }

    fn eager_load(mut self, relations: Vec<String>) -> Self {
        self.eager.extend(relations);
        self
    }

    fn has_relation(&self, relation: &str) -> bool {
        self.relations.contains(relation)
    }
}

fn compare(column: &str, operator: Operator, value: &str) -> Clause {
    Clause::Compare {
        column: column.to_string(),
        operator,
        value: value.to_string(),
    }
}

fn push_group<F>(clauses: &mut Vec<WhereClause>, scope: F) -> Result<(), FunnelError>
where
    F: FnOnce(ClauseScope) -> Result<ClauseScope, FunnelError>,
{
    let scoped = scope(ClauseScope::default())?;
    if !scoped.clauses.is_empty() {
        clauses.push(WhereClause::and(Clause::Group(scoped.clauses)));
    }
    Ok(())
}

fn push_exists<F>(clauses: &mut Vec<WhereClause>, relation: &str, scope: F) -> Result<(), FunnelError>
where
    F: FnOnce(ClauseScope) -> Result<ClauseScope, FunnelError>,
{
    let scoped = scope(ClauseScope::default())?;
    clauses.push(WhereClause::and(nest_exists(relation, scoped.clauses)));
    Ok(())
}

/// `comments.replies` becomes `EXISTS (comments WHERE EXISTS (replies WHERE ...))`
fn nest_exists(relation: &str, clauses: Vec<WhereClause>) -> Clause {
    match relation.split_once('.') {
        Some((head, rest)) => Clause::Exists {
            relation: head.to_string(),
            clauses: vec![WhereClause::and(nest_exists(rest, clauses))],
        },
        None => Clause::Exists {
            relation: relation.to_string(),
            clauses,
        },
    }
}

// ----------------------------------------------------------------------------
// Rendering
// ----------------------------------------------------------------------------

fn render_clauses(clauses: &[WhereClause]) -> String {
    let mut sql = String::new();
    for (index, where_clause) in clauses.iter().enumerate() {
        if index > 0 {
            sql.push(' ');
            sql.push_str(&where_clause.boolean.to_string());
            sql.push(' ');
        }
        sql.push_str(&render_clause(&where_clause.clause));
    }
    sql
}

fn render_clause(clause: &Clause) -> String {
    match clause {
        Clause::Compare {
            column,
            operator,
            value,
        } => format!("{column} {operator} '{}'", value.replace('\'', "''")),
        Clause::Group(clauses) => format!("({})", render_clauses(clauses)),
        Clause::Exists { relation, clauses } if clauses.is_empty() => {
            format!("EXISTS ({relation})")
        }
        Clause::Exists { relation, clauses } => {
            format!("EXISTS ({relation} WHERE {})", render_clauses(clauses))
        }
    }
}

impl fmt::Display for FilterQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts = Vec::new();
        if !self.clauses.is_empty() {
            parts.push(format!("WHERE {}", render_clauses(&self.clauses)));
        }
        if !self.orders.is_empty() {
            let orders: Vec<String> = self
                .orders
                .iter()
                .map(|(column, direction)| format!("{column} {direction}"))
                .collect();
            parts.push(format!("ORDER BY {}", orders.join(", ")));
        }
        f.write_str(&parts.join(" "))
    }
}

// ----------------------------------------------------------------------------
// Evaluation
// ----------------------------------------------------------------------------

/// OR-separated runs of AND-joined clauses
fn eval_clauses(clauses: &[WhereClause], record: &Value) -> bool {
    let mut any = false;
    let mut run = true;
    for (index, where_clause) in clauses.iter().enumerate() {
        if index > 0 && where_clause.boolean == Boolean::Or {
            any |= run;
            run = true;
        }
        run = run && eval_clause(&where_clause.clause, record);
    }
    any || run
}

fn eval_clause(clause: &Clause, record: &Value) -> bool {
    match clause {
        Clause::Compare {
            column,
            operator,
            value,
        } => record
            .get(column)
            .and_then(scalar_text)
            .is_some_and(|field| compare_text(*operator, &field, value)),
        Clause::Group(clauses) => eval_clauses(clauses, record),
        Clause::Exists { relation, clauses } => match record.get(relation) {
            Some(Value::Array(related)) => related.iter().any(|r| eval_clauses(clauses, r)),
            Some(related @ Value::Object(_)) => eval_clauses(clauses, related),
            _ => false,
        },
    }
}

/// Text form of a scalar field; booleans are stored as `1`/`0`
fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(if *b { "1" } else { "0" }.to_string()),
        Value::Null | Value::Array(_) | Value::Object(_) => None,
    }
}

/// Finite number, so `NaN` and `inf` stay text
fn parse_number(text: &str) -> Option<f64> {
    text.parse::<f64>().ok().filter(|number| number.is_finite())
}

fn compare_text(operator: Operator, field: &str, value: &str) -> bool {
    let ordering = || match (parse_number(field), parse_number(value)) {
        (Some(a), Some(b)) => a.partial_cmp(&b),
        _ => Some(field.cmp(value)),
    };
    match operator {
        Operator::Like => like_match(value, field),
        Operator::NotLike => !like_match(value, field),
        Operator::Eq => ordering() == Some(Ordering::Equal),
        Operator::Neq => matches!(ordering(), Some(Ordering::Less | Ordering::Greater)),
        Operator::Gt => ordering() == Some(Ordering::Greater),
        Operator::Gte => matches!(ordering(), Some(Ordering::Greater | Ordering::Equal)),
        Operator::Lt => ordering() == Some(Ordering::Less),
        Operator::Lte => matches!(ordering(), Some(Ordering::Less | Ordering::Equal)),
    }
}

fn compare_fields(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    match (a.and_then(scalar_text), b.and_then(scalar_text)) {
        (Some(a), Some(b)) => match (parse_number(&a), parse_number(&b)) {
            (Some(x), Some(y)) => x.partial_cmp(&y).unwrap_or(Ordering::Equal),
            _ => a.cmp(&b),
        },
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// SQL `LIKE`: `%` matches any run, `_` one character, ASCII case-insensitive
fn like_match(pattern: &str, text: &str) -> bool {
    let pattern: Vec<char> = pattern.chars().map(|c| c.to_ascii_lowercase()).collect();
    let text: Vec<char> = text.chars().map(|c| c.to_ascii_lowercase()).collect();

    // matched[j]: the pattern prefix seen so far matches text[..j]
    let mut matched = vec![false; text.len() + 1];
    matched[0] = true;
    for &p in &pattern {
        let mut next = vec![false; text.len() + 1];
        match p {
            '%' => {
                let mut reachable = false;
                for j in 0..=text.len() {
                    reachable |= matched[j];
                    next[j] = reachable;
                }
            }
            '_' => {
                for j in 1..=text.len() {
                    next[j] = matched[j - 1];
                }
            }
            c => {
                for j in 1..=text.len() {
                    next[j] = matched[j - 1] && text[j - 1] == c;
                }
            }
        }
        matched = next;
    }
    matched[text.len()]
}
