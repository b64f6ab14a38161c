//! Sea-ORM query builder.
//!
//! [`FilterSelect`] composes a `Select<E>` from filter clauses. Columns are
//! qualified with the table of the scope they are written in, and relation
//! scopes become correlated sub-queries. Each sub-query aliases its table by
//! nesting depth, so a relation back onto the same table still correlates
//! with the outer row:
//!
//! ```sql
//! EXISTS (SELECT 1 FROM "comments" AS "comments_1"
//!         WHERE "comments_1"."post_id" = "posts"."id" AND "comments_1"."body" = 'hi')
//! ```
//!
//! Sea-ORM relation definitions are typed per entity pair, so relations are
//! looked up by name in a [`RelationCatalog`] registered once at startup:
//!
//! ```rust,ignore
//! let catalog = Arc::new(
//!     RelationCatalog::new()
//!         .relation::<post::Entity, comment::Entity>("comments", post::Column::Id, comment::Column::PostId)
//!         .relation::<comment::Entity, reply::Entity>("replies", comment::Column::Id, reply::Column::CommentId),
//! );
//! let select = FilterSelect::<post::Entity>::new(catalog);
//! ```
//!
//! Request values arrive as text. They are bound with the type of the column
//! they are compared against (integers as `i64`, floating point and decimal
//! columns as `f64`, booleans from `1`/`0`/`true`/`false`), so strict backends
//! such as Postgres see matching operand types. Values that do not parse, and
//! columns the builder knows nothing about, are bound as text.

use sea_orm::sea_query::{Alias, Expr, Query, SimpleExpr};
use sea_orm::{
    ColumnTrait, ColumnType, Condition, EntityTrait, IdenStatic, Iterable, Order, QueryFilter,
    QueryOrder, Select, Value,
};
use std::collections::HashMap;
use std::sync::Arc;

use super::{Boolean, ConditionBuilder, QueryBuilder, SortDirection};
use crate::errors::FunnelError;
use crate::filtering::Operator;

/// Column name to column type, for one table
type ColumnTypes = HashMap<String, ColumnType>;

fn column_types<E: EntityTrait>() -> ColumnTypes {
    E::Column::iter()
        .map(|column| {
            let name = IdenStatic::as_str(&column).to_string();
            (name, column.def().get_column_type().clone())
        })
        .collect()
}

/// Key pair joining a parent table to a related table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelationLink {
    pub from_table: String,
    pub to_table: String,
    /// Column on `from_table`
    pub local_key: String,
    /// Column on `to_table` referencing `local_key`
    pub foreign_key: String,
}

/// Named relations per table, used to resolve `where_has` paths and to
/// validate eager-load requests.
#[derive(Debug, Clone, Default)]
pub struct RelationCatalog {
    links: HashMap<(String, String), RelationLink>,
    tables: HashMap<String, Arc<ColumnTypes>>,
}

impl RelationCatalog {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `name` on `F`, pointing at `T` rows whose `foreign_key` equals
    /// the parent's `local_key`. Works for has-many (`id` → `parent_id`),
    /// belongs-to (`parent_id` → `id`) and self-referencing relations alike.
    #[must_use]
    pub fn relation<F, T>(mut self, name: &str, local_key: F::Column, foreign_key: T::Column) -> Self
    where
        F: EntityTrait,
        T: EntityTrait,
    {
        let from_table = F::default().table_name().to_string();
        let to_table = T::default().table_name().to_string();
        let link = RelationLink {
            from_table: from_table.clone(),
            to_table: to_table.clone(),
            local_key: IdenStatic::as_str(&local_key).to_string(),
            foreign_key: IdenStatic::as_str(&foreign_key).to_string(),
        };
        self.tables
            .entry(from_table.clone())
            .or_insert_with(|| Arc::new(column_types::<F>()));
        self.tables
            .entry(to_table)
            .or_insert_with(|| Arc::new(column_types::<T>()));
        self.links.insert((from_table, name.to_string()), link);
        self
    }

    #[must_use]
    pub fn resolve(&self, table: &str, relation: &str) -> Option<&RelationLink> {
        self.links.get(&(table.to_string(), relation.to_string()))
    }

    #[must_use]
    pub fn contains(&self, table: &str, relation: &str) -> bool {
        self.resolve(table, relation).is_some()
    }

    /// Column types of a registered table, empty when the table is unknown
    fn columns(&self, table: &str) -> Arc<ColumnTypes> {
        self.tables.get(table).cloned().unwrap_or_default()
    }
}

/// Conditions written against one table
#[derive(Debug, Clone)]
pub struct ConditionScope {
    table: String,
    /// Name columns are qualified with: the table itself at the root,
    /// `{table}_{depth}` inside relation sub-queries
    alias: String,
    depth: usize,
    columns: Arc<ColumnTypes>,
    catalog: Arc<RelationCatalog>,
    clauses: Vec<(Boolean, Condition)>,
}

impl ConditionScope {
    fn root(table: String, columns: Arc<ColumnTypes>, catalog: Arc<RelationCatalog>) -> Self {
        Self {
            alias: table.clone(),
            table,
            depth: 0,
            columns,
            catalog,
            clauses: Vec::new(),
        }
    }

    fn related(&self, table: &str) -> Self {
        let depth = self.depth + 1;
        Self {
            table: table.to_string(),
            alias: format!("{table}_{depth}"),
            depth,
            columns: self.catalog.columns(table),
            catalog: Arc::clone(&self.catalog),
            clauses: Vec::new(),
        }
    }

    fn group(&self) -> Self {
        Self {
            table: self.table.clone(),
            alias: self.alias.clone(),
            depth: self.depth,
            columns: Arc::clone(&self.columns),
            catalog: Arc::clone(&self.catalog),
            clauses: Vec::new(),
        }
    }

    #[must_use]
    pub fn table(&self) -> &str {
        &self.table
    }

    #[must_use]
    pub fn alias(&self) -> &str {
        &self.alias
    }

    /// The accumulated clauses, `None` when nothing was added
    #[must_use]
    pub fn into_condition(self) -> Option<Condition> {
        if self.clauses.is_empty() {
            return None;
        }

        // AND binds tighter than OR: split into OR-separated runs of ANDs
        let mut runs = Vec::new();
        let mut run = Condition::all();
        for (index, (boolean, condition)) in self.clauses.into_iter().enumerate() {
            if index > 0 && boolean == Boolean::Or {
                runs.push(run);
                run = Condition::all();
            }
            run = run.add(condition);
        }
        if runs.is_empty() {
            return Some(run);
        }
        runs.push(run);
        Some(runs.into_iter().fold(Condition::any(), |any, run| any.add(run)))
    }

    fn push_compare(&mut self, boolean: Boolean, column: &str, operator: Operator, value: &str) {
        let expr = compare(&self.alias, column, operator, value, self.columns.get(column));
        self.clauses.push((boolean, Condition::all().add(expr)));
    }

    fn push_group<F>(&mut self, scope: F) -> Result<(), FunnelError>
    where
        F: FnOnce(ConditionScope) -> Result<ConditionScope, FunnelError>,
    {
        let grouped = scope(self.group())?;
        if let Some(condition) = grouped.into_condition() {
            self.clauses.push((Boolean::And, condition));
        }
        Ok(())
    }

    fn push_exists<F>(&mut self, relation: &str, scope: F) -> Result<(), FunnelError>
    where
        F: FnOnce(ConditionScope) -> Result<ConditionScope, FunnelError>,
    {
        let exists = self.relation_exists(relation, scope)?;
        self.clauses.push((Boolean::And, Condition::all().add(exists)));
        Ok(())
    }

    fn relation_exists<F>(&self, relation: &str, scope: F) -> Result<SimpleExpr, FunnelError>
    where
        F: FnOnce(ConditionScope) -> Result<ConditionScope, FunnelError>,
    {
        let (head, rest) = match relation.split_once('.') {
            Some((head, rest)) => (head, Some(rest)),
            None => (relation, None),
        };
        let link = self
            .catalog
            .resolve(&self.table, head)
            .ok_or_else(|| FunnelError::unknown_relation(&self.table, head))?;

        let related = self.related(&link.to_table);
        let alias = related.alias.clone();
        let inner = match rest {
            Some(rest) => Some(Condition::all().add(related.relation_exists(rest, scope)?)),
            None => scope(related)?.into_condition(),
        };
        Ok(exists_subquery(link, &self.alias, &alias, inner))
    }
}

/// Bind `value` with the type of the column it is compared against
fn typed_value(column_type: Option<&ColumnType>, value: &str) -> Value {
    let text = || Value::from(value.to_string());
    match column_type {
        Some(
            ColumnType::TinyInteger
            | ColumnType::SmallInteger
            | ColumnType::Integer
            | ColumnType::BigInteger
            | ColumnType::TinyUnsigned
            | ColumnType::SmallUnsigned
            | ColumnType::Unsigned
            | ColumnType::BigUnsigned,
        ) => value
            .trim()
            .parse::<i64>()
            .map_or_else(|_| text(), Value::from),
        Some(
            ColumnType::Float | ColumnType::Double | ColumnType::Decimal(_) | ColumnType::Money(_),
        ) => value
            .trim()
            .parse::<f64>()
            .ok()
            .filter(|number| number.is_finite())
            .map_or_else(text, Value::from),
        Some(ColumnType::Boolean) => match value.trim().to_ascii_lowercase().as_str() {
            "1" | "true" => Value::from(true),
            "0" | "false" => Value::from(false),
            _ => text(),
        },
        _ => text(),
    }
}

fn compare(
    alias: &str,
    column: &str,
    operator: Operator,
    value: &str,
    column_type: Option<&ColumnType>,
) -> SimpleExpr {
    let column = Expr::col((Alias::new(alias), Alias::new(column)));
    match operator {
        // patterns are always text
        Operator::Like => column.like(value),
        Operator::NotLike => column.not_like(value),
        Operator::Eq => column.eq(typed_value(column_type, value)),
        Operator::Neq => column.ne(typed_value(column_type, value)),
        Operator::Gt => column.gt(typed_value(column_type, value)),
        Operator::Gte => column.gte(typed_value(column_type, value)),
        Operator::Lt => column.lt(typed_value(column_type, value)),
        Operator::Lte => column.lte(typed_value(column_type, value)),
    }
}

fn exists_subquery(
    link: &RelationLink,
    parent_alias: &str,
    alias: &str,
    inner: Option<Condition>,
) -> SimpleExpr {
    let join = Expr::col((Alias::new(alias), Alias::new(&link.foreign_key)))
        .equals((Alias::new(parent_alias), Alias::new(&link.local_key)));

    let mut condition = Condition::all().add(join);
    if let Some(inner) = inner {
        condition = condition.add(inner);
    }

    let mut subquery = Query::select();
    subquery
        .expr(Expr::val(1))
        .from_as(Alias::new(&link.to_table), Alias::new(alias))
        .cond_where(condition);
    Expr::exists(subquery)
}

impl ConditionBuilder for ConditionScope {
    type Scope = ConditionScope;

    fn and_where(mut self, column: &str, operator: Operator, value: &str) -> Self {
        self.push_compare(Boolean::And, column, operator, value);
        self
    }

    fn or_where(mut self, column: &str, operator: Operator, value: &str) -> Self {
        self.push_compare(Boolean::Or, column, operator, value);
        self
    }

    fn where_group<F>(mut self, scope: F) -> Result<Self, FunnelError>
    where
        F: FnOnce(Self::Scope) -> Result<Self::Scope, FunnelError>,
    {
        self.push_group(scope)?;
        Ok(self)
    }

    fn where_has<F>(mut self, relation: &str, scope: F) -> Result<Self, FunnelError>
    where
        F: FnOnce(Self::Scope) -> Result<Self::Scope, FunnelError>,
    {
        self.push_exists(relation, scope)?;
        Ok(self)
    }
}

/// A `Select<E>` under construction by a filter chain.
#[derive(Debug, Clone)]
pub struct FilterSelect<E: EntityTrait> {
    select: Select<E>,
    scope: ConditionScope,
    eager: Vec<String>,
}

impl<E: EntityTrait> FilterSelect<E> {
    /// Start from `E::find()`
    #[must_use]
    pub fn new(catalog: Arc<RelationCatalog>) -> Self {
        Self::from_select(E::find(), catalog)
    }

    /// Start from an existing select, e.g. one already scoped to a tenant
    #[must_use]
    pub fn from_select(select: Select<E>, catalog: Arc<RelationCatalog>) -> Self {
        let table = E::default().table_name().to_string();
        Self {
            select,
            scope: ConditionScope::root(table, Arc::new(column_types::<E>()), catalog),
            eager: Vec::new(),
        }
    }

    /// Relations requested through the eager-load parameter, for the caller's loader
    #[must_use]
    pub fn eager_relations(&self) -> &[String] {
        &self.eager
    }

    #[must_use]
    pub fn condition(&self) -> Option<Condition> {
        self.scope.clone().into_condition()
    }

    /// The composed, unexecuted select
    #[must_use]
    pub fn into_select(self) -> Select<E> {
        self.into_parts().0
    }

    #[must_use]
    pub fn into_parts(self) -> (Select<E>, Vec<String>) {
        let select = match self.scope.into_condition() {
            Some(condition) => self.select.filter(condition),
            None => self.select,
        };
        (select, self.eager)
    }
}

impl<E: EntityTrait> ConditionBuilder for FilterSelect<E> {
    type Scope = ConditionScope;

    fn and_where(mut self, column: &str, operator: Operator, value: &str) -> Self {
        self.scope.push_compare(Boolean::And, column, operator, value);
        self
    }

    fn or_where(mut self, column: &str, operator: Operator, value: &str) -> Self {
        self.scope.push_compare(Boolean::Or, column, operator, value);
        self
    }

    fn where_group<F>(mut self, scope: F) -> Result<Self, FunnelError>
    where
        F: FnOnce(Self::Scope) -> Result<Self::Scope, FunnelError>,
    {
        self.scope.push_group(scope)?;
        Ok(self)
    }

    fn where_has<F>(mut self, relation: &str, scope: F) -> Result<Self, FunnelError>
    where
        F: FnOnce(Self::Scope) -> Result<Self::Scope, FunnelError>,
    {
        self.scope.push_exists(relation, scope)?;
        Ok(self)
    }
}

impl<E: EntityTrait> QueryBuilder for FilterSelect<E> {
    fn order_by(mut self, column: &str, direction: SortDirection) -> Self {
        let column: SimpleExpr =
            Expr::col((Alias::new(&self.scope.alias), Alias::new(column))).into();
        let order = match direction {
            SortDirection::Asc => Order::Asc,
            SortDirection::Desc => Order::Desc,
        };
        self.select = self.select.order_by(column, order);
        self
    }

    fn eager_load(mut self, relations: Vec<String>) -> Self {
        self.eager.extend(relations);
        self
    }

    fn has_relation(&self, relation: &str) -> bool {
        self.scope.catalog.contains(&self.scope.table, relation)
    }
}
