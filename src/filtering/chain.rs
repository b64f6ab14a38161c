use std::fmt;

use super::Filter;
use crate::config::FunnelConfig;
use crate::errors::FunnelError;
use crate::query::QueryBuilder;
use crate::request::{ParamValue, ParameterSource};

/// Ordered filters for one entity type.
///
/// The chain threads a query through its filters in registration order. A
/// filter whose parameter is absent passes the query on untouched. Before
/// the filters run, the eager-load parameter (`with` by default) is resolved
/// into relation names the query builder knows about.
pub struct FilterChain<Q> {
    config: FunnelConfig,
    filters: Vec<Filter<Q>>,
}

impl<Q> FilterChain<Q> {
    #[must_use]
    pub fn new(config: FunnelConfig) -> Self {
        Self {
            config,
            filters: Vec::new(),
        }
    }

    /// Build a chain from filters in order
    ///
    /// # Errors
    ///
    /// Returns [`FunnelError::ReservedParameter`] if any filter listens on the
    /// eager-load key.
    pub fn from_filters<I>(config: FunnelConfig, filters: I) -> Result<Self, FunnelError>
    where
        I: IntoIterator<Item = Filter<Q>>,
    {
        filters
            .into_iter()
            .try_fold(Self::new(config), Self::with_filter)
    }

    /// # Errors
    ///
    /// Returns [`FunnelError::ReservedParameter`] if the filter listens on the
    /// eager-load key.
    pub fn push(&mut self, filter: Filter<Q>) -> Result<(), FunnelError> {
        filter.ensure_not_reserved(&self.config)?;
        self.filters.push(filter);
        Ok(())
    }

    /// Builder-style [`push`](Self::push)
    ///
    /// # Errors
    ///
    /// Returns [`FunnelError::ReservedParameter`] if the filter listens on the
    /// eager-load key.
    pub fn with_filter(mut self, filter: Filter<Q>) -> Result<Self, FunnelError> {
        self.push(filter)?;
        Ok(self)
    }

    #[must_use]
    pub fn config(&self) -> &FunnelConfig {
        &self.config
    }

    #[must_use]
    pub fn filters(&self) -> &[Filter<Q>] {
        &self.filters
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.filters.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }
}

impl<Q: QueryBuilder> FilterChain<Q> {
    /// Compose `query` from the request. The result is not executed.
    ///
    /// # Errors
    ///
    /// Returns the first error raised by a filter.
    pub fn apply<S>(&self, query: Q, source: &S) -> Result<Q, FunnelError>
    where
        S: ParameterSource + ?Sized,
    {
        let query = self.load_eager(query, source);

        self.filters.iter().try_fold(query, |query, filter| {
            if source.has(filter.parameter()) {
                filter.apply(query, source)
            } else {
                tracing::trace!(parameter = %filter.parameter(), "Filter parameter absent, skipping");
                Ok(query)
            }
        })
    }

    /// Relation names requested through the eager-load parameter that `query`
    /// knows about. Unknown names are dropped.
    pub fn eager_relations<S>(&self, query: &Q, source: &S) -> Vec<String>
    where
        S: ParameterSource + ?Sized,
    {
        let Some(value) = source.get(&self.config.eager_key) else {
            return Vec::new();
        };

        let requested: Vec<String> = match value {
            ParamValue::Single(names) => split_names(&names),
            ParamValue::List(values) => values.iter().flat_map(|names| split_names(names)).collect(),
        };

        requested
            .into_iter()
            .filter(|name| {
                // nested paths are checked by their first relation
                let root = name.split('.').next().unwrap_or_default();
                let known = query.has_relation(root);
                if !known {
                    tracing::debug!(relation = %name, "Dropping unknown eager-load relation");
                }
                known
            })
            .collect()
    }

    fn load_eager<S>(&self, query: Q, source: &S) -> Q
    where
        S: ParameterSource + ?Sized,
    {
        let relations = self.eager_relations(&query, source);
        if relations.is_empty() {
            return query;
        }
        tracing::debug!(relations = ?relations, "Eager loading relations");
        query.eager_load(relations)
    }
}

fn split_names(names: &str) -> Vec<String> {
    names.split(',').map(str::to_string).collect()
}

impl<Q> Default for FilterChain<Q> {
    fn default() -> Self {
        Self::new(FunnelConfig::default())
    }
}

impl<Q> Clone for FilterChain<Q> {
    fn clone(&self) -> Self {
        Self {
            config: self.config.clone(),
            filters: self.filters.clone(),
        }
    }
}

impl<Q> fmt::Debug for FilterChain<Q> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FilterChain")
            .field("config", &self.config)
            .field("filters", &self.filters)
            .finish()
    }
}

/// An entity type that declares its filters.
///
/// ```rust,ignore
/// impl Filterable for Post {
///     type Query = FilterSelect<post::Entity>;
///
///     fn query() -> Self::Query {
///         FilterSelect::new(catalog())
///     }
///
///     fn filters() -> Result<FilterChain<Self::Query>, FunnelError> {
///         FilterChain::from_filters(FunnelConfig::default(), [
///             Filter::new("published", "is_published", "=")?,
///             Filter::new("search", "title", "like")?,
///         ])
///     }
/// }
///
/// let select = Post::filtered(&params)?.into_select();
/// ```
pub trait Filterable {
    type Query: QueryBuilder;

    /// Base query the chain starts from
    fn query() -> Self::Query;

    /// # Errors
    ///
    /// Returns an error if a filter is misconfigured.
    fn filters() -> Result<FilterChain<Self::Query>, FunnelError>;

    /// Run the filter chain over [`query`](Self::query)
    ///
    /// # Errors
    ///
    /// Returns the first error raised while building or applying the chain.
    fn filtered<S>(source: &S) -> Result<Self::Query, FunnelError>
    where
        S: ParameterSource + ?Sized,
    {
        Self::filters()?.apply(Self::query(), source)
    }
}
