//! # Request Filtering
//!
//! Translates request parameters into query predicates. Each [`Filter`] binds
//! one parameter name to one attribute and operator; a [`FilterChain`] runs an
//! entity's filters in order against any [`QueryBuilder`](crate::query::QueryBuilder).
//!
//! ## Main Components
//!
//! - **[`Attribute`]**: a column path such as `title` or `comments.replies.body`
//! - **[`Parameter`]**: one request value, with `LIKE` wrapping and comma splitting
//! - **[`Operator`]**: `=`, `!=`, `>`, `>=`, `<`, `<=`, `like`, `not like`
//! - **[`Filter`]**: parameter + attribute + operator + clause behaviour
//! - **[`FilterChain`]** / **[`Filterable`]**: per-entity filter lists and the
//!   eager-load parameter
//!
//! ## Query Parameter Examples
//!
//! ```rust,ignore
//! // Filter::new("published", "is_published", "=")
//! GET /posts?published=1            // WHERE is_published = '1'
//!
//! // Filter::new("search", "title", "like")
//! GET /posts?search=lorem           // WHERE title LIKE '%lorem%'
//!
//! // Filter::new("title", "title", "=")
//! GET /posts?title[]=lorem&title[]=ipsum
//!                                   // WHERE (title = 'lorem' OR title = 'ipsum')
//! GET /posts?title=lorem,ipsum      // same
//!
//! // Filter::new("reply", "comments.replies.body", "=")
//! GET /posts?reply=hi               // WHERE EXISTS (comments WHERE EXISTS (replies WHERE body = 'hi'))
//!
//! // eager loading, unknown relations are dropped
//! GET /posts?with=comments,authors  // eager_load(["comments"])
//! ```

pub mod attribute;
pub mod chain;
pub mod filter;
pub mod operator;
pub mod parameter;

pub use attribute::Attribute;
pub use chain::{FilterChain, Filterable};
pub use filter::{CustomClause, Filter, FilterClause, where_clause};
pub use operator::Operator;
pub use parameter::Parameter;
