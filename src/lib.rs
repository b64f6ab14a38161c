//! # funnelcrate
//!
//! Declarative request filtering for Sea-ORM and axum. Declare which request
//! parameters may narrow an entity's query, and the filter chain turns the
//! parameters actually present into `WHERE` clauses, relation-existence
//! sub-queries, ordering and eager-load requests.
//!
//! ```rust,ignore
//! async fn list_posts(params: QueryParams) -> Result<Json<Vec<post::Model>>, FunnelError> {
//!     let select = Post::filtered(&params)?.into_select();
//!     // execute `select` with your connection
//! }
//! ```

pub mod config;
pub mod errors;
pub mod filtering;
pub mod query;
pub mod request;

pub use config::FunnelConfig;
pub use errors::FunnelError;
pub use filtering::{Attribute, Filter, FilterChain, FilterClause, Filterable, Operator, Parameter};
pub use query::{ConditionBuilder, FilterQuery, FilterSelect, QueryBuilder, RelationCatalog, SortDirection};
pub use request::{ParamValue, ParameterSource, QueryParams};
