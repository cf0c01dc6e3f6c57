//! External storage collaborators: the bulk store the export is uploaded to,
//! and the query store that loads it and answers the extremal queries.

/// Hierarchical file storage.
pub mod bulk_store;
/// Tabular query service.
pub mod query_store;

pub use bulk_store::{BulkStore, LocalBulkStore};
pub use query_store::{
  EmbeddedConnection, EmbeddedQueryStore, QueryConnection, QueryStore, SortOrder, Statement,
  TableSchema,
};
