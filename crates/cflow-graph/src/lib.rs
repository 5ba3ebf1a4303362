//! # ContextFlow Graph
//!
//! Neo4j graph synchronization for ContextFlow.
//!
//! Maps normalized tracker and architecture entities onto idempotent node
//! and edge merges, declares the graph schema, and answers read queries
//! over the synced data.

pub mod client;
pub mod cypher;
pub mod memory;
pub mod queries;
pub mod schema;
pub mod store;
pub mod sync;

pub use client::{GraphClient, GraphConfig};
pub use memory::MemoryGraph;
pub use schema::{ensure_schema, schema_declarations, SchemaReport};
pub use store::{
    EdgeMerge, EdgeOutcome, GraphCounts, GraphStore, NodeKey, NodeLabel, NodeMerge, NodeRef, PropValue, RelType,
    SchemaDeclaration,
};
pub use sync::{reconcile_edges, SyncResult};
