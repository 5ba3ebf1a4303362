//! Neo4j connection client.

use anyhow::{Context, Result};
use async_trait::async_trait;
use neo4rs::{BoltNull, BoltType, ConfigBuilder, Graph, Query};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::cypher::{self, Statement};
use crate::store::{
    EdgeMerge, EdgeOutcome, GraphCounts, GraphStore, NodeLabel, NodeMerge, NodeRef, PropValue, RelType, SchemaDeclaration,
};

/// Configuration for connecting to Neo4j.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GraphConfig {
    pub uri: String,
    pub user: String,
    pub password: String,
    pub database: String,
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            uri: "bolt://localhost:7687".to_string(),
            user: "neo4j".to_string(),
            password: "neo4j".to_string(),
            database: "neo4j".to_string(),
        }
    }
}

/// Client for Neo4j graph operations.
#[derive(Clone)]
pub struct GraphClient {
    graph: Graph,
}

impl GraphClient {
    /// Create a new GraphClient from config.
    ///
    /// `Graph::connect` only builds the pool; a `RETURN 1` ping forces the
    /// bolt handshake so an unreachable server fails here.
    pub async fn connect(config: &GraphConfig) -> Result<Self> {
        let neo4j_config = ConfigBuilder::default()
            .uri(&config.uri)
            .user(&config.user)
            .password(&config.password)
            .db(config.database.as_str())
            .max_connections(4)
            .fetch_size(100)
            .build()
            .context("Failed to build Neo4j config")?;

        let graph = Graph::connect(neo4j_config)
            .await
            .context("Failed to create Neo4j connection pool")?;

        graph
            .run(Query::new("RETURN 1".to_string()))
            .await
            .context("Neo4j is not responding to queries")?;

        Ok(Self { graph })
    }

    /// Execute a Cypher query that returns no results.
    pub async fn execute(&self, query: Query) -> Result<()> {
        self.graph.run(query).await.context("Neo4j query execution failed")?;
        Ok(())
    }

    /// Execute a Cypher query and return results as rows.
    pub async fn query(&self, query: Query) -> Result<Vec<neo4rs::Row>> {
        let mut result = self.graph.execute(query).await.context("Neo4j query failed")?;

        let mut rows = Vec::new();
        while let Some(row) = result.next().await.context("Failed to read Neo4j result row")? {
            rows.push(row);
        }
        Ok(rows)
    }

    /// Execute a Cypher query and return a single scalar value.
    pub async fn query_scalar<T: DeserializeOwned>(&self, query: Query, field: &str) -> Result<Option<T>> {
        let rows = self.query(query).await?;
        if let Some(row) = rows.into_iter().next() {
            let val: T = row
                .get(field)
                .map_err(|e| anyhow::anyhow!("Failed to get field '{}': {:?}", field, e))?;
            Ok(Some(val))
        } else {
            Ok(None)
        }
    }

    /// Get node and relationship counts for status display.
    pub async fn get_counts(&self) -> Result<GraphCounts> {
        let nodes: i64 = self
            .query_scalar(Query::new(cypher::COUNT_NODES.to_string()), "count")
            .await?
            .unwrap_or(0);
        let relationships: i64 = self
            .query_scalar(Query::new(cypher::COUNT_RELATIONSHIPS.to_string()), "count")
            .await?
            .unwrap_or(0);

        Ok(GraphCounts {
            nodes: nodes as usize,
            relationships: relationships as usize,
        })
    }
}

/// Bind a built statement's parameters onto a neo4rs query.
pub(crate) fn to_query(statement: Statement) -> Query {
    statement
        .params
        .into_iter()
        .fold(Query::new(statement.text), |query, (name, value)| {
            query.param(&name, to_bolt(value))
        })
}

fn to_bolt(value: PropValue) -> BoltType {
    match value {
        PropValue::Null => BoltType::Null(BoltNull),
        PropValue::Bool(b) => b.into(),
        PropValue::Int(i) => i.into(),
        PropValue::Text(s) => s.into(),
        PropValue::List(items) => items.into(),
        // wrapped in datetime() by the statement
        PropValue::Timestamp(ts) => ts.to_rfc3339().into(),
    }
}

#[async_trait]
impl GraphStore for GraphClient {
    async fn merge_node(&self, node: &NodeMerge) -> Result<()> {
        self.execute(to_query(cypher::node_merge(node)))
            .await
            .with_context(|| format!("Failed to merge {} {}", node.label, node.key))
    }

    async fn merge_edge(&self, edge: &EdgeMerge) -> Result<EdgeOutcome> {
        let linked: i64 = self
            .query_scalar(to_query(cypher::edge_merge(edge)), "linked")
            .await
            .with_context(|| format!("Failed to merge edge {}", edge))?
            .unwrap_or(0);

        if linked == 0 {
            debug!(edge = %edge, "Edge endpoint missing");
            Ok(EdgeOutcome::MissingEndpoint)
        } else {
            Ok(EdgeOutcome::Linked)
        }
    }

    async fn detach_edges(&self, from: &NodeRef, rel: RelType, target: NodeLabel) -> Result<usize> {
        let removed: i64 = self
            .query_scalar(to_query(cypher::edge_detach(from, rel, target)), "removed")
            .await
            .with_context(|| format!("Failed to detach {} edges from {}", rel, from))?
            .unwrap_or(0);
        Ok(removed as usize)
    }

    async fn declare(&self, declaration: &SchemaDeclaration) -> Result<()> {
        self.execute(to_query(cypher::schema(declaration)))
            .await
            .with_context(|| format!("Failed to apply {}", declaration.name()))
    }

    async fn counts(&self) -> Result<GraphCounts> {
        self.get_counts().await
    }
}
