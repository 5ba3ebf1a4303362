//! Read-side graph queries.

pub mod issues;

use anyhow::Result;
use neo4rs::Query;

use crate::GraphClient;

pub use issues::{IssueSummary, MilestoneProgress, ProjectBoard};

/// Node count per label, alphabetically.
pub async fn label_counts(client: &GraphClient) -> Result<Vec<(String, i64)>> {
    let query = Query::new(
        "MATCH (n) UNWIND labels(n) AS label
         RETURN label, count(*) AS count
         ORDER BY label"
            .to_string(),
    );

    client
        .query(query)
        .await?
        .iter()
        .map(|row| {
            let label: String = row
                .get("label")
                .map_err(|e| anyhow::anyhow!("Failed to get field 'label': {:?}", e))?;
            let count: i64 = row
                .get("count")
                .map_err(|e| anyhow::anyhow!("Failed to get field 'count': {:?}", e))?;
            Ok((label, count))
        })
        .collect()
}
