//! Jira epic and story synchronization.
//!
//! - (:Story)-[:BELONGS_TO]->(:Epic) when the story names a parent

use anyhow::Result;
use tracing::debug;

use cflow_core::{Epic, Story};

use super::{relink, upsert_node, SyncResult};
use crate::store::{GraphStore, NodeLabel, NodeMerge, NodeRef, RelType};

pub fn epic_node(epic: &Epic) -> NodeMerge {
    NodeMerge::new(NodeLabel::Epic, epic.key.as_str())
        .set("summary", epic.summary.as_str())
        .set("description", epic.description.clone())
        .set("status", epic.status.as_str())
        .set("assignee", epic.assignee.clone())
        .set("reporter", epic.reporter.as_str())
        .set("created", epic.created)
        .set("updated", epic.updated)
        .set("labels", epic.labels.clone())
        .set("priority", epic.priority.clone())
}

pub fn story_node(story: &Story) -> NodeMerge {
    NodeMerge::new(NodeLabel::Story, story.key.as_str())
        .set("summary", story.summary.as_str())
        .set("description", story.description.clone())
        .set("status", story.status.as_str())
        .set("assignee", story.assignee.clone())
        .set("reporter", story.reporter.as_str())
        .set("created", story.created)
        .set("updated", story.updated)
        .set("labels", story.labels.clone())
        .set("priority", story.priority.clone())
        .set("parent_key", story.parent_key.clone())
}

pub async fn sync_epic(store: &dyn GraphStore, epic: &Epic) -> Result<SyncResult> {
    let mut result = SyncResult::default();
    upsert_node(store, &epic_node(epic), &mut result).await?;
    debug!(key = %epic.key, "Synced epic");
    Ok(result)
}

/// Upsert a story and point its `BELONGS_TO` edge at its current epic.
pub async fn sync_story(store: &dyn GraphStore, story: &Story) -> Result<SyncResult> {
    let mut result = SyncResult::default();
    let node = story_node(story);
    upsert_node(store, &node, &mut result).await?;

    relink(
        store,
        node.node_ref(),
        RelType::BelongsTo,
        NodeLabel::Epic,
        story.parent_key.as_deref().map(|parent| NodeRef::by_key(NodeLabel::Epic, parent)),
        &mut result,
    )
    .await?;

    debug!(key = %story.key, parent = ?story.parent_key, "Synced story");
    Ok(result)
}
