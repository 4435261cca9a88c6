//! Resolution of group monitors' child references into server-side ids.

use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::model::{GroupChild, Monitor, MonitorSummary, TypeData};

/// Looks up an existing monitor by its tag.
///
/// This is all the group resolver needs from the server, so tests can
/// substitute an in-memory table.
#[async_trait]
pub trait MonitorLookup: Send + Sync {
    async fn lookup_by_tag(&self, tag: &str) -> Option<MonitorSummary>;
}

/// What happened to a group's children during resolution.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GroupResolution {
    pub resolved: usize,
    pub unresolved: Vec<String>,
    pub untagged: usize,
}

/// Replace a group's child references with `{id, tag, name, selected}`
/// entries for every child that exists on the server.
///
/// Children that cannot be found, or that have no tag, are dropped with a
/// warning. Non-group monitors are left untouched.
pub async fn resolve_group<L>(monitor: &mut Monitor, lookup: &L) -> GroupResolution
where
    L: MonitorLookup + ?Sized,
{
    let mut outcome = GroupResolution::default();

    let TypeData::Group(group) = &mut monitor.type_data else {
        return outcome;
    };

    let children = std::mem::take(&mut group.monitors);
    let mut resolved = Vec::with_capacity(children.len());

    for child in children {
        let Some(child_tag) = child.tag() else {
            warn!(group = %monitor.tag, child = ?child, "Group child monitor has no tag, skipping");
            outcome.untagged += 1;
            continue;
        };

        match lookup.lookup_by_tag(child_tag).await {
            Some(summary) => {
                debug!(group = %monitor.tag, child = %child_tag, id = summary.id, "Resolved group child");
                resolved.push(GroupChild::resolved(summary));
                outcome.resolved += 1;
            }
            None => {
                warn!(group = %monitor.tag, child = %child_tag, "Child monitor could not be resolved, dropping it");
                outcome.unresolved.push(child_tag.to_string());
            }
        }
    }

    group.monitors = resolved;
    info!(
        group = %monitor.tag,
        resolved = outcome.resolved,
        dropped = outcome.unresolved.len() + outcome.untagged,
        "Resolved group monitor children"
    );
    outcome
}
