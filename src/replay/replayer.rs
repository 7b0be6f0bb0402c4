use crate::capture::node::ConfigNode;
use crate::config::types::{Result, TaskError};
use crate::replay::target::{ReplayRejection, ReplayTarget};
/// Configuration replay
/// Walks a captured tree depth-first: every attribute of a node is applied
/// before any child is opened, children go in capture order, and each child
/// is fully configured before its parent accepts it.
/// The first rejection aborts the whole replay; nothing after it is issued.
use log::{debug, trace};
use serde::Serialize;

/// Counters for one replay
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ReplayStats {
    pub attributes: usize,
    pub elements: usize,
}

fn rejected(path: &str, rejection: ReplayRejection) -> TaskError {
    TaskError::Replay {
        path: path.to_string(),
        reason: rejection.to_string(),
    }
}

fn replay_at<T: ReplayTarget + ?Sized>(
    target: &mut T,
    node: &ConfigNode,
    path: &str,
    stats: &mut ReplayStats,
) -> Result<()> {
    for (name, value) in node.attributes() {
        trace!("{}: set {}={}", path, name, value);
        target
            .set_attribute(name, value)
            .map_err(|r| rejected(path, r))?;
        stats.attributes += 1;
    }

    for child_node in node.children() {
        let child_path = format!("{}/{}", path, child_node.name());
        trace!("{}: open", child_path);

        let mut child = target
            .create_child(child_node.name())
            .map_err(|r| rejected(&child_path, r))?;
        replay_at(child.as_mut(), child_node, &child_path, stats)?;
        target
            .accept_child(child_node.name(), child)
            .map_err(|r| rejected(&child_path, r))?;
        stats.elements += 1;

        trace!("{}: closed", child_path);
    }

    Ok(())
}

/// Replay `node` onto `target`. The node's own name is only used for error paths.
pub fn replay<T: ReplayTarget + ?Sized>(target: &mut T, node: &ConfigNode) -> Result<ReplayStats> {
    let mut stats = ReplayStats::default();
    replay_at(target, node, node.name(), &mut stats)?;
    debug!(
        "Replayed {} attribute(s) and {} element(s) from {}",
        stats.attributes,
        stats.elements,
        node.name()
    );
    Ok(stats)
}
