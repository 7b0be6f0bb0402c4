use crate::capture::node::ConfigNode;
use crate::config::types::{Result, TaskError};
/// Streaming capture of declarative configuration
/// Receives attribute-set and child-create events in document order and
/// builds a ConfigNode tree. Nothing is validated here; unknown names only
/// surface when the tree is replayed onto a real target.
use log::{debug, warn};

pub const ROOT_ELEMENT: &str = "root";

/// Event sink for a declarative parser.
///
/// `create_child` descends into the new element; `end_child` returns to the
/// parent. Attribute events always address the current element.
#[derive(Debug)]
pub struct ConfigCapture {
    root: ConfigNode,
    cursor: Vec<usize>,
}

impl Default for ConfigCapture {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigCapture {
    pub fn new() -> Self {
        Self::with_root_name(ROOT_ELEMENT)
    }

    pub fn with_root_name(name: impl Into<String>) -> Self {
        Self {
            root: ConfigNode::new(name),
            cursor: Vec::new(),
        }
    }

    pub fn set_attribute(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.current_mut().set_attribute(name, value);
    }

    pub fn create_child(&mut self, name: impl Into<String>) -> &mut ConfigNode {
        let parent = self.current_mut();
        parent.create_child(name);
        let index = parent.children().len() - 1;
        self.cursor.push(index);
        self.current_mut()
    }

    /// Close the current element
    pub fn end_child(&mut self) -> Result<()> {
        if self.cursor.pop().is_none() {
            return Err(TaskError::Config(
                "end_child called with no open element".to_string(),
            ));
        }
        Ok(())
    }

    pub fn current(&self) -> &ConfigNode {
        let mut node = &self.root;
        for &index in &self.cursor {
            node = &node.children()[index];
        }
        node
    }

    fn current_mut(&mut self) -> &mut ConfigNode {
        let mut node = &mut self.root;
        for &index in &self.cursor {
            // cursor indices are only ever pushed right after the child exists
            node = match node.child_mut(index) {
                Some(child) => child,
                None => unreachable!("capture cursor out of sync at index {index}"),
            };
        }
        node
    }

    /// Number of open elements below the root
    pub fn depth(&self) -> usize {
        self.cursor.len()
    }

    /// End the capture phase. The returned tree is not modified afterwards.
    pub fn finish(self) -> ConfigNode {
        if !self.cursor.is_empty() {
            warn!(
                "Capture finished with {} unclosed element(s) under {}",
                self.cursor.len(),
                self.root.name()
            );
        }
        debug!(
            "Captured {} node(s) under {}",
            self.root.node_count(),
            self.root.name()
        );
        self.root
    }
}
