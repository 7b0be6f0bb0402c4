use crate::replay::target::{downcast_child, ReplayRejection, ReplayTarget};

/// One captured declarative element: ordered attributes and ordered children.
///
/// Strict tree; every child is owned by its parent. Attribute names are unique
/// per node and a repeated name overwrites the earlier value.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ConfigNode {
    name: String,
    attributes: Vec<(String, String)>,
    children: Vec<ConfigNode>,
}

impl ConfigNode {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attributes: Vec::new(),
            children: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Record an attribute. Last write wins.
    pub fn set_attribute(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        match self.attributes.iter_mut().find(|(k, _)| *k == name) {
            Some(slot) => slot.1 = value,
            None => self.attributes.push((name, value)),
        }
    }

    /// Append an empty child and return it as the new current scope.
    pub fn create_child(&mut self, name: impl Into<String>) -> &mut ConfigNode {
        self.children.push(ConfigNode::new(name));
        let last = self.children.len() - 1;
        &mut self.children[last]
    }

    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn attributes(&self) -> impl Iterator<Item = (&str, &str)> {
        self.attributes.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn attribute_count(&self) -> usize {
        self.attributes.len()
    }

    pub fn children(&self) -> &[ConfigNode] {
        &self.children
    }

    pub(crate) fn child_mut(&mut self, index: usize) -> Option<&mut ConfigNode> {
        self.children.get_mut(index)
    }

    pub fn is_empty(&self) -> bool {
        self.attributes.is_empty() && self.children.is_empty()
    }

    /// Number of nodes in this subtree, including `self`
    pub fn node_count(&self) -> usize {
        1 + self.children.iter().map(ConfigNode::node_count).sum::<usize>()
    }

    /// Longest root-to-leaf path, a lone node has depth 1
    pub fn depth(&self) -> usize {
        1 + self.children.iter().map(ConfigNode::depth).max().unwrap_or(0)
    }
}

// A ConfigNode accepts anything: this is what lets a host hand a captured
// tree out as a dynamic configurator and record nested replays verbatim.
impl ReplayTarget for ConfigNode {
    fn set_attribute(&mut self, name: &str, value: &str) -> Result<(), ReplayRejection> {
        ConfigNode::set_attribute(self, name, value);
        Ok(())
    }

    fn create_child(&mut self, name: &str) -> Result<Box<dyn ReplayTarget>, ReplayRejection> {
        Ok(Box::new(ConfigNode::new(name)))
    }

    fn accept_child(
        &mut self,
        name: &str,
        child: Box<dyn ReplayTarget>,
    ) -> Result<(), ReplayRejection> {
        let mut node = downcast_child::<ConfigNode>(name, child)?;
        node.name = name.to_string();
        self.children.push(*node);
        Ok(())
    }
}
