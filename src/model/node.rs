//! Curriculum tree nodes.
//!
//! The tree is immutable once built. Nodes are shared as `Arc<ScenariosNode>`
//! and identified by their `NodeId`, never by name: the same name may appear
//! in different directories.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::core::runner::BehaviorInvoker;
use crate::mind::pool::MindFactory;
use crate::model::metadata::MetadataOverride;
use crate::model::visitor::NodeVisitor;

/// Identity of a node within one model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(pub u64);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Node of the discovered scenario tree.
#[derive(Debug)]
pub enum ScenariosNode {
    Model(GroupNode),
    Directory(GroupNode),
    Curriculum(PhaseNode),
    CurriculumPhase(PhaseNode),
    Capability(CapabilityNode),
    Behavior(BehaviorNode),
    MindPlace(MindPlaceNode),
}

/// Kind tag of a node, for display and filtering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    Model,
    Directory,
    Curriculum,
    CurriculumPhase,
    Capability,
    Behavior,
    MindPlace,
}

/// Root model or directory: a named, unordered group.
#[derive(Debug)]
pub struct GroupNode {
    pub id: NodeId,
    pub name: String,
    pub children: Vec<Arc<ScenariosNode>>,
}

/// Curriculum or phase.
#[derive(Debug)]
pub struct PhaseNode {
    pub id: NodeId,
    pub name: String,
    pub overrides: MetadataOverride,
    pub content: PhaseContent,
}

/// What a phase trains: ordered sub-phases, or included behaviors.
#[derive(Debug)]
pub enum PhaseContent {
    Phases(Vec<Arc<ScenariosNode>>),
    Includes(Vec<Include>),
}

/// Reference from a phase to a capability, optionally narrowed to some of
/// its behaviors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Include {
    pub capability: String,
    /// Behavior names to include; empty means all of them.
    pub behaviors: Vec<String>,
}

impl Include {
    pub fn capability(name: impl Into<String>) -> Self {
        Self {
            capability: name.into(),
            behaviors: Vec::new(),
        }
    }

    pub fn behaviors<I, S>(capability: impl Into<String>, behaviors: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            capability: capability.into(),
            behaviors: behaviors.into_iter().map(Into::into).collect(),
        }
    }

    pub fn wants(&self, behavior: &str) -> bool {
        self.behaviors.is_empty() || self.behaviors.iter().any(|b| b == behavior)
    }
}

/// A group of behaviors sharing one capability type.
#[derive(Debug)]
pub struct CapabilityNode {
    pub id: NodeId,
    pub name: String,
    pub behaviors: Vec<Arc<ScenariosNode>>,
}

/// One runnable scenario.
pub struct BehaviorNode {
    pub id: NodeId,
    pub name: String,
    pub capability: String,
    pub invoker: Arc<dyn BehaviorInvoker>,
}

impl fmt::Debug for BehaviorNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BehaviorNode")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("capability", &self.capability)
            .finish_non_exhaustive()
    }
}

/// Declaration of a mind kind available to the pool.
pub struct MindPlaceNode {
    pub id: NodeId,
    pub name: String,
    pub factory: Arc<dyn MindFactory>,
}

impl fmt::Debug for MindPlaceNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MindPlaceNode")
            .field("id", &self.id)
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

impl ScenariosNode {
    pub fn id(&self) -> NodeId {
        match self {
            Self::Model(n) | Self::Directory(n) => n.id,
            Self::Curriculum(n) | Self::CurriculumPhase(n) => n.id,
            Self::Capability(n) => n.id,
            Self::Behavior(n) => n.id,
            Self::MindPlace(n) => n.id,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Self::Model(n) | Self::Directory(n) => &n.name,
            Self::Curriculum(n) | Self::CurriculumPhase(n) => &n.name,
            Self::Capability(n) => &n.name,
            Self::Behavior(n) => &n.name,
            Self::MindPlace(n) => &n.name,
        }
    }

    pub fn kind(&self) -> NodeKind {
        match self {
            Self::Model(_) => NodeKind::Model,
            Self::Directory(_) => NodeKind::Directory,
            Self::Curriculum(_) => NodeKind::Curriculum,
            Self::CurriculumPhase(_) => NodeKind::CurriculumPhase,
            Self::Capability(_) => NodeKind::Capability,
            Self::Behavior(_) => NodeKind::Behavior,
            Self::MindPlace(_) => NodeKind::MindPlace,
        }
    }

    /// Tree children. Includes of a leaf phase are references, not children.
    pub fn children(&self) -> &[Arc<ScenariosNode>] {
        match self {
            Self::Model(n) | Self::Directory(n) => &n.children,
            Self::Curriculum(n) | Self::CurriculumPhase(n) => match &n.content {
                PhaseContent::Phases(phases) => phases,
                PhaseContent::Includes(_) => &[],
            },
            Self::Capability(n) => &n.behaviors,
            Self::Behavior(_) | Self::MindPlace(_) => &[],
        }
    }

    /// Phase payload of a curriculum or phase node.
    pub fn as_phase(&self) -> Option<&PhaseNode> {
        match self {
            Self::Curriculum(n) | Self::CurriculumPhase(n) => Some(n),
            _ => None,
        }
    }

    pub fn as_behavior(&self) -> Option<&BehaviorNode> {
        match self {
            Self::Behavior(n) => Some(n),
            _ => None,
        }
    }

    /// Dispatch to the visitor method for this node's variant.
    pub fn accept<V: NodeVisitor + ?Sized>(self: &Arc<Self>, visitor: &mut V) {
        match &**self {
            Self::Model(n) => visitor.visit_model(self, n),
            Self::Directory(n) => visitor.visit_directory(self, n),
            Self::Curriculum(n) => visitor.visit_curriculum(self, n),
            Self::CurriculumPhase(n) => visitor.visit_phase(self, n),
            Self::Capability(n) => visitor.visit_capability(self, n),
            Self::Behavior(n) => visitor.visit_behavior(self, n),
            Self::MindPlace(n) => visitor.visit_mind_place(self, n),
        }
    }

    /// Pre-order walk over this node and its descendants.
    pub fn walk(self: &Arc<Self>, f: &mut dyn FnMut(&Arc<ScenariosNode>)) {
        f(self);
        for child in self.children() {
            child.walk(f);
        }
    }
}

impl fmt::Display for ScenariosNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Behavior(n) => write!(f, "{}.{}", n.capability, n.name),
            other => f.write_str(other.name()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_include_wants() {
        let all = Include::capability("Greeter");
        assert!(all.wants("hello"));
        assert!(all.wants("goodbye"));

        let some = Include::behaviors("Greeter", ["hello"]);
        assert!(some.wants("hello"));
        assert!(!some.wants("goodbye"));
    }

    #[test]
    fn test_group_children_and_kind() {
        let leaf = Arc::new(ScenariosNode::Directory(GroupNode {
            id: NodeId(1),
            name: "inner".to_string(),
            children: Vec::new(),
        }));
        let root = Arc::new(ScenariosNode::Model(GroupNode {
            id: NodeId(0),
            name: "model".to_string(),
            children: vec![Arc::clone(&leaf)],
        }));

        assert_eq!(root.kind(), NodeKind::Model);
        assert_eq!(root.children().len(), 1);
        assert_eq!(root.children()[0].id(), NodeId(1));
        assert!(leaf.children().is_empty());

        let mut seen = Vec::new();
        root.walk(&mut |node| seen.push(node.id()));
        assert_eq!(seen, vec![NodeId(0), NodeId(1)]);
    }

    #[test]
    fn test_leaf_phase_has_no_tree_children() {
        let phase = ScenariosNode::CurriculumPhase(PhaseNode {
            id: NodeId(3),
            name: "warmup".to_string(),
            overrides: MetadataOverride::default(),
            content: PhaseContent::Includes(vec![Include::capability("Greeter")]),
        });
        assert!(phase.children().is_empty());
        assert!(phase.as_phase().is_some());
        assert_eq!(phase.to_string(), "warmup");
    }
}
