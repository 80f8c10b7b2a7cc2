//! Resolution of phase includes to behavior nodes.

use std::collections::HashSet;
use std::sync::Arc;

use tracing::warn;

use crate::model::node::{PhaseContent, ScenariosNode};
use crate::model::visitor::CapabilityCollector;

/// Resolves the includes of a leaf phase.
pub trait Finder: Send + Sync {
    /// Capability or behavior nodes included by `phase`. Empty for composite
    /// phases and for includes that match nothing.
    fn find(&self, phase: &Arc<ScenariosNode>) -> Vec<Arc<ScenariosNode>>;
}

/// Finder that searches the whole model by capability name.
#[derive(Debug, Clone)]
pub struct TreeFinder {
    root: Arc<ScenariosNode>,
}

impl TreeFinder {
    pub fn new(root: Arc<ScenariosNode>) -> Self {
        Self { root }
    }
}

impl Finder for TreeFinder {
    fn find(&self, phase: &Arc<ScenariosNode>) -> Vec<Arc<ScenariosNode>> {
        let Some(PhaseContent::Includes(includes)) = phase.as_phase().map(|p| &p.content) else {
            return Vec::new();
        };

        let mut found = Vec::new();
        for include in includes {
            let mut collector = CapabilityCollector::new(&include.capability);
            self.root.accept(&mut collector);

            if collector.found.is_empty() {
                warn!(
                    phase = phase.name(),
                    capability = include.capability.as_str(),
                    "Include matches no capability"
                );
                continue;
            }

            for capability in collector.found {
                if include.behaviors.is_empty() {
                    found.push(capability);
                    continue;
                }
                for name in &include.behaviors {
                    match capability.children().iter().find(|b| b.name() == name) {
                        Some(behavior) => found.push(Arc::clone(behavior)),
                        None => warn!(
                            phase = phase.name(),
                            capability = include.capability.as_str(),
                            behavior = name.as_str(),
                            "Included behavior not found"
                        ),
                    }
                }
            }
        }
        found
    }
}

/// Expand capabilities into their behaviors, dropping duplicates while
/// keeping first-seen order.
pub fn expand_behaviors(nodes: Vec<Arc<ScenariosNode>>) -> Vec<Arc<ScenariosNode>> {
    let mut seen = HashSet::new();
    let mut behaviors = Vec::new();

    for node in nodes {
        let expanded: Vec<Arc<ScenariosNode>> = match &*node {
            ScenariosNode::Behavior(_) => vec![Arc::clone(&node)],
            ScenariosNode::Capability(capability) => capability.behaviors.clone(),
            _ => Vec::new(),
        };
        for behavior in expanded {
            if seen.insert(behavior.id()) {
                behaviors.push(behavior);
            }
        }
    }
    behaviors
}
