//! Visitor over the scenario tree.
//!
//! Every method defaults to visiting the node's children, so a visitor only
//! overrides the variants it cares about.

use std::sync::Arc;

use crate::model::node::{
    BehaviorNode, CapabilityNode, GroupNode, MindPlaceNode, PhaseNode, ScenariosNode,
};

pub trait NodeVisitor {
    fn visit_model(&mut self, node: &Arc<ScenariosNode>, _model: &GroupNode) {
        walk_children(self, node);
    }

    fn visit_directory(&mut self, node: &Arc<ScenariosNode>, _directory: &GroupNode) {
        walk_children(self, node);
    }

    fn visit_curriculum(&mut self, node: &Arc<ScenariosNode>, _curriculum: &PhaseNode) {
        walk_children(self, node);
    }

    fn visit_phase(&mut self, node: &Arc<ScenariosNode>, _phase: &PhaseNode) {
        walk_children(self, node);
    }

    fn visit_capability(&mut self, node: &Arc<ScenariosNode>, _capability: &CapabilityNode) {
        walk_children(self, node);
    }

    fn visit_behavior(&mut self, _node: &Arc<ScenariosNode>, _behavior: &BehaviorNode) {}

    fn visit_mind_place(&mut self, _node: &Arc<ScenariosNode>, _place: &MindPlaceNode) {}
}

/// Visit every child of `node` in order.
pub fn walk_children<V: NodeVisitor + ?Sized>(visitor: &mut V, node: &Arc<ScenariosNode>) {
    for child in node.children() {
        child.accept(visitor);
    }
}

/// Collects curriculum nodes. Does not descend into curricula.
#[derive(Debug, Default)]
pub struct CurriculumCollector {
    pub curricula: Vec<Arc<ScenariosNode>>,
}

impl NodeVisitor for CurriculumCollector {
    fn visit_curriculum(&mut self, node: &Arc<ScenariosNode>, _curriculum: &PhaseNode) {
        self.curricula.push(Arc::clone(node));
    }
}

/// Collects capability nodes with a given name, wherever they live.
#[derive(Debug)]
pub struct CapabilityCollector<'a> {
    pub name: &'a str,
    pub found: Vec<Arc<ScenariosNode>>,
}

impl<'a> CapabilityCollector<'a> {
    pub fn new(name: &'a str) -> Self {
        Self {
            name,
            found: Vec::new(),
        }
    }
}

impl NodeVisitor for CapabilityCollector<'_> {
    fn visit_curriculum(&mut self, _node: &Arc<ScenariosNode>, _curriculum: &PhaseNode) {}

    fn visit_capability(&mut self, node: &Arc<ScenariosNode>, capability: &CapabilityNode) {
        if capability.name == self.name {
            self.found.push(Arc::clone(node));
        }
    }
}
