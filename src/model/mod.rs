//! The scenario tree: curricula, phases, capabilities, behaviors and minds.
//!
//! Trees are declared with the builders in `builder`, walked with the
//! visitor in `visitor`, and phase includes are resolved by a `Finder`.

pub mod builder;
pub mod finder;
pub mod metadata;
pub mod node;
pub mod visitor;

pub use builder::{Capability, CapabilitySpec, Curriculum, Directory, Model, ModelBuilder, Phase};
pub use finder::{expand_behaviors, Finder, TreeFinder};
pub use metadata::{ConvergenceStandard, MetadataOverride, TrainingMetadata};
pub use node::{
    BehaviorNode, CapabilityNode, GroupNode, Include, MindPlaceNode, NodeId, NodeKind,
    PhaseContent, PhaseNode, ScenariosNode,
};
pub use visitor::{walk_children, NodeVisitor};
