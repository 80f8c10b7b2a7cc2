//! Per-subtree training state.
//!
//! A scheme owns the attempt and since-last-save counters and the
//! convergence trackers of one subtree invocation. Deriving a child scheme
//! resolves the child's metadata and starts fresh counters and trackers, so
//! sibling phases never share convergence history.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Mutex, PoisonError};

use crate::core::counter::Counter;
use crate::core::summarizer::Summarizer;
use crate::core::tracker::ConvergenceTracker;
use crate::model::metadata::{MetadataOverride, TrainingMetadata};
use crate::model::node::NodeId;

pub struct TrainingDataScheme {
    metadata: TrainingMetadata,
    attempts: Counter,
    since_last_save: Counter,
    trackers: Mutex<HashMap<NodeId, ConvergenceTracker>>,
}

impl TrainingDataScheme {
    pub fn new(metadata: TrainingMetadata) -> Self {
        Self {
            metadata,
            attempts: Counter::new(),
            since_last_save: Counter::new(),
            trackers: Mutex::new(HashMap::new()),
        }
    }

    pub fn metadata(&self) -> &TrainingMetadata {
        &self.metadata
    }

    pub fn summarizer(&self) -> Summarizer {
        self.metadata.summarizer
    }

    pub fn attempts(&self) -> &Counter {
        &self.attempts
    }

    pub fn since_last_save(&self) -> &Counter {
        &self.since_last_save
    }

    /// Tracker for `node`, created on first access with this scheme's
    /// sample size and summarizer.
    pub fn tracker(&self, node: NodeId) -> ConvergenceTracker {
        let mut trackers = self.trackers.lock().unwrap_or_else(PoisonError::into_inner);
        trackers
            .entry(node)
            .or_insert_with(|| {
                ConvergenceTracker::new(self.metadata.sample_size, self.metadata.summarizer)
            })
            .clone()
    }

    pub fn tracker_count(&self) -> usize {
        self.trackers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Child scheme with `overrides` applied and independent state.
    pub fn derive(&self, overrides: &MetadataOverride) -> Self {
        Self::new(self.metadata.apply(overrides))
    }
}

impl fmt::Debug for TrainingDataScheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TrainingDataScheme")
            .field("metadata", &self.metadata)
            .field("attempts", &self.attempts.get())
            .field("since_last_save", &self.since_last_save.get())
            .field("trackers", &self.tracker_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tracker_is_created_once_per_node() {
        let scheme = TrainingDataScheme::new(TrainingMetadata::default());
        let first = scheme.tracker(NodeId(3));
        let second = scheme.tracker(NodeId(3));
        let other = scheme.tracker(NodeId(4));

        assert!(first.same_as(&second));
        assert!(!first.same_as(&other));
        assert_eq!(first.sample_size(), 100);
        assert_eq!(scheme.tracker_count(), 2);
    }

    #[test]
    fn test_derived_scheme_inherits_metadata() {
        let root = TrainingDataScheme::new(TrainingMetadata::default());
        let child = root.derive(&MetadataOverride {
            sample_size: Some(10),
            ..Default::default()
        });
        let grandchild = child.derive(&MetadataOverride {
            maximum_attempts: Some(20),
            ..Default::default()
        });

        assert_eq!(grandchild.metadata().sample_size, 10);
        assert_eq!(grandchild.metadata().maximum_attempts, 20);
        assert_eq!(grandchild.metadata().success_fraction, 0.9);
        assert_eq!(root.metadata().sample_size, 100);
    }

    #[test]
    fn test_derived_scheme_has_independent_state() {
        let root = TrainingDataScheme::new(TrainingMetadata::default());
        root.attempts().increment();
        root.tracker(NodeId(1)).record_result(1.0);

        let child = root.derive(&MetadataOverride::default());
        assert_eq!(child.attempts().get(), 0);
        assert!(child.tracker(NodeId(1)).is_empty());
        assert!(!child.attempts().same_as(root.attempts()));
        assert!(!child.since_last_save().same_as(root.since_last_save()));
    }

    #[test]
    fn test_trackers_use_resolved_summarizer() {
        let root = TrainingDataScheme::new(TrainingMetadata::default());
        let child = root.derive(&MetadataOverride {
            summarizer: Some(Summarizer::soft_or(1.0)),
            ..Default::default()
        });
        assert_eq!(root.tracker(NodeId(1)).summarizer(), Summarizer::Mean);
        assert_eq!(child.summarizer(), Summarizer::soft_or(1.0));
        assert_eq!(child.tracker(NodeId(1)).summarizer(), Summarizer::soft_or(1.0));
    }
}
