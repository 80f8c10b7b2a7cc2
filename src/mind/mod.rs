//! Minds and the brains behind them.
//!
//! A brain is the trainable numeric backend; a mind is the typed facade
//! capabilities call through. The engine never looks inside either: it only
//! asks a `MindKind` to create, load and save them.

pub mod pool;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::error::Result;

pub use pool::MindPool;

/// One kind of mind, together with the backend operations for its brain.
///
/// Implementations are registered on the model (`ModelBuilder::mind`) and
/// looked up by type when a capability asks the pool for a mind.
pub trait MindKind: Send + Sync + 'static {
    /// Trainable backend. Shared between the mind and the pool, so it must
    /// handle its own interior mutability.
    type Brain: Send + Sync + 'static;
    /// Facade handed to capabilities. Cloned out of the pool per request.
    type Mind: Clone + Send + Sync + 'static;

    /// Stable name of this kind, used in logs and brain file names.
    fn name(&self) -> &str;

    /// Description of the brain architecture, used in brain file names.
    fn architecture(&self) -> String {
        String::new()
    }

    fn make_new_brain(&self) -> Result<Self::Brain>;

    fn make_new_mind(&self, brain: Arc<Self::Brain>) -> Self::Mind;

    /// Restore previously saved state into a fresh brain. A missing save is
    /// not an error.
    fn load_saved_brain(&self, brain: &Self::Brain) -> Result<()>;

    fn save_brain(&self, brain: &Self::Brain) -> Result<()>;
}

/// Deterministic brain file name for a mind kind and architecture.
///
/// Characters outside `[A-Za-z0-9_-]` in the architecture collapse to `_`.
pub fn brain_file_name(name: &str, architecture: &str) -> String {
    let slug: String = architecture
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();
    if slug.is_empty() {
        format!("{name}.brain")
    } else {
        format!("{name}.{slug}.brain")
    }
}

/// Path of the brain file for `kind` inside `dir`.
pub fn brain_path<K: MindKind + ?Sized>(dir: &Path, kind: &K) -> PathBuf {
    dir.join(brain_file_name(kind.name(), &kind.architecture()))
}
