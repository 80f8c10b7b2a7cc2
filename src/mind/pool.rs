//! Per-run cache of (brain, mind) pairs.
//!
//! The pool holds at most one brain and one mind per mind kind. Pairs are
//! created on first request (new brain, then any saved state loaded into
//! it) and kept until the pool is dropped. Saves walk the held brains one
//! after another; they are not transactional across kinds.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use tracing::{debug, info, warn};

use crate::error::{Result, SyllabusError};
use crate::mind::MindKind;
use crate::model::Model;

/// Type-erased constructor for one mind kind.
pub trait MindFactory: Send + Sync {
    fn kind_id(&self) -> TypeId;
    fn name(&self) -> &str;
    fn instantiate(&self) -> Result<Box<dyn HeldMind>>;
}

/// A constructed (brain, mind) pair as stored in the pool.
pub trait HeldMind: Send + Sync {
    fn name(&self) -> &str;
    fn save(&self) -> Result<()>;
    fn mind(&self) -> &(dyn Any + Send + Sync);
}

/// `MindFactory` for a concrete `MindKind`.
pub struct KindFactory<K: MindKind>(pub Arc<K>);

impl<K: MindKind> MindFactory for KindFactory<K> {
    fn kind_id(&self) -> TypeId {
        TypeId::of::<K>()
    }

    fn name(&self) -> &str {
        self.0.name()
    }

    fn instantiate(&self) -> Result<Box<dyn HeldMind>> {
        let brain = self.0.make_new_brain()?;
        self.0.load_saved_brain(&brain)?;
        let brain = Arc::new(brain);
        let mind = self.0.make_new_mind(Arc::clone(&brain));
        Ok(Box::new(Held {
            kind: Arc::clone(&self.0),
            brain,
            mind,
        }))
    }
}

struct Held<K: MindKind> {
    kind: Arc<K>,
    brain: Arc<K::Brain>,
    mind: K::Mind,
}

impl<K: MindKind> HeldMind for Held<K> {
    fn name(&self) -> &str {
        self.kind.name()
    }

    fn save(&self) -> Result<()> {
        self.kind.save_brain(&self.brain)
    }

    fn mind(&self) -> &(dyn Any + Send + Sync) {
        &self.mind
    }
}

/// Shared handle to the mind pool of one training run.
#[derive(Clone, Default)]
pub struct MindPool {
    inner: Arc<PoolInner>,
}

#[derive(Default)]
struct PoolInner {
    factories: RwLock<HashMap<TypeId, Arc<dyn MindFactory>>>,
    /// Held pairs in construction order, so saves are deterministic.
    held: Mutex<Vec<(TypeId, Box<dyn HeldMind>)>>,
}

impl std::fmt::Debug for MindPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MindPool")
            .field("held", &self.held_names())
            .finish()
    }
}

impl MindPool {
    /// Create an empty pool with no registered kinds.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a pool with every mind kind declared in `model`.
    pub fn from_model(model: &Model) -> Self {
        let pool = Self::new();
        for factory in model.mind_factories() {
            pool.register_factory(factory);
        }
        pool
    }

    /// Register a mind kind. A second registration of the same kind
    /// replaces the first.
    pub fn register<K: MindKind>(&self, kind: K) -> &Self {
        self.register_factory(Arc::new(KindFactory(Arc::new(kind))));
        self
    }

    pub(crate) fn register_factory(&self, factory: Arc<dyn MindFactory>) {
        let mut factories = self
            .inner
            .factories
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        if let Some(previous) = factories.insert(factory.kind_id(), factory) {
            warn!(mind = previous.name(), "Mind kind registered twice, replacing");
        }
    }

    /// Get the mind of kind `K`, constructing its brain on first request.
    pub fn mind<K: MindKind>(&self) -> Result<K::Mind> {
        let id = TypeId::of::<K>();
        let mut held = self.inner.held.lock().unwrap_or_else(PoisonError::into_inner);

        if let Some((_, entry)) = held.iter().find(|(held_id, _)| *held_id == id) {
            return downcast::<K>(entry.as_ref());
        }

        let factory = self.factory(id).ok_or_else(|| {
            SyllabusError::brain(format!(
                "no mind registered for {}",
                std::any::type_name::<K>()
            ))
        })?;

        info!(mind = factory.name(), "Constructing brain");
        let entry = factory.instantiate()?;
        let mind = downcast::<K>(entry.as_ref())?;
        held.push((id, entry));
        Ok(mind)
    }

    fn factory(&self, id: TypeId) -> Option<Arc<dyn MindFactory>> {
        self.inner
            .factories
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&id)
            .cloned()
    }

    /// Save every held brain, in construction order.
    ///
    /// A failing save does not stop the others; the first error is returned
    /// after all brains were attempted. Returns the number saved.
    pub fn save_all(&self) -> Result<usize> {
        let held = self.inner.held.lock().unwrap_or_else(PoisonError::into_inner);
        let mut saved = 0;
        let mut first_error = None;

        for (_, entry) in held.iter() {
            match entry.save() {
                Ok(()) => {
                    debug!(mind = entry.name(), "Saved brain");
                    saved += 1;
                }
                Err(err) => {
                    warn!(mind = entry.name(), "Brain save failed: {}", err);
                    first_error.get_or_insert(err);
                }
            }
        }

        match first_error {
            Some(err) => Err(err),
            None => Ok(saved),
        }
    }

    /// Names of the kinds whose brains are currently held.
    pub fn held_names(&self) -> Vec<String> {
        self.inner
            .held
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(_, entry)| entry.name().to_string())
            .collect()
    }

    pub fn is_registered<K: MindKind>(&self) -> bool {
        self.factory(TypeId::of::<K>()).is_some()
    }
}

fn downcast<K: MindKind>(entry: &dyn HeldMind) -> Result<K::Mind> {
    entry
        .mind()
        .downcast_ref::<K::Mind>()
        .cloned()
        .ok_or_else(|| {
            SyllabusError::brain(format!(
                "held mind '{}' has the wrong type",
                entry.name()
            ))
        })
}
