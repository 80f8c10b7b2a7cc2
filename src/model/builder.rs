//! Declarative registration of minds, capabilities and curricula.
//!
//! Curricula are declared up front with builders and frozen into a `Model`:
//!
//! ```ignore
//! let model = Model::builder("arithmetic")
//!     .mind(AdderKind::new(syllabus::cli::host::brain_dir()))
//!     .capability(
//!         Capability::new("Adding", |minds: &MindPool| {
//!             Ok(Adding::new(minds.mind::<AdderKind>()?))
//!         })
//!             .behavior("small_sums", |adding: Adding, _console: Console| async move {
//!                 Grade::check(adding.add(2, 3) == 5)
//!             }),
//!     )
//!     .curriculum(
//!         Curriculum::new("basics")
//!             .maximum_attempts(500)
//!             .phase(Phase::new("sums").standard(0.95, 50).include("Adding")),
//!     )
//!     .build()?;
//! ```

use std::any::TypeId;
use std::collections::HashSet;
use std::future::Future;
use std::sync::Arc;

use crate::core::result::IntoOutcome;
use crate::core::summarizer::Summarizer;
use crate::core::runner::{
    BehaviorFuture, BehaviorInvoker, BehaviorMethod, CapabilityFactory, Console, TypedBehavior,
};
use crate::error::{Result, SyllabusError};
use crate::mind::pool::{KindFactory, MindFactory};
use crate::mind::{MindKind, MindPool};
use crate::model::metadata::{ConvergenceStandard, MetadataOverride};
use crate::model::node::{
    BehaviorNode, CapabilityNode, GroupNode, Include, MindPlaceNode, NodeId, PhaseContent,
    PhaseNode, ScenariosNode,
};
use crate::model::visitor::{CapabilityCollector, CurriculumCollector, NodeVisitor};

/// A frozen scenario tree.
#[derive(Debug, Clone)]
pub struct Model {
    root: Arc<ScenariosNode>,
}

impl Model {
    pub fn builder(name: impl Into<String>) -> ModelBuilder {
        ModelBuilder {
            root: Directory::new(name),
        }
    }

    pub fn root(&self) -> &Arc<ScenariosNode> {
        &self.root
    }

    pub fn name(&self) -> &str {
        self.root.name()
    }

    /// All curricula, in declaration order (directories depth-first).
    pub fn curricula(&self) -> Vec<Arc<ScenariosNode>> {
        let mut collector = CurriculumCollector::default();
        self.root.accept(&mut collector);
        collector.curricula
    }

    pub fn curriculum(&self, name: &str) -> Option<Arc<ScenariosNode>> {
        self.curricula().into_iter().find(|c| c.name() == name)
    }

    /// Capabilities with the given name anywhere in the tree.
    pub fn capabilities_named(&self, name: &str) -> Vec<Arc<ScenariosNode>> {
        let mut collector = CapabilityCollector::new(name);
        self.root.accept(&mut collector);
        collector.found
    }

    pub fn find_behavior(&self, capability: &str, behavior: &str) -> Option<Arc<ScenariosNode>> {
        self.capabilities_named(capability)
            .iter()
            .flat_map(|c| c.children().iter())
            .find(|b| b.name() == behavior)
            .cloned()
    }

    pub fn find(&self, id: NodeId) -> Option<Arc<ScenariosNode>> {
        let mut found = None;
        self.root.walk(&mut |node| {
            if found.is_none() && node.id() == id {
                found = Some(Arc::clone(node));
            }
        });
        found
    }

    /// Factories of every declared mind kind.
    pub fn mind_factories(&self) -> Vec<Arc<dyn MindFactory>> {
        let mut collector = MindPlaceCollector::default();
        self.root.accept(&mut collector);
        collector.factories
    }
}

#[derive(Default)]
struct MindPlaceCollector {
    factories: Vec<Arc<dyn MindFactory>>,
}

impl NodeVisitor for MindPlaceCollector {
    fn visit_mind_place(&mut self, _node: &Arc<ScenariosNode>, place: &MindPlaceNode) {
        self.factories.push(Arc::clone(&place.factory));
    }
}

/// Builder for a `Model`.
pub struct ModelBuilder {
    root: Directory,
}

impl ModelBuilder {
    pub fn mind<K: MindKind>(mut self, kind: K) -> Self {
        self.root = self.root.mind(kind);
        self
    }

    pub fn capability(mut self, capability: impl Into<CapabilitySpec>) -> Self {
        self.root = self.root.capability(capability);
        self
    }

    pub fn directory(mut self, directory: Directory) -> Self {
        self.root = self.root.directory(directory);
        self
    }

    pub fn curriculum(mut self, curriculum: Curriculum) -> Self {
        self.root = self.root.curriculum(curriculum);
        self
    }

    /// Validate the declarations and freeze them into a model.
    pub fn build(self) -> Result<Model> {
        let mut ids = IdAllocator::default();
        let mut minds = HashSet::new();
        let id = ids.next();
        let children = build_items(self.root.items, &self.root.name, &mut ids, &mut minds)?;
        Ok(Model {
            root: Arc::new(ScenariosNode::Model(GroupNode {
                id,
                name: self.root.name,
                children,
            })),
        })
    }
}

enum Item {
    Mind(MindSpec),
    Capability(CapabilitySpec),
    Directory(Directory),
    Curriculum(Curriculum),
}

struct MindSpec {
    name: String,
    factory: Arc<dyn MindFactory>,
}

/// Named grouping of declarations.
pub struct Directory {
    name: String,
    items: Vec<Item>,
}

impl Directory {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            items: Vec::new(),
        }
    }

    pub fn mind<K: MindKind>(mut self, kind: K) -> Self {
        self.items.push(Item::Mind(MindSpec {
            name: kind.name().to_string(),
            factory: Arc::new(KindFactory(Arc::new(kind))),
        }));
        self
    }

    pub fn capability(mut self, capability: impl Into<CapabilitySpec>) -> Self {
        self.items.push(Item::Capability(capability.into()));
        self
    }

    pub fn directory(mut self, directory: Directory) -> Self {
        self.items.push(Item::Directory(directory));
        self
    }

    pub fn curriculum(mut self, curriculum: Curriculum) -> Self {
        self.items.push(Item::Curriculum(curriculum));
        self
    }
}

/// Capability declaration for capability type `C`.
pub struct Capability<C> {
    name: String,
    factory: CapabilityFactory<C>,
    behaviors: Vec<(String, BehaviorMethod<C>)>,
}

impl<C: Send + 'static> Capability<C> {
    /// Declare a capability. `factory` builds one instance per behavior run,
    /// pulling the minds it needs from the pool.
    pub fn new<F>(name: impl Into<String>, factory: F) -> Self
    where
        F: Fn(&MindPool) -> Result<C> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            factory: Arc::new(factory),
            behaviors: Vec::new(),
        }
    }

    /// Declare a behavior. The method receives the fresh capability and the
    /// run's console, and may return `()`, a `Grade`, a `Transcript`, or a
    /// `Result` of those with a `BehaviorError`.
    pub fn behavior<F, Fut, R>(mut self, name: impl Into<String>, method: F) -> Self
    where
        F: Fn(C, Console) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = R> + Send + 'static,
        R: IntoOutcome + 'static,
    {
        let method: BehaviorMethod<C> =
            Arc::new(move |capability: C, console: Console| -> BehaviorFuture {
                let run = method(capability, console);
                Box::pin(async move { run.await.into_outcome() })
            });
        self.behaviors.push((name.into(), method));
        self
    }
}

/// Type-erased capability declaration.
pub struct CapabilitySpec {
    name: String,
    behaviors: Vec<(String, Arc<dyn BehaviorInvoker>)>,
}

impl<C: Send + 'static> From<Capability<C>> for CapabilitySpec {
    fn from(capability: Capability<C>) -> Self {
        let factory = capability.factory;
        let behaviors = capability
            .behaviors
            .into_iter()
            .map(|(name, method)| {
                let invoker: Arc<dyn BehaviorInvoker> =
                    Arc::new(TypedBehavior::new(Arc::clone(&factory), method));
                (name, invoker)
            })
            .collect();
        Self {
            name: capability.name,
            behaviors,
        }
    }
}

/// Phase declaration: either sub-phases or includes, never both.
#[derive(Debug, Clone, Default)]
pub struct Phase {
    name: String,
    overrides: MetadataOverride,
    phases: Vec<Phase>,
    includes: Vec<Include>,
}

/// A curriculum is declared exactly like a phase; being a direct item of
/// the model or a directory is what makes it a curriculum.
pub type Curriculum = Phase;

impl Phase {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Succeed once convergence over the last `of` runs reaches `fraction`.
    pub fn standard(mut self, fraction: f64, of: usize) -> Self {
        self.overrides
            .set_standard(ConvergenceStandard { fraction, of });
        self
    }

    pub fn success_fraction(mut self, fraction: f64) -> Self {
        self.overrides.success_fraction = Some(fraction);
        self
    }

    pub fn sample_size(mut self, size: usize) -> Self {
        self.overrides.sample_size = Some(size);
        self
    }

    pub fn maximum_attempts(mut self, attempts: u64) -> Self {
        self.overrides.maximum_attempts = Some(attempts);
        self
    }

    pub fn dynamic_weight(mut self, minimum: f64, maximum: f64) -> Self {
        self.overrides.minimum_dynamic_weight = Some(minimum);
        self.overrides.maximum_dynamic_weight = Some(maximum);
        self
    }

    /// Reduce this phase's convergence windows with `summarizer` instead
    /// of the inherited one.
    pub fn summarizer(mut self, summarizer: Summarizer) -> Self {
        self.overrides.summarizer = Some(summarizer);
        self
    }

    pub fn phase(mut self, phase: Phase) -> Self {
        self.phases.push(phase);
        self
    }

    /// Include every behavior of a capability.
    pub fn include(mut self, capability: impl Into<String>) -> Self {
        self.includes.push(Include::capability(capability));
        self
    }

    /// Include only the named behaviors of a capability.
    pub fn include_behaviors<I, S>(mut self, capability: impl Into<String>, behaviors: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.includes.push(Include::behaviors(capability, behaviors));
        self
    }
}

#[derive(Default)]
struct IdAllocator(u64);

impl IdAllocator {
    fn next(&mut self) -> NodeId {
        let id = NodeId(self.0);
        self.0 += 1;
        id
    }
}

fn build_items(
    items: Vec<Item>,
    owner: &str,
    ids: &mut IdAllocator,
    minds: &mut HashSet<TypeId>,
) -> Result<Vec<Arc<ScenariosNode>>> {
    let mut names = HashSet::new();
    let mut children = Vec::with_capacity(items.len());

    for item in items {
        let (kind, name) = match &item {
            Item::Mind(spec) => ("mind", spec.name.clone()),
            Item::Capability(spec) => ("capability", spec.name.clone()),
            Item::Directory(dir) => ("directory", dir.name.clone()),
            Item::Curriculum(curriculum) => ("curriculum", curriculum.name.clone()),
        };
        if !names.insert((kind, name.clone())) {
            return Err(SyllabusError::model(format!(
                "duplicate {kind} '{name}' in '{owner}'"
            )));
        }

        let node = match item {
            Item::Mind(spec) => {
                if !minds.insert(spec.factory.kind_id()) {
                    return Err(SyllabusError::model(format!(
                        "mind kind '{}' is declared more than once",
                        spec.name
                    )));
                }
                ScenariosNode::MindPlace(MindPlaceNode {
                    id: ids.next(),
                    name: spec.name,
                    factory: spec.factory,
                })
            }
            Item::Capability(spec) => build_capability(spec, ids)?,
            Item::Directory(dir) => {
                let id = ids.next();
                let children = build_items(dir.items, &dir.name, ids, minds)?;
                ScenariosNode::Directory(GroupNode {
                    id,
                    name: dir.name,
                    children,
                })
            }
            Item::Curriculum(curriculum) => {
                ScenariosNode::Curriculum(build_phase(curriculum, "curriculum", ids)?)
            }
        };
        children.push(Arc::new(node));
    }

    Ok(children)
}

fn build_capability(spec: CapabilitySpec, ids: &mut IdAllocator) -> Result<ScenariosNode> {
    let id = ids.next();
    let mut names = HashSet::new();
    let mut behaviors = Vec::with_capacity(spec.behaviors.len());

    for (name, invoker) in spec.behaviors {
        if !names.insert(name.clone()) {
            return Err(SyllabusError::model(format!(
                "duplicate behavior '{}' in capability '{}'",
                name, spec.name
            )));
        }
        behaviors.push(Arc::new(ScenariosNode::Behavior(BehaviorNode {
            id: ids.next(),
            name,
            capability: spec.name.clone(),
            invoker,
        })));
    }

    Ok(ScenariosNode::Capability(CapabilityNode {
        id,
        name: spec.name,
        behaviors,
    }))
}

fn build_phase(phase: Phase, role: &str, ids: &mut IdAllocator) -> Result<PhaseNode> {
    let owner = format!("{role} '{}'", phase.name);
    phase.overrides.validate(&owner)?;

    if !phase.phases.is_empty() && !phase.includes.is_empty() {
        return Err(SyllabusError::model(format!(
            "{owner} mixes sub-phases and includes"
        )));
    }

    let id = ids.next();
    let content = if phase.phases.is_empty() {
        PhaseContent::Includes(phase.includes)
    } else {
        let mut names = HashSet::new();
        let mut children = Vec::with_capacity(phase.phases.len());
        for child in phase.phases {
            if !names.insert(child.name.clone()) {
                return Err(SyllabusError::model(format!(
                    "duplicate phase '{}' in {owner}",
                    child.name
                )));
            }
            children.push(Arc::new(ScenariosNode::CurriculumPhase(build_phase(
                child, "phase", ids,
            )?)));
        }
        PhaseContent::Phases(children)
    };

    Ok(PhaseNode {
        id,
        name: phase.name,
        overrides: phase.overrides,
        content,
    })
}
