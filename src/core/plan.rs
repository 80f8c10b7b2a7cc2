//! Training plans: the curriculum tree turned into runnable loops.
//!
//! A leaf phase becomes one `AutomationLoop` over its included behaviors.
//! A composite phase becomes a sequence of child plans that stops at the
//! first child that fails. Every phase gets a scheme derived from its
//! parent's, so siblings never share counters or convergence history.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use tracing::{info, warn};

use crate::core::automation::AutomationLoop;
use crate::core::counter::Counter;
use crate::core::gate::Gate;
use crate::core::pass::{AutomationPass, PassEntry, PoolSaver};
use crate::core::result::RunStatus;
use crate::core::runner::BehaviorRunner;
use crate::core::scheme::TrainingDataScheme;
use crate::core::weighted::{DynamicWeightedRunnable, SharedRng};
use crate::error::{Result, SyllabusError};
use crate::mind::MindPool;
use crate::model::finder::{expand_behaviors, Finder};
use crate::model::metadata::TrainingMetadata;
use crate::model::node::{PhaseContent, PhaseNode, ScenariosNode};
use crate::report::{ReportScope, Reporter};

/// Future returned by `TrainingPlan::run`.
pub type PlanFuture<'a> = Pin<Box<dyn Future<Output = Result<RunStatus>> + Send + 'a>>;

/// Collaborators shared by every plan of one training run.
#[derive(Clone)]
pub struct PlanContext {
    pub finder: Arc<dyn Finder>,
    pub pool: MindPool,
    pub reporter: Arc<dyn Reporter>,
    pub rng: SharedRng,
    /// Loop iterations between checkpoint saves.
    pub save_every: u64,
}

pub struct TrainingPlan {
    node: Arc<ScenariosNode>,
    reporter: Arc<dyn Reporter>,
    body: PlanBody,
}

enum PlanBody {
    Loop(AutomationLoop),
    Sequence(Vec<TrainingPlan>),
}

impl TrainingPlan {
    /// Build the plan for a curriculum or phase, starting from the root
    /// metadata and applying the node's own overrides.
    pub fn build_for(
        node: &Arc<ScenariosNode>,
        root: TrainingMetadata,
        context: &PlanContext,
    ) -> Result<Self> {
        let phase = phase_of(node)?;
        let scheme = TrainingDataScheme::new(root).derive(&phase.overrides);
        Self::build(node, &scheme, context)
    }

    /// Build the plan for `node` under an already resolved scheme.
    pub fn build(
        node: &Arc<ScenariosNode>,
        scheme: &TrainingDataScheme,
        context: &PlanContext,
    ) -> Result<Self> {
        let phase = phase_of(node)?;
        scheme
            .metadata()
            .validate()
            .map_err(|err| SyllabusError::model(format!("phase '{}': {}", node.name(), err)))?;

        let body = match &phase.content {
            PhaseContent::Phases(children) => {
                let mut plans = Vec::with_capacity(children.len());
                for child in children {
                    let child_scheme = scheme.derive(&phase_of(child)?.overrides);
                    plans.push(Self::build(child, &child_scheme, context)?);
                }
                PlanBody::Sequence(plans)
            }
            PhaseContent::Includes(_) => PlanBody::Loop(build_loop(node, scheme, context)?),
        };

        Ok(Self {
            node: Arc::clone(node),
            reporter: Arc::clone(&context.reporter),
            body,
        })
    }

    pub fn node(&self) -> &Arc<ScenariosNode> {
        &self.node
    }

    /// Child plans of a composite phase; empty for a leaf.
    pub fn children(&self) -> &[TrainingPlan] {
        match &self.body {
            PlanBody::Sequence(children) => children,
            PlanBody::Loop(_) => &[],
        }
    }

    /// The loop of a leaf phase.
    pub fn automation(&self) -> Option<&AutomationLoop> {
        match &self.body {
            PlanBody::Loop(automation) => Some(automation),
            PlanBody::Sequence(_) => None,
        }
    }

    /// Run the plan. A leaf succeeds when its success gate is open after
    /// the loop; a sequence succeeds when every child does.
    pub fn run(&self) -> PlanFuture<'_> {
        Box::pin(async move {
            let _scope = ReportScope::enter(self.reporter.as_ref(), &self.node);

            let status = match &self.body {
                PlanBody::Loop(automation) => {
                    automation.run().await?;
                    if automation.succeeded() {
                        RunStatus::Success
                    } else {
                        RunStatus::Failure
                    }
                }
                PlanBody::Sequence(children) => {
                    let mut status = RunStatus::Success;
                    for child in children {
                        if child.run().await? == RunStatus::Failure {
                            warn!(
                                phase = %self.node,
                                failed = %child.node,
                                "Phase failed, skipping remaining phases"
                            );
                            status = RunStatus::Failure;
                            break;
                        }
                    }
                    status
                }
            };

            info!(phase = %self.node, status = %status, "Phase finished");
            Ok(status)
        })
    }
}

fn phase_of(node: &Arc<ScenariosNode>) -> Result<&PhaseNode> {
    node.as_phase().ok_or_else(|| {
        SyllabusError::model(format!(
            "'{}' is a {:?}, not a curriculum or phase",
            node.name(),
            node.kind()
        ))
    })
}

fn build_loop(
    node: &Arc<ScenariosNode>,
    scheme: &TrainingDataScheme,
    context: &PlanContext,
) -> Result<AutomationLoop> {
    let metadata = *scheme.metadata();
    let behaviors = expand_behaviors(context.finder.find(node));
    if behaviors.is_empty() {
        warn!(phase = %node, "Phase includes no behaviors, it succeeds without training");
    }

    let trials = Counter::new();
    let mut entries = Vec::with_capacity(behaviors.len());
    let mut success = Vec::with_capacity(behaviors.len());

    for behavior in behaviors {
        let tracker = scheme.tracker(behavior.id());
        context.reporter.watch(node, &behavior, &tracker);
        success.push(Gate::for_convergence(tracker.clone(), metadata.success_fraction));

        let runner = BehaviorRunner::new(Arc::clone(&behavior), context.pool.clone())?;
        entries.push(PassEntry {
            node: behavior,
            runnable: DynamicWeightedRunnable::new(
                runner,
                tracker,
                metadata.minimum_dynamic_weight,
                metadata.maximum_dynamic_weight,
                Arc::clone(&context.rng),
                trials.clone(),
            ),
        });
    }

    let since_last_save = scheme.since_last_save().clone();
    let pass = AutomationPass::new(
        entries,
        Arc::clone(&context.reporter),
        Gate::for_counter_and_minimum(since_last_save.clone(), context.save_every),
        Arc::new(PoolSaver::new(context.pool.clone(), since_last_save.clone())),
    );

    Ok(AutomationLoop::new(
        pass,
        scheme.attempts().clone(),
        since_last_save,
        metadata.maximum_attempts,
        Gate::all(success),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::result::BehaviorError;
    use crate::core::runner::Console;
    use crate::core::summarizer::Summarizer;
    use crate::core::weighted::shared_rng;
    use crate::mind::pool::tests::{CountingKind, CountingMind};
    use crate::model::{Capability, Curriculum, Model, Phase, TreeFinder};
    use crate::report::MemoryReporter;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Unit;

    struct Thinker {
        mind: CountingMind,
    }

    fn model() -> Model {
        model_with_saves(Arc::default())
    }

    fn model_with_saves(saves: Arc<AtomicUsize>) -> Model {
        Model::builder("plan")
            .mind(CountingKind {
                saves,
                ..Default::default()
            })
            .capability(
                Capability::new("Unit", |_minds: &MindPool| Ok(Unit))
                    .behavior("passes", |_unit: Unit, _console: Console| async {})
                    .behavior("fails", |_unit: Unit, _console: Console| async {
                        Err::<(), _>(BehaviorError::failed("never"))
                    })
                    .behavior("spare", |_unit: Unit, _console: Console| async {})
                    .behavior("crashes", |_unit: Unit, _console: Console| async {
                        Err::<(), _>(BehaviorError::fatal("out of memory"))
                    }),
            )
            .capability(
                Capability::new("Thinker", |minds: &MindPool| {
                    Ok(Thinker {
                        mind: minds.mind::<CountingKind>()?,
                    })
                })
                .behavior("stalls", |thinker: Thinker, _console: Console| async move {
                    thinker.mind.think();
                    Err::<(), _>(BehaviorError::failed("not yet"))
                }),
            )
            .capability(
                Capability::new("Coin", |minds: &MindPool| {
                    Ok(Thinker {
                        mind: minds.mind::<CountingKind>()?,
                    })
                })
                .behavior("alternates", |coin: Thinker, _console: Console| async move {
                    if coin.mind.think() % 2 == 1 {
                        Ok(())
                    } else {
                        Err(BehaviorError::failed("tails"))
                    }
                }),
            )
            .curriculum(
                Curriculum::new("mean-odds")
                    .standard(0.5, 4)
                    .maximum_attempts(8)
                    .include("Coin"),
            )
            .curriculum(
                Curriculum::new("strict-odds")
                    .standard(0.5, 4)
                    .maximum_attempts(8)
                    .summarizer(Summarizer::soft_and(1.0))
                    .include("Coin"),
            )
            .curriculum(
                Curriculum::new("fail-fast")
                    .standard(1.0, 2)
                    .maximum_attempts(4)
                    .phase(Phase::new("one").include_behaviors("Unit", ["passes"]))
                    .phase(Phase::new("two").include_behaviors("Unit", ["fails"]))
                    .phase(Phase::new("three").include_behaviors("Unit", ["spare"])),
            )
            .curriculum(
                Curriculum::new("fatal")
                    .phase(Phase::new("doomed").include_behaviors("Unit", ["crashes"])),
            )
            .curriculum(
                Curriculum::new("saving")
                    .standard(1.0, 10)
                    .maximum_attempts(250)
                    .include("Thinker"),
            )
            .curriculum(
                Curriculum::new("nested")
                    .standard(1.0, 2)
                    .maximum_attempts(5)
                    .phase(Phase::new("first").include_behaviors("Unit", ["passes"]))
                    .phase(
                        Phase::new("second")
                            .sample_size(3)
                            .include_behaviors("Unit", ["passes"]),
                    ),
            )
            .curriculum(Curriculum::new("empty").include("Missing"))
            .curriculum(
                Curriculum::new("bad-weights")
                    .dynamic_weight(0.8, 0.2)
                    .include("Unit"),
            )
            .build()
            .unwrap()
    }

    fn context(model: &Model, reporter: Arc<MemoryReporter>) -> PlanContext {
        PlanContext {
            finder: Arc::new(TreeFinder::new(Arc::clone(model.root()))),
            pool: MindPool::from_model(model),
            reporter,
            rng: shared_rng(Some(5)),
            save_every: 100,
        }
    }

    #[tokio::test]
    async fn test_nested_plan_inherits_metadata() {
        let model = model();
        let reporter = MemoryReporter::shared();
        let curriculum = model.curriculum("nested").unwrap();
        let plan = TrainingPlan::build_for(
            &curriculum,
            TrainingMetadata::default(),
            &context(&model, reporter.clone()),
        )
        .unwrap();

        assert_eq!(plan.children().len(), 2);
        assert!(plan.automation().is_none());

        let status = plan.run().await.unwrap();
        assert_eq!(status, RunStatus::Success);

        let first = plan.children()[0].automation().unwrap();
        let second = plan.children()[1].automation().unwrap();
        assert_eq!(first.attempts(), 2, "sample size 2 from the curriculum");
        assert_eq!(second.attempts(), 3, "sample size 3 from the phase");
        assert_eq!(reporter.entered(), vec!["nested", "first", "second"]);
    }

    #[tokio::test]
    async fn test_sibling_phases_have_separate_trackers() {
        let model = model();
        let reporter = MemoryReporter::shared();
        let curriculum = model.curriculum("nested").unwrap();
        let plan = TrainingPlan::build_for(
            &curriculum,
            TrainingMetadata::default(),
            &context(&model, reporter.clone()),
        )
        .unwrap();

        let first = &plan.children()[0].automation().unwrap().pass().entries()[0];
        let second = &plan.children()[1].automation().unwrap().pass().entries()[0];
        assert_eq!(first.node.id(), second.node.id());
        assert!(!first.runnable.tracker().same_as(second.runnable.tracker()));

        let behavior = first.node.id();
        let watched_first = reporter.tracker(plan.children()[0].node().id(), behavior).unwrap();
        let watched_second = reporter.tracker(plan.children()[1].node().id(), behavior).unwrap();
        assert!(watched_first.same_as(first.runnable.tracker()));
        assert!(watched_second.same_as(second.runnable.tracker()));
    }

    #[tokio::test]
    async fn test_phase_without_behaviors_succeeds_immediately() {
        let model = model();
        let curriculum = model.curriculum("empty").unwrap();
        let plan = TrainingPlan::build_for(
            &curriculum,
            TrainingMetadata::default(),
            &context(&model, MemoryReporter::shared()),
        )
        .unwrap();

        assert_eq!(plan.run().await.unwrap(), RunStatus::Success);
        assert_eq!(plan.automation().unwrap().attempts(), 0);
    }

    #[test]
    fn test_inverted_weights_are_rejected_at_build() {
        let model = model();
        let curriculum = model.curriculum("bad-weights").unwrap();
        let err = TrainingPlan::build_for(
            &curriculum,
            TrainingMetadata::default(),
            &context(&model, MemoryReporter::shared()),
        )
        .err()
        .unwrap();
        assert!(err.to_string().contains("bad-weights"));
    }

    #[test]
    fn test_behavior_node_is_not_a_plan() {
        let model = model();
        let behavior = model.find_behavior("Unit", "passes").unwrap();
        let result = TrainingPlan::build_for(
            &behavior,
            TrainingMetadata::default(),
            &context(&model, MemoryReporter::shared()),
        );
        assert!(matches!(result, Err(SyllabusError::Model { .. })));
    }

    #[tokio::test]
    async fn test_failed_phase_skips_later_siblings() {
        let model = model();
        let reporter = MemoryReporter::shared();
        let curriculum = model.curriculum("fail-fast").unwrap();
        let plan = TrainingPlan::build_for(
            &curriculum,
            TrainingMetadata::default(),
            &context(&model, reporter.clone()),
        )
        .unwrap();

        assert_eq!(plan.run().await.unwrap(), RunStatus::Failure);
        assert_eq!(reporter.entered(), vec!["fail-fast", "one", "two"]);
        assert_eq!(reporter.results_for("Unit.passes").len(), 2);
        assert_eq!(reporter.results_for("Unit.fails").len(), 4);
        assert!(reporter.results_for("Unit.spare").is_empty());
        assert_eq!(plan.children()[2].automation().unwrap().attempts(), 0);
    }

    #[tokio::test]
    async fn test_fatal_behavior_aborts_the_plan() {
        let model = model();
        let reporter = MemoryReporter::shared();
        let curriculum = model.curriculum("fatal").unwrap();
        let plan = TrainingPlan::build_for(
            &curriculum,
            TrainingMetadata::default(),
            &context(&model, reporter.clone()),
        )
        .unwrap();

        let err = plan.run().await.unwrap_err();
        assert!(err.is_fatal());
        assert!(err.to_string().contains("out of memory"));

        let exits = reporter
            .events()
            .into_iter()
            .filter(|event| matches!(event, crate::report::ReportEvent::Exit { .. }))
            .count();
        assert_eq!(exits, 2, "every entered phase still reports its exit");
    }

    #[tokio::test]
    async fn test_checkpoints_follow_save_cadence() {
        let saves = Arc::new(AtomicUsize::new(0));
        let model = model_with_saves(saves.clone());
        let curriculum = model.curriculum("saving").unwrap();
        let plan = TrainingPlan::build_for(
            &curriculum,
            TrainingMetadata::default(),
            &context(&model, MemoryReporter::shared()),
        )
        .unwrap();

        assert_eq!(plan.run().await.unwrap(), RunStatus::Failure);
        assert_eq!(plan.automation().unwrap().attempts(), 250);
        assert_eq!(saves.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_phase_summarizer_changes_convergence() {
        let model = model();
        let run = |name: &'static str| {
            let model = model.clone();
            async move {
                let curriculum = model.curriculum(name).unwrap();
                let plan = TrainingPlan::build_for(
                    &curriculum,
                    TrainingMetadata::default(),
                    &context(&model, MemoryReporter::shared()),
                )
                .unwrap();
                let status = plan.run().await.unwrap();
                (status, plan.automation().unwrap().attempts())
            }
        };

        // Pass, fail, pass: the zero-padded mean reaches 0.5 on the third run.
        assert_eq!(run("mean-odds").await, (RunStatus::Success, 3));
        // Any failure in the window keeps the geometric mean at zero.
        assert_eq!(run("strict-odds").await, (RunStatus::Failure, 8));
    }
}
