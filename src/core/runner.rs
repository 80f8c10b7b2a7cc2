//! Behavior runner.
//!
//! Runs one behavior against a freshly constructed capability and turns
//! whatever happened into a `RunResult`. Only `Outcome::Fatal` (or a fatal
//! construction error) escapes as `Err`; every other failure, panics
//! included, is a Failure result.

use std::any::Any;
use std::fmt;
use std::future::Future;
use std::io;
use std::pin::Pin;
use std::sync::{Arc, Mutex, PoisonError};

use tracing::debug;

use crate::core::result::{Outcome, RunResult, RunStatus};
use crate::error::{Result, SyllabusError};
use crate::mind::MindPool;
use crate::model::node::ScenariosNode;

/// Future of one behavior invocation.
pub type BehaviorFuture = Pin<Box<dyn Future<Output = Outcome> + Send + 'static>>;

/// Type-erased entry point of a behavior: builds the capability (with its
/// minds from the pool) and starts the behavior on it.
pub trait BehaviorInvoker: Send + Sync {
    fn invoke(&self, minds: &MindPool, console: Console) -> Result<BehaviorFuture>;
}

/// Builds one capability instance per run.
pub type CapabilityFactory<C> = Arc<dyn Fn(&MindPool) -> Result<C> + Send + Sync>;

/// Behavior method, already adapted to return a boxed `Outcome` future.
pub type BehaviorMethod<C> = Arc<dyn Fn(C, Console) -> BehaviorFuture + Send + Sync>;

/// `BehaviorInvoker` for a capability of type `C`.
pub struct TypedBehavior<C> {
    factory: CapabilityFactory<C>,
    method: BehaviorMethod<C>,
}

impl<C> TypedBehavior<C> {
    pub fn new(factory: CapabilityFactory<C>, method: BehaviorMethod<C>) -> Self {
        Self { factory, method }
    }
}

impl<C: Send + 'static> BehaviorInvoker for TypedBehavior<C> {
    fn invoke(&self, minds: &MindPool, console: Console) -> Result<BehaviorFuture> {
        let capability = (self.factory)(minds)?;
        Ok((self.method)(capability, console))
    }
}

/// Output buffer handed to a behavior. Everything written here is attached
/// to the run's result.
#[derive(Clone, Default)]
pub struct Console {
    buffer: Arc<Mutex<String>>,
}

impl Console {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn print(&self, text: impl fmt::Display) {
        let mut buffer = self.buffer.lock().unwrap_or_else(PoisonError::into_inner);
        buffer.push_str(&text.to_string());
    }

    pub fn println(&self, text: impl fmt::Display) {
        let mut buffer = self.buffer.lock().unwrap_or_else(PoisonError::into_inner);
        buffer.push_str(&text.to_string());
        buffer.push('\n');
    }

    pub fn contents(&self) -> String {
        self.buffer
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl fmt::Debug for Console {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Console")
            .field("len", &self.contents().len())
            .finish()
    }
}

impl io::Write for Console {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.print(String::from_utf8_lossy(buf));
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Runs one behavior node.
#[derive(Clone)]
pub struct BehaviorRunner {
    node: Arc<ScenariosNode>,
    pool: MindPool,
}

impl fmt::Debug for BehaviorRunner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BehaviorRunner")
            .field("behavior", &self.node.to_string())
            .finish()
    }
}

impl BehaviorRunner {
    /// Create a runner. `node` must be a behavior.
    pub fn new(node: Arc<ScenariosNode>, pool: MindPool) -> Result<Self> {
        if node.as_behavior().is_none() {
            return Err(SyllabusError::model(format!(
                "'{}' is a {:?}, not a behavior",
                node.name(),
                node.kind()
            )));
        }
        Ok(Self { node, pool })
    }

    pub fn node(&self) -> &Arc<ScenariosNode> {
        &self.node
    }

    /// Construct the capability, run the behavior and normalize the result.
    ///
    /// The invocation runs as its own task so a panic is contained and
    /// reported as a Failure.
    pub async fn run(&self) -> Result<RunResult> {
        let Some(behavior) = self.node.as_behavior() else {
            return Err(SyllabusError::model("runner node is not a behavior"));
        };

        let console = Console::new();
        let invoker = Arc::clone(&behavior.invoker);
        let pool = self.pool.clone();
        let task_console = console.clone();

        let joined = tokio::spawn(async move {
            match invoker.invoke(&pool, task_console) {
                Ok(future) => Ok(future.await),
                Err(err) => Err(err),
            }
        })
        .await;

        let result = match joined {
            Ok(Ok(Outcome::Passed(transcript))) => {
                RunResult::from_transcript(transcript, console.contents())
            }
            Ok(Ok(Outcome::Failed { transcript, reason })) => RunResult {
                status: RunStatus::Failure,
                transcript,
                error: Some(reason),
                output: console.contents(),
            },
            Ok(Ok(Outcome::Fatal(cause))) => return Err(SyllabusError::fatal(cause)),
            Ok(Err(err)) if err.is_fatal() => return Err(err),
            Ok(Err(err)) => RunResult::errored(err.kind(), err.to_string(), console.contents()),
            Err(join) if join.is_panic() => {
                let message = panic_message(join.into_panic());
                console.println(format_args!("panicked: {message}"));
                RunResult::errored("panic", message, console.contents())
            }
            Err(join) => RunResult::errored("cancelled", join.to_string(), console.contents()),
        };

        debug!(behavior = %self.node, status = %result.status, "Behavior finished");
        Ok(result)
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
