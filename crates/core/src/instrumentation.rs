//! Explicit interceptor registration around units of work
//!
//! Interceptors are registered once when the [`Instrumentation`] is built and
//! are invoked before and after every wrapped unit. A panicking interceptor
//! is isolated from the host; a panicking unit of work propagates as usual.

use std::fmt::Display;
use std::future::Future;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use tracing::{debug, info};

use crate::context::RequestContext;
use crate::reporting::ReportingClient;
use crate::sampling::ScopeKind;

/// How a wrapped unit of work ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnitOutcome {
    Completed,
    Failed { message: String },
}

/// Hook invoked around every unit of work
pub trait Interceptor: Send + Sync {
    fn name(&self) -> &str;

    fn before(&self, _context: &mut RequestContext) {}

    fn after(&self, _context: &mut RequestContext, _outcome: &UnitOutcome) {}
}

/// Frozen set of interceptors bound to a reporting client
pub struct Instrumentation {
    client: Arc<ReportingClient>,
    interceptors: Vec<Arc<dyn Interceptor>>,
}

impl Instrumentation {
    pub fn builder(client: Arc<ReportingClient>) -> InstrumentationBuilder {
        InstrumentationBuilder { client, interceptors: Vec::new() }
    }

    pub fn client(&self) -> &Arc<ReportingClient> {
        &self.client
    }

    /// Names of the registered interceptors, in invocation order
    pub fn interceptor_names(&self) -> Vec<&str> {
        self.interceptors.iter().map(|interceptor| interceptor.name()).collect()
    }

    /// Start a context for a unit of work that is driven manually.
    pub fn begin(&self, kind: ScopeKind, scope: &str, subscope: Option<&str>) -> RequestContext {
        let mut context = RequestContext::begin(Arc::clone(&self.client), kind, scope, subscope);
        self.run_before(&mut context);
        context
    }

    /// Complete a context started with [`Instrumentation::begin`].
    pub fn end(&self, mut context: RequestContext, outcome: UnitOutcome) {
        self.run_after(&mut context, &outcome);
        context.finish();
    }

    /// Wrap a synchronous unit of work.
    ///
    /// An `Err` is captured as an exception event and returned unchanged.
    pub fn wrap<T, E, F>(
        &self,
        kind: ScopeKind,
        scope: &str,
        subscope: Option<&str>,
        work: F,
    ) -> Result<T, E>
    where
        E: Display,
        F: FnOnce(&mut RequestContext) -> Result<T, E>,
    {
        let mut context = self.begin(kind, scope, subscope);
        let result = work(&mut context);
        let outcome = outcome_of(&context, &result);
        self.end(context, outcome);
        result
    }

    /// Wrap an asynchronous unit of work.
    ///
    /// The future owns the context while it runs and hands it back with its
    /// result.
    pub async fn wrap_async<T, E, F, Fut>(
        &self,
        kind: ScopeKind,
        scope: &str,
        subscope: Option<&str>,
        work: F,
    ) -> Result<T, E>
    where
        E: Display,
        F: FnOnce(RequestContext) -> Fut,
        Fut: Future<Output = (RequestContext, Result<T, E>)>,
    {
        let context = self.begin(kind, scope, subscope);
        let (context, result) = work(context).await;
        let outcome = outcome_of(&context, &result);
        self.end(context, outcome);
        result
    }

    fn run_before(&self, context: &mut RequestContext) {
        if !context.is_sampled() {
            return;
        }
        for interceptor in &self.interceptors {
            let hook = catch_unwind(AssertUnwindSafe(|| interceptor.before(context)));
            if hook.is_err() {
                debug!(interceptor = interceptor.name(), "Interceptor panicked in before hook");
            }
        }
    }

    fn run_after(&self, context: &mut RequestContext, outcome: &UnitOutcome) {
        if !context.is_sampled() {
            return;
        }
        for interceptor in self.interceptors.iter().rev() {
            let hook = catch_unwind(AssertUnwindSafe(|| interceptor.after(context, outcome)));
            if hook.is_err() {
                debug!(interceptor = interceptor.name(), "Interceptor panicked in after hook");
            }
        }
    }
}

impl std::fmt::Debug for Instrumentation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Instrumentation")
            .field("interceptors", &self.interceptor_names())
            .finish()
    }
}

fn outcome_of<T, E: Display>(context: &RequestContext, result: &Result<T, E>) -> UnitOutcome {
    match result {
        Ok(_) => UnitOutcome::Completed,
        Err(err) => {
            context.capture_exception(err);
            UnitOutcome::Failed { message: err.to_string() }
        }
    }
}

/// Collects interceptors before the registry is frozen
pub struct InstrumentationBuilder {
    client: Arc<ReportingClient>,
    interceptors: Vec<Arc<dyn Interceptor>>,
}

impl InstrumentationBuilder {
    /// Register an interceptor; a second one with the same name is ignored.
    pub fn register(mut self, interceptor: Arc<dyn Interceptor>) -> Self {
        if self.interceptors.iter().any(|existing| existing.name() == interceptor.name()) {
            debug!(interceptor = interceptor.name(), "Interceptor already registered");
        } else {
            self.interceptors.push(interceptor);
        }
        self
    }

    pub fn build(self) -> Instrumentation {
        info!(count = self.interceptors.len(), "Instrumentation installed");
        Instrumentation { client: self.client, interceptors: self.interceptors }
    }
}
