//! The dispatch engine: process-wide state, hooks, and locks.

use std::cell::Cell;
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::AtomicU8;
use std::sync::Arc;

use once_cell::sync::Lazy;
use parking_lot::{Mutex, ReentrantMutex, ReentrantMutexGuard, RwLock};
use tracing::warn;

use crate::error::DispatchError;
use crate::method::{Method, MethodDef};
use crate::mtable::GenericFunction;
use crate::specialize::{CodeInstance, Specialization};
use crate::typemap::TypeMapEntry;

/// Size of the call-site inline cache; a power of two.
pub(crate) const CALL_CACHE_SIZE: usize = 4096;

/// Installable type-inference callback. Receives the specialization and a
/// force flag; infers (and may attach code to) the specialization.
pub type InferenceHook =
    Arc<dyn Fn(&Arc<Specialization>, bool) -> Result<(), DispatchError> + Send + Sync>;

/// Installable code generator: materializes code for a specialization.
pub type CodegenHook =
    Arc<dyn Fn(&Arc<Specialization>) -> Result<CodeInstance, DispatchError> + Send + Sync>;

/// Tracer over methods (post-specialization and post-insertion hooks).
pub type MethodTracer = Arc<dyn Fn(&Arc<Method>) + Send + Sync>;

/// Tracer over specializations (post-codegen hook).
pub type SpecTracer = Arc<dyn Fn(&Arc<Specialization>) + Send + Sync>;

/// Whether the inference trigger fires after specialization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CompileMode {
    #[default]
    Enabled,
    Off,
}

thread_local! {
    static PURE_CONTEXT: Cell<bool> = const { Cell::new(false) };
}

/// True while a tracer callback runs on this thread; collaborators consult
/// it to suppress side effects.
pub fn is_in_pure_context() -> bool {
    PURE_CONTEXT.with(Cell::get)
}

struct PureContextGuard {
    prev: bool,
}

impl PureContextGuard {
    fn enter() -> Self {
        let prev = PURE_CONTEXT.with(|c| c.replace(true));
        PureContextGuard { prev }
    }
}

impl Drop for PureContextGuard {
    fn drop(&mut self) {
        let prev = self.prev;
        PURE_CONTEXT.with(|c| c.set(prev));
    }
}

/// One call-site cache slot: the entry plus the function it belongs to,
/// since the callsite hash alone does not identify the callee.
#[derive(Debug, Clone)]
pub(crate) struct CallCacheSlot {
    pub(crate) func: Arc<GenericFunction>,
    pub(crate) entry: Arc<TypeMapEntry>,
}

/// One dispatch engine: function registry, call-site inline cache, hook
/// points, and the two serialization locks.
///
/// Most programs use [`Dispatcher::global`]; tests build isolated engines
/// with [`Dispatcher::new`].
pub struct Dispatcher {
    functions: Mutex<Vec<Arc<GenericFunction>>>,
    pub(crate) call_cache: Vec<RwLock<Option<CallCacheSlot>>>,
    pub(crate) pick_which: Vec<AtomicU8>,
    /// Serializes definition insertion, specialization building, inference
    /// invocation and cache invalidation. Reentrant so the inference hook
    /// may dispatch recursively.
    codegen: ReentrantMutex<()>,
    /// Held around the inference hook so it can call back into dispatch
    /// without deadlocking against codegen.
    typeinf: ReentrantMutex<()>,
    inference_hook: RwLock<Option<InferenceHook>>,
    codegen_hook: RwLock<Option<CodegenHook>>,
    method_tracer: RwLock<Option<MethodTracer>>,
    newmeth_tracer: RwLock<Option<MethodTracer>>,
    linfo_tracer: RwLock<Option<SpecTracer>>,
    compile_mode: Mutex<CompileMode>,
}

static GLOBAL: Lazy<Dispatcher> = Lazy::new(Dispatcher::new);

impl Dispatcher {
    pub fn new() -> Self {
        Dispatcher {
            functions: Mutex::new(Vec::new()),
            call_cache: (0..CALL_CACHE_SIZE).map(|_| RwLock::new(None)).collect(),
            pick_which: (0..CALL_CACHE_SIZE).map(|_| AtomicU8::new(0)).collect(),
            codegen: ReentrantMutex::new(()),
            typeinf: ReentrantMutex::new(()),
            inference_hook: RwLock::new(None),
            codegen_hook: RwLock::new(None),
            method_tracer: RwLock::new(None),
            newmeth_tracer: RwLock::new(None),
            linfo_tracer: RwLock::new(None),
            compile_mode: Mutex::new(CompileMode::default()),
        }
    }

    /// The process-wide engine.
    pub fn global() -> &'static Dispatcher {
        &GLOBAL
    }

    /// Create (and register) a generic function in module `Main`.
    pub fn function(&self, name: impl Into<String>) -> Arc<GenericFunction> {
        self.function_in(name, "Main")
    }

    pub fn function_in(
        &self,
        name: impl Into<String>,
        module: impl Into<String>,
    ) -> Arc<GenericFunction> {
        let f = GenericFunction::new(name, module);
        self.functions.lock().push(Arc::clone(&f));
        f
    }

    /// All functions registered with this engine.
    pub fn functions(&self) -> Vec<Arc<GenericFunction>> {
        self.functions.lock().clone()
    }

    /// Add a method to a function. Runs the definition-time ambiguity and
    /// shadowing analysis under the codegen lock.
    pub fn define(&self, f: &Arc<GenericFunction>, def: MethodDef) -> Arc<Method> {
        f.mtable().insert_method(self, def)
    }

    pub fn compile_mode(&self) -> CompileMode {
        *self.compile_mode.lock()
    }

    pub fn set_compile_mode(&self, mode: CompileMode) {
        *self.compile_mode.lock() = mode;
    }

    pub(crate) fn codegen_guard(&self) -> ReentrantMutexGuard<'_, ()> {
        self.codegen.lock()
    }

    /// Enter the inference critical section; dropped guard ends it.
    pub fn typeinf_begin(&self) -> ReentrantMutexGuard<'_, ()> {
        self.typeinf.lock()
    }

    /// Install the inference hook and immediately sweep every pre-existing
    /// uninferred specialization through it with the force flag set.
    /// Failures are logged and skipped.
    pub fn set_inference_hook(&self, hook: InferenceHook) {
        *self.inference_hook.write() = Some(hook);
        let _cg = self.codegen_guard();
        for f in self.functions() {
            for m in f.mtable().methods() {
                for spec in m.specializations() {
                    if !spec.is_inferred() {
                        if let Err(e) = self.run_inference(&spec, true) {
                            warn!(spec = ?spec, error = %e, "inference sweep failed; leaving uninferred");
                        }
                    }
                }
            }
        }
    }

    pub fn set_codegen_hook(&self, hook: CodegenHook) {
        *self.codegen_hook.write() = Some(hook);
    }

    /// Tracer invoked after specialization of a method marked traced.
    pub fn set_method_tracer(&self, t: MethodTracer) {
        *self.method_tracer.write() = Some(t);
    }

    /// Tracer invoked after every method insertion.
    pub fn set_newmeth_tracer(&self, t: MethodTracer) {
        *self.newmeth_tracer.write() = Some(t);
    }

    /// Tracer invoked after code generation for a specialization.
    pub fn set_linfo_tracer(&self, t: SpecTracer) {
        *self.linfo_tracer.write() = Some(t);
    }

    /// Run the inference hook on one specialization.
    ///
    /// No-op when no hook is installed, the specialization is already
    /// inferred (unless forced), or another thread is inferring it.
    pub(crate) fn run_inference(
        &self,
        spec: &Arc<Specialization>,
        force: bool,
    ) -> Result<(), DispatchError> {
        let Some(hook) = self.inference_hook.read().clone() else {
            return Ok(());
        };
        if spec.is_inferred() && !force {
            return Ok(());
        }
        if !spec.begin_inference() {
            return Ok(());
        }
        let result = {
            let _ti = self.typeinf_begin();
            hook(spec, force)
        };
        spec.end_inference();
        if result.is_ok() {
            spec.mark_inferred();
        }
        result
    }

    /// Materialize code for a specialization; returns whether it has code
    /// afterwards. Without a codegen hook the template itself is installed
    /// as the entry point.
    pub(crate) fn compile_spec(&self, spec: &Arc<Specialization>) -> bool {
        if spec.has_code() {
            return true;
        }
        let hook = self.codegen_hook.read().clone();
        let produced = match hook {
            Some(hook) => match hook(spec) {
                Ok(ci) => {
                    spec.set_code(ci);
                    true
                }
                Err(e) => {
                    warn!(spec = ?spec, error = %e, "code generation failed");
                    false
                }
            },
            None => match spec.method() {
                Some(m) => {
                    spec.set_code(CodeInstance {
                        entry: m.template.clone(),
                    });
                    true
                }
                None => false,
            },
        };
        if produced {
            if let Some(t) = self.linfo_tracer.read().clone() {
                run_pure(|| t(spec));
            }
        }
        produced
    }

    /// Post-specialization hooks: tracer for traced methods, then the
    /// inference trigger.
    pub(crate) fn after_specialize(&self, m: &Arc<Method>, spec: &Arc<Specialization>) {
        if m.is_traced {
            if let Some(t) = self.method_tracer.read().clone() {
                run_pure(|| t(m));
            }
        }
        let triggered = !spec.is_inferred()
            && !spec.in_inference()
            && self.compile_mode() == CompileMode::Enabled
            && !m.name.starts_with('@');
        if triggered {
            if let Err(e) = self.run_inference(spec, false) {
                warn!(spec = ?spec, error = %e, "inference failed; dispatching unspecialized");
            }
        }
    }

    pub(crate) fn after_define(&self, m: &Arc<Method>) {
        if let Some(t) = self.newmeth_tracer.read().clone() {
            run_pure(|| t(m));
        }
    }
}

impl Default for Dispatcher {
    fn default() -> Self {
        Dispatcher::new()
    }
}

impl fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispatcher")
            .field("functions", &self.functions.lock().len())
            .finish_non_exhaustive()
    }
}

/// Run a tracer callback in the pure context; a panic inside the callback
/// is caught, logged, and suppressed.
fn run_pure(f: impl FnOnce()) {
    let _pure = PureContextGuard::enter();
    if catch_unwind(AssertUnwindSafe(f)).is_err() {
        warn!("tracer callback panicked; suppressed");
    }
}
