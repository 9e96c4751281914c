//! The top-level embedding context (spec.md §5): owns the collector, the
//! PRNG, and the module loader lock a host creates once per script engine
//! instance.
//!
//! Grounded in `examples/original_source/asteria/src/runtime/
//! global_context.cpp`'s `Global_Context`, which bundles exactly these
//! three pieces (`m_gcoll`, `m_prng`, `m_ldrlk`) and tears the collector
//! down with a full sweep on destruction.

use crate::error::{RuntimeError, RuntimeErrorKind, RuntimeResult};
use crate::gc::{GcConfig, Generation, GenerationalCollector};
use crate::position::SourceLocation;
use crate::value::Value;
use crate::variable::Variable;
use rand::rngs::SmallRng;
use rand::SeedableRng;
use std::cell::RefCell;
use std::collections::HashSet;

/// A non-reentrant guard against import cycles (spec.md §5), grounded in
/// `Loader_Lock`: importing a path that is already on the in-progress stack
/// is a [`crate::error::RuntimeErrorKind::CircularImport`] error rather than
/// infinite recursion.
#[derive(Default)]
struct LoaderLock {
    in_progress: RefCell<Vec<String>>,
}

impl LoaderLock {
    /// Enter the load of `path`. Returns a guard that exits the lock on
    /// drop; fails if `path` is already being loaded somewhere up the call
    /// stack.
    fn enter(&self, path: &str, at: &SourceLocation) -> RuntimeResult<LoaderLockGuard<'_>> {
        {
            let stack = self.in_progress.borrow();
            if stack.iter().any(|p| p == path) {
                let cycle = stack.join(" -> ");
                return Err(RuntimeError::new(
                    RuntimeErrorKind::CircularImport(format!("{} -> {}", cycle, path)),
                    at.clone(),
                ));
            }
        }
        self.in_progress.borrow_mut().push(path.to_string());
        Ok(LoaderLockGuard { lock: self })
    }

    #[must_use]
    fn loaded_paths(&self) -> HashSet<String> {
        self.in_progress.borrow().iter().cloned().collect()
    }
}

struct LoaderLockGuard<'a> {
    lock: &'a LoaderLock,
}

impl Drop for LoaderLockGuard<'_> {
    fn drop(&mut self) {
        self.lock.in_progress.borrow_mut().pop();
    }
}

/// One embedding's worth of shared runtime state: the collector that owns
/// every [`Variable`], a non-cryptographic PRNG for host-exposed `random`
/// functions, and the loader lock guarding against circular imports.
pub struct GlobalContext {
    gc: RefCell<GenerationalCollector>,
    rng: RefCell<SmallRng>,
    loader: LoaderLock,
}

impl GlobalContext {
    #[must_use]
    pub fn new(gc_config: GcConfig) -> Self {
        Self {
            gc: RefCell::new(GenerationalCollector::new(gc_config)),
            rng: RefCell::new(SmallRng::from_entropy()),
            loader: LoaderLock::default(),
        }
    }

    /// Track a newly constructed value and hand back a GC-owned handle
    /// (spec.md §3.3, §4.4).
    pub fn create_variable(&self, value: Value, immutable: bool) -> Variable {
        self.gc.borrow_mut().create(value, immutable)
    }

    /// Run a collection pass up through `up_to` (spec.md §4.4).
    pub fn collect(&self, up_to: Generation) {
        self.gc.borrow_mut().collect(up_to);
    }

    #[must_use]
    pub fn gc_counts(&self) -> [usize; 3] {
        self.gc.borrow().counts()
    }

    /// Draw a `u64` from the context's PRNG, used by host-exposed `random`
    /// library functions (spec.md §5).
    pub fn next_random_u64(&self) -> u64 {
        use rand::RngCore;
        self.rng.borrow_mut().next_u64()
    }

    /// Enter a module load, detecting cycles (spec.md §5). The caller keeps
    /// the returned guard alive for exactly the duration of that module's
    /// load; dropping it (including via `?`-propagated errors) releases the
    /// lock.
    pub fn enter_load<'a>(
        &'a self,
        path: &str,
        at: &SourceLocation,
    ) -> RuntimeResult<impl Drop + 'a> {
        self.loader.enter(path, at)
    }

    #[must_use]
    pub fn currently_loading(&self) -> HashSet<String> {
        self.loader.loaded_paths()
    }
}

impl Drop for GlobalContext {
    /// A full sweep on teardown, mirroring `~Global_Context`'s
    /// `gcoll->wipe_out_variables()` call.
    fn drop(&mut self) {
        self.gc.borrow_mut().collect_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn circular_import_is_detected() {
        let ctx = GlobalContext::new(GcConfig::default());
        let at = SourceLocation::start("main");
        let _outer = ctx.enter_load("a.lumen", &at).unwrap();
        let err = ctx.enter_load("a.lumen", &at).unwrap_err();
        assert!(matches!(err.kind(), RuntimeErrorKind::CircularImport(_)));
    }

    #[test]
    fn loader_lock_releases_on_drop() {
        let ctx = GlobalContext::new(GcConfig::default());
        let at = SourceLocation::start("main");
        {
            let _g = ctx.enter_load("a.lumen", &at).unwrap();
        }
        assert!(ctx.enter_load("a.lumen", &at).is_ok());
    }

    #[test]
    fn created_variables_are_collected_on_drop() {
        let ctx = GlobalContext::new(GcConfig::default());
        let _ = ctx.create_variable(Value::Integer(1), false);
        drop(ctx);
    }
}
