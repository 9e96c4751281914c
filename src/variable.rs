//! GC-tracked value slots (spec.md §3.3), grounded in `examples/
//! original_source/asteria/src/fwd.hpp`'s `Variable` forward declaration —
//! a mutable cell that the collector, not the allocator, owns the lifetime
//! of — and in `examples/original_source/asteria/src/variable.cpp`'s
//! `do_throw_immutable`, the one real method body the pack carries for this
//! class: writing through an immutable variable raises rather than panics,
//! which is exactly what [`Reference::write`](crate::reference::Reference::write)
//! checks before calling [`Variable::get_mut`]. That file is a thin
//! destructor-plus-one-error-path stub, though, so the `immutable`/
//! `initialized` flag pair and the rest of this module's shape are this
//! crate's own elaboration, not a transcription. Every `Variable` a script
//! can reach was returned by [`crate::gc::GenerationalCollector::create`];
//! there is no public constructor outside that path, matching Asteria's
//! "variables are created only through the collector" invariant.

use crate::value::Value;
use std::cell::{Ref, RefCell, RefMut};
use std::rc::Rc;

/// A single GC-tracked storage slot.
///
/// Cloning a `Variable` clones the handle (an `Rc`), not the slot: all
/// clones observe the same value and the same flags, mirroring Asteria's
/// `rcptr<Variable>` sharing model (spec.md §3.3).
#[derive(Clone)]
pub struct Variable(Rc<Slot>);

struct Slot {
    value: RefCell<Value>,
    immutable: std::cell::Cell<bool>,
    initialized: std::cell::Cell<bool>,
}

impl Variable {
    /// Constructs a new tracked slot. Restricted to `pub(crate)`: the only
    /// caller is [`crate::gc::GenerationalCollector::create`], which
    /// registers the slot with a generation before handing out the handle
    /// (spec.md §4.4).
    pub(crate) fn new(value: Value, immutable: bool) -> Self {
        Self(Rc::new(Slot {
            value: RefCell::new(value),
            immutable: std::cell::Cell::new(immutable),
            initialized: std::cell::Cell::new(true),
        }))
    }

    /// An uninitialized slot, as produced by `var x;` with no initializer
    /// (spec.md §3.3's "a variable may be declared without being
    /// initialized").
    pub(crate) fn uninitialized() -> Self {
        Self(Rc::new(Slot {
            value: RefCell::new(Value::Null),
            immutable: std::cell::Cell::new(false),
            initialized: std::cell::Cell::new(false),
        }))
    }

    #[must_use]
    pub fn is_immutable(&self) -> bool {
        self.0.immutable.get()
    }

    #[must_use]
    pub fn is_initialized(&self) -> bool {
        self.0.initialized.get()
    }

    pub(crate) fn mark_immutable(&self) {
        self.0.immutable.set(true);
    }

    #[must_use]
    pub fn get(&self) -> Ref<'_, Value> {
        self.0.value.borrow()
    }

    /// Mutable access, bypassing the immutability flag. Only
    /// [`crate::reference::Reference::write`] calls this, after checking
    /// [`Variable::is_immutable`] itself (spec.md §3.3: writing an immutable
    /// variable is a [`crate::error::RuntimeErrorKind::ImmutableVariable`]
    /// error, not a panic).
    pub(crate) fn get_mut(&self) -> RefMut<'_, Value> {
        self.0.initialized.set(true);
        self.0.value.borrow_mut()
    }

    /// Identity comparison — used by the collector to detect whether two
    /// handles name the same slot, not whether their values are equal.
    #[must_use]
    pub fn ptr_eq(&self, other: &Variable) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    /// A stable identity for this slot, valid for as long as any handle to
    /// it is alive. Used by the collector as a mark-set key; two clones of
    /// the same `Variable` always yield the same address.
    #[must_use]
    pub(crate) fn addr(&self) -> usize {
        Rc::as_ptr(&self.0) as usize
    }

    #[must_use]
    pub fn strong_count(&self) -> usize {
        Rc::strong_count(&self.0)
    }

    /// Trace into this slot's value for the GC mark phase (spec.md §4.4).
    pub(crate) fn enumerate_children(&self, visit: &mut dyn FnMut(&Variable)) {
        self.0.value.borrow().enumerate_children(visit);
    }

    /// Overwrite the slot with `Value::Null` and flag it uninitialized,
    /// without dropping the `Rc` itself. Called by the collector right
    /// before a dead slot's last strong reference is released, so that any
    /// reference cycle running through this slot is broken deterministically
    /// instead of relying on drop order (spec.md §4.4's "wipe before drop").
    pub(crate) fn wipe(&self) {
        *self.0.value.borrow_mut() = Value::Null;
        self.0.initialized.set(false);
    }
}

impl std::fmt::Debug for Variable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.0.initialized.get() {
            write!(f, "Variable({:?})", self.0.value.borrow())
        } else {
            write!(f, "Variable(<uninitialized>)")
        }
    }
}
