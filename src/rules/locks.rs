//! Recognition of `Monitor.Enter` lock acquisitions.
//!
//! Compilers emit `lock (x) { .. }` either as
//!
//! ```text
//! ldarg.0; ldfld x; stloc.0; ldloc.0; call Monitor::Enter(object)
//! .try { .. } finally { ldloc.0; call Monitor::Exit(object); endfinally }
//! ```
//!
//! or, since C# 4, with the `Enter(object, ref bool)` overload called inside the try. Both
//! shapes are recognized here.

use crate::{
    assembly::{IndexRange, InstructionKind},
    dispatch::MethodView,
    metadata::{FieldRefRc, MethodRef},
};

const MONITOR: &str = "System.Threading.Monitor";

/// Returns `true` for `Monitor::Enter(object)` and `Monitor::Enter(object, ref bool)`.
pub(crate) fn is_monitor_enter(target: &MethodRef) -> bool {
    target.is(MONITOR, "Enter") && matches!(target.param_count(), 1 | 2)
}

/// Index of the instruction producing the lock object of the `Monitor.Enter` at `call`,
/// looking through one store to a local.
pub(crate) fn lock_object(view: &MethodView<'_>, call: usize) -> Option<usize> {
    let instructions = view.instructions();
    let InstructionKind::Call(site) = &instructions.get(call)?.kind else {
        return None;
    };
    if !is_monitor_enter(&site.target) {
        return None;
    }

    let tracker = view.tracker();
    let producer = tracker.producer_of(call, site.target.param_count() - 1)?;
    match instructions[producer].kind {
        InstructionKind::LoadLocal(local) => {
            let store = instructions[..producer]
                .iter()
                .rev()
                .find(|i| matches!(i.kind, InstructionKind::StoreLocal(l) if l == local))?;
            tracker.producer_of(store.index, 0)
        }
        _ => Some(producer),
    }
}

/// Field whose value is locked by the `Monitor.Enter` at `call`.
///
/// Instance fields only count when loaded from `this`.
pub(crate) fn locked_field(view: &MethodView<'_>, call: usize) -> Option<FieldRefRc> {
    let object = lock_object(view, call)?;
    match &view.instructions()[object].kind {
        InstructionKind::LoadStaticField(field) => Some(field.clone()),
        InstructionKind::LoadField(field) if view.method().has_this() => {
            let receiver = view.tracker().producer_of(object, 0)?;
            matches!(view.instructions()[receiver].kind, InstructionKind::LoadArg(0))
                .then(|| field.clone())
        }
        _ => None,
    }
}

/// Instructions executed while the lock taken at `call` is held, when the lock is released
/// by a finally block.
pub(crate) fn held_range(view: &MethodView<'_>, call: usize) -> Option<IndexRange> {
    let regions = view.regions();
    if let Some(region) = regions.try_starting_at(call + 1) {
        if region.finally_range().is_some() {
            return Some(region.try_range);
        }
    }

    let region = regions.enclosing_try(call)?;
    region.finally_range()?;
    Some(IndexRange::new(call + 1, region.try_range.end))
}
