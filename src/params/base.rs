// ParamBase / ParamsUpdate - change tracking for parameter groups
//
// Every parameter group embeds a ParamBase and bumps it at the end of each
// mutating setter. Consumers that cache derived data (wavetables, filter
// coefficients, LFO increments) keep a ParamsUpdate and ask it whether the
// group moved since their last look, so N writes between two renders cost
// one recomputation.
//
// Both sides live on the thread that owns the engine. A ParamsUpdate is
// checked through `&mut self`, so two threads can never race on the same
// shadow counter without a lock the compiler makes visible.

use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_PARAM_ID: AtomicU64 = AtomicU64::new(1);

/// Version counter of one parameter group.
///
/// Not `Clone`: consumers are bound to a specific group, and a copy would
/// silently split the version history in two.
#[derive(Debug)]
pub struct ParamBase {
    id: u64,
    updated_at: u32,
}

impl ParamBase {
    pub fn new() -> Self {
        Self {
            id: NEXT_PARAM_ID.fetch_add(1, Ordering::Relaxed),
            updated_at: 0,
        }
    }

    /// Record a mutation. Wraps; only inequality matters to consumers.
    #[inline]
    pub fn params_changed(&mut self) {
        self.updated_at = self.updated_at.wrapping_add(1);
    }

    #[inline]
    pub fn updated_at(&self) -> u32 {
        self.updated_at
    }

    /// Identity of this group, stable for its lifetime
    #[inline]
    pub fn id(&self) -> u64 {
        self.id
    }
}

impl Default for ParamBase {
    fn default() -> Self {
        Self::new()
    }
}

/// Consumer-side shadow of a ParamBase counter
#[derive(Debug, Clone, Copy)]
pub struct ParamsUpdate {
    source: u64,
    last_updated: u32,
}

impl ParamsUpdate {
    /// Bind to `params`; the current version counts as already seen
    pub fn new(params: &ParamBase) -> Self {
        Self {
            source: params.id(),
            last_updated: params.updated_at(),
        }
    }

    /// Bind to `params` and report stale on the first check
    pub fn stale(params: &ParamBase) -> Self {
        let mut update = Self::new(params);
        update.force_update();
        update
    }

    /// True exactly once per version of `params` not seen before
    pub fn check_updated(&mut self, params: &ParamBase) -> bool {
        debug_assert_eq!(
            self.source,
            params.id(),
            "ParamsUpdate checked against a group it is not bound to"
        );
        let result = params.updated_at() != self.last_updated;
        self.last_updated = params.updated_at();
        result
    }

    /// Make the next check report a change
    pub fn force_update(&mut self) {
        self.last_updated = self.last_updated.wrapping_sub(1);
    }

    /// Rebind to another group; forces an update only when the group differs
    pub fn change_params(&mut self, params: &ParamBase) {
        if self.source != params.id() {
            self.source = params.id();
            self.last_updated = params.updated_at().wrapping_sub(1);
        }
    }

    pub fn is_bound_to(&self, params: &ParamBase) -> bool {
        self.source == params.id()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_snapshot_is_clean() {
        let params = ParamBase::new();
        let mut update = ParamsUpdate::new(&params);
        assert!(!update.check_updated(&params));
    }

    #[test]
    fn test_many_changes_collapse_into_one() {
        let mut params = ParamBase::new();
        let mut update = ParamsUpdate::new(&params);

        for _ in 0..50 {
            params.params_changed();
        }
        assert!(update.check_updated(&params));
        assert!(!update.check_updated(&params));
    }

    #[test]
    fn test_force_update() {
        let params = ParamBase::new();
        let mut update = ParamsUpdate::new(&params);

        update.force_update();
        assert!(update.check_updated(&params));
        assert!(!update.check_updated(&params));

        assert!(ParamsUpdate::stale(&params).check_updated(&params));
    }

    #[test]
    fn test_change_params_only_forces_on_new_group() {
        let first = ParamBase::new();
        let second = ParamBase::new();
        let mut update = ParamsUpdate::new(&first);

        update.change_params(&first);
        assert!(!update.check_updated(&first));

        update.change_params(&second);
        assert!(update.is_bound_to(&second));
        assert!(update.check_updated(&second));
        assert!(!update.check_updated(&second));
    }

    #[test]
    fn test_counter_wraparound() {
        let mut params = ParamBase::new();
        params.updated_at = u32::MAX;
        let mut update = ParamsUpdate::new(&params);

        params.params_changed();
        assert_eq!(params.updated_at(), 0);
        assert!(update.check_updated(&params));
    }

    #[test]
    fn test_ids_are_unique() {
        let a = ParamBase::new();
        let b = ParamBase::new();
        assert_ne!(a.id(), b.id());
    }
}
