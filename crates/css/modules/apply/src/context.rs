//! Shared resolution state.

use crate::table::MixinTable;
use crate::versions::{TemplateState, TemplateVersions};
use core::fmt;
use log::debug;
use rustc_hash::FxHashMap;
use std::collections::VecDeque;

type InvalidationHook = Box<dyn FnMut(&str)>;

/// Owns the mixin table, template version counters, the settle queue, and
/// the host's invalidation hook.
///
/// Everything runs on the calling thread. Settles queued by
/// [`ResolutionContext::begin_validation`] run when the host calls
/// [`ResolutionContext::run_microtasks`].
#[derive(Default)]
pub struct ResolutionContext {
    table: MixinTable,
    templates: FxHashMap<String, TemplateVersions>,
    settle_queue: VecDeque<String>,
    invalidation_hook: Option<InvalidationHook>,
    current_scope: Option<String>,
}

impl fmt::Debug for ResolutionContext {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("ResolutionContext")
            .field("table", &self.table)
            .field("templates", &self.templates)
            .field("settle_queue", &self.settle_queue)
            .field("has_invalidation_hook", &self.invalidation_hook.is_some())
            .field("current_scope", &self.current_scope)
            .finish()
    }
}

impl ResolutionContext {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub const fn table(&self) -> &MixinTable {
        &self.table
    }

    #[inline]
    pub fn table_mut(&mut self) -> &mut MixinTable {
        &mut self.table
    }

    /// Install the hook called with a scope name whenever that scope's mixin
    /// usage becomes stale.
    pub fn set_invalidation_hook<F>(&mut self, hook: F)
    where
        F: FnMut(&str) + 'static,
    {
        self.invalidation_hook = Some(Box::new(hook));
    }

    #[inline]
    pub fn clear_invalidation_hook(&mut self) {
        self.invalidation_hook = None;
    }

    /// Scope recorded as a dependent by `@apply` expansion.
    #[inline]
    pub fn current_scope(&self) -> Option<&str> {
        self.current_scope.as_deref()
    }

    #[inline]
    pub fn set_current_scope(&mut self, scope: Option<&str>) {
        self.current_scope = scope.map(str::to_owned);
    }

    /// Start tracking versions for the template registered under `scope`.
    #[inline]
    pub fn register_template(&mut self, scope: &str) {
        self.templates.entry(scope.to_owned()).or_default();
    }

    #[inline]
    pub fn template(&self, scope: &str) -> Option<&TemplateVersions> {
        self.templates.get(scope)
    }

    #[inline]
    pub fn template_state(&self, scope: &str) -> Option<TemplateState> {
        self.templates.get(scope).map(TemplateVersions::state)
    }

    /// Mark `scope` stale: bump its template's `next` version (if one is
    /// registered) and notify the hook.
    pub fn invalidate(&mut self, scope: &str) {
        debug!("invalidating mixin users in `{scope}`");
        if let Some(versions) = self.templates.get_mut(scope) {
            versions.invalidate();
        }
        if let Some(hook) = self.invalidation_hook.as_mut() {
            hook(scope);
        }
    }

    /// Begin validating `scope`, scheduling a settle unless one is pending.
    pub fn begin_validation(&mut self, scope: &str) {
        let Some(versions) = self.templates.get_mut(scope) else {
            return;
        };
        if versions.begin_validation() {
            self.settle_queue.push_back(scope.to_owned());
        }
    }

    /// Number of settles waiting for the next microtask checkpoint.
    #[inline]
    pub fn pending_settles(&self) -> usize {
        self.settle_queue.len()
    }

    /// Run every queued settle. Returns how many ran.
    pub fn run_microtasks(&mut self) -> usize {
        let mut settled = 0;
        while let Some(scope) = self.settle_queue.pop_front() {
            if let Some(versions) = self.templates.get_mut(&scope) {
                versions.settle();
                settled += 1;
            }
        }
        settled
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[test]
    fn invalidation_bumps_registered_templates_and_calls_hook() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);
        let mut context = ResolutionContext::new();
        context.set_invalidation_hook(move |scope| sink.borrow_mut().push(scope.to_owned()));
        context.register_template("x-a");
        context.invalidate("x-a");
        context.invalidate("x-unknown");
        assert_eq!(*seen.borrow(), vec!["x-a", "x-unknown"]);
        assert_eq!(context.template_state("x-a"), Some(TemplateState::Invalidated));
        assert_eq!(context.template_state("x-unknown"), None);
    }

    #[test]
    fn settles_are_batched_until_microtasks_run() {
        let mut context = ResolutionContext::new();
        context.register_template("x-a");
        context.invalidate("x-a");
        context.begin_validation("x-a");
        context.invalidate("x-a");
        context.begin_validation("x-a");
        assert_eq!(context.pending_settles(), 1);
        assert_eq!(context.template_state("x-a"), Some(TemplateState::Validating));
        assert_eq!(context.run_microtasks(), 1);
        assert_eq!(context.template_state("x-a"), Some(TemplateState::Fresh));
        assert_eq!(context.run_microtasks(), 0);
    }
}
