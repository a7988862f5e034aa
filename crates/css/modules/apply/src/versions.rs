//! Per-template version counters.
//!
//! `next` moves forward on every invalidation. `current` catches up when a
//! scheduled settle runs, copying the `validating` value captured when
//! validation began.

/// A monotonically increasing version number.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Default)]
pub struct Revision(u64);

impl Revision {
    pub const INITIAL: Self = Self(0);

    #[inline]
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    #[inline]
    pub const fn get(self) -> u64 {
        self.0
    }

    #[inline]
    pub const fn next(self) -> Self {
        Self(self.0.saturating_add(1))
    }

    #[inline]
    pub const fn is_newer_than(self, other: Self) -> bool {
        self.0 > other.0
    }
}

/// Observable state of a template's style.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum TemplateState {
    /// `current == next`.
    Fresh,
    /// Stale, and no settle is pending for the latest invalidation.
    Invalidated,
    /// A settle is pending and it will catch up to `next`.
    Validating,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TemplateVersions {
    current: Revision,
    next: Revision,
    validating: Revision,
    settle_pending: bool,
}

impl TemplateVersions {
    #[inline]
    pub const fn current(&self) -> Revision {
        self.current
    }

    #[inline]
    pub const fn next(&self) -> Revision {
        self.next
    }

    #[inline]
    pub const fn validating(&self) -> Revision {
        self.validating
    }

    #[inline]
    pub const fn settle_pending(&self) -> bool {
        self.settle_pending
    }

    pub fn state(&self) -> TemplateState {
        if self.current == self.next {
            TemplateState::Fresh
        } else if self.settle_pending && self.validating == self.next {
            TemplateState::Validating
        } else {
            TemplateState::Invalidated
        }
    }

    #[inline]
    pub fn is_fresh(&self) -> bool {
        self.current == self.next
    }

    /// Mark the style stale.
    #[inline]
    pub fn invalidate(&mut self) {
        self.next = self.next.next();
    }

    /// Capture `next` as the version being validated.
    ///
    /// Returns true when the caller must schedule a settle; at most one is
    /// outstanding at a time.
    pub fn begin_validation(&mut self) -> bool {
        self.validating = self.next;
        if self.settle_pending {
            return false;
        }
        self.settle_pending = true;
        true
    }

    /// Catch `current` up to the captured validating version.
    pub fn settle(&mut self) {
        self.current = self.validating;
        self.settle_pending = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_fresh() {
        let versions = TemplateVersions::default();
        assert_eq!(versions.state(), TemplateState::Fresh);
        assert_eq!(versions.current(), Revision::INITIAL);
    }

    #[test]
    fn invalidate_validate_settle() {
        let mut versions = TemplateVersions::default();
        versions.invalidate();
        assert_eq!(versions.state(), TemplateState::Invalidated);
        assert!(versions.begin_validation());
        assert_eq!(versions.state(), TemplateState::Validating);
        assert!(!versions.begin_validation());
        versions.settle();
        assert_eq!(versions.state(), TemplateState::Fresh);
        assert_eq!(versions.current(), Revision::new(1));
    }

    #[test]
    fn invalidation_during_validation_stays_stale() {
        let mut versions = TemplateVersions::default();
        versions.invalidate();
        assert!(versions.begin_validation());
        versions.invalidate();
        assert_eq!(versions.state(), TemplateState::Invalidated);
        versions.settle();
        assert_eq!(versions.state(), TemplateState::Invalidated);
        assert!(versions.next().is_newer_than(versions.current()));
        assert!(versions.begin_validation());
        versions.settle();
        assert!(versions.is_fresh());
    }
}
