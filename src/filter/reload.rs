use std::sync::Arc;

use super::taps::{InternalTapSet, TapSetManager};
use crate::error::Result;
use crate::numeric::Coefficient;

/// Progress of one reload cycle on a stage
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReloadState {
    Idle,
    CompareRequested,
    ReloadInProgress,
    Applied,
}

/// Result of offering a trigger to a stage
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReloadOutcome {
    Unchanged,
    Applied,
}

/// Marker sent down the cascade once per invocation of a reloadable filter
///
/// Carries the new caller taps when the head stage saw a change. Every stage
/// acts on it before computing its first vector of the invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct ReloadTrigger<C> {
    pub taps: Option<Arc<[C]>>,
}

impl<C> ReloadTrigger<C> {
    pub fn unchanged() -> Self {
        Self { taps: None }
    }

    pub fn is_change(&self) -> bool {
        self.taps.is_some()
    }
}

/// Head-stage memory of the last applied caller taps
#[derive(Debug, Clone)]
pub struct ChangeDetector<C> {
    last: Arc<[C]>,
}

impl<C: Coefficient> ChangeDetector<C> {
    pub fn new(taps: &[C]) -> Self {
        Self {
            last: Arc::from(taps),
        }
    }

    /// The new taps if they differ from the last applied set
    pub fn compare(&mut self, taps: &[C]) -> Option<Arc<[C]>> {
        if *self.last == *taps {
            return None;
        }
        let taps: Arc<[C]> = Arc::from(taps);
        self.last = Arc::clone(&taps);
        Some(taps)
    }
}

/// Active and staged tap sets of one stage
///
/// A replacement set is built completely in the staging slot and then swapped
/// in with a single move, so a stage never computes with a partially written
/// set.
#[derive(Debug, Clone)]
pub struct TapBank<C> {
    active: InternalTapSet<C>,
    staged: Option<InternalTapSet<C>>,
    state: ReloadState,
}

impl<C: Coefficient> TapBank<C> {
    pub fn new(active: InternalTapSet<C>) -> Self {
        Self {
            active,
            staged: None,
            state: ReloadState::Idle,
        }
    }

    pub fn active(&self) -> &InternalTapSet<C> {
        &self.active
    }

    pub fn state(&self) -> ReloadState {
        self.state
    }

    pub fn request_compare(&mut self) {
        self.state = ReloadState::CompareRequested;
    }

    pub fn stage(&mut self, set: InternalTapSet<C>) {
        self.staged = Some(set);
        self.state = ReloadState::ReloadInProgress;
    }

    /// Swap the staged set in, if there is one.
    pub fn commit(&mut self) -> ReloadOutcome {
        match self.staged.take() {
            Some(set) => {
                self.active = set;
                self.state = ReloadState::Applied;
                ReloadOutcome::Applied
            }
            None => ReloadOutcome::Unchanged,
        }
    }

    pub fn settle(&mut self) {
        self.staged = None;
        self.state = ReloadState::Idle;
    }

    /// Run one full reload cycle for `trigger`.
    ///
    /// On error the active set is untouched and the bank returns to idle.
    pub fn apply(
        &mut self,
        manager: &TapSetManager,
        trigger: &ReloadTrigger<C>,
    ) -> Result<ReloadOutcome> {
        self.request_compare();
        let outcome = match &trigger.taps {
            None => Ok(ReloadOutcome::Unchanged),
            Some(taps) => manager.reload(&taps[..]).map(|set| {
                self.stage(set);
                self.commit()
            }),
        };
        self.settle();
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CoefficientPhase;
    use crate::error::ConfigError;

    fn manager() -> TapSetManager {
        TapSetManager::new(4, 2, 0, 4, 2, false, 1, CoefficientPhase::default())
    }

    #[test]
    fn test_change_detector() {
        let mut detector = ChangeDetector::new(&[1i16, 2, 3, 4]);
        assert!(detector.compare(&[1, 2, 3, 4]).is_none());
        let changed = detector.compare(&[4, 3, 2, 1]).unwrap();
        assert_eq!(&*changed, &[4, 3, 2, 1]);
        assert!(detector.compare(&[4, 3, 2, 1]).is_none());
    }

    #[test]
    fn test_bank_state_transitions() {
        let m = manager();
        let mut bank = TapBank::new(m.reload(&[1i16, 2, 3, 4]).unwrap());
        assert_eq!(bank.state(), ReloadState::Idle);

        bank.request_compare();
        assert_eq!(bank.state(), ReloadState::CompareRequested);
        bank.stage(m.reload(&[5, 6, 7, 8]).unwrap());
        assert_eq!(bank.state(), ReloadState::ReloadInProgress);
        // Still computing with the old set until the commit
        assert_eq!(bank.active().single(), &[4, 3, 2, 1]);
        assert_eq!(bank.commit(), ReloadOutcome::Applied);
        assert_eq!(bank.state(), ReloadState::Applied);
        assert_eq!(bank.active().single(), &[8, 7, 6, 5]);
        bank.settle();
        assert_eq!(bank.state(), ReloadState::Idle);
    }

    #[test]
    fn test_apply_unchanged_trigger() {
        let m = manager();
        let mut bank = TapBank::new(m.reload(&[1i16, 2, 3, 4]).unwrap());
        let outcome = bank.apply(&m, &ReloadTrigger::unchanged()).unwrap();
        assert_eq!(outcome, ReloadOutcome::Unchanged);
        assert_eq!(bank.active().single(), &[4, 3, 2, 1]);
        assert_eq!(bank.state(), ReloadState::Idle);
    }

    #[test]
    fn test_failed_apply_keeps_active_set() {
        let m = manager();
        let mut bank = TapBank::new(m.reload(&[1i16, 2, 3, 4]).unwrap());
        let trigger = ReloadTrigger {
            taps: Some(Arc::from(&[9i16, 9, 9][..])),
        };
        assert_eq!(
            bank.apply(&m, &trigger),
            Err(ConfigError::TapCountMismatch {
                expected: 4,
                actual: 3
            })
        );
        assert_eq!(bank.active().single(), &[4, 3, 2, 1]);
        assert_eq!(bank.state(), ReloadState::Idle);
    }
}
