use std::marker::PhantomData;

use itertools::Itertools;
use tracing::info;

use crate::{
    database::db_structs::MatchGroup,
    model::{
        rating_model::{ProcessResult, RatingModel},
        rating_tracker::RatingTracker
    }
};

/// Rating state which no longer reflects the match history
pub struct Stale;
/// Every rating reset, nothing replayed yet
pub struct Empty;
/// Ratings rebuilt from the complete match history
pub struct Consistent;

/// A recompute epoch, moving `Stale -> Empty -> Consistent`.
///
/// Only [`recompute_all`] drives the transitions, so an `Epoch<Empty>` never
/// escapes this module.
pub struct Epoch<S> {
    tracker: RatingTracker,
    result: ProcessResult,
    _state: PhantomData<S>
}

impl Epoch<Stale> {
    pub fn new(tracker: RatingTracker) -> Epoch<Stale> {
        Epoch {
            tracker,
            result: ProcessResult::default(),
            _state: PhantomData
        }
    }

    fn reset(mut self) -> Epoch<Empty> {
        self.tracker.reset();

        Epoch {
            tracker: self.tracker,
            result: ProcessResult::default(),
            _state: PhantomData
        }
    }
}

impl Epoch<Empty> {
    fn replay(self, groups: &[MatchGroup], show_progress: bool) -> Epoch<Consistent> {
        let mut model = RatingModel::new(self.tracker).with_progress(show_progress);
        let result = model.process(groups);

        Epoch {
            tracker: model.rating_tracker,
            result,
            _state: PhantomData
        }
    }
}

impl Epoch<Consistent> {
    pub fn tracker(&self) -> &RatingTracker {
        &self.tracker
    }

    pub fn result(&self) -> &ProcessResult {
        &self.result
    }

    pub fn into_parts(self) -> (RatingTracker, ProcessResult) {
        (self.tracker, self.result)
    }
}

/// Sorts match groups into replay order: game date, game number, then insertion order
pub fn chronological(groups: Vec<MatchGroup>) -> Vec<MatchGroup> {
    groups.into_iter().sorted_by_key(|g| g.replay_order()).collect()
}

/// # Batch recompute
///
/// Discards the given rating state and rebuilds it by replaying every match group in
/// chronological order. The same groups always produce the same ratings and the same
/// history, ids included.
pub fn recompute_all(stale: RatingTracker, groups: Vec<MatchGroup>, show_progress: bool) -> Epoch<Consistent> {
    let groups = chronological(groups);
    let epoch = Epoch::new(stale).reset().replay(&groups, show_progress);

    info!(
        replayed = epoch.result.summary.replayed,
        skipped = epoch.result.summary.skipped,
        "Recompute complete"
    );

    epoch
}
