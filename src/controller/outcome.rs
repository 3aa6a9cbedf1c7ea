use std::time::Duration;

use kube::runtime::controller::Action;

/// What the scheduler should do with an object after a pass
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// Nothing left to do until the object or a dependency changes
    Done,
    /// Waiting on a dependency; try again after the delay
    RequeueAfter(Duration),
    /// Lost a concurrent update; try again right away
    RequeueNow,
}

impl ReconcileOutcome {
    pub fn into_action(self) -> Action {
        match self {
            ReconcileOutcome::Done => Action::await_change(),
            ReconcileOutcome::RequeueAfter(delay) => Action::requeue(delay),
            ReconcileOutcome::RequeueNow => Action::requeue(Duration::ZERO),
        }
    }
}
