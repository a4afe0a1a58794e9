use crate::mvi::{Intent, MachineState, Reducer};

/// Router transition phase.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum RouterPhase {
    #[default]
    Idle,
    Transitioning { path: String },
}

impl MachineState for RouterPhase {}

impl RouterPhase {
    pub fn is_idle(&self) -> bool {
        matches!(self, RouterPhase::Idle)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouterIntent {
    Begin { path: String },
    Finish,
}

impl Intent for RouterIntent {}

pub struct RouterReducer;

impl Reducer for RouterReducer {
    type State = RouterPhase;
    type Intent = RouterIntent;

    fn reduce(state: Self::State, intent: Self::Intent) -> Self::State {
        match (state, intent) {
            (RouterPhase::Idle, RouterIntent::Begin { path }) => RouterPhase::Transitioning { path },
            // Transitions are serialised; a second Begin leaves the first in place.
            (busy @ RouterPhase::Transitioning { .. }, RouterIntent::Begin { .. }) => busy,
            (_, RouterIntent::Finish) => RouterPhase::Idle,
        }
    }
}
