//! Named lifecycle stages and the reducer behind a view's lifecycle flags.

use std::fmt;
use std::future::Future;

use crate::mvi::{Intent, MachineState, Reducer};
use crate::view::error::ViewError;

/// Every awaited step the runtime drives, for views and page transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Init,
    BeforeRender,
    Template,
    AfterRender,
    BeforeMount,
    AfterMount,
    BeforeDestroy,
    AfterDestroy,
    Guard,
    Exit,
    Params,
    Enter,
    Render,
    Mount,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Init => "init",
            Stage::BeforeRender => "before-render",
            Stage::Template => "template",
            Stage::AfterRender => "after-render",
            Stage::BeforeMount => "before-mount",
            Stage::AfterMount => "after-mount",
            Stage::BeforeDestroy => "before-destroy",
            Stage::AfterDestroy => "after-destroy",
            Stage::Guard => "guard",
            Stage::Exit => "exit",
            Stage::Params => "params",
            Stage::Enter => "enter",
            Stage::Render => "render",
            Stage::Mount => "mount",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Await one hook, tagging a failure with the stage and view it came from.
pub async fn run_stage<F>(view_id: &str, stage: Stage, hook: F) -> Result<(), ViewError>
where
    F: Future<Output = anyhow::Result<()>>,
{
    tracing::trace!(view_id = %view_id, stage = %stage, "Stage start");
    match hook.await {
        Ok(()) => Ok(()),
        Err(err) => {
            tracing::error!(view_id = %view_id, stage = %stage, error = %err, "Lifecycle stage failed");
            Err(ViewError::Stage {
                stage,
                view_id: view_id.to_string(),
                message: format!("{:#}", err),
            })
        }
    }
}

/// Monotonic lifecycle flags. `destroyed` is terminal.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LifecycleState {
    pub initialized: bool,
    pub rendered: bool,
    pub mounted: bool,
    pub destroyed: bool,
}

impl MachineState for LifecycleState {}

impl LifecycleState {
    pub fn is_alive(&self) -> bool {
        !self.destroyed
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleIntent {
    Initialized,
    Rendered,
    Mounted,
    Destroyed,
}

impl Intent for LifecycleIntent {}

pub struct LifecycleReducer;

impl Reducer for LifecycleReducer {
    type State = LifecycleState;
    type Intent = LifecycleIntent;

    fn reduce(state: Self::State, intent: Self::Intent) -> Self::State {
        if state.destroyed {
            return state;
        }
        match intent {
            LifecycleIntent::Initialized => LifecycleState {
                initialized: true,
                ..state
            },
            LifecycleIntent::Rendered => LifecycleState {
                initialized: true,
                rendered: true,
                ..state
            },
            LifecycleIntent::Mounted if state.rendered => LifecycleState {
                mounted: true,
                ..state
            },
            LifecycleIntent::Mounted => state,
            LifecycleIntent::Destroyed => LifecycleState {
                destroyed: true,
                ..state
            },
        }
    }
}
