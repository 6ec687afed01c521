//! Planning and dispatch for toolchat.
//!
//! Input lines are parsed into a [`Command`]. Explicit commands carry a
//! ready-made [`ActionPlan`]; free text is turned into one by the
//! [`PlanExtractor`]. The [`Dispatcher`] validates a plan into an [`Action`]
//! and routes it to a backend session or to the model, and the
//! [`Orchestrator`] drives the whole sequence for one line at a time.

#![warn(missing_docs, clippy::pedantic)]

mod command;
mod dispatch;
mod error;
mod orchestrator;
mod plan;
mod planner;

pub use command::{Command, HELP};
pub use dispatch::{DISPATCHER_LABEL, Dispatcher};
pub use error::{DispatchError, PlanError};
pub use orchestrator::{Orchestrator, Step};
pub use plan::{
    Action, ActionPlan, ErrorCorrection, NO_PASSWORD, OPEN_NETWORK_AUTH, QrStyle, TemperatureUnit,
    ToolKind,
};
pub use planner::{PLANNER_INSTRUCTION, PlanExtractor, first_json_object, parse_plan};
