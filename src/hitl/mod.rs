//! Human-in-the-loop: approval gates, the pending-task registry and the
//! decision API used by callers to resume suspended runs.

mod api;
mod flow;
mod gate;
mod store;
mod task;

pub use api::Hitl;
pub use flow::{FlowInterceptor, PauseAfter, PauseBefore};
pub use gate::{HitlGate, Validator};
pub use store::{MemoryPendingTaskStore, PendingTaskStore};
pub use task::{Decision, DecisionAction, PendingTask};
