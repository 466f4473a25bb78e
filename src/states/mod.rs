use std::collections::HashMap;

use async_trait::async_trait;

use crate::events::Event;
use crate::memory::AgentMemory;
use crate::tools::{ToolContext, ToolRegistry};
use crate::types::AgentOutput;

mod idle;
mod planning;
mod acting;
mod observing;
mod done;
mod error;

pub use idle::IdleState;
pub use planning::PlanningState;
pub use acting::ActingState;
pub use observing::ObservingState;
pub use done::DoneState;
pub use error::ErrorState;

/// The contract every state must fulfill.
///
/// # Implementing a State
///
/// 1. `handle()` performs the state's work using only `memory`, `tools`, and `ctx`.
/// 2. `handle()` MUST return an Event. Never panic.
/// 3. If work fails non-fatally (tool error, empty answer), record it in
///    `memory` and return the matching failure Event. Failure is data.
/// 4. Always call `memory.log()` at least once per handle() call.
#[async_trait]
pub trait AgentState: Send + Sync {
    /// Must match the key used in the engine's handler map.
    fn name(&self) -> &'static str;

    async fn handle(
        &self,
        memory: &mut AgentMemory,
        tools:  &ToolRegistry,
        ctx:    &ToolContext,
    ) -> Event;
}

/// One handler per built-in state.
pub fn default_handlers() -> HashMap<&'static str, Box<dyn AgentState>> {
    let handlers: Vec<Box<dyn AgentState>> = vec![
        Box::new(IdleState),
        Box::new(PlanningState),
        Box::new(ActingState),
        Box::new(ObservingState),
        Box::new(DoneState),
        Box::new(ErrorState),
    ];
    handlers.into_iter().map(|h| (h.name(), h)).collect()
}

pub(crate) fn emit(ctx: &ToolContext, output: AgentOutput) {
    if let Some(tx) = &ctx.output_tx {
        let _ = tx.send(output);
    }
}
