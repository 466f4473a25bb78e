use std::time::Instant;

use async_trait::async_trait;
use futures::future::join_all;

use crate::states::{emit, AgentState};
use crate::events::Event;
use crate::memory::AgentMemory;
use crate::tools::{ToolContext, ToolRegistry};
use crate::types::{AgentOutput, ToolCall, ToolResult};

pub struct ActingState;

async fn execute_one(tools: &ToolRegistry, ctx: &ToolContext, call: &ToolCall) -> ToolResult {
    let started = Instant::now();
    let outcome = tools.execute(&call.name, &call.args, ctx).await;
    let latency_ms = started.elapsed().as_millis() as u64;

    match outcome {
        Ok(output) => ToolResult::success(call, output, latency_ms),
        Err(err)   => ToolResult::failure(call, err, latency_ms),
    }
}

#[async_trait]
impl AgentState for ActingState {
    fn name(&self) -> &'static str { "Acting" }

    async fn handle(
        &self,
        memory: &mut AgentMemory,
        tools:  &ToolRegistry,
        ctx:    &ToolContext,
    ) -> Event {
        let calls = std::mem::take(&mut memory.pending_tool_calls);
        if calls.is_empty() {
            memory.error = Some("ActingState called with no pending tool calls".to_string());
            memory.log("Acting", "FATAL_ERROR", "No pending tool calls");
            return Event::fatal_error();
        }

        let ctx = &ctx.for_step(memory.usage);

        for call in &calls {
            let data = format!("tool='{}' args={:?}", call.name, call.args);
            memory.log("Acting", "TOOL_EXECUTE", &data);
            emit(ctx, AgentOutput::ToolCallStarted {
                agent: memory.agent_name.clone(),
                name:  call.name.clone(),
                args:  call.args.clone(),
            });
        }

        let results: Vec<ToolResult> = if memory.config.parallel_tools && calls.len() > 1 {
            join_all(calls.iter().map(|call| execute_one(tools, ctx, call))).await
        } else {
            let mut results = Vec::with_capacity(calls.len());
            for call in &calls {
                results.push(execute_one(tools, ctx, call).await);
            }
            results
        };

        // Sub-agent runs count towards this turn.
        let delegated = ctx.take_delegated();
        if !delegated.trace.is_empty() {
            memory.usage.add(delegated.usage);
            memory.trace.extend(delegated.trace);
            let data = format!("usage={:?} total={:?}", delegated.usage, memory.usage);
            memory.log("Acting", "DELEGATED_USAGE", &data);
        }

        for result in &results {
            let event = if result.success { "TOOL_SUCCESS" } else { "TOOL_FAILURE" };
            let data = format!(
                "tool='{}' latency_ms={} {}",
                result.tool_name, result.latency_ms,
                result.output.chars().take(100).collect::<String>()
            );
            memory.log("Acting", event, &data);
            emit(ctx, AgentOutput::ToolCallFinished {
                agent:   memory.agent_name.clone(),
                name:    result.tool_name.clone(),
                result:  result.output.clone(),
                success: result.success,
            });
        }

        let all_ok = results.iter().all(|r| r.success);
        memory.tool_results = results;

        if all_ok { Event::tool_success() } else { Event::tool_failure() }
    }
}
