//! Integration tests for the agent engine.
//!
//! All tests use `MockLlmCaller`, so no network calls are made.

use finagent::budget::{TokenBudget, TokenUsage};
use finagent::llm::MockLlmCaller;
use finagent::memory::AgentMemory;
use finagent::states::{AgentState, IdleState, PlanningState};
use finagent::transitions::{build_transition_table, is_valid_transition};
use finagent::types::AgentOutput;
use finagent::{
    AgentConfig, AgentEngine, AgentError, Event, LlmAgent, LlmResponse, Message, State, ToolCall,
    ToolContext, ToolRegistry,
};
use serde_json::json;
use std::sync::Arc;

// ─────────────────────────────────────────────────────────────────────────────
// Test helpers
// ─────────────────────────────────────────────────────────────────────────────

fn make_agent() -> Arc<LlmAgent> {
    let agent = LlmAgent::builder("helper")
        .model("gemini-2.5-flash")
        .instruction("Answer using the tools.")
        .function_tool(
            "lookup",
            "Looks a key up",
            json!({ "type": "object", "properties": { "key": { "type": "string" } } }),
            Box::new(|args| {
                let key = args.get("key").and_then(|v| v.as_str()).unwrap_or("none");
                Ok(format!("value-of-{}", key))
            }),
        )
        .function_tool(
            "broken",
            "Always fails",
            json!({ "type": "object", "properties": {} }),
            Box::new(|_| Err("backend unavailable".to_string())),
        )
        .build()
        .expect("agent should build");
    Arc::new(agent)
}

fn make_engine(responses: Vec<LlmResponse>) -> (AgentEngine, Arc<MockLlmCaller>) {
    let mock = Arc::new(MockLlmCaller::new(responses));
    let engine = AgentEngine::new(make_agent(), mock.clone(), "what is x?");
    (engine, mock)
}

fn with_usage(response: LlmResponse, input: u32, output: u32) -> LlmResponse {
    let usage = Some(TokenUsage::new(input, output));
    match response {
        LlmResponse::ToolCalls { tools, .. } => LlmResponse::ToolCalls { tools, usage },
        LlmResponse::FinalAnswer { content, citations, .. } => {
            LlmResponse::FinalAnswer { content, citations, usage }
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Handlers
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_idle_to_planning_transition() {
    let mut memory = AgentMemory::new("helper", "task");
    let ctx = ToolContext::new(Arc::new(MockLlmCaller::new(vec![])), AgentConfig::default());

    let event = IdleState.handle(&mut memory, &ToolRegistry::new(), &ctx).await;
    assert_eq!(event, Event::start());

    let table = build_transition_table();
    assert_eq!(table.get(&(State::idle(), Event::start())), Some(&State::planning()));
    assert!(!is_valid_transition(&table, &State::done(), &Event::start()));
}

#[tokio::test]
async fn test_planning_records_final_answer() {
    let mut memory = AgentMemory::new("helper", "task").with_model("gemini-2.5-flash");
    let mock = Arc::new(MockLlmCaller::new(vec![LlmResponse::answer("42")]));
    let ctx = ToolContext::new(mock.clone(), AgentConfig::default());

    let event = PlanningState.handle(&mut memory, &ToolRegistry::new(), &ctx).await;

    assert_eq!(event, Event::llm_final_answer());
    assert_eq!(memory.final_answer.as_deref(), Some("42"));
    assert_eq!(memory.step, 1);
    assert_eq!(mock.model_for_call(0).as_deref(), Some("gemini-2.5-flash"));
}

// ─────────────────────────────────────────────────────────────────────────────
// Full runs
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test(flavor = "multi_thread")]
async fn test_tool_call_then_answer() {
    let (mut engine, mock) = make_engine(vec![
        LlmResponse::tool_call(ToolCall::new("lookup").arg("key", "x")),
        LlmResponse::answer("x is value-of-x"),
    ]);

    let answer = engine.run().await.unwrap();

    assert_eq!(answer, "x is value-of-x");
    assert_eq!(engine.current_state(), &State::done());
    assert_eq!(mock.call_count(), 2);

    let history = &engine.memory.history;
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].tool.name, "lookup");
    assert_eq!(history[0].tool.id.as_deref(), Some("call_1_0"));
    assert_eq!(history[0].observation, "SUCCESS: value-of-x");

    // user, model(call), tool(result), model(answer)
    let messages = &engine.memory.messages;
    assert_eq!(messages.len(), 4);
    assert_eq!(messages[0], Message::user("what is x?"));
    assert!(matches!(&messages[1], Message::Model { tool_calls, .. } if tool_calls.len() == 1));
    assert!(matches!(&messages[2], Message::Tool { results } if results[0].success));
    assert_eq!(messages[3], Message::model_text("x is value-of-x"));

    // The second model call saw the tool result.
    assert_eq!(mock.calls()[1].message_count, 3);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_tool_failure_is_observed_and_recovered() {
    let (mut engine, _mock) = make_engine(vec![
        LlmResponse::tool_call(ToolCall::new("broken")),
        LlmResponse::tool_call(ToolCall::new("missing_tool")),
        LlmResponse::answer("could not look it up"),
    ]);

    let answer = engine.run().await.unwrap();
    assert_eq!(answer, "could not look it up");

    let history = &engine.memory.history;
    assert_eq!(history.len(), 2);
    assert!(!history[0].success);
    assert_eq!(history[0].observation, "ERROR: backend unavailable");
    assert_eq!(history[1].observation, "ERROR: Tool 'missing_tool' not found in registry");
    assert_eq!(engine.trace().with_event("TOOL_FAILURE").len(), 2);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_max_steps_fails_the_turn() {
    let (engine, mock) = make_engine(vec![
        LlmResponse::tool_call(ToolCall::new("lookup").arg("key", "a")),
        LlmResponse::tool_call(ToolCall::new("lookup").arg("key", "b")),
        LlmResponse::tool_call(ToolCall::new("lookup").arg("key", "c")),
    ]);
    let mut engine = engine.with_config(AgentConfig { max_steps: 2, ..Default::default() });

    let err = engine.run().await.unwrap_err();

    assert!(matches!(&err, AgentError::AgentFailed(msg) if msg.contains("Max steps 2")));
    assert_eq!(engine.current_state(), &State::error());
    assert_eq!(mock.call_count(), 2);
    assert_eq!(engine.trace().with_event("AGENT_FAILED").len(), 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_budget_exceeded_fails_the_turn() {
    let (engine, _mock) = make_engine(vec![
        with_usage(LlmResponse::tool_call(ToolCall::new("lookup").arg("key", "a")), 80, 20),
        with_usage(LlmResponse::answer("never reached"), 80, 20),
    ]);
    let mut engine = engine.with_config(AgentConfig {
        budget: Some(TokenBudget::new(150)),
        ..Default::default()
    });

    let err = engine.run().await.unwrap_err();

    assert!(matches!(&err, AgentError::AgentFailed(msg) if msg.contains("Token budget exceeded")));
    assert_eq!(engine.memory.usage.total_tokens, 200);
    assert!(engine.memory.final_answer.is_none());
}

#[tokio::test(flavor = "multi_thread")]
async fn test_llm_error_fails_the_turn() {
    let (mut engine, _mock) = make_engine(vec![]);

    let err = engine.run().await.unwrap_err();

    assert!(matches!(&err, AgentError::AgentFailed(msg) if msg.starts_with("LLM error:")));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_empty_answer_is_retried() {
    let (mut engine, mock) = make_engine(vec![
        LlmResponse::answer("   "),
        LlmResponse::ToolCalls { tools: vec![], usage: None },
        LlmResponse::answer("finally"),
    ]);

    assert_eq!(engine.run().await.unwrap(), "finally");
    assert_eq!(mock.call_count(), 3);
    assert_eq!(engine.memory.step, 3);
    assert_eq!(engine.trace().with_event("ANSWER_EMPTY").len(), 2);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_parallel_calls_share_one_tool_message() {
    for parallel in [true, false] {
        let (engine, _mock) = make_engine(vec![
            LlmResponse::ToolCalls {
                tools: vec![
                    ToolCall::new("lookup").arg("key", "a"),
                    ToolCall::new("broken"),
                    ToolCall::new("lookup").arg("key", "b"),
                ],
                usage: None,
            },
            LlmResponse::answer("done"),
        ]);
        let mut engine = engine.with_config(AgentConfig { parallel_tools: parallel, ..Default::default() });

        engine.run().await.unwrap();

        let Message::Tool { results } = &engine.memory.messages[2] else {
            panic!("expected a tool message, got {:?}", engine.memory.messages[2]);
        };
        let outputs: Vec<&str> = results.iter().map(|r| r.output.as_str()).collect();
        assert_eq!(outputs, vec![
            "SUCCESS: value-of-a",
            "ERROR: backend unavailable",
            "SUCCESS: value-of-b",
        ]);
        let ids: Vec<_> = results.iter().map(|r| r.id.clone().unwrap()).collect();
        assert_eq!(ids, vec!["call_1_0", "call_1_1", "call_1_2"]);
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn test_history_is_sent_ahead_of_the_request() {
    let (engine, mock) = make_engine(vec![LlmResponse::answer("still x")]);
    let mut engine = engine.with_history(vec![
        Message::user("remember x"),
        Message::model_text("noted"),
    ]);

    engine.run().await.unwrap();

    assert_eq!(mock.calls()[0].message_count, 3);
    assert_eq!(engine.memory.messages.len(), 4);
    assert_eq!(engine.memory.messages[2], Message::user("what is x?"));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_progress_events_are_streamed() {
    let (engine, _mock) = make_engine(vec![
        LlmResponse::tool_call(ToolCall::new("lookup").arg("key", "x")),
        LlmResponse::answer("ok"),
    ]);
    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
    let mut engine = engine.with_output(tx);

    engine.run().await.unwrap();
    drop(engine);

    let mut outputs = Vec::new();
    while let Some(output) = rx.recv().await {
        outputs.push(output);
    }

    assert!(matches!(&outputs[0], AgentOutput::StateStarted { state, .. } if *state == State::idle()));
    assert!(outputs.iter().any(|o| matches!(o,
        AgentOutput::ToolCallStarted { name, .. } if name == "lookup")));
    assert!(outputs.iter().any(|o| matches!(o,
        AgentOutput::ToolCallFinished { success: true, .. })));
    assert!(matches!(outputs.last(), Some(AgentOutput::FinalAnswer { agent, content })
        if agent == "helper" && content == "ok"));
}
