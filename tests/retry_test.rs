//! Retry behaviour of `RetryingLlmCaller` against a mocked model.

use async_trait::async_trait;
use finagent::llm::MockLlmCaller;
use finagent::memory::AgentMemory;
use finagent::{
    investment_plan_agent, AgentEngine, AsyncLlmCaller, LlmResponse, RetryingLlmCaller,
    ToolRegistry,
};
use mockall::mock;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

mock! {
    pub Gemini {}

    #[async_trait]
    impl AsyncLlmCaller for Gemini {
        async fn call_async(
            &self,
            memory: &AgentMemory,
            tools:  &ToolRegistry,
            model:  &str,
        ) -> Result<LlmResponse, String>;
    }
}

/// Fails with `err` for the first `failures` calls, then answers.
fn flaky(failures: usize, err: &'static str, expected_calls: usize) -> MockGemini {
    let count = Arc::new(AtomicUsize::new(0));
    let mut mock = MockGemini::new();
    mock.expect_call_async()
        .times(expected_calls)
        .returning(move |_, _, _| {
            if count.fetch_add(1, Ordering::SeqCst) < failures {
                Err(err.to_string())
            } else {
                Ok(LlmResponse::answer("recovered"))
            }
        });
    mock
}

async fn call(caller: &RetryingLlmCaller) -> Result<LlmResponse, String> {
    let memory = AgentMemory::new("investment_plan_agent", "latest TSLA price");
    caller.call_async(&memory, &ToolRegistry::new(), "gemini-2.5-flash").await
}

#[tokio::test(start_paused = true)]
async fn test_transient_errors_are_retried() {
    let caller = RetryingLlmCaller::new(
        Arc::new(flaky(2, "Gemini API error 503 Service Unavailable: overloaded", 3)),
        3,
    );

    let started = tokio::time::Instant::now();
    let response = call(&caller).await.unwrap();

    assert!(matches!(response, LlmResponse::FinalAnswer { content, .. } if content == "recovered"));
    // 1s then 2s of back-off.
    assert!(started.elapsed() >= std::time::Duration::from_secs(3));
}

#[tokio::test(start_paused = true)]
async fn test_auth_errors_are_not_retried() {
    let err = "Gemini API error 400 Bad Request: API key not valid. Please pass a valid API key.";
    let caller = RetryingLlmCaller::new(Arc::new(flaky(5, err, 1)), 3);

    assert_eq!(call(&caller).await.unwrap_err(), err);
}

#[tokio::test(start_paused = true)]
async fn test_rate_limit_gives_up_after_max_retries() {
    let caller = RetryingLlmCaller::new(
        Arc::new(flaky(10, "Gemini API error 429 Too Many Requests: RESOURCE_EXHAUSTED", 3)),
        2,
    );

    let err = call(&caller).await.unwrap_err();
    assert!(err.starts_with("LLM RATE LIMIT EXCEEDED after 2 retries"), "{}", err);
}

#[tokio::test(start_paused = true)]
async fn test_engine_runs_through_the_retrying_caller() {
    let mock = Arc::new(MockLlmCaller::new(vec![LlmResponse::answer("TSLA is at 250 USD.")]));
    let caller = Arc::new(RetryingLlmCaller::new(mock.clone(), 3));
    let mut engine = AgentEngine::new(investment_plan_agent().unwrap(), caller, "latest TSLA price");

    assert_eq!(engine.run().await.unwrap(), "TSLA is at 250 USD.");
    assert_eq!(mock.call_count(), 1);
}
