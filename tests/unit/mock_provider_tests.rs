/*!
 * Tests for the deterministic mock provider
 */

use subglot::errors::ProviderError;
use subglot::providers::mock::MockProvider;
use subglot::providers::{CompletionRequest, Provider};

/// Translation payloads are answered cue by cue
#[test]
fn test_mockProvider_uppercase_shouldAnswerEveryCue() {
    let provider = MockProvider::uppercase();
    let prompt = r#"{"target_language":"English","cues":[{"id":4,"text":"kiri"},{"id":7,"text":"yama"}]}"#;

    let completion = tokio_test::block_on(provider.complete(CompletionRequest::new(prompt)))
        .expect("mock should answer");

    let reply: serde_json::Value = serde_json::from_str(&completion.text).expect("reply is JSON");
    assert_eq!(reply["translations"][0]["id"], 4);
    assert_eq!(reply["translations"][1]["text"], "YAMA");
    assert_eq!(provider.request_count(), 1);
    assert_eq!(provider.translation_payloads()[0].cues.len(), 2);
}

/// Scripted replies play in order and then repeat the last one
#[tokio::test]
async fn test_mockProvider_scripted_shouldReplayInOrder() {
    let provider = MockProvider::scripted(vec![
        Err(ProviderError::RateLimited("slow down".to_string())),
        Ok("{}".to_string()),
    ]);

    let first = provider.complete(CompletionRequest::new("a")).await;
    let second = provider.complete(CompletionRequest::new("b")).await;
    let third = provider.complete(CompletionRequest::new("c")).await;

    assert!(matches!(first, Err(ProviderError::RateLimited(_))));
    assert_eq!(second.map(|c| c.text).ok().as_deref(), Some("{}"));
    assert!(third.is_ok());
    let prompts: Vec<String> = provider.requests().into_iter().map(|r| r.prompt).collect();
    assert_eq!(prompts, vec!["a", "b", "c"]);
}
