/*!
 * Integration tests for translating chunks in parallel against a frozen glossary
 */

use anyhow::Result;
use indicatif::ProgressBar;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;

use subglot::errors::{ChunkFailure, TranslationError, ValidationFailure};
use subglot::providers::CompletionRequest;
use subglot::providers::mock::MockProvider;
use subglot::subtitle::Cue;
use subglot::translation::prompts::TranslationPayload;
use subglot::translation::translation_pass::{TranslationConfig, TranslationPass};
use subglot::translation::{CancelFlag, Chunk, GlossaryEntry, RetryPolicy, TranslationContext, UsageTracker};

use crate::common;

/// One single-cue chunk per text
fn single_cue_chunks(texts: &[&str]) -> Vec<Chunk> {
    texts
        .iter()
        .enumerate()
        .map(|(position, text)| Chunk {
            position,
            cues: vec![Cue::new(position + 1, position as u64 * 1000, position as u64 * 1000 + 900, text)],
        })
        .collect()
}

fn parallel_pass(provider: Arc<MockProvider>, concurrency: usize) -> TranslationPass {
    TranslationPass::new(
        provider,
        RetryPolicy::immediate(3),
        Arc::new(UsageTracker::new()),
        TranslationConfig {
            concurrency,
            ..TranslationConfig::default()
        },
    )
}

fn first_cue_id(request: &CompletionRequest) -> usize {
    serde_json::from_str::<TranslationPayload>(&request.prompt)
        .ok()
        .and_then(|payload| payload.cues.first().map(|cue| cue.id))
        .unwrap_or(0)
}

fn seeded_context() -> TranslationContext {
    let mut context = TranslationContext::default();
    context.glossary.insert(GlossaryEntry::new("霧山", "Kiri Mountain"));
    context
}

/// Earlier chunks answer last, yet results, snapshot and merges stay in chunk order
#[tokio::test]
async fn test_translationPass_translate_withConcurrency_shouldKeepChunkOrder() -> Result<()> {
    common::init_logging();
    let completed = Arc::new(Mutex::new(Vec::new()));
    let completed_by_mock = completed.clone();

    let provider = Arc::new(
        MockProvider::new(move |request, _| {
            let id = first_cue_id(request);
            completed_by_mock.lock().push(id);

            let translated = MockProvider::translate_with(request, |text| text.to_uppercase());
            let mut reply: serde_json::Value = serde_json::from_str(&translated).expect("mock reply is JSON");
            reply["new_terms"] = match id {
                1 => serde_json::json!([{ "source": "灯", "target": "Lantern" }]),
                2 => serde_json::json!([{ "source": "愛子", "target": "Aiko", "kind": "character" }]),
                3 => serde_json::json!([{ "source": "灯", "target": "Lamp" }]),
                _ => serde_json::json!([]),
            };
            Ok(reply.to_string())
        })
        .with_delay(|request| match first_cue_id(request) {
            1 => Duration::from_millis(150),
            2 => Duration::from_millis(80),
            _ => Duration::from_millis(5),
        }),
    );
    let pass = parallel_pass(provider.clone(), 3);
    let chunks = single_cue_chunks(&["a", "b", "c", "d"]);
    let mut context = seeded_context();

    let results = pass
        .translate(&chunks, None, &mut context, &CancelFlag::new(), &ProgressBar::hidden())
        .await?;

    // Replies arrived out of order
    let completed = completed.lock().clone();
    assert_eq!(completed.len(), 4);
    assert!(
        completed.iter().position(|id| *id == 3) < completed.iter().position(|id| *id == 1),
        "chunk 3 should answer before chunk 1, got {:?}",
        completed
    );

    let positions: Vec<usize> = results.iter().map(|r| r.position).collect();
    assert_eq!(positions, vec![0, 1, 2, 3]);
    let texts: Vec<String> = results.iter().flat_map(|r| r.cues.iter().map(|(_, text)| text.clone())).collect();
    assert_eq!(texts, vec!["A", "B", "C", "D"]);

    // Every request saw the glossary as it was before the phase
    let payloads = provider.translation_payloads();
    assert_eq!(payloads.len(), 4);
    for payload in &payloads {
        assert_eq!(payload.glossary.len(), 1);
        assert_eq!(payload.glossary.get("霧山").map(String::as_str), Some("Kiri Mountain"));
        assert!(payload.context.characters.is_empty());
    }

    // Flagged terms merged afterwards; chunk 3 follows chunk 1 and wins
    assert_eq!(context.glossary.get("灯").map(|e| e.target.as_str()), Some("Lamp"));
    assert_eq!(context.note.characters.get("愛子").map(String::as_str), Some("Aiko"));
    assert_eq!(context.glossary.len(), 2);
    Ok(())
}

/// A chunk that exhausts its retries fails the whole run and merges nothing
#[tokio::test]
async fn test_translationPass_translate_withConcurrencyAndExhaustedChunk_shouldFail() {
    let provider = Arc::new(
        MockProvider::new(|request, _| {
            let translated = MockProvider::translate_with(request, |text| text.to_uppercase());
            if first_cue_id(request) == 2 {
                return Ok(r#"{"translations": []}"#.to_string());
            }
            let mut reply: serde_json::Value = serde_json::from_str(&translated).expect("mock reply is JSON");
            reply["new_terms"] = serde_json::json!([{ "source": "灯", "target": "Lantern" }]);
            Ok(reply.to_string())
        })
        .with_delay(|_| Duration::from_millis(5)),
    );
    let pass = parallel_pass(provider.clone(), 3);
    let chunks = single_cue_chunks(&["a", "b", "c"]);
    let mut context = seeded_context();

    let result = pass
        .translate(&chunks, None, &mut context, &CancelFlag::new(), &ProgressBar::hidden())
        .await;

    match result {
        Err(TranslationError::RetriesExhausted { chunk, attempts, last }) => {
            assert_eq!(chunk, 1);
            assert_eq!(attempts, 3);
            assert_eq!(last, ChunkFailure::Validation(ValidationFailure::MissingIndex(2)));
        }
        other => panic!("expected exhausted retries, got {:?}", other.map(|r| r.len())),
    }
    assert_eq!(context, seeded_context());
}

/// A concurrency of one keeps the live glossary between chunks
#[tokio::test]
async fn test_translationPass_translate_withoutConcurrency_shouldGrowGlossaryBetweenChunks() -> Result<()> {
    let provider = Arc::new(MockProvider::new(|request, _| {
        let translated = MockProvider::translate_with(request, |text| text.to_uppercase());
        let mut reply: serde_json::Value = serde_json::from_str(&translated).expect("mock reply is JSON");
        if first_cue_id(request) == 1 {
            reply["new_terms"] = serde_json::json!([{ "source": "灯", "target": "Lantern" }]);
        }
        Ok(reply.to_string())
    }));
    let pass = parallel_pass(provider.clone(), 1);
    let mut context = seeded_context();

    pass.translate(
        &single_cue_chunks(&["a", "b"]),
        None,
        &mut context,
        &CancelFlag::new(),
        &ProgressBar::hidden(),
    )
    .await?;

    let payloads = provider.translation_payloads();
    assert!(payloads[0].glossary.get("灯").is_none());
    assert_eq!(payloads[1].glossary.get("灯").map(String::as_str), Some("Lantern"));
    Ok(())
}
