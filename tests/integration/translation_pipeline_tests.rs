/*!
 * Integration tests for the extraction and translation stages
 */

use anyhow::Result;
use indicatif::ProgressBar;
use std::sync::Arc;

use subglot::errors::{ChunkFailure, TranslationError, ValidationFailure};
use subglot::providers::CompletionRequest;
use subglot::providers::mock::MockProvider;
use subglot::subtitle::{self, SubtitleFormat, Track};
use subglot::translation::prompts::TranslationPayload;
use subglot::translation::{
    CancelFlag, Glossary, GlossaryEntry, HeuristicEstimator, TranslationContext, TranslationPipeline, UsageTracker,
};

use crate::common;

fn pipeline(provider: Arc<MockProvider>) -> TranslationPipeline {
    TranslationPipeline::new(
        provider,
        Arc::new(HeuristicEstimator::default()),
        Arc::new(UsageTracker::new()),
        common::fast_settings("en"),
    )
    .expect("valid settings")
}

fn sample_track() -> Track {
    subtitle::parse_str(common::SAMPLE_SRT, SubtitleFormat::Srt).expect("sample parses")
}

fn is_extraction(request: &CompletionRequest) -> bool {
    serde_json::from_str::<TranslationPayload>(&request.prompt).is_err()
}

/// Every cue is translated and timings are untouched
#[tokio::test]
async fn test_pipeline_translateTrack_withUppercaseModel_shouldTranslateInOrder() -> Result<()> {
    common::init_logging();
    let provider = Arc::new(MockProvider::uppercase());
    let pipeline = pipeline(provider.clone());
    let mut context = TranslationContext::default();

    let translated = pipeline
        .translate_track(&sample_track(), &mut context, &CancelFlag::new(), &ProgressBar::hidden())
        .await?;

    let cues: Vec<(usize, u64, u64, String)> = translated
        .cues()
        .iter()
        .map(|c| (c.index, c.start_ms, c.end_ms, c.text()))
        .collect();
    assert_eq!(
        cues,
        vec![
            (1, 1_000, 2_000, "A".to_string()),
            (2, 2_500, 4_000, "B".to_string()),
            (3, 5_000, 6_250, "C".to_string()),
        ]
    );
    assert_eq!(provider.request_count(), 1);
    assert!(subtitle::serialize(&translated).starts_with("1\n00:00:01,000 --> 00:00:02,000\nA\n"));
    Ok(())
}

/// A reply that keeps dropping a cue exhausts the retries of its chunk
#[tokio::test]
async fn test_pipeline_translateTrack_withMissingCue_shouldExhaustRetries() {
    let provider = Arc::new(MockProvider::new(|request, _| {
        Ok(MockProvider::translate_with(request, |text| text.to_uppercase())
            .replace(r#"{"id":2,"text":"B"},"#, ""))
    }));
    let pipeline = pipeline(provider.clone());
    let mut context = TranslationContext::default();

    let result = pipeline
        .translate_track(&sample_track(), &mut context, &CancelFlag::new(), &ProgressBar::hidden())
        .await;

    match result {
        Err(TranslationError::RetriesExhausted { chunk, attempts, last }) => {
            assert_eq!(chunk, 0);
            assert_eq!(attempts, 3);
            assert_eq!(last, ChunkFailure::Validation(ValidationFailure::MissingIndex(2)));
        }
        other => panic!("expected exhausted retries, got {:?}", other.map(|t| t.len())),
    }
    assert_eq!(provider.request_count(), 3);
}

/// A transient failure is retried and the chunk then succeeds
#[tokio::test]
async fn test_pipeline_translateTrack_withOneFailure_shouldRetryChunk() -> Result<()> {
    let provider = Arc::new(MockProvider::new(|request, call| {
        if call == 0 {
            Err(subglot::errors::ProviderError::from_status(503, "overloaded"))
        } else {
            Ok(MockProvider::translate_with(request, |text| format!("{}!", text)))
        }
    }));
    let pipeline = pipeline(provider.clone());

    let translated = pipeline
        .translate_track(
            &sample_track(),
            &mut TranslationContext::default(),
            &CancelFlag::new(),
            &ProgressBar::hidden(),
        )
        .await?;

    let texts: Vec<String> = translated.cues().iter().map(|c| c.text()).collect();
    assert_eq!(texts, vec!["a!", "b!", "c!"]);
    assert_eq!(provider.request_count(), 2);
    Ok(())
}

/// Empty lines inside a translated cue never split it in the written file
#[tokio::test]
async fn test_pipeline_translateTrack_withBlankLinesInReply_shouldKeepCueCountOnDisk() -> Result<()> {
    let provider = Arc::new(MockProvider::new(|request, _| {
        Ok(MockProvider::translate_with(request, |text| format!("{}-line1\n\n{}-line2", text, text)))
    }));
    let pipeline = pipeline(provider);
    let track = sample_track();

    let translated = pipeline
        .translate_track(&track, &mut TranslationContext::default(), &CancelFlag::new(), &ProgressBar::hidden())
        .await?;

    let written = subtitle::serialize(&translated);
    let reparsed = subtitle::parse_str(&written, SubtitleFormat::Srt)?;
    assert_eq!(reparsed.len(), track.len());
    assert_eq!(reparsed.cues()[0].text(), "a-line1\na-line2");
    assert_eq!(reparsed.cues()[2].start_ms, 5_000);
    Ok(())
}

/// A track tagged with its language names it in every request
#[tokio::test]
async fn test_pipeline_translateTrack_withTaggedTrack_shouldSendSourceLanguage() -> Result<()> {
    let provider = Arc::new(MockProvider::uppercase());
    let pipeline = pipeline(provider.clone());
    let track = sample_track().with_source_language("ja");

    let translated = pipeline
        .translate_track(&track, &mut TranslationContext::default(), &CancelFlag::new(), &ProgressBar::hidden())
        .await?;

    assert_eq!(translated.source_language(), Some("ja"));
    let payloads = provider.translation_payloads();
    assert_eq!(payloads[0].source_language.as_deref(), Some("Japanese"));
    Ok(())
}

/// Stored glossary terms reach every translation request
#[tokio::test]
async fn test_pipeline_translateTrack_withGlossary_shouldInjectTerms() -> Result<()> {
    let provider = Arc::new(MockProvider::uppercase());
    let pipeline = pipeline(provider.clone());
    let mut glossary = Glossary::new();
    glossary.insert(GlossaryEntry::new("霧山", "Kiri Mountain"));
    let mut context = TranslationContext::new(Default::default(), glossary);

    pipeline
        .translate_track(&sample_track(), &mut context, &CancelFlag::new(), &ProgressBar::hidden())
        .await?;

    let payloads = provider.translation_payloads();
    assert_eq!(payloads.len(), 1);
    assert_eq!(payloads[0].glossary.get("霧山").map(String::as_str), Some("Kiri Mountain"));
    assert!(provider.requests()[0].prompt.contains(r#""霧山":"Kiri Mountain""#));
    Ok(())
}

/// Terms flagged in a reply are added to the context
#[tokio::test]
async fn test_pipeline_translateTrack_withNewTerms_shouldGrowContext() -> Result<()> {
    let provider = Arc::new(MockProvider::new(|request, _| {
        let translated = MockProvider::translate_with(request, |text| text.to_uppercase());
        let mut reply: serde_json::Value = serde_json::from_str(&translated).expect("mock reply is JSON");
        reply["new_terms"] = serde_json::json!([
            { "source": "霧山", "target": "Kiri Mountain" },
            { "source": "愛子", "target": "Aiko", "kind": "character" }
        ]);
        Ok(reply.to_string())
    }));
    let pipeline = pipeline(provider);
    let mut context = TranslationContext::default();

    pipeline
        .translate_track(&sample_track(), &mut context, &CancelFlag::new(), &ProgressBar::hidden())
        .await?;

    assert_eq!(context.glossary.get("霧山").map(|e| e.target.as_str()), Some("Kiri Mountain"));
    assert_eq!(context.note.characters.get("愛子").map(String::as_str), Some("Aiko"));
    Ok(())
}

/// An empty track needs no request
#[tokio::test]
async fn test_pipeline_translateTrack_withEmptyTrack_shouldSkipModel() -> Result<()> {
    let provider = Arc::new(MockProvider::uppercase());
    let pipeline = pipeline(provider.clone());
    let empty = Track::new(SubtitleFormat::Srt, Vec::new())?;

    let translated = pipeline
        .translate_track(&empty, &mut TranslationContext::default(), &CancelFlag::new(), &ProgressBar::hidden())
        .await?;

    assert!(translated.is_empty());
    assert_eq!(provider.request_count(), 0);
    Ok(())
}

/// A raised cancel flag stops the run before any request
#[tokio::test]
async fn test_pipeline_translateTrack_whenCancelled_shouldStop() {
    let provider = Arc::new(MockProvider::uppercase());
    let pipeline = pipeline(provider.clone());
    let cancel = CancelFlag::new();
    cancel.cancel();

    let result = pipeline
        .translate_track(&sample_track(), &mut TranslationContext::default(), &cancel, &ProgressBar::hidden())
        .await;

    assert!(matches!(result, Err(TranslationError::Cancelled)));
    assert_eq!(provider.request_count(), 0);
}

/// Extraction builds a glossary from the model's answer
#[tokio::test]
async fn test_pipeline_extractContext_withGlossaryReply_shouldFillContext() {
    let provider = Arc::new(MockProvider::new(|request, _| {
        assert!(is_extraction(request));
        Ok(r#"Here is the context:
```json
{"title": "Kiri no Yama",
 "characters": [{"source": "愛子", "target": "Aiko"}],
 "glossary": [{"original": "霧山", "translated": "Kiri Mountain", "description": "mountain"}]}
```"#
            .to_string())
    }));
    let pipeline = pipeline(provider.clone());
    let track = sample_track();

    let context = pipeline
        .extract_context(track.cues(), Some("Kiri no Yama"), TranslationContext::default(), &CancelFlag::new())
        .await;

    assert_eq!(context.note.title.as_deref(), Some("Kiri no Yama"));
    assert_eq!(context.note.characters.get("愛子").map(String::as_str), Some("Aiko"));
    assert_eq!(context.glossary.get("霧山").map(|e| e.target.as_str()), Some("Kiri Mountain"));
    assert_eq!(provider.request_count(), 1);
}

/// A failing extraction keeps the seed context instead of failing
#[tokio::test]
async fn test_pipeline_extractContext_withFailingModel_shouldDegrade() {
    let provider = Arc::new(MockProvider::failing(subglot::errors::ProviderError::Timeout(
        "no answer".to_string(),
    )));
    let pipeline = pipeline(provider.clone());
    let mut seed = TranslationContext::default();
    seed.glossary.insert(GlossaryEntry::new("霧山", "Kiri Mountain"));

    let context = pipeline
        .extract_context(sample_track().cues(), None, seed.clone(), &CancelFlag::new())
        .await;

    assert_eq!(context, seed);
    assert_eq!(provider.request_count(), 3);
}

/// A budget sized for two cues splits a three-cue track into 2 + 1
#[tokio::test]
async fn test_pipeline_translateTrack_withTwoCueBudget_shouldSplitAndReassemble() -> Result<()> {
    let provider = Arc::new(MockProvider::uppercase());
    // "a" costs one token plus framing; no overhead, no margin
    let settings = subglot::translation::PipelineSettings {
        max_input_tokens: 18,
        safety_margin: 0.0,
        request_overhead: 0,
        ..common::fast_settings("en")
    };
    let pipeline = TranslationPipeline::new(
        provider.clone(),
        Arc::new(HeuristicEstimator::default()),
        Arc::new(UsageTracker::new()),
        settings,
    )?;

    let translated = pipeline
        .translate_track(
            &sample_track(),
            &mut TranslationContext::default(),
            &CancelFlag::new(),
            &ProgressBar::hidden(),
        )
        .await?;

    let requested: Vec<Vec<usize>> = provider
        .translation_payloads()
        .iter()
        .map(|p| p.cues.iter().map(|c| c.id).collect())
        .collect();
    assert_eq!(requested, vec![vec![1, 2], vec![3]]);

    let texts: Vec<String> = translated.cues().iter().map(|c| c.text()).collect();
    assert_eq!(texts, vec!["A", "B", "C"]);
    let timings: Vec<(u64, u64)> = translated.cues().iter().map(|c| (c.start_ms, c.end_ms)).collect();
    assert_eq!(timings, vec![(1_000, 2_000), (2_500, 4_000), (5_000, 6_250)]);
    Ok(())
}
