/*!
 * Property tests for token-bounded chunking
 */

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::Arc;

use subglot::subtitle::Cue;
use subglot::translation::{Chunker, HeuristicEstimator, TokenBudget, TokenEstimator};

const WORDS: &[&str] = &["mist", "霧山", "дорога", "we climb", "待って", "", "the old temple bell", "ok"];

fn random_cues(rng: &mut StdRng, count: usize) -> Vec<Cue> {
    let mut start = 0;
    (1..=count)
        .map(|index| {
            let words = rng.random_range(0..12);
            let text: Vec<&str> = (0..words).map(|_| WORDS[rng.random_range(0..WORDS.len())]).collect();
            start += rng.random_range(500..3_000);
            Cue::new(index, start, start + 1_200, &text.join(" "))
        })
        .collect()
}

fn chunker(max_input: usize, max_output: usize) -> Chunker {
    let estimator: Arc<dyn TokenEstimator> = Arc::new(HeuristicEstimator::default());
    let budget = TokenBudget::new(max_input, max_output, 0.1).expect("valid budget");
    Chunker::new(estimator, budget).with_request_overhead(20)
}

/// Concatenating the chunks gives back the input, and every multi-cue
/// chunk stays inside both budgets
#[test]
fn test_chunker_chunk_withRandomTracks_shouldPartitionWithinBudget() {
    let mut rng = StdRng::seed_from_u64(0x5eed);

    for round in 0..50 {
        let count = rng.random_range(0..80);
        let cues = random_cues(&mut rng, count);
        let max_input = rng.random_range(40..400);
        let max_output = rng.random_range(20..200);
        let context_tokens = rng.random_range(0..30);
        let chunker = chunker(max_input, max_output);
        let budget = chunker.budget();

        let chunks = chunker.chunk(&cues, context_tokens);

        let flattened: Vec<Cue> = chunks.iter().flat_map(|c| c.cues.clone()).collect();
        assert_eq!(flattened, cues, "round {}: chunks must partition the track", round);

        for (position, chunk) in chunks.iter().enumerate() {
            assert_eq!(chunk.position, position);
            assert!(!chunk.is_empty(), "round {}: empty chunk", round);
            if chunk.len() > 1 {
                let (input, output) = chunk
                    .cues
                    .iter()
                    .map(|cue| chunker.cue_cost(cue))
                    .fold((0, 0), |(i, o), (ci, co)| (i + ci, o + co));
                assert!(20 + context_tokens + input <= budget.input, "round {}: input overflow", round);
                assert!(output <= budget.output, "round {}: output overflow", round);
            }
        }
    }
}

/// A budget too small for any cue still yields one chunk per cue
#[test]
fn test_chunker_chunk_withTinyBudget_shouldIsolateEveryCue() {
    let cues: Vec<Cue> = (1..=4)
        .map(|i| Cue::new(i, i as u64 * 1_000, i as u64 * 1_000 + 900, "a long line of dialogue that will not fit"))
        .collect();

    let chunks = chunker(30, 10).chunk(&cues, 0);

    assert_eq!(chunks.len(), 4);
    assert!(chunks.iter().all(|c| c.len() == 1));
}

/// A bigger context leaves less room for cues
#[test]
fn test_chunker_chunk_withLargerContext_shouldNotProduceFewerChunks() {
    let mut rng = StdRng::seed_from_u64(42);
    let cues = random_cues(&mut rng, 60);
    let chunker = chunker(300, 150);

    let without_context = chunker.chunk(&cues, 0).len();
    let with_context = chunker.chunk(&cues, 120).len();

    assert!(with_context >= without_context);
}
