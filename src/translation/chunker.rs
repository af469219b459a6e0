/*!
 * Token-bounded partitioning of a cue sequence.
 */

use log::{debug, warn};
use std::sync::Arc;

use super::tokens::{CUE_FRAMING_TOKENS, TokenBudget, TokenEstimator};
use crate::subtitle::Cue;

/// Tokens reserved for the instructions that wrap every request
pub const DEFAULT_REQUEST_OVERHEAD: usize = 400;

/// A contiguous run of cues sent to the model in one request
#[derive(Debug, Clone, PartialEq)]
pub struct Chunk {
    /// 0-based position in the chunk sequence
    pub position: usize,
    /// Cues, in track order
    pub cues: Vec<Cue>,
}

impl Chunk {
    /// Cue indices in order
    pub fn indices(&self) -> Vec<usize> {
        self.cues.iter().map(|cue| cue.index).collect()
    }

    pub fn len(&self) -> usize {
        self.cues.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cues.is_empty()
    }

    /// Cues that carry text worth sending
    pub fn translatable(&self) -> impl Iterator<Item = &Cue> {
        self.cues.iter().filter(|cue| !cue.is_blank())
    }
}

/// Splits cues into chunks that fit a [`TokenBudget`]
#[derive(Clone)]
pub struct Chunker {
    estimator: Arc<dyn TokenEstimator>,
    budget: TokenBudget,
    request_overhead: usize,
}

impl Chunker {
    pub fn new(estimator: Arc<dyn TokenEstimator>, budget: TokenBudget) -> Self {
        Chunker {
            estimator,
            budget,
            request_overhead: DEFAULT_REQUEST_OVERHEAD,
        }
    }

    /// Tokens charged to every chunk before any cue is added
    pub fn with_request_overhead(mut self, tokens: usize) -> Self {
        self.request_overhead = tokens;
        self
    }

    pub fn budget(&self) -> TokenBudget {
        self.budget
    }

    /// Estimated (input, output) cost of one cue
    pub fn cue_cost(&self, cue: &Cue) -> (usize, usize) {
        if cue.is_blank() {
            return (0, 0);
        }
        let tokens = self.estimator.estimate(&cue.text()) + CUE_FRAMING_TOKENS;
        (tokens, tokens)
    }

    /// Partition `cues` in order. `context_tokens` is the cost of the
    /// context and glossary snapshot that accompanies every chunk.
    ///
    /// A cue never straddles two chunks; a cue that alone exceeds the
    /// budget gets a chunk of its own.
    pub fn chunk(&self, cues: &[Cue], context_tokens: usize) -> Vec<Chunk> {
        let fixed = self.request_overhead + context_tokens;
        if fixed >= self.budget.input {
            warn!(
                "Context and instructions ({} tokens) fill the input budget of {} tokens; every cue will be sent alone",
                fixed, self.budget.input
            );
        }

        let mut chunks: Vec<Chunk> = Vec::new();
        let mut current: Vec<Cue> = Vec::new();
        let mut input_used = fixed;
        let mut output_used = 0;

        for cue in cues {
            let (input_cost, output_cost) = self.cue_cost(cue);
            let overflows = input_used + input_cost > self.budget.input
                || output_used + output_cost > self.budget.output;

            if overflows && !current.is_empty() {
                chunks.push(Chunk {
                    position: chunks.len(),
                    cues: std::mem::take(&mut current),
                });
                input_used = fixed;
                output_used = 0;
            }

            if current.is_empty() && (fixed + input_cost > self.budget.input || output_cost > self.budget.output) {
                debug!("Cue {} is oversized ({} tokens), placing in its own chunk", cue.index, input_cost);
            }

            current.push(cue.clone());
            input_used += input_cost;
            output_used += output_cost;
        }

        if !current.is_empty() {
            chunks.push(Chunk {
                position: chunks.len(),
                cues: current,
            });
        }

        if log::max_level() >= log::LevelFilter::Debug {
            for chunk in &chunks {
                debug!(
                    "Chunk {}: {} cues ({}..={})",
                    chunk.position + 1,
                    chunk.len(),
                    chunk.cues.first().map_or(0, |c| c.index),
                    chunk.cues.last().map_or(0, |c| c.index)
                );
            }
        }

        chunks
    }
}
