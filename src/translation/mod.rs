/*!
 * Translation core.
 *
 * - `tokens`: token estimation and budgets
 * - `chunker`: token-bounded partitioning of cues
 * - `glossary`: glossary and context accumulator
 * - `store`: persisted context under `.translated/`
 * - `prompts`: request and reply shapes
 * - `retry`: bounded retry, timeout and cancellation
 * - `extraction_pass`: context extraction stage
 * - `translation_pass`: translation stage
 * - `reassembler`: output track assembly
 * - `pipeline`: the stages wired together for one track
 */

pub mod chunker;
pub mod extraction_pass;
pub mod glossary;
pub mod pipeline;
pub mod prompts;
pub mod reassembler;
pub mod retry;
pub mod store;
pub mod tokens;
pub mod translation_pass;
pub mod usage;

pub use chunker::{Chunk, Chunker};
pub use glossary::{ContextNote, Glossary, GlossaryEntry, TranslationContext};
pub use pipeline::{PipelineSettings, TranslationPipeline};
pub use reassembler::{ChunkTranslation, reassemble};
pub use retry::{CancelFlag, RetryPolicy};
pub use store::{ContextStore, FileContextStore, StoreKey};
pub use tokens::{HeuristicEstimator, TokenBudget, TokenEstimator};
pub use usage::{UsageStats, UsageTracker};
