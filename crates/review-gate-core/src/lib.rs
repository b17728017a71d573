pub mod aggregate;
pub mod backend;
pub mod keystore;
pub mod pipeline;
pub mod prompt;
pub mod verdict;

pub use aggregate::{AggregateResult, Aggregator, Reviewer, ReviewerSummary, DEFAULT_QUORUM};
pub use backend::{
    build_client, BackendClient, BackendFamily, BackendOutcome, BackendSettings, BackendSpec,
    TokenUsage, DEFAULT_CALL_TIMEOUT,
};
pub use keystore::{FileKeyStore, KeyRecord, KeyStore};
pub use pipeline::{RequestError, ReviewPipeline, ReviewResponse, DEFAULT_MAX_DIFF_CHARS};
pub use verdict::Verdict;
