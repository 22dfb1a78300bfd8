//! Vocabulary study-sheet generation.
//!
//! The pipeline: classify the prompt, derive quotas from the requested range,
//! append a strict counting contract to the system message, call the model,
//! normalize the returned HTML, verify it against the quotas, and repair
//! (one model round trip, then deterministic row top-up) when it deviates.

pub mod contract;
pub mod document;
pub mod handlers;
pub mod normalize;
pub mod pipeline;
pub mod prompts;
pub mod quota;
pub mod range;
pub mod sections;
pub mod verify;
