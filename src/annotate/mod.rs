//! Annotator pipeline — turns raw utterance text into a merged annotation.

pub mod heuristic;
pub mod pipeline;
pub mod remote;
pub mod types;

pub use pipeline::AnnotatorPipeline;
pub use remote::{RemoteAnnotator, RemoteAnnotatorConfig};
pub use types::*;
