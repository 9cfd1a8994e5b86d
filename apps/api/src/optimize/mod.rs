// Optimization pipeline: structure extraction, edit proposal, patch
// verification, LaTeX regeneration and ATS scoring.

pub mod ats;
pub mod extractor;
pub mod handlers;
pub mod links;
pub mod lock;
pub mod models;
pub mod patch;
pub mod pipeline;
pub mod prompts;
pub mod proposer;
pub mod regenerator;

pub use models::EditMode;
