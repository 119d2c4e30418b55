// src/core/mod.rs

// Root of the `core` module: the data model, the analysis pipeline and the
// static knowledge it reports against.

/// Data structures shared by every stage, such as `ScanReport`, `Target`
/// and the per-stage result structs.
pub mod models;

/// Turns a raw user input into a typed `Target`.
pub mod target;

/// URL feature extraction for the phishing classifier.
pub mod features;

/// Loads the model artifact and predicts verdicts.
pub mod classifier;

/// The recon, fuzzing and liveness stages plus the orchestrator that runs them.
pub mod scanner;

/// Titles, descriptions and remediation advice for every finding code.
pub mod knowledge_base;
