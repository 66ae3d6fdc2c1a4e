// libs/triage-cell/src/services/mod.rs
pub mod scorer;

pub use scorer::TriageService;
