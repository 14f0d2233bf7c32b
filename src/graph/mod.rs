//! Graph layer: the in-memory relational store and the stages that fill,
//! refine, and read it.

pub mod classify;
pub mod closure;
pub mod context;
pub mod populate;
pub mod query;
pub mod records;
pub mod refine;
pub mod sequential;
pub mod store;

pub use context::AnalysisContext;
pub use query::{ImpactKind, ImpactQuery, ImpactedTest};
pub use store::RelationalStore;
