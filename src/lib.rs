//! tabrl - XBRL Table Linkbase resolver
//!
//! Lowers table definitions (breakdowns, rule, relationship and aspect nodes)
//! into structural models bound to the facts of an instance.
//!
//! Licensed under AGPL-3.0

pub mod aspect;
pub mod config;
pub mod definition;
pub mod error;
pub mod evaluator;
pub mod export;
pub mod header;
pub mod linkbase;
pub mod loader;
pub mod model;
pub mod partition;
pub mod resolver;
pub mod structure;
pub mod taxonomy;
pub mod validator;

// Re-export main types
pub use config::ResolverConfig;
pub use definition::{Axis, DefinitionGraph, DefinitionKey, DefinitionModel, DefinitionNode};
pub use error::{Diagnostic, ErrorCode, ResolutionError, Severity};
pub use evaluator::{ExpressionEvaluator, Expr, ScopedEvaluator};
pub use linkbase::{RelationshipNavigator, RelationshipNetwork};
pub use loader::TablePackage;
pub use model::{Aspect, FactPool, QName, Value};
pub use partition::{AspectPartitioner, FactPartitioner};
pub use resolver::{Resolution, ResolvedTable, ResolvedTableSet, Resolver};
pub use structure::{NodeId, Rollup, StructuralModel};
pub use taxonomy::Taxonomy;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Resolution error: {0}")]
    Resolution(#[from] ResolutionError),

    #[error("Not found: {0}")]
    NotFound(String),
}
