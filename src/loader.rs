// Table package loading
use crate::config::ResolverConfig;
use crate::definition::{DefinitionGraph, DefinitionKey, DefinitionKind, DefinitionModel};
use crate::linkbase::RelationshipNetwork;
use crate::model::FactPool;
use crate::resolver::{ResolvedTableSet, Resolver};
use crate::taxonomy::Taxonomy;
use crate::{Error, Result};
use serde::Deserialize;
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PackageDocument {
    #[serde(default)]
    taxonomy: Taxonomy,
    #[serde(default)]
    definitions: DefinitionModel,
    #[serde(default)]
    relationships: RelationshipNetwork,
    #[serde(default)]
    facts: FactPool,
    #[serde(default)]
    config: Option<ResolverConfig>,
}

/// Everything needed to resolve a set of tables: DTS, definitions,
/// relationships and the instance facts.
pub struct TablePackage {
    pub taxonomy: Arc<Taxonomy>,
    pub definitions: DefinitionModel,
    pub relationships: RelationshipNetwork,
    pub facts: Arc<FactPool>,
    pub config: ResolverConfig,
}

impl TablePackage {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read(path.as_ref())?;
        debug!(path = %path.as_ref().display(), bytes = content.len(), "loading table package");
        Self::from_bytes(&content)
    }

    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        // Skip BOM if present
        let data = if data.starts_with(&[0xEF, 0xBB, 0xBF]) {
            &data[3..]
        } else {
            data
        };
        let doc: PackageDocument = serde_json::from_slice(data)?;
        debug!(
            concepts = doc.taxonomy.concept_count(),
            definitions = doc.definitions.len(),
            relationships = doc.relationships.len(),
            facts = doc.facts.len(),
            "parsed table package"
        );
        Ok(Self {
            taxonomy: Arc::new(doc.taxonomy),
            definitions: doc.definitions,
            relationships: doc.relationships,
            facts: Arc::new(doc.facts),
            config: doc.config.unwrap_or_default(),
        })
    }

    /// A resolver over this package using its own configuration.
    pub fn resolver(&self) -> Resolver<'_> {
        Resolver::new(
            &self.definitions,
            &self.relationships,
            Arc::clone(&self.taxonomy),
            Arc::clone(&self.facts),
        )
        .with_config(self.config.clone())
    }

    pub fn resolve_table(&self, key: &str) -> Result<ResolvedTableSet> {
        let key = DefinitionKey::new(key);
        match self.definitions.node(&key) {
            Some(node) if matches!(node.kind, DefinitionKind::Table(_)) => Ok(self.resolver().resolve_table(&key)?),
            _ => Err(Error::NotFound(format!("table {}", key))),
        }
    }
}
