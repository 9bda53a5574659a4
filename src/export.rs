// JSON dump of resolved structural models
use crate::aspect;
use crate::definition::{Axis, DefinitionKey};
use crate::error::Diagnostic;
use crate::header::HeaderProjector;
use crate::model::QName;
use crate::resolver::{ResolvedTable, ResolvedTableSet};
use crate::structure::{NodeId, NodeKind, StructuralModel};
use compact_str::CompactString;
use indexmap::IndexMap;
use serde::Serialize;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportedNode {
    pub kind: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub definition: Option<DefinitionKey>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub axis: Option<Axis>,
    #[serde(rename = "abstract", skip_serializing_if = "std::ops::Not::not")]
    pub is_abstract: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rollup: Option<&'static str>,
    pub structural_depth: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub header: Option<String>,
    /// Own aspect values, rendered as text.
    #[serde(skip_serializing_if = "IndexMap::is_empty")]
    pub aspects: IndexMap<String, String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tag_selectors: Vec<CompactString>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub deemed_defaulted: Vec<QName>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<ExportedNode>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportedTable {
    pub parameters: IndexMap<String, String>,
    pub data_cols: usize,
    pub data_rows: usize,
    pub z_breakdowns: usize,
    pub breakdowns: Vec<ExportedNode>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportedTableSet {
    pub definition: DefinitionKey,
    pub tables: Vec<ExportedTable>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub diagnostics: Vec<Diagnostic>,
}

pub fn export_table_set(set: &ResolvedTableSet, lang: &str) -> ExportedTableSet {
    let projector = HeaderProjector::new(lang);
    ExportedTableSet {
        definition: set.definition.clone(),
        tables: set.tables.iter().map(|t| export_table(&set.model, t, &projector)).collect(),
        diagnostics: set.diagnostics.clone(),
    }
}

fn export_table(model: &StructuralModel, table: &ResolvedTable, projector: &HeaderProjector) -> ExportedTable {
    ExportedTable {
        parameters: table
            .parameters
            .iter()
            .map(|(name, value)| (name.to_string(), value.to_string()))
            .collect(),
        data_cols: table.data_cols,
        data_rows: table.data_rows,
        z_breakdowns: table.z_breakdowns,
        breakdowns: model
            .children(table.node)
            .iter()
            .map(|b| export_node(model, *b, projector))
            .collect(),
    }
}

pub fn export_node(model: &StructuralModel, id: NodeId, projector: &HeaderProjector) -> ExportedNode {
    let node = model.node(id);
    let is_structural = matches!(node.kind, NodeKind::Node);
    let tags = model.tag_selectors(id);
    let aspects = if is_structural {
        aspect::owned_aspects(model, id, &tags)
            .into_iter()
            .filter_map(|a| {
                let value = aspect::owned_value(model, id, &a, &tags)?;
                Some((a.to_string(), value.to_string()))
            })
            .collect()
    } else {
        IndexMap::new()
    };

    ExportedNode {
        kind: node.kind.as_str(),
        definition: node.definition_key().cloned(),
        axis: node.axis,
        is_abstract: is_structural && model.is_abstract(id),
        rollup: node.rollup.is_rollup().then(|| node.rollup.as_str()),
        structural_depth: model.structural_depth(id),
        header: if is_structural {
            projector.header(model, id, None).filter(|h| !h.is_empty())
        } else {
            None
        },
        aspects,
        tag_selectors: node.tag_selectors.clone(),
        deemed_defaulted: node.deemed_defaulted_dims.iter().cloned().collect(),
        children: node
            .children
            .iter()
            .map(|c| export_node(model, *c, projector))
            .collect(),
    }
}

pub fn to_json(set: &ResolvedTableSet, lang: &str) -> serde_json::Result<String> {
    serde_json::to_string_pretty(&export_table_set(set, lang))
}
