// Header text and sort keys for structural nodes
use crate::aspect;
use crate::model::{Aspect, BoundFact, QName, Value};
use crate::structure::{NodeFlags, NodeId, StructuralModel};
use crate::taxonomy::{GENERIC_STANDARD_LABEL_ROLE, STANDARD_LABEL_ROLE};
use compact_str::CompactString;
use serde::Serialize;

/// One candidate for a node's header, in precedence order.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "source", rename_all = "camelCase")]
pub enum HeaderSource {
    /// Label on the definition node itself.
    GenericLabel { text: String },
    /// Entry row of an open node with no reported fact yet.
    EntryPlaceholder { id: CompactString },
    /// Standard label of the concept or dimension member the node binds.
    AspectLabel { aspect: Aspect, text: String },
    /// Text synthesized from a period, unit or entity value.
    ProcessorText { aspect: Aspect, text: String },
    /// Role-specific label of the parent definition node.
    ParentRoleLabel { text: String },
}

impl HeaderSource {
    pub fn text(&self) -> &str {
        match self {
            HeaderSource::GenericLabel { text }
            | HeaderSource::AspectLabel { text, .. }
            | HeaderSource::ProcessorText { text, .. }
            | HeaderSource::ParentRoleLabel { text } => text,
            HeaderSource::EntryPlaceholder { .. } => "",
        }
    }
}

pub struct HeaderProjector {
    lang: CompactString,
}

impl HeaderProjector {
    pub fn new(lang: &str) -> Self {
        Self {
            lang: CompactString::from(lang),
        }
    }

    /// Every header source of `id`, highest precedence first. The parent's
    /// role label is only considered when `role` is given.
    pub fn header_sources(&self, model: &StructuralModel, id: NodeId, role: Option<&str>) -> Vec<HeaderSource> {
        let node = model.node(id);
        let mut sources = Vec::new();

        if model.is_labeled(id) {
            if let Some(definition) = &node.definition {
                let label_role = role.unwrap_or(GENERIC_STANDARD_LABEL_ROLE);
                if let Some(text) = definition.label(label_role, &self.lang) {
                    sources.push(HeaderSource::GenericLabel { text: text.to_string() });
                }
            }
        }

        if let Some(BoundFact::Prototype(prototype)) = &node.bound_fact {
            sources.push(HeaderSource::EntryPlaceholder {
                id: prototype.id.clone(),
            });
        }

        let tags = model.tag_selectors(id);
        let owned_aspects = aspect::owned_aspects(model, id, &tags);
        for owned in &owned_aspects {
            let Some(value) = aspect::aspect_value(model, id, owned, false, Some(&tags)) else {
                continue;
            };
            match (owned, &value) {
                (Aspect::Concept, Value::QName(name)) | (Aspect::ExplicitDimension(_), Value::QName(name)) => {
                    sources.push(self.aspect_label(model, owned.clone(), name, role));
                }
                (Aspect::TypedDimension(_), _) => {
                    sources.push(HeaderSource::AspectLabel {
                        aspect: owned.clone(),
                        text: value.to_string(),
                    });
                }
                (Aspect::Period(_) | Aspect::Unit | Aspect::EntityIdentifier, _) => {
                    sources.push(HeaderSource::ProcessorText {
                        aspect: owned.clone(),
                        text: value.to_string(),
                    });
                }
                _ => {}
            }
        }

        // Concept and members inherited from ancestors rank below what the node owns
        let inherited_aspects = aspect::aspects_covered(model, id, true)
            .into_iter()
            .filter(|a| matches!(a, Aspect::Concept | Aspect::ExplicitDimension(_)))
            .filter(|a| !owned_aspects.contains(a));
        for inherited in inherited_aspects {
            if aspect::has_aspect(model, id, &inherited, true, Some(&tags)).is_none() {
                continue;
            }
            if let Some(Value::QName(name)) = aspect::aspect_value(model, id, &inherited, true, Some(&tags)) {
                sources.push(self.aspect_label(model, inherited, &name, role));
            }
        }

        if let (Some(role), Some(parent)) = (role, node.parent) {
            let parent_label = model
                .node(parent)
                .definition
                .as_ref()
                .and_then(|d| d.labels.iter().find(|l| l.role == role))
                .map(|l| l.text.clone());
            if let Some(text) = parent_label {
                sources.push(HeaderSource::ParentRoleLabel { text });
            }
        }

        sources
    }

    fn aspect_label(&self, model: &StructuralModel, aspect: Aspect, name: &QName, role: Option<&str>) -> HeaderSource {
        let text = model
            .taxonomy()
            .label(name, role.unwrap_or(STANDARD_LABEL_ROLE), &self.lang)
            .map(str::to_string)
            .unwrap_or_else(|| name.to_string());
        HeaderSource::AspectLabel { aspect, text }
    }

    pub fn header(&self, model: &StructuralModel, id: NodeId, role: Option<&str>) -> Option<String> {
        self.header_sources(model, id, role)
            .into_iter()
            .next()
            .map(|source| source.text().to_string())
    }

    /// Sibling ordering key. Prototypes and unlabeled nodes sort first.
    pub fn sort_key(&self, model: &StructuralModel, id: NodeId) -> String {
        if model.node(id).flags.contains(NodeFlags::UNREPORTED) {
            return String::new();
        }
        self.header(model, id, None).unwrap_or_default()
    }
}
