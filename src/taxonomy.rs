// Taxonomy lookup: concept predicates, dimension defaults and labels
use crate::model::QName;
use ahash::AHashMap;
use compact_str::CompactString;
use serde::{Deserialize, Serialize};

pub const STANDARD_LABEL_ROLE: &str = "http://www.xbrl.org/2003/role/label";
pub const GENERIC_STANDARD_LABEL_ROLE: &str = "http://www.xbrl.org/2008/role/label";
pub const PERIOD_START_LABEL_ROLE: &str = "http://www.xbrl.org/2003/role/periodStartLabel";
pub const PERIOD_END_LABEL_ROLE: &str = "http://www.xbrl.org/2003/role/periodEndLabel";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ConceptKind {
    Item,
    Tuple,
    ExplicitDimension,
    TypedDimension,
    Hypercube,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Concept {
    pub name: QName,
    #[serde(default = "item_kind")]
    pub kind: ConceptKind,
    #[serde(default, rename = "abstract")]
    pub is_abstract: bool,
    /// Usable as a member of some dimension domain.
    #[serde(default)]
    pub domain_member: bool,
}

fn item_kind() -> ConceptKind {
    ConceptKind::Item
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Label {
    #[serde(default = "standard_role")]
    pub role: CompactString,
    #[serde(default = "default_lang")]
    pub lang: CompactString,
    pub text: String,
}

fn standard_role() -> CompactString {
    CompactString::new(STANDARD_LABEL_ROLE)
}

fn default_lang() -> CompactString {
    CompactString::new("en")
}

/// Picks a label by role and language, then any role in the language, then
/// the first one.
pub fn select_label<'a>(labels: &'a [Label], role: &str, lang: &str) -> Option<&'a Label> {
    labels
        .iter()
        .find(|l| l.role == role && lang_matches(&l.lang, lang))
        .or_else(|| labels.iter().find(|l| lang_matches(&l.lang, lang)))
        .or_else(|| labels.first())
}

fn lang_matches(label_lang: &str, lang: &str) -> bool {
    label_lang == lang || label_lang.starts_with(lang) || lang.starts_with(label_lang)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct DimensionDefault {
    dimension: QName,
    default: QName,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ConceptLabel {
    concept: QName,
    #[serde(flatten)]
    label: Label,
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TaxonomyDocument {
    #[serde(default)]
    concepts: Vec<Concept>,
    #[serde(default)]
    dimension_defaults: Vec<DimensionDefault>,
    #[serde(default)]
    labels: Vec<ConceptLabel>,
}

/// Read-only DTS facade shared by every resolution.
#[derive(Debug, Default, Deserialize)]
#[serde(from = "TaxonomyDocument")]
pub struct Taxonomy {
    concepts: AHashMap<QName, Concept>,
    dimension_defaults: AHashMap<QName, QName>,
    labels: AHashMap<QName, Vec<Label>>,
}

impl From<TaxonomyDocument> for Taxonomy {
    fn from(doc: TaxonomyDocument) -> Self {
        let mut taxonomy = Taxonomy::new();
        for concept in doc.concepts {
            taxonomy.add_concept(concept);
        }
        for default in doc.dimension_defaults {
            taxonomy.set_dimension_default(default.dimension, default.default);
        }
        for entry in doc.labels {
            taxonomy.add_label(entry.concept, entry.label);
        }
        taxonomy
    }
}

impl Taxonomy {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_concept(&mut self, concept: Concept) -> &mut Self {
        self.concepts.insert(concept.name.clone(), concept);
        self
    }

    /// Shorthand for tests and builders.
    pub fn add(&mut self, name: &str, kind: ConceptKind, is_abstract: bool, domain_member: bool) -> &mut Self {
        self.add_concept(Concept {
            name: QName::new(name),
            kind,
            is_abstract,
            domain_member,
        })
    }

    pub fn set_dimension_default(&mut self, dimension: QName, member: QName) -> &mut Self {
        self.dimension_defaults.insert(dimension, member);
        self
    }

    pub fn add_label(&mut self, concept: QName, label: Label) -> &mut Self {
        self.labels.entry(concept).or_default().push(label);
        self
    }

    pub fn concept(&self, name: &QName) -> Option<&Concept> {
        self.concepts.get(name)
    }

    pub fn contains(&self, name: &QName) -> bool {
        self.concepts.contains_key(name)
    }

    pub fn is_abstract(&self, name: &QName) -> bool {
        self.concept(name).map(|c| c.is_abstract).unwrap_or(false)
    }

    pub fn is_item(&self, name: &QName) -> bool {
        matches!(
            self.concept(name).map(|c| c.kind),
            Some(ConceptKind::Item | ConceptKind::ExplicitDimension | ConceptKind::TypedDimension | ConceptKind::Hypercube)
        )
    }

    /// An item concept that is neither a dimension nor a hypercube.
    pub fn is_primary_item(&self, name: &QName) -> bool {
        matches!(self.concept(name).map(|c| c.kind), Some(ConceptKind::Item))
    }

    pub fn is_dimension(&self, name: &QName) -> bool {
        self.is_explicit_dimension(name) || self.is_typed_dimension(name)
    }

    pub fn is_explicit_dimension(&self, name: &QName) -> bool {
        matches!(self.concept(name).map(|c| c.kind), Some(ConceptKind::ExplicitDimension))
    }

    pub fn is_typed_dimension(&self, name: &QName) -> bool {
        matches!(self.concept(name).map(|c| c.kind), Some(ConceptKind::TypedDimension))
    }

    pub fn is_hypercube(&self, name: &QName) -> bool {
        matches!(self.concept(name).map(|c| c.kind), Some(ConceptKind::Hypercube))
    }

    pub fn is_domain_member(&self, name: &QName) -> bool {
        self.concept(name).map(|c| c.domain_member).unwrap_or(false)
    }

    pub fn dimension_default(&self, dimension: &QName) -> Option<&QName> {
        self.dimension_defaults.get(dimension)
    }

    pub fn has_dimension_default(&self, dimension: &QName) -> bool {
        self.dimension_defaults.contains_key(dimension)
    }

    pub fn label(&self, concept: &QName, role: &str, lang: &str) -> Option<&str> {
        self.labels
            .get(concept)
            .and_then(|labels| select_label(labels, role, lang))
            .map(|l| l.text.as_str())
    }

    pub fn concept_count(&self) -> usize {
        self.concepts.len()
    }
}
