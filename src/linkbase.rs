// Relationship networks and tree navigation for relationship nodes
use crate::model::QName;
use ahash::{AHashMap, AHashSet};
use compact_str::CompactString;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub const PARENT_CHILD_ARCROLE: &str = "http://www.xbrl.org/2003/arcrole/parent-child";
pub const DIMENSION_DOMAIN_ARCROLE: &str = "http://xbrl.org/int/dim/arcrole/dimension-domain";
pub const DOMAIN_MEMBER_ARCROLE: &str = "http://xbrl.org/int/dim/arcrole/domain-member";

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum NavigationError {
    #[error("Unknown formula axis: {0}")]
    UnknownAxis(String),

    #[error("Negative generations: {0}")]
    NegativeGenerations(i64),

    #[error("Generations out of range: {0}")]
    GenerationsOutOfRange(i64),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TraversalAxis {
    Child,
    ChildOrSelf,
    Descendant,
    DescendantOrSelf,
    Parent,
    ParentOrSelf,
    Sibling,
    SiblingOrSelf,
}

impl TraversalAxis {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Child => "child",
            Self::ChildOrSelf => "child-or-self",
            Self::Descendant => "descendant",
            Self::DescendantOrSelf => "descendant-or-self",
            Self::Parent => "parent",
            Self::ParentOrSelf => "parent-or-self",
            Self::Sibling => "sibling",
            Self::SiblingOrSelf => "sibling-or-self",
        }
    }

    /// Axes that walk exactly one generation.
    pub fn is_single_generation(&self) -> bool {
        matches!(
            self,
            Self::Child | Self::ChildOrSelf | Self::Parent | Self::ParentOrSelf | Self::Sibling | Self::SiblingOrSelf
        )
    }

    pub fn includes_self(&self) -> bool {
        matches!(
            self,
            Self::ChildOrSelf | Self::DescendantOrSelf | Self::ParentOrSelf | Self::SiblingOrSelf
        )
    }

    pub fn is_upward(&self) -> bool {
        matches!(self, Self::Parent | Self::ParentOrSelf)
    }
}

impl FromStr for TraversalAxis {
    type Err = NavigationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "child" => Ok(Self::Child),
            "child-or-self" => Ok(Self::ChildOrSelf),
            "descendant" => Ok(Self::Descendant),
            "descendant-or-self" => Ok(Self::DescendantOrSelf),
            "parent" => Ok(Self::Parent),
            "parent-or-self" => Ok(Self::ParentOrSelf),
            "sibling" => Ok(Self::Sibling),
            "sibling-or-self" => Ok(Self::SiblingOrSelf),
            other => Err(NavigationError::UnknownAxis(other.to_string())),
        }
    }
}

impl fmt::Display for TraversalAxis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Relationship {
    pub from: QName,
    pub to: QName,
    #[serde(default = "default_link_role")]
    pub link_role: CompactString,
    #[serde(default = "default_arc_role")]
    pub arc_role: CompactString,
    #[serde(default = "default_order")]
    pub order: f32,
    #[serde(default)]
    pub preferred_label: Option<CompactString>,
    /// Generic preferred label from the `gpl` namespace.
    #[serde(default)]
    pub generic_preferred_label: Option<CompactString>,
    #[serde(default = "default_usable")]
    pub usable: bool,
    #[serde(default)]
    pub link_name: Option<QName>,
    #[serde(default)]
    pub arc_name: Option<QName>,
}

fn default_link_role() -> CompactString {
    CompactString::new("http://www.xbrl.org/2003/role/link")
}

fn default_arc_role() -> CompactString {
    CompactString::new(PARENT_CHILD_ARCROLE)
}

fn default_order() -> f32 {
    1.0
}

fn default_usable() -> bool {
    true
}

impl Relationship {
    pub fn new(from: &str, to: &str, link_role: &str, arc_role: &str, order: f32) -> Self {
        Self {
            from: QName::new(from),
            to: QName::new(to),
            link_role: CompactString::from(link_role),
            arc_role: CompactString::from(arc_role),
            order,
            preferred_label: None,
            generic_preferred_label: None,
            usable: true,
            link_name: None,
            arc_name: None,
        }
    }

    /// Identifies the base set this relationship belongs to.
    pub fn network(&self) -> (CompactString, CompactString, Option<QName>, Option<QName>) {
        (
            self.arc_role.clone(),
            self.link_role.clone(),
            self.link_name.clone(),
            self.arc_name.clone(),
        )
    }
}

/// Nested navigation result. A `Nested` list holds the descendants of the
/// entry immediately before it.
#[derive(Debug, Clone, PartialEq)]
pub enum ForestEntry {
    Relationship(Relationship),
    Identifier(QName),
    Nested(Forest),
}

pub type Forest = Vec<ForestEntry>;

/// Counts entries and nesting depth of a forest.
pub fn forest_extent(forest: &[ForestEntry]) -> (usize, usize) {
    let mut count = 0;
    let mut depth = if forest.is_empty() { 0 } else { 1 };
    for entry in forest {
        match entry {
            ForestEntry::Nested(nested) => {
                let (n, d) = forest_extent(nested);
                count += n;
                depth = depth.max(d + 1);
            }
            _ => count += 1,
        }
    }
    (count, depth)
}

pub fn flatten_forest(forest: &[ForestEntry]) -> Vec<&ForestEntry> {
    let mut out = Vec::new();
    for entry in forest {
        match entry {
            ForestEntry::Nested(nested) => out.extend(flatten_forest(nested)),
            other => out.push(other),
        }
    }
    out
}

#[derive(Debug, Clone, PartialEq)]
pub struct RelationshipQuery {
    pub source: QName,
    pub link_role: Option<CompactString>,
    pub arc_role: CompactString,
    pub axis: TraversalAxis,
    /// Zero means unbounded.
    pub generations: u32,
    pub link_name: Option<QName>,
    pub arc_name: Option<QName>,
    /// Dimension whose domain roots stand in for `xfi:root`.
    pub dimension: Option<QName>,
}

impl RelationshipQuery {
    pub fn new(source: QName, arc_role: &str, axis: TraversalAxis) -> Self {
        Self {
            source,
            link_role: None,
            arc_role: CompactString::from(arc_role),
            axis,
            generations: 0,
            link_name: None,
            arc_name: None,
            dimension: None,
        }
    }

    pub fn link_role(mut self, role: &str) -> Self {
        self.link_role = Some(CompactString::from(role));
        self
    }

    pub fn generations(mut self, generations: u32) -> Self {
        self.generations = generations;
        self
    }
}

pub trait RelationshipNavigator: Send + Sync {
    fn relationships(&self, query: &RelationshipQuery) -> Result<Forest, NavigationError>;
}

/// All relationships of a DTS, indexed by source and by target.
#[derive(Debug, Default, Clone, Deserialize)]
#[serde(from = "Vec<Relationship>")]
pub struct RelationshipNetwork {
    relationships: Vec<Relationship>,
    from_index: AHashMap<QName, Vec<usize>>,
    to_index: AHashMap<QName, Vec<usize>>,
}

impl From<Vec<Relationship>> for RelationshipNetwork {
    fn from(relationships: Vec<Relationship>) -> Self {
        let mut network = RelationshipNetwork::new();
        for rel in relationships {
            network.add(rel);
        }
        network
    }
}

impl RelationshipNetwork {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, rel: Relationship) -> &mut Self {
        let index = self.relationships.len();
        self.from_index.entry(rel.from.clone()).or_default().push(index);
        self.to_index.entry(rel.to.clone()).or_default().push(index);
        self.relationships.push(rel);
        self
    }

    pub fn len(&self) -> usize {
        self.relationships.len()
    }

    pub fn is_empty(&self) -> bool {
        self.relationships.is_empty()
    }

    fn matches(&self, rel: &Relationship, query: &RelationshipQuery, arc_role: &str) -> bool {
        rel.arc_role == arc_role
            && query.link_role.as_ref().map_or(true, |role| &rel.link_role == role)
            && query.link_name.as_ref().map_or(true, |name| rel.link_name.as_ref() == Some(name))
            && query.arc_name.as_ref().map_or(true, |name| rel.arc_name.as_ref() == Some(name))
    }

    fn select<'a>(
        &'a self,
        index: &AHashMap<QName, Vec<usize>>,
        key: &QName,
        query: &RelationshipQuery,
        arc_role: &str,
    ) -> Vec<&'a Relationship> {
        let mut rels: Vec<&Relationship> = index
            .get(key)
            .map(|ids| {
                ids.iter()
                    .map(|&i| &self.relationships[i])
                    .filter(|rel| self.matches(rel, query, arc_role))
                    .collect()
            })
            .unwrap_or_default();
        rels.sort_by(|a, b| a.order.total_cmp(&b.order));
        rels
    }

    /// Relationships from `source` in order.
    pub fn from_concept(&self, source: &QName, query: &RelationshipQuery) -> Vec<&Relationship> {
        self.select(&self.from_index, source, query, &query.arc_role)
    }

    /// Relationships to `target` in order.
    pub fn to_concept(&self, target: &QName, query: &RelationshipQuery) -> Vec<&Relationship> {
        self.select(&self.to_index, target, query, &query.arc_role)
    }

    /// Sources never appearing as a target, in first-seen order.
    pub fn roots(&self, query: &RelationshipQuery) -> Vec<QName> {
        if let Some(dimension) = &query.dimension {
            return self
                .select(&self.from_index, dimension, query, DIMENSION_DOMAIN_ARCROLE)
                .into_iter()
                .map(|rel| rel.to.clone())
                .collect();
        }
        let mut seen = AHashSet::new();
        let mut roots = Vec::new();
        for rel in self.relationships.iter().filter(|r| self.matches(r, query, &query.arc_role)) {
            if seen.insert(rel.from.clone()) && self.to_concept(&rel.from, query).is_empty() {
                roots.push(rel.from.clone());
            }
        }
        roots
    }

    fn descend(
        &self,
        concept: &QName,
        query: &RelationshipQuery,
        remaining: u32,
        visited: &mut AHashSet<QName>,
    ) -> Forest {
        let mut forest = Vec::new();
        for rel in self.from_concept(concept, query) {
            forest.push(ForestEntry::Relationship(rel.clone()));
            if remaining != 1 && visited.insert(rel.to.clone()) {
                let next = remaining.saturating_sub(1);
                let nested = self.descend(&rel.to, query, next, visited);
                visited.remove(&rel.to);
                if !nested.is_empty() {
                    forest.push(ForestEntry::Nested(nested));
                }
            }
        }
        forest
    }

    fn navigate_from_root(&self, query: &RelationshipQuery) -> Forest {
        let mut forest = Vec::new();
        let roots = self.roots(query);
        let mut visited: AHashSet<QName> = roots.iter().cloned().collect();
        for root in roots {
            forest.push(ForestEntry::Identifier(root.clone()));
            let descend = matches!(
                query.axis,
                TraversalAxis::Descendant | TraversalAxis::DescendantOrSelf
            );
            if descend && query.generations != 1 {
                let next = query.generations.saturating_sub(1);
                let nested = self.descend(&root, query, next, &mut visited);
                if !nested.is_empty() {
                    forest.push(ForestEntry::Nested(nested));
                }
            }
        }
        forest
    }
}

impl RelationshipNavigator for RelationshipNetwork {
    fn relationships(&self, query: &RelationshipQuery) -> Result<Forest, NavigationError> {
        if query.source.is_xfi_root() {
            return Ok(match query.axis {
                TraversalAxis::Child
                | TraversalAxis::ChildOrSelf
                | TraversalAxis::Descendant
                | TraversalAxis::DescendantOrSelf => self.navigate_from_root(query),
                _ => Vec::new(),
            });
        }
        let source = &query.source;
        let forest = match query.axis {
            TraversalAxis::Child | TraversalAxis::ChildOrSelf => self
                .from_concept(source, query)
                .into_iter()
                .map(|rel| ForestEntry::Relationship(rel.clone()))
                .collect(),
            TraversalAxis::Descendant | TraversalAxis::DescendantOrSelf => {
                let mut visited = AHashSet::new();
                visited.insert(source.clone());
                self.descend(source, query, query.generations, &mut visited)
            }
            TraversalAxis::Parent | TraversalAxis::ParentOrSelf => self
                .to_concept(source, query)
                .into_iter()
                .map(|rel| ForestEntry::Relationship(rel.clone()))
                .collect(),
            TraversalAxis::Sibling | TraversalAxis::SiblingOrSelf => {
                let parents = self.to_concept(source, query);
                match parents.first() {
                    Some(parent) => self
                        .from_concept(&parent.from, query)
                        .into_iter()
                        .filter(|rel| query.axis.includes_self() || &rel.to != source)
                        .map(|rel| ForestEntry::Relationship(rel.clone()))
                        .collect(),
                    None => Vec::new(),
                }
            }
        };
        Ok(forest)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ROLE: &str = "http://example.com/role/balance";

    fn network() -> RelationshipNetwork {
        let mut network = RelationshipNetwork::new();
        network
            .add(Relationship::new("a:Assets", "a:Current", ROLE, PARENT_CHILD_ARCROLE, 1.0))
            .add(Relationship::new("a:Assets", "a:NonCurrent", ROLE, PARENT_CHILD_ARCROLE, 2.0))
            .add(Relationship::new("a:Current", "a:Cash", ROLE, PARENT_CHILD_ARCROLE, 1.0))
            .add(Relationship::new("a:Current", "a:Receivables", ROLE, PARENT_CHILD_ARCROLE, 0.5));
        network
    }

    fn query(source: &str, axis: TraversalAxis) -> RelationshipQuery {
        RelationshipQuery::new(QName::new(source), PARENT_CHILD_ARCROLE, axis).link_role(ROLE)
    }

    #[test]
    fn test_children_sorted_by_order() {
        let forest = network().relationships(&query("a:Current", TraversalAxis::Child)).unwrap();
        let targets: Vec<&str> = flatten_forest(&forest)
            .into_iter()
            .filter_map(|e| match e {
                ForestEntry::Relationship(rel) => Some(rel.to.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(targets, vec!["a:Receivables", "a:Cash"]);
    }

    #[test]
    fn test_descendants_nest() {
        let forest = network().relationships(&query("a:Assets", TraversalAxis::Descendant)).unwrap();
        assert_eq!(forest.len(), 3);
        assert!(matches!(forest[1], ForestEntry::Nested(ref n) if n.len() == 2));
        assert_eq!(forest_extent(&forest), (4, 2));

        let limited = network()
            .relationships(&query("a:Assets", TraversalAxis::Descendant).generations(1))
            .unwrap();
        assert_eq!(forest_extent(&limited), (2, 1));
    }

    #[test]
    fn test_xfi_root_lists_roots() {
        let forest = network().relationships(&query("xfi:root", TraversalAxis::Child)).unwrap();
        assert_eq!(forest, vec![ForestEntry::Identifier(QName::new("a:Assets"))]);
    }

    #[test]
    fn test_siblings_exclude_self() {
        let network = network();
        let siblings = network.relationships(&query("a:Cash", TraversalAxis::Sibling)).unwrap();
        assert_eq!(siblings.len(), 1);
        let with_self = network.relationships(&query("a:Cash", TraversalAxis::SiblingOrSelf)).unwrap();
        assert_eq!(with_self.len(), 2);
    }

    #[test]
    fn test_axis_parse() {
        assert_eq!("descendant-or-self".parse::<TraversalAxis>(), Ok(TraversalAxis::DescendantOrSelf));
        assert!("ancestor".parse::<TraversalAxis>().is_err());
        assert!(TraversalAxis::SiblingOrSelf.is_single_generation());
    }
}
