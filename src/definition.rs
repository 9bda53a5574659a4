// Definition node model and graph provider
use crate::evaluator::Expr;
use crate::linkbase::{forest_extent, ForestEntry};
use crate::model::{Aspect, PeriodAspect, QName, Value};
use crate::partition::FactFilter;
use crate::structure::Rollup;
use crate::taxonomy::{select_label, Label};
use ahash::AHashMap;
use compact_str::CompactString;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DefinitionKey(CompactString);

impl DefinitionKey {
    pub fn new(key: &str) -> Self {
        Self(CompactString::from(key))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for DefinitionKey {
    fn from(key: &str) -> Self {
        Self::new(key)
    }
}

impl fmt::Display for DefinitionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Axis {
    X,
    Y,
    Z,
}

impl Axis {
    /// z first: x and y expressions may read variables bound on z.
    pub const RESOLUTION_ORDER: [Axis; 3] = [Axis::Z, Axis::X, Axis::Y];

    pub fn as_str(&self) -> &'static str {
        match self {
            Axis::X => "x",
            Axis::Y => "y",
            Axis::Z => "z",
        }
    }
}

impl fmt::Display for Axis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ParentChildOrder {
    ParentFirst,
    ChildrenFirst,
}

pub const PERIOD_START_TAG: &str = "table.periodStart";
pub const PERIOD_END_TAG: &str = "table.periodEnd";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AspectRule {
    pub aspect: Aspect,
    pub value: Expr,
}

/// Aspect rules of a rule node, optionally selected by a tag.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConstraintSet {
    #[serde(default)]
    pub tag: Option<CompactString>,
    #[serde(default)]
    pub rules: Vec<AspectRule>,
}

impl ConstraintSet {
    pub fn aspects(&self) -> impl Iterator<Item = &Aspect> {
        self.rules.iter().map(|r| &r.aspect)
    }

    pub fn rule(&self, aspect: &Aspect) -> Option<&Expr> {
        self.rules.iter().find(|r| &r.aspect == aspect).map(|r| &r.value)
    }

    pub fn covers(&self, aspect: &Aspect) -> bool {
        self.rules.iter().any(|r| &r.aspect == aspect)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleNode {
    #[serde(default, rename = "abstract")]
    pub is_abstract: bool,
    #[serde(default, rename = "merged")]
    pub is_merged: bool,
    #[serde(default)]
    pub parent_child_order: Option<ParentChildOrder>,
    #[serde(default)]
    pub tag_selector: Option<CompactString>,
    #[serde(default)]
    pub constraint_sets: Vec<ConstraintSet>,
}

impl RuleNode {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_rule(self, aspect: Aspect, value: Expr) -> Self {
        self.with_tagged_rule(None, aspect, value)
    }

    pub fn with_tagged_rule(mut self, tag: Option<&str>, aspect: Aspect, value: Expr) -> Self {
        let tag = tag.map(CompactString::from);
        match self.constraint_sets.iter_mut().find(|s| s.tag == tag) {
            Some(set) => set.rules.push(AspectRule { aspect, value }),
            None => self.constraint_sets.push(ConstraintSet {
                tag,
                rules: vec![AspectRule { aspect, value }],
            }),
        }
        self
    }

    pub fn abstract_node(mut self) -> Self {
        self.is_abstract = true;
        self
    }

    pub fn merged(mut self) -> Self {
        self.is_merged = true;
        self
    }

    pub fn ordered(mut self, order: ParentChildOrder) -> Self {
        self.parent_child_order = Some(order);
        self
    }

    pub fn tag_selector(mut self, tag: &str) -> Self {
        self.tag_selector = Some(CompactString::from(tag));
        self
    }

    pub fn default_set(&self) -> Option<&ConstraintSet> {
        self.constraint_sets.iter().find(|s| s.tag.is_none())
    }

    /// The set tagged by one of `tags`, else the untagged one.
    pub fn select<'a>(&'a self, tags: &[CompactString]) -> Option<&'a ConstraintSet> {
        self.constraint_sets
            .iter()
            .find(|s| s.tag.as_ref().map_or(false, |t| tags.contains(t)))
            .or_else(|| self.default_set())
    }

    pub fn aspects_covered(&self) -> Vec<Aspect> {
        let mut covered: Vec<Aspect> = Vec::new();
        for aspect in self.constraint_sets.iter().flat_map(ConstraintSet::aspects) {
            if !covered.contains(aspect) {
                covered.push(aspect.clone());
            }
        }
        covered
    }
}

/// Parameters shared by concept and dimension relationship nodes. A missing
/// source means `xfi:root`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelationshipNode {
    #[serde(default)]
    pub source: Option<Expr>,
    #[serde(default)]
    pub link_role: Option<Expr>,
    #[serde(default)]
    pub arc_role: Option<Expr>,
    #[serde(default)]
    pub formula_axis: Option<Expr>,
    #[serde(default)]
    pub generations: Option<Expr>,
    #[serde(default)]
    pub link_name: Option<Expr>,
    #[serde(default)]
    pub arc_name: Option<Expr>,
    #[serde(default)]
    pub variable: Option<QName>,
    #[serde(default)]
    pub concept_variable: Option<QName>,
    #[serde(default)]
    pub parent_child_order: Option<ParentChildOrder>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DimensionRelationshipNode {
    pub dimension: Expr,
    #[serde(flatten)]
    pub relationship: RelationshipNode,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AspectNode {
    pub aspect: Aspect,
    #[serde(default)]
    pub filters: Vec<FactFilter>,
    #[serde(default)]
    pub include_unreported_value: bool,
}

impl AspectNode {
    pub fn new(aspect: Aspect) -> Self {
        Self {
            aspect,
            filters: Vec::new(),
            include_unreported_value: false,
        }
    }

    /// A period aspect node partitions on every period component.
    pub fn aspects_covered(&self) -> Vec<Aspect> {
        match self.aspect {
            Aspect::Period(_) => PeriodAspect::ALL.iter().map(|p| Aspect::Period(*p)).collect(),
            ref aspect => vec![aspect.clone()],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableParameter {
    pub name: QName,
    pub value: Expr,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableNode {
    #[serde(default)]
    pub filters: Vec<FactFilter>,
    #[serde(default)]
    pub parameters: Vec<TableParameter>,
    #[serde(default)]
    pub parent_child_order: Option<ParentChildOrder>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BreakdownNode {
    #[serde(default)]
    pub parent_child_order: Option<ParentChildOrder>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum DefinitionKind {
    Table(TableNode),
    Breakdown(BreakdownNode),
    Rule(RuleNode),
    ConceptRelationship(RelationshipNode),
    DimensionRelationship(DimensionRelationshipNode),
    Aspect(AspectNode),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DefinitionNode {
    pub key: DefinitionKey,
    #[serde(default)]
    pub labels: Vec<Label>,
    #[serde(flatten)]
    pub kind: DefinitionKind,
}

impl DefinitionNode {
    pub fn new(key: &str, kind: DefinitionKind) -> Self {
        Self {
            key: DefinitionKey::new(key),
            labels: Vec::new(),
            kind,
        }
    }

    pub fn table(key: &str) -> Self {
        Self::new(key, DefinitionKind::Table(TableNode::default()))
    }

    pub fn breakdown(key: &str) -> Self {
        Self::new(key, DefinitionKind::Breakdown(BreakdownNode::default()))
    }

    pub fn rule(key: &str, rule: RuleNode) -> Self {
        Self::new(key, DefinitionKind::Rule(rule))
    }

    pub fn with_label(mut self, role: &str, lang: &str, text: &str) -> Self {
        self.labels.push(Label {
            role: CompactString::from(role),
            lang: CompactString::from(lang),
            text: text.to_string(),
        });
        self
    }

    pub fn is_labeled(&self) -> bool {
        !self.labels.is_empty()
    }

    pub fn label(&self, role: &str, lang: &str) -> Option<&str> {
        select_label(&self.labels, role, lang).map(|l| l.text.as_str())
    }

    pub fn rule_node(&self) -> Option<&RuleNode> {
        match &self.kind {
            DefinitionKind::Rule(rule) => Some(rule),
            _ => None,
        }
    }

    pub fn relationship_node(&self) -> Option<&RelationshipNode> {
        match &self.kind {
            DefinitionKind::ConceptRelationship(rel) => Some(rel),
            DefinitionKind::DimensionRelationship(dim) => Some(&dim.relationship),
            _ => None,
        }
    }

    pub fn aspect_node(&self) -> Option<&AspectNode> {
        match &self.kind {
            DefinitionKind::Aspect(node) => Some(node),
            _ => None,
        }
    }

    /// Aspects this node defines. A dimension relationship node covers its
    /// dimension only when the dimension is given statically.
    pub fn aspects_covered(&self) -> Vec<Aspect> {
        match &self.kind {
            DefinitionKind::Rule(rule) => rule.aspects_covered(),
            DefinitionKind::ConceptRelationship(_) => vec![Aspect::Concept],
            DefinitionKind::DimensionRelationship(dim) => match &dim.dimension {
                Expr::Literal(Value::QName(qname)) => vec![Aspect::ExplicitDimension(qname.clone())],
                _ => Vec::new(),
            },
            DefinitionKind::Aspect(node) => node.aspects_covered(),
            DefinitionKind::Table(_) | DefinitionKind::Breakdown(_) => Vec::new(),
        }
    }

    pub fn has_aspect(&self, tag_selectors: &[CompactString], aspect: &Aspect) -> bool {
        match &self.kind {
            DefinitionKind::Rule(rule) => rule.select(tag_selectors).map_or(false, |s| s.covers(aspect)),
            _ => self.aspects_covered().contains(aspect),
        }
    }

    pub fn is_abstract(&self) -> bool {
        matches!(&self.kind, DefinitionKind::Rule(rule) if rule.is_abstract)
    }

    pub fn is_merged(&self) -> bool {
        matches!(&self.kind, DefinitionKind::Rule(rule) if rule.is_merged)
    }

    /// Rule and relationship nodes: children known without reading facts.
    pub fn is_closed(&self) -> bool {
        matches!(
            self.kind,
            DefinitionKind::Rule(_) | DefinitionKind::ConceptRelationship(_) | DefinitionKind::DimensionRelationship(_)
        )
    }

    pub fn is_open(&self) -> bool {
        matches!(self.kind, DefinitionKind::Aspect(_))
    }

    pub fn is_breakdown(&self) -> bool {
        matches!(self.kind, DefinitionKind::Breakdown(_))
    }

    pub fn tag_selector(&self) -> Option<&CompactString> {
        self.rule_node().and_then(|r| r.tag_selector.as_ref())
    }

    pub fn parent_child_order(&self) -> Option<ParentChildOrder> {
        match &self.kind {
            DefinitionKind::Table(table) => table.parent_child_order,
            DefinitionKind::Breakdown(breakdown) => breakdown.parent_child_order,
            DefinitionKind::Rule(rule) => rule.parent_child_order,
            DefinitionKind::ConceptRelationship(rel) => rel.parent_child_order,
            DefinitionKind::DimensionRelationship(dim) => dim.relationship.parent_child_order,
            DefinitionKind::Aspect(_) => None,
        }
    }

    /// Kind of rollup synthesized when leveling below a node of this definition.
    pub fn rollup_type(&self) -> Rollup {
        match self.kind {
            DefinitionKind::ConceptRelationship(_) => Rollup::ForConceptRelationship,
            DefinitionKind::DimensionRelationship(_) => Rollup::ForDimensionRelationship,
            DefinitionKind::Rule(_) => Rollup::ForClosedNode,
            DefinitionKind::Aspect(_) => Rollup::ForOpenNode,
            DefinitionKind::Table(_) | DefinitionKind::Breakdown(_) => Rollup::ForDefinitionNode,
        }
    }

    /// Number of structural nodes this node contributes and the header rows
    /// they occupy. Relationship nodes need the navigated forest.
    pub fn cardinality_and_depth(&self, forest: Option<&[ForestEntry]>, or_self_roots: usize) -> (usize, usize) {
        match &self.kind {
            DefinitionKind::Rule(rule) => {
                if !rule.aspects_covered().is_empty() || self.is_labeled() {
                    (1, 1)
                } else {
                    (0, 0)
                }
            }
            DefinitionKind::Breakdown(_) | DefinitionKind::Table(_) => {
                (1, if self.is_labeled() { 1 } else { 0 })
            }
            DefinitionKind::ConceptRelationship(_) | DefinitionKind::DimensionRelationship(_) => {
                let (count, depth) = forest.map(forest_extent).unwrap_or((0, 0));
                if or_self_roots > 0 {
                    (count + or_self_roots, depth + 1)
                } else {
                    (count, depth)
                }
            }
            DefinitionKind::Aspect(_) => (1, 1),
        }
    }
}

#[derive(Debug, Clone)]
pub struct BreakdownEdge {
    pub axis: Axis,
    pub order: f32,
    pub breakdown: Arc<DefinitionNode>,
}

/// Source of definition nodes and the arcs linking them.
pub trait DefinitionGraph: Send + Sync {
    fn node(&self, key: &DefinitionKey) -> Option<Arc<DefinitionNode>>;

    /// Subtree children of a breakdown or definition node, in arc order.
    fn subtree_children(&self, key: &DefinitionKey) -> Vec<Arc<DefinitionNode>>;

    /// Breakdowns of `table` on `axis`, in arc order.
    fn breakdown_edges(&self, table: &DefinitionKey, axis: Axis) -> Vec<BreakdownEdge>;

    fn tables(&self) -> Vec<Arc<DefinitionNode>>;

    /// True if any subtree child covers exactly the aspects `node` covers.
    fn children_cover_same_aspects(&self, node: &DefinitionNode) -> bool {
        let covered = node.aspects_covered();
        self.subtree_children(&node.key).iter().any(|child| {
            let child_covered = child.aspects_covered();
            child_covered.len() == covered.len() && child_covered.iter().all(|a| covered.contains(a))
        })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum DefinitionError {
    #[error("Arc references unknown definition node {0}")]
    UnknownNode(DefinitionKey),

    #[error("Duplicate definition node {0}")]
    DuplicateNode(DefinitionKey),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BreakdownArc {
    table: DefinitionKey,
    breakdown: DefinitionKey,
    axis: Axis,
    #[serde(default)]
    order: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SubtreeArc {
    parent: DefinitionKey,
    child: DefinitionKey,
    #[serde(default)]
    order: f32,
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DefinitionDocument {
    #[serde(default)]
    nodes: Vec<DefinitionNode>,
    #[serde(default)]
    breakdown_arcs: Vec<BreakdownArc>,
    #[serde(default)]
    subtree_arcs: Vec<SubtreeArc>,
}

/// In-memory definition graph with arcs indexed by source.
#[derive(Debug, Default, Deserialize)]
#[serde(try_from = "DefinitionDocument")]
pub struct DefinitionModel {
    nodes: IndexMap<DefinitionKey, Arc<DefinitionNode>>,
    breakdowns: AHashMap<DefinitionKey, Vec<(Axis, f32, DefinitionKey)>>,
    subtrees: AHashMap<DefinitionKey, Vec<(f32, DefinitionKey)>>,
}

impl TryFrom<DefinitionDocument> for DefinitionModel {
    type Error = DefinitionError;

    fn try_from(doc: DefinitionDocument) -> Result<Self, Self::Error> {
        let mut model = DefinitionModel::new();
        for node in doc.nodes {
            if model.nodes.contains_key(&node.key) {
                return Err(DefinitionError::DuplicateNode(node.key));
            }
            model.add_node(node);
        }
        for arc in doc.breakdown_arcs {
            model.link_breakdown(&arc.table, &arc.breakdown, arc.axis, arc.order)?;
        }
        for arc in doc.subtree_arcs {
            model.link_subtree(&arc.parent, &arc.child, arc.order)?;
        }
        Ok(model)
    }
}

impl DefinitionModel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_node(&mut self, node: DefinitionNode) -> &mut Self {
        self.nodes.insert(node.key.clone(), Arc::new(node));
        self
    }

    pub fn link_breakdown(
        &mut self,
        table: &DefinitionKey,
        breakdown: &DefinitionKey,
        axis: Axis,
        order: f32,
    ) -> Result<&mut Self, DefinitionError> {
        self.require(table)?;
        self.require(breakdown)?;
        let edges = self.breakdowns.entry(table.clone()).or_default();
        edges.push((axis, order, breakdown.clone()));
        edges.sort_by(|a, b| a.1.total_cmp(&b.1));
        Ok(self)
    }

    pub fn link_subtree(
        &mut self,
        parent: &DefinitionKey,
        child: &DefinitionKey,
        order: f32,
    ) -> Result<&mut Self, DefinitionError> {
        self.require(parent)?;
        self.require(child)?;
        let children = self.subtrees.entry(parent.clone()).or_default();
        children.push((order, child.clone()));
        children.sort_by(|a, b| a.0.total_cmp(&b.0));
        Ok(self)
    }

    /// Builder shorthand: add `node` as the next subtree child of `parent`.
    pub fn add_child(&mut self, parent: &str, node: DefinitionNode) -> Result<&mut Self, DefinitionError> {
        let parent = DefinitionKey::new(parent);
        let order = self.subtrees.get(&parent).map_or(0, Vec::len) as f32 + 1.0;
        let child = node.key.clone();
        self.add_node(node);
        self.link_subtree(&parent, &child, order)
    }

    /// Builder shorthand: add `node` as the next breakdown of `table` on `axis`.
    pub fn add_breakdown(&mut self, table: &str, axis: Axis, node: DefinitionNode) -> Result<&mut Self, DefinitionError> {
        let table = DefinitionKey::new(table);
        let order = self.breakdowns.get(&table).map_or(0, Vec::len) as f32 + 1.0;
        let breakdown = node.key.clone();
        self.add_node(node);
        self.link_breakdown(&table, &breakdown, axis, order)
    }

    fn require(&self, key: &DefinitionKey) -> Result<(), DefinitionError> {
        if self.nodes.contains_key(key) {
            Ok(())
        } else {
            Err(DefinitionError::UnknownNode(key.clone()))
        }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

impl DefinitionGraph for DefinitionModel {
    fn node(&self, key: &DefinitionKey) -> Option<Arc<DefinitionNode>> {
        self.nodes.get(key).cloned()
    }

    fn subtree_children(&self, key: &DefinitionKey) -> Vec<Arc<DefinitionNode>> {
        self.subtrees
            .get(key)
            .map(|children| children.iter().filter_map(|(_, k)| self.nodes.get(k).cloned()).collect())
            .unwrap_or_default()
    }

    fn breakdown_edges(&self, table: &DefinitionKey, axis: Axis) -> Vec<BreakdownEdge> {
        self.breakdowns
            .get(table)
            .map(|edges| {
                edges
                    .iter()
                    .filter(|(a, _, _)| *a == axis)
                    .filter_map(|(a, order, key)| {
                        self.nodes.get(key).map(|node| BreakdownEdge {
                            axis: *a,
                            order: *order,
                            breakdown: Arc::clone(node),
                        })
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    fn tables(&self) -> Vec<Arc<DefinitionNode>> {
        self.nodes
            .values()
            .filter(|n| matches!(n.kind, DefinitionKind::Table(_)))
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constraint_set_selection() {
        let rule = RuleNode::new()
            .with_rule(Aspect::Concept, Expr::qname("m:Assets"))
            .with_rule(Aspect::Period(PeriodAspect::Instant), Expr::string("2023-12-31"))
            .with_tagged_rule(Some(PERIOD_START_TAG), Aspect::Period(PeriodAspect::Instant), Expr::string("2023-01-01"));
        assert_eq!(rule.constraint_sets.len(), 2);
        let tags = vec![CompactString::new(PERIOD_START_TAG)];
        assert_eq!(rule.select(&tags).and_then(|s| s.tag.as_deref()), Some(PERIOD_START_TAG));
        assert!(rule.select(&[]).unwrap().tag.is_none());
        assert_eq!(rule.aspects_covered().len(), 2);
    }

    #[test]
    fn test_rule_cardinality() {
        let empty = DefinitionNode::rule("r0", RuleNode::new());
        assert_eq!(empty.cardinality_and_depth(None, 0), (0, 0));
        let labeled = empty.clone().with_label("http://www.xbrl.org/2008/role/label", "en", "Total");
        assert_eq!(labeled.cardinality_and_depth(None, 0), (1, 1));
        let breakdown = DefinitionNode::breakdown("b");
        assert_eq!(breakdown.cardinality_and_depth(None, 0), (1, 0));
    }

    #[test]
    fn test_graph_orders_children_and_edges() {
        let mut model = DefinitionModel::new();
        model.add_node(DefinitionNode::table("t"));
        model.add_breakdown("t", Axis::Y, DefinitionNode::breakdown("b1")).unwrap();
        model.add_breakdown("t", Axis::X, DefinitionNode::breakdown("b2")).unwrap();
        model.add_node(DefinitionNode::rule("late", RuleNode::new()));
        model.add_node(DefinitionNode::rule("early", RuleNode::new()));
        model.link_subtree(&"b1".into(), &"late".into(), 2.0).unwrap();
        model.link_subtree(&"b1".into(), &"early".into(), 1.0).unwrap();

        let children: Vec<String> = model
            .subtree_children(&"b1".into())
            .iter()
            .map(|n| n.key.to_string())
            .collect();
        assert_eq!(children, vec!["early", "late"]);
        assert_eq!(model.breakdown_edges(&"t".into(), Axis::Y).len(), 1);
        assert_eq!(model.tables().len(), 1);
        assert!(model.link_subtree(&"b1".into(), &"missing".into(), 1.0).is_err());
    }

    #[test]
    fn test_deserialize_document() {
        let json = r#"{
            "nodes": [
                {"key": "t", "type": "table"},
                {"key": "b", "type": "breakdown"},
                {"key": "r", "type": "rule", "abstract": true,
                 "constraintSets": [{"rules": [{"aspect": "concept", "value": {"literal": {"qName": "m:A"}}}]}]},
                {"key": "d", "type": "dimensionRelationship", "dimension": {"literal": {"qName": "d:Dim"}},
                 "formulaAxis": {"literal": {"string": "child"}}}
            ],
            "breakdownArcs": [{"table": "t", "breakdown": "b", "axis": "x"}],
            "subtreeArcs": [{"parent": "b", "child": "r"}, {"parent": "r", "child": "d", "order": 2}]
        }"#;
        let model: DefinitionModel = serde_json::from_str(json).unwrap();
        let rule = model.node(&"r".into()).unwrap();
        assert!(rule.is_abstract());
        assert_eq!(rule.aspects_covered(), vec![Aspect::Concept]);
        let dim = model.node(&"d".into()).unwrap();
        assert_eq!(dim.aspects_covered(), vec![Aspect::ExplicitDimension(QName::new("d:Dim"))]);
        assert_eq!(dim.rollup_type(), Rollup::ForDimensionRelationship);
    }
}
