// Table definition and cell tag-selector checks
use crate::definition::{Axis, DefinitionGraph, DefinitionKey, DefinitionKind, DefinitionNode, PERIOD_END_TAG, PERIOD_START_TAG};
use crate::error::{Diagnostic, ErrorCode};
use crate::model::{Aspect, QName};
use crate::structure::{NodeId, StructuralModel};
use crate::taxonomy::Taxonomy;
use ahash::{AHashMap, AHashSet};
use compact_str::CompactString;
use std::collections::BTreeSet;
use std::sync::Arc;

/// Static checks over a table's definition tree. Findings never stop
/// resolution.
pub fn check_definitions(graph: &dyn DefinitionGraph, taxonomy: &Taxonomy, table: &DefinitionNode) -> Vec<Diagnostic> {
    let mut checker = DefinitionChecker {
        graph,
        taxonomy,
        table: &table.key,
        prior_axis: AHashMap::new(),
        covered: AHashSet::new(),
        diagnostics: Vec::new(),
    };

    for axis in Axis::RESOLUTION_ORDER {
        for edge in graph.breakdown_edges(&table.key, axis) {
            checker.check_node(&edge.breakdown, axis);
        }
    }
    if !checker.covered.contains(&Aspect::Concept) {
        checker.push(
            ErrorCode::TableMissingConceptAspect,
            format!("Table {} does not include the concept aspect as one of its participating aspects", table.key),
        );
    }

    if let DefinitionKind::Table(node) = &table.kind {
        let mut seen: AHashSet<&QName> = AHashSet::new();
        for parameter in &node.parameters {
            if !seen.insert(&parameter.name) {
                checker.push(
                    ErrorCode::TableParameterNameClash,
                    format!("Table {} has parameter name clash for variable {}", table.key, parameter.name),
                );
            }
        }
    }
    checker.diagnostics
}

struct DefinitionChecker<'a> {
    graph: &'a dyn DefinitionGraph,
    taxonomy: &'a Taxonomy,
    table: &'a DefinitionKey,
    /// First axis each aspect was seen on.
    prior_axis: AHashMap<Aspect, (Axis, DefinitionKey)>,
    covered: AHashSet<Aspect>,
    diagnostics: Vec<Diagnostic>,
}

impl DefinitionChecker<'_> {
    fn push(&mut self, code: ErrorCode, message: String) {
        self.diagnostics.push(Diagnostic::error(code, message).on(self.table));
    }

    fn check_node(&mut self, node: &Arc<DefinitionNode>, axis: Axis) {
        for aspect in node.aspects_covered() {
            self.covered.insert(aspect.clone());
            match self.prior_axis.get(&aspect) {
                Some((other_axis, other)) if *other_axis != axis && aspect != Aspect::Dimensions => {
                    let message = format!(
                        "{} defines aspect {} on axis {} which {} already defines on axis {}",
                        node.key, aspect, axis, other, other_axis
                    );
                    self.push(ErrorCode::AspectClashBetweenBreakdowns, message);
                }
                Some(_) => {}
                None => {
                    self.prior_axis.insert(aspect, (axis, node.key.clone()));
                }
            }
        }

        let labels_forbidden = node.is_merged()
            || matches!(
                node.kind,
                DefinitionKind::ConceptRelationship(_) | DefinitionKind::DimensionRelationship(_) | DefinitionKind::Aspect(_)
            );
        if labels_forbidden && node.is_labeled() {
            self.push(ErrorCode::InvalidUseOfLabel, format!("{} has label(s)", node.key));
        }
        if node.is_merged() && !node.is_abstract() {
            self.push(
                ErrorCode::NonAbstractMergedRuleNode,
                format!("Merged rule node {} is not abstract", node.key),
            );
        }

        if let Some(rule) = node.rule_node() {
            let sets: Vec<(Option<&CompactString>, BTreeSet<&Aspect>)> = rule
                .constraint_sets
                .iter()
                .map(|set| (set.tag.as_ref(), set.aspects().filter(|a| **a != Aspect::Dimensions).collect()))
                .collect();
            if let Some((first_tag, first)) = sets.first() {
                for (tag, aspects) in &sets[1..] {
                    if aspects != first {
                        let message = format!(
                            "Rule node {} constraint sets {} and {} cover different aspects",
                            node.key,
                            first_tag.map_or("(no tag)", |t| t.as_str()),
                            tag.map_or("(no tag)", |t| t.as_str()),
                        );
                        self.push(ErrorCode::ConstraintSetAspectMismatch, message);
                    }
                }
            }
        }

        if let Some(open) = node.aspect_node() {
            for aspect in open.aspects_covered() {
                if let Some(dimension) = aspect.dimension() {
                    if !self.taxonomy.is_dimension(dimension) {
                        self.push(
                            ErrorCode::InvalidDimensionQNameOnAspectNode,
                            format!("Aspect node {} dimensional aspect {} is not a dimension", node.key, dimension),
                        );
                    }
                }
            }
        }

        let children = self.graph.subtree_children(&node.key);
        for child in &children {
            self.check_node(child, axis);
        }
        if children.is_empty() && node.is_closed() && node.is_abstract() {
            self.push(
                ErrorCode::AbstractRuleNodeNoChildren,
                format!("Abstract rule node {} has no children", node.key),
            );
        }
    }
}

/// Leaves taking part in cells on `axis`; `[None]` for an empty axis.
fn cell_leaves(model: &StructuralModel, table: NodeId, axis: Axis) -> Vec<Option<NodeId>> {
    let leaves: Vec<Option<NodeId>> = model
        .axis_breakdown(table, axis)
        .map(|breakdown| model.leaves(breakdown))
        .unwrap_or_default()
        .into_iter()
        .filter(|leaf| !model.is_abstract(*leaf) && !model.node(*leaf).is_breakdown())
        .map(Some)
        .collect();
    if leaves.is_empty() {
        vec![None]
    } else {
        leaves
    }
}

/// Checks every z×y×x cell: each rule node on a cell's header paths must
/// select exactly one constraint set through the cell's tags.
pub fn check_cell_tag_selectors(model: &StructuralModel, table: NodeId) -> Vec<Diagnostic> {
    let z = cell_leaves(model, table, Axis::Z);
    let y = cell_leaves(model, table, Axis::Y);
    let x = cell_leaves(model, table, Axis::X);
    let period_tags = [CompactString::new(PERIOD_START_TAG), CompactString::new(PERIOD_END_TAG)];

    let mut reported: AHashSet<(ErrorCode, DefinitionKey)> = AHashSet::new();
    let mut diagnostics = Vec::new();
    for zl in &z {
        for yl in &y {
            for xl in &x {
                let cell: Vec<NodeId> = [zl, yl, xl].into_iter().flatten().copied().collect();
                let mut tags: Vec<CompactString> = Vec::new();
                for leaf in &cell {
                    for tag in model.tag_selectors(*leaf) {
                        if !tags.contains(&tag) {
                            tags.push(tag);
                        }
                    }
                }
                if tags.iter().any(|t| period_tags.contains(t)) {
                    tags.retain(|t| period_tags.contains(t));
                }

                for leaf in &cell {
                    for n in model.chain(*leaf).take_while(|n| *n != table) {
                        let Some(definition) = &model.node(n).definition else {
                            continue;
                        };
                        let Some(rule) = definition.rule_node() else {
                            continue;
                        };
                        if rule.constraint_sets.iter().all(|s| s.tag.is_none()) {
                            continue;
                        }
                        let matching = rule
                            .constraint_sets
                            .iter()
                            .filter(|s| s.tag.as_ref().map_or(false, |t| tags.contains(t)))
                            .count();
                        let finding = if matching > 1 {
                            Some((
                                ErrorCode::TagSelectorClash,
                                format!("Cell tags [{}] select {} constraint sets of {}", tags.join(", "), matching, definition.key),
                            ))
                        } else if matching == 0 && rule.default_set().is_none() {
                            Some((
                                ErrorCode::NoMatchingConstraintSet,
                                format!("Cell tags [{}] select no constraint set of {}", tags.join(", "), definition.key),
                            ))
                        } else {
                            None
                        };
                        if let Some((code, message)) = finding {
                            if reported.insert((code.clone(), definition.key.clone())) {
                                diagnostics.push(Diagnostic::error(code, message).on(&definition.key));
                            }
                        }
                    }
                }
            }
        }
    }
    diagnostics
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::definition::{DefinitionModel, RuleNode, TableNode, TableParameter};
    use crate::evaluator::Expr;
    use crate::model::{FactPool, Value};
    use crate::structure::TableInfo;
    use crate::taxonomy::ConceptKind;

    fn codes(diagnostics: &[Diagnostic]) -> Vec<ErrorCode> {
        diagnostics.iter().map(|d| d.code.clone()).collect()
    }

    #[test]
    fn test_missing_concept_and_parameter_clash() {
        let mut graph = DefinitionModel::new();
        let parameter = TableParameter {
            name: QName::new("p:year"),
            value: Expr::integer(2023),
        };
        let table = TableNode {
            parameters: vec![parameter.clone(), parameter],
            ..TableNode::default()
        };
        graph.add_node(DefinitionNode::new("t", DefinitionKind::Table(table)));
        let table = graph.node(&"t".into()).unwrap();

        let found = codes(&check_definitions(&graph, &Taxonomy::new(), &table));
        assert_eq!(
            found,
            vec![ErrorCode::TableMissingConceptAspect, ErrorCode::TableParameterNameClash]
        );
    }

    #[test]
    fn test_aspect_clash_and_merged_checks() {
        let mut graph = DefinitionModel::new();
        graph.add_node(DefinitionNode::table("t"));
        graph.add_breakdown("t", Axis::X, DefinitionNode::breakdown("bx")).unwrap();
        graph.add_breakdown("t", Axis::Y, DefinitionNode::breakdown("by")).unwrap();
        graph
            .add_child("bx", DefinitionNode::rule("rx", RuleNode::new().with_rule(Aspect::Concept, Expr::qname("m:A"))))
            .unwrap();
        graph
            .add_child(
                "by",
                DefinitionNode::rule("ry", RuleNode::new().with_rule(Aspect::Concept, Expr::qname("m:B")).merged())
                    .with_label("http://www.xbrl.org/2008/role/label", "en", "Merged"),
            )
            .unwrap();
        let table = graph.node(&"t".into()).unwrap();

        let found = codes(&check_definitions(&graph, &Taxonomy::new(), &table));
        assert!(found.contains(&ErrorCode::AspectClashBetweenBreakdowns));
        assert!(found.contains(&ErrorCode::InvalidUseOfLabel));
        assert!(found.contains(&ErrorCode::NonAbstractMergedRuleNode));
        assert!(!found.contains(&ErrorCode::TableMissingConceptAspect));
    }

    #[test]
    fn test_rule_node_shape_checks() {
        let mut taxonomy = Taxonomy::new();
        taxonomy.add("m:NotADimension", ConceptKind::Item, false, false);
        let mut graph = DefinitionModel::new();
        graph.add_node(DefinitionNode::table("t"));
        graph.add_breakdown("t", Axis::Y, DefinitionNode::breakdown("b")).unwrap();
        graph
            .add_child("b", DefinitionNode::rule("empty", RuleNode::new().abstract_node()))
            .unwrap();
        graph
            .add_child(
                "b",
                DefinitionNode::rule(
                    "tagged",
                    RuleNode::new()
                        .with_rule(Aspect::Concept, Expr::qname("m:A"))
                        .with_tagged_rule(Some("t1"), Aspect::Unit, Expr::qname("iso4217:EUR")),
                ),
            )
            .unwrap();
        graph
            .add_child(
                "b",
                DefinitionNode::new(
                    "open",
                    DefinitionKind::Aspect(crate::definition::AspectNode::new(Aspect::ExplicitDimension(QName::new(
                        "m:NotADimension",
                    )))),
                ),
            )
            .unwrap();
        let table = graph.node(&"t".into()).unwrap();

        let found = codes(&check_definitions(&graph, &taxonomy, &table));
        assert!(found.contains(&ErrorCode::AbstractRuleNodeNoChildren));
        assert!(found.contains(&ErrorCode::ConstraintSetAspectMismatch));
        assert!(found.contains(&ErrorCode::InvalidDimensionQNameOnAspectNode));
    }

    #[test]
    fn test_cell_tags_select_one_set() {
        let mut model = StructuralModel::new(None, Arc::new(Taxonomy::new()), Arc::new(FactPool::default()));
        let table = model.add_table(model.root(), None, TableInfo::default());
        let y = model.add_breakdown(table, None, Axis::Y);
        let x = model.add_breakdown(table, None, Axis::X);

        let rule = RuleNode::new()
            .with_tagged_rule(Some("a"), Aspect::Concept, Expr::qname("m:A"))
            .with_tagged_rule(Some("b"), Aspect::Concept, Expr::qname("m:B"));
        let row = model.add_node(y, Some(Arc::new(DefinitionNode::rule("tagged", rule))));
        model.node_mut(row).aspects.insert(Aspect::Concept, Value::qname("m:A"));

        let col = model.add_node(x, None);
        assert_eq!(
            codes(&check_cell_tag_selectors(&model, table)),
            vec![ErrorCode::NoMatchingConstraintSet]
        );

        model.node_mut(col).tag_selectors.push(CompactString::new("a"));
        assert!(check_cell_tag_selectors(&model, table).is_empty());

        model.node_mut(col).tag_selectors.push(CompactString::new("b"));
        assert_eq!(
            codes(&check_cell_tag_selectors(&model, table)),
            vec![ErrorCode::TagSelectorClash]
        );
    }
}
