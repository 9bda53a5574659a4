mod common;

use common::*;
use pretty_assertions::assert_eq;
use std::collections::BTreeSet;
use tabrl::definition::{
    AspectNode, DefinitionKind, DimensionRelationshipNode, ParentChildOrder, RelationshipNode, RuleNode,
    TableNode, TableParameter,
};
use tabrl::header::{HeaderProjector, HeaderSource};
use tabrl::linkbase::{Relationship, PARENT_CHILD_ARCROLE};
use tabrl::model::{BoundFact, PeriodAspect};
use tabrl::taxonomy::{PERIOD_END_LABEL_ROLE, PERIOD_START_LABEL_ROLE};
use tabrl::{
    Aspect, Axis, DefinitionModel, DefinitionNode, ErrorCode, Expr, FactPool, QName, RelationshipNetwork,
    Resolver, ResolverConfig, Rollup, Value,
};

fn breakdowns(graph: &mut DefinitionModel, keys: &[(&str, Axis)]) {
    for (key, axis) in keys {
        graph.add_breakdown("t", *axis, DefinitionNode::breakdown(key)).unwrap();
    }
}

fn error_code(graph: &DefinitionModel) -> (ErrorCode, Option<String>) {
    let err = resolve(graph).unwrap_err();
    (err.code, err.node.map(|k| k.as_str().to_string()))
}

#[test]
fn test_concept_rows_against_single_column() {
    let mut graph = table();
    breakdowns(&mut graph, &[("bx", Axis::X), ("by", Axis::Y)]);
    graph
        .add_child("bx", rule("cols", Aspect::Unit, "iso4217:EUR"))
        .unwrap()
        .add_child("by", concept_relationship("rows", "m:Assets", "child"))
        .unwrap();

    let set = resolve(&graph).unwrap();
    assert!(set.diagnostics.is_empty(), "{:?}", set.diagnostics);
    let table = set.first_table().unwrap();
    assert_eq!(table.data_cols, 1);
    assert_eq!(table.data_rows, 3);
    assert_eq!(table.z_breakdowns, 0);
    assert_eq!(set.leaf_node_count(table, Axis::Z), 1);

    let by = set.breakdown(table, Axis::Y).unwrap();
    let rows: Vec<Option<String>> = set.model.children(by).iter().map(|id| concept_of(&set, *id)).collect();
    assert_eq!(
        rows,
        vec![
            Some("m:Current".to_string()),
            Some("m:NonCurrent".to_string()),
            Some("m:Other".to_string())
        ]
    );
    let first = set.model.children(by)[0];
    assert_eq!(set.header_sources(first, "en", None)[0].text(), "Current assets");
}

#[test]
fn test_second_breakdown_nests_under_each_leaf() {
    let mut graph = table();
    breakdowns(&mut graph, &[("by1", Axis::Y), ("by2", Axis::Y)]);
    graph
        .add_child("by1", concept_rule("a1", "m:Current"))
        .unwrap()
        .add_child("by1", concept_rule("a2", "m:NonCurrent"))
        .unwrap()
        .add_child("by2", rule("b1", Aspect::Unit, "iso4217:EUR"))
        .unwrap()
        .add_child("by2", rule("b2", Aspect::Unit, "iso4217:USD"))
        .unwrap();

    let set = resolve(&graph).unwrap();
    let table = set.first_table().unwrap();
    assert_eq!(table.data_rows, 4);

    let outer = set.breakdown(table, Axis::Y).unwrap();
    assert_eq!(set.model.children(outer).len(), 2);
    for first in set.model.children(outer) {
        let inner = set.model.children(*first);
        assert_eq!(inner.len(), 1);
        assert_eq!(
            set.model.node(inner[0]).definition_key().map(|k| k.as_str()),
            Some("by2")
        );
        assert_eq!(set.model.children(inner[0]).len(), 2);
    }

    let leaf = set.model.leaves(outer)[0];
    assert_eq!(concept_of(&set, leaf).as_deref(), Some("m:Current"));
    assert_eq!(
        set.aspect_value(leaf, &Aspect::Unit, true),
        Some(Value::qname("iso4217:EUR"))
    );
}

#[test]
fn test_rule_rollup_placement_follows_parent_child_order() {
    for (order, rollup_index) in [(ParentChildOrder::ParentFirst, 0), (ParentChildOrder::ChildrenFirst, 2)] {
        let mut graph = table();
        breakdowns(&mut graph, &[("by", Axis::Y)]);
        graph
            .add_child(
                "by",
                DefinitionNode::rule(
                    "total",
                    RuleNode::new()
                        .with_rule(Aspect::Concept, Expr::qname("m:Cash"))
                        .ordered(order),
                ),
            )
            .unwrap()
            .add_child("total", rule("north", region(), "r:North"))
            .unwrap()
            .add_child("total", rule("south", region(), "r:South"))
            .unwrap();

        let set = resolve(&graph).unwrap();
        let total = find(&set, "total");
        let children = set.model.children(total).to_vec();
        assert_eq!(children.len(), 3);

        let rollup = children[rollup_index];
        assert_eq!(set.model.node(rollup).rollup, Rollup::ImpliesDefaultMember);
        assert_eq!(set.aspect_value(rollup, &region(), true), Some(Value::qname("r:All")));
        assert_eq!(concept_of(&set, rollup).as_deref(), Some("m:Cash"));
        assert_eq!(set.first_table().unwrap().data_rows, 3);
    }
}

#[test]
fn test_rollup_specifies_member_when_children_add_nothing() {
    let mut graph = table();
    breakdowns(&mut graph, &[("by", Axis::Y)]);
    graph
        .add_child("by", concept_rule("cash", "m:Cash"))
        .unwrap()
        .add_child("cash", DefinitionNode::rule("detail", RuleNode::new()).with_label(
            tabrl::taxonomy::STANDARD_LABEL_ROLE,
            "en",
            "Detail",
        ))
        .unwrap();

    let set = resolve(&graph).unwrap();
    let cash = find(&set, "cash");
    let rollup = set.model.children(cash)[0];
    assert_eq!(set.model.node(rollup).rollup, Rollup::SpecifiesMember);
}

#[test]
fn test_closed_node_without_contribution_is_rejected() {
    let mut graph = table();
    breakdowns(&mut graph, &[("by", Axis::Y)]);
    graph.add_child("by", DefinitionNode::rule("empty", RuleNode::new())).unwrap();
    assert_eq!(
        error_code(&graph),
        (ErrorCode::ClosedDefinitionNodeZeroCardinality, Some("empty".to_string()))
    );

    // a label alone is a contribution
    let mut graph = table();
    breakdowns(&mut graph, &[("by", Axis::Y)]);
    graph
        .add_child(
            "by",
            DefinitionNode::rule("empty", RuleNode::new()).with_label(tabrl::taxonomy::STANDARD_LABEL_ROLE, "en", "Total"),
        )
        .unwrap();
    assert!(resolve(&graph).is_ok());
}

#[test]
fn test_relationship_without_entries_is_rejected() {
    let mut graph = table();
    breakdowns(&mut graph, &[("by", Axis::Y)]);
    graph
        .add_child("by", concept_relationship("leafless", "m:Cash", "child"))
        .unwrap();
    assert_eq!(
        error_code(&graph),
        (ErrorCode::ClosedDefinitionNodeZeroCardinality, Some("leafless".to_string()))
    );

    let mut graph = table();
    breakdowns(&mut graph, &[("by", Axis::Y)]);
    graph
        .add_child("by", concept_relationship("self", "m:Cash", "child-or-self"))
        .unwrap();
    let set = resolve(&graph).unwrap();
    assert_eq!(set.first_table().unwrap().data_rows, 1);
}

#[test]
fn test_or_self_source_appears_once() {
    let mut graph = table();
    breakdowns(&mut graph, &[("by", Axis::Y)]);
    graph
        .add_child("by", concept_relationship("assets", "m:Assets", "child-or-self"))
        .unwrap();

    let set = resolve(&graph).unwrap();
    let table = set.first_table().unwrap();
    let by = set.breakdown(table, Axis::Y).unwrap();
    let roots = set.model.children(by);
    assert_eq!(roots.len(), 1);
    assert_eq!(concept_of(&set, roots[0]).as_deref(), Some("m:Assets"));
    // abstract source: no aggregate row
    assert!(set.model.is_abstract(roots[0]));
    assert_eq!(set.model.children(roots[0]).len(), 3);
    assert_eq!(table.data_rows, 3);
}

#[test]
fn test_or_self_root_with_children_gets_relationship_rollup() {
    let mut graph = table();
    breakdowns(&mut graph, &[("by", Axis::Y)]);
    graph
        .add_child("by", concept_relationship("current", "m:Current", "child-or-self"))
        .unwrap();

    let set = resolve(&graph).unwrap();
    let by = set.breakdown(set.first_table().unwrap(), Axis::Y).unwrap();
    let root = set.model.children(by)[0];
    let children = set.model.children(root);
    assert_eq!(children.len(), 2);
    assert_eq!(set.model.node(children[0]).rollup, Rollup::ForConceptRelationship);
    assert_eq!(concept_of(&set, children[0]).as_deref(), Some("m:Current"));
    assert_eq!(concept_of(&set, children[1]).as_deref(), Some("m:Cash"));
    assert_eq!(set.first_table().unwrap().data_rows, 2);

    // the rollup owns nothing and takes its header from the inherited concept
    let projector = HeaderProjector::new("en");
    assert_eq!(
        projector.header_sources(&set.model, children[0], None),
        vec![HeaderSource::AspectLabel {
            aspect: Aspect::Concept,
            text: "Current assets".to_string(),
        }]
    );
    assert_eq!(projector.header(&set.model, root, None).as_deref(), Some("Current assets"));
}

#[test]
fn test_dimension_relationship_walks_domain() {
    let mut graph = table();
    breakdowns(&mut graph, &[("bx", Axis::X), ("by", Axis::Y)]);
    graph
        .add_child("bx", region_relationship("regions", "r:All", "descendant-or-self"))
        .unwrap()
        .add_child("by", concept_rule("cash", "m:Cash"))
        .unwrap();

    let set = resolve(&graph).unwrap();
    let table = set.first_table().unwrap();
    assert_eq!(table.data_cols, 3);

    let bx = set.breakdown(table, Axis::X).unwrap();
    let leaves: Vec<Option<Value>> = set
        .model
        .leaves(bx)
        .into_iter()
        .map(|id| set.aspect_value(id, &region(), true))
        .collect();
    assert_eq!(
        leaves,
        vec![
            Some(Value::qname("r:All")),
            Some(Value::qname("r:North")),
            Some(Value::qname("r:South"))
        ]
    );
    let root = set.model.children(bx)[0];
    assert_eq!(
        set.model.node(set.model.children(root)[0]).rollup,
        Rollup::ForDimensionRelationship
    );
}

#[test]
fn test_period_member_blocks_inherited_start() {
    let mut graph = table();
    breakdowns(&mut graph, &[("by", Axis::Y)]);
    graph
        .add_child(
            "by",
            DefinitionNode::rule(
                "year",
                RuleNode::new()
                    .with_rule(Aspect::Period(PeriodAspect::Start), Expr::Literal(Value::Date(date("2023-01-01"))))
                    .abstract_node(),
            ),
        )
        .unwrap()
        .add_child(
            "year",
            DefinitionNode::rule(
                "closing",
                RuleNode::new()
                    .with_rule(Aspect::Period(PeriodAspect::Instant), Expr::Literal(Value::Date(date("2023-12-31")))),
            ),
        )
        .unwrap()
        .add_child("year", concept_rule("plain", "m:Cash"))
        .unwrap();

    let set = resolve(&graph).unwrap();
    let start = Aspect::Period(PeriodAspect::Start);
    let closing = find(&set, "closing");
    assert_eq!(set.has_aspect(closing, &start, true), None);
    assert_eq!(
        set.aspect_value(closing, &Aspect::Period(PeriodAspect::Instant), true),
        Some(Value::Date(date("2023-12-31")))
    );

    let plain = find(&set, "plain");
    assert_eq!(set.has_aspect(plain, &start, true), Some(find(&set, "year")));
    assert_eq!(set.aspect_value(plain, &start, true), Some(Value::Date(date("2023-01-01"))));
}

#[test]
fn test_dimensions_union_minus_omitted() {
    let dims = |names: &[&str]| Expr::Sequence(names.iter().map(|n| Expr::qname(n)).collect());
    let mut graph = table();
    breakdowns(&mut graph, &[("by", Axis::Y)]);
    graph
        .add_child(
            "by",
            DefinitionNode::rule(
                "outer",
                RuleNode::new().with_rule(Aspect::Dimensions, dims(&["d:A", "d:B"])).abstract_node(),
            ),
        )
        .unwrap()
        .add_child(
            "outer",
            DefinitionNode::rule(
                "middle",
                RuleNode::new().with_rule(Aspect::Dimensions, dims(&["d:C"])).abstract_node(),
            ),
        )
        .unwrap()
        .add_child(
            "middle",
            DefinitionNode::rule("inner", RuleNode::new().with_rule(Aspect::OmitDimensions, dims(&["d:B"]))),
        )
        .unwrap();

    let set = resolve(&graph).unwrap();
    let inner = find(&set, "inner");
    let expected: BTreeSet<QName> = [QName::new("d:A"), QName::new("d:C")].into_iter().collect();
    assert_eq!(
        set.aspect_value(inner, &Aspect::Dimensions, true),
        Some(Value::Dimensions(expected))
    );
    assert_eq!(set.aspect_value(inner, &Aspect::Dimensions, false), None);
}

#[test]
fn test_sibling_without_dimension_is_deemed_defaulted() {
    let mut graph = table();
    breakdowns(&mut graph, &[("bx", Axis::X), ("by", Axis::Y)]);
    graph
        .add_child("bx", concept_rule("cash", "m:Cash"))
        .unwrap()
        .add_child("by", rule("north", region(), "r:North"))
        .unwrap()
        .add_child("by", rule("plain", Aspect::Unit, "iso4217:EUR"))
        .unwrap();

    let set = resolve(&graph).unwrap();
    let north = find(&set, "north");
    let plain = find(&set, "plain");
    assert_eq!(set.aspect_value(north, &region(), true), Some(Value::qname("r:North")));
    assert!(set.model.node(plain).deemed_defaulted_dims.contains(&QName::new("d:Region")));
    assert_eq!(set.aspect_value(plain, &region(), true), Some(Value::qname("r:All")));
}

#[test]
fn test_open_node_without_facts_gets_entry_row() {
    let mut graph = table();
    breakdowns(&mut graph, &[("by", Axis::Y), ("bz", Axis::Z)]);
    let open = |key: &str| DefinitionNode::new(key, DefinitionKind::Aspect(AspectNode::new(Aspect::Concept)));
    graph
        .add_child("by", open("rows"))
        .unwrap()
        .add_child("bz", open("sheets"))
        .unwrap();

    let set = resolve(&graph).unwrap();
    let table = set.first_table().unwrap();
    assert_eq!(table.data_rows, 1);
    let by = set.breakdown(table, Axis::Y).unwrap();
    let row = set.model.children(by)[0];
    assert!(matches!(set.model.node(row).bound_fact, Some(BoundFact::Prototype(_))));

    // z never receives entry rows; the breakdown still yields one point
    let bz = set.breakdown(table, Axis::Z).unwrap();
    assert_eq!(set.leaf_node_count(table, Axis::Z), 1);
    assert!(set.model.node(set.model.children(bz)[0]).bound_fact.is_none());

    let report = resolve_with(&graph, Vec::new(), ResolverConfig::report()).unwrap();
    assert_eq!(report.first_table().unwrap().data_rows, 1);
    let by = report.breakdown(report.first_table().unwrap(), Axis::Y).unwrap();
    assert!(report.model.node(report.model.children(by)[0]).bound_fact.is_none());
}

#[test]
fn test_open_node_partitions_reported_facts() {
    let mut graph = table();
    breakdowns(&mut graph, &[("by", Axis::Y)]);
    graph
        .add_child("by", DefinitionNode::new("rows", DefinitionKind::Aspect(AspectNode::new(Aspect::Concept))))
        .unwrap();
    let facts = vec![
        fact("m:Current", None),
        fact("m:Cash", None),
        fact("m:Current", Some("r:North")),
    ];

    let set = resolve_with(&graph, facts.clone(), ResolverConfig::default()).unwrap();
    let by = set.breakdown(set.first_table().unwrap(), Axis::Y).unwrap();
    let rows: Vec<Option<String>> = set.model.children(by).iter().map(|id| concept_of(&set, *id)).collect();
    assert_eq!(rows, vec![Some("m:Current".to_string()), Some("m:Cash".to_string())]);
    assert_eq!(set.model.node(set.model.children(by)[0]).facts_partition.len(), 2);

    let entry = resolve_with(&graph, facts, ResolverConfig::entry()).unwrap();
    let by = entry.breakdown(entry.first_table().unwrap(), Axis::Y).unwrap();
    let last = *entry.model.children(by).last().unwrap();
    assert_eq!(entry.first_table().unwrap().data_rows, 3);
    assert!(matches!(entry.model.node(last).bound_fact, Some(BoundFact::Prototype(_))));
}

#[test]
fn test_relationship_variable_reaches_other_axes_through_z() {
    let mut graph = table();
    breakdowns(&mut graph, &[("bx", Axis::X), ("bz", Axis::Z)]);
    let sheets = RelationshipNode {
        source: Some(Expr::qname("m:Assets")),
        link_role: Some(Expr::string(ROLE)),
        formula_axis: Some(Expr::string("child")),
        variable: Some(QName::new("v:sheet")),
        ..RelationshipNode::default()
    };
    graph
        .add_child("bz", DefinitionNode::new("sheets", DefinitionKind::ConceptRelationship(sheets)))
        .unwrap()
        .add_child("bx", DefinitionNode::rule("col", RuleNode::new().with_rule(Aspect::Concept, Expr::var("v:sheet"))))
        .unwrap();

    let set = resolve(&graph).unwrap();
    let table = set.first_table().unwrap();
    assert_eq!(set.leaf_node_count(table, Axis::Z), 3);
    assert_eq!(concept_of(&set, find(&set, "col")).as_deref(), Some("m:Current"));
}

#[test]
fn test_table_parameters_produce_one_table_each() {
    let mut graph = DefinitionModel::new();
    graph.add_node(DefinitionNode::new(
        "t",
        DefinitionKind::Table(TableNode {
            parameters: vec![TableParameter {
                name: QName::new("p:concept"),
                value: Expr::Sequence(vec![Expr::qname("m:Current"), Expr::qname("m:Cash")]),
            }],
            ..TableNode::default()
        }),
    ));
    breakdowns(&mut graph, &[("by", Axis::Y)]);
    graph
        .add_child("by", DefinitionNode::rule("row", RuleNode::new().with_rule(Aspect::Concept, Expr::var("p:concept"))))
        .unwrap();

    let set = resolve(&graph).unwrap();
    assert_eq!(set.tables.len(), 2);
    let concepts: Vec<Option<String>> = set
        .tables
        .iter()
        .map(|table| {
            let by = set.breakdown(table, Axis::Y).unwrap();
            concept_of(&set, set.model.leaves(by)[0])
        })
        .collect();
    assert_eq!(concepts, vec![Some("m:Current".to_string()), Some("m:Cash".to_string())]);
    assert_eq!(set.tables[1].parameters, vec![(QName::new("p:concept"), Value::qname("m:Cash"))]);
}

#[test]
fn test_preferred_label_tags_entry() {
    let mut network = network();
    let mut opening = Relationship::new("m:Heading", "m:Cash", ROLE, PARENT_CHILD_ARCROLE, 1.0);
    opening.preferred_label = Some(PERIOD_START_LABEL_ROLE.into());
    let mut closing = Relationship::new("m:Heading", "m:Current", ROLE, PARENT_CHILD_ARCROLE, 2.0);
    closing.preferred_label = Some(PERIOD_END_LABEL_ROLE.into());
    closing.generic_preferred_label = Some(PERIOD_START_LABEL_ROLE.into());
    network.add(opening).add(closing);

    let mut graph = table();
    breakdowns(&mut graph, &[("by", Axis::Y)]);
    graph
        .add_child("by", concept_relationship("flow", "m:Heading", "child"))
        .unwrap();

    let set = resolve_in(&graph, &network, Vec::new(), ResolverConfig::default()).unwrap();
    let by = set.breakdown(set.first_table().unwrap(), Axis::Y).unwrap();
    let rows = set.model.children(by);
    let tags = |id| set.model.tag_selectors(id).iter().map(|t| t.to_string()).collect::<Vec<_>>();
    assert_eq!(tags(rows[0]), vec!["table.periodStart".to_string()]);
    assert_eq!(tags(rows[1]), vec!["table.periodEnd".to_string()]);

    let warnings: Vec<&ErrorCode> = set.diagnostics.iter().filter(|d| !d.is_error()).map(|d| &d.code).collect();
    assert_eq!(warnings, vec![&ErrorCode::AmbiguousPreferredLabel]);
}

#[test]
fn test_relationship_parameter_errors() {
    let cases: Vec<(RelationshipNode, ErrorCode)> = vec![
        (
            RelationshipNode {
                source: Some(Expr::qname("m:Assets")),
                formula_axis: Some(Expr::string("child")),
                generations: Some(Expr::integer(2)),
                ..RelationshipNode::default()
            },
            ErrorCode::RelationshipNodeTooManyGenerations,
        ),
        (
            RelationshipNode {
                source: Some(Expr::qname("m:Assets")),
                generations: Some(Expr::string("two")),
                ..RelationshipNode::default()
            },
            ErrorCode::ExpressionNotCastableToRequiredType,
        ),
        (
            RelationshipNode {
                source: Some(Expr::qname("m:Missing")),
                ..RelationshipNode::default()
            },
            ErrorCode::InvalidConceptRelationshipSource,
        ),
        (
            RelationshipNode {
                source: Some(Expr::qname("h:Cube")),
                ..RelationshipNode::default()
            },
            ErrorCode::InvalidConceptRelationshipSource,
        ),
        (
            RelationshipNode {
                source: Some(Expr::qname("m:Assets")),
                formula_axis: Some(Expr::string("descendant")),
                generations: Some(Expr::integer(1 << 32)),
                ..RelationshipNode::default()
            },
            ErrorCode::ResolutionException,
        ),
    ];
    for (node, expected) in cases {
        let mut graph = table();
        breakdowns(&mut graph, &[("by", Axis::Y)]);
        graph
            .add_child("by", DefinitionNode::new("rel", DefinitionKind::ConceptRelationship(node)))
            .unwrap();
        assert_eq!(error_code(&graph), (expected, Some("rel".to_string())));
    }
}

#[test]
fn test_relationship_spanning_link_roles_is_ambiguous() {
    let mut network = network();
    network.add(Relationship::new(
        "m:Assets",
        "m:Cash",
        "http://example.com/role/other",
        PARENT_CHILD_ARCROLE,
        4.0,
    ));

    let mut graph = table();
    breakdowns(&mut graph, &[("by", Axis::Y)]);
    let rel = RelationshipNode {
        source: Some(Expr::qname("m:Assets")),
        formula_axis: Some(Expr::string("child")),
        ..RelationshipNode::default()
    };
    graph
        .add_child("by", DefinitionNode::new("rel", DefinitionKind::ConceptRelationship(rel)))
        .unwrap();

    let err = resolve_in(&graph, &network, Vec::new(), ResolverConfig::default()).unwrap_err();
    assert_eq!(err.code, ErrorCode::AmbiguousConceptNetwork);
    assert_eq!(err.node.map(|k| k.as_str().to_string()), Some("rel".to_string()));

    let mut scoped = table();
    breakdowns(&mut scoped, &[("by", Axis::Y)]);
    scoped
        .add_child("by", concept_relationship("rel", "m:Assets", "child"))
        .unwrap();
    assert!(resolve_in(&scoped, &network, Vec::new(), ResolverConfig::default()).is_ok());
}

#[test]
fn test_dimension_relationship_errors() {
    let cases = [
        ("m:Cash", "r:All", ErrorCode::InvalidExplicitDimensionQName),
        ("d:Region", "m:Cash", ErrorCode::InvalidDimensionRelationshipSource),
    ];
    for (dimension, source, expected) in cases {
        let mut graph = table();
        breakdowns(&mut graph, &[("by", Axis::Y)]);
        let node = DimensionRelationshipNode {
            dimension: Expr::qname(dimension),
            relationship: RelationshipNode {
                source: Some(Expr::qname(source)),
                ..RelationshipNode::default()
            },
        };
        graph
            .add_child("by", DefinitionNode::new("dim", DefinitionKind::DimensionRelationship(node)))
            .unwrap();
        assert_eq!(error_code(&graph), (expected, Some("dim".to_string())));
    }
}

#[test]
fn test_rule_values_are_checked_against_taxonomy() {
    let cases = [
        (Aspect::Concept, "d:Region", Some(ErrorCode::InvalidQNameAspectValue)),
        (region(), "m:Cash", Some(ErrorCode::InvalidQNameAspectValue)),
        (region(), "xfi:absent", None),
        (region(), "r:South", None),
    ];
    for (aspect, value, expected) in cases {
        let mut graph = table();
        breakdowns(&mut graph, &[("by", Axis::Y)]);
        graph.add_child("by", rule("r", aspect, value)).unwrap();
        match expected {
            Some(code) => assert_eq!(error_code(&graph), (code, Some("r".to_string()))),
            None => assert!(resolve(&graph).is_ok(), "{} should be accepted", value),
        }
    }
}

#[test]
fn test_failing_table_does_not_stop_others() {
    let mut graph = DefinitionModel::new();
    for key in ["good", "bad"] {
        graph.add_node(DefinitionNode::table(key));
        let breakdown = format!("{}-rows", key);
        graph.add_breakdown(key, Axis::Y, DefinitionNode::breakdown(&breakdown)).unwrap();
    }
    graph
        .add_child("good-rows", concept_rule("ok", "m:Cash"))
        .unwrap()
        .add_child("bad-rows", concept_rule("broken", "m:Missing"))
        .unwrap();

    let network = network();
    let resolver = Resolver::new(
        &graph,
        &network,
        std::sync::Arc::new(taxonomy()),
        std::sync::Arc::new(FactPool::default()),
    );
    let resolution = resolver.resolve_all();
    assert_eq!(resolution.table_sets.len(), 1);
    assert_eq!(resolution.table_sets[0].definition.as_str(), "good");
    assert_eq!(resolution.diagnostics.len(), 1);
    assert_eq!(resolution.diagnostics[0].code, ErrorCode::InvalidQNameAspectValue);
    assert_eq!(resolution.diagnostics[0].node.as_ref().map(|k| k.as_str()), Some("broken"));
}

#[test]
fn test_unused_network_is_not_required() {
    let mut graph = table();
    breakdowns(&mut graph, &[("by", Axis::Y)]);
    graph.add_child("by", concept_rule("cash", "m:Cash")).unwrap();
    let set = resolve_in(&graph, &RelationshipNetwork::new(), Vec::new(), ResolverConfig::report()).unwrap();
    assert_eq!(set.first_table().unwrap().data_rows, 1);
}

fn region() -> Aspect {
    Aspect::ExplicitDimension(QName::new("d:Region"))
}
