#![allow(dead_code)]

use chrono::NaiveDate;
use std::sync::Arc;
use tabrl::definition::{DefinitionKind, DimensionRelationshipNode, RelationshipNode, RuleNode};
use tabrl::linkbase::{Relationship, DIMENSION_DOMAIN_ARCROLE, DOMAIN_MEMBER_ARCROLE, PARENT_CHILD_ARCROLE};
use tabrl::model::{DimensionMember, Entity, Fact, Period, Unit};
use tabrl::taxonomy::{ConceptKind, Label, STANDARD_LABEL_ROLE};
use tabrl::{
    Aspect, DefinitionModel, DefinitionNode, Expr, FactPool, NodeId, QName, RelationshipNetwork, ResolutionError,
    ResolvedTableSet, Resolver, ResolverConfig, Rollup, Taxonomy,
};

pub const ROLE: &str = "http://example.com/role/balance";

/// Balance sheet concepts and a region dimension defaulting to `r:All`.
pub fn taxonomy() -> Taxonomy {
    let mut taxonomy = Taxonomy::new();
    taxonomy
        .add("m:Assets", ConceptKind::Item, true, false)
        .add("m:Current", ConceptKind::Item, false, false)
        .add("m:NonCurrent", ConceptKind::Item, false, false)
        .add("m:Other", ConceptKind::Item, false, false)
        .add("m:Cash", ConceptKind::Item, false, false)
        .add("m:Heading", ConceptKind::Item, true, false)
        .add("h:Cube", ConceptKind::Hypercube, true, false)
        .add("d:Region", ConceptKind::ExplicitDimension, true, false)
        .add("r:All", ConceptKind::Item, true, true)
        .add("r:North", ConceptKind::Item, true, true)
        .add("r:South", ConceptKind::Item, true, true)
        .set_dimension_default(QName::new("d:Region"), QName::new("r:All"));
    for (concept, text) in [("m:Current", "Current assets"), ("m:NonCurrent", "Non-current assets")] {
        taxonomy.add_label(
            QName::new(concept),
            Label {
                role: STANDARD_LABEL_ROLE.into(),
                lang: "en".into(),
                text: text.into(),
            },
        );
    }
    taxonomy
}

pub fn network() -> RelationshipNetwork {
    let mut network = RelationshipNetwork::new();
    network
        .add(Relationship::new("m:Assets", "m:Current", ROLE, PARENT_CHILD_ARCROLE, 1.0))
        .add(Relationship::new("m:Assets", "m:NonCurrent", ROLE, PARENT_CHILD_ARCROLE, 2.0))
        .add(Relationship::new("m:Assets", "m:Other", ROLE, PARENT_CHILD_ARCROLE, 3.0))
        .add(Relationship::new("m:Current", "m:Cash", ROLE, PARENT_CHILD_ARCROLE, 1.0))
        .add(Relationship::new("d:Region", "r:All", ROLE, DIMENSION_DOMAIN_ARCROLE, 1.0))
        .add(Relationship::new("r:All", "r:North", ROLE, DOMAIN_MEMBER_ARCROLE, 1.0))
        .add(Relationship::new("r:All", "r:South", ROLE, DOMAIN_MEMBER_ARCROLE, 2.0));
    network
}

pub fn date(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
}

pub fn fact(concept: &str, region: Option<&str>) -> Fact {
    Fact {
        id: None,
        concept: QName::new(concept),
        entity: Entity {
            scheme: "http://www.example.com/lei".into(),
            identifier: "5493001KJTIIGC8Y1R12".into(),
        },
        period: Period::Instant {
            date: date("2023-12-31"),
        },
        unit: Some(Unit::simple("iso4217:EUR")),
        explicit_members: region
            .map(|member| {
                vec![DimensionMember {
                    dimension: QName::new("d:Region"),
                    member: QName::new(member),
                }]
            })
            .unwrap_or_default(),
        typed_members: Vec::new(),
        value: Some("1000".into()),
        decimals: Some(0),
    }
}

pub fn rule(key: &str, aspect: Aspect, value: &str) -> DefinitionNode {
    DefinitionNode::rule(key, RuleNode::new().with_rule(aspect, Expr::qname(value)))
}

pub fn concept_rule(key: &str, concept: &str) -> DefinitionNode {
    rule(key, Aspect::Concept, concept)
}

pub fn concept_relationship(key: &str, source: &str, axis: &str) -> DefinitionNode {
    DefinitionNode::new(
        key,
        DefinitionKind::ConceptRelationship(RelationshipNode {
            source: Some(Expr::qname(source)),
            link_role: Some(Expr::string(ROLE)),
            formula_axis: Some(Expr::string(axis)),
            ..RelationshipNode::default()
        }),
    )
}

pub fn region_relationship(key: &str, source: &str, axis: &str) -> DefinitionNode {
    DefinitionNode::new(
        key,
        DefinitionKind::DimensionRelationship(DimensionRelationshipNode {
            dimension: Expr::qname("d:Region"),
            relationship: RelationshipNode {
                source: Some(Expr::qname(source)),
                link_role: Some(Expr::string(ROLE)),
                formula_axis: Some(Expr::string(axis)),
                ..RelationshipNode::default()
            },
        }),
    )
}

/// A table `t` with an empty definition graph around it.
pub fn table() -> DefinitionModel {
    let mut graph = DefinitionModel::new();
    graph.add_node(DefinitionNode::table("t"));
    graph
}

pub fn resolve_in(
    graph: &DefinitionModel,
    network: &RelationshipNetwork,
    facts: Vec<Fact>,
    config: ResolverConfig,
) -> Result<ResolvedTableSet, ResolutionError> {
    let resolver = Resolver::new(graph, network, Arc::new(taxonomy()), Arc::new(FactPool::new(facts)))
        .with_config(config.with_parallel(false));
    resolver.resolve_table(&"t".into())
}

pub fn resolve_with(
    graph: &DefinitionModel,
    facts: Vec<Fact>,
    config: ResolverConfig,
) -> Result<ResolvedTableSet, ResolutionError> {
    resolve_in(graph, &network(), facts, config)
}

pub fn resolve(graph: &DefinitionModel) -> Result<ResolvedTableSet, ResolutionError> {
    resolve_with(graph, Vec::new(), ResolverConfig::default())
}

/// The first non-rollup structural node built from definition `key`.
pub fn find(set: &ResolvedTableSet, key: &str) -> NodeId {
    let model = &set.model;
    model
        .descendants(model.root())
        .into_iter()
        .find(|id| {
            let node = model.node(*id);
            node.rollup == Rollup::None && node.definition_key().map(|k| k.as_str()) == Some(key)
        })
        .unwrap_or_else(|| panic!("no structural node for {}", key))
}

pub fn concept_of(set: &ResolvedTableSet, id: NodeId) -> Option<String> {
    set.aspect_value(id, &Aspect::Concept, true).map(|v| v.to_string())
}
