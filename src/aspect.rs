// Aspect inheritance over a structural tree
use crate::model::{Aspect, QName, Value};
use crate::structure::{NodeId, NodeKind, Rollup, StructuralModel};
use compact_str::CompactString;
use std::collections::BTreeSet;

/// Aspects `id` owns. Open nodes bound to a fact own every aspect their
/// definition partitions on.
pub fn owned_aspects(model: &StructuralModel, id: NodeId, tags: &[CompactString]) -> Vec<Aspect> {
    let node = model.node(id);
    if node.bound_fact.is_some() {
        if let Some(open) = node.definition.as_ref().and_then(|d| d.aspect_node()) {
            return open.aspects_covered();
        }
    }
    match selected_set(model, id, tags) {
        Some(set) => set.keys().cloned().collect(),
        None => node.aspects.keys().cloned().collect(),
    }
}

fn selected_set<'a>(
    model: &'a StructuralModel,
    id: NodeId,
    tags: &[CompactString],
) -> Option<&'a indexmap::IndexMap<Aspect, Value>> {
    let node = model.node(id);
    if node.tagged_aspects.is_empty() {
        return None;
    }
    tags.iter().find_map(|tag| node.tagged_aspects.get(tag))
}

fn owns(model: &StructuralModel, id: NodeId, aspect: &Aspect, tags: &[CompactString]) -> bool {
    owned_aspects(model, id, tags).contains(aspect)
}

/// The value `id` owns for `aspect`, without inheritance.
pub fn owned_value(model: &StructuralModel, id: NodeId, aspect: &Aspect, tags: &[CompactString]) -> Option<Value> {
    let node = model.node(id);
    if let Some(bound) = &node.bound_fact {
        if node.definition.as_ref().map_or(false, |d| d.is_open()) {
            return model.facts().bound_value(bound, aspect);
        }
    }
    match selected_set(model, id, tags) {
        Some(set) => set.get(aspect).cloned(),
        None => node.aspects.get(aspect).cloned(),
    }
}

fn blocks(model: &StructuralModel, id: NodeId, aspect: &Aspect, tags: &[CompactString]) -> bool {
    let Some(family) = aspect.family() else {
        return false;
    };
    owned_aspects(model, id, tags)
        .iter()
        .any(|owned| owned != aspect && owned.family() == Some(family))
}

/// Nodes whose aspects apply to `id`: the node and its ancestors below the table.
fn scope_chain(model: &StructuralModel, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
    model
        .chain(id)
        .take_while(move |n| matches!(model.node(*n).kind, NodeKind::Breakdown | NodeKind::Node))
}

/// The node defining `aspect` for `id`, if any.
pub fn has_aspect(
    model: &StructuralModel,
    id: NodeId,
    aspect: &Aspect,
    inherit: bool,
    tags: Option<&[CompactString]>,
) -> Option<NodeId> {
    let inherited;
    let tags = match tags {
        Some(tags) => tags,
        None => {
            inherited = model.tag_selectors(id);
            &inherited
        }
    };
    for n in scope_chain(model, id) {
        if owns(model, n, aspect, tags) {
            return Some(n);
        }
        if blocks(model, n, aspect, tags) || !inherit {
            return None;
        }
    }
    None
}

pub fn aspect_value(
    model: &StructuralModel,
    id: NodeId,
    aspect: &Aspect,
    inherit: bool,
    tags: Option<&[CompactString]>,
) -> Option<Value> {
    let inherited;
    let tags = match tags {
        Some(tags) => tags,
        None => {
            inherited = model.tag_selectors(id);
            &inherited
        }
    };
    if *aspect == Aspect::Dimensions {
        return dimensions_value(model, id, inherit, tags);
    }

    let value = match has_aspect(model, id, aspect, inherit, Some(tags)) {
        Some(owner) => {
            let value = owned_value(model, owner, aspect, tags);
            match (aspect, value) {
                (Aspect::ExplicitDimension(dim), Some(Value::QName(member))) => {
                    if implies_default_between(model, id, owner) {
                        model.taxonomy().dimension_default(dim).cloned().map(Value::QName)
                    } else {
                        Some(Value::QName(member))
                    }
                }
                (_, value) => value,
            }
        }
        None => None,
    };

    match (value, aspect) {
        (None, Aspect::ExplicitDimension(dim)) if is_deemed_defaulted(model, id, dim) => {
            model.taxonomy().dimension_default(dim).cloned().map(Value::QName)
        }
        (value, _) => value,
    }
}

fn implies_default_between(model: &StructuralModel, id: NodeId, owner: NodeId) -> bool {
    model
        .chain(id)
        .take_while(|n| *n != owner)
        .any(|n| model.node(n).rollup == Rollup::ImpliesDefaultMember)
}

fn is_deemed_defaulted(model: &StructuralModel, id: NodeId, dim: &QName) -> bool {
    scope_chain(model, id).any(|n| model.node(n).deemed_defaulted_dims.contains(dim))
}

fn dimensions_value(model: &StructuralModel, id: NodeId, inherit: bool, tags: &[CompactString]) -> Option<Value> {
    let mut dims: BTreeSet<QName> = BTreeSet::new();
    let mut omitted: BTreeSet<QName> = BTreeSet::new();
    let chain: Vec<NodeId> = if inherit {
        scope_chain(model, id).collect()
    } else {
        vec![id]
    };
    for n in chain {
        if let Some(Value::Dimensions(own)) = owned_value(model, n, &Aspect::Dimensions, tags) {
            dims.extend(own);
        }
        if let Some(Value::Dimensions(omit)) = owned_value(model, n, &Aspect::OmitDimensions, tags) {
            omitted.extend(omit);
        }
    }
    let remaining: BTreeSet<QName> = dims.difference(&omitted).cloned().collect();
    (!remaining.is_empty()).then_some(Value::Dimensions(remaining))
}

/// Aspects defined for `id`, own first, respecting family blocking.
pub fn aspects_covered(model: &StructuralModel, id: NodeId, inherit: bool) -> Vec<Aspect> {
    let tags = model.tag_selectors(id);
    let mut covered: Vec<Aspect> = Vec::new();
    for n in scope_chain(model, id) {
        let owned = owned_aspects(model, n, &tags);
        for aspect in owned {
            if covered.contains(&aspect) {
                continue;
            }
            let blocked = aspect
                .family()
                .map_or(false, |family| covered.iter().any(|c| c.family() == Some(family)));
            if !blocked {
                covered.push(aspect);
            }
        }
        if !inherit {
            break;
        }
    }
    covered
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::definition::Axis;
    use crate::model::{FactPool, PeriodAspect};
    use crate::structure::TableInfo;
    use crate::taxonomy::{ConceptKind, Taxonomy};
    use chrono::NaiveDate;
    use std::sync::Arc;

    fn date(s: &str) -> Value {
        Value::Date(NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap())
    }

    fn tree() -> (StructuralModel, NodeId) {
        let mut taxonomy = Taxonomy::new();
        taxonomy
            .add("d:Country", ConceptKind::ExplicitDimension, false, false)
            .add("c:Total", ConceptKind::Item, true, true)
            .set_dimension_default(QName::new("d:Country"), QName::new("c:Total"));
        let mut model = StructuralModel::new(None, Arc::new(taxonomy), Arc::new(FactPool::default()));
        let table = model.add_table(model.root(), None, TableInfo::default());
        let breakdown = model.add_breakdown(table, None, Axis::Y);
        (model, breakdown)
    }

    #[test]
    fn test_instant_blocks_inherited_start() {
        let (mut model, breakdown) = tree();
        let outer = model.add_node(breakdown, None);
        model
            .node_mut(outer)
            .aspects
            .insert(Aspect::Period(PeriodAspect::Start), date("2023-01-01"));
        let inner = model.add_node(outer, None);
        model
            .node_mut(inner)
            .aspects
            .insert(Aspect::Period(PeriodAspect::Instant), date("2023-12-31"));

        let start = Aspect::Period(PeriodAspect::Start);
        assert_eq!(has_aspect(&model, inner, &start, true, None), None);
        assert_eq!(aspect_value(&model, inner, &start, true, None), None);
        let sibling = model.add_node(outer, None);
        assert_eq!(has_aspect(&model, sibling, &start, true, None), Some(outer));
        assert_eq!(aspects_covered(&model, inner, true), vec![Aspect::Period(PeriodAspect::Instant)]);
    }

    #[test]
    fn test_dimensions_union_minus_omitted() {
        let (mut model, breakdown) = tree();
        let dims = |names: &[&str]| Value::Dimensions(names.iter().map(|n| QName::new(n)).collect());
        let outer = model.add_node(breakdown, None);
        model.node_mut(outer).aspects.insert(Aspect::Dimensions, dims(&["d:A", "d:B"]));
        let middle = model.add_node(outer, None);
        model.node_mut(middle).aspects.insert(Aspect::Dimensions, dims(&["d:C"]));
        let inner = model.add_node(middle, None);
        model.node_mut(inner).aspects.insert(Aspect::OmitDimensions, dims(&["d:B"]));

        assert_eq!(
            aspect_value(&model, inner, &Aspect::Dimensions, true, None),
            Some(dims(&["d:A", "d:C"]))
        );
        assert_eq!(aspect_value(&model, inner, &Aspect::Dimensions, false, None), None);
    }

    #[test]
    fn test_implies_default_member_substitutes() {
        let (mut model, breakdown) = tree();
        let dim = Aspect::ExplicitDimension(QName::new("d:Country"));
        let outer = model.add_node(breakdown, None);
        model.node_mut(outer).aspects.insert(dim.clone(), Value::qname("c:DE"));
        let rollup = model.add_rollup(outer, None, Rollup::ImpliesDefaultMember);
        let plain = model.add_node(outer, None);

        assert_eq!(aspect_value(&model, rollup, &dim, true, None), Some(Value::qname("c:Total")));
        assert_eq!(aspect_value(&model, plain, &dim, true, None), Some(Value::qname("c:DE")));
    }

    #[test]
    fn test_deemed_defaulted_dimension_reports_default() {
        let (mut model, breakdown) = tree();
        let leaf = model.add_node(breakdown, None);
        let dim = Aspect::ExplicitDimension(QName::new("d:Country"));
        assert_eq!(aspect_value(&model, leaf, &dim, true, None), None);
        model.node_mut(leaf).deemed_defaulted_dims.insert(QName::new("d:Country"));
        assert_eq!(aspect_value(&model, leaf, &dim, true, None), Some(Value::qname("c:Total")));
    }

    #[test]
    fn test_tagged_values_follow_inherited_selector() {
        let (mut model, breakdown) = tree();
        let period = Aspect::Period(PeriodAspect::Instant);
        let rule = model.add_node(breakdown, None);
        model.node_mut(rule).aspects.insert(period.clone(), date("2023-12-31"));
        let mut start = indexmap::IndexMap::new();
        start.insert(period.clone(), date("2022-12-31"));
        model
            .node_mut(rule)
            .tagged_aspects
            .insert(CompactString::new("table.periodStart"), start);
        let child = model.add_node(rule, None);
        model.node_mut(child).tag_selectors.push(CompactString::new("table.periodStart"));

        assert_eq!(aspect_value(&model, child, &period, true, None), Some(date("2022-12-31")));
        assert_eq!(aspect_value(&model, rule, &period, true, None), Some(date("2023-12-31")));
    }
}
