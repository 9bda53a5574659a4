// Structural node model
use crate::definition::{Axis, DefinitionKey, DefinitionNode};
use crate::error::EvaluationError;
use crate::evaluator::{EvaluationContext, ExpressionEvaluator, Expr};
use crate::model::{Aspect, BoundFact, FactId, FactPool, QName, Value};
use crate::taxonomy::Taxonomy;
use bitflags::bitflags;
use compact_str::CompactString;
use indexmap::IndexMap;
use serde::Serialize;
use std::collections::BTreeSet;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct NodeId(u32);

impl NodeId {
    pub fn index(&self) -> usize {
        self.0 as usize
    }
}

/// Marks a synthesized aggregate node and how it substitutes dimension defaults.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Rollup {
    #[default]
    None,
    SpecifiesMember,
    ImpliesDefaultMember,
    ForConceptRelationship,
    ForDimensionRelationship,
    ForClosedNode,
    ForOpenNode,
    ForDefinitionNode,
}

impl Rollup {
    pub fn is_rollup(&self) -> bool {
        *self != Rollup::None
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Rollup::None => "none",
            Rollup::SpecifiesMember => "specifiesMember",
            Rollup::ImpliesDefaultMember => "impliesDefaultMember",
            Rollup::ForConceptRelationship => "forConceptRelationshipNode",
            Rollup::ForDimensionRelationship => "forDimensionRelationshipNode",
            Rollup::ForClosedNode => "forClosedDefinitionNode",
            Rollup::ForOpenNode => "forOpenDefinitionNode",
            Rollup::ForDefinitionNode => "forDefinitionNode",
        }
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct NodeFlags: u8 {
        const ABSTRACT = 1;
        /// Set on open nodes and their ancestors up to the breakdown.
        const HAS_OPEN_NODE = 1 << 1;
        const HAS_CHILD_ROLLUP = 1 << 2;
        /// Header comes from the bound fact or relationship, never a label.
        const UNLABELED = 1 << 3;
        /// Typed dimension value with no reported fact.
        const UNREPORTED = 1 << 4;
    }
}

#[derive(Debug, Clone, Default)]
pub struct TableInfo {
    /// Parameter values this table instance was resolved with.
    pub parameters: Vec<(QName, Value)>,
    /// Table-wide bindings: parameters plus variables of the chosen z path.
    pub bindings: Vec<(QName, Value)>,
}

#[derive(Debug, Clone)]
pub enum NodeKind {
    TableSet,
    Table(TableInfo),
    Breakdown,
    Node,
}

impl NodeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeKind::TableSet => "tableSet",
            NodeKind::Table(_) => "table",
            NodeKind::Breakdown => "breakdown",
            NodeKind::Node => "node",
        }
    }
}

#[derive(Debug, Clone)]
pub struct StructuralNode {
    pub kind: NodeKind,
    pub parent: Option<NodeId>,
    pub children: Vec<NodeId>,
    pub axis: Option<Axis>,
    pub definition: Option<Arc<DefinitionNode>>,
    /// Values owned by this node; everything else is inherited.
    pub aspects: IndexMap<Aspect, Value>,
    /// Values of tagged constraint sets, by tag.
    pub tagged_aspects: IndexMap<CompactString, IndexMap<Aspect, Value>>,
    pub rollup: Rollup,
    /// Own tag selectors; ancestors contribute theirs on lookup.
    pub tag_selectors: Vec<CompactString>,
    pub flags: NodeFlags,
    pub variables: Vec<(QName, Value)>,
    pub bound_fact: Option<BoundFact>,
    pub facts_partition: Vec<FactId>,
    pub deemed_defaulted_dims: BTreeSet<QName>,
    pub rollup_child: Option<NodeId>,
}

impl StructuralNode {
    fn new(kind: NodeKind, parent: Option<NodeId>, axis: Option<Axis>, definition: Option<Arc<DefinitionNode>>) -> Self {
        Self {
            kind,
            parent,
            children: Vec::new(),
            axis,
            definition,
            aspects: IndexMap::new(),
            tagged_aspects: IndexMap::new(),
            rollup: Rollup::None,
            tag_selectors: Vec::new(),
            flags: NodeFlags::empty(),
            variables: Vec::new(),
            bound_fact: None,
            facts_partition: Vec::new(),
            deemed_defaulted_dims: BTreeSet::new(),
            rollup_child: None,
        }
    }

    pub fn definition_key(&self) -> Option<&DefinitionKey> {
        self.definition.as_ref().map(|d| &d.key)
    }

    pub fn is_breakdown(&self) -> bool {
        matches!(self.kind, NodeKind::Breakdown)
    }

    pub fn is_table(&self) -> bool {
        matches!(self.kind, NodeKind::Table(_))
    }
}

/// Identity of a structural breakdown: its definition and axis, not its
/// position, since one breakdown definition may be instantiated repeatedly.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BreakdownKey {
    pub definition: Option<DefinitionKey>,
    pub axis: Axis,
}

/// Arena of structural nodes addressed by [`NodeId`]. Depth and ancestry
/// derive from parent links.
#[derive(Debug)]
pub struct StructuralModel {
    nodes: Vec<StructuralNode>,
    taxonomy: Arc<Taxonomy>,
    facts: Arc<FactPool>,
}

impl StructuralModel {
    pub fn new(table: Option<Arc<DefinitionNode>>, taxonomy: Arc<Taxonomy>, facts: Arc<FactPool>) -> Self {
        Self {
            nodes: vec![StructuralNode::new(NodeKind::TableSet, None, None, table)],
            taxonomy,
            facts,
        }
    }

    pub fn root(&self) -> NodeId {
        NodeId(0)
    }

    pub fn taxonomy(&self) -> &Taxonomy {
        &self.taxonomy
    }

    pub fn facts(&self) -> &FactPool {
        &self.facts
    }

    #[inline(always)]
    pub fn node(&self, id: NodeId) -> &StructuralNode {
        &self.nodes[id.index()]
    }

    #[inline(always)]
    pub fn node_mut(&mut self, id: NodeId) -> &mut StructuralNode {
        &mut self.nodes[id.index()]
    }

    /// Number of arena slots, including detached nodes.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.len() <= 1
    }

    fn push(&mut self, parent: NodeId, node: StructuralNode) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(node);
        self.nodes[parent.index()].children.push(id);
        id
    }

    pub fn add_table(&mut self, parent: NodeId, definition: Option<Arc<DefinitionNode>>, info: TableInfo) -> NodeId {
        self.push(parent, StructuralNode::new(NodeKind::Table(info), Some(parent), None, definition))
    }

    pub fn add_breakdown(&mut self, parent: NodeId, definition: Option<Arc<DefinitionNode>>, axis: Axis) -> NodeId {
        self.push(parent, StructuralNode::new(NodeKind::Breakdown, Some(parent), Some(axis), definition))
    }

    /// Adds a structural node inheriting its parent's axis.
    pub fn add_node(&mut self, parent: NodeId, definition: Option<Arc<DefinitionNode>>) -> NodeId {
        let axis = self.node(parent).axis;
        self.push(parent, StructuralNode::new(NodeKind::Node, Some(parent), axis, definition))
    }

    /// Adds a rollup child and records it on the parent.
    pub fn add_rollup(&mut self, parent: NodeId, definition: Option<Arc<DefinitionNode>>, rollup: Rollup) -> NodeId {
        let id = self.add_node(parent, definition);
        self.node_mut(id).rollup = rollup;
        let parent_node = self.node_mut(parent);
        parent_node.flags.insert(NodeFlags::HAS_CHILD_ROLLUP);
        parent_node.rollup_child = Some(id);
        id
    }

    /// Unlinks `child` from `parent`; the slot stays in the arena unreachable.
    pub fn detach(&mut self, parent: NodeId, child: NodeId) {
        self.node_mut(parent).children.retain(|c| *c != child);
        self.node_mut(child).parent = None;
    }

    pub fn rotate_last_to_front(&mut self, id: NodeId) {
        let children = &mut self.node_mut(id).children;
        if children.len() > 1 {
            children.rotate_right(1);
        }
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.node(id).parent
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self.node(id).children
    }

    pub fn is_leaf(&self, id: NodeId) -> bool {
        self.node(id).children.is_empty()
    }

    /// `id` followed by its ancestors up to the root.
    pub fn chain(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        std::iter::successors(Some(id), move |n| self.parent(*n))
    }

    pub fn depth(&self, id: NodeId) -> usize {
        self.chain(id).count() - 1
    }

    /// Structural nodes on the path from the table down to `id`.
    pub fn structural_depth(&self, id: NodeId) -> usize {
        self.chain(id)
            .filter(|n| matches!(self.node(*n).kind, NodeKind::Node))
            .count()
    }

    /// Deepest level below `id`, counting `id` as level 0.
    pub fn max_depth_below(&self, id: NodeId) -> usize {
        self.children(id)
            .iter()
            .map(|c| self.max_depth_below(*c) + 1)
            .max()
            .unwrap_or(0)
    }

    pub fn leaf_node_count(&self, id: NodeId) -> usize {
        let children = self.children(id);
        if children.is_empty() {
            1
        } else {
            children.iter().map(|c| self.leaf_node_count(*c)).sum()
        }
    }

    pub fn leaves(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        self.collect_leaves(id, &mut out);
        out
    }

    fn collect_leaves(&self, id: NodeId, out: &mut Vec<NodeId>) {
        let children = self.children(id);
        if children.is_empty() {
            out.push(id);
        } else {
            for child in children {
                self.collect_leaves(*child, out);
            }
        }
    }

    /// `id` and every reachable descendant, depth first.
    pub fn descendants(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = vec![id];
        let mut i = 0;
        while i < out.len() {
            let children = self.children(out[i]);
            out.splice(i + 1..i + 1, children.iter().copied());
            i += 1;
        }
        out
    }

    pub fn tables(&self) -> Vec<NodeId> {
        self.children(self.root())
            .iter()
            .copied()
            .filter(|id| self.node(*id).is_table())
            .collect()
    }

    pub fn table_of(&self, id: NodeId) -> Option<NodeId> {
        self.chain(id).find(|n| self.node(*n).is_table())
    }

    /// Breakdowns of `table` on `axis`, outermost first.
    pub fn axis_breakdown(&self, table: NodeId, axis: Axis) -> Option<NodeId> {
        self.children(table)
            .iter()
            .copied()
            .find(|b| self.node(*b).is_breakdown() && self.node(*b).axis == Some(axis))
    }

    pub fn structural_ancestor_breakdown(&self, id: NodeId) -> Option<NodeId> {
        self.chain(id).skip(1).find(|n| self.node(*n).is_breakdown())
    }

    pub fn breakdown_key(&self, id: NodeId) -> Option<BreakdownKey> {
        let node = self.node(id);
        match (node.is_breakdown(), node.axis) {
            (true, Some(axis)) => Some(BreakdownKey {
                definition: node.definition_key().cloned(),
                axis,
            }),
            _ => None,
        }
    }

    pub fn is_abstract(&self, id: NodeId) -> bool {
        let node = self.node(id);
        if node.rollup.is_rollup() {
            return false;
        }
        node.flags.contains(NodeFlags::ABSTRACT)
            || node.definition.as_ref().map_or(false, |d| d.is_abstract())
    }

    pub fn is_labeled(&self, id: NodeId) -> bool {
        let node = self.node(id);
        !node.flags.contains(NodeFlags::UNLABELED) && node.definition.as_ref().map_or(false, |d| d.is_labeled())
    }

    /// Marks `id` and its ancestors up to and including the nearest breakdown.
    pub fn set_has_open_node(&mut self, id: NodeId) {
        let mut current = Some(id);
        while let Some(n) = current {
            let node = self.node_mut(n);
            node.flags.insert(NodeFlags::HAS_OPEN_NODE);
            if node.is_breakdown() {
                break;
            }
            current = node.parent;
        }
    }

    /// Own and inherited tag selectors, outermost first.
    pub fn tag_selectors(&self, id: NodeId) -> Vec<CompactString> {
        let path: Vec<NodeId> = self.chain(id).collect();
        let mut tags: Vec<CompactString> = Vec::new();
        for n in path.into_iter().rev() {
            for tag in &self.node(n).tag_selectors {
                if !tags.contains(tag) {
                    tags.push(tag.clone());
                }
            }
        }
        tags
    }

    /// Nearest bound fact at or above `id`.
    pub fn inherited_bound_fact(&self, id: NodeId) -> Option<&BoundFact> {
        self.chain(id).find_map(|n| self.node(n).bound_fact.as_ref())
    }

    /// True when `id` lies on an entry row: the nearest bound fact is a
    /// prototype, or `default` when no ancestor is bound.
    pub fn is_entry_prototype(&self, id: NodeId, default: bool) -> bool {
        match self.inherited_bound_fact(id) {
            Some(bound) => bound.is_prototype(),
            None => default,
        }
    }

    /// Variable scope of `id`: table bindings, then ancestor variables
    /// outermost first.
    pub fn scope(&self, id: NodeId) -> EvaluationContext {
        let mut ctx = EvaluationContext::new();
        let path: Vec<NodeId> = self.chain(id).collect();
        for n in path.into_iter().rev() {
            let node = self.node(n);
            if let NodeKind::Table(info) = &node.kind {
                for (name, value) in &info.bindings {
                    ctx.bind(name.clone(), value.clone());
                }
            }
            for (name, value) in &node.variables {
                ctx.bind(name.clone(), value.clone());
            }
        }
        ctx
    }

    pub fn evaluate(
        &self,
        id: NodeId,
        evaluator: &dyn ExpressionEvaluator,
        expr: &Expr,
    ) -> Result<Value, EvaluationError> {
        evaluator.evaluate(&self.scope(id), expr)
    }
}
