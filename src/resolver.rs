// Definition-to-structure resolution
use crate::aspect;
use crate::config::ResolverConfig;
use crate::definition::{
    AspectNode, Axis, BreakdownEdge, DefinitionGraph, DefinitionKey, DefinitionKind, DefinitionNode, ParentChildOrder,
    RelationshipNode, RuleNode, TableNode, PERIOD_END_TAG, PERIOD_START_TAG,
};
use crate::error::{Diagnostic, ErrorCode, EvaluationError, ResolutionError};
use crate::evaluator::{EvaluationContext, ExpressionEvaluator, Expr, ScopedEvaluator};
use crate::header::{HeaderProjector, HeaderSource};
use crate::linkbase::{
    flatten_forest, Forest, ForestEntry, NavigationError, Relationship, RelationshipNavigator,
    RelationshipQuery, TraversalAxis, DOMAIN_MEMBER_ARCROLE, PARENT_CHILD_ARCROLE,
};
use crate::model::{Aspect, BoundFact, FactId, FactPool, FactPrototype, QName, Value, ABSENT_DIMENSION_VALUE};
use crate::partition::{AspectPartitioner, FactPartitioner, PartitionError};
use crate::structure::{NodeFlags, NodeId, NodeKind, Rollup, StructuralModel, TableInfo};
use crate::taxonomy::{Taxonomy, PERIOD_END_LABEL_ROLE, PERIOD_START_LABEL_ROLE};
use crate::validator;
use ahash::{AHashMap, AHashSet};
use compact_str::CompactString;
use indexmap::IndexMap;
use parking_lot::Mutex;
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{debug, trace, warn};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// Failure inside one definition node's resolution, before it is attributed
/// to that node.
#[derive(Debug)]
enum Fault {
    Resolution(ResolutionError),
    Evaluation(EvaluationError),
    Navigation(NavigationError),
    Partition(PartitionError),
}

impl From<ResolutionError> for Fault {
    fn from(err: ResolutionError) -> Self {
        Fault::Resolution(err)
    }
}

impl From<EvaluationError> for Fault {
    fn from(err: EvaluationError) -> Self {
        Fault::Evaluation(err)
    }
}

impl From<NavigationError> for Fault {
    fn from(err: NavigationError) -> Self {
        Fault::Navigation(err)
    }
}

impl From<PartitionError> for Fault {
    fn from(err: PartitionError) -> Self {
        Fault::Partition(err)
    }
}

impl Fault {
    fn attribute(self, node: Option<&DefinitionKey>) -> ResolutionError {
        match self {
            Fault::Resolution(err) => match node {
                Some(key) => err.at(key),
                None => err,
            },
            Fault::Evaluation(err) => ResolutionError::evaluation(node, err),
            Fault::Navigation(err) => ResolutionError::internal(node, err),
            Fault::Partition(err) => ResolutionError::internal(node, err),
        }
    }
}

/// One resolved table instance.
#[derive(Debug, Clone)]
pub struct ResolvedTable {
    pub node: NodeId,
    pub parameters: Vec<(QName, Value)>,
    pub data_cols: usize,
    pub data_rows: usize,
    pub z_breakdowns: usize,
}

/// Structural model of one table definition with one table per parameter
/// combination.
#[derive(Debug)]
pub struct ResolvedTableSet {
    pub definition: DefinitionKey,
    pub model: StructuralModel,
    pub tables: Vec<ResolvedTable>,
    pub diagnostics: Vec<Diagnostic>,
}

impl ResolvedTableSet {
    pub fn first_table(&self) -> Option<&ResolvedTable> {
        self.tables.first()
    }

    pub fn breakdown(&self, table: &ResolvedTable, axis: Axis) -> Option<NodeId> {
        self.model.axis_breakdown(table.node, axis)
    }

    pub fn leaf_node_count(&self, table: &ResolvedTable, axis: Axis) -> usize {
        self.breakdown(table, axis)
            .map(|b| self.model.leaf_node_count(b))
            .unwrap_or(0)
    }

    pub fn aspect_value(&self, id: NodeId, aspect: &Aspect, inherit: bool) -> Option<Value> {
        aspect::aspect_value(&self.model, id, aspect, inherit, None)
    }

    pub fn aspects_covered(&self, id: NodeId, inherit: bool) -> Vec<Aspect> {
        aspect::aspects_covered(&self.model, id, inherit)
    }

    pub fn has_aspect(&self, id: NodeId, aspect: &Aspect, inherit: bool) -> Option<NodeId> {
        aspect::has_aspect(&self.model, id, aspect, inherit, None)
    }

    pub fn header_sources(&self, id: NodeId, lang: &str, role: Option<&str>) -> Vec<HeaderSource> {
        HeaderProjector::new(lang).header_sources(&self.model, id, role)
    }

    pub fn evaluate(
        &self,
        id: NodeId,
        evaluator: &dyn ExpressionEvaluator,
        expr: &Expr,
    ) -> Result<Value, EvaluationError> {
        self.model.evaluate(id, evaluator, expr)
    }

    pub fn has_errors(&self) -> bool {
        self.diagnostics.iter().any(Diagnostic::is_error)
    }
}

/// Every table set that resolved, plus the failures of those that did not.
#[derive(Debug)]
pub struct Resolution {
    pub table_sets: Vec<ResolvedTableSet>,
    pub diagnostics: Vec<Diagnostic>,
}

/// Per table set mutable state. Never shared between resolutions.
struct ResolutionContext {
    model: StructuralModel,
    axis: Axis,
    edges: Vec<BreakdownEdge>,
    /// Dimensions deemed defaulted, keyed by the definition node they apply to.
    deemed_defaults: AHashMap<DefinitionKey, BTreeSet<QName>>,
    prototypes: usize,
    table_order: ParentChildOrder,
    breakdown_order: Option<ParentChildOrder>,
    diagnostics: Vec<Diagnostic>,
}

/// Lowers table definitions into structural models. Axes resolve in z, x, y
/// order; further breakdowns on an axis nest beneath the previous one's leaves.
pub struct Resolver<'a> {
    graph: &'a dyn DefinitionGraph,
    navigator: &'a dyn RelationshipNavigator,
    evaluator: &'a dyn ExpressionEvaluator,
    partitioner: &'a dyn FactPartitioner,
    taxonomy: Arc<Taxonomy>,
    facts: Arc<FactPool>,
    config: ResolverConfig,
}

impl<'a> Resolver<'a> {
    pub fn new(
        graph: &'a dyn DefinitionGraph,
        navigator: &'a dyn RelationshipNavigator,
        taxonomy: Arc<Taxonomy>,
        facts: Arc<FactPool>,
    ) -> Self {
        Self {
            graph,
            navigator,
            evaluator: &ScopedEvaluator,
            partitioner: &AspectPartitioner,
            taxonomy,
            facts,
            config: ResolverConfig::default(),
        }
    }

    pub fn with_config(mut self, config: ResolverConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_evaluator(mut self, evaluator: &'a dyn ExpressionEvaluator) -> Self {
        self.evaluator = evaluator;
        self
    }

    pub fn with_partitioner(mut self, partitioner: &'a dyn FactPartitioner) -> Self {
        self.partitioner = partitioner;
        self
    }

    pub fn config(&self) -> &ResolverConfig {
        &self.config
    }

    /// Resolves every table definition. A failing table is left out and
    /// reported; the others are unaffected.
    pub fn resolve_all(&self) -> Resolution {
        let tables = self.graph.tables();
        let failures = Mutex::new(Vec::new());
        let resolve = |table: &Arc<DefinitionNode>| match self.resolve_table(&table.key) {
            Ok(set) => Some(set),
            Err(err) => {
                warn!(table = %table.key, code = %err.code, "table resolution failed: {}", err.message);
                failures.lock().push(err.to_diagnostic());
                None
            }
        };

        #[cfg(feature = "parallel")]
        let table_sets: Vec<ResolvedTableSet> = if self.config.parallel {
            tables.par_iter().filter_map(&resolve).collect()
        } else {
            tables.iter().filter_map(&resolve).collect()
        };
        #[cfg(not(feature = "parallel"))]
        let table_sets: Vec<ResolvedTableSet> = tables.iter().filter_map(&resolve).collect();

        Resolution {
            table_sets,
            diagnostics: failures.into_inner(),
        }
    }

    /// Resolves one table definition into a table set.
    pub fn resolve_table(&self, key: &DefinitionKey) -> Result<ResolvedTableSet, ResolutionError> {
        let definition = self
            .graph
            .node(key)
            .ok_or_else(|| ResolutionError::new(ErrorCode::ResolutionException, format!("Unknown table {}", key)))?;
        let DefinitionKind::Table(table) = &definition.kind else {
            return Err(ResolutionError::new(
                ErrorCode::ResolutionException,
                format!("Definition node {} is not a table", key),
            ));
        };

        let mut ctx = ResolutionContext {
            model: StructuralModel::new(Some(Arc::clone(&definition)), Arc::clone(&self.taxonomy), Arc::clone(&self.facts)),
            axis: Axis::Z,
            edges: Vec::new(),
            deemed_defaults: AHashMap::new(),
            prototypes: 0,
            table_order: table.parent_child_order.unwrap_or(ParentChildOrder::ParentFirst),
            breakdown_order: None,
            diagnostics: Vec::new(),
        };
        if self.config.check_definitions {
            ctx.diagnostics
                .extend(validator::check_definitions(self.graph, &self.taxonomy, &definition));
        }

        let instances = self.parameter_instances(&definition, table)?;
        let mut tables = Vec::with_capacity(instances.len());
        for parameters in instances {
            tables.push(self.resolve_instance(&mut ctx, &definition, table, parameters)?);
        }

        Ok(ResolvedTableSet {
            definition: definition.key.clone(),
            model: ctx.model,
            tables,
            diagnostics: ctx.diagnostics,
        })
    }

    /// Cartesian product of the parameter sequences. Names are iterated in
    /// reverse order so the lexicographically last one varies fastest.
    fn parameter_instances(
        &self,
        definition: &DefinitionNode,
        table: &TableNode,
    ) -> Result<Vec<Vec<(QName, Value)>>, ResolutionError> {
        let scope = EvaluationContext::new();
        let mut sequences: Vec<(QName, Vec<Value>)> = Vec::with_capacity(table.parameters.len());
        for parameter in &table.parameters {
            let value = self
                .evaluator
                .evaluate(&scope, &parameter.value)
                .map_err(|err| ResolutionError::evaluation(Some(&definition.key), err))?;
            sequences.push((parameter.name.clone(), value.into_items()));
        }
        sequences.sort_by(|a, b| b.0.cmp(&a.0));

        let count: usize = sequences.iter().map(|(_, values)| values.len().max(1)).product();
        let mut instances = Vec::with_capacity(count);
        for n in 0..count {
            let mut index = n;
            let mut bindings = Vec::with_capacity(sequences.len());
            for (name, values) in &sequences {
                if values.is_empty() {
                    bindings.push((name.clone(), Value::Sequence(Vec::new())));
                } else {
                    bindings.push((name.clone(), values[index % values.len()].clone()));
                    index /= values.len();
                }
            }
            instances.push(bindings);
        }
        Ok(instances)
    }

    fn resolve_instance(
        &self,
        ctx: &mut ResolutionContext,
        definition: &Arc<DefinitionNode>,
        table: &TableNode,
        parameters: Vec<(QName, Value)>,
    ) -> Result<ResolvedTable, ResolutionError> {
        let info = TableInfo {
            parameters: parameters.clone(),
            bindings: parameters.clone(),
        };
        let root = ctx.model.root();
        let node = ctx.model.add_table(root, Some(Arc::clone(definition)), info);
        ctx.prototypes = 0;
        ctx.deemed_defaults.clear();

        let facts = self
            .partitioner
            .filter_facts(&self.facts, &self.facts.ids(), &table.filters)
            .map_err(|err| ResolutionError::internal(Some(&definition.key), err))?;

        let mut resolved = ResolvedTable {
            node,
            parameters,
            data_cols: 0,
            data_rows: 0,
            z_breakdowns: 0,
        };

        for axis in Axis::RESOLUTION_ORDER {
            ctx.axis = axis;
            ctx.edges = self.graph.breakdown_edges(&definition.key, axis);
            ctx.breakdown_order = None;
            let first = ctx.edges.first().map(|edge| Arc::clone(&edge.breakdown));
            let breakdown = match &first {
                Some(breakdown) => self
                    .resolve_breakdown(ctx, node, Some(breakdown), 0, &facts, Some(0))
                    .map_err(|fault| fault.attribute(Some(&breakdown.key)))?,
                None => {
                    let breakdown = self
                        .resolve_breakdown(ctx, node, None, 1, &facts, None)
                        .map_err(|fault| fault.attribute(None))?;
                    ctx.model.set_has_open_node(breakdown);
                    breakdown
                }
            };

            if ctx.edges.len() == 1 {
                let depths: Vec<usize> = ctx
                    .model
                    .children(breakdown)
                    .iter()
                    .map(|c| ctx.model.max_depth_below(*c))
                    .collect();
                if depths.iter().min() != depths.iter().max() {
                    let max = ctx.model.max_depth_below(breakdown);
                    self.add_descendant_rollups(ctx, breakdown, 0, max);
                }
            }
            self.add_defaulted_dimensions(ctx, breakdown, &BTreeSet::new(), &BTreeSet::new());

            let leaves = ctx.model.leaf_node_count(breakdown);
            match axis {
                Axis::X => resolved.data_cols += leaves,
                Axis::Y => resolved.data_rows += leaves,
                Axis::Z => {
                    resolved.z_breakdowns = ctx.edges.len();
                    self.bind_z_choice(ctx, node, breakdown);
                }
            }
            debug!(table = %definition.key, axis = %axis, leaves, breakdowns = ctx.edges.len(), "resolved axis");
        }

        if self.config.check_tag_selectors {
            ctx.diagnostics
                .extend(validator::check_cell_tag_selectors(&ctx.model, node));
        }
        debug!(
            table = %definition.key,
            data_cols = resolved.data_cols,
            data_rows = resolved.data_rows,
            z_breakdowns = resolved.z_breakdowns,
            "resolved table"
        );
        Ok(resolved)
    }

    /// Variables bound on the path to the first z leaf become visible to the
    /// x and y axes.
    fn bind_z_choice(&self, ctx: &mut ResolutionContext, table: NodeId, breakdown: NodeId) {
        let Some(leaf) = ctx.model.leaves(breakdown).first().copied() else {
            return;
        };
        let path: Vec<NodeId> = ctx.model.chain(leaf).take_while(|n| *n != table).collect();
        let mut variables = Vec::new();
        for n in path.into_iter().rev() {
            variables.extend(ctx.model.node(n).variables.iter().cloned());
        }
        if let NodeKind::Table(info) = &mut ctx.model.node_mut(table).kind {
            info.bindings.extend(variables);
        }
    }

    // ========================================================================
    // Definition node dispatch
    // ========================================================================

    /// Resolves `definition` beneath `parent`. Returns the structural node
    /// created for it; relationship and aspect nodes attach their entries to
    /// `parent` directly and return `None`.
    fn resolve_definition(
        &self,
        ctx: &mut ResolutionContext,
        parent: NodeId,
        definition: &Arc<DefinitionNode>,
        depth: usize,
        facts: &[FactId],
        brkdn: Option<usize>,
    ) -> Result<Option<NodeId>, ResolutionError> {
        trace!(node = %definition.key, depth, axis = %ctx.axis, "resolving definition node");
        self.dispatch(ctx, parent, definition, depth, facts, brkdn)
            .map_err(|fault| fault.attribute(Some(&definition.key)))
    }

    fn dispatch(
        &self,
        ctx: &mut ResolutionContext,
        parent: NodeId,
        definition: &Arc<DefinitionNode>,
        depth: usize,
        facts: &[FactId],
        brkdn: Option<usize>,
    ) -> Result<Option<NodeId>, Fault> {
        match &definition.kind {
            DefinitionKind::Breakdown(_) | DefinitionKind::Table(_) => self
                .resolve_breakdown(ctx, parent, Some(definition), depth, facts, brkdn)
                .map(Some),
            DefinitionKind::Rule(rule) => self
                .resolve_rule(ctx, parent, definition, rule, depth, facts, brkdn)
                .map(Some),
            DefinitionKind::ConceptRelationship(rel) => {
                self.resolve_relationship(ctx, parent, definition, rel, None, depth, facts, brkdn)?;
                Ok(None)
            }
            DefinitionKind::DimensionRelationship(dim) => {
                self.resolve_relationship(ctx, parent, definition, &dim.relationship, Some(&dim.dimension), depth, facts, brkdn)?;
                Ok(None)
            }
            DefinitionKind::Aspect(open) => {
                self.resolve_open(ctx, parent, definition, open, depth, facts, brkdn)?;
                Ok(None)
            }
        }
    }

    fn resolve_breakdown(
        &self,
        ctx: &mut ResolutionContext,
        parent: NodeId,
        definition: Option<&Arc<DefinitionNode>>,
        depth: usize,
        facts: &[FactId],
        brkdn: Option<usize>,
    ) -> Result<NodeId, Fault> {
        let axis = ctx.axis;
        let id = ctx.model.add_breakdown(parent, definition.cloned(), axis);
        if let Some(definition) = definition {
            let saved = ctx.breakdown_order;
            if let Some(order) = definition.parent_child_order() {
                ctx.breakdown_order = Some(order);
            }
            let (_, ord_depth) = definition.cardinality_and_depth(None, 0);
            self.resolve_children(ctx, id, definition, depth + ord_depth, facts, brkdn)?;
            self.propagate_deemed_defaults(ctx, id, definition);
            ctx.breakdown_order = saved;
        }
        // downstream iteration assumes at least one point per breakdown
        if ctx.model.is_leaf(id) {
            let empty = ctx.model.add_node(id, None);
            self.expand_cartesian(ctx, empty, depth, facts, brkdn)?;
        }
        Ok(id)
    }

    fn resolve_children(
        &self,
        ctx: &mut ResolutionContext,
        structural: NodeId,
        definition: &DefinitionNode,
        depth: usize,
        facts: &[FactId],
        brkdn: Option<usize>,
    ) -> Result<(), Fault> {
        for child in self.graph.subtree_children(&definition.key) {
            if matches!(child.kind, DefinitionKind::Table(_)) {
                continue;
            }
            if child.is_merged() {
                self.merge_into(ctx, structural, &child)?;
                self.resolve_children(ctx, structural, &child, depth, facts, brkdn)?;
                continue;
            }
            let Some(child_id) = self.resolve_definition(ctx, structural, &child, depth, facts, brkdn)? else {
                continue;
            };
            let contributes = matches!(child.kind, DefinitionKind::Rule(_))
                && !child.is_abstract()
                && self
                    .graph
                    .subtree_children(&child.key)
                    .iter()
                    .any(|c| !c.is_merged() && !matches!(c.kind, DefinitionKind::Table(_)));
            if contributes {
                self.add_rule_rollup(ctx, child_id, &child, depth, facts, brkdn)?;
            }
        }
        Ok(())
    }

    /// Aggregate row for a non-abstract node with children.
    fn add_rule_rollup(
        &self,
        ctx: &mut ResolutionContext,
        id: NodeId,
        definition: &Arc<DefinitionNode>,
        depth: usize,
        facts: &[FactId],
        brkdn: Option<usize>,
    ) -> Result<(), Fault> {
        let rollup = match ctx.model.children(id).first().copied() {
            Some(first) => {
                let own: BTreeSet<Aspect> = aspect::aspects_covered(&ctx.model, id, true).into_iter().collect();
                let first: BTreeSet<Aspect> = aspect::aspects_covered(&ctx.model, first, true).into_iter().collect();
                if own == first {
                    Rollup::SpecifiesMember
                } else {
                    Rollup::ImpliesDefaultMember
                }
            }
            None => Rollup::ImpliesDefaultMember,
        };
        let rollup_id = ctx.model.add_rollup(id, Some(Arc::clone(definition)), rollup);
        if rollup == Rollup::ImpliesDefaultMember {
            // the aggregate stands for the default member of every dimension its children split on
            let own = self.defaulted_dims(definition.aspects_covered());
            let implied: BTreeSet<QName> = self
                .graph
                .subtree_children(&definition.key)
                .iter()
                .flat_map(|c| self.defaulted_dims(c.aspects_covered()))
                .filter(|d| !own.contains(d))
                .collect();
            ctx.model.node_mut(rollup_id).deemed_defaulted_dims = implied;
        }
        if self.parent_child_order(ctx, definition) == ParentChildOrder::ParentFirst {
            ctx.model.rotate_last_to_front(id);
        }
        trace!(node = %definition.key, ?rollup, "added rollup");
        self.expand_cartesian(ctx, rollup_id, depth, facts, brkdn)
    }

    fn parent_child_order(&self, ctx: &ResolutionContext, definition: &DefinitionNode) -> ParentChildOrder {
        definition
            .parent_child_order()
            .or(ctx.breakdown_order)
            .unwrap_or(ctx.table_order)
    }

    /// Resolves the next breakdown on the current axis beneath `leaf`.
    fn expand_cartesian(
        &self,
        ctx: &mut ResolutionContext,
        leaf: NodeId,
        depth: usize,
        facts: &[FactId],
        brkdn: Option<usize>,
    ) -> Result<(), Fault> {
        let Some(next) = brkdn.map(|i| i + 1) else {
            return Ok(());
        };
        let Some(breakdown) = ctx.edges.get(next).map(|edge| Arc::clone(&edge.breakdown)) else {
            return Ok(());
        };
        trace!(breakdown = %breakdown.key, axis = %ctx.axis, "cartesian expansion");
        self.resolve_definition(ctx, leaf, &breakdown, depth, facts, Some(next))?;
        Ok(())
    }

    // ========================================================================
    // Rule nodes
    // ========================================================================

    #[allow(clippy::too_many_arguments)]
    fn resolve_rule(
        &self,
        ctx: &mut ResolutionContext,
        parent: NodeId,
        definition: &Arc<DefinitionNode>,
        rule: &RuleNode,
        depth: usize,
        facts: &[FactId],
        brkdn: Option<usize>,
    ) -> Result<NodeId, Fault> {
        let (cardinality, ord_depth) = definition.cardinality_and_depth(None, 0);
        if !definition.is_abstract()
            && definition.is_closed()
            && cardinality == 0
            && !self.graph.children_cover_same_aspects(definition)
        {
            return Err(ResolutionError::new(
                ErrorCode::ClosedDefinitionNodeZeroCardinality,
                format!(
                    "Closed definition node {} does not contribute at least one structural node",
                    definition.key
                ),
            )
            .into());
        }

        let id = ctx.model.add_node(parent, Some(Arc::clone(definition)));
        if rule.is_abstract {
            ctx.model.node_mut(id).flags.insert(NodeFlags::ABSTRACT);
        }
        if let Some(tag) = &rule.tag_selector {
            ctx.model.node_mut(id).tag_selectors.push(tag.clone());
        }
        self.bind_rule_values(ctx, id, definition, rule)?;

        self.resolve_children(ctx, id, definition, depth + ord_depth, facts, brkdn)?;
        self.propagate_deemed_defaults(ctx, id, definition);
        if ctx.model.is_leaf(id) {
            self.expand_cartesian(ctx, id, depth + ord_depth, facts, brkdn)?;
        }
        Ok(id)
    }

    /// Evaluates every constraint set of `rule` in the scope of `id` and
    /// stores the values on the node.
    fn bind_rule_values(
        &self,
        ctx: &mut ResolutionContext,
        id: NodeId,
        definition: &DefinitionNode,
        rule: &RuleNode,
    ) -> Result<(), Fault> {
        for set in &rule.constraint_sets {
            let mut values: IndexMap<Aspect, Value> = IndexMap::with_capacity(set.rules.len());
            for aspect_rule in &set.rules {
                let value = self.rule_value(ctx, id, definition, &aspect_rule.aspect, &aspect_rule.value)?;
                if aspect_rule.value.is_static() {
                    self.check_rule_value(definition, &aspect_rule.aspect, &value)?;
                }
                if let (Aspect::TypedDimension(dim), Some(typed)) = (&aspect_rule.aspect, value.as_str()) {
                    if !self.is_typed_value_reported(dim, typed) {
                        ctx.model.node_mut(id).flags.insert(NodeFlags::UNREPORTED);
                    }
                }
                values.insert(aspect_rule.aspect.clone(), value);
            }
            let node = ctx.model.node_mut(id);
            match &set.tag {
                None => node.aspects.extend(values),
                Some(tag) => {
                    node.tagged_aspects.insert(tag.clone(), values);
                }
            }
        }
        Ok(())
    }

    fn rule_value(
        &self,
        ctx: &ResolutionContext,
        id: NodeId,
        definition: &DefinitionNode,
        aspect: &Aspect,
        expr: &Expr,
    ) -> Result<Value, Fault> {
        let value = match ctx.model.evaluate(id, self.evaluator, expr) {
            Ok(value) => value,
            Err(err) if self.config.handle_exceptions => {
                warn!(node = %definition.key, %aspect, code = %err.code, "aspect value evaluation failed: {}", err.message);
                Value::Sequence(Vec::new())
            }
            Err(err) => return Err(err.into()),
        };
        Ok(match aspect {
            Aspect::Dimensions | Aspect::OmitDimensions => Value::Dimensions(
                value
                    .into_items()
                    .into_iter()
                    .filter_map(|item| item.as_qname().cloned())
                    .collect(),
            ),
            _ => value,
        })
    }

    fn check_rule_value(&self, definition: &DefinitionNode, aspect: &Aspect, value: &Value) -> Result<(), Fault> {
        match aspect {
            Aspect::Concept => {
                let valid = value
                    .as_qname()
                    .map_or(false, |concept| self.taxonomy.is_primary_item(concept));
                if !valid {
                    return Err(ResolutionError::new(
                        ErrorCode::InvalidQNameAspectValue,
                        format!(
                            "Rule node {} specifies concept {} which is not an existing primary item",
                            definition.key, value
                        ),
                    )
                    .into());
                }
            }
            Aspect::ExplicitDimension(_) => {
                if let Some(member) = value.as_qname() {
                    if member.as_str() != ABSENT_DIMENSION_VALUE && !self.taxonomy.is_domain_member(member) {
                        return Err(ResolutionError::new(
                            ErrorCode::InvalidQNameAspectValue,
                            format!(
                                "Rule node {} specifies domain member {} which is not an existing domain member",
                                definition.key, member
                            ),
                        )
                        .into());
                    }
                }
            }
            _ => {}
        }
        Ok(())
    }

    fn is_typed_value_reported(&self, dimension: &QName, value: &str) -> bool {
        self.facts.ids().into_iter().any(|id| {
            self.facts.get(id).map_or(false, |fact| {
                fact.typed_members
                    .iter()
                    .any(|m| &m.dimension == dimension && m.value == value)
            })
        })
    }

    /// Folds a merged child's values and tag selector into `target`.
    fn merge_into(&self, ctx: &mut ResolutionContext, target: NodeId, merged: &DefinitionNode) -> Result<(), Fault> {
        let Some(rule) = merged.rule_node() else {
            return Ok(());
        };
        for set in &rule.constraint_sets {
            for aspect_rule in &set.rules {
                let value = self.rule_value(ctx, target, merged, &aspect_rule.aspect, &aspect_rule.value)?;
                let node = ctx.model.node_mut(target);
                let values = match &set.tag {
                    None => &mut node.aspects,
                    Some(tag) => node.tagged_aspects.entry(tag.clone()).or_default(),
                };
                values.entry(aspect_rule.aspect.clone()).or_insert(value);
            }
        }
        if let Some(tag) = &rule.tag_selector {
            let node = ctx.model.node_mut(target);
            if !node.tag_selectors.contains(tag) {
                node.tag_selectors.push(tag.clone());
            }
        }
        Ok(())
    }

    // ========================================================================
    // Relationship nodes
    // ========================================================================

    #[allow(clippy::too_many_arguments)]
    fn resolve_relationship(
        &self,
        ctx: &mut ResolutionContext,
        parent: NodeId,
        definition: &Arc<DefinitionNode>,
        rel: &RelationshipNode,
        dimension: Option<&Expr>,
        depth: usize,
        facts: &[FactId],
        brkdn: Option<usize>,
    ) -> Result<(), Fault> {
        let scope = ctx.model.scope(parent);
        let evaluator = self.evaluator;

        let sources = match &rel.source {
            Some(expr) => evaluator.evaluate_qnames(&scope, expr)?,
            None => vec![QName::xfi_root()],
        };
        let dimension = dimension.map(|expr| evaluator.evaluate_qname(&scope, expr)).transpose()?;
        let arc_role = match &rel.arc_role {
            Some(expr) => evaluator.evaluate_string(&scope, expr)?,
            None if dimension.is_some() => DOMAIN_MEMBER_ARCROLE.to_string(),
            None => PARENT_CHILD_ARCROLE.to_string(),
        };
        let link_role = rel
            .link_role
            .as_ref()
            .map(|expr| evaluator.evaluate_string(&scope, expr))
            .transpose()?;
        let axis: TraversalAxis = match &rel.formula_axis {
            Some(expr) => evaluator.evaluate_string(&scope, expr)?.trim().parse()?,
            None => TraversalAxis::DescendantOrSelf,
        };
        let generations = match &rel.generations {
            Some(expr) => evaluator.evaluate_integer(&scope, expr)?,
            None => 0,
        };
        if generations < 0 {
            return Err(NavigationError::NegativeGenerations(generations).into());
        }
        let generations = u32::try_from(generations)
            .map_err(|_| NavigationError::GenerationsOutOfRange(generations))?;
        if axis.is_single_generation() && generations > 1 {
            return Err(ResolutionError::new(
                ErrorCode::RelationshipNodeTooManyGenerations,
                format!(
                    "Relationship node {} formula axis {} implies a single generation walk but generations is {}",
                    definition.key, axis, generations
                ),
            )
            .into());
        }
        let link_name = rel
            .link_name
            .as_ref()
            .map(|expr| evaluator.evaluate_qname(&scope, expr))
            .transpose()?;
        let arc_name = rel
            .arc_name
            .as_ref()
            .map(|expr| evaluator.evaluate_qname(&scope, expr))
            .transpose()?;

        self.check_relationship_sources(definition, &sources, dimension.as_ref())?;

        let mut forests: Vec<(QName, Forest)> = Vec::with_capacity(sources.len());
        for source in &sources {
            let query = RelationshipQuery {
                source: source.clone(),
                link_role: link_role.as_deref().map(CompactString::from),
                arc_role: CompactString::from(arc_role.as_str()),
                axis,
                generations,
                link_name: link_name.clone(),
                arc_name: arc_name.clone(),
                dimension: if source.is_xfi_root() { dimension.clone() } else { None },
            };
            forests.push((source.clone(), self.navigator.relationships(&query)?));
        }

        if dimension.is_none() {
            let networks: AHashSet<_> = forests
                .iter()
                .flat_map(|(_, forest)| flatten_forest(forest))
                .filter_map(|entry| match entry {
                    ForestEntry::Relationship(rel) => Some(rel.network()),
                    _ => None,
                })
                .collect();
            if networks.len() > 1 {
                return Err(ResolutionError::new(
                    ErrorCode::AmbiguousConceptNetwork,
                    format!(
                        "Concept relationship node {} navigates {} networks",
                        definition.key,
                        networks.len()
                    ),
                )
                .into());
            }
        }

        // sibling-or-self already includes the source among its results
        let or_self = axis.includes_self() && axis != TraversalAxis::SiblingOrSelf;
        let or_self_roots = if or_self {
            sources.iter().filter(|s| !s.is_xfi_root()).collect::<AHashSet<_>>().len()
        } else {
            0
        };
        let cardinality: usize = forests
            .iter()
            .map(|(_, forest)| definition.cardinality_and_depth(Some(forest.as_slice()), 0).0)
            .sum::<usize>()
            + or_self_roots;
        if cardinality == 0 && !self.graph.children_cover_same_aspects(definition) {
            return Err(ResolutionError::new(
                ErrorCode::ClosedDefinitionNodeZeroCardinality,
                format!(
                    "Closed definition node {} does not contribute at least one structural node",
                    definition.key
                ),
            )
            .into());
        }

        let walk = RelationshipWalk {
            definition,
            variable: rel.variable.as_ref(),
            concept_variable: rel.concept_variable.as_ref(),
            covered: match &dimension {
                Some(dim) => Aspect::ExplicitDimension(dim.clone()),
                None => Aspect::Concept,
            },
            upward: axis.is_upward(),
        };
        let start = ctx.model.children(parent).len();
        let mut roots: IndexMap<QName, NodeId> = IndexMap::new();
        for (source, forest) in &forests {
            if or_self {
                if !source.is_xfi_root() {
                    self.or_self_root(ctx, parent, &walk, source, &mut roots);
                }
                self.add_entries(ctx, parent, &walk, forest, Some(&mut roots));
            } else {
                self.add_entries(ctx, parent, &walk, forest, None);
            }
        }

        let created: Vec<NodeId> = ctx.model.children(parent)[start..].to_vec();
        for id in created {
            self.trim_abstract_nodes(ctx, id);
            if ctx.model.is_abstract(id) && ctx.model.is_leaf(id) {
                ctx.model.detach(parent, id);
            }
        }
        let created: Vec<NodeId> = ctx.model.children(parent)[start..].to_vec();
        let max = created
            .iter()
            .map(|id| ctx.model.max_depth_below(*id) + 1)
            .max()
            .unwrap_or(0);
        for id in &created {
            self.add_descendant_rollups(ctx, *id, 1, max);
        }
        trace!(node = %definition.key, entries = created.len(), max_depth = max, "materialized relationships");

        for id in created {
            for leaf in ctx.model.leaves(id) {
                self.expand_cartesian(ctx, leaf, depth + max, facts, brkdn)?;
            }
        }
        Ok(())
    }

    fn check_relationship_sources(
        &self,
        definition: &DefinitionNode,
        sources: &[QName],
        dimension: Option<&QName>,
    ) -> Result<(), ResolutionError> {
        match dimension {
            Some(dimension) => {
                if !self.taxonomy.is_explicit_dimension(dimension) {
                    return Err(ResolutionError::new(
                        ErrorCode::InvalidExplicitDimensionQName,
                        format!(
                            "Dimension relationship node {} dimension {} is not an existing explicit dimension",
                            definition.key, dimension
                        ),
                    ));
                }
                if let Some(source) = sources
                    .iter()
                    .find(|s| !s.is_xfi_root() && !self.taxonomy.is_domain_member(s))
                {
                    return Err(ResolutionError::new(
                        ErrorCode::InvalidDimensionRelationshipSource,
                        format!(
                            "Dimension relationship node {} source {} is not an existing domain member",
                            definition.key, source
                        ),
                    ));
                }
            }
            None => {
                let invalid = sources.iter().find(|s| {
                    !s.is_xfi_root()
                        && (!self.taxonomy.contains(s) || self.taxonomy.is_hypercube(s) || self.taxonomy.is_dimension(s))
                });
                if let Some(source) = invalid {
                    return Err(ResolutionError::new(
                        ErrorCode::InvalidConceptRelationshipSource,
                        format!(
                            "Concept relationship node {} source {} does not refer to an existing concept",
                            definition.key, source
                        ),
                    ));
                }
            }
        }
        Ok(())
    }

    /// Materializes forest entries beneath `attach`. A nested list belongs to
    /// the entry preceding it.
    fn add_entries(
        &self,
        ctx: &mut ResolutionContext,
        attach: NodeId,
        walk: &RelationshipWalk<'_>,
        forest: &[ForestEntry],
        mut roots: Option<&mut IndexMap<QName, NodeId>>,
    ) {
        let mut previous: Option<NodeId> = None;
        for entry in forest {
            match entry {
                ForestEntry::Nested(nested) => {
                    let holder = match previous {
                        Some(holder) => holder,
                        None => {
                            let holder = ctx.model.add_node(attach, Some(Arc::clone(walk.definition)));
                            ctx.model.node_mut(holder).flags.insert(NodeFlags::UNLABELED);
                            previous = Some(holder);
                            holder
                        }
                    };
                    self.add_entries(ctx, holder, walk, nested, None);
                }
                ForestEntry::Relationship(rel) => {
                    previous = Some(self.add_relationship_entry(ctx, attach, walk, rel, roots.as_deref_mut()));
                }
                ForestEntry::Identifier(qname) if qname.is_xfi_root() => previous = None,
                ForestEntry::Identifier(qname) => {
                    previous = match roots.as_deref_mut() {
                        Some(roots) => Some(self.or_self_root(ctx, attach, walk, qname, roots)),
                        None => Some(self.add_identifier_entry(ctx, attach, walk, qname)),
                    };
                }
            }
        }
    }

    fn add_relationship_entry(
        &self,
        ctx: &mut ResolutionContext,
        attach: NodeId,
        walk: &RelationshipWalk<'_>,
        rel: &Relationship,
        roots: Option<&mut IndexMap<QName, NodeId>>,
    ) -> NodeId {
        let (key, target) = if walk.upward {
            (&rel.to, &rel.from)
        } else {
            (&rel.from, &rel.to)
        };
        let attach = match roots {
            Some(roots) => self.or_self_root(ctx, attach, walk, key, roots),
            None => attach,
        };
        let id = self.add_identifier_entry(ctx, attach, walk, target);

        if walk.is_concept() {
            let preferred = match (&rel.preferred_label, &rel.generic_preferred_label) {
                (Some(preferred), Some(generic)) => {
                    ctx.diagnostics.push(
                        Diagnostic::warning(
                            ErrorCode::AmbiguousPreferredLabel,
                            format!(
                                "Relationship {} to {} has both preferred label {} and generic preferred label {}",
                                rel.from, rel.to, preferred, generic
                            ),
                        )
                        .on(&walk.definition.key),
                    );
                    Some(preferred)
                }
                (Some(preferred), None) => Some(preferred),
                (None, generic) => generic.as_ref(),
            };
            let tag = match preferred.map(CompactString::as_str) {
                Some(PERIOD_START_LABEL_ROLE) => Some(PERIOD_START_TAG),
                Some(PERIOD_END_LABEL_ROLE) => Some(PERIOD_END_TAG),
                _ => None,
            };
            if let Some(tag) = tag {
                ctx.model.node_mut(id).tag_selectors.push(CompactString::new(tag));
            }
        } else if !rel.usable {
            ctx.model.node_mut(id).flags.insert(NodeFlags::ABSTRACT);
        }
        if let Some(variable) = walk.variable {
            // the relationship itself is represented by its target
            let node = ctx.model.node_mut(id);
            node.variables.retain(|(name, _)| name != variable);
            node.variables.push((variable.clone(), Value::QName(target.clone())));
        }
        id
    }

    fn add_identifier_entry(
        &self,
        ctx: &mut ResolutionContext,
        attach: NodeId,
        walk: &RelationshipWalk<'_>,
        target: &QName,
    ) -> NodeId {
        let id = ctx.model.add_node(attach, Some(Arc::clone(walk.definition)));
        let is_abstract = walk.is_concept() && self.taxonomy.is_abstract(target);
        let node = ctx.model.node_mut(id);
        node.flags.insert(NodeFlags::UNLABELED);
        if is_abstract {
            node.flags.insert(NodeFlags::ABSTRACT);
        }
        if let Some(variable) = walk.variable {
            node.variables.push((variable.clone(), Value::QName(target.clone())));
        }
        if let Some(concept_variable) = walk.concept_variable {
            node.variables.push((concept_variable.clone(), Value::QName(target.clone())));
        }
        node.aspects.insert(walk.covered.clone(), Value::QName(target.clone()));
        id
    }

    /// The single node standing for `source` under an "-or-self" axis.
    fn or_self_root(
        &self,
        ctx: &mut ResolutionContext,
        parent: NodeId,
        walk: &RelationshipWalk<'_>,
        source: &QName,
        roots: &mut IndexMap<QName, NodeId>,
    ) -> NodeId {
        if let Some(id) = roots.get(source) {
            return *id;
        }
        let id = ctx.model.add_node(parent, Some(Arc::clone(walk.definition)));
        let is_abstract = walk.is_concept() && self.taxonomy.is_abstract(source);
        let node = ctx.model.node_mut(id);
        node.flags.insert(NodeFlags::UNLABELED);
        if is_abstract {
            node.flags.insert(NodeFlags::ABSTRACT);
        }
        if let Some(variable) = walk.variable {
            node.variables.push((variable.clone(), Value::Sequence(Vec::new())));
        }
        if let Some(concept_variable) = walk.concept_variable {
            node.variables.push((concept_variable.clone(), Value::QName(source.clone())));
        }
        node.aspects.insert(walk.covered.clone(), Value::QName(source.clone()));
        roots.insert(source.clone(), id);
        id
    }

    /// Removes abstract childless nodes bottom up.
    fn trim_abstract_nodes(&self, ctx: &mut ResolutionContext, id: NodeId) {
        let children = ctx.model.children(id).to_vec();
        for child in children {
            self.trim_abstract_nodes(ctx, child);
            if ctx.model.is_abstract(child) && ctx.model.is_leaf(child) {
                ctx.model.detach(id, child);
            }
        }
    }

    /// Adds rollups until every branch below `id` reaches `max`.
    fn add_descendant_rollups(&self, ctx: &mut ResolutionContext, id: NodeId, depth: usize, max: usize) {
        let needs_rollup = 0 < depth && depth < max && !ctx.model.is_abstract(id);
        let children = ctx.model.children(id).to_vec();
        for child in children {
            self.add_descendant_rollups(ctx, child, depth + 1, max);
        }
        if needs_rollup {
            let definition = ctx.model.node(id).definition.clone();
            let rollup = definition
                .as_ref()
                .map_or(Rollup::ForDefinitionNode, |d| d.rollup_type());
            let order = definition
                .as_ref()
                .map_or(ctx.table_order, |d| self.parent_child_order(ctx, d));
            let rollup_id = ctx.model.add_rollup(id, definition, rollup);
            if ctx.model.children(id).len() > 1 && order == ParentChildOrder::ParentFirst {
                ctx.model.rotate_last_to_front(id);
            }
            self.add_descendant_rollups(ctx, rollup_id, depth + 1, max);
        }
    }

    // ========================================================================
    // Aspect (open) nodes
    // ========================================================================

    #[allow(clippy::too_many_arguments)]
    fn resolve_open(
        &self,
        ctx: &mut ResolutionContext,
        parent: NodeId,
        definition: &Arc<DefinitionNode>,
        open: &AspectNode,
        depth: usize,
        facts: &[FactId],
        brkdn: Option<usize>,
    ) -> Result<(), Fault> {
        ctx.model.set_has_open_node(parent);

        let covered = open.aspects_covered();
        let candidates = self.partitioner.filter_facts(&self.facts, facts, &open.filters)?;
        let mut partitions: Vec<(BoundFact, Vec<FactId>)> = self
            .partitioner
            .partition_facts(&self.facts, &candidates, &covered)?
            .into_iter()
            .filter_map(|partition| Some((BoundFact::Reported(*partition.first()?), partition)))
            .filter(|(bound, _)| {
                open.include_unreported_value
                    || !open.aspect.is_dimensional()
                    || self.facts.bound_value(bound, &open.aspect).is_some()
            })
            .collect();

        if self.config.editable && ctx.axis != Axis::Z && ctx.model.is_entry_prototype(parent, true) {
            let lines = self
                .config
                .open_breakdown_lines
                .unwrap_or(if partitions.is_empty() { 1 } else { 0 });
            let nested = ctx.model.is_entry_prototype(parent, false);
            for _ in 0..lines {
                ctx.prototypes += 1;
                partitions.push((BoundFact::Prototype(FactPrototype::entry(ctx.prototypes)), Vec::new()));
                // one entry row per product under an outer entry row
                if nested {
                    break;
                }
            }
        }
        trace!(node = %definition.key, partitions = partitions.len(), "partitioned facts");

        let subtree = self.graph.subtree_children(&definition.key);
        let start = ctx.model.children(parent).len();
        for (bound, partition) in partitions {
            let id = ctx.model.add_node(parent, Some(Arc::clone(definition)));
            {
                let node = ctx.model.node_mut(id);
                node.flags.insert(NodeFlags::UNLABELED);
                node.bound_fact = Some(bound);
                node.facts_partition = partition.clone();
            }
            for child in &subtree {
                self.resolve_definition(ctx, id, child, depth + 1, &partition, brkdn)?;
            }
            if ctx.model.is_leaf(id) {
                self.expand_cartesian(ctx, id, depth + 1, facts, brkdn)?;
            }
        }

        let mut created: Vec<NodeId> = ctx.model.children(parent)[start..].to_vec();
        if covered == [Aspect::Concept] {
            created.sort_by_key(|id| {
                let node = ctx.model.node(*id);
                match node.bound_fact {
                    Some(BoundFact::Reported(_)) => node.facts_partition.iter().min().map_or(u32::MAX, |f| f.0),
                    _ => u32::MAX,
                }
            });
        } else {
            let projector = HeaderProjector::new(&self.config.lang);
            created.sort_by_cached_key(|id| projector.sort_key(&ctx.model, *id));
        }
        let children = &mut ctx.model.node_mut(parent).children;
        children.truncate(start);
        children.extend(created);
        Ok(())
    }

    // ========================================================================
    // Deemed defaulted dimensions
    // ========================================================================

    fn defaulted_dims(&self, aspects: impl IntoIterator<Item = Aspect>) -> BTreeSet<QName> {
        aspects
            .into_iter()
            .filter_map(|aspect| match aspect {
                Aspect::ExplicitDimension(dim) if self.taxonomy.has_dimension_default(&dim) => Some(dim),
                _ => None,
            })
            .collect()
    }

    /// Records, for each child that omits a dimension some sibling specifies
    /// with a default member, that the dimension is deemed defaulted.
    fn propagate_deemed_defaults(&self, ctx: &mut ResolutionContext, structural: NodeId, definition: &DefinitionNode) {
        let children: Vec<Arc<DefinitionNode>> = self
            .graph
            .subtree_children(&definition.key)
            .into_iter()
            .filter(|c| !matches!(c.kind, DefinitionKind::Table(_)))
            .collect();
        let child_dims: BTreeSet<QName> = children
            .iter()
            .flat_map(|c| self.defaulted_dims(c.aspects_covered()))
            .collect();
        if !child_dims.is_empty() {
            let own = self.defaulted_dims(definition.aspects_covered());
            for child in &children {
                let covered = self.defaulted_dims(child.aspects_covered());
                let defaulted: BTreeSet<QName> = child_dims
                    .iter()
                    .filter(|d| !covered.contains(*d) && !own.contains(*d))
                    .cloned()
                    .collect();
                if !defaulted.is_empty() {
                    ctx.deemed_defaults.insert(child.key.clone(), defaulted);
                }
            }
        }

        let axis = ctx.axis;
        let siblings: Vec<NodeId> = ctx
            .model
            .children(structural)
            .iter()
            .copied()
            .filter(|id| ctx.model.node(*id).axis == Some(axis))
            .collect();
        let covered: Vec<BTreeSet<QName>> = siblings
            .iter()
            .map(|id| self.defaulted_dims(aspect::aspects_covered(&ctx.model, *id, true)))
            .collect();
        let sibling_dims: BTreeSet<QName> = covered.iter().flatten().cloned().collect();
        let any_uncovered = !child_dims.is_empty() && covered.iter().any(|c| !child_dims.is_subset(c));
        for (id, covered) in siblings.iter().zip(&covered) {
            let Some(key) = ctx.model.node(*id).definition_key().cloned() else {
                continue;
            };
            let mut defaulted: BTreeSet<QName> = sibling_dims.difference(covered).cloned().collect();
            if let Some(Value::Dimensions(omitted)) = aspect::aspect_value(&ctx.model, *id, &Aspect::OmitDimensions, true, None) {
                defaulted.extend(omitted);
            }
            if !defaulted.is_empty() {
                ctx.deemed_defaults.insert(key, defaulted);
            } else if any_uncovered && !child_dims.is_subset(covered) {
                ctx.deemed_defaults.insert(key, child_dims.clone());
            }
        }
    }

    /// Pushes deemed defaulted dimensions down to leaves and to
    /// `ImpliesDefaultMember` rollups.
    fn add_defaulted_dimensions(
        &self,
        ctx: &mut ResolutionContext,
        id: NodeId,
        covered: &BTreeSet<QName>,
        defaulted: &BTreeSet<QName>,
    ) {
        let tags = ctx.model.tag_selectors(id);
        let mut covered = covered.clone();
        covered.extend(
            aspect::owned_aspects(&ctx.model, id, &tags)
                .into_iter()
                .filter_map(|a| match a {
                    Aspect::ExplicitDimension(dim) => Some(dim),
                    _ => None,
                }),
        );
        if let Some(Value::Dimensions(omitted)) = aspect::owned_value(&ctx.model, id, &Aspect::OmitDimensions, &tags) {
            covered.retain(|d| !omitted.contains(d));
        }
        let mut defaulted = defaulted.clone();
        if let Some(dims) = ctx
            .model
            .node(id)
            .definition_key()
            .and_then(|key| ctx.deemed_defaults.get(key))
        {
            defaulted.extend(dims.iter().cloned());
        }

        if ctx.model.node(id).rollup == Rollup::ImpliesDefaultMember {
            let deemed: BTreeSet<QName> = defaulted.difference(&covered).cloned().collect();
            if !deemed.is_empty() {
                defaulted.retain(|d| !deemed.contains(d));
                ctx.model.node_mut(id).deemed_defaulted_dims.extend(deemed);
            }
        }

        let children = ctx.model.children(id).to_vec();
        if children.is_empty() {
            let deemed: Vec<QName> = defaulted.difference(&covered).cloned().collect();
            ctx.model.node_mut(id).deemed_defaulted_dims.extend(deemed);
        } else {
            for child in children {
                self.add_defaulted_dimensions(ctx, child, &covered, &defaulted);
            }
        }
    }
}

/// Parameters shared by every entry one relationship node materializes.
struct RelationshipWalk<'d> {
    definition: &'d Arc<DefinitionNode>,
    variable: Option<&'d QName>,
    concept_variable: Option<&'d QName>,
    covered: Aspect,
    upward: bool,
}

impl RelationshipWalk<'_> {
    fn is_concept(&self) -> bool {
        self.covered == Aspect::Concept
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::definition::{DefinitionModel, RuleNode};
    use crate::linkbase::RelationshipNetwork;
    use crate::taxonomy::ConceptKind;

    fn taxonomy() -> Taxonomy {
        let mut taxonomy = Taxonomy::new();
        taxonomy
            .add("m:Assets", ConceptKind::Item, false, false)
            .add("m:Liabilities", ConceptKind::Item, false, false)
            .add("d:Country", ConceptKind::ExplicitDimension, false, false)
            .add("c:DE", ConceptKind::Item, true, true)
            .add("c:FR", ConceptKind::Item, true, true);
        taxonomy
    }

    fn concept_rule(key: &str, concept: &str) -> DefinitionNode {
        DefinitionNode::rule(key, RuleNode::new().with_rule(Aspect::Concept, Expr::qname(concept)))
    }

    #[test]
    fn test_parameter_product_last_name_fastest() {
        let mut graph = DefinitionModel::new();
        let mut table = TableNode::default();
        table.parameters.push(crate::definition::TableParameter {
            name: QName::new("p:a"),
            value: Expr::Sequence(vec![Expr::integer(1), Expr::integer(2)]),
        });
        table.parameters.push(crate::definition::TableParameter {
            name: QName::new("p:b"),
            value: Expr::Sequence(vec![Expr::integer(10), Expr::integer(20)]),
        });
        graph.add_node(DefinitionNode::new("t", DefinitionKind::Table(table)));
        let network = RelationshipNetwork::new();
        let resolver = Resolver::new(&graph, &network, Arc::new(taxonomy()), Arc::new(FactPool::default()))
            .with_config(ResolverConfig::default().with_parallel(false));

        let set = resolver.resolve_table(&"t".into()).unwrap();
        assert_eq!(set.tables.len(), 4);
        let b_values: Vec<Value> = set
            .tables
            .iter()
            .map(|t| t.parameters.iter().find(|(n, _)| n.as_str() == "p:b").unwrap().1.clone())
            .collect();
        assert_eq!(
            b_values,
            vec![Value::Integer(10), Value::Integer(20), Value::Integer(10), Value::Integer(20)]
        );
    }

    #[test]
    fn test_axis_without_breakdown_has_one_point() {
        let mut graph = DefinitionModel::new();
        graph.add_node(DefinitionNode::table("t"));
        graph
            .add_breakdown("t", Axis::X, DefinitionNode::breakdown("bx"))
            .unwrap();
        graph.add_child("bx", concept_rule("rx", "m:Assets")).unwrap();
        let network = RelationshipNetwork::new();
        let resolver = Resolver::new(&graph, &network, Arc::new(taxonomy()), Arc::new(FactPool::default()));

        let set = resolver.resolve_table(&"t".into()).unwrap();
        let table = set.first_table().unwrap();
        assert_eq!(table.data_cols, 1);
        assert_eq!(table.data_rows, 1);
        let y = set.breakdown(table, Axis::Y).unwrap();
        assert!(set.model.node(y).flags.contains(NodeFlags::HAS_OPEN_NODE));
    }

    #[test]
    fn test_merged_child_folds_into_parent() {
        let mut graph = DefinitionModel::new();
        graph.add_node(DefinitionNode::table("t"));
        graph.add_breakdown("t", Axis::Y, DefinitionNode::breakdown("b")).unwrap();
        graph.add_child("b", concept_rule("r", "m:Assets")).unwrap();
        graph
            .add_child(
                "r",
                DefinitionNode::rule(
                    "m",
                    RuleNode::new()
                        .with_rule(Aspect::ExplicitDimension(QName::new("d:Country")), Expr::qname("c:DE"))
                        .abstract_node()
                        .merged(),
                ),
            )
            .unwrap();
        let network = RelationshipNetwork::new();
        let resolver = Resolver::new(&graph, &network, Arc::new(taxonomy()), Arc::new(FactPool::default()));

        let set = resolver.resolve_table(&"t".into()).unwrap();
        let table = set.first_table().unwrap();
        let y = set.breakdown(table, Axis::Y).unwrap();
        let rule = set.model.children(y)[0];
        assert!(set.model.is_leaf(rule));
        assert_eq!(
            set.aspect_value(rule, &Aspect::ExplicitDimension(QName::new("d:Country")), false),
            Some(Value::qname("c:DE"))
        );
    }

    #[test]
    fn test_invalid_concept_value_aborts_table() {
        let mut graph = DefinitionModel::new();
        graph.add_node(DefinitionNode::table("t"));
        graph.add_breakdown("t", Axis::Y, DefinitionNode::breakdown("b")).unwrap();
        graph.add_child("b", concept_rule("r", "d:Country")).unwrap();
        let network = RelationshipNetwork::new();
        let resolver = Resolver::new(&graph, &network, Arc::new(taxonomy()), Arc::new(FactPool::default()));

        let err = resolver.resolve_table(&"t".into()).unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidQNameAspectValue);
        assert_eq!(err.node, Some(DefinitionKey::from("r")));
    }

    #[test]
    fn test_handle_exceptions_substitutes_empty_value() {
        let mut graph = DefinitionModel::new();
        graph.add_node(DefinitionNode::table("t"));
        graph.add_breakdown("t", Axis::Y, DefinitionNode::breakdown("b")).unwrap();
        graph
            .add_child(
                "b",
                DefinitionNode::rule("r", RuleNode::new().with_rule(Aspect::Unit, Expr::var("v:missing"))),
            )
            .unwrap();
        let network = RelationshipNetwork::new();
        let taxonomy = Arc::new(taxonomy());

        let strict = Resolver::new(&graph, &network, Arc::clone(&taxonomy), Arc::new(FactPool::default()));
        let err = strict.resolve_table(&"t".into()).unwrap_err();
        assert_eq!(err.code, ErrorCode::Evaluation("err:XPST0008".into()));

        let lenient = Resolver::new(&graph, &network, taxonomy, Arc::new(FactPool::default()))
            .with_config(ResolverConfig::default().with_handle_exceptions(true));
        let set = lenient.resolve_table(&"t".into()).unwrap();
        assert_eq!(set.first_table().unwrap().data_rows, 1);
    }
}
