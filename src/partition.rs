// Fact filtering and partitioning by aspect equality
use crate::model::{Aspect, Fact, FactAspects, FactId, FactPool, Period, QName, Unit, Value};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum PartitionError {
    #[error("Aspect {0} cannot partition facts")]
    UnsupportedAspect(String),

    #[error("Fact {0} is not in the pool")]
    UnknownFact(u32),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PeriodType {
    Instant,
    Duration,
    Forever,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FilterKind {
    Concept(Vec<QName>),
    /// Empty `members` accepts any member of the dimension.
    ExplicitDimension {
        dimension: QName,
        #[serde(default)]
        members: Vec<QName>,
    },
    TypedDimension {
        dimension: QName,
    },
    Period(PeriodType),
    Unit(Vec<Unit>),
    Entity {
        identifier: String,
    },
}

/// Aspect filter applied to candidate facts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FactFilter {
    #[serde(flatten)]
    pub kind: FilterKind,
    #[serde(default)]
    pub complement: bool,
}

impl FactFilter {
    pub fn new(kind: FilterKind) -> Self {
        Self { kind, complement: false }
    }

    pub fn complemented(mut self) -> Self {
        self.complement = !self.complement;
        self
    }

    pub fn matches(&self, fact: &Fact) -> bool {
        let matched = match &self.kind {
            FilterKind::Concept(names) => names.contains(&fact.concept),
            FilterKind::ExplicitDimension { dimension, members } => fact
                .explicit_members
                .iter()
                .find(|m| &m.dimension == dimension)
                .map_or(false, |m| members.is_empty() || members.contains(&m.member)),
            FilterKind::TypedDimension { dimension } => {
                fact.typed_members.iter().any(|m| &m.dimension == dimension)
            }
            FilterKind::Period(period_type) => matches!(
                (period_type, &fact.period),
                (PeriodType::Instant, Period::Instant { .. })
                    | (PeriodType::Duration, Period::Duration { .. })
                    | (PeriodType::Forever, Period::Forever)
            ),
            FilterKind::Unit(units) => fact.unit.as_ref().map_or(false, |u| units.contains(u)),
            FilterKind::Entity { identifier } => fact.entity.identifier == identifier.as_str(),
        };
        matched != self.complement
    }
}

pub trait FactPartitioner: Send + Sync {
    fn filter_facts(
        &self,
        pool: &FactPool,
        facts: &[FactId],
        filters: &[FactFilter],
    ) -> Result<Vec<FactId>, PartitionError>;

    /// Groups facts by equal values of `aspects`.
    fn partition_facts(
        &self,
        pool: &FactPool,
        facts: &[FactId],
        aspects: &[Aspect],
    ) -> Result<Vec<Vec<FactId>>, PartitionError>;
}

/// Partitions in order of first appearance.
#[derive(Debug, Default, Clone, Copy)]
pub struct AspectPartitioner;

impl FactPartitioner for AspectPartitioner {
    fn filter_facts(
        &self,
        pool: &FactPool,
        facts: &[FactId],
        filters: &[FactFilter],
    ) -> Result<Vec<FactId>, PartitionError> {
        let mut kept = Vec::with_capacity(facts.len());
        for &id in facts {
            let fact = pool.get(id).ok_or(PartitionError::UnknownFact(id.0))?;
            if filters.iter().all(|f| f.matches(fact)) {
                kept.push(id);
            }
        }
        Ok(kept)
    }

    fn partition_facts(
        &self,
        pool: &FactPool,
        facts: &[FactId],
        aspects: &[Aspect],
    ) -> Result<Vec<Vec<FactId>>, PartitionError> {
        if let Some(aspect) = aspects.iter().find(|a| matches!(a, Aspect::OmitDimensions)) {
            return Err(PartitionError::UnsupportedAspect(aspect.to_string()));
        }
        let mut partitions: IndexMap<Vec<Option<Value>>, Vec<FactId>> = IndexMap::new();
        for &id in facts {
            let fact = pool.get(id).ok_or(PartitionError::UnknownFact(id.0))?;
            let key = aspects.iter().map(|a| fact.aspect_value(a)).collect();
            partitions.entry(key).or_default().push(id);
        }
        Ok(partitions.into_values().collect())
    }
}
