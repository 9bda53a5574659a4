use chrono::NaiveDate;
use compact_str::CompactString;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

// ============================================================================
// Qualified names
// ============================================================================

/// A prefixed XBRL name (`prefix:local`). Identity is the prefixed form.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct QName(CompactString);

/// Pseudo-source naming the roots of a relationship network.
pub const XFI_ROOT: &str = "xfi:root";

/// Formula marker for "dimension is absent" in explicit dimension rules.
pub const ABSENT_DIMENSION_VALUE: &str = "xfi:absent";

impl QName {
    pub fn new(name: &str) -> Self {
        Self(CompactString::from(name))
    }

    pub fn xfi_root() -> Self {
        Self::new(XFI_ROOT)
    }

    pub fn is_xfi_root(&self) -> bool {
        self.0 == XFI_ROOT
    }

    pub fn prefix(&self) -> Option<&str> {
        self.0.split_once(':').map(|(prefix, _)| prefix)
    }

    pub fn local_name(&self) -> &str {
        match self.0.split_once(':') {
            Some((_, local)) => local,
            None => &self.0,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for QName {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl fmt::Display for QName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ============================================================================
// Aspects
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PeriodAspect {
    Start,
    End,
    Instant,
    /// The whole period as one value, whatever its type.
    Duration,
    Forever,
}

impl PeriodAspect {
    pub const ALL: [PeriodAspect; 5] = [
        PeriodAspect::Start,
        PeriodAspect::End,
        PeriodAspect::Instant,
        PeriodAspect::Duration,
        PeriodAspect::Forever,
    ];
}

/// Aspect rules that share one formula rule element. Defining one member of a
/// family on a node stops the others being inherited from its ancestors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AspectFamily {
    Period,
    Unit,
    EntityIdentifier,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Aspect {
    Concept,
    Period(PeriodAspect),
    Unit,
    EntityIdentifier,
    ExplicitDimension(QName),
    TypedDimension(QName),
    /// Set of dimension names; unioned across inheritance.
    Dimensions,
    OmitDimensions,
}

impl Aspect {
    pub fn family(&self) -> Option<AspectFamily> {
        match self {
            Aspect::Period(_) => Some(AspectFamily::Period),
            Aspect::Unit => Some(AspectFamily::Unit),
            Aspect::EntityIdentifier => Some(AspectFamily::EntityIdentifier),
            _ => None,
        }
    }

    pub fn dimension(&self) -> Option<&QName> {
        match self {
            Aspect::ExplicitDimension(dim) | Aspect::TypedDimension(dim) => Some(dim),
            _ => None,
        }
    }

    pub fn is_dimensional(&self) -> bool {
        matches!(
            self,
            Aspect::ExplicitDimension(_)
                | Aspect::TypedDimension(_)
                | Aspect::Dimensions
                | Aspect::OmitDimensions
        )
    }
}

impl fmt::Display for Aspect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Aspect::Concept => f.write_str("concept"),
            Aspect::Period(PeriodAspect::Start) => f.write_str("period start"),
            Aspect::Period(PeriodAspect::End) => f.write_str("period end"),
            Aspect::Period(PeriodAspect::Instant) => f.write_str("period instant"),
            Aspect::Period(PeriodAspect::Duration) => f.write_str("period"),
            Aspect::Period(PeriodAspect::Forever) => f.write_str("period forever"),
            Aspect::Unit => f.write_str("unit"),
            Aspect::EntityIdentifier => f.write_str("entity identifier"),
            Aspect::ExplicitDimension(dim) | Aspect::TypedDimension(dim) => write!(f, "{}", dim),
            Aspect::Dimensions => f.write_str("all dimensions"),
            Aspect::OmitDimensions => f.write_str("omit dimensions"),
        }
    }
}

// ============================================================================
// Values
// ============================================================================

// Period with forever support
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Period {
    Instant { date: NaiveDate },
    Duration { start: NaiveDate, end: NaiveDate },
    Forever,
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Period::Instant { date } => write!(f, "{}", date),
            Period::Duration { start, end } => write!(f, "{} - {}", start, end),
            Period::Forever => f.write_str("forever"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Entity {
    pub scheme: CompactString,
    pub identifier: CompactString,
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}) {}", self.scheme, self.identifier)
    }
}

// Unit with divide support
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Unit {
    pub numerator: Vec<QName>,
    #[serde(default)]
    pub denominator: Vec<QName>,
}

impl Unit {
    pub fn simple(measure: &str) -> Self {
        Self {
            numerator: vec![QName::new(measure)],
            denominator: Vec::new(),
        }
    }
}

impl fmt::Display for Unit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let join = |measures: &[QName]| {
            measures
                .iter()
                .map(QName::as_str)
                .collect::<Vec<_>>()
                .join("*")
        };
        if self.denominator.is_empty() {
            f.write_str(&join(&self.numerator))
        } else {
            write!(f, "{}/{}", join(&self.numerator), join(&self.denominator))
        }
    }
}

/// Aspect values and expression results.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Value {
    QName(QName),
    String(CompactString),
    Integer(i64),
    Boolean(bool),
    Date(NaiveDate),
    Period(Period),
    Entity(Entity),
    Unit(Unit),
    Dimensions(BTreeSet<QName>),
    Sequence(Vec<Value>),
}

impl Value {
    pub fn qname(name: &str) -> Self {
        Value::QName(QName::new(name))
    }

    pub fn string(s: &str) -> Self {
        Value::String(CompactString::from(s))
    }

    pub fn as_qname(&self) -> Option<&QName> {
        match self {
            Value::QName(qname) => Some(qname),
            Value::Sequence(items) if items.len() == 1 => items[0].as_qname(),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            Value::QName(qname) => Some(qname.as_str()),
            Value::Sequence(items) if items.len() == 1 => items[0].as_str(),
            _ => None,
        }
    }

    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Value::Integer(i) => Some(*i),
            Value::String(s) => s.trim().parse().ok(),
            Value::Sequence(items) if items.len() == 1 => items[0].as_integer(),
            _ => None,
        }
    }

    pub fn as_dimensions(&self) -> Option<&BTreeSet<QName>> {
        match self {
            Value::Dimensions(dims) => Some(dims),
            _ => None,
        }
    }

    pub fn is_empty_sequence(&self) -> bool {
        matches!(self, Value::Sequence(items) if items.is_empty())
    }

    /// Flattens nested sequences into their items; scalars become one item.
    pub fn into_items(self) -> Vec<Value> {
        match self {
            Value::Sequence(items) => items.into_iter().flat_map(Value::into_items).collect(),
            other => vec![other],
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::QName(qname) => write!(f, "{}", qname),
            Value::String(s) => f.write_str(s),
            Value::Integer(i) => write!(f, "{}", i),
            Value::Boolean(b) => write!(f, "{}", b),
            Value::Date(date) => write!(f, "{}", date),
            Value::Period(period) => write!(f, "{}", period),
            Value::Entity(entity) => write!(f, "{}", entity),
            Value::Unit(unit) => write!(f, "{}", unit),
            Value::Dimensions(dims) => {
                let names: Vec<&str> = dims.iter().map(QName::as_str).collect();
                f.write_str(&names.join(", "))
            }
            Value::Sequence(items) => {
                let items: Vec<String> = items.iter().map(ToString::to_string).collect();
                write!(f, "({})", items.join(", "))
            }
        }
    }
}

// ============================================================================
// Facts
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DimensionMember {
    pub dimension: QName,
    pub member: QName,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypedMember {
    pub dimension: QName,
    pub value: CompactString,
}

/// A reported fact with its context flattened in.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Fact {
    #[serde(default)]
    pub id: Option<CompactString>,
    pub concept: QName,
    pub entity: Entity,
    pub period: Period,
    #[serde(default)]
    pub unit: Option<Unit>,
    #[serde(default)]
    pub explicit_members: Vec<DimensionMember>,
    #[serde(default)]
    pub typed_members: Vec<TypedMember>,
    #[serde(default)]
    pub value: Option<CompactString>,
    #[serde(default)]
    pub decimals: Option<i8>,
}

/// Read access to the aspects of a reported fact or a stand-in for one.
pub trait FactAspects {
    fn aspect_value(&self, aspect: &Aspect) -> Option<Value>;

    fn is_prototype(&self) -> bool {
        false
    }
}

impl FactAspects for Fact {
    fn aspect_value(&self, aspect: &Aspect) -> Option<Value> {
        match aspect {
            Aspect::Concept => Some(Value::QName(self.concept.clone())),
            Aspect::Period(component) => match (component, &self.period) {
                (PeriodAspect::Start, Period::Duration { start, .. }) => Some(Value::Date(*start)),
                (PeriodAspect::End, Period::Duration { end, .. }) => Some(Value::Date(*end)),
                (PeriodAspect::Instant, Period::Instant { date }) => Some(Value::Date(*date)),
                (PeriodAspect::Forever, Period::Forever) => Some(Value::Boolean(true)),
                (PeriodAspect::Duration, period) => Some(Value::Period(period.clone())),
                _ => None,
            },
            Aspect::Unit => self.unit.clone().map(Value::Unit),
            Aspect::EntityIdentifier => Some(Value::Entity(self.entity.clone())),
            Aspect::ExplicitDimension(dim) => self
                .explicit_members
                .iter()
                .find(|m| &m.dimension == dim)
                .map(|m| Value::QName(m.member.clone())),
            Aspect::TypedDimension(dim) => self
                .typed_members
                .iter()
                .find(|m| &m.dimension == dim)
                .map(|m| Value::String(m.value.clone())),
            Aspect::Dimensions => {
                let dims: BTreeSet<QName> = self
                    .explicit_members
                    .iter()
                    .map(|m| m.dimension.clone())
                    .chain(self.typed_members.iter().map(|m| m.dimension.clone()))
                    .collect();
                (!dims.is_empty()).then_some(Value::Dimensions(dims))
            }
            Aspect::OmitDimensions => None,
        }
    }
}

/// Prefix of fact prototype ids; never used by reported facts.
pub const OPEN_ASPECT_ENTRY_SURROGATE: &str = "OPEN_ASPECT_ENTRY_";

/// Placeholder fact for open axis rows that have no reported data yet.
#[derive(Debug, Clone, PartialEq)]
pub struct FactPrototype {
    pub id: CompactString,
    pub aspects: Vec<(Aspect, Value)>,
}

impl FactPrototype {
    pub fn entry(sequence: usize) -> Self {
        Self {
            id: CompactString::from(format!("{}{}", OPEN_ASPECT_ENTRY_SURROGATE, sequence)),
            aspects: Vec::new(),
        }
    }
}

impl FactAspects for FactPrototype {
    fn aspect_value(&self, aspect: &Aspect) -> Option<Value> {
        self.aspects
            .iter()
            .find(|(a, _)| a == aspect)
            .map(|(_, v)| v.clone())
    }

    fn is_prototype(&self) -> bool {
        true
    }
}

/// Index of a fact in its pool; doubles as instance document order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct FactId(pub u32);

/// The fact a structural node is bound to.
#[derive(Debug, Clone, PartialEq)]
pub enum BoundFact {
    Reported(FactId),
    Prototype(FactPrototype),
}

impl BoundFact {
    pub fn is_prototype(&self) -> bool {
        matches!(self, BoundFact::Prototype(_))
    }
}

/// Read-only population of reported facts shared by all resolutions.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FactPool {
    facts: Vec<Fact>,
}

impl FactPool {
    pub fn new(facts: Vec<Fact>) -> Self {
        Self { facts }
    }

    #[inline(always)]
    pub fn len(&self) -> usize {
        self.facts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.facts.is_empty()
    }

    pub fn get(&self, id: FactId) -> Option<&Fact> {
        self.facts.get(id.0 as usize)
    }

    pub fn ids(&self) -> Vec<FactId> {
        (0..self.facts.len() as u32).map(FactId).collect()
    }

    pub fn aspect_value(&self, id: FactId, aspect: &Aspect) -> Option<Value> {
        self.get(id).and_then(|fact| fact.aspect_value(aspect))
    }

    pub fn bound_value(&self, bound: &BoundFact, aspect: &Aspect) -> Option<Value> {
        match bound {
            BoundFact::Reported(id) => self.aspect_value(*id, aspect),
            BoundFact::Prototype(prototype) => prototype.aspect_value(aspect),
        }
    }

    pub fn push(&mut self, fact: Fact) -> FactId {
        self.facts.push(fact);
        FactId(self.facts.len() as u32 - 1)
    }
}
