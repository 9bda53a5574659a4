// Error codes, resolution errors and diagnostics
use crate::definition::DefinitionKey;
use compact_str::CompactString;
use serde::Serialize;
use std::fmt;

/// Codes raised while resolving or checking a table.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    ClosedDefinitionNodeZeroCardinality,
    RelationshipNodeTooManyGenerations,
    InvalidConceptRelationshipSource,
    InvalidExplicitDimensionQName,
    InvalidDimensionRelationshipSource,
    AmbiguousConceptNetwork,
    InvalidQNameAspectValue,
    ExpressionNotCastableToRequiredType,
    AmbiguousPreferredLabel,
    TagSelectorClash,
    NoMatchingConstraintSet,
    TableMissingConceptAspect,
    AspectClashBetweenBreakdowns,
    TableParameterNameClash,
    NonAbstractMergedRuleNode,
    AbstractRuleNodeNoChildren,
    InvalidUseOfLabel,
    InvalidDimensionQNameOnAspectNode,
    ConstraintSetAspectMismatch,
    /// Internal failure re-wrapped at the top of a definition node's resolution.
    ResolutionException,
    /// Code reported by the expression evaluator.
    Evaluation(CompactString),
}

impl ErrorCode {
    pub fn as_str(&self) -> &str {
        match self {
            Self::ClosedDefinitionNodeZeroCardinality => "xbrlte:closedDefinitionNodeZeroCardinality",
            Self::RelationshipNodeTooManyGenerations => "xbrlte:relationshipNodeTooManyGenerations",
            Self::InvalidConceptRelationshipSource => "xbrlte:invalidConceptRelationshipSource",
            Self::InvalidExplicitDimensionQName => "xbrlte:invalidExplicitDimensionQName",
            Self::InvalidDimensionRelationshipSource => "xbrlte:invalidDimensionRelationshipSource",
            Self::AmbiguousConceptNetwork => "xbrlte:ambiguousConceptNetwork",
            Self::InvalidQNameAspectValue => "xbrlte:invalidQNameAspectValue",
            Self::ExpressionNotCastableToRequiredType => "xbrlte:expressionNotCastableToRequiredType",
            Self::AmbiguousPreferredLabel => "xbrlte:ambiguousPreferredLabel",
            Self::TagSelectorClash => "xbrlte:tagSelectorClash",
            Self::NoMatchingConstraintSet => "xbrlte:noMatchingConstraintSet",
            Self::TableMissingConceptAspect => "xbrlte:tableMissingConceptAspect",
            Self::AspectClashBetweenBreakdowns => "xbrlte:aspectClashBetweenBreakdowns",
            Self::TableParameterNameClash => "xbrlte:tableParameterNameClash",
            Self::NonAbstractMergedRuleNode => "xbrlte:nonAbstractMergedRuleNode",
            Self::AbstractRuleNodeNoChildren => "xbrlte:abstractRuleNodeNoChildren",
            Self::InvalidUseOfLabel => "xbrlte:invalidUseOfLabel",
            Self::InvalidDimensionQNameOnAspectNode => "xbrlte:invalidDimensionQNameOnAspectNode",
            Self::ConstraintSetAspectMismatch => "xbrlte:constraintSetAspectMismatch",
            Self::ResolutionException => "tabrl:resolutionException",
            Self::Evaluation(code) => code.as_str(),
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for ErrorCode {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

type Cause = Box<dyn std::error::Error + Send + Sync + 'static>;

/// A violated table invariant. Aborts resolution of the table it was raised in.
#[derive(Debug, thiserror::Error)]
#[error("[{code}] {message}")]
pub struct ResolutionError {
    pub code: ErrorCode,
    pub message: String,
    pub node: Option<DefinitionKey>,
    #[source]
    pub source: Option<Cause>,
}

impl ResolutionError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            node: None,
            source: None,
        }
    }

    pub fn at(mut self, node: &DefinitionKey) -> Self {
        if self.node.is_none() {
            self.node = Some(node.clone());
        }
        self
    }

    /// Wraps a failure that is not a resolution exception, keeping it as the cause.
    pub fn internal(node: Option<&DefinitionKey>, cause: impl Into<Cause>) -> Self {
        let cause = cause.into();
        let label = node.map(|k| k.as_str()).unwrap_or("(breakdown)");
        Self {
            code: ErrorCode::ResolutionException,
            message: format!("Exception in resolution of definition node {}: {}", label, cause),
            node: node.cloned(),
            source: Some(cause),
        }
    }

    /// Wraps an evaluator failure, keeping its code. Type errors map to
    /// `expressionNotCastableToRequiredType`.
    pub fn evaluation(node: Option<&DefinitionKey>, err: EvaluationError) -> Self {
        let code = if err.code == crate::evaluator::TYPE_ERROR {
            ErrorCode::ExpressionNotCastableToRequiredType
        } else {
            ErrorCode::Evaluation(err.code.clone())
        };
        let label = node.map(|k| k.as_str()).unwrap_or("(breakdown)");
        Self {
            code,
            message: format!("Expression of definition node {} failed: {}", label, err.message),
            node: node.cloned(),
            source: Some(Box::new(err)),
        }
    }

    pub fn to_diagnostic(&self) -> Diagnostic {
        Diagnostic {
            severity: Severity::Error,
            code: self.code.clone(),
            message: self.message.clone(),
            node: self.node.clone(),
        }
    }
}

/// Failure raised by an expression evaluator.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("[{code}] {message}")]
pub struct EvaluationError {
    pub code: CompactString,
    pub message: String,
}

impl EvaluationError {
    pub fn new(code: &str, message: impl Into<String>) -> Self {
        Self {
            code: CompactString::from(code),
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
}

/// A reported finding that does not by itself abort anything.
#[derive(Debug, Clone, Serialize)]
pub struct Diagnostic {
    pub severity: Severity,
    pub code: ErrorCode,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub node: Option<DefinitionKey>,
}

impl Diagnostic {
    pub fn error(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Error,
            code,
            message: message.into(),
            node: None,
        }
    }

    pub fn warning(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Warning,
            code,
            message: message.into(),
            node: None,
        }
    }

    pub fn on(mut self, node: &DefinitionKey) -> Self {
        self.node = Some(node.clone());
        self
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.node {
            Some(node) => write!(f, "{} ({}): {}", self.code, node, self.message),
            None => write!(f, "{}: {}", self.code, self.message),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_internal_error_keeps_cause() {
        let key = DefinitionKey::from("rule1");
        let err = ResolutionError::internal(Some(&key), EvaluationError::new("err:XPTY0004", "bad cast"));
        assert_eq!(err.code, ErrorCode::ResolutionException);
        assert_eq!(err.node.as_ref(), Some(&key));
        assert!(err.message.contains("rule1"));
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn test_code_rendering() {
        assert_eq!(
            ErrorCode::ClosedDefinitionNodeZeroCardinality.to_string(),
            "xbrlte:closedDefinitionNodeZeroCardinality"
        );
        assert_eq!(ErrorCode::Evaluation("err:XPST0008".into()).as_str(), "err:XPST0008");
    }

    #[test]
    fn test_at_keeps_innermost_node() {
        let inner = DefinitionKey::from("inner");
        let outer = DefinitionKey::from("outer");
        let err = ResolutionError::new(ErrorCode::AmbiguousConceptNetwork, "two networks")
            .at(&inner)
            .at(&outer);
        assert_eq!(err.node, Some(inner));
    }
}
