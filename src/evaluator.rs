// Expression evaluation with scoped variable bindings
use crate::error::EvaluationError;
use crate::model::{QName, Value};
use ahash::AHashMap;
use serde::{Deserialize, Serialize};

pub const UNDEFINED_VARIABLE: &str = "err:XPST0008";
pub const TYPE_ERROR: &str = "err:XPTY0004";

/// Expressions carried by definition nodes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Expr {
    Literal(Value),
    Variable(QName),
    Sequence(Vec<Expr>),
}

impl Expr {
    pub fn qname(name: &str) -> Self {
        Expr::Literal(Value::qname(name))
    }

    pub fn string(s: &str) -> Self {
        Expr::Literal(Value::string(s))
    }

    pub fn integer(i: i64) -> Self {
        Expr::Literal(Value::Integer(i))
    }

    pub fn var(name: &str) -> Self {
        Expr::Variable(QName::new(name))
    }

    /// True if the expression references no variables.
    pub fn is_static(&self) -> bool {
        match self {
            Expr::Literal(_) => true,
            Expr::Variable(_) => false,
            Expr::Sequence(items) => items.iter().all(Expr::is_static),
        }
    }

    pub fn variable_refs(&self, refs: &mut Vec<QName>) {
        match self {
            Expr::Literal(_) => {}
            Expr::Variable(name) => refs.push(name.clone()),
            Expr::Sequence(items) => items.iter().for_each(|e| e.variable_refs(refs)),
        }
    }
}

/// In-scope variables. Binding a name again shadows the earlier value until
/// it is unbound.
#[derive(Debug, Clone, Default)]
pub struct EvaluationContext {
    scopes: AHashMap<QName, Vec<Value>>,
}

impl EvaluationContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bind(&mut self, name: QName, value: Value) {
        self.scopes.entry(name).or_default().push(value);
    }

    pub fn unbind(&mut self, name: &QName) -> Option<Value> {
        let stack = self.scopes.get_mut(name)?;
        let value = stack.pop();
        if stack.is_empty() {
            self.scopes.remove(name);
        }
        value
    }

    pub fn lookup(&self, name: &QName) -> Option<&Value> {
        self.scopes.get(name).and_then(|stack| stack.last())
    }

    pub fn is_bound(&self, name: &QName) -> bool {
        self.scopes.contains_key(name)
    }

    /// Runs `f` with `bindings` in scope, unbinding them afterwards.
    pub fn with_bindings<T>(
        &mut self,
        bindings: &[(QName, Value)],
        f: impl FnOnce(&mut Self) -> T,
    ) -> T {
        for (name, value) in bindings {
            self.bind(name.clone(), value.clone());
        }
        let result = f(self);
        for (name, _) in bindings.iter().rev() {
            self.unbind(name);
        }
        result
    }
}

pub trait ExpressionEvaluator: Send + Sync {
    fn evaluate(&self, ctx: &EvaluationContext, expr: &Expr) -> Result<Value, EvaluationError>;

    fn evaluate_qname(&self, ctx: &EvaluationContext, expr: &Expr) -> Result<QName, EvaluationError> {
        let value = self.evaluate(ctx, expr)?;
        value
            .as_qname()
            .cloned()
            .ok_or_else(|| EvaluationError::new(TYPE_ERROR, format!("{} is not castable to xs:QName", value)))
    }

    fn evaluate_qnames(&self, ctx: &EvaluationContext, expr: &Expr) -> Result<Vec<QName>, EvaluationError> {
        self.evaluate(ctx, expr)?
            .into_items()
            .into_iter()
            .map(|item| match item {
                Value::QName(qname) => Ok(qname),
                other => Err(EvaluationError::new(
                    TYPE_ERROR,
                    format!("{} is not castable to xs:QName", other),
                )),
            })
            .collect()
    }

    fn evaluate_string(&self, ctx: &EvaluationContext, expr: &Expr) -> Result<String, EvaluationError> {
        let value = self.evaluate(ctx, expr)?;
        value
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| EvaluationError::new(TYPE_ERROR, format!("{} is not castable to xs:string", value)))
    }

    fn evaluate_integer(&self, ctx: &EvaluationContext, expr: &Expr) -> Result<i64, EvaluationError> {
        let value = self.evaluate(ctx, expr)?;
        value
            .as_integer()
            .ok_or_else(|| EvaluationError::new(TYPE_ERROR, format!("{} is not castable to xs:integer", value)))
    }
}

/// Evaluates literals, variable references and sequences.
#[derive(Debug, Default, Clone, Copy)]
pub struct ScopedEvaluator;

impl ExpressionEvaluator for ScopedEvaluator {
    fn evaluate(&self, ctx: &EvaluationContext, expr: &Expr) -> Result<Value, EvaluationError> {
        match expr {
            Expr::Literal(value) => Ok(value.clone()),
            Expr::Variable(name) => ctx
                .lookup(name)
                .cloned()
                .ok_or_else(|| EvaluationError::new(UNDEFINED_VARIABLE, format!("Variable ${} is not in scope", name))),
            Expr::Sequence(items) => {
                let mut values = Vec::with_capacity(items.len());
                for item in items {
                    values.extend(self.evaluate(ctx, item)?.into_items());
                }
                Ok(Value::Sequence(values))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scoped_binding_shadows() {
        let mut ctx = EvaluationContext::new();
        let name = QName::new("tbl:p");
        ctx.bind(name.clone(), Value::Integer(1));
        ctx.with_bindings(&[(name.clone(), Value::Integer(2))], |ctx| {
            assert_eq!(ScopedEvaluator.evaluate_integer(ctx, &Expr::Variable(name.clone())), Ok(2));
        });
        assert_eq!(ctx.lookup(&name), Some(&Value::Integer(1)));
        ctx.unbind(&name);
        assert!(!ctx.is_bound(&name));
    }

    #[test]
    fn test_undefined_variable_code() {
        let err = ScopedEvaluator
            .evaluate(&EvaluationContext::new(), &Expr::var("v:missing"))
            .unwrap_err();
        assert_eq!(err.code, UNDEFINED_VARIABLE);
    }

    #[test]
    fn test_sequence_flattens_and_casts() {
        let mut ctx = EvaluationContext::new();
        ctx.bind(
            QName::new("v:members"),
            Value::Sequence(vec![Value::qname("m:a"), Value::qname("m:b")]),
        );
        let expr = Expr::Sequence(vec![Expr::var("v:members"), Expr::qname("m:c")]);
        let names = ScopedEvaluator.evaluate_qnames(&ctx, &expr).unwrap();
        assert_eq!(names.len(), 3);
        assert!(!expr.is_static());

        let err = ScopedEvaluator.evaluate_qname(&ctx, &Expr::integer(3)).unwrap_err();
        assert_eq!(err.code, TYPE_ERROR);
    }
}
