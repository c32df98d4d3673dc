//! Annotated-string evaluation. Action fields may embed `{...}` chunks:
//! a chunk naming a meta-variable is spliced verbatim (meta-variables hold
//! rolled, re-rollable dice strings); anything else is evaluated as a rhai
//! expression with the meta-variables in scope.

use std::collections::HashMap;
use std::fmt;

use rhai::{Dynamic, Engine, Scope};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EvalError {
    Expression { expression: String, message: String },
}

impl fmt::Display for EvalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EvalError::Expression {
                expression,
                message,
            } => write!(f, "Could not evaluate `{}`: {}", expression, message),
        }
    }
}

pub struct Evaluator {
    engine: Engine,
}

impl Evaluator {
    pub fn new() -> Self {
        let mut engine = Engine::new();
        engine.set_max_expr_depths(32, 32);
        Self { engine }
    }

    /// Substitutes every `{...}` chunk in `input`. Text outside braces
    /// passes through untouched; an unopened/unclosed brace is left as-is.
    pub fn parse(
        &self,
        input: &str,
        bindings: &HashMap<String, String>,
    ) -> Result<String, EvalError> {
        let mut out = String::with_capacity(input.len());
        let mut rest = input;
        while let Some(open) = rest.find('{') {
            out.push_str(&rest[..open]);
            let after = &rest[open + 1..];
            let Some(close) = after.find('}') else {
                out.push_str(&rest[open..]);
                return Ok(out);
            };
            let chunk = &after[..close];
            if let Some(value) = bindings.get(chunk) {
                out.push_str(value);
            } else {
                out.push_str(&self.eval(chunk, bindings)?);
            }
            rest = &after[close + 1..];
        }
        out.push_str(rest);
        Ok(out)
    }

    fn eval(
        &self,
        expression: &str,
        bindings: &HashMap<String, String>,
    ) -> Result<String, EvalError> {
        let mut scope = Scope::new();
        for (name, value) in bindings {
            match value.parse::<i64>() {
                Ok(n) => scope.push(name.as_str(), n),
                Err(_) => scope.push(name.as_str(), value.clone()),
            };
        }
        self.engine
            .eval_expression_with_scope::<Dynamic>(&mut scope, expression)
            .map(|result| result.to_string())
            .map_err(|e| EvalError::Expression {
                expression: expression.to_string(),
                message: e.to_string(),
            })
    }
}

impl Default for Evaluator {
    fn default() -> Self {
        Self::new()
    }
}
