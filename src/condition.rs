//! Condition evaluation for `If` branches.
//!
//! Conditions and assignments are minijinja expressions evaluated against
//! the session variables plus the current-file values of the branch.

use lazy_static::lazy_static;
use log::{debug, warn};
use minijinja::Environment;
use regex::Regex;

use crate::error::Result;
use crate::session::Variables;
use crate::tree::{ActionTree, NodeId};

lazy_static! {
    static ref ASSIGNMENT_RE: Regex =
        Regex::new(r"^\s*([A-Za-z_][A-Za-z0-9_]*)\s*=\s*([^=].*)$").unwrap();
}

/// Splits `name = expression`. Comparisons such as `a == b` are rejected.
pub fn parse_assignment(assignment: &str) -> Option<(String, String)> {
    let caps = ASSIGNMENT_RE.captures(assignment)?;
    Some((caps[1].to_string(), caps[2].trim().to_string()))
}

/// Compiles and evaluates expressions.
#[derive(Debug)]
pub struct ConditionEvaluator {
    env: Environment<'static>,
}

impl ConditionEvaluator {
    pub fn new() -> Self {
        Self { env: Environment::new() }
    }

    pub fn eval_value(&self, expr: &str, context: &Variables) -> Result<minijinja::Value> {
        let expr = self.env.compile_expression(expr)?;
        Ok(expr.eval(context)?)
    }

    pub fn evaluate(&self, expr: &str, context: &Variables) -> Result<bool> {
        Ok(self.eval_value(expr, context)?.is_true())
    }

    /// Evaluates the effective condition list of `id` in order, stopping at
    /// the first one that does not hold. Assignments are bound into
    /// `context` as they are met.
    pub fn conditions_hold(&self, tree: &ActionTree, id: NodeId, context: &mut Variables) -> bool {
        for item in tree.effective_conditions(id) {
            if !item.assignment.trim().is_empty() {
                let assignment = tree.normalized(id, &item.assignment);
                let (name, expr) = match parse_assignment(&assignment) {
                    Some(parsed) => parsed,
                    None => {
                        warn!("{} {}: '{}' is not an assignment", tree.node(id).label(), id, assignment);
                        return false;
                    }
                };
                match self
                    .eval_value(&expr, context)
                    .and_then(|value| Ok(serde_json::to_value(value)?))
                {
                    Ok(value) => {
                        debug!("{} = {}", name, value);
                        context.insert(name, value);
                    }
                    Err(err) => {
                        warn!("{} {}: cannot evaluate '{}': {}", tree.node(id).label(), id, expr, err);
                        return false;
                    }
                }
            }

            let condition = tree.normalized(id, &item.condition);
            if condition.trim().is_empty() {
                continue;
            }
            match self.evaluate(&condition, context) {
                Ok(true) => {}
                Ok(false) => {
                    debug!("{} {}: '{}' does not hold", tree.node(id).label(), id, condition);
                    return false;
                }
                Err(err) => {
                    warn!("{} {}: cannot evaluate '{}': {}", tree.node(id).label(), id, condition, err);
                    return false;
                }
            }
        }
        true
    }
}

impl Default for ConditionEvaluator {
    fn default() -> Self {
        ConditionEvaluator::new()
    }
}
