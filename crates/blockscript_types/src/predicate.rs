// Predicates and actions - Block parameters evaluated against the variable store
//
// Condition and Loop blocks test a predicate over a named variable. Generic
// blocks may carry an action that updates one variable.

use std::fmt;
use std::str::FromStr;

use super::error::ActionError;
use super::value::{Value, VariableStore};

// ─────────────────────────────────────────────────────────────────────────────
// Comparison
// ─────────────────────────────────────────────────────────────────────────────

/// Integer comparison operator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Comparison {
    GreaterThan,
    GreaterOrEqual,
    LessThan,
    LessOrEqual,
    Equal,
    NotEqual,
}

impl Comparison {
    pub fn symbol(&self) -> &'static str {
        match self {
            Comparison::GreaterThan => ">",
            Comparison::GreaterOrEqual => ">=",
            Comparison::LessThan => "<",
            Comparison::LessOrEqual => "<=",
            Comparison::Equal => "==",
            Comparison::NotEqual => "!=",
        }
    }

    /// Apply the operator to two integers
    pub fn holds(&self, lhs: i64, rhs: i64) -> bool {
        match self {
            Comparison::GreaterThan => lhs > rhs,
            Comparison::GreaterOrEqual => lhs >= rhs,
            Comparison::LessThan => lhs < rhs,
            Comparison::LessOrEqual => lhs <= rhs,
            Comparison::Equal => lhs == rhs,
            Comparison::NotEqual => lhs != rhs,
        }
    }
}

impl fmt::Display for Comparison {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

impl FromStr for Comparison {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            ">" => Ok(Comparison::GreaterThan),
            ">=" => Ok(Comparison::GreaterOrEqual),
            "<" => Ok(Comparison::LessThan),
            "<=" => Ok(Comparison::LessOrEqual),
            "==" => Ok(Comparison::Equal),
            "!=" => Ok(Comparison::NotEqual),
            other => Err(format!("unknown comparison operator '{}'", other)),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Predicate
// ─────────────────────────────────────────────────────────────────────────────

/// Test of a named integer variable against a threshold
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Predicate {
    pub variable: String,
    pub comparison: Comparison,
    pub threshold: i64,
}

impl Predicate {
    pub fn new(variable: impl Into<String>, comparison: Comparison, threshold: i64) -> Self {
        Self {
            variable: variable.into(),
            comparison,
            threshold,
        }
    }

    /// `variable > threshold`
    pub fn greater_than(variable: impl Into<String>, threshold: i64) -> Self {
        Self::new(variable, Comparison::GreaterThan, threshold)
    }

    /// Evaluate against a store.
    ///
    /// Only an existing `Integer` can satisfy the predicate; absent, unset,
    /// text and boolean values always yield `false`.
    pub fn evaluate(&self, store: &VariableStore) -> bool {
        store
            .get(&self.variable)
            .and_then(Value::as_integer)
            .is_some_and(|n| self.comparison.holds(n, self.threshold))
    }
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.variable, self.comparison, self.threshold)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Action
// ─────────────────────────────────────────────────────────────────────────────

/// Effect carried by a generic block
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Action {
    /// Add `delta` to an existing integer variable (negative to decrement)
    Add { variable: String, delta: i64 },
    /// Overwrite a variable
    Assign { variable: String, value: Value },
}

impl Action {
    pub fn add(variable: impl Into<String>, delta: i64) -> Self {
        Action::Add {
            variable: variable.into(),
            delta,
        }
    }

    pub fn assign(variable: impl Into<String>, value: Value) -> Self {
        Action::Assign {
            variable: variable.into(),
            value,
        }
    }

    /// Name of the variable this action writes
    pub fn variable(&self) -> &str {
        match self {
            Action::Add { variable, .. } | Action::Assign { variable, .. } => variable,
        }
    }

    /// Apply the action and return the value written
    pub fn apply(&self, store: &mut VariableStore) -> Result<Value, ActionError> {
        match self {
            Action::Add { variable, delta } => {
                let current = store.lookup(variable);
                let n = current.as_integer().ok_or_else(|| ActionError::NotAnInteger {
                    variable: variable.clone(),
                    found: current.clone(),
                })?;
                let next = n
                    .checked_add(*delta)
                    .map(Value::Integer)
                    .ok_or_else(|| ActionError::IntegerOverflow {
                        variable: variable.clone(),
                    })?;
                store.set(variable.clone(), next.clone());
                Ok(next)
            }
            Action::Assign { variable, value } => {
                store.set(variable.clone(), value.clone());
                Ok(value.clone())
            }
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::Add { variable, delta } => write!(f, "{} += {}", variable, delta),
            Action::Assign { variable, value } => write!(f, "{} = {}", variable, value),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_predicate_requires_integer() {
        let pred = Predicate::greater_than("x", 10);
        let mut store = VariableStore::new();
        assert!(!pred.evaluate(&store));

        store.set("x", Value::from("42"));
        assert!(!pred.evaluate(&store));

        store.set("x", Value::Unset);
        assert!(!pred.evaluate(&store));

        store.set("x", Value::from(42));
        assert!(pred.evaluate(&store));

        store.set("x", Value::from(10));
        assert!(!pred.evaluate(&store));
    }

    #[test]
    fn test_comparison_parsing() {
        for op in [">", ">=", "<", "<=", "==", "!="] {
            let cmp: Comparison = op.parse().unwrap();
            assert_eq!(cmp.symbol(), op);
        }
        assert!("=>".parse::<Comparison>().is_err());
        assert!(Comparison::LessOrEqual.holds(3, 3));
        assert!(!Comparison::NotEqual.holds(3, 3));
    }

    #[test]
    fn test_add_action() {
        let mut store: VariableStore = [("n", Value::from(3))].into_iter().collect();
        let written = Action::add("n", -1).apply(&mut store).unwrap();
        assert_eq!(written, Value::Integer(2));
        assert_eq!(store.lookup("n"), Value::Integer(2));
    }

    #[test]
    fn test_add_action_errors() {
        let mut store = VariableStore::new();
        let err = Action::add("n", 1).apply(&mut store).unwrap_err();
        assert!(matches!(err, ActionError::NotAnInteger { found: Value::Unset, .. }));
        assert_eq!(err.to_string(), "Variable 'n' is unset, expected an integer");

        store.set("n", Value::from(i64::MAX));
        let err = Action::add("n", 1).apply(&mut store).unwrap_err();
        assert!(matches!(err, ActionError::IntegerOverflow { .. }));
        assert_eq!(store.lookup("n"), Value::Integer(i64::MAX));
    }

    #[test]
    fn test_assign_action() {
        let mut store = VariableStore::new();
        Action::assign("flag", Value::from(true))
            .apply(&mut store)
            .unwrap();
        assert_eq!(store.get("flag"), Some(&Value::Boolean(true)));
        assert_eq!(Action::add("n", -1).to_string(), "n += -1");
    }
}
