use serde::{Deserialize, Serialize};

use super::{Bounds, Link, TableId, VariableId};
use crate::expr::EvalError;
use crate::interval::ValueRange;

/// Where a variable is visible.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VariableScope {
    Global,
    Table(TableId),
}

/// The declared domain of a variable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum VariableDomain {
    /// Any non-negative value.
    Unconstrained,
    /// One of a set of names; not usable in arithmetic.
    Symbols(Vec<String>),
    /// A numeric range; `lo == hi` for a fixed value.
    Bounds(Bounds),
}

/// Outcome of evaluating a variable's domain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum VariableState {
    Pending,
    Resolved(ValueRange),
    Symbolic,
    /// Part of a substitution cycle.
    Cyclic,
    /// Depends on a missing, cyclic or invalid variable.
    Unresolved,
}

/// A named parameter of the pattern.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Variable {
    pub name: String,
    pub scope: VariableScope,
    pub domain: VariableDomain,
    pub doc: Option<String>,
    pub state: VariableState,
}

impl Variable {
    pub fn new(name: impl Into<String>, scope: VariableScope, domain: VariableDomain) -> Self {
        Self {
            name: name.into(),
            scope,
            domain,
            doc: None,
            state: VariableState::Pending,
        }
    }

    pub fn range(&self) -> Option<ValueRange> {
        match self.state {
            VariableState::Resolved(r) => Some(r),
            _ => None,
        }
    }
}

/// Range of a referenced variable, for expression evaluation.
pub fn lookup_range(variables: &[Variable], link: &Link<VariableId>) -> Result<ValueRange, EvalError> {
    let Some(id) = link.id() else {
        return Err(EvalError::Unresolved(link.name.clone()));
    };
    match variables.get(id.index()).map(|v| &v.state) {
        Some(VariableState::Resolved(range)) => Ok(*range),
        Some(VariableState::Cyclic) => Err(EvalError::Cyclic(link.name.clone())),
        Some(VariableState::Symbolic) => Err(EvalError::Symbolic(link.name.clone())),
        _ => Err(EvalError::Unresolved(link.name.clone())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_reports_state() {
        let mut ports = Variable::new("ports", VariableScope::Global, VariableDomain::Unconstrained);
        ports.state = VariableState::Resolved(ValueRange::bounded(1, 48));
        let mut loop_var = Variable::new("x", VariableScope::Global, VariableDomain::Unconstrained);
        loop_var.state = VariableState::Cyclic;
        let vars = vec![ports, loop_var];

        let ok = lookup_range(&vars, &Link::resolved("ports", VariableId(0)));
        assert_eq!(ok, Ok(ValueRange::bounded(1, 48)));
        let cyclic = lookup_range(&vars, &Link::resolved("x", VariableId(1)));
        assert_eq!(cyclic, Err(EvalError::Cyclic("x".into())));
        let missing = lookup_range(&vars, &Link::new("nope"));
        assert_eq!(missing, Err(EvalError::Unresolved("nope".into())));
    }
}
