//! Reference resolver.
//!
//! Binds every pending [`Link`] in a loaded model to an arena id and
//! evaluates every numeric expression. Resolution never stops at the
//! first miss: each problem becomes a finding and the link is marked
//! [`Resolution::Unresolved`].
//!
//! Order matters: extensions and variables first, since anything may
//! refer to them, then fields, then tables and groups, then security.
//! Only pending links and values are visited, so running the resolver
//! over an already resolved model changes nothing and reports nothing.

use std::collections::BTreeMap;

use tracing::{debug, info};
use ttp_core::{
    lookup_range, ActionKind, ActionSpec, Bounds, EvalError, ExtensionId, ExtensionKind, Expr,
    FieldId, FieldOrigin, Finding, FindingCode, GroupId, InstructionKind, Link, Location,
    MissBehavior, NextTable, PatternModel, Resolution, SecurityScope, TableId, ValueExpr,
    ValueRange, Variable, VariableDomain, VariableId, VariableScope, VariableState,
};

use crate::suggest::did_you_mean;

/// Name → id tables built before any link is bound.
#[derive(Default)]
struct Scope {
    tables: BTreeMap<String, TableId>,
    fields: BTreeMap<String, FieldId>,
    groups: BTreeMap<String, GroupId>,
    globals: BTreeMap<String, VariableId>,
    locals: BTreeMap<(TableId, String), VariableId>,
    extensions: BTreeMap<String, ExtensionId>,
    extensions_by_id: BTreeMap<String, Vec<ExtensionId>>,
    extension_kinds: Vec<ExtensionKind>,
    table_names: Vec<String>,
}

enum ExtensionMiss {
    Missing,
    Ambiguous(Vec<String>),
}

impl Scope {
    fn variable(&self, table: Option<TableId>, name: &str) -> Option<VariableId> {
        table
            .and_then(|t| self.locals.get(&(t, name.to_string())).copied())
            .or_else(|| self.globals.get(name).copied())
    }

    fn variable_names(&self, table: Option<TableId>) -> Vec<&str> {
        let mut names: Vec<&str> = self.globals.keys().map(String::as_str).collect();
        if let Some(t) = table {
            names.extend(
                self.locals
                    .keys()
                    .filter(|(owner, _)| *owner == t)
                    .map(|(_, n)| n.as_str()),
            );
        }
        names
    }

    fn extension(&self, name: &str) -> Result<ExtensionId, ExtensionMiss> {
        if name.contains(':') {
            return self
                .extensions
                .get(name)
                .copied()
                .ok_or(ExtensionMiss::Missing);
        }
        match self.extensions_by_id.get(name).map(Vec::as_slice) {
            Some([only]) => Ok(*only),
            Some(many) if many.len() > 1 => {
                let names = self
                    .extensions
                    .iter()
                    .filter(|(_, id)| many.contains(id))
                    .map(|(n, _)| n.clone())
                    .collect();
                Err(ExtensionMiss::Ambiguous(names))
            }
            _ => Err(ExtensionMiss::Missing),
        }
    }
}

/// Bind `link` through `map`, reporting a miss at `loc`.
fn bind<I: Copy>(
    map: &BTreeMap<String, I>,
    link: &mut Link<I>,
    what: &str,
    loc: &Location,
    findings: &mut Vec<Finding>,
) {
    if !link.is_pending() {
        return;
    }
    match map.get(&link.name) {
        Some(id) => link.target = Resolution::Resolved(*id),
        None => {
            link.target = Resolution::Unresolved;
            let mut finding = Finding::error(
                FindingCode::UnresolvedReference,
                loc.clone(),
                format!("unknown {what} '{}'", link.name),
            );
            if let Some(s) = did_you_mean(&link.name, map.keys().map(String::as_str)) {
                finding = finding.with_suggestion(s);
            }
            findings.push(finding);
        }
    }
}

/// Bind `link` without reporting; used where the same name is reported
/// from another position.
fn bind_quiet<I: Copy>(map: &BTreeMap<String, I>, link: &mut Link<I>) {
    if link.is_pending() {
        link.target = match map.get(&link.name) {
            Some(id) => Resolution::Resolved(*id),
            None => Resolution::Unresolved,
        };
    }
}

/// Message for an evaluation failure caused by a referenced variable,
/// or `None` when the failure is arithmetic or the reference itself was
/// already reported missing.
fn dependency_message(expr: &Expr, err: &EvalError) -> Option<String> {
    match err {
        EvalError::Cyclic(name) => Some(format!("depends on cyclic variable <{name}>")),
        EvalError::Symbolic(name) => Some(format!(
            "variable <{name}> has a symbolic domain and cannot be used as a number"
        )),
        EvalError::Unresolved(name) => {
            let missing = expr
                .variables()
                .iter()
                .any(|l| l.name == *name && l.target == Resolution::Unresolved);
            (!missing).then(|| format!("depends on unresolved variable <{name}>"))
        }
        _ => None,
    }
}

/// Two-phase reference resolver.
pub struct Resolver {
    scope: Scope,
    /// Variable states, frozen once variables are evaluated.
    variables: Vec<Variable>,
    findings: Vec<Finding>,
}

impl Resolver {
    /// Resolve every pending reference in `model` and return the findings
    /// in traversal order.
    pub fn resolve(model: &mut PatternModel) -> Vec<Finding> {
        debug!(already_resolved = model.resolved, "resolving references");
        let mut resolver = Resolver {
            scope: Scope::default(),
            variables: Vec::new(),
            findings: Vec::new(),
        };

        // 1. Name tables; duplicates are reported on the first run only
        resolver.build_scope(model, !model.resolved);

        // 2. Variables, with cycle detection
        resolver.resolve_variables(model);
        resolver.variables = model.variables.clone();

        // 3. Fields
        resolver.resolve_fields(model);

        // 4. Tables, then groups
        resolver.resolve_tables(model);
        resolver.resolve_groups(model);

        // 5. Security and vocabulary
        resolver.resolve_security(model);

        model.resolved = true;
        info!(findings = resolver.findings.len(), "references resolved");
        resolver.findings
    }

    fn duplicate(&mut self, report: bool, loc: Location, what: &str, name: &str) {
        if report {
            self.findings.push(
                Finding::error(
                    FindingCode::DuplicateIdentifier,
                    loc,
                    format!("duplicate {what} '{name}'; the first declaration is used"),
                )
                .with_suggestion(format!("rename or remove the second '{name}'")),
            );
        }
    }

    fn build_scope(&mut self, model: &PatternModel, report: bool) {
        self.scope.table_names = model.tables.iter().map(|t| t.name.clone()).collect();
        for (i, table) in model.tables.iter().enumerate() {
            self.scope
                .tables
                .entry(table.name.clone())
                .or_insert(TableId::from_index(i));
        }

        for (i, ext) in model.extensions.iter().enumerate() {
            let id = ExtensionId::from_index(i);
            self.scope.extension_kinds.push(ext.kind);
            let qualified = ext.qualified_name();
            if self.scope.extensions.contains_key(&qualified) {
                let loc = Location::section("extension_identifiers").child(&qualified);
                self.duplicate(report, loc, "extension identifier", &qualified);
                continue;
            }
            self.scope.extensions.insert(qualified, id);
            self.scope
                .extensions_by_id
                .entry(ext.id.clone())
                .or_default()
                .push(id);
        }

        for (i, var) in model.variables.iter().enumerate() {
            let id = VariableId::from_index(i);
            let taken = match var.scope {
                VariableScope::Global => {
                    let taken = self.scope.globals.contains_key(&var.name);
                    self.scope.globals.entry(var.name.clone()).or_insert(id);
                    taken
                }
                VariableScope::Table(t) => {
                    let key = (t, var.name.clone());
                    let taken = self.scope.locals.contains_key(&key);
                    self.scope.locals.entry(key).or_insert(id);
                    taken
                }
            };
            if taken {
                let loc = self.variable_location(var);
                self.duplicate(report, loc, "variable", &var.name);
            }
        }

        for (i, field) in model.fields.iter().enumerate() {
            if self.scope.fields.contains_key(&field.name) {
                let loc = Location::section("fields").child(&field.name);
                self.duplicate(report, loc, "field", &field.name);
                continue;
            }
            self.scope.fields.insert(field.name.clone(), FieldId::from_index(i));
        }

        for (i, group) in model.groups.iter().enumerate() {
            if self.scope.groups.contains_key(&group.name) {
                let loc = Location::section("groups").child(&group.name);
                self.duplicate(report, loc, "group", &group.name);
                continue;
            }
            self.scope.groups.insert(group.name.clone(), GroupId::from_index(i));
        }
    }

    fn variable_location(&self, var: &Variable) -> Location {
        match var.scope {
            VariableScope::Global => Location::section("variables").child(&var.name),
            VariableScope::Table(t) => {
                let table = self
                    .scope
                    .table_names
                    .get(t.index())
                    .map_or("?", String::as_str);
                Location::section("tables")
                    .child(table)
                    .child("variables")
                    .child(&var.name)
            }
        }
    }

    /// Bind the `<variable>` references inside an expression.
    fn link_variables(&mut self, expr: &mut Expr, table: Option<TableId>, loc: &Location) {
        let scope = &self.scope;
        let findings = &mut self.findings;
        expr.for_each_var_mut(&mut |link: &mut Link<VariableId>| {
            if !link.is_pending() {
                return;
            }
            match scope.variable(table, &link.name) {
                Some(id) => link.target = Resolution::Resolved(id),
                None => {
                    link.target = Resolution::Unresolved;
                    let mut finding = Finding::error(
                        FindingCode::UnresolvedReference,
                        loc.clone(),
                        format!("unknown variable <{}>", link.name),
                    );
                    if let Some(s) = did_you_mean(&link.name, scope.variable_names(table)) {
                        finding = finding.with_suggestion(s);
                    }
                    findings.push(finding);
                }
            }
        });
    }

    fn resolve_variables(&mut self, model: &mut PatternModel) {
        // Bind references inside variable domains
        for i in 0..model.variables.len() {
            let loc = self.variable_location(&model.variables[i]);
            let table = match model.variables[i].scope {
                VariableScope::Global => None,
                VariableScope::Table(t) => Some(t),
            };
            if let VariableDomain::Bounds(bounds) = &mut model.variables[i].domain {
                let same = bounds.lo == bounds.hi;
                self.link_variables(&mut bounds.lo.expr, table, &loc);
                if same {
                    bounds.hi = bounds.lo.clone();
                } else {
                    self.link_variables(&mut bounds.hi.expr, table, &loc);
                }
            }
        }

        // Evaluate in dependency order
        let mut stack = Vec::new();
        for i in 0..model.variables.len() {
            self.visit_variable(model, i, &mut stack);
        }
    }

    /// Depth-first evaluation. A variable met again while still on the
    /// stack closes a cycle; every member of that cycle becomes cyclic.
    fn visit_variable(&mut self, model: &mut PatternModel, i: usize, stack: &mut Vec<usize>) {
        if model.variables[i].state != VariableState::Pending {
            return;
        }
        if let Some(pos) = stack.iter().position(|&s| s == i) {
            let members = stack[pos..].to_vec();
            let mut path: Vec<String> = members
                .iter()
                .map(|&m| model.variables[m].name.clone())
                .collect();
            path.push(model.variables[i].name.clone());
            for &m in &members {
                let var = &mut model.variables[m];
                var.state = VariableState::Cyclic;
                if let VariableDomain::Bounds(b) = &mut var.domain {
                    b.lo.value = Resolution::Unresolved;
                    b.hi.value = Resolution::Unresolved;
                }
            }
            for &m in &members {
                let var = &model.variables[m];
                let loc = self.variable_location(var);
                let shown = path
                    .iter()
                    .map(|n| format!("<{n}>"))
                    .collect::<Vec<_>>()
                    .join(" -> ");
                self.findings.push(
                    Finding::error(
                        FindingCode::CyclicVariable,
                        loc,
                        format!("variable <{}> depends on itself: {shown}", var.name),
                    )
                    .with_cycle(path.clone()),
                );
            }
            return;
        }

        stack.push(i);
        let deps: Vec<usize> = match &model.variables[i].domain {
            VariableDomain::Bounds(b) => b
                .lo
                .expr
                .variables()
                .into_iter()
                .chain(b.hi.expr.variables())
                .filter_map(|l| l.id())
                .map(VariableId::index)
                .collect(),
            _ => Vec::new(),
        };
        for dep in deps {
            self.visit_variable(model, dep, stack);
        }
        stack.pop();

        if model.variables[i].state == VariableState::Cyclic {
            return;
        }
        let outcome = match &model.variables[i].domain {
            VariableDomain::Unconstrained => Ok(None),
            VariableDomain::Symbols(_) => Err(None),
            VariableDomain::Bounds(b) => {
                let vars = &model.variables;
                let lookup = |l: &Link<VariableId>| lookup_range(vars, l);
                match (b.lo.expr.eval(&lookup), b.hi.expr.eval(&lookup)) {
                    (Ok(lo), Ok(hi)) => Ok(Some((lo, hi))),
                    (Err(e), _) => Err(Some((e, b.lo.expr.clone()))),
                    (_, Err(e)) => Err(Some((e, b.hi.expr.clone()))),
                }
            }
        };
        let loc = self.variable_location(&model.variables[i]);
        let var = &mut model.variables[i];
        match outcome {
            Ok(None) => var.state = VariableState::Resolved(ValueRange::unbounded()),
            Ok(Some((lo, hi))) => {
                if let VariableDomain::Bounds(b) = &mut var.domain {
                    b.lo.value = Resolution::Resolved(lo);
                    b.hi.value = Resolution::Resolved(hi);
                }
                var.state = VariableState::Resolved(ValueRange { lo: lo.lo, hi: hi.hi });
            }
            Err(None) => var.state = VariableState::Symbolic,
            Err(Some((err, expr))) => {
                if let VariableDomain::Bounds(b) = &mut var.domain {
                    b.lo.value = Resolution::Unresolved;
                    b.hi.value = Resolution::Unresolved;
                }
                var.state = VariableState::Unresolved;
                if let Some(message) = dependency_message(&expr, &err) {
                    self.findings.push(Finding::error(
                        FindingCode::UnresolvedReference,
                        loc,
                        format!("variable <{}> {message}", var.name),
                    ));
                }
            }
        }
    }

    /// Bind and evaluate a numeric value.
    fn resolve_value(&mut self, value: &mut ValueExpr, table: Option<TableId>, loc: &Location) {
        if !value.value.is_pending() {
            return;
        }
        self.link_variables(&mut value.expr, table, loc);
        let vars = &self.variables;
        match value.expr.eval(&|l: &Link<VariableId>| lookup_range(vars, l)) {
            Ok(range) => value.value = Resolution::Resolved(range),
            Err(err) => {
                value.value = Resolution::Unresolved;
                if let Some(message) = dependency_message(&value.expr, &err) {
                    self.findings.push(Finding::error(
                        FindingCode::UnresolvedReference,
                        loc.clone(),
                        format!("'{}' {message}", value.text),
                    ));
                }
            }
        }
    }

    fn resolve_bounds(&mut self, bounds: &mut Bounds, table: Option<TableId>, loc: &Location) {
        let same = bounds.lo == bounds.hi;
        self.resolve_value(&mut bounds.lo, table, loc);
        if same {
            bounds.hi = bounds.lo.clone();
        } else {
            self.resolve_value(&mut bounds.hi, table, loc);
        }
    }

    fn resolve_extension(&mut self, link: &mut Link<ExtensionId>, expected: ExtensionKind, loc: &Location) {
        if !link.is_pending() {
            return;
        }
        match self.scope.extension(&link.name) {
            Ok(id) => {
                link.target = Resolution::Resolved(id);
                let declared = self.scope.extension_kinds[id.index()];
                if declared != expected {
                    self.findings.push(Finding::error(
                        FindingCode::ExtensionKindMismatch,
                        loc.clone(),
                        format!(
                            "extension '${}' is declared as {declared} but used as {expected}",
                            link.name
                        ),
                    ));
                }
            }
            Err(ExtensionMiss::Missing) => {
                link.target = Resolution::Unresolved;
                let mut finding = Finding::error(
                    FindingCode::UnresolvedReference,
                    loc.clone(),
                    format!("unknown extension identifier '${}'", link.name),
                );
                let names = self.scope.extensions.keys().map(String::as_str);
                if let Some(s) = did_you_mean(&link.name, names) {
                    finding = finding.with_suggestion(s);
                }
                self.findings.push(finding);
            }
            Err(ExtensionMiss::Ambiguous(candidates)) => {
                link.target = Resolution::Unresolved;
                self.findings.push(
                    Finding::error(
                        FindingCode::AmbiguousReference,
                        loc.clone(),
                        format!(
                            "'${}' matches several extension identifiers: {}",
                            link.name,
                            candidates.join(", ")
                        ),
                    )
                    .with_suggestion(format!("qualify the reference as '$namespace:{}'", link.name)),
                );
            }
        }
    }

    fn resolve_action(&mut self, action: &mut ActionSpec, table: Option<TableId>, loc: &Location) {
        if let ActionKind::Experimenter(link) = &mut action.kind {
            self.resolve_extension(link, ExtensionKind::Action, loc);
        }
        if let Some(field) = &mut action.field {
            bind(&self.scope.fields, field, "field", loc, &mut self.findings);
        }
        if let Some(group) = &mut action.group {
            bind(&self.scope.groups, group, "group", loc, &mut self.findings);
        }
        if let Some(value) = &mut action.value {
            self.resolve_value(value, table, loc);
        }
    }

    fn resolve_fields(&mut self, model: &mut PatternModel) {
        for field in &mut model.fields {
            let loc = Location::section("fields").child(&field.name);
            if let FieldOrigin::Extension(link) = &mut field.origin {
                self.resolve_extension(link, ExtensionKind::Field, &loc.child("extension"));
            }
            self.resolve_value(&mut field.width, None, &loc.child("width"));
            if let Some(domain) = &mut field.domain {
                self.resolve_bounds(domain, None, &loc.child("domain"));
            }
            if let Some(pre) = &mut field.prerequisite {
                let ploc = loc.child("prerequisite");
                bind(&self.scope.fields, &mut pre.field, "field", &ploc, &mut self.findings);
                for value in &mut pre.values {
                    self.resolve_value(value, None, &ploc);
                }
            }
        }
    }

    fn resolve_tables(&mut self, model: &mut PatternModel) {
        for tid in model.tables_by_index() {
            let table = &mut model.tables[tid.index()];
            let tloc = Location::section("tables").child(&table.name);
            let scope_table = Some(tid);

            for cap in &mut table.capabilities {
                let cloc = tloc.child("fields").child(&cap.field.name);
                bind(&self.scope.fields, &mut cap.field, "field", &cloc, &mut self.findings);
                if let Some(domain) = &mut cap.domain {
                    self.resolve_bounds(domain, scope_table, &cloc.child("domain"));
                }
            }

            for link in &mut table.groups {
                let gloc = tloc.child("groups").child(&link.name);
                bind(&self.scope.groups, link, "group", &gloc, &mut self.findings);
            }

            for spec in &mut table.instructions {
                let iloc = tloc.child("instructions").child(&spec.kind);
                if let InstructionKind::Experimenter(link) = &mut spec.kind {
                    self.resolve_extension(link, ExtensionKind::Instruction, &iloc);
                }
                if let Some(actions) = &mut spec.actions {
                    for (i, action) in actions.iter_mut().enumerate() {
                        self.resolve_action(action, scope_table, &iloc.child("actions").child(i));
                    }
                }
                if let Some(mask) = &mut spec.mask {
                    self.resolve_value(mask, scope_table, &iloc.child("mask"));
                }
                // Reported through next_tables, where these names are merged.
                for link in &mut spec.tables {
                    bind_quiet(&self.scope.tables, link);
                }
            }

            for next in &mut table.next_tables {
                if let NextTable::Table(link) = next {
                    let nloc = tloc.child("next_tables").child(&link.name);
                    bind(&self.scope.tables, link, "table", &nloc, &mut self.findings);
                }
            }

            if let Some(MissBehavior::Goto(link)) = &mut table.miss {
                let mloc = tloc.child("miss");
                bind(&self.scope.tables, link, "table", &mloc, &mut self.findings);
            }
        }
    }

    fn resolve_groups(&mut self, model: &mut PatternModel) {
        for group in &mut model.groups {
            let gloc = Location::section("groups").child(&group.name);
            for (b, bucket) in group.buckets.iter_mut().enumerate() {
                let bloc = gloc.child("buckets").child(b);
                for (i, action) in bucket.actions.iter_mut().enumerate() {
                    self.resolve_action(action, None, &bloc.child("actions").child(i));
                }
                if let Some(port) = &mut bucket.watch_port {
                    self.resolve_value(port, None, &bloc.child("watch_port"));
                }
                if let Some(link) = &mut bucket.watch_group {
                    bind(
                        &self.scope.groups,
                        link,
                        "group",
                        &bloc.child("watch_group"),
                        &mut self.findings,
                    );
                }
            }
        }
    }

    fn resolve_security(&mut self, model: &mut PatternModel) {
        for (r, rule) in model.security.rules.iter_mut().enumerate() {
            let rloc = Location::section("security").child("rules").child(r);
            if let SecurityScope::Table(link) = &mut rule.scope {
                bind(&self.scope.tables, link, "table", &rloc.child("scope"), &mut self.findings);
            }
            for (key, list) in [("permit", &mut rule.permit), ("forbid", &mut rule.forbid)] {
                for kind in list.iter_mut() {
                    if let InstructionKind::Experimenter(link) = kind {
                        self.resolve_extension(link, ExtensionKind::Instruction, &rloc.child(key));
                    }
                }
            }
            for link in &mut rule.read_only_fields {
                bind(
                    &self.scope.fields,
                    link,
                    "field",
                    &rloc.child("read_only_fields"),
                    &mut self.findings,
                );
            }
        }
        if let Some(vocabulary) = &mut model.action_vocabulary {
            for (i, kind) in vocabulary.iter_mut().enumerate() {
                if let ActionKind::Experimenter(link) = kind {
                    let loc = Location::section("action_vocabulary").child(i);
                    self.resolve_extension(link, ExtensionKind::Action, &loc);
                }
            }
        }
    }
}
