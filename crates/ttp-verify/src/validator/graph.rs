//! Cycle detection over the goto-table graph.

use std::collections::{BTreeSet, HashMap, VecDeque};
use std::hash::Hash;

use ttp_core::{Finding, FindingCode, FindingSet, Location, PatternModel, TableId};

use super::show_path;

/// Every elementary cycle reachable from `roots`, each listed from the
/// member first reached by a depth-first walk from `roots`. Cycles that
/// share nodes are reported separately.
///
/// Johnson's circuit enumeration: for each node `s` in discovery order,
/// search the strongly connected component of `s` among nodes discovered
/// no earlier than `s`, blocking nodes that cannot currently reach `s`.
pub(crate) fn find_cycles<N, F>(roots: &[N], successors: F) -> Vec<Vec<N>>
where
    N: Copy + Ord + Hash,
    F: Fn(N) -> Vec<N>,
{
    let (nodes, adj) = discover(roots, &successors);
    let mut reverse = vec![Vec::new(); nodes.len()];
    for (v, next) in adj.iter().enumerate() {
        for &w in next {
            reverse[w].push(v);
        }
    }

    let mut circuits = Circuits {
        adj: &adj,
        component: vec![false; nodes.len()],
        blocked: vec![false; nodes.len()],
        blocked_by: vec![BTreeSet::new(); nodes.len()],
        stack: Vec::new(),
        found: Vec::new(),
    };
    for s in 0..nodes.len() {
        let forward = reach(s, &adj, s);
        let backward = reach(s, &reverse, s);
        for v in 0..nodes.len() {
            circuits.component[v] = forward[v] && backward[v];
            circuits.blocked[v] = false;
            circuits.blocked_by[v].clear();
        }
        circuits.circuit(s, s);
    }

    // Same cycle entered elsewhere is a rotation of one already kept.
    let mut seen = BTreeSet::new();
    let mut cycles = Vec::new();
    for cycle in circuits.found {
        let mut key: Vec<N> = cycle.iter().map(|&i| nodes[i]).collect();
        let named = key.clone();
        if let Some(min) = key.iter().enumerate().min_by_key(|(_, n)| **n).map(|(i, _)| i) {
            key.rotate_left(min);
        }
        if seen.insert(key) {
            cycles.push(named);
        }
    }
    cycles
}

/// Nodes in depth-first preorder from `roots`, and each node's successors
/// as positions in that order.
fn discover<N, F>(roots: &[N], successors: &F) -> (Vec<N>, Vec<Vec<usize>>)
where
    N: Copy + Ord + Hash,
    F: Fn(N) -> Vec<N>,
{
    let mut rank: HashMap<N, usize> = HashMap::new();
    let mut nodes = Vec::new();
    let mut edges: Vec<Vec<N>> = Vec::new();
    for &root in roots {
        let mut pending = vec![root];
        while let Some(node) = pending.pop() {
            if rank.contains_key(&node) {
                continue;
            }
            rank.insert(node, nodes.len());
            nodes.push(node);
            let next = successors(node);
            pending.extend(next.iter().rev().copied());
            edges.push(next);
        }
    }
    let adj = edges
        .iter()
        .map(|next| {
            let mut out: Vec<usize> = next.iter().filter_map(|n| rank.get(n).copied()).collect();
            out.sort_unstable();
            out.dedup();
            out
        })
        .collect();
    (nodes, adj)
}

/// Nodes reachable from `start` through nodes ranked `floor` or later.
fn reach(start: usize, adj: &[Vec<usize>], floor: usize) -> Vec<bool> {
    let mut seen = vec![false; adj.len()];
    let mut queue = VecDeque::from([start]);
    seen[start] = true;
    while let Some(v) = queue.pop_front() {
        for &w in &adj[v] {
            if w >= floor && !seen[w] {
                seen[w] = true;
                queue.push_back(w);
            }
        }
    }
    seen
}

struct Circuits<'a> {
    adj: &'a [Vec<usize>],
    component: Vec<bool>,
    blocked: Vec<bool>,
    blocked_by: Vec<BTreeSet<usize>>,
    stack: Vec<usize>,
    found: Vec<Vec<usize>>,
}

impl Circuits<'_> {
    fn circuit(&mut self, v: usize, s: usize) -> bool {
        let mut closed = false;
        self.stack.push(v);
        self.blocked[v] = true;
        let adj = self.adj;
        for &w in &adj[v] {
            if !self.component[w] {
                continue;
            }
            if w == s {
                self.found.push(self.stack.clone());
                closed = true;
            } else if !self.blocked[w] && self.circuit(w, s) {
                closed = true;
            }
        }
        if closed {
            self.unblock(v);
        } else {
            for &w in &adj[v] {
                if self.component[w] {
                    self.blocked_by[w].insert(v);
                }
            }
        }
        self.stack.pop();
        closed
    }

    fn unblock(&mut self, v: usize) {
        self.blocked[v] = false;
        let waiting = std::mem::take(&mut self.blocked_by[v]);
        for w in waiting {
            if self.blocked[w] {
                self.unblock(w);
            }
        }
    }
}

/// Report each goto cycle once, with its full path.
pub(crate) fn check_cycles(model: &PatternModel, out: &mut FindingSet) {
    let order = model.tables_by_index();
    let successors = |id: TableId| model.table(id).map(|t| t.successors()).unwrap_or_default();
    for cycle in find_cycles(&order, successors) {
        let mut path: Vec<String> = cycle
            .iter()
            .filter_map(|&id| model.table(id).map(|t| t.name.clone()))
            .collect();
        let Some(first) = path.first().cloned() else {
            continue;
        };
        path.push(first.clone());
        out.push(
            Finding::error(
                FindingCode::TableCycle,
                Location::section("tables").child(&first),
                format!("tables form a goto cycle: {}", show_path(&path)),
            )
            .with_cycle(path),
        );
    }
}
