//! Rule-compatibility graph: which rule can feed which across neighboring cells,
//! and how many self-sustaining loops that wiring contains.

use crate::cell::CellId;
use crate::rule::{NetRule, RulePair};
use petgraph::algo::tarjan_scc;
use petgraph::graph::{DiGraph, NodeIndex};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Minimum distinct cells and distinct rule pairs for a cycle to count as a
/// hypercycle.
pub const HYPERCYCLE_MIN_SPAN: usize = 3;

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CycleMetrics {
    /// Step the analysis was taken at.
    pub step: u64,
    pub node_count: usize,
    pub edge_count: usize,
    /// All simple cycles found (up to the budget).
    pub cycle_count: usize,
    /// Cycles spanning at least three distinct cells.
    pub plus3_cell_complexity: usize,
    /// Cycles spanning at least three distinct rule pairs.
    pub plus3_rule_complexity: usize,
    /// Cycles meeting both thresholds.
    pub hypercycle_count: usize,
    /// Length of the longest cycle found.
    pub largest_cycle: usize,
    /// Enumeration stopped at the budget; counts are lower bounds.
    pub truncated: bool,
}

/// Directed graph over per-cell NetRules. Rebuilt from scratch for each
/// analysis; holds no state the simulation depends on.
#[derive(Clone, Debug, Default)]
pub struct RuleCompatibilityGraph {
    graph: DiGraph<NetRule, ()>,
    index: BTreeMap<(CellId, RulePair), NodeIndex>,
    metrics: CycleMetrics,
}

impl RuleCompatibilityGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a node for `(owner, pair)` unless one exists.
    pub fn register(&mut self, netrule: &NetRule) -> NodeIndex {
        let key = (netrule.owner, netrule.pair);
        if let Some(&idx) = self.index.get(&key) {
            return idx;
        }
        let idx = self.graph.add_node(netrule.clone());
        self.index.insert(key, idx);
        idx
    }

    /// Link two NetRules in every direction where one's output is the other's
    /// input. Returns the number of new edges.
    pub fn add_edge(&mut self, a: &NetRule, b: &NetRule) -> usize {
        let ia = self.register(a);
        let ib = self.register(b);
        let mut added = 0;
        for (from, to) in [(ia, ib), (ib, ia)] {
            if self.graph[from].feeds(&self.graph[to]) && self.graph.find_edge(from, to).is_none()
            {
                self.graph.add_edge(from, to, ());
                added += 1;
            }
        }
        added
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    pub fn nodes(&self) -> impl Iterator<Item = &NetRule> {
        self.graph.raw_nodes().iter().map(|n| &n.weight)
    }

    /// `(from, to)` pairs of every compatibility edge.
    pub fn edges(&self) -> impl Iterator<Item = (&NetRule, &NetRule)> {
        self.graph
            .raw_edges()
            .iter()
            .map(|e| (&self.graph[e.source()], &self.graph[e.target()]))
    }

    /// Metrics from the most recent [`Self::recompute_cycles`].
    pub fn metrics(&self) -> &CycleMetrics {
        &self.metrics
    }

    /// Enumerate simple cycles (at most `budget`) and snapshot the complexity
    /// metrics against `current_step`.
    pub fn recompute_cycles(&mut self, current_step: u64, budget: usize) -> &CycleMetrics {
        let mut metrics = CycleMetrics {
            step: current_step,
            node_count: self.graph.node_count(),
            edge_count: self.graph.edge_count(),
            ..CycleMetrics::default()
        };
        let graph = &self.graph;
        let truncated = for_each_simple_cycle(graph, budget, |cycle| {
            let cells: BTreeSet<CellId> = cycle.iter().map(|&n| graph[n].owner).collect();
            let pairs: BTreeSet<RulePair> = cycle.iter().map(|&n| graph[n].pair).collect();
            let wide_cells = cells.len() >= HYPERCYCLE_MIN_SPAN;
            let wide_rules = pairs.len() >= HYPERCYCLE_MIN_SPAN;
            metrics.cycle_count += 1;
            metrics.plus3_cell_complexity += usize::from(wide_cells);
            metrics.plus3_rule_complexity += usize::from(wide_rules);
            metrics.hypercycle_count += usize::from(wide_cells && wide_rules);
            metrics.largest_cycle = metrics.largest_cycle.max(cycle.len());
        });
        metrics.truncated = truncated;
        self.metrics = metrics;
        &self.metrics
    }
}

/// Johnson's elementary-circuit enumeration. Calls `visit` with each simple
/// cycle (as a node sequence starting at its lowest index) until `budget`
/// cycles have been reported. Returns whether the budget cut the search short.
pub fn for_each_simple_cycle<N, E>(
    graph: &DiGraph<N, E>,
    budget: usize,
    mut visit: impl FnMut(&[NodeIndex]),
) -> bool {
    let n = graph.node_count();
    let mut component = vec![usize::MAX; n];
    for (cid, scc) in tarjan_scc(graph).into_iter().enumerate() {
        for node in scc {
            component[node.index()] = cid;
        }
    }

    let mut search = JohnsonSearch {
        adjacency: (0..n)
            .map(|v| {
                let mut out: Vec<usize> = graph
                    .neighbors(NodeIndex::new(v))
                    .map(|w| w.index())
                    .filter(|&w| component[w] == component[v])
                    .collect();
                out.sort_unstable();
                out.dedup();
                out
            })
            .collect(),
        blocked: vec![false; n],
        blocked_by: vec![BTreeSet::new(); n],
        stack: Vec::new(),
        start: 0,
        found: 0,
        budget,
    };

    for start in 0..n {
        if search.found >= budget {
            return true;
        }
        if search.adjacency[start].iter().all(|&w| w < start) {
            continue;
        }
        search.start = start;
        for v in start..n {
            search.blocked[v] = false;
            search.blocked_by[v].clear();
        }
        search.circuit(start, &mut visit);
    }
    search.found >= budget
}

struct JohnsonSearch {
    adjacency: Vec<Vec<usize>>,
    blocked: Vec<bool>,
    blocked_by: Vec<BTreeSet<usize>>,
    stack: Vec<usize>,
    start: usize,
    found: usize,
    budget: usize,
}

impl JohnsonSearch {
    fn circuit(&mut self, v: usize, visit: &mut impl FnMut(&[NodeIndex])) -> bool {
        let mut closed = false;
        self.stack.push(v);
        self.blocked[v] = true;
        for i in 0..self.adjacency[v].len() {
            if self.found >= self.budget {
                break;
            }
            let w = self.adjacency[v][i];
            if w < self.start {
                continue;
            }
            if w == self.start {
                let cycle: Vec<NodeIndex> = self.stack.iter().map(|&u| NodeIndex::new(u)).collect();
                visit(&cycle);
                self.found += 1;
                closed = true;
            } else if !self.blocked[w] && self.circuit(w, visit) {
                closed = true;
            }
        }
        if closed {
            self.unblock(v);
        } else {
            for i in 0..self.adjacency[v].len() {
                let w = self.adjacency[v][i];
                if w >= self.start {
                    self.blocked_by[w].insert(v);
                }
            }
        }
        self.stack.pop();
        closed
    }

    fn unblock(&mut self, u: usize) {
        let mut pending = vec![u];
        while let Some(node) = pending.pop() {
            if !self.blocked[node] {
                continue;
            }
            self.blocked[node] = false;
            pending.extend(std::mem::take(&mut self.blocked_by[node]));
        }
    }
}
