//! Short-circuit node reduction.
//!
//! Zero-ohm resistors make two nodes electrically identical. Before a netlist
//! goes to the solver, every group of nodes joined by such resistors is
//! collapsed onto one canonical name: `0` when the group touches ground,
//! otherwise a fresh `sn{k}`. The shorting resistors themselves are dropped
//! and every device and probe referring to a member is rewritten.

use std::collections::HashMap;

use tracing::{debug, warn};

use crate::ir::{Directive, NodeId};
use crate::naming::GROUND;
use crate::parser::{parse_line, Line};

/// Disjoint-set forest over node names.
#[derive(Debug, Default, Clone)]
struct ShortGraph {
    index: HashMap<NodeId, usize>,
    names: Vec<NodeId>,
    parent: Vec<usize>,
    rank: Vec<u8>,
}

impl ShortGraph {
    fn add_node(&mut self, name: &str) -> usize {
        if let Some(&i) = self.index.get(name) {
            return i;
        }
        let i = self.names.len();
        self.index.insert(name.to_string(), i);
        self.names.push(name.to_string());
        self.parent.push(i);
        self.rank.push(0);
        i
    }

    fn find(&mut self, mut i: usize) -> usize {
        while self.parent[i] != i {
            self.parent[i] = self.parent[self.parent[i]];
            i = self.parent[i];
        }
        i
    }

    fn union(&mut self, a: &str, b: &str) {
        let ia = self.add_node(a);
        let ib = self.add_node(b);
        let (ra, rb) = (self.find(ia), self.find(ib));
        if ra == rb {
            return;
        }
        match self.rank[ra].cmp(&self.rank[rb]) {
            std::cmp::Ordering::Less => self.parent[ra] = rb,
            std::cmp::Ordering::Greater => self.parent[rb] = ra,
            std::cmp::Ordering::Equal => {
                self.parent[rb] = ra;
                self.rank[ra] += 1;
            }
        }
    }

    /// Canonical name for every member node.
    ///
    /// Components are numbered in the order their first node was added, so
    /// the same netlist always yields the same names.
    fn canonical_names(&mut self) -> HashMap<NodeId, NodeId> {
        let n = self.names.len();
        let roots: Vec<usize> = (0..n).map(|i| self.find(i)).collect();

        let mut grounded = vec![false; n];
        if let Some(&g) = self.index.get(GROUND) {
            grounded[roots[g]] = true;
        }

        let mut label: HashMap<usize, NodeId> = HashMap::new();
        let mut next = 1;
        for &r in &roots {
            label.entry(r).or_insert_with(|| {
                if grounded[r] {
                    GROUND.to_string()
                } else {
                    let name = format!("sn{}", next);
                    next += 1;
                    name
                }
            });
        }

        self.names
            .iter()
            .zip(&roots)
            .map(|(name, r)| (name.clone(), label[r].clone()))
            .collect()
    }
}

/// Counters from the last `process` call.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ReductionStats {
    /// Zero-ohm resistors removed.
    pub shorts: usize,
    /// Nodes that were renamed or kept as a canonical root.
    pub members: usize,
    /// Distinct canonical roots.
    pub groups: usize,
    /// Lines passed through because they did not parse.
    pub unparsed: usize,
}

/// Collapses zero-ohm node groups in a netlist.
#[derive(Debug, Default, Clone)]
pub struct NodeReducer {
    roots: HashMap<NodeId, NodeId>,
    stats: ReductionStats,
}

impl NodeReducer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rewrite `netlist` with every shorted group collapsed.
    ///
    /// Lines outside the directive grammar, and directives touching no
    /// shorted node, are emitted exactly as given. Blank lines are dropped.
    pub fn process(&mut self, netlist: &str) -> String {
        let mut graph = ShortGraph::default();
        let mut kept: Vec<(&str, Option<Directive>)> = Vec::new();
        let mut stats = ReductionStats::default();

        for raw in netlist.lines() {
            match parse_line(raw) {
                Ok(Line::Blank) => {}
                Ok(Line::Directive(Directive::Resistor { nodes, value, .. })) if value == 0.0 => {
                    graph.union(&nodes.0, &nodes.1);
                    stats.shorts += 1;
                }
                Ok(Line::Directive(d)) => kept.push((raw, Some(d))),
                Ok(Line::Other) => kept.push((raw, None)),
                Err(e) => {
                    warn!(error = %e, "passing unparsed line through");
                    stats.unparsed += 1;
                    kept.push((raw, None));
                }
            }
        }

        self.roots = graph.canonical_names();
        stats.members = self.roots.len();
        let mut distinct: Vec<&NodeId> = self.roots.values().collect();
        distinct.sort();
        distinct.dedup();
        stats.groups = distinct.len();

        let mut out = String::with_capacity(netlist.len());
        for (raw, directive) in kept {
            match directive.and_then(|d| self.rewrite(d)) {
                Some(Rewritten::Line(d)) => {
                    out.push_str(&d.to_string());
                    out.push('\n');
                }
                Some(Rewritten::Removed) => {}
                None => {
                    out.push_str(raw.trim_start());
                    out.push('\n');
                }
            }
        }

        debug!(
            shorts = stats.shorts,
            members = stats.members,
            groups = stats.groups,
            "netlist reduced"
        );
        self.stats = stats;
        out
    }

    /// Canonical root of a node eliminated by the last `process` call, or
    /// `None` if the node was never shorted.
    pub fn find_root(&self, node: &str) -> Option<&str> {
        self.roots.get(node).map(String::as_str)
    }

    pub fn stats(&self) -> ReductionStats {
        self.stats
    }

    /// `None` when the directive references no member node.
    fn rewrite(&self, mut d: Directive) -> Option<Rewritten> {
        if let Directive::Probe { nodes } = &mut d {
            if !nodes.iter().any(|n| self.roots.contains_key(n)) {
                return None;
            }
            for n in nodes.iter_mut() {
                self.substitute(n);
            }
            nodes.retain(|n| n != GROUND);
            return Some(if nodes.is_empty() {
                Rewritten::Removed
            } else {
                Rewritten::Line(d)
            });
        }

        let (a, b) = d.terminals_mut()?;
        if !self.roots.contains_key(a.as_str()) && !self.roots.contains_key(b.as_str()) {
            return None;
        }
        self.substitute(a);
        self.substitute(b);
        Some(Rewritten::Line(d))
    }

    fn substitute(&self, node: &mut NodeId) {
        if let Some(root) = self.roots.get(node.as_str()) {
            node.clone_from(root);
        }
    }
}

enum Rewritten {
    Line(Directive),
    Removed,
}
