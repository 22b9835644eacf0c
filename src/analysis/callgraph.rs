//! Inter-procedural call graph.
//!
//! The [`CallGraph`] maps each method to the set of methods it calls. Edges are added one
//! call site at a time (the dispatcher contributes an edge for every `call`/`callvirt` it
//! visits), with duplicate caller/callee pairs collapsing into a single edge. Once the main
//! pass is over the graph is only read.
//!
//! Cross-procedural rules query it through [`CallGraph::reachable`] and
//! [`CallGraph::find_path`], which share the same cycle protection and depth bound. The depth
//! bound is a precision/performance trade-off: a property that only holds further down a
//! call chain than `max_depth` is not found. Rules that depend on it inherit that limitation.
//!
//! # Examples
//!
//! ```rust
//! use dotlint::analysis::CallGraph;
//! use dotlint::metadata::Token;
//!
//! let (a, b, c) = (Token::new(0x0600_0001), Token::new(0x0600_0002), Token::new(0x0600_0003));
//! let mut graph = CallGraph::new();
//! graph.add_method(a, "N.T::A");
//! graph.add_method(b, "N.T::B");
//! graph.add_method(c, "N.T::C");
//! graph.add_call(a, b);
//! graph.add_call(b, a);
//! graph.add_call(b, c);
//!
//! assert!(graph.reachable(a, |node| node.token == c, 8));
//! assert!(!graph.reachable(c, |node| node.token == a, 8));
//! assert_eq!(graph.find_path(a, |node| node.token == c, 8), Some(vec![a, b, c]));
//! assert!(graph.calls(Token::new(0x0A00_0001)).is_empty());
//! ```

use std::{
    collections::{HashMap, HashSet, VecDeque},
    fmt::{self, Write},
};

use serde::Serialize;

use crate::{
    assembly::{decode_body, InstructionKind},
    metadata::{Assembly, Token},
};

/// Index of a node in a [`CallGraph`].
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(usize);

impl NodeId {
    /// The raw node index
    #[must_use]
    pub const fn index(self) -> usize {
        self.0
    }
}

impl fmt::Debug for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NodeId({})", self.0)
    }
}

/// A method in the call graph.
#[derive(Debug, Clone)]
pub struct CallGraphNode {
    /// Method token
    pub token: Token,
    /// `Namespace.Type::Method`, or the token text if no name is known
    pub name: String,
    callees: Vec<NodeId>,
    callers: Vec<NodeId>,
}

impl CallGraphNode {
    /// Returns `true` if the method calls nothing
    #[must_use]
    pub fn is_leaf(&self) -> bool {
        self.callees.is_empty()
    }
}

/// Aggregate metrics of a call graph.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CallGraphStats {
    /// Number of methods
    pub method_count: usize,
    /// Number of distinct caller/callee edges
    pub edge_count: usize,
    /// Methods nobody calls
    pub entry_points: usize,
    /// Methods that call nothing
    pub leaf_methods: usize,
    /// Methods on a call cycle, including direct self-recursion
    pub recursive_methods: usize,
}

/// Caller-to-callee graph over method tokens.
#[derive(Debug, Default)]
pub struct CallGraph {
    nodes: Vec<CallGraphNode>,
    token_to_node: HashMap<Token, NodeId>,
    edges: HashSet<(NodeId, NodeId)>,
}

impl CallGraph {
    /// Creates an empty call graph
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a call graph from every method body of `assembly`.
    ///
    /// Bodies that fail to decode are skipped with a warning; the dispatcher reports them
    /// as diagnostics during a normal analysis run.
    #[must_use]
    pub fn build(assembly: &Assembly) -> Self {
        let mut graph = CallGraph::new();
        for ty in &assembly.types {
            let type_name = ty.full_name();
            for method in &ty.methods {
                graph.add_method(method.token, &format!("{type_name}::{}", method.name));
                let Some(body) = &method.body else {
                    continue;
                };
                let decoded = match decode_body(body, assembly) {
                    Ok(decoded) => decoded,
                    Err(error) => {
                        log::warn!("skipping {type_name}::{}: {error}", method.name);
                        continue;
                    }
                };
                for instr in &decoded.instructions {
                    if let InstructionKind::Call(site) = &instr.kind {
                        graph.add_method(site.target.token, &site.target.full_name());
                        graph.add_call(method.token, site.target.token);
                    }
                }
            }
        }
        graph
    }

    /// Adds a method node, or names an existing unnamed one. Returns its id.
    pub fn add_method(&mut self, token: Token, name: &str) -> NodeId {
        let id = self.node_id(token);
        let node = &mut self.nodes[id.0];
        if node.name.is_empty() {
            node.name = name.to_string();
        }
        id
    }

    fn node_id(&mut self, token: Token) -> NodeId {
        if let Some(&id) = self.token_to_node.get(&token) {
            return id;
        }
        let id = NodeId(self.nodes.len());
        self.nodes.push(CallGraphNode {
            token,
            name: String::new(),
            callees: Vec::new(),
            callers: Vec::new(),
        });
        self.token_to_node.insert(token, id);
        id
    }

    /// Records that `caller` calls `callee`. Returns `false` if the edge already existed.
    pub fn add_call(&mut self, caller: Token, callee: Token) -> bool {
        let from = self.node_id(caller);
        let to = self.node_id(callee);
        if !self.edges.insert((from, to)) {
            return false;
        }
        self.nodes[from.0].callees.push(to);
        self.nodes[to.0].callers.push(from);
        true
    }

    /// Number of methods in the graph
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Returns `true` if the graph has no methods
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Number of distinct edges
    #[must_use]
    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    /// Returns `true` if `method` is part of the graph
    #[must_use]
    pub fn contains(&self, method: Token) -> bool {
        self.token_to_node.contains_key(&method)
    }

    /// The node for `method`
    #[must_use]
    pub fn node(&self, method: Token) -> Option<&CallGraphNode> {
        self.token_to_node.get(&method).map(|id| &self.nodes[id.0])
    }

    /// Finds a method node by full name
    #[must_use]
    pub fn find_by_name(&self, name: &str) -> Option<&CallGraphNode> {
        self.nodes.iter().find(|node| node.name == name)
    }

    /// All nodes in insertion order
    pub fn nodes(&self) -> impl Iterator<Item = &CallGraphNode> {
        self.nodes.iter()
    }

    /// Methods called by `method`, in first-call order; empty for unknown methods
    #[must_use]
    pub fn calls(&self, method: Token) -> Vec<Token> {
        self.node(method)
            .map(|node| node.callees.iter().map(|id| self.nodes[id.0].token).collect())
            .unwrap_or_default()
    }

    /// Methods calling `method`; empty for unknown methods
    #[must_use]
    pub fn callers(&self, method: Token) -> Vec<Token> {
        self.node(method)
            .map(|node| node.callers.iter().map(|id| self.nodes[id.0].token).collect())
            .unwrap_or_default()
    }

    /// Returns `true` if a method satisfying `predicate` is reachable from `from` within
    /// `max_depth` calls. `from` itself is at depth 0.
    ///
    /// The search is depth-first. A node is revisited only when reached at a smaller depth
    /// than before, so cycles terminate and the depth bound stays exact. Unknown methods
    /// reach nothing.
    pub fn reachable<P>(&self, from: Token, mut predicate: P, max_depth: usize) -> bool
    where
        P: FnMut(&CallGraphNode) -> bool,
    {
        let Some(&start) = self.token_to_node.get(&from) else {
            return false;
        };

        let mut best_depth: HashMap<NodeId, usize> = HashMap::new();
        let mut stack = vec![(start, 0usize)];
        while let Some((id, depth)) = stack.pop() {
            if best_depth.get(&id).is_some_and(|&seen| seen <= depth) {
                continue;
            }
            best_depth.insert(id, depth);

            let node = &self.nodes[id.0];
            if predicate(node) {
                return true;
            }
            if depth < max_depth {
                stack.extend(node.callees.iter().rev().map(|&callee| (callee, depth + 1)));
            }
        }
        false
    }

    /// Shortest call chain from `from` to a method satisfying `predicate`, within
    /// `max_depth` calls. The chain starts with `from` and ends with the match.
    pub fn find_path<P>(&self, from: Token, mut predicate: P, max_depth: usize) -> Option<Vec<Token>>
    where
        P: FnMut(&CallGraphNode) -> bool,
    {
        let start = *self.token_to_node.get(&from)?;

        let mut parent: HashMap<NodeId, Option<NodeId>> = HashMap::from([(start, None)]);
        let mut queue = VecDeque::from([(start, 0usize)]);
        while let Some((id, depth)) = queue.pop_front() {
            if predicate(&self.nodes[id.0]) {
                let mut path = vec![self.nodes[id.0].token];
                let mut current = id;
                while let Some(Some(previous)) = parent.get(&current) {
                    path.push(self.nodes[previous.0].token);
                    current = *previous;
                }
                path.reverse();
                return Some(path);
            }
            if depth >= max_depth {
                continue;
            }
            for &callee in &self.nodes[id.0].callees {
                if let std::collections::hash_map::Entry::Vacant(entry) = parent.entry(callee) {
                    entry.insert(Some(id));
                    queue.push_back((callee, depth + 1));
                }
            }
        }
        None
    }

    /// Methods that are part of a call cycle (Tarjan's SCC algorithm, iterative).
    #[must_use]
    pub fn recursive_methods(&self) -> Vec<Token> {
        struct Frame {
            node: usize,
            next_child: usize,
        }

        let count = self.nodes.len();
        let mut index = vec![usize::MAX; count];
        let mut lowlink = vec![0usize; count];
        let mut on_stack = vec![false; count];
        let mut scc_stack = Vec::new();
        let mut next_index = 0;
        let mut recursive = Vec::new();

        for root in 0..count {
            if index[root] != usize::MAX {
                continue;
            }
            let mut frames = vec![Frame {
                node: root,
                next_child: 0,
            }];
            index[root] = next_index;
            lowlink[root] = next_index;
            next_index += 1;
            scc_stack.push(root);
            on_stack[root] = true;

            while let Some(frame) = frames.last_mut() {
                let node = frame.node;
                if let Some(&NodeId(child)) = self.nodes[node].callees.get(frame.next_child) {
                    frame.next_child += 1;
                    if index[child] == usize::MAX {
                        index[child] = next_index;
                        lowlink[child] = next_index;
                        next_index += 1;
                        scc_stack.push(child);
                        on_stack[child] = true;
                        frames.push(Frame {
                            node: child,
                            next_child: 0,
                        });
                    } else if on_stack[child] {
                        lowlink[node] = lowlink[node].min(index[child]);
                    }
                    continue;
                }

                frames.pop();
                if let Some(parent) = frames.last() {
                    lowlink[parent.node] = lowlink[parent.node].min(lowlink[node]);
                }
                if lowlink[node] == index[node] {
                    let mut component = Vec::new();
                    while let Some(member) = scc_stack.pop() {
                        on_stack[member] = false;
                        component.push(member);
                        if member == node {
                            break;
                        }
                    }
                    let self_call = self.edges.contains(&(NodeId(node), NodeId(node)));
                    if component.len() > 1 || self_call {
                        recursive.extend(component.into_iter().map(|m| self.nodes[m].token));
                    }
                }
            }
        }

        recursive.sort();
        recursive
    }

    /// Aggregate metrics
    #[must_use]
    pub fn stats(&self) -> CallGraphStats {
        CallGraphStats {
            method_count: self.nodes.len(),
            edge_count: self.edges.len(),
            entry_points: self.nodes.iter().filter(|n| n.callers.is_empty()).count(),
            leaf_methods: self.nodes.iter().filter(|n| n.is_leaf()).count(),
            recursive_methods: self.recursive_methods().len(),
        }
    }

    /// Renders the graph in Graphviz DOT format
    #[must_use]
    pub fn to_dot(&self, title: Option<&str>) -> String {
        let mut dot = String::new();

        dot.push_str("digraph CallGraph {\n");
        let _ = writeln!(dot, "    label=\"{}\";", escape_dot(title.unwrap_or("Call Graph")));
        dot.push_str("    labelloc=t;\n");
        dot.push_str("    node [shape=box, fontname=\"Courier\", fontsize=10];\n");
        dot.push_str("    rankdir=TB;\n\n");

        let recursive: HashSet<Token> = self.recursive_methods().into_iter().collect();
        for node in &self.nodes {
            let style = if recursive.contains(&node.token) {
                ", style=filled, fillcolor=lightpink"
            } else if node.callers.is_empty() {
                ", style=filled, fillcolor=lightgreen"
            } else if node.is_leaf() {
                ", style=filled, fillcolor=lightblue"
            } else {
                ""
            };
            let label = if node.name.is_empty() {
                node.token.to_string()
            } else {
                escape_dot(&node.name)
            };
            let _ = writeln!(dot, "    \"{}\" [label=\"{label}\"{style}];", node.token);
        }

        dot.push('\n');
        for node in &self.nodes {
            for callee in &node.callees {
                let _ = writeln!(
                    dot,
                    "    \"{}\" -> \"{}\";",
                    node.token, self.nodes[callee.0].token
                );
            }
        }
        dot.push_str("}\n");
        dot
    }
}

fn escape_dot(s: &str) -> String {
    s.replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace('\n', "\\n")
        .replace('<', "\\<")
        .replace('>', "\\>")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t(row: u32) -> Token {
        Token::from_parts(Token::METHOD_DEF, row)
    }

    fn chain(len: u32) -> CallGraph {
        let mut graph = CallGraph::new();
        for row in 1..len {
            graph.add_call(t(row), t(row + 1));
        }
        graph
    }

    #[test]
    fn duplicate_edges_collapse() {
        let mut graph = CallGraph::new();
        assert!(graph.add_call(t(1), t(2)));
        assert!(!graph.add_call(t(1), t(2)));
        assert!(graph.add_call(t(1), t(3)));

        assert_eq!(graph.calls(t(1)), vec![t(2), t(3)]);
        assert_eq!(graph.callers(t(2)), vec![t(1)]);
        assert_eq!(graph.edge_count(), 2);
        assert_eq!(graph.len(), 3);
    }

    #[test]
    fn unknown_methods_are_empty() {
        let graph = chain(3);
        assert!(graph.calls(t(99)).is_empty());
        assert!(graph.callers(t(99)).is_empty());
        assert!(!graph.contains(t(99)));
        assert!(!graph.reachable(t(99), |_| true, 8));
        assert!(graph.find_path(t(99), |_| true, 8).is_none());
    }

    #[test]
    fn reachable_terminates_on_cycles() {
        let mut graph = CallGraph::new();
        graph.add_call(t(1), t(2));
        graph.add_call(t(2), t(1));
        graph.add_method(t(3), "N.T::Isolated");

        assert!(graph.reachable(t(1), |n| n.token == t(2), 8));
        assert!(graph.reachable(t(2), |n| n.token == t(1), 8));
        assert!(!graph.reachable(t(1), |n| n.token == t(3), 8));
        assert!(!graph.reachable(t(1), |n| n.token == t(3), usize::MAX));
    }

    #[test]
    fn depth_bound_is_exact() {
        // 1 -> 2 -> ... -> 10
        let graph = chain(10);
        assert!(graph.reachable(t(1), |n| n.token == t(1), 0));
        assert!(!graph.reachable(t(1), |n| n.token == t(2), 0));
        assert!(graph.reachable(t(1), |n| n.token == t(9), 8));
        assert!(!graph.reachable(t(1), |n| n.token == t(10), 8));
        assert!(graph.reachable(t(1), |n| n.token == t(10), 9));
    }

    #[test]
    fn shortcut_found_within_bound() {
        // 1 -> 2 -> 3 -> 4 -> 5 and a shortcut 1 -> 4; depth 2 only finds 5 via the shortcut
        let mut graph = chain(5);
        graph.add_call(t(1), t(4));
        assert!(!graph.reachable(t(1), |n| n.token == t(5), 1));
        assert!(graph.reachable(t(1), |n| n.token == t(5), 2));
        assert_eq!(
            graph.find_path(t(1), |n| n.token == t(5), 8),
            Some(vec![t(1), t(4), t(5)])
        );
    }

    #[test]
    fn recursion_and_stats() {
        let mut graph = CallGraph::new();
        graph.add_call(t(1), t(2));
        graph.add_call(t(2), t(3));
        graph.add_call(t(3), t(2));
        graph.add_call(t(4), t(4));
        graph.add_call(t(1), t(5));

        assert_eq!(graph.recursive_methods(), vec![t(2), t(3), t(4)]);
        let stats = graph.stats();
        assert_eq!(
            stats,
            CallGraphStats {
                method_count: 5,
                edge_count: 5,
                entry_points: 1,
                leaf_methods: 1,
                recursive_methods: 3,
            }
        );
    }

    #[test]
    fn dot_output() {
        let mut graph = CallGraph::new();
        graph.add_method(t(1), "N.T::<Main>");
        graph.add_call(t(1), t(2));
        let dot = graph.to_dot(Some("demo"));

        assert!(dot.starts_with("digraph CallGraph {"));
        assert!(dot.contains("label=\"demo\""));
        assert!(dot.contains("N.T::\\<Main\\>"));
        assert!(dot.contains(&format!("\"{}\" -> \"{}\";", t(1), t(2))));
    }
}
