use std::{collections::HashSet, path::Path};

use anyhow::bail;
use dotlint::{
    analysis::CallGraph,
    metadata::{Assembly, Token},
};
use serde::Serialize;

use crate::{
    commands::common::{load_assembly, parse_token_filter, resolve_single_method},
    output::{Align, TabWriter},
};

#[derive(Debug, Serialize)]
struct CgNodeOutput {
    token: String,
    name: String,
    callees: Vec<String>,
}

#[derive(Debug, Serialize)]
struct CallGraphOutput {
    method_count: usize,
    edge_count: usize,
    entry_points: Vec<String>,
    recursive_methods: Vec<String>,
    nodes: Vec<CgNodeOutput>,
}

pub fn run(
    path: &Path,
    format: &str,
    root: Option<&str>,
    depth: Option<usize>,
) -> anyhow::Result<()> {
    let assembly = load_assembly(path)?;
    let cg = CallGraph::build(&assembly);

    // Without --depth a root shows its whole reachable subtree
    let shown: Option<HashSet<Token>> = match root {
        Some(filter) => {
            let root = resolve_root_token(&assembly, &cg, filter)?;
            Some(bfs_reachable(&cg, root, depth.unwrap_or(usize::MAX)))
        }
        None => None,
    };
    let visible = |token: Token| shown.as_ref().is_none_or(|set| set.contains(&token));

    match format {
        "json" => {
            let stats = cg.stats();
            let nodes = cg
                .nodes()
                .filter(|node| visible(node.token))
                .map(|node| CgNodeOutput {
                    token: node.token.to_string(),
                    name: node.name.clone(),
                    callees: cg
                        .calls(node.token)
                        .into_iter()
                        .map(|t| node_label(&cg, t))
                        .collect(),
                })
                .collect();

            let output = CallGraphOutput {
                method_count: stats.method_count,
                edge_count: stats.edge_count,
                entry_points: entry_points(&cg).map(|t| node_label(&cg, t)).collect(),
                recursive_methods: cg
                    .recursive_methods()
                    .into_iter()
                    .map(|t| node_label(&cg, t))
                    .collect(),
                nodes,
            };
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        "dot" => match &shown {
            Some(reachable) => print_filtered_dot(&cg, &assembly.name, reachable),
            None => println!("{}", cg.to_dot(Some(&assembly.name))),
        },
        "text" => {
            let stats = cg.stats();
            let entry_names: Vec<String> = entry_points(&cg).map(|t| node_label(&cg, t)).collect();
            let recursive: Vec<String> = cg
                .recursive_methods()
                .into_iter()
                .map(|t| node_label(&cg, t))
                .collect();

            println!(
                "Call graph: {} methods, {} edges",
                stats.method_count, stats.edge_count
            );
            println!("Entry points: {}", list_or_none(&entry_names));
            println!("Recursive methods: {}", list_or_none(&recursive));
            println!();

            let mut tw = TabWriter::new(&[("Method", Align::Left), ("Callees", Align::Left)]);
            for node in cg.nodes().filter(|node| visible(node.token)) {
                let callees = if node.is_leaf() {
                    "(leaf)".to_string()
                } else {
                    cg.calls(node.token)
                        .into_iter()
                        .map(|t| node_label(&cg, t))
                        .collect::<Vec<_>>()
                        .join(", ")
                };
                tw.row(vec![format!("{} ({})", node.name, node.token), callees]);
            }
            tw.print();
        }
        other => bail!("unsupported format '{other}'; expected 'text', 'dot', or 'json'"),
    }

    Ok(())
}

/// Resolve a root filter to a method in the graph.
fn resolve_root_token(assembly: &Assembly, cg: &CallGraph, filter: &str) -> anyhow::Result<Token> {
    let token = match parse_token_filter(filter) {
        Some(token) => token,
        None => resolve_single_method(assembly, filter)?.1.token,
    };
    if !cg.contains(token) {
        bail!("{token} is not a method of {}", assembly.name);
    }
    Ok(token)
}

/// Methods nobody calls.
fn entry_points(cg: &CallGraph) -> impl Iterator<Item = Token> + '_ {
    cg.nodes()
        .map(|node| node.token)
        .filter(|token| cg.callers(*token).is_empty())
}

/// BFS from `root` up to `max_depth` hops, returning the set of reachable tokens.
fn bfs_reachable(cg: &CallGraph, root: Token, max_depth: usize) -> HashSet<Token> {
    let mut visited = HashSet::from([root]);
    let mut frontier = vec![root];

    for _ in 0..max_depth {
        let next: Vec<Token> = frontier
            .iter()
            .flat_map(|token| cg.calls(*token))
            .filter(|callee| visited.insert(*callee))
            .collect();
        if next.is_empty() {
            break;
        }
        frontier = next;
    }

    visited
}

fn node_label(cg: &CallGraph, token: Token) -> String {
    cg.node(token)
        .map_or_else(|| token.to_string(), |node| node.name.clone())
}

fn list_or_none(names: &[String]) -> String {
    if names.is_empty() {
        "none".to_string()
    } else {
        names.join(", ")
    }
}

/// Emit a DOT graph limited to the given token set.
fn print_filtered_dot(cg: &CallGraph, title: &str, reachable: &HashSet<Token>) {
    println!("digraph \"{}\" {{", title.replace('"', "\\\""));
    println!("  rankdir=LR;");
    println!("  node [shape=box, style=filled, fillcolor=lightyellow];");

    let nodes = || cg.nodes().filter(|node| reachable.contains(&node.token));
    for node in nodes() {
        println!(
            "  \"{}\" [label=\"{}\"];",
            node.token,
            node.name.replace('"', "\\\"")
        );
    }
    for node in nodes() {
        for callee in cg.calls(node.token) {
            if reachable.contains(&callee) {
                println!("  \"{}\" -> \"{callee}\";", node.token);
            }
        }
    }

    println!("}}");
}
