//! Call graph integration tests over assemblies with call cycles.

use dotlint::{
    analysis::CallGraph,
    assembly::InstructionEncoder,
    metadata::{Assembly, AssemblyBuilder, MethodAttributes, TargetRuntime, Token},
    Result,
};

/// `Main -> A -> B -> C -> A`, `Main -> E`, `D -> D`.
fn cyclic_assembly() -> Result<(Assembly, [Token; 6])> {
    let mut builder = AssemblyBuilder::new("Cycles", TargetRuntime::V4_0);
    let ty = builder.add_type("N", "Graph");
    let attributes = MethodAttributes::PUBLIC | MethodAttributes::STATIC;
    let [main, a, b, c, d, e] =
        ["Main", "A", "B", "C", "D", "E"].map(|name| builder.add_method(ty, name, attributes, &[], "System.Void"));

    for (caller, callees) in [
        (main, vec![a, e]),
        (a, vec![b]),
        (b, vec![c]),
        (c, vec![a]),
        (d, vec![d]),
        (e, vec![]),
    ] {
        let mut encoder = InstructionEncoder::new();
        for callee in callees {
            encoder.emit_call("call", callee)?;
        }
        encoder.emit_instruction("ret", None)?;
        builder.set_code(caller, encoder.finalize()?.0)?;
    }
    Ok((builder.build(), [main, a, b, c, d, e]))
}

#[test]
fn cycles_are_detected() -> Result<()> {
    let (assembly, [main, a, b, c, d, e]) = cyclic_assembly()?;
    let graph = CallGraph::build(&assembly);

    let mut recursive = graph.recursive_methods();
    recursive.sort();
    assert_eq!(recursive, vec![a, b, c, d]);
    assert!(!recursive.contains(&main));
    assert!(!recursive.contains(&e));

    let stats = graph.stats();
    assert_eq!(stats.method_count, 6);
    assert_eq!(stats.edge_count, 6);
    assert_eq!(stats.entry_points, 1);
    assert_eq!(stats.leaf_methods, 1);
    assert_eq!(stats.recursive_methods, 4);
    Ok(())
}

#[test]
fn searches_terminate_on_cycles() -> Result<()> {
    let (assembly, [main, a, _, c, d, _]) = cyclic_assembly()?;
    let graph = CallGraph::build(&assembly);

    assert!(!graph.reachable(a, |node| node.name == "N.Graph::E", 1000));
    assert!(!graph.reachable(d, |node| node.token == main, 1000));
    assert!(graph.reachable(c, |node| node.name == "N.Graph::C", 0));
    Ok(())
}

#[test]
fn paths_respect_the_depth_bound() -> Result<()> {
    let (assembly, [main, a, b, c, ..]) = cyclic_assembly()?;
    let graph = CallGraph::build(&assembly);
    let is_c = |node: &dotlint::analysis::CallGraphNode| node.token == c;

    assert_eq!(graph.find_path(main, is_c, 2), None);
    assert_eq!(graph.find_path(main, is_c, 3), Some(vec![main, a, b, c]));
    // the shortest chain back into the cycle
    assert_eq!(
        graph.find_path(c, |node| node.token == b, 10),
        Some(vec![c, a, b])
    );
    Ok(())
}

#[test]
fn dot_output_marks_recursion() -> Result<()> {
    let (assembly, _) = cyclic_assembly()?;
    let dot = CallGraph::build(&assembly).to_dot(Some("Cycles"));

    assert!(dot.starts_with("digraph CallGraph {"));
    assert!(dot.contains("label=\"Cycles\";"));
    assert!(dot.contains("N.Graph::Main"));
    assert!(dot.contains("lightpink"));
    Ok(())
}
