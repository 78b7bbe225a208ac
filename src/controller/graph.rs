// Graphviz rendering of the transition table for diagnostics

use std::fmt::Write;

use crate::controller::table::TransitionTable;
use crate::controller::types::ControllerState;

/// Renders `table` as a DOT digraph.
///
/// Composite states become clusters with a point node marking their initial
/// substate. Edges into a composite state point at that initial marker. The
/// current state, when given, is filled so it stands out in a viewer.
pub fn render_dot(table: &TransitionTable, current: Option<ControllerState>) -> String {
    let mut dot = String::new();
    let _ = writeln!(dot, "digraph {{");
    let _ = writeln!(dot, "compound=true;");
    let _ = writeln!(dot, "node [shape=Mrecord]");
    let _ = writeln!(dot, "rankdir=\"LR\"");

    for state in ControllerState::ALL {
        if table.parent_of(state).is_none() {
            render_state(&mut dot, table, state, current, 0);
        }
    }

    for (from, trigger, to) in table.edges() {
        if table.is_composite(to) {
            let _ = writeln!(
                dot,
                "\"{from}\" -> \"{}\" [label=\"{trigger}\", lhead=\"cluster{to}\"];",
                initial_marker(to)
            );
        } else {
            let _ = writeln!(dot, "\"{from}\" -> \"{to}\" [label=\"{trigger}\"];");
        }
    }

    let _ = writeln!(dot, "}}");
    dot
}

fn render_state(
    dot: &mut String,
    table: &TransitionTable,
    state: ControllerState,
    current: Option<ControllerState>,
    depth: usize,
) {
    let indent = "\t".repeat(depth);
    if table.is_composite(state) {
        let _ = writeln!(dot, "{indent}subgraph \"cluster{state}\" {{");
        let _ = writeln!(dot, "{indent}\tlabel = \"{state}\"");
        let marker = initial_marker(state);
        let _ = writeln!(dot, "{indent}\t\"{marker}\" [label=\"\", shape=point];");
        for child in table.substates_of(state) {
            render_state(dot, table, child, current, depth + 1);
        }
        if let Some(initial) = table.initial_substate(state) {
            let _ = writeln!(dot, "{indent}\t\"{marker}\" -> \"{initial}\";");
        }
        let _ = writeln!(dot, "{indent}}}");
    } else if current == Some(state) {
        let _ = writeln!(
            dot,
            "{indent}\"{state}\" [label=\"{state}\", style=filled, fillcolor=lightblue];"
        );
    } else {
        let _ = writeln!(dot, "{indent}\"{state}\" [label=\"{state}\"];");
    }
}

fn initial_marker(state: ControllerState) -> String {
    format!("init_{state}")
}
