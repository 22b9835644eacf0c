pub mod callgraph;
pub mod check;
pub mod common;
pub mod disasm;
pub mod rules;
