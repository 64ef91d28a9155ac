//! Ship programs: the AST an external parser produces, the execution
//! environment that survives between slices, and the time-budgeted
//! interpreter that walks the tree inside `evolve`.

mod ast;
mod env;
mod interpreter;

pub use ast::{
    Attribute, BinaryOp, EntityQuery, Expression, ExpressionKind, SourceLocation, Statement,
    StatementKind, UnaryOp,
};
pub use env::{Program, Value};
pub use interpreter::{execute, Flow, QUANTUM};

pub(crate) use interpreter::run_ship_programs;
