//! The analyzed assembly, as handed over by an assembly loader.
//!
//! The engine does not read PE files. It consumes an [`Assembly`]: declared types with their
//! fields and raw method bodies, plus a [`MemberTable`] describing every member the bytecode
//! refers to by token. Models can be deserialized from JSON (serde) or built with
//! [`AssemblyBuilder`].
//!
//! # Key Components
//!
//! - [`Assembly`] - top-level container, resolves operand tokens
//! - [`TypeDef`], [`FieldDef`], [`MethodDef`] - declarations
//! - [`MethodBody`], [`ExceptionHandler`] - raw CIL and handler clauses in byte offsets
//! - [`MethodRef`], [`FieldRef`], [`MemberTable`] - resolved operand targets
//! - [`Token`] - metadata tokens
//! - [`TargetRuntime`] - runtime version gate for rules

pub mod assembly;
pub mod builder;
pub mod members;
pub mod method;
pub mod runtime;
pub mod token;
pub mod typedef;

pub use assembly::Assembly;
pub use builder::{AssemblyBuilder, TypeId};
pub use members::{FieldRef, FieldRefRc, MemberRef, MemberTable, MethodRef, MethodRefRc};
pub use method::{
    ExceptionHandler, ExceptionHandlerFlags, MethodAttributes, MethodBody, MethodDef,
};
pub use runtime::TargetRuntime;
pub use token::Token;
pub use typedef::{FieldAttributes, FieldDef, TypeDef};
