// Copyright 2025 Johann Kempter
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//
// SPDX-License-Identifier: Apache-2.0

#![doc(html_no_source)]
#![deny(missing_docs)]
#![deny(unsafe_code)]
#![allow(clippy::too_many_arguments)]

//! # dotlint
//!
//! A rule-driven static analysis engine for compiled .NET assemblies. `dotlint` walks the
//! CIL bytecode of every method once, fans the walk out to a set of independent rules as
//! typed events, and collects the violations they report.
//!
//! ## Features
//!
//! - **Instruction model** - ECMA-335 opcode tables, typed instruction kinds, index-based
//!   branch targets and exception regions
//! - **Single-pass dispatch** - rules subscribe to the events they need; a failing rule is
//!   isolated and disabled without disturbing the others
//! - **Stack value tracking** - constant propagation and operand boundary recovery over the
//!   evaluation stack, sound at control-flow merges
//! - **Call graph** - collected during the walk for cross-procedural rules
//! - **Built-in rules** - zero divisors, redundant operands, lock misuse
//!
//! ## Quick Start
//!
//! ```rust
//! use dotlint::prelude::*;
//!
//! let mut builder = AssemblyBuilder::new("Demo", TargetRuntime::V4_0);
//! let ty = builder.add_type("Demo", "Calc");
//! let method = builder.add_method(
//!     ty,
//!     "Same",
//!     MethodAttributes::PUBLIC | MethodAttributes::STATIC,
//!     &["System.Int32"],
//!     "System.Int32",
//! );
//!
//! let mut encoder = InstructionEncoder::new();
//! encoder.emit_instruction("ldarg.0", None)?;
//! encoder.emit_instruction("ldarg.0", None)?;
//! encoder.emit_instruction("sub", None)?;
//! encoder.emit_instruction("ret", None)?;
//! let (code, _, _) = encoder.finalize()?;
//! builder.set_code(method, code)?;
//!
//! let report = Analyzer::new(AnalysisConfig::default()).analyze(&builder.build());
//! for violation in report.violations.iter() {
//!     println!("{violation}");
//! }
//! assert_eq!(report.violations.by_check("C1037").count(), 1);
//! # Ok::<(), dotlint::Error>(())
//! ```
//!
//! ## Architecture
//!
//! - [`metadata`] - the assembly model handed over by a loader
//! - [`assembly`] - instruction decoding, exception regions, bytecode encoding
//! - [`analysis`] - stack value tracker and call graph
//! - [`dispatch`] - events, the [`dispatch::Rule`] contract and the dispatcher
//! - [`rules`] - built-in rules and the registry
//! - [`report`] - violations, diagnostics and reporters
//! - [`config`] - run configuration
//! - [`analyzer`] - the end-to-end pipeline

#[macro_use]
pub(crate) mod error;
pub mod file;

/// Shared functionality which is used in unit- and integration-tests
#[cfg(test)]
pub(crate) mod test;

/// Convenient re-exports of the most commonly used types and traits.
///
/// # Example
///
/// ```rust
/// use dotlint::prelude::*;
///
/// let analyzer = Analyzer::new(AnalysisConfig::default());
/// let report = analyzer.analyze(&Assembly::new("Empty", TargetRuntime::V4_0));
/// assert!(report.is_clean());
/// ```
pub mod prelude;

pub mod analysis;
pub mod analyzer;
pub mod assembly;
pub mod config;
pub mod dispatch;
pub mod metadata;
pub mod report;
pub mod rules;

/// `dotlint` Result type
///
/// A type alias for [`std::result::Result<T, Error>`] where the error type is always [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

/// `dotlint` Error type
///
/// # Examples
///
/// ```rust
/// use dotlint::{assembly::decode_stream, Parser};
///
/// // br.s without its displacement byte
/// match decode_stream(&mut Parser::new(&[0x2B])) {
///     Err(error) if error.is_decode_error() => println!("bad body: {error}"),
///     Err(error) => println!("other: {error}"),
///     Ok(_) => unreachable!(),
/// }
/// ```
pub use error::Error;

/// Bounds-checked reader over a method body.
pub use file::parser::Parser;
