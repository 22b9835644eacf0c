//! # dotlint Prelude
//!
//! This module provides a convenient prelude for the most commonly used types and traits
//! from the dotlint library. Import this module to get quick access to the essential
//! types for writing rules and analyzing assemblies.

// ================================================================================================
// Core Types and Error Handling
// ================================================================================================

/// The main error type for all dotlint operations
pub use crate::Error;

/// The result type used throughout dotlint
pub use crate::Result;

// ================================================================================================
// Main Entry Points
// ================================================================================================

/// End-to-end analysis
pub use crate::analyzer::{AnalysisReport, Analyzer};

/// Run configuration
pub use crate::config::{AnalysisConfig, Exclusion};

// ================================================================================================
// Assembly Model
// ================================================================================================

pub use crate::metadata::{
    Assembly, AssemblyBuilder, ExceptionHandler, ExceptionHandlerFlags, FieldAttributes,
    FieldRef, MethodAttributes, MethodBody, MethodDef, MethodRef, TargetRuntime, Token,
    TypeDef,
};

// ================================================================================================
// Instructions
// ================================================================================================

pub use crate::assembly::{
    decode_body, BinaryOp, CompareOp, DecodedBody, ExceptionRegions, Instruction,
    InstructionEncoder, InstructionKind, Operand,
};

// ================================================================================================
// Analysis
// ================================================================================================

pub use crate::analysis::{CallGraph, KnownValue, StackTracker};

// ================================================================================================
// Rules and Reporting
// ================================================================================================

pub use crate::dispatch::{
    Dispatcher, Event, EventKind, MethodView, Rule, RuleContext, RuleInfo, Subscriptions,
};
pub use crate::report::{
    Diagnostic, DiagnosticKind, Location, Reporter, Severity, Violation, ViolationLog,
};
pub use crate::rules::{RuleFactory, RuleRegistry};
