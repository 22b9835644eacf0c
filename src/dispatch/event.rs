//! Visitation events.

use std::fmt;

use strum::{Display, EnumCount, EnumIter, IntoStaticStr};

use crate::{
    assembly::InstructionKind,
    metadata::{Assembly, FieldDef, TypeDef},
};

/// Closed set of events a rule can subscribe to.
///
/// Scope events bracket the walk over the assembly, the instruction events are emitted once
/// per decoded instruction, and [`EventKind::CallGraph`] fires once after the walk when the
/// call graph is complete.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Display,
    EnumIter,
    EnumCount,
    IntoStaticStr,
)]
pub enum EventKind {
    /// Start of the assembly
    BeginAssembly,
    /// End of the assembly
    EndAssembly,
    /// Start of the type list
    BeginTypes,
    /// End of the type list
    EndTypes,
    /// Start of one type
    BeginType,
    /// End of one type
    EndType,
    /// One field of the current type
    Field,
    /// Start of the method list of the current type
    BeginMethods,
    /// End of the method list of the current type
    EndMethods,
    /// Start of one method with a body
    BeginMethod,
    /// End of one method with a body
    EndMethod,
    /// `ldarg*`, `ldarga*`
    LoadArg,
    /// `starg*`
    StoreArg,
    /// `ldloc*`, `ldloca*`
    LoadLocal,
    /// `stloc*`
    StoreLocal,
    /// `ldc.*`, `ldnull`, `ldstr`
    LoadConstant,
    /// `ldfld`
    LoadField,
    /// `stfld`
    StoreField,
    /// `ldsfld`
    LoadStaticField,
    /// `stsfld`
    StoreStaticField,
    /// `ldflda`, `ldsflda`
    LoadFieldAddress,
    /// `call`, `callvirt`
    Call,
    /// `newobj`
    NewObject,
    /// `ldftn`, `ldvirtftn`
    LoadFunction,
    /// Conditional branches
    ConditionalBranch,
    /// `br*`, `leave*`
    UnconditionalBranch,
    /// `switch`
    Switch,
    /// Arithmetic and bitwise operators
    BinaryOp,
    /// `ceq`, `cgt*`, `clt*`
    CompareOp,
    /// `ret`
    Return,
    /// `throw`, `rethrow`
    Throw,
    /// Any other instruction
    Other,
    /// Call graph phase, after `EndAssembly`
    CallGraph,
}

impl EventKind {
    /// The event emitted for an instruction of the given kind
    #[must_use]
    pub fn for_instruction(kind: &InstructionKind) -> EventKind {
        match kind {
            InstructionKind::LoadArg(_) | InstructionKind::LoadArgAddress(_) => EventKind::LoadArg,
            InstructionKind::StoreArg(_) => EventKind::StoreArg,
            InstructionKind::LoadLocal(_) | InstructionKind::LoadLocalAddress(_) => {
                EventKind::LoadLocal
            }
            InstructionKind::StoreLocal(_) => EventKind::StoreLocal,
            InstructionKind::LoadConstInt(_)
            | InstructionKind::LoadConstFloat(_)
            | InstructionKind::LoadNull
            | InstructionKind::LoadString(_) => EventKind::LoadConstant,
            InstructionKind::LoadField(_) => EventKind::LoadField,
            InstructionKind::StoreField(_) => EventKind::StoreField,
            InstructionKind::LoadStaticField(_) => EventKind::LoadStaticField,
            InstructionKind::StoreStaticField(_) => EventKind::StoreStaticField,
            InstructionKind::LoadFieldAddress(_) | InstructionKind::LoadStaticFieldAddress(_) => {
                EventKind::LoadFieldAddress
            }
            InstructionKind::Call(_) => EventKind::Call,
            InstructionKind::NewObject(_) => EventKind::NewObject,
            InstructionKind::LoadFunction(_) => EventKind::LoadFunction,
            InstructionKind::ConditionalBranch { .. } => EventKind::ConditionalBranch,
            InstructionKind::UnconditionalBranch { .. } => EventKind::UnconditionalBranch,
            InstructionKind::Switch { .. } => EventKind::Switch,
            InstructionKind::BinaryOp(_) => EventKind::BinaryOp,
            InstructionKind::CompareOp(_) => EventKind::CompareOp,
            InstructionKind::Return => EventKind::Return,
            InstructionKind::Throw => EventKind::Throw,
            InstructionKind::Other => EventKind::Other,
        }
    }

    /// Returns `true` for per-instruction events
    #[must_use]
    pub fn is_instruction(&self) -> bool {
        *self >= EventKind::LoadArg && *self <= EventKind::Other
    }

    /// Returns `true` for events delivered inside a method bracket
    #[must_use]
    pub fn is_method_scoped(&self) -> bool {
        matches!(self, EventKind::BeginMethod | EventKind::EndMethod) || self.is_instruction()
    }

    /// Get a human-readable description of this event
    #[must_use]
    pub fn description(&self) -> &'static str {
        match self {
            EventKind::BeginAssembly | EventKind::EndAssembly => "assembly bracket",
            EventKind::BeginTypes | EventKind::EndTypes => "type list bracket",
            EventKind::BeginType | EventKind::EndType => "type bracket",
            EventKind::Field => "field declaration",
            EventKind::BeginMethods | EventKind::EndMethods => "method list bracket",
            EventKind::BeginMethod | EventKind::EndMethod => "method bracket",
            EventKind::CallGraph => "call graph phase",
            _ => "instruction",
        }
    }
}

/// A scope event with its payload.
///
/// Method brackets, instructions and the call graph phase have dedicated callbacks on
/// [`crate::dispatch::Rule`] and are not represented here.
#[derive(Debug, Clone, Copy)]
pub enum Event<'a> {
    /// Start of the assembly
    BeginAssembly(&'a Assembly),
    /// End of the assembly
    EndAssembly(&'a Assembly),
    /// Start of the type list
    BeginTypes(&'a Assembly),
    /// End of the type list
    EndTypes(&'a Assembly),
    /// Start of one type
    BeginType(&'a TypeDef),
    /// End of one type
    EndType(&'a TypeDef),
    /// One field declaration
    Field {
        /// Type declaring the field
        declaring_type: &'a TypeDef,
        /// The field
        field: &'a FieldDef,
    },
    /// Start of the method list of a type
    BeginMethods(&'a TypeDef),
    /// End of the method list of a type
    EndMethods(&'a TypeDef),
}

impl Event<'_> {
    /// The kind used for subscription lookup
    #[must_use]
    pub fn kind(&self) -> EventKind {
        match self {
            Event::BeginAssembly(_) => EventKind::BeginAssembly,
            Event::EndAssembly(_) => EventKind::EndAssembly,
            Event::BeginTypes(_) => EventKind::BeginTypes,
            Event::EndTypes(_) => EventKind::EndTypes,
            Event::BeginType(_) => EventKind::BeginType,
            Event::EndType(_) => EventKind::EndType,
            Event::Field { .. } => EventKind::Field,
            Event::BeginMethods(_) => EventKind::BeginMethods,
            Event::EndMethods(_) => EventKind::EndMethods,
        }
    }
}

impl fmt::Display for Event<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Event::BeginAssembly(assembly)
            | Event::EndAssembly(assembly)
            | Event::BeginTypes(assembly)
            | Event::EndTypes(assembly) => write!(f, "{} {}", self.kind(), assembly.name),
            Event::BeginType(ty)
            | Event::EndType(ty)
            | Event::BeginMethods(ty)
            | Event::EndMethods(ty) => write!(f, "{} {}", self.kind(), ty.full_name()),
            Event::Field {
                declaring_type,
                field,
            } => write!(f, "Field {}::{}", declaring_type.full_name(), field.name),
        }
    }
}
