//! Method definitions and raw method bodies.
//!
//! A [`MethodDef`] is a method declared by a type of the analyzed assembly. Its optional
//! [`MethodBody`] holds the undecoded CIL bytes and the exception handler clauses exactly as
//! stored in the assembly (byte offsets and lengths). Decoding into typed instructions and
//! index-based exception regions happens in [`crate::assembly::decode_method`].

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

use crate::metadata::{members::MethodRef, token::Token};

/// Mask selecting the member access bits of [`MethodAttributes`]
pub const METHOD_ACCESS_MASK: u32 = 0x0007;

bitflags! {
    /// Method attributes (`MethodAttributes` column of the `MethodDef` table).
    ///
    /// The low three bits form the member access value and must be compared through
    /// [`MethodAttributes::access`] rather than tested as individual flags.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
    #[serde(transparent)]
    pub struct MethodAttributes: u32 {
        /// Accessible only by the parent type
        const PRIVATE = 0x0001;
        /// Accessible by sub-types only in this assembly
        const FAM_AND_ASSEM = 0x0002;
        /// Accessible by anyone in the assembly
        const ASSEM = 0x0003;
        /// Accessible by this type and sub-types
        const FAMILY = 0x0004;
        /// Accessible by sub-types anywhere, plus anyone in the assembly
        const FAM_OR_ASSEM = 0x0005;
        /// Accessible by anyone
        const PUBLIC = 0x0006;
        /// Defined on the type, no `this` argument
        const STATIC = 0x0010;
        /// Cannot be overridden
        const FINAL = 0x0020;
        /// Virtual dispatch
        const VIRTUAL = 0x0040;
        /// No implementation
        const ABSTRACT = 0x0400;
        /// Name is special (property accessors, operators)
        const SPECIAL_NAME = 0x0800;
        /// Runtime-special name (`.ctor`, `.cctor`)
        const RT_SPECIAL_NAME = 0x1000;
    }
}

impl MethodAttributes {
    /// The member access value (`PRIVATE` .. `PUBLIC`), or empty for compiler-controlled.
    #[must_use]
    pub fn access(&self) -> MethodAttributes {
        MethodAttributes::from_bits_truncate(self.bits() & METHOD_ACCESS_MASK)
    }

    /// Returns `true` if code outside the assembly can call the method directly.
    #[must_use]
    pub fn is_externally_visible(&self) -> bool {
        let access = self.access();
        access == MethodAttributes::PUBLIC
            || access == MethodAttributes::FAMILY
            || access == MethodAttributes::FAM_OR_ASSEM
    }
}

bitflags! {
    /// Exception clause kinds (ECMA-335 II.25.4.6).
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
    #[serde(transparent)]
    pub struct ExceptionHandlerFlags: u16 {
        /// A typed exception clause
        const EXCEPTION = 0x0000;
        /// An exception filter and handler clause
        const FILTER = 0x0001;
        /// A finally clause
        const FINALLY = 0x0002;
        /// Fault clause (finally that is called on exception only)
        const FAULT = 0x0004;
    }
}

/// One exception handler clause as stored in the method body, in byte offsets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExceptionHandler {
    /// Kind of clause
    pub flags: ExceptionHandlerFlags,
    /// Offset in bytes of the try block from start of the body
    pub try_offset: u32,
    /// Length in bytes of the try block
    pub try_length: u32,
    /// Location of the handler for this try block
    pub handler_offset: u32,
    /// Size of the handler code in bytes
    pub handler_length: u32,
    /// Caught exception type for typed clauses
    #[serde(default)]
    pub catch_type: Option<String>,
    /// Offset of the filter block for `FILTER` clauses
    #[serde(default)]
    pub filter_offset: u32,
}

/// Raw CIL body of a method.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct MethodBody {
    /// Declared maximum evaluation stack depth
    #[serde(default)]
    pub max_stack: u16,
    /// Type names of the declared locals
    #[serde(default)]
    pub locals: Vec<String>,
    /// CIL bytecode
    pub code: Vec<u8>,
    /// Exception handler clauses
    #[serde(default)]
    pub exception_handlers: Vec<ExceptionHandler>,
}

/// A method declared by a type of the analyzed assembly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MethodDef {
    /// `MethodDef` token
    pub token: Token,
    /// Simple method name
    pub name: String,
    /// Method attributes
    #[serde(default)]
    pub attributes: MethodAttributes,
    /// Parameter type names
    #[serde(default)]
    pub parameters: Vec<String>,
    /// Return type name
    #[serde(default = "void_type")]
    pub return_type: String,
    /// Body, absent for abstract, extern and runtime-implemented methods
    #[serde(default)]
    pub body: Option<MethodBody>,
}

fn void_type() -> String {
    "System.Void".to_string()
}

impl MethodDef {
    /// Returns `true` for static methods
    #[must_use]
    pub fn is_static(&self) -> bool {
        self.attributes.contains(MethodAttributes::STATIC)
    }

    /// Whether the method receives an implicit `this` argument
    #[must_use]
    pub fn has_this(&self) -> bool {
        !self.is_static()
    }

    /// Returns `true` for instance and static constructors
    #[must_use]
    pub fn is_constructor(&self) -> bool {
        self.name == ".ctor" || self.name == ".cctor"
    }

    /// The call-site view of this method when declared by `declaring_type`.
    #[must_use]
    pub fn reference(&self, declaring_type: &str) -> MethodRef {
        MethodRef {
            token: self.token,
            declaring_type: declaring_type.to_string(),
            name: self.name.clone(),
            parameters: self.parameters.clone(),
            return_type: self.return_type.clone(),
            has_this: self.has_this(),
        }
    }
}
