//! Per-method view handed to rules.

use crate::{
    analysis::StackTracker,
    assembly::{DecodedBody, ExceptionRegions, Instruction},
    metadata::{Assembly, MethodDef, Token, TypeDef},
};

/// One method being visited: its decoded body, exception regions, stack tracker, and
/// back-references to the declaring type and assembly.
///
/// A view lives from `BeginMethod` to `EndMethod` of its method. Nothing in it survives the
/// method; rules keep whatever they need in their own state.
pub struct MethodView<'a> {
    assembly: &'a Assembly,
    declaring_type: &'a TypeDef,
    method: &'a MethodDef,
    full_name: String,
    body: &'a DecodedBody,
    tracker: StackTracker<'a>,
}

impl<'a> MethodView<'a> {
    /// Creates a view over an already decoded body of `method`
    #[must_use]
    pub fn new(
        assembly: &'a Assembly,
        declaring_type: &'a TypeDef,
        method: &'a MethodDef,
        body: &'a DecodedBody,
    ) -> Self {
        MethodView {
            assembly,
            declaring_type,
            method,
            full_name: format!("{}::{}", declaring_type.full_name(), method.name),
            body,
            tracker: StackTracker::new(&body.instructions, &body.regions),
        }
    }

    /// The assembly being analyzed
    #[must_use]
    pub fn assembly(&self) -> &'a Assembly {
        self.assembly
    }

    /// Type declaring the method
    #[must_use]
    pub fn declaring_type(&self) -> &'a TypeDef {
        self.declaring_type
    }

    /// The method definition
    #[must_use]
    pub fn method(&self) -> &'a MethodDef {
        self.method
    }

    /// `MethodDef` token of the method
    #[must_use]
    pub fn token(&self) -> Token {
        self.method.token
    }

    /// `Namespace.Type::Method`
    #[must_use]
    pub fn full_name(&self) -> &str {
        &self.full_name
    }

    /// Decoded instructions in body order
    #[must_use]
    pub fn instructions(&self) -> &'a [Instruction] {
        &self.body.instructions
    }

    /// Instruction at `index`
    #[must_use]
    pub fn instruction(&self, index: usize) -> Option<&'a Instruction> {
        self.body.instructions.get(index)
    }

    /// Exception regions of the body
    #[must_use]
    pub fn regions(&self) -> &'a ExceptionRegions {
        &self.body.regions
    }

    /// Stack tracker for this body
    #[must_use]
    pub fn tracker(&self) -> &StackTracker<'a> {
        &self.tracker
    }
}
