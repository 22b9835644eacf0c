//! Programmatic construction of [`Assembly`] models.
//!
//! Loaders, tests and benchmarks use [`AssemblyBuilder`] to declare types, fields, methods and
//! external member references. Tokens are handed out at declaration time so bodies that call
//! each other can be encoded before every method has a body.
//!
//! # Examples
//!
//! ```rust
//! use dotlint::assembly::InstructionEncoder;
//! use dotlint::metadata::{AssemblyBuilder, MethodAttributes, TargetRuntime};
//!
//! let mut builder = AssemblyBuilder::new("Demo", TargetRuntime::V4_0);
//! let write_line = builder.method_ref("System.Console", "WriteLine", &["System.String"], "System.Void", false);
//! let program = builder.add_type("Demo", "Program");
//! let main = builder.add_method(program, "Main", MethodAttributes::PUBLIC | MethodAttributes::STATIC, &[], "System.Void");
//!
//! let mut encoder = InstructionEncoder::new();
//! encoder.emit_instruction("ldnull", None)?;
//! encoder.emit_call("call", write_line)?;
//! encoder.emit_instruction("ret", None)?;
//! builder.set_code(main, encoder.finalize()?.0)?;
//!
//! let assembly = builder.build();
//! assert_eq!(assembly.method_count(), 1);
//! # Ok::<(), dotlint::Error>(())
//! ```

use std::{collections::HashMap, sync::Arc};

use crate::{
    metadata::{
        assembly::Assembly,
        members::{FieldRef, MemberRef, MethodRef},
        method::{ExceptionHandler, MethodAttributes, MethodBody, MethodDef},
        runtime::TargetRuntime,
        token::Token,
        typedef::{FieldAttributes, FieldDef, TypeDef},
    },
    Error, Result,
};

/// Index of a type declared through an [`AssemblyBuilder`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TypeId(usize);

/// Incremental builder for [`Assembly`] models.
pub struct AssemblyBuilder {
    assembly: Assembly,
    next_type: u32,
    next_field: u32,
    next_method: u32,
    next_member_ref: u32,
    method_slots: HashMap<Token, (usize, usize)>,
}

impl AssemblyBuilder {
    /// Starts an empty assembly
    #[must_use]
    pub fn new(name: &str, runtime: TargetRuntime) -> Self {
        AssemblyBuilder {
            assembly: Assembly::new(name, runtime),
            // Row 1 of TypeDef is the <Module> pseudo type
            next_type: 2,
            next_field: 1,
            next_method: 1,
            next_member_ref: 1,
            method_slots: HashMap::new(),
        }
    }

    /// Declares a type and returns its handle
    pub fn add_type(&mut self, namespace: &str, name: &str) -> TypeId {
        self.add_type_with_base(namespace, name, Some("System.Object"))
    }

    /// Declares a type deriving from `base_type`
    pub fn add_type_with_base(
        &mut self,
        namespace: &str,
        name: &str,
        base_type: Option<&str>,
    ) -> TypeId {
        let token = Token::from_parts(Token::TYPE_DEF, self.next_type);
        self.next_type += 1;
        self.assembly.types.push(TypeDef {
            token,
            namespace: namespace.to_string(),
            name: name.to_string(),
            base_type: base_type.map(str::to_string),
            fields: Vec::new(),
            methods: Vec::new(),
        });
        TypeId(self.assembly.types.len() - 1)
    }

    /// Full name of a declared type
    #[must_use]
    pub fn type_name(&self, ty: TypeId) -> String {
        self.assembly.types[ty.0].full_name()
    }

    /// Declares a field on `ty` and returns its `Field` token
    pub fn add_field(
        &mut self,
        ty: TypeId,
        name: &str,
        field_type: &str,
        attributes: FieldAttributes,
    ) -> Token {
        let token = Token::from_parts(Token::FIELD, self.next_field);
        self.next_field += 1;
        self.assembly.types[ty.0].fields.push(FieldDef {
            token,
            name: name.to_string(),
            field_type: field_type.to_string(),
            attributes,
        });
        token
    }

    /// Declares a method on `ty` and returns its `MethodDef` token; the body is set later
    pub fn add_method(
        &mut self,
        ty: TypeId,
        name: &str,
        attributes: MethodAttributes,
        parameters: &[&str],
        return_type: &str,
    ) -> Token {
        let token = Token::from_parts(Token::METHOD_DEF, self.next_method);
        self.next_method += 1;
        let methods = &mut self.assembly.types[ty.0].methods;
        methods.push(MethodDef {
            token,
            name: name.to_string(),
            attributes,
            parameters: parameters.iter().map(|p| (*p).to_string()).collect(),
            return_type: return_type.to_string(),
            body: None,
        });
        self.method_slots.insert(token, (ty.0, methods.len() - 1));
        token
    }

    /// Adds a `MemberRef` to a method of another assembly and returns its token
    pub fn method_ref(
        &mut self,
        declaring_type: &str,
        name: &str,
        parameters: &[&str],
        return_type: &str,
        has_this: bool,
    ) -> Token {
        let token = Token::from_parts(Token::MEMBER_REF, self.next_member_ref);
        self.next_member_ref += 1;
        self.assembly
            .members
            .insert(MemberRef::Method(Arc::new(MethodRef {
                token,
                declaring_type: declaring_type.to_string(),
                name: name.to_string(),
                parameters: parameters.iter().map(|p| (*p).to_string()).collect(),
                return_type: return_type.to_string(),
                has_this,
            })));
        token
    }

    /// Adds a `MemberRef` to a field of another assembly and returns its token
    pub fn field_ref(
        &mut self,
        declaring_type: &str,
        name: &str,
        field_type: &str,
        is_static: bool,
    ) -> Token {
        let token = Token::from_parts(Token::MEMBER_REF, self.next_member_ref);
        self.next_member_ref += 1;
        self.assembly.members.insert(MemberRef::Field(Arc::new(FieldRef {
            token,
            declaring_type: declaring_type.to_string(),
            name: name.to_string(),
            field_type: field_type.to_string(),
            is_static,
        })));
        token
    }

    fn method_mut(&mut self, method: Token) -> Result<&mut MethodDef> {
        let &(type_index, method_index) = self
            .method_slots
            .get(&method)
            .ok_or_else(|| Error::Error(format!("method {method} was not declared")))?;
        Ok(&mut self.assembly.types[type_index].methods[method_index])
    }

    /// Sets the full body of a declared method
    ///
    /// # Errors
    /// Returns [`crate::Error::Error`] if `method` was not declared by this builder.
    pub fn set_body(&mut self, method: Token, body: MethodBody) -> Result<()> {
        self.method_mut(method)?.body = Some(body);
        Ok(())
    }

    /// Sets the bytecode of a declared method, keeping any handlers already added
    ///
    /// # Errors
    /// Returns [`crate::Error::Error`] if `method` was not declared by this builder.
    pub fn set_code(&mut self, method: Token, code: Vec<u8>) -> Result<()> {
        let method = self.method_mut(method)?;
        method.body.get_or_insert_with(MethodBody::default).code = code;
        Ok(())
    }

    /// Adds an exception handler clause to a declared method
    ///
    /// # Errors
    /// Returns [`crate::Error::Error`] if `method` was not declared by this builder.
    pub fn add_handler(&mut self, method: Token, handler: ExceptionHandler) -> Result<()> {
        let method = self.method_mut(method)?;
        method
            .body
            .get_or_insert_with(MethodBody::default)
            .exception_handlers
            .push(handler);
        Ok(())
    }

    /// Finishes the assembly
    #[must_use]
    pub fn build(self) -> Assembly {
        self.assembly
    }
}
