//! The [`Assembly`] container and operand-token resolution.

use std::{collections::HashMap, sync::Arc, sync::OnceLock};

use serde::{Deserialize, Serialize};

use crate::metadata::{
    members::{FieldRefRc, MemberRef, MemberTable, MethodRefRc},
    method::MethodDef,
    runtime::TargetRuntime,
    token::Token,
    typedef::TypeDef,
};

/// Token index over the assembly's own definitions, built on first use.
#[derive(Debug, Default)]
struct Definitions {
    members: HashMap<Token, MemberRef>,
    methods: HashMap<Token, (usize, usize)>,
}

/// An already-loaded managed assembly.
///
/// This is the input boundary of the engine: producing it (reading PE metadata tables,
/// resolving external references) is the job of an assembly loader. The analysis only needs
/// the declared types with their raw method bodies, plus a member table for the tokens those
/// bodies refer to.
///
/// Tokens of the assembly's own `MethodDef` and `Field` rows resolve without being listed in
/// [`Assembly::members`]; everything referenced from other assemblies must be listed there.
/// The definition index is built on the first lookup, so `types` must not change afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Assembly {
    /// Assembly simple name
    pub name: String,
    /// Runtime the assembly targets
    #[serde(default)]
    pub runtime: TargetRuntime,
    /// Declared types in metadata order
    #[serde(default)]
    pub types: Vec<TypeDef>,
    /// Referenced members (`MemberRef`, `MethodSpec` and external definitions)
    #[serde(default)]
    pub members: MemberTable,
    #[serde(skip)]
    definitions: OnceLock<Arc<Definitions>>,
}

impl Assembly {
    /// Creates an empty assembly
    #[must_use]
    pub fn new(name: &str, runtime: TargetRuntime) -> Self {
        Assembly {
            name: name.to_string(),
            runtime,
            types: Vec::new(),
            members: MemberTable::new(),
            definitions: OnceLock::new(),
        }
    }

    fn definitions(&self) -> &Definitions {
        self.definitions.get_or_init(|| {
            let mut definitions = Definitions::default();
            for (type_index, ty) in self.types.iter().enumerate() {
                let type_name = ty.full_name();
                for field in &ty.fields {
                    definitions.members.insert(
                        field.token,
                        MemberRef::Field(Arc::new(field.reference(&type_name))),
                    );
                }
                for (method_index, method) in ty.methods.iter().enumerate() {
                    definitions.members.insert(
                        method.token,
                        MemberRef::Method(Arc::new(method.reference(&type_name))),
                    );
                    definitions
                        .methods
                        .insert(method.token, (type_index, method_index));
                }
            }
            Arc::new(definitions)
        })
    }

    /// Resolves a member token, preferring the explicit member table.
    #[must_use]
    pub fn resolve(&self, token: Token) -> Option<&MemberRef> {
        self.members
            .get(token)
            .or_else(|| self.definitions().members.get(&token))
    }

    /// Resolves a method token
    #[must_use]
    pub fn resolve_method(&self, token: Token) -> Option<MethodRefRc> {
        match self.resolve(token) {
            Some(MemberRef::Method(method)) => Some(method.clone()),
            _ => None,
        }
    }

    /// Resolves a field token
    #[must_use]
    pub fn resolve_field(&self, token: Token) -> Option<FieldRefRc> {
        match self.resolve(token) {
            Some(MemberRef::Field(field)) => Some(field.clone()),
            _ => None,
        }
    }

    /// Finds a method defined in this assembly together with its declaring type.
    #[must_use]
    pub fn method_def(&self, token: Token) -> Option<(&TypeDef, &MethodDef)> {
        let &(type_index, method_index) = self.definitions().methods.get(&token)?;
        let ty = self.types.get(type_index)?;
        Some((ty, ty.methods.get(method_index)?))
    }

    /// Finds a declared type by full name
    #[must_use]
    pub fn type_by_name(&self, full_name: &str) -> Option<&TypeDef> {
        self.types.iter().find(|ty| ty.full_name() == full_name)
    }

    /// Total number of declared methods
    #[must_use]
    pub fn method_count(&self) -> usize {
        self.types.iter().map(|ty| ty.methods.len()).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::{
        members::MethodRef,
        method::{MethodAttributes, MethodBody},
    };

    fn sample() -> Assembly {
        let mut assembly = Assembly::new("Sample", TargetRuntime::V2_0);
        assembly.types.push(TypeDef {
            token: Token::new(0x0200_0002),
            namespace: "App".into(),
            name: "Program".into(),
            base_type: Some("System.Object".into()),
            fields: Vec::new(),
            methods: vec![MethodDef {
                token: Token::new(0x0600_0001),
                name: "Main".into(),
                attributes: MethodAttributes::PUBLIC | MethodAttributes::STATIC,
                parameters: Vec::new(),
                return_type: "System.Void".into(),
                body: Some(MethodBody {
                    code: vec![0x2A],
                    ..MethodBody::default()
                }),
            }],
        });
        assembly.members.insert(MemberRef::Method(Arc::new(MethodRef {
            token: Token::new(0x0A00_0001),
            declaring_type: "System.Console".into(),
            name: "WriteLine".into(),
            parameters: vec!["System.String".into()],
            return_type: "System.Void".into(),
            has_this: false,
        })));
        assembly
    }

    #[test]
    fn resolves_definitions_and_references() {
        let assembly = sample();

        let main = assembly.resolve_method(Token::new(0x0600_0001)).unwrap();
        assert_eq!(main.full_name(), "App.Program::Main");
        assert!(!main.has_this);

        let write = assembly.resolve_method(Token::new(0x0A00_0001)).unwrap();
        assert_eq!(write.declaring_type, "System.Console");

        assert!(assembly.resolve_field(Token::new(0x0600_0001)).is_none());
        assert!(assembly.resolve(Token::new(0x0A00_0002)).is_none());
    }

    #[test]
    fn method_def_lookup() {
        let assembly = sample();
        let (ty, method) = assembly.method_def(Token::new(0x0600_0001)).unwrap();
        assert_eq!(ty.name, "Program");
        assert_eq!(method.name, "Main");
        assert_eq!(assembly.method_count(), 1);
        assert!(assembly.type_by_name("App.Program").is_some());
    }

    #[test]
    fn json_round_trip_keeps_resolution() {
        let json = serde_json::to_string(&sample()).unwrap();
        let back: Assembly = serde_json::from_str(&json).unwrap();
        assert_eq!(back.runtime, TargetRuntime::V2_0);
        assert!(back.resolve_method(Token::new(0x0A00_0001)).is_some());
        assert!(back.resolve_method(Token::new(0x0600_0001)).is_some());
    }
}
