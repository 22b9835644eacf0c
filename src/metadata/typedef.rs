//! Type and field definitions.

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

use crate::metadata::{members::FieldRef, method::MethodDef, token::Token};

bitflags! {
    /// Field attributes (`FieldAttributes` column of the `Field` table).
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
    #[serde(transparent)]
    pub struct FieldAttributes: u16 {
        /// Accessible only by the parent type
        const PRIVATE = 0x0001;
        /// Accessible by anyone
        const PUBLIC = 0x0006;
        /// Defined on the type, not per instance
        const STATIC = 0x0010;
        /// Only assignable in a constructor
        const INIT_ONLY = 0x0020;
        /// Compile-time constant
        const LITERAL = 0x0040;
    }
}

/// A field declared by a type of the analyzed assembly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDef {
    /// `Field` token
    pub token: Token,
    /// Field name
    pub name: String,
    /// Field type name
    pub field_type: String,
    /// Field attributes
    #[serde(default)]
    pub attributes: FieldAttributes,
}

impl FieldDef {
    /// Returns `true` for static fields
    #[must_use]
    pub fn is_static(&self) -> bool {
        self.attributes.contains(FieldAttributes::STATIC)
    }

    /// The access-site view of this field when declared by `declaring_type`.
    #[must_use]
    pub fn reference(&self, declaring_type: &str) -> FieldRef {
        FieldRef {
            token: self.token,
            declaring_type: declaring_type.to_string(),
            name: self.name.clone(),
            field_type: self.field_type.clone(),
            is_static: self.is_static(),
        }
    }
}

/// A type declared by the analyzed assembly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeDef {
    /// `TypeDef` token
    pub token: Token,
    /// Namespace, empty for the global namespace and nested types
    #[serde(default)]
    pub namespace: String,
    /// Simple type name
    pub name: String,
    /// Full name of the base type, if any
    #[serde(default)]
    pub base_type: Option<String>,
    /// Declared fields in metadata order
    #[serde(default)]
    pub fields: Vec<FieldDef>,
    /// Declared methods in metadata order
    #[serde(default)]
    pub methods: Vec<MethodDef>,
}

impl TypeDef {
    /// `Namespace.Name`, or just `Name` in the global namespace
    #[must_use]
    pub fn full_name(&self) -> String {
        if self.namespace.is_empty() {
            self.name.clone()
        } else {
            format!("{}.{}", self.namespace, self.name)
        }
    }

    /// Returns `true` for delegate types
    #[must_use]
    pub fn is_delegate(&self) -> bool {
        matches!(
            self.base_type.as_deref(),
            Some("System.MulticastDelegate" | "System.Delegate")
        )
    }

    /// Finds a declared field by name
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&FieldDef> {
        self.fields.iter().find(|field| field.name == name)
    }
}
