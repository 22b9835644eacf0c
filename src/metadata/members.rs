//! Member references used as instruction operands.
//!
//! Call sites, field accesses and function-pointer loads name their target with a metadata
//! token. The [`MemberTable`] maps those tokens to resolved [`MethodRef`] / [`FieldRef`]
//! descriptions so that decoded instructions carry the callee's arity, receiver flag and
//! declaring type directly.

use std::{collections::HashMap, fmt, sync::Arc};

use serde::{Deserialize, Serialize};

use crate::metadata::token::Token;

/// Reference to a resolved method signature
pub type MethodRefRc = Arc<MethodRef>;
/// Reference to a resolved field
pub type FieldRefRc = Arc<FieldRef>;

/// A method as seen from a call site.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MethodRef {
    /// `MethodDef` or `MemberRef` token identifying the method
    pub token: Token,
    /// Full name of the declaring type, e.g. `System.Threading.Monitor`
    pub declaring_type: String,
    /// Simple method name, e.g. `Enter` or `.ctor`
    pub name: String,
    /// Parameter type names, excluding the implicit receiver
    #[serde(default)]
    pub parameters: Vec<String>,
    /// Return type name; `System.Void` when nothing is returned
    #[serde(default = "void_type")]
    pub return_type: String,
    /// Whether the method takes an implicit `this` argument
    #[serde(default)]
    pub has_this: bool,
}

fn void_type() -> String {
    "System.Void".to_string()
}

impl MethodRef {
    /// Number of declared parameters (the receiver is not counted)
    #[must_use]
    pub fn param_count(&self) -> usize {
        self.parameters.len()
    }

    /// Whether a call leaves a return value on the stack
    #[must_use]
    pub fn returns_value(&self) -> bool {
        self.return_type != "System.Void"
    }

    /// `Namespace.Type::Name`
    #[must_use]
    pub fn full_name(&self) -> String {
        format!("{}::{}", self.declaring_type, self.name)
    }

    /// Returns `true` if this is `declaring_type::name`, ignoring the signature.
    #[must_use]
    pub fn is(&self, declaring_type: &str, name: &str) -> bool {
        self.declaring_type == declaring_type && self.name == name
    }

    /// Returns `true` for instance and static constructors.
    #[must_use]
    pub fn is_constructor(&self) -> bool {
        self.name == ".ctor" || self.name == ".cctor"
    }
}

impl fmt::Display for MethodRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {}::{}({})",
            self.return_type,
            self.declaring_type,
            self.name,
            self.parameters.join(",")
        )
    }
}

/// A field as seen from a load or store instruction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldRef {
    /// `Field` or `MemberRef` token identifying the field
    pub token: Token,
    /// Full name of the declaring type
    pub declaring_type: String,
    /// Field name
    pub name: String,
    /// Field type name
    pub field_type: String,
    /// Whether the field is static
    #[serde(default)]
    pub is_static: bool,
}

impl FieldRef {
    /// `Namespace.Type::Name`
    #[must_use]
    pub fn full_name(&self) -> String {
        format!("{}::{}", self.declaring_type, self.name)
    }
}

impl fmt::Display for FieldRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}::{}", self.field_type, self.declaring_type, self.name)
    }
}

/// One entry of the member table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum MemberRef {
    /// A method target
    Method(MethodRefRc),
    /// A field target
    Field(FieldRefRc),
}

impl MemberRef {
    /// Token of the referenced member
    #[must_use]
    pub fn token(&self) -> Token {
        match self {
            MemberRef::Method(method) => method.token,
            MemberRef::Field(field) => field.token,
        }
    }
}

/// Token-indexed table of every member an assembly's bytecode refers to.
///
/// Serialized as a plain list; the token index is rebuilt on deserialization. When two
/// entries share a token the later one wins.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(from = "Vec<MemberRef>", into = "Vec<MemberRef>")]
pub struct MemberTable {
    entries: Vec<MemberRef>,
    index: HashMap<Token, usize>,
}

impl MemberTable {
    /// Creates an empty table
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces an entry
    pub fn insert(&mut self, member: MemberRef) {
        let token = member.token();
        if let Some(&slot) = self.index.get(&token) {
            self.entries[slot] = member;
        } else {
            self.index.insert(token, self.entries.len());
            self.entries.push(member);
        }
    }

    /// Looks up any member by token
    #[must_use]
    pub fn get(&self, token: Token) -> Option<&MemberRef> {
        self.index.get(&token).map(|&slot| &self.entries[slot])
    }

    /// Looks up a method by token
    #[must_use]
    pub fn method(&self, token: Token) -> Option<&MethodRefRc> {
        match self.get(token) {
            Some(MemberRef::Method(method)) => Some(method),
            _ => None,
        }
    }

    /// Looks up a field by token
    #[must_use]
    pub fn field(&self, token: Token) -> Option<&FieldRefRc> {
        match self.get(token) {
            Some(MemberRef::Field(field)) => Some(field),
            _ => None,
        }
    }

    /// Number of entries
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if the table has no entries
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterates entries in insertion order
    pub fn iter(&self) -> impl Iterator<Item = &MemberRef> {
        self.entries.iter()
    }
}

impl From<Vec<MemberRef>> for MemberTable {
    fn from(entries: Vec<MemberRef>) -> Self {
        let mut table = MemberTable::new();
        for entry in entries {
            table.insert(entry);
        }
        table
    }
}

impl From<MemberTable> for Vec<MemberRef> {
    fn from(table: MemberTable) -> Self {
        table.entries
    }
}
