//! EIP-712 Type Registry
//!
//! Named struct definitions and the `encodeType` rules over them.

use super::types::{is_valid_identifier, Eip712Error, FieldKind, TypedDataField};
use crate::utils::crypto::keccak256;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashSet};

/// Closed mapping from struct name to its ordered field list
///
/// Backed by a `BTreeMap`, so nothing observable depends on the order in
/// which types were inserted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TypeRegistry {
    types: BTreeMap<String, Vec<TypedDataField>>,
}

impl TypeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a struct definition, returning the previous one
    pub fn insert(
        &mut self,
        name: impl Into<String>,
        fields: Vec<TypedDataField>,
    ) -> Option<Vec<TypedDataField>> {
        self.types.insert(name.into(), fields)
    }

    /// Builder form of [`TypeRegistry::insert`]
    pub fn with_type(mut self, name: impl Into<String>, fields: Vec<TypedDataField>) -> Self {
        self.insert(name, fields);
        self
    }

    pub fn get(&self, name: &str) -> Option<&[TypedDataField]> {
        self.types.get(name).map(Vec::as_slice)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.types.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    /// Check the registry is well-formed and closed under reference
    pub fn validate(&self) -> Result<(), Eip712Error> {
        for (type_name, fields) in &self.types {
            if !is_valid_identifier(type_name) {
                return Err(Eip712Error::InvalidType(format!(
                    "invalid struct name `{}`",
                    type_name
                )));
            }
            if !matches!(FieldKind::parse(type_name), Ok(FieldKind::Struct(_))) {
                return Err(Eip712Error::InvalidType(format!(
                    "struct name `{}` collides with an elementary type",
                    type_name
                )));
            }

            let mut seen = HashSet::new();
            for field in fields {
                if !is_valid_identifier(&field.name) {
                    return Err(Eip712Error::InvalidType(format!(
                        "invalid field name `{}` in {}",
                        field.name, type_name
                    )));
                }
                if !seen.insert(field.name.as_str()) {
                    return Err(Eip712Error::InvalidType(format!(
                        "duplicate field `{}` in {}",
                        field.name, type_name
                    )));
                }
                self.check_type_reference(&field.type_name)?;
            }
        }

        Ok(())
    }

    /// A field type must be elementary, or an array of something valid, or
    /// a registered struct
    fn check_type_reference(&self, type_name: &str) -> Result<(), Eip712Error> {
        match FieldKind::parse(type_name)? {
            FieldKind::Array { element, .. } => self.check_type_reference(element),
            FieldKind::Struct(name) if !self.contains(name) => {
                Err(Eip712Error::UnknownType(name.to_string()))
            }
            _ => Ok(()),
        }
    }

    /// All struct types reachable from `type_name`, including itself
    pub fn dependencies(&self, type_name: &str) -> Result<BTreeSet<String>, Eip712Error> {
        if !self.contains(type_name) {
            return Err(Eip712Error::UnknownType(type_name.to_string()));
        }

        let mut dependencies = BTreeSet::new();
        let mut to_visit = vec![type_name.to_string()];

        while let Some(current) = to_visit.pop() {
            if dependencies.contains(&current) {
                continue;
            }

            let fields = self
                .types
                .get(&current)
                .ok_or_else(|| Eip712Error::UnknownType(current.clone()))?;

            for field in fields {
                if let Some(dep) = FieldKind::parse(&field.type_name)?.struct_name() {
                    if !dependencies.contains(dep) {
                        to_visit.push(dep.to_string());
                    }
                }
            }

            dependencies.insert(current);
        }

        Ok(dependencies)
    }

    /// Encode a type string for a struct type
    ///
    /// Format: `Root(type1 name1,...)` followed by every referenced struct,
    /// sorted by name, each once.
    pub fn encode_type(&self, type_name: &str) -> Result<String, Eip712Error> {
        let mut dependencies = self.dependencies(type_name)?;
        dependencies.remove(type_name);

        let mut result = self.format_type_string(type_name)?;
        for dep in &dependencies {
            result.push_str(&self.format_type_string(dep)?);
        }

        Ok(result)
    }

    /// Format a single `Name(type name,...)` segment
    fn format_type_string(&self, type_name: &str) -> Result<String, Eip712Error> {
        let fields = self
            .get(type_name)
            .ok_or_else(|| Eip712Error::UnknownType(type_name.to_string()))?;

        let field_strs: Vec<String> = fields
            .iter()
            .map(|f| format!("{} {}", f.type_name, f.name))
            .collect();

        Ok(format!("{}({})", type_name, field_strs.join(",")))
    }

    /// typeHash = keccak256(encodeType(typeOf(s)))
    pub fn type_hash(&self, type_name: &str) -> Result<[u8; 32], Eip712Error> {
        let encoded = self.encode_type(type_name)?;
        Ok(keccak256(encoded.as_bytes()))
    }
}

impl FromIterator<(String, Vec<TypedDataField>)> for TypeRegistry {
    fn from_iter<I: IntoIterator<Item = (String, Vec<TypedDataField>)>>(iter: I) -> Self {
        Self {
            types: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod registry_tests {
    use super::*;

    fn mail_registry() -> TypeRegistry {
        TypeRegistry::new()
            .with_type(
                "Mail",
                vec![
                    TypedDataField::new("from", "Person"),
                    TypedDataField::new("to", "Person"),
                    TypedDataField::new("contents", "string"),
                ],
            )
            .with_type(
                "Person",
                vec![
                    TypedDataField::new("name", "string"),
                    TypedDataField::new("wallet", "address"),
                ],
            )
    }

    #[test]
    fn test_encode_type_simple() {
        let registry = mail_registry();
        assert_eq!(
            registry.encode_type("Person").unwrap(),
            "Person(string name,address wallet)"
        );
    }

    #[test]
    fn test_encode_type_with_dependencies() {
        let registry = mail_registry();
        assert_eq!(
            registry.encode_type("Mail").unwrap(),
            "Mail(Person from,Person to,string contents)Person(string name,address wallet)"
        );
    }

    #[test]
    fn test_encode_type_sorts_dependencies_alphabetically() {
        // Discovery order is TransactionGroup first, OrderInfo second
        let registry = TypeRegistry::new()
            .with_type(
                "TransactionDetails",
                vec![
                    TypedDataField::new("actionType", "string"),
                    TypedDataField::new("transactions", "TransactionGroup"),
                ],
            )
            .with_type(
                "TransactionGroup",
                vec![
                    TypedDataField::new("orders", "OrderInfo[]"),
                    TypedDataField::new("participantContributions", "uint256[]"),
                ],
            )
            .with_type("OrderInfo", vec![TypedDataField::new("deadline", "uint256")]);

        assert_eq!(
            registry.encode_type("TransactionDetails").unwrap(),
            "TransactionDetails(string actionType,TransactionGroup transactions)\
             OrderInfo(uint256 deadline)\
             TransactionGroup(OrderInfo[] orders,uint256[] participantContributions)"
        );
    }

    #[test]
    fn test_encode_type_recursive_struct() {
        let registry = TypeRegistry::new().with_type(
            "Node",
            vec![
                TypedDataField::new("value", "uint256"),
                TypedDataField::new("children", "Node[]"),
            ],
        );
        assert_eq!(
            registry.encode_type("Node").unwrap(),
            "Node(uint256 value,Node[] children)"
        );
    }

    #[test]
    fn test_unknown_reference() {
        let registry = TypeRegistry::new()
            .with_type("Mail", vec![TypedDataField::new("from", "Person")]);

        assert_eq!(
            registry.encode_type("Mail").unwrap_err(),
            Eip712Error::UnknownType("Person".to_string())
        );
        assert_eq!(
            registry.validate().unwrap_err(),
            Eip712Error::UnknownType("Person".to_string())
        );
        assert_eq!(
            registry.encode_type("Nope").unwrap_err(),
            Eip712Error::UnknownType("Nope".to_string())
        );
    }

    #[test]
    fn test_validate_catches_nested_array_reference() {
        let registry = TypeRegistry::new()
            .with_type("Batch", vec![TypedDataField::new("orders", "Order[][]")]);
        assert_eq!(
            registry.validate().unwrap_err(),
            Eip712Error::UnknownType("Order".to_string())
        );
    }

    #[test]
    fn test_validate_rejects_malformed_definitions() {
        let duplicate = TypeRegistry::new().with_type(
            "Pair",
            vec![
                TypedDataField::new("a", "uint256"),
                TypedDataField::new("a", "uint256"),
            ],
        );
        assert!(matches!(duplicate.validate(), Err(Eip712Error::InvalidType(_))));

        let shadowing = TypeRegistry::new()
            .with_type("address", vec![TypedDataField::new("a", "uint256")]);
        assert!(matches!(shadowing.validate(), Err(Eip712Error::InvalidType(_))));

        let bad_field = TypeRegistry::new()
            .with_type("Pair", vec![TypedDataField::new("a,b", "uint256")]);
        assert!(matches!(bad_field.validate(), Err(Eip712Error::InvalidType(_))));

        let bad_width = TypeRegistry::new()
            .with_type("Pair", vec![TypedDataField::new("a", "uint7")]);
        assert!(matches!(bad_width.validate(), Err(Eip712Error::InvalidType(_))));
    }

    #[test]
    fn test_dependencies_include_root() {
        let deps = mail_registry().dependencies("Mail").unwrap();
        assert_eq!(
            deps.into_iter().collect::<Vec<_>>(),
            vec!["Mail".to_string(), "Person".to_string()]
        );
    }

    #[test]
    fn test_type_hash_mail() {
        let hash = mail_registry().type_hash("Mail").unwrap();
        assert_eq!(
            hex::encode(hash),
            "a0cedeb2dc280ba39b857546d74f5549c3a1d7bdc2dd96bf881f76108e23dac2"
        );
    }

    #[test]
    fn test_json_round_shape() {
        let json = r#"{"Person":[{"name":"name","type":"string"},{"name":"wallet","type":"address"}]}"#;
        let registry: TypeRegistry = serde_json::from_str(json).unwrap();
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.get("Person").unwrap()[1], TypedDataField::new("wallet", "address"));
        assert_eq!(serde_json::to_string(&registry).unwrap(), json);
    }
}
