//! Attribute types and matching rules.
//!
//! The registry is built once at partition setup and only read afterwards,
//! so evaluators borrow attribute types and rules straight out of it.

mod normalizer;

use std::cmp::Ordering;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::error::{Error, Result};

pub use normalizer::{
    Comparator, DeepTrim, DeepTrimToLower, Identity, LexicalComparator, Normalizer,
    NumericString, TelephoneNumber,
};

/// OIDs of operational attributes every entry carries.
const ALWAYS_PRESENT: [&str; 3] = [
    "2.5.4.0",                    // objectClass
    "1.3.6.1.1.16.4",             // entryUUID
    "1.3.6.1.4.1.4203.666.1.7",   // entryCSN
];

/// A normalizer paired with a comparator.
#[derive(Clone)]
pub struct MatchingRule {
    name: String,
    normalizer: Arc<dyn Normalizer>,
    comparator: Arc<dyn Comparator>,
}

impl MatchingRule {
    pub fn new(
        name: impl Into<String>,
        normalizer: impl Normalizer + 'static,
        comparator: impl Comparator + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            normalizer: Arc::new(normalizer),
            comparator: Arc::new(comparator),
        }
    }

    /// Case-insensitive rule (`caseIgnoreMatch` and friends).
    pub fn case_ignore(name: &str) -> Self {
        Self::new(name, DeepTrimToLower, LexicalComparator)
    }

    /// Case-sensitive rule (`caseExactMatch` and friends).
    pub fn case_exact(name: &str) -> Self {
        Self::new(name, DeepTrim, LexicalComparator)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Normalize a value.
    pub fn normalize(&self, value: &str) -> Result<String> {
        self.normalizer.normalize(value)
    }

    /// Compare two normalized values.
    pub fn compare(&self, a: &str, b: &str) -> Ordering {
        self.comparator.compare(a, b)
    }
}

impl fmt::Debug for MatchingRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MatchingRule")
            .field("name", &self.name)
            .field("normalizer", &self.normalizer)
            .finish()
    }
}

/// Schema definition of an attribute.
#[derive(Debug, Clone)]
pub struct AttributeType {
    oid: String,
    names: Vec<String>,
    equality: Option<MatchingRule>,
    ordering: Option<MatchingRule>,
    substring: Option<MatchingRule>,
}

impl AttributeType {
    /// Create an attribute type without matching rules.
    pub fn new(oid: impl Into<String>, names: &[&str]) -> Self {
        Self {
            oid: oid.into(),
            names: names.iter().map(|n| n.to_string()).collect(),
            equality: None,
            ordering: None,
            substring: None,
        }
    }

    pub fn with_equality(mut self, rule: MatchingRule) -> Self {
        self.equality = Some(rule);
        self
    }

    pub fn with_ordering(mut self, rule: MatchingRule) -> Self {
        self.ordering = Some(rule);
        self
    }

    pub fn with_substring(mut self, rule: MatchingRule) -> Self {
        self.substring = Some(rule);
        self
    }

    /// Case-insensitive string attribute with all three rules.
    pub fn directory_string(oid: &str, names: &[&str]) -> Self {
        Self::new(oid, names)
            .with_equality(MatchingRule::case_ignore("caseIgnoreMatch"))
            .with_ordering(MatchingRule::case_ignore("caseIgnoreOrderingMatch"))
            .with_substring(MatchingRule::case_ignore("caseIgnoreSubstringsMatch"))
    }

    pub fn oid(&self) -> &str {
        &self.oid
    }

    /// Primary name, or the OID when the type has none.
    pub fn name(&self) -> &str {
        self.names.first().map(String::as_str).unwrap_or(&self.oid)
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// Whether `description` is the OID or one of the names of this type.
    pub fn is_named(&self, description: &str) -> bool {
        let description = description.trim();
        self.oid == description || self.names.iter().any(|n| n.eq_ignore_ascii_case(description))
    }

    pub fn equality(&self) -> Option<&MatchingRule> {
        self.equality.as_ref()
    }

    pub fn ordering(&self) -> Option<&MatchingRule> {
        self.ordering.as_ref()
    }

    pub fn substring(&self) -> Option<&MatchingRule> {
        self.substring.as_ref()
    }

    /// Substring rule, falling back to the equality rule.
    pub fn substring_or_equality(&self) -> Option<&MatchingRule> {
        self.substring.as_ref().or(self.equality.as_ref())
    }

    /// Normalize a value the way the attribute's index stores it.
    pub fn index_form(&self, value: &str) -> Result<String> {
        match self
            .equality
            .as_ref()
            .or(self.ordering.as_ref())
            .or(self.substring.as_ref())
        {
            Some(rule) => rule.normalize(value),
            None => Ok(value.to_string()),
        }
    }

    /// Whether every entry carries this attribute.
    pub fn is_always_present(&self) -> bool {
        ALWAYS_PRESENT.contains(&self.oid.as_str())
    }
}

/// Registry of attribute types, looked up by OID or any name.
#[derive(Debug, Default)]
pub struct SchemaRegistry {
    types: Vec<AttributeType>,
    by_name: HashMap<String, usize>,
}

impl SchemaRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the core directory attribute types.
    pub fn core() -> Self {
        let mut registry = Self::new();
        for at in Self::core_types() {
            let registered = registry.register(at);
            debug_assert!(registered.is_ok(), "core attribute types clash: {:?}", registered);
        }
        registry
    }

    fn core_types() -> Vec<AttributeType> {
        let oid_rule = || MatchingRule::case_ignore("objectIdentifierMatch");
        vec![
            AttributeType::new("2.5.4.0", &["objectClass"]).with_equality(oid_rule()),
            AttributeType::new("2.5.4.1", &["aliasedObjectName", "aliasedEntryName"])
                .with_equality(MatchingRule::case_ignore("distinguishedNameMatch")),
            AttributeType::directory_string("2.5.4.3", &["cn", "commonName"]),
            AttributeType::directory_string("2.5.4.4", &["sn", "surname"]),
            AttributeType::directory_string("2.5.4.10", &["o", "organizationName"]),
            AttributeType::directory_string("2.5.4.11", &["ou", "organizationalUnitName"]),
            AttributeType::new("2.5.4.13", &["description"])
                .with_equality(MatchingRule::case_ignore("caseIgnoreMatch"))
                .with_substring(MatchingRule::case_ignore("caseIgnoreSubstringsMatch")),
            AttributeType::directory_string("2.5.4.17", &["postalCode"]),
            AttributeType::new("2.5.4.20", &["telephoneNumber"])
                .with_equality(MatchingRule::new(
                    "telephoneNumberMatch",
                    TelephoneNumber,
                    LexicalComparator,
                ))
                .with_substring(MatchingRule::new(
                    "telephoneNumberSubstringsMatch",
                    TelephoneNumber,
                    LexicalComparator,
                )),
            AttributeType::new("0.9.2342.19200300.100.1.1", &["uid", "userid"])
                .with_equality(MatchingRule::case_ignore("caseIgnoreMatch"))
                .with_substring(MatchingRule::case_ignore("caseIgnoreSubstringsMatch")),
            AttributeType::new("0.9.2342.19200300.100.1.3", &["mail", "rfc822Mailbox"])
                .with_equality(MatchingRule::case_ignore("caseIgnoreIA5Match"))
                .with_substring(MatchingRule::case_ignore("caseIgnoreIA5SubstringsMatch")),
            AttributeType::new("2.5.4.5", &["serialNumber"])
                .with_equality(MatchingRule::new(
                    "numericStringMatch",
                    NumericString,
                    LexicalComparator,
                ))
                .with_ordering(MatchingRule::new(
                    "numericStringOrderingMatch",
                    NumericString,
                    LexicalComparator,
                )),
            AttributeType::new("1.3.6.1.1.16.4", &["entryUUID"])
                .with_equality(MatchingRule::case_ignore("uuidMatch"))
                .with_ordering(MatchingRule::case_ignore("uuidOrderingMatch")),
            AttributeType::new("1.3.6.1.4.1.4203.666.1.7", &["entryCSN"])
                .with_equality(MatchingRule::case_exact("csnMatch"))
                .with_ordering(MatchingRule::case_exact("csnOrderingMatch")),
        ]
    }

    /// Add an attribute type. Fails if its OID or a name is taken.
    pub fn register(&mut self, at: AttributeType) -> Result<()> {
        let keys: Vec<String> = std::iter::once(at.oid.clone())
            .chain(at.names.iter().map(|n| n.to_ascii_lowercase()))
            .collect();
        if let Some(taken) = keys.iter().find(|k| self.by_name.contains_key(*k)) {
            return Err(Error::IllegalArgument(format!(
                "attribute type '{}' is already registered",
                taken
            )));
        }
        let slot = self.types.len();
        self.types.push(at);
        for key in keys {
            self.by_name.insert(key, slot);
        }
        Ok(())
    }

    /// Attribute type for a name or OID.
    pub fn get(&self, description: &str) -> Option<&AttributeType> {
        let key = description.trim().to_ascii_lowercase();
        self.by_name.get(&key).map(|&slot| &self.types[slot])
    }

    /// Attribute type for a name or OID; unknown descriptions are an
    /// `IllegalState`.
    pub fn lookup(&self, description: &str) -> Result<&AttributeType> {
        self.get(description).ok_or_else(|| {
            Error::IllegalState(format!("no attribute type named '{}'", description))
        })
    }

    /// Number of registered types.
    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_by_any_name() {
        let schema = SchemaRegistry::core();
        let cn = schema.lookup("commonName").unwrap();
        assert_eq!(cn.oid(), "2.5.4.3");
        assert!(std::ptr::eq(cn, schema.lookup("CN").unwrap()));
        assert!(std::ptr::eq(cn, schema.lookup("2.5.4.3").unwrap()));
        assert!(cn.is_named("commonname"));
        assert!(!cn.is_named("sn"));
        assert!(matches!(
            schema.lookup("bogus"),
            Err(Error::IllegalState(_))
        ));
    }

    #[test]
    fn test_rules() {
        let schema = SchemaRegistry::core();
        let postal = schema.lookup("postalCode").unwrap();
        assert!(postal.ordering().is_some());
        assert_eq!(postal.index_form(" 9 4 ").unwrap(), "9 4");

        let phone = schema.lookup("telephoneNumber").unwrap();
        assert!(phone.ordering().is_none());
        assert_eq!(phone.index_form("555-1234").unwrap(), "5551234");

        let oc = schema.lookup("objectClass").unwrap();
        assert!(oc.substring_or_equality().is_some());
        assert!(oc.substring().is_none());
        assert!(oc.is_always_present());
        assert!(!postal.is_always_present());
    }

    #[test]
    fn test_core_types_all_register() {
        let types = SchemaRegistry::core_types();
        let mut schema = SchemaRegistry::new();
        for at in types.iter().cloned() {
            schema.register(at).unwrap();
        }
        assert_eq!(SchemaRegistry::core().len(), types.len());
    }

    #[test]
    fn test_register_rejects_duplicates() {
        let mut schema = SchemaRegistry::core();
        let count = schema.len();
        let dup = AttributeType::new("1.2.3.4", &["CN"]);
        assert!(matches!(
            schema.register(dup),
            Err(Error::IllegalArgument(_))
        ));
        assert_eq!(schema.len(), count);

        schema
            .register(AttributeType::directory_string("1.2.3.4", &["favouriteDrink"]))
            .unwrap();
        assert_eq!(schema.lookup("favouritedrink").unwrap().name(), "favouriteDrink");
    }

    #[test]
    fn test_name_falls_back_to_oid() {
        let at = AttributeType::new("1.2.3", &[]);
        assert_eq!(at.name(), "1.2.3");
        assert!(at.is_named("1.2.3"));
        assert_eq!(at.index_form(" Raw ").unwrap(), " Raw ");
    }
}
