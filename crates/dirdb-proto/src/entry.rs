//! Directory entry model.

use rkyv::{Archive, Deserialize, Serialize};
use serde::{Deserialize as SerdeDeserialize, Serialize as SerdeSerialize};

use crate::error::Error;

/// Identifier of an entry in the master table.
pub type EntryId = u64;

/// One attribute of an entry with its raw (user-provided) values.
#[derive(Debug, Clone, PartialEq, Eq, Archive, Serialize, Deserialize, SerdeSerialize, SerdeDeserialize)]
pub struct Attribute {
    /// Attribute description as written by the client (name or OID).
    pub name: String,
    /// Raw values.
    pub values: Vec<String>,
}

impl Attribute {
    /// Create an attribute with the given values.
    pub fn new<I, S>(name: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            values: values.into_iter().map(Into::into).collect(),
        }
    }
}

/// A directory entry as stored in the master table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Archive, Serialize, Deserialize, SerdeSerialize, SerdeDeserialize)]
pub struct Entry {
    /// Distinguished name, carried opaquely.
    pub dn: String,
    /// Attributes in insertion order.
    pub attributes: Vec<Attribute>,
}

impl Entry {
    /// Create an entry without attributes.
    pub fn new(dn: impl Into<String>) -> Self {
        Self {
            dn: dn.into(),
            attributes: Vec::new(),
        }
    }

    /// Add values for an attribute, merging with an existing attribute of
    /// the same description.
    pub fn with<I, S>(mut self, name: &str, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let values: Vec<String> = values.into_iter().map(Into::into).collect();
        match self
            .attributes
            .iter_mut()
            .find(|attr| attr.name.eq_ignore_ascii_case(name))
        {
            Some(attr) => attr.values.extend(values),
            None => self.attributes.push(Attribute {
                name: name.to_string(),
                values,
            }),
        }
        self
    }

    /// Values of the attribute with the given description (case-insensitive).
    pub fn get(&self, name: &str) -> Option<&Attribute> {
        self.attributes
            .iter()
            .find(|attr| attr.name.eq_ignore_ascii_case(name))
    }

    /// Whether the entry carries the `alias` object class.
    pub fn is_alias(&self) -> bool {
        self.get("objectClass")
            .map(|attr| attr.values.iter().any(|v| v.trim().eq_ignore_ascii_case("alias")))
            .unwrap_or(false)
    }

    /// Check the entry for empty attribute descriptions or value lists.
    pub fn validate(&self) -> Result<(), Error> {
        for attr in &self.attributes {
            if attr.name.trim().is_empty() {
                return Err(Error::InvalidEntry(format!(
                    "entry '{}' has an attribute without a description",
                    self.dn
                )));
            }
            if attr.values.is_empty() {
                return Err(Error::InvalidEntry(format!(
                    "attribute '{}' of entry '{}' has no values",
                    attr.name, self.dn
                )));
            }
        }
        Ok(())
    }

    /// Serialize the entry to bytes using rkyv.
    pub fn to_bytes(&self) -> Result<Vec<u8>, rkyv::rancor::Error> {
        rkyv::to_bytes::<rkyv::rancor::Error>(self).map(|v| v.to_vec())
    }

    /// Deserialize an entry from bytes produced by [`Entry::to_bytes`].
    ///
    /// The bytes are copied into an aligned buffer first; storage engines
    /// hand out values without alignment guarantees.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, rkyv::rancor::Error> {
        let mut aligned = rkyv::util::AlignedVec::<16>::with_capacity(bytes.len());
        aligned.extend_from_slice(bytes);
        rkyv::from_bytes::<Self, rkyv::rancor::Error>(&aligned)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn person() -> Entry {
        Entry::new("cn=JOhnny WAlkeR,ou=Sales,o=Good Times Co.")
            .with("objectClass", ["top", "person"])
            .with("cn", ["JOhnny WAlkeR"])
            .with("sn", ["WAlkeR"])
    }

    #[test]
    fn test_get_is_case_insensitive() {
        let entry = person();
        assert_eq!(entry.get("CN").unwrap().values, vec!["JOhnny WAlkeR"]);
        assert!(entry.get("ou").is_none());
    }

    #[test]
    fn test_with_merges_values() {
        let entry = person().with("CN", ["Johnny"]);
        assert_eq!(entry.get("cn").unwrap().values.len(), 2);
        assert_eq!(entry.attributes.len(), 3);
    }

    #[test]
    fn test_is_alias() {
        assert!(!person().is_alias());
        let alias = Entry::new("commonName=Jim Bean,ou=Apache,ou=Board of Directors,o=Good Times Co.")
            .with("objectClass", ["top", "alias", "extensibleObject"]);
        assert!(alias.is_alias());
    }

    #[test]
    fn test_validate() {
        assert!(person().validate().is_ok());
        let broken = Entry::new("cn=x").with("cn", Vec::<String>::new());
        assert!(matches!(broken.validate(), Err(Error::InvalidEntry(_))));
    }

    #[test]
    fn test_entry_roundtrip() {
        let entry = person();
        let bytes = entry.to_bytes().unwrap();
        let decoded = Entry::from_bytes(&bytes).unwrap();
        assert_eq!(entry, decoded);
    }
}
