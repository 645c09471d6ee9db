use std::collections::HashMap;

/// A directory object as returned by a search: its DN and the textual
/// values of every attribute that was requested.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DirectoryEntry {
    pub dn: String,
    pub attributes: HashMap<String, Vec<String>>,
}

impl DirectoryEntry {
    pub fn new(dn: impl Into<String>) -> Self {
        Self {
            dn: dn.into(),
            attributes: HashMap::new(),
        }
    }

    pub fn with_attribute<I, V>(mut self, name: &str, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<String>,
    {
        self.attributes
            .insert(name.to_string(), values.into_iter().map(Into::into).collect());
        self
    }

    /// All values of an attribute. Attribute names compare case-insensitively.
    pub fn values(&self, name: &str) -> &[String] {
        self.attributes
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, values)| values.as_slice())
            .unwrap_or(&[])
    }

    pub fn first(&self, name: &str) -> Option<&str> {
        self.values(name).first().map(String::as_str)
    }

    pub fn first_owned(&self, name: &str) -> Option<String> {
        self.first(name).map(str::to_string)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchScope {
    Base,
    OneLevel,
    Subtree,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModifyOperation {
    Replace,
    Add,
    Remove,
}

/// One element of a modify-batch request.
#[derive(Debug, Clone, PartialEq)]
pub struct Modification {
    pub attribute: String,
    pub operation: ModifyOperation,
    pub values: Vec<Vec<u8>>,
}

impl Modification {
    pub fn replace(attribute: &str, value: impl Into<Vec<u8>>) -> Self {
        Self {
            attribute: attribute.to_string(),
            operation: ModifyOperation::Replace,
            values: vec![value.into()],
        }
    }

    pub fn add(attribute: &str, value: impl Into<Vec<u8>>) -> Self {
        Self {
            attribute: attribute.to_string(),
            operation: ModifyOperation::Add,
            values: vec![value.into()],
        }
    }

    pub fn remove(attribute: &str, value: impl Into<Vec<u8>>) -> Self {
        Self {
            attribute: attribute.to_string(),
            operation: ModifyOperation::Remove,
            values: vec![value.into()],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn attribute_lookup_ignores_case() {
        let entry = DirectoryEntry::new("CN=jdoe,DC=example,DC=com")
            .with_attribute("sAMAccountName", ["jdoe"]);

        assert_eq!(entry.first("samaccountname"), Some("jdoe"));
        assert_eq!(entry.first("SAMACCOUNTNAME"), Some("jdoe"));
        assert!(entry.values("mail").is_empty());
    }
}
