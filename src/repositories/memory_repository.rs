use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::models::{DirectoryEntry, Modification, ModifyOperation, SearchScope, ServiceError};
use crate::repositories::{result_error, DirectoryRepository, RC_NO_SUCH_OBJECT};

const RC_NO_SUCH_ATTRIBUTE: u32 = 16;
const RC_TYPE_OR_VALUE_EXISTS: u32 = 20;
const RC_INSUFFICIENT_ACCESS: u32 = 50;
const RC_BUSY: u32 = 51;
const RC_FILTER_ERROR: u32 = 87;

/// An attribute as stored: the name in its original spelling plus raw values.
#[derive(Debug, Clone)]
struct StoredAttribute {
    name: String,
    values: Vec<Vec<u8>>,
}

#[derive(Debug, Clone)]
struct StoredEntry {
    dn: String,
    // keyed by lowercased attribute name
    attributes: BTreeMap<String, StoredAttribute>,
}

impl StoredEntry {
    fn from_entry(entry: DirectoryEntry) -> Self {
        let mut attributes = BTreeMap::new();
        for (name, values) in entry.attributes {
            attributes.insert(
                name.to_ascii_lowercase(),
                StoredAttribute {
                    name,
                    values: values.into_iter().map(String::into_bytes).collect(),
                },
            );
        }
        attributes
            .entry("objectclass".to_string())
            .or_insert_with(|| StoredAttribute {
                name: "objectClass".to_string(),
                values: vec![b"top".to_vec()],
            });
        Self {
            dn: entry.dn,
            attributes,
        }
    }

    fn text_values(&self, name: &str) -> Vec<String> {
        self.attributes
            .get(&name.to_ascii_lowercase())
            .map(|attr| {
                attr.values
                    .iter()
                    .filter_map(|v| String::from_utf8(v.clone()).ok())
                    .collect()
            })
            .unwrap_or_default()
    }

    fn project(&self, attributes: &[&str]) -> DirectoryEntry {
        let wanted: Option<HashSet<String>> = if attributes.is_empty() || attributes.contains(&"*") {
            None
        } else {
            Some(attributes.iter().map(|a| a.to_ascii_lowercase()).collect())
        };

        let mut entry = DirectoryEntry::new(self.dn.clone());
        for (key, attr) in &self.attributes {
            // write-only in Active Directory
            if key == "unicodepwd" {
                continue;
            }
            if wanted.as_ref().is_some_and(|w| !w.contains(key)) {
                continue;
            }
            let values: Vec<String> = attr
                .values
                .iter()
                .filter_map(|v| String::from_utf8(v.clone()).ok())
                .collect();
            entry.attributes.insert(attr.name.clone(), values);
        }
        entry
    }
}

/// In-process directory with LDAP-like search and modify semantics.
///
/// Supports the filter grammar subset `&`, `|`, `!`, equality, presence and
/// substring assertions with RFC 4515 escapes. Value matching is
/// case-insensitive, as with Active Directory's default matching rules.
/// Changes to a group's `member` attribute maintain the `memberOf`
/// back-link on the member entries.
#[derive(Default)]
pub struct InMemoryDirectoryRepository {
    entries: RwLock<BTreeMap<String, StoredEntry>>,
    unreadable: RwLock<HashSet<String>>,
    busy: AtomicBool,
    search_calls: AtomicUsize,
    modify_calls: AtomicUsize,
}

impl InMemoryDirectoryRepository {
    pub fn with_entries(entries: impl IntoIterator<Item = DirectoryEntry>) -> Self {
        let map = entries
            .into_iter()
            .map(|entry| (entry.dn.to_ascii_lowercase(), StoredEntry::from_entry(entry)))
            .collect();
        Self {
            entries: RwLock::new(map),
            ..Self::default()
        }
    }

    pub async fn insert(&self, entry: DirectoryEntry) {
        self.entries
            .write()
            .await
            .insert(entry.dn.to_ascii_lowercase(), StoredEntry::from_entry(entry));
    }

    /// Reads an entry with all readable attributes, bypassing call counters.
    pub async fn entry(&self, dn: &str) -> Option<DirectoryEntry> {
        self.entries
            .read()
            .await
            .get(&dn.to_ascii_lowercase())
            .map(|stored| stored.project(&[]))
    }

    /// Raw values of an attribute, including write-only ones such as `unicodePwd`.
    pub async fn raw_values(&self, dn: &str, attribute: &str) -> Vec<Vec<u8>> {
        self.entries
            .read()
            .await
            .get(&dn.to_ascii_lowercase())
            .and_then(|stored| stored.attributes.get(&attribute.to_ascii_lowercase()))
            .map(|attr| attr.values.clone())
            .unwrap_or_default()
    }

    /// Makes base-scope reads of `dn` fail with an access error.
    pub async fn deny_reads(&self, dn: &str) {
        self.unreadable.write().await.insert(dn.to_ascii_lowercase());
    }

    /// Makes every search fail as if the server were busy.
    pub fn fail_searches(&self) {
        self.busy.store(true, Ordering::SeqCst);
    }

    pub fn search_calls(&self) -> usize {
        self.search_calls.load(Ordering::SeqCst)
    }

    pub fn modify_calls(&self) -> usize {
        self.modify_calls.load(Ordering::SeqCst)
    }
}

fn in_scope(dn: &str, base: &str, scope: SearchScope) -> bool {
    match scope {
        SearchScope::Base => dn == base,
        SearchScope::OneLevel => parent_dn(dn) == Some(base),
        SearchScope::Subtree => base.is_empty() || dn == base || dn.ends_with(&format!(",{}", base)),
    }
}

fn parent_dn(dn: &str) -> Option<&str> {
    let bytes = dn.as_bytes();
    let mut pos = 0;
    while pos < bytes.len() {
        match bytes[pos] {
            b'\\' => pos += 2,
            b',' => return Some(&dn[pos + 1..]),
            _ => pos += 1,
        }
    }
    None
}

fn apply_modification(entry: &mut StoredEntry, modification: Modification) -> Result<(), ServiceError> {
    let key = modification.attribute.to_ascii_lowercase();
    match modification.operation {
        ModifyOperation::Replace => {
            if modification.values.is_empty() {
                entry.attributes.remove(&key);
            } else {
                entry.attributes.insert(
                    key,
                    StoredAttribute {
                        name: modification.attribute,
                        values: modification.values,
                    },
                );
            }
        }
        ModifyOperation::Add => {
            let attr = entry.attributes.entry(key).or_insert_with(|| StoredAttribute {
                name: modification.attribute.clone(),
                values: Vec::new(),
            });
            for value in modification.values {
                if attr.values.iter().any(|existing| values_equal(existing, &value)) {
                    return Err(result_error(RC_TYPE_OR_VALUE_EXISTS, ""));
                }
                attr.values.push(value);
            }
        }
        ModifyOperation::Remove => {
            let attr = entry
                .attributes
                .get_mut(&key)
                .ok_or_else(|| result_error(RC_NO_SUCH_ATTRIBUTE, ""))?;
            if modification.values.is_empty() {
                entry.attributes.remove(&key);
                return Ok(());
            }
            for value in &modification.values {
                let position = attr
                    .values
                    .iter()
                    .position(|existing| values_equal(existing, value))
                    .ok_or_else(|| result_error(RC_NO_SUCH_ATTRIBUTE, ""))?;
                attr.values.remove(position);
            }
            if attr.values.is_empty() {
                entry.attributes.remove(&key);
            }
        }
    }
    Ok(())
}

fn values_equal(a: &[u8], b: &[u8]) -> bool {
    match (std::str::from_utf8(a), std::str::from_utf8(b)) {
        (Ok(a), Ok(b)) => a.eq_ignore_ascii_case(b),
        _ => a == b,
    }
}

/// Updates `memberOf` on every entry whose membership in `group_dn` changed.
fn sync_member_of(
    entries: &mut BTreeMap<String, StoredEntry>,
    group_dn: &str,
    before: &[String],
    after: &[String],
) {
    let lower = |values: &[String]| -> HashSet<String> { values.iter().map(|v| v.to_ascii_lowercase()).collect() };
    let (before, after) = (lower(before), lower(after));

    for removed in before.difference(&after) {
        if let Some(member) = entries.get_mut(removed) {
            if let Some(attr) = member.attributes.get_mut("memberof") {
                attr.values.retain(|v| !values_equal(v, group_dn.as_bytes()));
                if attr.values.is_empty() {
                    member.attributes.remove("memberof");
                }
            }
        }
    }

    for added in after.difference(&before) {
        if let Some(member) = entries.get_mut(added) {
            member
                .attributes
                .entry("memberof".to_string())
                .or_insert_with(|| StoredAttribute {
                    name: "memberOf".to_string(),
                    values: Vec::new(),
                })
                .values
                .push(group_dn.as_bytes().to_vec());
        }
    }
}

#[async_trait]
impl DirectoryRepository for InMemoryDirectoryRepository {
    async fn search(
        &self,
        base: &str,
        scope: SearchScope,
        filter: &str,
        attributes: &[&str],
    ) -> Result<Vec<DirectoryEntry>, ServiceError> {
        self.search_calls.fetch_add(1, Ordering::SeqCst);
        if self.busy.load(Ordering::SeqCst) {
            return Err(result_error(RC_BUSY, ""));
        }

        let filter = Filter::parse(filter).map_err(|reason| result_error(RC_FILTER_ERROR, &reason))?;
        let base = base.to_ascii_lowercase();

        if scope == SearchScope::Base && self.unreadable.read().await.contains(&base) {
            return Err(result_error(RC_INSUFFICIENT_ACCESS, ""));
        }

        let entries = self.entries.read().await;
        if scope == SearchScope::Base && !entries.contains_key(&base) {
            return Err(result_error(RC_NO_SUCH_OBJECT, ""));
        }

        Ok(entries
            .iter()
            .filter(|(dn, _)| in_scope(dn, &base, scope))
            .filter(|(_, entry)| filter.matches(entry))
            .map(|(_, entry)| entry.project(attributes))
            .collect())
    }

    async fn modify_batch(&self, dn: &str, modifications: Vec<Modification>) -> Result<(), ServiceError> {
        self.modify_calls.fetch_add(1, Ordering::SeqCst);

        let key = dn.to_ascii_lowercase();
        let mut entries = self.entries.write().await;
        let current = entries
            .get(&key)
            .ok_or_else(|| result_error(RC_NO_SUCH_OBJECT, ""))?;

        // all-or-nothing: work on a copy
        let mut updated = current.clone();
        for modification in modifications {
            apply_modification(&mut updated, modification)?;
        }

        let members_before = current.text_values("member");
        let members_after = updated.text_values("member");
        let group_dn = updated.dn.clone();
        entries.insert(key, updated);

        if members_before != members_after {
            sync_member_of(&mut entries, &group_dn, &members_before, &members_after);
        }
        Ok(())
    }
}

/// Parsed search filter.
#[derive(Debug, Clone, PartialEq)]
enum Filter {
    And(Vec<Filter>),
    Or(Vec<Filter>),
    Not(Box<Filter>),
    Present(String),
    Equal(String, String),
    Substring {
        attribute: String,
        initial: Option<String>,
        any: Vec<String>,
        last: Option<String>,
    },
}

impl Filter {
    fn parse(input: &str) -> Result<Filter, String> {
        let (filter, rest) = Self::parse_one(input.trim())?;
        if !rest.trim().is_empty() {
            return Err(format!("trailing characters after filter: '{}'", rest));
        }
        Ok(filter)
    }

    fn parse_one(input: &str) -> Result<(Filter, &str), String> {
        let body = input
            .strip_prefix('(')
            .ok_or_else(|| format!("expected '(' at '{}'", input))?;

        match body.chars().next() {
            Some('&') => {
                let (filters, rest) = Self::parse_list(&body[1..])?;
                Ok((Filter::And(filters), rest))
            }
            Some('|') => {
                let (filters, rest) = Self::parse_list(&body[1..])?;
                Ok((Filter::Or(filters), rest))
            }
            Some('!') => {
                let (inner, rest) = Self::parse_one(&body[1..])?;
                let rest = rest.strip_prefix(')').ok_or("unterminated '!' filter")?;
                Ok((Filter::Not(Box::new(inner)), rest))
            }
            Some(_) => {
                let end = item_end(body).ok_or("unterminated filter item")?;
                let item = Self::parse_item(&body[..end])?;
                Ok((item, &body[end + 1..]))
            }
            None => Err("empty filter".to_string()),
        }
    }

    fn parse_list(mut input: &str) -> Result<(Vec<Filter>, &str), String> {
        let mut filters = Vec::new();
        loop {
            if let Some(rest) = input.strip_prefix(')') {
                return Ok((filters, rest));
            }
            if input.is_empty() {
                return Err("unterminated filter list".to_string());
            }
            let (filter, rest) = Self::parse_one(input)?;
            filters.push(filter);
            input = rest;
        }
    }

    fn parse_item(item: &str) -> Result<Filter, String> {
        let (attribute, value) = item
            .split_once('=')
            .ok_or_else(|| format!("missing '=' in '{}'", item))?;
        let attribute = attribute.trim().to_string();
        if attribute.is_empty() {
            return Err(format!("missing attribute in '{}'", item));
        }

        if value == "*" {
            return Ok(Filter::Present(attribute));
        }
        if !value.contains('*') {
            return Ok(Filter::Equal(attribute, unescape(value)?));
        }

        let parts: Vec<&str> = value.split('*').collect();
        let initial = Some(parts[0]).filter(|p| !p.is_empty()).map(unescape).transpose()?;
        let last = parts
            .last()
            .copied()
            .filter(|p| !p.is_empty())
            .map(unescape)
            .transpose()?;
        let any = parts[1..parts.len() - 1]
            .iter()
            .filter(|p| !p.is_empty())
            .map(|p| unescape(p))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Filter::Substring {
            attribute,
            initial,
            any,
            last,
        })
    }

    fn matches(&self, entry: &StoredEntry) -> bool {
        match self {
            Filter::And(filters) => filters.iter().all(|f| f.matches(entry)),
            Filter::Or(filters) => filters.iter().any(|f| f.matches(entry)),
            Filter::Not(inner) => !inner.matches(entry),
            Filter::Present(attribute) => entry.attributes.contains_key(&attribute.to_ascii_lowercase()),
            Filter::Equal(attribute, expected) => entry
                .text_values(attribute)
                .iter()
                .any(|v| v.to_lowercase() == expected.to_lowercase()),
            Filter::Substring {
                attribute,
                initial,
                any,
                last,
            } => entry
                .text_values(attribute)
                .iter()
                .any(|v| substring_matches(&v.to_lowercase(), initial, any, last)),
        }
    }
}

fn substring_matches(value: &str, initial: &Option<String>, any: &[String], last: &Option<String>) -> bool {
    let mut rest = value;
    if let Some(initial) = initial {
        match rest.strip_prefix(initial.to_lowercase().as_str()) {
            Some(r) => rest = r,
            None => return false,
        }
    }
    for part in any {
        let part = part.to_lowercase();
        match rest.find(&part) {
            Some(idx) => rest = &rest[idx + part.len()..],
            None => return false,
        }
    }
    match last {
        Some(last) => rest.ends_with(&last.to_lowercase()),
        None => true,
    }
}

/// Index of the `)` closing a simple filter item; escaped values never
/// contain a literal parenthesis.
fn item_end(body: &str) -> Option<usize> {
    body.find(')')
}

/// Resolves RFC 4515 `\XX` escapes.
fn unescape(value: &str) -> Result<String, String> {
    let bytes = value.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut pos = 0;
    while pos < bytes.len() {
        if bytes[pos] == b'\\' {
            let hex = value
                .get(pos + 1..pos + 3)
                .ok_or_else(|| format!("truncated escape in '{}'", value))?;
            let byte = u8::from_str_radix(hex, 16).map_err(|_| format!("invalid escape '\\{}'", hex))?;
            out.push(byte);
            pos += 3;
        } else {
            out.push(bytes[pos]);
            pos += 1;
        }
    }
    String::from_utf8(out).map_err(|e| e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn directory() -> InMemoryDirectoryRepository {
        InMemoryDirectoryRepository::with_entries([
            DirectoryEntry::new("DC=example,DC=com").with_attribute("objectClass", ["domain"]),
            DirectoryEntry::new("OU=Users,DC=example,DC=com").with_attribute("objectClass", ["organizationalUnit"]),
            DirectoryEntry::new("CN=John Doe,OU=Users,DC=example,DC=com")
                .with_attribute("objectClass", ["top", "person", "user"])
                .with_attribute("cn", ["John Doe"])
                .with_attribute("sAMAccountName", ["jdoe"])
                .with_attribute("mail", ["john.doe@example.com"]),
            DirectoryEntry::new("CN=Jane Roe,OU=Users,DC=example,DC=com")
                .with_attribute("objectClass", ["top", "person", "user"])
                .with_attribute("cn", ["Jane Roe"])
                .with_attribute("sAMAccountName", ["jroe"]),
            DirectoryEntry::new("CN=Staff,DC=example,DC=com")
                .with_attribute("objectClass", ["group"])
                .with_attribute("objectCategory", ["group"])
                .with_attribute("cn", ["Staff"]),
        ])
    }

    #[test]
    fn test_parse_nested_filter() {
        let filter = Filter::parse("(&(objectCategory=group)(!(cn=Admins)))").unwrap();
        assert_eq!(
            filter,
            Filter::And(vec![
                Filter::Equal("objectCategory".into(), "group".into()),
                Filter::Not(Box::new(Filter::Equal("cn".into(), "Admins".into()))),
            ])
        );
    }

    #[test]
    fn test_parse_escaped_value() {
        let filter = Filter::parse("(cn=a\\2ab\\28c\\29)").unwrap();
        assert_eq!(filter, Filter::Equal("cn".into(), "a*b(c)".into()));
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(Filter::parse("cn=foo").is_err());
        assert!(Filter::parse("(cn=foo").is_err());
        assert!(Filter::parse("(&(cn=foo)").is_err());
    }

    #[actix_rt::test]
    async fn test_subtree_equality_search_is_case_insensitive() {
        let dir = directory();
        let hits = dir
            .search("DC=example,DC=com", SearchScope::Subtree, "(sAMAccountName=JDOE)", &[])
            .await
            .unwrap();

        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].dn, "CN=John Doe,OU=Users,DC=example,DC=com");
    }

    #[actix_rt::test]
    async fn test_substring_search() {
        let dir = directory();
        let hits = dir
            .search("DC=example,DC=com", SearchScope::Subtree, "(sAMAccountName=j*)", &[])
            .await
            .unwrap();
        assert_eq!(hits.len(), 2);

        let hits = dir
            .search("DC=example,DC=com", SearchScope::Subtree, "(cn=*Ro*)", &[])
            .await
            .unwrap();
        assert_eq!(hits.len(), 1);
    }

    #[actix_rt::test]
    async fn test_base_search_on_missing_dn_is_not_found() {
        let dir = directory();
        let err = dir
            .search("CN=Ghost,DC=example,DC=com", SearchScope::Base, "(objectClass=*)", &[])
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::NotFound(_)));

        let entry = dir.read_entry("CN=Ghost,DC=example,DC=com", &[]).await.unwrap();
        assert!(entry.is_none());
    }

    #[actix_rt::test]
    async fn test_one_level_scope() {
        let dir = directory();
        let hits = dir
            .search("DC=example,DC=com", SearchScope::OneLevel, "(objectClass=*)", &[])
            .await
            .unwrap();
        let dns: Vec<_> = hits.iter().map(|e| e.dn.as_str()).collect();
        assert_eq!(dns.len(), 2);
        assert!(dns.contains(&"OU=Users,DC=example,DC=com"));
        assert!(dns.contains(&"CN=Staff,DC=example,DC=com"));
    }

    #[actix_rt::test]
    async fn test_attribute_projection() {
        let dir = directory();
        let entry = dir
            .read_entry("CN=John Doe,OU=Users,DC=example,DC=com", &["mail"])
            .await
            .unwrap()
            .unwrap();
        assert_eq!(entry.first("mail"), Some("john.doe@example.com"));
        assert!(entry.first("sAMAccountName").is_none());
    }

    #[actix_rt::test]
    async fn test_duplicate_add_and_absent_remove_are_rejected() {
        let dir = directory();
        let group = "CN=Staff,DC=example,DC=com";
        let user = "CN=John Doe,OU=Users,DC=example,DC=com";

        dir.modify_batch(group, vec![Modification::add("member", user)]).await.unwrap();

        let err = dir
            .modify_batch(group, vec![Modification::add("member", user)])
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Type or value exists (rc=20)");

        dir.modify_batch(group, vec![Modification::remove("member", user)]).await.unwrap();

        let err = dir
            .modify_batch(group, vec![Modification::remove("member", user)])
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "No such attribute (rc=16)");
    }

    #[actix_rt::test]
    async fn test_member_changes_maintain_member_of() {
        let dir = directory();
        let group = "CN=Staff,DC=example,DC=com";
        let user = "CN=John Doe,OU=Users,DC=example,DC=com";

        dir.modify_batch(group, vec![Modification::add("member", user)]).await.unwrap();
        let entry = dir.entry(user).await.unwrap();
        assert_eq!(entry.values("memberOf"), [group.to_string()]);

        dir.modify_batch(group, vec![Modification::remove("member", user)]).await.unwrap();
        let entry = dir.entry(user).await.unwrap();
        assert!(entry.values("memberOf").is_empty());
    }

    #[actix_rt::test]
    async fn test_failed_batch_leaves_entry_untouched() {
        let dir = directory();
        let user = "CN=John Doe,OU=Users,DC=example,DC=com";

        let result = dir
            .modify_batch(
                user,
                vec![
                    Modification::replace("description", "changed"),
                    Modification::remove("telephoneNumber", "123"),
                ],
            )
            .await;
        assert!(result.is_err());

        let entry = dir.entry(user).await.unwrap();
        assert!(entry.first("description").is_none());
    }

    #[actix_rt::test]
    async fn test_unicode_pwd_is_write_only() {
        let dir = directory();
        let user = "CN=John Doe,OU=Users,DC=example,DC=com";

        dir.modify_batch(user, vec![Modification::replace("unicodePwd", vec![0x22, 0, 0x22, 0])])
            .await
            .unwrap();

        assert_eq!(dir.raw_values(user, "unicodePwd").await, vec![vec![0x22, 0, 0x22, 0]]);
        assert!(dir.entry(user).await.unwrap().values("unicodePwd").is_empty());
    }

    #[actix_rt::test]
    async fn test_denied_reads() {
        let dir = directory();
        let user = "CN=Jane Roe,OU=Users,DC=example,DC=com";
        dir.deny_reads(user).await;

        let err = dir.read_entry(user, &[]).await.unwrap_err();
        assert!(matches!(err, ServiceError::DirectoryError(_)));
    }

    #[actix_rt::test]
    async fn test_failing_searches() {
        let repo = InMemoryDirectoryRepository::with_entries([DirectoryEntry::new("DC=example,DC=com")]);
        repo.fail_searches();

        let err = repo
            .search("DC=example,DC=com", SearchScope::Subtree, "(objectClass=*)", &[])
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::DirectoryError(_)));
        assert_eq!(err.to_string(), "Server is busy (rc=51)");
        assert_eq!(repo.search_calls(), 1);
    }
}
