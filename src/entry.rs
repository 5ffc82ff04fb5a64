//! Directory entries with change tracking, and the class descriptors used to
//! find them.

use tracing::{debug, instrument, warn};
use unicase::UniCase;

use crate::attributes::{AttributeStore, AttributeValue, Unwrapped, ValueList};
use crate::changes::{build_modify_operations, compute_changes, Changes, ModifyOperation};
use crate::directory::{Directory, DirectoryEntry, SearchScope};
use crate::error::{DirectoryError, Error, Result};
use crate::filter::Filter;


pub const DEFAULT_PRIMARY_KEY: &str = "samaccountname";
pub const ANY_CATEGORY: &str = "*";

/// Attribute names that denote the distinguished name rather than an attribute.
const DN_NAMES: [&str; 2] = ["dn", "distinguishedName"];

fn is_dn_name(name: &str) -> bool {
    DN_NAMES.iter().any(|n| n.eq_ignore_ascii_case(name))
}


/// A directory entry.
///
/// Keeps the attributes as last read from (or written to) the directory next
/// to the current ones; the difference between both is what
/// [`save`](Entry::save) sends.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Entry {
    dn: UniCase<String>,
    attributes: AttributeStore,
    persisted: AttributeStore,
    new: bool,
}
impl Entry {
    /// A new entry that does not exist in the directory yet.
    pub fn new<S: Into<String>>(dn: S) -> Self {
        Self::with_attributes(dn, AttributeStore::new())
    }

    /// A new entry with initial attributes. `dn`/`distinguishedName` among
    /// them are dropped; the entry's name is `dn`.
    pub fn with_attributes<S: Into<String>>(dn: S, attributes: AttributeStore) -> Self {
        Self {
            dn: UniCase::new(dn.into()),
            attributes: strip_dn(attributes),
            persisted: AttributeStore::new(),
            new: true,
        }
    }

    /// An entry as loaded from the directory.
    pub fn from_directory_entry(entry: DirectoryEntry) -> Self {
        let attributes = strip_dn(entry.attributes);
        Self {
            dn: entry.dn,
            persisted: attributes.clone(),
            attributes,
            new: false,
        }
    }

    pub fn dn(&self) -> &str {
        self.dn.as_ref()
    }

    pub fn is_new(&self) -> bool {
        self.new
    }

    pub fn attributes(&self) -> &AttributeStore {
        &self.attributes
    }

    pub fn persisted_attributes(&self) -> &AttributeStore {
        &self.persisted
    }

    pub fn get(&self, name: &str) -> &[AttributeValue] {
        self.attributes.get(name)
    }

    pub fn get_single(&self, name: &str) -> Unwrapped<'_> {
        self.attributes.get_single(name)
    }

    /// Like [`get`](Self::get), but stores an empty list for an absent
    /// attribute, which is then listed by [`attribute_names`](Self::attribute_names).
    pub fn get_defaulted(&mut self, name: &str) -> &[AttributeValue] {
        self.attributes.materialize(name)
    }

    pub fn set<V: Into<ValueList>>(&mut self, name: &str, values: V) {
        self.attributes.set(name, values);
    }

    pub fn remove(&mut self, name: &str) -> Option<Vec<AttributeValue>> {
        self.attributes.remove(name)
    }

    pub fn attribute_names(&self) -> impl Iterator<Item = &str> {
        self.attributes.names()
    }

    pub fn is_present(&self, name: &str) -> bool {
        self.attributes.contains(name)
    }

    /// Attributes that differ from the persisted state. Always empty for a
    /// new entry.
    pub fn changes(&self) -> Changes {
        if self.new {
            return Changes::default();
        }
        compute_changes(&self.attributes, &self.persisted)
    }

    pub fn is_changed(&self) -> bool {
        !self.changes().is_empty()
    }

    pub fn modify_operations(&self) -> Vec<ModifyOperation> {
        build_modify_operations(&self.changes())
    }

    fn mark_persisted(&mut self) {
        self.persisted = self.attributes.clone();
        self.new = false;
    }

    /// Writes the entry: a new entry is added, a changed one modified.
    ///
    /// The entry is reloaded afterwards. Returns `false` if the directory
    /// refused the write; the reason is available through
    /// [`Directory::last_operation_error`].
    #[instrument(level = "debug", skip_all, fields(dn = %self.dn))]
    pub async fn save<D: Directory + ?Sized>(&mut self, directory: &mut D) -> bool {
        if self.new {
            if let Err(e) = directory.add(self.dn(), &self.attributes).await {
                warn!(dn = %self.dn, error = %e, "failed to create entry");
                return false;
            }
        } else {
            let operations = self.modify_operations();
            if operations.is_empty() {
                debug!("nothing to save");
                return true;
            }
            if let Err(e) = directory.modify(self.dn(), &operations).await {
                warn!(dn = %self.dn, error = %e, "failed to modify entry");
                return false;
            }
        }

        if !self.reload(directory).await {
            // written but unreadable; keep what was sent
            self.mark_persisted();
        }
        true
    }

    /// Replaces the attributes with those currently stored in the directory.
    ///
    /// Returns `false`, leaving the entry untouched, if it cannot be read.
    #[instrument(level = "debug", skip_all, fields(dn = %self.dn))]
    pub async fn reload<D: Directory + ?Sized>(&mut self, directory: &mut D) -> bool {
        let fresh = match read_dn(directory, self.dn()).await {
            Ok(Some(fresh)) => fresh,
            Ok(None) => {
                warn!(dn = %self.dn, "entry vanished before reload");
                return false;
            },
            Err(e) => {
                warn!(dn = %self.dn, error = %e, "failed to reload entry");
                return false;
            },
        };
        self.dn = fresh.dn;
        self.attributes = strip_dn(fresh.attributes);
        self.mark_persisted();
        true
    }

    /// Deletes the entry from the directory.
    #[instrument(level = "debug", skip_all, fields(dn = %self.dn))]
    pub async fn destroy<D: Directory + ?Sized>(&self, directory: &mut D) -> Result<()> {
        directory.delete(self.dn()).await?;
        Ok(())
    }
}

fn finder_filter(attribute: &str, pattern: &str) -> Filter {
    if is_dn_name(attribute) {
        Filter::eq_bytes(DN_NAMES[1], pattern.as_bytes())
    } else {
        Filter::eq(attribute, pattern)
    }
}

fn strip_dn(mut attributes: AttributeStore) -> AttributeStore {
    for name in DN_NAMES {
        attributes.remove(name);
    }
    attributes
}

/// Base-scope read of a single entry. A missing entry is `Ok(None)`.
async fn read_dn<D: Directory + ?Sized>(directory: &mut D, dn: &str) -> std::result::Result<Option<DirectoryEntry>, DirectoryError> {
    match directory.search(dn, SearchScope::Base, &Filter::present("objectClass")).await {
        Ok(entries) => Ok(entries.into_iter().next()),
        Err(e) if e.is_no_such_object() => Ok(None),
        Err(e) => Err(e),
    }
}


/// Search criteria for [`EntryClass::find_where`].
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub enum Criteria {
    /// Equality on every attribute (`*` is a wildcard).
    Attributes(Vec<(String, String)>),
    /// A filter string passed through unchecked.
    Raw(String),
}
impl Criteria {
    fn to_filter(&self) -> Option<Filter> {
        match self {
            Self::Attributes(pairs) => Filter::all(
                pairs.iter().map(|(attribute, pattern)| Filter::eq(attribute, pattern))
            ),
            Self::Raw(text) => Some(Filter::raw(text.clone())),
        }
    }
}
impl From<&str> for Criteria {
    fn from(value: &str) -> Self { Self::Raw(value.to_owned()) }
}
impl From<String> for Criteria {
    fn from(value: String) -> Self { Self::Raw(value) }
}
impl<K: Into<String>, V: Into<String>> From<Vec<(K, V)>> for Criteria {
    fn from(value: Vec<(K, V)>) -> Self {
        Self::Attributes(value.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}
impl<K: Into<String>, V: Into<String>, const N: usize> From<[(K, V); N]> for Criteria {
    fn from(value: [(K, V); N]) -> Self {
        Self::Attributes(value.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}


/// What [`EntryClass::dispatch_finder`] found.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum FinderResult {
    One(Option<Entry>),
    Many(Vec<Entry>),
}


/// Where and how to look for one kind of entry.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct EntryClass {
    pub name: String,
    /// Search root; the directory's default base if `None`.
    pub tree_base: Option<String>,
    /// Attribute used by [`find`](Self::find); `dn` looks up by distinguished name.
    pub primary_key: String,
    /// `objectCategory` every search is restricted to; `*` for any.
    pub object_category: String,
}
impl EntryClass {
    pub fn new<S: Into<String>>(name: S) -> Self {
        Self {
            name: name.into(),
            tree_base: None,
            primary_key: DEFAULT_PRIMARY_KEY.to_owned(),
            object_category: ANY_CATEGORY.to_owned(),
        }
    }

    pub fn entry() -> Self {
        Self::new("Entry")
    }

    pub fn user() -> Self {
        Self::new("User")
            .with_object_category("person")
    }

    pub fn group() -> Self {
        Self::new("Group")
            .with_object_category("group")
    }

    pub fn with_tree_base<S: Into<String>>(mut self, tree_base: S) -> Self {
        self.tree_base = Some(tree_base.into());
        self
    }

    pub fn with_primary_key<S: Into<String>>(mut self, primary_key: S) -> Self {
        self.primary_key = primary_key.into();
        self
    }

    pub fn with_object_category<S: Into<String>>(mut self, object_category: S) -> Self {
        self.object_category = object_category.into();
        self
    }

    pub fn category_filter(&self) -> Filter {
        Filter::eq("objectcategory", &self.object_category)
    }

    /// Subtree search below the tree base, restricted to this class's
    /// category and, if given, `filter`.
    #[instrument(level = "debug", skip_all, fields(class = %self.name))]
    pub async fn search<D: Directory + ?Sized>(&self, directory: &mut D, filter: Option<&Filter>) -> std::result::Result<Vec<DirectoryEntry>, DirectoryError> {
        let base = match &self.tree_base {
            Some(tree_base) => tree_base.clone(),
            None => directory.default_base().to_owned(),
        };
        let combined = match filter {
            Some(f) => self.category_filter().and(f.clone()),
            None => self.category_filter(),
        };
        directory.search(&base, SearchScope::Subtree, &combined).await
    }

    async fn search_entries<D: Directory + ?Sized>(&self, directory: &mut D, filter: Option<&Filter>) -> Result<Vec<Entry>> {
        let found = self.search(directory, filter).await?;
        Ok(found.into_iter().map(Entry::from_directory_entry).collect())
    }

    /// The entry whose primary key matches `pattern`.
    pub async fn find<D: Directory + ?Sized>(&self, directory: &mut D, pattern: &str) -> Option<Entry> {
        self.find_by(directory, &self.primary_key, pattern).await
    }

    /// The first entry whose `attribute` matches `pattern`, or `None` if there
    /// is none or the search failed.
    ///
    /// `dn` and `distinguishedName` match the distinguished name exactly,
    /// still within this class's tree base and category.
    #[instrument(level = "debug", skip_all, fields(class = %self.name, attribute = %attribute, pattern = %pattern))]
    pub async fn find_by<D: Directory + ?Sized>(&self, directory: &mut D, attribute: &str, pattern: &str) -> Option<Entry> {
        self.find_first(directory, &finder_filter(attribute, pattern)).await
    }

    /// The first entry matching `filter`, or `None` if there is none or the
    /// search failed.
    pub async fn find_first<D: Directory + ?Sized>(&self, directory: &mut D, filter: &Filter) -> Option<Entry> {
        match self.search(directory, Some(filter)).await {
            Ok(found) => found.into_iter().next().map(Entry::from_directory_entry),
            Err(e) => {
                warn!(class = %self.name, filter = %filter, error = %e, "find failed");
                None
            },
        }
    }

    /// All entries whose `attribute` matches `pattern`.
    pub async fn find_all<D: Directory + ?Sized>(&self, directory: &mut D, attribute: &str, pattern: &str) -> Result<Vec<Entry>> {
        self.search_entries(directory, Some(&finder_filter(attribute, pattern))).await
    }

    /// Every entry of this class below the tree base.
    pub async fn all<D: Directory + ?Sized>(&self, directory: &mut D) -> Result<Vec<Entry>> {
        self.search_entries(directory, None).await
    }

    pub async fn find_where<D: Directory + ?Sized, C: Into<Criteria>>(&self, directory: &mut D, criteria: C) -> Result<Vec<Entry>> {
        let filter = criteria.into().to_filter();
        self.search_entries(directory, filter.as_ref()).await
    }

    /// The entry named `dn`, regardless of category and tree base.
    #[instrument(level = "debug", skip_all, fields(class = %self.name, dn = %dn))]
    pub async fn select_dn<D: Directory + ?Sized>(&self, directory: &mut D, dn: &str) -> Option<Entry> {
        match read_dn(directory, dn).await {
            Ok(found) => found.map(Entry::from_directory_entry),
            Err(e) => {
                warn!(dn, error = %e, "select by DN failed");
                None
            },
        }
    }

    /// Adds a new entry and reads it back, picking up the attributes the
    /// directory filled in.
    #[instrument(level = "debug", skip_all, fields(class = %self.name, dn = %dn))]
    pub async fn create<D: Directory + ?Sized>(&self, directory: &mut D, dn: &str, attributes: AttributeStore) -> Result<Entry> {
        let attributes = strip_dn(attributes);
        directory.add(dn, &attributes).await?;
        match self.select_dn(directory, dn).await {
            Some(entry) => Ok(entry),
            None => {
                let mut entry = Entry::with_attributes(dn, attributes);
                entry.mark_persisted();
                Ok(entry)
            },
        }
    }

    /// The attribute a finder method name searches on: `find` and
    /// `find_by_id` use the primary key, `find_by_<attr>` and
    /// `find_all_by_<attr>` use `<attr>`.
    pub fn finder_attribute(&self, method: &str) -> Option<String> {
        self.parse_finder(method)
            .map(|(_, attribute)| attribute)
    }

    fn parse_finder(&self, method: &str) -> Option<(bool, String)> {
        if method == "find" {
            return Some((false, self.primary_key.clone()));
        }
        let (many, attribute) = if let Some(attribute) = method.strip_prefix("find_all_by_") {
            (true, attribute)
        } else if let Some(attribute) = method.strip_prefix("find_by_") {
            (false, attribute)
        } else {
            return None;
        };
        if attribute.is_empty() {
            return None;
        }
        if attribute == "id" {
            return Some((many, self.primary_key.clone()));
        }
        Some((many, attribute.to_owned()))
    }

    /// Runs the finder named `method`, e.g. `find_by_mail`.
    pub async fn dispatch_finder<D: Directory + ?Sized>(&self, directory: &mut D, method: &str, pattern: &str) -> Result<FinderResult> {
        let Some((many, attribute)) = self.parse_finder(method) else {
            return Err(Error::UnknownFinder(method.to_owned()));
        };
        if many {
            Ok(FinderResult::Many(self.find_all(directory, &attribute, pattern).await?))
        } else {
            Ok(FinderResult::One(self.find_by(directory, &attribute, pattern).await))
        }
    }
}
impl Default for EntryClass {
    fn default() -> Self {
        Self::entry()
    }
}


/// Finders of a typed class (`UserClass`, `GroupClass`) that delegate to its
/// `entries` descriptor and wrap the results.
macro_rules! typed_finders {
    ($class:ident, $wrapper:ident) => {
        impl $class {
            fn wrap(&self, entry: $crate::entry::Entry) -> $wrapper {
                $wrapper::new(entry, self.clone())
            }

            pub async fn find<D: $crate::directory::Directory + ?Sized>(&self, directory: &mut D, pattern: &str) -> Option<$wrapper> {
                self.entries.find(directory, pattern).await
                    .map(|entry| self.wrap(entry))
            }

            pub async fn find_by<D: $crate::directory::Directory + ?Sized>(&self, directory: &mut D, attribute: &str, pattern: &str) -> Option<$wrapper> {
                self.entries.find_by(directory, attribute, pattern).await
                    .map(|entry| self.wrap(entry))
            }

            pub async fn find_first<D: $crate::directory::Directory + ?Sized>(&self, directory: &mut D, filter: &$crate::filter::Filter) -> Option<$wrapper> {
                self.entries.find_first(directory, filter).await
                    .map(|entry| self.wrap(entry))
            }

            pub async fn find_all<D: $crate::directory::Directory + ?Sized>(&self, directory: &mut D, attribute: &str, pattern: &str) -> $crate::error::Result<Vec<$wrapper>> {
                let found = self.entries.find_all(directory, attribute, pattern).await?;
                Ok(found.into_iter().map(|entry| self.wrap(entry)).collect())
            }

            pub async fn all<D: $crate::directory::Directory + ?Sized>(&self, directory: &mut D) -> $crate::error::Result<Vec<$wrapper>> {
                let found = self.entries.all(directory).await?;
                Ok(found.into_iter().map(|entry| self.wrap(entry)).collect())
            }

            pub async fn find_where<D: $crate::directory::Directory + ?Sized, C: Into<$crate::entry::Criteria>>(&self, directory: &mut D, criteria: C) -> $crate::error::Result<Vec<$wrapper>> {
                let found = self.entries.find_where(directory, criteria).await?;
                Ok(found.into_iter().map(|entry| self.wrap(entry)).collect())
            }

            pub async fn select_dn<D: $crate::directory::Directory + ?Sized>(&self, directory: &mut D, dn: &str) -> Option<$wrapper> {
                self.entries.select_dn(directory, dn).await
                    .map(|entry| self.wrap(entry))
            }

            pub async fn create<D: $crate::directory::Directory + ?Sized>(&self, directory: &mut D, dn: &str, attributes: $crate::attributes::AttributeStore) -> $crate::error::Result<$wrapper> {
                let entry = self.entries.create(directory, dn, attributes).await?;
                Ok(self.wrap(entry))
            }
        }

        impl ::std::ops::Deref for $wrapper {
            type Target = $crate::entry::Entry;

            fn deref(&self) -> &Self::Target {
                &self.entry
            }
        }

        impl ::std::ops::DerefMut for $wrapper {
            fn deref_mut(&mut self) -> &mut Self::Target {
                &mut self.entry
            }
        }
    };
}
pub(crate) use typed_finders;


#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_fixtures::{directory, BETTY_DN, JOHN_DN, TESTGROUP_DN};

    const PEOPLE: &str = "OU=people,DC=example,DC=com";
    const GROUPS: &str = "OU=groups,DC=example,DC=com";

    fn new_person(given_name: &str, sn: &str, username: &str) -> AttributeStore {
        AttributeStore::from_iter([
            ("objectclass", ValueList::from(["top", "person", "organizationalPerson", "user"])),
            ("givenname", ValueList::from(given_name)),
            ("sn", ValueList::from(sn)),
            ("samaccountname", ValueList::from(username)),
        ])
    }

    #[test]
    fn test_new_entry_has_no_changes() {
        let mut entry = Entry::new("cn=A B,OU=people,DC=example,DC=com");
        entry.set("sn", "B");
        entry.set("givenname", "A");
        assert!(entry.is_new());
        assert!(entry.changes().is_empty());
        assert!(!entry.is_changed());
        assert!(entry.modify_operations().is_empty());
    }

    #[test]
    fn test_loaded_entry() {
        let raw = DirectoryEntry::new(JOHN_DN, AttributeStore::from_iter([
            ("distinguishedName", ValueList::from(JOHN_DN)),
            ("sn", ValueList::from("Doe")),
        ]));
        let mut entry = Entry::from_directory_entry(raw);
        assert!(!entry.is_new());
        assert!(!entry.is_present("distinguishedName"));
        assert_eq!(entry.attribute_names().collect::<Vec<_>>(), vec!["sn"]);

        entry.set("sn", "Doe");
        entry.set("SN", "Doe");
        assert!(!entry.is_changed());

        assert!(entry.get_defaulted("memberOf").is_empty());
        assert!(entry.is_present("memberof"));
        assert!(!entry.is_changed());

        entry.set("sn", "Dough");
        assert!(entry.is_changed());
        assert_eq!(entry.persisted_attributes().get("sn"), ["Doe"]);
    }

    #[test]
    fn test_new_entry_drops_dn_attributes() {
        let dn = format!("cn=X,{}", PEOPLE);
        let entry = Entry::with_attributes(dn.as_str(), AttributeStore::from_iter([
            ("distinguishedName", ValueList::from(dn.as_str())),
            ("DN", ValueList::from(dn.as_str())),
            ("sn", ValueList::from("x")),
        ]));
        assert!(!entry.is_present("distinguishedName"));
        assert!(!entry.is_present("dn"));
        assert_eq!(entry.attribute_names().collect::<Vec<_>>(), vec!["sn"]);
        assert_eq!(entry.dn(), dn);
    }

    #[tokio::test]
    async fn test_create_save_and_duplicate() {
        let mut dir = directory();
        let dn = format!("cn=A B,{}", PEOPLE);

        let mut entry = Entry::with_attributes(dn.as_str(), new_person("A", "B", "ab1"));
        assert!(entry.save(&mut dir).await);
        assert!(!entry.is_new());
        assert_eq!(entry.get("givenname"), ["A"]);
        assert_eq!(entry.get_single("samaccountname").as_str(), Some("ab1"));
        assert_eq!(entry.get("whenCreated").len(), 1);
        assert!(!entry.is_changed());

        let mut again = Entry::with_attributes(dn.as_str(), new_person("A", "B", "ab2"));
        assert!(!again.save(&mut dir).await);
        assert!(again.is_new());
        let error = dir.last_operation_error().unwrap();
        assert!(error.message.contains("already exists"));
    }

    #[tokio::test]
    async fn test_save_clears_dirty_state() {
        let mut dir = directory();
        let mut john = EntryClass::user().find(&mut dir, "jdoe").await.unwrap();
        john.set("sn", "Ha, changed!");
        john.remove("mail");
        assert_eq!(john.changes().len(), 2);

        assert!(john.save(&mut dir).await);
        assert!(!john.is_changed());
        assert_eq!(john.get("sn"), ["Ha, changed!"]);
        assert!(!john.is_present("mail"));
        assert_eq!(dir.get(JOHN_DN).unwrap().values_for("sn"), ["Ha, changed!"]);

        // unchanged: no round-trip needed
        assert!(john.save(&mut dir).await);
    }

    #[tokio::test]
    async fn test_failed_modify_keeps_changes() {
        let mut dir = directory();
        let mut john = EntryClass::user().find(&mut dir, "jdoe").await.unwrap();
        john.set("objectClass", Vec::<&str>::new());
        assert!(!john.save(&mut dir).await);
        assert!(john.is_changed());
    }

    #[tokio::test]
    async fn test_reload() {
        let mut dir = directory();
        let mut john = EntryClass::user().find(&mut dir, "jdoe").await.unwrap();
        john.set("sn", "Other");
        assert!(john.reload(&mut dir).await);
        assert_eq!(john.get("sn"), ["Doe"]);
        assert!(!john.is_changed());

        let mut ghost = Entry::new(format!("cn=Ghost,{}", PEOPLE));
        ghost.set("sn", "Ghost");
        assert!(!ghost.reload(&mut dir).await);
        assert!(ghost.is_new());
        assert_eq!(ghost.get("sn"), ["Ghost"]);
    }

    #[tokio::test]
    async fn test_destroy() {
        let mut dir = directory();
        let betty = EntryClass::user().find(&mut dir, "bblue").await.unwrap();
        betty.destroy(&mut dir).await.unwrap();
        assert!(EntryClass::user().find(&mut dir, "bblue").await.is_none());

        match betty.destroy(&mut dir).await {
            Err(Error::Directory(e)) => assert!(e.is_no_such_object()),
            other => panic!("expected a directory error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_finders() {
        let mut dir = directory();
        let users = EntryClass::user();

        let john = users.find(&mut dir, "JDOE").await.unwrap();
        assert_eq!(john.dn(), JOHN_DN);
        assert!(users.find(&mut dir, "nobody").await.is_none());
        assert!(EntryClass::group().find(&mut dir, "jdoe").await.is_none());

        let betty = users.find_by(&mut dir, "mail", "betty*").await.unwrap();
        assert_eq!(betty.dn(), BETTY_DN);

        let by_dn = users.find_by(&mut dir, "dn", "cn=john doe,ou=people,dc=example,dc=com").await.unwrap();
        assert_eq!(by_dn.dn(), JOHN_DN);
        let by_dn_key = users.clone().with_primary_key("dn").find(&mut dir, BETTY_DN).await.unwrap();
        assert_eq!(by_dn_key.get_single("sn").as_str(), Some("Blue"));

        assert_eq!(users.find_all(&mut dir, "objectclass", "user").await.unwrap().len(), 2);
        assert!(users.select_dn(&mut dir, "cn=nobody,dc=example,dc=com").await.is_none());
    }

    #[tokio::test]
    async fn test_dn_finders_stay_in_class() {
        let mut dir = directory();
        let groups = EntryClass::group();

        assert!(groups.find_by(&mut dir, "dn", JOHN_DN).await.is_none());
        assert!(groups.find_by(&mut dir, "distinguishedName", JOHN_DN).await.is_none());
        assert!(groups.clone().with_primary_key("dn").find(&mut dir, JOHN_DN).await.is_none());
        assert!(groups.find_all(&mut dir, "dn", JOHN_DN).await.unwrap().is_empty());
        assert_eq!(
            groups.find_by(&mut dir, "dn", TESTGROUP_DN).await.unwrap().dn(),
            TESTGROUP_DN,
        );

        let misplaced = EntryClass::user().with_tree_base(GROUPS);
        assert!(misplaced.find_by(&mut dir, "distinguishedName", JOHN_DN).await.is_none());
        assert!(misplaced.clone().with_primary_key("dn").find(&mut dir, JOHN_DN).await.is_none());

        // exact match only
        assert!(EntryClass::user().find_by(&mut dir, "dn", "CN=John*").await.is_none());

        // the one lookup that ignores class and tree base
        assert_eq!(misplaced.select_dn(&mut dir, JOHN_DN).await.unwrap().dn(), JOHN_DN);
        assert_eq!(groups.select_dn(&mut dir, JOHN_DN).await.unwrap().dn(), JOHN_DN);
    }

    #[tokio::test]
    async fn test_finders_honour_tree_base() {
        let mut dir = directory();
        let people = EntryClass::entry().with_tree_base(PEOPLE);
        let misplaced = EntryClass::user().with_tree_base(GROUPS);

        assert_eq!(people.find(&mut dir, "jdoe").await.unwrap().dn(), JOHN_DN);
        assert!(people.find(&mut dir, "testgroup").await.is_none());
        assert!(misplaced.find(&mut dir, "jdoe").await.is_none());

        assert_eq!(people.find_by(&mut dir, "sn", "Blue").await.unwrap().dn(), BETTY_DN);
        assert!(misplaced.find_by(&mut dir, "sn", "Blue").await.is_none());

        let sn_filter = Filter::eq("sn", "*");
        assert!(people.find_first(&mut dir, &sn_filter).await.is_some());
        assert!(misplaced.find_first(&mut dir, &sn_filter).await.is_none());

        assert_eq!(people.find_all(&mut dir, "objectclass", "top").await.unwrap().len(), 2);
        assert!(misplaced.find_all(&mut dir, "objectclass", "top").await.unwrap().is_empty());

        assert!(misplaced.find_where(&mut dir, [("givenname", "John")]).await.unwrap().is_empty());
        assert!(misplaced.find_where(&mut dir, "(sn=*)").await.unwrap().is_empty());

        match misplaced.dispatch_finder(&mut dir, "find_by_mail", "jdoe@example.com").await.unwrap() {
            FinderResult::One(found) => assert!(found.is_none()),
            other => panic!("unexpected result {:?}", other),
        }
        match people.dispatch_finder(&mut dir, "find_all_by_sn", "*").await.unwrap() {
            FinderResult::Many(found) => assert_eq!(found.len(), 2),
            other => panic!("unexpected result {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_all_and_where() {
        let mut dir = directory();
        assert_eq!(EntryClass::user().all(&mut dir).await.unwrap().len(), 2);
        assert_eq!(EntryClass::group().all(&mut dir).await.unwrap().len(), 2);

        let in_groups = EntryClass::entry().with_tree_base("OU=groups,DC=example,DC=com");
        assert_eq!(in_groups.all(&mut dir).await.unwrap().len(), 2);
        let misplaced = EntryClass::user().with_tree_base("OU=groups,DC=example,DC=com");
        assert!(misplaced.all(&mut dir).await.unwrap().is_empty());

        let johns = EntryClass::user().find_where(&mut dir, [("givenname", "John")]).await.unwrap();
        assert_eq!(johns.len(), 1);
        let both = EntryClass::user().find_where(&mut dir, "(|(sn=Doe)(sn=Blue))").await.unwrap();
        assert_eq!(both.len(), 2);
        let none = EntryClass::group().find_where(&mut dir, "(sn=Doe)").await.unwrap();
        assert!(none.is_empty());

        let broken = EntryClass::user().find_where(&mut dir, "(sn=").await;
        assert!(matches!(broken, Err(Error::Directory(_))));
    }

    #[tokio::test]
    async fn test_class_create() {
        let mut dir = directory();
        let dn = format!("CN=Jane Roe,{}", PEOPLE);
        let jane = EntryClass::user().create(&mut dir, &dn, new_person("Jane", "Roe", "jroe")).await.unwrap();
        assert!(!jane.is_new());
        assert_eq!(jane.get("objectCategory").len(), 1);
        assert_eq!(EntryClass::user().find(&mut dir, "jroe").await.unwrap().dn(), dn);

        match EntryClass::user().create(&mut dir, &dn, new_person("Jane", "Roe", "jroe")).await {
            Err(Error::Directory(e)) => assert!(e.is_already_exists()),
            other => panic!("expected a directory error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_dispatch_finder() {
        let mut dir = directory();
        let users = EntryClass::user();
        assert_eq!(users.finder_attribute("find").as_deref(), Some("samaccountname"));
        assert_eq!(users.finder_attribute("find_by_id").as_deref(), Some("samaccountname"));
        assert_eq!(users.finder_attribute("find_by_mail").as_deref(), Some("mail"));
        assert_eq!(users.finder_attribute("find_all_by_sn").as_deref(), Some("sn"));
        assert_eq!(users.finder_attribute("find_by_"), None);
        assert_eq!(users.finder_attribute("destroy"), None);

        match users.dispatch_finder(&mut dir, "find_by_mail", "jdoe@example.com").await.unwrap() {
            FinderResult::One(Some(found)) => assert_eq!(found.dn(), JOHN_DN),
            other => panic!("unexpected result {:?}", other),
        }
        match users.dispatch_finder(&mut dir, "find_all_by_objectclass", "user").await.unwrap() {
            FinderResult::Many(found) => assert_eq!(found.len(), 2),
            other => panic!("unexpected result {:?}", other),
        }
        assert!(matches!(
            users.dispatch_finder(&mut dir, "frobnicate", "x").await,
            Err(Error::UnknownFinder(_)),
        ));
    }
}
