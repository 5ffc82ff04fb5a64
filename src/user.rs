use std::collections::BTreeSet;

use tracing::debug;

use crate::attributes::{AttributeValue, ValueList};
use crate::codec::{decode_account_control, encode_password, AccountControlFlag, DecodeError, MsDecodable, MsEncodable, SecurityIdentifier};
use crate::codec::account_control::parse_account_control;
use crate::directory::Directory;
use crate::entry::{typed_finders, Entry, EntryClass};
use crate::error::Result;
use crate::filter::Filter;
use crate::group::{Group, GroupClass};
use crate::tiny_directory::dn::first_rdn_value;


/// Defines the alias accessors of [`User`] and the table listing them.
macro_rules! common_user_attributes {
    ($($alias:ident / $setter:ident => $attribute:literal),+ $(,)?) => {
        /// Alias and attribute name of every convenience accessor on [`User`].
        pub const COMMON_ATTRIBUTES: &[(&str, &str)] = &[
            $((stringify!($alias), $attribute),)+
        ];

        impl User {
            $(
                #[doc = concat!("The single value of `", $attribute, "`.")]
                pub fn $alias(&self) -> Option<&str> {
                    self.entry.get_single($attribute).as_str()
                }

                #[doc = concat!("Replaces `", $attribute, "`.")]
                pub fn $setter<V: Into<ValueList>>(&mut self, values: V) {
                    self.entry.set($attribute, values);
                }
            )+
        }
    };
}

common_user_attributes! {
    lastname / set_lastname => "sn",
    firstname / set_firstname => "givenname",
    username / set_username => "samaccountname",
    email / set_email => "mail",
}

pub fn common_attributes() -> &'static [(&'static str, &'static str)] {
    COMMON_ATTRIBUTES
}


/// Where users are found, and where to look for their groups.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct UserClass {
    pub entries: EntryClass,
    pub groups: EntryClass,
}
impl UserClass {
    pub fn new(entries: EntryClass, groups: EntryClass) -> Self {
        Self {
            entries,
            groups,
        }
    }

    pub fn group_class(&self) -> GroupClass {
        GroupClass::new(self.groups.clone(), self.entries.clone())
    }
}
impl Default for UserClass {
    fn default() -> Self {
        Self::new(EntryClass::user(), EntryClass::group())
    }
}
typed_finders!(UserClass, User);

/// Class descriptors for users and groups that refer to each other.
pub fn paired_classes(user: EntryClass, group: EntryClass) -> (UserClass, GroupClass) {
    (
        UserClass::new(user.clone(), group.clone()),
        GroupClass::new(group, user),
    )
}


/// A user entry.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct User {
    entry: Entry,
    class: UserClass,
}
impl User {
    pub fn new(entry: Entry, class: UserClass) -> Self {
        Self {
            entry,
            class,
        }
    }

    pub fn class(&self) -> &UserClass {
        &self.class
    }

    pub fn into_entry(self) -> Entry {
        self.entry
    }

    /// Sets `unicodePwd`; takes effect on the next save.
    pub fn set_password(&mut self, plaintext: &str) {
        self.entry.set("unicodePwd", AttributeValue::from(encode_password(plaintext)));
    }

    pub fn account_control(&self) -> Result<BTreeSet<AccountControlFlag>> {
        let code = parse_account_control(self.entry.required_text("userAccountControl")?)?;
        Ok(decode_account_control(code))
    }

    fn primary_group_identifier(&self) -> Result<SecurityIdentifier> {
        let sid = SecurityIdentifier::try_decode(self.entry.required_value("objectSid")?.as_bytes())?;
        let rid: u32 = self.entry.required_text("primaryGroupID")?
            .trim()
            .parse()
            .map_err(|_| DecodeError::InvalidNumber)?;
        Ok(sid.with_rid(rid))
    }

    /// The user's SID with the relative identifier replaced by `primaryGroupID`.
    pub fn primary_group_sid(&self) -> Result<String> {
        Ok(self.primary_group_identifier()?.to_string())
    }

    pub async fn primary_group<D: Directory + ?Sized>(&self, directory: &mut D) -> Result<Option<Group>> {
        let sid = self.primary_group_identifier()?;
        let filter = Filter::eq_bytes("objectSid", &sid.to_ms_bytes());
        Ok(self.class.group_class().find_first(directory, &filter).await)
    }

    /// DNs of the groups the user belongs to. The attribute is created empty
    /// if the directory did not return it.
    pub fn memberof(&mut self) -> &[AttributeValue] {
        self.entry.get_defaulted("memberOf")
    }

    pub async fn groups<D: Directory + ?Sized>(&self, directory: &mut D) -> Vec<Group> {
        let group_class = self.class.group_class();
        let mut groups = Vec::new();
        for dn in self.entry.get("memberOf") {
            let Some(dn) = dn.as_str() else { continue };
            match group_class.select_dn(directory, dn).await {
                Some(group) => groups.push(group),
                None => debug!(dn, "group listed in memberOf not found"),
            }
        }
        groups
    }

    /// Sorted names (first RDN values) of the groups the user belongs to.
    pub fn group_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.entry.get("memberOf")
            .iter()
            .filter_map(|dn| dn.as_str())
            .filter_map(first_rdn_value)
            .collect();
        names.sort();
        names
    }

    /// Adds the user to `group`, saving the group right away.
    ///
    /// Returns `true` once the group is saved and the user reloaded.
    pub async fn add_group<D: Directory + ?Sized>(&mut self, directory: &mut D, group: &mut Group) -> bool {
        group.add_user(directory, self).await
            && self.entry.reload(directory).await
    }

    /// Removes the user from `group`, saving the group right away.
    pub async fn remove_group<D: Directory + ?Sized>(&mut self, directory: &mut D, group: &mut Group) -> bool {
        group.remove_user(directory, self).await
            && self.entry.reload(directory).await
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::attributes::AttributeStore;
    use crate::test_fixtures::{directory, JOHN_DN, LPADMIN_DN, TESTGROUP_DN};

    #[tokio::test]
    async fn test_aliases() {
        let mut dir = directory();
        let mut john = UserClass::default().find(&mut dir, "jdoe").await.unwrap();
        assert_eq!(john.lastname(), Some("Doe"));
        assert_eq!(john.firstname(), Some("John"));
        assert_eq!(john.username(), Some("jdoe"));
        assert_eq!(john.email(), Some("jdoe@example.com"));

        john.set_lastname("Dough");
        assert_eq!(john.get("sn"), ["Dough"]);
        assert!(john.is_changed());

        let aliases: Vec<&str> = common_attributes().iter().map(|(alias, _)| *alias).collect();
        assert_eq!(aliases, vec!["lastname", "firstname", "username", "email"]);
    }

    #[tokio::test]
    async fn test_set_password() {
        let mut dir = directory();
        let mut john = UserClass::default().find(&mut dir, "jdoe").await.unwrap();
        john.set_password("secret");
        assert_eq!(john.get("unicodePwd")[0].as_bytes(), encode_password("secret"));
        assert!(john.save(&mut dir).await);
        assert!(!john.is_present("unicodePwd"));
    }

    #[tokio::test]
    async fn test_account_control() {
        let mut dir = directory();
        let users = UserClass::default();
        let john = users.find(&mut dir, "jdoe").await.unwrap();
        let flags: Vec<AccountControlFlag> = john.account_control().unwrap().into_iter().collect();
        assert_eq!(flags, vec![AccountControlFlag::NormalAccount, AccountControlFlag::DontExpirePassword]);

        let betty = users.find(&mut dir, "bblue").await.unwrap();
        assert!(betty.account_control().unwrap().contains(&AccountControlFlag::AccountDisable));
    }

    #[tokio::test]
    async fn test_primary_group() {
        let mut dir = directory();
        let john = UserClass::default().find(&mut dir, "jdoe").await.unwrap();
        assert_eq!(john.primary_group_sid().unwrap(), "S-1-5-21-15115519-869956856-4114428504-3912");
        let group = john.primary_group(&mut dir).await.unwrap().unwrap();
        assert_eq!(group.dn(), TESTGROUP_DN);

        // 513 (Domain Users) is not in the directory
        let betty = UserClass::default().find(&mut dir, "bblue").await.unwrap();
        assert!(betty.primary_group(&mut dir).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_groups() {
        let mut dir = directory();
        let john = UserClass::default().find(&mut dir, "jdoe").await.unwrap();
        assert_eq!(john.group_names(), vec!["Testgroup"]);
        let groups = john.groups(&mut dir).await;
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].name(), Some("testgroup"));
    }

    #[tokio::test]
    async fn test_memberof_default() {
        let mut dir = directory();
        let attributes = AttributeStore::from_iter([
            ("objectClass", ValueList::from(["top", "person", "user"])),
            ("sAMAccountName", ValueList::from("jroe")),
        ]);
        let mut jane = UserClass::default()
            .create(&mut dir, "CN=Jane Roe,OU=people,DC=example,DC=com", attributes)
            .await.unwrap();
        assert!(!jane.is_present("memberOf"));
        assert!(jane.memberof().is_empty());
        assert!(jane.is_present("memberOf"));
        assert!(!jane.is_changed());
        assert!(jane.group_names().is_empty());
    }

    #[tokio::test]
    async fn test_add_and_remove_group() {
        let mut dir = directory();
        let (users, groups) = paired_classes(EntryClass::user(), EntryClass::group());
        let mut john = users.select_dn(&mut dir, JOHN_DN).await.unwrap();
        let mut lpadmin = groups.find(&mut dir, "lpadmin").await.unwrap();

        assert!(john.add_group(&mut dir, &mut lpadmin).await);
        assert_eq!(john.group_names(), vec!["Testgroup", "lpadmin"]);
        assert!(lpadmin.has_member(JOHN_DN));

        assert!(john.remove_group(&mut dir, &mut lpadmin).await);
        assert_eq!(john.group_names(), vec!["Testgroup"]);
        assert!(!dir.get(LPADMIN_DN).unwrap().attributes.contains("member"));
    }

    #[test]
    fn test_paired_classes() {
        let (users, groups) = paired_classes(
            EntryClass::user().with_tree_base("OU=people,DC=example,DC=com"),
            EntryClass::group().with_tree_base("OU=groups,DC=example,DC=com"),
        );
        assert_eq!(users.group_class(), groups);
        assert_eq!(groups.user_class(), users);
        assert_eq!(groups.users.object_category, "person");
    }
}
