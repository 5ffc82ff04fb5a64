use tracing::{debug, warn};

use crate::attributes::AttributeValue;
use crate::codec::{DecodeError, MsDecodable, SecurityIdentifier};
use crate::directory::Directory;
use crate::entry::{typed_finders, Entry, EntryClass};
use crate::error::Result;
use crate::tiny_directory::dn::dn_eq;
use crate::user::{User, UserClass};


/// Where groups are found, and where to look for their members.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct GroupClass {
    pub entries: EntryClass,
    pub users: EntryClass,
}
impl GroupClass {
    pub fn new(entries: EntryClass, users: EntryClass) -> Self {
        Self {
            entries,
            users,
        }
    }

    pub fn user_class(&self) -> UserClass {
        UserClass::new(self.users.clone(), self.entries.clone())
    }
}
impl Default for GroupClass {
    fn default() -> Self {
        Self::new(EntryClass::group(), EntryClass::user())
    }
}
typed_finders!(GroupClass, Group);


/// A group entry.
///
/// Membership changes made through [`add_user`](Group::add_user) and
/// [`remove_user`](Group::remove_user) are saved immediately.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Group {
    entry: Entry,
    class: GroupClass,
}
impl Group {
    pub fn new(entry: Entry, class: GroupClass) -> Self {
        Self {
            entry,
            class,
        }
    }

    pub fn class(&self) -> &GroupClass {
        &self.class
    }

    pub fn into_entry(self) -> Entry {
        self.entry
    }

    pub fn name(&self) -> Option<&str> {
        self.entry.get_single("samaccountname").as_str()
    }

    /// DNs of the members. The attribute is created empty if the directory
    /// did not return it.
    pub fn members(&mut self) -> &[AttributeValue] {
        self.entry.get_defaulted("member")
    }

    pub fn has_member(&self, dn: &str) -> bool {
        self.entry.get("member")
            .iter()
            .filter_map(|member| member.as_str())
            .any(|member| dn_eq(member, dn))
    }

    pub async fn users<D: Directory + ?Sized>(&self, directory: &mut D) -> Vec<User> {
        let user_class = self.class.user_class();
        let mut users = Vec::new();
        for dn in self.entry.get("member") {
            let Some(dn) = dn.as_str() else { continue };
            match user_class.select_dn(directory, dn).await {
                Some(user) => users.push(user),
                None => debug!(dn, "member not found"),
            }
        }
        users
    }

    /// Sorted usernames of all members.
    pub async fn members_usernames<D: Directory + ?Sized>(&self, directory: &mut D) -> Vec<String> {
        let mut usernames: Vec<String> = self.users(directory).await
            .iter()
            .filter_map(|user| user.username())
            .map(|username| username.to_owned())
            .collect();
        usernames.sort();
        usernames
    }

    /// The user whose `primaryGroupID` is this group's relative identifier.
    pub async fn primary_user<D: Directory + ?Sized>(&self, directory: &mut D) -> Result<Option<User>> {
        let sid = SecurityIdentifier::try_decode(self.entry.required_value("objectSid")?.as_bytes())?;
        let rid = sid.rid()
            .ok_or_else(|| DecodeError::InvalidFormat("SID has no sub-authorities".to_owned()))?;
        Ok(self.class.user_class().find_by(directory, "primaryGroupID", &rid.to_string()).await)
    }

    pub async fn is_primary_group<D: Directory + ?Sized>(&self, directory: &mut D) -> Result<bool> {
        Ok(self.primary_user(directory).await?.is_some())
    }

    /// Adds `user` to the members and saves. Does nothing if `user` already
    /// is a member.
    pub async fn add_user<D: Directory + ?Sized>(&mut self, directory: &mut D, user: &User) -> bool {
        if self.has_member(user.dn()) {
            return true;
        }
        let mut members = self.entry.get("member").to_vec();
        members.push(AttributeValue::from(user.dn()));
        self.save_members(directory, members).await
    }

    /// Removes `user` from the members and saves. Does nothing if `user` is
    /// not a member.
    pub async fn remove_user<D: Directory + ?Sized>(&mut self, directory: &mut D, user: &User) -> bool {
        if !self.has_member(user.dn()) {
            return true;
        }
        let members: Vec<AttributeValue> = self.entry.get("member")
            .iter()
            .filter(|member| !member.as_str().is_some_and(|m| dn_eq(m, user.dn())))
            .cloned()
            .collect();
        self.save_members(directory, members).await
    }

    /// Replaces `member` and saves; restores the previous members if the
    /// save fails.
    async fn save_members<D: Directory + ?Sized>(&mut self, directory: &mut D, members: Vec<AttributeValue>) -> bool {
        let previous = self.entry.attributes().get_present("member").map(|values| values.to_vec());
        self.entry.set("member", members);
        if self.entry.save(directory).await {
            return true;
        }

        warn!(group = %self.entry.dn(), "membership change was not saved");
        match previous {
            Some(values) => self.entry.set("member", values),
            None => {
                self.entry.remove("member");
            },
        }
        false
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_fixtures::{directory, BETTY_DN, JOHN_DN, LPADMIN_DN};

    #[tokio::test]
    async fn test_members_default() {
        let mut dir = directory();
        let mut lpadmin = GroupClass::default().find(&mut dir, "lpadmin").await.unwrap();
        assert_eq!(lpadmin.name(), Some("lpadmin"));
        assert!(!lpadmin.is_present("member"));
        assert!(lpadmin.members().is_empty());
        assert!(lpadmin.attribute_names().any(|name| name == "member"));
        assert!(!lpadmin.is_changed());
    }

    #[tokio::test]
    async fn test_add_and_remove_user() {
        let mut dir = directory();
        let groups = GroupClass::default();
        let john = groups.user_class().find(&mut dir, "jdoe").await.unwrap();
        let mut lpadmin = groups.find(&mut dir, "lpadmin").await.unwrap();
        assert!(lpadmin.members().is_empty());

        assert!(lpadmin.add_user(&mut dir, &john).await);
        assert_eq!(lpadmin.members(), [JOHN_DN]);
        assert!(!lpadmin.is_changed());
        assert_eq!(dir.get(LPADMIN_DN).unwrap().values_for("member"), [JOHN_DN]);

        // already a member
        assert!(lpadmin.add_user(&mut dir, &john).await);
        assert_eq!(lpadmin.members().len(), 1);

        assert!(lpadmin.remove_user(&mut dir, &john).await);
        assert!(!lpadmin.has_member(JOHN_DN));
        assert!(lpadmin.members().is_empty());
        assert!(!lpadmin.is_changed());

        // not a member any more
        assert!(lpadmin.remove_user(&mut dir, &john).await);
    }

    #[tokio::test]
    async fn test_failed_add_restores_members() {
        let mut dir = directory();
        let groups = GroupClass::default();
        let john = groups.user_class().find(&mut dir, "jdoe").await.unwrap();
        let mut lpadmin = groups.find(&mut dir, "lpadmin").await.unwrap();
        // make the save fail along with the membership change
        lpadmin.set("objectClass", Vec::<&str>::new());

        assert!(!lpadmin.add_user(&mut dir, &john).await);
        assert!(!lpadmin.is_present("member"));
        assert!(dir.get(LPADMIN_DN).unwrap().values_for("member").is_empty());
    }

    #[tokio::test]
    async fn test_users() {
        let mut dir = directory();
        let testgroup = GroupClass::default().find(&mut dir, "testgroup").await.unwrap();
        assert!(testgroup.has_member("cn=betty blue,ou=people,dc=example,dc=com"));

        let users = testgroup.users(&mut dir).await;
        let dns: Vec<&str> = users.iter().map(|user| user.dn()).collect();
        assert_eq!(dns, vec![JOHN_DN, BETTY_DN]);
        assert_eq!(testgroup.members_usernames(&mut dir).await, vec!["bblue", "jdoe"]);
    }

    #[tokio::test]
    async fn test_primary_user() {
        let mut dir = directory();
        let groups = GroupClass::default();

        let testgroup = groups.find(&mut dir, "testgroup").await.unwrap();
        let primary = testgroup.primary_user(&mut dir).await.unwrap().unwrap();
        assert_eq!(primary.dn(), JOHN_DN);
        assert!(testgroup.is_primary_group(&mut dir).await.unwrap());

        let lpadmin = groups.find(&mut dir, "lpadmin").await.unwrap();
        assert!(!lpadmin.is_primary_group(&mut dir).await.unwrap());
    }
}
