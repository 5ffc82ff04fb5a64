//! A small directory shared by the tests.

use crate::tiny_directory::TinyDirectory;


pub const BASE: &str = "DC=example,DC=com";

pub const JOHN_DN: &str = "CN=John Doe,OU=people,DC=example,DC=com";
pub const BETTY_DN: &str = "CN=Betty Blue,OU=people,DC=example,DC=com";
pub const TESTGROUP_DN: &str = "CN=Testgroup,OU=groups,DC=example,DC=com";
pub const LPADMIN_DN: &str = "CN=lpadmin,OU=groups,DC=example,DC=com";

pub const LDIF: &str = "\
version: 1

dn: DC=example,DC=com
objectClass: top
objectClass: domain
dc: example

dn: OU=people,DC=example,DC=com
objectClass: top
objectClass: organizationalUnit
ou: people

dn: OU=groups,DC=example,DC=com
objectClass: top
objectClass: organizationalUnit
ou: groups

dn: CN=John Doe,OU=people,DC=example,DC=com
objectClass: top
objectClass: person
objectClass: organizationalPerson
objectClass: user
objectCategory: CN=Person,CN=Schema,CN=Configuration,DC=example,DC=com
cn: John Doe
givenName: John
sn: Doe
sAMAccountName: jdoe
mail: jdoe@example.com
userAccountControl: 66048
primaryGroupID: 3912
objectSid:: AQUAAAAAAAUVAAAA/6TmAPh82jNYMj31UQQAAA==
objectGUID:: 7haMc0L3AUu711isY9DoXA==
whenCreated: 20140912081209.0Z
whenChanged: 20150310104529.0Z

dn: CN=Betty Blue,OU=people,DC=example,DC=com
objectClass: top
objectClass: person
objectClass: organizationalPerson
objectClass: user
objectCategory: CN=Person,CN=Schema,CN=Configuration,DC=example,DC=com
cn: Betty Blue
givenName: Betty
sn: Blue
sAMAccountName: bblue
mail: betty.blue@example.com
userAccountControl: 514
primaryGroupID: 513
objectSid:: AQUAAAAAAAUVAAAA/6TmAPh82jNYMj31UgQAAA==
whenCreated: 20140912081209.0Z
whenChanged: 20140912081209.0Z

dn: CN=Testgroup,OU=groups,DC=example,DC=com
objectClass: top
objectClass: group
objectCategory: CN=Group,CN=Schema,CN=Configuration,DC=example,DC=com
cn: Testgroup
sAMAccountName: testgroup
objectSid:: AQUAAAAAAAUVAAAA/6TmAPh82jNYMj31SA8AAA==
member: CN=John Doe,OU=people,DC=example,DC=com
member: CN=Betty Blue,OU=people,DC=example,DC=com

dn: CN=lpadmin,OU=groups,DC=example,DC=com
objectClass: top
objectClass: group
objectCategory: CN=Group,CN=Schema,CN=Configuration,DC=example,DC=com
cn: lpadmin
sAMAccountName: lpadmin
objectSid:: AQUAAAAAAAUVAAAA/6TmAPh82jNYMj31sAQAAA==
";


pub fn directory() -> TinyDirectory {
    TinyDirectory::from_ldif(BASE, LDIF)
}
