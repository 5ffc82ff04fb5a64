use std::borrow::Cow;

use base64::Engine;
use tracing::warn;

use crate::attributes::{AttributeStore, AttributeValue};
use crate::directory::DirectoryEntry;


fn normalize_newlines<'a>(ldif: &'a str) -> Cow<'a, str> {
    if ldif.contains("\r\n") {
        Cow::Owned(ldif.replace("\r\n", "\n"))
    } else {
        Cow::Borrowed(ldif)
    }
}

fn join_continuations<'a>(ldif: &'a str) -> Cow<'a, str> {
    if ldif.contains("\n ") {
        Cow::Owned(ldif.replace("\n ", ""))
    } else {
        Cow::Borrowed(ldif)
    }
}

fn strip_comments<'a>(ldif: &'a str) -> Cow<'a, str> {
    if ldif.starts_with('#') || ldif.contains("\n#") {
        let mut uncommented = String::with_capacity(ldif.len());
        let mut in_comment = false;
        let mut first_line = true;
        for ln in ldif.split('\n') {
            // comments may be continued like any other line
            if ln.starts_with('#') || (in_comment && ln.starts_with(' ')) {
                in_comment = true;
                continue;
            }
            in_comment = false;

            if first_line {
                first_line = false;
            } else {
                uncommented.push('\n');
            }
            uncommented.push_str(ln);
        }
        Cow::Owned(uncommented)
    } else {
        Cow::Borrowed(ldif)
    }
}

fn compress_newlines<'a>(ldif: &'a str) -> Cow<'a, str> {
    if ldif.contains("\n\n\n") {
        let mut compressed = ldif.replace("\n\n\n", "\n\n");
        while compressed.contains("\n\n\n") {
            compressed = compressed.replace("\n\n\n", "\n\n");
        }
        Cow::Owned(compressed)
    } else {
        Cow::Borrowed(ldif)
    }
}

fn cut_str_to_max(s: &str, mut max_bytes: usize) -> &str {
    if s.len() <= max_bytes {
        return s;
    }
    while !s.is_char_boundary(max_bytes) {
        max_bytes -= 1;
    }
    &s[0..max_bytes]
}

fn decode_value(rest: &str) -> Option<Vec<u8>> {
    if let Some(base64_str) = rest.strip_prefix(':') {
        // base64
        let base64_str = base64_str.trim_matches(' ');
        match base64::engine::general_purpose::STANDARD.decode(base64_str) {
            Ok(bs) => Some(bs),
            Err(_) => {
                warn!(value = cut_str_to_max(base64_str, 64), "invalid base64 value");
                None
            },
        }
    } else if rest.starts_with('<') {
        warn!(value = rest, "URL values are not supported");
        None
    } else {
        // plain, possibly empty
        Some(rest.trim_matches(' ').as_bytes().to_vec())
    }
}


/// Parses LDIF content records into directory entries, in file order.
///
/// Records without a `dn` line are skipped.
pub fn parse_ldif(ldif: &str) -> Vec<DirectoryEntry> {
    // normalize LDIF
    let normalized = normalize_newlines(ldif);
    let stripped = strip_comments(&*normalized);
    let joined = join_continuations(&*stripped);
    let compressed = compress_newlines(&*joined);

    // each record is now separated by "\n\n"
    let mut records = Vec::new();
    for record in compressed.split("\n\n") {
        let mut dn = None;
        let mut attributes = AttributeStore::new();
        let mut only_version = true;

        // and each attribute in the record by "\n"
        for line in record.split('\n') {
            if line.is_empty() {
                continue;
            }

            // split at the attribute name
            let Some((key, rest)) = line.split_once(':') else {
                warn!(line = cut_str_to_max(line, 64), "skipping LDIF line missing colon");
                continue;
            };
            let Some(value) = decode_value(rest) else { continue };

            if key.eq_ignore_ascii_case("version") {
                continue;
            }
            only_version = false;
            if key.eq_ignore_ascii_case("dn") {
                match String::from_utf8(value) {
                    Ok(d) => dn = Some(d),
                    Err(_) => warn!("skipping non-UTF-8 dn"),
                }
            } else {
                attributes.push(key, AttributeValue::from(value));
            }
        }

        match dn {
            Some(dn) => records.push(DirectoryEntry::new(dn, attributes)),
            None if only_version => {},
            None => warn!(attributes = attributes.len(), "skipping LDIF record missing required \"dn\" pseudo-attribute"),
        }
    }

    records
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_records() {
        let ldif = "version: 1\n\
            \n\
            dn: CN=John Doe,OU=people,DC=example,DC=com\n\
            objectClass: top\n\
            objectClass: user\n\
            sn: Doe\n\
            description:\n\
            \n\
            \n\
            dn: OU=people,DC=example,DC=com\n\
            ou: people\n";
        let entries = parse_ldif(ldif);
        assert_eq!(entries.len(), 2);

        let john = &entries[0];
        assert_eq!(john.dn(), "CN=John Doe,OU=people,DC=example,DC=com");
        assert_eq!(john.values_for("objectclass"), ["top", "user"]);
        assert_eq!(john.values_for("sn"), ["Doe"]);
        assert_eq!(john.values_for("description"), [""]);
        assert_eq!(john.attribute_names().collect::<Vec<_>>(), vec!["objectClass", "sn", "description"]);

        assert_eq!(entries[1].values_for("ou"), ["people"]);
    }

    #[test]
    fn test_base64_and_continuations() {
        let ldif = "dn: cn=x,dc=example,dc=com\r\n\
            objectGUID:: 7haMc0L3AUu711isY9DoXA==\r\n\
            description: a long\r\n  line\r\n";
        let entries = parse_ldif(ldif);
        assert_eq!(entries.len(), 1);
        assert_eq!(
            entries[0].values_for("objectGUID")[0].as_bytes(),
            [0xEE, 0x16, 0x8C, 0x73, 0x42, 0xF7, 0x01, 0x4B, 0xBB, 0xD7, 0x58, 0xAC, 0x63, 0xD0, 0xE8, 0x5C],
        );
        assert_eq!(entries[0].values_for("description"), ["a long line"]);
    }

    #[test]
    fn test_comments() {
        let ldif = "# exported\n\
            #  continued comment\n\
            dn: cn=x,dc=example,dc=com\n\
            # inline comment\n\
            cn: x\n";
        let entries = parse_ldif(ldif);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].values_for("cn"), ["x"]);
        assert_eq!(entries[0].attribute_names().count(), 1);
    }

    #[test]
    fn test_skips_records_without_dn() {
        let ldif = "cn: orphan\n\ndn: cn=x,dc=example,dc=com\ncn: x\n";
        let entries = parse_ldif(ldif);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].dn(), "cn=x,dc=example,dc=com");
    }

    #[test]
    fn test_invalid_base64_value_is_dropped() {
        let ldif = "dn: cn=x,dc=example,dc=com\ncn: x\nobjectSid:: !!!\n";
        let entries = parse_ldif(ldif);
        assert!(entries[0].values_for("objectSid").is_empty());
        assert_eq!(entries[0].values_for("cn"), ["x"]);
    }
}
