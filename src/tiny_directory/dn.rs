#[derive(Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct Rdn {
    pub key: String,
    pub value: Vec<u8>,
}
impl Rdn {
    pub fn new(key: String, value: Vec<u8>) -> Self {
        Self {
            key,
            value,
        }
    }

    /// The value as text, with invalid UTF-8 replaced.
    pub fn value_lossy(&self) -> String {
        String::from_utf8_lossy(&self.value).into_owned()
    }

    /// Compares key and value ASCII-case-insensitively, like the directory does.
    pub fn matches(&self, other: &Rdn) -> bool {
        self.key.eq_ignore_ascii_case(&other.key)
            && self.value.eq_ignore_ascii_case(&other.value)
    }
}

pub fn dn_to_rdns(dn: &str) -> Option<Vec<Rdn>> {
    // RFC4514

    if dn.trim().len() == 0 {
        return Some(Vec::with_capacity(0));
    }

    let tokens = tokenize(dn)?;

    let pieces = split_at_unescaped_commas(&tokens);
    let mut rdns = Vec::with_capacity(pieces.len());
    for piece in pieces {
        let (key_tokens, value_tokens) = split_at_first_unescaped_equals(&piece)?;
        let key_bytes = tokens_to_bytes(&key_tokens);
        let rear_bytes = trim_unescaped_spaces(&value_tokens);

        let key_string = String::from_utf8(key_bytes).ok()?;
        let key_trimmed = key_string.trim();
        if key_trimmed.len() == 0 {
            return None;
        }
        rdns.push(Rdn::new(key_trimmed.to_owned(), rear_bytes));
    }

    Some(rdns)
}

/// Returns a canonical form of the DN for case-insensitive comparisons and
/// lookups, or `None` if the DN cannot be parsed.
pub fn normalize_dn(dn: &str) -> Option<String> {
    let rdns = dn_to_rdns(dn)?;
    let pieces: Vec<String> = rdns.iter()
        .map(|rdn| format!(
            "{}={}",
            rdn.key.to_ascii_lowercase(),
            String::from_utf8_lossy(&rdn.value.to_ascii_lowercase()),
        ))
        .collect();
    Some(pieces.join(","))
}

/// Compares two DNs the way the directory does. Unparseable DNs are compared
/// as text, ignoring case.
pub fn dn_eq(a: &str, b: &str) -> bool {
    match (normalize_dn(a), normalize_dn(b)) {
        (Some(a_norm), Some(b_norm)) => a_norm == b_norm,
        _ => a.eq_ignore_ascii_case(b),
    }
}

/// Whether `rdns` names `base_rdns` itself or an object below it.
pub fn is_within(rdns: &[Rdn], base_rdns: &[Rdn]) -> bool {
    if rdns.len() < base_rdns.len() {
        return false;
    }
    let offset = rdns.len() - base_rdns.len();
    rdns[offset..].iter()
        .zip(base_rdns.iter())
        .all(|(a, b)| a.matches(b))
}

/// The value of the leftmost RDN, e.g. `Testgroup` for `CN=Testgroup,OU=groups,DC=example`.
pub fn first_rdn_value(dn: &str) -> Option<String> {
    dn_to_rdns(dn)?
        .first()
        .map(|rdn| rdn.value_lossy())
}

#[derive(Clone, Copy, Debug, Hash, Eq, Ord, PartialEq, PartialOrd)]
enum Token<'a> {
    UnescapedSlice(&'a str),
    EscapedByte(u8),
}

/// Tokenizes the given DN string.
///
/// Used to abstract away escapes.
fn tokenize(dn: &str) -> Option<Vec<Token>> {
    let mut tokens = Vec::new();

    let mut current_start = 0;
    loop {
        let next_backslash = match find_from(dn, '\\', current_start) {
            Some(nb) => nb,
            None => {
                let rest_slice = &dn[current_start..];
                if rest_slice.len() > 0 {
                    tokens.push(Token::UnescapedSlice(rest_slice));
                }
                break;
            },
        };

        // eat the part until the backslash
        let eaten = &dn[current_start..next_backslash];
        tokens.push(Token::UnescapedSlice(eaten));

        // what follows the backslash?
        match dn[next_backslash+1..].chars().nth(0) {
            None => {
                // backslash at the end is invalid
                return None;
            },
            Some(c) => {
                if [' ', '"', '#', '+', ',', ';', '<', '=', '>', '\\'].binary_search(&c).is_ok() {
                    // all of these are ASCII
                    tokens.push(Token::EscapedByte(c as u8));

                    // continue after that escaped character
                    current_start = next_backslash + 2;
                } else if c.is_ascii_hexdigit() {
                    // okay, do we have another hex digit?
                    let c2 = match dn[next_backslash+2..].chars().nth(0) {
                        Some(c2) => c2,
                        None => {
                            // DN ends with a string like "\9" or "\F"
                            return None;
                        },
                    };
                    if !c2.is_ascii_hexdigit() {
                        // a string like "\A%"
                        return None;
                    }
                    let hex_slice = &dn[next_backslash+1..next_backslash+3];
                    let hex_value = u8::from_str_radix(hex_slice, 16).ok()?;
                    tokens.push(Token::EscapedByte(hex_value));

                    // continue after the second hex digit
                    current_start = next_backslash + 3;
                } else {
                    // a string like "\q"
                    return None;
                }
            },
        }
    }

    Some(tokens)
}


fn find_from(haystack: &str, needle: char, offset: usize) -> Option<usize> {
    haystack[offset..]
        .find(needle)
        .map(|i| i + offset)
}

fn split_at_unescaped_commas<'a>(tokens: &[Token<'a>]) -> Vec<Vec<Token<'a>>> {
    let mut pieces = Vec::new();
    let mut current_piece = Vec::new();
    for token in tokens {
        match token {
            Token::EscapedByte(_) => {
                current_piece.push(*token);
            },
            Token::UnescapedSlice(s) => {
                let mut rest = *s;
                while let Some(comma_index) = rest.find(',') {
                    let before = &rest[..comma_index];
                    if before.len() > 0 {
                        current_piece.push(Token::UnescapedSlice(before));
                    }
                    let push_me = std::mem::replace(&mut current_piece, Vec::new());
                    pieces.push(push_me);
                    rest = &rest[comma_index+1..];
                }
                if rest.len() > 0 {
                    current_piece.push(Token::UnescapedSlice(rest));
                }
            },
        }
    }
    if current_piece.len() > 0 {
        pieces.push(current_piece);
    }
    pieces
}

fn split_at_first_unescaped_equals<'a>(tokens: &[Token<'a>]) -> Option<(Vec<Token<'a>>, Vec<Token<'a>>)> {
    let mut front_pieces = Vec::new();
    for (i, token) in tokens.iter().enumerate() {
        match token {
            Token::EscapedByte(_) => {
                front_pieces.push(*token);
            },
            Token::UnescapedSlice(s) => {
                match s.find('=') {
                    None => {
                        front_pieces.push(*token);
                    },
                    Some(equals_index) => {
                        let before = &s[..equals_index];
                        let after = &s[equals_index+1..];

                        if before.len() > 0 {
                            front_pieces.push(Token::UnescapedSlice(before));
                        }

                        // handle the rest
                        let mut rear_pieces = Vec::new();
                        if after.len() > 0 {
                            rear_pieces.push(Token::UnescapedSlice(after));
                        }
                        rear_pieces.extend(tokens.iter().skip(i + 1).copied());

                        return Some((front_pieces, rear_pieces));
                    },
                }
            },
        }
    }

    // no unescaped equals found
    None
}

fn tokens_to_bytes(tokens: &[Token]) -> Vec<u8> {
    let mut ret = Vec::new();
    for token in tokens {
        match token {
            Token::EscapedByte(b) => ret.push(*b),
            Token::UnescapedSlice(slice) => ret.extend_from_slice(slice.as_bytes()),
        }
    }
    ret
}

/// Converts the value tokens to bytes, dropping unescaped leading and
/// trailing spaces (escaped ones are significant).
fn trim_unescaped_spaces(tokens: &[Token]) -> Vec<u8> {
    let last_index = tokens.len().saturating_sub(1);
    let mut ret = Vec::new();
    for (i, token) in tokens.iter().enumerate() {
        match token {
            Token::EscapedByte(b) => ret.push(*b),
            Token::UnescapedSlice(slice) => {
                let mut trimmed = *slice;
                if i == 0 {
                    trimmed = trimmed.trim_start_matches(' ');
                }
                if i == last_index {
                    trimmed = trimmed.trim_end_matches(' ');
                }
                ret.extend_from_slice(trimmed.as_bytes());
            },
        }
    }
    ret
}
