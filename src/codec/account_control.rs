use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use crate::codec::DecodeError;


macro_rules! define_account_control_flags {
    ($($variant:ident => ($name:expr, $mask:expr)),+ $(,)?) => {
        /// A `userAccountControl` property.
        ///
        /// See <https://learn.microsoft.com/en-us/troubleshoot/windows-server/active-directory/useraccountcontrol-manipulate-account-properties>.
        #[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
        pub enum AccountControlFlag {
            $($variant,)+
        }
        impl AccountControlFlag {
            pub const ALL: &'static [AccountControlFlag] = &[
                $(AccountControlFlag::$variant,)+
            ];

            pub const fn mask(&self) -> u32 {
                match self {
                    $(Self::$variant => $mask,)+
                }
            }

            pub const fn name(&self) -> &'static str {
                match self {
                    $(Self::$variant => $name,)+
                }
            }
        }
    };
}

define_account_control_flags! {
    Script => ("SCRIPT", 0x0001),
    AccountDisable => ("ACCOUNTDISABLE", 0x0002),
    HomedirRequired => ("HOMEDIR_REQUIRED", 0x0008),
    Lockout => ("LOCKOUT", 0x0010),
    PasswdNotreqd => ("PASSWD_NOTREQD", 0x0020),
    PasswdCantChange => ("PASSWD_CANT_CHANGE", 0x0040),
    EncryptedTextPwdAllowed => ("ENCRYPTED_TEXT_PWD_ALLOWED", 0x0080),
    TempDuplicateAccount => ("TEMP_DUPLICATE_ACCOUNT", 0x0100),
    NormalAccount => ("NORMAL_ACCOUNT", 0x0200),
    InterdomainTrustAccount => ("INTERDOMAIN_TRUST_ACCOUNT", 0x0800),
    WorkstationTrustAccount => ("WORKSTATION_TRUST_ACCOUNT", 0x1000),
    ServerTrustAccount => ("SERVER_TRUST_ACCOUNT", 0x2000),
    DontExpirePassword => ("DONT_EXPIRE_PASSWORD", 0x0001_0000),
    MnsLogonAccount => ("MNS_LOGON_ACCOUNT", 0x0002_0000),
    SmartcardRequired => ("SMARTCARD_REQUIRED", 0x0004_0000),
    TrustedForDelegation => ("TRUSTED_FOR_DELEGATION", 0x0008_0000),
    NotDelegated => ("NOT_DELEGATED", 0x0010_0000),
    UseDesKeyOnly => ("USE_DES_KEY_ONLY", 0x0020_0000),
    DontReqPreauth => ("DONT_REQ_PREAUTH", 0x0040_0000),
    PasswordExpired => ("PASSWORD_EXPIRED", 0x0080_0000),
    TrustedToAuthForDelegation => ("TRUSTED_TO_AUTH_FOR_DELEGATION", 0x0100_0000),
    PartialSecretsAccount => ("PARTIAL_SECRETS_ACCOUNT", 0x0400_0000),
}

impl fmt::Display for AccountControlFlag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}
impl FromStr for AccountControlFlag {
    type Err = DecodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL.iter()
            .copied()
            .find(|flag| flag.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| DecodeError::UnknownFlag(s.to_owned()))
    }
}


/// Returns every flag whose mask is fully set in `code`.
pub fn decode_account_control(code: u32) -> BTreeSet<AccountControlFlag> {
    AccountControlFlag::ALL.iter()
        .copied()
        .filter(|flag| code & flag.mask() == flag.mask())
        .collect()
}

/// Combines the given flags into a `userAccountControl` code.
///
/// Duplicates are collapsed.
pub fn encode_account_control<I: IntoIterator<Item = AccountControlFlag>>(flags: I) -> u32 {
    flags.into_iter()
        .fold(0, |code, flag| code | flag.mask())
}

/// Parses the decimal string form in which the directory returns the attribute.
pub fn parse_account_control(text: &str) -> Result<u32, DecodeError> {
    // the attribute is a signed 32-bit integer in the schema
    let signed: i32 = text.trim().parse()
        .map_err(|_| DecodeError::InvalidNumber)?;
    Ok(signed as u32)
}


#[cfg(test)]
mod tests {
    use super::*;
    use super::AccountControlFlag as F;

    #[test]
    fn test_decode() {
        let flags = decode_account_control(66050);
        assert_eq!(
            flags.into_iter().collect::<Vec<_>>(),
            vec![F::AccountDisable, F::NormalAccount, F::DontExpirePassword],
        );
        assert!(decode_account_control(0).is_empty());
    }

    #[test]
    fn test_encode() {
        assert_eq!(encode_account_control([F::AccountDisable, F::NormalAccount, F::DontExpirePassword]), 66050);
        assert_eq!(encode_account_control([F::DontExpirePassword, F::DontExpirePassword, F::NormalAccount]), 66048);
        assert_eq!(encode_account_control(Vec::<F>::new()), 0);
    }

    #[test]
    fn test_decode_inverts_encode() {
        let subsets: [&[F]; 3] = [
            &[F::PartialSecretsAccount, F::Script],
            &[F::Lockout, F::Lockout, F::SmartcardRequired, F::NotDelegated],
            F::ALL,
        ];
        for subset in subsets {
            let expected: BTreeSet<F> = subset.iter().copied().collect();
            assert_eq!(decode_account_control(encode_account_control(subset.iter().copied())), expected);
        }
    }

    #[test]
    fn test_names() {
        assert_eq!("NORMAL_ACCOUNT".parse::<F>().unwrap(), F::NormalAccount);
        assert_eq!("accountdisable".parse::<F>().unwrap(), F::AccountDisable);
        assert_eq!("BOGUS".parse::<F>(), Err(DecodeError::UnknownFlag("BOGUS".to_owned())));
        assert_eq!(F::DontReqPreauth.to_string(), "DONT_REQ_PREAUTH");
    }

    #[test]
    fn test_parse_attribute() {
        assert_eq!(parse_account_control("66048").unwrap(), 66048);
        assert_eq!(parse_account_control("-1").unwrap(), u32::MAX);
        assert_eq!(parse_account_control("x"), Err(DecodeError::InvalidNumber));
    }
}
