//! The token name taxonomy.
//!
//! A name string classifies into exactly one [`KnownTokenType`] or fails
//! with a structured [`NameError`]. Classification is a hand-rolled
//! character-class scan over the delimiter structure: `/` separates sub
//! levels, a trailing `!` marks an owner token, `#` marks a unique tag
//! (trailing) or a qualifier (leading), `~` a message channel tag, `^` a
//! vote tag and a leading `$` a restricted token.

/// Maximum name length, excluding the owner tag `!`.
pub const MAX_NAME_LENGTH: usize = 31;

/// Maximum length of a message channel tag.
pub const MAX_CHANNEL_NAME_LENGTH: usize = 12;

/// Minimum length of a root token name.
pub const MIN_TOKEN_LENGTH: usize = 3;

/// Absolute length guard applied before any other inspection.
const MAX_SCAN_LENGTH: usize = 40;

/// The owner tag appended to a token name to form its owner token.
pub const OWNER_TAG: char = '!';

/// Sigil prefixing restricted token names.
pub const RESTRICTED_CHAR: char = '$';

/// Sigil prefixing qualifier token names.
pub const QUALIFIER_CHAR: char = '#';

/// The closed set of token kinds derivable from a name.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
pub enum KnownTokenType {
    Root,
    Sub,
    Unique,
    MsgChannel,
    Owner,
    Vote,
    Qualifier,
    SubQualifier,
    Restricted,
}

/// Why a name failed classification. The message is diagnostic; the
/// consensus-visible rejection codes live in [`crate::types::error`].
#[derive(Debug, Clone, Eq, PartialEq, thiserror::Error)]
pub enum NameError {
    #[error("name is greater than max length of {max}")]
    TooLong { max: usize },
    #[error("name must contain at least {min} characters")]
    TooShort { min: usize },
    #[error(
        "name contains invalid characters (valid characters are: A-Z 0-9 _ .) \
         (special characters can't be the first or last characters)"
    )]
    InvalidRootName,
    #[error(
        "unique name contains invalid characters \
         (valid characters are: A-Z a-z 0-9 @ $ % & * ( ) [ ] {{ }} _ . ? : -)"
    )]
    InvalidUniqueName,
    #[error(
        "message channel name contains invalid characters (valid characters are: A-Z 0-9 _ .) \
         (special characters can't be the first or last characters)"
    )]
    InvalidMsgChannelName,
    #[error("channel name is greater than max length of {max}")]
    ChannelTagTooLong { max: usize },
    #[error(
        "owner name contains invalid characters (valid characters are: A-Z 0-9 _ .) \
         (special characters can't be the first or last characters)"
    )]
    InvalidOwnerName,
    #[error(
        "vote name contains invalid characters (valid characters are: A-Z 0-9 _ .) \
         (special characters can't be the first or last characters)"
    )]
    InvalidVoteName,
    #[error(
        "qualifier name contains invalid characters (valid characters are: A-Z 0-9 _ .) \
         (# must be the first character, _ . special characters can't be the first or last \
         characters)"
    )]
    InvalidQualifierName,
    #[error(
        "restricted name contains invalid characters (valid characters are: A-Z 0-9 _ .) \
         ($ must be the first character, _ . special characters can't be the first or last \
         characters)"
    )]
    InvalidRestrictedName,
    #[error("name is reserved for the network currency")]
    ReservedName,
}

fn is_root_char(c: char) -> bool {
    c.is_ascii_uppercase() || c.is_ascii_digit() || c == '.' || c == '_'
}

fn is_unique_tag_char(c: char) -> bool {
    c.is_ascii_alphanumeric()
        || matches!(
            c,
            '-' | '@' | '$' | '%' | '&' | '*' | '(' | ')' | '[' | ']' | '{' | '}' | '_' | '.'
                | '?' | ':'
        )
}

fn is_channel_tag_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

fn is_punct(c: char) -> bool {
    c == '.' || c == '_'
}

fn has_double_punctuation(s: &str) -> bool {
    let bytes = s.as_bytes();
    bytes
        .windows(2)
        .any(|w| is_punct(w[0] as char) && is_punct(w[1] as char))
}

fn has_edge_punctuation(s: &str) -> bool {
    s.chars().next().map_or(false, is_punct) || s.chars().last().map_or(false, is_punct)
}

fn is_root_name_valid(part: &str, reserved: &[String]) -> bool {
    part.len() >= MIN_TOKEN_LENGTH
        && part.chars().all(is_root_char)
        && !has_double_punctuation(part)
        && !has_edge_punctuation(part)
        && !reserved.iter().any(|r| r == part)
}

fn is_sub_name_valid(part: &str) -> bool {
    !part.is_empty()
        && part.chars().all(is_root_char)
        && !has_double_punctuation(part)
        && !has_edge_punctuation(part)
}

/// The root/sub chain that precedes a unique, channel, vote or owner tag.
fn is_name_valid_before_tag(name: &str, reserved: &[String]) -> bool {
    let mut parts = name.split('/');
    let front = parts.next().unwrap_or("");
    if !is_root_name_valid(front, reserved) {
        return false;
    }
    parts.all(is_sub_name_valid)
}

fn is_unique_tag_valid(tag: &str) -> bool {
    !tag.is_empty() && tag.chars().all(is_unique_tag_char)
}

fn is_vote_tag_valid(tag: &str) -> bool {
    !tag.is_empty() && tag.chars().all(is_root_char)
}

fn is_channel_tag_valid(tag: &str) -> bool {
    !tag.is_empty()
        && tag.chars().all(is_channel_tag_char)
        && !has_double_punctuation(tag)
        && !has_edge_punctuation(tag)
}

/// A single-level qualifier name: `#` followed by at least three characters,
/// with the usual punctuation restrictions after the sigil.
fn is_qualifier_name_valid(part: &str) -> bool {
    let Some(rest) = part.strip_prefix(QUALIFIER_CHAR) else {
        return false;
    };
    rest.len() >= MIN_TOKEN_LENGTH
        && rest.chars().all(is_root_char)
        && !has_double_punctuation(rest)
        && !rest.chars().next().map_or(false, is_punct)
        && !rest.chars().last().map_or(false, is_punct)
}

fn is_sub_qualifier_part_valid(part: &str) -> bool {
    let Some(rest) = part.strip_prefix(QUALIFIER_CHAR) else {
        return false;
    };
    !rest.is_empty()
        && rest.chars().all(is_root_char)
        && !has_double_punctuation(rest)
        && !rest.chars().next().map_or(false, is_punct)
        && !rest.chars().last().map_or(false, is_punct)
}

/// A qualifier with at most one sub-qualifier level under it.
fn is_qualifier_name_valid_before_tag(name: &str) -> bool {
    let parts: Vec<&str> = name.split('/').collect();
    if parts.len() > 2 {
        return false;
    }
    if !is_qualifier_name_valid(parts[0]) {
        return false;
    }
    parts[1..].iter().all(|p| is_sub_qualifier_part_valid(p))
}

fn is_restricted_name_valid(name: &str) -> bool {
    let Some(rest) = name.strip_prefix(RESTRICTED_CHAR) else {
        return false;
    };
    rest.len() >= MIN_TOKEN_LENGTH
        && rest.chars().all(is_root_char)
        && !has_double_punctuation(rest)
        && !rest.chars().next().map_or(false, is_punct)
        && !rest.chars().last().map_or(false, is_punct)
}

/// Characters that never occur inside the base part of a tagged name.
fn base_excludes(base: &str) -> bool {
    !base.is_empty() && !base.contains(['^', '~', '#', '!'])
}

/// Characters that never occur inside a trailing tag.
fn tag_excludes(tag: &str) -> bool {
    !tag.is_empty() && !tag.contains(['~', '#', '!', '/'])
}

/// Splits `name` at the first `delim` into `(base, tag)` when it has the
/// shape of a tagged name.
fn split_tagged(name: &str, delim: char) -> Option<(&str, &str)> {
    let pos = name.find(delim)?;
    let (base, tag) = (&name[..pos], &name[pos + 1..]);
    (base_excludes(base) && tag_excludes(tag)).then_some((base, tag))
}

/// Classify a token name, rejecting `reserved` strings in root position.
///
/// Classification is total and exclusive: any input string maps to exactly
/// one kind or to an error, deterministically.
pub fn token_name_kind(name: &str, reserved: &[String]) -> Result<KnownTokenType, NameError> {
    // Length guard before any scanning.
    if name.len() > MAX_SCAN_LENGTH {
        return Err(NameError::TooLong {
            max: MAX_SCAN_LENGTH,
        });
    }

    if let Some((base, tag)) = split_tagged(name, '#') {
        if name.len() > MAX_NAME_LENGTH {
            return Err(NameError::TooLong {
                max: MAX_NAME_LENGTH,
            });
        }
        if is_name_valid_before_tag(base, reserved) && is_unique_tag_valid(tag) {
            return Ok(KnownTokenType::Unique);
        }
        return Err(NameError::InvalidUniqueName);
    }

    if let Some((base, tag)) = split_tagged(name, '~') {
        if name.len() > MAX_NAME_LENGTH {
            return Err(NameError::TooLong {
                max: MAX_NAME_LENGTH,
            });
        }
        if tag.len() > MAX_CHANNEL_NAME_LENGTH {
            return Err(NameError::ChannelTagTooLong {
                max: MAX_CHANNEL_NAME_LENGTH,
            });
        }
        if is_name_valid_before_tag(base, reserved) && is_channel_tag_valid(tag) {
            return Ok(KnownTokenType::MsgChannel);
        }
        return Err(NameError::InvalidMsgChannelName);
    }

    if let Some(base) = name.strip_suffix(OWNER_TAG) {
        if base_excludes(base) {
            if name.len() > MAX_NAME_LENGTH {
                return Err(NameError::TooLong {
                    max: MAX_NAME_LENGTH,
                });
            }
            if is_name_valid_before_tag(base, reserved) {
                return Ok(KnownTokenType::Owner);
            }
            return Err(NameError::InvalidOwnerName);
        }
    }

    if let Some((base, tag)) = split_tagged(name, '^') {
        if name.len() > MAX_NAME_LENGTH {
            return Err(NameError::TooLong {
                max: MAX_NAME_LENGTH,
            });
        }
        if is_name_valid_before_tag(base, reserved) && is_vote_tag_valid(tag) {
            return Ok(KnownTokenType::Vote);
        }
        return Err(NameError::InvalidVoteName);
    }

    if name.starts_with(QUALIFIER_CHAR) {
        if name.len() > MAX_NAME_LENGTH {
            return Err(NameError::TooLong {
                max: MAX_NAME_LENGTH,
            });
        }
        if is_qualifier_name_valid_before_tag(name) {
            return Ok(if name.contains('/') {
                KnownTokenType::SubQualifier
            } else {
                KnownTokenType::Qualifier
            });
        }
        return Err(NameError::InvalidQualifierName);
    }

    if name.starts_with(RESTRICTED_CHAR) {
        if name.len() > MAX_NAME_LENGTH {
            return Err(NameError::TooLong {
                max: MAX_NAME_LENGTH,
            });
        }
        if is_restricted_name_valid(name) {
            return Ok(KnownTokenType::Restricted);
        }
        return Err(NameError::InvalidRestrictedName);
    }

    // Root or sub token. One character is reserved for the owner tag.
    if name.len() > MAX_NAME_LENGTH - 1 {
        return Err(NameError::TooLong {
            max: MAX_NAME_LENGTH - 1,
        });
    }
    let is_sub = name.contains('/');
    if !is_sub && name.len() < MIN_TOKEN_LENGTH {
        return Err(NameError::TooShort {
            min: MIN_TOKEN_LENGTH,
        });
    }
    if reserved.iter().any(|r| r == name.split('/').next().unwrap_or("")) {
        return Err(NameError::ReservedName);
    }
    if is_name_valid_before_tag(name, reserved) {
        Ok(if is_sub {
            KnownTokenType::Sub
        } else {
            KnownTokenType::Root
        })
    } else {
        Err(NameError::InvalidRootName)
    }
}

/// Whether the name is valid under some kind, ignoring reserved names.
pub fn is_token_name_valid(name: &str) -> bool {
    token_name_kind(name, &[]).is_ok()
}

pub fn is_token_name_a_root(name: &str) -> bool {
    matches!(token_name_kind(name, &[]), Ok(KnownTokenType::Root))
}

pub fn is_token_name_a_subtoken(name: &str) -> bool {
    matches!(token_name_kind(name, &[]), Ok(KnownTokenType::Sub))
}

pub fn is_token_name_an_owner(name: &str) -> bool {
    matches!(token_name_kind(name, &[]), Ok(KnownTokenType::Owner))
}

pub fn is_token_name_a_restricted(name: &str) -> bool {
    matches!(token_name_kind(name, &[]), Ok(KnownTokenType::Restricted))
}

pub fn is_token_name_a_msg_channel(name: &str) -> bool {
    matches!(token_name_kind(name, &[]), Ok(KnownTokenType::MsgChannel))
}

/// Whether the name is a qualifier. With `only_qualifiers` set,
/// sub-qualifiers do not count.
pub fn is_token_name_a_qualifier(name: &str, only_qualifiers: bool) -> bool {
    match token_name_kind(name, &[]) {
        Ok(KnownTokenType::Qualifier) => true,
        Ok(KnownTokenType::SubQualifier) => !only_qualifiers,
        _ => false,
    }
}

/// The name of the token's parent: for roots, qualifiers and restricted
/// tokens the name itself; for every other kind the name up to the kind's
/// delimiter. `None` if the name is not valid.
pub fn parent_name(name: &str) -> Option<String> {
    let kind = token_name_kind(name, &[]).ok()?;
    let cut = |delim: char| name.rfind(delim).map(|i| name[..i].to_string());
    match kind {
        KnownTokenType::Root | KnownTokenType::Qualifier | KnownTokenType::Restricted => {
            Some(name.to_string())
        }
        KnownTokenType::Sub | KnownTokenType::SubQualifier => cut('/'),
        KnownTokenType::Unique => cut('#'),
        KnownTokenType::MsgChannel => cut('~'),
        KnownTokenType::Vote => cut('^'),
        KnownTokenType::Owner => Some(name[..name.len() - 1].to_string()),
    }
}

/// The root qualifier of a sub-qualifier: `#KYC/#EU` → `#KYC`. `None` for
/// every other kind.
pub fn parent_qualifier(name: &str) -> Option<String> {
    match token_name_kind(name, &[]) {
        Ok(KnownTokenType::SubQualifier) => name.rfind('/').map(|i| name[..i].to_string()),
        _ => None,
    }
}

/// The owner token that controls the given name, e.g. `NAME` → `NAME!`.
pub fn owner_token_of(name: &str) -> String {
    format!("{}{}", name, OWNER_TAG)
}

/// The owner token authorizing a restricted token: `$NAME` → `NAME!`.
/// Empty when the name is not a restricted token.
pub fn restricted_name_to_owner_name(name: &str) -> String {
    if !is_token_name_a_restricted(name) {
        return String::new();
    }
    owner_token_of(&name[1..])
}

/// Strip the restricted sigil: `$NAME` → `NAME`.
pub fn strip_restricted_sigil(name: &str) -> &str {
    name.strip_prefix(RESTRICTED_CHAR).unwrap_or(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn kind(name: &str) -> Result<KnownTokenType, NameError> {
        token_name_kind(name, &[])
    }

    #[test]
    fn roots() {
        assert_matches!(kind("TOKEN"), Ok(KnownTokenType::Root));
        assert_matches!(kind("A.B_C9"), Ok(KnownTokenType::Root));
        assert_matches!(kind("AB"), Err(NameError::TooShort { min: 3 }));
        assert_matches!(kind("token"), Err(NameError::InvalidRootName));
        assert_matches!(kind("A..B"), Err(NameError::InvalidRootName));
        assert_matches!(kind("_ABC"), Err(NameError::InvalidRootName));
        assert_matches!(kind("ABC."), Err(NameError::InvalidRootName));
        // Thirty characters is the limit for roots and subs.
        assert_matches!(kind(&"A".repeat(30)), Ok(KnownTokenType::Root));
        assert_matches!(kind(&"A".repeat(31)), Err(NameError::TooLong { max: 30 }));
    }

    #[test]
    fn subs() {
        assert_matches!(kind("TOKEN/SUB"), Ok(KnownTokenType::Sub));
        assert_matches!(kind("TOKEN/SUB/DEEP"), Ok(KnownTokenType::Sub));
        assert_matches!(kind("TOKEN/A"), Ok(KnownTokenType::Sub));
        assert_matches!(kind("TOKEN//A"), Err(NameError::InvalidRootName));
        assert_matches!(kind("AB/SUB"), Err(NameError::InvalidRootName));
    }

    #[test]
    fn uniques() {
        assert_matches!(kind("TOKEN#tag"), Ok(KnownTokenType::Unique));
        assert_matches!(kind("TOKEN/SUB#a-1:?"), Ok(KnownTokenType::Unique));
        assert_matches!(kind("TOKEN#"), Err(NameError::InvalidUniqueName));
        assert_matches!(kind("TOKEN#ta#g"), Err(NameError::InvalidUniqueName));
        assert_matches!(kind("TOKEN#tag/x"), Err(NameError::InvalidUniqueName));
    }

    #[test]
    fn msg_channels() {
        assert_matches!(kind("TOKEN~Chan_1"), Ok(KnownTokenType::MsgChannel));
        assert_matches!(
            kind("TOKEN~ThirteenChars"),
            Err(NameError::ChannelTagTooLong { max: 12 })
        );
        assert_matches!(kind("TOKEN~_chan"), Err(NameError::InvalidMsgChannelName));
    }

    #[test]
    fn owners() {
        assert_matches!(kind("TOKEN!"), Ok(KnownTokenType::Owner));
        assert_matches!(kind("TOKEN/SUB!"), Ok(KnownTokenType::Owner));
        // The owner tag is only valid in final position.
        assert_matches!(kind("TO!KEN"), Err(_));
        // A 31-character owner is fine, the base is thirty.
        let base = "A".repeat(30);
        assert_matches!(kind(&owner_token_of(&base)), Ok(KnownTokenType::Owner));
    }

    #[test]
    fn votes() {
        assert_matches!(kind("TOKEN^VOTE"), Ok(KnownTokenType::Vote));
        assert_matches!(kind("TOKEN^vote"), Err(NameError::InvalidVoteName));
    }

    #[test]
    fn qualifiers() {
        assert_matches!(kind("#KYC"), Ok(KnownTokenType::Qualifier));
        assert_matches!(kind("#KYC/#US"), Ok(KnownTokenType::SubQualifier));
        assert_matches!(kind("#KYC/#US/#CA"), Err(NameError::InvalidQualifierName));
        assert_matches!(kind("#KY"), Err(NameError::InvalidQualifierName));
        assert_matches!(kind("#KYC/US"), Err(NameError::InvalidQualifierName));
        assert_matches!(kind("#_KYC"), Err(NameError::InvalidQualifierName));
    }

    #[test]
    fn restricted() {
        assert_matches!(kind("$TOKEN"), Ok(KnownTokenType::Restricted));
        assert_matches!(kind("$TO"), Err(NameError::InvalidRestrictedName));
        assert_matches!(kind("$TOKEN/SUB"), Err(NameError::InvalidRestrictedName));
        assert_eq!(restricted_name_to_owner_name("$TOKEN"), "TOKEN!");
        assert_eq!(restricted_name_to_owner_name("TOKEN"), "");
        assert_eq!(strip_restricted_sigil("$TOKEN"), "TOKEN");
    }

    #[test]
    fn reserved_names() {
        let reserved = vec!["CORE".to_string(), "CORECOIN".to_string()];
        assert_matches!(
            token_name_kind("CORE", &reserved),
            Err(NameError::ReservedName)
        );
        assert_matches!(
            token_name_kind("CORE/SUB", &reserved),
            Err(NameError::ReservedName)
        );
        assert_matches!(token_name_kind("CORES", &reserved), Ok(KnownTokenType::Root));
        assert_matches!(kind("CORE"), Ok(KnownTokenType::Root));
    }

    #[test]
    fn length_guard() {
        let long = "A".repeat(41);
        assert_matches!(kind(&long), Err(NameError::TooLong { max: 40 }));
        // Tagged names allow up to 31 characters in total.
        assert_matches!(kind("ABCDEFGHIJKLMNOPQRSTUVWXYZ#tags"), Ok(KnownTokenType::Unique));
        assert_matches!(
            kind("ABCDEFGHIJKLMNOPQRSTUVWXYZ#tagss"),
            Err(NameError::TooLong { max: 31 })
        );
    }

    #[test]
    fn parents() {
        assert_eq!(parent_name("TOKEN").as_deref(), Some("TOKEN"));
        assert_eq!(parent_name("TOKEN/SUB").as_deref(), Some("TOKEN"));
        assert_eq!(parent_name("TOKEN/SUB/DEEP").as_deref(), Some("TOKEN/SUB"));
        assert_eq!(parent_name("TOKEN#tag").as_deref(), Some("TOKEN"));
        assert_eq!(parent_name("TOKEN~chan").as_deref(), Some("TOKEN"));
        assert_eq!(parent_name("TOKEN!").as_deref(), Some("TOKEN"));
        assert_eq!(parent_name("#KYC/#US").as_deref(), Some("#KYC"));
        assert_eq!(parent_name("$TOKEN").as_deref(), Some("$TOKEN"));
        assert_eq!(parent_name("not valid"), None);
    }

    #[test]
    fn helper_predicates() {
        assert!(is_token_name_an_owner("TOKEN!"));
        assert!(!is_token_name_an_owner("TOKEN"));
        assert!(is_token_name_a_qualifier("#KYC", true));
        assert!(is_token_name_a_qualifier("#KYC/#US", false));
        assert!(!is_token_name_a_qualifier("#KYC/#US", true));
        assert!(is_token_name_a_restricted("$TOKEN"));
        assert!(is_token_name_a_msg_channel("TOKEN~chan"));
    }
}
