//! The restricted-token verifier engine: a boolean expression over
//! qualifier tags, attached to each restricted token and evaluated against
//! the receiving address on every transfer.
//!
//! The wire form is stripped of whitespace and `#` sigils; qualifier names
//! appear bare. The grammar is `|` over `&` over `!`, with parentheses, and
//! the literal string `true` short-circuits everything.

use std::collections::{BTreeMap, BTreeSet};
use token_types::types::names;
use token_types::TokenError;

use crate::cache::{CacheError, TokenStateCache};
use crate::store::TokenStore;

/// Maximum stripped length of a verifier string.
pub const MAX_VERIFIER_LENGTH: usize = 80;

/// Why a verifier string was rejected. Carries enough to build both the
/// consensus rejection and a human explanation.
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum VerifierFailure {
    EmptyString,
    LengthTooLarge { stripped: String },
    InvalidQualifierName { qualifier: String },
    TokenDoesntExist { qualifier: String },
    FailedToVerifyAgainstAddress { address: String },
    EmptySubExpression,
    UnknownOperator { symbol: char, expression: String },
    ParenthesisParity { expression: String },
    VariableNotFound { variable: String },
}

impl VerifierFailure {
    /// The operator-facing explanation, mirrored into wallet errors.
    pub fn user_message(&self) -> String {
        match self {
            Self::EmptyString => "Verifier string is empty".to_string(),
            Self::LengthTooLarge { .. } => {
                "Length is to large. Please use a smaller length".to_string()
            }
            Self::InvalidQualifierName { qualifier } => {
                format!("Invalid Qualifier Name: {qualifier}")
            }
            Self::TokenDoesntExist { qualifier } => format!("Token doesn't exist: {qualifier}"),
            Self::FailedToVerifyAgainstAddress { address } => format!(
                "This address doesn't contain the correct tags to pass the verifier string \
                 check: {address}"
            ),
            Self::EmptySubExpression => {
                "The verifier string has two operators without a tag between them".to_string()
            }
            Self::UnknownOperator { symbol, expression } => format!(
                "The symbol: '{symbol}' is not a valid character in the expression: {expression}"
            ),
            Self::ParenthesisParity { expression } => format!(
                "Every '(' must have a corresponding ')' in the expression: {expression}"
            ),
            Self::VariableNotFound { variable } => {
                format!("Variable is not allow in the expression: '{variable}'")
            }
        }
    }

    /// The consensus rejection. Parse failures collapse onto the
    /// phase-specific syntax code; the distinction lives in the user
    /// message.
    pub fn rejection(&self, contextual: bool) -> TokenError {
        match self {
            Self::EmptyString => TokenError::NullVerifierEmpty,
            Self::LengthTooLarge { .. } => TokenError::NullVerifierTooLong,
            Self::InvalidQualifierName { qualifier } => TokenError::NullVerifierInvalidTokenName(
                qualifier.trim_start_matches(names::QUALIFIER_CHAR).to_string(),
            ),
            Self::TokenDoesntExist { .. } => TokenError::NullVerifierNonIssuedQualifier,
            Self::FailedToVerifyAgainstAddress { .. } => {
                TokenError::NullVerifierAddressFailedVerification
            }
            _ if contextual => TokenError::NullVerifierFailedContextualSyntaxCheck,
            _ => TokenError::NullVerifierFailedSyntaxCheck,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum VerifierCheckError {
    #[error("{}", .0.user_message())]
    Verifier(VerifierFailure),
    #[error(transparent)]
    Cache(#[from] CacheError),
}

/// Remove whitespace and `#` sigils, producing the wire/database form.
pub fn strip_verifier_string(verifier: &str) -> String {
    verifier.chars().filter(|c| !c.is_whitespace() && *c != names::QUALIFIER_CHAR).collect()
}

/// The bare qualifier names mentioned in a stripped verifier string.
pub fn extract_qualifiers(stripped: &str) -> BTreeSet<String> {
    let mut found = BTreeSet::new();
    let mut current = String::new();
    for ch in stripped.chars() {
        if ch.is_ascii_uppercase() || ch.is_ascii_digit() || ch == '_' || ch == '.' || ch == '/' {
            current.push(ch);
        } else if !current.is_empty() {
            found.insert(std::mem::take(&mut current));
        }
    }
    if !current.is_empty() {
        found.insert(current);
    }
    found
}

struct Parser<'a> {
    expression: &'a str,
    chars: std::iter::Peekable<std::str::Chars<'a>>,
    vals: &'a BTreeMap<String, bool>,
}

impl<'a> Parser<'a> {
    fn new(expression: &'a str, vals: &'a BTreeMap<String, bool>) -> Self {
        Self { expression, chars: expression.chars().peekable(), vals }
    }

    fn parse(mut self) -> Result<bool, VerifierFailure> {
        let value = self.or_expression()?;
        match self.chars.peek() {
            None => Ok(value),
            Some(')') => {
                Err(VerifierFailure::ParenthesisParity { expression: self.expression.to_string() })
            }
            Some(&symbol) => {
                Err(VerifierFailure::UnknownOperator {
                    symbol,
                    expression: self.expression.to_string(),
                })
            }
        }
    }

    fn or_expression(&mut self) -> Result<bool, VerifierFailure> {
        let mut value = self.and_expression()?;
        while self.chars.peek() == Some(&'|') {
            self.chars.next();
            let rhs = self.and_expression()?;
            value = value || rhs;
        }
        Ok(value)
    }

    fn and_expression(&mut self) -> Result<bool, VerifierFailure> {
        let mut value = self.factor()?;
        while self.chars.peek() == Some(&'&') {
            self.chars.next();
            let rhs = self.factor()?;
            value = value && rhs;
        }
        Ok(value)
    }

    fn factor(&mut self) -> Result<bool, VerifierFailure> {
        match self.chars.peek() {
            Some('!') => {
                self.chars.next();
                Ok(!self.factor()?)
            }
            Some('(') => {
                self.chars.next();
                let value = self.or_expression()?;
                if self.chars.next() != Some(')') {
                    return Err(VerifierFailure::ParenthesisParity {
                        expression: self.expression.to_string(),
                    });
                }
                Ok(value)
            }
            Some(c) if is_variable_char(*c) => {
                let mut variable = String::new();
                while let Some(&c) = self.chars.peek() {
                    if !is_variable_char(c) {
                        break;
                    }
                    variable.push(c);
                    self.chars.next();
                }
                self.vals
                    .get(&variable)
                    .copied()
                    .ok_or(VerifierFailure::VariableNotFound { variable })
            }
            Some('&') | Some('|') | Some(')') | None => Err(VerifierFailure::EmptySubExpression),
            Some(&symbol) => Err(VerifierFailure::UnknownOperator {
                symbol,
                expression: self.expression.to_string(),
            }),
        }
    }
}

fn is_variable_char(c: char) -> bool {
    c.is_ascii_uppercase() || c.is_ascii_digit() || c == '_' || c == '.' || c == '/'
}

/// Evaluate a stripped verifier expression with the given qualifier truth
/// values.
pub fn evaluate(expression: &str, vals: &BTreeMap<String, bool>) -> Result<bool, VerifierFailure> {
    Parser::new(expression, vals).parse()
}

/// Syntax-level verifier check: shape, length, qualifier name validity and
/// parseability. Returns the bare qualifier names on success.
pub fn check_verifier_string(verifier: &str) -> Result<BTreeSet<String>, VerifierFailure> {
    if verifier == "true" {
        return Ok(BTreeSet::new());
    }
    if verifier.is_empty() {
        return Err(VerifierFailure::EmptyString);
    }
    let stripped = strip_verifier_string(verifier);
    if stripped.len() > MAX_VERIFIER_LENGTH {
        return Err(VerifierFailure::LengthTooLarge { stripped });
    }

    let qualifiers = extract_qualifiers(&stripped);
    let mut vals = BTreeMap::new();
    for qualifier in &qualifiers {
        let full = format!("{}{}", names::QUALIFIER_CHAR, qualifier);
        if !names::is_token_name_a_qualifier(&full, false) {
            return Err(VerifierFailure::InvalidQualifierName { qualifier: full });
        }
        vals.insert(qualifier.clone(), true);
    }

    evaluate(&stripped, &vals)?;
    Ok(qualifiers)
}

/// Full verifier check against chain state: syntax, every mentioned
/// qualifier issued, and, when `address` is non-empty, the address's tags
/// satisfying the expression. State reads skip the block-local overlay so
/// that tag changes in the same block cannot influence the outcome.
pub fn contextual_check_verifier_string<S: TokenStore>(
    cache: &mut TokenStateCache<'_, S>,
    verifier: &str,
    address: &str,
) -> Result<(), VerifierCheckError> {
    if verifier == "true" {
        return Ok(());
    }
    let qualifiers = check_verifier_string(verifier).map_err(VerifierCheckError::Verifier)?;

    for qualifier in &qualifiers {
        let full = format!("{}{}", names::QUALIFIER_CHAR, qualifier);
        if !cache.token_exists(&full, true)? {
            return Err(VerifierCheckError::Verifier(VerifierFailure::TokenDoesntExist {
                qualifier: full,
            }));
        }
    }

    if address.is_empty() {
        return Ok(());
    }

    let mut vals = BTreeMap::new();
    for qualifier in &qualifiers {
        let full = format!("{}{}", names::QUALIFIER_CHAR, qualifier);
        vals.insert(qualifier.clone(), cache.address_tagged(address, &full, true)?);
    }

    match evaluate(&strip_verifier_string(verifier), &vals) {
        Ok(true) => Ok(()),
        Ok(false) => Err(VerifierCheckError::Verifier(
            VerifierFailure::FailedToVerifyAgainstAddress { address: address.to_string() },
        )),
        Err(failure) => Err(VerifierCheckError::Verifier(failure)),
    }
}

/// Shape check on a verifier string as carried in a script: the wire form
/// must already be stripped.
pub fn check_wire_verifier(verifier: &str) -> Result<(), TokenError> {
    if verifier.chars().any(char::is_whitespace) {
        return Err(TokenError::VerifierStringWhitespace);
    }
    if verifier.contains(names::QUALIFIER_CHAR) {
        return Err(TokenError::VerifierStringQualifierChar);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::TokenLedger;
    use crate::store::MemoryTokenStore;
    use assert_matches::assert_matches;
    use token_types::types::amount::COIN;
    use token_types::{NewToken, TokenAmount};

    fn vals(pairs: &[(&str, bool)]) -> BTreeMap<String, bool> {
        pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect()
    }

    #[test]
    fn truth_table() {
        let v = vals(&[("KYC", true), ("AML", false)]);
        assert!(evaluate("KYC", &v).unwrap());
        assert!(!evaluate("AML", &v).unwrap());
        assert!(!evaluate("KYC&AML", &v).unwrap());
        assert!(evaluate("KYC|AML", &v).unwrap());
        assert!(evaluate("!AML", &v).unwrap());
        assert!(evaluate("KYC&!AML", &v).unwrap());
        assert!(evaluate("(KYC|AML)&KYC", &v).unwrap());
        assert!(!evaluate("!(KYC|AML)", &v).unwrap());
        // `&` binds tighter than `|`.
        assert!(evaluate("AML&AML|KYC", &v).unwrap());
    }

    #[test]
    fn parse_failures() {
        let v = vals(&[("KYC", true)]);
        assert_matches!(
            evaluate("(KYC", &v),
            Err(VerifierFailure::ParenthesisParity { .. })
        );
        assert_matches!(
            evaluate("KYC)", &v),
            Err(VerifierFailure::ParenthesisParity { .. })
        );
        assert_matches!(evaluate("KYC&&KYC", &v), Err(VerifierFailure::EmptySubExpression));
        assert_matches!(evaluate("KYC&", &v), Err(VerifierFailure::EmptySubExpression));
        assert_matches!(
            evaluate("KYC%AML", &v),
            Err(VerifierFailure::UnknownOperator { symbol: '%', .. })
        );
        assert_matches!(
            evaluate("KYC&AML", &v),
            Err(VerifierFailure::VariableNotFound { .. })
        );
    }

    #[test]
    fn syntax_check_rules() {
        assert!(check_verifier_string("true").unwrap().is_empty());
        assert_matches!(check_verifier_string(""), Err(VerifierFailure::EmptyString));

        let long = "A".repeat(MAX_VERIFIER_LENGTH + 1);
        assert_matches!(
            check_verifier_string(&long),
            Err(VerifierFailure::LengthTooLarge { .. })
        );

        let found = check_verifier_string("#KYC & !#AML").unwrap();
        assert!(found.contains("KYC"));
        assert!(found.contains("AML"));

        // Two-character names are not valid qualifiers.
        assert_matches!(
            check_verifier_string("AB"),
            Err(VerifierFailure::InvalidQualifierName { .. })
        );
    }

    #[test]
    fn rejection_codes() {
        assert_eq!(
            VerifierFailure::EmptyString.rejection(false),
            TokenError::NullVerifierEmpty
        );
        assert_eq!(
            VerifierFailure::InvalidQualifierName { qualifier: "#KYC".to_string() }
                .rejection(false)
                .code(),
            "bad-txns-null-verifier-invalid-token-name-KYC"
        );
        assert_eq!(
            VerifierFailure::EmptySubExpression.rejection(false),
            TokenError::NullVerifierFailedSyntaxCheck
        );
        assert_eq!(
            VerifierFailure::EmptySubExpression.rejection(true),
            TokenError::NullVerifierFailedContextualSyntaxCheck
        );
    }

    #[test]
    fn contextual_check_requires_issued_qualifiers_and_tags() {
        let mut ledger = TokenLedger::new(MemoryTokenStore::new());
        let mut cache = TokenStateCache::new(&mut ledger);

        // Qualifier not issued yet.
        assert_matches!(
            contextual_check_verifier_string(&mut cache, "KYC", ""),
            Err(VerifierCheckError::Verifier(VerifierFailure::TokenDoesntExist { .. }))
        );

        // Issue it and flush so the skip-local reads can see it.
        let qualifier = NewToken::new("#KYC", TokenAmount(COIN), 0, false);
        cache.add_new_token(qualifier, "issuer", 5, [9; 32]).unwrap();
        cache.flush();
        ledger.dump_to_store().unwrap();

        let mut cache = TokenStateCache::new(&mut ledger);
        assert_matches!(contextual_check_verifier_string(&mut cache, "KYC", ""), Ok(()));

        // Address lacks the tag.
        assert_matches!(
            contextual_check_verifier_string(&mut cache, "KYC", "alice"),
            Err(VerifierCheckError::Verifier(
                VerifierFailure::FailedToVerifyAgainstAddress { .. }
            ))
        );

        // Tag the address and flush; tags applied in the same overlay are
        // deliberately invisible to the check.
        cache.add_qualifier_tag("alice", "#KYC").unwrap();
        assert_matches!(
            contextual_check_verifier_string(&mut cache, "KYC", "alice"),
            Err(VerifierCheckError::Verifier(
                VerifierFailure::FailedToVerifyAgainstAddress { .. }
            ))
        );
        cache.flush();
        let mut cache = TokenStateCache::new(&mut ledger);
        assert_matches!(contextual_check_verifier_string(&mut cache, "KYC", "alice"), Ok(()));
    }

    #[test]
    fn wire_form_must_be_stripped() {
        assert_matches!(check_wire_verifier("KYC&!AML"), Ok(()));
        assert_eq!(
            check_wire_verifier("KYC &AML"),
            Err(TokenError::VerifierStringWhitespace)
        );
        assert_eq!(
            check_wire_verifier("#KYC"),
            Err(TokenError::VerifierStringQualifierChar)
        );
    }
}
