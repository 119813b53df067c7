//! RFC 6901 JSON Pointer tokens and `$ref` string parsing.

use crate::error::RefError;
use jsonptr::{Pointer, PointerBuf, Token};
use std::borrow::Cow;

/// Escapes one token: `~` becomes `~0`, `/` becomes `~1`.
#[must_use]
pub fn encode_token(token: &str) -> String {
    Token::new(token).encoded().to_string()
}

/// Splits a pointer such as `/definitions/a~1b` into decoded tokens.
///
/// The leading `/` may be omitted (`definitions/Pet`). The empty pointer
/// addresses the whole document, while `/` addresses the `""` key.
///
/// # Errors
/// Returns [`RefError::MalformedReference`] for invalid `~` escapes.
pub fn split(pointer: &str) -> Result<Vec<String>, RefError> {
    let pointer: Cow<'_, str> = if pointer.is_empty() || pointer.starts_with('/') {
        Cow::Borrowed(pointer)
    } else {
        Cow::Owned(format!("/{pointer}"))
    };
    let parsed = Pointer::parse(&*pointer).map_err(|e| {
        log::debug!("invalid pointer {pointer}: {e}");
        RefError::MalformedReference {
            reference: pointer.to_string(),
        }
    })?;
    Ok(parsed
        .tokens()
        .map(|token| token.decoded().into_owned())
        .collect())
}

/// Joins decoded tokens into a pointer with a leading `/`, or `""` for no tokens.
#[must_use]
pub fn join<S: AsRef<str>>(tokens: &[S]) -> String {
    PointerBuf::from_tokens(tokens.iter().map(|t| Token::new(t.as_ref())))
        .as_str()
        .to_owned()
}

/// A `$ref` string split into its file part and its pointer part.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reference<'a> {
    /// Relative file, empty for same-document references.
    pub file: &'a str,
    /// Pointer without the leading `#`, e.g. `/definitions/Pet`.
    pub pointer: &'a str,
}

impl<'a> Reference<'a> {
    /// Parses `file#/pointer`, `#/pointer`, or `file`.
    ///
    /// # Errors
    /// Returns [`RefError::MalformedReference`] for empty references and
    /// pointers that are not valid RFC 6901 pointers.
    pub fn parse(reference: &'a str) -> Result<Self, RefError> {
        let malformed = || RefError::MalformedReference {
            reference: reference.to_string(),
        };
        if reference.trim().is_empty() {
            return Err(malformed());
        }
        let (file, pointer) = match reference.rfind('#') {
            Some(i) => (&reference[..i], &reference[i + 1..]),
            None => (reference, ""),
        };
        Pointer::parse(pointer).map_err(|_| malformed())?;
        Ok(Reference { file, pointer })
    }

    #[must_use]
    pub fn is_local(&self) -> bool {
        self.file.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_escaping() {
        assert_eq!(encode_token("a/b~c"), "a~1b~0c");
        assert_eq!(split("/a~1b~0c").unwrap(), vec!["a/b~c"]);
        assert_eq!(split("/~01").unwrap(), vec!["~1"]);
    }

    #[test]
    fn test_split_and_join() {
        assert_eq!(
            split("/paths/~1pets~1{id}/get").unwrap(),
            vec!["paths", "/pets/{id}", "get"]
        );
        assert_eq!(split("definitions/Pet").unwrap(), vec!["definitions", "Pet"]);
        assert!(split("").unwrap().is_empty());
        assert_eq!(join(&["paths", "/pets"]), "/paths/~1pets");
        assert_eq!(join::<&str>(&[]), "");
    }

    #[test]
    fn test_empty_tokens() {
        assert_eq!(split("/").unwrap(), vec![""]);
        assert_eq!(split("/a//b").unwrap(), vec!["a", "", "b"]);
        assert_eq!(join(&["a", "", "b"]), "/a//b");
    }

    #[test]
    fn test_invalid_escape() {
        assert!(matches!(split("/a~2"), Err(RefError::MalformedReference { .. })));
    }

    #[test]
    fn test_parse_reference() {
        let r = Reference::parse("defs/pet.yaml#/definitions/Pet").unwrap();
        assert_eq!(r.file, "defs/pet.yaml");
        assert_eq!(r.pointer, "/definitions/Pet");
        assert!(!r.is_local());

        let r = Reference::parse("#/definitions/Pet").unwrap();
        assert!(r.is_local());

        let r = Reference::parse("#/").unwrap();
        assert_eq!(r.pointer, "/");

        let r = Reference::parse("pet.yaml").unwrap();
        assert_eq!(r.pointer, "");

        let r = Reference::parse("pet.yaml#").unwrap();
        assert_eq!(r.file, "pet.yaml");
        assert_eq!(r.pointer, "");
    }

    #[test]
    fn test_parse_malformed_reference() {
        assert!(matches!(
            Reference::parse(""),
            Err(RefError::MalformedReference { .. })
        ));
        assert!(matches!(
            Reference::parse("pet.yaml#definitions"),
            Err(RefError::MalformedReference { .. })
        ));
        assert!(matches!(
            Reference::parse("#/a~9"),
            Err(RefError::MalformedReference { .. })
        ));
    }
}
