use crate::error::AccessError;
use crate::pointer;
use crate::value::Value;

/// Path-based get/set/remove over a [`Value`] tree.
///
/// Paths are sequences of already-decoded pointer tokens. Sequence indices are
/// given as decimal tokens (`"0"`, `"12"`).
#[derive(Debug, Clone, Default)]
pub struct Accessor {
    /// Filler written into sequence slots skipped by [`Accessor::assign`].
    zero: Value,
}

impl Accessor {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// An accessor that pads extended sequences with `zero` instead of `null`.
    #[must_use]
    pub fn with_zero(zero: Value) -> Self {
        Accessor { zero }
    }

    /// Looks up `path` in `doc`.
    ///
    /// # Errors
    /// `NotFound` for a missing key (or a non-numeric sequence token),
    /// `IndexOutOfRange` past the end of a sequence, `NotContainer` when a
    /// scalar would have to be traversed.
    pub fn access<'a, S: AsRef<str>>(
        &self,
        doc: &'a Value,
        path: &[S],
    ) -> Result<&'a Value, AccessError> {
        let mut current = doc;
        for (depth, segment) in path.iter().enumerate() {
            let segment = segment.as_ref();
            current = match current {
                Value::Mapping(map) => map
                    .get(segment)
                    .ok_or_else(|| not_found(segment, &path[..depth]))?,
                Value::Sequence(items) => {
                    let index = parse_index(segment, &path[..depth])?;
                    items.get(index).ok_or_else(|| AccessError::IndexOutOfRange {
                        index,
                        len: items.len(),
                        path: pointer::join(&path[..depth]),
                    })?
                }
                _ => {
                    return Err(AccessError::NotContainer {
                        segment: segment.to_string(),
                        path: pointer::join(&path[..depth]),
                    })
                }
            };
        }
        Ok(current)
    }

    /// Mutable variant of [`Accessor::access`].
    ///
    /// # Errors
    /// Same as [`Accessor::access`].
    pub fn access_mut<'a, S: AsRef<str>>(
        &self,
        doc: &'a mut Value,
        path: &[S],
    ) -> Result<&'a mut Value, AccessError> {
        let mut current = doc;
        for (depth, segment) in path.iter().enumerate() {
            let segment = segment.as_ref();
            current = match current {
                Value::Mapping(map) => map
                    .get_mut(segment)
                    .ok_or_else(|| not_found(segment, &path[..depth]))?,
                Value::Sequence(items) => {
                    let index = parse_index(segment, &path[..depth])?;
                    let len = items.len();
                    items
                        .get_mut(index)
                        .ok_or_else(|| AccessError::IndexOutOfRange {
                            index,
                            len,
                            path: pointer::join(&path[..depth]),
                        })?
                }
                _ => {
                    return Err(AccessError::NotContainer {
                        segment: segment.to_string(),
                        path: pointer::join(&path[..depth]),
                    })
                }
            };
        }
        Ok(current)
    }

    /// Like [`Accessor::access`], but any failure yields `default`.
    #[must_use]
    pub fn maybe_access<'a, S: AsRef<str>>(
        &self,
        doc: &'a Value,
        path: &[S],
        default: &'a Value,
    ) -> &'a Value {
        self.access(doc, path).unwrap_or(default)
    }

    /// Writes `value` at `path`, creating intermediate mappings and padding
    /// sequences with the zero value as needed. An empty path replaces `doc`.
    ///
    /// # Errors
    /// `NotFound` when a sequence is addressed by a non-numeric token,
    /// `NotContainer` when a scalar sits on the path.
    pub fn assign<S: AsRef<str>>(
        &self,
        doc: &mut Value,
        path: &[S],
        value: Value,
    ) -> Result<(), AccessError> {
        let Some((last, parents)) = path.split_last() else {
            *doc = value;
            return Ok(());
        };

        let mut current = doc;
        for (depth, segment) in parents.iter().enumerate() {
            current = self.child_or_insert(current, segment.as_ref(), &path[..depth])?;
        }
        let slot = self.child_or_insert(current, last.as_ref(), parents)?;
        *slot = value;
        Ok(())
    }

    fn child_or_insert<'a, S: AsRef<str>>(
        &self,
        parent: &'a mut Value,
        segment: &str,
        parent_path: &[S],
    ) -> Result<&'a mut Value, AccessError> {
        match parent {
            Value::Mapping(map) => Ok(map
                .entry(segment.to_string())
                .or_insert_with(Value::mapping)),
            Value::Sequence(items) => {
                let index = parse_index(segment, parent_path)?;
                if index >= items.len() {
                    items.resize(index, self.zero.clone());
                    items.push(Value::mapping());
                }
                Ok(&mut items[index])
            }
            _ => Err(AccessError::NotContainer {
                segment: segment.to_string(),
                path: pointer::join(parent_path),
            }),
        }
    }

    /// Removes and returns the node at `path`.
    ///
    /// # Errors
    /// Same as [`Accessor::access`] for the parent path and the final segment.
    pub fn remove<S: AsRef<str>>(&self, doc: &mut Value, path: &[S]) -> Result<Value, AccessError> {
        let Some((last, parents)) = path.split_last() else {
            return Ok(std::mem::take(doc));
        };
        let last = last.as_ref();
        match self.access_mut(doc, parents)? {
            Value::Mapping(map) => map
                .shift_remove(last)
                .ok_or_else(|| not_found(last, parents)),
            Value::Sequence(items) => {
                let index = parse_index(last, parents)?;
                if index < items.len() {
                    Ok(items.remove(index))
                } else {
                    Err(AccessError::IndexOutOfRange {
                        index,
                        len: items.len(),
                        path: pointer::join(parents),
                    })
                }
            }
            _ => Err(AccessError::NotContainer {
                segment: last.to_string(),
                path: pointer::join(parents),
            }),
        }
    }

    /// Like [`Accessor::remove`], but a missing node is not an error.
    pub fn maybe_remove<S: AsRef<str>>(&self, doc: &mut Value, path: &[S]) -> Option<Value> {
        self.remove(doc, path).ok()
    }
}

fn not_found<S: AsRef<str>>(segment: &str, parent_path: &[S]) -> AccessError {
    AccessError::NotFound {
        segment: segment.to_string(),
        path: pointer::join(parent_path),
    }
}

fn parse_index<S: AsRef<str>>(segment: &str, parent_path: &[S]) -> Result<usize, AccessError> {
    if segment.is_empty() || !segment.bytes().all(|b| b.is_ascii_digit()) {
        return Err(not_found(segment, parent_path));
    }
    segment
        .parse()
        .map_err(|_| not_found(segment, parent_path))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(v: serde_json::Value) -> Value {
        Value::from(v)
    }

    #[test]
    fn test_access_nested() {
        let d = doc(json!({"a": {"b": [10, 20, {"c": "x"}]}}));
        let accessor = Accessor::new();
        assert_eq!(
            accessor.access(&d, &["a", "b", "2", "c"]).unwrap(),
            &Value::from("x")
        );
        assert_eq!(accessor.access(&d, &[] as &[&str]).unwrap(), &d);
    }

    #[test]
    fn test_access_errors() {
        let d = doc(json!({"a": {"b": [1, 2]}}));
        let accessor = Accessor::new();
        assert_eq!(
            accessor.access(&d, &["a", "x", "y"]).unwrap_err(),
            AccessError::NotFound {
                segment: "x".to_string(),
                path: "/a".to_string()
            }
        );
        assert!(matches!(
            accessor.access(&d, &["a", "b", "5"]),
            Err(AccessError::IndexOutOfRange { index: 5, len: 2, .. })
        ));
        assert!(matches!(
            accessor.access(&d, &["a", "b", "first"]),
            Err(AccessError::NotFound { .. })
        ));
        assert!(matches!(
            accessor.access(&d, &["a", "b", "0", "deeper"]),
            Err(AccessError::NotContainer { .. })
        ));
    }

    #[test]
    fn test_maybe_access_returns_default() {
        let d = doc(json!({"a": [1]}));
        let accessor = Accessor::new();
        let fallback = Value::from("fallback");
        assert_eq!(accessor.maybe_access(&d, &["a", "3"], &fallback), &fallback);
        assert_eq!(accessor.maybe_access(&d, &["b", "c"], &fallback), &fallback);
        assert_eq!(accessor.maybe_access(&d, &["a", "x"], &fallback), &fallback);
    }

    #[test]
    fn test_assign_creates_intermediate_mappings() {
        let mut d = Value::mapping();
        let accessor = Accessor::new();
        accessor
            .assign(&mut d, &["components", "schemas", "Pet"], Value::from("pet"))
            .unwrap();
        assert_eq!(d, doc(json!({"components": {"schemas": {"Pet": "pet"}}})));
    }

    #[test]
    fn test_assign_pads_sequences_with_zero_value() {
        let mut d = doc(json!({"a": [1, 2]}));
        let accessor = Accessor::with_zero(Value::from("-"));
        accessor.assign(&mut d, &["a", "5"], Value::from("v")).unwrap();
        assert_eq!(d, doc(json!({"a": [1, 2, "-", "-", "-", "v"]})));
    }

    #[test]
    fn test_assign_into_scalar_fails() {
        let mut d = doc(json!({"a": 1}));
        let accessor = Accessor::new();
        assert!(matches!(
            accessor.assign(&mut d, &["a", "b"], Value::Null),
            Err(AccessError::NotContainer { .. })
        ));
    }

    #[test]
    fn test_escaped_keys_round_trip() {
        let mut d = Value::mapping();
        let accessor = Accessor::new();
        let path = pointer::split("/paths/~1pets~1{id}/x~0y").unwrap();
        accessor.assign(&mut d, &path, Value::from("ok")).unwrap();

        assert_eq!(d, doc(json!({"paths": {"/pets/{id}": {"x~y": "ok"}}})));
        let again = pointer::split(&pointer::join(&path)).unwrap();
        assert_eq!(accessor.access(&d, &again).unwrap(), &Value::from("ok"));
    }

    #[test]
    fn test_remove() {
        let mut d = doc(json!({"a": {"b": 1, "c": 2}, "s": [1, 2, 3]}));
        let accessor = Accessor::new();
        assert_eq!(accessor.remove(&mut d, &["a", "b"]).unwrap(), doc(json!(1)));
        assert_eq!(accessor.remove(&mut d, &["s", "0"]).unwrap(), doc(json!(1)));
        assert_eq!(d, doc(json!({"a": {"c": 2}, "s": [2, 3]})));
        assert!(accessor.remove(&mut d, &["a", "zzz"]).is_err());
        assert!(accessor.maybe_remove(&mut d, &["nope", "zzz"]).is_none());
    }

    #[test]
    fn test_empty_tokens_address_empty_keys() {
        let d = doc(json!({"": "top", "a": {"": {"b": 1}}}));
        let accessor = Accessor::new();
        let root_key = pointer::split("/").unwrap();
        assert_eq!(accessor.access(&d, &root_key).unwrap(), &Value::from("top"));
        let nested = pointer::split("/a//b").unwrap();
        assert_eq!(accessor.access(&d, &nested).unwrap(), &doc(json!(1)));
    }
}
