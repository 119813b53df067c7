use crate::error::RefError;
use crate::resolver::{FileIdentity, GlobalRef, Resolver};
use crate::stacked::StackedAccessor;
use crate::utils::relative_path;
use crate::value::{Value, REF_KEY};
use std::collections::HashMap;
use std::path::Path;

/// Inlines every `$ref` of a document with the content it points to.
///
/// References are followed across files. A reference whose target is already
/// being expanded further up the same chain is a cycle edge and is left as a
/// `$ref`, rewritten relative to the root document. Each target is expanded
/// once per pass and reused wherever it is referenced again.
pub struct Expander {
    accessor: StackedAccessor,
    root: FileIdentity,
    arrived: Vec<GlobalRef>,
    done: HashMap<GlobalRef, Value>,
}

impl Expander {
    #[must_use]
    pub fn new(resolver: Resolver) -> Self {
        Expander {
            root: resolver.identity().clone(),
            accessor: StackedAccessor::new(resolver),
            arrived: Vec::new(),
            done: HashMap::new(),
        }
    }

    /// Expands the root resolver's own document.
    ///
    /// # Errors
    /// Load, lookup and merge failures, see [`Expander::expand`].
    pub fn expand_root(&mut self) -> Result<Value, RefError> {
        let document = self.accessor.resolver().document()?;
        self.expand(&document)
    }

    /// Returns a copy of `doc` with its references expanded. References in
    /// `doc` resolve against the root resolver.
    ///
    /// # Errors
    /// Any resolution failure, or [`RefError::UnsupportedMerge`] when a
    /// non-mapping target meets a `$ref` node with sibling keys.
    pub fn expand(&mut self, doc: &Value) -> Result<Value, RefError> {
        self.arrived.clear();
        self.done.clear();
        let mut out = doc.clone();
        self.expand_node(&mut out)?;
        Ok(out)
    }

    fn expand_node(&mut self, node: &mut Value) -> Result<(), RefError> {
        match node {
            Value::Mapping(map) => {
                for (key, child) in map.iter_mut() {
                    if key != REF_KEY && child.contains_ref() {
                        self.expand_node(child)?;
                    }
                }
            }
            Value::Sequence(items) => {
                for child in items.iter_mut() {
                    if child.contains_ref() {
                        self.expand_node(child)?;
                    }
                }
            }
            _ => {}
        }

        let Some(reference) = node.ref_str().map(str::to_string) else {
            return Ok(());
        };
        let (global, target) = self.accessor.access(&reference)?;
        let expanded = self.expand_target(&global, target);
        self.accessor.pop();
        match expanded? {
            Some(target) => merge_into(node, target, &reference),
            None => {
                let edge = self.root_relative(&global).unwrap_or_else(|| reference.clone());
                log::debug!("cycle at {global}, keeping {edge}");
                if let Some(map) = node.as_mapping_mut() {
                    map.insert(REF_KEY.to_string(), Value::String(edge));
                }
                Ok(())
            }
        }
    }

    // `None` when `global` is still being expanded further up the chain.
    fn expand_target(&mut self, global: &GlobalRef, mut target: Value) -> Result<Option<Value>, RefError> {
        if self.arrived.contains(global) {
            return Ok(None);
        }
        if let Some(done) = self.done.get(global) {
            return Ok(Some(done.clone()));
        }
        self.arrived.push(global.clone());
        let result = self.expand_node(&mut target);
        self.arrived.pop();
        result?;
        self.done.insert(global.clone(), target.clone());
        Ok(Some(target))
    }

    // How the root document spells a reference to `global`.
    fn root_relative(&self, global: &GlobalRef) -> Option<String> {
        if global.file == self.root {
            return Some(format!("#{}", global.pointer));
        }
        let (FileIdentity::File(target), FileIdentity::File(root)) = (&global.file, &self.root) else {
            return None;
        };
        let base = root.parent().unwrap_or_else(|| Path::new(""));
        let file = relative_path(target, base);
        if global.pointer.is_empty() {
            Some(file)
        } else {
            Some(format!("{file}#{}", global.pointer))
        }
    }
}

// Replaces the `$ref` of `node` with `target`: sibling keys stay, the target's
// keys are laid over them.
fn merge_into(node: &mut Value, target: Value, reference: &str) -> Result<(), RefError> {
    let Value::Mapping(map) = node else {
        *node = target;
        return Ok(());
    };
    map.shift_remove(REF_KEY);
    if map.is_empty() {
        *node = target;
        return Ok(());
    }
    match target {
        Value::Mapping(expanded) => {
            map.extend(expanded);
            Ok(())
        }
        _ => Err(RefError::UnsupportedMerge {
            reference: reference.to_string(),
        }),
    }
}
