//! Splitting a bundled document into a tree of files.
//!
//! Every section entry some `$ref` points into (all of `definitions/*` when
//! anything references `#/definitions/...`) moves to its own file. The main
//! document keeps a `$ref` placeholder for each entry, except for entries
//! that only other fragments reach; bundling main again still finds those
//! through the fragment that refers to them.

use crate::accessor::Accessor;
use crate::config::SeparateOptions;
use crate::error::RefError;
use crate::format::{self, Format};
use crate::pointer::{self, Reference};
use crate::resolver::{FileIdentity, Resolver};
use crate::utils::{absolute_path, normalize_path, relative_path};
use crate::value::{collect_refs, walk_refs_mut, Value, REF_KEY};
use indexmap::IndexSet;
use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// One extracted entry.
#[derive(Debug, Clone, PartialEq)]
pub struct Fragment {
    /// Path relative to the output directory, e.g. `definitions/Pet.yaml`.
    pub path: PathBuf,
    /// A minimal document holding just the entry at its original pointer.
    pub content: Value,
}

/// The result of a separation, not yet written to disk.
#[derive(Debug, Clone)]
pub struct Separated {
    pub dir: PathBuf,
    pub format: Format,
    /// Path of the main document relative to `dir`.
    pub main_path: PathBuf,
    pub main: Value,
    pub fragments: Vec<Fragment>,
}

impl Separated {
    /// Returns `true` if nothing was separated.
    #[must_use]
    pub fn is_unsplit(&self) -> bool {
        self.fragments.is_empty()
    }

    #[must_use]
    pub fn fragment(&self, path: impl AsRef<Path>) -> Option<&Fragment> {
        self.fragments.iter().find(|f| f.path.as_path() == path.as_ref())
    }

    /// Writes every file under `dir`. Not transactional: a failure may leave
    /// some files written.
    ///
    /// # Errors
    /// [`RefError::Io`] on any filesystem failure.
    pub fn write(&self) -> Result<(), RefError> {
        self.write_into(&self.dir)
    }

    /// Writes into a temporary directory next to `dir` and renames it into
    /// place once everything is written. `dir` must not exist yet.
    ///
    /// # Errors
    /// [`RefError::Io`] if `dir` exists or on any filesystem failure.
    pub fn write_staged(&self) -> Result<(), RefError> {
        let io_error = |source| RefError::Io {
            path: self.dir.clone(),
            source,
        };
        if self.dir.exists() {
            return Err(io_error(std::io::Error::new(
                std::io::ErrorKind::AlreadyExists,
                "output directory already exists",
            )));
        }
        let parent = self.dir.parent().unwrap_or_else(|| Path::new("."));
        std::fs::create_dir_all(parent).map_err(io_error)?;
        let staging = tempfile::Builder::new()
            .prefix(".refpack-")
            .tempdir_in(parent)
            .map_err(io_error)?;
        self.write_into(staging.path())?;
        // From here on the staging directory is ours to move or clean up.
        let staged = staging.keep();
        if let Err(e) = std::fs::rename(&staged, &self.dir) {
            let _ = std::fs::remove_dir_all(&staged);
            return Err(io_error(e));
        }
        log::debug!("moved staged output to {}", self.dir.display());
        Ok(())
    }

    fn write_into(&self, dir: &Path) -> Result<(), RefError> {
        for fragment in &self.fragments {
            format::dump_file(&fragment.content, &dir.join(&fragment.path), self.format)?;
        }
        format::dump_file(&self.main, &dir.join(&self.main_path), self.format)
    }
}

pub struct Separator {
    resolver: Resolver,
    options: SeparateOptions,
    accessor: Accessor,
}

// A section entry that gets its own file.
struct Candidate {
    tokens: Vec<String>,
    pointer: String,
    file: PathBuf,
}

impl Separator {
    #[must_use]
    pub fn new(resolver: Resolver) -> Self {
        Self::with_options(resolver, SeparateOptions::default())
    }

    #[must_use]
    pub fn with_options(resolver: Resolver, options: SeparateOptions) -> Self {
        Separator {
            resolver,
            options,
            accessor: Accessor::new(),
        }
    }

    /// Separates the root resolver's document into files under `dir`.
    ///
    /// # Errors
    /// See [`Separator::separate_document`].
    pub fn separate(&self, dir: impl AsRef<Path>) -> Result<Separated, RefError> {
        let document = self.resolver.document()?;
        self.separate_document(&document, dir)
    }

    /// Separates `doc`, a bundled document, into files under `dir`. Nothing
    /// is written; see [`Separated::write`].
    ///
    /// # Errors
    /// [`RefError::MalformedReference`] for unparsable references, or an
    /// access failure while re-rooting an entry.
    pub fn separate_document(&self, doc: &Value, dir: impl AsRef<Path>) -> Result<Separated, RefError> {
        let dir = absolute_path(dir.as_ref());
        let format = self.format();
        let main_path = PathBuf::from(format!("{}.{}", self.options.main_name, format.extension()));
        // External references in `doc` are relative to this directory.
        let source_dir = match self.resolver.identity() {
            FileIdentity::File(path) => path.parent().map_or_else(|| dir.clone(), Path::to_path_buf),
            FileIdentity::Root => dir.clone(),
        };

        let candidates = self.scan(doc, format)?;
        let ctx = Rebase {
            candidates: &candidates,
            dir: &dir,
            source_dir: &source_dir,
            main_path: &main_path,
        };

        let mut fragments = Vec::with_capacity(candidates.len());
        for candidate in &candidates {
            let mut content = self.accessor.access(doc, &candidate.tokens)?.clone();
            let here = candidate.file.parent().unwrap_or_else(|| Path::new(""));
            ctx.rewrite(&mut content, here)?;

            let mut rerooted = Value::mapping();
            self.accessor.assign(&mut rerooted, &candidate.tokens, content)?;
            log::debug!("separated #{} into {}", candidate.pointer, candidate.file.display());
            fragments.push(Fragment {
                path: candidate.file.clone(),
                content: rerooted,
            });
        }

        let main = self.emit_main(doc, &ctx)?;
        Ok(Separated {
            dir,
            format,
            main_path,
            main,
            fragments,
        })
    }

    fn format(&self) -> Format {
        self.options.format.unwrap_or_else(|| match self.resolver.identity() {
            FileIdentity::File(path) => Format::from_path(path),
            FileIdentity::Root => Format::default(),
        })
    }

    // Groups local references by namespace (pointer minus last token) and
    // turns every child of each namespace into a candidate.
    fn scan(&self, doc: &Value, format: Format) -> Result<Vec<Candidate>, RefError> {
        let mut namespaces: IndexSet<Vec<String>> = IndexSet::new();
        for (_, reference) in collect_refs(doc) {
            let parsed = Reference::parse(&reference)?;
            if !parsed.is_local() {
                continue;
            }
            let mut tokens = pointer::split(parsed.pointer)?;
            if tokens.pop().is_some() && !tokens.is_empty() {
                namespaces.insert(tokens);
            }
        }

        let mut entries: IndexSet<Vec<String>> = IndexSet::new();
        for namespace in &namespaces {
            let Some(children) = self
                .accessor
                .access(doc, namespace)
                .ok()
                .and_then(Value::as_mapping)
            else {
                continue;
            };
            for (key, child) in children {
                // Already a placeholder for some other file.
                if child.is_pure_ref() && !child.ref_str().is_some_and(|r| r.starts_with('#')) {
                    continue;
                }
                let mut tokens = namespace.clone();
                tokens.push(key.clone());
                entries.insert(tokens);
            }
        }

        // Entries nested inside another entry travel with their parent.
        let all: Vec<Vec<String>> = entries.into_iter().collect();
        let mut taken = HashSet::new();
        let mut candidates = Vec::new();
        for tokens in &all {
            let nested = all
                .iter()
                .any(|other| other.len() < tokens.len() && tokens.starts_with(other));
            if nested {
                continue;
            }
            let file = unique_file(tokens, format, &mut taken);
            candidates.push(Candidate {
                pointer: pointer::join(tokens),
                tokens: tokens.clone(),
                file,
            });
        }
        Ok(candidates)
    }

    fn emit_main(&self, doc: &Value, ctx: &Rebase<'_>) -> Result<Value, RefError> {
        let mut main = doc.clone();
        ctx.rewrite(&mut main, Path::new(""))?;

        for candidate in ctx.candidates {
            let reference = format!("{}#{}", posix(&candidate.file), candidate.pointer);
            self.accessor
                .assign(&mut main, &candidate.tokens, Value::reference(reference))?;
        }

        // Tree shaking: a placeholder main does not use itself can go when
        // some fragment main does use still leads to it.
        let (direct, reachable) = reachability(doc, ctx.candidates)?;
        for (i, candidate) in ctx.candidates.iter().enumerate() {
            if reachable.contains(&i) && !direct.contains(&i) {
                self.accessor.maybe_remove(&mut main, &candidate.tokens);
                self.prune_empty(&mut main, &candidate.tokens);
            }
        }
        Ok(main)
    }

    // Removes mappings left empty on the way up from `tokens`.
    fn prune_empty(&self, main: &mut Value, tokens: &[String]) {
        let mut parent = &tokens[..tokens.len().saturating_sub(1)];
        while !parent.is_empty() {
            let empty = self
                .accessor
                .access(main, parent)
                .ok()
                .and_then(Value::as_mapping)
                .is_some_and(|m| m.is_empty());
            if !empty {
                break;
            }
            self.accessor.maybe_remove(main, parent);
            parent = &parent[..parent.len() - 1];
        }
    }
}

// Reference rewriting relative to where a document ends up.
struct Rebase<'a> {
    candidates: &'a [Candidate],
    dir: &'a Path,
    source_dir: &'a Path,
    main_path: &'a Path,
}

impl Rebase<'_> {
    // `here` is the directory of the rewritten document, relative to `dir`.
    fn rewrite(&self, value: &mut Value, here: &Path) -> Result<(), RefError> {
        walk_refs_mut(value, &mut Vec::new(), &mut |_, node| {
            let Some(reference) = node.ref_str().map(str::to_string) else {
                return Ok(());
            };
            let rewritten = self.rebase(&reference, here)?;
            if rewritten != reference {
                if let Some(map) = node.as_mapping_mut() {
                    map.insert(REF_KEY.to_string(), Value::String(rewritten));
                }
            }
            Ok(())
        })
    }

    fn rebase(&self, reference: &str, here: &Path) -> Result<String, RefError> {
        let parsed = Reference::parse(reference)?;
        if !parsed.is_local() {
            let target = normalize_path(&self.source_dir.join(parsed.file));
            let from = normalize_path(&self.dir.join(here));
            return Ok(with_pointer(&relative_path(&target, &from), parsed.pointer));
        }

        let tokens = pointer::split(parsed.pointer)?;
        let file = match owner(self.candidates, &tokens) {
            Some(i) => &self.candidates[i].file,
            // Not separated: it stays in the main document.
            None if here.as_os_str().is_empty() => return Ok(reference.to_string()),
            None => self.main_path,
        };
        if here.as_os_str().is_empty() {
            return Ok(with_pointer(&posix(file), parsed.pointer));
        }
        Ok(with_pointer(&relative_path(file, here), parsed.pointer))
    }
}

// Index of the candidate holding the node at `tokens`.
fn owner(candidates: &[Candidate], tokens: &[String]) -> Option<usize> {
    candidates
        .iter()
        .enumerate()
        .filter(|(_, c)| tokens.starts_with(&c.tokens))
        .max_by_key(|(_, c)| c.tokens.len())
        .map(|(i, _)| i)
}

// Candidates referenced from outside every candidate, and every candidate
// reachable from those through local references.
fn reachability(doc: &Value, candidates: &[Candidate]) -> Result<(HashSet<usize>, HashSet<usize>), RefError> {
    let mut direct = HashSet::new();
    let mut edges: Vec<Vec<usize>> = vec![Vec::new(); candidates.len()];
    for (path, reference) in collect_refs(doc) {
        let parsed = Reference::parse(&reference)?;
        if !parsed.is_local() {
            continue;
        }
        let Some(target) = owner(candidates, &pointer::split(parsed.pointer)?) else {
            continue;
        };
        match owner(candidates, &path) {
            Some(source) => edges[source].push(target),
            None => {
                direct.insert(target);
            }
        }
    }

    let mut reachable: HashSet<usize> = direct.clone();
    let mut queue: Vec<usize> = direct.iter().copied().collect();
    while let Some(i) = queue.pop() {
        for &next in &edges[i] {
            if reachable.insert(next) {
                queue.push(next);
            }
        }
    }
    Ok((direct, reachable))
}

fn with_pointer(file: &str, pointer: &str) -> String {
    if pointer.is_empty() {
        file.to_string()
    } else {
        format!("{file}#{pointer}")
    }
}

fn posix(path: &Path) -> String {
    path.components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

fn sanitize(token: &str) -> String {
    let cleaned: String = token
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || matches!(c, '-' | '_' | '.') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let cleaned = cleaned.trim_start_matches('.');
    if cleaned.is_empty() {
        "_".to_string()
    } else {
        cleaned.to_string()
    }
}

// `definitions/Pet.yaml` for `/definitions/Pet`, suffixed when two entries
// sanitize to the same file.
fn unique_file(tokens: &[String], format: Format, taken: &mut HashSet<PathBuf>) -> PathBuf {
    let (name, namespace) = tokens
        .split_last()
        .map_or(("_", &[][..]), |(name, ns)| (name.as_str(), ns));
    let mut dir = PathBuf::new();
    for token in namespace {
        dir.push(sanitize(token));
    }
    let stem = sanitize(name);
    let mut file = dir.join(format!("{stem}.{}", format.extension()));
    let mut i = 1;
    while !taken.insert(file.clone()) {
        file = dir.join(format!("{stem}{i}.{}", format.extension()));
        i += 1;
    }
    file
}
