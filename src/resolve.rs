//! Reference resolution.
//!
//! A first pass builds the graph of internal reference targets and marks every
//! target that can reach itself again. The second pass inlines each reference
//! with the structure it points at, except references to those recursive
//! targets: they are left behind as [`RawNode::Ref`] markers, which the
//! normalizer turns into `Schema::Reference`. Every expansion is computed once.

use crate::error::ContractError;
use crate::raw::{RawMap, RawNode, SchemaId, escape_pointer_token};
use std::collections::{BTreeMap, BTreeSet, HashMap};

/// Containers that hold reusable named schemas.
const SCHEMA_CONTAINERS: &[&str] = &["/components/schemas", "/definitions"];

/// Keys whose content is never schema structure and is copied untouched.
fn is_opaque_key(key: &str) -> bool {
    key == "example" || key == "examples" || key.starts_with("x-")
}

/// Result of resolution: the rewritten tree plus the resolved form of every
/// reusable named schema and of every recursive target.
#[derive(Debug, Clone)]
pub struct ResolvedDocument {
    pub root: RawNode,
    pub schemas: BTreeMap<SchemaId, RawNode>,
    /// Number of references left as markers because their target is recursive.
    pub cycle_cuts: usize,
}

/// Resolves all internal references of `root`.
pub fn resolve(root: &RawNode) -> Result<ResolvedDocument, ContractError> {
    let recursive = recursive_targets(root);
    let mut resolver = Resolver::new(root, recursive);

    let mut schemas = BTreeMap::new();
    for container in SCHEMA_CONTAINERS {
        let Some(RawNode::Mapping(named)) = root.pointer(container) else {
            continue;
        };
        for name in named.keys() {
            let target = format!("#{container}/{}", escape_pointer_token(name));
            let resolved = resolver.expand(&target, &target)?;
            schemas.insert(SchemaId(target), resolved);
        }
    }
    let recursive: Vec<String> = resolver.recursive.iter().cloned().collect();
    for target in recursive {
        let id = SchemaId(target);
        if !schemas.contains_key(&id) {
            let resolved = resolver.expand(&id.0, &id.0)?;
            schemas.insert(id, resolved);
        }
    }

    let rewritten = resolver.resolve_node(root, "#")?;
    tracing::debug!(
        schemas = schemas.len(),
        recursive = resolver.recursive.len(),
        cycle_cuts = resolver.cycle_cuts,
        "resolved references"
    );
    Ok(ResolvedDocument {
        root: rewritten,
        schemas,
        cycle_cuts: resolver.cycle_cuts,
    })
}

/// Node addressed by an internal reference, if the reference is one.
fn target_node<'a>(root: &'a RawNode, target: &str) -> Option<&'a RawNode> {
    let fragment = target.strip_prefix('#')?;
    if !(fragment.is_empty() || fragment.starts_with('/')) {
        return None;
    }
    root.pointer(fragment)
}

/// Collects the string `$ref` values under `node`. Malformed references are
/// skipped here and reported by the resolving pass.
fn collect_references(node: &RawNode, out: &mut BTreeSet<String>) {
    match node {
        RawNode::Mapping(map) => {
            if let Some(reference) = map.get("$ref") {
                if let Some(target) = reference.as_str() {
                    out.insert(target.to_string());
                }
                return;
            }
            for (key, value) in map.iter() {
                if !is_opaque_key(key) {
                    collect_references(value, out);
                }
            }
        }
        RawNode::Sequence(items) => items.iter().for_each(|item| collect_references(item, out)),
        _ => {}
    }
}

/// Reference targets that lie on a cycle of the reference graph.
fn recursive_targets(root: &RawNode) -> BTreeSet<String> {
    let mut edges: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
    let mut pending = BTreeSet::new();
    collect_references(root, &mut pending);
    while let Some(target) = pending.pop_first() {
        if edges.contains_key(&target) {
            continue;
        }
        let mut found = BTreeSet::new();
        if let Some(node) = target_node(root, &target) {
            collect_references(node, &mut found);
        }
        pending.extend(found.iter().filter(|t| !edges.contains_key(*t)).cloned());
        edges.insert(target, found);
    }

    edges
        .keys()
        .filter(|target| reaches(&edges, target))
        .cloned()
        .collect()
}

/// Whether `start` can be reached again from its own successors.
fn reaches(edges: &BTreeMap<String, BTreeSet<String>>, start: &str) -> bool {
    let mut seen = BTreeSet::new();
    let mut stack: Vec<&str> = edges.get(start).into_iter().flatten().map(String::as_str).collect();
    while let Some(next) = stack.pop() {
        if next == start {
            return true;
        }
        if seen.insert(next) {
            if let Some(successors) = edges.get(next) {
                stack.extend(successors.iter().map(String::as_str));
            }
        }
    }
    false
}

struct Resolver<'a> {
    root: &'a RawNode,
    recursive: BTreeSet<String>,
    expanded: HashMap<String, RawNode>,
    cycle_cuts: usize,
}

impl<'a> Resolver<'a> {
    fn new(root: &'a RawNode, recursive: BTreeSet<String>) -> Self {
        Self {
            root,
            recursive,
            expanded: HashMap::new(),
            cycle_cuts: 0,
        }
    }

    fn resolve_node(&mut self, node: &RawNode, pointer: &str) -> Result<RawNode, ContractError> {
        match node {
            RawNode::Mapping(map) => {
                if let Some(reference) = map.get("$ref") {
                    let Some(target) = reference.as_str() else {
                        return Err(ContractError::UnsupportedReference {
                            reference: format!("<{}>", reference.kind_name()),
                            pointer: pointer.to_string(),
                            reason: "reference is not a string",
                        });
                    };
                    return self.resolve_reference(target, pointer);
                }
                let mut out = RawMap::new();
                for (key, value) in map.iter() {
                    if is_opaque_key(key) {
                        out.insert(key.to_string(), value.clone());
                        continue;
                    }
                    let child_pointer = format!("{pointer}/{}", escape_pointer_token(key));
                    out.insert(key.to_string(), self.resolve_node(value, &child_pointer)?);
                }
                Ok(RawNode::Mapping(out))
            }
            RawNode::Sequence(items) => {
                let mut out = Vec::with_capacity(items.len());
                for (index, item) in items.iter().enumerate() {
                    out.push(self.resolve_node(item, &format!("{pointer}/{index}"))?);
                }
                Ok(RawNode::Sequence(out))
            }
            other => Ok(other.clone()),
        }
    }

    fn resolve_reference(&mut self, target: &str, pointer: &str) -> Result<RawNode, ContractError> {
        let Some(fragment) = target.strip_prefix('#') else {
            return Err(ContractError::UnsupportedReference {
                reference: target.to_string(),
                pointer: pointer.to_string(),
                reason: "references to other documents are not supported",
            });
        };
        if !(fragment.is_empty() || fragment.starts_with('/')) {
            return Err(ContractError::UnsupportedReference {
                reference: target.to_string(),
                pointer: pointer.to_string(),
                reason: "only JSON pointer fragments are supported",
            });
        }

        if self.recursive.contains(target) {
            self.cycle_cuts += 1;
            tracing::trace!(reference = target, "recursive reference kept");
            return Ok(RawNode::Ref(SchemaId(target.to_string())));
        }
        self.expand(target, pointer)
    }

    /// Resolved content of `target`. Recursive targets only ever reach this
    /// through the named-schema table, where their own body is expanded.
    fn expand(&mut self, target: &str, pointer: &str) -> Result<RawNode, ContractError> {
        if let Some(done) = self.expanded.get(target) {
            return Ok(done.clone());
        }
        let root = self.root;
        let Some(node) = target_node(root, target) else {
            return Err(ContractError::UnresolvedReference {
                reference: target.to_string(),
                pointer: pointer.to_string(),
            });
        };
        let resolved = self.resolve_node(node, target)?;
        self.expanded.insert(target.to_string(), resolved.clone());
        Ok(resolved)
    }
}
