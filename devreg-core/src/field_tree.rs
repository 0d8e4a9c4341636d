//! Hierarchical field-path sets.
//!
//! A [`FieldTree`] stores paths by component. A node with no children at
//! depth > 0 is a leaf and selects its whole subtree; the empty root selects
//! nothing.
//!
//! [`FieldTree::compress`] collapses every subtree that equals the matching
//! subtree of a reference tree, so a request that covers all of `mac_settings`
//! is sent as `mac_settings` instead of one path per setting.

use std::collections::BTreeMap;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldTree {
    children: BTreeMap<String, FieldTree>,
}

impl FieldTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a tree from a list of paths.
    pub fn from_paths<P: AsRef<str>>(paths: &[P]) -> Self {
        let mut tree = Self::new();
        tree.add(paths);
        tree
    }

    /// Insert `paths`, creating intermediate nodes as needed.
    pub fn add<P: AsRef<str>>(&mut self, paths: &[P]) {
        for path in paths {
            let mut node = &mut *self;
            for component in path.as_ref().split('.') {
                node = node.children.entry(component.to_string()).or_default();
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }

    /// Structural equality: equal key sets with pairwise-equal children.
    pub fn same(&self, other: &FieldTree) -> bool {
        self.children.len() == other.children.len()
            && self.children.iter().all(|(key, child)| {
                other
                    .children
                    .get(key)
                    .is_some_and(|other_child| child.same(other_child))
            })
    }

    /// Collapse subtrees identical to the matching subtree of `reference`.
    ///
    /// # Panics
    ///
    /// Panics when `self` holds a component that `reference` lacks at the
    /// same position: the reference tree must be a superset of `self`.
    pub fn compress(&self, reference: &FieldTree) -> FieldTree {
        if self.same(reference) {
            return FieldTree::new();
        }
        let children = self
            .children
            .iter()
            .map(|(key, child)| {
                let Some(reference_child) = reference.children.get(key) else {
                    panic!("incomplete reference tree: missing component `{key}`");
                };
                (key.clone(), child.compress(reference_child))
            })
            .collect();
        FieldTree { children }
    }

    /// Sorted list of leaf paths.
    pub fn fields(&self) -> Vec<String> {
        let mut out = Vec::new();
        for (key, child) in &self.children {
            child.collect(key, &mut out);
        }
        out.sort();
        out
    }

    /// Whether `path` continues past a leaf of this tree, i.e. addresses
    /// something inside a subtree the tree only names by its root.
    pub fn is_below_leaf(&self, path: &str) -> bool {
        let mut node = self;
        for (depth, component) in path.split('.').enumerate() {
            if depth > 0 && node.children.is_empty() {
                return true;
            }
            match node.children.get(component) {
                Some(child) => node = child,
                None => return false,
            }
        }
        false
    }

    /// Names of the root's direct children, sorted.
    pub fn top_level(&self) -> Vec<String> {
        self.children.keys().cloned().collect()
    }

    fn collect(&self, prefix: &str, out: &mut Vec<String>) {
        if self.children.is_empty() {
            out.push(prefix.to_string());
            return;
        }
        for (key, child) in &self.children {
            child.collect(&format!("{prefix}.{key}"), out);
        }
    }
}

/// Compress `paths` against `reference` and return the resulting path list.
///
/// When `paths` covers the whole reference, the reference's top-level
/// fields are returned rather than an empty list.
pub fn compact<P: AsRef<str>>(paths: &[P], reference: &FieldTree) -> Vec<String> {
    let tree = FieldTree::from_paths(paths);
    if tree.is_empty() {
        return Vec::new();
    }
    let compressed = tree.compress(reference);
    if compressed.is_empty() {
        reference.top_level()
    } else {
        compressed.fields()
    }
}
