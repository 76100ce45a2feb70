use std::collections::HashMap;
use std::ops::{Index, IndexMut};

use super::{FunctionId, TypeId, VariableId};
use crate::util::IndexVec;

simple_index! {
    pub struct NamespaceId;
}

/// One node of the namespace hierarchy
#[derive(Debug, Clone, Default)]
pub struct Namespace {
    /// Dotted path, empty for the root
    pub path: String,
    pub parent: Option<NamespaceId>,
    pub children: HashMap<String, NamespaceId>,
    pub types: HashMap<String, TypeId>,
    pub functions: HashMap<String, Vec<FunctionId>>,
    pub globals: HashMap<String, VariableId>,
    /// Namespaces imported with `use`
    pub uses: Vec<NamespaceId>,
}

impl Namespace {
    /// The full path of a member of this namespace
    pub fn qualify(&self, name: &str) -> String {
        if self.path.is_empty() {
            name.to_string()
        } else {
            format!("{}.{name}", self.path)
        }
    }
}

/// All namespaces of a compilation, created lazily by path
#[derive(Debug, Clone)]
pub struct NamespaceTree {
    namespaces: IndexVec<NamespaceId, Namespace>,
    root: NamespaceId,
}

impl Default for NamespaceTree {
    fn default() -> Self {
        Self::new()
    }
}

impl NamespaceTree {
    pub fn new() -> Self {
        let mut namespaces = IndexVec::new();
        let root = namespaces.push(Namespace::default());
        Self { namespaces, root }
    }

    pub fn root(&self) -> NamespaceId {
        self.root
    }

    /// Walk the path from the root, creating missing namespaces on the way
    pub fn get_or_create<'a>(&mut self, path: impl IntoIterator<Item = &'a str>) -> NamespaceId {
        let mut current = self.root;
        for segment in path {
            current = match self.namespaces[current].children.get(segment) {
                Some(&child) => child,
                None => {
                    let path = self.namespaces[current].qualify(segment);
                    let child = self.namespaces.push(Namespace {
                        path,
                        parent: Some(current),
                        ..Namespace::default()
                    });
                    self.namespaces[current]
                        .children
                        .insert(segment.to_string(), child);
                    child
                }
            };
        }
        current
    }

    /// Walk the path from the root without creating anything
    pub fn lookup<'a>(&self, path: impl IntoIterator<Item = &'a str>) -> Option<NamespaceId> {
        path.into_iter().try_fold(self.root, |current, segment| {
            self.child(current, segment)
        })
    }

    pub fn child(&self, namespace: NamespaceId, name: &str) -> Option<NamespaceId> {
        self.namespaces[namespace].children.get(name).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (NamespaceId, &Namespace)> {
        self.namespaces.iter_enumerated()
    }
}

impl Index<NamespaceId> for NamespaceTree {
    type Output = Namespace;

    fn index(&self, id: NamespaceId) -> &Namespace {
        &self.namespaces[id]
    }
}

impl IndexMut<NamespaceId> for NamespaceTree {
    fn index_mut(&mut self, id: NamespaceId) -> &mut Namespace {
        &mut self.namespaces[id]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn namespaces_are_created_lazily() {
        let mut tree = NamespaceTree::new();
        assert_eq!(tree.lookup(["app", "util"]), None);

        let util = tree.get_or_create(["app", "util"]);
        let app = tree.lookup(["app"]).unwrap();
        assert_eq!(tree[util].path, "app.util");
        assert_eq!(tree[util].parent, Some(app));
        assert_eq!(tree.get_or_create(["app", "util"]), util);
        assert_eq!(tree[util].qualify("clamp"), "app.util.clamp");
        assert_eq!(tree[tree.root()].qualify("main"), "main");
    }
}
