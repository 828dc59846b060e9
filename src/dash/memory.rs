//! In-memory [`Introspection`] backend.
//!
//! Holds a tree of typed elements with string properties. Taps and typing
//! can trigger scripted reactions that mutate the tree, which is enough to
//! replay a dash flow without a running shell.

use super::{ElementId, Introspection, Selector};
use crate::error::{HarnessError, Result};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

#[derive(Debug, Clone)]
struct Node {
    type_name: String,
    parent: Option<ElementId>,
    properties: BTreeMap<String, String>,
}

/// Mutable view of the element tree, handed to reactions.
#[derive(Debug, Default)]
pub struct ShellTree {
    next_id: u64,
    nodes: BTreeMap<ElementId, Node>,
}

impl ShellTree {
    /// Add an element and return its handle.
    pub fn add(
        &mut self,
        type_name: &str,
        parent: Option<ElementId>,
        properties: &[(&str, &str)],
    ) -> ElementId {
        self.next_id += 1;
        let id = ElementId(self.next_id);
        self.nodes.insert(
            id,
            Node {
                type_name: type_name.to_owned(),
                parent,
                properties: properties
                    .iter()
                    .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
                    .collect(),
            },
        );
        id
    }

    /// Set (or overwrite) a property. Unknown elements are ignored.
    pub fn set(&mut self, element: ElementId, name: &str, value: &str) {
        if let Some(node) = self.nodes.get_mut(&element) {
            node.properties.insert(name.to_owned(), value.to_owned());
        }
    }

    /// Remove an element and all of its descendants.
    pub fn remove(&mut self, element: ElementId) {
        let doomed: Vec<ElementId> = self
            .nodes
            .keys()
            .copied()
            .filter(|id| self.is_within(*id, element))
            .collect();
        for id in doomed {
            self.nodes.remove(&id);
        }
    }

    /// Property value of an element.
    pub fn get(&self, element: ElementId, name: &str) -> Option<&str> {
        self.nodes
            .get(&element)
            .and_then(|node| node.properties.get(name))
            .map(String::as_str)
    }

    /// First element of `type_name`, if any.
    pub fn first(&self, type_name: &str) -> Option<ElementId> {
        self.nodes
            .iter()
            .find(|(_, node)| node.type_name == type_name)
            .map(|(id, _)| *id)
    }

    /// `true` if `id` is `ancestor` or lies below it.
    fn is_within(&self, id: ElementId, ancestor: ElementId) -> bool {
        let mut cursor = Some(id);
        while let Some(current) = cursor {
            if current == ancestor {
                return true;
            }
            cursor = self.nodes.get(&current).and_then(|n| n.parent);
        }
        false
    }

    fn matches(&self, id: ElementId, node: &Node, selector: &Selector) -> bool {
        node.type_name == selector.type_name
            && selector
                .properties
                .iter()
                .all(|(k, v)| node.properties.get(k) == Some(v))
            && selector
                .within
                .is_none_or(|parent| id != parent && self.is_within(id, parent))
    }
}

type TapReaction = Arc<dyn Fn(&mut ShellTree) + Send + Sync>;
type TypeTapReaction = Arc<dyn Fn(&mut ShellTree, ElementId) + Send + Sync>;
type TypeReaction = Arc<dyn Fn(&mut ShellTree, &str) + Send + Sync>;

/// Scriptable in-memory shell.
#[derive(Default)]
pub struct InMemoryShell {
    tree: Mutex<ShellTree>,
    on_tap: Mutex<HashMap<ElementId, TapReaction>>,
    on_tap_type: Mutex<HashMap<String, TypeTapReaction>>,
    on_type: Mutex<Option<TypeReaction>>,
    taps: Mutex<Vec<ElementId>>,
    typed: Mutex<String>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl InMemoryShell {
    /// Empty shell with no elements or reactions.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an element and return its handle.
    pub fn add(
        &self,
        type_name: &str,
        parent: Option<ElementId>,
        properties: &[(&str, &str)],
    ) -> ElementId {
        lock(&self.tree).add(type_name, parent, properties)
    }

    /// Set a property on an existing element.
    pub fn set(&self, element: ElementId, name: &str, value: &str) {
        lock(&self.tree).set(element, name, value);
    }

    /// Remove an element subtree.
    pub fn remove(&self, element: ElementId) {
        lock(&self.tree).remove(element);
    }

    /// Run `reaction` every time `element` is tapped.
    pub fn on_tap<F>(&self, element: ElementId, reaction: F)
    where
        F: Fn(&mut ShellTree) + Send + Sync + 'static,
    {
        lock(&self.on_tap).insert(element, Arc::new(reaction));
    }

    /// Run `reaction` whenever any element of `type_name` is tapped,
    /// including elements created later.
    pub fn on_tap_any<F>(&self, type_name: &str, reaction: F)
    where
        F: Fn(&mut ShellTree, ElementId) + Send + Sync + 'static,
    {
        lock(&self.on_tap_type).insert(type_name.to_owned(), Arc::new(reaction));
    }

    /// Run `reaction` for every chunk of typed text.
    pub fn on_type<F>(&self, reaction: F)
    where
        F: Fn(&mut ShellTree, &str) + Send + Sync + 'static,
    {
        *lock(&self.on_type) = Some(Arc::new(reaction));
    }

    /// Elements tapped so far, oldest first.
    pub fn taps(&self) -> Vec<ElementId> {
        lock(&self.taps).clone()
    }

    /// Everything typed so far.
    pub fn typed(&self) -> String {
        lock(&self.typed).clone()
    }
}

impl Introspection for InMemoryShell {
    fn find(&self, selector: &Selector) -> Result<Vec<ElementId>> {
        let tree = lock(&self.tree);
        Ok(tree
            .nodes
            .iter()
            .filter(|(id, node)| tree.matches(**id, node, selector))
            .map(|(id, _)| *id)
            .collect())
    }

    fn property(&self, element: ElementId, name: &str) -> Result<Option<String>> {
        let tree = lock(&self.tree);
        let node = tree
            .nodes
            .get(&element)
            .ok_or_else(|| HarnessError::Ui(format!("element {element} no longer exists")))?;
        Ok(node.properties.get(name).cloned())
    }

    fn tap(&self, element: ElementId) -> Result<()> {
        let type_name = match lock(&self.tree).nodes.get(&element) {
            Some(node) => node.type_name.clone(),
            None => {
                return Err(HarnessError::Ui(format!(
                    "cannot tap missing element {element}"
                )));
            }
        };
        lock(&self.taps).push(element);
        let reaction = lock(&self.on_tap).get(&element).cloned();
        if let Some(reaction) = reaction {
            reaction(&mut lock(&self.tree));
        }
        let reaction = lock(&self.on_tap_type).get(&type_name).cloned();
        if let Some(reaction) = reaction {
            reaction(&mut lock(&self.tree), element);
        }
        Ok(())
    }

    fn type_text(&self, text: &str) -> Result<()> {
        lock(&self.typed).push_str(text);
        let reaction = lock(&self.on_type).clone();
        if let Some(reaction) = reaction {
            reaction(&mut lock(&self.tree), text);
        }
        Ok(())
    }
}
