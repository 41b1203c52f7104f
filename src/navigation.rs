//! Menu trees and active-trail computation.
//!
//! Menus are declared in the settings as nested lists: a plain string is a
//! leaf naming a content source path, a single-key map opens a submenu under
//! that key. Node ids are always source paths, never output paths.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_yaml::Value as YamlValue;

use crate::error::BuildError;

/// Deepest nesting accepted in a menu declaration
pub const MAX_MENU_DEPTH: usize = 32;

/// A node in a menu tree
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MenuNode {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub children: Option<Vec<MenuNode>>,
}

impl MenuNode {
    pub fn leaf(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            children: None,
        }
    }

    pub fn with_children(id: impl Into<String>, children: Vec<MenuNode>) -> Self {
        Self {
            id: id.into(),
            children: Some(children),
        }
    }
}

/// Menu name to its top-level nodes, in declaration order
pub type Menus = IndexMap<String, Vec<MenuNode>>;

/// Menu name to `level_N` to the sibling list traversed at that level
pub type Submenus = IndexMap<String, IndexMap<String, Vec<MenuNode>>>;

/// Build every menu from its declaration.
pub fn build_menus(declaration: &IndexMap<String, Vec<YamlValue>>) -> Result<Menus, BuildError> {
    let mut menus = Menus::with_capacity(declaration.len());
    for (name, items) in declaration {
        let mut ancestors = Vec::new();
        let nodes = build_nodes(name, items, &mut ancestors)?;
        menus.insert(name.clone(), nodes);
    }
    Ok(menus)
}

fn build_nodes(
    menu: &str,
    items: &[YamlValue],
    ancestors: &mut Vec<String>,
) -> Result<Vec<MenuNode>, BuildError> {
    if ancestors.len() >= MAX_MENU_DEPTH {
        return Err(BuildError::configuration(format!(
            "Menu |{}| is nested deeper than {} levels.",
            menu, MAX_MENU_DEPTH
        )));
    }

    let mut nodes = Vec::with_capacity(items.len());
    for item in items {
        let node = match item {
            YamlValue::String(id) => {
                check_not_ancestor(menu, id, ancestors)?;
                MenuNode::leaf(id.clone())
            }
            YamlValue::Mapping(map) if map.len() == 1 => {
                let Some((key, value)) = map.iter().next() else {
                    continue;
                };
                let Some(id) = key.as_str() else {
                    return Err(BuildError::configuration(format!(
                        "Menu |{}| has a submenu whose key is not a string: |{:?}|.",
                        menu, key
                    )));
                };
                check_not_ancestor(menu, id, ancestors)?;
                let children: &[YamlValue] = match value {
                    YamlValue::Sequence(children) => children.as_slice(),
                    YamlValue::Null => &[],
                    other => {
                        return Err(BuildError::configuration(format!(
                            "Submenu |{}| in menu |{}| must be a list, found |{:?}|.",
                            id, menu, other
                        )))
                    }
                };

                ancestors.push(id.to_string());
                let children = build_nodes(menu, children, ancestors)?;
                ancestors.pop();
                MenuNode::with_children(id, children)
            }
            other => {
                return Err(BuildError::configuration(format!(
                    "Invalid item |{:?}| in menu |{}|: expected a content path or a single-key map.",
                    other, menu
                )))
            }
        };
        nodes.push(node);
    }
    Ok(nodes)
}

fn check_not_ancestor(menu: &str, id: &str, ancestors: &[String]) -> Result<(), BuildError> {
    if ancestors.iter().any(|a| a == id) {
        return Err(BuildError::configuration(format!(
            "Menu |{}| is cyclic: |{}| appears inside its own submenu.",
            menu, id
        )));
    }
    Ok(())
}

/// Whether `path` (a source path) appears anywhere below `children`.
pub fn is_path_in_children(path: &str, children: &[MenuNode]) -> bool {
    children.iter().any(|child| {
        child.id == path
            || child
                .children
                .as_deref()
                .is_some_and(|grandchildren| is_path_in_children(path, grandchildren))
    })
}

/// Sibling lists along the active trail of `source_path`, per menu.
///
/// At each level the first node whose subtree contains the path is followed
/// and its children recorded as `level_N`. The walk stops at the first level
/// where no node matches.
pub fn compute_submenus(menus: &Menus, source_path: &str) -> Submenus {
    let mut submenus = Submenus::with_capacity(menus.len());
    for (name, nodes) in menus {
        let mut levels = IndexMap::new();
        let mut current = nodes.as_slice();
        let mut level = 0;

        while let Some(children) = current.iter().find_map(|node| {
            node.children
                .as_deref()
                .filter(|children| is_path_in_children(source_path, children))
        }) {
            level += 1;
            levels.insert(format!("level_{}", level), children.to_vec());
            current = children;
        }

        submenus.insert(name.clone(), levels);
    }
    submenus
}

/// How a menu item with children is expanded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExpandPolicy {
    Always,
    Never,
    ActiveTrail,
}

impl ExpandPolicy {
    /// Unknown or empty values fall back to `always`.
    pub fn parse(value: &str) -> Self {
        match value {
            "never" => ExpandPolicy::Never,
            "activeTrail" => ExpandPolicy::ActiveTrail,
            _ => ExpandPolicy::Always,
        }
    }
}

/// Whether a menu item with `children` is shown expanded for `current_path`.
pub fn must_expand(
    policy: ExpandPolicy,
    children: Option<&[MenuNode]>,
    current_path: &str,
    item_id: &str,
) -> bool {
    let Some(children) = children else {
        return false;
    };
    match policy {
        ExpandPolicy::Never => false,
        ExpandPolicy::Always => true,
        ExpandPolicy::ActiveTrail => {
            current_path == item_id || is_path_in_children(current_path, children)
        }
    }
}

/// CSS classes of a menu item: `first`, `last`, `active`, `active-trail`.
pub fn menu_item_classes(
    is_first: bool,
    is_last: bool,
    current_path: &str,
    item_id: &str,
    children: Option<&[MenuNode]>,
) -> Vec<&'static str> {
    let mut classes = Vec::new();
    if is_first {
        classes.push("first");
    }
    if is_last {
        classes.push("last");
    }
    if current_path == item_id {
        classes.push("active");
    }
    if children.is_some_and(|c| is_path_in_children(current_path, c)) {
        classes.push("active-trail");
    }
    classes
}
