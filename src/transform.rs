//! Menu tree transformations
//!
//! Pure functions over a menu forest (a slice of root `MenuNode`s). Filters
//! build new trees and never modify their input, so trees held in the cache
//! can be handed out and transformed freely.
//!
//! Traversals are pre-order: a node is visited before its children, and
//! siblings are visited in their stored order.

use std::collections::{HashMap, HashSet};
use std::sync::LazyLock;

use regex::Regex;

use crate::data::MenuNode;

/// Expected shape of a permission string, e.g. `menu:dashboard`
static PERMISSION_FORMAT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z_]+:[a-z_]+$").expect("valid regex literal"));

/// Summary figures for a menu forest
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MenuStats {
    /// Every node in the forest
    pub total_nodes: usize,
    /// Top-level nodes
    pub root_nodes: usize,
    /// Nodes below the top level
    pub child_nodes: usize,
    /// Nodes carrying a permission requirement
    pub nodes_with_permission: usize,
    /// Longest root-to-leaf chain in edges
    pub max_depth: usize,
}

/// Outcome of [`validate`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationReport {
    /// Duplicate ids and duplicate paths
    pub errors: Vec<String>,
    /// Malformed permission strings
    pub warnings: Vec<String>,
    /// Number of nodes inspected
    pub total_nodes: usize,
}

impl ValidationReport {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Sorts siblings by `sort_order`, keeping input order on ties
fn sort_siblings(menus: &mut [MenuNode]) {
    menus.sort_by_key(|menu| menu.sort_order);
}

/// Prepares a freshly decoded tree for display
///
/// Every node's `icon` is replaced by its `emoji` when one is set, and each
/// sibling list is sorted by `sort_order`.
pub fn normalize(menus: Vec<MenuNode>) -> Vec<MenuNode> {
    let mut normalized: Vec<MenuNode> = menus
        .into_iter()
        .map(|mut menu| {
            if menu.emoji.is_some() {
                menu.icon = menu.emoji.clone();
            }
            menu.children = normalize(std::mem::take(&mut menu.children));
            menu
        })
        .collect();
    sort_siblings(&mut normalized);
    normalized
}

/// Rebuilds `menus`, keeping only nodes accepted by `keep`
///
/// A rejected node takes its whole subtree with it.
fn prune(menus: &[MenuNode], keep: &impl Fn(&MenuNode) -> bool) -> Vec<MenuNode> {
    let mut kept: Vec<MenuNode> = menus
        .iter()
        .filter(|menu| keep(menu))
        .map(|menu| MenuNode {
            children: prune(&menu.children, keep),
            ..menu.shallow_clone()
        })
        .collect();
    sort_siblings(&mut kept);
    kept
}

/// Removes hidden nodes together with their subtrees
pub fn filter_visible(menus: &[MenuNode]) -> Vec<MenuNode> {
    prune(menus, &|menu| !menu.is_hidden)
}

/// Keeps the nodes the holder of `granted` may reach
///
/// A node survives when it has no permission or its permission is in
/// `granted`. Children of a dropped node are dropped too, never promoted.
pub fn filter_by_permission(menus: &[MenuNode], granted: &HashSet<String>) -> Vec<MenuNode> {
    prune(menus, &|menu| match &menu.permission {
        Some(permission) => granted.contains(permission),
        None => true,
    })
}

/// Lists every node in pre-order
pub fn flatten(menus: &[MenuNode]) -> Vec<&MenuNode> {
    let mut flat = Vec::new();
    let mut stack: Vec<&MenuNode> = menus.iter().rev().collect();

    while let Some(menu) = stack.pop() {
        flat.push(menu);
        stack.extend(menu.children.iter().rev());
    }

    flat
}

/// Returns the first node in pre-order matching `predicate`
pub fn find<'a>(
    menus: &'a [MenuNode],
    predicate: impl Fn(&MenuNode) -> bool,
) -> Option<&'a MenuNode> {
    flatten(menus).into_iter().find(|menu| predicate(menu))
}

/// Returns the first node in pre-order with the given id
pub fn find_by_id<'a>(menus: &'a [MenuNode], id: &str) -> Option<&'a MenuNode> {
    find(menus, |menu| menu.id == id)
}

/// Depth-first search for the chain of nodes from a root to a match
fn chain_to<'a>(
    menus: &'a [MenuNode],
    matches: &impl Fn(&MenuNode) -> bool,
    chain: &mut Vec<&'a MenuNode>,
) -> bool {
    for menu in menus {
        chain.push(menu);
        if matches(menu) || chain_to(&menu.children, matches, chain) {
            return true;
        }
        chain.pop();
    }
    false
}

/// Builds the breadcrumb trail for a route
///
/// Returns the nodes from a root down to and including the first node whose
/// `path` equals `target_path`, or an empty list when no node matches.
pub fn build_breadcrumb<'a>(menus: &'a [MenuNode], target_path: &str) -> Vec<&'a MenuNode> {
    let mut chain = Vec::new();
    chain_to(
        menus,
        &|menu| menu.path.as_deref() == Some(target_path),
        &mut chain,
    );
    chain
}

/// Returns the ids from a root down to the node with `target_id`
pub fn id_path(menus: &[MenuNode], target_id: &str) -> Vec<String> {
    let mut chain = Vec::new();
    chain_to(menus, &|menu| menu.id == target_id, &mut chain);
    chain.into_iter().map(|menu| menu.id.clone()).collect()
}

pub fn compute_stats(menus: &[MenuNode]) -> MenuStats {
    let flat = flatten(menus);
    MenuStats {
        total_nodes: flat.len(),
        root_nodes: menus.len(),
        child_nodes: flat.len() - menus.len(),
        nodes_with_permission: flat.iter().filter(|menu| menu.permission.is_some()).count(),
        max_depth: menus.iter().map(MenuNode::depth).max().unwrap_or(0),
    }
}

/// Values occurring more than once, in order of first occurrence
fn duplicates<'a>(values: impl Iterator<Item = &'a str>) -> Vec<&'a str> {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    let mut order = Vec::new();

    for value in values {
        let count = counts.entry(value).or_insert(0);
        if *count == 0 {
            order.push(value);
        }
        *count += 1;
    }

    order.into_iter().filter(|value| counts[value] > 1).collect()
}

/// Checks a forest for structural problems
///
/// Errors: an id or a non-empty path used by more than one node, one error
/// per offending value. Warnings: one per node whose permission does not look
/// like `resource:action`.
pub fn validate(menus: &[MenuNode]) -> ValidationReport {
    let flat = flatten(menus);

    let mut errors: Vec<String> = duplicates(flat.iter().map(|menu| menu.id.as_str()))
        .into_iter()
        .map(|id| format!("Duplicate menu id: {}", id))
        .collect();

    let paths = flat
        .iter()
        .filter_map(|menu| menu.path.as_deref())
        .filter(|path| !path.is_empty());
    errors.extend(
        duplicates(paths)
            .into_iter()
            .map(|path| format!("Duplicate menu path: {}", path)),
    );

    let warnings = flat
        .iter()
        .filter_map(|menu| {
            let permission = menu.permission.as_deref()?;
            if permission.is_empty() || PERMISSION_FORMAT.is_match(permission) {
                None
            } else {
                Some(format!(
                    "Invalid permission format on menu {}: {}",
                    menu.id, permission
                ))
            }
        })
        .collect();

    ValidationReport {
        errors,
        warnings,
        total_nodes: flat.len(),
    }
}

/// Indexes every node by id; the first node in pre-order wins on duplicates
pub fn menu_map(menus: &[MenuNode]) -> HashMap<&str, &MenuNode> {
    let mut map = HashMap::new();
    for menu in flatten(menus) {
        map.entry(menu.id.as_str()).or_insert(menu);
    }
    map
}

/// Lists the nodes guarded by exactly `permission`, in pre-order
pub fn with_permission<'a>(menus: &'a [MenuNode], permission: &str) -> Vec<&'a MenuNode> {
    flatten(menus)
        .into_iter()
        .filter(|menu| menu.permission.as_deref() == Some(permission))
        .collect()
}

/// Assembles a forest from a flat listing linked by `parent_id`
///
/// Nodes whose parent is absent from the listing become roots. Nodes that can
/// only be reached through a parent cycle are dropped. Children already
/// present on the input nodes are discarded.
pub fn build_tree(flat: Vec<MenuNode>) -> Vec<MenuNode> {
    let index: HashMap<String, usize> = flat
        .iter()
        .enumerate()
        .map(|(i, menu)| (menu.id.clone(), i))
        .collect();

    let mut roots = Vec::new();
    let mut children_of: HashMap<usize, Vec<usize>> = HashMap::new();
    for (i, menu) in flat.iter().enumerate() {
        match menu.parent_id.as_ref().and_then(|parent| index.get(parent)) {
            Some(&parent) if parent != i => children_of.entry(parent).or_default().push(i),
            _ => roots.push(i),
        }
    }

    let mut slots: Vec<Option<MenuNode>> = flat.into_iter().map(Some).collect();

    fn assemble(
        i: usize,
        slots: &mut [Option<MenuNode>],
        children_of: &HashMap<usize, Vec<usize>>,
    ) -> Option<MenuNode> {
        let mut menu = slots[i].take()?;
        let mut children: Vec<MenuNode> = children_of
            .get(&i)
            .into_iter()
            .flatten()
            .filter_map(|&child| assemble(child, slots, children_of))
            .collect();
        sort_siblings(&mut children);
        menu.children = children;
        Some(menu)
    }

    let mut tree: Vec<MenuNode> = roots
        .into_iter()
        .filter_map(|i| assemble(i, &mut slots, &children_of))
        .collect();
    sort_siblings(&mut tree);
    tree
}
