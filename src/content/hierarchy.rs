//! Service parent-chain checks.

use std::collections::HashSet;

/// Whether making `new_parent` the parent of `entity_id` would close a loop.
///
/// Walks from `new_parent` towards the root using `parent_of`. A chain that
/// revisits a node without reaching `entity_id` is already corrupt and is
/// reported as a cycle too.
pub fn creates_cycle<F>(entity_id: &str, new_parent: &str, parent_of: F) -> bool
where
    F: Fn(&str) -> Option<String>,
{
    let mut seen = HashSet::new();
    let mut current = Some(new_parent.to_string());

    while let Some(node) = current {
        if node == entity_id || !seen.insert(node.clone()) {
            return true;
        }
        current = parent_of(&node);
    }

    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn tree(edges: &[(&str, &str)]) -> HashMap<String, String> {
        edges
            .iter()
            .map(|(child, parent)| (child.to_string(), parent.to_string()))
            .collect()
    }

    #[test]
    fn test_self_parent_is_cycle() {
        assert!(creates_cycle("a", "a", |_| None));
    }

    #[test]
    fn test_descendant_parent_is_cycle() {
        // c -> b -> a
        let parents = tree(&[("b", "a"), ("c", "b")]);
        assert!(creates_cycle("a", "c", |id| parents.get(id).cloned()));
        assert!(creates_cycle("a", "b", |id| parents.get(id).cloned()));
    }

    #[test]
    fn test_unrelated_parent_is_fine() {
        let parents = tree(&[("b", "a"), ("d", "c")]);
        assert!(!creates_cycle("b", "d", |id| parents.get(id).cloned()));
        assert!(!creates_cycle("a", "c", |id| parents.get(id).cloned()));
    }

    #[test]
    fn test_existing_loop_is_reported() {
        let parents = tree(&[("x", "y"), ("y", "x")]);
        assert!(creates_cycle("a", "x", |id| parents.get(id).cloned()));
    }
}
