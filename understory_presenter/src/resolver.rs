// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Top-screen resolution over the presentation chain.

use crate::platform::Hierarchy;

/// Frontmost screen: walk presented children from the root, stopping at a
/// screen that presents nothing or whose presented child is being dismissed.
///
/// Returns `None` when no root is installed.
pub fn try_top_screen<H: Hierarchy + ?Sized>(hierarchy: &H) -> Option<H::Screen> {
    let mut top = hierarchy.root()?;
    while let Some(child) = hierarchy.presented(top)
        && !hierarchy.is_being_dismissed(child)
    {
        top = child;
    }
    Some(top)
}

/// Frontmost screen of `hierarchy`.
///
/// # Panics
///
/// Panics if no root screen is installed. Presenting without a root is a
/// programming error in the host application.
pub fn top_screen<H: Hierarchy + ?Sized>(hierarchy: &H) -> H::Screen {
    match try_top_screen(hierarchy) {
        Some(top) => top,
        None => panic!("no root screen installed; cannot resolve the top screen"),
    }
}

/// Screens from the root to the frontmost screen, inclusive.
pub fn presentation_chain<H: Hierarchy + ?Sized>(hierarchy: &H) -> Vec<H::Screen> {
    let mut chain = Vec::new();
    let Some(mut top) = hierarchy.root() else {
        return chain;
    };
    chain.push(top);
    while let Some(child) = hierarchy.presented(top)
        && !hierarchy.is_being_dismissed(child)
    {
        chain.push(child);
        top = child;
    }
    chain
}

#[cfg(all(test, feature = "scene_tree_adapter"))]
mod tests {
    use super::*;
    use understory_scene_tree::{SceneTree, Transitions};

    #[test]
    fn root_alone_is_topmost() {
        let mut tree = SceneTree::new();
        let root = tree.create_screen("root");
        tree.set_root(root).unwrap();
        assert_eq!(top_screen(&tree), root);
        assert_eq!(presentation_chain(&tree), vec![root]);
    }

    #[test]
    fn follows_presented_children() {
        let mut tree = SceneTree::new();
        let root = tree.create_screen("root");
        tree.set_root(root).unwrap();
        let a = tree.create_screen("a");
        let b = tree.create_screen("b");
        tree.present(root, a, None, false, || {}).unwrap();
        tree.present(a, b, None, false, || {}).unwrap();
        assert_eq!(top_screen(&tree), b);
        assert_eq!(presentation_chain(&tree), vec![root, a, b]);
    }

    #[test]
    fn child_being_dismissed_is_skipped() {
        let mut tree = SceneTree::with_transitions(Transitions::Deferred);
        let root = tree.create_screen("root");
        tree.set_root(root).unwrap();
        let a = tree.create_screen("a");
        tree.present(root, a, None, false, || {}).unwrap();
        tree.dismiss(root, true, || {}).unwrap();
        assert!(tree.is_being_dismissed(a));
        assert_eq!(top_screen(&tree), root);
        assert_eq!(presentation_chain(&tree), vec![root]);
    }

    #[test]
    fn missing_root_is_none() {
        let tree = SceneTree::new();
        assert_eq!(try_top_screen(&tree), None);
        assert!(presentation_chain(&tree).is_empty());
    }

    #[test]
    #[should_panic(expected = "no root screen installed")]
    fn missing_root_is_fatal() {
        let tree = SceneTree::new();
        let _ = top_screen(&tree);
    }
}
