// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Understory Scene Tree: a generational registry of screens, stacks, and modal presentations.
//!
//! Understory Scene Tree is an in-memory model of a navigation hierarchy for UIs.
//!
//! - Tracks screens through generational handles that never alias once released.
//! - Keeps ordered screen stacks (only the last element is interactive) and a modal presentation chain
//!   rooted at a single root screen.
//! - Notifies lifecycle observers when a screen becomes ready (loaded) and when it is released.
//! - Models transition timing: animated presentations and dismissals can stay in flight until
//!   [`SceneTree::finish_transitions`], so callers can observe "mid-dismissal" states.
//! - Records every hierarchy mutation in a journal drained with [`SceneTree::take_journal`].
//!
//! ## Where this fits
//!
//! Coordinators that bind screen lifetimes to event streams only need a handful of platform primitives:
//! present, dismiss, push, pop, show, and show-detail, plus readiness and destruction signals.
//! This crate provides those primitives without a platform, which makes it the reference
//! hierarchy for tests, demos, and headless runs.
//!
//! ## Ownership
//!
//! The tree owns every screen. Whatever displays a screen (a stack, or the screen presenting it)
//! keeps it alive; once a screen is popped, dismissed, or explicitly [released](SceneTree::release),
//! its slot is freed and its `ScreenId` becomes stale.
//!
//! ## API overview
//!
//! - [`SceneTree`]: container managing screens, stacks, the presentation chain, and transitions.
//! - [`ScreenId`] / [`StackId`]: generational handles.
//! - [`ScreenFlags`]: loaded, being presented, being dismissed.
//! - [`PopoverAnchor`]: source region or control a popover hangs from.
//! - [`SceneCatalog`] / [`SceneDefinition`]: named definitions screens are instantiated from.
//! - [`SceneEvent`]: journal entries.
//!
//! ### Minimal usage
//!
//! ```
//! use understory_scene_tree::{SceneTree, Transitions};
//!
//! let mut tree = SceneTree::with_transitions(Transitions::Deferred);
//! let root = tree.create_screen("root");
//! tree.set_root(root).unwrap();
//!
//! let sheet = tree.create_screen("sheet");
//! tree.present(root, sheet, None, true, || {}).unwrap();
//! assert_eq!(tree.presented(root), Some(sheet));
//!
//! tree.dismiss(root, true, || {}).unwrap();
//! assert!(tree.is_being_dismissed(sheet));
//!
//! tree.finish_transitions();
//! assert!(!tree.is_alive(sheet));
//! ```
//!
//! ### Stacks
//!
//! ```
//! use understory_scene_tree::SceneTree;
//!
//! let mut tree = SceneTree::new();
//! let list = tree.create_screen("list");
//! let stack = tree.create_stack(list).unwrap();
//!
//! let detail = tree.create_screen("detail");
//! tree.push(stack, detail, true).unwrap();
//! assert_eq!(tree.stack_screens(stack), Some(&[list, detail][..]));
//!
//! // A back gesture pops and releases the top screen.
//! assert_eq!(tree.pop(stack, true), Some(detail));
//! assert!(!tree.is_alive(detail));
//! ```
//!
//! This crate is `no_std` and uses `alloc`.

#![no_std]

extern crate alloc;

mod catalog;
mod slots;
mod tree;
mod types;

pub use catalog::{SceneCatalog, SceneDefinition};
pub use tree::SceneTree;
pub use types::{
    ControlId, PopoverAnchor, SceneError, SceneEvent, ScreenFlags, ScreenId, StackId, Transitions,
};
