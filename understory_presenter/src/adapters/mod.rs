// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Adapters to drive concrete hierarchies.
//!
//! Enabled via feature flags; the core only depends on the [`Hierarchy`](crate::Hierarchy)
//! and [`Platform`](crate::Platform) traits.

#[cfg(feature = "scene_tree_adapter")]
pub mod scene_tree;
