// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Understory Presenter: bind a screen's presentation lifetime to the action stream its
//! interaction logic produces.
//!
//! A screen is attached to a hierarchy (presented modally, pushed onto a stack, or
//! shown), its interaction logic runs once the screen is ready, and the screen is
//! detached exactly once when that logic finishes: on completion, on error, when every
//! subscriber goes away, or when the user removes the screen first.
//!
//! An action stream is live from the moment it is returned. Interaction logic starts
//! when the screen becomes ready and destruction ends the stream, whether or not
//! anyone is polling it; actions wait in the stream until they are read.
//!
//! ## Pieces
//!
//! - [`Presenter`]: entry operations [`wrap`](Presenter::wrap),
//!   [`present_modal`](Presenter::present_modal), [`push`](Presenter::push),
//!   [`show`](Presenter::show), and [`show_detail`](Presenter::show_detail).
//! - [`Presentation`] / [`Coordinator`]: the attach and detach strategy of each kind of
//!   presentation, and the per-presentation record they share.
//! - [`Serializer`]: total order over hierarchy mutations. [`WorkerQueue`] is a dedicated
//!   thread; [`InlineQueue`] runs jobs synchronously for tests.
//! - [`top_screen`]: the frontmost screen of the modal presentation chain.
//! - [`ActionStream`]: multicast stream gated on readiness, with idempotent teardown.
//! - [`DisposeBag`]: release actions scoped to an action stream.
//! - [`Hierarchy`] / [`Platform`]: the boundary a UI framework implements.
//!
//! ## Ordering
//!
//! Every mutation is a job on the [`Serializer`]. A job hops to the platform's UI context,
//! performs its reads and writes there, and the serializer does not start the next job
//! until the platform confirms the mutation (for animated transitions, when the
//! transition finishes). Two modal presentations requested back to back therefore stack:
//! the second resolves the first as its parent.
//!
//! ## Example
//!
//! ```
//! # #[cfg(feature = "scene_tree_adapter")]
//! # {
//! use std::sync::Arc;
//!
//! use futures::executor::block_on;
//! use futures::{StreamExt, stream};
//! use understory_presenter::adapters::scene_tree::SceneHost;
//! use understory_presenter::{ActionError, Anchor, DisposeBag, InlineQueue, Presenter};
//! use understory_scene_tree::SceneTree;
//!
//! let mut tree = SceneTree::new();
//! let root = tree.create_screen("root");
//! tree.set_root(root).unwrap();
//! let host = Arc::new(SceneHost::new(tree));
//! let presenter = Presenter::new(host.clone(), Arc::new(InlineQueue));
//!
//! let editor = host.create_screen("editor");
//! let actions = presenter.present_modal(
//!     || editor,
//!     true,
//!     Anchor::None,
//!     |_bag: &DisposeBag, _screen| stream::iter(vec![Ok::<_, ActionError>("Saved")]),
//! );
//!
//! let seen: Vec<_> = block_on(actions.map(Result::unwrap).collect());
//! assert_eq!(seen, vec!["Saved"]);
//!
//! // The editor was dismissed once its interaction logic completed.
//! host.with_tree(|t| assert_eq!(t.presented(root), None));
//! # }
//! ```
//!
//! ## Features
//!
//! - `scene_tree_adapter` (default): [`Hierarchy`] for `understory_scene_tree::SceneTree`
//!   and the [`SceneHost`](adapters::scene_tree::SceneHost) platform.

mod action;
pub mod adapters;
mod dispose;
mod error;
mod multicast;
mod platform;
mod presenter;
mod queue;
mod resolver;
mod strategy;

#[cfg(test)]
mod testing;

pub use action::{ActionStream, Teardown, Termination, WrapperState, wrap_action};
pub use dispose::DisposeBag;
pub use error::{ActionError, QueueError};
pub use multicast::Multicast;
pub use platform::{
    Anchor, Completion, Confirmation, Confirmed, ControlOf, Hierarchy, Lifecycle, Platform,
    ScreenOf, StackOf, UiJob, confirmation,
};
pub use presenter::{Presenter, SceneConfig, ScreenFactory};
pub use queue::{InlineQueue, Job, Serializer, WorkerConfig, WorkerQueue, spawn_worker};
pub use resolver::{presentation_chain, top_screen, try_top_screen};
pub use strategy::{Coordinator, Presentation};
