// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Adapter: drive an [`understory_scene_tree::SceneTree`] with a [`Presenter`](crate::Presenter).
//!
//! ## Feature
//!
//! Enable with `scene_tree_adapter` (on by default).
//!
//! ## Notes
//!
//! - [`Hierarchy`] is implemented for `SceneTree` directly. Rejected mutations
//!   (stale handles, busy parents) are logged and drop their [`Completion`].
//! - [`SceneHost`] owns the tree behind a lock and implements [`Platform`]. UI
//!   jobs run either inline on the submitting thread or on a dedicated UI thread.
//! - Lifecycle signals are bridged from the tree's ready/destroyed observers and
//!   fire after the tree lock is released.

use core::fmt;
use core::mem;
use std::sync::{Arc, mpsc};
use std::thread;

use futures::FutureExt;
use futures::channel::oneshot;
use futures::future;
use parking_lot::Mutex;
use tracing::{debug, trace, warn};
use understory_scene_tree::{ControlId, PopoverAnchor, SceneError, SceneTree, ScreenId, StackId};

use crate::error::QueueError;
use crate::platform::{Anchor, Completion, Hierarchy, Lifecycle, Platform, UiJob};
use crate::presenter::{SceneConfig, ScreenFactory};

impl Hierarchy for SceneTree {
    type Screen = ScreenId;
    type Stack = StackId;
    type Control = ControlId;

    fn root(&self) -> Option<ScreenId> {
        Self::root(self)
    }

    fn presented(&self, screen: ScreenId) -> Option<ScreenId> {
        Self::presented(self, screen)
    }

    fn is_being_dismissed(&self, screen: ScreenId) -> bool {
        Self::is_being_dismissed(self, screen)
    }

    fn is_alive(&self, screen: ScreenId) -> bool {
        Self::is_alive(self, screen)
    }

    fn stack_of(&self, screen: ScreenId) -> Option<StackId> {
        Self::stack_of(self, screen)
    }

    fn stack_screens(&self, stack: StackId) -> Option<&[ScreenId]> {
        Self::stack_screens(self, stack)
    }

    fn present(
        &mut self,
        parent: ScreenId,
        child: ScreenId,
        anchor: &Anchor<ControlId>,
        animated: bool,
        done: Completion,
    ) {
        let anchor = match anchor {
            Anchor::None => None,
            Anchor::Source(rect) => Some(PopoverAnchor::Source(*rect)),
            Anchor::Control(control) => Some(PopoverAnchor::Control(*control)),
        };
        if let Err(err) = Self::present(self, parent, child, anchor, animated, move || done.complete())
        {
            warn!(%err, ?parent, ?child, "present rejected");
        }
    }

    fn dismiss(&mut self, parent: ScreenId, animated: bool, done: Completion) {
        if let Err(err) = Self::dismiss(self, parent, animated, move || done.complete()) {
            warn!(%err, ?parent, "dismiss rejected");
        }
    }

    fn push(&mut self, stack: StackId, screen: ScreenId, animated: bool) {
        if let Err(err) = Self::push(self, stack, screen, animated) {
            warn!(%err, ?stack, ?screen, "push rejected");
        }
    }

    fn pop_to(&mut self, stack: StackId, target: ScreenId, animated: bool) {
        match Self::pop_to(self, stack, target, animated) {
            Ok(popped) => trace!(?stack, count = popped.len(), "popped"),
            Err(err) => warn!(%err, ?stack, ?target, "pop rejected"),
        }
    }

    fn show(&mut self, from: ScreenId, screen: ScreenId, hint: Option<&ControlId>) {
        trace!(?from, ?screen, ?hint, "show");
        if let Err(err) = Self::show(self, from, screen) {
            warn!(%err, ?from, ?screen, "show rejected");
        }
    }

    fn show_detail(&mut self, from: ScreenId, screen: ScreenId, hint: Option<&ControlId>) {
        trace!(?from, ?screen, ?hint, "show detail");
        if let Err(err) = Self::show_detail(self, from, screen) {
            warn!(%err, ?from, ?screen, "show detail rejected");
        }
    }
}

enum UiContext {
    Inline,
    Thread(mpsc::Sender<UiJob<SceneTree>>),
}

/// Lifecycle signals raised under the tree lock, fired once it is released.
#[derive(Default)]
struct Signals(Mutex<Vec<oneshot::Sender<()>>>);

impl Signals {
    fn raise(&self, signal: oneshot::Sender<()>) {
        self.0.lock().push(signal);
    }

    fn fire(&self) {
        let raised = mem::take(&mut *self.0.lock());
        for signal in raised {
            // The lifecycle may have been dropped; nothing listens then.
            let _ = signal.send(());
        }
    }
}

struct Shared {
    tree: Mutex<SceneTree>,
    signals: Arc<Signals>,
}

impl Shared {
    fn locked<R>(&self, f: impl FnOnce(&mut SceneTree) -> R) -> R {
        let result = f(&mut self.tree.lock());
        self.signals.fire();
        result
    }
}

/// A [`Platform`] backed by a shared [`SceneTree`].
///
/// Ready and destroyed signals never fire while the tree is locked: they are
/// collected during a UI job (or a [`SceneHost::with_tree`] call) and fired
/// after it, on the same thread. Interaction logic started by readiness and
/// teardown started by destruction may therefore use the host freely.
pub struct SceneHost {
    shared: Arc<Shared>,
    ui: UiContext,
}

impl SceneHost {
    /// Run UI jobs inline, on whichever thread submits them.
    pub fn new(tree: SceneTree) -> Self {
        Self {
            shared: Self::share(tree),
            ui: UiContext::Inline,
        }
    }

    /// Run UI jobs on a dedicated thread named `name`.
    pub fn spawn_ui_thread(tree: SceneTree, name: &str) -> Result<Self, QueueError> {
        let shared = Self::share(tree);
        let (jobs, rx) = mpsc::channel::<UiJob<SceneTree>>();
        let ui = Arc::clone(&shared);
        thread::Builder::new()
            .name(name.to_owned())
            .spawn(move || {
                for job in rx {
                    ui.locked(job);
                }
                debug!("ui thread exiting");
            })
            .map_err(|source| QueueError::Spawn {
                name: name.to_owned(),
                source,
            })?;
        Ok(Self {
            shared,
            ui: UiContext::Thread(jobs),
        })
    }

    fn share(tree: SceneTree) -> Arc<Shared> {
        Arc::new(Shared {
            tree: Mutex::new(tree),
            signals: Arc::default(),
        })
    }

    /// Run `f` with exclusive access to the tree. Lifecycle signals it raises
    /// fire after `f` returns.
    ///
    /// Must not be called from inside a UI job.
    pub fn with_tree<R>(&self, f: impl FnOnce(&mut SceneTree) -> R) -> R {
        self.shared.locked(f)
    }

    /// Shorthand for [`SceneTree::create_screen`].
    pub fn create_screen(&self, label: impl Into<String>) -> ScreenId {
        self.with_tree(|tree| tree.create_screen(label))
    }
}

impl Platform for SceneHost {
    type Hierarchy = SceneTree;

    fn run_on_ui(&self, job: UiJob<SceneTree>) {
        match &self.ui {
            UiContext::Inline => self.shared.locked(job),
            UiContext::Thread(jobs) => {
                if jobs.send(job).is_err() {
                    warn!("ui thread is gone; job dropped");
                }
            }
        }
    }

    fn lifecycle(&self, screen: ScreenId) -> Lifecycle {
        let (ready_tx, ready_rx) = oneshot::channel::<()>();
        let (gone_tx, gone_rx) = oneshot::channel::<()>();
        let on_ready = Arc::clone(&self.shared.signals);
        let on_gone = Arc::clone(&self.shared.signals);
        self.with_tree(|tree| {
            tree.observe_ready(screen, move || on_ready.raise(ready_tx));
            tree.observe_destroyed(screen, move || on_gone.raise(gone_tx));
        });
        Lifecycle {
            // A screen released before loading never becomes ready.
            ready: ready_rx
                .then(|r| match r {
                    Ok(()) => future::ready(()).left_future(),
                    Err(oneshot::Canceled) => future::pending().right_future(),
                })
                .boxed(),
            destroyed: gone_rx.map(|_| ()).boxed(),
        }
    }
}

impl ScreenFactory<ScreenId> for SceneHost {
    type Error = SceneError;

    fn produce(&self, config: &SceneConfig) -> Result<ScreenId, SceneError> {
        self.with_tree(|tree| {
            tree.instantiate(config.bundle.as_deref(), &config.name, &config.identifier)
        })
    }
}

impl fmt::Debug for SceneHost {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let ui = match self.ui {
            UiContext::Inline => "inline",
            UiContext::Thread(_) => "thread",
        };
        f.debug_struct("SceneHost")
            .field("tree", &*self.shared.tree.lock())
            .field("ui", &ui)
            .finish()
    }
}
