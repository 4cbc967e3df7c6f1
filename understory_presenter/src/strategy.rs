// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Presentation strategies and the coordinator record that drives them.
//!
//! A [`Coordinator`] pairs a screen with the [`Presentation`] that attaches it.
//! Attach and detach are both submitted to the [`Serializer`] and perform their
//! hierarchy reads and writes inside a single UI job, so decisions such as
//! "which screen is on top" or "where is this screen in its stack" are always
//! made against the hierarchy as it is at mutation time.
//!
//! Detach tolerates a hierarchy that has moved on: a screen already dismissed,
//! popped by a back gesture, or whose stack has been released is left alone.

use core::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;
use tracing::{debug, trace};

use crate::platform::{Anchor, Completion, Hierarchy, Platform, confirmation};
use crate::queue::Serializer;
use crate::resolver::top_screen;

/// How a screen is attached to, and detached from, the hierarchy.
pub enum Presentation<H: Hierarchy> {
    /// Presented over the frontmost screen, resolved at attach time.
    Modal {
        /// Popover anchor.
        anchor: Anchor<H::Control>,
    },
    /// Pushed onto a stack.
    Push {
        /// Target stack.
        stack: H::Stack,
    },
    /// Shown adaptively from a screen.
    Show {
        /// Screen the navigation originates from.
        from: H::Screen,
        /// Routing hint for the platform.
        hint: Option<H::Control>,
    },
    /// Shown adaptively as a detail of a screen.
    ShowDetail {
        /// Screen the navigation originates from.
        from: H::Screen,
        /// Routing hint for the platform.
        hint: Option<H::Control>,
    },
}

impl<H: Hierarchy> Presentation<H> {
    /// Short name for diagnostics.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Modal { .. } => "modal",
            Self::Push { .. } => "push",
            Self::Show { .. } => "show",
            Self::ShowDetail { .. } => "show-detail",
        }
    }
}

impl<H: Hierarchy> fmt::Debug for Presentation<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Modal { anchor } => f.debug_struct("Modal").field("anchor", anchor).finish(),
            Self::Push { stack } => f.debug_struct("Push").field("stack", stack).finish(),
            Self::Show { from, hint } => f
                .debug_struct("Show")
                .field("from", from)
                .field("hint", hint)
                .finish(),
            Self::ShowDetail { from, hint } => f
                .debug_struct("ShowDetail")
                .field("from", from)
                .field("hint", hint)
                .finish(),
        }
    }
}

/// Per-presentation state shared by the attach job, the detach job, and the
/// teardown of the screen's action stream.
pub struct Coordinator<H: Hierarchy> {
    screen: H::Screen,
    presentation: Presentation<H>,
    animated: bool,
    // Written on the UI context by a modal attach.
    parent: Mutex<Option<H::Screen>>,
    detached: AtomicBool,
}

impl<H: Hierarchy> Coordinator<H> {
    /// Create the record for `screen`.
    pub fn new(screen: H::Screen, presentation: Presentation<H>, animated: bool) -> Arc<Self> {
        Arc::new(Self {
            screen,
            presentation,
            animated,
            parent: Mutex::new(None),
            detached: AtomicBool::new(false),
        })
    }

    /// The coordinated screen.
    pub fn screen(&self) -> H::Screen {
        self.screen
    }

    /// The strategy.
    pub fn presentation(&self) -> &Presentation<H> {
        &self.presentation
    }

    /// Modal parent resolved at attach time, once the attach job has run.
    pub fn parent(&self) -> Option<H::Screen> {
        *self.parent.lock()
    }

    /// Returns true once detach has been requested.
    pub fn is_detached(&self) -> bool {
        self.detached.load(Ordering::Acquire)
    }

    /// Submit the attach job.
    pub fn attach<P>(self: &Arc<Self>, platform: &Arc<P>, queue: &dyn Serializer)
    where
        P: Platform<Hierarchy = H>,
    {
        debug!(screen = ?self.screen, kind = self.presentation.kind(), "attach requested");
        let this = Arc::clone(self);
        submit_ui(platform, queue, move |h, done| this.attach_on_ui(h, done));
    }

    /// Submit the detach job. Only the first call does anything; returns whether
    /// this call was it.
    pub fn detach<P>(self: &Arc<Self>, platform: &Arc<P>, queue: &dyn Serializer) -> bool
    where
        P: Platform<Hierarchy = H>,
    {
        if self.detached.swap(true, Ordering::AcqRel) {
            trace!(screen = ?self.screen, "detach already requested");
            return false;
        }
        debug!(screen = ?self.screen, kind = self.presentation.kind(), "detach requested");
        let this = Arc::clone(self);
        submit_ui(platform, queue, move |h, done| this.detach_on_ui(h, done));
        true
    }

    fn attach_on_ui(&self, h: &mut H, done: Completion) {
        if !h.is_alive(self.screen) {
            trace!(screen = ?self.screen, "screen released before attach");
            done.complete();
            return;
        }
        match &self.presentation {
            Presentation::Modal { anchor } => {
                let parent = top_screen(&*h);
                *self.parent.lock() = Some(parent);
                debug!(?parent, screen = ?self.screen, "presenting modally");
                h.present(parent, self.screen, anchor, self.animated, done);
            }
            Presentation::Push { stack } => {
                h.push(*stack, self.screen, self.animated);
                done.complete();
            }
            Presentation::Show { from, hint } => {
                if h.is_alive(*from) {
                    h.show(*from, self.screen, hint.as_ref());
                } else {
                    trace!(from = ?from, "show origin released before attach");
                }
                done.complete();
            }
            Presentation::ShowDetail { from, hint } => {
                if h.is_alive(*from) {
                    h.show_detail(*from, self.screen, hint.as_ref());
                } else {
                    trace!(from = ?from, "show-detail origin released before attach");
                }
                done.complete();
            }
        }
    }

    fn detach_on_ui(&self, h: &mut H, done: Completion) {
        match &self.presentation {
            Presentation::Modal { .. } => match self.parent() {
                Some(parent)
                    if h.is_alive(parent)
                        && h.is_alive(self.screen)
                        && h.presented(parent) == Some(self.screen)
                        && !h.is_being_dismissed(self.screen) =>
                {
                    debug!(?parent, screen = ?self.screen, "dismissing");
                    h.dismiss(parent, self.animated, done);
                }
                parent => {
                    trace!(?parent, screen = ?self.screen, "modal already torn down");
                    done.complete();
                }
            },
            Presentation::Push { stack } => {
                pop_back_to_previous(h, Some(*stack), self.screen, self.animated);
                done.complete();
            }
            Presentation::Show { .. } | Presentation::ShowDetail { .. } => {
                let stack = h.stack_of(self.screen);
                pop_back_to_previous(h, stack, self.screen, true);
                done.complete();
            }
        }
    }
}

impl<H: Hierarchy> fmt::Debug for Coordinator<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Coordinator")
            .field("screen", &self.screen)
            .field("presentation", &self.presentation)
            .field("animated", &self.animated)
            .field("parent", &self.parent())
            .field("detached", &self.is_detached())
            .finish()
    }
}

/// Pop `stack` back to the screen just below `screen`, resolving its index now.
/// Returns whether anything was popped.
fn pop_back_to_previous<H: Hierarchy>(
    h: &mut H,
    stack: Option<H::Stack>,
    screen: H::Screen,
    animated: bool,
) -> bool {
    let Some(stack) = stack else {
        trace!(?screen, "no owning stack; nothing to pop");
        return false;
    };
    let previous = h.stack_screens(stack).and_then(|screens| {
        match screens.iter().position(|s| *s == screen) {
            Some(idx) if idx > 0 => Some(screens[idx - 1]),
            _ => None,
        }
    });
    match previous {
        Some(previous) => {
            debug!(?stack, ?screen, ?previous, "popping back");
            h.pop_to(stack, previous, animated);
            true
        }
        None => {
            trace!(?stack, ?screen, "screen no longer poppable");
            false
        }
    }
}

/// Submit a job that runs `f` on the UI context and confirms through the
/// [`Completion`] it is handed.
fn submit_ui<P, F>(platform: &Arc<P>, queue: &dyn Serializer, f: F)
where
    P: Platform,
    F: FnOnce(&mut P::Hierarchy, Completion) + Send + 'static,
{
    let platform = Arc::clone(platform);
    queue.submit(Box::new(move || {
        let (done, confirmation) = confirmation();
        platform.run_on_ui(Box::new(move |h: &mut P::Hierarchy| f(h, done)));
        confirmation
    }));
}

#[cfg(all(test, feature = "scene_tree_adapter"))]
mod tests {
    use super::*;
    use crate::adapters::scene_tree::SceneHost;
    use crate::queue::{InlineQueue, WorkerConfig, WorkerQueue};
    use futures::executor::block_on;
    use proptest::prelude::*;
    use understory_scene_tree::{
        ControlId, SceneEvent, SceneTree, ScreenId, StackId, Transitions,
    };

    fn host_with_root() -> (Arc<SceneHost>, ScreenId) {
        let mut tree = SceneTree::new();
        let root = tree.create_screen("root");
        tree.set_root(root).unwrap();
        (Arc::new(SceneHost::new(tree)), root)
    }

    fn host_with_stack(depth: usize) -> (Arc<SceneHost>, StackId, Vec<ScreenId>) {
        let mut tree = SceneTree::new();
        let bottom = tree.create_screen("s0");
        let stack = tree.create_stack(bottom).unwrap();
        let mut screens = vec![bottom];
        for i in 1..depth {
            let s = tree.create_screen(format!("s{i}"));
            tree.push(stack, s, false).unwrap();
            screens.push(s);
        }
        tree.take_journal();
        (Arc::new(SceneHost::new(tree)), stack, screens)
    }

    #[test]
    fn modal_attach_records_resolved_parent() {
        let (host, root) = host_with_root();
        let sheet = host.create_screen("sheet");
        let record = Coordinator::new(
            sheet,
            Presentation::Modal {
                anchor: Anchor::Control(ControlId(3)),
            },
            true,
        );
        record.attach(&host, &InlineQueue);
        assert_eq!(record.parent(), Some(root));
        host.with_tree(|t| {
            assert_eq!(t.presented(root), Some(sheet));
            assert_eq!(
                t.popover_anchor(sheet),
                Some(understory_scene_tree::PopoverAnchor::Control(ControlId(3)))
            );
        });

        assert!(record.detach(&host, &InlineQueue));
        assert!(!record.detach(&host, &InlineQueue), "second detach is a no-op");
        host.with_tree(|t| {
            assert!(!t.is_alive(sheet));
            let dismissals = t
                .journal()
                .iter()
                .filter(|e| matches!(e, SceneEvent::Dismissed { .. }))
                .count();
            assert_eq!(dismissals, 1);
        });
    }

    #[test]
    fn modal_detach_after_user_dismissal_is_a_noop() {
        let (host, root) = host_with_root();
        let sheet = host.create_screen("sheet");
        let record = Coordinator::new(sheet, Presentation::Modal { anchor: Anchor::None }, false);
        record.attach(&host, &InlineQueue);

        // Dismissed outside of the coordinator, then another sheet takes its place.
        let other = host.with_tree(|t| {
            t.dismiss(root, false, || {}).unwrap();
            let other = t.create_screen("other");
            t.present(root, other, None, false, || {}).unwrap();
            t.take_journal();
            other
        });

        record.detach(&host, &InlineQueue);
        host.with_tree(|t| {
            assert_eq!(t.presented(root), Some(other), "unrelated sheet stays");
            assert!(t.journal().is_empty());
        });
    }

    #[test]
    fn modal_detach_while_being_dismissed_is_a_noop() {
        let mut tree = SceneTree::with_transitions(Transitions::Deferred);
        let root = tree.create_screen("root");
        tree.set_root(root).unwrap();
        let host = Arc::new(SceneHost::new(tree));
        let sheet = host.create_screen("sheet");
        let record = Coordinator::new(sheet, Presentation::Modal { anchor: Anchor::None }, false);
        record.attach(&host, &InlineQueue);

        host.with_tree(|t| {
            t.dismiss(root, true, || {}).unwrap();
            t.take_journal();
        });
        record.detach(&host, &InlineQueue);
        host.with_tree(|t| {
            assert!(t.journal().is_empty());
            assert_eq!(t.finish_transitions(), 1);
            assert!(!t.is_alive(sheet));
        });
    }

    #[test]
    fn push_detach_pops_back_to_previous() {
        let (host, stack, screens) = host_with_stack(2);
        let pushed = host.create_screen("pushed");
        let record = Coordinator::new(pushed, Presentation::Push { stack }, true);
        record.attach(&host, &InlineQueue);
        host.with_tree(|t| {
            assert_eq!(t.stack_screens(stack).map(<[_]>::len), Some(3));
        });
        record.detach(&host, &InlineQueue);
        host.with_tree(|t| assert_eq!(t.stack_screens(stack), Some(&screens[..])));
    }

    #[test]
    fn push_detach_tolerates_back_gesture_and_released_stack() {
        let (host, stack, screens) = host_with_stack(1);
        let pushed = host.create_screen("pushed");
        let record = Coordinator::new(pushed, Presentation::Push { stack }, true);
        record.attach(&host, &InlineQueue);
        host.with_tree(|t| assert_eq!(t.pop(stack, true), Some(pushed)));
        record.detach(&host, &InlineQueue);
        host.with_tree(|t| assert_eq!(t.stack_screens(stack), Some(&screens[..])));

        let again = host.create_screen("again");
        let record = Coordinator::new(again, Presentation::Push { stack }, false);
        record.attach(&host, &InlineQueue);
        host.with_tree(|t| t.release_stack(stack));
        record.detach(&host, &InlineQueue);
        host.with_tree(|t| assert!(!t.stack_is_alive(stack)));
    }

    #[test]
    fn push_detach_pops_screens_pushed_above() {
        let (host, stack, screens) = host_with_stack(1);
        let pushed = host.create_screen("pushed");
        let record = Coordinator::new(pushed, Presentation::Push { stack }, false);
        record.attach(&host, &InlineQueue);
        let above = host.with_tree(|t| {
            let above = t.create_screen("above");
            t.push(stack, above, false).unwrap();
            above
        });
        record.detach(&host, &InlineQueue);
        host.with_tree(|t| {
            assert_eq!(t.stack_screens(stack), Some(&screens[..]));
            assert!(!t.is_alive(above));
        });
    }

    #[test]
    fn show_detach_uses_owning_stack_at_detach_time() {
        let (host, stack, screens) = host_with_stack(1);
        let shown = host.create_screen("shown");
        let record = Coordinator::new(
            shown,
            Presentation::Show {
                from: screens[0],
                hint: None,
            },
            true,
        );
        record.attach(&host, &InlineQueue);
        host.with_tree(|t| assert_eq!(t.stack_of(shown), Some(stack)));
        record.detach(&host, &InlineQueue);
        host.with_tree(|t| assert_eq!(t.stack_screens(stack), Some(&screens[..])));
    }

    #[test]
    fn show_detail_at_stack_bottom_is_not_popped() {
        let (host, stack, screens) = host_with_stack(1);
        let detail = host.create_screen("detail");
        let record = Coordinator::new(
            detail,
            Presentation::ShowDetail {
                from: screens[0],
                hint: Some(ControlId(1)),
            },
            true,
        );
        record.attach(&host, &InlineQueue);
        record.detach(&host, &InlineQueue);
        host.with_tree(|t| {
            let detail_stack = t.detail_stack(stack).unwrap();
            assert_eq!(t.stack_screens(detail_stack), Some(&[detail][..]));
        });
    }

    #[test]
    fn attach_of_released_screen_does_nothing() {
        let (host, stack, screens) = host_with_stack(1);
        let gone = host.create_screen("gone");
        host.with_tree(|t| t.release(gone));
        let record = Coordinator::new(gone, Presentation::Push { stack }, false);
        record.attach(&host, &InlineQueue);
        host.with_tree(|t| assert_eq!(t.stack_screens(stack), Some(&screens[..])));
    }

    #[test]
    fn concurrent_modals_are_ordered() {
        let mut tree = SceneTree::with_transitions(Transitions::Deferred);
        let root = tree.create_screen("root");
        tree.set_root(root).unwrap();
        let host = Arc::new(SceneHost::new(tree));
        let queue = WorkerQueue::spawn(WorkerConfig::default()).unwrap();

        let x = host.create_screen("x");
        let y = host.create_screen("y");
        let rx = Coordinator::new(x, Presentation::Modal { anchor: Anchor::None }, true);
        let ry = Coordinator::new(y, Presentation::Modal { anchor: Anchor::None }, true);
        rx.attach(&host, &queue);
        ry.attach(&host, &queue);

        // X's transition is in flight; Y must not resolve its parent yet.
        crate::testing::wait_until(|| host.with_tree(|t| t.in_flight() == 1));
        assert_eq!(ry.parent(), None);
        host.with_tree(|t| t.finish_transitions());

        crate::testing::wait_until(|| host.with_tree(|t| t.in_flight() == 1));
        host.with_tree(|t| t.finish_transitions());
        block_on(queue.barrier());

        assert_eq!(rx.parent(), Some(root));
        assert_eq!(ry.parent(), Some(x));
        host.with_tree(|t| assert_eq!(t.presented(x), Some(y)));
    }

    proptest! {
        #[test]
        fn push_then_detach_restores_stack(depth in 1_usize..6, pushes in 1_usize..6) {
            let (host, stack, screens) = host_with_stack(depth);
            let records: Vec<_> = (0..pushes)
                .map(|i| {
                    let s = host.create_screen(format!("p{i}"));
                    let r = Coordinator::new(s, Presentation::Push { stack }, false);
                    r.attach(&host, &InlineQueue);
                    r
                })
                .collect();
            prop_assert_eq!(
                host.with_tree(|t| t.stack_screens(stack).map(<[_]>::len)),
                Some(depth + pushes)
            );
            for r in records.iter().rev() {
                r.detach(&host, &InlineQueue);
            }
            prop_assert_eq!(
                host.with_tree(|t| t.stack_screens(stack).map(<[_]>::to_vec)),
                Some(screens)
            );
        }

        #[test]
        fn modal_chain_depth_is_restored(count in 1_usize..5) {
            let (host, root) = host_with_root();
            let records: Vec<_> = (0..count)
                .map(|i| {
                    let s = host.create_screen(format!("m{i}"));
                    let r = Coordinator::new(s, Presentation::Modal { anchor: Anchor::None }, false);
                    r.attach(&host, &InlineQueue);
                    r
                })
                .collect();
            prop_assert_eq!(
                host.with_tree(|t| crate::resolver::presentation_chain(&*t).len()),
                count + 1
            );
            for r in records.iter().rev() {
                r.detach(&host, &InlineQueue);
            }
            prop_assert_eq!(host.with_tree(|t| crate::resolver::presentation_chain(&*t)), vec![root]);
        }
    }
}
