// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Platform boundary: the screen hierarchy the presenter mutates, the UI
//! context those mutations run on, and the lifecycle signals it reads.

use core::fmt;
use core::pin::Pin;
use core::task::{Context, Poll};

use futures::FutureExt;
use futures::channel::oneshot;
use futures::future::BoxFuture;
use kurbo::{Point, Rect};

/// A screen hierarchy: a root screen, a chain of modal presentations, and stacks.
///
/// Handles are non-owning. Implementations must treat stale handles gracefully:
/// reads return `None`/`false`, mutations do nothing (and drop their [`Completion`]).
///
/// Every method is only called on the UI context (see [`Platform::run_on_ui`]).
pub trait Hierarchy: 'static {
    /// Handle to a screen.
    type Screen: Copy + Eq + fmt::Debug + Send + Sync + 'static;
    /// Handle to a screen stack.
    type Stack: Copy + Eq + fmt::Debug + Send + Sync + 'static;
    /// Key of a control a popover can be anchored to.
    type Control: Clone + fmt::Debug + Send + Sync + 'static;

    /// The root screen, if one is installed.
    fn root(&self) -> Option<Self::Screen>;
    /// Screen modally presented by `screen`, if any.
    fn presented(&self, screen: Self::Screen) -> Option<Self::Screen>;
    /// Returns true while a dismissal of `screen` is in progress.
    fn is_being_dismissed(&self, screen: Self::Screen) -> bool;
    /// Returns true if `screen` still refers to a live screen.
    fn is_alive(&self, screen: Self::Screen) -> bool;
    /// Stack currently owning `screen`.
    fn stack_of(&self, screen: Self::Screen) -> Option<Self::Stack>;
    /// Screens of `stack`, bottom first, or `None` if the stack is gone.
    fn stack_screens(&self, stack: Self::Stack) -> Option<&[Self::Screen]>;

    /// Present `child` over `parent`; fire `done` when the transition completes.
    fn present(
        &mut self,
        parent: Self::Screen,
        child: Self::Screen,
        anchor: &Anchor<Self::Control>,
        animated: bool,
        done: Completion,
    );
    /// Dismiss whatever `parent` presents; fire `done` when the transition completes.
    fn dismiss(&mut self, parent: Self::Screen, animated: bool, done: Completion);
    /// Append `screen` to `stack`.
    fn push(&mut self, stack: Self::Stack, screen: Self::Screen, animated: bool);
    /// Pop every screen above `target` in `stack`.
    fn pop_to(&mut self, stack: Self::Stack, target: Self::Screen, animated: bool);
    /// Adaptive "show" from `from`; may push or present.
    fn show(&mut self, from: Self::Screen, screen: Self::Screen, hint: Option<&Self::Control>);
    /// Adaptive "show detail" from `from`; may replace a detail stack or present.
    fn show_detail(
        &mut self,
        from: Self::Screen,
        screen: Self::Screen,
        hint: Option<&Self::Control>,
    );
}

/// A job executed on the UI context with exclusive access to the hierarchy.
pub type UiJob<H> = Box<dyn FnOnce(&mut H) + Send>;

/// The platform a [`Presenter`](crate::Presenter) drives.
pub trait Platform: Send + Sync + 'static {
    /// Hierarchy mutated on the UI context.
    type Hierarchy: Hierarchy;

    /// Run `job` on the UI context. May run it before returning.
    fn run_on_ui(&self, job: UiJob<Self::Hierarchy>);

    /// Readiness and destruction signals for `screen`.
    fn lifecycle(&self, screen: <Self::Hierarchy as Hierarchy>::Screen) -> Lifecycle;
}

/// Screen handle type of a platform.
pub type ScreenOf<P> = <<P as Platform>::Hierarchy as Hierarchy>::Screen;
/// Stack handle type of a platform.
pub type StackOf<P> = <<P as Platform>::Hierarchy as Hierarchy>::Stack;
/// Control key type of a platform.
pub type ControlOf<P> = <<P as Platform>::Hierarchy as Hierarchy>::Control;

/// Lifecycle signals of one screen.
pub struct Lifecycle {
    /// Resolves once the screen's content is loaded, immediately if it already is.
    /// Never resolves for a screen that never becomes ready.
    pub ready: BoxFuture<'static, ()>,
    /// Resolves once the screen is destroyed.
    pub destroyed: BoxFuture<'static, ()>,
}

impl Lifecycle {
    /// Signals for a screen that is already ready.
    pub fn ready_now(destroyed: BoxFuture<'static, ()>) -> Self {
        Self {
            ready: futures::future::ready(()).boxed(),
            destroyed,
        }
    }
}

impl fmt::Debug for Lifecycle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Lifecycle").finish_non_exhaustive()
    }
}

/// Where a popover-style modal presentation is anchored.
#[derive(Clone, Debug, Default, PartialEq)]
pub enum Anchor<C> {
    /// No anchor; the platform picks a full-screen or sheet style.
    #[default]
    None,
    /// A source region in window space.
    Source(Rect),
    /// A control (toolbar item, button).
    Control(C),
}

impl<C> Anchor<C> {
    /// Anchor at a single point.
    pub fn at(pt: Point) -> Self {
        Self::Source(Rect::from_points(pt, pt))
    }
}

/// Create a linked completion/confirmation pair.
pub fn confirmation() -> (Completion, Confirmation) {
    let (tx, rx) = oneshot::channel();
    (Completion(tx), Confirmation(rx))
}

/// Fired by the UI context when a hierarchy mutation has taken effect.
///
/// Dropping a `Completion` without firing it also releases the waiting side,
/// reported as [`Confirmed::Dropped`].
#[derive(Debug)]
pub struct Completion(oneshot::Sender<()>);

impl Completion {
    /// Signal that the mutation has completed.
    pub fn complete(self) {
        // The receiver may already be gone; nothing waits then.
        let _ = self.0.send(());
    }
}

/// The waiting side of a [`Completion`].
#[derive(Debug)]
#[must_use = "a confirmation does nothing unless awaited"]
pub struct Confirmation(oneshot::Receiver<()>);

impl Confirmation {
    /// A confirmation that is already complete.
    pub fn done() -> Self {
        let (done, confirmation) = confirmation();
        done.complete();
        confirmation
    }
}

/// How a [`Confirmation`] resolved.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Confirmed {
    /// The completion was fired.
    Completed,
    /// The completion was dropped without firing.
    Dropped,
}

impl Future for Confirmation {
    type Output = Confirmed;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Confirmed> {
        self.0.poll_unpin(cx).map(|r| match r {
            Ok(()) => Confirmed::Completed,
            Err(oneshot::Canceled) => Confirmed::Dropped,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::executor::block_on;

    #[test]
    fn fired_completion_confirms() {
        let (done, confirmation) = confirmation();
        done.complete();
        assert_eq!(block_on(confirmation), Confirmed::Completed);
    }

    #[test]
    fn dropped_completion_still_releases_the_waiter() {
        let (done, confirmation) = confirmation();
        drop(done);
        assert_eq!(block_on(confirmation), Confirmed::Dropped);
    }

    #[test]
    fn confirmation_done_is_ready() {
        assert_eq!(
            Confirmation::done().now_or_never(),
            Some(Confirmed::Completed)
        );
    }

    #[test]
    fn point_anchor_is_zero_sized() {
        let anchor: Anchor<u32> = Anchor::at(Point::new(4.0, 8.0));
        assert_eq!(anchor, Anchor::Source(Rect::new(4.0, 8.0, 4.0, 8.0)));
        assert_eq!(Anchor::<u32>::default(), Anchor::None);
    }
}
