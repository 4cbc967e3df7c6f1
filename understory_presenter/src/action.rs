// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Action stream wrapper: gate interaction logic on screen readiness and tear
//! the presentation down exactly once.
//!
//! ## States
//!
//! ```text
//! WaitingForReady ──ready──▶ Configuring ──▶ Emitting ──▶ Terminated(cause)
//!        │                                       │
//!        └──────── destroyed / cancelled ────────┴──────▶ Terminated(cause)
//! ```
//!
//! - The stream is connected when it is created. The configure callback runs
//!   once, as soon as the screen is ready: during [`wrap_action`] itself when
//!   the screen already is.
//! - Readiness, destruction, and upstream events are handled when they happen,
//!   whether or not anyone is polling the [`ActionStream`].
//! - Destruction of the screen is checked before the upstream every time the
//!   wrapper runs.
//! - Whatever the cause, termination drops the upstream, disposes the
//!   [`DisposeBag`], and then runs the teardown callback, exactly once.
//! - Dropping every clone of the [`ActionStream`] before termination is
//!   cancellation.

use core::fmt;
use core::mem;
use core::pin::Pin;
use core::task::{Context, Poll};
use std::sync::Arc;

use futures::future::BoxFuture;
use futures::stream::{BoxStream, FusedStream, Stream, StreamExt};
use futures::FutureExt;
use parking_lot::Mutex;
use tracing::{debug, trace};

use crate::dispose::DisposeBag;
use crate::error::ActionError;
use crate::multicast::Multicast;
use crate::platform::Lifecycle;

/// Callback run once the wrapped stream terminates.
pub type Teardown = Box<dyn FnOnce() + Send>;

/// Why an action stream terminated.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Termination {
    /// Interaction logic completed.
    Completed,
    /// Interaction logic failed; the error was delivered to subscribers.
    Failed,
    /// Every subscriber went away.
    Cancelled,
    /// The screen was destroyed, for example by a back gesture.
    ScreenDestroyed,
}

/// Observable state of an action stream.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum WrapperState {
    /// Waiting for the screen to become ready.
    WaitingForReady,
    /// Running the configure callback.
    Configuring,
    /// Forwarding events from interaction logic.
    Emitting,
    /// Finished.
    Terminated(Termination),
}

/// A multicast stream of the actions a screen's interaction logic produces.
///
/// Clones share one upstream, one [`DisposeBag`], and one teardown. At most one
/// `Err` is delivered, and it ends the stream.
///
/// Each clone sees the actions produced after it was made. Actions are buffered
/// per clone until it is polled.
pub struct ActionStream<A> {
    inner: Multicast<Result<A, ActionError>>,
    state: Arc<Mutex<WrapperState>>,
}

impl<A> ActionStream<A> {
    /// Current state.
    pub fn state(&self) -> WrapperState {
        *self.state.lock()
    }

    /// Returns true once the stream has terminated.
    pub fn is_terminated(&self) -> bool {
        matches!(self.state(), WrapperState::Terminated(_))
    }
}

impl<A> Clone for ActionStream<A> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            state: Arc::clone(&self.state),
        }
    }
}

impl<A: Clone + Send + 'static> Stream for ActionStream<A> {
    type Item = Result<A, ActionError>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.inner.poll_next_unpin(cx)
    }
}

impl<A: Clone + Send + 'static> FusedStream for ActionStream<A> {
    fn is_terminated(&self) -> bool {
        self.inner.is_terminated()
    }
}

impl<A> fmt::Debug for ActionStream<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActionStream")
            .field("state", &self.state())
            .field("subscribers", &self.inner.subscriber_count())
            .finish_non_exhaustive()
    }
}

/// Wrap `screen` and its interaction logic into an [`ActionStream`].
///
/// `configure` runs once `lifecycle.ready` resolves, before this returns if it
/// already has; its stream becomes the upstream. `teardown` runs exactly once
/// when the stream terminates for any reason, possibly before this returns.
pub fn wrap_action<S, A, F, St>(
    screen: S,
    lifecycle: Lifecycle,
    configure: F,
    teardown: Teardown,
) -> ActionStream<A>
where
    S: fmt::Debug + Send + 'static,
    A: Clone + Send + 'static,
    F: FnOnce(&DisposeBag, S) -> St + Send + 'static,
    St: Stream<Item = Result<A, ActionError>> + Send + 'static,
{
    let state = Arc::new(Mutex::new(WrapperState::WaitingForReady));
    let label = format!("{screen:?}");
    let driver = Driver {
        phase: Phase::WaitingForReady {
            ready: lifecycle.ready,
            configure: Box::new(move |bag: &DisposeBag| configure(bag, screen).boxed()),
        },
        destroyed: Some(lifecycle.destroyed),
        bag: DisposeBag::new(),
        teardown: Some(teardown),
        state: Arc::clone(&state),
        label,
    };
    let inner = Multicast::new(driver);
    inner.connect();
    ActionStream { inner, state }
}

type Configure<A> = Box<dyn FnOnce(&DisposeBag) -> Upstream<A> + Send>;
type Upstream<A> = BoxStream<'static, Result<A, ActionError>>;

enum Phase<A> {
    WaitingForReady {
        ready: BoxFuture<'static, ()>,
        configure: Configure<A>,
    },
    Emitting(Upstream<A>),
    Terminated,
}

struct Driver<A> {
    phase: Phase<A>,
    destroyed: Option<BoxFuture<'static, ()>>,
    bag: DisposeBag,
    teardown: Option<Teardown>,
    state: Arc<Mutex<WrapperState>>,
    label: String,
}

impl<A> Driver<A> {
    fn set_state(&self, state: WrapperState) {
        *self.state.lock() = state;
    }

    fn terminate(&mut self, cause: Termination) {
        let Some(teardown) = self.teardown.take() else {
            return;
        };
        self.phase = Phase::Terminated;
        self.destroyed = None;
        self.bag.dispose();
        self.set_state(WrapperState::Terminated(cause));
        debug!(screen = %self.label, ?cause, "action stream terminated");
        teardown();
    }
}

impl<A> Stream for Driver<A> {
    type Item = Result<A, ActionError>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = &mut *self;
        if matches!(this.phase, Phase::Terminated) {
            return Poll::Ready(None);
        }
        if let Some(destroyed) = this.destroyed.as_mut()
            && destroyed.poll_unpin(cx).is_ready()
        {
            this.terminate(Termination::ScreenDestroyed);
            return Poll::Ready(None);
        }

        if let Phase::WaitingForReady { ready, .. } = &mut this.phase {
            if ready.poll_unpin(cx).is_pending() {
                return Poll::Pending;
            }
            if let Phase::WaitingForReady { configure, .. } =
                mem::replace(&mut this.phase, Phase::Terminated)
            {
                trace!(screen = %this.label, "screen ready; configuring");
                this.set_state(WrapperState::Configuring);
                let upstream = configure(&this.bag);
                this.phase = Phase::Emitting(upstream);
                this.set_state(WrapperState::Emitting);
            }
        }

        let Phase::Emitting(upstream) = &mut this.phase else {
            return Poll::Ready(None);
        };
        match upstream.poll_next_unpin(cx) {
            Poll::Ready(Some(Ok(action))) => Poll::Ready(Some(Ok(action))),
            Poll::Ready(Some(Err(err))) => {
                this.terminate(Termination::Failed);
                Poll::Ready(Some(Err(err)))
            }
            Poll::Ready(None) => {
                this.terminate(Termination::Completed);
                Poll::Ready(None)
            }
            Poll::Pending => Poll::Pending,
        }
    }
}

impl<A> Drop for Driver<A> {
    fn drop(&mut self) {
        self.terminate(Termination::Cancelled);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::channel::{mpsc, oneshot};
    use futures::executor::block_on;
    use futures::stream;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Harness {
        teardowns: Arc<AtomicUsize>,
        configured: Arc<AtomicUsize>,
        released: Arc<AtomicUsize>,
        ready: Option<oneshot::Sender<()>>,
        destroyed: Option<oneshot::Sender<()>>,
    }

    impl Harness {
        fn new() -> (Self, Lifecycle) {
            let (ready_tx, ready_rx) = oneshot::channel::<()>();
            let (gone_tx, gone_rx) = oneshot::channel::<()>();
            let lifecycle = Lifecycle {
                ready: ready_rx.map(|_| ()).boxed(),
                destroyed: gone_rx.map(|_| ()).boxed(),
            };
            (
                Self {
                    teardowns: Arc::default(),
                    configured: Arc::default(),
                    released: Arc::default(),
                    ready: Some(ready_tx),
                    destroyed: Some(gone_tx),
                },
                lifecycle,
            )
        }

        fn wrap<St>(&self, lifecycle: Lifecycle, upstream: St) -> ActionStream<&'static str>
        where
            St: Stream<Item = Result<&'static str, ActionError>> + Send + 'static,
        {
            let teardowns = self.teardowns.clone();
            let configured = self.configured.clone();
            let released = self.released.clone();
            wrap_action(
                "screen",
                lifecycle,
                move |bag: &DisposeBag, screen: &'static str| {
                    assert_eq!(screen, "screen");
                    configured.fetch_add(1, Ordering::SeqCst);
                    bag.insert(move || {
                        released.fetch_add(1, Ordering::SeqCst);
                    });
                    upstream
                },
                Box::new(move || {
                    teardowns.fetch_add(1, Ordering::SeqCst);
                }),
            )
        }

        fn make_ready(&mut self) {
            let _ = self.ready.take().unwrap().send(());
        }

        fn destroy(&mut self) {
            let _ = self.destroyed.take().unwrap().send(());
        }

        fn counts(&self) -> (usize, usize, usize) {
            (
                self.configured.load(Ordering::SeqCst),
                self.released.load(Ordering::SeqCst),
                self.teardowns.load(Ordering::SeqCst),
            )
        }
    }

    #[test]
    fn completion_tears_down_once() {
        let (mut h, lifecycle) = Harness::new();
        let mut actions = h.wrap(lifecycle, stream::iter(vec![Ok("a"), Ok("b")]));
        h.make_ready();
        assert_eq!(actions.state(), WrapperState::Terminated(Termination::Completed));
        assert_eq!(h.counts(), (1, 1, 1));
        let seen: Vec<_> = block_on(actions.by_ref().map(|r| r.unwrap()).collect());
        assert_eq!(seen, vec!["a", "b"]);
        drop(actions);
        assert_eq!(h.counts(), (1, 1, 1));
    }

    #[test]
    fn error_is_terminal_and_tears_down_once() {
        let (mut h, lifecycle) = Harness::new();
        let upstream = stream::iter(vec![
            Ok("a"),
            Err(ActionError::msg("boom")),
            Ok("never"),
        ]);
        let mut actions = h.wrap(lifecycle, upstream);
        let other = actions.clone();
        h.make_ready();
        assert_eq!(actions.state(), WrapperState::Terminated(Termination::Failed));
        assert_eq!(block_on(actions.next()).unwrap().unwrap(), "a");
        let err = block_on(actions.next()).unwrap().unwrap_err();
        assert_eq!(err.to_string(), "boom");
        assert!(block_on(actions.next()).is_none());

        // The second subscriber sees the same sequence, including the error.
        let rest: Vec<_> = block_on(other.collect());
        assert_eq!(rest.len(), 2);
        assert!(rest[1].is_err());
        drop(actions);
        assert_eq!(h.counts(), (1, 1, 1));
    }

    #[test]
    fn cancellation_tears_down_once() {
        let (mut h, lifecycle) = Harness::new();
        let first = h.wrap(lifecycle, stream::pending());
        let second = first.clone();
        h.make_ready();
        assert_eq!(first.state(), WrapperState::Emitting);
        drop(first);
        assert_eq!(h.counts(), (1, 0, 0), "a subscriber remains");
        let state = second.state.clone();
        drop(second);
        assert_eq!(*state.lock(), WrapperState::Terminated(Termination::Cancelled));
        assert_eq!(h.counts(), (1, 1, 1));
    }

    #[test]
    fn cancellation_before_readiness_never_configures() {
        let (mut h, lifecycle) = Harness::new();
        let first = h.wrap(lifecycle, stream::iter(vec![Ok("x")]));
        let second = first.clone();
        let state = first.state.clone();
        assert_eq!(first.state(), WrapperState::WaitingForReady);
        drop(first);
        drop(second);
        assert_eq!(*state.lock(), WrapperState::Terminated(Termination::Cancelled));
        assert_eq!(h.counts(), (0, 0, 1));
        h.make_ready();
        assert_eq!(h.counts(), (0, 0, 1), "configure never ran");
    }

    #[test]
    fn destruction_while_emitting_tears_down_without_a_poll() {
        let (mut h, lifecycle) = Harness::new();
        let (tx, rx) = mpsc::unbounded();
        let actions = h.wrap(lifecycle, rx);
        h.make_ready();
        assert_eq!(actions.state(), WrapperState::Emitting);
        tx.unbounded_send(Ok("early")).unwrap();
        h.destroy();
        assert_eq!(
            actions.state(),
            WrapperState::Terminated(Termination::ScreenDestroyed)
        );
        assert_eq!(h.counts(), (1, 1, 1));
        assert!(tx.is_closed(), "upstream is disconnected");
        assert!(tx.unbounded_send(Ok("late")).is_err());

        let seen: Vec<_> = block_on(actions.map(|r| r.unwrap()).collect());
        assert_eq!(seen, vec!["early"]);
        assert_eq!(h.counts(), (1, 1, 1));
    }

    #[test]
    fn destruction_wins_over_readiness() {
        let (h, _) = Harness::new();
        let lifecycle = Lifecycle::ready_now(futures::future::ready(()).boxed());
        let actions = h.wrap(lifecycle, stream::iter(vec![Ok("x")]));
        assert_eq!(
            actions.state(),
            WrapperState::Terminated(Termination::ScreenDestroyed)
        );
        assert_eq!(h.counts(), (0, 0, 1));
        assert!(block_on(actions.collect::<Vec<_>>()).is_empty());
    }

    #[test]
    fn configure_waits_for_readiness() {
        let (mut h, lifecycle) = Harness::new();
        let mut actions = h.wrap(lifecycle, stream::iter(vec![Ok("x")]));
        assert!(actions.next().now_or_never().is_none());
        assert_eq!(actions.state(), WrapperState::WaitingForReady);
        assert_eq!(h.counts(), (0, 0, 0));
        h.make_ready();
        assert_eq!(h.counts(), (1, 1, 1));
        assert_eq!(block_on(actions.next()).unwrap().unwrap(), "x");
        assert!(block_on(actions.next()).is_none());
    }

    #[test]
    fn never_ready_screen_ends_only_by_destruction() {
        let (mut h, lifecycle) = Harness::new();
        let actions = h.wrap(lifecycle, stream::iter(vec![Ok("x")]));
        assert_eq!(actions.state(), WrapperState::WaitingForReady);
        h.destroy();
        assert_eq!(
            actions.state(),
            WrapperState::Terminated(Termination::ScreenDestroyed)
        );
        assert_eq!(h.counts(), (0, 0, 1), "configure never ran");
        assert!(block_on(actions.collect::<Vec<_>>()).is_empty());
    }

    #[test]
    fn already_ready_screen_configures_during_wrap() {
        let (h, _) = Harness::new();
        let (_gone_tx, gone_rx) = oneshot::channel::<()>();
        let lifecycle = Lifecycle::ready_now(gone_rx.map(|_| ()).boxed());
        let actions = h.wrap(lifecycle, stream::pending());
        assert_eq!(h.counts(), (1, 0, 0));
        assert_eq!(actions.state(), WrapperState::Emitting);
        drop(actions);
        assert_eq!(h.counts(), (1, 1, 1));
    }
}
