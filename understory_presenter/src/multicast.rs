// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Share one upstream stream between many subscribers.
//!
//! Every subscriber sees every item produced after it subscribed. The hub
//! drives the upstream itself: whenever the upstream wakes, it is polled on
//! the waking thread and its items are queued for every live subscriber, so
//! an upstream makes progress without anyone polling a subscriber. Polling a
//! subscriber also drives the upstream. Once the last subscriber is dropped
//! the upstream is dropped with it.
//!
//! Each subscriber buffers what it has not consumed yet. A subscriber that is
//! held but never polled grows its queue with every item the upstream
//! produces; drop subscribers you no longer read from.

use core::fmt;
use core::pin::Pin;
use core::sync::atomic::{AtomicBool, Ordering};
use core::task::{Context, Poll, Waker};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Weak};

use futures::stream::{BoxStream, FusedStream, Stream, StreamExt};
use futures::task::{self, ArcWake};
use parking_lot::Mutex;

/// One subscription to a shared upstream. Cloning subscribes again.
///
/// Unconsumed items are buffered per subscriber without bound; see [`Multicast::pending`].
pub struct Multicast<T> {
    hub: Arc<Hub<T>>,
    id: usize,
}

struct Hub<T> {
    state: Mutex<State<T>>,
    subscribers: Mutex<HashMap<usize, Waker>>,
    // Set while some thread is polling the upstream.
    pumping: AtomicBool,
    // Set by every wake; cleared by the pumping thread before each drain.
    notified: AtomicBool,
    // Handed to the upstream; wakes re-enter `pump`.
    waker: Waker,
}

struct State<T> {
    // `None` once the upstream has ended or every subscriber has left.
    source: Option<BoxStream<'static, T>>,
    queues: HashMap<usize, VecDeque<T>>,
    next_id: usize,
}

struct HubWaker<T> {
    hub: Weak<Hub<T>>,
}

impl<T: Clone + Send + 'static> ArcWake for HubWaker<T> {
    fn wake_by_ref(arc_self: &Arc<Self>) {
        if let Some(hub) = arc_self.hub.upgrade() {
            hub.pump();
        }
    }
}

impl<T: Clone + Send + 'static> Hub<T> {
    /// Drive the upstream until it is pending again. Re-entrant and concurrent
    /// calls leave a notification for the thread already pumping.
    fn pump(&self) {
        self.notified.store(true, Ordering::Release);
        while self.notified.load(Ordering::Acquire) {
            if self.pumping.swap(true, Ordering::AcqRel) {
                return;
            }
            while self.notified.swap(false, Ordering::AcqRel) {
                self.drain();
            }
            self.pumping.store(false, Ordering::Release);
        }
    }

    fn drain(&self) {
        let mut cx = Context::from_waker(&self.waker);
        let mut delivered = false;
        let mut guard = self.state.lock();
        let state = &mut *guard;
        let finished = loop {
            let Some(source) = state.source.as_mut() else {
                break None;
            };
            match source.poll_next_unpin(&mut cx) {
                Poll::Ready(Some(item)) => {
                    for queue in state.queues.values_mut() {
                        queue.push_back(item.clone());
                    }
                    delivered = true;
                }
                Poll::Ready(None) => break state.source.take(),
                Poll::Pending => break None,
            }
        };
        drop(guard);
        let ended = finished.is_some();
        // Dropped outside the lock: the upstream may run arbitrary teardown.
        drop(finished);
        if delivered || ended {
            self.wake_subscribers();
        }
    }
}

impl<T> Hub<T> {
    fn register(&self, id: usize, waker: &Waker) {
        let mut subscribers = self.subscribers.lock();
        match subscribers.get_mut(&id) {
            Some(w) if w.will_wake(waker) => {}
            Some(w) => w.clone_from(waker),
            None => {
                subscribers.insert(id, waker.clone());
            }
        }
    }

    fn wake_subscribers(&self) {
        let wakers: Vec<Waker> = self.subscribers.lock().drain().map(|(_, w)| w).collect();
        for w in wakers {
            w.wake();
        }
    }

    fn try_next(&self, id: usize) -> Poll<Option<T>> {
        let mut state = self.state.lock();
        if let Some(item) = state.queues.get_mut(&id).and_then(VecDeque::pop_front) {
            Poll::Ready(Some(item))
        } else if state.source.is_none() {
            Poll::Ready(None)
        } else {
            Poll::Pending
        }
    }
}

impl<T: Clone + Send + 'static> Multicast<T> {
    /// Share `source`. The returned value is the first subscriber.
    ///
    /// The upstream is not polled until [`Multicast::connect`] is called or a
    /// subscriber is polled.
    pub fn new(source: impl Stream<Item = T> + Send + 'static) -> Self {
        let mut queues = HashMap::new();
        queues.insert(0, VecDeque::new());
        let hub = Arc::new_cyclic(|weak: &Weak<Hub<T>>| Hub {
            state: Mutex::new(State {
                source: Some(source.boxed()),
                queues,
                next_id: 1,
            }),
            subscribers: Mutex::default(),
            pumping: AtomicBool::new(false),
            notified: AtomicBool::new(false),
            waker: task::waker(Arc::new(HubWaker { hub: weak.clone() })),
        });
        Self { hub, id: 0 }
    }

    /// Start driving the upstream now. From here on it runs whenever it wakes.
    pub fn connect(&self) {
        self.hub.pump();
    }
}

impl<T> Multicast<T> {
    /// Number of live subscribers, this one included.
    pub fn subscriber_count(&self) -> usize {
        self.hub.state.lock().queues.len()
    }

    /// Returns true once the upstream has ended.
    pub fn is_finished(&self) -> bool {
        self.hub.state.lock().source.is_none()
    }

    /// Items queued for this subscriber and not consumed yet.
    pub fn pending(&self) -> usize {
        self.hub
            .state
            .lock()
            .queues
            .get(&self.id)
            .map_or(0, VecDeque::len)
    }
}

impl<T> Clone for Multicast<T> {
    fn clone(&self) -> Self {
        let mut state = self.hub.state.lock();
        let id = state.next_id;
        state.next_id += 1;
        state.queues.insert(id, VecDeque::new());
        Self {
            hub: Arc::clone(&self.hub),
            id,
        }
    }
}

impl<T: Clone + Send + 'static> Stream for Multicast<T> {
    type Item = T;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<T>> {
        let hub = &self.hub;
        hub.register(self.id, cx.waker());
        if let ready @ Poll::Ready(_) = hub.try_next(self.id) {
            return ready;
        }
        hub.pump();
        hub.try_next(self.id)
    }
}

impl<T: Clone + Send + 'static> FusedStream for Multicast<T> {
    fn is_terminated(&self) -> bool {
        let state = self.hub.state.lock();
        state.source.is_none() && state.queues.get(&self.id).is_none_or(VecDeque::is_empty)
    }
}

impl<T> Drop for Multicast<T> {
    fn drop(&mut self) {
        self.hub.subscribers.lock().remove(&self.id);
        let abandoned = {
            let mut state = self.hub.state.lock();
            state.queues.remove(&self.id);
            if state.queues.is_empty() {
                state.source.take()
            } else {
                None
            }
        };
        // Dropped outside the lock: the upstream may run arbitrary teardown.
        drop(abandoned);
    }
}

impl<T> fmt::Debug for Multicast<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Multicast")
            .field("id", &self.id)
            .field("subscribers", &self.subscriber_count())
            .field("pending", &self.pending())
            .field("finished", &self.is_finished())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::channel::mpsc;
    use futures::executor::block_on;
    use futures::stream;
    use std::sync::atomic::{AtomicBool, Ordering};

    struct DropFlag(Arc<AtomicBool>);

    impl Drop for DropFlag {
        fn drop(&mut self) {
            self.0.store(true, Ordering::SeqCst);
        }
    }

    #[test]
    fn every_subscriber_sees_every_item() {
        let a = Multicast::new(stream::iter(vec![1, 2, 3]));
        let b = a.clone();
        assert_eq!(a.subscriber_count(), 2);
        assert_eq!(block_on(a.collect::<Vec<_>>()), vec![1, 2, 3]);
        assert_eq!(block_on(b.collect::<Vec<_>>()), vec![1, 2, 3]);
    }

    #[test]
    fn late_subscriber_after_end_sees_nothing() {
        let mut a = Multicast::new(stream::iter(vec![1]));
        assert_eq!(block_on(a.next()), Some(1));
        assert_eq!(block_on(a.next()), None);
        assert!(a.is_finished());
        assert!(a.is_terminated());
        let b = a.clone();
        assert_eq!(block_on(b.collect::<Vec<_>>()), Vec::<i32>::new());
    }

    #[test]
    fn dropping_last_subscriber_drops_upstream() {
        let dropped = Arc::new(AtomicBool::new(false));
        let flag = DropFlag(dropped.clone());
        let source = stream::pending::<u8>().map(move |x| {
            let _held = &flag;
            x
        });
        let a = Multicast::new(source);
        let b = a.clone();
        drop(a);
        assert!(!dropped.load(Ordering::SeqCst));
        drop(b);
        assert!(dropped.load(Ordering::SeqCst));
    }

    #[test]
    fn connect_drives_the_upstream_without_a_poll() {
        let a = Multicast::new(stream::iter(vec![1, 2]));
        assert_eq!(a.pending(), 0);
        a.connect();
        assert_eq!(a.pending(), 2);
        assert!(a.is_finished());
        assert_eq!(block_on(a.collect::<Vec<_>>()), vec![1, 2]);
    }

    #[test]
    fn upstream_wake_delivers_without_a_poll() {
        let (tx, rx) = mpsc::unbounded::<u32>();
        let a = Multicast::new(rx);
        a.connect();
        tx.unbounded_send(7).unwrap();
        tx.unbounded_send(8).unwrap();
        assert_eq!(a.pending(), 2);
        drop(tx);
        assert!(a.is_finished());
        assert_eq!(block_on(a.collect::<Vec<_>>()), vec![7, 8]);
    }

    #[test]
    fn idle_subscriber_buffers_until_dropped() {
        let (tx, rx) = mpsc::unbounded::<u32>();
        let mut reader = Multicast::new(rx);
        let idle = reader.clone();
        reader.connect();
        for n in 0..3 {
            tx.unbounded_send(n).unwrap();
            assert_eq!(block_on(reader.next()), Some(n));
        }
        assert_eq!(reader.pending(), 0);
        assert_eq!(idle.pending(), 3);
        drop(idle);
        assert_eq!(reader.subscriber_count(), 1);
    }

    #[test]
    fn subscriber_on_another_thread_is_woken() {
        let (mut tx, rx) = mpsc::channel::<u32>(4);
        let a = Multicast::new(rx);
        let b = a.clone();
        let waiter = std::thread::spawn(move || block_on(b.collect::<Vec<_>>()));
        let reader = std::thread::spawn(move || block_on(a.collect::<Vec<_>>()));
        block_on(async {
            use futures::SinkExt;
            tx.send(5).await.unwrap();
            tx.send(6).await.unwrap();
        });
        drop(tx);
        assert_eq!(waiter.join().unwrap(), vec![5, 6]);
        assert_eq!(reader.join().unwrap(), vec![5, 6]);
    }
}
