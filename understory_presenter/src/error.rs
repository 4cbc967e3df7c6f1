// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Error types.

use std::error::Error;
use std::fmt;
use std::sync::Arc;

/// An error raised by interaction logic and delivered to every subscriber of an
/// [`ActionStream`](crate::ActionStream).
///
/// Cheap to clone: the underlying error is shared.
#[derive(Clone, Debug, thiserror::Error)]
#[error(transparent)]
pub struct ActionError(Arc<dyn Error + Send + Sync + 'static>);

impl ActionError {
    /// Wrap an arbitrary error.
    pub fn new(err: impl Error + Send + Sync + 'static) -> Self {
        Self(Arc::new(err))
    }

    /// An error carrying only a message.
    pub fn msg(msg: impl fmt::Display) -> Self {
        Self::new(Message(msg.to_string()))
    }

    /// Attempt to view the wrapped error as a concrete type.
    pub fn downcast_ref<E: Error + 'static>(&self) -> Option<&E> {
        self.0.downcast_ref::<E>()
    }
}

#[derive(Debug, thiserror::Error)]
#[error("{0}")]
struct Message(String);

/// Errors raised while setting up a presenter's threads.
#[derive(Debug, thiserror::Error)]
pub enum QueueError {
    /// The operating system refused to start a thread.
    #[error("failed to spawn thread `{name}`")]
    Spawn {
        /// Name requested for the thread.
        name: String,
        /// Underlying spawn failure.
        #[source]
        source: std::io::Error,
    },
}
