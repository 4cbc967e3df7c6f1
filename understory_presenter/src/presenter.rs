// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Public entry operations.

use core::fmt;
use std::sync::Arc;

use futures::Stream;
use tracing::debug;

use crate::action::{ActionStream, wrap_action};
use crate::dispose::DisposeBag;
use crate::error::ActionError;
use crate::platform::{Anchor, ControlOf, Platform, ScreenOf, StackOf};
use crate::queue::Serializer;
use crate::strategy::{Coordinator, Presentation};

/// Binds screen presentations to the action streams their interaction logic produces.
///
/// Every entry operation takes a configure callback `FnOnce(&DisposeBag, Screen) -> Stream`.
/// The callback runs once the screen is ready; the stream it returns is what subscribers
/// of the returned [`ActionStream`] see. When that stream completes, fails, or is
/// dropped, or when the screen is destroyed, the screen is detached exactly once.
///
/// Hierarchy mutations are submitted to the [`Serializer`] and run on the platform's
/// UI context. Entry operations never block on them.
pub struct Presenter<P: Platform> {
    platform: Arc<P>,
    queue: Arc<dyn Serializer>,
}

impl<P: Platform> Presenter<P> {
    /// Create a presenter over `platform`, serializing mutations through `queue`.
    pub fn new(platform: Arc<P>, queue: Arc<dyn Serializer>) -> Self {
        Self { platform, queue }
    }

    /// The platform.
    pub fn platform(&self) -> &Arc<P> {
        &self.platform
    }

    /// The serializer.
    pub fn queue(&self) -> &Arc<dyn Serializer> {
        &self.queue
    }

    /// Wrap a screen the caller has already placed in the hierarchy.
    ///
    /// No hierarchy mutation happens, now or at teardown.
    pub fn wrap<A, F, St>(&self, screen: ScreenOf<P>, configure: F) -> (ScreenOf<P>, ActionStream<A>)
    where
        A: Clone + Send + 'static,
        F: FnOnce(&DisposeBag, ScreenOf<P>) -> St + Send + 'static,
        St: Stream<Item = Result<A, ActionError>> + Send + 'static,
    {
        debug!(?screen, "wrapping screen");
        let lifecycle = self.platform.lifecycle(screen);
        let actions = wrap_action(screen, lifecycle, configure, Box::new(|| {}));
        (screen, actions)
    }

    /// Present a screen modally over whatever is frontmost when the job runs.
    pub fn present_modal<A, F, St>(
        &self,
        make_screen: impl FnOnce() -> ScreenOf<P>,
        animated: bool,
        anchor: Anchor<ControlOf<P>>,
        configure: F,
    ) -> ActionStream<A>
    where
        A: Clone + Send + 'static,
        F: FnOnce(&DisposeBag, ScreenOf<P>) -> St + Send + 'static,
        St: Stream<Item = Result<A, ActionError>> + Send + 'static,
    {
        self.coordinate(
            make_screen(),
            Presentation::Modal { anchor },
            animated,
            configure,
        )
    }

    /// Push a screen onto `stack`.
    pub fn push<A, F, St>(
        &self,
        make_screen: impl FnOnce() -> ScreenOf<P>,
        stack: StackOf<P>,
        animated: bool,
        configure: F,
    ) -> ActionStream<A>
    where
        A: Clone + Send + 'static,
        F: FnOnce(&DisposeBag, ScreenOf<P>) -> St + Send + 'static,
        St: Stream<Item = Result<A, ActionError>> + Send + 'static,
    {
        self.coordinate(
            make_screen(),
            Presentation::Push { stack },
            animated,
            configure,
        )
    }

    /// Show a screen from `from`, letting the platform pick push or present.
    pub fn show<A, F, St>(
        &self,
        make_screen: impl FnOnce() -> ScreenOf<P>,
        from: ScreenOf<P>,
        hint: Option<ControlOf<P>>,
        configure: F,
    ) -> ActionStream<A>
    where
        A: Clone + Send + 'static,
        F: FnOnce(&DisposeBag, ScreenOf<P>) -> St + Send + 'static,
        St: Stream<Item = Result<A, ActionError>> + Send + 'static,
    {
        self.coordinate(
            make_screen(),
            Presentation::Show { from, hint },
            true,
            configure,
        )
    }

    /// Show a screen as the detail of `from`.
    pub fn show_detail<A, F, St>(
        &self,
        make_screen: impl FnOnce() -> ScreenOf<P>,
        from: ScreenOf<P>,
        hint: Option<ControlOf<P>>,
        configure: F,
    ) -> ActionStream<A>
    where
        A: Clone + Send + 'static,
        F: FnOnce(&DisposeBag, ScreenOf<P>) -> St + Send + 'static,
        St: Stream<Item = Result<A, ActionError>> + Send + 'static,
    {
        self.coordinate(
            make_screen(),
            Presentation::ShowDetail { from, hint },
            true,
            configure,
        )
    }

    fn coordinate<A, F, St>(
        &self,
        screen: ScreenOf<P>,
        presentation: Presentation<P::Hierarchy>,
        animated: bool,
        configure: F,
    ) -> ActionStream<A>
    where
        A: Clone + Send + 'static,
        F: FnOnce(&DisposeBag, ScreenOf<P>) -> St + Send + 'static,
        St: Stream<Item = Result<A, ActionError>> + Send + 'static,
    {
        let lifecycle = self.platform.lifecycle(screen);
        let record = Coordinator::new(screen, presentation, animated);
        record.attach(&self.platform, &*self.queue);

        let platform = Arc::clone(&self.platform);
        let queue = Arc::clone(&self.queue);
        let teardown = Box::new(move || {
            record.detach(&platform, &*queue);
        });
        wrap_action(screen, lifecycle, configure, teardown)
    }
}

impl<P: Platform> Clone for Presenter<P> {
    fn clone(&self) -> Self {
        Self {
            platform: Arc::clone(&self.platform),
            queue: Arc::clone(&self.queue),
        }
    }
}

impl<P: Platform> fmt::Debug for Presenter<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Presenter").finish_non_exhaustive()
    }
}

/// Request for a screen built from a named definition.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct SceneConfig {
    /// Definition name. Empty selects the factory's default.
    pub name: String,
    /// Namespace the definition lives in.
    pub bundle: Option<String>,
    /// Screen within the definition. Empty selects its initial screen.
    pub identifier: String,
}

impl SceneConfig {
    /// Request the initial screen of the definition `name`.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Request the definition named after the type `T`, without its module path.
    pub fn for_type<T: ?Sized>() -> Self {
        Self::named(short_type_name::<T>())
    }

    /// Select a screen within the definition.
    pub fn with_identifier(mut self, identifier: impl Into<String>) -> Self {
        self.identifier = identifier.into();
        self
    }

    /// Look the definition up in `bundle`.
    pub fn in_bundle(mut self, bundle: impl Into<String>) -> Self {
        self.bundle = Some(bundle.into());
        self
    }

    /// The definition name, or `default` when none was given.
    pub fn name_or<'a>(&'a self, default: &'a str) -> &'a str {
        if self.name.is_empty() { default } else { &self.name }
    }
}

fn short_type_name<T: ?Sized>() -> &'static str {
    let full = core::any::type_name::<T>();
    let base = full.split('<').next().unwrap_or(full);
    base.rsplit("::").next().unwrap_or(base)
}

/// Builds screens from [`SceneConfig`]s.
pub trait ScreenFactory<S> {
    /// Why a screen could not be built.
    type Error;

    /// Build the screen `config` describes.
    fn produce(&self, config: &SceneConfig) -> Result<S, Self::Error>;
}
