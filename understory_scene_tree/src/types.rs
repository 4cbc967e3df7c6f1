// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Public types for the scene tree: screen and stack identifiers, flags, anchors, and journal entries.

use alloc::vec::Vec;
use kurbo::{Point, Rect};

/// Identifier for a screen in the tree.
///
/// This is a small, copyable handle that stays stable while the screen is attached
/// but becomes invalid once the screen is released.
/// It consists of a slot index and a generation counter.
///
/// ## Semantics
///
/// - On create, a fresh slot is allocated with generation `1`.
/// - On release, the slot is freed; any existing `ScreenId` that pointed to that slot is now stale.
/// - On reuse of a freed slot, its generation is incremented, producing a new, distinct `ScreenId`.
///
/// ### Liveness
///
/// Use [`SceneTree::is_alive`](crate::SceneTree::is_alive) to check whether a `ScreenId` still refers to a live screen.
/// Stale `ScreenId`s never alias a different live screen because the generation must match.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub struct ScreenId(pub(crate) u32, pub(crate) u32);

impl ScreenId {
    pub(crate) const fn new(idx: u32, generation: u32) -> Self {
        Self(idx, generation)
    }

    pub(crate) const fn idx(self) -> usize {
        self.0 as usize
    }

    pub(crate) const fn generation(self) -> u32 {
        self.1
    }
}

/// Identifier for a screen stack.
///
/// Same generational semantics as [`ScreenId`]; see
/// [`SceneTree::stack_is_alive`](crate::SceneTree::stack_is_alive).
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub struct StackId(pub(crate) u32, pub(crate) u32);

impl StackId {
    pub(crate) const fn new(idx: u32, generation: u32) -> Self {
        Self(idx, generation)
    }

    pub(crate) const fn idx(self) -> usize {
        self.0 as usize
    }

    pub(crate) const fn generation(self) -> u32 {
        self.1
    }
}

/// Caller-chosen key for a control (a toolbar item, a button) that a popover can hang from.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub struct ControlId(pub u32);

bitflags::bitflags! {
    /// Screen state flags.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    pub struct ScreenFlags: u8 {
        /// Content has been loaded; the screen is ready for interaction logic.
        const LOADED           = 0b0000_0001;
        /// A modal presentation of this screen is still animating in.
        const BEING_PRESENTED  = 0b0000_0010;
        /// A modal dismissal of this screen is still animating out.
        const BEING_DISMISSED  = 0b0000_0100;
    }
}

/// Where a popover-style modal presentation is anchored on wide layouts.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum PopoverAnchor {
    /// A source region in window space.
    Source(Rect),
    /// A control the popover arrow points at.
    Control(ControlId),
}

impl PopoverAnchor {
    /// Anchor at a single point (a zero-sized source region).
    pub fn at(pt: Point) -> Self {
        Self::Source(Rect::from_points(pt, pt))
    }
}

/// How animated transitions complete.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub enum Transitions {
    /// Every transition completes as soon as it starts.
    #[default]
    Immediate,
    /// Animated presentations and dismissals stay in flight until
    /// [`SceneTree::finish_transitions`](crate::SceneTree::finish_transitions).
    Deferred,
}

/// A hierarchy mutation recorded by the tree.
///
/// Drained with [`SceneTree::take_journal`](crate::SceneTree::take_journal).
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum SceneEvent {
    /// `child` was presented over `parent`.
    Presented {
        /// Presenting screen.
        parent: ScreenId,
        /// Presented screen.
        child: ScreenId,
        /// Whether the transition was animated.
        animated: bool,
    },
    /// A dismissal of `child` from `parent` was started.
    Dismissed {
        /// Presenting screen.
        parent: ScreenId,
        /// Dismissed screen.
        child: ScreenId,
        /// Whether the transition was animated.
        animated: bool,
    },
    /// `screen` was appended to `stack`.
    Pushed {
        /// Target stack.
        stack: StackId,
        /// Pushed screen.
        screen: ScreenId,
        /// Whether the transition was animated.
        animated: bool,
    },
    /// `screens` were removed from the top of `stack`, top-most last.
    Popped {
        /// Target stack.
        stack: StackId,
        /// Removed screens.
        screens: Vec<ScreenId>,
        /// Whether the transition was animated.
        animated: bool,
    },
    /// `stack` was installed as the detail stack of `primary`.
    DetailReplaced {
        /// Stack that owns the detail slot.
        primary: StackId,
        /// Newly created detail stack.
        detail: StackId,
    },
    /// `screen` was released.
    Released {
        /// Released screen.
        screen: ScreenId,
    },
}

/// Errors returned by scene tree mutations and scene instantiation.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum SceneError {
    /// The screen handle is stale.
    StaleScreen(ScreenId),
    /// The stack handle is stale.
    StaleStack(StackId),
    /// The screen is already part of a stack or the presentation chain.
    AlreadyAttached(ScreenId),
    /// The presenting screen already presents another screen.
    AlreadyPresenting(ScreenId),
    /// The screen presents nothing.
    NothingPresented(ScreenId),
    /// The screen is not an element of the stack.
    NotInStack(ScreenId, StackId),
    /// No scene definition is registered under this name.
    UnknownScene(alloc::string::String),
    /// The scene definition has no screen with this identifier.
    UnknownIdentifier(alloc::string::String),
    /// The scene definition has no initial screen.
    NoInitialScreen(alloc::string::String),
}

impl core::fmt::Display for SceneError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::StaleScreen(id) => write!(f, "screen {id:?} has been released"),
            Self::StaleStack(id) => write!(f, "stack {id:?} has been released"),
            Self::AlreadyAttached(id) => write!(f, "screen {id:?} is already attached"),
            Self::AlreadyPresenting(id) => write!(f, "screen {id:?} is already presenting"),
            Self::NothingPresented(id) => write!(f, "screen {id:?} presents nothing"),
            Self::NotInStack(screen, stack) => {
                write!(f, "screen {screen:?} is not in stack {stack:?}")
            }
            Self::UnknownScene(name) => write!(f, "no scene named `{name}`"),
            Self::UnknownIdentifier(id) => write!(f, "no screen with identifier `{id}`"),
            Self::NoInitialScreen(name) => write!(f, "scene `{name}` has no initial screen"),
        }
    }
}

impl core::error::Error for SceneError {}
