// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Core tree implementation: screens, stacks, the presentation chain, and transitions.

use alloc::boxed::Box;
use alloc::string::String;
use alloc::vec;
use alloc::vec::Vec;

use crate::catalog::SceneCatalog;
use crate::slots::Slots;
use crate::types::{
    PopoverAnchor, SceneError, SceneEvent, ScreenFlags, ScreenId, StackId, Transitions,
};

type Callback = Box<dyn FnOnce() + Send>;

struct Screen {
    label: String,
    flags: ScreenFlags,
    presented: Option<ScreenId>,
    presenting: Option<ScreenId>,
    stack: Option<StackId>,
    anchor: Option<PopoverAnchor>,
    on_ready: Vec<Callback>,
    on_destroyed: Vec<Callback>,
}

impl Screen {
    fn new(label: String) -> Self {
        Self {
            label,
            flags: ScreenFlags::empty(),
            presented: None,
            presenting: None,
            stack: None,
            anchor: None,
            on_ready: Vec::new(),
            on_destroyed: Vec::new(),
        }
    }
}

struct Stack {
    screens: Vec<ScreenId>,
    detail: Option<StackId>,
}

enum Transition {
    Present { child: ScreenId, on_done: Callback },
    Dismiss { child: ScreenId, on_done: Callback },
}

impl Default for SceneTree {
    fn default() -> Self {
        Self::new()
    }
}

/// Screen hierarchy: generational screen and stack registries plus the modal presentation chain.
pub struct SceneTree {
    screens: Slots<Screen>,
    stacks: Slots<Stack>,
    root: Option<ScreenId>,
    transitions: Transitions,
    in_flight: Vec<Transition>,
    journal: Vec<SceneEvent>,
    catalog: SceneCatalog,
}

impl core::fmt::Debug for SceneTree {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("SceneTree")
            .field("screens_alive", &self.screens.len_alive())
            .field("screens_free", &self.screens.len_free())
            .field("stacks_alive", &self.stacks.len_alive())
            .field("root", &self.root)
            .field("transitions", &self.transitions)
            .field("in_flight", &self.in_flight.len())
            .field("journal", &self.journal.len())
            .finish_non_exhaustive()
    }
}

impl SceneTree {
    /// Create an empty tree whose transitions complete immediately.
    pub fn new() -> Self {
        Self::with_transitions(Transitions::Immediate)
    }

    /// Create an empty tree with the given transition mode.
    pub fn with_transitions(transitions: Transitions) -> Self {
        Self {
            screens: Slots::default(),
            stacks: Slots::default(),
            root: None,
            transitions,
            in_flight: Vec::new(),
            journal: Vec::new(),
            catalog: SceneCatalog::new(),
        }
    }

    /// Change how subsequent animated transitions complete.
    pub fn set_transitions(&mut self, transitions: Transitions) {
        self.transitions = transitions;
    }

    /// Scene definitions used by [`SceneTree::instantiate`].
    pub fn catalog(&self) -> &SceneCatalog {
        &self.catalog
    }

    /// Mutable access to the scene definitions.
    pub fn catalog_mut(&mut self) -> &mut SceneCatalog {
        &mut self.catalog
    }

    // --- screens ---

    /// Create a detached, not yet loaded screen.
    pub fn create_screen(&mut self, label: impl Into<String>) -> ScreenId {
        let (idx, generation) = self.screens.insert(Screen::new(label.into()));
        ScreenId::new(idx, generation)
    }

    /// Create a detached screen from a registered scene definition.
    ///
    /// An empty `identifier` instantiates the definition's initial screen.
    pub fn instantiate(
        &mut self,
        bundle: Option<&str>,
        name: &str,
        identifier: &str,
    ) -> Result<ScreenId, SceneError> {
        let label = self.catalog.resolve(bundle, name, identifier)?;
        Ok(self.create_screen(label))
    }

    /// Returns true if `id` refers to a live screen.
    pub fn is_alive(&self, id: ScreenId) -> bool {
        self.screen(id).is_some()
    }

    /// Label given at creation, if `id` is live.
    pub fn label(&self, id: ScreenId) -> Option<&str> {
        self.screen(id).map(|s| s.label.as_str())
    }

    /// State flags, if `id` is live.
    pub fn flags(&self, id: ScreenId) -> Option<ScreenFlags> {
        self.screen(id).map(|s| s.flags)
    }

    /// Install `id` as the root of the presentation chain and load it.
    pub fn set_root(&mut self, id: ScreenId) -> Result<(), SceneError> {
        if self.is_attached(id)? {
            return Err(SceneError::AlreadyAttached(id));
        }
        self.root = Some(id);
        self.load(id)
    }

    /// Root of the presentation chain, if one is installed and alive.
    pub fn root(&self) -> Option<ScreenId> {
        self.root.filter(|r| self.is_alive(*r))
    }

    /// Load the screen's content, notifying ready observers once.
    pub fn load(&mut self, id: ScreenId) -> Result<(), SceneError> {
        let screen = self
            .screen_mut(id)
            .ok_or(SceneError::StaleScreen(id))?;
        if screen.flags.contains(ScreenFlags::LOADED) {
            return Ok(());
        }
        screen.flags.insert(ScreenFlags::LOADED);
        let observers = core::mem::take(&mut screen.on_ready);
        for cb in observers {
            cb();
        }
        Ok(())
    }

    /// Returns true if the screen is live and loaded.
    pub fn is_loaded(&self, id: ScreenId) -> bool {
        self.screen(id)
            .is_some_and(|s| s.flags.contains(ScreenFlags::LOADED))
    }

    /// Run `cb` once the screen is loaded.
    ///
    /// Runs immediately if it is already loaded; dropped without running if
    /// `id` is stale or the screen is released before loading.
    pub fn observe_ready(&mut self, id: ScreenId, cb: impl FnOnce() + Send + 'static) {
        match self.screen_mut(id) {
            Some(s) if s.flags.contains(ScreenFlags::LOADED) => cb(),
            Some(s) => s.on_ready.push(Box::new(cb)),
            None => {}
        }
    }

    /// Run `cb` once the screen is released. Runs immediately if `id` is already stale.
    pub fn observe_destroyed(&mut self, id: ScreenId, cb: impl FnOnce() + Send + 'static) {
        match self.screen_mut(id) {
            Some(s) => s.on_destroyed.push(Box::new(cb)),
            None => cb(),
        }
    }

    /// Release a screen: detach it from wherever it is shown, release what it
    /// presents, and notify destroyed observers. Stale ids are ignored.
    pub fn release(&mut self, id: ScreenId) {
        let Some(screen) = self.screens.remove(id.idx(), id.generation()) else {
            return;
        };
        if let Some(parent) = screen.presenting
            && let Some(p) = self.screen_mut(parent)
            && p.presented == Some(id)
        {
            p.presented = None;
        }
        if let Some(stack) = screen.stack
            && let Some(st) = self.stack_mut(stack)
        {
            st.screens.retain(|s| *s != id);
        }
        if self.root == Some(id) {
            self.root = None;
        }
        self.journal.push(SceneEvent::Released { screen: id });
        if let Some(child) = screen.presented {
            self.release(child);
        }
        for cb in screen.on_destroyed {
            cb();
        }
    }

    // --- presentation chain ---

    /// Screen currently presented by `id`, if any.
    pub fn presented(&self, id: ScreenId) -> Option<ScreenId> {
        self.screen(id)?.presented.filter(|c| self.is_alive(*c))
    }

    /// Screen that presents `id`, if any.
    pub fn presenting(&self, id: ScreenId) -> Option<ScreenId> {
        self.screen(id)?.presenting.filter(|p| self.is_alive(*p))
    }

    /// Returns true if a dismissal of `id` has started but not finished.
    pub fn is_being_dismissed(&self, id: ScreenId) -> bool {
        self.screen(id)
            .is_some_and(|s| s.flags.contains(ScreenFlags::BEING_DISMISSED))
    }

    /// Returns true if a presentation of `id` has started but not finished.
    pub fn is_being_presented(&self, id: ScreenId) -> bool {
        self.screen(id)
            .is_some_and(|s| s.flags.contains(ScreenFlags::BEING_PRESENTED))
    }

    /// Anchor recorded when `id` was presented.
    pub fn popover_anchor(&self, id: ScreenId) -> Option<PopoverAnchor> {
        self.screen(id)?.anchor
    }

    /// Present `child` over `parent`.
    ///
    /// `on_done` runs when the transition completes: at once for unanimated
    /// presentations or [`Transitions::Immediate`], otherwise on the next
    /// [`SceneTree::finish_transitions`]. On error it is dropped without running.
    pub fn present(
        &mut self,
        parent: ScreenId,
        child: ScreenId,
        anchor: Option<PopoverAnchor>,
        animated: bool,
        on_done: impl FnOnce() + Send + 'static,
    ) -> Result<(), SceneError> {
        let presenting = self
            .screen(parent)
            .ok_or(SceneError::StaleScreen(parent))?
            .presented;
        if parent == child || self.is_attached(child)? {
            return Err(SceneError::AlreadyAttached(child));
        }
        if presenting.is_some_and(|c| self.is_alive(c)) {
            return Err(SceneError::AlreadyPresenting(parent));
        }
        let deferred = animated && self.transitions == Transitions::Deferred;
        if let Some(p) = self.screen_mut(parent) {
            p.presented = Some(child);
        }
        if let Some(c) = self.screen_mut(child) {
            c.presenting = Some(parent);
            c.anchor = anchor;
            if deferred {
                c.flags.insert(ScreenFlags::BEING_PRESENTED);
            }
        }
        self.journal.push(SceneEvent::Presented {
            parent,
            child,
            animated,
        });
        self.load(child)?;
        if deferred {
            self.in_flight.push(Transition::Present {
                child,
                on_done: Box::new(on_done),
            });
        } else {
            on_done();
        }
        Ok(())
    }

    /// Dismiss whatever `parent` presents.
    ///
    /// A child that is already being dismissed counts as nothing presented.
    /// The dismissed screen (and everything it presents) is released when the
    /// transition completes; `on_done` follows the same rules as [`SceneTree::present`].
    pub fn dismiss(
        &mut self,
        parent: ScreenId,
        animated: bool,
        on_done: impl FnOnce() + Send + 'static,
    ) -> Result<(), SceneError> {
        if !self.is_alive(parent) {
            return Err(SceneError::StaleScreen(parent));
        }
        let child = self
            .presented(parent)
            .filter(|c| !self.is_being_dismissed(*c))
            .ok_or(SceneError::NothingPresented(parent))?;
        self.journal.push(SceneEvent::Dismissed {
            parent,
            child,
            animated,
        });
        if animated && self.transitions == Transitions::Deferred {
            if let Some(c) = self.screen_mut(child) {
                c.flags.insert(ScreenFlags::BEING_DISMISSED);
            }
            self.in_flight.push(Transition::Dismiss {
                child,
                on_done: Box::new(on_done),
            });
        } else {
            self.release(child);
            on_done();
        }
        Ok(())
    }

    /// Complete every in-flight transition in start order. Returns how many completed.
    pub fn finish_transitions(&mut self) -> usize {
        let pending = core::mem::take(&mut self.in_flight);
        let count = pending.len();
        for transition in pending {
            match transition {
                Transition::Present { child, on_done } => {
                    if let Some(c) = self.screen_mut(child) {
                        c.flags.remove(ScreenFlags::BEING_PRESENTED);
                    }
                    on_done();
                }
                Transition::Dismiss { child, on_done } => {
                    self.release(child);
                    on_done();
                }
            }
        }
        count
    }

    /// Number of transitions waiting for [`SceneTree::finish_transitions`].
    pub fn in_flight(&self) -> usize {
        self.in_flight.len()
    }

    // --- stacks ---

    /// Create a stack whose bottom (root) element is `root`, loading it.
    pub fn create_stack(&mut self, root: ScreenId) -> Result<StackId, SceneError> {
        if self.is_attached(root)? {
            return Err(SceneError::AlreadyAttached(root));
        }
        let (idx, generation) = self.stacks.insert(Stack {
            screens: vec![root],
            detail: None,
        });
        let stack = StackId::new(idx, generation);
        if let Some(s) = self.screen_mut(root) {
            s.stack = Some(stack);
        }
        self.load(root)?;
        Ok(stack)
    }

    /// Returns true if `stack` refers to a live stack.
    pub fn stack_is_alive(&self, stack: StackId) -> bool {
        self.stack(stack).is_some()
    }

    /// Screens of `stack`, bottom first.
    pub fn stack_screens(&self, stack: StackId) -> Option<&[ScreenId]> {
        self.stack(stack).map(|s| s.screens.as_slice())
    }

    /// Stack that currently owns `screen`.
    pub fn stack_of(&self, screen: ScreenId) -> Option<StackId> {
        self.screen(screen)?
            .stack
            .filter(|s| self.stack_is_alive(*s))
    }

    /// Detail stack installed on `stack` by [`SceneTree::show_detail`].
    pub fn detail_stack(&self, stack: StackId) -> Option<StackId> {
        self.stack(stack)?
            .detail
            .filter(|d| self.stack_is_alive(*d))
    }

    /// Append `screen` to `stack` and load it.
    pub fn push(
        &mut self,
        stack: StackId,
        screen: ScreenId,
        animated: bool,
    ) -> Result<(), SceneError> {
        if !self.stack_is_alive(stack) {
            return Err(SceneError::StaleStack(stack));
        }
        if self.is_attached(screen)? {
            return Err(SceneError::AlreadyAttached(screen));
        }
        if let Some(st) = self.stack_mut(stack) {
            st.screens.push(screen);
        }
        if let Some(s) = self.screen_mut(screen) {
            s.stack = Some(stack);
        }
        self.journal.push(SceneEvent::Pushed {
            stack,
            screen,
            animated,
        });
        self.load(screen)
    }

    /// Pop the top screen, as a back gesture would. The bottom screen is never popped.
    pub fn pop(&mut self, stack: StackId, animated: bool) -> Option<ScreenId> {
        let screens = self.stack_screens(stack)?;
        if screens.len() < 2 {
            return None;
        }
        let top = screens[screens.len() - 1];
        let below = screens[screens.len() - 2];
        self.pop_to(stack, below, animated).ok()?;
        Some(top)
    }

    /// Pop every screen above `target`, releasing them. Returns the removed screens.
    pub fn pop_to(
        &mut self,
        stack: StackId,
        target: ScreenId,
        animated: bool,
    ) -> Result<Vec<ScreenId>, SceneError> {
        let st = self.stack_mut(stack).ok_or(SceneError::StaleStack(stack))?;
        let pos = st
            .screens
            .iter()
            .position(|s| *s == target)
            .ok_or(SceneError::NotInStack(target, stack))?;
        let removed = st.screens.split_off(pos + 1);
        self.journal.push(SceneEvent::Popped {
            stack,
            screens: removed.clone(),
            animated,
        });
        for &screen in removed.iter().rev() {
            if let Some(s) = self.screen_mut(screen) {
                s.stack = None;
            }
            self.release(screen);
        }
        Ok(removed)
    }

    /// Release a stack, its screens, and its detail stack.
    pub fn release_stack(&mut self, stack: StackId) {
        let Some(st) = self.stacks.remove(stack.idx(), stack.generation()) else {
            return;
        };
        for &screen in st.screens.iter().rev() {
            self.release(screen);
        }
        if let Some(detail) = st.detail {
            self.release_stack(detail);
        }
    }

    // --- adaptive navigation ---

    /// Show `screen` from `from`: push onto `from`'s stack, or present over `from`.
    pub fn show(&mut self, from: ScreenId, screen: ScreenId) -> Result<(), SceneError> {
        if !self.is_alive(from) {
            return Err(SceneError::StaleScreen(from));
        }
        match self.stack_of(from) {
            Some(stack) => self.push(stack, screen, true),
            None => self.present(from, screen, None, true, || {}),
        }
    }

    /// Show `screen` as the detail of `from`.
    ///
    /// When `from` lives in a stack, a fresh detail stack `[screen]` replaces
    /// that stack's previous detail stack (which is released). Otherwise the
    /// screen is presented over `from`.
    pub fn show_detail(&mut self, from: ScreenId, screen: ScreenId) -> Result<(), SceneError> {
        if !self.is_alive(from) {
            return Err(SceneError::StaleScreen(from));
        }
        let Some(primary) = self.stack_of(from) else {
            return self.present(from, screen, None, true, || {});
        };
        let detail = self.create_stack(screen)?;
        let previous = self
            .stack_mut(primary)
            .and_then(|st| st.detail.replace(detail));
        self.journal
            .push(SceneEvent::DetailReplaced { primary, detail });
        if let Some(previous) = previous {
            self.release_stack(previous);
        }
        Ok(())
    }

    // --- journal ---

    /// Mutations recorded since the last [`SceneTree::take_journal`].
    pub fn journal(&self) -> &[SceneEvent] {
        &self.journal
    }

    /// Drain the recorded mutations.
    pub fn take_journal(&mut self) -> Vec<SceneEvent> {
        core::mem::take(&mut self.journal)
    }

    // --- internals ---

    fn screen(&self, id: ScreenId) -> Option<&Screen> {
        self.screens.get(id.idx(), id.generation())
    }

    fn screen_mut(&mut self, id: ScreenId) -> Option<&mut Screen> {
        self.screens.get_mut(id.idx(), id.generation())
    }

    fn stack(&self, id: StackId) -> Option<&Stack> {
        self.stacks.get(id.idx(), id.generation())
    }

    fn stack_mut(&mut self, id: StackId) -> Option<&mut Stack> {
        self.stacks.get_mut(id.idx(), id.generation())
    }

    fn is_attached(&self, id: ScreenId) -> Result<bool, SceneError> {
        let s = self.screen(id).ok_or(SceneError::StaleScreen(id))?;
        Ok(self.root == Some(id)
            || s.stack.is_some_and(|st| self.stack_is_alive(st))
            || s.presenting.is_some_and(|p| self.is_alive(p)))
    }
}
