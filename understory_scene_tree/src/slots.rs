// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Generational slot storage shared by screens and stacks.

use alloc::vec::Vec;

pub(crate) struct Slots<T> {
    entries: Vec<Option<T>>,
    generations: Vec<u32>, // last generation per slot (persists across frees)
    free_list: Vec<usize>,
}

impl<T> Default for Slots<T> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
            generations: Vec::new(),
            free_list: Vec::new(),
        }
    }
}

impl<T> Slots<T> {
    /// Store `value`, returning its `(slot, generation)` pair.
    pub(crate) fn insert(&mut self, value: T) -> (u32, u32) {
        if let Some(idx) = self.free_list.pop() {
            let generation = self.generations[idx].saturating_add(1);
            self.generations[idx] = generation;
            self.entries[idx] = Some(value);
            #[allow(
                clippy::cast_possible_truncation,
                reason = "Handles use 32-bit indices by design."
            )]
            (idx as u32, generation)
        } else {
            let generation = 1_u32;
            self.entries.push(Some(value));
            self.generations.push(generation);
            #[allow(
                clippy::cast_possible_truncation,
                reason = "Handles use 32-bit indices by design."
            )]
            ((self.entries.len() - 1) as u32, generation)
        }
    }

    pub(crate) fn get(&self, idx: usize, generation: u32) -> Option<&T> {
        if self.generations.get(idx) != Some(&generation) {
            return None;
        }
        self.entries.get(idx)?.as_ref()
    }

    pub(crate) fn get_mut(&mut self, idx: usize, generation: u32) -> Option<&mut T> {
        if self.generations.get(idx) != Some(&generation) {
            return None;
        }
        self.entries.get_mut(idx)?.as_mut()
    }

    pub(crate) fn remove(&mut self, idx: usize, generation: u32) -> Option<T> {
        if self.generations.get(idx) != Some(&generation) {
            return None;
        }
        let value = self.entries.get_mut(idx)?.take()?;
        self.free_list.push(idx);
        Some(value)
    }

    pub(crate) fn len_alive(&self) -> usize {
        self.entries.iter().filter(|e| e.is_some()).count()
    }

    pub(crate) fn len_free(&self) -> usize {
        self.free_list.len()
    }
}
