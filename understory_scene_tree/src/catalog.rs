// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Named scene definitions that screens are instantiated from.

use alloc::collections::BTreeMap;
use alloc::format;
use alloc::string::{String, ToString};
use alloc::vec::Vec;

use crate::types::SceneError;

/// A named group of screen definitions, in the spirit of a storyboard.
#[derive(Clone, Debug, Default)]
pub struct SceneDefinition {
    /// Identifier of the screen instantiated when no identifier is requested.
    pub initial: Option<String>,
    /// Identifiers that can be instantiated explicitly.
    pub identifiers: Vec<String>,
}

impl SceneDefinition {
    /// A definition whose only screen is its initial one.
    pub fn single(initial: &str) -> Self {
        Self {
            initial: Some(initial.to_string()),
            identifiers: Vec::new(),
        }
    }

    /// Add an explicitly instantiable identifier.
    pub fn with_identifier(mut self, identifier: &str) -> Self {
        self.identifiers.push(identifier.to_string());
        self
    }
}

/// Registry of scene definitions keyed by `(bundle, name)`.
#[derive(Clone, Debug, Default)]
pub struct SceneCatalog {
    scenes: BTreeMap<(Option<String>, String), SceneDefinition>,
}

impl SceneCatalog {
    /// Create an empty catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) the definition named `name` in `bundle`.
    pub fn register(&mut self, bundle: Option<&str>, name: &str, definition: SceneDefinition) {
        self.scenes
            .insert((bundle.map(ToString::to_string), name.to_string()), definition);
    }

    /// Returns true if a definition is registered under `(bundle, name)`.
    pub fn contains(&self, bundle: Option<&str>, name: &str) -> bool {
        self.scenes
            .contains_key(&(bundle.map(ToString::to_string), name.to_string()))
    }

    /// Resolve a request to the label of the screen it produces.
    ///
    /// An empty `identifier` selects the definition's initial screen.
    pub fn resolve(
        &self,
        bundle: Option<&str>,
        name: &str,
        identifier: &str,
    ) -> Result<String, SceneError> {
        let definition = self
            .scenes
            .get(&(bundle.map(ToString::to_string), name.to_string()))
            .ok_or_else(|| SceneError::UnknownScene(name.to_string()))?;
        let chosen = if identifier.is_empty() {
            definition
                .initial
                .as_deref()
                .ok_or_else(|| SceneError::NoInitialScreen(name.to_string()))?
        } else if definition.identifiers.iter().any(|i| i == identifier)
            || definition.initial.as_deref() == Some(identifier)
        {
            identifier
        } else {
            return Err(SceneError::UnknownIdentifier(identifier.to_string()));
        };
        Ok(format!("{name}.{chosen}"))
    }
}
