//! Static registry of process types per generator kind.
//!
//! Replaces runtime type scanning: a process type is registered once at
//! startup with the generator kind it is valid for, and hosts build their
//! pipeline by lookup.

use std::collections::HashMap;

use crate::core::process::Process;

/// One registered process type.
#[derive(Clone, Copy)]
pub struct ProcessRegistration {
    /// Display name of the process type.
    pub name: &'static str,
    /// Generator kind this process is valid for.
    pub target: &'static str,
    /// Factory for a fresh process instance.
    pub build: fn() -> Box<dyn Process>,
}

/// Registry keyed by generator kind.
#[derive(Default)]
pub struct ProcessRegistry {
    entries: HashMap<&'static str, Vec<ProcessRegistration>>,
}

impl ProcessRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, registration: ProcessRegistration) {
        self.entries
            .entry(registration.target)
            .or_default()
            .push(registration);
    }

    /// Registered process types for one generator kind, in registration
    /// order.
    pub fn registrations_for(&self, target: &str) -> &[ProcessRegistration] {
        self.entries.get(target).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Build fresh instances of every process registered for `target`.
    pub fn build_for(&self, target: &str) -> Vec<Box<dyn Process>> {
        self.registrations_for(target)
            .iter()
            .map(|r| (r.build)())
            .collect()
    }

    pub fn targets(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.entries.keys().copied()
    }
}
