// SPDX-License-Identifier: CEPL-1.0
use std::sync::Arc;

/// Counts the dependents currently referencing a resource's views.
#[derive(Debug, Default)]
pub(crate) struct BindTracker(Arc<()>);

/// Held by a dependent for as long as it references the tracked resource.
#[derive(Debug)]
pub(crate) struct Binding(#[allow(dead_code)] Arc<()>);

impl BindTracker {
    pub(crate) fn bind(&self) -> Binding {
        Binding(Arc::clone(&self.0))
    }

    pub(crate) fn users(&self) -> usize {
        Arc::strong_count(&self.0) - 1
    }
}
