//! RAII guard for a created container.

use crate::engine::{ContainerEngine, ContainerId, EngineError};

/// Owns a created container and removes it exactly once.
///
/// Call [`ContainerGuard::release`] on the normal path to get the removal
/// result back. If the guard is dropped without being released (early
/// return, panic unwinding through the build) the container is removed in
/// `Drop` and a failure is only logged.
pub struct ContainerGuard<'e, E: ContainerEngine + ?Sized> {
    engine: &'e E,
    container: ContainerId,
    armed: bool,
}

impl<'e, E: ContainerEngine + ?Sized> ContainerGuard<'e, E> {
    pub fn new(engine: &'e E, container: ContainerId) -> Self {
        Self {
            engine,
            container,
            armed: true,
        }
    }

    pub fn id(&self) -> &ContainerId {
        &self.container
    }

    /// Remove the container now and report the result.
    pub fn release(mut self) -> Result<(), EngineError> {
        self.armed = false;
        remove(self.engine, &self.container)
    }
}

impl<E: ContainerEngine + ?Sized> Drop for ContainerGuard<'_, E> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        self.armed = false;
        if let Err(err) = remove(self.engine, &self.container) {
            tracing::warn!(
                container = self.container.short(),
                error = %err,
                "failed to remove container during unwind"
            );
        }
    }
}

fn remove<E: ContainerEngine + ?Sized>(
    engine: &E,
    container: &ContainerId,
) -> Result<(), EngineError> {
    tracing::debug!(container = container.short(), "removing container");
    engine.remove_container(container)
}
