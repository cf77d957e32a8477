//! Skill registry: one provisioned handle per capability.
//!
//! Handles are provisioned on first use and memoized for the lifetime of
//! the registry. Each capability has its own async once-cell, so concurrent
//! first use provisions at most once, and a failed attempt leaves the cell
//! empty for the next caller without touching the other capabilities.

use std::sync::Arc;

use tokio::sync::OnceCell;
use tracing::{info, instrument, warn};

use crate::adapters::SkillProvider;
use crate::domain::{Capability, SkillDefinition, SkillHandle, StageError};

/// Lazily provisioned skill handles
pub struct SkillRegistry {
    provider: Arc<dyn SkillProvider>,
    definitions: [SkillDefinition; 3],
    cells: [OnceCell<Arc<SkillHandle>>; 3],
}

impl SkillRegistry {
    /// Create a registry that provisions `definitions` (indexed by
    /// `Capability::index()`) through `provider`
    pub fn new(provider: Arc<dyn SkillProvider>, definitions: [SkillDefinition; 3]) -> Self {
        Self {
            provider,
            definitions,
            cells: [OnceCell::new(), OnceCell::new(), OnceCell::new()],
        }
    }

    /// Resolve the handle for a capability, provisioning it on first use
    #[instrument(skip(self), fields(provider = %self.provider.name()))]
    pub async fn resolve(&self, capability: Capability) -> Result<Arc<SkillHandle>, StageError> {
        let cell = &self.cells[capability.index()];
        let handle = cell
            .get_or_try_init(|| self.provision(capability))
            .await?;
        Ok(Arc::clone(handle))
    }

    /// The cached handle, without provisioning
    pub fn cached(&self, capability: Capability) -> Option<Arc<SkillHandle>> {
        self.cells[capability.index()].get().cloned()
    }

    /// Definition used to provision a capability
    pub fn definition(&self, capability: Capability) -> &SkillDefinition {
        &self.definitions[capability.index()]
    }

    async fn provision(&self, capability: Capability) -> Result<Arc<SkillHandle>, StageError> {
        let definition = self.definition(capability);

        match self.provider.provision(capability, definition).await {
            Ok(mut handle) => {
                // Handles always carry the capability they were resolved for
                handle.capability = capability;
                info!(
                    %capability,
                    skill_id = %handle.id,
                    name = %handle.name,
                    "Skill provisioned"
                );
                Ok(Arc::new(handle))
            }
            Err(e) => {
                warn!(%capability, error = %e, "Skill provisioning failed");
                Err(StageError::Provisioning {
                    capability,
                    reason: format!("{:#}", e),
                })
            }
        }
    }
}
