//! Typed lifecycle calls for orchestrator objects.

use crate::handles::{ActionHandle, ConfigurationHandle, WorkflowHandle};
use crate::models::{Action, ConfigurationElement, Workflow};
use crate::Result;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;
use tracing::info;
use vra_core::client::{ApiClientBuilder, TokenSource, VersionToken};
use vra_core::config::ProviderConfig;
use vra_core::CancelToken;
use vra_lifecycle::{DeleteReport, Fetched, LifecycleClient, LockRegistry, ResourceHandle};

/// An orchestrator object that knows how to describe itself to the lifecycle
/// client.
pub trait VcoResource: Serialize + DeserializeOwned + Send + Sync {
    /// Handle type for this object.
    type Handle: ResourceHandle;

    /// Kind name used in logs.
    const KIND: &'static str;

    /// Build the handle for this object as configured.
    fn handle(&self) -> Self::Handle;
}

impl VcoResource for Action {
    type Handle = ActionHandle;
    const KIND: &'static str = "action";

    fn handle(&self) -> ActionHandle {
        ActionHandle::for_action(self)
    }
}

impl VcoResource for Workflow {
    type Handle = WorkflowHandle;
    const KIND: &'static str = "workflow";

    fn handle(&self) -> WorkflowHandle {
        WorkflowHandle::for_workflow(self)
    }
}

impl VcoResource for ConfigurationElement {
    type Handle = ConfigurationHandle;
    const KIND: &'static str = "configuration element";

    fn handle(&self) -> ConfigurationHandle {
        ConfigurationHandle::for_element(self)
    }
}

/// Orchestrator client.
#[derive(Debug, Clone)]
pub struct VcoClient {
    lifecycle: LifecycleClient,
}

impl VcoClient {
    /// Wrap an existing lifecycle client.
    #[must_use]
    pub const fn new(lifecycle: LifecycleClient) -> Self {
        Self { lifecycle }
    }

    /// Build a client with its own lock registry from provider configuration.
    ///
    /// # Errors
    ///
    /// Returns [`vra_core::Error::ConfigError`] if the configuration is
    /// invalid or the HTTP client cannot be built.
    pub fn from_config(config: &ProviderConfig, tokens: Arc<dyn TokenSource>) -> Result<Self> {
        let api = ApiClientBuilder::from_config(config)?
            .with_token_source(tokens)
            .build()?;
        let lifecycle = LifecycleClient::from_config(api, Arc::new(LockRegistry::new()), config)?;
        Ok(Self::new(lifecycle))
    }

    /// Underlying lifecycle client.
    #[must_use]
    pub const fn lifecycle(&self) -> &LifecycleClient {
        &self.lifecycle
    }

    /// Create `resource` and return the server's view of it.
    ///
    /// # Errors
    ///
    /// Returns the classified failure of the single POST, including
    /// [`vra_core::Error::Validation`] for a 404, or
    /// [`vra_core::Error::Cancelled`] if `cancel` fires first.
    pub async fn create<R: VcoResource>(
        &self,
        cancel: &CancelToken,
        resource: &R,
    ) -> Result<Fetched<R>> {
        let handle = resource.handle();
        let created = self.lifecycle.create_it(cancel, &handle, resource).await?;
        info!(kind = R::KIND, key = %handle.identity_key(), "created");
        Ok(created)
    }

    /// Read the object behind `handle`; `None` means it no longer exists.
    ///
    /// # Errors
    ///
    /// Returns the classified failure of the GET, or
    /// [`vra_core::Error::Decode`] if the body does not match `R`.
    pub async fn read<R: VcoResource>(
        &self,
        cancel: &CancelToken,
        handle: &R::Handle,
    ) -> Result<Option<Fetched<R>>> {
        self.lifecycle.read_it(cancel, handle).await
    }

    /// Replace the object with `resource`, guarded by `version` when given.
    ///
    /// # Errors
    ///
    /// Returns the classified failure of the single PUT. A missing object is
    /// a [`vra_core::Error::Validation`] error.
    pub async fn update<R: VcoResource>(
        &self,
        cancel: &CancelToken,
        resource: &R,
        version: Option<&VersionToken>,
    ) -> Result<Fetched<R>> {
        let handle = resource.handle();
        self.lifecycle
            .update_it(cancel, &handle, resource, version)
            .await
    }

    /// Delete the object behind `handle`, waiting for referencing objects to
    /// go away first.
    ///
    /// # Errors
    ///
    /// Returns [`vra_core::Error::RetriesExhausted`] if the object is still
    /// referenced when the delete timeout passes, a fatal classification
    /// immediately, or [`vra_core::Error::Cancelled`].
    pub async fn delete<H: ResourceHandle>(
        &self,
        cancel: &CancelToken,
        handle: &H,
    ) -> Result<DeleteReport> {
        self.lifecycle.delete_it(cancel, handle).await
    }
}
