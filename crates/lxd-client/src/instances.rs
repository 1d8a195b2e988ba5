//! Instance endpoints (`/1.0/instances`).

use lxd_core::query::PROJECT;
use lxd_core::{Error, LazyEntity, QueryParams, Transport};
use tracing::debug;
use validator::Validate;

use crate::models::{Instance, InstanceCreateRequest, Operation};
use crate::Result;

/// Endpoint group for instances.
#[derive(Debug, Clone)]
pub struct InstanceGroup {
    transport: Transport,
    project: Option<String>,
}

impl InstanceGroup {
    /// Create the group over an existing transport.
    #[must_use]
    pub const fn new(transport: Transport) -> Self {
        Self {
            transport,
            project: None,
        }
    }

    /// Scope listing and creation to `project` instead of the daemon's default project.
    #[must_use]
    pub fn with_project(mut self, project: impl Into<String>) -> Self {
        self.project = Some(project.into());
        self
    }

    fn query(&self, recursion: Option<bool>) -> QueryParams {
        let mut query = recursion.map_or_else(QueryParams::new, QueryParams::recursion);
        query.push_opt(PROJECT, self.project.as_deref());
        query
    }

    /// List instances.
    ///
    /// Without recursion the entities are unresolved references; with recursion they are
    /// filled from the embedded objects and no further requests are needed.
    pub async fn list(&self, recursion: bool) -> Result<Vec<LazyEntity<Instance>>> {
        let path = self.transport.path("instances");
        let response = self
            .transport
            .get(&path, &self.query(Some(recursion)))
            .await?;
        let items = response.into_sync()?.metadata.into_array()?;

        debug!(count = items.len(), recursion, "Listed LXD instances");
        LazyEntity::from_listing(&self.transport, items, recursion)
    }

    /// Unresolved handle for the instance called `name`; call `fetch` to load it.
    #[must_use]
    pub fn get(&self, name: &str) -> LazyEntity<Instance> {
        let path = self.transport.path("instances").child(name);
        LazyEntity::unresolved(self.transport.clone(), path)
    }

    /// Create an instance and return the background operation tracking it, unresolved.
    pub async fn create(&self, request: &InstanceCreateRequest) -> Result<LazyEntity<Operation>> {
        request.validate().map_err(|errors| Error::Validation {
            entity: "InstanceCreateRequest",
            field: errors
                .field_errors()
                .keys()
                .next()
                .map_or_else(|| "$".to_string(), ToString::to_string),
            message: errors.to_string(),
        })?;

        let body = serde_json::to_value(request)?;
        let path = self.transport.path("instances");
        let response = self
            .transport
            .post(&path, Some(&body), &self.query(None))
            .await?
            .into_async()?;

        debug!(operation = %response.operation, name = %request.name, "Instance creation started");
        Ok(LazyEntity::from_reference(
            self.transport.clone(),
            &response.operation,
        ))
    }
}
