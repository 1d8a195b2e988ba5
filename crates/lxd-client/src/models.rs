//! LXD models for instances and operations.

use chrono::{DateTime, Utc};
use lxd_core::{ApiPath, Entity, StatusCode};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use validator::Validate;

/// Representation of an instance (container or virtual machine) as returned by LXD.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Validate)]
pub struct Instance {
    /// Instance name.
    #[validate(length(min = 1))]
    pub name: String,
    /// Architecture name (x86_64, aarch64, ...).
    #[validate(length(min = 1))]
    pub architecture: String,
    /// Current status description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    /// Current status code.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_code: Option<StatusCode>,
    /// Instance type (`container` or `virtual-machine`).
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub instance_type: Option<String>,
    /// Free-form description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Creation timestamp.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    /// Last use timestamp.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_used_at: Option<DateTime<Utc>>,
    /// Instance configuration keys.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub config: HashMap<String, String>,
    /// Applied profiles.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub profiles: Vec<String>,
    /// Whether the instance is destroyed on shutdown.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ephemeral: Option<bool>,
    /// Whether the instance keeps runtime state across stops.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stateful: Option<bool>,
    /// Cluster member the instance lives on.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    /// Owning project.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project: Option<String>,
}

impl Instance {
    /// True if LXD reports the instance as running.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.status_code == Some(StatusCode::Running)
    }
}

impl Entity for Instance {
    const KIND: &'static str = "Instance";

    fn operation_for(&self, root: &ApiPath) -> Option<ApiPath> {
        Some(root.child("instances").child(&self.name))
    }
}

/// Image source for a new instance.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct InstanceSource {
    /// Source type (`image`, `copy`, `migration`, `none`).
    #[serde(rename = "type")]
    pub source_type: String,
    /// Image alias.
    pub alias: String,
}

impl InstanceSource {
    /// Image source referenced by alias.
    #[must_use]
    pub fn image(alias: impl Into<String>) -> Self {
        Self {
            source_type: "image".to_string(),
            alias: alias.into(),
        }
    }
}

/// Payload for `POST /1.0/instances`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Validate)]
pub struct InstanceCreateRequest {
    /// Instance name.
    #[validate(length(min = 1, max = 63))]
    pub name: String,
    /// Architecture.
    pub architecture: String,
    /// Image source.
    pub source: InstanceSource,
    /// Instance type.
    #[serde(rename = "type")]
    pub instance_type: String,
    /// Profiles to apply.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub profiles: Vec<String>,
    /// Configuration keys.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub config: HashMap<String, String>,
}

impl InstanceCreateRequest {
    /// A container request for `name` using the image `alias` on x86_64.
    #[must_use]
    pub fn new(name: impl Into<String>, alias: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            architecture: "x86_64".to_string(),
            source: InstanceSource::image(alias),
            instance_type: "container".to_string(),
            profiles: Vec::new(),
            config: HashMap::new(),
        }
    }

    /// Override the architecture.
    #[must_use]
    pub fn with_architecture(mut self, architecture: impl Into<String>) -> Self {
        self.architecture = architecture.into();
        self
    }

    /// Override the source type.
    #[must_use]
    pub fn with_source_type(mut self, source_type: impl Into<String>) -> Self {
        self.source.source_type = source_type.into();
        self
    }

    /// Override the instance type.
    #[must_use]
    pub fn with_instance_type(mut self, instance_type: impl Into<String>) -> Self {
        self.instance_type = instance_type.into();
        self
    }

    /// Add a profile.
    #[must_use]
    pub fn with_profile(mut self, profile: impl Into<String>) -> Self {
        self.profiles.push(profile.into());
        self
    }

    /// Set a configuration key.
    #[must_use]
    pub fn with_config(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.config.insert(key.into(), value.into());
        self
    }
}

/// Background operation as returned by `/1.0/operations/<id>`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Validate)]
pub struct Operation {
    /// Operation UUID.
    #[validate(length(min = 1))]
    pub id: String,
    /// Operation class (`task`, `websocket`, `token`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub class: Option<String>,
    /// Human readable description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Creation timestamp.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    /// Last update timestamp.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
    /// Status description.
    pub status: String,
    /// Status code.
    pub status_code: StatusCode,
    /// Affected resources by type.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resources: Option<HashMap<String, Vec<String>>>,
    /// Operation-specific metadata.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
    /// Whether the operation can be canceled.
    #[serde(default)]
    pub may_cancel: bool,
    /// Error message, empty on success.
    #[serde(default)]
    pub err: String,
    /// Cluster member running the operation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
}

impl Operation {
    /// True once the operation reached a final state.
    #[must_use]
    pub const fn is_done(&self) -> bool {
        self.status_code.is_final()
    }
}

impl Entity for Operation {
    const KIND: &'static str = "Operation";

    fn operation_for(&self, root: &ApiPath) -> Option<ApiPath> {
        Some(root.child("operations").child(&self.id))
    }
}
