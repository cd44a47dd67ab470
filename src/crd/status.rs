//! # PodAutoscaler Status
//!
//! Status types for tracking replica counts and conditions.
//! The status block is owned exclusively by the controller.

use serde::{Deserialize, Serialize};

/// Status of the PodAutoscaler resource
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct PodAutoscalerStatus {
    /// Replica count observed on the scale target during the last reconcile
    #[serde(default)]
    pub actual_scale: i32,
    /// Replica count the controller last decided on
    #[serde(default)]
    pub desired_scale: i32,
    /// Time of the last successful rescale (RFC3339)
    #[serde(default)]
    pub last_scale_time: Option<String>,
    /// Conditions represent the latest available observations
    /// Each `type` appears at most once
    #[serde(default)]
    pub conditions: Vec<Condition>,
}

/// Condition represents a status condition for the resource
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Condition {
    /// Type of condition (e.g. "AbleToScale")
    pub r#type: String,
    /// Status of condition (True, False, Unknown)
    pub status: ConditionStatus,
    /// Last time `status` flipped (RFC3339)
    #[serde(default)]
    pub last_transition_time: Option<String>,
    /// Machine-readable reason
    #[serde(default)]
    pub reason: Option<String>,
    /// Human-readable message
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, schemars::JsonSchema)]
pub enum ConditionStatus {
    True,
    False,
    Unknown,
}

impl ConditionStatus {
    /// Parse the string form used by built-in Kubernetes conditions
    #[must_use]
    pub fn from_k8s(value: &str) -> Self {
        match value {
            "True" => ConditionStatus::True,
            "False" => ConditionStatus::False,
            _ => ConditionStatus::Unknown,
        }
    }
}

impl PodAutoscalerStatus {
    /// Look up a condition by type
    #[must_use]
    pub fn condition(&self, condition_type: &str) -> Option<&Condition> {
        self.conditions.iter().find(|c| c.r#type == condition_type)
    }
}
