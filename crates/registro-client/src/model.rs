//! Registry domain types exchanged with the backend.
//!
//! Field names follow the backend's camelCase JSON. Unknown fields are kept
//! in `extra` so a read-modify-write cycle does not drop data the client
//! does not model.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Patient demographics.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Patient {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub identification_number: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub identification_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sex: Option<String>,
    /// ISO 8601 date (`YYYY-MM-DD`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub birth_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Person responsible for the patient.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Caregiver {
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub identification_number: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relationship: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Value recorded for one research-layer variable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VariableValue {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default)]
    pub value: Value,
}

impl VariableValue {
    pub fn new(id: impl Into<String>, value: Value) -> Self {
        Self {
            id: id.into(),
            name: None,
            kind: None,
            value,
        }
    }
}

/// A research layer patients can be registered in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResearchLayer {
    pub id: String,
    #[serde(default)]
    pub layer_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Body of a register create/update request.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterPayload {
    pub research_layer_id: String,
    pub patient: Patient,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub caregiver: Option<Caregiver>,
    pub variables_info: Vec<VariableValue>,
}

/// Identifier of a stored register, as returned by create/update.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterReceipt {
    #[serde(default, alias = "id", alias = "_id")]
    pub register_id: Option<String>,
}

/// Raw body of `GET /registers/validatePatient`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidatePatientResponse {
    pub action: String,
    #[serde(default)]
    pub register_id: Option<String>,
    #[serde(default, alias = "patientBasicInfo")]
    pub patient: Option<Patient>,
    #[serde(default)]
    pub caregiver: Option<Caregiver>,
    #[serde(default, alias = "variablesInfo")]
    pub variables: Vec<VariableValue>,
}
