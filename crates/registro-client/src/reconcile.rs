//! Patient reconciliation.
//!
//! Before a registration can be saved the patient has to be classified
//! against the target research layer. The backend's `validatePatient`
//! answer is turned into exactly one [`ValidationResult`], which then
//! decides the save path:
//!
//! | Backend `action`                 | Result               | Save path                         |
//! |----------------------------------|----------------------|-----------------------------------|
//! | `patient_doesnt_exist`           | `New`                | create                            |
//! | `patient_already_exist_in_layer` | `ExistsInLayer`      | update in place                   |
//! | `patient_doesnt_exist_in_layer`  | `ExistsInOtherLayer` | move to layer, then re-validate   |
//!
//! [`RegistrationForm`] holds the data being entered and enforces that a
//! save only proceeds with a classification produced after the last change
//! of the patient identifier.

use std::fmt;

use serde_json::Value;

use crate::error::ClientError;
use crate::model::{Caregiver, Patient, RegisterPayload, ValidatePatientResponse, VariableValue};
use crate::service::RegistryClient;
use crate::ClientResult;

pub const ACTION_NEW: &str = "patient_doesnt_exist";
pub const ACTION_EXISTS_IN_LAYER: &str = "patient_already_exist_in_layer";
pub const ACTION_EXISTS_IN_OTHER_LAYER: &str = "patient_doesnt_exist_in_layer";

/// The three reconciliation cases, without payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValidationCase {
    New,
    ExistsInLayer,
    ExistsInOtherLayer,
}

impl ValidationCase {
    /// Parses the backend's `action` literal.
    #[must_use]
    pub fn from_action(action: &str) -> Option<Self> {
        match action {
            ACTION_NEW => Some(Self::New),
            ACTION_EXISTS_IN_LAYER => Some(Self::ExistsInLayer),
            ACTION_EXISTS_IN_OTHER_LAYER => Some(Self::ExistsInOtherLayer),
            _ => None,
        }
    }

    #[must_use]
    pub fn action(&self) -> &'static str {
        match self {
            Self::New => ACTION_NEW,
            Self::ExistsInLayer => ACTION_EXISTS_IN_LAYER,
            Self::ExistsInOtherLayer => ACTION_EXISTS_IN_OTHER_LAYER,
        }
    }
}

impl fmt::Display for ValidationCase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::New => write!(f, "new patient"),
            Self::ExistsInLayer => write!(f, "patient already registered in this layer"),
            Self::ExistsInOtherLayer => write!(f, "patient registered in another layer"),
        }
    }
}

/// Existing data the backend returned for a known patient.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PatientSnapshot {
    pub patient: Option<Patient>,
    pub caregiver: Option<Caregiver>,
    pub variables: Vec<VariableValue>,
}

/// Classification of a patient against a research layer.
#[derive(Debug, Clone, PartialEq)]
pub enum ValidationResult {
    /// No record anywhere.
    New,
    /// The patient has register `register_id` in the target layer.
    ExistsInLayer {
        register_id: String,
        snapshot: PatientSnapshot,
    },
    /// The patient has register `register_id`, but in another layer.
    ExistsInOtherLayer {
        register_id: String,
        snapshot: PatientSnapshot,
    },
}

impl ValidationResult {
    /// Classifies a `validatePatient` response.
    ///
    /// # Errors
    ///
    /// Returns `InvalidResponse` for an unknown `action`, or when an
    /// existing-patient case comes without a register id. Neither defaults
    /// to one of the three cases.
    pub fn from_response(response: ValidatePatientResponse) -> ClientResult<Self> {
        let case = ValidationCase::from_action(&response.action).ok_or_else(|| {
            ClientError::invalid_response(format!(
                "unknown patient validation action '{}'",
                response.action
            ))
        })?;

        if case == ValidationCase::New {
            return Ok(Self::New);
        }

        let register_id = response
            .register_id
            .filter(|id| !id.trim().is_empty())
            .ok_or_else(|| {
                ClientError::invalid_response(format!("'{}' without a registerId", case.action()))
            })?;
        let snapshot = PatientSnapshot {
            patient: response.patient,
            caregiver: response.caregiver,
            variables: response.variables,
        };

        Ok(match case {
            ValidationCase::ExistsInLayer => Self::ExistsInLayer {
                register_id,
                snapshot,
            },
            _ => Self::ExistsInOtherLayer {
                register_id,
                snapshot,
            },
        })
    }

    #[must_use]
    pub fn case(&self) -> ValidationCase {
        match self {
            Self::New => ValidationCase::New,
            Self::ExistsInLayer { .. } => ValidationCase::ExistsInLayer,
            Self::ExistsInOtherLayer { .. } => ValidationCase::ExistsInOtherLayer,
        }
    }

    #[must_use]
    pub fn register_id(&self) -> Option<&str> {
        match self {
            Self::New => None,
            Self::ExistsInLayer { register_id, .. } | Self::ExistsInOtherLayer { register_id, .. } => {
                Some(register_id)
            }
        }
    }

    #[must_use]
    pub fn snapshot(&self) -> Option<&PatientSnapshot> {
        match self {
            Self::New => None,
            Self::ExistsInLayer { snapshot, .. } | Self::ExistsInOtherLayer { snapshot, .. } => {
                Some(snapshot)
            }
        }
    }
}

/// What a successful save did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaveOutcome {
    Created { register_id: Option<String> },
    Updated { register_id: String },
    Moved { register_id: String },
}

#[derive(Debug, Clone)]
struct Classified {
    identifier: i64,
    research_layer_id: String,
    result: ValidationResult,
}

/// Data-entry session for one patient registration.
#[derive(Debug, Clone)]
pub struct RegistrationForm {
    research_layer_id: String,
    identifier: Option<i64>,
    patient: Patient,
    caregiver: Option<Caregiver>,
    variables: Vec<VariableValue>,
    classified: Option<Classified>,
}

impl RegistrationForm {
    /// Creates an empty form targeting `research_layer_id`.
    #[must_use]
    pub fn new(research_layer_id: impl Into<String>) -> Self {
        Self {
            research_layer_id: research_layer_id.into(),
            identifier: None,
            patient: Patient::default(),
            caregiver: None,
            variables: Vec::new(),
            classified: None,
        }
    }

    pub fn research_layer_id(&self) -> &str {
        &self.research_layer_id
    }

    pub fn identifier(&self) -> Option<i64> {
        self.identifier
    }

    /// Sets the patient identifier. A different value discards the current
    /// classification; returns `true` when that happened.
    pub fn set_identifier(&mut self, identifier: i64) -> bool {
        if self.identifier == Some(identifier) {
            return false;
        }
        self.identifier = Some(identifier);
        self.invalidate()
    }

    /// Changes the target layer, discarding the current classification.
    pub fn set_research_layer(&mut self, research_layer_id: impl Into<String>) -> bool {
        let research_layer_id = research_layer_id.into();
        if self.research_layer_id == research_layer_id {
            return false;
        }
        self.research_layer_id = research_layer_id;
        self.invalidate()
    }

    fn invalidate(&mut self) -> bool {
        let invalidated = self.classified.take().is_some();
        if invalidated {
            tracing::debug!("Patient classification invalidated");
        }
        invalidated
    }

    pub fn patient(&self) -> &Patient {
        &self.patient
    }

    pub fn patient_mut(&mut self) -> &mut Patient {
        &mut self.patient
    }

    pub fn caregiver(&self) -> Option<&Caregiver> {
        self.caregiver.as_ref()
    }

    pub fn set_caregiver(&mut self, caregiver: Option<Caregiver>) {
        self.caregiver = caregiver;
    }

    pub fn variables(&self) -> &[VariableValue] {
        &self.variables
    }

    /// Inserts or replaces the value of variable `id`.
    pub fn set_variable(&mut self, id: &str, value: Value) {
        match self.variables.iter_mut().find(|v| v.id == id) {
            Some(existing) => existing.value = value,
            None => self.variables.push(VariableValue::new(id, value)),
        }
    }

    /// The active classification, if it is still fresh.
    pub fn validation(&self) -> Option<&ValidationResult> {
        self.classified.as_ref().map(|c| &c.result)
    }

    #[must_use]
    pub fn is_validated(&self) -> bool {
        self.classified.is_some()
    }

    /// Clears every field and the classification.
    pub fn reset(&mut self) {
        self.identifier = None;
        self.clear_data();
        self.classified = None;
    }

    fn clear_data(&mut self) {
        self.patient = Patient::default();
        self.caregiver = None;
        self.variables.clear();
    }

    /// Classifies the patient against the target layer and pre-fills the form.
    ///
    /// On error the form is left unclassified and the user has to retry.
    ///
    /// # Errors
    ///
    /// - `Validation` if the identifier or layer is missing (no request is made)
    /// - any service error from the `validatePatient` call
    pub async fn validate(&mut self, client: &RegistryClient) -> ClientResult<ValidationCase> {
        let identifier = self
            .identifier
            .ok_or_else(|| ClientError::validation("Patient identification number is required"))?;
        if self.research_layer_id.trim().is_empty() {
            return Err(ClientError::validation("Research layer is required"));
        }

        self.classified = None;
        let result = client
            .validate_patient(identifier, &self.research_layer_id)
            .await?;

        self.apply(&result);
        let case = result.case();
        tracing::info!(identifier, layer = %self.research_layer_id, %case, "Patient classified");
        self.classified = Some(Classified {
            identifier,
            research_layer_id: self.research_layer_id.clone(),
            result,
        });
        Ok(case)
    }

    fn apply(&mut self, result: &ValidationResult) {
        match result {
            ValidationResult::New => self.clear_data(),
            ValidationResult::ExistsInLayer { snapshot, .. } => {
                self.patient = snapshot.patient.clone().unwrap_or_default();
                self.caregiver = snapshot.caregiver.clone();
                self.variables = snapshot.variables.clone();
            }
            ValidationResult::ExistsInOtherLayer { snapshot, .. } => {
                // Variables belong to the other layer and are not carried over.
                self.patient = snapshot.patient.clone().unwrap_or_default();
                self.caregiver = snapshot.caregiver.clone();
                self.variables.clear();
            }
        }
    }

    /// Builds the request body from the current form data.
    pub fn payload(&self) -> ClientResult<RegisterPayload> {
        let identifier = self
            .identifier
            .ok_or_else(|| ClientError::validation("Patient identification number is required"))?;
        if self.patient.name.trim().is_empty() {
            return Err(ClientError::validation("Patient name is required"));
        }
        let mut patient = self.patient.clone();
        patient.identification_number = identifier;
        Ok(RegisterPayload {
            research_layer_id: self.research_layer_id.clone(),
            patient,
            caregiver: self.caregiver.clone(),
            variables_info: self.variables.clone(),
        })
    }

    /// Saves the registration along the path chosen by the classification.
    ///
    /// The classification is consumed on success. On failure it is kept so
    /// the save can be retried.
    ///
    /// # Errors
    ///
    /// - `NotValidated` if there is no classification for the current
    ///   identifier and layer (no request is made)
    /// - `Validation` if required fields are missing
    /// - `MoveNotConfirmed` if a cross-layer move is not reflected by the
    ///   follow-up validation
    /// - any service error
    pub async fn save(&mut self, client: &RegistryClient) -> ClientResult<SaveOutcome> {
        let result = match &self.classified {
            Some(c)
                if Some(c.identifier) == self.identifier
                    && c.research_layer_id == self.research_layer_id =>
            {
                c.result.clone()
            }
            _ => return Err(ClientError::NotValidated),
        };
        let payload = self.payload()?;

        let outcome = match result {
            ValidationResult::New => {
                let receipt = client.create_register(&payload).await?;
                SaveOutcome::Created {
                    register_id: receipt.register_id,
                }
            }
            ValidationResult::ExistsInLayer { register_id, .. } => {
                client.update_register(&register_id, &payload).await?;
                SaveOutcome::Updated { register_id }
            }
            ValidationResult::ExistsInOtherLayer { register_id, .. } => {
                client.update_register(&register_id, &payload).await?;
                let check = client
                    .validate_patient(payload.patient.identification_number, &self.research_layer_id)
                    .await?;
                if check.case() != ValidationCase::ExistsInLayer {
                    return Err(ClientError::MoveNotConfirmed {
                        layer: self.research_layer_id.clone(),
                    });
                }
                SaveOutcome::Moved {
                    register_id: check.register_id().unwrap_or(&register_id).to_string(),
                }
            }
        };

        tracing::info!(?outcome, "Registration saved");
        self.classified = None;
        Ok(outcome)
    }
}
