//! Registry client for the population epilepsy register.
//!
//! Provides:
//! - [`RegistryClient`]: typed access to the registry API, with every request
//!   routed through the session's [`TokenManager`](registro_auth::TokenManager)
//! - [`RegistrationForm`]: patient data entry gated by reconciliation against
//!   the target research layer
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use registro_auth::MemoryCredentialStore;
//! use registro_client::{ClientConfig, RegistrationForm, RegistryClient};
//!
//! # async fn run() -> registro_client::ClientResult<()> {
//! let config = ClientConfig::new("https://registro.example.org");
//! let client = RegistryClient::from_config(&config, Arc::new(MemoryCredentialStore::new()))?;
//! client.auth().login("doctor@example.org", "secret").await?;
//!
//! let mut form = RegistrationForm::new("layer-1");
//! form.set_identifier(123_456_789);
//! form.validate(&client).await?;
//! form.patient_mut().name = "Ana Pérez".into();
//! form.save(&client).await?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod model;
pub mod reconcile;
pub mod service;

pub use config::{ClientConfig, ConfigError};
pub use error::ClientError;
pub use model::{
    Caregiver, Patient, RegisterPayload, RegisterReceipt, ResearchLayer, ValidatePatientResponse,
    VariableValue,
};
pub use reconcile::{
    PatientSnapshot, RegistrationForm, SaveOutcome, ValidationCase, ValidationResult,
};
pub use service::RegistryClient;

/// Result type for registry operations.
pub type ClientResult<T> = Result<T, ClientError>;
