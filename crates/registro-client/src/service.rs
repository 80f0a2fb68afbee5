//! Registry service.
//!
//! Thin typed wrapper over the registry REST API. Every request is sent
//! through the [`TokenManager`], which attaches the bearer token and
//! recovers from an expired session.

use std::sync::Arc;

use registro_auth::{CredentialStore, TokenManager};
use reqwest::multipart::{Form, Part};
use reqwest::{Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::config::ClientConfig;
use crate::error::ClientError;
use crate::model::{RegisterPayload, RegisterReceipt, ResearchLayer, ValidatePatientResponse};
use crate::reconcile::ValidationResult;
use crate::ClientResult;

/// Client for the registry API.
#[derive(Debug, Clone)]
pub struct RegistryClient {
    auth: Arc<TokenManager>,
    api_base: String,
}

impl RegistryClient {
    /// Creates a client sending requests to `api_base` through `auth`.
    pub fn new(auth: Arc<TokenManager>, api_base: &str) -> Self {
        Self {
            auth,
            api_base: api_base.trim_end_matches('/').to_string(),
        }
    }

    /// Builds the HTTP client, token manager and registry client from
    /// `config`.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if `config` does not validate.
    pub fn from_config(config: &ClientConfig, store: Arc<dyn CredentialStore>) -> ClientResult<Self> {
        config.validate()?;
        let http = config.http_client()?;
        let auth = TokenManager::with_client(http, &config.base_url, config.auth.clone(), store)?;
        Ok(Self::new(Arc::new(auth), &config.api_base()))
    }

    pub fn auth(&self) -> &Arc<TokenManager> {
        &self.auth
    }

    pub fn api_base(&self) -> &str {
        &self.api_base
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.api_base, path.trim_start_matches('/'))
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.auth
            .http()
            .request(method, self.url(path))
            .header("Accept", "application/json")
    }

    /// Email of the logged-in user, sent with every registry write.
    ///
    /// Read from the access token, falling back to the email given at login.
    ///
    /// # Errors
    ///
    /// Returns `Unauthorized` when there is no session, and
    /// `InvalidResponse` when the session has no known email (a restored
    /// token without an email claim).
    pub fn user_email(&self) -> ClientResult<String> {
        let credential = self.auth.credential().ok_or_else(|| ClientError::Unauthorized {
            message: "no active session".to_string(),
        })?;
        credential.email().map(str::to_string).ok_or_else(|| {
            ClientError::invalid_response(
                "the access token carries no email claim; log in again to set it",
            )
        })
    }

    async fn send(&self, builder: RequestBuilder) -> ClientResult<Response> {
        let request = builder.build()?;
        Ok(self.auth.dispatch(request).await?)
    }

    /// Classifies patient `identifier` against `research_layer_id`.
    ///
    /// # Errors
    ///
    /// - `Validation` if the identifier is not positive or the layer is empty
    ///   (no request is made)
    /// - `InvalidResponse` for an unknown action
    /// - any transport or HTTP error
    pub async fn validate_patient(
        &self,
        identifier: i64,
        research_layer_id: &str,
    ) -> ClientResult<ValidationResult> {
        if identifier <= 0 {
            return Err(ClientError::validation(
                "Patient identification number must be a positive number",
            ));
        }
        if research_layer_id.trim().is_empty() {
            return Err(ClientError::validation("Research layer is required"));
        }
        let email = self.user_email()?;

        let response = self
            .send(self.request(Method::GET, "registers/validatePatient").query(&[
                ("researchLayerId", research_layer_id.to_string()),
                ("userEmail", email),
                ("patientIdentificationNumber", identifier.to_string()),
            ]))
            .await?;
        let body: ValidatePatientResponse = handle_response(response).await?;
        ValidationResult::from_response(body)
    }

    /// Creates a new register.
    pub async fn create_register(&self, payload: &RegisterPayload) -> ClientResult<RegisterReceipt> {
        let email = self.user_email()?;
        let response = self
            .send(
                self.request(Method::POST, "registers")
                    .query(&[("userEmail", email)])
                    .json(payload),
            )
            .await?;
        handle_receipt(response).await
    }

    /// Updates register `register_id`. Sending a different
    /// `research_layer_id` moves the patient into that layer.
    pub async fn update_register(
        &self,
        register_id: &str,
        payload: &RegisterPayload,
    ) -> ClientResult<RegisterReceipt> {
        if register_id.trim().is_empty() {
            return Err(ClientError::validation("Register id is required"));
        }
        let email = self.user_email()?;
        let response = self
            .send(
                self.request(Method::PUT, &format!("registers/{register_id}"))
                    .query(&[("userEmail", email)])
                    .json(payload),
            )
            .await?;
        handle_receipt(response).await
    }

    /// Deletes register `register_id`.
    pub async fn delete_register(&self, register_id: &str) -> ClientResult<()> {
        if register_id.trim().is_empty() {
            return Err(ClientError::validation("Register id is required"));
        }
        let email = self.user_email()?;
        let response = self
            .send(
                self.request(Method::DELETE, &format!("registers/{register_id}"))
                    .query(&[("userEmail", email)]),
            )
            .await?;
        expect_success(response).await
    }

    /// Uploads a signed consent document for `register_id`.
    pub async fn upload_consent(
        &self,
        register_id: &str,
        file_name: &str,
        content: Vec<u8>,
    ) -> ClientResult<()> {
        if register_id.trim().is_empty() {
            return Err(ClientError::validation("Register id is required"));
        }
        if content.is_empty() {
            return Err(ClientError::validation("Consent file is empty"));
        }
        let email = self.user_email()?;

        let build = || {
            let form = Form::new()
                .text("registerId", register_id.to_string())
                .part(
                    "file",
                    Part::bytes(content.clone()).file_name(file_name.to_string()),
                );
            self.request(Method::POST, "consents")
                .query(&[("userEmail", email.as_str())])
                .multipart(form)
        };
        let response = self.auth.dispatch_with(build).await?;
        expect_success(response).await
    }

    /// Lists the research layers visible to the user.
    pub async fn list_research_layers(&self) -> ClientResult<Vec<ResearchLayer>> {
        let response = self.send(self.request(Method::GET, "researchLayer")).await?;
        handle_response(response).await
    }
}

async fn error_for(response: Response) -> ClientError {
    let status = response.status().as_u16();
    let body = response.text().await.unwrap_or_default();
    tracing::debug!(status, "Registry request failed");
    ClientError::from_status(status, &body)
}

async fn handle_response<T: DeserializeOwned>(response: Response) -> ClientResult<T> {
    if !response.status().is_success() {
        return Err(error_for(response).await);
    }
    let body = response.text().await?;
    serde_json::from_str(&body)
        .map_err(|e| ClientError::invalid_response(format!("Failed to parse response JSON: {e}")))
}

async fn handle_receipt(response: Response) -> ClientResult<RegisterReceipt> {
    if !response.status().is_success() {
        return Err(error_for(response).await);
    }
    let body = response.text().await?;
    if body.trim().is_empty() {
        return Ok(RegisterReceipt::default());
    }
    // Some endpoints answer with a bare string or a shape without an id.
    match serde_json::from_str::<Value>(&body) {
        Ok(json @ Value::Object(_)) => Ok(serde_json::from_value(json).unwrap_or_default()),
        _ => Ok(RegisterReceipt::default()),
    }
}

async fn expect_success(response: Response) -> ClientResult<()> {
    if !response.status().is_success() {
        return Err(error_for(response).await);
    }
    Ok(())
}
