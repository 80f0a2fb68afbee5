use std::collections::BTreeMap;
use std::fs;
use std::io::{self, Read};
use std::path::Path;

use anyhow::{Context, Result};
use colored::Colorize;
use registro_client::{Caregiver, RegistrationForm, RegistryClient, SaveOutcome, ValidationCase};
use serde::Deserialize;
use serde_json::{Map, Value};

use crate::cli::{OutputFormat, PatientArgs};
use crate::output::{print_json, print_layers, print_success, print_validation};

/// Data entered for a registration, overlaid on what validation pre-filled.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RegistrationInput {
    pub patient: Map<String, Value>,
    pub caregiver: Option<Caregiver>,
    pub variables: BTreeMap<String, Value>,
}

fn read_input(file: &Option<String>) -> Result<RegistrationInput> {
    let content = match file {
        Some(path) => {
            fs::read_to_string(path).with_context(|| format!("Failed to read file: {path}"))?
        }
        None => {
            let mut buf = String::new();
            io::stdin()
                .read_to_string(&mut buf)
                .context("Failed to read from stdin")?;
            buf
        }
    };
    serde_json::from_str(&content).context("Invalid JSON")
}

fn apply_input(form: &mut RegistrationForm, input: RegistrationInput) -> Result<()> {
    if !input.patient.is_empty() {
        let mut patient = serde_json::to_value(form.patient())?;
        if let Value::Object(fields) = &mut patient {
            fields.extend(input.patient);
        }
        *form.patient_mut() = serde_json::from_value(patient).context("Invalid patient data")?;
    }
    if let Some(caregiver) = input.caregiver {
        form.set_caregiver(Some(caregiver));
    }
    for (id, value) in input.variables {
        form.set_variable(&id, value);
    }
    Ok(())
}

pub async fn layers(client: &RegistryClient, format: OutputFormat) -> Result<()> {
    let layers = client.list_research_layers().await?;
    print_layers(&layers, format);
    Ok(())
}

pub async fn validate(client: &RegistryClient, args: &PatientArgs, format: OutputFormat) -> Result<()> {
    let result = client.validate_patient(args.id, &args.layer).await?;
    print_validation(&result, format);
    Ok(())
}

pub async fn save(
    client: &RegistryClient,
    args: &PatientArgs,
    file: &Option<String>,
    format: OutputFormat,
) -> Result<()> {
    let input = read_input(file)?;

    let mut form = RegistrationForm::new(args.layer.as_str());
    form.set_identifier(args.id);
    let case = form.validate(client).await?;
    match case {
        ValidationCase::New => println!("New patient, creating register..."),
        ValidationCase::ExistsInLayer => println!("Patient already in layer, updating register..."),
        ValidationCase::ExistsInOtherLayer => {
            println!("Patient registered in another layer, moving to {}...", args.layer)
        }
    }

    apply_input(&mut form, input)?;
    let outcome = form.save(client).await?;
    match &outcome {
        SaveOutcome::Created { register_id } => print_success(&format!(
            "Created register {}",
            register_id.as_deref().unwrap_or("?").cyan()
        )),
        SaveOutcome::Updated { register_id } => {
            print_success(&format!("Updated register {}", register_id.cyan()))
        }
        SaveOutcome::Moved { register_id } => print_success(&format!(
            "Moved register {} to layer {}",
            register_id.cyan(),
            args.layer.cyan()
        )),
    }
    if matches!(format, OutputFormat::Json) {
        print_json(&form.payload()?);
    }
    Ok(())
}

pub async fn delete(client: &RegistryClient, register_id: &str) -> Result<()> {
    client.delete_register(register_id).await?;
    print_success(&format!("Deleted register {}", register_id.cyan()));
    Ok(())
}

pub async fn consent(client: &RegistryClient, register_id: &str, file: &Path) -> Result<()> {
    let content =
        fs::read(file).with_context(|| format!("Failed to read file: {}", file.display()))?;
    let file_name = file
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("consent.pdf");
    client.upload_consent(register_id, file_name, content).await?;
    print_success(&format!(
        "Uploaded consent {} for register {}",
        file_name.cyan(),
        register_id.cyan()
    ));
    Ok(())
}
