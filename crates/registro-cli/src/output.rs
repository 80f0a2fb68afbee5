use colored::Colorize;
use registro_client::{ResearchLayer, ValidationResult, VariableValue};
use serde::Serialize;
use serde_json::Value;
use tabled::builder::Builder;
use tabled::settings::Style;

use crate::cli::OutputFormat;

pub fn print_json<T: Serialize>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(json) => println!("{json}"),
        Err(e) => print_error(&format!("Failed to render output: {e}")),
    }
}

pub fn print_success(msg: &str) {
    println!("{} {}", "✓".green(), msg);
}

pub fn print_error(msg: &str) {
    eprintln!("{} {}", "✗".red(), msg);
}

pub fn print_layers(layers: &[ResearchLayer], format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(&layers),
        OutputFormat::Table => {
            if layers.is_empty() {
                println!("No research layers found.");
                return;
            }
            let mut builder = Builder::default();
            builder.push_record(["ID", "Name", "Description"]);
            for layer in layers {
                builder.push_record([
                    layer.id.as_str(),
                    layer.layer_name.as_str(),
                    layer.description.as_deref().unwrap_or("-"),
                ]);
            }
            println!("{}", builder.build().with(Style::rounded()));
        }
    }
}

pub fn print_validation(result: &ValidationResult, format: OutputFormat) {
    let case = result.case();
    match format {
        OutputFormat::Json => {
            let snapshot = result.snapshot();
            print_json(&serde_json::json!({
                "action": case.action(),
                "registerId": result.register_id(),
                "patient": snapshot.and_then(|s| s.patient.as_ref()),
                "caregiver": snapshot.and_then(|s| s.caregiver.as_ref()),
                "variables": snapshot.map(|s| s.variables.as_slice()).unwrap_or_default(),
            }));
        }
        OutputFormat::Table => {
            println!("{}: {}", "Result".cyan(), case);
            if let Some(register_id) = result.register_id() {
                println!("{}: {}", "Register".cyan(), register_id);
            }
            let Some(snapshot) = result.snapshot() else {
                return;
            };
            if let Some(patient) = &snapshot.patient {
                println!("{}: {}", "Patient".cyan(), patient.name);
            }
            if let Some(caregiver) = &snapshot.caregiver {
                println!("{}: {}", "Caregiver".cyan(), caregiver.name);
            }
            print_variables(&snapshot.variables);
        }
    }
}

fn print_variables(variables: &[VariableValue]) {
    if variables.is_empty() {
        return;
    }
    let mut builder = Builder::default();
    builder.push_record(["Variable", "Value"]);
    for variable in variables {
        let value = match &variable.value {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        builder.push_record([variable.name.as_deref().unwrap_or(&variable.id), value.as_str()]);
    }
    println!("{}", builder.build().with(Style::rounded()));
}
