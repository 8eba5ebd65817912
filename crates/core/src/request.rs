//! Merge job request and its validation rules.
//!
//! Every field carries `#[serde(default)]` so that a body with missing
//! fields still deserializes; [`JobRequest::validate`] then reports the first
//! missing or malformed field by its wire name instead of a generic
//! deserialization error.

use serde::{Deserialize, Serialize};

use crate::error::JobError;

/// A request to merge fine-tuned model artifacts into a single output.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct JobRequest {
    /// Path to the base model the fine-tunes were trained from.
    pub base_model: String,
    /// Path to the target (instruct) model.
    pub target_model: String,
    /// Ordered fine-tune output paths. Must be non-empty.
    pub finetune_outputs: Vec<String>,
    /// Destination path for the merged model.
    pub output_path: String,
    /// Optional per-fine-tune merge weights.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub weights: Option<Vec<f64>>,
    /// Optional per-fine-tune densities.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub densities: Option<Vec<f64>>,
}

impl JobRequest {
    /// Check the request invariants.
    ///
    /// - `baseModel`, `targetModel`, `outputPath` are non-blank.
    /// - `finetuneOutputs` is non-empty and has no blank entries.
    /// - `weights` / `densities`, when present, match `finetuneOutputs` in
    ///   length and contain only finite numbers.
    pub fn validate(&self) -> Result<(), JobError> {
        require_path("baseModel", &self.base_model)?;
        require_path("targetModel", &self.target_model)?;
        require_path("outputPath", &self.output_path)?;

        if self.finetune_outputs.is_empty() {
            return Err(JobError::InvalidRequest(
                "finetuneOutputs must contain at least one path".to_string(),
            ));
        }
        for (idx, path) in self.finetune_outputs.iter().enumerate() {
            if path.trim().is_empty() {
                return Err(JobError::InvalidRequest(format!(
                    "finetuneOutputs[{idx}] must not be empty"
                )));
            }
        }

        validate_per_model("weights", self.weights.as_deref(), self.finetune_outputs.len())?;
        validate_per_model(
            "densities",
            self.densities.as_deref(),
            self.finetune_outputs.len(),
        )?;

        Ok(())
    }
}

fn require_path(field: &str, value: &str) -> Result<(), JobError> {
    if value.trim().is_empty() {
        return Err(JobError::InvalidRequest(format!("{field} is required")));
    }
    Ok(())
}

fn validate_per_model(field: &str, values: Option<&[f64]>, expected: usize) -> Result<(), JobError> {
    let Some(values) = values else {
        return Ok(());
    };
    if values.len() != expected {
        return Err(JobError::InvalidRequest(format!(
            "{field} must have {expected} entries (one per finetune output), got {}",
            values.len()
        )));
    }
    if let Some(idx) = values.iter().position(|v| !v.is_finite()) {
        return Err(JobError::InvalidRequest(format!(
            "{field}[{idx}] must be a finite number"
        )));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    fn valid() -> JobRequest {
        JobRequest {
            base_model: "A".to_string(),
            target_model: "B".to_string(),
            finetune_outputs: vec!["F1".to_string(), "F2".to_string()],
            output_path: "/out".to_string(),
            weights: None,
            densities: None,
        }
    }

    #[test]
    fn valid_request_passes() {
        assert!(valid().validate().is_ok());
    }

    #[test]
    fn missing_output_path_is_rejected() {
        let body = r#"{"baseModel":"A","targetModel":"B","finetuneOutputs":["F1","F2"]}"#;
        let req: JobRequest = serde_json::from_str(body).expect("deserialize");
        assert_matches!(
            req.validate(),
            Err(JobError::InvalidRequest(msg)) if msg == "outputPath is required"
        );
    }

    #[test]
    fn blank_base_model_is_rejected() {
        let req = JobRequest {
            base_model: "   ".to_string(),
            ..valid()
        };
        assert_matches!(req.validate(), Err(JobError::InvalidRequest(msg)) if msg.contains("baseModel"));
    }

    #[test]
    fn empty_finetune_list_is_rejected() {
        let req = JobRequest {
            finetune_outputs: vec![],
            ..valid()
        };
        assert_matches!(req.validate(), Err(JobError::InvalidRequest(msg)) if msg.contains("finetuneOutputs"));
    }

    #[test]
    fn blank_finetune_entry_is_rejected() {
        let req = JobRequest {
            finetune_outputs: vec!["F1".to_string(), String::new()],
            ..valid()
        };
        assert_matches!(
            req.validate(),
            Err(JobError::InvalidRequest(msg)) if msg == "finetuneOutputs[1] must not be empty"
        );
    }

    #[test]
    fn weights_length_must_match_finetunes() {
        let req = JobRequest {
            weights: Some(vec![0.5]),
            ..valid()
        };
        assert_matches!(req.validate(), Err(JobError::InvalidRequest(msg)) if msg.starts_with("weights"));
    }

    #[test]
    fn densities_length_must_match_finetunes() {
        let req = JobRequest {
            densities: Some(vec![0.5, 0.5, 0.5]),
            ..valid()
        };
        assert_matches!(req.validate(), Err(JobError::InvalidRequest(msg)) if msg.starts_with("densities"));
    }

    #[test]
    fn non_finite_weight_is_rejected() {
        let req = JobRequest {
            weights: Some(vec![0.5, f64::NAN]),
            ..valid()
        };
        assert_matches!(
            req.validate(),
            Err(JobError::InvalidRequest(msg)) if msg == "weights[1] must be a finite number"
        );
    }

    #[test]
    fn matching_weights_and_densities_pass() {
        let req = JobRequest {
            weights: Some(vec![0.7, 0.3]),
            densities: Some(vec![1.0, 0.5]),
            ..valid()
        };
        assert!(req.validate().is_ok());
    }

    #[test]
    fn deserializes_camel_case_body() {
        let body = r#"{
            "baseModel": "A",
            "targetModel": "B",
            "finetuneOutputs": ["F1"],
            "outputPath": "/out",
            "weights": [1.0]
        }"#;
        let req: JobRequest = serde_json::from_str(body).expect("deserialize");
        assert_eq!(req.finetune_outputs, vec!["F1"]);
        assert_eq!(req.weights, Some(vec![1.0]));
        assert!(req.densities.is_none());
    }
}
