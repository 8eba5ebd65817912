//! Command-line arguments for the external merge program.
//!
//! The mapping from [`JobRequest`] to argv is fixed and deterministic:
//!
//! ```text
//! --base-model <base> --target-model <target> --output-path <out>
//! --finetune-output <path>     (once per fine-tune, in order)
//! --weight <w>                 (once per weight, if given)
//! --density <d>                (once per density, if given)
//! ```

use crate::request::JobRequest;

pub const FLAG_BASE_MODEL: &str = "--base-model";
pub const FLAG_TARGET_MODEL: &str = "--target-model";
pub const FLAG_OUTPUT_PATH: &str = "--output-path";
pub const FLAG_FINETUNE_OUTPUT: &str = "--finetune-output";
pub const FLAG_WEIGHT: &str = "--weight";
pub const FLAG_DENSITY: &str = "--density";

/// Build the argument list for a validated request.
pub fn build_merge_args(request: &JobRequest) -> Vec<String> {
    let mut args = vec![
        FLAG_BASE_MODEL.to_string(),
        request.base_model.clone(),
        FLAG_TARGET_MODEL.to_string(),
        request.target_model.clone(),
        FLAG_OUTPUT_PATH.to_string(),
        request.output_path.clone(),
    ];

    for path in &request.finetune_outputs {
        args.push(FLAG_FINETUNE_OUTPUT.to_string());
        args.push(path.clone());
    }

    if let Some(weights) = &request.weights {
        for w in weights {
            args.push(FLAG_WEIGHT.to_string());
            args.push(w.to_string());
        }
    }

    if let Some(densities) = &request.densities {
        for d in densities {
            args.push(FLAG_DENSITY.to_string());
            args.push(d.to_string());
        }
    }

    args
}
