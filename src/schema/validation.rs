//! Step validation.
//!
//! Decoding accepts a step with several variant fields populated; this
//! stage reports such steps (and steps with no variant at all) as
//! explicit errors. It never picks one variant over another.

use thiserror::Error;

use super::errors::DecodePath;
use super::step::{Step, StepKind, StepPayload};

/// Validation result type
pub type ValidationResult<T = ()> = Result<T, ValidationError>;

/// Validation error types
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// More than one variant field is populated
    #[error("step at {path} declares conflicting variants: {}", join_kinds(.kinds))]
    ConflictingVariants {
        /// Location of the step
        path: DecodePath,
        /// Populated kinds, in canonical order
        kinds: Vec<StepKind>,
    },

    /// No variant field is populated
    #[error("step at {path} declares no variant")]
    MissingVariant {
        /// Location of the step
        path: DecodePath,
    },
}

fn join_kinds(kinds: &[StepKind]) -> String {
    kinds
        .iter()
        .map(|kind| kind.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Trait for validatable types
pub trait Validate {
    /// The error type returned by validation
    type Error;

    /// Validates this instance
    fn validate(&self) -> Result<(), Self::Error>;
}

impl Validate for Step {
    type Error = ValidationError;

    fn validate(&self) -> Result<(), Self::Error> {
        match self.diagnostics(&DecodePath::root()).into_iter().next() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}

impl<T: Validate> Validate for Vec<T> {
    type Error = T::Error;

    fn validate(&self) -> Result<(), Self::Error> {
        for item in self {
            item.validate()?;
        }
        Ok(())
    }
}

impl Step {
    /// Returns the single payload of a well-formed step
    pub fn payload(&self) -> ValidationResult<&StepPayload> {
        match self.payloads.as_slice() {
            [payload] => Ok(payload),
            [] => Err(ValidationError::MissingVariant {
                path: DecodePath::root(),
            }),
            _ => Err(ValidationError::ConflictingVariants {
                path: DecodePath::root(),
                kinds: self.kinds(),
            }),
        }
    }

    /// Collects every validation error of this step and its nested steps
    pub fn diagnostics(&self, path: &DecodePath) -> Vec<ValidationError> {
        let mut errors = Vec::new();
        self.collect_diagnostics(path, &mut errors);
        errors
    }

    fn collect_diagnostics(&self, path: &DecodePath, errors: &mut Vec<ValidationError>) {
        match self.payloads.len() {
            0 => errors.push(ValidationError::MissingVariant { path: path.clone() }),
            1 => {}
            _ => errors.push(ValidationError::ConflictingVariants {
                path: path.clone(),
                kinds: self.kinds(),
            }),
        }

        for payload in &self.payloads {
            let steps_path = path.key(payload.kind().as_str()).key("steps");
            for (index, child) in payload.children().iter().enumerate() {
                child.collect_diagnostics(&steps_path.index(index), errors);
            }
        }
    }
}

/// Collects validation errors for a list of steps, located under `path`
pub fn validate_steps(steps: &[Step], path: &DecodePath) -> Vec<ValidationError> {
    steps
        .iter()
        .enumerate()
        .flat_map(|(index, step)| step.diagnostics(&path.index(index)))
        .collect()
}
