//! Invoke, validate, post-process, retry.

use serde::Serialize;
use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::client::{BackoffClient, ModelRequest};
use crate::contracts::{FieldError, Validation};
use crate::errors::StageError;
use crate::events::StageReporter;

/// Calls the model until its answer passes `validate`, at most
/// `validation_retries + 1` times.
///
/// A valid answer is passed through `post_process` and the result is
/// validated again; only a value that is still valid is returned. An invalid
/// answer re-issues the identical request. Model-call failures end the loop
/// at once without using up a retry.
///
/// # Errors
///
/// Returns [`StageError::Validation`] with the last attempt's errors once the
/// retries are used up, [`StageError::Model`] for a failed call and
/// [`StageError::Cancelled`] when the build is cancelled.
pub async fn invoke_validated<T, V, P>(
    client: &BackoffClient,
    request: &ModelRequest,
    reporter: &StageReporter,
    validation_retries: u32,
    validate: V,
    mut post_process: P,
) -> Result<T, StageError>
where
    T: Serialize,
    V: Fn(&Value) -> Validation<T>,
    P: FnMut(T) -> T,
{
    let attempts = validation_retries.saturating_add(1);
    let mut errors = Vec::new();

    for attempt in 1..=attempts {
        if reporter.is_cancelled() {
            return Err(StageError::Cancelled);
        }

        let output = client.call(request, reporter).await?;

        errors = match validate(&output.content) {
            Validation::Valid(value) => {
                let processed = post_process(value);
                match recheck(&processed, &validate) {
                    None => {
                        debug!(label = %request.label, attempt, "Stage output accepted");
                        return Ok(processed);
                    }
                    Some(errors) => errors,
                }
            }
            Validation::Invalid(errors) => errors,
        };

        warn!(
            build_id = %reporter.build_id(),
            stage = %reporter.stage(),
            attempt,
            max_attempts = attempts,
            errors = errors.len(),
            "Stage output failed validation"
        );
        reporter
            .progress(
                &format!("Output failed validation (attempt {attempt} of {attempts})"),
                json!({
                    "attempt": attempt,
                    "maxAttempts": attempts,
                    "errors": errors.iter().map(FieldError::to_dict).collect::<Vec<_>>(),
                }),
            )
            .await;
    }

    Err(StageError::Validation { attempts, errors })
}

/// Validates a post-processed value again; `None` means it is still valid.
fn recheck<T, V>(value: &T, validate: &V) -> Option<Vec<FieldError>>
where
    T: Serialize,
    V: Fn(&Value) -> Validation<T>,
{
    match serde_json::to_value(value) {
        Ok(raw) => match validate(&raw) {
            Validation::Valid(_) => None,
            Validation::Invalid(errors) => Some(errors),
        },
        Err(e) => Some(vec![FieldError::new("$", "serializable document", e.to_string())]),
    }
}
