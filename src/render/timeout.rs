//! Deadline enforcement for render operations
//!
//! Wraps a render future in `tokio::time::timeout`. Exceeding the deadline drops
//! the future; the underlying CDP call is not cancelled cooperatively, the remedy
//! for a hung call is a browser restart driven by the executor.

use std::future::Future;
use std::time::Duration;

use super::errors::RenderError;

/// Run `operation` with an explicit deadline
///
/// # Returns
/// * `Ok(T)` - Operation completed in time
/// * `Err(RenderError::Timeout)` - Deadline elapsed first
/// * `Err(_)` - The operation's own error, unchanged
pub async fn with_render_timeout<F, T>(
    operation: F,
    deadline: Duration,
    operation_name: &str,
) -> Result<T, RenderError>
where
    F: Future<Output = Result<T, RenderError>>,
{
    match tokio::time::timeout(deadline, operation).await {
        Ok(result) => result,
        Err(_) => Err(RenderError::timeout(format!(
            "{operation_name} exceeded deadline of {} ms",
            deadline.as_millis()
        ))),
    }
}
