// SPDX-License-Identifier: MIT

//! Call wrapper applied around every LLM invocation

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

/// Pause applied after each model call to stay under provider rate limits
pub const DEFAULT_THROTTLE: Duration = Duration::from_millis(1500);

/// Run `call`, logging its outcome under `step`, then pause for `delay`.
///
/// The pause only follows successful calls; failures propagate immediately.
pub async fn llm_call<T, E, F>(step: &str, delay: Duration, call: F) -> Result<T, E>
where
    F: Future<Output = Result<T, E>>,
    E: Display,
{
    log::info!("Starting LLM call: {}", step);
    match call.await {
        Ok(result) => {
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            log::info!("Completed LLM call: {}", step);
            Ok(result)
        }
        Err(e) => {
            log::error!("Error in LLM call {}: {}", step, e);
            Err(e)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    #[tokio::test]
    async fn test_passes_result_through_after_delay() {
        let started = Instant::now();
        let result: Result<u32, String> =
            llm_call("query_gen", Duration::from_millis(20), async { Ok(7) }).await;
        assert_eq!(result, Ok(7));
        assert!(started.elapsed() >= Duration::from_millis(20));
    }

    #[tokio::test]
    async fn test_error_propagates_without_delay() {
        let started = Instant::now();
        let result: Result<u32, String> = llm_call("query_gen", Duration::from_secs(5), async {
            Err("rate limited".to_string())
        })
        .await;
        assert_eq!(result, Err("rate limited".to_string()));
        assert!(started.elapsed() < Duration::from_secs(5));
    }
}
