//! Tolerant execution of fallible sub-steps.
//!
//! A failing step is logged at `warn` and handed back as an `Err` value so
//! sibling steps in the same cycle still run. Panics are not caught.

use anyhow::Result;
use std::future::Future;
use tracing::warn;

/// Await `fut`, logging a failure under `context`.
pub async fn attempt<T, F>(context: &str, fut: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    let result = fut.await;
    if let Err(e) = &result {
        warn!(error = %format!("{e:#}"), "{context}");
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_attempt_returns_err_without_propagating() {
        let result: Result<u32> = attempt("step failed (tolerated)", async {
            anyhow::bail!("reverted")
        })
        .await;
        assert_eq!(result.unwrap_err().to_string(), "reverted");

        let ok = attempt("unused", async { Ok::<_, anyhow::Error>(7) }).await;
        assert_eq!(ok.unwrap(), 7);
    }
}
