//! Retrying request/response exchange with a remote entity owner
//!
//! One ask is a loop of attempts: resolve the current owner, send, await a
//! response within the configured timeout. The owner is re-resolved on every
//! attempt because its location may change between attempts (e.g. after a
//! shard rebalance). Which outcomes end the loop is the caller's decision,
//! expressed through a classifier; the loop itself only hard-codes that a
//! timeout is worth retrying.

use crate::strategy::RetryAttempt;
use async_trait::async_trait;
use effigy_core::config::AskConfig;
use effigy_core::EffigyError;
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, warn};

/// One ask toward the remote owner of an entity
#[async_trait]
pub trait MessageTarget<M, R>: Send + Sync {
    /// Send the message and await the owner's response
    async fn ask(&self, message: M) -> Result<R, EffigyError>;
}

/// Classifier decision for one attempt outcome
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AskVerdict {
    /// Resolve the ask with this outcome, success or terminal error;
    /// no further attempts
    Complete,
    /// Transient failure; schedule the next attempt per strategy
    RetryTransient,
}

/// Default classifier: retry outcomes whose error is transient, complete
/// everything else (successes and terminal errors alike)
pub fn transient_errors_retry<R>(outcome: &Result<R, EffigyError>) -> AskVerdict {
    match outcome {
        Ok(_) => AskVerdict::Complete,
        Err(err) if err.is_transient() => AskVerdict::RetryTransient,
        Err(_) => AskVerdict::Complete,
    }
}

/// Send a message to a remote entity owner, retrying per the configured
/// strategy.
///
/// `resolve_target` is evaluated before every attempt. Each attempt is
/// bounded by `config.timeout()`; a timeout counts as transient. The
/// classifier maps every attempt outcome (including resolver failures) to an
/// [`AskVerdict`]; `Complete` resolves the ask with that outcome immediately.
/// When attempts are exhausted the ask resolves with
/// [`EffigyError::RetryExhausted`] carrying the last observed cause.
///
/// A caller that abandons the returned future abandons its own wait only;
/// callers needing the run-to-completion guarantee spawn the ask, as the
/// enforcer loaders do.
pub async fn ask_with_retry<M, R, Res, ResFut, C>(
    resolve_target: Res,
    message: M,
    config: &AskConfig,
    classify: C,
) -> Result<R, EffigyError>
where
    M: Clone + Send + Sync + 'static,
    R: Send + 'static,
    Res: Fn() -> ResFut + Send + Sync,
    ResFut: Future<Output = Result<Arc<dyn MessageTarget<M, R>>, EffigyError>> + Send,
    C: Fn(&Result<R, EffigyError>) -> AskVerdict + Send + Sync,
{
    let mut state = RetryAttempt::new(config.retry.clone());
    loop {
        let attempt = state.begin_attempt();
        let outcome = one_attempt(&resolve_target, &message, config).await;
        match classify(&outcome) {
            AskVerdict::Complete => return outcome,
            AskVerdict::RetryTransient => {
                let cause = match &outcome {
                    Ok(_) => "transient failure response".to_string(),
                    Err(err) => err.to_string(),
                };
                let delay = state.next_delay(&mut rand::thread_rng());
                match delay {
                    Some(delay) => {
                        debug!(attempt, ?delay, %cause, "ask attempt failed, retrying");
                        tokio::time::sleep(delay).await;
                    }
                    None => {
                        warn!(attempt, %cause, "ask attempts exhausted");
                        return Err(EffigyError::retry_exhausted(format!(
                            "{attempt} attempt(s) failed, last cause: {cause}"
                        )));
                    }
                }
            }
        }
    }
}

async fn one_attempt<M, R, Res, ResFut>(
    resolve_target: &Res,
    message: &M,
    config: &AskConfig,
) -> Result<R, EffigyError>
where
    M: Clone + Send + Sync + 'static,
    R: Send + 'static,
    Res: Fn() -> ResFut + Send + Sync,
    ResFut: Future<Output = Result<Arc<dyn MessageTarget<M, R>>, EffigyError>> + Send,
{
    // re-resolve: the owner may have moved since the previous attempt
    let target = resolve_target().await?;
    match tokio::time::timeout(config.timeout(), target.ask(message.clone())).await {
        Ok(outcome) => outcome,
        Err(_) => Err(EffigyError::service_unavailable(format!(
            "no response within {}ms",
            config.timeout_ms
        ))),
    }
}
