//! Poll-loop driven outcome verification

use std::sync::Arc;
use std::time::Duration;

use action_primitives::ExecCtx;
use async_trait::async_trait;
use cdp_adapter::{AdapterErrorKind, Cdp};
use tracing::{debug, info, warn};

use crate::{
    conditions::{observe, Observation},
    errors::GateError,
    types::{OutcomeSpec, PollLoop, Refresh, Verdict},
};

/// Upper bound for one refresh navigation.
const REFRESH_TIMEOUT: Duration = Duration::from_secs(30);

/// Outcome verifier trait
#[async_trait]
pub trait OutcomeVerifier: Send + Sync {
    /// Polls until a success or failure signal appears or `poll` is spent.
    ///
    /// Exhaustion yields [`Verdict::Pending`]; the context deadline ends the
    /// loop the same way.
    async fn await_outcome(
        &self,
        ctx: &ExecCtx,
        spec: &OutcomeSpec,
        poll: PollLoop,
    ) -> Result<Verdict, GateError>;
}

/// Default verifier over a live page
pub struct DefaultOutcomeVerifier {
    cdp: Arc<dyn Cdp>,
}

impl DefaultOutcomeVerifier {
    pub fn new(cdp: Arc<dyn Cdp>) -> Self {
        Self { cdp }
    }

    async fn refresh(&self, ctx: &ExecCtx, refresh: &Refresh) -> Result<(), GateError> {
        let deadline = ctx.remaining_time().min(REFRESH_TIMEOUT);
        let result = match refresh {
            Refresh::None => return Ok(()),
            Refresh::Reload => self.cdp.reload(deadline).await,
            Refresh::Navigate(url) => self.cdp.navigate(url, deadline).await,
        };
        match result {
            Ok(()) => Ok(()),
            Err(err) if matches!(err.kind, AdapterErrorKind::CdpIo | AdapterErrorKind::NotAttached) => {
                Err(err.into())
            }
            Err(err) => {
                warn!(action_id = %ctx.action_id, error = %err, "refresh incomplete, observing anyway");
                Ok(())
            }
        }
    }

    async fn sleep(&self, ctx: &ExecCtx, interval: Duration) -> Result<(), GateError> {
        tokio::select! {
            _ = ctx.cancel_token.cancelled() => {
                Err(GateError::Interrupted("cancelled between attempts".to_string()))
            }
            _ = tokio::time::sleep(interval) => Ok(()),
        }
    }
}

#[async_trait]
impl OutcomeVerifier for DefaultOutcomeVerifier {
    async fn await_outcome(
        &self,
        ctx: &ExecCtx,
        spec: &OutcomeSpec,
        mut poll: PollLoop,
    ) -> Result<Verdict, GateError> {
        spec.validate()?;
        info!(
            action_id = %ctx.action_id,
            max_attempts = poll.max_attempts(),
            interval_ms = poll.interval().as_millis() as u64,
            "awaiting remote outcome"
        );

        while let Some(attempt) = poll.begin_attempt() {
            if ctx.is_cancelled() {
                return Err(GateError::Interrupted(format!("cancelled at attempt {attempt}")));
            }
            if attempt > 1 {
                self.refresh(ctx, poll.refresh()).await?;
            }

            let observation = match self.cdp.snapshot().await {
                Ok(snapshot) => observe(&snapshot, spec)?,
                Err(err) if matches!(err.kind, AdapterErrorKind::CdpIo | AdapterErrorKind::NotAttached) => {
                    return Err(err.into());
                }
                Err(err) => {
                    warn!(action_id = %ctx.action_id, attempt, error = %err, "snapshot failed");
                    Observation::Neither
                }
            };

            match observation {
                Observation::Success(evidence) => {
                    info!(action_id = %ctx.action_id, attempt, evidence = %evidence, "success signal");
                    return Ok(Verdict::Success { attempt, evidence });
                }
                Observation::Failure(detail) => {
                    warn!(action_id = %ctx.action_id, attempt, detail = %detail, "failure signal");
                    return Ok(Verdict::Failure { attempt, detail });
                }
                Observation::Neither => {
                    debug!(action_id = %ctx.action_id, attempt, "no terminal signal yet");
                }
            }

            if poll.is_exhausted() {
                break;
            }
            if ctx.remaining_time() <= poll.interval() {
                warn!(action_id = %ctx.action_id, attempt, "deadline reached before next attempt");
                break;
            }
            self.sleep(ctx, poll.interval()).await?;
        }

        let attempts = poll.attempts_made();
        info!(action_id = %ctx.action_id, attempts, "outcome still pending");
        Ok(Verdict::Pending { attempts })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conditions::Signal;
    use cdp_adapter::fake::{FakeDom, FakeElement, FakePage};

    fn spec() -> OutcomeSpec {
        OutcomeSpec::new()
            .success(Signal::text("successfully verified|verificato con successo"))
            .failure(Signal::text("verification failed|verifica non riuscita"))
    }

    fn poll(max: u32) -> PollLoop {
        PollLoop::new(max, Duration::from_secs(5)).with_refresh(Refresh::Reload)
    }

    fn ctx() -> ExecCtx {
        ExecCtx::with_timeout(Duration::from_secs(600))
    }

    #[tokio::test(start_paused = true)]
    async fn failure_on_third_attempt_stops_the_loop() {
        let mut dom = FakeDom::new("https://play.google.com/console/app-links");
        dom.push(FakeElement::heading("App links"));
        dom.after_reloads(2, |dom| {
            dom.push(FakeElement::text("Verifica non riuscita"));
        });
        let page = Arc::new(FakePage::new(dom));
        let verifier = DefaultOutcomeVerifier::new(page.clone());

        let verdict = verifier.await_outcome(&ctx(), &spec(), poll(12)).await.unwrap();
        assert_eq!(
            verdict,
            Verdict::Failure {
                attempt: 3,
                detail: "Verifica non riuscita".into()
            }
        );
        assert_eq!(page.reload_count().await, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn exhaustion_is_pending_after_exactly_n_observations() {
        let page = Arc::new(FakePage::new(FakeDom::new("https://play.google.com/console")));
        let verifier = DefaultOutcomeVerifier::new(page.clone());

        let verdict = verifier.await_outcome(&ctx(), &spec(), poll(4)).await.unwrap();
        assert_eq!(verdict, Verdict::Pending { attempts: 4 });
        assert_eq!(page.reload_count().await, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn success_and_failure_together_is_success() {
        let mut dom = FakeDom::new("https://play.google.com/console");
        dom.push(FakeElement::text("Verification failed"));
        dom.push(FakeElement::text("Domain successfully verified"));
        let verifier = DefaultOutcomeVerifier::new(Arc::new(FakePage::new(dom)));

        let verdict = verifier.await_outcome(&ctx(), &spec(), poll(3)).await.unwrap();
        assert!(verdict.is_success());
        assert_eq!(verdict.attempts(), 1);
    }

    #[tokio::test]
    async fn cancellation_between_attempts_interrupts() {
        let page = Arc::new(FakePage::new(FakeDom::new("https://play.google.com/console")));
        let verifier = DefaultOutcomeVerifier::new(page);
        let ctx = ctx();
        let cancel = ctx.cancel_token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            cancel.cancel();
        });

        let result = verifier.await_outcome(&ctx, &spec(), poll(5)).await;
        assert!(matches!(result, Err(GateError::Interrupted(_))));
    }
}
