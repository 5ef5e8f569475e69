//! Element resolver over a live page

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use cdp_adapter::{AdapterErrorKind, Cdp};
use tokio::time::Instant;
use tracing::debug;

use crate::errors::LocatorError;
use crate::matcher::match_descriptor;
use crate::types::{Resolution, TargetDescriptor};

/// Snapshot cadence while waiting for a target to appear.
pub const RESOLVE_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Element resolver trait
#[async_trait]
pub trait ElementResolver: Send + Sync {
    /// Resolve against the page as it is right now
    async fn resolve(&self, descriptor: &TargetDescriptor) -> Result<Resolution, LocatorError>;

    /// Keep resolving until the target appears or `timeout` elapses
    async fn resolve_within(
        &self,
        descriptor: &TargetDescriptor,
        timeout: Duration,
    ) -> Result<Resolution, LocatorError>;
}

/// Default element resolver implementation
pub struct DefaultElementResolver {
    cdp: Arc<dyn Cdp>,
}

impl DefaultElementResolver {
    pub fn new(cdp: Arc<dyn Cdp>) -> Self {
        Self { cdp }
    }

    pub fn cdp(&self) -> &Arc<dyn Cdp> {
        &self.cdp
    }
}

#[async_trait]
impl ElementResolver for DefaultElementResolver {
    async fn resolve(&self, descriptor: &TargetDescriptor) -> Result<Resolution, LocatorError> {
        let snapshot = self.cdp.snapshot().await?;
        match_descriptor(&snapshot, descriptor)
    }

    async fn resolve_within(
        &self,
        descriptor: &TargetDescriptor,
        timeout: Duration,
    ) -> Result<Resolution, LocatorError> {
        let started = Instant::now();
        let mut attempts = 0u32;
        loop {
            attempts += 1;
            match self.resolve(descriptor).await {
                Ok(Resolution::Found(handle)) => {
                    debug!(
                        descriptor = %descriptor,
                        attempts,
                        node = %handle.node.attribute_value(),
                        "target resolved"
                    );
                    return Ok(Resolution::Found(handle));
                }
                Ok(Resolution::NotFound) => {}
                // Snapshots taken mid-navigation fail transiently.
                Err(LocatorError::Cdp(err))
                    if started.elapsed() < timeout
                        && !matches!(
                            err.kind,
                            AdapterErrorKind::NotAttached | AdapterErrorKind::CdpIo
                        ) =>
                {
                    debug!(descriptor = %descriptor, error = %err, "snapshot failed, retrying");
                }
                Err(err) => return Err(err),
            }

            let elapsed = started.elapsed();
            if elapsed >= timeout {
                debug!(descriptor = %descriptor, attempts, "target absent after timeout");
                return Ok(Resolution::NotFound);
            }
            tokio::time::sleep(RESOLVE_POLL_INTERVAL.min(timeout - elapsed)).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Role;
    use cdp_adapter::fake::{FakeDom, FakeElement, FakePage};

    fn page() -> Arc<FakePage> {
        let mut dom = FakeDom::new("https://play.google.com/console");
        dom.push(FakeElement::heading("All apps"));
        dom.push(FakeElement::button("Create app"));
        Arc::new(FakePage::new(dom))
    }

    #[tokio::test]
    async fn resolve_finds_present_target() {
        let resolver = DefaultElementResolver::new(page());
        let found = resolver
            .resolve(&TargetDescriptor::new(Role::Button, ["create app", "crea app"]))
            .await
            .unwrap();
        assert_eq!(found.found().unwrap().name, "Create app");
    }

    #[tokio::test]
    async fn resolve_within_reports_absence_after_timeout() {
        let resolver = DefaultElementResolver::new(page());
        let started = Instant::now();
        let result = resolver
            .resolve_within(
                &TargetDescriptor::new(Role::Button, ["Create release"]),
                Duration::from_millis(250),
            )
            .await
            .unwrap();
        assert_eq!(result, Resolution::NotFound);
        assert!(started.elapsed() >= Duration::from_millis(250));
    }

    #[tokio::test]
    async fn resolve_within_waits_for_late_elements() {
        let page = page();
        let resolver = DefaultElementResolver::new(page.clone());
        let late = page.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(150)).await;
            late.mutate(|dom| {
                dom.push(FakeElement::text("Release created"));
            })
            .await;
        });
        let result = resolver
            .resolve_within(
                &TargetDescriptor::text(["release created"]),
                Duration::from_secs(2),
            )
            .await
            .unwrap();
        assert!(result.is_found());
    }
}
