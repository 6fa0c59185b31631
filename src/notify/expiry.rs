//! Expiry notification fan-out

use std::sync::Arc;

use tracing::{debug, info, warn};

use super::registry::{PageContexts, PageEvent};
use crate::hostname;

/// Pushes expiry events out to the page contexts showing an expired site.
///
/// Delivery is best-effort: a context whose listener is missing gets one
/// listener (re)install and one retry, and is otherwise skipped. A page that
/// could not be reached self-detects the expiry on its next load, so nothing
/// stronger is needed.
pub struct ExpiryNotifier {
    contexts: Arc<dyn PageContexts>,
}

impl ExpiryNotifier {
    pub fn new(contexts: Arc<dyn PageContexts>) -> Self {
        Self { contexts }
    }

    /// Notify every matching page context that the countdown for `key` has
    /// expired. Returns the number of contexts that accepted the event.
    pub async fn notify(&self, key: &str) -> usize {
        let key = hostname::normalize(key);
        if key.is_empty() {
            return 0;
        }

        let contexts = self.contexts.enumerate().await;
        debug!("expiry fan-out for {}: {} live contexts", key, contexts.len());

        let mut delivered = 0;
        for ctx in contexts {
            let ctx_key = hostname::from_url(&ctx.url);
            if !hostname::keys_match(&ctx_key, &key) {
                continue;
            }

            match self.contexts.deliver(ctx.id, PageEvent::TimerExpired).await {
                Ok(()) => delivered += 1,
                Err(e) => {
                    debug!(
                        "expiry delivery to context {} failed ({}), reinstalling listener",
                        ctx.id, e
                    );
                    match self.contexts.install_listener(ctx.id).await {
                        Ok(()) => match self.contexts.deliver(ctx.id, PageEvent::TimerExpired).await {
                            Ok(()) => delivered += 1,
                            Err(e) => warn!(
                                "expiry delivery to context {} failed after reinstall: {}",
                                ctx.id, e
                            ),
                        },
                        Err(e) => {
                            warn!("could not reinstall listener into context {}: {}", ctx.id, e)
                        }
                    }
                }
            }
        }

        info!("expiry for {} delivered to {} context(s)", key, delivered);
        delivered
    }
}
