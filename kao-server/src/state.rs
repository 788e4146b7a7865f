//! Application state shared across all request handlers.

use crate::hub::BroadcastHub;
use kao_core::scheduler::SchedulerHandle;
use kao_core::vmc::VmcHandle;
use std::sync::Arc;

/// Shared state: the long-lived scheduler, hub, and VMC client owned by
/// the process entry point. Cloneable and cheap to pass around.
#[derive(Clone)]
pub struct AppState {
    pub scheduler: SchedulerHandle,
    pub hub: Arc<BroadcastHub>,
    /// Absent when the VMC peer is disabled in the config.
    pub vmc: Option<VmcHandle>,
    /// Webhook signing secret; absent means verification is disabled.
    pub webhook_secret: Option<Arc<str>>,
}

impl AppState {
    pub fn new(
        scheduler: SchedulerHandle,
        hub: Arc<BroadcastHub>,
        vmc: Option<VmcHandle>,
        webhook_secret: Option<String>,
    ) -> Self {
        Self {
            scheduler,
            hub,
            vmc,
            webhook_secret: webhook_secret.map(Into::into),
        }
    }
}
