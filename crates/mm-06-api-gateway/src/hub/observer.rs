//! Bus registration for the hub.

use async_trait::async_trait;
use shared_bus::{EventObserver, MirrorEvent, ObserverError};

use super::BroadcastHub;

#[async_trait]
impl EventObserver for BroadcastHub {
    fn name(&self) -> &'static str {
        "broadcast-hub"
    }

    async fn on_event(&self, event: &MirrorEvent) -> Result<(), ObserverError> {
        let result = match event {
            MirrorEvent::MempoolChanged(change) => self.handle_mempool_change(change).await,
            MirrorEvent::BlockArrived(arrival) => self.handle_block_arrival(arrival).await,
            MirrorEvent::LoadingChanged(indicators) => self.handle_loading(indicators),
            MirrorEvent::DonationConfirmed(id) => self.handle_donation(id),
        };
        result
            .map(|_| ())
            .map_err(|e| ObserverError::Failed(e.to_string()))
    }
}
