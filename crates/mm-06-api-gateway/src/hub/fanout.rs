//! Event fan-out: one frame per connection per event.

use mm_04_projection::ProjectedBlock;
use shared_bus::{BlockArrival, LoadingIndicators, MempoolChange};
use shared_types::{ExtendedTransaction, TxStatus, Txid};
use std::collections::{HashMap, HashSet};
use tracing::{debug, warn};

use super::{BroadcastHub, ResolveCache};
use crate::domain::{matches_tracked, ClientSubscription, ConnectionId, GatewayError, PushFrame};

/// Per-event data shared by every connection's mempool frame.
struct MempoolContext<'a> {
    change: &'a MempoolChange,
    projection: &'a [ProjectedBlock],
    rbf: &'a HashMap<Txid, ExtendedTransaction>,
    stats: PushFrame,
}

/// Per-event data shared by every connection's block frame.
struct BlockContext<'a> {
    arrival: &'a BlockArrival,
    confirmed: HashSet<&'a str>,
    projection: Option<&'a [ProjectedBlock]>,
    header: PushFrame,
}

/// Tracked-id changes to write back after a frame was built.
#[derive(Default)]
struct SubscriptionUpdate {
    clear_track_tx: bool,
    clear_track_mempool_tx: bool,
}

/// Share of the block's non-coinbase transactions that the top projected
/// block predicted, in percent.
pub(crate) fn match_rate(matches: usize, block_tx_count: usize) -> u32 {
    if block_tx_count <= 1 {
        return 0;
    }
    ((matches as f64 / (block_tx_count - 1) as f64) * 100.0).round() as u32
}

impl BroadcastHub {
    /// Recompute the projection and push the changes to every connection.
    ///
    /// Returns the number of frames queued.
    pub async fn handle_mempool_change(
        &self,
        change: &MempoolChange,
    ) -> Result<usize, GatewayError> {
        let projection = self.recompute_projection();
        let rbf = mm_02_mempool::find_rbf_transactions(
            &change.new_transactions,
            &change.deleted_transactions,
        );

        let mut stats = PushFrame::new();
        {
            let store = self.mempool.read();
            stats.insert("mempoolInfo", store.mempool_info())?;
            stats.insert(
                "vBytesPerSecond",
                &store.throughput(self.time_source.now()).vbytes_per_second,
            )?;
        }
        let latest: Vec<_> = change
            .new_transactions
            .iter()
            .take(self.config.recent_transactions)
            .map(ExtendedTransaction::stripped)
            .collect();
        stats.insert("transactions", &latest)?;

        let context = MempoolContext {
            change,
            projection: projection.as_slice(),
            rbf: &rbf,
            stats,
        };

        let mut cache = ResolveCache::new();
        let mut sent = 0;
        for (id, subscription) in self.subscriptions() {
            match self.mempool_frame(&context, &subscription, &mut cache).await {
                Ok((frame, update)) => {
                    self.apply_update(&id, update);
                    if !frame.is_empty() && self.deliver(&id, &frame) {
                        sent += 1;
                    }
                }
                Err(e) => {
                    warn!(connection_id = %id, error = %e, "Failed to build mempool update");
                }
            }
        }

        debug!(
            new = change.new_transactions.len(),
            deleted = change.deleted_transactions.len(),
            replacements = rbf.len(),
            sent,
            "Mempool change broadcast"
        );
        Ok(sent)
    }

    async fn mempool_frame(
        &self,
        context: &MempoolContext<'_>,
        subscription: &ClientSubscription,
        cache: &mut ResolveCache,
    ) -> Result<(PushFrame, SubscriptionUpdate), GatewayError> {
        let mut frame = PushFrame::new();
        let mut update = SubscriptionUpdate::default();
        let new_transactions = &context.change.new_transactions;

        if subscription.want_stats {
            frame.merge(context.stats.clone());
        }
        if subscription.want_mempool_blocks {
            frame.insert("mempool-blocks", context.projection)?;
        }

        if let Some(watched) = &subscription.track_mempool_tx {
            if let Some(tx) = new_transactions.iter().find(|tx| &tx.txid == watched) {
                frame.insert("tx", &self.resolve_or_unresolved(tx, cache).await)?;
                update.clear_track_mempool_tx = true;
            }
        }

        if subscription.tracks_outputs() {
            let mut found = Vec::new();
            for tx in new_transactions {
                let tx = self.resolve_or_unresolved(tx, cache).await;
                if matches_tracked(
                    &tx,
                    subscription.track_address.as_deref(),
                    subscription.track_asset.as_deref(),
                ) {
                    found.push(tx);
                }
            }
            if !found.is_empty() {
                frame.insert("address-transactions", &found)?;
            }
        }

        if let Some(replacement) = subscription
            .track_tx
            .as_ref()
            .and_then(|tracked| context.rbf.get(tracked))
        {
            frame.insert("rbfTransaction", replacement)?;
        }

        Ok((frame, update))
    }

    /// Record the match rate, drop confirmed transactions from the mempool
    /// snapshot and push the block to every connection that wants blocks.
    ///
    /// Returns the number of frames queued.
    pub async fn handle_block_arrival(
        &self,
        arrival: &BlockArrival,
    ) -> Result<usize, GatewayError> {
        let predicted: HashSet<Txid> = self
            .projection()
            .first()
            .map(|top| top.transaction_ids.iter().cloned().collect())
            .unwrap_or_default();
        let matches: Vec<Txid> = arrival
            .txids
            .iter()
            .filter(|txid| predicted.contains(*txid))
            .cloned()
            .collect();
        let rate = match_rate(matches.len(), arrival.txids.len());

        let recomputed = if matches.is_empty() {
            None
        } else {
            self.mempool.write().remove(&matches);
            Some(self.recompute_projection())
        };

        let hash = arrival.block.hash().to_string();
        let last_difficulty_adjustment = {
            let mut chain = self.chain.write();
            chain.set_match_rate(&hash, rate);
            chain.last_difficulty_adjustment().unwrap_or_default()
        };

        let mut block = arrival.block.summary();
        block.match_rate = Some(rate);
        let mut header = PushFrame::new();
        header.insert("block", &block)?;
        header.insert("mempoolInfo", self.mempool.read().mempool_info())?;
        header.insert("lastDifficultyAdjustment", &last_difficulty_adjustment)?;

        let context = BlockContext {
            arrival,
            confirmed: arrival.txids.iter().map(String::as_str).collect(),
            projection: recomputed.as_deref().map(Vec::as_slice),
            header,
        };

        let mut cache = ResolveCache::new();
        let mut sent = 0;
        for (id, subscription) in self.subscriptions() {
            if !subscription.want_blocks {
                continue;
            }
            match self.block_frame(&context, &subscription, &mut cache).await {
                Ok((frame, update)) => {
                    self.apply_update(&id, update);
                    if self.deliver(&id, &frame) {
                        sent += 1;
                    }
                }
                Err(e) => {
                    warn!(connection_id = %id, error = %e, "Failed to build block update");
                }
            }
        }

        debug!(
            height = arrival.block.height(),
            hash = %hash,
            match_rate = rate,
            removed = matches.len(),
            sent,
            "Block broadcast"
        );
        Ok(sent)
    }

    async fn block_frame(
        &self,
        context: &BlockContext<'_>,
        subscription: &ClientSubscription,
        cache: &mut ResolveCache,
    ) -> Result<(PushFrame, SubscriptionUpdate), GatewayError> {
        let mut frame = context.header.clone();
        let mut update = SubscriptionUpdate::default();

        if let (Some(projection), true) = (context.projection, subscription.want_mempool_blocks) {
            frame.insert("mempool-blocks", projection)?;
        }

        if subscription
            .track_tx
            .as_deref()
            .is_some_and(|tracked| context.confirmed.contains(tracked))
        {
            frame.insert("txConfirmed", &true)?;
            update.clear_track_tx = true;
        }

        if subscription.tracks_outputs() {
            let block = &context.arrival.block;
            let mut found = Vec::new();
            for tx in &context.arrival.transactions {
                let mut tx = self.resolve_or_unresolved(tx, cache).await;
                if matches_tracked(
                    &tx,
                    subscription.track_address.as_deref(),
                    subscription.track_asset.as_deref(),
                ) {
                    tx.status =
                        TxStatus::confirmed_in(block.height(), block.hash(), block.block.timestamp);
                    found.push(tx);
                }
            }
            if !found.is_empty() {
                frame.insert("block-transactions", &found)?;
            }
        }

        Ok((frame, update))
    }

    /// Store new loading progress and push it to every connection.
    pub fn handle_loading(&self, indicators: &LoadingIndicators) -> Result<usize, GatewayError> {
        *self.loading.write() = indicators.clone();

        let mut frame = PushFrame::new();
        frame.insert("loadingIndicators", indicators)?;
        let ids: Vec<ConnectionId> = self.connections.iter().map(|entry| *entry.key()).collect();
        Ok(ids.iter().filter(|id| self.deliver(id, &frame)).count())
    }

    /// Notify connections tracking a donation that it was confirmed.
    pub fn handle_donation(&self, donation_id: &str) -> Result<usize, GatewayError> {
        let mut frame = PushFrame::new();
        frame.insert("donationConfirmed", &true)?;
        let mut sent = 0;
        for (id, subscription) in self.subscriptions() {
            if subscription.track_donation.as_deref() == Some(donation_id)
                && self.deliver(&id, &frame)
            {
                sent += 1;
            }
        }
        Ok(sent)
    }

    fn apply_update(&self, id: &ConnectionId, update: SubscriptionUpdate) {
        if !update.clear_track_tx && !update.clear_track_mempool_tx {
            return;
        }
        self.update_subscription(id, |subscription| {
            if update.clear_track_tx {
                subscription.track_tx = None;
            }
            if update.clear_track_mempool_tx {
                subscription.track_mempool_tx = None;
            }
        });
    }
}
