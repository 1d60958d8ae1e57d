use ethers::providers::{Http, Provider, StreamExt};
use eyre::Result;
use std::path::Path;
use std::time::Duration;

use crate::models::shorten_address;
use crate::services::controller::Msg;
use crate::services::ledger::{MultiSwapOfferCreatedFilter, NftSwap};
use crate::services::logging::logger::record;
use crate::services::wallet::{WalletEvent, WalletProvider};

pub mod listening {
    use super::*;

    /// Follows `MultiSwapOfferCreated` and asks for a refresh on every new
    /// offer. Returns once the stream ends or `send` reports the runtime gone.
    pub async fn listen_for_offers<S>(
        contract: &NftSwap<Provider<Http>>,
        activity_log: &Path,
        mut send: S,
    ) -> Result<()>
    where
        S: FnMut(Msg) -> bool,
    {
        let events = contract.multi_swap_offer_created_filter();
        let mut stream = events.stream().await?;

        while let Some(Ok(event)) = stream.next().await {
            if !announce(&event, activity_log, &mut send) {
                break;
            }
        }

        Ok(())
    }

    pub(crate) fn announce<S>(event: &MultiSwapOfferCreatedFilter, activity_log: &Path, send: &mut S) -> bool
    where
        S: FnMut(Msg) -> bool,
    {
        let output = created_line(event);

        record(activity_log, &output);
        tracing::info!("{}", output);

        send(Msg::OfferCreated(event.offer_id.low_u64()))
    }

    pub(crate) fn created_line(event: &MultiSwapOfferCreatedFilter) -> String {
        format!(
            "Offer {} created by {} (expires at {})",
            event.offer_id,
            shorten_address(&event.creator),
            event.expires_at
        )
    }

    /// Polls the wallet for account and chain changes and forwards them.
    pub async fn follow_wallet<S>(wallet: &dyn WalletProvider, every: Duration, mut send: S)
    where
        S: FnMut(Msg) -> bool,
    {
        let mut interval = tokio::time::interval(every);
        loop {
            interval.tick().await;
            let events = match wallet.poll_changes().await {
                Ok(events) => events,
                Err(err) => {
                    tracing::warn!("Could not poll wallet: {}", err);
                    continue;
                }
            };
            for event in events {
                tracing::info!("Wallet reported {:?}", event);
                let msg = match event {
                    WalletEvent::AccountsChanged(accounts) => Msg::AccountsChanged(accounts),
                    WalletEvent::ChainChanged(chain_id) => Msg::ChainChanged(chain_id),
                };
                if !send(msg) {
                    return;
                }
            }
        }
    }
}
