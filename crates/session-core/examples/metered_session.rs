//! Full metered-session lifecycle against the in-memory mock transport.
//!
//! Run with: cargo run -p clearmeter-session-core --example metered_session

use std::sync::Arc;

use clearmeter_channel_core::client::MockChannelTransport;
use clearmeter_channel_core::Address;
use clearmeter_infra_common::logging::{setup_logging, LoggingConfig};
use clearmeter_session_core::api::builder::SessionManagerBuilder;
use clearmeter_session_core::SessionError;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    setup_logging(LoggingConfig::from_env())?;

    let participant = Address::parse("0x36518CC3e9ba6Cdd5b8c2e51b5fCd60271AC2c1b")?;
    let counterparty = Address::parse("0xd3a5Bef2b345CF3A4Ad40a00B56bbA5B4e4e4c7b")?;

    let transport = Arc::new(MockChannelTransport::new());
    let coordinator = SessionManagerBuilder::new()
        .with_application("clearmeter-demo")
        .with_counterparty(counterparty)
        .build_with_transport(transport)
        .await?;

    let started = coordinator.start_session(participant).await?;
    tracing::info!(
        "Started session {} (channel {}), cap {}",
        started.session_id,
        started.channel_session_id,
        started.initial_allocation.participant
    );

    // Spend the whole allocation in default-cost increments.
    loop {
        match coordinator.increment_usage_default(&started.session_id).await {
            Ok(receipt) => tracing::info!(
                "Usage {} -> total cost {}, balance {}",
                receipt.usage_count,
                receipt.total_cost,
                receipt.remaining_balance
            ),
            Err(SessionError::InsufficientBalance {
                requested,
                available,
                ..
            }) => {
                tracing::info!(
                    "Allocation exhausted: requested {}, available {}",
                    requested,
                    available
                );
                break;
            }
            Err(e) => return Err(e.into()),
        }
    }

    let summary = coordinator.end_session(&started.session_id).await?;
    tracing::info!(
        "Settled after {} uses: participant {}, counterparty {}, duration {:?}",
        summary.usage_count,
        summary.final_allocation.participant,
        summary.final_allocation.counterparty,
        summary.duration
    );

    Ok(())
}
