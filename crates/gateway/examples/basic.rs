//! Basic example: build a Vaultgate engine over the in-memory state store
//! and the logging gateway, then walk through the access flow and a
//! broadcast.
//!
//! Run with: `cargo run -p vaultgate-gateway --example basic`

use std::sync::Arc;
use std::time::Duration;

use vaultgate_core::{LinkTarget, Location, StaticPrivileges, SubjectId};
use vaultgate_gateway::{BroadcastOptions, Vaultgate};
use vaultgate_provider::LogGateway;
use vaultgate_state_memory::MemoryStateStore;

#[tokio::main]
async fn main() {
    let admin = SubjectId::new("1");
    let vaultgate = Vaultgate::builder()
        .state(Arc::new(MemoryStateStore::new()))
        .gateway(Arc::new(LogGateway::new("log")))
        .privileges(Arc::new(StaticPrivileges::new([admin.clone()], [])))
        .storage_chat("-1001")
        .bot_username("example_vault_bot")
        .auto_delete(Duration::from_secs(600))
        .broadcast_options(BroadcastOptions {
            wave_interval: Duration::from_millis(100),
            ..BroadcastOptions::default()
        })
        .build()
        .expect("failed to build engine");

    // Import a message and share it.
    let stored = vaultgate
        .store_content(&admin, &Location::new("@source_channel", 42), None)
        .await
        .expect("store failed");
    println!("Stored {} at {}", stored.reference.logical_id, stored.reference.location);

    let reader = SubjectId::new("1001");
    let link = vaultgate
        .issue_link(&reader, LinkTarget::Content(stored.reference.logical_id.clone()))
        .await
        .expect("issue link failed");
    println!("Share: {}", vaultgate.link_url(&link).unwrap_or_default());

    // The reader opens the link.
    let delivery = vaultgate
        .open_link(&reader, &link.to_payload())
        .await
        .expect("access refused");
    println!(
        "Delivered {} copies, deleted at {:?}",
        delivery.copies.len(),
        delivery.delete_at
    );

    // Without a token the same request is refused.
    let refused = vaultgate
        .request_access(&SubjectId::new("2002"), &stored.reference.logical_id, None)
        .await;
    println!("Stranger without a token: {}", refused.unwrap_err());

    // Broadcast an announcement to everyone who has been in touch.
    let summary = vaultgate
        .broadcast(&admin, &Location::new("@source_channel", 43))
        .await
        .expect("broadcast failed");
    println!(
        "Broadcast: {}/{} delivered in {} waves",
        summary.succeeded, summary.total, summary.waves_completed
    );

    let stats = vaultgate.stats().await.expect("stats failed");
    println!("{}", serde_json::to_string_pretty(&stats).expect("stats render"));
}
