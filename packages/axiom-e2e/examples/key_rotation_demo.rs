//! # Key Rotation Demo
//!
//! Rotation discards the old identity. Envelopes sealed before it can no
//! longer be opened, and contacts have to re-run key exchange.
//!
//! ## Run
//!
//! ```bash
//! cargo run --example key_rotation_demo
//! ```

use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

use axiom_e2e::exchange::{KeyExchangeRequest, KeyExchangeResponse, PublicKeyLookup};
use axiom_e2e::{
    E2eConfig, E2eService, EncryptionType, KeyDirectory, KeyExchange, MemoryCredentialStore,
    MemoryKeyValueStore, Result,
};
use tracing_subscriber::EnvFilter;

/// In-process stand-in for the key directory
#[derive(Default)]
struct LoopbackDirectory {
    published: RwLock<HashMap<String, String>>,
}

impl LoopbackDirectory {
    fn publish(&self, user_id: &str, public_key: String) {
        self.published.write().insert(user_id.to_string(), public_key);
    }
}

#[async_trait]
impl KeyDirectory for LoopbackDirectory {
    async fn exchange_keys(&self, request: KeyExchangeRequest) -> Result<KeyExchangeResponse> {
        let public_key = self
            .published
            .read()
            .get(&request.target_user_id)
            .cloned()
            .unwrap_or_default();
        Ok(KeyExchangeResponse {
            verified: !public_key.is_empty(),
            public_key,
            encryption_type: EncryptionType::Sodium,
        })
    }

    async fn lookup_public_key(&self, user_id: &str) -> Result<Option<PublicKeyLookup>> {
        Ok(self.published.read().get(user_id).map(|key| PublicKeyLookup {
            user_id: user_id.to_string(),
            public_key: key.clone(),
            encryption_type: EncryptionType::Sodium,
        }))
    }

    async fn revoke_key(&self, user_id: &str) -> Result<()> {
        self.published.write().remove(user_id);
        Ok(())
    }
}

fn new_device() -> Arc<E2eService> {
    Arc::new(E2eService::new(
        E2eConfig::default(),
        Arc::new(MemoryCredentialStore::new()),
        Arc::new(MemoryKeyValueStore::new()),
    ))
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    println!("=== Axiom E2E: Key Rotation Demo ===\n");

    let directory = Arc::new(LoopbackDirectory::default());
    let alice = new_device();
    let bob = new_device();
    alice.initialize().await?;
    bob.initialize().await?;

    directory.publish("alice", alice.public_key().await.unwrap_or_default());
    directory.publish("bob", bob.public_key().await.unwrap_or_default());

    let alice_exchange = KeyExchange::new(alice.clone(), directory.clone());
    let bob_exchange = KeyExchange::new(bob.clone(), directory.clone());

    println!("Step 1: Exchanging keys through the directory...");
    alice_exchange.exchange_with("bob").await?;
    bob_exchange.exchange_with("alice").await?;
    let before = alice.encrypt_message("sent before rotation", "bob").await?;
    println!("  Bob reads: \"{}\"", bob.decrypt_message(&before, "alice").await?);
    println!();

    println!("Step 2: Alice rotates her identity...");
    let failed = alice_exchange.rotate_and_reexchange().await?;
    println!("  Re-exchange failures: {:?}", failed);
    directory.publish("alice", alice.public_key().await.unwrap_or_default());
    println!();

    println!("Step 3: Bob still holds Alice's old key...");
    let after = alice.encrypt_message("sent after rotation", "bob").await?;
    match bob.decrypt_message(&after, "alice").await {
        Ok(_) => println!("  [FAILED] Stale key still opened the envelope!"),
        Err(e) => println!("  [OK] Cannot decrypt: {}", e),
    }
    println!();

    println!("Step 4: Bob refreshes Alice's key...");
    bob_exchange.refresh_contact("alice").await?;
    println!("  Bob reads: \"{}\"", bob.decrypt_message(&after, "alice").await?);
    println!();

    println!("=== Example Complete ===");
    Ok(())
}
