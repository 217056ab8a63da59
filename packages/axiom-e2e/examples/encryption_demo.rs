//! # Encryption Demo
//!
//! Two devices exchange sodium keys and talk in both directions, then a
//! legacy "1.0" envelope is produced for comparison.
//!
//! ## Run
//!
//! ```bash
//! RUST_LOG=debug cargo run --example encryption_demo
//! ```

use std::sync::Arc;

use axiom_e2e::{E2eConfig, E2eService, MemoryCredentialStore, MemoryKeyValueStore};
use tracing_subscriber::EnvFilter;

fn new_device() -> E2eService {
    E2eService::new(
        E2eConfig::default(),
        Arc::new(MemoryCredentialStore::new()),
        Arc::new(MemoryKeyValueStore::new()),
    )
}

#[tokio::main]
async fn main() -> axiom_e2e::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    println!("=== Axiom E2E: Encryption Demo ===\n");

    // Step 1: Two independent identities
    println!("Step 1: Initializing Alice and Bob...");
    let alice = new_device();
    let bob = new_device();
    alice.initialize().await?;
    bob.initialize().await?;

    let alice_pk = alice.public_key().await.unwrap_or_default();
    let bob_pk = bob.public_key().await.unwrap_or_default();
    println!("  Alice's public key: {}", alice_pk);
    println!("  Bob's public key:   {}", bob_pk);
    println!();

    // Step 2: Key exchange (normally through the key directory)
    println!("Step 2: Exchanging public keys...");
    alice.add_contact_key_sodium("bob", &bob_pk).await?;
    bob.add_contact_key_sodium("alice", &alice_pk).await?;
    println!("  Alice -> bob channel: {:?}", alice.resolve_channel("bob")?.namespace());
    println!();

    // Step 3: Alice writes to Bob
    println!("Step 3: Alice encrypts \"hello\" for Bob...");
    let envelope = alice.encrypt_message("hello", "bob").await?;
    println!("  Envelope: {}", envelope);
    let plaintext = bob.decrypt_message(&envelope, "alice").await?;
    println!("  Bob reads: \"{}\"", plaintext);
    println!();

    // Step 4: Bob replies
    println!("Step 4: Bob replies...");
    let reply = bob.encrypt_message("hello back", "alice").await?;
    println!("  Alice reads: \"{}\"", alice.decrypt_message(&reply, "bob").await?);
    println!();

    // Step 5: Fingerprints for out-of-band comparison
    println!("Step 5: Security fingerprints...");
    if let Some(fp) = alice.generate_security_fingerprint("bob").await {
        println!("  Alice sees: {}", fp);
    }
    if let Some(fp) = bob.generate_security_fingerprint("alice").await {
        println!("  Bob sees:   {}", fp);
    }
    println!("  (local key first, so the two sides differ)");
    println!();

    // Step 6: Tamper detection
    println!("Step 6: Tamper detection...");
    let tampered = envelope.replacen("\"cipher\":\"", "\"cipher\":\"AAAA", 1);
    match bob.decrypt_message(&tampered, "alice").await {
        Ok(_) => println!("  [FAILED] Tampered envelope was accepted!"),
        Err(e) => println!("  [OK] Rejected: {}", e),
    }
    println!();

    // Step 7: Legacy envelope
    println!("Step 7: Legacy \"1.0\" envelope to self...");
    let legacy_pk = alice.legacy_public_key().await.unwrap_or_default();
    alice.add_contact_key("self", &legacy_pk).await?;
    let legacy = alice.encrypt_message("Bonjour Axiom", "self").await?;
    println!("  Envelope: {}", legacy);
    println!("  Decrypted: \"{}\"", alice.decrypt_message(&legacy, "self").await?);
    println!();

    // Step 8: Metadata
    println!("Step 8: Metadata seal...");
    let sealed = alice.encrypt_metadata("holiday-photo.jpg")?;
    println!("  Sealed: {}", sealed);
    println!("  Opened: {}", alice.decrypt_metadata(&sealed)?);
    println!();

    println!("=== Example Complete ===");
    Ok(())
}
