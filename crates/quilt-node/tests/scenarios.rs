//! End-to-end scenarios over in-memory caches and the loopback network.

use std::collections::HashMap;
use std::ops::ControlFlow;
use std::path::Path;
use std::sync::Arc;

use quilt_cache::MemoryCache;
use quilt_core::{payload, Alias, ChannelName};
use quilt_net::BroadcastOutcome;
use quilt_node::{Configuration, Node, NodeError, WriteOptions};
use quilt_testkit::{account, open_validators, LoopbackNetwork};

fn test_config(root: &Path) -> Configuration {
    let mut vars = HashMap::new();
    vars.insert(
        "ROOT_DIRECTORY".to_owned(),
        root.display().to_string(),
    );
    let mut config = Configuration::from_vars(vars);
    // A closed local port so remote registration fails immediately and
    // registration falls back to local mining.
    config.registrar = "http://127.0.0.1:9".to_owned();
    config
}

fn offline_node(name: &str, seed: u8, cache: Arc<MemoryCache>, root: &Path) -> Arc<Node> {
    Arc::new(Node::new(
        account(name, seed),
        test_config(root),
        cache,
        Arc::new(LoopbackNetwork::offline()),
    ))
}

/// S1: alias registration, uniqueness, and idempotence.
#[tokio::test]
async fn alias_registration() {
    let root = tempfile::tempdir().unwrap();
    let cache = Arc::new(MemoryCache::new());

    let alice = offline_node("alice", 1, Arc::clone(&cache), root.path());
    let record = alice.aliases().register().await.unwrap();

    // Exactly one binding, carrying alice's keys.
    let mut bindings = Vec::new();
    alice
        .aliases()
        .iterate(|binding| {
            bindings.push(binding.clone());
            ControlFlow::Continue(())
        })
        .await
        .unwrap();
    assert_eq!(bindings.len(), 1);
    assert_eq!(bindings[0].alias.as_str(), "alice");
    assert_eq!(
        bindings[0].signing_key,
        *alice.account().keypair().public_key().as_bytes()
    );

    // Lookup and reverse lookup agree.
    let alias = Alias::new("alice").unwrap();
    let identity = alice.aliases().lookup(&alias).await.unwrap();
    assert_eq!(identity, alice.account().identity());
    let reversed = alice
        .aliases()
        .reverse_lookup(&alice.account().keypair().public_key())
        .await
        .unwrap();
    assert_eq!(reversed, alias);
    assert!(!alice.aliases().is_unique(&alias).await.unwrap());

    // Registering again with the same keys is idempotent.
    let again = alice.aliases().register().await.unwrap();
    assert_eq!(again, record);

    // A different key under the same alias is refused.
    let impostor = offline_node("alice", 99, Arc::clone(&cache), root.path());
    let result = impostor.aliases().register().await;
    assert!(matches!(result, Err(NodeError::AliasTaken(a)) if a == "alice"));
}

/// S2: public record round trip, plus the signature invariant.
#[tokio::test]
async fn public_record_roundtrip() {
    let root = tempfile::tempdir().unwrap();
    let cache = Arc::new(MemoryCache::new());
    let node = offline_node("alice", 1, cache, root.path());

    let channel = ChannelName::new("T").unwrap();
    node.channel_with(&channel, open_validators()).await;

    node.write(&channel, b"hello", &[], WriteOptions::default())
        .await
        .unwrap();
    node.mine(&channel).await.unwrap();

    let mut events = Vec::new();
    node.read(&channel, 0, |event| {
        // Every record in the accepted chain verifies against its
        // creator's key.
        event
            .record
            .verify(&node.account().keypair().public_key())
            .unwrap();
        events.push((event.payload.clone(), event.sealed));
        ControlFlow::Continue(())
    })
    .await
    .unwrap();

    assert_eq!(events.len(), 1);
    assert_eq!(events[0].0.as_ref(), b"hello");
    assert!(!events[0].1);
}

/// S3: encrypted record round trip; a non-recipient sees nothing.
#[tokio::test]
async fn encrypted_record_roundtrip() {
    let root = tempfile::tempdir().unwrap();
    let cache = Arc::new(MemoryCache::new());

    let alice = offline_node("alice", 1, Arc::clone(&cache), root.path());
    let bob = offline_node("bob", 2, Arc::clone(&cache), root.path());

    let channel = ChannelName::new("T").unwrap();
    alice.channel_with(&channel, open_validators()).await;
    bob.channel_with(&channel, open_validators()).await;

    let recipients = [alice.account().identity()];
    alice
        .write(&channel, b"hello", &recipients, WriteOptions::default())
        .await
        .unwrap();
    alice.mine(&channel).await.unwrap();

    let mut seen = Vec::new();
    alice
        .read(&channel, 0, |event| {
            seen.push((event.payload.clone(), event.sealed));
            ControlFlow::Continue(())
        })
        .await
        .unwrap();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].0.as_ref(), b"hello");
    assert!(seen[0].1);

    // Bob shares the cache but has no access entry: no callback.
    let mut bob_saw = 0;
    bob.read(&channel, 0, |_| {
        bob_saw += 1;
        ControlFlow::Continue(())
    })
    .await
    .unwrap();
    assert_eq!(bob_saw, 0);
}

/// S4: equal-length forks stand; a longer chain wins; re-broadcast of an
/// accepted head is a no-op.
#[tokio::test]
async fn fork_resolution() {
    let a_root = tempfile::tempdir().unwrap();
    let b_root = tempfile::tempdir().unwrap();
    let a_cache = Arc::new(MemoryCache::new());
    let b_cache = Arc::new(MemoryCache::new());
    let channel = ChannelName::new("T").unwrap();

    // B is offline; A's single peer is B.
    let b_node = offline_node("bob", 2, Arc::clone(&b_cache), b_root.path());
    let b_channel = b_node.channel_with(&channel, open_validators()).await;

    let a_node = Arc::new(Node::new(
        account("alice", 1),
        test_config(a_root.path()),
        Arc::clone(&a_cache) as Arc<dyn quilt_cache::Cache>,
        Arc::new(LoopbackNetwork::new(
            Arc::clone(&a_cache) as Arc<dyn quilt_cache::Cache>,
            Arc::clone(&b_cache) as Arc<dyn quilt_cache::Cache>,
            Arc::clone(&b_channel),
        )),
    ));
    let a_channel = a_node.channel_with(&channel, open_validators()).await;

    // Shared genesis: A mines and the push seeds B.
    a_node
        .write(
            &channel,
            b"genesis",
            &[],
            WriteOptions {
                timestamp: Some(1_000),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    a_node.mine(&channel).await.unwrap();
    let genesis_head = a_channel.head().await.unwrap();
    assert_eq!(b_channel.head().await.unwrap().hash, genesis_head.hash);

    // Both sides mine a private length-2 block.
    b_node
        .write(
            &channel,
            b"bob fork",
            &[],
            WriteOptions {
                timestamp: Some(2_000),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    b_node.mine(&channel).await.unwrap();

    a_node
        .write(
            &channel,
            b"alice fork",
            &[],
            WriteOptions {
                timestamp: Some(2_001),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    a_node.mine(&channel).await.unwrap();

    // Equal-length fork: neither side replaces the other.
    let outcome = a_channel
        .push(&*a_cache, a_node.network().as_ref())
        .await
        .unwrap();
    assert_eq!(outcome, BroadcastOutcome::EqualFork);
    let b_fork_head = b_channel.head().await.unwrap();
    assert_ne!(b_fork_head.hash, a_channel.head().await.unwrap().hash);

    // A extends to length 3; B adopts and its fork tip is orphaned.
    a_node
        .write(
            &channel,
            b"tiebreak",
            &[],
            WriteOptions {
                timestamp: Some(3_000),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    a_node.mine(&channel).await.unwrap();

    let a_head = a_channel.head().await.unwrap();
    assert_eq!(b_channel.head().await.unwrap().hash, a_head.hash);
    assert_ne!(b_channel.head().await.unwrap().hash, b_fork_head.hash);

    // Broadcast idempotence: pushing the accepted head again changes
    // nothing.
    let outcome = a_channel
        .push(&*a_cache, a_node.network().as_ref())
        .await
        .unwrap();
    assert_eq!(outcome, BroadcastOutcome::Accepted);
    assert_eq!(b_channel.head().await.unwrap().hash, a_head.hash);
}

/// Cold start from disk: configuration, key store, filesystem cache.
#[tokio::test]
async fn cold_start_from_disk() {
    let root = tempfile::tempdir().unwrap();
    let config = test_config(root.path());

    // First run: create and persist the account.
    let store = quilt_seal::KeyStore::open(&config.keys_dir).unwrap();
    let alias = Alias::new("alice").unwrap();
    let account = quilt_seal::Account::from_seed(alias.clone(), &[5; 32]);
    store.save(&account, "hunter2hunter2", "hunter2hunter2").unwrap();

    let channel = ChannelName::new("T").unwrap();
    {
        let cache = Arc::new(quilt_cache::FsCache::open(&config.cache_dir).unwrap());
        let node = Arc::new(Node::new(
            account.clone(),
            config.clone(),
            cache as Arc<dyn quilt_cache::Cache>,
            Arc::new(LoopbackNetwork::offline()),
        ));
        node.channel_with(&channel, open_validators()).await;
        node.write(&channel, b"persisted", &[], WriteOptions::default())
            .await
            .unwrap();
        node.mine(&channel).await.unwrap();
    }

    // Second run: reload the account and cache from disk and read back.
    let reloaded = store.load(&alias, "hunter2hunter2").unwrap();
    assert_eq!(reloaded.identity(), account.identity());

    let cache = Arc::new(quilt_cache::FsCache::open(&config.cache_dir).unwrap());
    let node = Arc::new(Node::new(
        reloaded,
        config.clone(),
        cache as Arc<dyn quilt_cache::Cache>,
        Arc::new(LoopbackNetwork::offline()),
    ));
    node.channel_with(&channel, open_validators()).await;

    let mut payloads = Vec::new();
    node.read(&channel, 0, |event| {
        payloads.push(event.payload.clone());
        ControlFlow::Continue(())
    })
    .await
    .unwrap();
    assert_eq!(payloads.len(), 1);
    assert_eq!(payloads[0].as_ref(), b"persisted");

    // The on-disk layout.
    assert!(config.cache_dir.join("block").is_dir());
    assert!(config.cache_dir.join("channel").is_dir());
    assert!(config.cache_dir.join("entry").is_dir());
    assert!(config.cache_dir.join("mapping").is_dir());
    assert!(config.keys_dir.join("alice.private").is_file());
}

/// The payments surface decodes registration and subscription records.
#[tokio::test]
async fn payments_queries() {
    let root = tempfile::tempdir().unwrap();
    let cache = Arc::new(MemoryCache::new());
    let node = offline_node("operator", 1, cache, root.path());

    let registrations = ChannelName::new(quilt_node::REGISTRATION_CHANNEL).unwrap();
    let subscriptions = ChannelName::new(quilt_node::SUBSCRIPTION_CHANNEL).unwrap();
    node.channel_with(&registrations, open_validators()).await;
    node.channel_with(&subscriptions, open_validators()).await;

    let alias = Alias::new("alice").unwrap();
    let registration = payload::Registration {
        alias: alias.clone(),
        plan: "standard".to_owned(),
        timestamp: 1_000,
    };
    node.write(
        &registrations,
        &payload::to_bytes(&registration).unwrap(),
        &[],
        WriteOptions::default(),
    )
    .await
    .unwrap();
    node.mine(&registrations).await.unwrap();

    let subscription = payload::Subscription {
        alias: alias.clone(),
        expires: 5_000,
    };
    node.write(
        &subscriptions,
        &payload::to_bytes(&subscription).unwrap(),
        &[],
        WriteOptions::default(),
    )
    .await
    .unwrap();
    node.mine(&subscriptions).await.unwrap();

    let found = node.payments().registration_for(&alias).await.unwrap();
    assert_eq!(found, Some(registration));

    assert!(node.payments().is_active(&alias, 4_999).await.unwrap());
    assert!(!node.payments().is_active(&alias, 5_001).await.unwrap());

    let nobody = Alias::new("nobody").unwrap();
    assert_eq!(node.payments().registration_for(&nobody).await.unwrap(), None);
}
