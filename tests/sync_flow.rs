mod common;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use bytes::Bytes;
use common::{FakeRemote, Harness, LiveServer, TEST_EMAIL};
use reviewdesk::cache::{CacheStore, LocalCache, MemoryCacheStore};
use reviewdesk::identity::IdentityProvider;
use reviewdesk::models::{
    Asset, Collection, Event, MediaStorage, ReviewStatus, Role, SkinTone, TextItem,
};
use reviewdesk::notify::{NoopNotifier, NotificationSettings};
use reviewdesk::pipeline::assets::UploadRequest;
use reviewdesk::pipeline::upload::UploadFile;
use reviewdesk::pipeline::{Dashboard, Services, SyncOutcome};
use reviewdesk::remote::HttpRemote;
use reviewdesk::seed;
use reviewdesk::storage::HttpObjectStorage;
use reviewdesk::store::Snapshot;
use reviewdesk::sync::Source;
use tokio::sync::Semaphore;

#[tokio::test]
async fn demo_seeds_once_then_reads_the_cache() -> Result<()> {
    let harness = Harness::demo();

    let first = harness.build();
    let summary = first.load_all().await;
    assert!(summary.applied);
    assert_eq!(summary.sources[&Collection::Assets], Source::Seed);
    assert!(summary.sync_errors.is_empty());
    assert_eq!(first.snapshot().await.assets, seed::assets());
    assert_eq!(harness.cache().read::<Event>(), seed::events());

    let second = harness.build();
    let summary = second.load_all().await;
    assert_eq!(summary.sources[&Collection::Assets], Source::Cache);
    assert_eq!(summary.sources[&Collection::TextItems], Source::Cache);
    assert!(harness.remote.calls().await.is_empty());
    Ok(())
}

#[tokio::test]
async fn signed_out_loads_nothing_and_writes_nothing() -> Result<()> {
    let harness = Harness::with_session(None);
    harness.cache().write(&seed::assets());

    let dashboard = harness.build();
    let summary = dashboard.load_all().await;

    assert!(summary.sources.values().all(|source| *source == Source::SignedOut));
    assert_eq!(dashboard.snapshot().await, Snapshot::default());
    assert!(harness
        .cache_store
        .get(Collection::Events.cache_key())?
        .is_none());
    assert_eq!(harness.cache().read::<Asset>().len(), seed::assets().len());
    assert_eq!(dashboard.role().await, None);
    Ok(())
}

#[tokio::test]
async fn failed_fetch_falls_back_to_cached_data() -> Result<()> {
    let harness = Harness::signed_in();
    let cached: Vec<Asset> = seed::assets().into_iter().take(2).collect();
    harness.cache().write(&cached);
    harness.remote.fail(Collection::Assets).await;

    let dashboard = harness.build();
    let summary = dashboard.load_all().await;

    assert_eq!(summary.sources[&Collection::Assets], Source::Cache);
    assert_eq!(
        summary.sync_errors,
        vec!["Could not sync assets with the server; showing locally saved data.".to_string()]
    );
    assert_eq!(dashboard.snapshot().await.assets, cached);
    assert_eq!(dashboard.take_notices().await.len(), 1);
    Ok(())
}

#[tokio::test]
async fn remote_data_replaces_the_cache_wholesale() -> Result<()> {
    let harness = Harness::signed_in();
    harness.cache().write(&seed::assets());
    let remote_asset = serde_json::json!({
        "id": "remote-1",
        "event_id": "event-spring-glow",
        "title": "From the server",
        "status": "approved",
    });
    harness.remote.set(Collection::Assets, vec![remote_asset]).await;

    let dashboard = harness.build();
    let summary = dashboard.load_all().await;

    assert_eq!(summary.sources[&Collection::Assets], Source::Remote);
    let assets = dashboard.snapshot().await.assets;
    assert_eq!(assets.len(), 1);
    assert_eq!(assets[0].status, ReviewStatus::Approved);
    assert_eq!(assets[0].skin_tone, SkinTone::All);
    assert_eq!(harness.cache().read::<Asset>(), assets);
    Ok(())
}

#[tokio::test]
async fn empty_remote_is_seeded_only_for_events() -> Result<()> {
    let harness = Harness::signed_in();

    let dashboard = harness.build();
    let summary = dashboard.load_all().await;

    assert_eq!(summary.sources[&Collection::Events], Source::RemoteSeeded);
    assert_eq!(summary.sources[&Collection::Assets], Source::Remote);
    assert_eq!(summary.sources[&Collection::TextItems], Source::Remote);

    let snapshot = dashboard.snapshot().await;
    assert_eq!(snapshot.events, seed::events());
    assert!(snapshot.assets.is_empty());
    assert_eq!(harness.remote.records(Collection::Events).await.len(), 3);
    assert_eq!(harness.remote.writes().await, vec!["save events".to_string()]);
    Ok(())
}

#[tokio::test]
async fn text_library_falls_back_as_one_unit() -> Result<()> {
    let harness = Harness::signed_in();
    harness
        .remote
        .set(
            Collection::TextItems,
            seed::text_items()
                .iter()
                .map(serde_json::to_value)
                .collect::<Result<_, _>>()?,
        )
        .await;
    harness.remote.fail(Collection::TextSections).await;

    let dashboard = harness.build();
    let summary = dashboard.load_all().await;

    for collection in [Collection::TextGroups, Collection::TextSections, Collection::TextItems] {
        assert_eq!(summary.sources[&collection], Source::Seed, "{collection}");
    }
    assert_eq!(summary.sources[&Collection::Assets], Source::Remote);
    assert_eq!(summary.sync_errors.len(), 1);
    assert_eq!(dashboard.snapshot().await.text_items, seed::text_items());
    Ok(())
}

#[tokio::test]
async fn loads_finishing_after_an_identity_change_are_discarded() -> Result<()> {
    let gate = Arc::new(Semaphore::new(0));
    let mut harness = Harness::signed_in();
    harness.remote = Arc::new(FakeRemote::gated(gate.clone()));
    let dashboard = Arc::new(harness.build());

    let loading = tokio::spawn({
        let dashboard = dashboard.clone();
        async move { dashboard.load_all().await }
    });
    while harness.remote.calls().await.is_empty() {
        tokio::time::sleep(Duration::from_millis(5)).await;
    }

    dashboard.invalidate();
    gate.add_permits(64);
    let summary = loading.await?;

    assert!(!summary.applied);
    assert_eq!(dashboard.snapshot().await, Snapshot::default());
    Ok(())
}

#[tokio::test]
async fn http_client_round_trips_through_the_dev_backend() -> Result<()> {
    let server = LiveServer::start(vec![TEST_EMAIL.to_string()]).await?;
    let identity = Arc::new(server.identity());
    identity.sign_in_with_password(TEST_EMAIL, "secret").await?;

    let build = |cache: LocalCache| -> Result<Dashboard> {
        Ok(Dashboard::new(
            Services {
                cache,
                remote: Arc::new(HttpRemote::new(server.base_url.clone(), Duration::from_secs(5))?),
                identity: identity.clone(),
                storage: Arc::new(HttpObjectStorage::new(server.presign_url(), Duration::from_secs(5))?),
                notifier: Arc::new(NoopNotifier),
            },
            NotificationSettings::default(),
        ))
    };

    let creator = build(LocalCache::new(Arc::new(MemoryCacheStore::new())))?;
    let summary = creator.load_all().await;
    assert_eq!(summary.sources[&Collection::Events], Source::RemoteSeeded);
    assert!(summary.sync_errors.is_empty());
    assert_eq!(creator.role().await, Some(Role::Reviewer));

    let report = creator
        .upload_assets(UploadRequest {
            event_id: "event-spring-glow".into(),
            tones: vec![SkinTone::Deep],
            files: vec![UploadFile::new("hero.png", Bytes::from_static(b"\x89PNG"))],
            title: None,
            notes_ideas: "warm light".into(),
        })
        .await?;
    assert_eq!(report.sync, SyncOutcome::Synced);
    let media = report.value[0].media.clone().expect("uploaded media");
    assert_eq!(media.storage, MediaStorage::Object);

    let object = reqwest::get(&media.url).await?;
    assert!(object.status().is_success());
    assert_eq!(object.bytes().await?.as_ref(), b"\x89PNG");

    let text = creator.import_text("Idea A - Body A", Default::default()).await?;
    assert_eq!(text.sync, SyncOutcome::Synced);

    let reviewer = build(LocalCache::new(Arc::new(MemoryCacheStore::new())))?;
    let summary = reviewer.load_all().await;
    assert_eq!(summary.sources[&Collection::Assets], Source::Remote);
    assert_eq!(summary.sources[&Collection::Events], Source::Remote);
    let snapshot = reviewer.snapshot().await;
    assert_eq!(snapshot.assets, report.value);
    assert_eq!(snapshot.text_items.len(), 1);
    assert_eq!(snapshot.activity.len(), 2);

    reviewer.delete_asset(&report.value[0].id).await?;
    let object = reqwest::get(&media.url).await?;
    assert_eq!(object.status(), reqwest::StatusCode::NOT_FOUND);
    let remaining: Vec<TextItem> = server.state.backend.list().await;
    assert_eq!(remaining.len(), 1);
    Ok(())
}
