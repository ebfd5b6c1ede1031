mod common;

use bytes::Bytes;
use common::chunk;
use core_playback::config::PlaybackConfig;
use core_playback::{CacheStatus, ChunkSource, ChunkStream, PlaybackError, Result, StreamCache};
use futures::channel::mpsc;
use futures::{StreamExt, TryStreamExt};
use std::io::Write;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

type Feed = mpsc::UnboundedSender<Result<Bytes>>;

/// Producer whose chunks are pushed by the test, counting invocations.
fn controlled_producer(calls: &Arc<AtomicUsize>) -> (Feed, impl FnOnce() -> ChunkStream) {
    let (tx, rx) = mpsc::unbounded();
    let calls = Arc::clone(calls);
    let producer = move || {
        calls.fetch_add(1, Ordering::SeqCst);
        rx.boxed()
    };
    (tx, producer)
}

fn not_called() -> ChunkStream {
    panic!("producer must not be invoked")
}

#[tokio::test]
async fn test_concurrent_callers_share_one_production() {
    let cache = StreamCache::new();
    let calls = Arc::new(AtomicUsize::new(0));
    let (tx, producer) = controlled_producer(&calls);

    let leader = cache.create_stream("req", producer);
    let follower = cache.create_stream("req", not_called);
    assert_eq!(cache.status(&"req"), CacheStatus::InProgress);

    let follower_task = tokio::spawn(follower.collect::<Vec<Result<Bytes>>>());
    let leader_task = tokio::spawn(leader.collect::<Vec<Result<Bytes>>>());

    tx.unbounded_send(chunk(b"one")).unwrap();
    tx.unbounded_send(chunk(b"two")).unwrap();
    tx.unbounded_send(chunk(b"three")).unwrap();
    drop(tx);

    let led: Vec<Bytes> = leader_task.await.unwrap().into_iter().collect::<Result<_>>().unwrap();
    let followed: Vec<Bytes> = follower_task.await.unwrap().into_iter().collect::<Result<_>>().unwrap();

    assert_eq!(led, followed);
    assert_eq!(led.concat(), b"onetwothree");
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(cache.status(&"req"), CacheStatus::Complete { bytes: 11 });
}

#[tokio::test]
async fn test_late_follower_replays_then_follows() {
    let cache = StreamCache::new();
    let calls = Arc::new(AtomicUsize::new(0));
    let (tx, producer) = controlled_producer(&calls);

    let mut leader = cache.create_stream(7u32, producer);
    tx.unbounded_send(chunk(b"early")).unwrap();
    assert_eq!(leader.next().await.unwrap().unwrap(), Bytes::from_static(b"early"));

    let follower_task = tokio::spawn(
        cache
            .create_stream(7u32, not_called)
            .try_collect::<Vec<Bytes>>(),
    );

    tx.unbounded_send(chunk(b"late")).unwrap();
    drop(tx);
    let rest: Vec<Bytes> = leader.try_collect().await.unwrap();
    assert_eq!(rest, vec![Bytes::from_static(b"late")]);

    let followed = follower_task.await.unwrap().unwrap();
    assert_eq!(
        followed,
        vec![Bytes::from_static(b"early"), Bytes::from_static(b"late")]
    );
}

#[tokio::test]
async fn test_failure_leaves_entry_absent() {
    let cache = StreamCache::new();
    let calls = Arc::new(AtomicUsize::new(0));
    let (tx, producer) = controlled_producer(&calls);

    let leader = cache.create_stream("tts", producer);
    let follower = cache.create_stream("tts", not_called);

    tx.unbounded_send(chunk(b"partial")).unwrap();
    tx.unbounded_send(Err(PlaybackError::StreamingFailed("connection reset".into())))
        .unwrap();
    tx.unbounded_send(chunk(b"ignored")).unwrap();

    let led: Vec<Result<Bytes>> = leader.collect().await;
    assert_eq!(led.len(), 2);
    assert!(matches!(&led[1], Err(PlaybackError::StreamingFailed(msg)) if msg == "connection reset"));

    let followed: Vec<Result<Bytes>> = follower.collect().await;
    assert_eq!(followed.len(), 2);
    assert!(matches!(&followed[1], Err(PlaybackError::StreamingFailed(msg)) if msg == "connection reset"));

    assert_eq!(cache.status(&"tts"), CacheStatus::Absent);
    assert_eq!(cache.cached_len(), None);

    // The next request produces again from scratch.
    let (tx, producer) = controlled_producer(&calls);
    let retry = cache.create_stream("tts", producer);
    tx.unbounded_send(chunk(b"whole")).unwrap();
    drop(tx);
    let data: Vec<Bytes> = retry.try_collect().await.unwrap();
    assert_eq!(data.concat(), b"whole");
    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert_eq!(cache.status(&"tts"), CacheStatus::Complete { bytes: 5 });
}

#[tokio::test]
async fn test_reset_during_flight_prevents_commit() {
    let cache = StreamCache::new();
    let calls = Arc::new(AtomicUsize::new(0));
    let (tx, producer) = controlled_producer(&calls);

    let mut leader = cache.create_stream("k", producer);
    tx.unbounded_send(chunk(b"a")).unwrap();
    leader.next().await.unwrap().unwrap();

    cache.reset();
    assert_eq!(cache.status(&"k"), CacheStatus::Absent);

    tx.unbounded_send(chunk(b"b")).unwrap();
    drop(tx);
    let rest: Vec<Bytes> = leader.try_collect().await.unwrap();
    assert_eq!(rest, vec![Bytes::from_static(b"b")]);

    assert_eq!(cache.status(&"k"), CacheStatus::Absent);

    let (tx, producer) = controlled_producer(&calls);
    let again = cache.create_stream("k", producer);
    drop(tx);
    let _: Vec<Bytes> = again.try_collect().await.unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_reset_after_commit_reinvokes_producer() {
    let cache = StreamCache::new();
    let calls = Arc::new(AtomicUsize::new(0));

    for _ in 0..2 {
        let (tx, producer) = controlled_producer(&calls);
        tx.unbounded_send(chunk(b"data")).unwrap();
        drop(tx);
        let _: Vec<Bytes> = cache.create_stream("k", producer).try_collect().await.unwrap();
        cache.reset();
    }

    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_second_caller_drained_before_first() {
    let cache = StreamCache::new();
    let calls = Arc::new(AtomicUsize::new(0));
    let (tx, producer) = controlled_producer(&calls);
    tx.unbounded_send(chunk(b"only")).unwrap();
    drop(tx);

    let first = cache.create_stream("req", producer);
    let second = cache.create_stream("req", not_called);

    let drained: Vec<Bytes> = tokio::time::timeout(Duration::from_secs(1), second.try_collect())
        .await
        .expect("second stream must not wait for the first")
        .unwrap();
    assert_eq!(drained, vec![Bytes::from_static(b"only")]);
    assert_eq!(cache.status(&"req"), CacheStatus::Complete { bytes: 4 });

    let replayed: Vec<Bytes> = first.try_collect().await.unwrap();
    assert_eq!(replayed, drained);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_production_survives_first_consumer_drop() {
    let cache = StreamCache::new();
    let calls = Arc::new(AtomicUsize::new(0));
    let (tx, producer) = controlled_producer(&calls);

    let mut first = cache.create_stream("k", producer);
    let second = cache.create_stream("k", not_called);

    tx.unbounded_send(chunk(b"first")).unwrap();
    first.next().await.unwrap().unwrap();
    drop(first);
    assert_eq!(cache.status(&"k"), CacheStatus::InProgress);

    tx.unbounded_send(chunk(b"second")).unwrap();
    drop(tx);
    let followed: Vec<Bytes> = second.try_collect().await.unwrap();
    assert_eq!(followed.concat(), b"firstsecond");
    assert_eq!(cache.status(&"k"), CacheStatus::Complete { bytes: 11 });
}

#[tokio::test]
async fn test_dropping_every_consumer_abandons_production() {
    let cache = StreamCache::new();
    let calls = Arc::new(AtomicUsize::new(0));
    let (tx, producer) = controlled_producer(&calls);

    let mut first = cache.create_stream("k", producer);
    let second = cache.create_stream("k", not_called);
    tx.unbounded_send(chunk(b"partial")).unwrap();
    first.next().await.unwrap().unwrap();

    drop(first);
    drop(second);
    assert_eq!(cache.status(&"k"), CacheStatus::Absent);
    assert!(tx.is_closed(), "producer is released with its last consumer");

    let (tx, producer) = controlled_producer(&calls);
    drop(tx);
    let again: Vec<Bytes> = cache.create_stream("k", producer).try_collect().await.unwrap();
    assert!(again.is_empty());
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_superseded_flight_never_commits() {
    let cache = StreamCache::new();
    let calls = Arc::new(AtomicUsize::new(0));
    let (old_tx, old_producer) = controlled_producer(&calls);

    let old = cache.create_stream("old", old_producer);

    let (new_tx, new_producer) = controlled_producer(&calls);
    let new = cache.create_stream("new", new_producer);
    new_tx.unbounded_send(chunk(b"fresh")).unwrap();
    drop(new_tx);
    let _: Vec<Bytes> = new.try_collect().await.unwrap();

    // The old consumer still receives its data.
    old_tx.unbounded_send(chunk(b"stale")).unwrap();
    drop(old_tx);
    let stale: Vec<Bytes> = old.try_collect().await.unwrap();
    assert_eq!(stale.concat(), b"stale");

    assert_eq!(cache.status(&"old"), CacheStatus::Absent);
    assert_eq!(cache.status(&"new"), CacheStatus::Complete { bytes: 5 });
}

#[tokio::test]
async fn test_file_round_trip_through_cache() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    let data: Vec<u8> = (0..20_000u32).map(|i| (i * 7 % 256) as u8).collect();
    file.write_all(&data).unwrap();

    let config = PlaybackConfig::default();
    let cache = StreamCache::new();
    let path = file.path().to_path_buf();

    let source = ChunkSource::file(path.clone(), &config);
    let first: Vec<Bytes> = cache
        .create_stream(path.clone(), move || source.into_stream())
        .try_collect()
        .await
        .unwrap();
    assert_eq!(first.len(), 5);
    assert_eq!(first.concat(), data);

    let second: Vec<Bytes> = cache
        .create_stream(path, not_called)
        .try_collect()
        .await
        .unwrap();
    assert_eq!(second.len(), 1);
    assert_eq!(second[0], data);
}
