//! Binlog round-trip, rekey and crash-recovery tests.

#![allow(clippy::unwrap_used)] // Tests are allowed to use unwrap for simplicity

use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;

use bytes::Bytes;
use tgsys_actor::{Scheduler, SchedulerConfig};
use tgsys_db::{Binlog, BinlogDebugInfo, BinlogEvent, ConcurrentBinlog, DbKey};

fn append_payloads(binlog: &mut Binlog, payloads: &[&[u8]]) {
    for payload in payloads {
        let event = BinlogEvent::new(
            binlog.next_event_id(),
            1,
            0,
            0,
            Bytes::copy_from_slice(payload),
        );
        binlog.add_raw_event(event, BinlogDebugInfo::here()).unwrap();
    }
}

fn replay_payloads(path: &Path, db_key: DbKey) -> Vec<Vec<u8>> {
    let mut seen = Vec::new();
    let binlog = Binlog::init(
        path,
        |event| {
            seen.push(event.payload.to_vec());
            Ok(())
        },
        db_key,
    )
    .unwrap();
    binlog.close().unwrap();
    seen
}

fn append_garbage(path: &Path) {
    let mut file = OpenOptions::new().append(true).open(path).unwrap();
    file.write_all(b"abacabadaba").unwrap();
}

#[test]
fn replay_yields_appended_events_in_order() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("binlog");

    let payloads: Vec<Vec<u8>> = vec![
        b"AAAA".to_vec(),
        b"B".to_vec(),
        vec![0u8; 1000],
        b"".to_vec(),
        b"final".to_vec(),
    ];
    {
        let mut binlog = Binlog::init(&path, |_| Ok(()), DbKey::empty()).unwrap();
        let refs: Vec<&[u8]> = payloads.iter().map(Vec::as_slice).collect();
        append_payloads(&mut binlog, &refs);
        binlog.close().unwrap();
    }

    assert_eq!(replay_payloads(&path, DbKey::empty()), payloads);
}

#[test]
fn event_ids_equal_disk_order_and_survive_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("binlog");

    {
        let mut binlog = Binlog::init(&path, |_| Ok(()), DbKey::empty()).unwrap();
        assert_eq!(binlog.next_event_id(), 0);
        append_payloads(&mut binlog, &[b"a", b"b", b"c"]);
        assert_eq!(binlog.next_event_id(), 3);
        binlog.close().unwrap();
    }

    let mut ids = Vec::new();
    let binlog = Binlog::init(
        &path,
        |event| {
            ids.push(event.event_id);
            Ok(())
        },
        DbKey::empty(),
    )
    .unwrap();
    assert_eq!(ids, vec![0, 1, 2]);
    assert_eq!(binlog.next_event_id(), 3);
    binlog.close().unwrap();
}

#[test]
fn encryption_round_trip_with_rekey_chain() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("binlog");

    let cucumber = DbKey::password("cucu'\"mb er");
    let hello = DbKey::raw_key([b'A'; 32]);
    let long_data = vec![b'Z'; 10000];

    {
        let mut binlog = Binlog::init(&path, |_| Ok(()), DbKey::empty()).unwrap();
        append_payloads(&mut binlog, &[b"AAAA", b"BBBB", &long_data]);
        binlog.change_key(cucumber.clone()).unwrap();
        binlog.change_key(hello.clone()).unwrap();
        append_payloads(&mut binlog, &[b"CCCC"]);
        binlog.close().unwrap();
    }

    append_garbage(&path);
    let expected: Vec<Vec<u8>> = vec![
        b"AAAA".to_vec(),
        b"BBBB".to_vec(),
        long_data.clone(),
        b"CCCC".to_vec(),
    ];
    assert_eq!(replay_payloads(&path, hello.clone()), expected);

    // The truncated garbage stays gone and the old keys stay dead.
    assert!(Binlog::init(&path, |_| Ok(()), DbKey::empty()).is_err());
    assert!(Binlog::init(&path, |_| Ok(()), cucumber.clone()).is_err());

    // Supplying the current key as the fallback recovers and rewrites.
    let mut seen = Vec::new();
    let binlog = Binlog::init_with_old_key(
        &path,
        |event| {
            seen.push(event.payload.to_vec());
            Ok(())
        },
        cucumber.clone(),
        hello,
    )
    .unwrap();
    binlog.close().unwrap();
    assert_eq!(seen, expected);

    // After the recovery rewrite only the new key works.
    assert_eq!(replay_payloads(&path, cucumber), expected);
}

#[test]
fn rekey_with_same_key_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("binlog");
    let key = DbKey::password("fixed");

    {
        let mut binlog = Binlog::init(&path, |_| Ok(()), key.clone()).unwrap();
        append_payloads(&mut binlog, &[b"one", b"two"]);
        binlog.close().unwrap();
    }
    let first = replay_payloads(&path, key.clone());
    let len_before = std::fs::metadata(&path).unwrap().len();

    {
        let mut binlog = Binlog::init(&path, |_| Ok(()), key.clone()).unwrap();
        binlog.change_key(key.clone()).unwrap();
        binlog.change_key(key.clone()).unwrap();
        binlog.close().unwrap();
    }

    // Fresh nonces, identical shape and content.
    assert_eq!(std::fs::metadata(&path).unwrap().len(), len_before);
    assert_eq!(replay_payloads(&path, key), first);
}

#[test]
fn trailing_garbage_is_truncated_on_open() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("binlog");

    {
        let mut binlog = Binlog::init(&path, |_| Ok(()), DbKey::empty()).unwrap();
        append_payloads(&mut binlog, &[b"kept-1", b"kept-2"]);
        binlog.close().unwrap();
    }
    let clean_len = std::fs::metadata(&path).unwrap().len();
    append_garbage(&path);

    assert_eq!(
        replay_payloads(&path, DbKey::empty()),
        vec![b"kept-1".to_vec(), b"kept-2".to_vec()]
    );
    assert_eq!(std::fs::metadata(&path).unwrap().len(), clean_len);

    // A second open sees a clean file.
    assert_eq!(
        replay_payloads(&path, DbKey::empty()),
        vec![b"kept-1".to_vec(), b"kept-2".to_vec()]
    );
}

#[test]
fn replay_callback_error_aborts_and_leaves_file_unchanged() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("binlog");

    {
        let mut binlog = Binlog::init(&path, |_| Ok(()), DbKey::empty()).unwrap();
        append_payloads(&mut binlog, &[b"first", b"second"]);
        binlog.close().unwrap();
    }
    let before = std::fs::read(&path).unwrap();

    let mut calls = 0;
    let result = Binlog::init(
        &path,
        |_| {
            calls += 1;
            if calls == 2 {
                Err(tgsys_utils::CoreError::internal("schema too new"))
            } else {
                Ok(())
            }
        },
        DbKey::empty(),
    );
    assert!(result.is_err());
    assert_eq!(calls, 2);
    assert_eq!(std::fs::read(&path).unwrap(), before);
}

#[test]
fn interrupted_rewrite_promotes_the_sibling() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("binlog");
    let sibling = dir.path().join("binlog.new");

    {
        let mut binlog = Binlog::init(&path, |_| Ok(()), DbKey::empty()).unwrap();
        append_payloads(&mut binlog, &[b"new-content"]);
        binlog.close().unwrap();
    }
    // Simulate a crash after the sibling was fully written but before
    // the final rename: the finished file sits at <path>.new and a stale
    // original remains.
    std::fs::rename(&path, &sibling).unwrap();
    std::fs::write(&path, b"stale original").unwrap();

    assert_eq!(
        replay_payloads(&path, DbKey::empty()),
        vec![b"new-content".to_vec()]
    );
    assert!(!sibling.exists());
}

#[test]
fn destroy_removes_file_and_sidecars() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("binlog");

    {
        let mut binlog = Binlog::init(&path, |_| Ok(()), DbKey::empty()).unwrap();
        append_payloads(&mut binlog, &[b"x"]);
        binlog.close().unwrap();
    }
    std::fs::write(dir.path().join("binlog.new"), b"leftover").unwrap();

    Binlog::destroy(&path).unwrap();
    assert!(!path.exists());
    assert!(!dir.path().join("binlog.new").exists());

    // Destroying a missing binlog is fine.
    Binlog::destroy(&path).unwrap();
}

#[test]
fn concurrent_binlog_batches_cross_thread_appends() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("binlog");
    let scheduler = Scheduler::new(SchedulerConfig::default()).unwrap();

    {
        let binlog = std::sync::Arc::new(
            ConcurrentBinlog::init(&scheduler, &path, |_| Ok(()), DbKey::empty()).unwrap(),
        );
        let mut threads = Vec::new();
        for t in 0..4u8 {
            let binlog = std::sync::Arc::clone(&binlog);
            threads.push(std::thread::spawn(move || {
                for i in 0..100u8 {
                    binlog.add_raw_event(1, 0, 0, Bytes::from(vec![t, i]));
                }
            }));
        }
        for thread in threads {
            thread.join().unwrap();
        }
        binlog.sync().wait().unwrap();
        let binlog = std::sync::Arc::into_inner(binlog).unwrap();
        binlog.close().wait().unwrap();
    }

    let mut ids = Vec::new();
    let mut count = 0;
    let replayed = Binlog::init(
        &path,
        |event| {
            ids.push(event.event_id);
            count += 1;
            Ok(())
        },
        DbKey::empty(),
    )
    .unwrap();
    replayed.close().unwrap();

    assert_eq!(count, 400);
    // Total order by event id equals disk order.
    let mut sorted = ids.clone();
    sorted.sort_unstable();
    assert_eq!(ids, sorted);
    scheduler.finish();
}

#[test]
fn concurrent_rekey_is_exclusive() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("binlog");
    let scheduler = Scheduler::new(SchedulerConfig::default()).unwrap();

    let binlog = ConcurrentBinlog::init(&scheduler, &path, |_| Ok(()), DbKey::empty()).unwrap();
    binlog.add_raw_event(1, 0, 0, Bytes::from_static(b"data"));

    // Password derivation keeps the first rekey busy long enough that a
    // second request must be refused.
    let first = binlog.change_key(DbKey::password("one")).unwrap();
    let second = binlog.change_key(DbKey::password("two"));
    assert!(second.is_err());
    first.wait().unwrap();

    // After completion a further rekey is accepted again.
    binlog
        .change_key(DbKey::password("two"))
        .unwrap()
        .wait()
        .unwrap();
    binlog.close().wait().unwrap();

    assert_eq!(
        replay_payloads(&path, DbKey::password("two")),
        vec![b"data".to_vec()]
    );
    scheduler.finish();
}
