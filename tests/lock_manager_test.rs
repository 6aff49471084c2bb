//! Integration tests for page locking across threads

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use parking_lot::Mutex;
use strata::common::{PageId, StorageError, TableId, TransactionId};
use strata::concurrency::{LockManager, LockMode};

const LONG_WAIT: Duration = Duration::from_secs(5);

fn page(n: u32) -> PageId {
    PageId::new(TableId::new(0), n)
}

fn txn(n: u64) -> TransactionId {
    TransactionId::new(n)
}

fn wait_for_waiters(lm: &LockManager, page_id: PageId, count: usize) {
    while lm.waiting_count(page_id) < count {
        thread::yield_now();
    }
}

#[test]
fn test_lock_compatibility_matrix() {
    let lm = LockManager::new();

    // S + S
    assert!(lm.acquire_shared(page(0), txn(1)));
    assert!(lm.acquire_shared(page(0), txn(2)));
    // S + X
    assert!(!lm.acquire_exclusive(page(0), txn(3)));
    // X + S, X + X
    assert!(lm.acquire_exclusive(page(1), txn(1)));
    assert!(!lm.acquire_shared(page(1), txn(2)));
    assert!(!lm.acquire_exclusive(page(1), txn(2)));

    lm.release_all(txn(1));
    lm.release_all(txn(2));
    assert!(lm.acquire_exclusive(page(0), txn(3)));
    assert!(lm.acquire_exclusive(page(1), txn(3)));
}

#[test]
fn test_writers_granted_in_arrival_order() {
    let lm = Arc::new(LockManager::new());
    let order = Arc::new(Mutex::new(Vec::new()));
    assert!(lm.acquire_exclusive(page(0), txn(1)));

    let mut handles = Vec::new();
    for n in 2..=4u64 {
        let lm_clone = Arc::clone(&lm);
        let order = Arc::clone(&order);
        handles.push(thread::spawn(move || {
            lm_clone
                .acquire(page(0), txn(n), LockMode::Exclusive, LONG_WAIT)
                .unwrap();
            order.lock().push(n);
            thread::sleep(Duration::from_millis(10));
            lm_clone.release(page(0), txn(n));
        }));
        wait_for_waiters(&lm, page(0), (n - 1) as usize);
    }

    lm.release(page(0), txn(1));
    for handle in handles {
        handle.join().unwrap();
    }
    assert_eq!(*order.lock(), vec![2, 3, 4]);
}

#[test]
fn test_queued_readers_admitted_together() {
    let lm = Arc::new(LockManager::new());
    assert!(lm.acquire_exclusive(page(0), txn(1)));

    let handles: Vec<_> = (2..=3u64)
        .map(|n| {
            let lm_clone = Arc::clone(&lm);
            let handle = thread::spawn(move || {
                lm_clone.acquire(page(0), txn(n), LockMode::Shared, LONG_WAIT)
            });
            wait_for_waiters(&lm, page(0), (n - 1) as usize);
            handle
        })
        .collect();

    lm.release(page(0), txn(1));
    for handle in handles {
        handle.join().unwrap().unwrap();
    }
    assert_eq!(lm.lock_mode(page(0), txn(2)), Some(LockMode::Shared));
    assert_eq!(lm.lock_mode(page(0), txn(3)), Some(LockMode::Shared));
}

#[test]
fn test_reader_behind_queued_writer_times_out() {
    let lm = Arc::new(LockManager::new());
    assert!(lm.acquire_shared(page(0), txn(1)));

    let writer = {
        let lm = Arc::clone(&lm);
        thread::spawn(move || lm.acquire(page(0), txn(2), LockMode::Exclusive, LONG_WAIT))
    };
    wait_for_waiters(&lm, page(0), 1);

    let result = lm.acquire(page(0), txn(3), LockMode::Shared, Duration::from_millis(30));
    assert!(matches!(
        result,
        Err(StorageError::TransactionAborted { txn: t, page_id }) if t == txn(3) && page_id == page(0)
    ));

    lm.release(page(0), txn(1));
    writer.join().unwrap().unwrap();
    assert_eq!(lm.lock_mode(page(0), txn(2)), Some(LockMode::Exclusive));
}

#[test]
fn test_blocked_upgrade_granted_when_other_reader_leaves() {
    let lm = Arc::new(LockManager::new());
    assert!(lm.acquire_shared(page(0), txn(1)));
    assert!(lm.acquire_shared(page(0), txn(2)));

    let upgrader = {
        let lm = Arc::clone(&lm);
        thread::spawn(move || lm.acquire(page(0), txn(1), LockMode::Exclusive, LONG_WAIT))
    };
    wait_for_waiters(&lm, page(0), 1);
    assert_eq!(lm.lock_mode(page(0), txn(1)), Some(LockMode::Shared));

    lm.release(page(0), txn(2));
    upgrader.join().unwrap().unwrap();
    assert_eq!(lm.lock_mode(page(0), txn(1)), Some(LockMode::Exclusive));
    assert!(!lm.holds(page(0), txn(2)));
}

#[test]
fn test_deadlock_resolved_by_timeout() {
    let lm = Arc::new(LockManager::new());
    assert!(lm.acquire_shared(page(0), txn(1)));
    assert!(lm.acquire_shared(page(1), txn(2)));

    let spawn_upgrade = |me: u64, target: u32| {
        let lm = Arc::clone(&lm);
        thread::spawn(move || {
            let result = lm.acquire(
                page(target),
                txn(me),
                LockMode::Exclusive,
                Duration::from_millis(100),
            );
            if result.is_err() {
                lm.release_all(txn(me));
            }
            result.is_ok()
        })
    };

    let a = spawn_upgrade(1, 1);
    let b = spawn_upgrade(2, 0);
    let granted = [a.join().unwrap(), b.join().unwrap()];

    // At least one side must have been aborted to break the cycle
    assert!(granted.iter().any(|ok| !ok));
    for (i, ok) in granted.iter().enumerate() {
        if !ok {
            assert!(lm.locked_pages(txn(i as u64 + 1)).is_empty());
        }
    }
}

#[test]
fn test_exclusive_never_shared_under_contention() {
    let lm = Arc::new(LockManager::new());
    let inside = Arc::new(Mutex::new(0usize));

    let handles: Vec<_> = (1..=8u64)
        .map(|n| {
            let lm = Arc::clone(&lm);
            let inside = Arc::clone(&inside);
            thread::spawn(move || {
                for _ in 0..20 {
                    lm.acquire(page(0), txn(n), LockMode::Exclusive, LONG_WAIT)
                        .unwrap();
                    {
                        let mut count = inside.lock();
                        *count += 1;
                        assert_eq!(*count, 1);
                    }
                    thread::yield_now();
                    *inside.lock() -= 1;
                    assert!(lm.release(page(0), txn(n)));
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }
    assert_eq!(lm.waiting_count(page(0)), 0);
}
