/*!
 * Hazard Pointer Reclamation Tests
 * Protected pointers survive scans; everything else is freed exactly once
 */

use hazard_sync::{Domain, ScanOutcome, SmrConfig};
use parking_lot::Mutex;
use pretty_assertions::assert_eq;
use serial_test::serial;
use std::sync::atomic::{AtomicPtr, AtomicUsize, Ordering};
use std::sync::{mpsc, Arc, Barrier};
use std::thread;

/// Payload that counts how often it is dropped
struct Tracked {
    drops: Arc<AtomicUsize>,
}

impl Drop for Tracked {
    fn drop(&mut self) {
        self.drops.fetch_add(1, Ordering::SeqCst);
    }
}

fn tracked(drops: &Arc<AtomicUsize>) -> *mut Tracked {
    Box::into_raw(Box::new(Tracked {
        drops: drops.clone(),
    }))
}

#[test]
fn test_protected_pointer_survives_threshold_scans() {
    let domain = Domain::new();
    let target_drops = Arc::new(AtomicUsize::new(0));
    let other_drops = Arc::new(AtomicUsize::new(0));
    let shared = Arc::new(AtomicPtr::new(tracked(&target_drops)));

    let acquired = Arc::new(Barrier::new(2));
    let (release_tx, release_rx) = mpsc::channel::<()>();
    let (released_tx, released_rx) = mpsc::channel::<()>();

    let reader = {
        let domain = domain.clone();
        let shared = shared.clone();
        let acquired = acquired.clone();
        let target_drops = target_drops.clone();
        thread::spawn(move || {
            let me = domain.register();
            let p = me.acquire(&shared);
            acquired.wait();

            release_rx.recv().unwrap();
            // Still readable: the retirer's scans had to skip it
            assert_eq!(target_drops.load(Ordering::SeqCst), 0);
            assert!(unsafe { (*p).drops.load(Ordering::SeqCst) } == 0);
            me.release();
            released_tx.send(()).unwrap();
        })
    };

    acquired.wait();
    let p = shared.swap(std::ptr::null_mut(), Ordering::SeqCst);
    unsafe { domain.retire_box(p) };

    // Enough retirements to cross the default threshold several times
    for _ in 0..250 {
        unsafe { domain.retire_box(tracked(&other_drops)) };
    }
    assert!(domain.stats().scans >= 2);
    assert_eq!(target_drops.load(Ordering::SeqCst), 0);

    release_tx.send(()).unwrap();
    released_rx.recv().unwrap();
    reader.join().unwrap();

    let outcome = domain.scan();
    assert!(outcome.reclaimed() >= 1);
    assert_eq!(target_drops.load(Ordering::SeqCst), 1);

    // Later scans never run the deleter again
    domain.scan();
    domain.scan();
    assert_eq!(target_drops.load(Ordering::SeqCst), 1);
    drop(domain);
    assert_eq!(other_drops.load(Ordering::SeqCst), 250);
}

#[test]
fn test_guard_protects_until_dropped() {
    let domain = Domain::with_config(SmrConfig::eager()).unwrap();
    let drops = Arc::new(AtomicUsize::new(0));
    let shared = AtomicPtr::new(tracked(&drops));
    let me = domain.register();

    let guard = me.protect(&shared).expect("free slot");
    let old = shared.swap(std::ptr::null_mut(), Ordering::SeqCst);
    unsafe { domain.retire_box(old) };
    assert_eq!(drops.load(Ordering::SeqCst), 0);
    assert_eq!(
        domain.scan(),
        ScanOutcome::Completed {
            reclaimed: 0,
            deferred: 1
        }
    );

    drop(guard);
    assert_eq!(domain.scan().reclaimed(), 1);
    assert_eq!(drops.load(Ordering::SeqCst), 1);
}

#[test]
fn test_scan_while_scanning_is_skipped_not_lost() {
    let domain = Domain::new();
    let late_drops = Arc::new(AtomicUsize::new(0));
    let nested = Arc::new(Mutex::new(None));

    // Runs inside the outer scan, so the scan lock is held throughout
    let deleter = {
        let domain = domain.clone();
        let late_drops = late_drops.clone();
        let nested = nested.clone();
        move |p: *mut u64| {
            drop(unsafe { Box::from_raw(p) });
            unsafe { domain.retire_box(tracked(&late_drops)) };
            *nested.lock() = Some(domain.scan());
        }
    };
    unsafe { domain.retire(Box::into_raw(Box::new(1u64)), deleter) };

    let outer = domain.scan();
    assert_eq!(outer.reclaimed(), 1);
    assert_eq!(*nested.lock(), Some(ScanOutcome::Skipped));

    let stats = domain.stats();
    assert_eq!(stats.scans, 1);
    assert_eq!(stats.scans_skipped, 1);
    assert_eq!(stats.retired, 2);
    assert_eq!(late_drops.load(Ordering::SeqCst), 0);

    // The node retired during the skipped scan is still queued
    assert_eq!(domain.scan().reclaimed(), 1);
    assert_eq!(late_drops.load(Ordering::SeqCst), 1);
    assert_eq!(domain.scan().reclaimed(), 0);
    assert_eq!(late_drops.load(Ordering::SeqCst), 1);
}

#[test]
fn test_domains_are_isolated() {
    let a = Domain::new();
    let b = Domain::new();
    let drops = Arc::new(AtomicUsize::new(0));
    let shared = AtomicPtr::new(tracked(&drops));

    // A hazard in `a` does not hold back reclamation in `b`
    let reader = a.register();
    let p = reader.acquire(&shared);
    shared.store(std::ptr::null_mut(), Ordering::SeqCst);
    unsafe { b.retire_box(p) };
    assert_eq!(b.scan().reclaimed(), 1);
    assert_eq!(drops.load(Ordering::SeqCst), 1);
    reader.release();
}

#[test]
fn test_concurrent_swap_and_read() {
    let domain = Domain::with_config(SmrConfig {
        scan_threshold: 8,
        ..Default::default()
    })
    .unwrap();
    let drops = Arc::new(AtomicUsize::new(0));
    let shared = Arc::new(AtomicPtr::new(tracked(&drops)));
    let swaps = 2_000;

    let readers: Vec<_> = (0..4)
        .map(|_| {
            let domain = domain.clone();
            let shared = shared.clone();
            thread::spawn(move || {
                for _ in 0..swaps {
                    domain.with_local(|me| {
                        let guard = me.protect(&shared).expect("free slot");
                        if let Some(value) = unsafe { guard.as_ref() } {
                            // Freed memory would fail this or crash
                            assert!(Arc::strong_count(&value.drops) >= 1);
                        }
                    });
                }
            })
        })
        .collect();

    for _ in 0..swaps {
        let old = shared.swap(tracked(&drops), Ordering::SeqCst);
        unsafe { domain.retire_box(old) };
    }

    for reader in readers {
        reader.join().unwrap();
    }
    let last = shared.swap(std::ptr::null_mut(), Ordering::SeqCst);
    unsafe { domain.retire_box(last) };
    domain.scan();

    let stats = domain.stats();
    assert_eq!(stats.retired, swaps as u64 + 1);
    assert_eq!(stats.reclaimed, swaps as u64 + 1);
    assert_eq!(drops.load(Ordering::SeqCst), swaps + 1);
}

#[test]
#[serial]
fn test_global_domain_is_shared_across_threads() {
    let here = Domain::global().clone();
    let there = thread::spawn(|| Domain::global().clone()).join().unwrap();
    assert!(here.same_domain(&there));

    let before = here.stats().retired;
    unsafe { there.retire_box(Box::into_raw(Box::new(1u8))) };
    assert!(here.stats().retired > before);
}
