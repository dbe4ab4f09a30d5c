/*!
 * Lock Tests
 * Futex mutex counting under contention and reader/writer exclusion
 */

use hazard_sync::core::sync::futex::{futex_wait, futex_wake_one};
use hazard_sync::core::sync::locks::RawRwSpinLock;
use hazard_sync::{FutexMutex, RwSpinLock};
use pretty_assertions::assert_eq;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

#[test]
fn test_futex_mutex_counts_exactly() {
    let threads = 8;
    let iterations = 10_000;
    let counter = Arc::new(FutexMutex::new(0u64));

    let handles: Vec<_> = (0..threads)
        .map(|_| {
            let counter = counter.clone();
            thread::spawn(move || {
                for _ in 0..iterations {
                    *counter.lock() += 1;
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }
    assert_eq!(*counter.lock(), threads * iterations);
    assert!(!counter.is_locked());
}

#[test]
fn test_futex_mutex_blocks_until_unlock() {
    let mutex = Arc::new(FutexMutex::new(Vec::new()));
    let guard = mutex.lock();

    let waiter = {
        let mutex = mutex.clone();
        thread::spawn(move || mutex.lock().push("waiter"))
    };

    thread::sleep(Duration::from_millis(50));
    assert!(!waiter.is_finished());
    drop(guard);

    waiter.join().unwrap();
    assert_eq!(*mutex.lock(), vec!["waiter"]);
}

#[test]
fn test_futex_wait_returns_on_value_mismatch() {
    let word = AtomicU32::new(1);
    // Value already differs: must not sleep
    assert!(!futex_wait(&word, 0));
}

#[test]
fn test_futex_wake_one_releases_waiter() {
    let word = Arc::new(AtomicU32::new(0));
    let waiter = {
        let word = word.clone();
        thread::spawn(move || {
            while word.load(Ordering::Acquire) == 0 {
                futex_wait(&word, 0);
            }
        })
    };

    thread::sleep(Duration::from_millis(20));
    word.store(1, Ordering::Release);
    futex_wake_one(&word);
    waiter.join().unwrap();
}

#[test]
fn test_rw_spin_never_overlaps_writer() {
    let lock = Arc::new(RawRwSpinLock::new());
    let readers_inside = Arc::new(AtomicUsize::new(0));
    let writer_inside = Arc::new(AtomicBool::new(false));

    let handles: Vec<_> = (0..6)
        .map(|t| {
            let lock = lock.clone();
            let readers_inside = readers_inside.clone();
            let writer_inside = writer_inside.clone();
            thread::spawn(move || {
                for _ in 0..2_000 {
                    if t % 3 == 0 {
                        lock.lock_write();
                        assert!(!writer_inside.swap(true, Ordering::SeqCst));
                        assert_eq!(readers_inside.load(Ordering::SeqCst), 0);
                        std::hint::spin_loop();
                        writer_inside.store(false, Ordering::SeqCst);
                        unsafe { lock.unlock_write() };
                    } else {
                        lock.lock_read();
                        readers_inside.fetch_add(1, Ordering::SeqCst);
                        assert!(!writer_inside.load(Ordering::SeqCst));
                        readers_inside.fetch_sub(1, Ordering::SeqCst);
                        unsafe { lock.unlock_read() };
                    }
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }
    assert_eq!(lock.reader_count(), 0);
    assert!(!lock.is_write_locked());
}

#[test]
fn test_rw_spin_readers_share() {
    let lock = RwSpinLock::new(5);
    let a = lock.read();
    let b = lock.read();
    assert_eq!(*a + *b, 10);
    assert_eq!(lock.raw().reader_count(), 2);
    assert!(lock.try_write().is_none());

    drop(a);
    drop(b);
    *lock.write() += 1;
    assert_eq!(*lock.read(), 6);
}
