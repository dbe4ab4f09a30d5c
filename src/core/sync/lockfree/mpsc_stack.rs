/*!
 * MPSC Lock-Free Stack
 * Treiber stack with unlimited producers and exactly one consumer
 */

use std::fmt;
use std::marker::PhantomData;
use std::ptr;
use std::sync::atomic::{AtomicPtr, Ordering};
use std::sync::Arc;

struct Node<T> {
    value: T,
    next: *mut Node<T>,
}

/// Intrusive singly-linked stack
///
/// # Thread Safety
///
/// - `push`: any number of concurrent callers
/// - `pop` / `dequeue_all`: one consumer at a time. Pop is ABA-safe only
///   because nodes are freed exclusively by that consumer; two concurrent
///   poppers could free a node the other is about to read `next` from.
///
/// The raw single-consumer methods are `unsafe`. [`channel`] hands out a
/// unique [`StackConsumer`] that makes the contract a type-level fact.
pub struct MpscStack<T> {
    head: AtomicPtr<Node<T>>,
    _owns: PhantomData<Box<Node<T>>>,
}

// Safety: values move between threads through push/pop; nodes are never shared by reference
unsafe impl<T: Send> Send for MpscStack<T> {}
unsafe impl<T: Send> Sync for MpscStack<T> {}

impl<T> MpscStack<T> {
    pub const fn new() -> Self {
        Self {
            head: AtomicPtr::new(ptr::null_mut()),
            _owns: PhantomData,
        }
    }

    /// Push onto the top of the stack (lock-free)
    ///
    /// The releasing CAS that publishes the node happens-before the pop
    /// that observes it.
    pub fn push(&self, value: T) {
        let node = Box::into_raw(Box::new(Node {
            value,
            next: ptr::null_mut(),
        }));

        let mut head = self.head.load(Ordering::Relaxed);
        loop {
            // SAFETY: `node` is not visible to other threads until the CAS succeeds.
            unsafe { (*node).next = head };
            match self
                .head
                .compare_exchange_weak(head, node, Ordering::Release, Ordering::Relaxed)
            {
                Ok(_) => return,
                Err(actual) => head = actual,
            }
        }
    }

    /// Pop the top element
    ///
    /// Producers still race with the consumer on `head`, so this CASes even
    /// though there is only one popper.
    ///
    /// # Safety
    ///
    /// No other thread may run `pop` or `dequeue_all` on this stack
    /// concurrently.
    pub unsafe fn pop(&self) -> Option<T> {
        let mut head = self.head.load(Ordering::Acquire);
        loop {
            if head.is_null() {
                return None;
            }
            // Only the consumer frees nodes, so `head` is still live here
            let next = (*head).next;
            match self
                .head
                .compare_exchange_weak(head, next, Ordering::Acquire, Ordering::Acquire)
            {
                Ok(_) => {
                    let node = Box::from_raw(head);
                    return Some(node.value);
                }
                Err(actual) => head = actual,
            }
        }
    }

    /// Pop until empty, calling `f` on each value (newest first)
    ///
    /// # Safety
    ///
    /// Same single-consumer contract as [`pop`](Self::pop).
    pub unsafe fn dequeue_all<F: FnMut(T)>(&self, mut f: F) {
        while let Some(value) = self.pop() {
            f(value);
        }
    }

    /// Pop with exclusive access; always safe
    pub fn pop_mut(&mut self) -> Option<T> {
        // SAFETY: `&mut self` rules out every other caller.
        unsafe { self.pop() }
    }

    /// Racy emptiness check
    pub fn is_empty(&self) -> bool {
        self.head.load(Ordering::Relaxed).is_null()
    }
}

impl<T> Default for MpscStack<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Drop for MpscStack<T> {
    fn drop(&mut self) {
        while self.pop_mut().is_some() {}
    }
}

impl<T> fmt::Debug for MpscStack<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MpscStack")
            .field("empty", &self.is_empty())
            .finish()
    }
}

/// Create a stack split into a cloneable producer and a unique consumer
///
/// # Example
///
/// ```
/// use hazard_sync::mpsc_stack;
///
/// let (tx, mut rx) = mpsc_stack::channel();
/// tx.push(1);
/// tx.push(2);
/// assert_eq!(rx.pop(), Some(2));
/// assert_eq!(rx.pop(), Some(1));
/// assert_eq!(rx.pop(), None);
/// ```
pub fn channel<T>() -> (StackProducer<T>, StackConsumer<T>) {
    let stack = Arc::new(MpscStack::new());
    (
        StackProducer {
            stack: stack.clone(),
        },
        StackConsumer {
            stack,
            _not_sync: PhantomData,
        },
    )
}

/// Push side of a [`channel`]; clone freely across threads
pub struct StackProducer<T> {
    stack: Arc<MpscStack<T>>,
}

impl<T> StackProducer<T> {
    #[inline]
    pub fn push(&self, value: T) {
        self.stack.push(value);
    }
}

impl<T> Clone for StackProducer<T> {
    fn clone(&self) -> Self {
        Self {
            stack: self.stack.clone(),
        }
    }
}

impl<T> fmt::Debug for StackProducer<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StackProducer").finish_non_exhaustive()
    }
}

/// Pop side of a [`channel`]; exactly one exists per stack
///
/// `Send` so it can move to the consumer thread, but not `Clone` or `Sync`.
pub struct StackConsumer<T> {
    stack: Arc<MpscStack<T>>,
    _not_sync: PhantomData<std::cell::Cell<()>>,
}

impl<T> StackConsumer<T> {
    #[inline]
    pub fn pop(&mut self) -> Option<T> {
        // SAFETY: this handle is the only consumer and `&mut self` serializes it.
        unsafe { self.stack.pop() }
    }

    pub fn dequeue_all<F: FnMut(T)>(&mut self, f: F) {
        // SAFETY: see pop.
        unsafe { self.stack.dequeue_all(f) }
    }

    /// Iterator that pops until the stack is observed empty
    pub fn drain(&mut self) -> Drain<'_, T> {
        Drain { consumer: self }
    }

    pub fn is_empty(&self) -> bool {
        self.stack.is_empty()
    }
}

impl<T> fmt::Debug for StackConsumer<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StackConsumer")
            .field("empty", &self.is_empty())
            .finish()
    }
}

pub struct Drain<'a, T> {
    consumer: &'a mut StackConsumer<T>,
}

impl<T> Iterator for Drain<'_, T> {
    type Item = T;

    fn next(&mut self) -> Option<T> {
        self.consumer.pop()
    }
}
