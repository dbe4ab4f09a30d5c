/*!
 * Retirement List
 *
 * Lock-free singly-linked stack of retired pointers awaiting a scan.
 * The list owns each node from `push` until a scan either reclaims it or
 * pushes it back.
 */

use crate::core::sync::aligned::CacheAligned;
use std::mem;
use std::ptr;
use std::sync::atomic::{AtomicPtr, Ordering};

pub(crate) type Deleter = Box<dyn FnOnce() + Send>;

/// Lifecycle of a retired payload
pub(crate) enum RetiredState {
    /// Deleter not yet run
    Pending(Deleter),
    /// Deleter has run; the payload no longer exists
    Reclaimed,
}

pub(crate) struct RetiredNode {
    /// Address of the payload, compared against hazard slots
    pub(crate) addr: usize,
    state: RetiredState,
    next: *mut RetiredNode,
}

impl RetiredNode {
    pub(crate) fn new(addr: usize, deleter: Deleter) -> Box<Self> {
        Box::new(Self {
            addr,
            state: RetiredState::Pending(deleter),
            next: ptr::null_mut(),
        })
    }

    /// Run the deleter if it has not run yet
    ///
    /// Returns `true` if this call reclaimed the payload.
    pub(crate) fn reclaim(&mut self) -> bool {
        match mem::replace(&mut self.state, RetiredState::Reclaimed) {
            RetiredState::Pending(deleter) => {
                deleter();
                true
            }
            RetiredState::Reclaimed => false,
        }
    }

    #[cfg(test)]
    pub(crate) fn is_reclaimed(&self) -> bool {
        matches!(self.state, RetiredState::Reclaimed)
    }
}

/// Lock-free retirement stack
pub(crate) struct RetiredList {
    head: CacheAligned<AtomicPtr<RetiredNode>>,
}

// Safety: nodes are only reachable through the atomic head and their
// deleters are Send
unsafe impl Send for RetiredList {}
unsafe impl Sync for RetiredList {}

impl RetiredList {
    pub(crate) const fn new() -> Self {
        Self {
            head: CacheAligned::new(AtomicPtr::new(ptr::null_mut())),
        }
    }

    /// CAS-push a node onto the list
    pub(crate) fn push(&self, node: Box<RetiredNode>) {
        let node = Box::into_raw(node);
        let mut head = self.head.load(Ordering::Relaxed);
        loop {
            // SAFETY: `node` is exclusively ours until the CAS publishes it.
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

    /// Detach the whole list
    pub(crate) fn take_all(&self) -> Detached {
        Detached {
            current: self.head.swap(ptr::null_mut(), Ordering::AcqRel),
        }
    }

    #[cfg(test)]
    pub(crate) fn is_empty(&self) -> bool {
        self.head.load(Ordering::Acquire).is_null()
    }
}

impl Drop for RetiredList {
    fn drop(&mut self) {
        for mut node in self.take_all() {
            node.reclaim();
        }
    }
}

/// Owning iterator over a detached chain of nodes
pub(crate) struct Detached {
    current: *mut RetiredNode,
}

impl Iterator for Detached {
    type Item = Box<RetiredNode>;

    fn next(&mut self) -> Option<Box<RetiredNode>> {
        if self.current.is_null() {
            return None;
        }
        // SAFETY: the chain was detached by swap, so we own every node.
        let mut node = unsafe { Box::from_raw(self.current) };
        self.current = mem::replace(&mut node.next, ptr::null_mut());
        Some(node)
    }
}

impl Drop for Detached {
    fn drop(&mut self) {
        // Unvisited nodes may still be protected: free the nodes, leak the payloads
        for _ in self.by_ref() {}
    }
}
