//! Stack-chain interner.
//!
//! A `Stack` is an ordered, leaf-first sequence of [`FrameHandle`]s. Equal
//! sequences must share identity (`is`-equivalence in the original, here
//! `Arc::ptr_eq`), so two allocations taken from the same call path never
//! allocate a second copy of the chain.
//!
//! Grounded on the dense-handle interning idiom in
//! `other_examples/.../webrender-src-intern.rs` (`Handle<I>` as a stable
//! `u32` index into a backing store), adapted here to a trie keyed on
//! frame handles from the root outward so that stacks sharing a common
//! ancestry share storage.

use crate::frame::FrameHandle;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

/// Maximum frames any single stack may carry; enforced by the caller
/// (the recorder) via the configured `traceback_limit`, not here.
pub type Stack = Arc<[FrameHandle]>;

/// Stable handle into a [`StackInterner`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StackHandle(u32);

struct TrieNode {
    children: HashMap<FrameHandle, TrieNode>,
    /// Set once a stack terminating at this node has been interned.
    stack: Option<Stack>,
    handle: Option<StackHandle>,
}

impl TrieNode {
    fn new() -> Self {
        Self {
            children: HashMap::new(),
            stack: None,
            handle: None,
        }
    }
}

/// Deduplicating store for frame-handle sequences.
///
/// The trie is keyed root-first (the stack's *last* leaf-first element is
/// the trie's first edge) so that stacks sharing a common call-path
/// prefix from main() down share trie nodes.
pub struct StackInterner {
    inner: RwLock<Inner>,
}

struct Inner {
    root: TrieNode,
    next_handle: u32,
    /// Indexed by `StackHandle.0`, for O(1) reverse lookup.
    by_handle: Vec<Stack>,
}

impl StackInterner {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Inner {
                root: TrieNode::new(),
                next_handle: 0,
                by_handle: Vec::new(),
            }),
        }
    }

    /// Intern a leaf-first sequence of frame handles, returning a stable
    /// handle. Equal sequences (by value) always return a handle whose
    /// resolved `Stack` is the identical `Arc` allocation.
    pub fn intern(&self, leaf_first_frames: &[FrameHandle]) -> (StackHandle, Stack) {
        {
            let guard = self.inner.read();
            if let Some((handle, stack)) = Self::lookup(&guard.root, leaf_first_frames) {
                return (handle, stack);
            }
        }
        let mut guard = self.inner.write();
        if let Some((handle, stack)) = Self::lookup(&guard.root, leaf_first_frames) {
            return (handle, stack);
        }
        // Go through one `&mut Inner` so the fields below can be
        // borrowed independently of `node`'s borrow of `root`.
        let inner = &mut *guard;
        // Walk root-first (reverse of the stored leaf-first order),
        // creating trie nodes as needed.
        let mut node = &mut inner.root;
        for frame in leaf_first_frames.iter().rev() {
            node = node.children.entry(*frame).or_insert_with(TrieNode::new);
        }
        let stack: Stack = Arc::from(leaf_first_frames);
        let handle = StackHandle(inner.next_handle);
        inner.next_handle += 1;
        inner.by_handle.push(Arc::clone(&stack));
        node.stack = Some(Arc::clone(&stack));
        node.handle = Some(handle);
        (handle, stack)
    }

    fn lookup(root: &TrieNode, leaf_first_frames: &[FrameHandle]) -> Option<(StackHandle, Stack)> {
        let mut node = root;
        for frame in leaf_first_frames.iter().rev() {
            node = node.children.get(frame)?;
        }
        match (node.handle, &node.stack) {
            (Some(handle), Some(stack)) => Some((handle, Arc::clone(stack))),
            _ => None,
        }
    }

    pub fn resolve(&self, handle: StackHandle) -> Stack {
        Arc::clone(&self.inner.read().by_handle[handle.0 as usize])
    }

    pub fn len(&self) -> usize {
        self.inner.read().by_handle.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn memory_cost(&self) -> usize {
        let guard = self.inner.read();
        guard
            .by_handle
            .iter()
            .map(|s| s.len() * std::mem::size_of::<FrameHandle>() + std::mem::size_of::<Stack>())
            .sum()
    }

    pub fn clear(&self) {
        let mut guard = self.inner.write();
        guard.root = TrieNode::new();
        guard.next_handle = 0;
        guard.by_handle.clear();
    }
}

impl Default for StackInterner {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fh(n: u32) -> FrameHandle {
        // FrameHandle has no public constructor outside frame.rs; tests
        // here exercise StackInterner through its own handle type only,
        // using frame.rs's interner to mint real handles.
        let interner = crate::frame::FrameInterner::new();
        let _ = n;
        interner.intern("f", "a.py", 1, n as i32)
    }

    #[test]
    fn equal_sequences_share_identity() {
        let frame_interner = crate::frame::FrameInterner::new();
        let a = frame_interner.intern("leaf", "a.py", 1, 2);
        let b = frame_interner.intern("root", "a.py", 1, 1);
        let interner = StackInterner::new();
        let (h1, s1) = interner.intern(&[a, b]);
        let (h2, s2) = interner.intern(&[a, b]);
        assert_eq!(h1, h2);
        assert!(Arc::ptr_eq(&s1, &s2));
    }

    #[test]
    fn distinct_sequences_get_distinct_handles() {
        let frame_interner = crate::frame::FrameInterner::new();
        let a = frame_interner.intern("leaf", "a.py", 1, 2);
        let b = frame_interner.intern("root", "a.py", 1, 1);
        let interner = StackInterner::new();
        let (h1, _) = interner.intern(&[a, b]);
        let (h2, _) = interner.intern(&[b, a]);
        assert_ne!(h1, h2);
    }

    #[test]
    fn shared_suffix_reuses_trie_nodes() {
        let frame_interner = crate::frame::FrameInterner::new();
        let leaf1 = frame_interner.intern("leaf1", "a.py", 1, 2);
        let leaf2 = frame_interner.intern("leaf2", "a.py", 1, 3);
        let root = frame_interner.intern("root", "m.py", 1, 10);
        let interner = StackInterner::new();
        let (_, s1) = interner.intern(&[leaf1, root]);
        let (_, s2) = interner.intern(&[leaf2, root]);
        assert_ne!(s1.as_ref(), s2.as_ref());
        assert_eq!(interner.len(), 2);
    }

    #[test]
    fn resolve_round_trips() {
        let interner = StackInterner::new();
        let frames = [fh(1), fh(2)];
        let (handle, stack) = interner.intern(&frames);
        let resolved = interner.resolve(handle);
        assert_eq!(resolved, stack);
    }

    #[test]
    fn single_frame_stack() {
        let frame_interner = crate::frame::FrameInterner::new();
        let only = frame_interner.intern("main", "m.py", 1, 1);
        let interner = StackInterner::new();
        let (_, stack) = interner.intern(&[only]);
        assert_eq!(stack.len(), 1);
    }
}
