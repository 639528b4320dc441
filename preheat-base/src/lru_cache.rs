use crate::hashing::HashMap;
use std::hash::Hash;

const NULL_INDEX: u32 = u32::MAX;

#[derive(Copy, Clone)]
struct LruCacheNode {
    next: u32,
    previous: u32,
}

/// Fixed-capacity cache that evicts the least recently used entry when full.
///
/// Entries live in a slab of slots. The slots are threaded onto a doubly linked list (indices
/// instead of pointers, `u32::MAX` for "null") ordered from most to least recently used. Free slots
/// are kept on a separate singly linked list through `next`.
pub struct LruCache<K, V> {
    capacity: u32,
    head: u32,
    tail: u32,
    free_head: u32,
    nodes: Vec<LruCacheNode>,
    entries: Vec<Option<(K, V)>>,
    lookup: HashMap<K, u32>,
}

impl<K: Clone + Eq + Hash, V> LruCache<K, V> {
    pub fn new(capacity: u32) -> LruCache<K, V> {
        assert!(capacity > 0);
        let mut nodes = Vec::with_capacity(capacity as usize);
        let mut entries = Vec::with_capacity(capacity as usize);
        for i in 0..capacity {
            let next = if i + 1 < capacity { i + 1 } else { NULL_INDEX };
            nodes.push(LruCacheNode {
                next,
                previous: NULL_INDEX,
            });
            entries.push(None);
        }

        LruCache {
            capacity,
            head: NULL_INDEX,
            tail: NULL_INDEX,
            free_head: 0,
            nodes,
            entries,
            lookup: HashMap::default(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity as usize
    }

    pub fn len(&self) -> usize {
        self.lookup.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lookup.is_empty()
    }

    pub fn contains(
        &self,
        k: &K,
    ) -> bool {
        self.lookup.contains_key(k)
    }

    /// Returns the value and marks it as most recently used
    pub fn get(
        &mut self,
        k: &K,
    ) -> Option<&V> {
        let index = *self.lookup.get(k)?;
        self.unlink(index);
        self.push_front(index);
        self.entries[index as usize].as_ref().map(|(_, v)| v)
    }

    /// Returns the value without touching its position in the eviction order
    pub fn peek(
        &self,
        k: &K,
    ) -> Option<&V> {
        let index = *self.lookup.get(k)?;
        self.entries[index as usize].as_ref().map(|(_, v)| v)
    }

    /// Inserts or replaces the value for `k`. If the cache was full, the least recently used entry
    /// is evicted and returned.
    pub fn insert(
        &mut self,
        k: K,
        v: V,
    ) -> Option<(K, V)> {
        if let Some(&index) = self.lookup.get(&k) {
            self.unlink(index);
            self.push_front(index);
            self.entries[index as usize] = Some((k, v));
            return None;
        }

        let mut evicted = None;
        if self.free_head == NULL_INDEX {
            let tail = self.tail;
            self.unlink(tail);
            evicted = self.entries[tail as usize].take();
            if let Some((evicted_key, _)) = &evicted {
                self.lookup.remove(evicted_key);
            }
            self.release(tail);
        }

        let index = self.free_head;
        self.free_head = self.nodes[index as usize].next;
        self.push_front(index);
        self.lookup.insert(k.clone(), index);
        self.entries[index as usize] = Some((k, v));
        evicted
    }

    pub fn remove(
        &mut self,
        k: &K,
    ) -> Option<V> {
        let index = self.lookup.remove(k)?;
        self.unlink(index);
        let value = self.entries[index as usize].take().map(|(_, v)| v);
        self.release(index);
        value
    }

    pub fn clear(&mut self) {
        *self = LruCache::new(self.capacity);
    }

    /// Keys ordered from most to least recently used
    pub fn keys(&self) -> Vec<K> {
        let mut keys = Vec::with_capacity(self.len());
        let mut index = self.head;
        while index != NULL_INDEX {
            if let Some((k, _)) = &self.entries[index as usize] {
                keys.push(k.clone());
            }
            index = self.nodes[index as usize].next;
        }
        keys
    }

    fn unlink(
        &mut self,
        index: u32,
    ) {
        let node = self.nodes[index as usize];
        if node.previous != NULL_INDEX {
            self.nodes[node.previous as usize].next = node.next;
        } else {
            self.head = node.next;
        }

        if node.next != NULL_INDEX {
            self.nodes[node.next as usize].previous = node.previous;
        } else {
            self.tail = node.previous;
        }
    }

    fn push_front(
        &mut self,
        index: u32,
    ) {
        self.nodes[index as usize].previous = NULL_INDEX;
        self.nodes[index as usize].next = self.head;
        if self.head != NULL_INDEX {
            self.nodes[self.head as usize].previous = index;
        }
        self.head = index;
        if self.tail == NULL_INDEX {
            self.tail = index;
        }
    }

    fn release(
        &mut self,
        index: u32,
    ) {
        self.nodes[index as usize].previous = NULL_INDEX;
        self.nodes[index as usize].next = self.free_head;
        self.free_head = index;
    }
}
