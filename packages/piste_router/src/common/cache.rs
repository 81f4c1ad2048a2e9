//! A bounded, least-recently-used cache of built navigation graphs. Building
//! a graph is cheap enough to do per request for a single resort, but not
//! for every request, so the service keeps the most recently used resorts
//! around. The cache is an explicit value owned by the caller; entries are
//! handed out behind an Arc and are never mutated once inserted.

use rustc_hash::FxHashMap;
use std::collections::VecDeque;
use std::sync::Arc;

use crate::common::graph_data::NavigationGraph;
use crate::common::resort::SkiArea;

/// A resort dataset along with the graph built from it
#[derive(Debug)]
pub struct CachedResort {
    pub ski_area: SkiArea,
    pub graph: NavigationGraph,
}

pub struct GraphCache {
    capacity: usize,
    map: FxHashMap<String, Arc<CachedResort>>,
    queue: VecDeque<String>,
}

impl GraphCache {
    pub fn new(capacity: usize) -> Self {
        GraphCache {
            capacity: capacity.max(1),
            map: FxHashMap::default(),
            queue: VecDeque::new(),
        }
    }

    /// Fetch a resort, marking it as the most recently used
    pub fn get(&mut self, ski_area_id: &str) -> Option<Arc<CachedResort>> {
        let resort = self.map.get(ski_area_id)?;

        // Promote to back (recently used)
        if let Some(pos) = self.queue.iter().position(|k| k == ski_area_id) {
            if let Some(key) = self.queue.remove(pos) {
                self.queue.push_back(key);
            }
        }

        Some(Arc::clone(resort))
    }

    /// Store a resort, evicting the least recently used entry if the cache is
    /// full. Any previous entry for the same ski area is replaced.
    pub fn insert(&mut self, resort: CachedResort) -> Arc<CachedResort> {
        let key = resort.ski_area.id.clone();
        let resort = Arc::new(resort);

        if self.map.contains_key(&key) {
            self.queue.retain(|k| k != &key);
        } else if self.map.len() >= self.capacity {
            if let Some(old_key) = self.queue.pop_front() {
                self.map.remove(&old_key);
            }
        }

        self.map.insert(key.clone(), Arc::clone(&resort));
        self.queue.push_back(key);

        resort
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}
