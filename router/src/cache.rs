//! Memoized agent→filtered-toolset map.
//!
//! Keyed by `(agent name, toolset hash)` so a config change that alters an
//! agent's allowlist naturally misses. Capacity 50, FIFO eviction, guarded
//! by a small internal lock.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use sha2::{Digest, Sha256};

use steward_providers::ToolSpec;
use steward_tools::ToolDefinition;

const CAPACITY: usize = 50;

#[derive(Default)]
struct Inner {
    map: HashMap<String, Arc<Vec<ToolSpec>>>,
    order: VecDeque<String>,
}

pub struct ToolsetCache {
    inner: Mutex<Inner>,
    capacity: usize,
}

impl Default for ToolsetCache {
    fn default() -> Self {
        Self::new()
    }
}

impl ToolsetCache {
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
            capacity: CAPACITY,
        }
    }

    /// Fetch the filtered toolset for `agent_name`, building it from
    /// `definitions` on a miss.
    pub fn get_or_build(
        &self,
        agent_name: &str,
        definitions: &[ToolDefinition],
        allowed: impl Fn(&ToolDefinition) -> bool,
    ) -> Arc<Vec<ToolSpec>> {
        let names: Vec<&str> = definitions
            .iter()
            .filter(|d| allowed(d))
            .map(|d| d.name.as_str())
            .collect();
        let key = format!("{agent_name}:{}", toolset_hash(&names));

        let mut inner = self.inner.lock().expect("toolset cache lock poisoned");
        if let Some(hit) = inner.map.get(&key) {
            return hit.clone();
        }

        let specs: Arc<Vec<ToolSpec>> = Arc::new(
            definitions
                .iter()
                .filter(|d| allowed(d))
                .map(|d| ToolSpec {
                    name: d.name.clone(),
                    description: d.description.clone(),
                    schema: d.schema.clone(),
                })
                .collect(),
        );

        if inner.order.len() >= self.capacity
            && let Some(evicted) = inner.order.pop_front()
        {
            inner.map.remove(&evicted);
        }
        inner.order.push_back(key.clone());
        inner.map.insert(key, specs.clone());
        specs
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.inner.lock().expect("lock").map.len()
    }
}

fn toolset_hash(sorted_names: &[&str]) -> String {
    let mut hasher = Sha256::new();
    for name in sorted_names {
        hasher.update(name.as_bytes());
        hasher.update([0]);
    }
    format!("{:x}", hasher.finalize())
}
