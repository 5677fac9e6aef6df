//! Host → routing tree table.
//!
//! The wildcard tree lives outside the map: it exists from construction, is
//! never removed, and answering from it never touches a map shard. Every other
//! host gets its tree lazily, on first registration.
//!
//! The map is a [`DashMap`], so `get_or_create` for one host and `lookup` for
//! another only contend when they hash to the same shard, and a tree is fully
//! built before it is inserted. Guards are dropped before returning; callers
//! only ever see an `Arc<Tree>`.

use std::sync::Arc;

use dashmap::DashMap;
use tracing::debug;

use crate::handler::BoxedHandler;
use crate::tree::Tree;

/// The reserved host key of the wildcard/default tree.
pub const WILDCARD: &str = "*";

pub(crate) struct HostTable {
    wildcard: Arc<Tree>,
    hosts: DashMap<String, Arc<Tree>>,
    not_found: BoxedHandler,
}

impl HostTable {
    pub(crate) fn new(not_found: BoxedHandler) -> Self {
        Self {
            wildcard: Arc::new(Tree::new(WILDCARD, Arc::clone(&not_found))),
            hosts: DashMap::new(),
            not_found,
        }
    }

    /// The tree for `host`, created (with the wildcard tree's not-found
    /// handler) if this is the first time `host` is seen.
    pub(crate) fn get_or_create(&self, host: &str) -> Arc<Tree> {
        if is_wildcard(host) {
            return Arc::clone(&self.wildcard);
        }
        if let Some(tree) = self.hosts.get(host) {
            return Arc::clone(tree.value());
        }

        let entry = self.hosts.entry(host.to_owned()).or_insert_with(|| {
            debug!(host, "host tree created");
            Arc::new(Tree::new(host, Arc::clone(&self.not_found)))
        });
        Arc::clone(entry.value())
    }

    /// The tree for `host`, or the wildcard tree when `host` has none.
    pub(crate) fn lookup(&self, host: &str) -> Arc<Tree> {
        if is_wildcard(host) {
            return Arc::clone(&self.wildcard);
        }
        self.hosts
            .get(host)
            .map(|tree| Arc::clone(tree.value()))
            .unwrap_or_else(|| Arc::clone(&self.wildcard))
    }

    /// Leaf routes across every host's tree, nested groups included.
    pub(crate) fn route_count(&self) -> usize {
        let hosts: usize = self.hosts.iter().map(|entry| entry.value().route_count()).sum();
        self.wildcard.route_count() + hosts
    }

    /// Every host key with a tree, wildcard first, the rest sorted.
    pub(crate) fn hosts(&self) -> Vec<String> {
        let mut hosts: Vec<String> = self.hosts.iter().map(|entry| entry.key().clone()).collect();
        hosts.sort();
        hosts.insert(0, WILDCARD.to_owned());
        hosts
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.hosts.len() + 1
    }
}

fn is_wildcard(host: &str) -> bool {
    host.is_empty() || host == WILDCARD
}
