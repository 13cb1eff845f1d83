use super::normalize;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

/// Group of observations that normalize to the same text
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryCluster {
    pub signature: u64,
    /// First raw text seen for this signature, bounded
    pub example: String,
    pub normalized: String,
    pub count: u64,
    /// Members seen since the last window boundary
    pub window_count: u64,
    pub total_exec_ms: f64,
    /// Arrival order of the first and latest member
    pub first_seen: u64,
    pub last_seen: u64,
}

impl QueryCluster {
    pub fn avg_exec_ms(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.total_exec_ms / self.count as f64
        }
    }

    pub fn is_repeated(&self) -> bool {
        self.count > 1
    }

    pub fn fingerprint(&self) -> String {
        normalize::fingerprint(&self.normalized)
    }
}

/// Outcome of offering an observation to the table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Placement {
    Existing,
    Created,
    Rejected,
}

/// Bounded signature-keyed cluster storage. Never evicts.
#[derive(Debug)]
pub(crate) struct ClusterTable {
    clusters: Vec<QueryCluster>,
    index: FxHashMap<u64, usize>,
    capacity: usize,
}

impl ClusterTable {
    pub fn new(capacity: usize) -> Self {
        Self {
            clusters: Vec::new(),
            index: FxHashMap::default(),
            capacity,
        }
    }

    pub fn insert(
        &mut self,
        signature: u64,
        normalized: String,
        example: impl FnOnce() -> String,
        exec_ms: f64,
        order: u64,
    ) -> Placement {
        if let Some(&slot) = self.index.get(&signature) {
            let cluster = &mut self.clusters[slot];
            cluster.count += 1;
            cluster.window_count += 1;
            cluster.total_exec_ms += exec_ms;
            cluster.last_seen = order;
            return Placement::Existing;
        }
        if self.clusters.len() >= self.capacity {
            return Placement::Rejected;
        }
        self.index.insert(signature, self.clusters.len());
        self.clusters.push(QueryCluster {
            signature,
            example: example(),
            normalized,
            count: 1,
            window_count: 1,
            total_exec_ms: exec_ms,
            first_seen: order,
            last_seen: order,
        });
        Placement::Created
    }

    pub fn len(&self) -> usize {
        self.clusters.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &QueryCluster> {
        self.clusters.iter()
    }

    /// Clusters with more than one member, most frequent first, ties by arrival
    pub fn repeated(&self) -> Vec<&QueryCluster> {
        let mut repeated: Vec<_> = self.clusters.iter().filter(|c| c.is_repeated()).collect();
        repeated.sort_by(|a, b| b.count.cmp(&a.count).then(a.first_seen.cmp(&b.first_seen)));
        repeated
    }

    /// Observations that belong to a repeated cluster
    pub fn repeated_members(&self) -> u64 {
        self.clusters.iter().filter(|c| c.is_repeated()).map(|c| c.count).sum()
    }

    /// Start a new window; totals are kept
    pub fn open_window(&mut self) {
        for cluster in &mut self.clusters {
            cluster.window_count = 0;
        }
    }

    /// Cluster repeated most often in the current window, earliest wins ties
    pub fn dominant(&self) -> Option<&QueryCluster> {
        self.clusters
            .iter()
            .filter(|c| c.window_count > 1)
            .max_by(|a, b| a.window_count.cmp(&b.window_count).then(b.first_seen.cmp(&a.first_seen)))
    }
}
