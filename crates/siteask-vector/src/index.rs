use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashSet};
use std::path::Path;

use serde::{Deserialize, Serialize};
use siteask_core::{SiteaskError, SiteaskResult};
use tracing::info;

/// Magic bytes at the start of every persisted index file.
const MAGIC: &[u8; 4] = b"SKNN";
/// On-disk format version.
const FORMAT_VERSION: u32 = 1;

/// Construction and query tuning for [`NswIndex`].
///
/// `ef_construction` is the beam width used while wiring the graph and
/// `ef_search` the beam width used per query; both trade recall
/// against latency — higher is slower and more accurate. They are
/// configuration, never hard-coded call sites.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexParams {
    /// Beam width during graph construction.
    pub ef_construction: usize,
    /// Maximum neighbors kept per node.
    pub max_degree: usize,
    /// Beam width during queries.
    pub ef_search: usize,
}

impl Default for IndexParams {
    fn default() -> Self {
        Self {
            ef_construction: 100,
            max_degree: 16,
            ef_search: 50,
        }
    }
}

/// Sidecar metadata for a persisted index artifact.
///
/// `domains[i]` is the site domain owning integer id `i`; `count`
/// equals the number of vectors indexed. Produced by the external ETL
/// step and consumed read-only here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShardMetadata {
    /// Per-id owning domain, indexed by integer id.
    pub domains: Vec<String>,
    /// Embedding dimension of the indexed vectors.
    pub dim: usize,
    /// Number of vectors indexed.
    pub count: usize,
}

impl ShardMetadata {
    /// Reads sidecar metadata from a JSON file.
    pub fn load(path: &Path) -> SiteaskResult<Self> {
        let data = std::fs::read_to_string(path).map_err(|e| {
            SiteaskError::Config(format!("cannot read shard metadata {}: {e}", path.display()))
        })?;
        let meta: Self = serde_json::from_str(&data).map_err(|e| {
            SiteaskError::Config(format!("malformed shard metadata {}: {e}", path.display()))
        })?;
        if meta.domains.len() != meta.count {
            return Err(SiteaskError::Config(format!(
                "shard metadata inconsistent: {} domains for count {}",
                meta.domains.len(),
                meta.count
            )));
        }
        Ok(meta)
    }

    /// Writes sidecar metadata as JSON.
    pub fn save(&self, path: &Path) -> SiteaskResult<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Cross-checks this metadata against a loaded index, failing fast
    /// on dimension or count mismatch.
    pub fn validate(&self, index: &NswIndex) -> SiteaskResult<()> {
        if self.dim != index.dim() {
            return Err(SiteaskError::Config(format!(
                "shard metadata dim {} does not match index dim {}",
                self.dim,
                index.dim()
            )));
        }
        if self.count != index.len() {
            return Err(SiteaskError::Config(format!(
                "shard metadata count {} does not match index count {}",
                self.count,
                index.len()
            )));
        }
        Ok(())
    }
}

/// A single-layer navigable-small-world graph over cosine distance.
///
/// Built once from a batch of `(id, vector)` pairs and read-only
/// afterwards, so concurrent queries share it freely. Queries are
/// deterministic for a fixed index and query vector: beam expansion
/// breaks distance ties by node id and uses no randomness.
#[derive(Debug)]
pub struct NswIndex {
    dim: usize,
    ids: Vec<u64>,
    /// Flat row-major vector storage, `len == ids.len() * dim`.
    vectors: Vec<f32>,
    neighbors: Vec<Vec<u32>>,
    ef_search: usize,
}

/// Heap entry ordered by distance, ties broken by node id so beam
/// expansion is deterministic.
struct DistEntry(f32, u32);

impl PartialEq for DistEntry {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == std::cmp::Ordering::Equal
    }
}

impl Eq for DistEntry {}

impl Ord for DistEntry {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.0
            .total_cmp(&other.0)
            .then_with(|| self.1.cmp(&other.1))
    }
}

impl PartialOrd for DistEntry {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl NswIndex {
    /// Builds an index from a one-time batch of `(id, vector)` pairs.
    ///
    /// All vectors must share one dimension; a mismatch is a
    /// configuration error. Insertion order is preserved, which makes
    /// construction deterministic.
    pub fn build(entries: &[(u64, Vec<f32>)], params: &IndexParams) -> SiteaskResult<Self> {
        let dim = entries.first().map_or(0, |(_, v)| v.len());
        let mut index = Self {
            dim,
            ids: Vec::with_capacity(entries.len()),
            vectors: Vec::with_capacity(entries.len() * dim),
            neighbors: Vec::with_capacity(entries.len()),
            ef_search: params.ef_search,
        };

        for (id, vector) in entries {
            if vector.len() != dim {
                return Err(SiteaskError::Config(format!(
                    "vector for id {} has dimension {}, index dimension is {dim}",
                    id,
                    vector.len()
                )));
            }
            index.insert(*id, vector, params);
        }

        info!(count = index.len(), dim, "nsw index built");
        Ok(index)
    }

    /// Overrides the per-query beam width. Chainable.
    pub fn with_ef_search(mut self, ef_search: usize) -> Self {
        self.ef_search = ef_search;
        self
    }

    /// Number of indexed vectors.
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    /// Whether the index holds no vectors.
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Embedding dimension, 0 for an empty index.
    pub fn dim(&self) -> usize {
        self.dim
    }

    /// Nearest-neighbor query: up to `k` `(id, distance)` pairs,
    /// ascending by distance. An empty index yields an empty result,
    /// not an error.
    pub fn query(&self, vector: &[f32], k: usize) -> SiteaskResult<Vec<(u64, f32)>> {
        if self.is_empty() || k == 0 {
            return Ok(Vec::new());
        }
        if vector.len() != self.dim {
            return Err(SiteaskError::Config(format!(
                "query vector has dimension {}, index dimension is {}",
                vector.len(),
                self.dim
            )));
        }

        let beam = self.ef_search.max(k);
        let mut found = self.search_beam(vector, beam);
        found.truncate(k);
        Ok(found
            .into_iter()
            .map(|(node, dist)| (self.ids[node as usize], dist))
            .collect())
    }

    fn insert(&mut self, id: u64, vector: &[f32], params: &IndexParams) {
        let node = self.ids.len() as u32;
        let near = if node == 0 {
            Vec::new()
        } else {
            self.search_beam(vector, params.ef_construction.max(params.max_degree))
        };

        self.ids.push(id);
        self.vectors.extend_from_slice(vector);
        self.neighbors.push(Vec::new());

        for (peer, _) in near.into_iter().take(params.max_degree) {
            self.neighbors[node as usize].push(peer);
            self.neighbors[peer as usize].push(node);
            if self.neighbors[peer as usize].len() > params.max_degree {
                self.prune(peer, params.max_degree);
            }
        }
    }

    /// Keeps only the `max_degree` closest neighbors of `node`.
    fn prune(&mut self, node: u32, max_degree: usize) {
        let anchor: Vec<f32> = self.vector_at(node).to_vec();
        let mut links = std::mem::take(&mut self.neighbors[node as usize]);
        links.sort_by(|a, b| {
            DistEntry(self.distance(&anchor, *a), *a)
                .cmp(&DistEntry(self.distance(&anchor, *b), *b))
        });
        links.dedup();
        links.truncate(max_degree);
        self.neighbors[node as usize] = links;
    }

    /// Greedy beam search from the fixed entry point (node 0).
    /// Returns `(node, distance)` ascending, at most `ef` entries.
    fn search_beam(&self, query: &[f32], ef: usize) -> Vec<(u32, f32)> {
        let ef = ef.max(1);
        let entry_dist = self.distance(query, 0);

        let mut visited: HashSet<u32> = HashSet::new();
        visited.insert(0);

        // Min-heap of nodes still to expand, max-heap of the best ef.
        let mut frontier: BinaryHeap<Reverse<DistEntry>> = BinaryHeap::new();
        frontier.push(Reverse(DistEntry(entry_dist, 0)));
        let mut best: BinaryHeap<DistEntry> = BinaryHeap::new();
        best.push(DistEntry(entry_dist, 0));

        while let Some(Reverse(DistEntry(dist, node))) = frontier.pop() {
            let worst = best.peek().map_or(f32::INFINITY, |e| e.0);
            if best.len() >= ef && dist > worst {
                break;
            }

            for &peer in &self.neighbors[node as usize] {
                if !visited.insert(peer) {
                    continue;
                }
                let peer_dist = self.distance(query, peer);
                let worst = best.peek().map_or(f32::INFINITY, |e| e.0);
                if best.len() < ef || peer_dist < worst {
                    frontier.push(Reverse(DistEntry(peer_dist, peer)));
                    best.push(DistEntry(peer_dist, peer));
                    if best.len() > ef {
                        best.pop();
                    }
                }
            }
        }

        best.into_sorted_vec()
            .into_iter()
            .map(|DistEntry(dist, node)| (node, dist))
            .collect()
    }

    fn vector_at(&self, node: u32) -> &[f32] {
        let start = node as usize * self.dim;
        &self.vectors[start..start + self.dim]
    }

    /// Cosine distance between a query vector and a stored node.
    fn distance(&self, query: &[f32], node: u32) -> f32 {
        let stored = self.vector_at(node);
        let dot: f32 = query.iter().zip(stored.iter()).map(|(a, b)| a * b).sum();
        let nq: f32 = query.iter().map(|x| x * x).sum::<f32>().sqrt();
        let ns: f32 = stored.iter().map(|x| x * x).sum::<f32>().sqrt();
        if nq == 0.0 || ns == 0.0 {
            return 1.0;
        }
        1.0 - dot / (nq * ns)
    }

    // --- Persistence ---

    /// Serializes the index to its little-endian binary artifact.
    pub fn save(&self, path: &Path) -> SiteaskResult<()> {
        let mut buf: Vec<u8> = Vec::new();
        buf.extend_from_slice(MAGIC);
        buf.extend_from_slice(&FORMAT_VERSION.to_le_bytes());
        buf.extend_from_slice(&(self.dim as u32).to_le_bytes());
        buf.extend_from_slice(&(self.ids.len() as u64).to_le_bytes());
        for id in &self.ids {
            buf.extend_from_slice(&id.to_le_bytes());
        }
        for value in &self.vectors {
            buf.extend_from_slice(&value.to_le_bytes());
        }
        for links in &self.neighbors {
            buf.extend_from_slice(&(links.len() as u32).to_le_bytes());
            for peer in links {
                buf.extend_from_slice(&peer.to_le_bytes());
            }
        }
        std::fs::write(path, buf)?;
        Ok(())
    }

    /// Loads a persisted index.
    ///
    /// Fails fast with a descriptive error on a bad magic number,
    /// unsupported version, or truncated data. A reloaded index
    /// reproduces identical query results to the index that wrote it.
    pub fn load(path: &Path) -> SiteaskResult<Self> {
        let data = std::fs::read(path).map_err(|e| {
            SiteaskError::Config(format!("cannot read index {}: {e}", path.display()))
        })?;
        let mut cursor: &[u8] = &data;

        let magic = take(&mut cursor, 4, "magic")?;
        if magic != MAGIC {
            return Err(SiteaskError::Config(format!(
                "{} is not an index artifact (bad magic)",
                path.display()
            )));
        }
        let version = read_u32(&mut cursor, "version")?;
        if version != FORMAT_VERSION {
            return Err(SiteaskError::Config(format!(
                "unsupported index format version {version}, expected {FORMAT_VERSION}"
            )));
        }

        let dim = read_u32(&mut cursor, "dim")? as usize;
        let count = read_u64(&mut cursor, "count")? as usize;

        // The fixed-width sections must fit in what is left before
        // anything is allocated from the declared counts.
        match count.checked_mul(8 + dim * 4) {
            Some(needed) if needed <= cursor.len() => {}
            _ => {
                return Err(SiteaskError::Config(format!(
                    "index artifact declares {count} vectors of dim {dim} but holds {} bytes",
                    cursor.len()
                )))
            }
        }

        let mut ids = Vec::with_capacity(count);
        for _ in 0..count {
            ids.push(read_u64(&mut cursor, "ids")?);
        }

        let mut vectors = Vec::with_capacity(count * dim);
        for _ in 0..count * dim {
            vectors.push(read_f32(&mut cursor, "vectors")?);
        }

        let mut neighbors = Vec::with_capacity(count);
        for _ in 0..count {
            let degree = read_u32(&mut cursor, "degree")? as usize;
            let mut links = Vec::with_capacity(degree);
            for _ in 0..degree {
                let peer = read_u32(&mut cursor, "neighbors")?;
                if peer as usize >= count {
                    return Err(SiteaskError::Config(format!(
                        "index artifact references node {peer} beyond count {count}"
                    )));
                }
                links.push(peer);
            }
            neighbors.push(links);
        }

        if !cursor.is_empty() {
            return Err(SiteaskError::Config(format!(
                "index artifact has {} trailing bytes",
                cursor.len()
            )));
        }

        Ok(Self {
            dim,
            ids,
            vectors,
            neighbors,
            ef_search: IndexParams::default().ef_search,
        })
    }
}

fn take<'a>(cursor: &mut &'a [u8], n: usize, what: &str) -> SiteaskResult<&'a [u8]> {
    if cursor.len() < n {
        return Err(SiteaskError::Config(format!(
            "index artifact truncated while reading {what}"
        )));
    }
    let (head, rest) = cursor.split_at(n);
    *cursor = rest;
    Ok(head)
}

fn read_u32(cursor: &mut &[u8], what: &str) -> SiteaskResult<u32> {
    let bytes = take(cursor, 4, what)?;
    Ok(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
}

fn read_u64(cursor: &mut &[u8], what: &str) -> SiteaskResult<u64> {
    let bytes = take(cursor, 8, what)?;
    let mut arr = [0u8; 8];
    arr.copy_from_slice(bytes);
    Ok(u64::from_le_bytes(arr))
}

fn read_f32(cursor: &mut &[u8], what: &str) -> SiteaskResult<f32> {
    let bytes = take(cursor, 4, what)?;
    Ok(f32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
}
