//! Breadth-first search over the store and over its segments
//!
//! Based on Ligra (Shun & Blelloch, `PPoPP` 2013) frontier-based traversal patterns.
//! The push form walks out-edges from a queue; the pull form lets every unvisited
//! vertex look for a parent among its in-edges, one segment at a time.

use crate::error::{CsrError, Result};
use crate::storage::{CsrStore, EdgeTarget, Inversion, VertexId, WithInverse};
use rayon::prelude::*;
use std::collections::VecDeque;
use tracing::debug;

/// Parent marker for vertices the search never reached
pub const UNREACHED: VertexId = -1;

fn check_source<D: EdgeTarget, I: Inversion>(
    store: &CsrStore<D, I>,
    source: VertexId,
) -> Result<usize> {
    if source < 0 || i64::from(source) >= store.num_vertices() {
        return Err(CsrError::VertexOutOfRange {
            vertex: i64::from(source),
            num_vertices: store.num_vertices(),
        });
    }
    #[allow(clippy::cast_sign_loss)] // checked above
    Ok(source as usize)
}

/// Breadth-first search from `source` along out-edges
///
/// Returns the parent of every vertex in the BFS tree; `parent[source] == source`
/// and unreached vertices hold [`UNREACHED`].
///
/// # Errors
///
/// Returns [`CsrError::VertexOutOfRange`] if `source` is not a vertex
///
/// # Example
///
/// ```
/// use csr_segments::{bfs_parents, Builder, CsrStore};
///
/// let store: CsrStore = Builder::new().build_directed(&[(0, 1), (1, 2)]).unwrap();
/// let parent = bfs_parents(&store, 0).unwrap();
/// assert_eq!(parent, vec![0, 0, 1]);
/// ```
#[allow(clippy::cast_sign_loss)] // vertex ids validated at construction
pub fn bfs_parents<D: EdgeTarget, I: Inversion>(
    store: &CsrStore<D, I>,
    source: VertexId,
) -> Result<Vec<VertexId>> {
    let start = check_source(store, source)?;
    let mut parent = vec![UNREACHED; store.vertices().len()];
    let mut queue = VecDeque::new();

    parent[start] = source;
    queue.push_back(source);

    while let Some(current) = queue.pop_front() {
        for neighbor in store.out_neighbors(current) {
            let v = neighbor.vertex();
            if parent[v as usize] == UNREACHED {
                parent[v as usize] = current;
                queue.push_back(v);
            }
        }
    }

    Ok(parent)
}

/// Level-synchronous pull BFS over the segments registered under `label`
///
/// Each level scans the segments in parallel: an unvisited destination takes the
/// first in-edge source found in the current frontier. Candidates are merged in
/// segment order, so the result is deterministic and every vertex sits at the
/// same depth as in [`bfs_parents`].
///
/// # Errors
///
/// Returns [`CsrError::UnknownLabel`] if no segments exist under `label`, or
/// [`CsrError::VertexOutOfRange`] if `source` is not a vertex
#[allow(clippy::cast_sign_loss)]
pub fn pull_bfs_parents<D: EdgeTarget>(
    store: &CsrStore<D, WithInverse>,
    label: &str,
    source: VertexId,
) -> Result<Vec<VertexId>> {
    let collection = store
        .segments(label)
        .ok_or_else(|| CsrError::UnknownLabel(label.to_string()))?;
    let start = check_source(store, source)?;

    let n = store.vertices().len();
    let mut parent = vec![UNREACHED; n];
    let mut frontier = vec![false; n];
    parent[start] = source;
    frontier[start] = true;

    let mut level = 0_usize;
    loop {
        let found: Vec<Vec<(VertexId, VertexId)>> = collection
            .as_slice()
            .par_iter()
            .map(|segment| {
                let mut found = Vec::new();
                for (d, sources) in segment.iter() {
                    if parent[d as usize] != UNREACHED {
                        continue;
                    }
                    if let Some(s) = sources.iter().find(|s| frontier[s.vertex() as usize]) {
                        found.push((d, s.vertex()));
                    }
                }
                found
            })
            .collect();

        let mut next = vec![false; n];
        let mut awake = 0_usize;
        for (d, p) in found.into_iter().flatten() {
            if parent[d as usize] == UNREACHED {
                parent[d as usize] = p;
                next[d as usize] = true;
                awake += 1;
            }
        }
        if awake == 0 {
            break;
        }
        level += 1;
        debug!(label = %label, level, awake, "pull level done");
        frontier = next;
    }

    Ok(parent)
}
