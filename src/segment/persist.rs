//! Binary segment files
//!
//! # Format
//!
//! One file per segment, named by its decimal id, native-endian:
//!
//! ```text
//! i64                  num_vertices
//! i64                  num_edges
//! i32[num_vertices]    graph_id
//! D[num_edges]         edges          (4 bytes unweighted, 8 bytes weighted)
//! i64[num_vertices+1]  vertex_array
//! ```
//!
//! Files are read and written by one tokio task per segment; encoding, decoding
//! and validation run on the rayon pool from a blocking task.

use super::bounds::SegmentBounds;
use super::graph::{zeroed_buffer, Segment, SegmentCollection};
use super::off_runtime;
use super::partition::count_totals;
use crate::error::{CsrError, Result};
use crate::storage::{Adjacency, EdgeTarget, VertexId};
use bytemuck::Pod;
use rayon::prelude::*;
use std::mem::size_of;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::task::JoinSet;
use tracing::debug;

const HEADER_BYTES: usize = 2 * size_of::<i64>();

/// Path of segment `id` under `dir`
pub(crate) fn segment_path(dir: &Path, id: usize) -> PathBuf {
    dir.join(id.to_string())
}

/// Where a decode failure is reported
struct SegmentFile<'a> {
    label: &'a str,
    segment: usize,
    path: &'a Path,
}

impl SegmentFile<'_> {
    fn fail(&self, detail: impl Into<String>) -> CsrError {
        CsrError::SegmentLoad {
            label: self.label.to_string(),
            segment: self.segment,
            path: self.path.to_path_buf(),
            detail: detail.into(),
        }
    }
}

/// Serialize one segment in the on-disk layout
pub(crate) fn encode<D: EdgeTarget>(segment: &Segment<D>) -> Vec<u8> {
    let graph_id: &[u8] = bytemuck::cast_slice(segment.graph_id());
    let edges: &[u8] = bytemuck::cast_slice(segment.edges());
    let vertex_array: &[u8] = bytemuck::cast_slice(segment.vertex_array());

    let mut bytes =
        Vec::with_capacity(HEADER_BYTES + graph_id.len() + edges.len() + vertex_array.len());
    bytes.extend_from_slice(bytemuck::bytes_of(&segment.num_vertices()));
    bytes.extend_from_slice(bytemuck::bytes_of(&segment.num_edges()));
    bytes.extend_from_slice(graph_id);
    bytes.extend_from_slice(edges);
    bytes.extend_from_slice(vertex_array);
    bytes
}

/// Expected file length for the given header counts, `None` on overflow
fn expected_len<D>(num_vertices: usize, num_edges: usize) -> Option<usize> {
    let ids = num_vertices.checked_mul(size_of::<VertexId>())?;
    let edges = num_edges.checked_mul(size_of::<D>())?;
    let offsets = num_vertices.checked_add(1)?.checked_mul(size_of::<i64>())?;
    HEADER_BYTES
        .checked_add(ids)?
        .checked_add(edges)?
        .checked_add(offsets)
}

fn read_array<T: Pod>(bytes: &[u8], len: usize, what: &'static str) -> Result<Vec<T>> {
    let mut buffer: Vec<T> = zeroed_buffer(len, what)?;
    bytemuck::cast_slice_mut::<T, u8>(&mut buffer).copy_from_slice(bytes);
    Ok(buffer)
}

fn decode<D: EdgeTarget>(
    file: &SegmentFile<'_>,
    bytes: &[u8],
    bounds: &SegmentBounds,
    num_vertices: i64,
) -> Result<Segment<D>> {
    if bytes.len() < HEADER_BYTES {
        return Err(file.fail(format!(
            "expected at least {HEADER_BYTES} header bytes, read {}",
            bytes.len()
        )));
    }
    let nv: i64 = bytemuck::pod_read_unaligned(&bytes[..8]);
    let ne: i64 = bytemuck::pod_read_unaligned(&bytes[8..HEADER_BYTES]);
    let (Ok(local), Ok(edge_count)) = (usize::try_from(nv), usize::try_from(ne)) else {
        return Err(file.fail(format!("negative counts in header ({nv} vertices, {ne} edges)")));
    };
    let expected = expected_len::<D>(local, edge_count)
        .ok_or_else(|| file.fail(format!("header counts overflow ({nv} vertices, {ne} edges)")))?;
    if bytes.len() != expected {
        return Err(file.fail(format!(
            "expected {expected} bytes for {nv} vertices and {ne} edges, read {}",
            bytes.len()
        )));
    }

    let ids_end = HEADER_BYTES + local * size_of::<VertexId>();
    let edges_end = ids_end + edge_count * size_of::<D>();
    let graph_id: Vec<VertexId> = read_array(&bytes[HEADER_BYTES..ids_end], local, "segment graph ids")?;
    let edges: Vec<D> = read_array(&bytes[ids_end..edges_end], edge_count, "segment edges")?;
    let vertex_array: Vec<i64> =
        read_array(&bytes[edges_end..], local + 1, "segment vertex offsets")?;

    if vertex_array[0] != 0 || vertex_array[local] != ne {
        return Err(file.fail(format!(
            "vertex array spans {}..{}, expected 0..{ne}",
            vertex_array[0], vertex_array[local]
        )));
    }
    if vertex_array.windows(2).any(|w| w[0] > w[1]) {
        return Err(file.fail("vertex array decreases"));
    }
    if graph_id.windows(2).any(|w| w[0] >= w[1])
        || graph_id
            .iter()
            .any(|&d| d < 0 || i64::from(d) >= num_vertices)
    {
        return Err(file.fail(format!(
            "graph ids are not strictly increasing within 0..{num_vertices}"
        )));
    }
    let sources = bounds.range(file.segment);
    if let Some(stray) = edges.iter().find(|e| !sources.contains(&e.vertex())) {
        return Err(file.fail(format!(
            "edge source {} outside segment range {sources:?}; written for a different segment count?",
            stray.vertex()
        )));
    }

    Ok(Segment::from_parts(file.segment, graph_id, edges, vertex_array))
}

/// Whether `dir` holds a persisted collection (segment 0 exists)
pub(crate) async fn is_present(dir: &Path) -> Result<bool> {
    let first = segment_path(dir, 0);
    tokio::fs::try_exists(&first)
        .await
        .map_err(|source| CsrError::Io { path: first, source })
}

/// Load and validate the collection persisted under `dir`
///
/// Every segment must agree with what partitioning `inverse` under `bounds`
/// would produce.
pub(crate) async fn load<D: EdgeTarget>(
    label: &str,
    dir: &Path,
    inverse: Adjacency<D>,
    bounds: SegmentBounds,
    numa_aware: bool,
) -> Result<SegmentCollection<D>> {
    let count = bounds.num_segments();

    let mut tasks = JoinSet::new();
    for id in 0..count {
        let path = segment_path(dir, id);
        tasks.spawn(async move { (id, tokio::fs::read(&path).await) });
    }
    let mut reads: Vec<Option<std::io::Result<Vec<u8>>>> = (0..count).map(|_| None).collect();
    while let Some(joined) = tasks.join_next().await {
        let (id, read) = joined?;
        reads[id] = Some(read);
    }
    // report the lowest failing segment, whatever order the tasks finished in
    let mut files = Vec::with_capacity(count);
    for (id, read) in reads.into_iter().enumerate() {
        let path = segment_path(dir, id);
        match read {
            Some(Ok(bytes)) => files.push((path, bytes)),
            Some(Err(err)) => {
                return Err(SegmentFile {
                    label,
                    segment: id,
                    path: &path,
                }
                .fail(format!("cannot read file: {err}")))
            }
            None => {
                return Err(SegmentFile {
                    label,
                    segment: id,
                    path: &path,
                }
                .fail("file was not read"))
            }
        }
    }

    reject_extra_file(label, dir, count).await?;

    let (owned_label, owned_dir) = (label.to_string(), dir.to_path_buf());
    let collection = off_runtime(move || {
        validate(&owned_label, &owned_dir, files, &inverse, bounds, numa_aware)
    })
    .await?;

    debug!(label = %label, dir = %dir.display(), segments = count, "segment files loaded");
    Ok(collection)
}

/// Fail when `dir` also holds a file for segment `count`
async fn reject_extra_file(label: &str, dir: &Path, count: usize) -> Result<()> {
    let extra = segment_path(dir, count);
    let present = tokio::fs::try_exists(&extra)
        .await
        .map_err(|source| CsrError::Io {
            path: extra.clone(),
            source,
        })?;
    if present {
        return Err(CsrError::SegmentLoad {
            label: label.to_string(),
            segment: count,
            path: extra,
            detail: format!("file present but only {count} segments configured"),
        });
    }
    Ok(())
}

/// Decode every file and check it against a fresh count of `inverse`
#[allow(clippy::cast_possible_wrap, clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn validate<D: EdgeTarget>(
    label: &str,
    dir: &Path,
    files: Vec<(PathBuf, Vec<u8>)>,
    inverse: &Adjacency<D>,
    bounds: SegmentBounds,
    numa_aware: bool,
) -> Result<SegmentCollection<D>> {
    let num_vertices = inverse.index().len() as i64 - 1;
    let segments = files
        .into_par_iter()
        .enumerate()
        .map(|(id, (path, bytes))| {
            let file = SegmentFile {
                label,
                segment: id,
                path: &path,
            };
            decode(&file, &bytes, &bounds, num_vertices)
        })
        .collect::<Result<Vec<Segment<D>>>>()?;

    let expected = count_totals(inverse, &bounds)?;
    for (segment, tally) in segments.iter().zip(&expected) {
        if segment.num_vertices() as usize != tally.vertices
            || segment.num_edges() as usize != tally.edges
        {
            let path = segment_path(dir, segment.id());
            return Err(SegmentFile {
                label,
                segment: segment.id(),
                path: &path,
            }
            .fail(format!(
                "expected {} vertices and {} edges for this graph, file has {} and {}",
                tally.vertices,
                tally.edges,
                segment.num_vertices(),
                segment.num_edges()
            )));
        }
    }

    Ok(SegmentCollection::new(segments, bounds, numa_aware))
}

/// Write every segment of `collection` under `dir`, replacing older files
pub(crate) async fn store<D: EdgeTarget>(
    label: &str,
    dir: &Path,
    collection: &Arc<SegmentCollection<D>>,
) -> Result<()> {
    tokio::fs::create_dir_all(dir)
        .await
        .map_err(|source| CsrError::Io {
            path: dir.to_path_buf(),
            source,
        })?;

    let encoded: Vec<Vec<u8>> = {
        let collection = Arc::clone(collection);
        off_runtime(move || Ok(collection.as_slice().par_iter().map(encode).collect())).await?
    };

    let mut tasks = JoinSet::new();
    for (id, bytes) in encoded.into_iter().enumerate() {
        let path = segment_path(dir, id);
        tasks.spawn(async move {
            tokio::fs::write(&path, bytes)
                .await
                .map_err(|source| CsrError::Io { path, source })
        });
    }
    while let Some(joined) = tasks.join_next().await {
        joined??;
    }

    // Files left over from an earlier, larger segment count would fail the next load
    let mut stale = collection.num_segments();
    loop {
        let path = segment_path(dir, stale);
        match tokio::fs::remove_file(&path).await {
            Ok(()) => stale += 1,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => break,
            Err(source) => return Err(CsrError::Io { path, source }),
        }
    }

    debug!(label = %label, dir = %dir.display(), segments = collection.num_segments(), "segment files written");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::EdgeEndpoint;

    fn sample() -> Segment<VertexId> {
        Segment::from_parts(1, vec![0, 3], vec![2, 2, 3], vec![0, 1, 3])
    }

    fn file(path: &Path) -> SegmentFile<'_> {
        SegmentFile {
            label: "pull",
            segment: 1,
            path,
        }
    }

    fn decode_sample(bytes: &[u8]) -> Result<Segment<VertexId>> {
        let bounds = SegmentBounds::equal_width(4, 2).unwrap();
        decode(&file(Path::new("seg/1")), bytes, &bounds, 4)
    }

    #[test]
    fn test_encoded_layout() {
        let bytes = encode(&sample());
        assert_eq!(bytes.len(), 16 + 2 * 4 + 3 * 4 + 3 * 8);
        assert_eq!(&bytes[..8], &2_i64.to_ne_bytes());
        assert_eq!(&bytes[8..16], &3_i64.to_ne_bytes());
        assert_eq!(&bytes[16..20], &0_i32.to_ne_bytes());
        assert_eq!(&bytes[20..24], &3_i32.to_ne_bytes());
        assert_eq!(&bytes[bytes.len() - 8..], &3_i64.to_ne_bytes());
    }

    #[test]
    fn test_decode_restores_arrays() {
        let restored = decode_sample(&encode(&sample())).unwrap();
        assert_eq!(restored.graph_id(), &[0, 3]);
        assert_eq!(restored.edges(), &[2, 2, 3]);
        assert_eq!(restored.vertex_array(), &[0, 1, 3]);
    }

    #[test]
    fn test_weighted_layout() {
        let segment = Segment::from_parts(0, vec![1], vec![EdgeEndpoint::new(0, 7)], vec![0, 1]);
        let bytes = encode(&segment);
        assert_eq!(bytes.len(), 16 + 4 + 8 + 16);
        let bounds = SegmentBounds::equal_width(2, 2).unwrap();
        let path = PathBuf::from("seg/0");
        let file = SegmentFile {
            label: "w",
            segment: 0,
            path: &path,
        };
        let restored: Segment<EdgeEndpoint> = decode(&file, &bytes, &bounds, 2).unwrap();
        assert_eq!(restored.edges()[0].weight, 7);
    }

    #[test]
    fn test_truncated_reports_sizes() {
        let bytes = encode(&sample());
        let err = decode_sample(&bytes[..bytes.len() - 4]).unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("expected 60 bytes"), "{msg}");
        assert!(msg.contains("read 56"), "{msg}");
    }

    #[test]
    fn test_short_header() {
        assert!(matches!(decode_sample(&[0; 7]), Err(CsrError::SegmentLoad { .. })));
    }

    #[test]
    fn test_trailing_bytes_rejected() {
        let mut bytes = encode(&sample());
        bytes.push(0);
        assert!(decode_sample(&bytes).is_err());
    }

    #[test]
    fn test_negative_count_rejected() {
        let mut bytes = encode(&sample());
        bytes[..8].copy_from_slice(&(-1_i64).to_ne_bytes());
        let msg = decode_sample(&bytes).unwrap_err().to_string();
        assert!(msg.contains("negative"), "{msg}");
    }

    #[test]
    fn test_source_outside_range_rejected() {
        // Source 0 belongs to segment 0, not 1
        let stray = Segment::from_parts(1, vec![3], vec![0], vec![0, 1]);
        let msg = decode_sample(&encode(&stray)).unwrap_err().to_string();
        assert!(msg.contains("outside segment range"), "{msg}");
    }

    #[test]
    fn test_unsorted_graph_ids_rejected() {
        let unsorted = Segment::from_parts(1, vec![3, 0], vec![2, 3], vec![0, 1, 2]);
        assert!(decode_sample(&encode(&unsorted)).is_err());
    }

    #[tokio::test]
    async fn test_extra_file_check() {
        let dir = tempfile::tempdir().unwrap();
        reject_extra_file("pull", dir.path(), 2).await.unwrap();

        std::fs::write(dir.path().join("2"), [0_u8]).unwrap();
        assert!(matches!(
            reject_extra_file("pull", dir.path(), 2).await,
            Err(CsrError::SegmentLoad { segment: 2, .. })
        ));
    }

    #[tokio::test]
    async fn test_extra_file_lookup_error_surfaces() {
        // a path component longer than any file name makes the lookup itself fail
        let dir = PathBuf::from("x".repeat(300));
        assert!(matches!(
            reject_extra_file("pull", &dir, 2).await,
            Err(CsrError::Io { .. })
        ));
    }

    #[test]
    fn test_bad_vertex_array_rejected() {
        let bad = Segment::from_parts(1, vec![0, 3], vec![2, 2, 3], vec![0, 2, 1]);
        assert!(decode_sample(&encode(&bad)).is_err());
    }
}
