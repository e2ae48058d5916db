//! Pull BFS over a segmented graph loaded from Parquet
//!
//! Reads `{graph}_edges.parquet`, cuts the in-edges into segments (reusing segment
//! files under `segments_dir` when present), and prints the BFS parent of every
//! vertex.
//!
//! Run with: `cargo run --example pull_bfs -- <graph> <source> [num_segments] [segments_dir]`
//!
//! Set `RUST_LOG=csr_segments=debug` to see the pass-level logs.

use anyhow::{bail, Context, Result};
use csr_segments::{pull_bfs_parents, Builder, EdgeListFile, SegmentConfig, SegmentSource, VertexId};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let mut args = std::env::args().skip(1);
    let (Some(graph), Some(source)) = (args.next(), args.next()) else {
        bail!("usage: pull_bfs <graph> <source> [num_segments] [segments_dir]");
    };
    let source: VertexId = source
        .parse()
        .with_context(|| format!("invalid source vertex '{source}'"))?;
    let num_segments: usize = match args.next() {
        Some(n) => n.parse().with_context(|| format!("invalid segment count '{n}'"))?,
        None => 4,
    };
    let segments_dir = args.next().map(PathBuf::from);

    let file = EdgeListFile::<VertexId>::read_parquet(&graph)
        .await
        .with_context(|| format!("Failed to read {graph}"))?;
    let mut store = file
        .build(Builder::new().squish(true))
        .context("Failed to build CSR store")?;
    println!("{store}");

    let mut config = SegmentConfig::new(num_segments).with_numa_aware(true);
    if let Some(dir) = segments_dir {
        config = config.with_source(SegmentSource::LoadOrBuild(dir));
    }
    store
        .build_segments("pull", &config)
        .await
        .context("Failed to build segments")?;

    let parent = pull_bfs_parents(&store, "pull", source)?;
    let reached = parent.iter().filter(|&&p| p >= 0).count();
    println!("BFS from {source} reached {reached} of {} vertices", store.num_vertices());
    for (v, p) in parent.iter().enumerate() {
        println!("{v} {p}");
    }
    Ok(())
}
