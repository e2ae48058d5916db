//! Parquet I/O for edge lists
//!
//! Based on `DuckDB` (Raasveldt et al., SIGMOD 2019) columnar storage patterns.
//!
//! # Format
//!
//! A graph is stored as `{path}_edges.parquet` with Int32 columns
//! `(source, target, weight)` and schema metadata `num_vertices` and `directed`.
//! Undirected graphs store each edge once, from its lower endpoint.

use super::builder::Builder;
use super::csr::{CsrStore, Inversion, WithInverse};
use super::endpoint::{EdgeTarget, VertexId, Weight};
use crate::error::{CsrError, Result};
use arrow::array::Int32Array;
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use parquet::arrow::arrow_writer::ArrowWriter;
use parquet::file::properties::WriterProperties;
use std::collections::HashMap;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

const NUM_VERTICES_KEY: &str = "num_vertices";
const DIRECTED_KEY: &str = "directed";

fn edges_path(base_path: &Path) -> PathBuf {
    PathBuf::from(format!("{}_edges.parquet", base_path.display()))
}

fn io_error(path: &Path) -> impl FnOnce(std::io::Error) -> CsrError + '_ {
    move |source| CsrError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// Edge list read back from Parquet, ready for the [`Builder`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EdgeListFile<D> {
    /// Vertex count recorded by the writer (inferred when absent)
    pub num_vertices: i64,
    /// Whether the edges are directed
    pub directed: bool,
    /// `(source, endpoint)` pairs
    pub edges: Vec<(VertexId, D)>,
}

impl<D: EdgeTarget> EdgeListFile<D> {
    /// Read `{path}_edges.parquet`
    ///
    /// # Errors
    ///
    /// Returns error if the file doesn't exist or a column has the wrong type
    #[allow(clippy::unused_async)] // Async API, like the segment file I/O
    pub async fn read_parquet<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = edges_path(path.as_ref());
        let file = File::open(&path).map_err(io_error(&path))?;
        let builder = ParquetRecordBatchReaderBuilder::try_new(file)?;

        let metadata: HashMap<String, String> = builder.schema().metadata().clone();
        let directed = metadata.get(DIRECTED_KEY).map_or(true, |v| v == "true");
        let recorded = metadata
            .get(NUM_VERTICES_KEY)
            .and_then(|v| v.parse::<i64>().ok());

        let reader = builder.build()?;
        let mut edges = Vec::new();
        for batch_result in reader {
            let batch: RecordBatch = batch_result?;
            let sources = int_column(&batch, 0, "source")?;
            let targets = int_column(&batch, 1, "target")?;
            let weights = int_column(&batch, 2, "weight")?;

            for i in 0..batch.num_rows() {
                edges.push((
                    sources.value(i),
                    D::from_parts(targets.value(i), weights.value(i)),
                ));
            }
        }

        let inferred = edges
            .iter()
            .map(|&(u, e)| i64::from(u.max(e.vertex())) + 1)
            .max()
            .unwrap_or(0);
        let num_vertices = recorded.unwrap_or(inferred);
        debug!(path = %path.display(), num_vertices, edges = edges.len(), directed, "read edge list");

        Ok(Self {
            num_vertices,
            directed,
            edges,
        })
    }

    /// Build a store with the recorded vertex count and directedness
    ///
    /// # Errors
    ///
    /// Returns [`CsrError::InvalidTopology`] if the edges do not fit the recorded
    /// vertex count
    pub fn build(&self, builder: Builder) -> Result<CsrStore<D, WithInverse>> {
        let builder = builder.num_vertices(self.num_vertices);
        if self.directed {
            builder.build_directed(&self.edges)
        } else {
            builder.build_undirected(&self.edges)
        }
    }
}

fn int_column<'a>(batch: &'a RecordBatch, index: usize, name: &str) -> Result<&'a Int32Array> {
    batch
        .column(index)
        .as_any()
        .downcast_ref::<Int32Array>()
        .ok_or_else(|| {
            CsrError::Arrow(arrow::error::ArrowError::SchemaError(format!(
                "Invalid {name} column type"
            )))
        })
}

impl<D: EdgeTarget, I: Inversion> CsrStore<D, I> {
    /// Write the forward edges to `{path}_edges.parquet`
    ///
    /// # Errors
    ///
    /// Returns error if file I/O fails or Arrow conversion fails
    #[allow(clippy::unused_async)] // Async API, like the segment file I/O
    pub async fn write_parquet<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = edges_path(path.as_ref());

        let mut sources: Vec<VertexId> = Vec::new();
        let mut targets: Vec<VertexId> = Vec::new();
        let mut weights: Vec<Weight> = Vec::new();
        for u in self.vertices() {
            for e in self.out_neighbors(u) {
                // undirected edges are stored in both lists; keep one copy
                if !self.directed() && e.vertex() < u {
                    continue;
                }
                sources.push(u);
                targets.push(e.vertex());
                weights.push(e.weight());
            }
        }

        let metadata = HashMap::from([
            (NUM_VERTICES_KEY.to_string(), self.num_vertices().to_string()),
            (DIRECTED_KEY.to_string(), self.directed().to_string()),
        ]);
        let schema = Arc::new(
            Schema::new(vec![
                Field::new("source", DataType::Int32, false),
                Field::new("target", DataType::Int32, false),
                Field::new("weight", DataType::Int32, false),
            ])
            .with_metadata(metadata),
        );

        let edge_count = sources.len();
        let batch = RecordBatch::try_new(
            schema.clone(),
            vec![
                Arc::new(Int32Array::from(sources)),
                Arc::new(Int32Array::from(targets)),
                Arc::new(Int32Array::from(weights)),
            ],
        )?;

        let file = File::create(&path).map_err(io_error(&path))?;
        let props = WriterProperties::builder()
            .set_compression(parquet::basic::Compression::ZSTD(
                parquet::basic::ZstdLevel::try_new(3)?,
            ))
            .build();

        let mut writer = ArrowWriter::try_new(file, schema, Some(props))?;
        writer.write(&batch)?;
        writer.close()?;

        debug!(path = %path.display(), edges = edge_count, "wrote edge list");
        Ok(())
    }
}
