//! LanceDB Vector Store - 세션 인덱스 저장소
//!
//! 세션 인덱스 디렉토리 하나가 LanceDB 데이터베이스 하나이며,
//! 청크와 임베딩은 `chunks` 테이블에 저장됩니다.
//! ref: https://lancedb.github.io/lancedb/

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use arrow_array::{
    Array, FixedSizeListArray, Float32Array, Int32Array, Int64Array, RecordBatch,
    RecordBatchIterator, StringArray,
};
use arrow_schema::{DataType, Field, Schema};
use async_trait::async_trait;
use futures::TryStreamExt;
use lancedb::connection::Connection;
use lancedb::query::{ExecutableQuery, QueryBase};
use lancedb::DistanceType;

use super::chunker::Chunk;
use super::vector::{sort_by_similarity, SearchResult, VectorEntry, VectorStore};

/// 청크 테이블 이름
pub const TABLE_NAME: &str = "chunks";

// ============================================================================
// LanceVectorStore
// ============================================================================

/// LanceDB 벡터 저장소 구현
///
/// 코사인 거리로 검색하며 `similarity = 1 - distance`로 변환합니다.
pub struct LanceVectorStore {
    db: Connection,
    dimension: usize,
}

impl LanceVectorStore {
    /// 쓰기용으로 열기 (테이블은 첫 삽입 때 생성)
    ///
    /// # Arguments
    /// * `path` - 인덱스 디렉토리 경로
    /// * `dimension` - 임베딩 차원
    pub async fn open(path: &Path, dimension: usize) -> Result<Self> {
        if dimension == 0 {
            anyhow::bail!("Embedding dimension must be greater than 0");
        }

        tokio::fs::create_dir_all(path)
            .await
            .context("Failed to create LanceDB directory")?;

        let db = connect(path).await?;
        Ok(Self { db, dimension })
    }

    /// 기존 인덱스 열기 (테이블이 없으면 None)
    pub async fn open_existing(path: &Path) -> Result<Option<Self>> {
        if !path.is_dir() {
            return Ok(None);
        }

        let db = connect(path).await?;
        let names = db
            .table_names()
            .execute()
            .await
            .context("Failed to list LanceDB tables")?;

        if !names.iter().any(|n| n == TABLE_NAME) {
            return Ok(None);
        }

        let table = db
            .open_table(TABLE_NAME)
            .execute()
            .await
            .context("Failed to open chunk table")?;
        let schema = table.schema().await.context("Failed to read table schema")?;

        let dimension = match schema.field_with_name("embedding").map(|f| f.data_type().clone()) {
            Ok(DataType::FixedSizeList(_, size)) if size > 0 => size as usize,
            _ => anyhow::bail!("Chunk table has no fixed-size embedding column"),
        };

        Ok(Some(Self { db, dimension }))
    }

    /// 임베딩 차원
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// 청크 테이블 스키마 생성
    fn create_schema(dimension: usize) -> Schema {
        Schema::new(vec![
            Field::new("source", DataType::Utf8, false),
            Field::new("page", DataType::Int32, true),
            Field::new("chunk_index", DataType::Int32, false),
            Field::new("block_index", DataType::Int32, false),
            Field::new("start_offset", DataType::Int64, false),
            Field::new("end_offset", DataType::Int64, false),
            Field::new("text", DataType::Utf8, false),
            Field::new(
                "embedding",
                DataType::FixedSizeList(
                    Arc::new(Field::new("item", DataType::Float32, true)),
                    dimension as i32,
                ),
                false,
            ),
        ])
    }

    /// 엔트리들을 Arrow RecordBatch로 변환
    fn entries_to_batch(&self, entries: &[VectorEntry]) -> Result<RecordBatch> {
        if entries.is_empty() {
            anyhow::bail!("Cannot create batch from empty entries");
        }

        if let Some(bad) = entries.iter().find(|e| e.embedding.len() != self.dimension) {
            anyhow::bail!(
                "Embedding dimension mismatch for {}#{}: expected {}, got {}",
                bad.chunk.source,
                bad.chunk.chunk_index,
                self.dimension,
                bad.embedding.len()
            );
        }

        let sources: Vec<&str> = entries.iter().map(|e| e.chunk.source.as_str()).collect();
        let pages: Vec<Option<i32>> = entries
            .iter()
            .map(|e| e.chunk.page.map(|p| p as i32))
            .collect();
        let chunk_indices: Vec<i32> = entries.iter().map(|e| e.chunk.chunk_index as i32).collect();
        let block_indices: Vec<i32> = entries.iter().map(|e| e.chunk.block_index as i32).collect();
        let starts: Vec<i64> = entries.iter().map(|e| e.chunk.start as i64).collect();
        let ends: Vec<i64> = entries.iter().map(|e| e.chunk.end as i64).collect();
        let texts: Vec<&str> = entries.iter().map(|e| e.chunk.text.as_str()).collect();

        // 임베딩을 FixedSizeList로 변환
        let embeddings_flat: Vec<f32> = entries
            .iter()
            .flat_map(|e| e.embedding.iter().copied())
            .collect();

        let values = Float32Array::from(embeddings_flat);
        let field = Arc::new(Field::new("item", DataType::Float32, true));
        let embeddings_list = FixedSizeListArray::try_new(
            field,
            self.dimension as i32,
            Arc::new(values) as Arc<dyn Array>,
            None,
        )
        .context("Failed to create embedding array")?;

        let batch = RecordBatch::try_new(
            Arc::new(Self::create_schema(self.dimension)),
            vec![
                Arc::new(StringArray::from(sources)),
                Arc::new(Int32Array::from(pages)),
                Arc::new(Int32Array::from(chunk_indices)),
                Arc::new(Int32Array::from(block_indices)),
                Arc::new(Int64Array::from(starts)),
                Arc::new(Int64Array::from(ends)),
                Arc::new(StringArray::from(texts)),
                Arc::new(embeddings_list),
            ],
        )
        .context("Failed to create RecordBatch")?;

        Ok(batch)
    }

    /// 테이블 존재 여부 확인
    async fn table_exists(&self) -> bool {
        self.db
            .table_names()
            .execute()
            .await
            .map(|names| names.iter().any(|n| n == TABLE_NAME))
            .unwrap_or(false)
    }

    async fn open_table(&self) -> Result<lancedb::table::Table> {
        self.db
            .open_table(TABLE_NAME)
            .execute()
            .await
            .context("Failed to open chunk table")
    }

    /// RecordBatch 행을 검색 결과로 변환
    fn batch_to_results(batch: &RecordBatch, out: &mut Vec<SearchResult>) -> Result<()> {
        let sources = string_column(batch, "source")?;
        let pages = int32_column(batch, "page")?;
        let chunk_indices = int32_column(batch, "chunk_index")?;
        let block_indices = int32_column(batch, "block_index")?;
        let starts = int64_column(batch, "start_offset")?;
        let ends = int64_column(batch, "end_offset")?;
        let texts = string_column(batch, "text")?;

        // _distance 컬럼 (LanceDB가 자동 추가)
        let distances = batch
            .column_by_name("_distance")
            .and_then(|c| c.as_any().downcast_ref::<Float32Array>())
            .ok_or_else(|| anyhow::anyhow!("Missing _distance column"))?;

        for i in 0..batch.num_rows() {
            let page = if pages.is_null(i) {
                None
            } else {
                Some(pages.value(i) as usize)
            };

            out.push(SearchResult {
                chunk: Chunk {
                    text: texts.value(i).to_string(),
                    source: sources.value(i).to_string(),
                    page,
                    chunk_index: chunk_indices.value(i) as usize,
                    block_index: block_indices.value(i) as usize,
                    start: starts.value(i) as usize,
                    end: ends.value(i) as usize,
                },
                // 코사인 거리 -> 유사도
                similarity: 1.0 - distances.value(i),
            });
        }

        Ok(())
    }
}

async fn connect(path: &Path) -> Result<Connection> {
    let path_str = path
        .to_str()
        .ok_or_else(|| anyhow::anyhow!("Invalid path encoding"))?;

    lancedb::connect(path_str)
        .execute()
        .await
        .context("Failed to connect to LanceDB")
}

fn string_column<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a StringArray> {
    batch
        .column_by_name(name)
        .and_then(|c| c.as_any().downcast_ref::<StringArray>())
        .ok_or_else(|| anyhow::anyhow!("Missing {} column", name))
}

fn int32_column<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a Int32Array> {
    batch
        .column_by_name(name)
        .and_then(|c| c.as_any().downcast_ref::<Int32Array>())
        .ok_or_else(|| anyhow::anyhow!("Missing {} column", name))
}

fn int64_column<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a Int64Array> {
    batch
        .column_by_name(name)
        .and_then(|c| c.as_any().downcast_ref::<Int64Array>())
        .ok_or_else(|| anyhow::anyhow!("Missing {} column", name))
}

#[async_trait]
impl VectorStore for LanceVectorStore {
    async fn insert_batch(&self, entries: &[VectorEntry]) -> Result<usize> {
        if entries.is_empty() {
            return Ok(0);
        }

        let batch = self.entries_to_batch(entries)?;
        let schema = batch.schema();
        let batches = RecordBatchIterator::new(vec![Ok(batch)], schema);

        if self.table_exists().await {
            self.open_table()
                .await?
                .add(batches)
                .execute()
                .await
                .context("Failed to add vectors to table")?;
        } else {
            self.db
                .create_table(TABLE_NAME, batches)
                .execute()
                .await
                .context("Failed to create table")?;
        }

        Ok(entries.len())
    }

    async fn search(&self, query_embedding: &[f32], limit: usize) -> Result<Vec<SearchResult>> {
        if limit == 0 || !self.table_exists().await {
            return Ok(vec![]);
        }

        if query_embedding.len() != self.dimension {
            anyhow::bail!(
                "Query dimension mismatch: expected {}, got {}",
                self.dimension,
                query_embedding.len()
            );
        }

        let table = self.open_table().await?;

        let stream = table
            .vector_search(query_embedding.to_vec())
            .context("Failed to create vector search")?
            .distance_type(DistanceType::Cosine)
            .limit(limit)
            .execute()
            .await
            .context("Failed to execute vector search")?;

        let batches: Vec<RecordBatch> = stream.try_collect().await?;

        let mut results = Vec::new();
        for batch in &batches {
            Self::batch_to_results(batch, &mut results)?;
        }

        sort_by_similarity(&mut results);
        results.truncate(limit);

        Ok(results)
    }

    async fn count(&self) -> Result<usize> {
        if !self.table_exists().await {
            return Ok(0);
        }

        let count = self
            .open_table()
            .await?
            .count_rows(None)
            .await
            .context("Failed to count rows")?;
        Ok(count)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const DIM: usize = 4;

    fn entry(index: usize, embedding: Vec<f32>) -> VectorEntry {
        VectorEntry {
            chunk: Chunk {
                text: format!("chunk {}", index),
                source: "doc.pdf".to_string(),
                page: if index % 2 == 0 { Some(index + 1) } else { None },
                chunk_index: index,
                block_index: 0,
                start: index * 10,
                end: index * 10 + 7,
            },
            embedding,
        }
    }

    #[tokio::test]
    async fn test_lance_store_basic() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("index");

        let store = LanceVectorStore::open(&path, DIM).await.unwrap();
        assert_eq!(store.count().await.unwrap(), 0);

        let entries = vec![
            entry(0, vec![1.0, 0.0, 0.0, 0.0]),
            entry(1, vec![0.0, 1.0, 0.0, 0.0]),
        ];
        assert_eq!(store.insert_batch(&entries).await.unwrap(), 2);
        assert_eq!(store.count().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_lance_search_ranked() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("index");

        let store = LanceVectorStore::open(&path, DIM).await.unwrap();
        store
            .insert_batch(&[
                entry(0, vec![1.0, 0.0, 0.0, 0.0]),
                entry(1, vec![0.7, 0.7, 0.0, 0.0]),
                entry(2, vec![0.0, 0.0, 1.0, 0.0]),
            ])
            .await
            .unwrap();

        let results = store.search(&[1.0, 0.1, 0.0, 0.0], 2).await.unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].chunk.chunk_index, 0);
        assert_eq!(results[1].chunk.chunk_index, 1);
        assert!(results[0].similarity >= results[1].similarity);

        // 출처 정보 보존
        assert_eq!(results[0].chunk.page, Some(1));
        assert_eq!(results[1].chunk.page, None);
        assert_eq!(results[1].chunk.start, 10);
    }

    #[tokio::test]
    async fn test_open_existing() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("index");

        assert!(LanceVectorStore::open_existing(&path).await.unwrap().is_none());

        let store = LanceVectorStore::open(&path, DIM).await.unwrap();
        assert!(LanceVectorStore::open_existing(&path).await.unwrap().is_none());

        store
            .insert_batch(&[entry(0, vec![0.0, 0.0, 0.0, 1.0])])
            .await
            .unwrap();

        let reopened = LanceVectorStore::open_existing(&path).await.unwrap().unwrap();
        assert_eq!(reopened.dimension(), DIM);
        assert_eq!(reopened.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_dimension_mismatch_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let store = LanceVectorStore::open(&temp_dir.path().join("index"), DIM)
            .await
            .unwrap();

        let result = store.insert_batch(&[entry(0, vec![1.0, 0.0])]).await;
        assert!(result.is_err());
    }
}
