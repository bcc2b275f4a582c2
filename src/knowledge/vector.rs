//! Vector Store - 벡터 검색 트레이트 및 유틸리티
//!
//! 세션 인덱스는 한 번 빌드된 뒤 읽기 전용으로 재사용되므로
//! 삽입/검색/개수 조회만 노출합니다.

use anyhow::Result;
use async_trait::async_trait;

use super::chunker::Chunk;

// ============================================================================
// Types
// ============================================================================

/// 벡터 엔트리 (저장용)
#[derive(Debug, Clone)]
pub struct VectorEntry {
    /// 원본 청크
    pub chunk: Chunk,
    /// 임베딩 벡터
    pub embedding: Vec<f32>,
}

/// 검색 결과
#[derive(Debug, Clone, PartialEq)]
pub struct SearchResult {
    /// 매칭된 청크
    pub chunk: Chunk,
    /// 유사도 스코어 (높을수록 유사)
    pub similarity: f32,
}

// ============================================================================
// VectorStore Trait
// ============================================================================

/// VectorStore 트레이트 (async)
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// 벡터 배치 삽입
    async fn insert_batch(&self, entries: &[VectorEntry]) -> Result<usize>;

    /// 벡터 검색 (유사도 내림차순)
    async fn search(&self, query_embedding: &[f32], limit: usize) -> Result<Vec<SearchResult>>;

    /// 벡터 개수 조회
    async fn count(&self) -> Result<usize>;
}

// ============================================================================
// Utility Functions
// ============================================================================

/// 코사인 유사도 계산
///
/// 결과는 -1.0 ~ 1.0 범위입니다. 길이가 다르거나 영벡터이면 0.0.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot_product / (norm_a * norm_b)
}

/// 영벡터 여부
pub fn is_zero_vector(v: &[f32]) -> bool {
    v.iter().all(|x| *x == 0.0)
}

/// 유사도 내림차순 정렬 (동점은 입력 순서 유지, NaN은 맨 뒤)
pub fn sort_by_similarity(results: &mut [SearchResult]) {
    fn rank(similarity: f32) -> f32 {
        if similarity.is_nan() {
            f32::NEG_INFINITY
        } else {
            similarity
        }
    }

    results.sort_by(|a, b| rank(b.similarity).total_cmp(&rank(a.similarity)));
}

// ============================================================================
// Tests
// ============================================================================
