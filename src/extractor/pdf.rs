//! PDF 텍스트 추출 모듈
//!
//! pdf-extract 크레이트를 사용하여 PDF에서 텍스트를 추출합니다.

use std::path::Path;
use std::sync::OnceLock;

use anyhow::{Context, Result};
use regex::Regex;

/// PDF에서 텍스트 추출
///
/// 페이지별로 텍스트를 추출하여 (페이지 번호, 텍스트) 튜플 벡터로 반환합니다.
/// 페이지 번호는 1부터 시작합니다.
pub fn extract_text_from_pdf(path: &Path) -> Result<Vec<(usize, String)>> {
    let bytes = std::fs::read(path).with_context(|| format!("Failed to read PDF: {:?}", path))?;

    let text = pdf_extract::extract_text_from_mem(&bytes)
        .with_context(|| format!("Failed to extract text from PDF: {:?}", path))?;

    // 스캔 문서일 수 있음 - 빈 페이지로 반환하고 인덱싱 단계에서 걸러냄
    if text.trim().is_empty() {
        tracing::warn!(
            "No text extracted from PDF: {:?}. It might be a scanned document.",
            path
        );
        return Ok(vec![(1, String::new())]);
    }

    Ok(split_pdf_pages(&text)
        .into_iter()
        .enumerate()
        .map(|(i, text)| (i + 1, text))
        .collect())
}

fn page_marker() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    // 예: "--- Page 1 ---"
    RE.get_or_init(|| {
        Regex::new(r"(?m)^[\s]*[-=]+[\s]*(?:Page[\s]*)?(\d+)[\s]*[-=]+[\s]*$")
            .expect("page marker regex")
    })
}

/// PDF 텍스트를 페이지별로 분리
fn split_pdf_pages(text: &str) -> Vec<String> {
    // 폼피드 문자 (\x0c)로 페이지 분리 시도
    let pages: Vec<String> = text
        .split('\x0c')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect();

    if pages.len() > 1 {
        return pages;
    }

    let marker = page_marker();
    if marker.is_match(text) {
        let pages: Vec<String> = marker
            .split(text)
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        if pages.len() > 1 {
            return pages;
        }
    }

    // 분리 실패 - 전체를 하나의 페이지로
    vec![text.trim().to_string()]
}

// ============================================================================
// Tests
// ============================================================================
