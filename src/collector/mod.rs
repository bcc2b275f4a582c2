//! 파일 수집 모듈
//!
//! 업로드 대상 파일과 폴더를 수집합니다.
//! 지원 확장자(.pdf, .docx, .txt, .md)만 받으며, 단일 파일로 지정된
//! 미지원 확장자는 파싱 전에 거부합니다. 폴더 수집은 .gitignore 패턴을 존중합니다.

use std::path::{Path, PathBuf};

use ignore::WalkBuilder;

use crate::error::{RagError, RagResult};

/// 지원하는 확장자
pub const SUPPORTED_EXTENSIONS: &[&str] = &["pdf", "docx", "txt", "md"];

// ============================================================================
// File Types
// ============================================================================

/// 지원하는 파일 타입
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FileType {
    /// PDF 파일
    Pdf,
    /// Word 문서
    Docx,
    /// 일반 텍스트
    Text,
    /// 마크다운
    Markdown,
}

impl FileType {
    /// 확장자로 파일 타입 결정
    pub fn from_extension(ext: &str) -> Option<Self> {
        let ext = ext.trim_start_matches('.').to_lowercase();
        match ext.as_str() {
            "pdf" => Some(FileType::Pdf),
            "docx" => Some(FileType::Docx),
            "txt" => Some(FileType::Text),
            "md" => Some(FileType::Markdown),
            _ => None,
        }
    }

    /// 파일 경로에서 타입 결정
    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|ext| ext.to_str())
            .and_then(Self::from_extension)
    }

    /// 파일 경로에서 타입 결정 (미지원이면 ValidationError)
    pub fn require(path: &Path) -> RagResult<Self> {
        let ext = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| format!(".{}", ext.to_lowercase()));

        match Self::from_path(path) {
            Some(file_type) => Ok(file_type),
            None => Err(RagError::validation(format!(
                "Unsupported file extension '{}' for {:?} (supported: .{})",
                ext.as_deref().unwrap_or("<none>"),
                path,
                SUPPORTED_EXTENSIONS.join(", .")
            ))),
        }
    }

    /// 표시용 짧은 라벨
    pub fn label(&self) -> &'static str {
        match self {
            FileType::Pdf => "PDF",
            FileType::Docx => "DOCX",
            FileType::Text => "TXT",
            FileType::Markdown => "MD",
        }
    }
}

// ============================================================================
// Collected File
// ============================================================================

/// 수집된 파일 정보
#[derive(Debug, Clone)]
pub struct CollectedFile {
    /// 파일 절대 경로
    pub path: PathBuf,
    /// 파일 타입
    pub file_type: FileType,
    /// 파일 크기 (바이트)
    pub size: u64,
}

impl CollectedFile {
    /// 파일에서 CollectedFile 생성 (미지원 확장자는 None)
    pub fn from_path(path: PathBuf) -> RagResult<Option<Self>> {
        let file_type = match FileType::from_path(&path) {
            Some(ft) => ft,
            None => return Ok(None),
        };

        let metadata = std::fs::metadata(&path).map_err(|e| {
            RagError::storage(format!("Failed to read metadata: {:?}", path), e)
        })?;

        if !metadata.is_file() {
            return Ok(None);
        }

        Ok(Some(Self {
            path,
            file_type,
            size: metadata.len(),
        }))
    }

    /// 파일 이름
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "unknown".to_string())
    }
}

// ============================================================================
// File Collector
// ============================================================================

/// 파일 수집기 설정
#[derive(Debug, Clone)]
pub struct CollectorConfig {
    /// .gitignore 패턴 존중 여부
    pub respect_gitignore: bool,
    /// 숨김 파일 포함 여부
    pub include_hidden: bool,
    /// 최대 파일 크기 (바이트, 0이면 제한 없음)
    pub max_file_size: u64,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            respect_gitignore: true,
            include_hidden: false,
            max_file_size: 50 * 1024 * 1024, // 50MB
        }
    }
}

/// 파일 수집기
pub struct FileCollector {
    config: CollectorConfig,
}

impl FileCollector {
    /// 새 수집기 생성
    pub fn new(config: CollectorConfig) -> Self {
        Self { config }
    }

    /// 기본 설정으로 수집기 생성
    pub fn with_defaults() -> Self {
        Self::new(CollectorConfig::default())
    }

    /// 경로 목록 수집 (파일은 그대로 검증, 폴더는 재귀)
    ///
    /// 입력 순서를 유지하며, 폴더 내부는 경로 순으로 정렬됩니다.
    pub fn collect(&self, paths: &[PathBuf]) -> RagResult<Vec<CollectedFile>> {
        let mut files = Vec::new();
        for path in paths {
            if path.is_dir() {
                files.extend(self.collect_directory(path)?);
            } else {
                files.push(self.collect_file(path)?);
            }
        }
        Ok(files)
    }

    /// 단일 파일 수집
    pub fn collect_file(&self, path: &Path) -> RagResult<CollectedFile> {
        let abs_path = absolutize(path)?;

        // 확장자 검증이 존재 여부보다 먼저
        FileType::require(&abs_path)?;

        if !abs_path.is_file() {
            return Err(RagError::validation(format!("File not found: {:?}", abs_path)));
        }

        let file = CollectedFile::from_path(abs_path.clone())?
            .ok_or_else(|| RagError::validation(format!("Not a file: {:?}", abs_path)))?;

        if !self.within_size_limit(&file) {
            return Err(RagError::validation(format!(
                "File too large: {:?} ({} bytes, max {} bytes)",
                file.path, file.size, self.config.max_file_size
            )));
        }

        Ok(file)
    }

    /// 폴더 재귀 수집
    pub fn collect_directory(&self, path: &Path) -> RagResult<Vec<CollectedFile>> {
        let abs_path = absolutize(path)?;

        if !abs_path.is_dir() {
            return Err(RagError::validation(format!("Not a directory: {:?}", abs_path)));
        }

        let mut files = Vec::new();

        let walker = WalkBuilder::new(&abs_path)
            .hidden(!self.config.include_hidden)
            .git_ignore(self.config.respect_gitignore)
            .git_global(self.config.respect_gitignore)
            .git_exclude(self.config.respect_gitignore)
            .sort_by_file_path(|a, b| a.cmp(b))
            .build();

        for entry in walker {
            let entry = match entry {
                Ok(e) => e,
                Err(e) => {
                    tracing::warn!("Failed to read entry: {}", e);
                    continue;
                }
            };

            if !entry.file_type().map(|ft| ft.is_file()).unwrap_or(false) {
                continue;
            }

            match CollectedFile::from_path(entry.path().to_path_buf()) {
                Ok(Some(file)) => {
                    if self.within_size_limit(&file) {
                        files.push(file);
                    } else {
                        tracing::debug!("Skipping large file: {:?} ({} bytes)", file.path, file.size);
                    }
                }
                Ok(None) => {
                    tracing::debug!("Skipping unsupported file: {:?}", entry.path());
                }
                Err(e) => {
                    tracing::warn!("Failed to collect file: {}", e);
                }
            }
        }

        tracing::info!("Collected {} files from {:?}", files.len(), abs_path);
        Ok(files)
    }

    fn within_size_limit(&self, file: &CollectedFile) -> bool {
        self.config.max_file_size == 0 || file.size <= self.config.max_file_size
    }
}

fn absolutize(path: &Path) -> RagResult<PathBuf> {
    if path.is_absolute() {
        return Ok(path.to_path_buf());
    }
    std::env::current_dir()
        .map(|cwd| cwd.join(path))
        .map_err(|e| RagError::storage("Failed to resolve current directory", e))
}

// ============================================================================
// Statistics
// ============================================================================

/// 수집 통계
#[derive(Debug, Default)]
pub struct CollectionStats {
    pub total_files: usize,
    pub pdf_files: usize,
    pub docx_files: usize,
    pub text_files: usize,
    pub total_size: u64,
}

impl CollectionStats {
    /// 수집된 파일 목록에서 통계 계산
    pub fn from_files(files: &[CollectedFile]) -> Self {
        let mut stats = Self::default();

        for file in files {
            stats.total_files += 1;
            stats.total_size += file.size;

            match file.file_type {
                FileType::Pdf => stats.pdf_files += 1,
                FileType::Docx => stats.docx_files += 1,
                FileType::Text | FileType::Markdown => stats.text_files += 1,
            }
        }

        stats
    }
}

// ============================================================================
// Tests
// ============================================================================
