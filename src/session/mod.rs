//! Session Store - 세션 디렉토리 + SQLite 레지스트리
//!
//! 세션 ID 하나가 업로드 디렉토리와 인덱스 디렉토리를 결정합니다.
//! - `<upload_base>/<session_id>/`: 업로드 원본
//! - `<index_base>/<session_id>/`: 벡터 인덱스
//!
//! 세션 메타데이터(생성 시각, 인덱스 통계)는 `sessions.db`에 기록되며
//! 이 저장소가 유일한 writer입니다. 세션은 자동 삭제되지 않습니다.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OpenFlags, OptionalExtension};
use serde::Serialize;

use crate::collector::FileType;
use crate::config::StorageConfig;
use crate::error::{RagError, RagResult};

/// 세션 ID 최대 길이
pub const MAX_SESSION_ID_LEN: usize = 128;

// ============================================================================
// Types
// ============================================================================

/// 세션
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Session {
    pub id: String,
    pub upload_dir: PathBuf,
    pub index_dir: PathBuf,
    pub created_at: DateTime<Utc>,
}

impl Session {
    /// (업로드 디렉토리, 인덱스 디렉토리)
    pub fn paths(&self) -> (&Path, &Path) {
        (&self.upload_dir, &self.index_dir)
    }
}

/// 레지스트리에 기록된 세션 정보
#[derive(Debug, Clone, Serialize)]
pub struct SessionRecord {
    pub session: Session,
    pub document_count: usize,
    pub chunk_count: usize,
    pub indexed_at: Option<DateTime<Utc>>,
}

impl SessionRecord {
    pub fn is_indexed(&self) -> bool {
        self.indexed_at.is_some()
    }
}

/// 레지스트리 통계
#[derive(Debug, Clone, Serialize)]
pub struct RegistryStats {
    pub session_count: usize,
    pub indexed_count: usize,
    pub total_documents: usize,
    pub total_chunks: usize,
    pub db_path: PathBuf,
}

// ============================================================================
// Session ID
// ============================================================================

/// 새 세션 ID 생성: `session_<UTC 초 단위 시각>_<랜덤 8자리>`
pub fn generate_session_id() -> String {
    let suffix = uuid::Uuid::new_v4().simple().to_string();
    format!(
        "session_{}_{}",
        Utc::now().format("%Y%m%d_%H%M%S"),
        &suffix[..8]
    )
}

/// 명시적 세션 ID 검증 (단일 경로 컴포넌트)
pub fn validate_session_id(id: &str) -> RagResult<()> {
    if id.is_empty() {
        return Err(RagError::validation("Session id must not be empty"));
    }
    if id.len() > MAX_SESSION_ID_LEN {
        return Err(RagError::validation(format!(
            "Session id is longer than {} characters",
            MAX_SESSION_ID_LEN
        )));
    }
    if let Some(c) = id
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || *c == '_' || *c == '-'))
    {
        return Err(RagError::validation(format!(
            "Session id '{}' contains invalid character '{}'",
            id, c
        )));
    }
    Ok(())
}

// ============================================================================
// SessionStore
// ============================================================================

/// 세션 저장소
pub struct SessionStore {
    conn: Arc<Mutex<Connection>>,
    storage: StorageConfig,
}

impl SessionStore {
    /// 저장소 열기 (레지스트리 DB가 없으면 생성)
    pub fn open(storage: &StorageConfig) -> RagResult<Self> {
        let db_path = &storage.registry_path;
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| RagError::storage("Failed to create registry directory", e))?;
        }

        let conn = Connection::open_with_flags(
            db_path,
            OpenFlags::SQLITE_OPEN_READ_WRITE
                | OpenFlags::SQLITE_OPEN_CREATE
                | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .map_err(|e| RagError::storage("Failed to open session registry", e))?;

        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
            storage: storage.clone(),
        };

        store.initialize()?;
        Ok(store)
    }

    /// 레지스트리 DB 경로
    pub fn db_path(&self) -> &Path {
        &self.storage.registry_path
    }

    /// 경로 설정
    pub fn storage(&self) -> &StorageConfig {
        &self.storage
    }

    fn lock(&self) -> RagResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| RagError::storage("Registry lock poisoned", anyhow::anyhow!("{}", e)))
    }

    /// 스키마 초기화
    fn initialize(&self) -> RagResult<()> {
        let conn = self.lock()?;

        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS sessions (
                id TEXT PRIMARY KEY,
                created_at TEXT NOT NULL,
                upload_dir TEXT NOT NULL,
                index_dir TEXT NOT NULL,
                document_count INTEGER NOT NULL DEFAULT 0,
                chunk_count INTEGER NOT NULL DEFAULT 0,
                indexed_at TEXT
            );
            CREATE INDEX IF NOT EXISTS idx_sessions_created_at ON sessions(created_at);",
        )
        .map_err(|e| RagError::storage("Failed to create sessions table", e))?;

        tracing::debug!("Session registry initialized at {:?}", self.storage.registry_path);
        Ok(())
    }

    /// 세션 ID → (업로드 디렉토리, 인덱스 디렉토리)
    pub fn paths(&self, session_id: &str) -> RagResult<(PathBuf, PathBuf)> {
        validate_session_id(session_id)?;
        Ok((
            self.storage.upload_base.join(session_id),
            self.storage.index_base.join(session_id),
        ))
    }

    /// 세션 생성
    ///
    /// ID를 주지 않으면 새로 생성합니다. 두 디렉토리가 모두 만들어지고
    /// 레지스트리에 기록된 뒤에만 반환하며, 실패 시 이번 호출이 만든
    /// 디렉토리는 정리합니다.
    pub fn create_session(&self, explicit_id: Option<&str>) -> RagResult<Session> {
        let id = match explicit_id {
            Some(id) => {
                validate_session_id(id)?;
                id.to_string()
            }
            None => generate_session_id(),
        };

        let (upload_dir, index_dir) = self.paths(&id)?;
        let mut created: Vec<&Path> = Vec::new();

        for dir in [upload_dir.as_path(), index_dir.as_path()] {
            let existed = dir.is_dir();
            if let Err(e) = std::fs::create_dir_all(dir) {
                cleanup_dirs(&created);
                return Err(RagError::storage(
                    format!("Failed to create session directory {:?}", dir),
                    e,
                ));
            }
            if !existed {
                created.push(dir);
            }
        }

        let now = Utc::now();
        let inserted = self.lock().and_then(|conn| {
            conn.execute(
                "INSERT OR IGNORE INTO sessions (id, created_at, upload_dir, index_dir)
                 VALUES (?1, ?2, ?3, ?4)",
                params![
                    id,
                    now.to_rfc3339(),
                    upload_dir.to_string_lossy(),
                    index_dir.to_string_lossy()
                ],
            )
            .map_err(|e| RagError::storage("Failed to register session", e))
        });

        if let Err(e) = inserted {
            cleanup_dirs(&created);
            return Err(e);
        }

        let session = match self.get_session(&id) {
            Ok(Some(record)) => record.session,
            Ok(None) => {
                cleanup_dirs(&created);
                return Err(RagError::storage(
                    "Session vanished after registration",
                    anyhow::anyhow!("no registry row for {}", id),
                ));
            }
            Err(e) => {
                cleanup_dirs(&created);
                return Err(e);
            }
        };

        tracing::info!("Session created: {}", session.id);
        Ok(session)
    }

    /// 기존 세션 열기
    ///
    /// 레지스트리에 없더라도 디렉토리가 모두 있으면 등록 후 반환합니다.
    pub fn open_session(&self, session_id: &str) -> RagResult<Session> {
        let (upload_dir, index_dir) = self.paths(session_id)?;

        if let Some(record) = self.get_session(session_id)? {
            if !record.session.upload_dir.is_dir() || !record.session.index_dir.is_dir() {
                return Err(RagError::storage(
                    format!("Session directories missing for {}", session_id),
                    anyhow::anyhow!(
                        "expected {:?} and {:?}",
                        record.session.upload_dir,
                        record.session.index_dir
                    ),
                ));
            }
            return Ok(record.session);
        }

        if upload_dir.is_dir() && index_dir.is_dir() {
            tracing::debug!("Registering unregistered session directories: {}", session_id);
            return self.create_session(Some(session_id));
        }

        Err(RagError::storage(
            format!("Unknown session: {}", session_id),
            anyhow::anyhow!("no registry entry and no directories under {:?}", upload_dir),
        ))
    }

    /// 업로드 파일을 세션 업로드 디렉토리로 복사
    ///
    /// 지원하지 않는 확장자는 복사 전에 ValidationError.
    pub fn save_upload(&self, session: &Session, source: &Path) -> RagResult<PathBuf> {
        FileType::require(source)?;

        let file_name = source
            .file_name()
            .ok_or_else(|| RagError::validation(format!("Not a file path: {:?}", source)))?;
        let dest = session.upload_dir.join(file_name);

        std::fs::copy(source, &dest).map_err(|e| {
            RagError::storage(format!("Failed to copy {:?} into session", source), e)
        })?;

        tracing::debug!("Saved upload {:?} -> {:?}", source, dest);
        Ok(dest)
    }

    /// 인덱스 빌드 결과 기록
    pub fn record_index(
        &self,
        session_id: &str,
        document_count: usize,
        chunk_count: usize,
    ) -> RagResult<()> {
        let conn = self.lock()?;
        let rows = conn
            .execute(
                "UPDATE sessions SET document_count = ?2, chunk_count = ?3, indexed_at = ?4
                 WHERE id = ?1",
                params![
                    session_id,
                    document_count as i64,
                    chunk_count as i64,
                    Utc::now().to_rfc3339()
                ],
            )
            .map_err(|e| RagError::storage("Failed to record index stats", e))?;

        if rows == 0 {
            return Err(RagError::storage(
                format!("Unknown session: {}", session_id),
                anyhow::anyhow!("no registry row to update"),
            ));
        }

        Ok(())
    }

    /// ID로 세션 조회
    pub fn get_session(&self, session_id: &str) -> RagResult<Option<SessionRecord>> {
        let conn = self.lock()?;
        conn.query_row(
            "SELECT id, created_at, upload_dir, index_dir, document_count, chunk_count, indexed_at
             FROM sessions WHERE id = ?1",
            params![session_id],
            row_to_record,
        )
        .optional()
        .map_err(|e| RagError::storage("Failed to query session", e))
    }

    /// 최근 세션 목록
    pub fn list_sessions(&self, limit: usize) -> RagResult<Vec<SessionRecord>> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare(
                "SELECT id, created_at, upload_dir, index_dir, document_count, chunk_count, indexed_at
                 FROM sessions
                 ORDER BY created_at DESC, id DESC
                 LIMIT ?1",
            )
            .map_err(|e| RagError::storage("Failed to prepare session listing", e))?;

        let rows = stmt
            .query_map(params![limit as i64], row_to_record)
            .map_err(|e| RagError::storage("Failed to list sessions", e))?;

        rows.collect::<Result<Vec<_>, _>>()
            .map_err(|e| RagError::storage("Failed to read session row", e))
    }

    /// 레지스트리 통계
    pub fn stats(&self) -> RagResult<RegistryStats> {
        let conn = self.lock()?;
        let (sessions, indexed, documents, chunks): (i64, i64, i64, i64) = conn
            .query_row(
                "SELECT COUNT(*),
                        COUNT(indexed_at),
                        COALESCE(SUM(document_count), 0),
                        COALESCE(SUM(chunk_count), 0)
                 FROM sessions",
                [],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)),
            )
            .map_err(|e| RagError::storage("Failed to read registry stats", e))?;

        Ok(RegistryStats {
            session_count: sessions as usize,
            indexed_count: indexed as usize,
            total_documents: documents as usize,
            total_chunks: chunks as usize,
            db_path: self.storage.registry_path.clone(),
        })
    }
}

// ============================================================================
// Helper Functions
// ============================================================================

fn row_to_record(row: &rusqlite::Row<'_>) -> rusqlite::Result<SessionRecord> {
    Ok(SessionRecord {
        session: Session {
            id: row.get(0)?,
            created_at: parse_datetime(row.get::<_, String>(1)?),
            upload_dir: PathBuf::from(row.get::<_, String>(2)?),
            index_dir: PathBuf::from(row.get::<_, String>(3)?),
        },
        document_count: row.get::<_, i64>(4)? as usize,
        chunk_count: row.get::<_, i64>(5)? as usize,
        indexed_at: row.get::<_, Option<String>>(6)?.map(parse_datetime),
    })
}

/// RFC3339 문자열을 DateTime<Utc>로 파싱
fn parse_datetime(s: String) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(&s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

/// 이번 호출이 만든 디렉토리 제거 (실패는 로그만)
fn cleanup_dirs(dirs: &[&Path]) {
    for dir in dirs {
        if let Err(e) = std::fs::remove_dir_all(dir) {
            tracing::warn!("Failed to clean up {:?}: {}", dir, e);
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
