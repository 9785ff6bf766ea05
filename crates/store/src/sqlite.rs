//! The embedded relational backend: SQLite reached through a pooled
//! connection, matching the data model in §3 of the spec this crate
//! implements.

use chrono::{DateTime, Utc};
use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{params, Connection, OptionalExtension};
use tracing::{debug, instrument};

use crate::error::StoreError;
use crate::model::{
    group_key, Document, DocumentContent, DocumentSignature, DuplicateGroup, DuplicateGroupMember,
    GroupWithMembers, ProcessingStatus, SyncState,
};
use crate::Store;

/// Recommended chunk size for multi-row statements, to stay well under
/// SQLite's default bind-variable limit.
pub const MAX_BIND_CHUNK: usize = 500;

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS documents (
    id TEXT PRIMARY KEY,
    upstream_id INTEGER NOT NULL UNIQUE,
    title TEXT NOT NULL,
    correspondent TEXT,
    document_type TEXT,
    tags TEXT NOT NULL,
    created TEXT,
    added TEXT,
    modified TEXT,
    original_file_size INTEGER,
    archive_file_size INTEGER,
    original_file_name TEXT,
    fingerprint TEXT,
    processing_status TEXT NOT NULL,
    synced_at TEXT
);

CREATE TABLE IF NOT EXISTS document_content (
    document_id TEXT PRIMARY KEY REFERENCES documents(id) ON DELETE CASCADE,
    full_text TEXT NOT NULL,
    normalized_text TEXT NOT NULL,
    word_count INTEGER NOT NULL,
    content_hash TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS document_signatures (
    document_id TEXT PRIMARY KEY REFERENCES documents(id) ON DELETE CASCADE,
    minhash_signature BLOB NOT NULL,
    algorithm_version TEXT NOT NULL,
    num_permutations INTEGER NOT NULL,
    created_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS duplicate_groups (
    id TEXT PRIMARY KEY,
    confidence_score REAL NOT NULL,
    jaccard_similarity REAL NOT NULL,
    fuzzy_text_ratio REAL NOT NULL,
    metadata_similarity REAL NOT NULL,
    filename_similarity REAL NOT NULL,
    algorithm_version TEXT NOT NULL,
    reviewed INTEGER NOT NULL,
    resolved INTEGER NOT NULL,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS duplicate_group_members (
    group_id TEXT NOT NULL REFERENCES duplicate_groups(id) ON DELETE CASCADE,
    document_id TEXT NOT NULL REFERENCES documents(id) ON DELETE CASCADE,
    is_primary INTEGER NOT NULL,
    UNIQUE(group_id, document_id)
);

CREATE TABLE IF NOT EXISTS sync_state (
    id INTEGER PRIMARY KEY CHECK (id = 0),
    last_sync_at TEXT,
    last_analysis_at TEXT,
    last_sync_document_count INTEGER NOT NULL,
    total_documents INTEGER NOT NULL,
    total_duplicate_groups INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS config_kv (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
);
"#;

/// SQLite-backed [`Store`] implementation, the production persistence
/// adapter for the deduplication core.
pub struct SqliteStore {
    pool: Pool<SqliteConnectionManager>,
}

impl SqliteStore {
    /// Open (creating if absent) a single-file database at `path`,
    /// enabling foreign keys and running schema setup.
    pub fn open(path: impl AsRef<std::path::Path>) -> Result<Self, StoreError> {
        let manager = SqliteConnectionManager::file(path).with_init(|conn| {
            conn.execute_batch("PRAGMA foreign_keys = ON; PRAGMA journal_mode = WAL;")
        });
        Self::from_manager(manager)
    }

    /// Open an ephemeral in-memory database — used by tests.
    pub fn open_in_memory() -> Result<Self, StoreError> {
        let manager = SqliteConnectionManager::memory().with_init(|conn| conn.execute_batch("PRAGMA foreign_keys = ON;"));
        Self::from_manager(manager)
    }

    fn from_manager(manager: SqliteConnectionManager) -> Result<Self, StoreError> {
        let pool = Pool::new(manager).map_err(StoreError::Pool)?;
        let conn = pool.get().map_err(StoreError::Pool)?;
        conn.execute_batch(SCHEMA)
            .map_err(|e| StoreError::Migration(e.to_string()))?;
        Ok(Self { pool })
    }

    fn conn(&self) -> Result<r2d2::PooledConnection<SqliteConnectionManager>, StoreError> {
        self.pool.get().map_err(StoreError::Pool)
    }

    fn write_document_row(conn: &Connection, document: &Document, content: &DocumentContent) -> rusqlite::Result<()> {
        let tags_json = serde_json::to_string(&document.tags).unwrap_or_else(|_| "[]".to_string());
        conn.execute(
            "INSERT INTO documents (
                id, upstream_id, title, correspondent, document_type, tags,
                created, added, modified, original_file_size, archive_file_size,
                original_file_name, fingerprint, processing_status, synced_at
            ) VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10,?11,?12,?13,?14,?15)
            ON CONFLICT(id) DO UPDATE SET
                upstream_id = excluded.upstream_id,
                title = excluded.title,
                correspondent = excluded.correspondent,
                document_type = excluded.document_type,
                tags = excluded.tags,
                created = excluded.created,
                added = excluded.added,
                modified = excluded.modified,
                original_file_size = excluded.original_file_size,
                archive_file_size = excluded.archive_file_size,
                original_file_name = excluded.original_file_name,
                fingerprint = excluded.fingerprint,
                processing_status = excluded.processing_status,
                synced_at = excluded.synced_at",
            params![
                document.id,
                document.upstream_id,
                document.title,
                document.correspondent,
                document.document_type,
                tags_json,
                document.created.map(|t| t.to_rfc3339()),
                document.added.map(|t| t.to_rfc3339()),
                document.modified.map(|t| t.to_rfc3339()),
                document.original_file_size.map(|v| v as i64),
                document.archive_file_size.map(|v| v as i64),
                document.original_file_name,
                document.fingerprint,
                document.processing_status.as_str(),
                document.synced_at.map(|t| t.to_rfc3339()),
            ],
        )?;

        conn.execute(
            "INSERT INTO document_content (document_id, full_text, normalized_text, word_count, content_hash)
             VALUES (?1,?2,?3,?4,?5)
             ON CONFLICT(document_id) DO UPDATE SET
                full_text = excluded.full_text,
                normalized_text = excluded.normalized_text,
                word_count = excluded.word_count,
                content_hash = excluded.content_hash",
            params![
                content.document_id,
                content.full_text,
                content.normalized_text,
                content.word_count as i64,
                content.content_hash,
            ],
        )?;

        Ok(())
    }

    fn row_to_document(row: &rusqlite::Row) -> rusqlite::Result<Document> {
        let tags_json: String = row.get("tags")?;
        let tags: Vec<String> = serde_json::from_str(&tags_json).unwrap_or_default();
        let status: String = row.get("processing_status")?;

        Ok(Document {
            id: row.get("id")?,
            upstream_id: row.get("upstream_id")?,
            title: row.get("title")?,
            correspondent: row.get("correspondent")?,
            document_type: row.get("document_type")?,
            tags,
            created: parse_ts(row.get::<_, Option<String>>("created")?),
            added: parse_ts(row.get::<_, Option<String>>("added")?),
            modified: parse_ts(row.get::<_, Option<String>>("modified")?),
            original_file_size: row.get::<_, Option<i64>>("original_file_size")?.map(|v| v as u64),
            archive_file_size: row.get::<_, Option<i64>>("archive_file_size")?.map(|v| v as u64),
            original_file_name: row.get("original_file_name")?,
            fingerprint: row.get("fingerprint")?,
            processing_status: ProcessingStatus::from_str(&status),
            synced_at: parse_ts(row.get::<_, Option<String>>("synced_at")?),
        })
    }
}

fn parse_ts(raw: Option<String>) -> Option<DateTime<Utc>> {
    raw.and_then(|s| DateTime::parse_from_rfc3339(&s).ok()).map(|t| t.with_timezone(&Utc))
}

impl Store for SqliteStore {
    #[instrument(skip(self))]
    fn get_document_by_upstream_id(&self, upstream_id: i64) -> Result<Option<Document>, StoreError> {
        let conn = self.conn()?;
        let result = conn
            .query_row("SELECT * FROM documents WHERE upstream_id = ?1", params![upstream_id], Self::row_to_document)
            .optional()?;
        Ok(result)
    }

    fn get_document(&self, document_id: &str) -> Result<Option<Document>, StoreError> {
        let conn = self.conn()?;
        let result = conn
            .query_row("SELECT * FROM documents WHERE id = ?1", params![document_id], Self::row_to_document)
            .optional()?;
        Ok(result)
    }

    fn list_documents(&self, only_pending: bool) -> Result<Vec<Document>, StoreError> {
        let conn = self.conn()?;
        let sql = if only_pending {
            "SELECT * FROM documents WHERE processing_status = 'pending'"
        } else {
            "SELECT * FROM documents"
        };
        let mut stmt = conn.prepare(sql)?;
        let rows = stmt.query_map([], Self::row_to_document)?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }

    #[instrument(skip(self, document, content), fields(upstream_id = document.upstream_id))]
    fn insert_document(&self, document: &Document, content: &DocumentContent) -> Result<(), StoreError> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        if tx
            .query_row("SELECT 1 FROM documents WHERE upstream_id = ?1", params![document.upstream_id], |_| Ok(()))
            .optional()?
            .is_some()
        {
            return Err(StoreError::Constraint(format!("upstream_id {} already exists", document.upstream_id)));
        }
        Self::write_document_row(&tx, document, content)?;
        tx.commit()?;
        debug!("inserted document");
        Ok(())
    }

    fn update_document(&self, document: &Document, content: &DocumentContent) -> Result<(), StoreError> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        Self::write_document_row(&tx, document, content)?;
        tx.commit()?;
        Ok(())
    }

    fn patch_file_sizes(
        &self,
        document_id: &str,
        original_file_size: Option<u64>,
        archive_file_size: Option<u64>,
    ) -> Result<(), StoreError> {
        let conn = self.conn()?;
        let updated = conn.execute(
            "UPDATE documents SET original_file_size = ?1, archive_file_size = ?2 WHERE id = ?3",
            params![
                original_file_size.map(|v| v as i64),
                archive_file_size.map(|v| v as i64),
                document_id
            ],
        )?;
        if updated == 0 {
            return Err(StoreError::NotFound(document_id.to_string()));
        }
        Ok(())
    }

    fn purge_all_documents(&self) -> Result<(), StoreError> {
        let conn = self.conn()?;
        conn.execute_batch(
            "DELETE FROM duplicate_group_members;
             DELETE FROM duplicate_groups;
             DELETE FROM document_signatures;
             DELETE FROM document_content;
             DELETE FROM documents;",
        )?;
        Ok(())
    }

    fn get_content(&self, document_id: &str) -> Result<Option<DocumentContent>, StoreError> {
        let conn = self.conn()?;
        let result = conn
            .query_row(
                "SELECT document_id, full_text, normalized_text, word_count, content_hash
                 FROM document_content WHERE document_id = ?1",
                params![document_id],
                |row| {
                    Ok(DocumentContent {
                        document_id: row.get(0)?,
                        full_text: row.get(1)?,
                        normalized_text: row.get(2)?,
                        word_count: row.get::<_, i64>(3)? as usize,
                        content_hash: row.get(4)?,
                    })
                },
            )
            .optional()?;
        Ok(result)
    }

    fn get_signature(&self, document_id: &str) -> Result<Option<DocumentSignature>, StoreError> {
        let conn = self.conn()?;
        let result = conn
            .query_row(
                "SELECT document_id, minhash_signature, algorithm_version, num_permutations, created_at
                 FROM document_signatures WHERE document_id = ?1",
                params![document_id],
                row_to_signature,
            )
            .optional()?;
        Ok(result)
    }

    fn save_signature(&self, signature: &DocumentSignature) -> Result<(), StoreError> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO document_signatures (document_id, minhash_signature, algorithm_version, num_permutations, created_at)
             VALUES (?1,?2,?3,?4,?5)
             ON CONFLICT(document_id) DO UPDATE SET
                minhash_signature = excluded.minhash_signature,
                algorithm_version = excluded.algorithm_version,
                num_permutations = excluded.num_permutations,
                created_at = excluded.created_at",
            params![
                signature.document_id,
                signature.minhash_signature,
                signature.algorithm_version,
                signature.num_permutations as i64,
                signature.created_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    fn list_signatures(&self, num_permutations: usize) -> Result<Vec<DocumentSignature>, StoreError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT document_id, minhash_signature, algorithm_version, num_permutations, created_at
             FROM document_signatures WHERE num_permutations = ?1",
        )?;
        let rows = stmt.query_map(params![num_permutations as i64], row_to_signature)?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }

    fn delete_signature(&self, document_id: &str) -> Result<(), StoreError> {
        let conn = self.conn()?;
        conn.execute("DELETE FROM document_signatures WHERE document_id = ?1", params![document_id])?;
        Ok(())
    }

    fn mark_completed(&self, document_ids: &[String]) -> Result<(), StoreError> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        for chunk in document_ids.chunks(MAX_BIND_CHUNK) {
            let placeholders = chunk.iter().map(|_| "?").collect::<Vec<_>>().join(",");
            let sql = format!("UPDATE documents SET processing_status = 'completed' WHERE id IN ({placeholders})");
            let params: Vec<&dyn rusqlite::ToSql> = chunk.iter().map(|id| id as &dyn rusqlite::ToSql).collect();
            tx.execute(&sql, params.as_slice())?;
        }
        tx.commit()?;
        Ok(())
    }

    fn get_sync_state(&self) -> Result<SyncState, StoreError> {
        let conn = self.conn()?;
        let result = conn
            .query_row(
                "SELECT last_sync_at, last_analysis_at, last_sync_document_count, total_documents, total_duplicate_groups
                 FROM sync_state WHERE id = 0",
                [],
                |row| {
                    Ok(SyncState {
                        last_sync_at: parse_ts(row.get(0)?),
                        last_analysis_at: parse_ts(row.get(1)?),
                        last_sync_document_count: row.get::<_, i64>(2)? as u64,
                        total_documents: row.get::<_, i64>(3)? as u64,
                        total_duplicate_groups: row.get::<_, i64>(4)? as u64,
                    })
                },
            )
            .optional()?;
        Ok(result.unwrap_or_default())
    }

    fn save_sync_state(&self, state: &SyncState) -> Result<(), StoreError> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO sync_state (id, last_sync_at, last_analysis_at, last_sync_document_count, total_documents, total_duplicate_groups)
             VALUES (0, ?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(id) DO UPDATE SET
                last_sync_at = excluded.last_sync_at,
                last_analysis_at = excluded.last_analysis_at,
                last_sync_document_count = excluded.last_sync_document_count,
                total_documents = excluded.total_documents,
                total_duplicate_groups = excluded.total_duplicate_groups",
            params![
                state.last_sync_at.map(|t| t.to_rfc3339()),
                state.last_analysis_at.map(|t| t.to_rfc3339()),
                state.last_sync_document_count as i64,
                state.total_documents as i64,
                state.total_duplicate_groups as i64,
            ],
        )?;
        Ok(())
    }

    fn list_groups(&self) -> Result<Vec<GroupWithMembers>, StoreError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT id, confidence_score, jaccard_similarity, fuzzy_text_ratio, metadata_similarity,
                    filename_similarity, algorithm_version, reviewed, resolved, created_at, updated_at
             FROM duplicate_groups",
        )?;
        let group_rows = stmt.query_map([], |row| {
            Ok(DuplicateGroup {
                id: row.get(0)?,
                confidence_score: row.get(1)?,
                jaccard_similarity: row.get(2)?,
                fuzzy_text_ratio: row.get(3)?,
                metadata_similarity: row.get(4)?,
                filename_similarity: row.get(5)?,
                algorithm_version: row.get(6)?,
                reviewed: row.get::<_, i64>(7)? != 0,
                resolved: row.get::<_, i64>(8)? != 0,
                created_at: parse_ts(row.get(9)?).unwrap_or_else(Utc::now),
                updated_at: parse_ts(row.get(10)?).unwrap_or_else(Utc::now),
            })
        })?;

        let mut out = Vec::new();
        for group in group_rows {
            let group = group?;
            let mut member_stmt = conn.prepare(
                "SELECT group_id, document_id, is_primary FROM duplicate_group_members WHERE group_id = ?1",
            )?;
            let members = member_stmt
                .query_map(params![group.id], |row| {
                    Ok(DuplicateGroupMember {
                        group_id: row.get(0)?,
                        document_id: row.get(1)?,
                        is_primary: row.get::<_, i64>(2)? != 0,
                    })
                })?
                .collect::<Result<Vec<_>, _>>()?;
            out.push(GroupWithMembers { group, members });
        }
        Ok(out)
    }

    #[instrument(skip_all, fields(updated = to_update.len(), created = to_create.len(), deleted = to_delete_ids.len()))]
    fn reconcile_groups(
        &self,
        to_update: &[GroupWithMembers],
        to_create: &[GroupWithMembers],
        to_delete_ids: &[String],
    ) -> Result<(), StoreError> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;

        for id in to_delete_ids {
            tx.execute("DELETE FROM duplicate_groups WHERE id = ?1", params![id])?;
        }

        for group in to_update {
            write_group(&tx, group)?;
            tx.execute("DELETE FROM duplicate_group_members WHERE group_id = ?1", params![group.group.id])?;
            for member in &group.members {
                write_member(&tx, member)?;
            }
        }

        for group in to_create {
            write_group(&tx, group)?;
            for member in &group.members {
                write_member(&tx, member)?;
            }
        }

        tx.commit()?;
        debug!(key_sample = %to_create.first().map(|g| group_key(g.members.iter().map(|m| m.document_id.as_str()))).unwrap_or_default(), "reconciliation committed");
        Ok(())
    }
}

fn row_to_signature(row: &rusqlite::Row) -> rusqlite::Result<DocumentSignature> {
    Ok(DocumentSignature {
        document_id: row.get(0)?,
        minhash_signature: row.get(1)?,
        algorithm_version: row.get(2)?,
        num_permutations: row.get::<_, i64>(3)? as usize,
        created_at: parse_ts(row.get(4)?).unwrap_or_else(Utc::now),
    })
}

fn write_group(conn: &Connection, group: &GroupWithMembers) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT INTO duplicate_groups (
            id, confidence_score, jaccard_similarity, fuzzy_text_ratio, metadata_similarity,
            filename_similarity, algorithm_version, reviewed, resolved, created_at, updated_at
        ) VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10,?11)
        ON CONFLICT(id) DO UPDATE SET
            confidence_score = excluded.confidence_score,
            jaccard_similarity = excluded.jaccard_similarity,
            fuzzy_text_ratio = excluded.fuzzy_text_ratio,
            metadata_similarity = excluded.metadata_similarity,
            filename_similarity = excluded.filename_similarity,
            algorithm_version = excluded.algorithm_version,
            updated_at = excluded.updated_at",
        params![
            group.group.id,
            group.group.confidence_score,
            group.group.jaccard_similarity,
            group.group.fuzzy_text_ratio,
            group.group.metadata_similarity,
            group.group.filename_similarity,
            group.group.algorithm_version,
            group.group.reviewed as i64,
            group.group.resolved as i64,
            group.group.created_at.to_rfc3339(),
            group.group.updated_at.to_rfc3339(),
        ],
    )?;
    Ok(())
}

fn write_member(conn: &Connection, member: &DuplicateGroupMember) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT INTO duplicate_group_members (group_id, document_id, is_primary) VALUES (?1,?2,?3)
         ON CONFLICT(group_id, document_id) DO UPDATE SET is_primary = excluded.is_primary",
        params![member.group_id, member.document_id, member.is_primary as i64],
    )?;
    Ok(())
}
