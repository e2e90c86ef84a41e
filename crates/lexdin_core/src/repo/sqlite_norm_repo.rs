//! SQLite-backed norm repository.
//!
//! # Responsibility
//! - Persist norms, tags and the version log in a migrated database.
//! - Run every write in an `IMMEDIATE` transaction.
//!
//! # Invariants
//! - `norm_versions` rows are protected by triggers against UPDATE/DELETE.
//! - Appends re-read the current version inside the write transaction.
//! - Timestamps are stored as RFC 3339 with full sub-second precision, so a
//!   reloaded norm compares equal to the value that was written.
//! - Read paths reject invalid persisted state instead of masking it.

use crate::model::norm::{normalize_tags, Modification, Norm, NormHeader, Version};
use crate::repo::norm_repo::{AppendVersionRequest, NormRepository, RepoError, RepoResult};
use chrono::{DateTime, SecondsFormat, Utc};
use log::{info, warn};
use rusqlite::{params, Connection, OptionalExtension, Row, Transaction, TransactionBehavior};
use std::path::Path;

/// Norm repository over one owned SQLite connection.
pub struct SqliteNormRepository {
    conn: Connection,
}

impl SqliteNormRepository {
    /// Wraps a migrated connection, checking the required tables exist.
    pub fn try_new(conn: Connection) -> RepoResult<Self> {
        for table in ["norms", "norm_tags", "norm_versions"] {
            if !table_exists(&conn, table)? {
                return Err(RepoError::MissingRequiredTable(table));
            }
        }
        Ok(Self { conn })
    }

    /// Opens (and migrates) a database file.
    pub fn open(path: impl AsRef<Path>) -> RepoResult<Self> {
        Self::try_new(crate::db::open_db(path)?)
    }

    /// Opens a fresh in-memory database.
    pub fn open_in_memory() -> RepoResult<Self> {
        Self::try_new(crate::db::open_db_in_memory()?)
    }

    /// Underlying connection, for diagnostics and tests.
    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    fn begin_write(&self) -> RepoResult<Transaction<'_>> {
        Ok(Transaction::new_unchecked(
            &self.conn,
            TransactionBehavior::Immediate,
        )?)
    }
}

impl NormRepository for SqliteNormRepository {
    fn get_norm(&self, id: &str) -> RepoResult<Option<Norm>> {
        load_norm(&self.conn, id)
    }

    fn list_norms(&self) -> RepoResult<Vec<Norm>> {
        let mut stmt = self.conn.prepare("SELECT id FROM norms ORDER BY id ASC;")?;
        let ids = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;

        let mut norms = Vec::with_capacity(ids.len());
        for id in ids {
            let norm = load_norm(&self.conn, &id)?
                .ok_or_else(|| RepoError::InvalidData(format!("norm {id} vanished during list")))?;
            norms.push(norm);
        }
        Ok(norms)
    }

    fn insert_norm(&self, norm: &Norm) -> RepoResult<()> {
        norm.validate()?;
        let tx = self.begin_write()?;
        if norm_exists(&tx, &norm.id)? {
            return Err(RepoError::DuplicateNorm(norm.id.clone()));
        }

        tx.execute(
            "INSERT INTO norms (id, title, short_title, description, is_confidential)
             VALUES (?1, ?2, ?3, ?4, ?5);",
            params![
                norm.id,
                norm.title,
                norm.short_title,
                norm.description,
                i64::from(norm.is_confidential),
            ],
        )?;
        for tag in normalize_tags(&norm.tags) {
            tx.execute(
                "INSERT INTO norm_tags (norm_id, name) VALUES (?1, ?2);",
                params![norm.id, tag],
            )?;
        }
        for version in norm.versions() {
            insert_version(&tx, &norm.id, version)?;
        }
        tx.commit()?;

        info!(
            "event=norm_insert module=repo status=ok store=sqlite norm_id={} versions={}",
            norm.id,
            norm.versions().len()
        );
        Ok(())
    }

    fn append_version(&self, request: AppendVersionRequest) -> RepoResult<Norm> {
        let tx = self.begin_write()?;
        let current = load_norm(&tx, &request.norm_id)?
            .ok_or_else(|| RepoError::NotFound(request.norm_id.clone()))?;

        let actual = current.current_version().version;
        if actual != request.expected_version {
            warn!(
                "event=norm_append module=repo status=conflict store=sqlite norm_id={} expected_version={} actual_version={}",
                request.norm_id, request.expected_version, actual
            );
            return Err(RepoError::ConflictingVersion {
                norm_id: request.norm_id,
                expected: request.expected_version,
                actual,
            });
        }

        let next = current.with_appended_version(request.content, request.modification, request.date);
        next.validate()?;
        insert_version(&tx, &next.id, next.current_version())?;
        tx.commit()?;

        info!(
            "event=norm_append module=repo status=ok store=sqlite norm_id={} version={}",
            next.id,
            next.current_version().version
        );
        Ok(next)
    }
}

fn load_norm(conn: &Connection, id: &str) -> RepoResult<Option<Norm>> {
    let header = conn
        .query_row(
            "SELECT id, title, short_title, description, is_confidential
             FROM norms
             WHERE id = ?1;",
            [id],
            |row| {
                Ok(NormHeader {
                    id: row.get("id")?,
                    title: row.get("title")?,
                    short_title: row.get("short_title")?,
                    description: row.get("description")?,
                    tags: Vec::new(),
                    is_confidential: row.get::<_, i64>("is_confidential")? != 0,
                })
            },
        )
        .optional()?;
    let Some(mut header) = header else {
        return Ok(None);
    };

    let mut tag_stmt =
        conn.prepare("SELECT name FROM norm_tags WHERE norm_id = ?1 ORDER BY name ASC;")?;
    header.tags = tag_stmt
        .query_map([id], |row| row.get::<_, String>(0))?
        .collect::<Result<Vec<_>, _>>()?;

    let mut version_stmt = conn.prepare(
        "SELECT
            version,
            content,
            date,
            modifying_norm_id,
            modifying_norm_title,
            summary,
            applied_by,
            applied_at
         FROM norm_versions
         WHERE norm_id = ?1
         ORDER BY version ASC;",
    )?;
    let mut rows = version_stmt.query([id])?;
    let mut versions = Vec::new();
    while let Some(row) = rows.next()? {
        versions.push(parse_version_row(row)?);
    }

    Norm::from_versions(header, versions)
        .map(Some)
        .map_err(|err| RepoError::InvalidData(err.to_string()))
}

fn parse_version_row(row: &Row<'_>) -> RepoResult<Version> {
    let version: i64 = row.get("version")?;
    let version = u32::try_from(version)
        .map_err(|_| RepoError::InvalidData(format!("version number out of range: {version}")))?;
    let date: String = row.get("date")?;

    let modifying_norm_id: Option<String> = row.get("modifying_norm_id")?;
    let modification = match modifying_norm_id {
        None => None,
        Some(modifying_norm_id) => {
            let applied_at: String = row.get("applied_at")?;
            Some(Modification {
                modifying_norm_id,
                modifying_norm_title: row.get("modifying_norm_title")?,
                summary: row.get("summary")?,
                applied_by: row.get("applied_by")?,
                applied_at: parse_timestamp(&applied_at)?,
            })
        }
    };

    Ok(Version {
        version,
        content: row.get("content")?,
        date: parse_timestamp(&date)?,
        modification,
    })
}

fn insert_version(tx: &Transaction<'_>, norm_id: &str, version: &Version) -> RepoResult<()> {
    let modification = version.modification.as_ref();
    tx.execute(
        "INSERT INTO norm_versions (
            norm_id,
            version,
            content,
            date,
            modifying_norm_id,
            modifying_norm_title,
            summary,
            applied_by,
            applied_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9);",
        params![
            norm_id,
            i64::from(version.version),
            version.content,
            format_timestamp(&version.date),
            modification.map(|m| m.modifying_norm_id.as_str()),
            modification.map(|m| m.modifying_norm_title.as_str()),
            modification.map(|m| m.summary.as_str()),
            modification.map(|m| m.applied_by.as_str()),
            modification.map(|m| format_timestamp(&m.applied_at)),
        ],
    )?;
    Ok(())
}

fn norm_exists(conn: &Connection, id: &str) -> RepoResult<bool> {
    let exists: i64 = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM norms WHERE id = ?1);",
        [id],
        |row| row.get(0),
    )?;
    Ok(exists == 1)
}

fn table_exists(conn: &Connection, table: &str) -> RepoResult<bool> {
    let exists: i64 = conn.query_row(
        "SELECT EXISTS(
            SELECT 1
            FROM sqlite_master
            WHERE type = 'table' AND name = ?1
        );",
        [table],
        |row| row.get(0),
    )?;
    Ok(exists == 1)
}

fn format_timestamp(value: &DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::AutoSi, true)
}

fn parse_timestamp(value: &str) -> RepoResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|parsed| parsed.with_timezone(&Utc))
        .map_err(|err| RepoError::InvalidData(format!("invalid timestamp `{value}`: {err}")))
}
