// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Persistence contract: row binding for every persistable entity, plus a
//! JSON-file row store implementing it.
//!
//! Entities describe their fields once (`field_defs`), bind themselves
//! into a statement for writes and load themselves back from a row cursor.
//! Row identity is either singleton (one row per entity type and parent)
//! or list (many rows per parent, e.g. scenes of a device). A relational
//! engine can implement the same contract; the built-in store keeps the
//! rows in one JSON file per data directory and rewrites it atomically.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{HostError, HostResult};

/// Current schema generation of the built-in store.
pub const SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    Integer,
    Real,
    Text,
}

/// One column of an entity's row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldDef {
    pub name: &'static str,
    pub field_type: FieldType,
}

impl FieldDef {
    pub const fn integer(name: &'static str) -> Self {
        Self { name, field_type: FieldType::Integer }
    }

    pub const fn real(name: &'static str) -> Self {
        Self { name, field_type: FieldType::Real }
    }

    pub const fn text(name: &'static str) -> Self {
        Self { name, field_type: FieldType::Text }
    }
}

/// A stored cell value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SqlValue {
    Integer(i64),
    Real(f64),
    Text(String),
    Null,
}

/// Cursor over one row's cells, advanced by each load call.
pub struct RowReader<'a> {
    cells: &'a [SqlValue],
    index: usize,
}

impl<'a> RowReader<'a> {
    pub fn new(cells: &'a [SqlValue]) -> Self {
        Self { cells, index: 0 }
    }

    fn next(&mut self) -> HostResult<&'a SqlValue> {
        let cell = self
            .cells
            .get(self.index)
            .ok_or_else(|| HostError::persistence(format!("row too short at index {}", self.index)))?;
        self.index += 1;
        Ok(cell)
    }

    pub fn next_integer(&mut self) -> HostResult<i64> {
        match self.next()? {
            SqlValue::Integer(v) => Ok(*v),
            SqlValue::Real(v) => Ok(*v as i64),
            other => Err(HostError::persistence(format!("expected integer, found {other:?}"))),
        }
    }

    pub fn next_real(&mut self) -> HostResult<f64> {
        match self.next()? {
            SqlValue::Real(v) => Ok(*v),
            SqlValue::Integer(v) => Ok(*v as f64),
            other => Err(HostError::persistence(format!("expected real, found {other:?}"))),
        }
    }

    pub fn next_text(&mut self) -> HostResult<String> {
        match self.next()? {
            SqlValue::Text(v) => Ok(v.clone()),
            other => Err(HostError::persistence(format!("expected text, found {other:?}"))),
        }
    }
}

/// Write-side counterpart of [`RowReader`].
#[derive(Debug, Default)]
pub struct StatementBuilder {
    cells: Vec<SqlValue>,
}

impl StatementBuilder {
    pub fn bind_integer(&mut self, v: i64) {
        self.cells.push(SqlValue::Integer(v));
    }

    pub fn bind_real(&mut self, v: f64) {
        self.cells.push(SqlValue::Real(v));
    }

    pub fn bind_text(&mut self, v: impl Into<String>) {
        self.cells.push(SqlValue::Text(v.into()));
    }

    pub fn into_cells(self) -> Vec<SqlValue> {
        self.cells
    }
}

/// How rows of an entity are keyed under their parent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RowIdentity {
    /// One row per parent, identified by the entity type alone.
    Singleton,
    /// One of many rows per parent, identified by a key (e.g. scene no).
    InList { key: String },
}

/// The row-binding contract every persistable entity implements.
pub trait PersistedParams {
    fn table_name(&self) -> &'static str;

    fn field_defs(&self) -> &'static [FieldDef];

    fn num_field_defs(&self) -> usize {
        self.field_defs().len()
    }

    /// Identity of this entity's row below its parent.
    fn row_identity(&self) -> RowIdentity {
        RowIdentity::Singleton
    }

    /// Load state from a row cursor. The common flags word carries packed
    /// boolean settings shared by a whole entity family.
    fn load_from_row(&mut self, row: &mut RowReader<'_>, common_flags: &mut u64) -> HostResult<()>;

    /// Bind state into a statement for writing.
    fn bind_to_statement(&self, stmt: &mut StatementBuilder, parent_id: &str, common_flags: u64);

    /// SQL needed to migrate a relational implementation of this entity's
    /// table between schema generations. The built-in JSON store ignores
    /// it.
    fn db_schema_upgrade_sql(&self, from_version: u32, to_version: u32) -> Option<String> {
        let _ = (from_version, to_version);
        None
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredRow {
    key: String,
    cells: Vec<SqlValue>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct StoreFile {
    schema_version: u32,
    /// table name -> parent id -> rows
    tables: BTreeMap<String, BTreeMap<String, Vec<StoredRow>>>,
}

/// JSON-file row store.
#[derive(Debug)]
pub struct ParamStore {
    path: PathBuf,
    data: StoreFile,
    dirty: bool,
}

impl ParamStore {
    /// Open (or create) the store file in the given data directory.
    pub fn open(data_dir: &Path) -> HostResult<Self> {
        let path = data_dir.join("vdchost-params.json");
        let data = match fs::read(&path) {
            Ok(bytes) => serde_json::from_slice::<StoreFile>(&bytes)
                .map_err(|e| HostError::persistence(format!("corrupt store {}: {e}", path.display())))?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                StoreFile { schema_version: SCHEMA_VERSION, ..StoreFile::default() }
            }
            Err(e) => return Err(HostError::persistence(format!("cannot read {}: {e}", path.display()))),
        };
        if data.schema_version != SCHEMA_VERSION {
            info!(
                from = data.schema_version,
                to = SCHEMA_VERSION,
                "store schema migration (relational backends run upgrade SQL here)"
            );
        }
        Ok(Self { path, data, dirty: false })
    }

    /// In-memory store for tests.
    pub fn in_memory() -> Self {
        Self {
            path: PathBuf::new(),
            data: StoreFile { schema_version: SCHEMA_VERSION, ..StoreFile::default() },
            dirty: false,
        }
    }

    /// Write an entity's row, replacing a previous row with the same
    /// identity.
    pub fn save(&mut self, entity: &dyn PersistedParams, parent_id: &str, common_flags: u64) {
        let mut stmt = StatementBuilder::default();
        entity.bind_to_statement(&mut stmt, parent_id, common_flags);
        let key = match entity.row_identity() {
            RowIdentity::Singleton => String::new(),
            RowIdentity::InList { key } => key,
        };
        let rows = self
            .data
            .tables
            .entry(entity.table_name().to_owned())
            .or_default()
            .entry(parent_id.to_owned())
            .or_default();
        let row = StoredRow { key: key.clone(), cells: stmt.into_cells() };
        if let Some(existing) = rows.iter_mut().find(|r| r.key == key) {
            if existing.cells == row.cells {
                return;
            }
            *existing = row;
        } else {
            rows.push(row);
        }
        self.dirty = true;
    }

    /// Load an entity's row if one is stored. Returns whether a row was
    /// found.
    pub fn load(&self, entity: &mut dyn PersistedParams, parent_id: &str, common_flags: &mut u64) -> HostResult<bool> {
        let key = match entity.row_identity() {
            RowIdentity::Singleton => String::new(),
            RowIdentity::InList { key } => key,
        };
        let Some(row) = self
            .data
            .tables
            .get(entity.table_name())
            .and_then(|parents| parents.get(parent_id))
            .and_then(|rows| rows.iter().find(|r| r.key == key))
        else {
            return Ok(false);
        };
        let mut reader = RowReader::new(&row.cells);
        entity.load_from_row(&mut reader, common_flags)?;
        Ok(true)
    }

    /// All list-row keys stored for a table and parent.
    pub fn list_keys(&self, table: &str, parent_id: &str) -> Vec<String> {
        self.data
            .tables
            .get(table)
            .and_then(|parents| parents.get(parent_id))
            .map(|rows| rows.iter().map(|r| r.key.clone()).collect())
            .unwrap_or_default()
    }

    /// Forget everything stored below a parent (device removal with
    /// forget).
    pub fn forget_parent(&mut self, parent_id: &str) {
        for parents in self.data.tables.values_mut() {
            if parents.remove(parent_id).is_some() {
                self.dirty = true;
            }
        }
    }

    /// Flush to disk when modified. Atomic rewrite via a temp file.
    pub fn flush(&mut self) -> HostResult<()> {
        if !self.dirty || self.path.as_os_str().is_empty() {
            return Ok(());
        }
        let bytes = serde_json::to_vec_pretty(&self.data)
            .map_err(|e| HostError::persistence(format!("serialize store: {e}")))?;
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, &bytes)
            .and_then(|()| fs::rename(&tmp, &self.path))
            .map_err(|e| HostError::persistence(format!("write {}: {e}", self.path.display())))?;
        self.dirty = false;
        debug!(path = %self.path.display(), "store flushed");
        Ok(())
    }
}

impl Drop for ParamStore {
    fn drop(&mut self) {
        if self.dirty {
            if let Err(err) = self.flush() {
                warn!(%err, "store flush on drop failed");
            }
        }
    }
}

#[cfg(test)]
#[path = "persist_tests.rs"]
mod tests;
