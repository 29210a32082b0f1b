// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Contract to the external scripting runtime.
//!
//! The engine itself lives outside this crate; triggers and the
//! `x-p44-scriptExec` method only depend on this surface. Script sources
//! are addressed by a stable uid (trigger id, "mainscript", ...) so the
//! runtime can keep per-source contexts and report positions.

use serde_json::Value;

use crate::error::{HostResult, ScriptError};
use crate::persist::{FieldDef, PersistedParams, RowReader, StatementBuilder};

/// Command surface of a script source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScriptCommand {
    /// Syntax-check only.
    Check,
    Start,
    /// Abort a running instance, then start again.
    Restart,
    Stop,
}

pub trait ScriptRunner {
    /// Bind or clear a named variable in a source's context.
    fn set_var(&mut self, source_uid: &str, name: &str, value: Option<f64>);

    /// Run code in the context of `source_uid`. Errors carry line/char
    /// positions.
    fn run(&mut self, source_uid: &str, code: &str) -> Result<Value, ScriptError>;

    /// Abort whatever `source_uid` is currently running.
    fn stop(&mut self, source_uid: &str);
}

/// Runner used when no scripting runtime is attached: conditions evaluate
/// to null (never true) and actions are no-ops.
#[derive(Debug, Default)]
pub struct NullRunner;

impl ScriptRunner for NullRunner {
    fn set_var(&mut self, _source_uid: &str, _name: &str, _value: Option<f64>) {}

    fn run(&mut self, _source_uid: &str, _code: &str) -> Result<Value, ScriptError> {
        Ok(Value::Null)
    }

    fn stop(&mut self, _source_uid: &str) {}
}

/// The main script: user automation code stored in the persistent store
/// and run in the global context at startup.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MainScript {
    pub code: String,
}

const MAIN_SCRIPT_FIELDS: &[FieldDef] = &[FieldDef::text("scriptCode")];

impl PersistedParams for MainScript {
    fn table_name(&self) -> &'static str {
        "globalScripts"
    }

    fn field_defs(&self) -> &'static [FieldDef] {
        MAIN_SCRIPT_FIELDS
    }

    fn load_from_row(&mut self, row: &mut RowReader<'_>, _common_flags: &mut u64) -> HostResult<()> {
        self.code = row.next_text()?;
        Ok(())
    }

    fn bind_to_statement(&self, stmt: &mut StatementBuilder, _parent_id: &str, _common_flags: u64) {
        stmt.bind_text(self.code.clone());
    }
}

/// Interpret a script result as a condition outcome.
pub fn truthy(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|v| v != 0.0),
        Value::String(s) => !s.is_empty(),
        _ => false,
    }
}
