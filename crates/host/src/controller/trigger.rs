// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Triggers: a condition script plus an action script over named value
//! sources.
//!
//! Evaluation is event-driven: whenever a mapped source changes, the
//! condition re-evaluates. The action fires on a rising edge, optionally
//! after a holdoff during which the condition must stay true. Firing has
//! restart semantics: a new fire aborts a still-running previous action.

use std::time::Duration;

use tracing::{debug, info, warn};

use crate::clock::MonoTime;
use crate::error::HostResult;
use crate::persist::{FieldDef, PersistedParams, RowIdentity, RowReader, StatementBuilder};
use crate::scripting::{truthy, ScriptRunner};

/// Binding of a script variable name to a value source id.
#[derive(Debug, Clone, PartialEq)]
pub struct VarDef {
    pub var: String,
    pub source_id: String,
}

impl VarDef {
    /// Parse "alias:sourceid" lines into bindings; malformed lines are
    /// skipped.
    pub fn parse_defs(text: &str) -> Vec<VarDef> {
        text.lines()
            .filter_map(|line| {
                let (var, source_id) = line.split_once(':')?;
                let var = var.trim();
                let source_id = source_id.trim();
                if var.is_empty() || source_id.is_empty() {
                    return None;
                }
                Some(VarDef { var: var.to_owned(), source_id: source_id.to_owned() })
            })
            .collect()
    }
}

/// When a trigger fires relative to its condition result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TriggerMode {
    /// Fire when the condition becomes true.
    #[default]
    RisingEdge,
    /// Fire on every change of the condition result.
    Change,
}

#[derive(Debug)]
pub struct Trigger {
    pub id: u32,
    pub name: String,
    pub var_defs: Vec<VarDef>,
    pub condition: String,
    pub action: String,
    pub mode: TriggerMode,
    /// Condition must stay true this long before the action fires.
    pub holdoff: Duration,
    last_result: Option<bool>,
    fire_at: Option<MonoTime>,
    action_running: bool,
}

impl Trigger {
    pub fn new(id: u32, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            var_defs: Vec::new(),
            condition: String::new(),
            action: String::new(),
            mode: TriggerMode::default(),
            holdoff: Duration::ZERO,
            last_result: None,
            fire_at: None,
            action_running: false,
        }
    }

    pub fn last_condition_result(&self) -> Option<bool> {
        self.last_result
    }

    /// Stable script-context uid of this trigger.
    pub fn source_uid(&self) -> String {
        format!("trigger_{}", self.id)
    }

    /// Whether any var of this trigger maps the given source.
    pub fn maps_source(&self, source_id: &str) -> bool {
        self.var_defs.iter().any(|d| d.source_id == source_id)
    }

    /// Push a source change into the script context and re-evaluate.
    pub fn process_source_change(
        &mut self,
        source_id: &str,
        value: Option<f64>,
        runner: &mut dyn ScriptRunner,
        now: MonoTime,
    ) {
        let uid = self.source_uid();
        let mut mapped = false;
        for def in &self.var_defs {
            if def.source_id == source_id {
                runner.set_var(&uid, &def.var, value);
                mapped = true;
            }
        }
        if mapped {
            self.evaluate(runner, now);
        }
    }

    /// Re-evaluate the condition and handle edge/holdoff logic.
    pub fn evaluate(&mut self, runner: &mut dyn ScriptRunner, now: MonoTime) -> Option<bool> {
        let uid = self.source_uid();
        let result = match runner.run(&uid, &self.condition) {
            Ok(value) => truthy(&value),
            Err(err) => {
                warn!(trigger = self.id, %err, "condition evaluation failed");
                return None;
            }
        };
        let was = self.last_result;
        self.last_result = Some(result);
        let edge = match self.mode {
            TriggerMode::RisingEdge => result && was != Some(true),
            TriggerMode::Change => was.is_some() && was != Some(result),
        };
        if edge && result {
            if self.holdoff.is_zero() {
                self.fire(runner, now);
            } else {
                debug!(trigger = self.id, holdoff = ?self.holdoff, "rising edge, holdoff armed");
                self.fire_at = Some(now + self.holdoff);
            }
        } else if edge {
            // change-mode fire on a falling result has no holdoff
            self.fire(runner, now);
        } else if !result {
            // condition fell: cancel a pending holdoff fire
            self.fire_at = None;
        }
        Some(result)
    }

    fn fire(&mut self, runner: &mut dyn ScriptRunner, now: MonoTime) {
        let _ = now;
        let uid = self.source_uid();
        if self.action_running {
            // restart semantics: abort the previous action
            info!(trigger = self.id, "aborting still-running action before refire");
            runner.stop(&uid);
        }
        self.action_running = true;
        info!(trigger = self.id, name = %self.name, "trigger fires");
        match runner.run(&uid, &self.action) {
            Ok(_) => {
                self.action_running = false;
            }
            Err(err) => {
                warn!(trigger = self.id, %err, "trigger action failed");
                self.action_running = false;
            }
        }
    }

    /// Force-run the action (test surface of the API).
    pub fn test_action(&mut self, runner: &mut dyn ScriptRunner, now: MonoTime) {
        self.fire(runner, now);
    }

    /// Stop a running action.
    pub fn stop_action(&mut self, runner: &mut dyn ScriptRunner) {
        if self.action_running {
            let uid = self.source_uid();
            runner.stop(&uid);
            self.action_running = false;
        }
    }

    pub fn next_wakeup(&self) -> Option<MonoTime> {
        self.fire_at
    }

    /// Holdoff expiry: fire if the condition held the whole time.
    pub fn tick(&mut self, now: MonoTime, runner: &mut dyn ScriptRunner) {
        if self.fire_at.is_some_and(|at| at <= now) {
            self.fire_at = None;
            if self.last_result == Some(true) {
                self.fire(runner, now);
            }
        }
    }
}

// -- persistence --------------------------------------------------------------

const TRIGGER_FIELDS: &[FieldDef] = &[
    FieldDef::integer("triggerId"),
    FieldDef::text("triggerName"),
    FieldDef::text("varDefs"),
    FieldDef::text("condition"),
    FieldDef::text("action"),
    FieldDef::integer("mode"),
    FieldDef::real("holdoffSeconds"),
];

impl PersistedParams for Trigger {
    fn table_name(&self) -> &'static str {
        "triggers"
    }

    fn field_defs(&self) -> &'static [FieldDef] {
        TRIGGER_FIELDS
    }

    fn row_identity(&self) -> RowIdentity {
        RowIdentity::InList { key: self.id.to_string() }
    }

    fn load_from_row(&mut self, row: &mut RowReader<'_>, _common_flags: &mut u64) -> HostResult<()> {
        self.id = row.next_integer()?.clamp(0, i64::from(u32::MAX)) as u32;
        self.name = row.next_text()?;
        self.var_defs = VarDef::parse_defs(&row.next_text()?);
        self.condition = row.next_text()?;
        self.action = row.next_text()?;
        self.mode = match row.next_integer()? {
            1 => TriggerMode::Change,
            _ => TriggerMode::RisingEdge,
        };
        self.holdoff = Duration::from_secs_f64(row.next_real()?.max(0.0));
        Ok(())
    }

    fn bind_to_statement(&self, stmt: &mut StatementBuilder, _parent_id: &str, _common_flags: u64) {
        stmt.bind_integer(i64::from(self.id));
        stmt.bind_text(self.name.clone());
        let defs: Vec<String> =
            self.var_defs.iter().map(|d| format!("{}:{}", d.var, d.source_id)).collect();
        stmt.bind_text(defs.join("\n"));
        stmt.bind_text(self.condition.clone());
        stmt.bind_text(self.action.clone());
        stmt.bind_integer(match self.mode {
            TriggerMode::RisingEdge => 0,
            TriggerMode::Change => 1,
        });
        stmt.bind_real(self.holdoff.as_secs_f64());
    }
}

#[cfg(test)]
#[path = "trigger_tests.rs"]
mod tests;
