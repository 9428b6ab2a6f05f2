//! Scripted processes shared by the integration tests.

#![allow(dead_code)]

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use desres_core::{PoolKey, Process, ProcessContext, SimDuration, SimError, Step};

pub type Log = Rc<RefCell<Vec<String>>>;

pub fn new_log() -> Log {
    Rc::new(RefCell::new(Vec::new()))
}

#[derive(Debug, Clone)]
pub enum Action {
    Hold(i64),
    Acquire(u32),
    Release(u32),
    Note(&'static str),
    Fail(&'static str),
}

/// Runs a fixed list of actions against one pool, logging each `Note` as
/// `label@seconds message`.
pub struct Script {
    label: String,
    pool: PoolKey,
    actions: VecDeque<Action>,
    log: Log,
}

impl Script {
    pub fn new(label: &str, pool: PoolKey, actions: Vec<Action>, log: &Log) -> Self {
        Self {
            label: label.to_string(),
            pool,
            actions: actions.into(),
            log: Rc::clone(log),
        }
    }
}

impl Process for Script {
    fn name(&self) -> &str {
        &self.label
    }

    fn resume(&mut self, ctx: &mut ProcessContext<'_>) -> Result<Step, SimError> {
        while let Some(action) = self.actions.pop_front() {
            match action {
                Action::Hold(secs) => return Ok(Step::Hold(SimDuration::from_secs(secs))),
                Action::Acquire(units) => {
                    return Ok(Step::Acquire {
                        pool: self.pool,
                        units,
                    })
                }
                Action::Release(units) => ctx.release(self.pool, units)?,
                Action::Note(message) => {
                    let secs = ctx.now().as_nanos() / 1_000_000_000;
                    self.log
                        .borrow_mut()
                        .push(format!("{}@{} {}", self.label, secs, message));
                    ctx.trace_note(message);
                }
                Action::Fail(message) => return Err(SimError::Process(message.to_string())),
            }
        }
        Ok(Step::Terminate)
    }
}

pub fn entries(log: &Log) -> Vec<String> {
    log.borrow().clone()
}
