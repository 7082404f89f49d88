//! Per-line character-sorting workload.

use super::STEP_DELAY;
use crate::catalog::UnitFactory;
use crate::control::{Exit, UnitControl};
use crate::unit::MigratableUnit;
use crate::{UnitError, UnitResult};
use async_trait::async_trait;
use portage_io::{StreamState, TransactionalReader, TransactionalWriter};
use serde::{Deserialize, Serialize};

/// Sort the characters of each input line and write the result.
///
/// Arguments: `INPUT OUTPUT`. Each line passes through five explicit steps —
/// read, split, sort, join, write — with a safe point between every pair, so
/// a migrated copy resumes mid-record at the exact step it left off. The
/// step marker and the record in flight are unit state for that reason.
pub struct SortUnit {
    arguments: Vec<String>,
    input: TransactionalReader,
    output: TransactionalWriter,
    step: Step,
    line: String,
    chars: Vec<char>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
enum Step {
    Read,
    Split,
    Sort,
    Join,
    Write,
}

#[derive(Serialize, Deserialize)]
struct SortState {
    step: Step,
    line: String,
    chars: Vec<char>,
    input: StreamState,
    output: StreamState,
}

impl SortUnit {
    pub const NAME: &'static str = "sort";

    pub fn new(arguments: Vec<String>) -> UnitResult<Self> {
        let [input, output] = arguments.as_slice() else {
            return Err(UnitError::Usage("sort INPUT OUTPUT".to_string()));
        };
        Ok(Self {
            input: TransactionalReader::new(input),
            output: TransactionalWriter::new(output),
            step: Step::Read,
            line: String::new(),
            chars: Vec::new(),
            arguments,
        })
    }

    fn restore(arguments: Vec<String>, state: &[u8]) -> UnitResult<Self> {
        let state: SortState = bincode::deserialize(state)?;
        Ok(Self {
            input: TransactionalReader::restore(state.input),
            output: TransactionalWriter::restore(state.output),
            step: state.step,
            line: state.line,
            chars: state.chars,
            arguments,
        })
    }

    pub fn factory() -> UnitFactory {
        UnitFactory {
            name: Self::NAME,
            create: |args| Ok(Box::new(Self::new(args)?)),
            restore: |args, state| Ok(Box::new(Self::restore(args, state)?)),
        }
    }
}

#[async_trait]
impl MigratableUnit for SortUnit {
    fn type_name(&self) -> &'static str {
        Self::NAME
    }

    fn arguments(&self) -> &[String] {
        &self.arguments
    }

    fn snapshot(&self) -> UnitResult<Vec<u8>> {
        Ok(bincode::serialize(&SortState {
            step: self.step,
            line: self.line.clone(),
            chars: self.chars.clone(),
            input: self.input.snapshot(),
            output: self.output.snapshot(),
        })?)
    }

    async fn run(&mut self, ctl: &mut UnitControl) -> Result<Exit, UnitError> {
        loop {
            if let Some(exit) = ctl.interrupted() {
                return Ok(exit);
            }
            match self.step {
                Step::Read => match self.input.read_line().await? {
                    Some(line) => {
                        self.line = line;
                        self.step = Step::Split;
                    }
                    None => break,
                },
                Step::Split => {
                    self.chars = self.line.chars().collect();
                    self.step = Step::Sort;
                }
                Step::Sort => {
                    self.chars.sort_unstable();
                    self.step = Step::Join;
                }
                Step::Join => {
                    self.line = self.chars.iter().collect();
                    self.step = Step::Write;
                }
                Step::Write => {
                    self.output.write_line(&self.line).await?;
                    self.step = Step::Read;
                }
            }
            ctl.pace(STEP_DELAY).await;
        }
        self.output.flush().await?;
        Ok(Exit::Completed)
    }
}
