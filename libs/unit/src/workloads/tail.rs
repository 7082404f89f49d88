//! Tail-of-file workload.

use super::STEP_DELAY;
use crate::catalog::UnitFactory;
use crate::control::{Exit, UnitControl};
use crate::unit::MigratableUnit;
use crate::{UnitError, UnitResult};
use async_trait::async_trait;
use portage_io::{StreamState, TransactionalReader, TransactionalWriter};
use serde::{Deserialize, Serialize};

/// Write the last `COUNT` lines of the input file to the output file.
///
/// Arguments: `COUNT INPUT OUTPUT`. Three phases: count all lines, then
/// reopen the input from the start and skip past the head, then emit the
/// tail. The reopen in the middle exercises a stream being discarded and
/// re-created mid-run, which the transactional contract must survive.
pub struct TailUnit {
    arguments: Vec<String>,
    keep: u64,
    total: u64,
    skipped: u64,
    phase: TailPhase,
    input: TransactionalReader,
    output: TransactionalWriter,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
enum TailPhase {
    Count,
    Skip,
    Emit,
}

#[derive(Serialize, Deserialize)]
struct TailState {
    keep: u64,
    total: u64,
    skipped: u64,
    phase: TailPhase,
    input: StreamState,
    output: StreamState,
}

impl TailUnit {
    pub const NAME: &'static str = "tail";

    pub fn new(arguments: Vec<String>) -> UnitResult<Self> {
        let [count, input, output] = arguments.as_slice() else {
            return Err(UnitError::Usage("tail COUNT INPUT OUTPUT".to_string()));
        };
        let keep = count
            .parse()
            .map_err(|_| UnitError::Usage(format!("tail: COUNT must be a number, got '{count}'")))?;
        Ok(Self {
            keep,
            total: 0,
            skipped: 0,
            phase: TailPhase::Count,
            input: TransactionalReader::new(input),
            output: TransactionalWriter::new(output),
            arguments,
        })
    }

    fn restore(arguments: Vec<String>, state: &[u8]) -> UnitResult<Self> {
        let state: TailState = bincode::deserialize(state)?;
        Ok(Self {
            keep: state.keep,
            total: state.total,
            skipped: state.skipped,
            phase: state.phase,
            input: TransactionalReader::restore(state.input),
            output: TransactionalWriter::restore(state.output),
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
impl MigratableUnit for TailUnit {
    fn type_name(&self) -> &'static str {
        Self::NAME
    }

    fn arguments(&self) -> &[String] {
        &self.arguments
    }

    fn snapshot(&self) -> UnitResult<Vec<u8>> {
        Ok(bincode::serialize(&TailState {
            keep: self.keep,
            total: self.total,
            skipped: self.skipped,
            phase: self.phase,
            input: self.input.snapshot(),
            output: self.output.snapshot(),
        })?)
    }

    async fn run(&mut self, ctl: &mut UnitControl) -> Result<Exit, UnitError> {
        loop {
            if let Some(exit) = ctl.interrupted() {
                return Ok(exit);
            }
            match self.phase {
                TailPhase::Count => match self.input.read_line().await? {
                    Some(_) => self.total += 1,
                    None => {
                        // Second pass over the same file from the top.
                        self.input = TransactionalReader::new(self.input.path().to_path_buf());
                        self.phase = TailPhase::Skip;
                    }
                },
                TailPhase::Skip => {
                    if self.skipped < self.total.saturating_sub(self.keep) {
                        self.input.read_line().await?;
                        self.skipped += 1;
                    } else {
                        self.phase = TailPhase::Emit;
                    }
                }
                TailPhase::Emit => match self.input.read_line().await? {
                    Some(line) => self.output.write_line(&line).await?,
                    None => break,
                },
            }
            ctl.pace(STEP_DELAY).await;
        }
        self.output.flush().await?;
        Ok(Exit::Completed)
    }
}
