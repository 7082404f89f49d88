//! Line-filtering workload.

use super::STEP_DELAY;
use crate::catalog::UnitFactory;
use crate::control::{Exit, UnitControl};
use crate::unit::MigratableUnit;
use crate::{UnitError, UnitResult};
use async_trait::async_trait;
use portage_io::{StreamState, TransactionalReader, TransactionalWriter};
use serde::{Deserialize, Serialize};

/// Copy every input line containing the query string to the output file.
///
/// Arguments: `QUERY INPUT OUTPUT`. One line is one step; suspension lands
/// between lines, so the only state worth carrying is the stream offsets.
pub struct GrepUnit {
    arguments: Vec<String>,
    query: String,
    input: TransactionalReader,
    output: TransactionalWriter,
}

#[derive(Serialize, Deserialize)]
struct GrepState {
    input: StreamState,
    output: StreamState,
}

impl GrepUnit {
    pub const NAME: &'static str = "grep";

    pub fn new(arguments: Vec<String>) -> UnitResult<Self> {
        let [query, input, output] = arguments.as_slice() else {
            return Err(UnitError::Usage("grep QUERY INPUT OUTPUT".to_string()));
        };
        Ok(Self {
            query: query.clone(),
            input: TransactionalReader::new(input),
            output: TransactionalWriter::new(output),
            arguments,
        })
    }

    fn restore(arguments: Vec<String>, state: &[u8]) -> UnitResult<Self> {
        let state: GrepState = bincode::deserialize(state)?;
        let [query, ..] = arguments.as_slice() else {
            return Err(UnitError::Usage("grep QUERY INPUT OUTPUT".to_string()));
        };
        Ok(Self {
            query: query.clone(),
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
impl MigratableUnit for GrepUnit {
    fn type_name(&self) -> &'static str {
        Self::NAME
    }

    fn arguments(&self) -> &[String] {
        &self.arguments
    }

    fn snapshot(&self) -> UnitResult<Vec<u8>> {
        Ok(bincode::serialize(&GrepState {
            input: self.input.snapshot(),
            output: self.output.snapshot(),
        })?)
    }

    async fn run(&mut self, ctl: &mut UnitControl) -> Result<Exit, UnitError> {
        loop {
            if let Some(exit) = ctl.interrupted() {
                return Ok(exit);
            }
            let Some(line) = self.input.read_line().await? else {
                break;
            };
            if line.contains(&self.query) {
                self.output.write_line(&line).await?;
            }
            ctl.pace(STEP_DELAY).await;
        }
        self.output.flush().await?;
        Ok(Exit::Completed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::control::Directive;
    use tempfile::tempdir;
    use tokio::sync::watch;

    #[tokio::test]
    async fn filters_matching_lines() {
        let dir = tempdir().unwrap();
        let input = dir.path().join("in.txt");
        let output = dir.path().join("out.txt");
        std::fs::write(&input, "foo\nbar\nfoobar\n").unwrap();

        let mut unit = GrepUnit::new(vec![
            "foo".to_string(),
            input.display().to_string(),
            output.display().to_string(),
        ])
        .unwrap();

        let (_tx, rx) = watch::channel(Directive::Run);
        let mut ctl = UnitControl::new(rx);
        let exit = unit.run(&mut ctl).await.unwrap();

        assert_eq!(exit, Exit::Completed);
        assert_eq!(std::fs::read_to_string(&output).unwrap(), "foo\nfoobar\n");
    }

    #[tokio::test]
    async fn suspends_at_line_boundary_and_resumes_from_snapshot() {
        let dir = tempdir().unwrap();
        let input = dir.path().join("in.txt");
        let output = dir.path().join("out.txt");
        let body: String = (0..40).map(|i| format!("match-{i}\n")).collect();
        std::fs::write(&input, &body).unwrap();

        let mut unit = GrepUnit::new(vec![
            "match".to_string(),
            input.display().to_string(),
            output.display().to_string(),
        ])
        .unwrap();

        let (tx, rx) = watch::channel(Directive::Run);
        let runner = tokio::spawn(async move {
            let mut ctl = UnitControl::new(rx);
            let exit = unit.run(&mut ctl).await.unwrap();
            (unit, exit)
        });
        tokio::time::sleep(STEP_DELAY * 4).await;
        tx.send_replace(Directive::Suspend);
        let (unit, exit) = runner.await.unwrap();
        assert_eq!(exit, Exit::Suspended);

        // Continue on a rebuilt copy, as the destination host would.
        let snapshot = unit.snapshot().unwrap();
        drop(unit);
        let mut restored = GrepUnit::restore(unit_args(&input, &output), &snapshot).unwrap();
        let (_tx, rx) = watch::channel(Directive::Run);
        let mut ctl = UnitControl::new(rx);
        assert_eq!(restored.run(&mut ctl).await.unwrap(), Exit::Completed);

        assert_eq!(std::fs::read_to_string(&output).unwrap(), body);
    }

    fn unit_args(input: &std::path::Path, output: &std::path::Path) -> Vec<String> {
        vec![
            "match".to_string(),
            input.display().to_string(),
            output.display().to_string(),
        ]
    }
}
