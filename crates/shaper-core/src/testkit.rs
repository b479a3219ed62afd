//! Test support: scripted command runner
//!
//! Lets tests drive the engine without touching the kernel, recording every
//! invocation and failing at a chosen point in the `tc` sequence.

use std::sync::Mutex;

use async_trait::async_trait;

use crate::command::{CmdOutput, CommandRunner};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedCall {
    pub program: String,
    pub args: Vec<String>,
}

enum Mode {
    AllOk,
    /// Fail every `tc` invocation at or past this index.
    FailFrom { index: usize, stderr: String },
}

pub struct ScriptedRunner {
    mode: Mode,
    /// Reply for `ip` address queries (subnet detection).
    ip_output: CmdOutput,
    calls: Mutex<Vec<RecordedCall>>,
}

impl ScriptedRunner {
    pub fn ok() -> Self {
        Self::with_mode(Mode::AllOk)
    }

    pub fn failing_all() -> Self {
        Self::failing_from(0, "RTNETLINK answers: Operation not permitted")
    }

    /// Succeed the first `index` tc invocations, fail the rest.
    pub fn failing_from(index: usize, stderr: &str) -> Self {
        Self::with_mode(Mode::FailFrom {
            index,
            stderr: stderr.to_string(),
        })
    }

    fn with_mode(mode: Mode) -> Self {
        Self {
            mode,
            ip_output: CmdOutput::ok("2: eth1 inet 10.0.0.1/24 brd 10.0.0.255 scope global"),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn with_ip_output(mut self, output: CmdOutput) -> Self {
        self.ip_output = output;
        self
    }

    /// Every recorded invocation, `ip` queries included.
    pub fn all_calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().expect("runner lock").clone()
    }

    /// Recorded `tc` invocations only.
    pub fn calls(&self) -> Vec<RecordedCall> {
        self.all_calls()
            .into_iter()
            .filter(|c| c.program == "tc")
            .collect()
    }
}

#[async_trait]
impl CommandRunner for ScriptedRunner {
    async fn run(&self, program: &str, args: &[&str]) -> CmdOutput {
        let tc_calls_so_far = {
            let mut calls = self.calls.lock().expect("runner lock");
            let n = calls.iter().filter(|c| c.program == "tc").count();
            calls.push(RecordedCall {
                program: program.to_string(),
                args: args.iter().map(|s| s.to_string()).collect(),
            });
            n
        };

        if program == "ip" {
            return self.ip_output.clone();
        }

        match &self.mode {
            Mode::AllOk => CmdOutput::ok(""),
            Mode::FailFrom { index, stderr } => {
                if tc_calls_so_far >= *index {
                    CmdOutput::failed(stderr.clone())
                } else {
                    CmdOutput::ok("")
                }
            }
        }
    }
}
