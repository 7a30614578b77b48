// Copyright (C) 2026 Michael Wilson <mike@mdwn.dev>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//
//! Line commands for driving a live sampler from a terminal.
use std::fmt::Write;
use std::path::PathBuf;

use tracing::info;

use crate::param::{self, ParamRef};
use crate::sampler::{LoadRequest, LoadWorker, SamplerError, SamplerHandle};
use crate::state::StateError;

/// Error types for console commands.
#[derive(Debug, thiserror::Error)]
pub enum ConsoleError {
    #[error("Unknown command '{0}'")]
    UnknownCommand(String),

    #[error("Malformed arguments for '{command}': {reason}")]
    BadArguments {
        command: &'static str,
        reason: String,
    },

    #[error("No parameter at '{0}'")]
    NoSuchParam(String),

    #[error("No state file configured")]
    NoStateFile,

    #[error(transparent)]
    Sampler(#[from] SamplerError),

    #[error(transparent)]
    State(#[from] StateError),
}

#[derive(Debug, Clone, PartialEq)]
pub enum ConsoleCommand {
    Trigger(usize),
    Stop(usize),
    StopAll,
    Select(usize),
    Load(String),
    Set { path: String, value: f64 },
    Nudge { path: String, steps: i32 },
    /// Lists the selected voice's parameters.
    Show,
    Save,
    Help,
    Quit,
}

impl ConsoleCommand {
    /// Parses one line. Parameter paths may contain spaces, so `set` and
    /// `nudge` take `<path>=<value>`.
    pub fn parse(line: &str) -> Result<ConsoleCommand, ConsoleError> {
        let line = line.trim();
        let (command, rest) = match line.split_once(char::is_whitespace) {
            Some((command, rest)) => (command, rest.trim()),
            None => (line, ""),
        };
        match command {
            "t" | "trigger" => Ok(ConsoleCommand::Trigger(parse_voice("trigger", rest)?)),
            "s" | "stop" => Ok(ConsoleCommand::Stop(parse_voice("stop", rest)?)),
            "x" | "stop-all" => Ok(ConsoleCommand::StopAll),
            "v" | "select" => Ok(ConsoleCommand::Select(parse_voice("select", rest)?)),
            "l" | "load" => {
                if rest.is_empty() {
                    return Err(ConsoleError::BadArguments {
                        command: "load",
                        reason: "expected a sample name".to_string(),
                    });
                }
                Ok(ConsoleCommand::Load(rest.to_string()))
            }
            "set" => {
                let (path, value) = split_assignment("set", rest)?;
                let value = value.parse::<f64>().map_err(|e| ConsoleError::BadArguments {
                    command: "set",
                    reason: e.to_string(),
                })?;
                Ok(ConsoleCommand::Set { path, value })
            }
            "n" | "nudge" => {
                let (path, steps) = split_assignment("nudge", rest)?;
                let steps = steps.parse::<i32>().map_err(|e| ConsoleError::BadArguments {
                    command: "nudge",
                    reason: e.to_string(),
                })?;
                Ok(ConsoleCommand::Nudge { path, steps })
            }
            "p" | "show" => Ok(ConsoleCommand::Show),
            "save" => Ok(ConsoleCommand::Save),
            "h" | "help" | "?" => Ok(ConsoleCommand::Help),
            "q" | "quit" => Ok(ConsoleCommand::Quit),
            other => Err(ConsoleError::UnknownCommand(other.to_string())),
        }
    }
}

fn parse_voice(command: &'static str, arg: &str) -> Result<usize, ConsoleError> {
    arg.parse::<usize>()
        .map_err(|e| ConsoleError::BadArguments {
            command,
            reason: format!("expected a voice index: {}", e),
        })
}

fn split_assignment(command: &'static str, arg: &str) -> Result<(String, String), ConsoleError> {
    match arg.rsplit_once('=') {
        Some((path, value)) if !path.trim().is_empty() => {
            Ok((path.trim().to_string(), value.trim().to_string()))
        }
        _ => Err(ConsoleError::BadArguments {
            command,
            reason: "expected <path>=<value>".to_string(),
        }),
    }
}

const HELP: &str = "\
t <voice>          trigger a voice
s <voice>          stop a voice
x                  stop every voice
v <voice>          select the voice to show
l <name>           load <samples_dir>/<name>.wav
set <path>=<value> set a parameter, e.g. set Voice 0/speed=0.5
n <path>=<steps>   nudge a parameter, e.g. n Voice 0/mode=1
p                  show the selected voice
save               write the state file
q                  quit";

/// Executes console commands against a live sampler.
pub struct Console {
    handle: SamplerHandle,
    worker: LoadWorker,
    state_file: Option<PathBuf>,
}

impl Console {
    pub fn new(handle: SamplerHandle, worker: LoadWorker, state_file: Option<PathBuf>) -> Self {
        Self {
            handle,
            worker,
            state_file,
        }
    }

    /// Runs a command and returns the text to show.
    pub fn execute(&self, command: &ConsoleCommand) -> Result<String, ConsoleError> {
        match command {
            ConsoleCommand::Trigger(voice) => {
                self.handle.trigger(*voice)?;
                Ok(String::new())
            }
            ConsoleCommand::Stop(voice) => {
                self.handle.stop(*voice)?;
                Ok(String::new())
            }
            ConsoleCommand::StopAll => {
                self.handle.stop_all();
                Ok(String::new())
            }
            ConsoleCommand::Select(voice) => {
                self.handle.select_voice(*voice)?;
                Ok(self.show())
            }
            ConsoleCommand::Load(name) => {
                self.worker.request(LoadRequest::Named(name.clone()))?;
                Ok(format!("Loading {}...", name))
            }
            ConsoleCommand::Set { path, value } => {
                let param = self.find(path)?;
                param.set_f64(*value);
                Ok(format!("{} = {}", path, param.display()))
            }
            ConsoleCommand::Nudge { path, steps } => {
                let param = self.find(path)?;
                param.nudge(*steps);
                Ok(format!("{} = {}", path, param.display()))
            }
            ConsoleCommand::Show => Ok(self.show()),
            ConsoleCommand::Save => {
                let state_file = self.state_file.as_ref().ok_or(ConsoleError::NoStateFile)?;
                self.handle.snapshot().save(state_file)?;
                info!(path = ?state_file, "Saved sampler state");
                Ok(format!("Saved {}", state_file.display()))
            }
            ConsoleCommand::Help => Ok(HELP.to_string()),
            ConsoleCommand::Quit => Ok(String::new()),
        }
    }

    /// Drains finished loads into printable lines.
    pub fn poll_loads(&self) -> Vec<String> {
        self.worker
            .outcomes()
            .try_iter()
            .map(|outcome| match outcome.result {
                Ok(report) => format!(
                    "Loaded {} ({} frames, {:.2}s)",
                    report.name,
                    report.frames,
                    report.duration.as_secs_f64()
                ),
                Err(e) => e.to_string(),
            })
            .collect()
    }

    /// Writes the state file, if one is configured.
    pub fn save_if_configured(&self) -> Result<(), StateError> {
        match &self.state_file {
            Some(state_file) => self.handle.snapshot().save(state_file),
            None => Ok(()),
        }
    }

    fn find(&self, path: &str) -> Result<&dyn ParamRef, ConsoleError> {
        param::find(self.handle.params(), path)
            .ok_or_else(|| ConsoleError::NoSuchParam(path.to_string()))
    }

    fn show(&self) -> String {
        let index = self.handle.selected_voice();
        let mut text = String::new();
        let sample = self.handle.sample_name();
        let _ = writeln!(
            text,
            "Sample: {} ({} frames)",
            sample.as_deref().unwrap_or("<none>"),
            self.handle.waveform().len()
        );
        if let Ok(voice) = self.handle.voice(index) {
            let _ = writeln!(
                text,
                "Voice {}: in={} out={} speed={:.2} mode={}",
                index,
                voice.in_point.get(),
                voice.out_point.get(),
                voice.speed.get(),
                voice.mode().label()
            );
        }
        if let Ok(progress) = self.handle.play_progress(index) {
            if progress >= 0.0 {
                let _ = write!(text, "Progress: {:.0}%", progress * 100.0);
            } else {
                let _ = write!(text, "Progress: idle");
            }
        }
        text
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use crate::config::SamplerConfig;
    use crate::sampler::{PlayMode, Sampler};
    use crate::state::SamplerState;
    use crate::testutil::write_mono_wav;

    use super::*;

    #[test]
    fn test_parse() {
        assert_eq!(ConsoleCommand::parse("t 3").unwrap(), ConsoleCommand::Trigger(3));
        assert_eq!(ConsoleCommand::parse("  stop 12 ").unwrap(), ConsoleCommand::Stop(12));
        assert_eq!(ConsoleCommand::parse("x").unwrap(), ConsoleCommand::StopAll);
        assert_eq!(
            ConsoleCommand::parse("l snare rim").unwrap(),
            ConsoleCommand::Load("snare rim".to_string())
        );
        assert_eq!(
            ConsoleCommand::parse("set Voice 0/speed=0.5").unwrap(),
            ConsoleCommand::Set {
                path: "Voice 0/speed".to_string(),
                value: 0.5
            }
        );
        assert_eq!(
            ConsoleCommand::parse("n Voice 2/mode = -1").unwrap(),
            ConsoleCommand::Nudge {
                path: "Voice 2/mode".to_string(),
                steps: -1
            }
        );
        assert_eq!(ConsoleCommand::parse("q").unwrap(), ConsoleCommand::Quit);
    }

    #[test]
    fn test_parse_errors() {
        assert!(matches!(
            ConsoleCommand::parse("dance"),
            Err(ConsoleError::UnknownCommand(_))
        ));
        assert!(matches!(
            ConsoleCommand::parse("t three"),
            Err(ConsoleError::BadArguments {
                command: "trigger",
                ..
            })
        ));
        assert!(ConsoleCommand::parse("l").is_err());
        assert!(ConsoleCommand::parse("set Voice 0/speed").is_err());
        assert!(ConsoleCommand::parse("set =1").is_err());
        assert!(ConsoleCommand::parse("n Voice 0/mode=up").is_err());
    }

    fn console(state_file: Option<PathBuf>) -> (tempfile::TempDir, SamplerHandle, Console) {
        let tempdir = tempfile::tempdir().unwrap();
        write_mono_wav(&tempdir.path().join("clap.wav"), vec![0.25; 400], 100).unwrap();
        let config = SamplerConfig::default()
            .with_sample_rate(100)
            .with_max_sample_seconds(10)
            .with_samples_dir(tempdir.path());
        let (handle, _engine) = Sampler::build(&config).unwrap();
        let worker = LoadWorker::start(handle.clone()).unwrap();
        let console = Console::new(handle.clone(), worker, state_file);
        (tempdir, handle, console)
    }

    #[test]
    fn test_execute_params() {
        let (_tempdir, handle, console) = console(None);
        let reply = console
            .execute(&ConsoleCommand::parse("set Voice 1/speed=9").unwrap())
            .unwrap();
        assert_eq!(reply, "Voice 1/speed = 5.00");
        assert_eq!(handle.voice(1).unwrap().speed.get(), 5.0);

        console
            .execute(&ConsoleCommand::parse("n Voice 1/mode=-1").unwrap())
            .unwrap();
        assert_eq!(handle.voice(1).unwrap().mode(), PlayMode::Backward);

        assert!(matches!(
            console.execute(&ConsoleCommand::parse("set Voice 99/speed=1").unwrap()),
            Err(ConsoleError::NoSuchParam(_))
        ));
        assert!(matches!(
            console.execute(&ConsoleCommand::Trigger(30)),
            Err(ConsoleError::Sampler(SamplerError::NoSuchVoice(30)))
        ));
        assert!(matches!(
            console.execute(&ConsoleCommand::Save),
            Err(ConsoleError::NoStateFile)
        ));
    }

    #[test]
    fn test_execute_load_and_show() {
        let (_tempdir, handle, console) = console(None);
        console.execute(&ConsoleCommand::Load("clap".to_string())).unwrap();
        crate::testutil::eventually(
            || handle.sample_name().as_deref() == Some("clap"),
            "sample never loaded",
        );
        let mut lines = Vec::new();
        for _ in 0..50 {
            lines.extend(console.poll_loads());
            if !lines.is_empty() {
                break;
            }
            std::thread::sleep(Duration::from_millis(10));
        }
        assert_eq!(lines, vec!["Loaded clap (400 frames, 4.00s)".to_string()]);

        let shown = console.execute(&ConsoleCommand::Select(3)).unwrap();
        assert!(shown.contains("Sample: clap (400 frames)"));
        assert!(shown.contains("Voice 3: in=0 out=399 speed=1.00 mode=->"));
        assert!(shown.contains("Progress: idle"));
    }

    #[test]
    fn test_save() {
        let statedir = tempfile::tempdir().unwrap();
        let state_file = statedir.path().join("state.yaml");
        let (_tempdir, handle, console) = console(Some(state_file.clone()));
        handle.voice(0).unwrap().speed.set(0.25);
        console.execute(&ConsoleCommand::Save).unwrap();

        let state = SamplerState::load(&state_file).unwrap();
        let speed = state
            .params
            .iter()
            .find(|record| record.path == "Voice 0/speed")
            .unwrap();
        assert_eq!(speed.value, 0.25);
    }
}
