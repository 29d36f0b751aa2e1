//! One debugging session per candidate, driven over GDB/MI.
//!
//! The debugger runs as a subprocess in MI mode. A reader thread pumps its
//! stdout through a channel; the session loop blocks on that channel with a
//! hard per-event timeout and walks the state machine: launch, run, inspect
//! the stop, tear down. Teardown is always kill, then target deletion, then
//! debugger destruction.

use crate::mi::{self, MiRecord};
use std::{
    io::{BufRead, BufReader, Write},
    path::Path,
    process::{Child, Command, Stdio},
    sync::{
        atomic::{AtomicBool, Ordering},
        mpsc::{self, Receiver, RecvTimeoutError},
    },
    thread::{self, JoinHandle},
    time::Duration,
};
use strum::Display;
use thiserror::Error;
use tracing::{debug, warn};

/// Hard per-event timeout of the session loop.
pub const EVENT_TIMEOUT: Duration = Duration::from_secs(360);

static GUARD_HELD: AtomicBool = AtomicBool::new(false);
static SESSION_ACTIVE: AtomicBool = AtomicBool::new(false);

/// Errors that tear down a session; the candidate is discarded.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("the debugger could not be launched")]
    Launch(#[from] std::io::Error),
    #[error("the debugger subsystem is already initialised")]
    GuardHeld,
    #[error("no debugger guard is active")]
    NoGuard,
    #[error("another debugger session is already active")]
    Nested,
}

/// Owns debugger subsystem initialisation for the whole run. Sessions are
/// rejected unless a guard is alive, and guards do not nest.
#[derive(Debug)]
pub struct DebuggerGuard(());

impl DebuggerGuard {
    pub fn init() -> Result<Self, SessionError> {
        if GUARD_HELD.swap(true, Ordering::SeqCst) {
            return Err(SessionError::GuardHeld);
        }
        Ok(Self(()))
    }
}

impl Drop for DebuggerGuard {
    fn drop(&mut self) {
        GUARD_HELD.store(false, Ordering::SeqCst);
    }
}

/// States of one debugging session.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Display)]
pub enum SessionState {
    Invalid,
    Launching,
    Running,
    Stopped,
    Crashed,
    Exited,
    Detached,
    Unloaded,
    #[strum(serialize = "Timed Out")]
    TimedOut,
}

impl SessionState {
    /// Whether the session is over and the debugger must be torn down.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            Self::Crashed | Self::Exited | Self::Detached | Self::Unloaded | Self::TimedOut
        )
    }
}

/// Confirmation parameters for one candidate.
#[derive(Clone, Debug)]
pub struct StopExpectation<'a> {
    /// File name of the candidate source the executable was built from.
    pub source_file: &'a str,
    /// Adjusted potential error lines for this candidate.
    pub error_lines: &'a [u32],
    /// Case-insensitive substring expected in the stop status; empty
    /// matches any stop.
    pub message: &'a str,
}

/// What one session observed.
#[derive(Debug, Default)]
pub struct SessionOutcome {
    /// Whether the stop matched the expectation.
    pub confirmed: bool,
    /// The state the session ended in.
    pub final_state: Option<SessionState>,
    /// Console, log, and debuggee output accumulated over the session.
    pub transcript: String,
}

/// Events the state machine consumes, decoded from MI records.
#[derive(Debug)]
enum SessionEvent {
    SignalStop { signal: String, meaning: String, frame: Option<(String, u32)> },
    OtherStop,
    Exited,
    CrashedExit,
    Unloaded,
    Text(String),
    Ignored,
}

fn decode(record: MiRecord) -> SessionEvent {
    match record {
        MiRecord::ExecAsync { class, results } if class == "stopped" => {
            match mi::lookup_str(&results, "reason") {
                Some("signal-received") => SessionEvent::SignalStop {
                    signal: mi::lookup_str(&results, "signal-name").unwrap_or("?").to_owned(),
                    meaning: mi::lookup_str(&results, "signal-meaning")
                        .unwrap_or_default()
                        .to_owned(),
                    frame: mi::stopped_frame(&results),
                },
                Some("exited-signalled") => SessionEvent::CrashedExit,
                Some(reason) if reason.starts_with("exited") => SessionEvent::Exited,
                _ => SessionEvent::OtherStop,
            }
        }
        MiRecord::NotifyAsync { class, .. } if class == "thread-group-exited" => {
            SessionEvent::Exited
        }
        MiRecord::NotifyAsync { class, .. } if class == "library-unloaded" => {
            SessionEvent::Unloaded
        }
        MiRecord::Result { class, results } if class == "error" => {
            let message = mi::lookup_str(&results, "msg").unwrap_or_default();
            SessionEvent::Text(format!("debugger error: {message}"))
        }
        MiRecord::Stream(text) => SessionEvent::Text(text),
        MiRecord::Target(text) => SessionEvent::Text(text),
        _ => SessionEvent::Ignored,
    }
}

/// Clears the session-active flag even on early returns.
struct ActiveSession;

impl ActiveSession {
    fn acquire() -> Result<Self, SessionError> {
        if !GUARD_HELD.load(Ordering::SeqCst) {
            return Err(SessionError::NoGuard);
        }
        if SESSION_ACTIVE.swap(true, Ordering::SeqCst) {
            return Err(SessionError::Nested);
        }
        Ok(Self)
    }
}

impl Drop for ActiveSession {
    fn drop(&mut self) {
        SESSION_ACTIVE.store(false, Ordering::SeqCst);
    }
}

/// Runs the executable under the debugger and reports whether its stop
/// matches the expectation.
pub fn run_session(
    executable: &Path,
    working_dir: &Path,
    expectation: &StopExpectation<'_>,
) -> Result<SessionOutcome, SessionError> {
    let _active = ActiveSession::acquire()?;

    debug!("debugger target creation for {}", executable.display());
    let mut child = Command::new("gdb")
        .arg("--interpreter=mi2")
        .arg("--nx")
        .arg("--quiet")
        .arg(executable)
        .current_dir(working_dir)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()?;

    let stdout = child.stdout.take().expect("stdout was piped");
    let (sender, receiver) = mpsc::channel();
    let mi_reader: JoinHandle<()> = {
        let sender = sender.clone();
        thread::spawn(move || {
            for line in BufReader::new(stdout).lines() {
                let Ok(line) = line else { break };
                if sender.send(mi::parse_line(&line)).is_err() {
                    break;
                }
            }
        })
    };

    // The debuggee inherits the debugger's stderr; assertion messages and
    // abort notices arrive there, and the confirmation test matches against
    // them.
    let stderr = child.stderr.take().expect("stderr was piped");
    let stderr_reader: JoinHandle<()> = thread::spawn(move || {
        for line in BufReader::new(stderr).lines() {
            let Ok(line) = line else { break };
            if sender.send(MiRecord::Target(line)).is_err() {
                break;
            }
        }
    });

    let outcome = drive(&mut child, &receiver, expectation);

    // Kill the process, delete the target, destroy the debugger. Sending
    // the exit command is best-effort; the kill below is not.
    if let Some(stdin) = child.stdin.as_mut() {
        let _ = stdin.write_all(b"-gdb-exit\n");
    }
    let _ = child.kill();
    let _ = child.wait();
    let _ = mi_reader.join();
    let _ = stderr_reader.join();

    Ok(outcome)
}

fn drive(
    child: &mut Child,
    receiver: &Receiver<MiRecord>,
    expectation: &StopExpectation<'_>,
) -> SessionOutcome {
    let mut outcome = SessionOutcome::default();
    let mut state = SessionState::Launching;
    let mut signal_frame: Option<(String, u32)> = None;

    if send(child, "-exec-run").is_err() {
        outcome.final_state = Some(SessionState::Invalid);
        return outcome;
    }
    state = transition(state, SessionState::Running);

    loop {
        let record = match receiver.recv_timeout(EVENT_TIMEOUT) {
            Ok(record) => record,
            Err(RecvTimeoutError::Timeout) => {
                warn!(
                    "no debugger event in the last {} seconds, killing the process",
                    EVENT_TIMEOUT.as_secs()
                );
                state = transition(state, SessionState::TimedOut);
                break;
            }
            Err(RecvTimeoutError::Disconnected) => {
                state = transition(state, SessionState::Detached);
                break;
            }
        };

        match decode(record) {
            SessionEvent::SignalStop { signal, meaning, frame } => {
                state = transition(state, SessionState::Stopped);

                let status = format!("stopped by signal {signal}: {meaning}");
                debug!("{status}");
                outcome.transcript.push_str(&status);
                outcome.transcript.push('\n');

                if let Some((file, line)) = frame {
                    debug!("frame {file}:{line}");
                    if confirm(expectation, &file, line, &outcome.transcript) {
                        outcome.confirmed = true;
                    }
                    signal_frame = Some((file, line));
                }

                // Resume; delivering the signal terminates the debuggee and
                // the exit event ends the session.
                if send(child, "-exec-continue").is_err() {
                    state = transition(state, SessionState::Crashed);
                    break;
                }
            }
            SessionEvent::OtherStop => {
                state = transition(state, SessionState::Stopped);
                if send(child, "-exec-continue").is_err() {
                    state = transition(state, SessionState::Crashed);
                    break;
                }
                state = transition(state, SessionState::Running);
            }
            SessionEvent::Exited => {
                state = transition(state, SessionState::Exited);
                break;
            }
            SessionEvent::CrashedExit => {
                state = transition(state, SessionState::Crashed);
                break;
            }
            SessionEvent::Unloaded => {
                state = transition(state, SessionState::Unloaded);
                break;
            }
            SessionEvent::Text(text) => {
                outcome.transcript.push_str(&text);
                if !text.ends_with('\n') {
                    outcome.transcript.push('\n');
                }
            }
            SessionEvent::Ignored => {}
        }
    }

    // The debuggee's stderr races the stop event; drain what is already
    // queued and retry the message match with the complete transcript.
    while let Ok(record) = receiver.try_recv() {
        if let SessionEvent::Text(text) = decode(record) {
            outcome.transcript.push_str(&text);
            outcome.transcript.push('\n');
        }
    }
    if !outcome.confirmed {
        if let Some((file, line)) = &signal_frame {
            outcome.confirmed = confirm(expectation, file, *line, &outcome.transcript);
        }
    }

    outcome.final_state = Some(state);
    outcome
}

fn transition(from: SessionState, to: SessionState) -> SessionState {
    if from != to {
        debug!("process state changed to: {to}");
    }
    to
}

fn send(child: &mut Child, command: &str) -> std::io::Result<()> {
    let stdin = child.stdin.as_mut().expect("stdin was piped");
    stdin.write_all(command.as_bytes())?;
    stdin.write_all(b"\n")?;
    stdin.flush()
}

/// The confirmation test: the stop must be in the candidate's own source,
/// on one of its adjusted error lines, with the expected message somewhere
/// in the session transcript.
fn confirm(expectation: &StopExpectation<'_>, file: &str, line: u32, transcript: &str) -> bool {
    let frame_name = Path::new(file).file_name();
    let source_name = Path::new(expectation.source_file).file_name();
    if frame_name.is_none() || frame_name != source_name {
        return false;
    }

    if !expectation.error_lines.contains(&line) {
        return false;
    }

    expectation.message.is_empty()
        || transcript.to_lowercase().contains(&expectation.message.to_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn expectation<'a>(lines: &'a [u32], message: &'a str) -> StopExpectation<'a> {
        StopExpectation { source_file: "3_example.c", error_lines: lines, message }
    }

    #[test]
    fn confirmation_requires_file_line_and_message() {
        let lines = [4, 5];
        let expect = expectation(&lines, "segmentation");
        let transcript = "stopped by signal SIGSEGV: Segmentation fault\n";

        assert!(confirm(&expect, "/work/temp/3_example.c", 4, transcript));
        assert!(confirm(&expect, "3_example.c", 5, transcript));
        // Wrong file, wrong line, missing message.
        assert!(!confirm(&expect, "other.c", 4, transcript));
        assert!(!confirm(&expect, "3_example.c", 6, transcript));
        assert!(!confirm(&expect, "3_example.c", 4, "stopped by signal SIGINT\n"));
    }

    #[test]
    fn empty_message_matches_any_stop() {
        let lines = [4];
        let expect = expectation(&lines, "");
        assert!(confirm(&expect, "3_example.c", 4, ""));
    }

    #[test]
    fn message_matching_is_case_insensitive() {
        let lines = [4];
        let expect = expectation(&lines, "SEGMENTATION");
        assert!(confirm(&expect, "3_example.c", 4, "signal: segmentation fault"));
    }

    #[test]
    fn signal_stops_decode_with_frames() {
        let record = mi::parse_line(
            r#"*stopped,reason="signal-received",signal-name="SIGSEGV",signal-meaning="Segmentation fault",frame={file="1_x.c",line="7"}"#,
        );
        match decode(record) {
            SessionEvent::SignalStop { signal, meaning, frame } => {
                assert_eq!(signal, "SIGSEGV");
                assert_eq!(meaning, "Segmentation fault");
                assert_eq!(frame, Some(("1_x.c".to_owned(), 7)));
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn exit_records_decode_as_terminal_events() {
        let exited = decode(mi::parse_line(r#"*stopped,reason="exited-normally""#));
        assert!(matches!(exited, SessionEvent::Exited));

        let with_code = decode(mi::parse_line(r#"*stopped,reason="exited",exit-code="01""#));
        assert!(matches!(with_code, SessionEvent::Exited));

        let group = decode(mi::parse_line(r#"=thread-group-exited,id="i1""#));
        assert!(matches!(group, SessionEvent::Exited));
    }

    #[test]
    fn breakpoint_stops_are_observational() {
        let record = mi::parse_line(r#"*stopped,reason="breakpoint-hit",bkptno="1""#);
        assert!(matches!(decode(record), SessionEvent::OtherStop));
    }

    #[test]
    fn terminal_states() {
        assert!(SessionState::Exited.is_terminal());
        assert!(SessionState::Crashed.is_terminal());
        assert!(SessionState::TimedOut.is_terminal());
        assert!(!SessionState::Running.is_terminal());
        assert!(!SessionState::Stopped.is_terminal());
        assert_eq!(SessionState::TimedOut.to_string(), "Timed Out");
    }

    #[test]
    fn guard_lifecycle_gates_sessions() {
        // One test exercises the whole lifecycle; the flags are globals.
        assert!(matches!(ActiveSession::acquire(), Err(SessionError::NoGuard)));

        let guard = DebuggerGuard::init().unwrap();
        assert!(matches!(DebuggerGuard::init(), Err(SessionError::GuardHeld)));

        let session = ActiveSession::acquire().unwrap();
        assert!(matches!(ActiveSession::acquire(), Err(SessionError::Nested)));
        drop(session);

        let reacquired = ActiveSession::acquire().unwrap();
        drop(reacquired);
        drop(guard);

        assert!(matches!(ActiveSession::acquire(), Err(SessionError::NoGuard)));
        let again = DebuggerGuard::init().unwrap();
        drop(again);
    }
}
