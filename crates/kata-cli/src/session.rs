//! The interactive session: one challenge attempt driven by keypresses.
//!
//! ```text
//! Running ──space──▶ Running (visible tests)
//!    │──t──────────▶ Running (elapsed time)
//!    │──other──────▶ Running (command menu)
//!    │──enter──────▶ Submitting ──▶ Exit::Submitted
//!    └──x / c / EOF─▶ Exit::Quit
//! ```

use std::io::{self, Write};
use std::path::PathBuf;
use std::time::Instant;

use kata_engine::{Challenge, ProgressEvent, ProgressSink, Sandbox, SessionReport, TestEngine};
use tracing::{info, warn};

use crate::keys::{Key, KeySource};
use crate::render;

/// How a session ended. Both map to exit status 0.
#[derive(Debug, Clone, PartialEq)]
pub enum Exit {
    Submitted(SessionReport),
    Quit,
}

/// Supplies the current solution text on each test request.
pub trait SolutionSource {
    fn read(&mut self) -> io::Result<String>;

    /// Where the user edits the solution, for display.
    fn describe(&self) -> String;
}

/// Re-reads a working file on every request.
#[derive(Debug, Clone)]
pub struct FileSolution {
    path: PathBuf,
}

impl FileSolution {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl SolutionSource for FileSolution {
    fn read(&mut self) -> io::Result<String> {
        std::fs::read_to_string(&self.path)
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}

/// Line-oriented output terminated with `\r\n`, correct in raw mode.
pub struct Console<W: Write> {
    out: W,
}

impl<W: Write> Console<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn line(&mut self, text: &str) -> io::Result<()> {
        write!(self.out, "{text}\r\n")?;
        self.out.flush()
    }

    pub fn lines<I, S>(&mut self, lines: I) -> io::Result<()>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for line in lines {
            self.line(line.as_ref())?;
        }
        Ok(())
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> ProgressSink for Console<W> {
    fn event(&mut self, event: ProgressEvent) {
        if let Some(line) = render::event_line(&event) {
            if let Err(err) = self.line(&line) {
                warn!(%err, "failed to write progress");
            }
        }
    }
}

/// State of one attempt.
#[derive(Debug, Clone)]
pub struct Session {
    pub challenge: Challenge,
    pub started: Instant,
    pub report: Option<SessionReport>,
}

impl Session {
    pub fn new(challenge: Challenge) -> Self {
        Self {
            challenge,
            started: Instant::now(),
            report: None,
        }
    }
}

pub struct SessionController<K, S, W: Write> {
    engine: TestEngine,
    session: Session,
    keys: K,
    solution: S,
    console: Console<W>,
}

impl<K, S, W> SessionController<K, S, W>
where
    K: KeySource,
    S: SolutionSource,
    W: Write,
{
    pub fn new(engine: TestEngine, challenge: Challenge, keys: K, solution: S, out: W) -> Self {
        Self {
            engine,
            session: Session::new(challenge),
            keys,
            solution,
            console: Console::new(out),
        }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Run until the user submits or quits. Suspends only while waiting for
    /// the next key.
    pub async fn run(&mut self) -> io::Result<Exit> {
        info!(challenge = %self.session.challenge.id, "session started");
        let intro = render::intro(&self.session.challenge, &self.solution.describe());
        self.console.lines(intro)?;

        loop {
            let Some(key) = self.keys.next_key().await else {
                info!("input closed, leaving session");
                return Ok(Exit::Quit);
            };
            match key {
                Key::Space => {
                    self.run_tests(false)?;
                }
                Key::Enter => {
                    let elapsed = self.session.started.elapsed();
                    let report = self.run_tests(true)?;
                    let recommended = self.session.challenge.recommended_time_ms;
                    self.console.line(&render::time(elapsed, recommended))?;
                    return Ok(match report {
                        Some(report) => {
                            info!(pass = report.pass, "submitted");
                            Exit::Submitted(report)
                        }
                        None => {
                            info!("submission had no readable solution, leaving session");
                            Exit::Quit
                        }
                    });
                }
                Key::Char('t') => {
                    let line = render::time(
                        self.session.started.elapsed(),
                        self.session.challenge.recommended_time_ms,
                    );
                    self.console.line(&line)?;
                }
                Key::Char('x') | Key::Char('c') => {
                    let line = render::time(self.session.started.elapsed(), None);
                    self.console.line(&line)?;
                    info!("quit");
                    return Ok(Exit::Quit);
                }
                Key::Char(_) | Key::Other => {
                    self.console.lines(render::unknown_command())?;
                }
            }
        }
    }

    /// One test pass. `None` when the solution could not be read.
    fn run_tests(&mut self, include_hidden: bool) -> io::Result<Option<SessionReport>> {
        let solution = match self.solution.read() {
            Ok(text) => text,
            Err(err) => {
                warn!(%err, "failed to read solution");
                let message = format!("could not read {}: {err}", self.solution.describe());
                self.console.line(&message)?;
                return Ok(None);
            }
        };
        if let Some(excerpt) = Sandbox::syntax_excerpt(&solution) {
            self.console.lines(excerpt.lines())?;
        }
        let report = self.engine.run(
            &self.session.challenge,
            &solution,
            include_hidden,
            &mut self.console,
        );
        self.console.line(&render::summary(&report))?;
        self.session.report = Some(report.clone());
        Ok(Some(report))
    }

    pub fn into_output(self) -> W {
        self.console.into_inner()
    }
}
