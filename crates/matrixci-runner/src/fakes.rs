//! In-memory step executor for tests.
//!
//! `ScriptedExecutor` runs nothing: each call is matched against scripted
//! rules and answered with the scripted behaviour, and every call is
//! recorded so tests can assert which steps were (and were not) invoked.

use crate::runner::{StepContext, StepExecutor, StepOutcome};
use async_trait::async_trait;
use matrixci_core::{Error, Result};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// Scripted answer for a step.
#[derive(Debug, Clone)]
pub enum Scripted {
    Exit(i32),
    /// Sleep, then exit with the code.
    Sleep(Duration, i32),
    /// Never finish.
    Hang,
    /// Fail to launch.
    Error(String),
}

#[derive(Debug, Clone)]
struct Rule {
    job_contains: Option<String>,
    step: String,
    behaviour: Scripted,
}

/// A recorded executor call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Call {
    pub job: String,
    pub step: String,
}

#[derive(Debug, Default)]
pub struct ScriptedExecutor {
    rules: Vec<Rule>,
    default_delay: Option<Duration>,
    calls: Mutex<Vec<Call>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl ScriptedExecutor {
    /// Every step exits 0 unless a rule says otherwise.
    pub fn new() -> Self {
        Self::default()
    }

    /// Script `step` in every job.
    pub fn on_step(mut self, step: &str, behaviour: Scripted) -> Self {
        self.rules.push(Rule {
            job_contains: None,
            step: step.to_string(),
            behaviour,
        });
        self
    }

    /// Script `step` only in jobs whose display name contains `job`
    /// (e.g. `"os=windows"`).
    pub fn on_job_step(mut self, job: &str, step: &str, behaviour: Scripted) -> Self {
        self.rules.push(Rule {
            job_contains: Some(job.to_string()),
            step: step.to_string(),
            behaviour,
        });
        self
    }

    /// Make unscripted steps take `delay` before exiting 0.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.default_delay = Some(delay);
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn steps_called(&self) -> Vec<String> {
        self.calls().into_iter().map(|c| c.step).collect()
    }

    /// Steps currently executing.
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Highest number of steps ever executing at once.
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    /// Wait until at least `n` calls have been made.
    pub async fn wait_for_calls(&self, n: usize) {
        while self.call_count() < n {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    }

    fn behaviour(&self, ctx: &StepContext) -> Scripted {
        self.rules
            .iter()
            .rev()
            .find(|rule| {
                rule.step == ctx.step.name
                    && rule
                        .job_contains
                        .as_deref()
                        .is_none_or(|job| ctx.job_name.contains(job))
            })
            .map(|rule| rule.behaviour.clone())
            .unwrap_or_else(|| match self.default_delay {
                Some(delay) => Scripted::Sleep(delay, 0),
                None => Scripted::Exit(0),
            })
    }
}

struct InFlight<'a>(&'a AtomicUsize);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl StepExecutor for ScriptedExecutor {
    async fn execute(&self, ctx: &StepContext) -> Result<StepOutcome> {
        self.calls.lock().unwrap().push(Call {
            job: ctx.job_name.clone(),
            step: ctx.step.name.clone(),
        });

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        let _guard = InFlight(&self.in_flight);

        let start = std::time::Instant::now();
        let exit_code = match self.behaviour(ctx) {
            Scripted::Exit(code) => code,
            Scripted::Sleep(delay, code) => {
                tokio::time::sleep(delay).await;
                code
            }
            Scripted::Hang => std::future::pending().await,
            Scripted::Error(message) => return Err(Error::Internal(message)),
        };

        Ok(StepOutcome {
            exit_code,
            duration: start.elapsed(),
        })
    }
}
