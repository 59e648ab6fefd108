//! Agent loop: drives the completion model through schema exploration
//! until it settles on a query that answers the task.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, info, info_span, warn, Instrument};
use uuid::Uuid;

use wtf_config::Config;
use wtf_provider::{Completion, CompletionParams, Provider};

use crate::database::Database;
use crate::failover::{FailoverPolicy, ModelRoster};
use crate::prompt::{PromptBuilder, STOP_SEQUENCE};
use crate::retry::RetryPolicy;
use crate::sanitizer::Sanitizer;
use crate::transcript::{Outcome, SessionLog, Transcript};
use crate::turn::{Turn, TurnState};
use crate::AgentError;

/// What the caller sees for each intermediate turn
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Proposal {
    pub reason: String,
    pub original_query: String,
    /// The turn claimed to be final but failed when run
    pub demoted: bool,
}

impl Proposal {
    fn from_turn(turn: &Turn) -> Self {
        Self {
            reason: turn.reason().to_string(),
            original_query: turn.original_query().to_string(),
            demoted: turn.state() == TurnState::Demoted,
        }
    }
}

/// One exploration session against one database
pub struct AgentLoop<P: Provider> {
    provider: Arc<P>,
    db: Database,
    sanitizer: Sanitizer,
    prompts: PromptBuilder,
    transcript: Transcript,
    roster: ModelRoster,
    failover: FailoverPolicy,
    retry: RetryPolicy,
    max_tokens: u32,
    temperature: f32,
    max_turns: usize,
    max_empty_outputs: usize,
    plan: Option<String>,
    saw_error: bool,
    appended: usize,
    empty_streak: usize,
    outcome: Outcome,
    session_id: Uuid,
    started_at: DateTime<Utc>,
}

impl<P: Provider> AgentLoop<P> {
    /// Create a session with default settings
    pub fn new(provider: P, db: Database, task: impl Into<String>) -> Self {
        Self::with_config(provider, db, task, &Config::default())
    }

    /// Create a session with full configuration
    pub fn with_config(provider: P, db: Database, task: impl Into<String>, config: &Config) -> Self {
        let session_id = Uuid::new_v4();
        let prompts = PromptBuilder::new(task);
        info!("◆ SESSION {} OPENED: {}", session_id, prompts.task());

        Self {
            provider: Arc::new(provider),
            db,
            sanitizer: Sanitizer::from_config(&config.sanitizer),
            prompts,
            transcript: Transcript::seeded(),
            roster: ModelRoster::new(config.agent.models.clone()),
            failover: FailoverPolicy::from_config(&config.failover),
            retry: RetryPolicy::from_config(&config.retry),
            max_tokens: config.agent.max_tokens,
            temperature: config.agent.temperature,
            max_turns: config.agent.max_turns,
            max_empty_outputs: config.agent.max_empty_outputs.max(1),
            plan: None,
            saw_error: false,
            appended: 0,
            empty_streak: 0,
            outcome: Outcome::Running,
            session_id,
            started_at: Utc::now(),
        }
    }

    /// Replace the retry schedule
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    pub fn active_model(&self) -> &str {
        self.roster.active()
    }

    pub fn plan(&self) -> Option<&str> {
        self.plan.as_deref()
    }

    pub fn outcome(&self) -> Outcome {
        self.outcome
    }

    fn span(&self) -> tracing::Span {
        info_span!("sql_session", session = %self.session_id)
    }

    /// Ask the model for a prose plan. It joins later prompts only once
    /// a query has failed.
    pub async fn prime(&mut self) -> crate::Result<()> {
        let span = self.span();
        async {
            let params = CompletionParams {
                model: self.roster.active().to_string(),
                prompt: self.prompts.plan_prompt(),
                max_tokens: self.max_tokens,
                temperature: self.temperature,
                stop: vec!["START-QUERY".to_string()],
                ..Default::default()
            };
            params.trace();

            let completion = self.provider.complete(params).await?;
            let plan = completion.text.trim();
            debug!("◆ PLAN:\n{}", plan);
            self.plan = (!plan.is_empty()).then(|| plan.to_string());
            Ok::<(), AgentError>(())
        }
        .instrument(span)
        .await
    }

    /// Produce the next intermediate proposal.
    ///
    /// `Ok(None)` ends the sequence; check [`AgentLoop::outcome`] to tell an
    /// accepted answer from an exhausted budget. A turn the model marks final
    /// has already been run against the database by the time this returns,
    /// so a failing one comes back demoted instead of ending the session.
    pub async fn next_turn(&mut self) -> crate::Result<Option<Proposal>> {
        let span = self.span();
        self.step().instrument(span).await
    }

    async fn step(&mut self) -> crate::Result<Option<Proposal>> {
        if self.outcome != Outcome::Running {
            return Ok(None);
        }

        loop {
            self.execute_tail();

            if self.appended >= self.max_turns {
                warn!("◆ TURN BUDGET SPENT: {} turns", self.appended);
                self.outcome = Outcome::Exhausted;
                return Ok(None);
            }

            let completion = self.complete().await?;
            debug!("◆ RAW COMPLETION:\n{}", completion.text);
            if completion.is_truncated() {
                debug!("◆ COMPLETION HIT THE TOKEN LIMIT");
            }

            let Some(turn) = Turn::parse_completion(&completion.text).into_turn() else {
                self.empty_streak += 1;
                warn!(
                    "◆ EMPTY MODEL OUTPUT ({}/{})",
                    self.empty_streak, self.max_empty_outputs
                );
                if self.empty_streak >= self.max_empty_outputs {
                    self.outcome = Outcome::Exhausted;
                    return Ok(None);
                }
                continue;
            };
            self.empty_streak = 0;

            if !self.transcript.push(turn) {
                continue;
            }
            self.appended += 1;

            // Finals run now so a failing one is demoted before we stop
            if self.transcript.last().is_some_and(Turn::is_final) {
                self.execute_tail();
            }

            if self.answer_source().is_some() {
                info!("◆ ANSWER ACCEPTED after {} turns", self.appended);
                self.outcome = Outcome::Answered;
                return Ok(None);
            }

            let Some(tail) = self.transcript.last() else {
                continue;
            };
            return Ok(Some(Proposal::from_turn(tail)));
        }
    }

    /// Run the newest turn if it has not been run yet
    fn execute_tail(&mut self) {
        let Some(turn) = self.transcript.last_mut() else {
            return;
        };
        if !turn.populate(&self.db, &self.sanitizer) {
            return;
        }

        debug!("◆ RESULT:\n{}", turn.response().unwrap_or_default());
        if turn.errored() {
            self.saw_error = true;
            if turn.is_final() {
                warn!("◆ FINAL ANSWER FAILED, DEMOTED: {}", turn.original_query());
                turn.demote();
            }
        }
    }

    /// One model call through the failover policy and retry schedule
    async fn complete(&mut self) -> crate::Result<Completion> {
        let mut schedule = self.retry.delays();
        let mut attempt = 0;

        loop {
            let penalties = self.failover.apply(&mut self.transcript, &mut self.roster);
            let plan = if self.saw_error { self.plan.as_deref() } else { None };

            let params = CompletionParams {
                model: self.roster.active().to_string(),
                prompt: self.prompts.build(&self.transcript, plan),
                max_tokens: self.max_tokens,
                temperature: self.temperature,
                stop: vec![STOP_SEQUENCE.to_string()],
                frequency_penalty: penalties.frequency,
                presence_penalty: penalties.presence,
            };
            params.trace();

            let err = match self.provider.complete(params).await {
                Ok(completion) => return Ok(completion),
                Err(e) => e,
            };

            if err.is_rate_limited() {
                self.failover.on_rate_limited(&mut self.roster);
            } else if err.is_context_exceeded() {
                if let Some(turn) = self.transcript.last_mut() {
                    turn.mark_too_long();
                }
            }

            attempt += 1;
            let Some(delay) = schedule.next() else {
                warn!("◆ MODEL CALL FAILED after {} attempts: {}", attempt, err);
                return Err(err.into());
            };

            warn!("◆ MODEL CALL FAILED ({}), retrying in {:?}", err, delay);
            tokio::time::sleep(delay).await;
        }
    }

    /// The turn whose query answers the task, once the tail is accepted.
    ///
    /// A final turn without a query points back at the latest turn that has
    /// one, provided that turn ran cleanly.
    fn answer_source(&self) -> Option<&Turn> {
        let tail = self
            .transcript
            .last()
            .filter(|t| t.state() == TurnState::Accepted)?;
        if !tail.query().trim().is_empty() {
            return Some(tail);
        }
        self.transcript.last_with_query().filter(|t| !t.errored())
    }

    fn accepted(&self) -> crate::Result<&Turn> {
        match self.outcome {
            Outcome::Answered => self.answer_source().ok_or(AgentError::NoAnswer),
            Outcome::Exhausted => Err(AgentError::Exhausted),
            Outcome::Running => Err(AgentError::NoAnswer),
        }
    }

    /// The turn holding the accepted query
    pub fn answer_turn(&self) -> crate::Result<&Turn> {
        self.accepted()
    }

    /// Rendered result of the accepted query
    pub fn answer(&self) -> crate::Result<&str> {
        Ok(self.accepted()?.response().unwrap_or_default())
    }

    /// Run the accepted query again with final limits
    pub fn rerun_answer(&self) -> crate::Result<String> {
        let turn = self.accepted()?;
        Ok(turn.rerun(&self.db, &self.sanitizer))
    }

    /// Drive the loop to its end without confirmation
    pub async fn run(&mut self) -> crate::Result<Outcome> {
        while self.next_turn().await?.is_some() {}
        Ok(self.outcome)
    }

    /// Snapshot of the session for export
    pub fn session_log(&self) -> SessionLog {
        SessionLog {
            session_id: self.session_id,
            task: self.prompts.task().to_string(),
            models: self.roster.models().clone(),
            started_at: self.started_at,
            finished_at: Utc::now(),
            outcome: self.outcome,
            turns: self.transcript.turns().to_vec(),
        }
    }
}
