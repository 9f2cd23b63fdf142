//! Quiz session controller.
//!
//! Every session runs as its own task that owns the [`TurnMachine`], the
//! timers and the random source. Player commands arrive over an mpsc
//! channel; timers post [`Scheduled`] events back into the same task, each
//! tagged with the turn that armed it. All state changes happen on that one
//! task, so a turn is fully resolved and its timers cancelled before the next
//! turn is initialised.

use chrono::Utc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::AbortHandle;
use uuid::Uuid;

use super::history_service::HistoryService;
use super::opponent_engine::OpponentEngine;
use super::question_generator::{generate_in_batches, QuestionGenerator};
use super::timer::{schedule_once, start_countdown, TimerKey, TimerRegistry, TimerSlot};
use super::turn_machine::{Advance, TurnMachine};
use crate::config::QuizTiming;
use crate::error::QuizError;
use crate::metrics::{
    self, QUIZ_SESSIONS_ACTIVE, QUIZ_SESSIONS_TOTAL, QUIZ_TURNS_RESOLVED_TOTAL,
    STALE_TIMER_EVENTS_TOTAL,
};
use crate::models::lobby::{LobbyRole, QuizSettings, RoomCode, GUEST_DEFAULT_QUESTION_COUNT};
use crate::models::player::{PlayerId, SIMULATED_HOST_NAME};
use crate::models::session::{
    AnswerReceipt, SessionOutcome, SessionPhase, SessionResult, SessionSnapshot,
};
use crate::models::turn::{ResolutionTrigger, TurnEffect, TurnEvent, TurnId};
use crate::models::{Difficulty, Question, OPTIONS_PER_QUESTION};

const COMMAND_BUFFER: usize = 32;

/// Hands control back to whatever hosts the quiz.
pub trait Navigator: Send + Sync {
    fn exit_quiz(&self);
}

impl<F> Navigator for F
where
    F: Fn() + Send + Sync,
{
    fn exit_quiz(&self) {
        self()
    }
}

#[derive(Clone)]
pub struct QuizCollaborators {
    pub generator: Arc<dyn QuestionGenerator>,
    pub history: HistoryService,
    pub navigator: Arc<dyn Navigator>,
}

enum SessionCommand {
    Start {
        reply: oneshot::Sender<Result<SessionSnapshot, QuizError>>,
    },
    Answer {
        option: usize,
        reply: oneshot::Sender<Result<AnswerReceipt, QuizError>>,
    },
    Exit {
        reply: oneshot::Sender<Result<SessionOutcome, QuizError>>,
    },
}

/// Events posted by the session's own timers and background work.
#[derive(Debug)]
enum Scheduled {
    Tick { turn: TurnId, remaining: u32 },
    Expired { turn: TurnId },
    OpponentDue {
        turn: TurnId,
        player: PlayerId,
        delay: Duration,
    },
    GainExpired { turn: TurnId, player: PlayerId },
    Advance { turn: TurnId },
    GuestAutoStart,
    HostJoined,
    Generated {
        epoch: u64,
        result: Result<Vec<Question>, QuizError>,
    },
}

/// Cheap, cloneable reference to a running session.
#[derive(Clone)]
pub struct SessionHandle {
    id: Uuid,
    commands: mpsc::Sender<SessionCommand>,
    snapshots: watch::Receiver<SessionSnapshot>,
}

impl SessionHandle {
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.snapshots.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.snapshots.clone()
    }

    /// Starts question generation. Only solo players and room hosts may
    /// start; guests are started by the lobby.
    pub async fn start(&self) -> Result<SessionSnapshot, QuizError> {
        self.request(|reply| SessionCommand::Start { reply }).await
    }

    pub async fn answer(&self, option: usize) -> Result<AnswerReceipt, QuizError> {
        self.request(|reply| SessionCommand::Answer { option, reply })
            .await
    }

    /// Leaves the quiz. Pending timers are cancelled and the navigator is
    /// invoked; the session accepts no further commands.
    pub async fn exit(&self) -> Result<SessionOutcome, QuizError> {
        self.request(|reply| SessionCommand::Exit { reply }).await
    }

    /// Resolves with the first published snapshot matching `predicate`.
    pub async fn wait_for<F>(&self, mut predicate: F) -> Result<SessionSnapshot, QuizError>
    where
        F: FnMut(&SessionSnapshot) -> bool,
    {
        let mut snapshots = self.snapshots.clone();
        let snapshot = snapshots
            .wait_for(|snapshot| predicate(snapshot))
            .await
            .map_err(|_| QuizError::SessionClosed)?
            .clone();
        Ok(snapshot)
    }

    async fn request<T>(
        &self,
        build: impl FnOnce(oneshot::Sender<Result<T, QuizError>>) -> SessionCommand,
    ) -> Result<T, QuizError> {
        let (reply, response) = oneshot::channel();
        self.commands
            .send(build(reply))
            .await
            .map_err(|_| QuizError::SessionClosed)?;
        response.await.map_err(|_| QuizError::SessionClosed)?
    }
}

/// Creates quiz sessions wired to the shared collaborators.
#[derive(Clone)]
pub struct QuizSessionController {
    collaborators: QuizCollaborators,
    timing: QuizTiming,
    batch_size: u32,
    seed: Option<u64>,
    created: Arc<AtomicU64>,
}

impl QuizSessionController {
    pub fn new(
        collaborators: QuizCollaborators,
        timing: QuizTiming,
        batch_size: u32,
        seed: Option<u64>,
    ) -> Self {
        Self {
            collaborators,
            timing,
            batch_size,
            seed,
            created: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Each session draws from its own stream: the configured seed mixed with
    /// the session's creation order, so a seeded run stays reproducible.
    fn session_seed(&self) -> Option<u64> {
        let n = self.created.fetch_add(1, Ordering::Relaxed);
        self.seed.map(|seed| seed ^ n)
    }

    /// Solo quiz; generation starts right away.
    pub fn start_solo(
        &self,
        question_count: u32,
        difficulty: Difficulty,
    ) -> Result<SessionHandle, QuizError> {
        let settings = QuizSettings::solo(question_count, difficulty)?;
        let mut actor = self.actor(settings, None);
        actor.begin_generation()?;
        Ok(self.spawn(actor))
    }

    /// Hosted room with three simulated opponents, waiting for `start`.
    pub fn create_room(
        &self,
        question_count: u32,
        difficulty: Difficulty,
    ) -> Result<SessionHandle, QuizError> {
        let settings = QuizSettings::multi(question_count, difficulty)?;
        let mut actor = self.actor(settings, Some(LobbyRole::Host));
        actor.room_code = Some(actor.engine.room_code());
        Ok(self.spawn(actor))
    }

    /// Joins a room as a guest.
    ///
    /// There is no real host to synchronise with: the host shows up after a
    /// short delay and the session starts itself once the lobby delay has
    /// passed.
    pub fn join_room(&self, code: &str) -> Result<SessionHandle, QuizError> {
        let code = RoomCode::parse(code)?;
        let settings = QuizSettings::multi(GUEST_DEFAULT_QUESTION_COUNT, Difficulty::Medium)?;
        let mut actor = self.actor(settings, Some(LobbyRole::Guest));
        actor.room_code = Some(code);
        actor.schedule(
            TimerKey::lobby(TimerSlot::HostJoin),
            self.timing.host_join(),
            Scheduled::HostJoined,
        );
        actor.arm_guest_auto_start();
        Ok(self.spawn(actor))
    }

    fn actor(&self, settings: QuizSettings, role: Option<LobbyRole>) -> SessionActor {
        let id = Uuid::new_v4();
        let machine = TurnMachine::new(settings);
        let (snapshots, _) = watch::channel(machine.snapshot(id, role, None));
        let (events, events_rx) = mpsc::unbounded_channel();

        QUIZ_SESSIONS_TOTAL
            .with_label_values(&[settings.mode.as_str(), "created"])
            .inc();
        QUIZ_SESSIONS_ACTIVE.inc();

        SessionActor {
            id,
            role,
            room_code: None,
            machine,
            engine: OpponentEngine::new(self.session_seed()),
            timers: TimerRegistry::new(),
            timing: self.timing.clone(),
            batch_size: self.batch_size,
            collaborators: self.collaborators.clone(),
            events,
            events_rx: Some(events_rx),
            snapshots,
            generation: None,
            generation_epoch: 0,
            active: true,
        }
    }

    fn spawn(&self, actor: SessionActor) -> SessionHandle {
        let (commands, commands_rx) = mpsc::channel(COMMAND_BUFFER);
        actor.publish();
        let handle = SessionHandle {
            id: actor.id,
            commands,
            snapshots: actor.snapshots.subscribe(),
        };

        tracing::info!(
            session_id = %actor.id,
            mode = actor.machine.settings().mode.as_str(),
            "Quiz session created"
        );
        tokio::spawn(actor.run(commands_rx));
        handle
    }
}

struct SessionActor {
    id: Uuid,
    role: Option<LobbyRole>,
    room_code: Option<RoomCode>,
    machine: TurnMachine,
    engine: OpponentEngine,
    timers: TimerRegistry,
    timing: QuizTiming,
    batch_size: u32,
    collaborators: QuizCollaborators,
    events: mpsc::UnboundedSender<Scheduled>,
    events_rx: Option<mpsc::UnboundedReceiver<Scheduled>>,
    snapshots: watch::Sender<SessionSnapshot>,
    generation: Option<AbortHandle>,
    generation_epoch: u64,
    active: bool,
}

impl SessionActor {
    async fn run(mut self, mut commands: mpsc::Receiver<SessionCommand>) {
        let Some(mut events) = self.events_rx.take() else {
            return;
        };

        loop {
            tokio::select! {
                biased;

                Some(event) = events.recv() => self.on_scheduled(event).await,
                command = commands.recv() => match command {
                    Some(command) => {
                        if self.on_command(command) {
                            break;
                        }
                    }
                    None => {
                        tracing::info!(session_id = %self.id, "All handles dropped, abandoning session");
                        self.close(false);
                        break;
                    }
                },
            }
            self.publish();
        }
    }

    fn publish(&self) {
        let next = self
            .machine
            .snapshot(self.id, self.role, self.room_code.as_ref());
        self.snapshots.send_if_modified(|current| {
            if *current == next {
                false
            } else {
                *current = next;
                true
            }
        });
    }

    /// Returns true once the session has been closed.
    fn on_command(&mut self, command: SessionCommand) -> bool {
        match command {
            SessionCommand::Start { reply } => {
                let result = if self.role == Some(LobbyRole::Guest) {
                    Err(QuizError::NotHost)
                } else {
                    self.begin_generation().map(|_| {
                        self.machine
                            .snapshot(self.id, self.role, self.room_code.as_ref())
                    })
                };
                let _ = reply.send(result);
            }
            SessionCommand::Answer { option, reply } => {
                let _ = reply.send(self.submit_answer(option));
            }
            SessionCommand::Exit { reply } => {
                let outcome = self.close(true);
                self.publish();
                let _ = reply.send(Ok(outcome));
                return true;
            }
        }
        false
    }

    async fn on_scheduled(&mut self, event: Scheduled) {
        match event {
            Scheduled::Tick { turn, remaining } => {
                if !self.machine.sync_clock(turn, remaining) {
                    self.stale("tick", turn);
                }
            }
            Scheduled::Expired { turn } => {
                if !self.machine.is_current(turn) {
                    self.stale("expiry", turn);
                    return;
                }
                match self.machine.apply(TurnEvent::HumanTimedOut) {
                    Ok(TurnEffect::Resolved { trigger, .. }) => {
                        tracing::debug!(session_id = %self.id, ?turn, "Turn timed out");
                        self.on_resolved(turn, trigger, false, 0);
                    }
                    Ok(_) => {}
                    Err(e) => tracing::warn!(session_id = %self.id, "Timeout not applied: {}", e),
                }
            }
            Scheduled::OpponentDue {
                turn,
                player,
                delay,
            } => {
                if !self.machine.is_current(turn) {
                    self.stale("opponent", turn);
                    return;
                }
                if self.machine.has_answered(player) {
                    return;
                }
                let answer = self.engine.resolve(self.machine.settings().difficulty);
                match self.machine.record_opponent(player, answer, delay) {
                    Ok(TurnEffect::OpponentScored {
                        player,
                        correct,
                        points,
                        ..
                    }) => {
                        metrics::record_answer(false, correct);
                        if points > 0 {
                            self.schedule_gain_clear(turn, player);
                        }
                    }
                    Ok(_) => {}
                    Err(e) => {
                        tracing::warn!(session_id = %self.id, %player, "Opponent answer dropped: {}", e)
                    }
                }
            }
            Scheduled::GainExpired { turn, player } => {
                if !self.machine.clear_gain(turn, player) && !self.machine.is_current(turn) {
                    self.stale("gain", turn);
                }
            }
            Scheduled::Advance { turn } => {
                if !self.machine.is_current(turn) {
                    self.stale("advance", turn);
                    return;
                }
                self.timers.cancel_turn(turn);
                match self.machine.advance(turn) {
                    Ok(Advance::Next(next)) => self.start_turn(next),
                    Ok(Advance::Finished(result)) => self.finish(result).await,
                    Err(e) => tracing::warn!(session_id = %self.id, "Advance failed: {}", e),
                }
            }
            Scheduled::GuestAutoStart => {
                if self.machine.phase() == SessionPhase::Idle {
                    tracing::info!(session_id = %self.id, "Lobby synchronised, starting quiz");
                    if let Err(e) = self.begin_generation() {
                        tracing::warn!(session_id = %self.id, "Auto-start failed: {}", e);
                    }
                }
            }
            Scheduled::HostJoined => {
                if let Ok(player) = self.machine.seat_opponent(SIMULATED_HOST_NAME) {
                    tracing::debug!(session_id = %self.id, %player, "Host joined the room");
                }
            }
            Scheduled::Generated { epoch, result } => {
                if epoch != self.generation_epoch
                    || self.machine.phase() != SessionPhase::Generating
                {
                    return;
                }
                self.generation = None;
                match result.and_then(|questions| self.machine.load_questions(questions)) {
                    Ok(turn) => {
                        tracing::info!(
                            session_id = %self.id,
                            questions = self.machine.question_count(),
                            "Questions ready, quiz started"
                        );
                        QUIZ_SESSIONS_TOTAL
                            .with_label_values(&[self.mode(), "started"])
                            .inc();
                        self.start_turn(turn);
                    }
                    Err(e) => {
                        tracing::warn!(session_id = %self.id, "Question generation failed: {}", e);
                        self.machine.generation_failed(e.to_string());
                        QUIZ_SESSIONS_TOTAL
                            .with_label_values(&[self.mode(), "generation_failed"])
                            .inc();
                        if self.role == Some(LobbyRole::Guest) {
                            self.arm_guest_auto_start();
                        }
                    }
                }
            }
        }
    }

    fn mode(&self) -> &'static str {
        self.machine.settings().mode.as_str()
    }

    fn stale(&self, kind: &str, turn: TurnId) {
        STALE_TIMER_EVENTS_TOTAL.inc();
        tracing::debug!(session_id = %self.id, ?turn, kind, "Dropping stale timer event");
    }

    fn schedule(&mut self, key: TimerKey, delay: Duration, event: Scheduled) {
        let events = self.events.clone();
        let handle = schedule_once(delay, move || {
            let _ = events.send(event);
        });
        self.timers.insert(key, handle);
    }

    fn arm_guest_auto_start(&mut self) {
        self.schedule(
            TimerKey::lobby(TimerSlot::GuestAutoStart),
            self.timing.guest_auto_start(),
            Scheduled::GuestAutoStart,
        );
    }

    fn schedule_gain_clear(&mut self, turn: TurnId, player: PlayerId) {
        self.schedule(
            TimerKey::turn(turn, TimerSlot::GainDisplay(player)),
            self.timing.gain_display(),
            Scheduled::GainExpired { turn, player },
        );
    }

    fn begin_generation(&mut self) -> Result<(), QuizError> {
        self.machine.begin_generation()?;
        self.generation_epoch += 1;

        let epoch = self.generation_epoch;
        let generator = self.collaborators.generator.clone();
        let events = self.events.clone();
        let settings = *self.machine.settings();
        let batch_size = self.batch_size;

        let task = tokio::spawn(async move {
            let result = generate_in_batches(
                generator.as_ref(),
                settings.question_count,
                settings.difficulty,
                batch_size,
            )
            .await;
            let _ = events.send(Scheduled::Generated { epoch, result });
        });
        self.generation = Some(task.abort_handle());
        Ok(())
    }

    fn start_turn(&mut self, turn: TurnId) {
        let time_limit = self.machine.settings().time_limit();

        let ticks = self.events.clone();
        let expiry = self.events.clone();
        let countdown = start_countdown(
            time_limit,
            self.timing.tick(),
            move |remaining| {
                let _ = ticks.send(Scheduled::Tick { turn, remaining });
            },
            move || {
                let _ = expiry.send(Scheduled::Expired { turn });
            },
        );
        self.timers
            .insert(TimerKey::turn(turn, TimerSlot::Countdown), countdown);

        let opponents = self.machine.leaderboard().opponents();
        if opponents.is_empty() {
            let order = self.engine.shuffled_order(OPTIONS_PER_QUESTION);
            self.machine.set_option_order(order);
        } else {
            for (player, delay) in self.engine.plan_turn(&opponents, time_limit) {
                self.schedule(
                    TimerKey::turn(turn, TimerSlot::Opponent(player)),
                    delay,
                    Scheduled::OpponentDue {
                        turn,
                        player,
                        delay,
                    },
                );
            }
        }
    }

    fn submit_answer(&mut self, option: usize) -> Result<AnswerReceipt, QuizError> {
        let turn = self
            .machine
            .current_turn_id()
            .ok_or(QuizError::WrongPhase(self.machine.phase().as_str()))?;

        let effect = self.machine.submit_answer(option)?;
        let (correct, points) = match effect {
            TurnEffect::Resolved {
                trigger,
                correct,
                points,
                ..
            } => {
                self.on_resolved(turn, trigger, correct, points);
                (correct, points)
            }
            _ => return Err(QuizError::AlreadyAnswered),
        };

        let question = self
            .machine
            .current_question()
            .ok_or(QuizError::WrongPhase(self.machine.phase().as_str()))?;

        Ok(AnswerReceipt {
            correct,
            points,
            correct_option: question.correct_answer,
            explanation: question.explanation.clone(),
            total_score: self.machine.result().score,
        })
    }

    /// The human side of the turn is settled: stop the clock and schedule the
    /// reveal window before moving on.
    fn on_resolved(&mut self, turn: TurnId, trigger: ResolutionTrigger, correct: bool, points: u32) {
        QUIZ_TURNS_RESOLVED_TOTAL
            .with_label_values(&[trigger.as_str()])
            .inc();
        metrics::record_answer(true, correct);

        self.timers
            .cancel(&TimerKey::turn(turn, TimerSlot::Countdown));

        if points > 0 {
            if let Some(turn_state) = self.machine.current_turn() {
                let human = turn_state.human();
                self.schedule_gain_clear(turn, human);
            }
        }

        let reveal = match trigger {
            ResolutionTrigger::Answered => self.timing.answer_reveal(),
            ResolutionTrigger::TimedOut => self.timing.timeout_reveal(),
        };
        self.schedule(
            TimerKey::turn(turn, TimerSlot::Advance),
            reveal,
            Scheduled::Advance { turn },
        );
    }

    async fn finish(&mut self, result: SessionResult) {
        self.timers.cancel_all();
        self.deactivate();
        QUIZ_SESSIONS_TOTAL
            .with_label_values(&[self.mode(), "completed"])
            .inc();

        tracing::info!(
            session_id = %self.id,
            score = result.score,
            correct = result.correct,
            total = result.total,
            "Quiz finished"
        );

        if let Err(e) = self
            .collaborators
            .history
            .record_result(&result, Utc::now())
            .await
        {
            tracing::error!(session_id = %self.id, "Failed to persist quiz result: {}", e);
        }
    }

    /// Tears the session down from any phase. With `navigate` the host
    /// application gets control back.
    fn close(&mut self, navigate: bool) -> SessionOutcome {
        self.timers.cancel_all();
        if let Some(generation) = self.generation.take() {
            generation.abort();
        }

        let completed = self.machine.phase() == SessionPhase::Results;
        if !completed {
            QUIZ_SESSIONS_TOTAL
                .with_label_values(&[self.mode(), "abandoned"])
                .inc();
        }
        self.deactivate();

        let outcome = SessionOutcome {
            session_id: self.id,
            completed,
            result: self.machine.result(),
        };
        self.machine.close();

        tracing::info!(session_id = %self.id, completed, "Quiz session closed");
        if navigate {
            self.collaborators.navigator.exit_quiz();
        }
        outcome
    }

    fn deactivate(&mut self) {
        if self.active {
            self.active = false;
            QUIZ_SESSIONS_ACTIVE.dec();
        }
    }
}
