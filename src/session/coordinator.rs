//! Session coordinator
//!
//! Owns the channel, the loaded table and the live game. All channel access
//! is send-then-wait from one thread. A timeout leaves the session exactly
//! as it was so the caller can retry; channel closure ends the session.

use std::time::{Duration, Instant};

use crate::{
    Error, Result,
    adapters::LogSink,
    game::{Action, Actor, GameState, apply},
    ports::{Channel, EventSink, GameEvent, HumanInput},
    protocol::{LineFramer, ProtocolMessage, TableUpload},
    q_learning::PolicyTable,
    session::{
        config::SessionConfig,
        state::{Insights, SessionPhase, SessionState, WinTally},
    },
};

pub struct Session<C: Channel> {
    channel: C,
    config: SessionConfig,
    table: PolicyTable,
    framer: LineFramer,
    state: SessionState,
    sink: Box<dyn EventSink>,
}

impl<C: Channel> Session<C> {
    pub fn new(channel: C, table: PolicyTable, config: SessionConfig) -> Result<Self> {
        config.validate()?;
        table.validate()?;
        Ok(Self {
            channel,
            framer: LineFramer::new(config.protocol.max_line_len),
            config,
            table,
            state: SessionState::default(),
            sink: Box::new(LogSink),
        })
    }

    /// Session playing the optimal-take heuristic when no trained table exists
    pub fn untrained(channel: C, config: SessionConfig) -> Result<Self> {
        log::warn!("no trained table, falling back to heuristic policy");
        Self::new(channel, PolicyTable::heuristic(), config)
    }

    pub fn with_sink(mut self, sink: impl EventSink + 'static) -> Self {
        self.sink = Box::new(sink);
        self
    }

    pub fn phase(&self) -> SessionPhase {
        self.state.phase
    }

    pub fn stones(&self) -> GameState {
        self.state.stones
    }

    pub fn tally(&self) -> WinTally {
        self.state.tally
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn table(&self) -> &PolicyTable {
        &self.table
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn channel(&self) -> &C {
        &self.channel
    }

    pub fn channel_mut(&mut self) -> &mut C {
        &mut self.channel
    }

    /// What the agent sees at the current pile size
    pub fn insights(&self) -> Insights {
        Insights::new(&self.table, self.state.stones)
    }

    /// Send the table and wait for the device to acknowledge it.
    ///
    /// Allowed before the first game and again between games; uploading
    /// the same table twice leaves the device unchanged.
    ///
    /// # Errors
    ///
    /// [`Error::UploadTimeout`] when no `ACK` arrives in time; the phase is
    /// left as it was. [`Error::UploadRejected`] when the device answers
    /// `ERR`.
    pub fn upload(&mut self) -> Result<()> {
        self.require("upload", &[SessionPhase::AwaitingUpload, SessionPhase::Idle])?;

        let plan = TableUpload::plan(&self.table, self.config.protocol.max_line_len)?;
        let transfer = self.config.protocol.link.transfer_time(plan.wire_len());
        let timeout = self.config.upload_timeout() + transfer;

        // Stale input must not be mistaken for the reply
        self.framer.reset();
        for message in plan.messages() {
            self.send(message)?;
        }
        log::info!(
            "sent table in {} line(s), {} bytes, waiting up to {} ms for ACK",
            plan.messages().len(),
            plan.wire_len(),
            timeout.as_millis()
        );

        let reply = self.wait_for(timeout, |message| {
            matches!(message, ProtocolMessage::Ack | ProtocolMessage::Error(_))
        })?;
        match reply {
            Some(ProtocolMessage::Ack) => {
                log::info!("device acknowledged table");
                if self.state.phase == SessionPhase::AwaitingUpload {
                    self.state.phase = SessionPhase::Idle;
                }
                Ok(())
            }
            Some(ProtocolMessage::Error(reason)) => {
                log::warn!("device rejected table: {reason}");
                Err(Error::UploadRejected { reason })
            }
            _ => Err(Error::UploadTimeout {
                millis: timeout.as_millis(),
            }),
        }
    }

    pub fn start_game(&mut self, first: Actor) -> Result<()> {
        self.start_game_at(GameState::new(), first)
    }

    /// Start a game from an arbitrary pile size
    pub fn start_game_at(&mut self, state: GameState, first: Actor) -> Result<()> {
        self.require("start_game", &[SessionPhase::Idle])?;
        if state.is_terminal() {
            return Err(Error::InvalidConfiguration {
                message: "cannot start a game with no stones".to_string(),
            });
        }
        self.state.stones = state;
        self.state.phase = turn_of(first);
        log::info!("new game at {state} stones, {first} moves first");
        Ok(())
    }

    /// Apply a move chosen by the local human player.
    ///
    /// # Errors
    ///
    /// [`Error::IllegalMove`] when the pile is too small; nothing changes
    /// and the player may choose again.
    pub fn human_move(&mut self, action: Action) -> Result<GameEvent> {
        self.require("human_move", &[SessionPhase::HumanTurn])?;
        self.check_legal(Actor::Human, action)?;
        self.play(Actor::Human, action, true)
    }

    /// Let the agent move greedily on the loaded table
    pub fn agent_move(&mut self) -> Result<GameEvent> {
        self.require("agent_move", &[SessionPhase::AgentTurn])?;
        let action = self
            .table
            .greedy_action(self.state.stones)
            .ok_or(Error::GameOver)?;
        log::debug!("agent view {}", self.insights());
        self.play(Actor::Ai, action, true)
    }

    /// Wait for the human's move to arrive from the device.
    ///
    /// # Errors
    ///
    /// [`Error::ResponseTimeout`] leaves the session untouched.
    /// [`Error::StateMismatch`] and [`Error::IllegalMove`] reject a report
    /// that does not fit the current game.
    pub fn await_device_move(&mut self) -> Result<GameEvent> {
        self.require("await_device_move", &[SessionPhase::HumanTurn])?;
        let timeout = self.config.response_timeout();
        let reply = self.wait_for(timeout, |message| {
            matches!(
                message,
                ProtocolMessage::MoveLog {
                    actor: Actor::Human,
                    ..
                } | ProtocolMessage::Error(_)
            )
        })?;

        match reply {
            Some(ProtocolMessage::MoveLog {
                action,
                state_after,
                ..
            }) => {
                self.check_legal(Actor::Human, action)?;
                let expected = self.state.stones.stones() - action.value();
                if state_after.stones() != expected {
                    return Err(Error::StateMismatch {
                        expected,
                        reported: state_after.stones(),
                    });
                }
                // Already on the device display; not echoed back
                self.play(Actor::Human, action, false)
            }
            Some(ProtocolMessage::Error(reason)) => Err(Error::DeviceError { reason }),
            _ => Err(Error::ResponseTimeout {
                millis: timeout.as_millis(),
            }),
        }
    }

    /// Play one full game with moves from `input`.
    ///
    /// Returns the winner, or `None` when the player quits. Refused moves
    /// are reported back to `input` and asked for again.
    pub fn play_game<I: HumanInput + ?Sized>(
        &mut self,
        first: Actor,
        input: &mut I,
    ) -> Result<Option<Actor>> {
        self.play_game_at(GameState::new(), first, input)
    }

    /// [`Session::play_game`] from an arbitrary pile size
    pub fn play_game_at<I: HumanInput + ?Sized>(
        &mut self,
        state: GameState,
        first: Actor,
        input: &mut I,
    ) -> Result<Option<Actor>> {
        self.start_game_at(state, first)?;
        loop {
            match self.state.phase {
                SessionPhase::HumanTurn => {
                    let state = self.state.stones;
                    let Some(action) = input.next_action(state)? else {
                        self.abandon();
                        return Ok(None);
                    };
                    match self.human_move(action) {
                        Ok(_) => {}
                        Err(err @ Error::IllegalMove { .. }) => input.reject(state, &err),
                        Err(err) => return Err(err),
                    }
                }
                SessionPhase::AgentTurn => {
                    self.agent_move()?;
                }
                SessionPhase::Idle => return Ok(self.state.last_winner),
                SessionPhase::Closed => return Err(Error::SessionClosed),
                phase => {
                    return Err(Error::OutOfTurn {
                        operation: "play_game",
                        phase: phase.to_string(),
                    });
                }
            }
        }
    }

    /// Play one full game with the human's moves reported by the device
    pub fn play_device_game(&mut self, first: Actor) -> Result<Actor> {
        self.start_game(first)?;
        loop {
            match self.state.phase {
                SessionPhase::HumanTurn => {
                    self.await_device_move()?;
                }
                SessionPhase::AgentTurn => {
                    self.agent_move()?;
                }
                SessionPhase::Idle => {
                    return self.state.last_winner.ok_or(Error::GameOver);
                }
                SessionPhase::Closed => return Err(Error::SessionClosed),
                phase => {
                    return Err(Error::OutOfTurn {
                        operation: "play_device_game",
                        phase: phase.to_string(),
                    });
                }
            }
        }
    }

    /// Drop the current game without a result
    pub fn abandon(&mut self) {
        if matches!(
            self.state.phase,
            SessionPhase::HumanTurn | SessionPhase::AgentTurn
        ) {
            log::info!("game abandoned at {} stones", self.state.stones);
            self.state.phase = SessionPhase::Idle;
        }
    }

    /// End the session and release the channel
    pub fn close(&mut self) {
        if self.state.phase != SessionPhase::Closed {
            self.channel.close();
            self.state.phase = SessionPhase::Closed;
            log::info!("session closed, tally {}", self.state.tally);
        }
    }

    fn require(&self, operation: &'static str, allowed: &[SessionPhase]) -> Result<()> {
        let phase = self.state.phase;
        if phase == SessionPhase::Closed {
            return Err(Error::SessionClosed);
        }
        if allowed.contains(&phase) {
            Ok(())
        } else {
            Err(Error::OutOfTurn {
                operation,
                phase: phase.to_string(),
            })
        }
    }

    fn check_legal(&self, actor: Actor, action: Action) -> Result<()> {
        let state = self.state.stones;
        if action.is_legal(state) {
            Ok(())
        } else {
            Err(Error::IllegalMove {
                actor: actor.to_string(),
                take: action.value(),
                stones: state.stones(),
            })
        }
    }

    fn play(&mut self, actor: Actor, action: Action, announce: bool) -> Result<GameEvent> {
        let transition = apply(self.state.stones, action, actor)?;
        let winner = transition.done.then_some(actor);
        if announce {
            self.send(&ProtocolMessage::MoveLog {
                actor,
                action,
                state_after: transition.next_state,
            })?;
        }

        self.state.stones = transition.next_state;
        let event = GameEvent {
            state: transition.next_state,
            actor,
            action,
            result: winner,
        };
        self.sink.on_event(&event);

        match winner {
            Some(winner) => self.finish_game(winner)?,
            None => self.state.phase = turn_of(actor.opponent()),
        }
        Ok(event)
    }

    fn finish_game(&mut self, winner: Actor) -> Result<()> {
        self.state.phase = SessionPhase::GameOver;
        self.state.tally.record(winner);
        self.state.last_winner = Some(winner);
        log::info!("{winner} wins, tally {}", self.state.tally);
        self.send(&ProtocolMessage::ResultLog { winner })?;
        self.state.phase = SessionPhase::Idle;
        Ok(())
    }

    fn send(&mut self, message: &ProtocolMessage) -> Result<()> {
        log::debug!("-> {}", message.encode());
        self.channel
            .send(&message.frame())
            .map_err(|err| self.on_channel_error(err))
    }

    fn on_channel_error(&mut self, err: Error) -> Error {
        if err.is_fatal_to_session() {
            log::warn!("closing session: {err}");
            self.close();
        }
        err
    }

    /// Wait until a message matching `wanted` arrives or `timeout` passes.
    ///
    /// Undecodable lines and unrelated messages are logged and skipped;
    /// any other decoding failure is returned.
    fn wait_for<F>(&mut self, timeout: Duration, wanted: F) -> Result<Option<ProtocolMessage>>
    where
        F: Fn(&ProtocolMessage) -> bool,
    {
        let deadline = Instant::now() + timeout;
        loop {
            while let Some(decoded) = self.framer.next_message() {
                match decoded {
                    Ok(message) if wanted(&message) => {
                        log::debug!("<- {}", message.encode());
                        return Ok(Some(message));
                    }
                    Ok(message) => log::debug!("ignoring {} while waiting", message.kind()),
                    Err(err) if err.is_recoverable() => log::warn!("skipping bad line: {err}"),
                    Err(err) => return Err(err),
                }
            }

            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Ok(None);
            }
            match self.channel.recv(remaining) {
                Ok(Some(bytes)) => self.framer.push(&bytes),
                Ok(None) => return Ok(None),
                Err(err) => return Err(self.on_channel_error(err)),
            }
        }
    }
}

fn turn_of(actor: Actor) -> SessionPhase {
    match actor {
        Actor::Human => SessionPhase::HumanTurn,
        Actor::Ai => SessionPhase::AgentTurn,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::{AckPolicy, RecordingSink, ScriptedInput, VirtualDevice};

    fn ready_session(table: PolicyTable) -> Session<VirtualDevice> {
        let mut session =
            Session::new(VirtualDevice::new(), table, SessionConfig::default()).unwrap();
        session.upload().unwrap();
        session
    }

    #[test]
    fn test_upload_moves_to_idle() {
        let session = ready_session(PolicyTable::heuristic());
        assert_eq!(session.phase(), SessionPhase::Idle);
        assert_eq!(
            session.channel().loaded_table(),
            Some(&PolicyTable::heuristic())
        );
    }

    #[test]
    fn test_upload_timeout_keeps_phase() {
        let device = VirtualDevice::new().with_ack_policy(AckPolicy::Never);
        let mut session =
            Session::new(device, PolicyTable::heuristic(), SessionConfig::default()).unwrap();
        assert!(matches!(
            session.upload(),
            Err(Error::UploadTimeout { .. })
        ));
        assert_eq!(session.phase(), SessionPhase::AwaitingUpload);

        session.channel_mut().set_ack_policy(AckPolicy::Always);
        session.upload().unwrap();
        assert_eq!(session.phase(), SessionPhase::Idle);
    }

    #[test]
    fn test_upload_rejected() {
        let device = VirtualDevice::new().with_ack_policy(AckPolicy::Reject("no memory".into()));
        let mut session =
            Session::new(device, PolicyTable::new(), SessionConfig::default()).unwrap();
        match session.upload() {
            Err(Error::UploadRejected { reason }) => assert_eq!(reason, "no memory"),
            other => panic!("expected rejection, got {other:?}"),
        }
    }

    #[test]
    fn test_moves_before_upload_are_out_of_turn() {
        let mut session =
            Session::new(VirtualDevice::new(), PolicyTable::new(), SessionConfig::default())
                .unwrap();
        assert!(matches!(
            session.start_game(Actor::Human),
            Err(Error::OutOfTurn { .. })
        ));
        assert!(matches!(
            session.agent_move(),
            Err(Error::OutOfTurn { .. })
        ));
    }

    #[test]
    fn test_illegal_human_move_leaves_state() {
        let mut session = ready_session(PolicyTable::heuristic());
        session
            .start_game_at(GameState::at(2).unwrap(), Actor::Human)
            .unwrap();
        assert!(matches!(
            session.human_move(Action::Take3),
            Err(Error::IllegalMove { take: 3, stones: 2, .. })
        ));
        assert_eq!(session.stones().stones(), 2);
        assert_eq!(session.phase(), SessionPhase::HumanTurn);
    }

    #[test]
    fn test_game_over_updates_tally_and_reports_winner() {
        let sink = RecordingSink::new();
        let mut session = ready_session(PolicyTable::heuristic()).with_sink(sink.clone());
        session
            .start_game_at(GameState::at(3).unwrap(), Actor::Ai)
            .unwrap();
        let event = session.agent_move().unwrap();

        assert_eq!(event.action, Action::Take3);
        assert_eq!(event.result, Some(Actor::Ai));
        assert_eq!(session.phase(), SessionPhase::Idle);
        assert_eq!(session.tally().ai, 1);
        assert_eq!(sink.len(), 1);
        assert_eq!(
            session.channel().received().last(),
            Some(&ProtocolMessage::ResultLog { winner: Actor::Ai })
        );
    }

    #[test]
    fn test_play_game_to_completion() {
        let mut session = ready_session(PolicyTable::heuristic());
        // 21 is a winning start; taking one each turn keeps the agent on
        // multiples of four
        let mut input = ScriptedInput::new([Action::Take1; 8]);
        let winner = session.play_game(Actor::Human, &mut input).unwrap();
        assert_eq!(winner, Some(Actor::Human));
        assert_eq!(input.remaining(), 2);
        assert_eq!(session.tally().human, 1);
        assert_eq!(session.stones().stones(), 0);
    }

    #[test]
    fn test_play_game_reports_rejections() {
        let mut session = ready_session(PolicyTable::heuristic());
        let mut input = ScriptedInput::new([Action::Take3, Action::Take2]);
        let winner = session
            .play_game_at(GameState::at(2).unwrap(), Actor::Human, &mut input)
            .unwrap();
        assert_eq!(winner, Some(Actor::Human));
        assert_eq!(input.rejections(), 1);
        assert_eq!(session.tally().human, 1);
    }

    #[test]
    fn test_quitting_abandons_game() {
        let mut session = ready_session(PolicyTable::heuristic());
        let mut input = ScriptedInput::new([]);
        assert_eq!(session.play_game(Actor::Human, &mut input).unwrap(), None);
        assert_eq!(session.phase(), SessionPhase::Idle);
        assert_eq!(session.tally().games(), 0);
    }

    #[test]
    fn test_closed_session_refuses_everything() {
        let mut session = ready_session(PolicyTable::heuristic());
        session.close();
        assert_eq!(session.phase(), SessionPhase::Closed);
        assert!(matches!(session.upload(), Err(Error::SessionClosed)));
        assert!(matches!(
            session.start_game(Actor::Ai),
            Err(Error::SessionClosed)
        ));
    }
}
