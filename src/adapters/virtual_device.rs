//! In-process stand-in for the game device
//!
//! [`VirtualDevice`] speaks the line protocol the way the firmware does: it
//! reassembles table uploads and acknowledges them, mirrors the pile from
//! the host's move logs, and reports button presses as `LOG:Move,Human,...`
//! lines. It answers synchronously, so `recv` never blocks; an empty outbox
//! behaves like an elapsed timeout.
//!
//! Faults can be injected for testing: withheld or refused acks, raw bytes,
//! fragmented deliveries and peer disconnects.

use std::{collections::VecDeque, time::Duration};

use crate::{
    Error, Result,
    game::{Action, Actor, GameState, apply},
    ports::Channel,
    protocol::{DEFAULT_MAX_LINE_LEN, LineFramer, ProtocolMessage, TableAssembler},
    q_learning::PolicyTable,
};

const REASON_LIMIT: usize = 40;

/// How the device answers a completed table upload
#[derive(Debug, Clone, PartialEq)]
pub enum AckPolicy {
    /// `ACK` every upload
    Always,
    /// Swallow the next `n` acks, then behave normally
    DropNext(usize),
    /// Never acknowledge
    Never,
    /// Answer every upload with `ERR:<reason>`
    Reject(String),
}

#[derive(Debug)]
pub struct VirtualDevice {
    framer: LineFramer,
    assembler: TableAssembler,
    table: Option<PolicyTable>,
    stones: Option<GameState>,
    ack_policy: AckPolicy,
    fragment_size: Option<usize>,
    outbox: VecDeque<Vec<u8>>,
    received: Vec<ProtocolMessage>,
    rejected_lines: usize,
    uploads: usize,
    closed: bool,
    disconnected: bool,
}

impl VirtualDevice {
    pub fn new() -> Self {
        Self::with_max_line_len(DEFAULT_MAX_LINE_LEN)
    }

    pub fn with_max_line_len(max_line_len: usize) -> Self {
        Self {
            framer: LineFramer::new(max_line_len),
            assembler: TableAssembler::new(),
            table: None,
            stones: None,
            ack_policy: AckPolicy::Always,
            fragment_size: None,
            outbox: VecDeque::new(),
            received: Vec::new(),
            rejected_lines: 0,
            uploads: 0,
            closed: false,
            disconnected: false,
        }
    }

    pub fn with_ack_policy(mut self, policy: AckPolicy) -> Self {
        self.ack_policy = policy;
        self
    }

    /// Deliver outgoing lines in pieces of at most `size` bytes
    pub fn with_fragment_size(mut self, size: usize) -> Self {
        self.fragment_size = Some(size.max(1));
        self
    }

    pub fn set_ack_policy(&mut self, policy: AckPolicy) {
        self.ack_policy = policy;
    }

    /// Table currently held in device memory
    pub fn loaded_table(&self) -> Option<&PolicyTable> {
        self.table.as_ref()
    }

    /// Completed uploads so far
    pub fn uploads(&self) -> usize {
        self.uploads
    }

    /// Pile size as displayed on the device
    pub fn stones(&self) -> Option<GameState> {
        self.stones
    }

    /// Put the display at `state`, as when the host starts a game mid-pile
    pub fn set_stones(&mut self, state: GameState) {
        self.stones = Some(state);
    }

    /// Every message decoded from the host, in order
    pub fn received(&self) -> &[ProtocolMessage] {
        &self.received
    }

    /// Lines from the host that failed to decode
    pub fn rejected_lines(&self) -> usize {
        self.rejected_lines
    }

    /// Simulate the player pressing the button for `action`.
    ///
    /// # Errors
    ///
    /// [`Error::GameOver`] when no game is displayed, and
    /// [`Error::IllegalMove`] when the pile is too small.
    pub fn press(&mut self, action: Action) -> Result<()> {
        let state = self.stones.ok_or(Error::GameOver)?;
        if state.is_terminal() {
            return Err(Error::GameOver);
        }
        let transition = apply(state, action, Actor::Human).map_err(|_| Error::IllegalMove {
            actor: Actor::Human.to_string(),
            take: action.value(),
            stones: state.stones(),
        })?;
        self.stones = Some(transition.next_state);
        self.queue(&ProtocolMessage::MoveLog {
            actor: Actor::Human,
            action,
            state_after: transition.next_state,
        });
        Ok(())
    }

    /// Queue bytes exactly as given, bypassing framing
    pub fn inject_raw(&mut self, bytes: &[u8]) {
        self.outbox.push_back(bytes.to_vec());
    }

    /// Peer goes away; pending output is still delivered first
    pub fn disconnect(&mut self) {
        self.disconnected = true;
    }

    fn queue(&mut self, message: &ProtocolMessage) {
        let frame = message.frame();
        match self.fragment_size {
            Some(size) => self
                .outbox
                .extend(frame.chunks(size).map(|piece| piece.to_vec())),
            None => self.outbox.push_back(frame),
        }
    }

    fn acknowledge(&mut self) {
        let reply = match &mut self.ack_policy {
            AckPolicy::Always => Some(ProtocolMessage::Ack),
            AckPolicy::DropNext(0) => {
                self.ack_policy = AckPolicy::Always;
                Some(ProtocolMessage::Ack)
            }
            AckPolicy::DropNext(remaining) => {
                *remaining -= 1;
                None
            }
            AckPolicy::Never => None,
            AckPolicy::Reject(reason) => Some(ProtocolMessage::Error(reason.clone())),
        };
        if let Some(reply) = reply {
            self.queue(&reply);
        }
    }

    /// Firmware replies are short; keep them inside one line
    fn report(&mut self, err: &Error) {
        let reason: String = err.to_string().chars().take(REASON_LIMIT).collect();
        self.queue(&ProtocolMessage::Error(reason));
    }

    fn handle(&mut self, message: ProtocolMessage) {
        match self.assembler.accept(&message) {
            Ok(Some(table)) => {
                if !matches!(self.ack_policy, AckPolicy::Reject(_)) {
                    self.table = Some(table);
                    self.uploads += 1;
                    self.stones = Some(GameState::new());
                }
                self.acknowledge();
            }
            Ok(None) => {}
            Err(err) => self.report(&err),
        }

        match &message {
            ProtocolMessage::MoveLog { state_after, .. } => self.stones = Some(*state_after),
            ProtocolMessage::ResultLog { .. } => self.stones = Some(GameState::new()),
            _ => {}
        }
        self.received.push(message);
    }
}

impl Default for VirtualDevice {
    fn default() -> Self {
        Self::new()
    }
}

impl Channel for VirtualDevice {
    fn send(&mut self, bytes: &[u8]) -> Result<()> {
        if self.closed || self.disconnected {
            return Err(Error::ChannelClosed);
        }
        self.framer.push(bytes);
        while let Some(decoded) = self.framer.next_message() {
            match decoded {
                Ok(message) => self.handle(message),
                Err(err) => {
                    self.rejected_lines += 1;
                    self.report(&err);
                }
            }
        }
        Ok(())
    }

    fn recv(&mut self, _timeout: Duration) -> Result<Option<Vec<u8>>> {
        if self.closed {
            return Err(Error::ChannelClosed);
        }
        match self.outbox.pop_front() {
            Some(bytes) => Ok(Some(bytes)),
            None if self.disconnected => Err(Error::ChannelClosed),
            None => Ok(None),
        }
    }

    fn close(&mut self) {
        self.closed = true;
        self.outbox.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::TableUpload;

    fn drain(device: &mut VirtualDevice) -> Vec<ProtocolMessage> {
        let mut framer = LineFramer::default();
        while let Some(bytes) = device.recv(Duration::ZERO).unwrap() {
            framer.push(&bytes);
        }
        std::iter::from_fn(|| framer.next_message())
            .map(|m| m.unwrap())
            .collect()
    }

    #[test]
    fn test_chunked_upload_is_acknowledged_once() {
        let mut device = VirtualDevice::new();
        let table = PolicyTable::heuristic();
        for message in TableUpload::plan(&table, 64).unwrap().messages() {
            device.send(&message.frame()).unwrap();
        }

        assert_eq!(drain(&mut device), vec![ProtocolMessage::Ack]);
        assert_eq!(device.loaded_table(), Some(&table));
        assert_eq!(device.stones(), Some(GameState::new()));
    }

    #[test]
    fn test_press_reports_human_move() {
        let mut device = VirtualDevice::new();
        device.set_stones(GameState::at(5).unwrap());
        device.press(Action::Take2).unwrap();

        assert_eq!(
            drain(&mut device),
            vec![ProtocolMessage::MoveLog {
                actor: Actor::Human,
                action: Action::Take2,
                state_after: GameState::at(3).unwrap(),
            }]
        );
        device.set_stones(GameState::at(1).unwrap());
        assert!(matches!(
            device.press(Action::Take3),
            Err(Error::IllegalMove { .. })
        ));
    }

    #[test]
    fn test_dropped_ack_then_normal() {
        let mut device = VirtualDevice::new().with_ack_policy(AckPolicy::DropNext(1));
        let frame = ProtocolMessage::LoadTable(PolicyTable::new()).frame();
        device.send(&frame).unwrap();
        assert!(drain(&mut device).is_empty());
        device.send(&frame).unwrap();
        assert_eq!(drain(&mut device), vec![ProtocolMessage::Ack]);
    }

    #[test]
    fn test_garbage_from_host_gets_error_reply() {
        let mut device = VirtualDevice::new();
        device.send(b"HELLO\n").unwrap();
        assert_eq!(device.rejected_lines(), 1);
        assert!(matches!(
            drain(&mut device).as_slice(),
            [ProtocolMessage::Error(_)]
        ));
    }

    #[test]
    fn test_disconnect_after_pending_output() {
        let mut device = VirtualDevice::new();
        device.inject_raw(b"ACK\n");
        device.disconnect();
        assert!(device.recv(Duration::ZERO).unwrap().is_some());
        assert!(matches!(
            device.recv(Duration::ZERO),
            Err(Error::ChannelClosed)
        ));
        assert!(matches!(device.send(b"ACK\n"), Err(Error::ChannelClosed)));
    }
}
