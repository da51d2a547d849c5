//! Human input adapters

use std::{
    collections::VecDeque,
    io::{BufRead, Write},
};

use crate::{
    Error, Result,
    game::{Action, GameState},
    ports::HumanInput,
};

/// Reads moves typed as `1`, `2` or `3`; `q` or end of input quits
pub struct LineInput<R, W> {
    reader: R,
    prompt: W,
}

impl<R: BufRead, W: Write> LineInput<R, W> {
    pub fn new(reader: R, prompt: W) -> Self {
        Self { reader, prompt }
    }
}

impl LineInput<std::io::StdinLock<'static>, std::io::Stdout> {
    pub fn stdin() -> Self {
        Self::new(std::io::stdin().lock(), std::io::stdout())
    }
}

impl<R: BufRead, W: Write> HumanInput for LineInput<R, W> {
    fn next_action(&mut self, state: GameState) -> Result<Option<Action>> {
        loop {
            write!(self.prompt, "{state} stones left, take 1-3 (q to quit): ")?;
            self.prompt.flush()?;

            let mut line = String::new();
            if self.reader.read_line(&mut line)? == 0 {
                return Ok(None);
            }
            let answer = line.trim();
            if answer.eq_ignore_ascii_case("q") {
                return Ok(None);
            }
            match answer.parse::<u8>().ok().and_then(|take| {
                Action::from_value(take, state).ok()
            }) {
                Some(action) => return Ok(Some(action)),
                None => writeln!(self.prompt, "enter 1, 2 or 3")?,
            }
        }
    }

    fn reject(&mut self, _state: GameState, error: &Error) {
        let _ = writeln!(self.prompt, "{error}");
    }
}

/// Plays a fixed list of moves, then quits
#[derive(Debug, Clone, Default)]
pub struct ScriptedInput {
    moves: VecDeque<Action>,
    rejections: usize,
}

impl ScriptedInput {
    pub fn new(moves: impl IntoIterator<Item = Action>) -> Self {
        Self {
            moves: moves.into_iter().collect(),
            rejections: 0,
        }
    }

    /// Moves refused by the session so far
    pub fn rejections(&self) -> usize {
        self.rejections
    }

    pub fn remaining(&self) -> usize {
        self.moves.len()
    }
}

impl HumanInput for ScriptedInput {
    fn next_action(&mut self, _state: GameState) -> Result<Option<Action>> {
        Ok(self.moves.pop_front())
    }

    fn reject(&mut self, _state: GameState, _error: &Error) {
        self.rejections += 1;
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;

    #[test]
    fn test_line_input_reprompts_on_garbage() {
        let mut input = LineInput::new(Cursor::new("7\nabc\n2\n"), Vec::new());
        let action = input.next_action(GameState::new()).unwrap();
        assert_eq!(action, Some(Action::Take2));
        let shown = String::from_utf8(input.prompt).unwrap();
        assert_eq!(shown.matches("enter 1, 2 or 3").count(), 2);
    }

    #[test]
    fn test_line_input_quits() {
        let mut input = LineInput::new(Cursor::new("q\n"), Vec::new());
        assert_eq!(input.next_action(GameState::new()).unwrap(), None);
        let mut input = LineInput::new(Cursor::new(""), Vec::new());
        assert_eq!(input.next_action(GameState::new()).unwrap(), None);
    }

    #[test]
    fn test_scripted_input_counts_rejections() {
        let mut input = ScriptedInput::new([Action::Take3]);
        input.reject(GameState::new(), &Error::GameOver);
        assert_eq!(input.rejections(), 1);
        assert_eq!(input.next_action(GameState::new()).unwrap(), Some(Action::Take3));
        assert_eq!(input.next_action(GameState::new()).unwrap(), None);
    }
}
