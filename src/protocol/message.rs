//! Message grammar for the host/device line protocol
//!
//! Every message is a single line of comma-separated fields:
//!
//! | Message    | Line                                   |
//! |------------|----------------------------------------|
//! | LoadTable  | `LOAD:Q,<66 scores, row-major>`        |
//! | LoadChunk  | `LOAD:QC,<seq>,<scores...>`            |
//! | LoadCommit | `LOAD:QE,<chunk count>`                |
//! | MoveLog    | `LOG:Move,<Human\|AI>,<take>,<after>`  |
//! | ResultLog  | `WIN:<Human\|AI>`                      |
//! | Ack        | `ACK`                                  |
//! | Error      | `ERR:<reason>`                         |

use std::fmt::Write;

use serde::{Deserialize, Serialize};

use crate::{
    Error, Result,
    game::{ACTION_COUNT, Action, Actor, GameState, INITIAL_STONES, STATE_COUNT},
    q_learning::PolicyTable,
};

/// Field separator
pub const DELIMITER: char = ',';

/// Line terminator
pub const TERMINATOR: u8 = b'\n';

/// Number of scores carried by a full table
pub const TABLE_VALUES: usize = STATE_COUNT * ACTION_COUNT;

/// Prefixes that can start a line, used to find a message boundary inside
/// a corrupted line
pub const LINE_PREFIXES: [&str; 5] = ["LOAD:", "LOG:", "WIN:", "ERR:", "ACK"];

/// One protocol message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ProtocolMessage {
    /// Whole table in one line
    LoadTable(PolicyTable),
    /// Part of a table transfer; `seq` counts from zero
    LoadChunk { seq: u16, values: Vec<f64> },
    /// End of a chunked transfer
    LoadCommit { chunks: u16 },
    /// A move and the pile size after it
    MoveLog {
        actor: Actor,
        action: Action,
        state_after: GameState,
    },
    /// End of game
    ResultLog { winner: Actor },
    Ack,
    Error(String),
}

/// Render a score so it parses back to the same `f64`.
///
/// Very small magnitudes use exponent form to keep lines short.
pub fn format_value(value: f64) -> String {
    if value == 0.0 || value.abs() >= 1e-4 {
        format!("{value}")
    } else {
        format!("{value:e}")
    }
}

fn push_values(line: &mut String, values: impl Iterator<Item = f64>) {
    for value in values {
        line.push(DELIMITER);
        line.push_str(&format_value(value));
    }
}

impl ProtocolMessage {
    /// Short name for logs and errors
    pub fn kind(&self) -> &'static str {
        match self {
            ProtocolMessage::LoadTable(_) => "LOAD:Q",
            ProtocolMessage::LoadChunk { .. } => "LOAD:QC",
            ProtocolMessage::LoadCommit { .. } => "LOAD:QE",
            ProtocolMessage::MoveLog { .. } => "LOG:Move",
            ProtocolMessage::ResultLog { .. } => "WIN",
            ProtocolMessage::Ack => "ACK",
            ProtocolMessage::Error(_) => "ERR",
        }
    }

    /// Encode as a single line without terminator
    pub fn encode(&self) -> String {
        let mut line = String::new();
        match self {
            ProtocolMessage::LoadTable(table) => {
                line.push_str("LOAD:Q");
                push_values(&mut line, table.values());
            }
            ProtocolMessage::LoadChunk { seq, values } => {
                let _ = write!(line, "LOAD:QC,{seq}");
                push_values(&mut line, values.iter().copied());
            }
            ProtocolMessage::LoadCommit { chunks } => {
                let _ = write!(line, "LOAD:QE,{chunks}");
            }
            ProtocolMessage::MoveLog {
                actor,
                action,
                state_after,
            } => {
                let _ = write!(line, "LOG:Move,{actor},{action},{state_after}");
            }
            ProtocolMessage::ResultLog { winner } => {
                let _ = write!(line, "WIN:{winner}");
            }
            ProtocolMessage::Ack => line.push_str("ACK"),
            ProtocolMessage::Error(reason) => {
                line.push_str("ERR:");
                line.extend(reason.chars().map(|c| match c {
                    '\r' | '\n' => ' ',
                    other => other,
                }));
            }
        }
        line
    }

    /// Encode with the line terminator, ready for the channel
    pub fn frame(&self) -> Vec<u8> {
        let mut bytes = self.encode().into_bytes();
        bytes.push(TERMINATOR);
        bytes
    }

    /// Parse one line (terminator already removed)
    pub fn parse(line: &str) -> Result<Self> {
        let line = line.trim_end_matches('\r');
        if line == "ACK" {
            return Ok(ProtocolMessage::Ack);
        }

        let malformed = || Error::MalformedMessage {
            line: line.to_string(),
        };
        let (tag, body) = line.split_once(':').ok_or_else(malformed)?;
        match tag {
            "LOAD" => parse_load(line, body),
            "LOG" => parse_log(line, body),
            "WIN" => {
                let fields: Vec<&str> = body.split(DELIMITER).collect();
                if fields.len() != 1 {
                    return Err(Error::FieldCountMismatch {
                        kind: "WIN",
                        expected: 1,
                        got: fields.len(),
                    });
                }
                let winner = Actor::from_wire(fields[0]).ok_or_else(malformed)?;
                Ok(ProtocolMessage::ResultLog { winner })
            }
            "ERR" => Ok(ProtocolMessage::Error(body.to_string())),
            _ => Err(malformed()),
        }
    }
}

fn parse_value(field: &'static str, raw: &str) -> Result<f64> {
    match raw.trim().parse::<f64>() {
        Ok(value) if value.is_finite() => Ok(value),
        _ => Err(Error::ValueParseError {
            field,
            value: raw.to_string(),
        }),
    }
}

fn parse_values(raw: &[&str]) -> Result<Vec<f64>> {
    raw.iter().map(|r| parse_value("table value", r)).collect()
}

fn parse_integer<T: std::str::FromStr>(field: &'static str, raw: &str) -> Result<T> {
    raw.trim().parse::<T>().map_err(|_| Error::ValueParseError {
        field,
        value: raw.to_string(),
    })
}

fn parse_load(line: &str, body: &str) -> Result<ProtocolMessage> {
    let fields: Vec<&str> = body.split(DELIMITER).collect();
    let (subtype, rest) = fields.split_first().ok_or_else(|| Error::MalformedMessage {
        line: line.to_string(),
    })?;

    match *subtype {
        "Q" => {
            if rest.len() != TABLE_VALUES {
                return Err(Error::FieldCountMismatch {
                    kind: "LOAD:Q",
                    expected: TABLE_VALUES,
                    got: rest.len(),
                });
            }
            let values = parse_values(rest)?;
            let table = PolicyTable::from_values(&values)?;
            Ok(ProtocolMessage::LoadTable(table))
        }
        "QC" => {
            if rest.len() < 2 || rest.len() > TABLE_VALUES + 1 {
                return Err(Error::FieldCountMismatch {
                    kind: "LOAD:QC",
                    expected: 2,
                    got: rest.len(),
                });
            }
            let seq = parse_integer("chunk sequence", rest[0])?;
            let values = parse_values(&rest[1..])?;
            Ok(ProtocolMessage::LoadChunk { seq, values })
        }
        "QE" => {
            if rest.len() != 1 {
                return Err(Error::FieldCountMismatch {
                    kind: "LOAD:QE",
                    expected: 1,
                    got: rest.len(),
                });
            }
            let chunks = parse_integer("chunk count", rest[0])?;
            Ok(ProtocolMessage::LoadCommit { chunks })
        }
        _ => Err(Error::MalformedMessage {
            line: line.to_string(),
        }),
    }
}

fn parse_log(line: &str, body: &str) -> Result<ProtocolMessage> {
    let fields: Vec<&str> = body.split(DELIMITER).collect();
    if fields[0] != "Move" {
        return Err(Error::MalformedMessage {
            line: line.to_string(),
        });
    }
    if fields.len() != 4 {
        return Err(Error::FieldCountMismatch {
            kind: "LOG:Move",
            expected: 4,
            got: fields.len(),
        });
    }

    let actor = Actor::from_wire(fields[1]).ok_or_else(|| Error::MalformedMessage {
        line: line.to_string(),
    })?;
    let take: u8 = parse_integer("action", fields[2])?;
    let after: u8 = parse_integer("state", fields[3])?;

    let out_of_range = |field: &'static str, raw: &str| Error::ValueParseError {
        field,
        value: raw.to_string(),
    };
    if !(1..=3).contains(&take) {
        return Err(out_of_range("action", fields[2]));
    }
    if u16::from(after) + u16::from(take) > u16::from(INITIAL_STONES) {
        return Err(out_of_range("state", fields[3]));
    }
    let state_after = GameState::at(after).map_err(|_| out_of_range("state", fields[3]))?;
    let action = Action::from_value(take, state_after).map_err(|_| out_of_range("action", fields[2]))?;

    Ok(ProtocolMessage::MoveLog {
        actor,
        action,
        state_after,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_table() -> PolicyTable {
        let values: Vec<f64> = (0..TABLE_VALUES)
            .map(|i| (i as f64 * 0.137).sin() * 0.9)
            .collect();
        PolicyTable::from_values(&values).unwrap()
    }

    #[test]
    fn test_load_table_round_trip_within_tolerance() {
        let table = sample_table();
        let line = ProtocolMessage::LoadTable(table.clone()).encode();
        assert!(line.starts_with("LOAD:Q,"));
        assert_eq!(line.split(',').count(), TABLE_VALUES + 1);

        match ProtocolMessage::parse(&line).unwrap() {
            ProtocolMessage::LoadTable(parsed) => assert!(parsed.approx_eq(&table, 1e-6)),
            other => panic!("expected LoadTable, got {other:?}"),
        }
    }

    #[test]
    fn test_tiny_values_use_exponent_form() {
        assert_eq!(format_value(0.0), "0");
        assert_eq!(format_value(0.5), "0.5");
        let tiny = format_value(1.5e-30);
        assert!(tiny.contains('e'));
        assert_eq!(tiny.parse::<f64>().unwrap(), 1.5e-30);
    }

    #[test]
    fn test_event_lines() {
        let move_log = ProtocolMessage::MoveLog {
            actor: Actor::Ai,
            action: Action::Take3,
            state_after: GameState::at(18).unwrap(),
        };
        assert_eq!(move_log.encode(), "LOG:Move,AI,3,18");
        assert_eq!(ProtocolMessage::parse("LOG:Move,AI,3,18").unwrap(), move_log);

        assert_eq!(
            ProtocolMessage::parse("WIN:Human").unwrap(),
            ProtocolMessage::ResultLog {
                winner: Actor::Human
            }
        );
        assert_eq!(ProtocolMessage::parse("ACK\r").unwrap(), ProtocolMessage::Ack);
        assert_eq!(
            ProtocolMessage::parse("ERR:bad row").unwrap(),
            ProtocolMessage::Error("bad row".to_string())
        );
        assert_eq!(ProtocolMessage::Ack.frame(), b"ACK\n".to_vec());
    }

    #[test]
    fn test_unknown_tags_are_malformed() {
        for line in ["HELLO", "PING:1", "LOAD:X,1", "LOG:Jump,AI,1,2", "WIN:Robot", ""] {
            let err = ProtocolMessage::parse(line).unwrap_err();
            assert!(
                matches!(err, Error::MalformedMessage { .. }),
                "{line:?} gave {err:?}"
            );
        }
    }

    #[test]
    fn test_wrong_arity_is_field_count_mismatch() {
        let short_table = format!("LOAD:Q{}", ",0.1".repeat(65));
        for line in [
            short_table.as_str(),
            "LOG:Move,AI,3",
            "LOG:Move,AI,3,18,extra",
            "WIN:AI,Human",
            "LOAD:QE,1,2",
            "LOAD:QC,0",
        ] {
            let err = ProtocolMessage::parse(line).unwrap_err();
            assert!(
                matches!(err, Error::FieldCountMismatch { .. }),
                "{line:?} gave {err:?}"
            );
        }
    }

    #[test]
    fn test_bad_numbers_are_value_parse_errors() {
        let mut fields = vec!["0.1"; TABLE_VALUES];
        fields[40] = "zero";
        let bad_table = format!("LOAD:Q,{}", fields.join(","));
        fields[40] = "NaN";
        let nan_table = format!("LOAD:Q,{}", fields.join(","));
        for line in [
            bad_table.as_str(),
            nan_table.as_str(),
            "LOG:Move,Human,x,18",
            "LOG:Move,Human,4,10",
            "LOG:Move,Human,2,22",
            "LOG:Move,Human,3,20",
            "LOAD:QC,-1,0.5",
            "LOAD:QE,many",
        ] {
            let err = ProtocolMessage::parse(line).unwrap_err();
            assert!(
                matches!(err, Error::ValueParseError { .. }),
                "{line:?} gave {err:?}"
            );
        }
    }

    #[test]
    fn test_error_reason_cannot_break_framing() {
        let message = ProtocolMessage::Error("two\nlines".to_string());
        assert_eq!(message.encode(), "ERR:two lines");
    }
}
