//! Table transfer in line-sized pieces
//!
//! A full table rarely fits in one device line, so uploads are planned as a
//! run of `LOAD:QC` chunks closed by `LOAD:QE`. The receiving side rebuilds
//! the table with [`TableAssembler`] and rejects gaps or reordering.

use crate::{
    Error, Result,
    protocol::message::{ProtocolMessage, TABLE_VALUES, format_value},
    q_learning::PolicyTable,
};

const CHUNK_TAG_LEN: usize = "LOAD:QC,".len();

fn chunk_header_len(seq: u16) -> usize {
    CHUNK_TAG_LEN + seq.to_string().len()
}

/// The messages that carry one table across the link
#[derive(Debug, Clone, PartialEq)]
pub struct TableUpload {
    messages: Vec<ProtocolMessage>,
}

impl TableUpload {
    /// Plan an upload for a link limited to `max_line_len`. A single
    /// `LOAD:Q` line is used when it fits.
    pub fn plan(table: &PolicyTable, max_line_len: usize) -> Result<Self> {
        let whole = ProtocolMessage::LoadTable(table.clone());
        let messages = if whole.encode().len() <= max_line_len {
            vec![whole]
        } else {
            chunk_table(table, max_line_len)?
        };
        Ok(Self { messages })
    }

    pub fn messages(&self) -> &[ProtocolMessage] {
        &self.messages
    }

    pub fn is_chunked(&self) -> bool {
        self.messages.len() > 1
    }

    /// Bytes on the wire, terminators included
    pub fn wire_len(&self) -> usize {
        self.messages.iter().map(|m| m.encode().len() + 1).sum()
    }
}

/// Split `table` into chunks that each encode within `max_line_len`
pub fn chunk_table(table: &PolicyTable, max_line_len: usize) -> Result<Vec<ProtocolMessage>> {
    let too_small = || Error::InvalidConfiguration {
        message: format!("max_line_len {max_line_len} cannot carry a table chunk"),
    };

    let mut messages = Vec::new();
    let mut seq: u16 = 0;
    let mut values = Vec::new();
    let mut len = chunk_header_len(seq);

    for value in table.values() {
        let width = 1 + format_value(value).len();
        if len + width > max_line_len {
            if values.is_empty() {
                return Err(too_small());
            }
            messages.push(ProtocolMessage::LoadChunk {
                seq,
                values: std::mem::take(&mut values),
            });
            seq += 1;
            len = chunk_header_len(seq);
            if len + width > max_line_len {
                return Err(too_small());
            }
        }
        values.push(value);
        len += width;
    }
    messages.push(ProtocolMessage::LoadChunk { seq, values });

    let commit = ProtocolMessage::LoadCommit { chunks: seq + 1 };
    if commit.encode().len() > max_line_len {
        return Err(too_small());
    }
    messages.push(commit);
    Ok(messages)
}

/// Rebuilds a table from `LOAD:Q` or `LOAD:QC`/`LOAD:QE` messages
#[derive(Debug, Default)]
pub struct TableAssembler {
    next_seq: u16,
    values: Vec<f64>,
}

impl TableAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// True while a chunked transfer is partway through
    pub fn in_progress(&self) -> bool {
        self.next_seq > 0
    }

    pub fn reset(&mut self) {
        self.next_seq = 0;
        self.values.clear();
    }

    /// Feed one message. Returns the table once a transfer completes.
    ///
    /// Messages unrelated to table loading are ignored. Any sequencing
    /// fault abandons the partial transfer.
    pub fn accept(&mut self, message: &ProtocolMessage) -> Result<Option<PolicyTable>> {
        match message {
            ProtocolMessage::LoadTable(table) => {
                self.reset();
                Ok(Some(table.clone()))
            }
            ProtocolMessage::LoadChunk { seq, values } => {
                if *seq == 0 {
                    self.reset();
                }
                if *seq != self.next_seq {
                    let err = Error::ChunkSequence {
                        expected: self.next_seq,
                        got: *seq,
                    };
                    self.reset();
                    return Err(err);
                }
                if self.values.len() + values.len() > TABLE_VALUES {
                    let got = self.values.len() + values.len();
                    self.reset();
                    return Err(Error::FieldCountMismatch {
                        kind: "LOAD",
                        expected: TABLE_VALUES,
                        got,
                    });
                }
                self.values.extend_from_slice(values);
                self.next_seq += 1;
                Ok(None)
            }
            ProtocolMessage::LoadCommit { chunks } => {
                let expected = self.next_seq;
                let values = std::mem::take(&mut self.values);
                self.reset();
                if *chunks != expected || expected == 0 {
                    return Err(Error::ChunkSequence {
                        expected,
                        got: *chunks,
                    });
                }
                if values.len() != TABLE_VALUES {
                    return Err(Error::FieldCountMismatch {
                        kind: "LOAD",
                        expected: TABLE_VALUES,
                        got: values.len(),
                    });
                }
                PolicyTable::from_values(&values).map(Some)
            }
            _ => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn trained_looking_table() -> PolicyTable {
        let values: Vec<f64> = (0..TABLE_VALUES)
            .map(|i| 0.9f64.powi(i as i32 % 7) * if i % 2 == 0 { 1.0 } else { -0.31 })
            .collect();
        PolicyTable::from_values(&values).unwrap()
    }

    #[test]
    fn test_small_line_limit_forces_chunks() {
        let table = trained_looking_table();
        let upload = TableUpload::plan(&table, 64).unwrap();
        assert!(upload.is_chunked());
        let messages = upload.messages();
        assert!(messages.len() > 2);
        for message in messages {
            assert!(message.encode().len() <= 64, "{}", message.encode());
        }
        assert!(matches!(
            messages.last(),
            Some(ProtocolMessage::LoadCommit { chunks }) if *chunks as usize == messages.len() - 1
        ));
    }

    #[test]
    fn test_large_line_limit_sends_one_line() {
        let table = PolicyTable::new();
        let upload = TableUpload::plan(&table, 4096).unwrap();
        assert!(!upload.is_chunked());
        assert_eq!(upload.wire_len(), upload.messages()[0].encode().len() + 1);
        assert_eq!(upload.messages(), &[ProtocolMessage::LoadTable(table)]);
    }

    #[test]
    fn test_assembler_rebuilds_chunked_table() {
        let table = trained_looking_table();
        let mut assembler = TableAssembler::new();
        let mut rebuilt = None;
        for message in chunk_table(&table, 48).unwrap() {
            // Round trip through text as the device would see it
            let parsed = ProtocolMessage::parse(&message.encode()).unwrap();
            if let Some(done) = assembler.accept(&parsed).unwrap() {
                rebuilt = Some(done);
            }
        }
        assert!(rebuilt.unwrap().approx_eq(&table, 1e-12));
        assert!(!assembler.in_progress());
    }

    #[test]
    fn test_assembler_rejects_gap() {
        let messages = chunk_table(&trained_looking_table(), 48).unwrap();
        let mut assembler = TableAssembler::new();
        assembler.accept(&messages[0]).unwrap();
        let err = assembler.accept(&messages[2]).unwrap_err();
        assert!(matches!(
            err,
            Error::ChunkSequence {
                expected: 1,
                got: 2
            }
        ));
        assert!(!assembler.in_progress());
    }

    #[test]
    fn test_assembler_rejects_early_commit() {
        let messages = chunk_table(&trained_looking_table(), 48).unwrap();
        let mut assembler = TableAssembler::new();
        assembler.accept(&messages[0]).unwrap();
        assembler.accept(&messages[1]).unwrap();
        let err = assembler
            .accept(&ProtocolMessage::LoadCommit { chunks: 2 })
            .unwrap_err();
        assert!(matches!(err, Error::FieldCountMismatch { .. }));
    }

    #[test]
    fn test_line_limit_too_small() {
        let err = chunk_table(&trained_looking_table(), 10).unwrap_err();
        assert!(matches!(err, Error::InvalidConfiguration { .. }));
    }
}
