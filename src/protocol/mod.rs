//! Line protocol between the host and the game device
//!
//! - [`message`]: the message grammar, one line per message
//! - [`codec`]: byte stream framing with resynchronisation
//! - [`chunk`]: splitting and reassembling table uploads
//! - [`link`]: serial character framing

pub mod chunk;
pub mod codec;
pub mod link;
pub mod message;

pub use chunk::{TableAssembler, TableUpload, chunk_table};
pub use codec::{DEFAULT_MAX_LINE_LEN, LineFramer, ProtocolConfig};
pub use link::{LinkSettings, Parity};
pub use message::{ProtocolMessage, TABLE_VALUES, format_value};
