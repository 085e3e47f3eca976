//! Link protocol: transaction steps, preset handshakes, request packets, and
//! response parsers.

pub mod packet;
pub mod presets;
pub mod response;
pub mod step;
pub mod wire;

pub use packet::{format_length_field, PacketError, PacketRequest};
pub use response::{parse_program_content, parse_program_titles};
pub use step::{Direction, Expect, StepAction, TransactionSequence, TransactionStep, TransferMode};
pub use wire::parse_hex;
