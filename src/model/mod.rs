pub mod jid;
pub mod packet;

pub use jid::Jid;
pub use packet::{InboundEvent, Message, MessageKind, Packet};
