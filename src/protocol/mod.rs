/// Wire protocol: one JSON object per line over a TCP stream.
/// `packet` defines the tagged packet type, `codec` turns lines into packets and back.

pub mod codec;
pub mod packet;

pub use codec::{decode, encode, read_packet, write_packet};
pub use packet::Packet;
