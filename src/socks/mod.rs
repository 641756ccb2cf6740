//! SOCKS5 module for Socksdial
//!
//! Client side of the SOCKS5 protocol: address codec, reply status mapping
//! and the handshake state machine that turns a TCP connection to a proxy
//! into a tunnel to the destination.

mod addr;
pub mod consts;
mod handshake;
mod reply;

pub use addr::{decode_bound_address, read_address, DestinationAddr};
pub use handshake::{connect, Handshake, HandshakeState, SocksReply};
pub use reply::ReplyCode;
