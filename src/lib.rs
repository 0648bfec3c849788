//! Host-side filing system server for the BBC Micro BeebLink protocol:
//! lets a BBC Micro treat files and directories on this machine as a disc
//! filing system, reached over USB, a serial link, or HTTP.

pub mod config;
pub mod dispatcher;
pub mod error;
pub mod fs;
pub mod gitattributes;
pub mod proto;
pub mod server;
pub mod session;
pub mod transport;
