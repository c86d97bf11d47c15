//! SOCKS5 command parsing module
//!
//! Handles parsing the client's request and building replies.

mod parser;
mod reply;

pub use parser::parse_command;
pub use reply::{build_reply, send_success};
