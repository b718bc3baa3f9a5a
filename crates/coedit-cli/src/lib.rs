//! Terminal front end for the coedit client.
//!
//! Every stdin line is either an answer to an open prompt or an editing
//! command. Notices, child page listings and buffer replacements are written
//! to the terminal.
//!
//! ## Module Structure
//!
//! - `command`: line commands (`:set`, `:show`, ...)
//! - `terminal`: prompts, notices and the child page list

pub mod command;
pub mod terminal;

pub use command::Command;
pub use terminal::{Terminal, print_events};
