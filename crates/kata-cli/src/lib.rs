//! Interactive front end for kata challenges.
//!
//! The `kata` binary wires these pieces together: configuration, the
//! terminal keypress router, the session controller, and console rendering.

pub mod config;
pub mod keys;
pub mod render;
pub mod session;

pub use keys::{Key, KeyRouter, KeySource, TerminalKeys};
pub use session::{Console, Exit, FileSolution, Session, SessionController, SolutionSource};
