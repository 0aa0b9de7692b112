//! Bridge from the window to the session core: runtime and client wiring.

pub mod client;
pub mod runtime;
