//! UI layer for the desktop control surface.

pub mod app;

pub use app::ControlSurfaceApp;
