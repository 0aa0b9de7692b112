//! Controller layer: operator actions collected while rendering and applied
//! through the session controller afterwards.

pub mod events;
pub mod orchestration;
