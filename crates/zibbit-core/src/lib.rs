// Library root: the live-update engine for the Zibbit storytelling game.
//
// Everything a client session needs lives here (state mirror, event
// reconciliation, rendering, timers, transport). Frontends only consume
// `UiUpdate`s and produce `UserCommand`s.

pub mod actions;
pub mod app;
pub mod color;
pub mod config;
pub mod protocol;
pub mod push_channel;
pub mod reconciler;
pub mod render;
pub mod scheduler;
pub mod state;
pub mod time;
