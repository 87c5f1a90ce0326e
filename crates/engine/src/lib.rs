//! FrameReel Engine
//!
//! Wires the frame store, directory watcher, scheduler, and GIF exporter
//! into one control-thread object.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────┐
//! │                        Engine                        │
//! │  ┌──────────────┐   inbox   ┌────────────┐           │
//! │  │ Directory    │ ────────▶ │ FrameStore │           │
//! │  │ Watcher      │           └─────┬──────┘           │
//! │  └──────────────┘                 │ snapshot         │
//! │                       ┌───────────┼──────────┐       │
//! │                       ▼           ▼          ▼       │
//! │                 ┌──────────┐ ┌─────────┐ ┌────────┐  │
//! │                 │Scheduler │ │Preloader│ │  GIF   │  │
//! │                 │ + clock  │ │ thread  │ │ export │  │
//! │                 └────┬─────┘ └────┬────┘ └────────┘  │
//! │                      ▼            ▼                  │
//! │              EngineEvent notifications               │
//! └──────────────────────────────────────────────────────┘
//! ```
//!
//! All store mutation happens on the thread that owns the [`Engine`]; the
//! watch thread and the preloader only communicate through channels.

pub mod engine;
pub mod event;
pub mod preload;

pub use engine::*;
pub use event::EngineEvent;
