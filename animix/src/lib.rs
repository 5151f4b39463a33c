//! Track-based animation mixing: plays queued animations on independent tracks, crossfades
//! between them and reports lifecycle events to listeners.
//!
//! The pose type is a parameter. Timelines that know how to pose it are supplied through the
//! [`Timeline`] trait; this crate only decides when and with what weight they are applied.

#![forbid(unsafe_code)]

mod error;
mod model;
mod runtime;

#[cfg(feature = "json")]
mod config;

pub use error::*;
pub use model::*;
pub use runtime::*;
