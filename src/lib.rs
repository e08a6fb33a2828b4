//! Terminal client for the Brand Voice tone-rewriting service.
//!
//! The crate talks to the rewriting backend over HTTP, keeps the current
//! tone/result/in-flight state in a [`session::Session`], and plays results
//! aloud through a local espeak-ng synthesizer behind the
//! [`synth::SpeechSynthesizer`] trait.

pub mod config_loader;
pub mod error;
pub mod gateway;
pub mod playback;
pub mod service;
pub mod session;
pub mod synth;
pub mod voices;

pub use error::{Result, RevoiceError};
