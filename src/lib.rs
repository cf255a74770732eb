//! headwave receives the binary telemetry stream of a wireless EEG headset
//! over a local UDP socket and turns it into channels of derived signals:
//! raw electrode readings, alpha-band power, and an emotional-valence index,
//! each with rolling statistics (current, min, max, mean, slope) maintained
//! in constant time per sample.
//!
//! The intended consumer is a generative installation that polls a
//! [`session::TelemetrySession`] once per rendering frame and reads whatever
//! statistics it wants to visualize or sonify. That layer lives elsewhere;
//! this crate is the decoding and statistics engine plus a synthetic
//! headset ([`dummy_headset::DummyHeadset`]) for working without hardware.

#![warn(missing_docs)]
pub mod args;
pub mod channel;
pub mod dummy_headset;
pub mod frame_decoder;
pub mod session;
