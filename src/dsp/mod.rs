//! DSP — panning, reverb and rendering for the 8D effect.
//!
//! The same code drives both the live preview (AudioWorklet via WASM, or a
//! native audio callback) and the offline WAV render.

pub mod buffer;
pub mod convolver;
pub mod delay;
pub mod impulse;
pub mod mixer;
pub mod panner;
pub mod realtime;
pub mod renderer;
pub mod strategy;
pub mod tone;
