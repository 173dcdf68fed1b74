// Vesper SpeechSynthesizer capability agent
//
// Consumes `SpeechSynthesizer.Speak` directives, acquires foreground focus on
// the dialog channel, drives the speech media player, publishes playback
// state to the context manager, and emits SpeechStarted/SpeechFinished
// events.

pub mod config;
pub mod synthesizer;
pub mod types;

pub use config::SpeechSynthesizerConfig;
pub use synthesizer::SpeechSynthesizer;
pub use types::{SpeechSynthesizerObserver, SpeechSynthesizerState};
