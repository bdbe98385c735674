//! Speech front end
//!
//! Recognition and synthesis are delegated to external programs. Recognition
//! failures degrade to empty input; synthesis failures are returned to the
//! caller as a typed error.

pub mod recognizer;
pub mod synthesizer;

pub use recognizer::{get_speech_input, CommandRecognizer, RecognitionError, SpeechRecognizer};
pub use synthesizer::{CommandSynthesizer, SpeechSynthesizer, SynthesisError, SAMPLE_RATE};
