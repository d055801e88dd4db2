//! keypipe: three-worker keystroke translation pipeline.
//!
//! An input reader fans raw keystrokes out to a renderer and a translator over
//! one-directional pipes. The translator edits a buffer driven by sentinel bytes
//! and ships it to the renderer on commit.

#[cfg(not(unix))]
compile_error!("keypipe requires a unix platform (pipes and termios)");

mod input;
mod render;

pub mod bridge;
pub mod config;
pub mod error;
pub mod pipeline;
pub mod shutdown;
pub mod terminal;
pub mod translator;

pub use config::PipelineConfig;
pub use error::{ChannelError, PipelineError, TerminalError};
pub use input::InputReader;
pub use pipeline::{Pipeline, PipelineExit, Role};
pub use render::{Renderer, format_commit};
pub use shutdown::{Shutdown, ShutdownMode};
pub use terminal::{NoopTerminal, RawTerminal, TerminalMode};
pub use translator::{BufferFull, EditBuffer, Transition, Translator, TranslatorWorker};
