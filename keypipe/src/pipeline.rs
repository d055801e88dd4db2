//! Pipeline - wires the three workers together and waits for them.
//!
//! Flow:
//! 1. Create raw→render, raw→translate, translate→render pipe channels
//! 2. Spawn input reader, translator, renderer
//! 3. Stop all three on a shutdown sentinel, a signal, or a worker failure
//! 4. Report how the pipeline ended

use std::future::Future;
use std::sync::Arc;

use tokio::io::{AsyncRead, AsyncWrite};
use tokio::task::JoinHandle;

use crate::bridge::protocol::ChannelId;
use crate::bridge::transport::pipe_channel;
use crate::config::PipelineConfig;
use crate::error::PipelineError;
use crate::input::InputReader;
use crate::render::Renderer;
use crate::shutdown::{Shutdown, ShutdownMode};
use crate::terminal::TerminalMode;
use crate::translator::{Translator, TranslatorWorker};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Input,
    Translator,
    Renderer,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Input => "input",
            Self::Translator => "translator",
            Self::Renderer => "renderer",
        }
    }
}

/// How a pipeline run ended, when it ended without a transport failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineExit {
    /// A shutdown sentinel or signal stopped the pipeline.
    Shutdown(ShutdownMode),
    /// The terminal reached end of file; downstream workers drained and stopped.
    InputClosed,
    /// Cancelled through the shutdown handle without a mode.
    Cancelled,
}

impl PipelineExit {
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Shutdown(_) => 0,
            Self::InputClosed | Self::Cancelled => 1,
        }
    }
}

pub struct Pipeline {
    config: PipelineConfig,
    shutdown: Shutdown,
}

impl Pipeline {
    pub fn new(config: PipelineConfig, terminal: Arc<dyn TerminalMode>) -> Self {
        Self {
            config,
            shutdown: Shutdown::new(terminal),
        }
    }

    /// Handle for stopping the pipeline from outside (signal handlers).
    pub fn shutdown_handle(&self) -> Shutdown {
        self.shutdown.clone()
    }

    /// Run the three workers until they have all stopped.
    ///
    /// Channel creation failure is returned before any worker starts.
    pub async fn run<I, O>(self, input: I, output: O) -> Result<PipelineExit, PipelineError>
    where
        I: AsyncRead + Unpin + Send + 'static,
        O: AsyncWrite + Unpin + Send + 'static,
    {
        let framing = self.config.framing;
        let (render_tx, render_rx) = pipe_channel(ChannelId::RawToRender, framing)?;
        let (translate_tx, translate_rx) = pipe_channel(ChannelId::RawToTranslate, framing)?;
        let (commit_tx, commit_rx) = pipe_channel(ChannelId::TranslateToRender, framing)?;

        tracing::info!(?framing, capacity = self.config.capacity, "Starting pipeline");

        let reader = InputReader::new(input, render_tx, translate_tx);
        let translator = TranslatorWorker::new(
            Translator::with_capacity(self.config.capacity),
            translate_rx,
            commit_tx,
        );
        let renderer = Renderer::new(render_rx, commit_rx, output);

        let cancel = self.shutdown.token();
        let input_task = spawn_worker(Role::Input, &self.shutdown, reader.run(cancel));

        let shutdown = self.shutdown.clone();
        let translator_task = spawn_worker(Role::Translator, &self.shutdown, async move {
            translator.run(shutdown).await.map(|_| ())
        });

        let cancel = self.shutdown.token();
        let renderer_task = spawn_worker(Role::Renderer, &self.shutdown, async move {
            renderer.run(cancel).await.map(|_| ())
        });

        let (input_res, translator_res, renderer_res) =
            tokio::join!(input_task, translator_task, renderer_task);
        let results = [input_res?, translator_res?, renderer_res?];

        if let Some(mode) = self.shutdown.mode() {
            tracing::info!(mode = mode.as_str(), "Pipeline stopped");
            return Ok(PipelineExit::Shutdown(mode));
        }

        let mut input_closed = false;
        for result in results {
            match result {
                Ok(()) => {}
                Err(PipelineError::InputClosed) => input_closed = true,
                Err(e) => return Err(e),
            }
        }

        if input_closed {
            Ok(PipelineExit::InputClosed)
        } else {
            Ok(PipelineExit::Cancelled)
        }
    }
}

/// Spawn one worker. Any failure other than end of input stops the others.
fn spawn_worker<F>(
    role: Role,
    shutdown: &Shutdown,
    work: F,
) -> JoinHandle<Result<(), PipelineError>>
where
    F: Future<Output = Result<(), PipelineError>> + Send + 'static,
{
    announce(role);
    let shutdown = shutdown.clone();

    tokio::spawn(async move {
        tracing::debug!(role = role.as_str(), "Worker started");
        let result = work.await;

        match &result {
            Ok(()) => tracing::debug!(role = role.as_str(), "Worker stopped"),
            Err(PipelineError::InputClosed) => {
                tracing::debug!(role = role.as_str(), "Input closed, letting workers drain")
            }
            Err(e) => {
                tracing::error!(
                    role = role.as_str(),
                    error = %e,
                    "Worker failed, stopping pipeline"
                );
                shutdown.abort();
            }
        }
        result
    })
}

/// Identification line on stderr. Diagnostic only.
fn announce(role: Role) {
    // Workers are tasks in one host process, so every role reports the same IDs.
    eprint!(
        "\r{} worker - process ID:{}  parent ID:{}\n\r",
        role.as_str(),
        std::process::id(),
        nix::unistd::getppid()
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::codec::Framing;
    use crate::render::format_commit;
    use crate::shutdown::tests::RecordingTerminal;
    use tokio::io::AsyncReadExt;

    async fn run_with_input(
        config: PipelineConfig,
        input: &'static [u8],
    ) -> (PipelineExit, Vec<u8>, Arc<RecordingTerminal>) {
        let terminal = Arc::new(RecordingTerminal::default());
        let (screen_w, mut screen_r) = tokio::io::duplex(64 * 1024);

        let exit = Pipeline::new(config, terminal.clone())
            .run(input, screen_w)
            .await
            .unwrap();

        let mut screen = Vec::new();
        screen_r.read_to_end(&mut screen).await.unwrap();
        (exit, screen, terminal)
    }

    #[tokio::test]
    async fn end_of_input_drains_and_reports() {
        for framing in [Framing::LengthDelimited, Framing::FixedRecord] {
            let config = PipelineConfig::new().with_framing(framing);
            let (exit, screen, terminal) = run_with_input(config, b"abaXE").await;

            assert_eq!(exit, PipelineExit::InputClosed);
            assert_eq!(exit.exit_code(), 1);
            assert_eq!(terminal.restores(), 0);

            let mut expected = b"abaXE".to_vec();
            expected.extend(format_commit(b"zbE"));
            assert_eq!(screen, expected, "framing {framing:?}");
        }
    }

    #[tokio::test]
    async fn terminate_sentinel_restores_terminal() {
        let (exit, _screen, terminal) = run_with_input(PipelineConfig::new(), b"hiETmore").await;

        assert_eq!(exit, PipelineExit::Shutdown(ShutdownMode::Graceful));
        assert_eq!(exit.exit_code(), 0);
        assert_eq!(terminal.restores(), 1);
    }

    #[tokio::test]
    async fn force_terminate_sentinel_leaves_terminal() {
        let (exit, _screen, terminal) = run_with_input(PipelineConfig::new(), b"hi\x0bE").await;

        assert_eq!(exit, PipelineExit::Shutdown(ShutdownMode::Abrupt));
        assert_eq!(exit.exit_code(), 0);
        assert_eq!(terminal.restores(), 0);
    }

    #[tokio::test]
    async fn external_trigger_stops_blocked_workers() {
        let terminal = Arc::new(RecordingTerminal::default());
        let (_keyboard, input) = tokio::io::duplex(16);
        let pipeline = Pipeline::new(PipelineConfig::default(), terminal.clone());
        let handle = pipeline.shutdown_handle();

        tokio::spawn(async move {
            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
            handle.trigger(ShutdownMode::Graceful);
        });

        let exit = pipeline.run(input, tokio::io::sink()).await.unwrap();
        assert_eq!(exit, PipelineExit::Shutdown(ShutdownMode::Graceful));
        assert_eq!(terminal.restores(), 1);
    }

    #[test]
    fn role_names() {
        assert_eq!(Role::Input.as_str(), "input");
        assert_eq!(Role::Translator.as_str(), "translator");
        assert_eq!(Role::Renderer.as_str(), "renderer");
    }
}
