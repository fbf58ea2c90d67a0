use crate::formatter::LogFormat;
use std::path::PathBuf;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{filter::Directive, EnvFilter, Layer, Registry};

/// A worker guard returned by the file layer.
///
/// When a guard is dropped, all events currently in-memory are flushed to the log file this guard
/// belongs to.
pub type FileWorkerGuard = WorkerGuard;

/// A boxed tracing [Layer].
pub(crate) type BoxedLayer<S> = Box<dyn Layer<S> + Send + Sync>;

/// Default [directives](Directive) for [`EnvFilter`] which disables high-frequency debug logs
/// from the RPC server.
const DEFAULT_ENV_FILTER_DIRECTIVES: [&str; 2] = ["jsonrpsee=info", "hyper=info"];

/// Manages the collection of layers for a tracing subscriber.
pub(crate) struct Layers {
    inner: Vec<BoxedLayer<Registry>>,
}

impl Layers {
    pub(crate) const fn new() -> Self {
        Self { inner: vec![] }
    }

    pub(crate) fn into_inner(self) -> Vec<BoxedLayer<Registry>> {
        self.inner
    }

    /// Adds a stdout layer with the given format and filters.
    pub(crate) fn stdout(
        &mut self,
        format: LogFormat,
        default_directive: Directive,
        filters: &str,
        color: Option<String>,
    ) -> eyre::Result<()> {
        let filter = build_env_filter(Some(default_directive), filters)?;
        let layer = format.apply(filter, color, None);
        self.inner.push(layer);
        Ok(())
    }

    /// Adds a non-blocking file layer. Events are flushed while the returned guard lives.
    pub(crate) fn file(
        &mut self,
        format: LogFormat,
        filter: &str,
        file_info: FileInfo,
    ) -> eyre::Result<FileWorkerGuard> {
        let (writer, guard) = file_info.create_log_writer()?;
        let file_filter = build_env_filter(None, filter)?;
        let layer = format.apply(file_filter, None, Some(writer));
        self.inner.push(layer);
        Ok(guard)
    }
}

impl std::fmt::Debug for Layers {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Layers").field("layers", &self.inner.len()).finish()
    }
}

/// Holds configuration information for file logging.
#[derive(Debug, Clone)]
pub struct FileInfo {
    dir: PathBuf,
    file_name: String,
}

impl FileInfo {
    /// Creates a new `FileInfo` instance.
    pub const fn new(dir: PathBuf, file_name: String) -> Self {
        Self { dir, file_name }
    }

    /// Creates the log directory if needed and returns a non-blocking writer appending to the
    /// log file.
    fn create_log_writer(
        &self,
    ) -> eyre::Result<(tracing_appender::non_blocking::NonBlocking, WorkerGuard)> {
        std::fs::create_dir_all(&self.dir)
            .map_err(|err| eyre::eyre!("could not create log directory {:?}: {err}", self.dir))?;
        let appender = tracing_appender::rolling::never(&self.dir, &self.file_name);
        Ok(tracing_appender::non_blocking(appender))
    }
}

/// Builds an environment filter for tracing with the given directives.
///
/// Directives in `RUST_LOG` are applied on top of `default_directive`, followed by the
/// comma separated `directives`.
pub(crate) fn build_env_filter(
    default_directive: Option<Directive>,
    directives: &str,
) -> eyre::Result<EnvFilter> {
    let env_filter = if let Some(default_directive) = default_directive {
        EnvFilter::builder().with_default_directive(default_directive).from_env_lossy()
    } else {
        EnvFilter::builder().from_env_lossy()
    };

    DEFAULT_ENV_FILTER_DIRECTIVES
        .into_iter()
        .chain(directives.split(',').filter(|d| !d.is_empty()))
        .try_fold(env_filter, |env_filter, directive| {
            Ok(env_filter.add_directive(directive.parse()?))
        })
}
