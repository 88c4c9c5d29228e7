use std::io::Write;
use tokio::sync::mpsc;

/// Process-level input and output used by the runtime.
///
/// The handshake line and diagnostics output are written through
/// [`ProcessIo::print_out`]; everything the runtime logs goes to stderr via
/// `tracing` instead.
pub trait ProcessIo: Send + Sync {
    /// Command line, including the program name.
    fn args(&self) -> Vec<String>;

    /// Write one line to the host-facing output.
    fn print_out(&self, line: &str);
}

/// The real process: `std::env::args` and stdout.
#[derive(Debug, Default, Clone, Copy)]
pub struct StdIo;

impl ProcessIo for StdIo {
    fn args(&self) -> Vec<String> {
        std::env::args().collect()
    }

    fn print_out(&self, line: &str) {
        let mut stdout = std::io::stdout().lock();
        if let Err(e) = writeln!(stdout, "{}", line).and_then(|_| stdout.flush()) {
            tracing::error!("Failed to write to stdout: {}", e);
        }
    }
}

/// Fixed arguments with output delivered over a channel.
///
/// Lets an embedding process (or a test) drive the runtime and read the
/// handshake line as soon as it is printed.
#[derive(Debug)]
pub struct ChannelIo {
    args: Vec<String>,
    out: mpsc::UnboundedSender<String>,
}

impl ChannelIo {
    pub fn new<I, S>(args: I) -> (Self, mpsc::UnboundedReceiver<String>)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let (out, rx) = mpsc::unbounded_channel();
        let io = Self {
            args: args.into_iter().map(Into::into).collect(),
            out,
        };
        (io, rx)
    }
}

impl ProcessIo for ChannelIo {
    fn args(&self) -> Vec<String> {
        self.args.clone()
    }

    fn print_out(&self, line: &str) {
        // Receiver gone means nobody is listening anymore.
        let _ = self.out.send(line.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn channel_io_delivers_lines_in_order() {
        let (io, mut rx) = ChannelIo::new(["plugin", "{}"]);
        assert_eq!(io.args(), vec!["plugin".to_string(), "{}".to_string()]);

        io.print_out("first");
        io.print_out("second");
        assert_eq!(rx.recv().await.as_deref(), Some("first"));
        assert_eq!(rx.recv().await.as_deref(), Some("second"));
    }
}
