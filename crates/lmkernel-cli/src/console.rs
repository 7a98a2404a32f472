//! Console host: runs cells through a kernel and prints its IOPub output.
//!
//! Stream text goes to `out` as it arrives; errors go to `err`.

use std::io::{self, Write};

use tokio::sync::mpsc::UnboundedReceiver;

use lmkernel_kernel::iopub::{IoPubMessage, StreamName};
use lmkernel_kernel::protocol::{ExecuteReply, ExecuteRequest};
use lmkernel_kernel::KernelHandlers;

/// Execute one cell, printing output while the kernel streams it.
pub async fn run_cell<K, W, E>(
    kernel: &K,
    iopub: &mut UnboundedReceiver<IoPubMessage>,
    request: ExecuteRequest,
    out: &mut W,
    err: &mut E,
) -> io::Result<ExecuteReply>
where
    K: KernelHandlers,
    W: Write,
    E: Write,
{
    let mut printed = false;
    let execute = kernel.execute_request(request);
    tokio::pin!(execute);

    let reply = loop {
        tokio::select! {
            reply = &mut execute => break reply,
            Some(message) = iopub.recv() => {
                printed |= render(&message, out, err)?;
            }
        }
    };
    while let Ok(message) = iopub.try_recv() {
        printed |= render(&message, out, err)?;
    }

    if printed {
        writeln!(out)?;
    }
    out.flush()?;
    Ok(reply)
}

/// Run each prompt as a cell with an increasing execution count. Returns the
/// number of cells that failed.
pub async fn run_cells<K, W, E>(
    kernel: &K,
    iopub: &mut UnboundedReceiver<IoPubMessage>,
    prompts: &[String],
    out: &mut W,
    err: &mut E,
) -> io::Result<usize>
where
    K: KernelHandlers,
    W: Write,
    E: Write,
{
    let mut failures = 0;
    for (count, prompt) in (1u32..).zip(prompts) {
        let reply = run_cell(kernel, iopub, ExecuteRequest::new(prompt.as_str(), count), out, err)
            .await?;
        if !reply.is_ok() {
            failures += 1;
        }
    }
    Ok(failures)
}

/// Print one message; returns whether anything went to `out`.
fn render<W: Write, E: Write>(message: &IoPubMessage, out: &mut W, err: &mut E) -> io::Result<bool> {
    match message {
        IoPubMessage::Stream(stream) => match stream.name {
            StreamName::Stdout => {
                write!(out, "{}", stream.text)?;
                out.flush()?;
                Ok(!stream.text.is_empty())
            }
            StreamName::Stderr => {
                write!(err, "{}", stream.text)?;
                Ok(false)
            }
        },
        IoPubMessage::Error(error) => {
            writeln!(err, "{}: {}", error.ename, error.evalue)?;
            for line in &error.traceback {
                writeln!(err, "{line}")?;
            }
            Ok(false)
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use lmkernel_core::config::KernelConfig;
    use lmkernel_kernel::{ChannelSink, KernelSpec, ProtocolAdapter};
    use lmkernel_relay::testing::FakeCapability;
    use lmkernel_relay::SessionRelay;

    fn kernel(
        fake: FakeCapability,
    ) -> (
        ProtocolAdapter<FakeCapability, ChannelSink>,
        UnboundedReceiver<IoPubMessage>,
    ) {
        let (sink, rx) = ChannelSink::new();
        let info = KernelSpec::from_config(&KernelConfig::default()).kernel_info();
        (ProtocolAdapter::new(SessionRelay::new(fake), sink, info), rx)
    }

    #[tokio::test]
    async fn cell_output_is_printed_with_trailing_newline() {
        let (kernel, mut rx) = kernel(FakeCapability::ready().with_chunks(["Hi", " there"]));
        let (mut out, mut err) = (Vec::new(), Vec::new());

        let reply = run_cell(&kernel, &mut rx, ExecuteRequest::new("x", 1), &mut out, &mut err)
            .await
            .unwrap();

        assert!(reply.is_ok());
        assert_eq!(String::from_utf8(out).unwrap(), "Hi there\n");
        assert!(err.is_empty());
    }

    #[tokio::test]
    async fn failures_go_to_stderr_and_are_counted() {
        let (kernel, mut rx) = kernel(FakeCapability::unavailable());
        let (mut out, mut err) = (Vec::new(), Vec::new());
        let prompts = vec!["a".to_string(), "b".to_string()];

        let failures = run_cells(&kernel, &mut rx, &prompts, &mut out, &mut err)
            .await
            .unwrap();

        assert_eq!(failures, 2);
        assert!(out.is_empty());
        let err = String::from_utf8(err).unwrap();
        assert_eq!(err.lines().count(), 2);
        assert!(err.starts_with("Error: On-device language model is not available"));
    }

    #[tokio::test]
    async fn empty_reply_prints_nothing() {
        let (kernel, mut rx) = kernel(FakeCapability::ready());
        let (mut out, mut err) = (Vec::new(), Vec::new());

        run_cell(&kernel, &mut rx, ExecuteRequest::new("", 1), &mut out, &mut err)
            .await
            .unwrap();
        assert!(out.is_empty());
    }
}
