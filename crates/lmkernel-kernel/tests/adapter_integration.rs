#![allow(clippy::unwrap_used, clippy::panic)] // Integration tests use unwrap for brevity

//! Integration tests for the protocol adapter.
//!
//! Tests the full flow: handler → relay → fake capability → IOPub,
//! without a real model.

use serde_json::json;
use tokio::sync::mpsc::UnboundedReceiver;

use lmkernel_core::config::KernelConfig;
use lmkernel_kernel::protocol::{
    CommClose, CommInfoRequest, CommMsg, CommOpen, CompleteRequest, ErrorContent,
    ExecuteReply, ExecuteRequest, HistoryRequest, InputReply, InspectRequest,
    IsCompleteRequest, ShutdownRequest,
};
use lmkernel_kernel::{
    ChannelSink, IoPubMessage, KernelHandlers, KernelRegistry, KernelSpec, ProtocolAdapter,
};
use lmkernel_relay::testing::FakeCapability;
use lmkernel_relay::{Availability, SessionRelay};

type TestKernel = ProtocolAdapter<FakeCapability, ChannelSink>;

/// Helper to build an adapter over `fake` and the receiver for its IOPub.
fn kernel(fake: &FakeCapability) -> (TestKernel, UnboundedReceiver<IoPubMessage>) {
    let (sink, rx) = ChannelSink::new();
    let info = KernelSpec::from_config(&KernelConfig::default()).kernel_info();
    (
        ProtocolAdapter::new(SessionRelay::new(fake.clone()), sink, info),
        rx,
    )
}

fn drain(rx: &mut UnboundedReceiver<IoPubMessage>) -> Vec<IoPubMessage> {
    let mut out = Vec::new();
    while let Ok(msg) = rx.try_recv() {
        out.push(msg);
    }
    out
}

// =========================================================================
// Execute
// =========================================================================

#[tokio::test]
async fn execute_streams_deltas_then_replies_ok() {
    let fake = FakeCapability::ready().with_chunks(["Roses", "Roses are", "Roses are red."]);
    let (kernel, mut rx) = kernel(&fake);

    let reply = kernel
        .execute_request(ExecuteRequest::new("Write a poem", 7))
        .await;

    assert_eq!(
        reply,
        ExecuteReply::Ok {
            execution_count: 7,
            user_expressions: serde_json::Map::new(),
            payload: Vec::new(),
        }
    );
    assert_eq!(
        drain(&mut rx),
        [
            IoPubMessage::stdout("Roses"),
            IoPubMessage::stdout(" are"),
            IoPubMessage::stdout(" red."),
        ]
    );
    assert_eq!(fake.prompts(), ["Write a poem"]);
}

#[tokio::test]
async fn execute_skips_empty_deltas() {
    let fake = FakeCapability::ready().with_chunks(["a", "a", "ab"]);
    let (kernel, mut rx) = kernel(&fake);

    kernel.execute_request(ExecuteRequest::new("x", 1)).await;
    assert_eq!(
        drain(&mut rx),
        [IoPubMessage::stdout("a"), IoPubMessage::stdout("b")]
    );
}

#[tokio::test]
async fn execute_failure_publishes_one_error_and_replies_error() {
    let fake = FakeCapability::unavailable();
    let (kernel, mut rx) = kernel(&fake);

    let reply = kernel.execute_request(ExecuteRequest::new("hi", 2)).await;

    let (execution_count, error) = match reply {
        ExecuteReply::Error {
            execution_count,
            error,
        } => (execution_count, error),
        other => panic!("expected error reply, got {other:?}"),
    };
    assert_eq!(execution_count, 2);
    assert_eq!(error.ename, "Error");
    assert!(error.traceback.is_empty());
    assert!(error.evalue.contains("not available"));

    assert_eq!(drain(&mut rx), [IoPubMessage::Error(error)]);
}

#[tokio::test]
async fn failed_execution_does_not_poison_kernel() {
    let fake = FakeCapability::unavailable().with_chunks(["back"]);
    let (kernel, mut rx) = kernel(&fake);

    assert!(!kernel.execute_request(ExecuteRequest::new("1", 1)).await.is_ok());
    fake.set_availability(Availability::Ready);
    let reply = kernel.execute_request(ExecuteRequest::new("2", 2)).await;

    assert!(reply.is_ok());
    assert_eq!(reply.execution_count(), 2);
    let messages = drain(&mut rx);
    assert_eq!(messages.last(), Some(&IoPubMessage::stdout("back")));
}

#[tokio::test]
async fn mid_stream_failure_keeps_partial_output() {
    let fake = FakeCapability::ready()
        .with_chunks(["Once", " upon"])
        .failing_stream_after(1, "device lost");
    let (kernel, mut rx) = kernel(&fake);

    let reply = kernel.execute_request(ExecuteRequest::new("story", 3)).await;
    assert!(!reply.is_ok());

    let messages = drain(&mut rx);
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0], IoPubMessage::stdout("Once"));
    assert!(matches!(
        &messages[1],
        IoPubMessage::Error(ErrorContent { evalue, .. }) if evalue.contains("device lost")
    ));
    assert_eq!(fake.streams_released(), 1);
}

#[tokio::test]
async fn session_is_provisioned_once_across_executions() {
    let fake = FakeCapability::ready().with_chunks(["ok"]);
    let (kernel, _rx) = kernel(&fake);

    for count in 1..=3 {
        let reply = kernel
            .execute_request(ExecuteRequest::new("ping", count))
            .await;
        assert_eq!(reply.execution_count(), count);
    }
    assert_eq!(fake.creations(), 1);
    assert!(kernel.relay().has_session());
}

// =========================================================================
// Static handlers
// =========================================================================

#[tokio::test]
async fn static_handlers_ignore_input() {
    let fake = FakeCapability::ready();
    let (kernel, mut rx) = kernel(&fake);

    for (code, cursor_pos) in [("", 0), ("some text", 4), ("\n\n", 99)] {
        let complete = kernel
            .complete_request(CompleteRequest {
                code: code.into(),
                cursor_pos,
            })
            .await;
        assert_eq!(
            serde_json::to_value(complete).unwrap(),
            json!({"matches": [], "cursor_start": 0, "cursor_end": 0, "metadata": {}, "status": "ok"})
        );

        let inspect = kernel
            .inspect_request(InspectRequest {
                code: code.into(),
                cursor_pos,
                detail_level: 1,
            })
            .await;
        assert_eq!(
            serde_json::to_value(inspect).unwrap(),
            json!({"status": "ok", "found": false, "data": {}, "metadata": {}})
        );

        let is_complete = kernel
            .is_complete_request(IsCompleteRequest { code: code.into() })
            .await;
        assert_eq!(
            serde_json::to_value(is_complete).unwrap(),
            json!({"status": "complete"})
        );
    }

    let comm_info = kernel.comm_info_request(CommInfoRequest::default()).await;
    assert_eq!(
        serde_json::to_value(comm_info).unwrap(),
        json!({"status": "ok", "comms": {}})
    );

    let history = kernel
        .history_request(HistoryRequest {
            output: true,
            raw: true,
            hist_access_type: "tail".into(),
        })
        .await;
    assert_eq!(
        serde_json::to_value(history).unwrap(),
        json!({"status": "ok", "history": []})
    );

    let shutdown = kernel
        .shutdown_request(ShutdownRequest { restart: true })
        .await;
    assert_eq!(
        serde_json::to_value(shutdown).unwrap(),
        json!({"status": "ok", "restart": false})
    );

    kernel.input_reply(InputReply::default()).await;
    kernel
        .comm_open(CommOpen {
            comm_id: "c1".into(),
            ..CommOpen::default()
        })
        .await;
    kernel
        .comm_msg(CommMsg {
            comm_id: "c1".into(),
            ..CommMsg::default()
        })
        .await;
    kernel
        .comm_close(CommClose {
            comm_id: "c1".into(),
            ..CommClose::default()
        })
        .await;

    assert!(drain(&mut rx).is_empty());
    assert_eq!(fake.creations(), 0);
    assert!(fake.prompts().is_empty());
}

#[tokio::test]
async fn kernel_info_is_stable() {
    let fake = FakeCapability::ready();
    let (kernel, _rx) = kernel(&fake);

    let first = kernel.kernel_info_request().await;
    let second = kernel.kernel_info_request().await;
    assert_eq!(first, second);

    let value = serde_json::to_value(&first).unwrap();
    assert_eq!(value["status"], "ok");
    assert_eq!(value["protocol_version"], "5.3");
    assert_eq!(value["language_info"]["name"], "text");
    assert_eq!(value["help_links"], json!([]));
}

// =========================================================================
// Registry wiring
// =========================================================================

#[tokio::test]
async fn registry_starts_independent_instances() {
    let fake = FakeCapability::ready().with_chunks(["hi"]);
    let spec = KernelSpec::from_config(&KernelConfig::default());
    let info = spec.kernel_info();

    let mut registry = KernelRegistry::new();
    let factory_fake = fake.clone();
    registry
        .register(spec, move || {
            let (sink, _rx) = ChannelSink::new();
            ProtocolAdapter::new(SessionRelay::new(factory_fake.clone()), sink, info.clone())
        })
        .unwrap();

    let a = registry.start("lmkernel").unwrap();
    let b = registry.start("lmkernel").unwrap();
    assert!(a.execute_request(ExecuteRequest::new("1", 1)).await.is_ok());
    assert!(b.execute_request(ExecuteRequest::new("2", 1)).await.is_ok());

    // Each instance owns its own relay and so its own session.
    assert_eq!(fake.creations(), 2);
}
