//! Protocol adapter: kernel handlers backed by a session relay.
//!
//! Data flow for `execute_request`:
//! ```text
//! code → SessionRelay::send → each delta → IOPub stream(stdout)
//!      → Ok(reply)  → execute_reply ok
//!      → Err(error) → IOPub error → execute_reply error
//! ```

use serde_json::Map;
use tracing::{debug, info, warn};

use lmkernel_relay::{Capability, SessionRelay};

use crate::handlers::KernelHandlers;
use crate::iopub::{IoPubMessage, IoPubSink};
use crate::protocol::{
    CommClose, CommInfoReply, CommInfoRequest, CommMsg, CommOpen, CompleteReply,
    CompleteRequest, ErrorContent, ExecuteReply, ExecuteRequest, HistoryReply, HistoryRequest,
    InputReply, InspectReply, InspectRequest, IsCompleteReply, IsCompleteRequest,
    IsCompleteStatus, KernelInfoReply, ReplyStatus, ShutdownReply, ShutdownRequest,
};

/// Kernel whose cells are prompts to an on-device language model.
pub struct ProtocolAdapter<C: Capability, S: IoPubSink> {
    relay: SessionRelay<C>,
    iopub: S,
    info: KernelInfoReply,
}

impl<C: Capability, S: IoPubSink> ProtocolAdapter<C, S> {
    pub const fn new(relay: SessionRelay<C>, iopub: S, info: KernelInfoReply) -> Self {
        Self { relay, iopub, info }
    }

    pub const fn relay(&self) -> &SessionRelay<C> {
        &self.relay
    }
}

impl<C: Capability, S: IoPubSink> KernelHandlers for ProtocolAdapter<C, S> {
    async fn kernel_info_request(&self) -> KernelInfoReply {
        self.info.clone()
    }

    async fn execute_request(&self, request: ExecuteRequest) -> ExecuteReply {
        let execution_count = request.execution_count;
        let iopub = &self.iopub;
        debug!(execution_count, code_len = request.code.len(), "Execute request");

        let result = self
            .relay
            .send(&request.code, |delta| iopub.publish(IoPubMessage::stdout(delta)))
            .await;

        match result {
            Ok(reply) => {
                info!(execution_count, reply_len = reply.len(), "Execution finished");
                ExecuteReply::Ok {
                    execution_count,
                    user_expressions: Map::new(),
                    payload: Vec::new(),
                }
            }
            Err(e) => {
                warn!(execution_count, error = %e, "Execution failed");
                let error = ErrorContent::generic(e.to_string());
                self.iopub.publish(IoPubMessage::Error(error.clone()));
                ExecuteReply::Error {
                    execution_count,
                    error,
                }
            }
        }
    }

    async fn complete_request(&self, _request: CompleteRequest) -> CompleteReply {
        CompleteReply {
            matches: Vec::new(),
            cursor_start: 0,
            cursor_end: 0,
            metadata: Map::new(),
            status: ReplyStatus::Ok,
        }
    }

    async fn inspect_request(&self, _request: InspectRequest) -> InspectReply {
        InspectReply {
            status: ReplyStatus::Ok,
            found: false,
            data: Map::new(),
            metadata: Map::new(),
        }
    }

    async fn is_complete_request(&self, _request: IsCompleteRequest) -> IsCompleteReply {
        // No parser: every cell is a finished prompt.
        IsCompleteReply {
            status: IsCompleteStatus::Complete,
        }
    }

    async fn comm_info_request(&self, _request: CommInfoRequest) -> CommInfoReply {
        CommInfoReply {
            status: ReplyStatus::Ok,
            comms: Map::new(),
        }
    }

    async fn history_request(&self, _request: HistoryRequest) -> HistoryReply {
        HistoryReply {
            status: ReplyStatus::Ok,
            history: Vec::new(),
        }
    }

    async fn shutdown_request(&self, request: ShutdownRequest) -> ShutdownReply {
        debug!(restart_requested = request.restart, "Shutdown request");
        ShutdownReply {
            status: ReplyStatus::Ok,
            restart: false,
        }
    }

    async fn input_reply(&self, _reply: InputReply) {}

    async fn comm_open(&self, _msg: CommOpen) {}

    async fn comm_msg(&self, _msg: CommMsg) {}

    async fn comm_close(&self, _msg: CommClose) {}
}
