//! The handler surface a notebook host requires from a kernel.

use std::future::Future;

use crate::protocol::{
    CommClose, CommInfoReply, CommInfoRequest, CommMsg, CommOpen, CompleteReply,
    CompleteRequest, ExecuteReply, ExecuteRequest, HistoryReply, HistoryRequest, InputReply,
    InspectReply, InspectRequest, IsCompleteReply, IsCompleteRequest, KernelInfoReply,
    ShutdownReply, ShutdownRequest,
};

/// Request handlers for one kernel instance.
///
/// The host calls these one at a time per instance; no handler returns an
/// error value, failures are expressed in the reply content.
pub trait KernelHandlers: Send + Sync {
    fn kernel_info_request(&self) -> impl Future<Output = KernelInfoReply> + Send;

    fn execute_request(
        &self,
        request: ExecuteRequest,
    ) -> impl Future<Output = ExecuteReply> + Send;

    fn complete_request(
        &self,
        request: CompleteRequest,
    ) -> impl Future<Output = CompleteReply> + Send;

    fn inspect_request(
        &self,
        request: InspectRequest,
    ) -> impl Future<Output = InspectReply> + Send;

    fn is_complete_request(
        &self,
        request: IsCompleteRequest,
    ) -> impl Future<Output = IsCompleteReply> + Send;

    fn comm_info_request(
        &self,
        request: CommInfoRequest,
    ) -> impl Future<Output = CommInfoReply> + Send;

    fn history_request(
        &self,
        request: HistoryRequest,
    ) -> impl Future<Output = HistoryReply> + Send;

    fn shutdown_request(
        &self,
        request: ShutdownRequest,
    ) -> impl Future<Output = ShutdownReply> + Send;

    fn input_reply(&self, reply: InputReply) -> impl Future<Output = ()> + Send;

    fn comm_open(&self, msg: CommOpen) -> impl Future<Output = ()> + Send;

    fn comm_msg(&self, msg: CommMsg) -> impl Future<Output = ()> + Send;

    fn comm_close(&self, msg: CommClose) -> impl Future<Output = ()> + Send;
}
