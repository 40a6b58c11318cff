//! RPC surface the deploy coordinator talks to
//!
//! Streams are plain channel pairs so the same coordinator code runs
//! against the tonic transport and against in-process test servers.

use async_trait::async_trait;
use tokio::sync::mpsc;

use super::{
    CheckJobSpecificationsRequest, CheckJobSpecificationsResponse, DeployJobSpecificationRequest,
    DeployJobSpecificationResponse, DeployResourceSpecificationRequest,
    DeployResourceSpecificationResponse, GetDeployJobsStatusRequest, GetDeployJobsStatusResponse,
    RefreshJobsRequest, RefreshJobsResponse, ReplaceAllJobSpecificationsRequest,
    ReplaceAllJobSpecificationsResponse, RpcError,
};

/// Client side of a bidirectional stream.
///
/// Used half-duplex: every `send` happens before `close_send`, then the
/// responses are drained until `message` yields `None`.
pub struct BidiStream<Req, Resp> {
    requests: Option<mpsc::Sender<Req>>,
    responses: mpsc::UnboundedReceiver<Result<Resp, RpcError>>,
}

impl<Req, Resp> BidiStream<Req, Resp> {
    /// Queue a request.
    ///
    /// When the server already ended the stream, the status it ended with is
    /// returned; responses queued ahead of that status are discarded.
    pub async fn send(&mut self, request: Req) -> Result<(), RpcError> {
        let sender = self
            .requests
            .as_ref()
            .ok_or_else(|| RpcError::internal("send after the request side was closed"))?;
        if sender.send(request).await.is_ok() {
            return Ok(());
        }

        self.requests = None;
        while let Some(response) = self.responses.recv().await {
            if let Err(status) = response {
                return Err(status);
            }
        }
        Err(RpcError::unavailable("stream closed by the server"))
    }

    /// Half-close: no more requests will be sent
    pub fn close_send(&mut self) {
        self.requests = None;
    }

    /// Next response, `None` once the server finished the stream
    pub async fn message(&mut self) -> Result<Option<Resp>, RpcError> {
        self.responses.recv().await.transpose()
    }
}

/// Server side of a `BidiStream`
pub struct ServerEnd<Req, Resp> {
    requests: mpsc::Receiver<Req>,
    responses: mpsc::UnboundedSender<Result<Resp, RpcError>>,
}

impl<Req, Resp> ServerEnd<Req, Resp> {
    /// Next request, `None` once the client half-closed
    pub async fn recv(&mut self) -> Option<Req> {
        self.requests.recv().await
    }

    /// Queue a response; false when the client is gone
    pub fn send(&self, response: Resp) -> bool {
        self.responses.send(Ok(response)).is_ok()
    }

    /// Terminate the stream with an error status
    pub fn fail(self, error: RpcError) {
        let _ = self.responses.send(Err(error));
    }

    pub fn into_parts(
        self,
    ) -> (
        mpsc::Receiver<Req>,
        mpsc::UnboundedSender<Result<Resp, RpcError>>,
    ) {
        (self.requests, self.responses)
    }
}

/// Connected client and server ends; `buffer` bounds in-flight requests
pub fn bidi_channel<Req, Resp>(buffer: usize) -> (BidiStream<Req, Resp>, ServerEnd<Req, Resp>) {
    let (request_tx, request_rx) = mpsc::channel(buffer.max(1));
    let (response_tx, response_rx) = mpsc::unbounded_channel();
    (
        BidiStream {
            requests: Some(request_tx),
            responses: response_rx,
        },
        ServerEnd {
            requests: request_rx,
            responses: response_tx,
        },
    )
}

/// Server-streamed responses of a unary request
pub struct ServerStream<Resp> {
    responses: mpsc::UnboundedReceiver<Result<Resp, RpcError>>,
}

impl<Resp> ServerStream<Resp> {
    pub async fn message(&mut self) -> Result<Option<Resp>, RpcError> {
        self.responses.recv().await.transpose()
    }
}

pub fn server_stream_channel<Resp>() -> (
    ServerStream<Resp>,
    mpsc::UnboundedSender<Result<Resp, RpcError>>,
) {
    let (tx, rx) = mpsc::unbounded_channel();
    (ServerStream { responses: rx }, tx)
}

pub type DeployJobsStream = BidiStream<DeployJobSpecificationRequest, DeployJobSpecificationResponse>;
pub type ReplaceAllStream =
    BidiStream<ReplaceAllJobSpecificationsRequest, ReplaceAllJobSpecificationsResponse>;
pub type DeployResourcesStream =
    BidiStream<DeployResourceSpecificationRequest, DeployResourceSpecificationResponse>;

/// `odpf.optimus.core.v1beta1.JobSpecificationService`
#[async_trait]
pub trait JobSpecificationService: Send + Sync {
    async fn deploy_job_specification(&self) -> Result<DeployJobsStream, RpcError>;

    async fn replace_all_job_specifications(&self) -> Result<ReplaceAllStream, RpcError>;

    async fn get_deploy_jobs_status(
        &self,
        request: GetDeployJobsStatusRequest,
    ) -> Result<GetDeployJobsStatusResponse, RpcError>;

    async fn refresh_jobs(
        &self,
        request: RefreshJobsRequest,
    ) -> Result<ServerStream<RefreshJobsResponse>, RpcError>;

    async fn check_job_specifications(
        &self,
        request: CheckJobSpecificationsRequest,
    ) -> Result<ServerStream<CheckJobSpecificationsResponse>, RpcError>;
}

/// `odpf.optimus.core.v1beta1.ResourceService`
#[async_trait]
pub trait ResourceService: Send + Sync {
    async fn deploy_resource_specification(&self) -> Result<DeployResourcesStream, RpcError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_half_close_ends_server_reads() {
        let (mut client, mut server) = bidi_channel::<u32, String>(4);
        client.send(1).await.unwrap();
        client.send(2).await.unwrap();
        client.close_send();

        assert_eq!(server.recv().await, Some(1));
        assert_eq!(server.recv().await, Some(2));
        assert_eq!(server.recv().await, None);

        assert!(client.send(3).await.is_err());
    }

    #[tokio::test]
    async fn test_send_returns_status_of_failed_server() {
        let (mut client, server) = bidi_channel::<u32, String>(1);
        assert!(server.send("early".into()));
        server.fail(RpcError::deadline_exceeded("too slow"));

        let err = client.send(1).await.unwrap_err();
        assert_eq!(err.code, crate::wire::RpcCode::DeadlineExceeded);
        assert_eq!(err.message, "too slow");
    }

    #[tokio::test]
    async fn test_send_to_dropped_server_is_unavailable() {
        let (mut client, server) = bidi_channel::<u32, String>(1);
        drop(server);

        let err = client.send(1).await.unwrap_err();
        assert_eq!(err.code, crate::wire::RpcCode::Unavailable);
    }

    #[tokio::test]
    async fn test_drop_of_server_is_eof() {
        let (mut client, server) = bidi_channel::<u32, String>(1);
        assert!(server.send("hello".into()));
        drop(server);

        assert_eq!(client.message().await.unwrap(), Some("hello".to_string()));
        assert_eq!(client.message().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_server_failure_surfaces_once() {
        let (mut client, server) = bidi_channel::<u32, String>(1);
        server.fail(RpcError::unavailable("gone"));

        let err = client.message().await.unwrap_err();
        assert_eq!(err.code, crate::wire::RpcCode::Unavailable);
        assert_eq!(client.message().await.unwrap(), None);
    }
}
