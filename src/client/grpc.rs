//! tonic transport for the Optimus services

use std::time::Duration;

use async_trait::async_trait;
use tokio_stream::wrappers::ReceiverStream;
use tonic::client::Grpc;
use tonic::codec::ProstCodec;
use tonic::codegen::http::uri::PathAndQuery;
use tonic::transport::{Channel, Endpoint};

use crate::wire::{
    bidi_channel, server_stream_channel, BidiStream, CheckJobSpecificationsRequest,
    CheckJobSpecificationsResponse, DeployJobsStream, DeployResourcesStream,
    GetDeployJobsStatusRequest, GetDeployJobsStatusResponse, JobSpecificationService,
    RefreshJobsRequest, RefreshJobsResponse, ReplaceAllStream, ResourceService, RpcCode,
    RpcError, ServerStream,
};

const DEPLOY_JOB_SPECIFICATION: &str =
    "/odpf.optimus.core.v1beta1.JobSpecificationService/DeployJobSpecification";
const REPLACE_ALL_JOB_SPECIFICATIONS: &str =
    "/odpf.optimus.core.v1beta1.JobSpecificationService/ReplaceAllJobSpecifications";
const GET_DEPLOY_JOBS_STATUS: &str =
    "/odpf.optimus.core.v1beta1.JobSpecificationService/GetDeployJobsStatus";
const REFRESH_JOBS: &str = "/odpf.optimus.core.v1beta1.JobSpecificationService/RefreshJobs";
const CHECK_JOB_SPECIFICATIONS: &str =
    "/odpf.optimus.core.v1beta1.JobSpecificationService/CheckJobSpecifications";
const DEPLOY_RESOURCE_SPECIFICATION: &str =
    "/odpf.optimus.core.v1beta1.ResourceService/DeployResourceSpecification";

/// Requests queued on a bidi stream before `send` waits
const REQUEST_BUFFER: usize = 16;

impl From<tonic::Status> for RpcError {
    fn from(status: tonic::Status) -> Self {
        let code = match status.code() {
            tonic::Code::Cancelled => RpcCode::Cancelled,
            tonic::Code::InvalidArgument | tonic::Code::OutOfRange => RpcCode::InvalidArgument,
            tonic::Code::DeadlineExceeded => RpcCode::DeadlineExceeded,
            tonic::Code::NotFound => RpcCode::NotFound,
            tonic::Code::AlreadyExists => RpcCode::AlreadyExists,
            tonic::Code::PermissionDenied => RpcCode::PermissionDenied,
            tonic::Code::FailedPrecondition | tonic::Code::Aborted => RpcCode::FailedPrecondition,
            tonic::Code::Unimplemented => RpcCode::Unimplemented,
            tonic::Code::Internal | tonic::Code::DataLoss => RpcCode::Internal,
            tonic::Code::Unavailable | tonic::Code::ResourceExhausted => RpcCode::Unavailable,
            tonic::Code::Unauthenticated => RpcCode::Unauthenticated,
            tonic::Code::Ok | tonic::Code::Unknown => RpcCode::Unknown,
        };
        RpcError::new(code, status.message())
    }
}

/// One connection to the server, shared by every call of a run.
/// Cloning is cheap and clones share the underlying channel.
#[derive(Clone)]
pub struct GrpcClient {
    inner: Grpc<Channel>,
}

impl GrpcClient {
    /// Connect to `host` (`host:port`, or a full `http(s)://` URI)
    pub async fn connect(host: &str, connect_timeout: Duration) -> Result<Self, RpcError> {
        let uri = if host.contains("://") {
            host.to_string()
        } else {
            format!("http://{}", host)
        };
        let endpoint = Endpoint::from_shared(uri.clone())
            .map_err(|e| RpcError::new(RpcCode::InvalidArgument, format!("{}: {}", uri, e)))?
            .connect_timeout(connect_timeout);

        log::debug!("connecting to {}", uri);
        let channel = endpoint
            .connect()
            .await
            .map_err(|e| RpcError::unavailable(format!("failed to connect to {}: {}", uri, e)))?;
        Ok(Self {
            inner: Grpc::new(channel),
        })
    }

    async fn ready(&self) -> Result<Grpc<Channel>, RpcError> {
        let mut grpc = self.inner.clone();
        grpc.ready()
            .await
            .map_err(|e| RpcError::unavailable(format!("service was not ready: {}", e)))?;
        Ok(grpc)
    }

    async fn unary<Req, Resp>(&self, path: &'static str, request: Req) -> Result<Resp, RpcError>
    where
        Req: prost::Message + Send + Sync + 'static,
        Resp: prost::Message + Default + Send + Sync + 'static,
    {
        let mut grpc = self.ready().await?;
        let codec: ProstCodec<Req, Resp> = ProstCodec::default();
        let response = grpc
            .unary(
                tonic::Request::new(request),
                PathAndQuery::from_static(path),
                codec,
            )
            .await?;
        Ok(response.into_inner())
    }

    async fn server_streaming<Req, Resp>(
        &self,
        path: &'static str,
        request: Req,
    ) -> Result<ServerStream<Resp>, RpcError>
    where
        Req: prost::Message + Send + Sync + 'static,
        Resp: prost::Message + Default + Send + Sync + 'static,
    {
        let mut grpc = self.ready().await?;
        let codec: ProstCodec<Req, Resp> = ProstCodec::default();
        let mut stream = grpc
            .server_streaming(
                tonic::Request::new(request),
                PathAndQuery::from_static(path),
                codec,
            )
            .await?
            .into_inner();

        let (client, responses) = server_stream_channel();
        tokio::spawn(async move {
            loop {
                match stream.message().await {
                    Ok(Some(message)) => {
                        if responses.send(Ok(message)).is_err() {
                            break;
                        }
                    }
                    Ok(None) => break,
                    Err(status) => {
                        let _ = responses.send(Err(status.into()));
                        break;
                    }
                }
            }
        });
        Ok(client)
    }

    /// Open a bidi stream. The call itself runs in a background task, so
    /// requests can be queued before the server sends response headers.
    fn bidi<Req, Resp>(&self, path: &'static str) -> BidiStream<Req, Resp>
    where
        Req: prost::Message + Send + Sync + 'static,
        Resp: prost::Message + Default + Send + Sync + 'static,
    {
        let (client, server) = bidi_channel(REQUEST_BUFFER);
        let (requests, responses) = server.into_parts();
        let this = self.clone();

        tokio::spawn(async move {
            let forward = async {
                let mut grpc = this.ready().await?;
                let codec: ProstCodec<Req, Resp> = ProstCodec::default();
                let mut stream = grpc
                    .streaming(
                        tonic::Request::new(ReceiverStream::new(requests)),
                        PathAndQuery::from_static(path),
                        codec,
                    )
                    .await?
                    .into_inner();

                while let Some(message) = stream.message().await? {
                    if responses.send(Ok(message)).is_err() {
                        break;
                    }
                }
                Ok::<(), RpcError>(())
            };
            if let Err(e) = forward.await {
                log::debug!("stream {} ended with {}", path, e);
                let _ = responses.send(Err(e));
            }
        });
        client
    }
}

#[async_trait]
impl JobSpecificationService for GrpcClient {
    async fn deploy_job_specification(&self) -> Result<DeployJobsStream, RpcError> {
        Ok(self.bidi(DEPLOY_JOB_SPECIFICATION))
    }

    async fn replace_all_job_specifications(&self) -> Result<ReplaceAllStream, RpcError> {
        Ok(self.bidi(REPLACE_ALL_JOB_SPECIFICATIONS))
    }

    async fn get_deploy_jobs_status(
        &self,
        request: GetDeployJobsStatusRequest,
    ) -> Result<GetDeployJobsStatusResponse, RpcError> {
        self.unary(GET_DEPLOY_JOBS_STATUS, request).await
    }

    async fn refresh_jobs(
        &self,
        request: RefreshJobsRequest,
    ) -> Result<ServerStream<RefreshJobsResponse>, RpcError> {
        self.server_streaming(REFRESH_JOBS, request).await
    }

    async fn check_job_specifications(
        &self,
        request: CheckJobSpecificationsRequest,
    ) -> Result<ServerStream<CheckJobSpecificationsResponse>, RpcError> {
        self.server_streaming(CHECK_JOB_SPECIFICATIONS, request).await
    }
}

#[async_trait]
impl ResourceService for GrpcClient {
    async fn deploy_resource_specification(&self) -> Result<DeployResourcesStream, RpcError> {
        Ok(self.bidi(DEPLOY_RESOURCE_SPECIFICATION))
    }
}
