//! Transport implementations of the wire service traits

mod grpc;

pub use grpc::GrpcClient;
