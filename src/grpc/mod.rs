pub mod collector_grpc;
