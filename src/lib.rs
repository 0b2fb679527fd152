pub mod app;
pub mod config;
pub mod convert;
pub mod docket;
pub mod event;
pub mod media;
pub mod messaging;
pub mod metrics;
pub mod model;
pub mod naming;
pub mod pipeline;
pub mod retry;
pub mod shutdown;
pub mod storage;
pub mod transcribe;
pub mod worker;
