pub mod config;
pub mod logging;

pub mod control;
pub mod dispatcher;
pub mod fetch;
pub mod input;
pub mod job;
pub mod pool;
pub mod report;
pub mod storage;
