pub mod attach;
pub mod create;
pub mod edit;
pub mod init;
pub mod lifecycle;
pub mod list;
pub mod project;
pub mod query;
pub mod serve;
pub mod show;
pub mod subtask;
pub mod tips;
pub mod today;
