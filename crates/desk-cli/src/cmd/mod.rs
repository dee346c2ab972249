pub mod incident;
pub mod init;
pub mod link;
pub mod ticket;
pub mod workflow;
