//! Collaborator implementations: the remote commerce API over HTTP and
//! in-memory scripted stand-ins.

pub mod http;
pub mod in_memory;
