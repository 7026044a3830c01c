//! hdlcheck front ends: the HTTP service and its router.

pub mod http;

pub use http::{serve, status_for, CorsPolicy, HttpApp, HttpReply, HttpRequest};
