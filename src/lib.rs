//! cinder - an embeddable scripting runtime.
//!
//! The crate is organized around the journey of one statement:
//!
//! - [`lang`] holds the statement tree and value model a dialect parser
//!   produces.
//! - [`bytecode`] compiles statement trees into flat instruction buffers and
//!   reads/writes their textual and binary forms.
//! - [`runtime`] owns lazily compiled scopes, their running instances and
//!   the execution context statements run against.
//! - [`reflect`] exposes host types and functions to scripts, with binding
//!   checked at registration time.

pub mod bytecode;
pub mod lang;
pub mod reflect;
pub mod runtime;
