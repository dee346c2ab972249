//! Ticket visibility: the predicate tree and the role-based compiler.

pub mod compile;
pub mod predicate;

pub use compile::{AccessInput, compile_access, own_tickets, scoped};
pub use predicate::{CmpOp, Field, FieldType, Predicate, Value};
