//! Domain types: the payment attempt state machine, order requests, outward
//! events and the collaborator ports.

pub mod events;
pub mod order;
pub mod payment;
pub mod ports;
