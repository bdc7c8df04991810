//! Crate-internal integration tests: scripts assembled with
//! `FunctionBuilder` and run on a VM with in-memory I/O and a virtual clock.

mod helpers;

mod control_flow;
mod modules;
