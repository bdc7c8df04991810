//! Instruction execution handlers, one file per opcode family

mod arithmetic;
mod collections;
mod comparison;
mod control;
mod fibers;
mod functions;
mod iterators;
mod modules;
mod objects;
mod strings;
mod variables;
