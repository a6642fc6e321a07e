#![no_std]

#[cfg(feature = "alloc")]
extern crate alloc;

// Shared logic for the strap rig controller.
//
// This crate stays portable across MCU firmware and host tooling by avoiding the
// Rust standard library and exposing abstractions the other crates can adopt.

pub mod actuation;
pub mod config;
pub mod console;
pub mod controller;
pub mod cycle;
pub mod escalation;
pub mod executor;
pub mod faults;
pub mod indicator;
pub mod latch;
pub mod reset;
pub mod sequencer;
pub mod telemetry;
