//! Quasi-3D photovoltaic network generation.
//!
//! A metal-contact mask and an illumination map are partitioned into tiles,
//! every tile becomes a small diode/resistor cell, and the whole network is
//! written as a SPICE netlist for an external engine. The engine's text output
//! is decoded back into an I-V curve and a per-tile voltage map, which can
//! drive adaptive refinement of the mesh.

pub mod config;
pub mod decoder;
pub mod device;
pub mod encoder;
pub mod engine;
pub mod error;
pub mod ir;
pub mod mask;
pub mod mesh;
pub mod naming;
pub mod orchestrator;
pub mod output;
pub mod parser;
pub mod rayfile;
pub mod reducer;
pub mod scan;
pub mod stats;
pub mod tile;
