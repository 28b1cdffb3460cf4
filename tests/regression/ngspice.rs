use pvcircuit::config::EngineConfig;
use pvcircuit::engine::NgspiceEngine;

/// ngspice batch engine from the case's engine section, or `None` when the
/// executable cannot be started on this machine.
pub fn engine_or_skip(name: &str, config: &EngineConfig) -> Option<NgspiceEngine> {
    let engine = NgspiceEngine::new(config.clone());
    if engine.is_available() {
        Some(engine)
    } else {
        eprintln!("Skipping '{}': {} not found on PATH", name, config.executable);
        None
    }
}
