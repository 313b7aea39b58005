//SPDX-License-Identifier: MIT OR Apache-2.0
//! The process-wide subsystem map and its environment configuration.

use linewise::{InMemoryHandler, Level, ManagerConfig};
use std::sync::{Arc, Mutex};

static TEST_ENV_GUARD: Mutex<()> = Mutex::new(());

fn set_env(key: &str, value: &str) {
    // SAFETY: every test that touches the environment holds TEST_ENV_GUARD
    unsafe { std::env::set_var(key, value) }
}

fn remove_env(key: &str) {
    // SAFETY: as above
    unsafe { std::env::remove_var(key) }
}

#[test]
fn subsystem_threshold_comes_from_environment() {
    let _guard = TEST_ENV_GUARD.lock().unwrap();
    let key = ManagerConfig::env_key("subsystems.env");
    set_env(&key, "error");
    let manager = linewise::subsystem("subsystems.env");
    remove_env(&key);
    assert_eq!(manager.threshold(), Level::Error);

    let memory = Arc::new(InMemoryHandler::new());
    manager.install_handler(memory.clone()).unwrap();
    linewise::warning!(manager, "filtered");
    linewise::error!(manager, "kept");
    assert_eq!(memory.texts(), ["kept"]);
}

#[test]
fn specific_variable_beats_global_one() {
    let _guard = TEST_ENV_GUARD.lock().unwrap();
    let key = ManagerConfig::env_key("subsystems-specific");
    set_env(linewise::GLOBAL_LEVEL_VAR, "fatal");
    set_env(&key, "trace");
    let specific = linewise::subsystem("subsystems-specific");
    let general = linewise::subsystem("subsystems-general");
    remove_env(&key);
    remove_env(linewise::GLOBAL_LEVEL_VAR);

    assert_eq!(specific.threshold(), Level::Trace);
    assert_eq!(general.threshold(), Level::Fatal);
}

#[test]
fn handlers_persist_across_lookups() {
    let memory = Arc::new(InMemoryHandler::new());
    linewise::subsystem("subsystems-persist")
        .install_handler(memory.clone())
        .unwrap();
    linewise::subsystem("subsystems-persist").banner("hello");
    assert_eq!(memory.literals(), [b"hello".to_vec()]);
    assert!(
        linewise::subsystems()
            .iter()
            .any(|name| name == "subsystems-persist")
    );
}

#[test]
fn default_subsystem_writes_to_console() {
    let global = linewise::global();
    assert_eq!(global.name(), linewise::DEFAULT_SUBSYSTEM);
    assert_eq!(global.handler_count(), 1);
    linewise::info!(global, "default subsystem reaches stderr");
}
