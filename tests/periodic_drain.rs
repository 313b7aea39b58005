//SPDX-License-Identifier: MIT OR Apache-2.0

#[cfg(target_arch = "wasm32")]
wasm_bindgen_test::wasm_bindgen_test_configure!(run_in_browser);

use linewise::{Duration, InMemoryHandler, Level, Manager};
use std::sync::Arc;

#[test_executors::async_test]
async fn periodic_drain_empties_the_buffer() {
    let manager = Manager::new("periodic-drain");
    let memory = Arc::new(InMemoryHandler::new());
    manager.install_handler(memory.clone()).unwrap();

    manager.write(Level::Error, "drained to the console\n");
    assert_eq!(memory.records().len(), 1);

    memory
        .periodic_drain_to_console(Duration::from_millis(150))
        .await;
    assert!(memory.records().is_empty());
}

#[test_executors::async_test]
async fn zero_duration_drains_once_and_finishes() {
    let memory = Arc::new(InMemoryHandler::new());
    let manager = Manager::new("periodic-drain-zero");
    manager.install_handler(memory.clone()).unwrap();
    manager.write(Level::Warning, "once\n");

    memory.periodic_drain_to_console(Duration::ZERO).await;
    assert_eq!(memory.drain_logs(), "");
}
