//SPDX-License-Identifier: MIT OR Apache-2.0
//! A console handler and a file handler on one manager see the same emissions.

use linewise::{
    ConsoleHandler, DiagnosticMode, FileHandler, InMemoryHandler, Level, Manager, ManagerConfig,
};
use std::sync::Arc;

fn manager(name: &str) -> Manager {
    Manager::with_config(
        name,
        ManagerConfig::default()
            .with_threshold(Level::Trace)
            .with_diagnostics(DiagnosticMode::Silent),
    )
}

#[test]
fn console_and_file_receive_lines_and_partials() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("fanout.log");
    let manager = manager("fanout");
    manager
        .install_handler(Arc::new(ConsoleHandler::new()))
        .unwrap();
    let file = manager
        .install_handler(Arc::new(FileHandler::new(&path).plain()))
        .unwrap();
    let memory = Arc::new(InMemoryHandler::new());
    manager.install_handler(memory.clone()).unwrap();

    manager.write(Level::Info, "A");
    manager.write(Level::Info, "B\n");
    manager.write(Level::Info, "C");
    manager.flush(Level::Info);
    assert_eq!(manager.pending(Level::Info), "");

    let seen: Vec<(String, bool)> = memory
        .records()
        .into_iter()
        .map(|(ctx, text)| (text, ctx.is_line_complete()))
        .collect();
    assert_eq!(seen, [("AB".to_string(), true), ("C".to_string(), false)]);

    manager.remove_handler(file).unwrap();
    assert_eq!(std::fs::read_to_string(&path).unwrap(), "AB\nC\n");
}

#[test]
fn file_prelude_marks_partial_emissions() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("prelude.log");
    let manager = manager("fanout-prelude");
    manager
        .install_handler(Arc::new(FileHandler::new(&path)))
        .unwrap();

    let mut stream = manager.stream(Level::Warning);
    stream.write("whole\nhalf");
    drop(stream);
    manager.shutdown();

    let contents = std::fs::read_to_string(&path).unwrap();
    let lines: Vec<&str> = contents.lines().collect();
    assert_eq!(lines.len(), 2);
    assert!(lines[0].contains("WARN"));
    assert!(lines[0].contains("#0: whole"));
    assert!(lines[1].contains("#1 (partial): half"));
}

#[test]
fn two_managers_share_one_handler() {
    let shared = Arc::new(InMemoryHandler::new());
    let first = manager("fanout-first");
    let second = manager("fanout-second");
    first.install_handler(shared.clone()).unwrap();
    second.install_handler(shared.clone()).unwrap();

    first.write(Level::Info, "from first\n");
    second.write(Level::Info, "from second\n");
    assert_eq!(shared.texts(), ["from first", "from second"]);

    // each manager numbers its own emissions
    let seqs: Vec<u64> = shared
        .records()
        .iter()
        .map(|(ctx, _)| ctx.sequence_number())
        .collect();
    assert_eq!(seqs, [0, 0]);
}

#[test]
fn banner_goes_to_every_handler_untagged() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("banner.log");
    let manager = manager("fanout-banner");
    manager
        .install_handler(Arc::new(FileHandler::new(&path)))
        .unwrap();
    let memory = Arc::new(InMemoryHandler::new());
    manager.install_handler(memory.clone()).unwrap();

    linewise::literal!(manager, "=== {} ===\n", "start");
    manager.shutdown();

    assert_eq!(memory.literals(), [b"=== start ===\n".to_vec()]);
    assert_eq!(std::fs::read_to_string(&path).unwrap(), "=== start ===\n");
}

#[test]
fn shared_file_handler_survives_removal_from_one_manager() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("shared.log");
    let file = Arc::new(FileHandler::new(&path).plain());
    let first = manager("fanout-shared-file-first");
    let second = manager("fanout-shared-file-second");
    let first_handle = first.install_handler(file.clone()).unwrap();
    let second_handle = second.install_handler(file.clone()).unwrap();

    first.remove_handler(first_handle).unwrap();
    assert!(file.is_open());
    let report = second.dispatch(Level::Info, "after first let go", true).unwrap();
    assert_eq!(report.delivered, 1);
    assert!(report.is_clean());

    second.remove_handler(second_handle).unwrap();
    assert!(!file.is_open());
    assert_eq!(
        std::fs::read_to_string(&path).unwrap(),
        "after first let go\n"
    );
}
