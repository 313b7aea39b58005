//SPDX-License-Identifier: MIT OR Apache-2.0
//! Failing handlers and handler removal while other threads keep logging.

use linewise::{
    Diagnostic, DiagnosticMode, EmissionContext, Handler, HandlerWriteError, InMemoryHandler,
    Level, Manager, ManagerConfig,
};
#[cfg(target_os = "linux")]
use linewise::{FileHandler, FlushPolicy};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

fn manager(name: &str) -> Arc<Manager> {
    Arc::new(Manager::with_config(
        name,
        ManagerConfig::default()
            .with_threshold(Level::Trace)
            .with_diagnostics(DiagnosticMode::Silent),
    ))
}

#[derive(Debug)]
struct Broken;

impl Handler for Broken {
    fn emit_line(&self, _ctx: &EmissionContext, _text: &str) -> Result<(), HandlerWriteError> {
        Err(HandlerWriteError::io(
            "broken",
            std::io::Error::new(std::io::ErrorKind::BrokenPipe, "pipe closed"),
        ))
    }

    fn emit_literal(&self, _bytes: &[u8]) -> Result<(), HandlerWriteError> {
        panic!("literal sink exploded")
    }
}

/// Counts emissions and can be told to dawdle inside `emit_line`.
#[derive(Debug, Default)]
struct Counting {
    emitted: AtomicUsize,
    inside: AtomicBool,
    slow: AtomicBool,
}

impl Handler for Counting {
    fn emit_line(&self, _ctx: &EmissionContext, _text: &str) -> Result<(), HandlerWriteError> {
        self.inside.store(true, Ordering::SeqCst);
        if self.slow.load(Ordering::SeqCst) {
            thread::sleep(Duration::from_millis(50));
        }
        self.emitted.fetch_add(1, Ordering::SeqCst);
        self.inside.store(false, Ordering::SeqCst);
        Ok(())
    }

    fn emit_literal(&self, _bytes: &[u8]) -> Result<(), HandlerWriteError> {
        Ok(())
    }
}

#[test]
fn broken_handler_does_not_starve_the_others() {
    let manager = manager("isolation");
    let before = Arc::new(InMemoryHandler::new());
    let after = Arc::new(InMemoryHandler::new());
    manager.install_handler(before.clone()).unwrap();
    manager.install_handler(Arc::new(Broken)).unwrap();
    manager.install_handler(after.clone()).unwrap();

    let diagnostics = Arc::new(Mutex::new(Vec::new()));
    let sink = diagnostics.clone();
    manager.set_diagnostics(DiagnosticMode::hook(move |d: &Diagnostic| {
        sink.lock().unwrap().push(d.to_string())
    }));

    linewise::info!(manager, "first");
    manager.banner("banner");
    linewise::info!(manager, "second");

    assert_eq!(before.texts(), ["first", "second"]);
    assert_eq!(after.texts(), ["first", "second"]);
    assert_eq!(after.literals(), [b"banner".to_vec()]);

    let diagnostics = diagnostics.lock().unwrap();
    assert_eq!(diagnostics.len(), 3);
    assert!(diagnostics[0].contains("pipe closed"));
    assert!(diagnostics[1].contains("literal sink exploded"));
}

#[test]
fn removed_handler_receives_nothing_further() {
    let manager = manager("isolation-remove");
    let counting = Arc::new(Counting::default());
    let survivor = Arc::new(InMemoryHandler::new());
    let handle = manager.install_handler(counting.clone()).unwrap();
    manager.install_handler(survivor.clone()).unwrap();

    let stop = Arc::new(AtomicBool::new(false));
    let writers: Vec<_> = (0..2)
        .map(|t| {
            let manager = manager.clone();
            let stop = stop.clone();
            thread::spawn(move || {
                let mut i = 0;
                while !stop.load(Ordering::SeqCst) {
                    linewise::info!(manager, "writer {t} line {i}");
                    i += 1;
                }
            })
        })
        .collect();

    while counting.emitted.load(Ordering::SeqCst) < 100 {
        thread::yield_now();
    }
    manager.remove_handler(handle).unwrap();
    let at_removal = counting.emitted.load(Ordering::SeqCst);
    thread::sleep(Duration::from_millis(20));
    stop.store(true, Ordering::SeqCst);
    for writer in writers {
        writer.join().unwrap();
    }

    assert_eq!(counting.emitted.load(Ordering::SeqCst), at_removal);
    assert!(survivor.texts().len() > at_removal);
}

#[test]
fn removal_waits_for_in_flight_delivery() {
    let manager = manager("isolation-inflight");
    let counting = Arc::new(Counting::default());
    counting.slow.store(true, Ordering::SeqCst);
    let handle = manager.install_handler(counting.clone()).unwrap();

    let writer = {
        let manager = manager.clone();
        thread::spawn(move || manager.dispatch(Level::Info, "slow", true).unwrap())
    };
    while !counting.inside.load(Ordering::SeqCst) {
        thread::yield_now();
    }
    manager.remove_handler(handle).unwrap();
    // removal returned, so the delivery that was under way has completed
    assert!(!counting.inside.load(Ordering::SeqCst));
    assert_eq!(counting.emitted.load(Ordering::SeqCst), 1);

    let report = writer.join().unwrap();
    assert_eq!(report.delivered, 1);
}

#[test]
fn removed_handler_can_be_dropped_by_caller() {
    let manager = manager("isolation-drop");
    let memory = Arc::new(InMemoryHandler::new());
    let handle = manager.install_handler(memory.clone()).unwrap();
    let returned = manager.remove_handler(handle).unwrap();
    drop(returned);
    // the manager no longer holds a reference
    assert_eq!(Arc::strong_count(&memory), 1);
}

#[cfg(target_os = "linux")]
#[test]
fn lost_buffered_output_is_reported_on_removal() {
    let manager = manager("isolation-full-disk");
    let diagnostics = Arc::new(Mutex::new(Vec::new()));
    let sink = diagnostics.clone();
    manager.set_diagnostics(DiagnosticMode::hook(move |d: &Diagnostic| {
        sink.lock().unwrap().push(d.to_string())
    }));
    let file = FileHandler::open("/dev/full")
        .unwrap()
        .with_flush_policy(FlushPolicy::OnShutdown);
    let handle = manager.install_handler(Arc::new(file)).unwrap();

    // buffered, so the write itself succeeds
    let report = manager.dispatch(Level::Info, "never lands", true).unwrap();
    assert!(report.is_clean());
    manager.remove_handler(handle).unwrap();

    let diagnostics = diagnostics.lock().unwrap();
    assert_eq!(diagnostics.len(), 1);
    assert!(diagnostics[0].contains("on_remove"));
    assert!(diagnostics[0].contains("/dev/full"));
}

#[cfg(target_os = "linux")]
#[test]
fn lost_buffered_output_is_reported_on_shutdown() {
    let manager = manager("isolation-full-disk-shutdown");
    let diagnostics = Arc::new(Mutex::new(Vec::new()));
    let sink = diagnostics.clone();
    manager.set_diagnostics(DiagnosticMode::hook(move |d: &Diagnostic| {
        sink.lock().unwrap().push(d.to_string())
    }));
    let file = FileHandler::open("/dev/full")
        .unwrap()
        .with_flush_policy(FlushPolicy::OnShutdown);
    manager.install_handler(Arc::new(file)).unwrap();
    let memory = Arc::new(InMemoryHandler::new());
    manager.install_handler(memory.clone()).unwrap();

    manager.dispatch(Level::Info, "never lands", true).unwrap();
    assert_eq!(manager.shutdown().len(), 2);

    let diagnostics = diagnostics.lock().unwrap();
    assert!(!diagnostics.is_empty());
    assert!(diagnostics[0].contains("prepare_to_die"));
    assert!(diagnostics.iter().all(|d| d.contains("/dev/full")));
}
