// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Per-test logging setup.

use camino::Utf8PathBuf;
use slog::Drain;
use slog::Logger;
use slog::o;
use std::fs::File;
use std::process;
use std::sync::Mutex;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;

/// Log state for a single test: a logger writing to a file named for the
/// test.  The file is removed only when the test declares success via
/// [`LogContext::cleanup_successful`], so a failing test leaves its log
/// behind for debugging.
pub struct LogContext {
    pub log: Logger,
    log_path: Option<Utf8PathBuf>,
}

impl LogContext {
    /// Removes the log file.  Call only when the test has passed.
    pub fn cleanup_successful(mut self) {
        if let Some(path) = self.log_path.take() {
            if let Err(error) = std::fs::remove_file(&path) {
                panic!("removing log file {path}: {error}");
            }
        }
    }
}

static LOG_INDEX: AtomicU64 = AtomicU64::new(0);

/// Set up a [`LogContext`] appropriate for a test named `test_name`.
pub fn test_setup_log(test_name: &str) -> LogContext {
    let index = LOG_INDEX.fetch_add(1, Ordering::Relaxed);
    let mut path = Utf8PathBuf::try_from(std::env::temp_dir())
        .unwrap_or_else(|_| Utf8PathBuf::from("/tmp"));
    path.push(format!("{}.{}.{}.log", test_name, process::id(), index));

    let file = File::create(&path)
        .unwrap_or_else(|error| panic!("creating log file {path}: {error}"));
    eprintln!("log file: {path}");

    let decorator = slog_term::PlainDecorator::new(file);
    let drain = slog_term::FullFormat::new(decorator).build().fuse();
    let drain = Mutex::new(drain).fuse();
    let log = Logger::root(drain, o!("test" => test_name.to_string()));
    LogContext { log, log_path: Some(path) }
}
