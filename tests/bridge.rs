// Copyright 2024 FastLabs Developers
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use log::Log;
use logtree::Repository;
use logtree::append::Appender;
use logtree::append::StringIo;
use logtree::bridge::LogBridge;

fn repo_with_output() -> (Repository, StringIo) {
    let repo = Repository::new();
    let out = StringIo::default();
    let appender = Appender::builder("bridged", out.clone())
        .build(&repo)
        .unwrap();
    repo.root().add_appender(appender);
    (repo, out)
}

#[test]
fn test_records_map_to_named_loggers() {
    let (repo, out) = repo_with_output();
    repo.logger("app").unwrap().set_level("warn").unwrap();
    let bridge = LogBridge::new(repo.clone());

    bridge.log(
        &log::Record::builder()
            .args(format_args!("pool exhausted"))
            .level(log::Level::Error)
            .target("app::db")
            .file_static(Some("src/db.rs"))
            .line(Some(42))
            .module_path_static(Some("app::db"))
            .build(),
    );
    bridge.log(
        &log::Record::builder()
            .args(format_args!("dropped by app"))
            .level(log::Level::Info)
            .target("app::db")
            .build(),
    );
    assert_eq!(out.contents(), "ERROR - app::db - pool exhausted\n");

    // `trace` has no level of its own here and maps to `debug`
    let metadata = log::Metadata::builder()
        .level(log::Level::Trace)
        .target("other")
        .build();
    assert!(bridge.enabled(&metadata));
    let metadata = log::Metadata::builder()
        .level(log::Level::Trace)
        .target("app::db")
        .build();
    assert!(!bridge.enabled(&metadata));
}

#[test]
fn test_unknown_levels_are_dropped() {
    let (repo, out) = repo_with_output();
    repo.define_levels(["info", "error"]).unwrap();
    let bridge = LogBridge::new(repo);

    bridge.log(
        &log::Record::builder()
            .args(format_args!("no such level"))
            .level(log::Level::Warn)
            .target("x")
            .build(),
    );
    bridge.log(
        &log::Record::builder()
            .args(format_args!("kept"))
            .level(log::Level::Error)
            .target("x")
            .build(),
    );
    assert_eq!(out.contents(), "ERROR - x - kept\n");
}

#[test]
fn test_setup_log_crate() {
    let (repo, out) = repo_with_output();
    logtree::bridge::setup_log_crate(&repo);

    log::warn!(target: "legacy::module", "from the facade: {}", 1);
    log::logger().flush();
    assert_eq!(
        out.contents(),
        " WARN - legacy::module - from the facade: 1\n"
    );
}
