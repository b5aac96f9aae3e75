// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! agora-daemon: the autotuning server.
//!
//! Wires the MQTT transport, the worker pool, the per-application handlers,
//! and the plugin launcher together. The binary (`agorad`) lives in
//! `main.rs`; everything here is also a library so the workspace spec tests
//! can drive the server in-process against a fake transport.

pub mod handler;
pub mod launcher;
pub mod manager;
pub mod remote;
pub mod worker;

pub use handler::ApplicationHandler;
pub use launcher::{Launcher, LauncherConfiguration, LauncherError, PluginConfiguration};
pub use manager::ApplicationManager;
pub use remote::{Inbox, RemoteError, RemoteHandler};
pub use worker::WorkerPool;

#[cfg(any(test, feature = "test-support"))]
pub mod test_support;

#[cfg(any(test, feature = "test-support"))]
pub use remote::fake::FakeRemote;
