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

use std::sync::Arc;
use std::sync::Weak;
use std::thread;
use std::thread::JoinHandle;
use std::thread::ThreadId;
use std::time::Duration;

use crossbeam_channel::RecvTimeoutError;
use crossbeam_channel::Sender;

use crate::Error;
use crate::append::Append;
use crate::trap::Trap;

/// A background thread that flushes one appender periodically.
///
/// The thread only holds a weak reference, and stops when the appender is gone or when the
/// flusher is dropped.
#[derive(Debug)]
pub(crate) struct Flusher {
    stop: Option<Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl Flusher {
    pub(crate) fn spawn(
        name: &str,
        period: Duration,
        append: Weak<dyn Append>,
        trap: Arc<dyn Trap>,
    ) -> Result<Self, Error> {
        let (stop, stopped) = crossbeam_channel::bounded::<()>(1);
        let handle = thread::Builder::new()
            .name(format!("logtree-flush-{name}"))
            .spawn(move || {
                loop {
                    match stopped.recv_timeout(period) {
                        Err(RecvTimeoutError::Timeout) => {
                            let Some(append) = append.upgrade() else {
                                break;
                            };
                            if let Err(err) = append.flush() {
                                trap.trap(&err);
                            }
                        }
                        Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                    }
                }
            })
            .map_err(|err| Error::config("failed to spawn flusher thread").with_source(err))?;

        Ok(Flusher {
            stop: Some(stop),
            handle: Some(handle),
        })
    }

    fn thread_id(&self) -> Option<ThreadId> {
        self.handle.as_ref().map(|h| h.thread().id())
    }
}

impl Drop for Flusher {
    fn drop(&mut self) {
        // drop our sender, the thread will break the loop on disconnection
        drop(self.stop.take());

        // the last strong reference may be released on the flusher thread itself
        if self.thread_id() == Some(thread::current().id()) {
            return;
        }
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}
