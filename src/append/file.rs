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

use std::fs;
use std::fs::File;
use std::fs::OpenOptions;
use std::io;
use std::io::Write;
use std::path::Path;
use std::path::PathBuf;

use crate::Error;
use crate::append::Sink;

/// A sink that appends to a single file.
///
/// # Examples
///
/// ```no_run
/// use logtree::Repository;
/// use logtree::append::Appender;
/// use logtree::append::FileSink;
///
/// let repo = Repository::new();
/// let sink = FileSink::new("logs/app.log", false).unwrap();
/// let appender = Appender::builder("file", sink).build(&repo).unwrap();
/// ```
#[derive(Debug)]
pub struct FileSink {
    path: PathBuf,
    file: Option<File>,
}

impl FileSink {
    /// Open `path` for appending, creating it and its directory if needed.
    ///
    /// With `truncate` set, existing content is discarded.
    ///
    /// # Errors
    ///
    /// Return a configuration error if the path exists but is not a regular file, or if the
    /// file cannot be opened.
    pub fn new(path: impl Into<PathBuf>, truncate: bool) -> Result<Self, Error> {
        let path = path.into();
        prepare_log_path(&path)?;
        let file = open_append(&path).map_err(|err| {
            Error::config("failed to open log file")
                .with_context("path", path.display())
                .with_source(err)
        })?;
        if truncate {
            file.set_len(0).map_err(|err| {
                Error::config("failed to truncate log file")
                    .with_context("path", path.display())
                    .with_source(err)
            })?;
        }
        Ok(FileSink {
            path,
            file: Some(file),
        })
    }

    /// The file path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn file(&mut self) -> io::Result<&mut File> {
        if self.file.is_none() {
            self.file = Some(open_append(&self.path)?);
        }
        self.file
            .as_mut()
            .ok_or_else(|| io::Error::other("log file is not open"))
    }
}

impl Sink for FileSink {
    fn write(&mut self, text: &str) -> io::Result<()> {
        self.file()?.write_all(text.as_bytes())
    }

    fn flush(&mut self) -> io::Result<()> {
        match self.file.as_mut() {
            Some(file) => file.flush(),
            None => Ok(()),
        }
    }

    fn close(&mut self) -> io::Result<()> {
        let result = self.flush();
        self.file = None;
        result
    }

    fn reopen(&mut self) -> io::Result<()> {
        self.close()?;
        self.file = Some(open_append(&self.path)?);
        Ok(())
    }
}

/// Check that `path` can hold a log file, creating its parent directory.
pub(crate) fn prepare_log_path(path: &Path) -> Result<(), Error> {
    if path.as_os_str().is_empty() {
        return Err(Error::config("no filename was given"));
    }

    match fs::metadata(path) {
        Ok(metadata) if !metadata.is_file() => {
            return Err(Error::config("log path is not a regular file")
                .with_context("path", path.display()));
        }
        Ok(metadata) if metadata.permissions().readonly() => {
            return Err(
                Error::config("log file is not writable").with_context("path", path.display())
            );
        }
        _ => {}
    }

    if let Some(dir) = path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
        fs::create_dir_all(dir).map_err(|err| {
            Error::config("failed to create log directory")
                .with_context("dir", dir.display())
                .with_source(err)
        })?;
    }
    Ok(())
}

pub(crate) fn open_append(path: &Path) -> io::Result<File> {
    OpenOptions::new().create(true).append(true).open(path)
}
