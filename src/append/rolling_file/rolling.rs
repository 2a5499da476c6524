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
use std::io;
use std::io::Write;
use std::path::Path;
use std::path::PathBuf;

use jiff::Zoned;

use crate::Error;
use crate::append::Sink;
use crate::append::file::open_append;
use crate::append::file::prepare_log_path;
use crate::append::rolling_file::clock::Clock;
use crate::append::rolling_file::rotation::MaxAge;

/// A sink for rolling files.
///
/// Each write lands in the live file first; the size and age triggers are checked afterwards,
/// so the message that crosses a limit is the last one in the rolled file. A failed roll does
/// not fail the write: the error is kept for [`Sink::take_error`], which the owning appender
/// reports to the repository's trap, and the roll is tried again at the next write.
#[derive(Debug)]
pub struct RollingFile {
    state: State,
    writer: Option<File>,
    failed_roll: Option<Error>,
}

impl Drop for RollingFile {
    fn drop(&mut self) {
        if let Some(writer) = self.writer.as_mut() {
            let _ = writer.flush();
        }
    }
}

impl RollingFile {
    /// Start building a rolling file sink for the live file at `path`.
    pub fn builder(path: impl Into<PathBuf>) -> RollingFileBuilder {
        RollingFileBuilder::new(path)
    }

    /// The path of the live file.
    pub fn path(&self) -> &Path {
        &self.state.path
    }

    fn writer(&mut self) -> io::Result<&mut File> {
        if self.writer.is_none() {
            self.writer = Some(open_append(&self.state.path)?);
        }
        self.writer
            .as_mut()
            .ok_or_else(|| io::Error::other("log file is not open"))
    }

    /// Roll the live file if a trigger fires; a failure is kept until taken.
    fn roll_if_required(&mut self) {
        let now = self.state.clock.now();
        if !self.state.roll_required(&now) {
            return;
        }
        if let Err(err) = self.roll(now) {
            self.failed_roll = Some(err);
        }
    }

    fn roll(&mut self, now: Zoned) -> Result<(), Error> {
        // the handle must be released before the live file is renamed
        if let Some(mut writer) = self.writer.take() {
            let _ = writer.flush();
        }

        let rolled = self.state.rotate();
        let reopened = open_append(&self.state.path).map_err(|err| {
            Error::io("failed to open log file after rotation")
                .with_context("path", self.state.path.display())
                .with_source(err)
        });

        match reopened {
            Ok(file) => {
                self.state.current_size = file.metadata().map_or(0, |m| m.len());
                self.writer = Some(file);
            }
            Err(err) => return rolled.and(Err(err)),
        }
        if rolled.is_ok() {
            self.state.since = now;
        }
        rolled
    }
}

impl Sink for RollingFile {
    fn write(&mut self, text: &str) -> io::Result<()> {
        self.writer()?.write_all(text.as_bytes())?;
        self.state.current_size += text.len() as u64;
        self.roll_if_required();
        Ok(())
    }

    fn flush(&mut self) -> io::Result<()> {
        match self.writer.as_mut() {
            Some(writer) => writer.flush(),
            None => Ok(()),
        }
    }

    fn close(&mut self) -> io::Result<()> {
        let result = self.flush();
        self.writer = None;
        result
    }

    fn reopen(&mut self) -> io::Result<()> {
        self.close()?;
        let file = open_append(&self.state.path)?;
        self.state.current_size = file.metadata()?.len();
        self.writer = Some(file);
        Ok(())
    }

    fn take_error(&mut self) -> Option<Error> {
        self.failed_roll.take()
    }
}

/// A builder for configuring [`RollingFile`].
///
/// # Examples
///
/// ```no_run
/// use logtree::Repository;
/// use logtree::append::Appender;
/// use logtree::append::rolling_file::MaxAge;
/// use logtree::append::rolling_file::RollingFile;
///
/// let repo = Repository::new();
/// let sink = RollingFile::builder("logs/app.log")
///     .keep(7)
///     .max_size(10 * 1024 * 1024)
///     .max_age(MaxAge::Daily)
///     .build()
///     .unwrap();
/// let appender = Appender::builder("rolling", sink).build(&repo).unwrap();
/// ```
#[derive(Debug)]
pub struct RollingFileBuilder {
    // required
    path: PathBuf,

    // has default
    keep: Option<usize>,
    max_size: Option<u64>,
    max_age: Option<MaxAge>,
    truncate: bool,
    clock: Clock,
}

impl RollingFileBuilder {
    /// Creates a new [`RollingFileBuilder`].
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            keep: None,
            max_size: None,
            max_age: None,
            truncate: false,
            clock: Clock::DefaultClock,
        }
    }

    /// Keep at most `n` rolled files; older ones are deleted.
    ///
    /// Default to keeping every rolled file.
    #[must_use]
    pub fn keep(mut self, n: usize) -> Self {
        self.keep = Some(n);
        self
    }

    /// Roll once the live file grows past `bytes`.
    #[must_use]
    pub fn max_size(mut self, bytes: u64) -> Self {
        self.max_size = Some(bytes);
        self
    }

    /// Roll once the live file gets older than `age`.
    #[must_use]
    pub fn max_age(mut self, age: impl Into<MaxAge>) -> Self {
        self.max_age = Some(age.into());
        self
    }

    /// Roll any existing live file away before the first write.
    ///
    /// Default to `false`, which keeps appending to an existing file.
    #[must_use]
    pub fn truncate(mut self, truncate: bool) -> Self {
        self.truncate = truncate;
        self
    }

    #[cfg(test)]
    fn clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    /// Builds the [`RollingFile`].
    ///
    /// # Errors
    ///
    /// Return a configuration error if the path is empty or not a regular file, if the
    /// directory cannot be created, or if the live file cannot be opened or rolled.
    pub fn build(self) -> Result<RollingFile, Error> {
        let Self {
            path,
            keep,
            max_size,
            max_age,
            truncate,
            clock,
        } = self;

        prepare_log_path(&path)?;
        let (dir, stem, ext) = split_path(&path)?;

        let now = clock.now();
        let existing = fs::metadata(&path).ok();
        let since = existing
            .as_ref()
            .and_then(|m| m.modified().ok())
            .and_then(|mtime| Zoned::try_from(mtime).ok())
            .unwrap_or_else(|| now.clone());

        let mut state = State {
            path,
            dir,
            stem,
            ext,
            keep,
            max_size,
            max_age,
            current_size: existing.as_ref().map_or(0, |m| m.len()),
            since,
            clock,
        };

        if truncate && existing.is_some() {
            state.rotate()?;
            state.since = now;
        }

        let file = open_append(&state.path).map_err(|err| {
            Error::config("failed to open log file")
                .with_context("path", state.path.display())
                .with_source(err)
        })?;
        state.current_size = file
            .metadata()
            .map_or(state.current_size, |m| m.len());

        Ok(RollingFile {
            state,
            writer: Some(file),
            failed_roll: None,
        })
    }
}

/// A rolled file found next to the live file.
#[derive(Debug)]
struct Rolled {
    count: usize,
    filepath: PathBuf,
}

#[derive(Debug)]
struct State {
    path: PathBuf,
    dir: PathBuf,
    stem: String,
    ext: String,
    keep: Option<usize>,
    max_size: Option<u64>,
    max_age: Option<MaxAge>,
    current_size: u64,
    since: Zoned,
    clock: Clock,
}

impl State {
    fn roll_required(&self, now: &Zoned) -> bool {
        let oversized = self.max_size.is_some_and(|n| self.current_size > n);
        let aged = self
            .max_age
            .is_some_and(|age| age.is_exceeded(&self.since, now));
        oversized || aged
    }

    fn rolled_path(&self, count: usize) -> PathBuf {
        self.dir.join(format!("{}.{count}{}", self.stem, self.ext))
    }

    fn list_rolled(&self) -> Result<Vec<Rolled>, Error> {
        let read_dir = fs::read_dir(&self.dir).map_err(|err| {
            Error::io("failed to read log dir")
                .with_context("dir", self.dir.display())
                .with_source(err)
        })?;

        let mut files = read_dir
            .filter_map(|entry| {
                let entry = entry.ok()?;
                // the sink only creates files, not directories or symlinks
                if !entry.file_type().ok()?.is_file() {
                    return None;
                }

                let filename = entry.file_name();
                // if the filename is not a UTF-8 string, skip it.
                let filename = filename.to_str()?;
                let count = filename
                    .strip_prefix(self.stem.as_str())?
                    .strip_prefix('.')?
                    .strip_suffix(self.ext.as_str())?;
                if count.is_empty() || !count.bytes().all(|b| b.is_ascii_digit()) {
                    return None;
                }

                Some(Rolled {
                    count: count.parse().ok()?,
                    filepath: entry.path(),
                })
            })
            .collect::<Vec<_>>();

        // highest first, so no rename overwrites a file that is yet to move
        files.sort_by(|a, b| b.count.cmp(&a.count));
        Ok(files)
    }

    /// Shift rolled files up by one, evicting those past `keep`, then move the live file to `.1`.
    fn rotate(&self) -> Result<(), Error> {
        for file in self.list_rolled()? {
            let filepath = &file.filepath;
            if self.keep.is_some_and(|keep| file.count >= keep) {
                fs::remove_file(filepath).map_err(|err| {
                    Error::io("failed to remove old log")
                        .with_context("path", filepath.display())
                        .with_source(err)
                })?;
                continue;
            }

            let next = self.rolled_path(file.count + 1);
            fs::rename(filepath, &next).map_err(|err| {
                Error::io("failed to rotate log")
                    .with_context("from", filepath.display())
                    .with_context("to", next.display())
                    .with_source(err)
            })?;
        }

        let archive = self.rolled_path(1);
        fs::rename(&self.path, &archive).map_err(|err| {
            Error::io("failed to archive log")
                .with_context("from", self.path.display())
                .with_context("to", archive.display())
                .with_source(err)
        })
    }
}

// `dir/app.log` -> (`dir`, `app`, `.log`); `dir/app` -> (`dir`, `app`, ``)
fn split_path(path: &Path) -> Result<(PathBuf, String, String), Error> {
    let invalid = || Error::config("log path is not valid UTF-8").with_context("path", path.display());

    let dir = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
        _ => PathBuf::from("."),
    };
    let stem = path
        .file_stem()
        .ok_or_else(|| Error::config("no filename was given").with_context("path", path.display()))?
        .to_str()
        .ok_or_else(invalid)?
        .to_string();
    let ext = match path.extension() {
        Some(ext) => format!(".{}", ext.to_str().ok_or_else(invalid)?),
        None => String::new(),
    };
    Ok((dir, stem, ext))
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::str::FromStr;
    use std::time::Duration;

    use jiff::ToSpan;
    use jiff::Zoned;
    use rand::Rng;
    use rand::distr::Alphanumeric;
    use tempfile::TempDir;

    use super::*;
    use crate::append::rolling_file::clock::ManualClock;

    fn read(dir: &TempDir, name: &str) -> String {
        fs::read_to_string(dir.path().join(name)).unwrap()
    }

    fn file_names(dir: &TempDir) -> Vec<String> {
        let mut names = fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
            .collect::<Vec<_>>();
        names.sort();
        names
    }

    #[test]
    fn test_split_path() {
        let (dir, stem, ext) = split_path(Path::new("/var/log/app.log")).unwrap();
        assert_eq!(dir, PathBuf::from("/var/log"));
        assert_eq!((stem.as_str(), ext.as_str()), ("app", ".log"));

        let (dir, stem, ext) = split_path(Path::new("app")).unwrap();
        assert_eq!(dir, PathBuf::from("."));
        assert_eq!((stem.as_str(), ext.as_str()), ("app", ""));
    }

    #[test]
    fn test_roll_keeps_literal_contents() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(temp_dir.path().join("test.1.log"), "one").unwrap();
        fs::write(temp_dir.path().join("test.2.log"), "two").unwrap();
        fs::write(temp_dir.path().join("test.3.log"), "three").unwrap();

        let mut sink = RollingFile::builder(temp_dir.path().join("test.log"))
            .keep(2)
            .max_size(10)
            .build()
            .unwrap();

        sink.write("0123456789").unwrap();
        assert_eq!(file_names(&temp_dir).len(), 4);
        // crossing the limit rolls after the write
        sink.write("abc\n").unwrap();
        sink.flush().unwrap();

        assert_eq!(
            file_names(&temp_dir),
            ["test.1.log", "test.2.log", "test.log"]
        );
        assert_eq!(read(&temp_dir, "test.log"), "");
        assert_eq!(read(&temp_dir, "test.1.log"), "0123456789abc\n");
        assert_eq!(read(&temp_dir, "test.2.log"), "one");
    }

    #[test]
    fn test_roll_without_extension() {
        let temp_dir = TempDir::new().unwrap();
        let mut sink = RollingFile::builder(temp_dir.path().join("server"))
            .max_size(3)
            .build()
            .unwrap();

        for line in ["aaaa", "bbbb", "cccc"] {
            sink.write(line).unwrap();
        }
        sink.flush().unwrap();

        assert_eq!(file_names(&temp_dir), ["server", "server.1", "server.2", "server.3"]);
        assert_eq!(read(&temp_dir, "server.1"), "cccc");
        assert_eq!(read(&temp_dir, "server.3"), "aaaa");
        assert_eq!(read(&temp_dir, "server"), "");
    }

    #[test]
    fn test_truncate_rolls_existing_file() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(temp_dir.path().join("app.log"), "previous run\n").unwrap();

        let mut sink = RollingFile::builder(temp_dir.path().join("app.log"))
            .truncate(true)
            .build()
            .unwrap();
        sink.write("fresh\n").unwrap();
        sink.flush().unwrap();

        assert_eq!(read(&temp_dir, "app.1.log"), "previous run\n");
        assert_eq!(read(&temp_dir, "app.log"), "fresh\n");
    }

    #[test]
    fn test_existing_file_is_appended() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(temp_dir.path().join("app.log"), "12345").unwrap();

        let mut sink = RollingFile::builder(temp_dir.path().join("app.log"))
            .max_size(6)
            .build()
            .unwrap();
        sink.write("6").unwrap();
        assert_eq!(file_names(&temp_dir), ["app.log"]);
        sink.write("7").unwrap();
        assert_eq!(read(&temp_dir, "app.1.log"), "1234567");
    }

    #[test]
    fn test_failed_roll_is_retried() {
        let temp_dir = TempDir::new().unwrap();
        let blocker = temp_dir.path().join("test.1.log");
        fs::create_dir(&blocker).unwrap();
        fs::write(blocker.join("occupied"), "x").unwrap();

        let mut sink = RollingFile::builder(temp_dir.path().join("test.log"))
            .max_size(4)
            .build()
            .unwrap();

        sink.write("first\n").unwrap();
        let err = sink.take_error().unwrap();
        assert!(err.message().contains("failed to archive log"));
        assert!(sink.take_error().is_none());
        // the in-flight message is kept in the live file
        assert_eq!(read(&temp_dir, "test.log"), "first\n");

        fs::remove_dir_all(&blocker).unwrap();
        sink.write("second\n").unwrap();
        sink.flush().unwrap();
        assert!(sink.take_error().is_none());
        assert_eq!(read(&temp_dir, "test.1.log"), "first\nsecond\n");
        assert_eq!(read(&temp_dir, "test.log"), "");
    }

    #[test]
    fn test_roll_by_age() {
        let temp_dir = TempDir::new().unwrap();
        let start_time = Zoned::from_str("2024-08-10T00:00:00[UTC]").unwrap();
        let mut sink = RollingFile::builder(temp_dir.path().join("test.log"))
            .max_age(Duration::from_secs(3600))
            .clock(Clock::ManualClock(ManualClock::new(start_time.clone())))
            .build()
            .unwrap();

        sink.write("a\n").unwrap();
        sink.state.clock.set_now(&start_time + 59.minutes());
        sink.write("b\n").unwrap();
        assert_eq!(file_names(&temp_dir), ["test.log"]);

        sink.state.clock.set_now(&start_time + 61.minutes());
        sink.write("c\n").unwrap();
        sink.state.clock.set_now(&start_time + 90.minutes());
        sink.write("d\n").unwrap();
        sink.flush().unwrap();

        assert_eq!(read(&temp_dir, "test.1.log"), "a\nb\nc\n");
        assert_eq!(read(&temp_dir, "test.log"), "d\n");
    }

    #[test]
    fn test_roll_daily_at_midnight() {
        let temp_dir = TempDir::new().unwrap();
        let start_time = Zoned::from_str("2024-08-10T22:00:00[UTC]").unwrap();
        let mut sink = RollingFile::builder(temp_dir.path().join("day.log"))
            .max_age(MaxAge::Daily)
            .clock(Clock::ManualClock(ManualClock::new(start_time.clone())))
            .build()
            .unwrap();

        sink.write("late\n").unwrap();
        sink.state.clock.set_now(&start_time + 3.hours());
        sink.write("after midnight\n").unwrap();
        sink.write("next\n").unwrap();
        sink.flush().unwrap();

        assert_eq!(read(&temp_dir, "day.1.log"), "late\nafter midnight\n");
        assert_eq!(read(&temp_dir, "day.log"), "next\n");
    }

    #[test]
    fn test_keep_bounds_file_count() {
        let temp_dir = TempDir::new().unwrap();
        let mut sink = RollingFile::builder(temp_dir.path().join("test.log"))
            .keep(3)
            .max_size(100)
            .build()
            .unwrap();

        for _ in 0..50 {
            sink.write(&generate_random_string()).unwrap();
        }
        sink.flush().unwrap();

        let names = file_names(&temp_dir);
        assert_eq!(names, ["test.1.log", "test.2.log", "test.3.log", "test.log"]);
        for name in &names[..3] {
            let len = fs::metadata(temp_dir.path().join(name)).unwrap().len();
            assert!(len > 100, "{name} rolled too early: {len}");
        }
    }

    fn generate_random_string() -> String {
        let mut rng = rand::rng();
        let len = rng.random_range(50..=100);
        let random_string: String = std::iter::repeat(())
            .map(|()| rng.sample(Alphanumeric))
            .map(char::from)
            .take(len)
            .collect();

        random_string
    }
}
