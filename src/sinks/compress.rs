//! Background gzip compression of rotated backups

use crate::core::error::{ErrorHandler, LoggerError, Result};
use crossbeam_channel::{unbounded, Sender};
use flate2::write::GzEncoder;
use flate2::Compression;
use parking_lot::Mutex;
use std::collections::HashSet;
use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// Path of the compressed copy of `path`
pub fn gz_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".gz");
    path.with_file_name(name)
}

/// Compress `path` to `<path>.gz` and remove the original.
///
/// Output goes to a `.tmp` file first and is renamed into place only when
/// the gzip stream is complete, so a crash never leaves a truncated `.gz`.
pub fn compress_file(path: &Path) -> Result<PathBuf> {
    let gz = gz_path(path);
    let mut tmp_name = gz.file_name().unwrap_or_default().to_os_string();
    tmp_name.push(".tmp");
    let tmp = gz.with_file_name(tmp_name);

    let input = File::open(path).map_err(|e| {
        LoggerError::io_operation(
            "compress log file",
            format!("Failed to open file for compression: {}", path.display()),
            e,
        )
    })?;
    let output = File::create(&tmp).map_err(|e| {
        LoggerError::io_operation(
            "compress log file",
            format!("Failed to create temporary compressed file: {}", tmp.display()),
            e,
        )
    })?;

    let mut reader = BufReader::with_capacity(64 * 1024, input);
    let mut encoder = GzEncoder::new(
        BufWriter::with_capacity(64 * 1024, output),
        Compression::default(),
    );

    let streamed = io::copy(&mut reader, &mut encoder)
        .and_then(|_| encoder.finish())
        .and_then(|mut out| io::Write::flush(&mut out));
    if let Err(e) = streamed {
        let _ = fs::remove_file(&tmp);
        return Err(LoggerError::io_operation(
            "compress log file",
            format!("Failed to compress {}", path.display()),
            e,
        ));
    }

    fs::rename(&tmp, &gz).map_err(|e| {
        let _ = fs::remove_file(&tmp);
        LoggerError::io_operation(
            "compress log file",
            format!("Failed to rename compressed file to: {}", gz.display()),
            e,
        )
    })?;

    // The .gz is complete; a leftover original is retried on the next rotation.
    if let Err(e) = fs::remove_file(path) {
        eprintln!(
            "[LOGGER WARNING] Compressed {} but failed to remove the original: {}",
            path.display(),
            e
        );
    }

    Ok(gz)
}

#[derive(Default)]
struct Queue {
    pending: HashSet<PathBuf>,
    /// Pending paths that retention dropped; removed once their job ends
    discarded: HashSet<PathBuf>,
}

impl Queue {
    /// Close out the job for `path`, deleting its output if it was discarded
    fn finish(&mut self, path: &Path, on_error: &ErrorHandler) {
        if self.discarded.remove(path) {
            for file in [path.to_path_buf(), gz_path(path)] {
                match fs::remove_file(&file) {
                    Ok(()) => {}
                    Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                    Err(e) => on_error(&LoggerError::file_rotation(
                        file.display().to_string(),
                        format!("Failed to remove old backup: {}", e),
                    )),
                }
            }
        }
        self.pending.remove(path);
    }
}

/// Worker thread that compresses backups handed to it after rotation.
/// Each path is queued at most once while it is pending.
pub struct Compressor {
    sender: Option<Sender<PathBuf>>,
    queue: Arc<Mutex<Queue>>,
    handle: Option<JoinHandle<()>>,
}

impl Compressor {
    pub fn spawn(on_error: ErrorHandler) -> Result<Self> {
        let (sender, receiver) = unbounded::<PathBuf>();
        let queue = Arc::new(Mutex::new(Queue::default()));
        let worker_queue = Arc::clone(&queue);

        let handle = thread::Builder::new()
            .name("log-compress".to_string())
            .spawn(move || {
                for path in receiver.iter() {
                    // Resubmitted after an earlier job already finished it
                    let compressed = if !path.exists() && gz_path(&path).exists() {
                        Ok(gz_path(&path))
                    } else {
                        compress_file(&path)
                    };
                    let mut queue = worker_queue.lock();
                    if let Err(e) = compressed {
                        // A discarded backup may already be gone.
                        if !queue.discarded.contains(&path) {
                            on_error(&e);
                        }
                    }
                    queue.finish(&path, &on_error);
                }
            })
            .map_err(|e| LoggerError::io_operation("spawn compressor", "thread spawn failed", e))?;

        Ok(Self {
            sender: Some(sender),
            queue,
            handle: Some(handle),
        })
    }

    /// Queue `path` for compression. Returns false if it was already queued.
    pub fn submit(&self, path: PathBuf) -> bool {
        let Some(sender) = &self.sender else {
            return false;
        };
        if !self.queue.lock().pending.insert(path.clone()) {
            return false;
        }
        if sender.send(path.clone()).is_err() {
            self.queue.lock().pending.remove(&path);
            return false;
        }
        true
    }

    pub fn is_pending(&self, path: &Path) -> bool {
        self.queue.lock().pending.contains(path)
    }

    /// Mark a queued backup for removal once its job ends. Returns false if
    /// `path` is not pending, in which case the caller removes it directly.
    pub fn discard(&self, path: &Path) -> bool {
        let mut queue = self.queue.lock();
        if !queue.pending.contains(path) {
            return false;
        }
        queue.discarded.insert(path.to_path_buf());
        true
    }

    pub fn is_discarded(&self, path: &Path) -> bool {
        self.queue.lock().discarded.contains(path)
    }

    pub fn pending(&self) -> usize {
        self.queue.lock().pending.len()
    }

    /// Block until the queue drains or `timeout` elapses
    pub fn wait_idle(&self, timeout: Duration) -> bool {
        let start = Instant::now();
        while self.pending() > 0 {
            if start.elapsed() >= timeout {
                return false;
            }
            thread::sleep(Duration::from_millis(10));
        }
        true
    }
}

impl Drop for Compressor {
    fn drop(&mut self) {
        // Closing the channel ends the worker loop once the queue is empty.
        drop(self.sender.take());

        if let Some(handle) = self.handle.take() {
            let start = Instant::now();
            while !handle.is_finished() {
                if start.elapsed() >= crate::core::logger::DEFAULT_SHUTDOWN_TIMEOUT {
                    eprintln!(
                        "[LOGGER WARNING] Compressor did not finish within {:?}, {} backups left uncompressed",
                        crate::core::logger::DEFAULT_SHUTDOWN_TIMEOUT,
                        self.pending()
                    );
                    return;
                }
                thread::sleep(Duration::from_millis(10));
            }
            let _ = handle.join();
        }
    }
}
