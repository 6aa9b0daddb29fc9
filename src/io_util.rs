//! External filesystem helpers: path creation, readability/writability
//! probes, unique filename generation, scratch tempfiles, and a
//! buffered byte-skip for streams that don't support `Seek`.
//!
//! Grounded directly on `file_util.c`'s free functions (`mkpath`,
//! `test_file_readable`, `test_file_writable`, `get_file_size`,
//! `file_reader_generate_filename`, `stream_skip`), translated from
//! hand-rolled `stat`/`fopen` probing to `std::fs`/`std::io`
//! equivalents, and from a manual filename-counter scan to the
//! `tempfile` crate for scratch-file creation.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};

/// Create `path` and all missing parent directories, equivalent to
/// `mkdir -p`. A no-op if `path` already exists and is a directory.
pub fn ensure_path_exists(path: &Path) -> io::Result<()> {
    fs::create_dir_all(path)
}

/// Whether `path` can be opened for reading.
pub fn file_is_readable(path: &Path) -> bool {
    File::open(path).is_ok()
}

/// Whether `path` can be opened for writing, creating it if absent
/// (matches the original's `fopen(path, "w")` probe, which also
/// creates the file as a side effect).
pub fn file_is_writable(path: &Path) -> bool {
    OpenOptions::new().write(true).create(true).open(path).is_ok()
}

/// Size of `path` in bytes, or `None` if it cannot be stat'd.
pub fn file_size(path: &Path) -> Option<u64> {
    fs::metadata(path).map(|m| m.len()).ok()
}

/// Find the first filename matching `base_fmt` (a `format!`-style
/// template with one `{}` placeholder for an integer) that does not
/// already exist on disk, trying indices `0..10000`. Returns `None` if
/// every index in that range is taken.
pub fn generate_unique_filename(base_fmt: &str) -> Option<PathBuf> {
    for i in 0..10000u32 {
        let candidate = PathBuf::from(base_fmt.replacen("{}", &i.to_string(), 1));
        if !candidate.exists() {
            return Some(candidate);
        }
    }
    None
}

/// Allocate `n` anonymous scratch files, unlinked as soon as they're
/// created so they're cleaned up automatically when dropped or when
/// the process exits, whichever comes first.
pub fn tempfiles(n: usize) -> io::Result<Vec<File>> {
    (0..n).map(|_| tempfile::tempfile()).collect()
}

/// Concatenate the contents of `files` (each rewound to its start)
/// onto `dest`, returning the total number of bytes copied.
pub fn merge_tempfiles<W: Write>(files: &mut [File], dest: &mut W) -> io::Result<u64> {
    use std::io::Seek;
    let mut total = 0u64;
    for f in files.iter_mut() {
        f.seek(io::SeekFrom::Start(0))?;
        total += io::copy(f, dest)?;
    }
    Ok(total)
}

/// Discard up to `skip` bytes from `r` a byte at a time, stopping
/// early at EOF. Returns the number of bytes actually skipped. Used
/// when `r` doesn't support `Seek` (e.g. a pipe).
pub fn stream_skip<R: Read>(r: &mut R, skip: u64) -> io::Result<u64> {
    let mut buf = [0u8; 1];
    let mut skipped = 0u64;
    while skipped < skip {
        match r.read(&mut buf)? {
            0 => break,
            n => skipped += n as u64,
        }
    }
    Ok(skipped)
}
