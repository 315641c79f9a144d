//! Byte-addressable resources submitted for identification.
//!
//! An [`IdentificationRequest`] is the only view the engine has of the thing
//! being identified: random byte access, a known length, and the name and
//! extension it was found under. The caller owns the request and is
//! responsible for closing it; the engine only borrows it for the duration of
//! a match.

use std::borrow::Cow;
use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

use bytes::Bytes;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;

use crate::common::error::{Error, Result};

/// Bytes read eagerly from the start of a file request.
const HEAD_WINDOW: usize = 64 * 1024;

/// Block size used for random access outside the head window.
const BLOCK_SIZE: usize = 32 * 1024;

/// Metadata describing the resource behind a request.
///
/// Copied verbatim into every result collection produced for the request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RequestMetaData {
    /// Size of the resource in bytes
    pub size: u64,
    /// Last modification time, if known
    pub last_modified: Option<DateTime<Utc>>,
    /// Name (usually a path or URI) of the resource
    pub resource_name: String,
}

/// A resource that can be identified.
pub trait IdentificationRequest: Send + Sync {
    /// Read a single byte.
    ///
    /// Fails with [`Error::OutOfBounds`] past the end of the resource and with
    /// [`Error::ResourceClosed`] once the request has been closed.
    fn byte_at(&self, index: u64) -> Result<u8>;

    /// Read up to `len` bytes starting at `offset`.
    ///
    /// The returned range is clamped to the end of the resource, so it may be
    /// shorter than `len` (or empty when `offset` is past the end).
    fn read_bytes(&self, offset: u64, len: usize) -> Result<Cow<'_, [u8]>> {
        let size = self.size();
        if offset >= size {
            return Ok(Cow::Owned(Vec::new()));
        }
        let end = offset.saturating_add(len as u64).min(size);
        let mut out = Vec::with_capacity((end - offset) as usize);
        for index in offset..end {
            out.push(self.byte_at(index)?);
        }
        Ok(Cow::Owned(out))
    }

    /// Total length of the resource in bytes.
    fn size(&self) -> u64;

    /// File extension without the leading dot, if the resource has one.
    fn extension(&self) -> Option<&str>;

    /// Name of the resource (final path component).
    fn file_name(&self) -> &str;

    /// Metadata captured when the request was created.
    fn metadata(&self) -> &RequestMetaData;

    /// Release the underlying handle. Calling it more than once is harmless.
    fn close(&mut self) -> Result<()>;
}

/// Extract the extension from a file name: the text after the last `.` of the
/// final path component. An empty extension counts as none.
pub fn extension_of(file_name: &str) -> Option<&str> {
    let name = file_name.rsplit(['/', '\\']).next().unwrap_or(file_name);
    let (_, ext) = name.rsplit_once('.')?;
    if ext.is_empty() { None } else { Some(ext) }
}

/// Request over bytes held in memory.
#[derive(Debug, Clone)]
pub struct MemoryRequest {
    data: Bytes,
    file_name: String,
    extension: Option<String>,
    metadata: RequestMetaData,
    closed: bool,
}

impl MemoryRequest {
    /// Create a request for `data` found under `file_name`.
    ///
    /// The extension is derived from the file name; use
    /// [`MemoryRequest::with_extension`] to override it.
    pub fn new(file_name: impl Into<String>, data: impl Into<Bytes>) -> Self {
        let file_name = file_name.into();
        let data = data.into();
        let extension = extension_of(&file_name).map(str::to_string);
        let metadata = RequestMetaData {
            size: data.len() as u64,
            last_modified: None,
            resource_name: file_name.clone(),
        };
        Self {
            data,
            file_name,
            extension,
            metadata,
            closed: false,
        }
    }

    /// Replace the extension derived from the file name.
    pub fn with_extension(mut self, extension: Option<&str>) -> Self {
        self.extension = extension.filter(|ext| !ext.is_empty()).map(str::to_string);
        self
    }

    /// Record a last-modified time in the request metadata.
    pub fn with_last_modified(mut self, time: DateTime<Utc>) -> Self {
        self.metadata.last_modified = Some(time);
        self
    }

    fn ensure_open(&self) -> Result<()> {
        if self.closed {
            return Err(Error::ResourceClosed(self.file_name.clone()));
        }
        Ok(())
    }
}

impl IdentificationRequest for MemoryRequest {
    fn byte_at(&self, index: u64) -> Result<u8> {
        self.ensure_open()?;
        usize::try_from(index)
            .ok()
            .and_then(|i| self.data.get(i).copied())
            .ok_or(Error::OutOfBounds {
                index,
                size: self.size(),
            })
    }

    fn read_bytes(&self, offset: u64, len: usize) -> Result<Cow<'_, [u8]>> {
        self.ensure_open()?;
        let size = self.data.len();
        let start = usize::try_from(offset).unwrap_or(usize::MAX).min(size);
        let end = start.saturating_add(len).min(size);
        Ok(Cow::Borrowed(&self.data[start..end]))
    }

    fn size(&self) -> u64 {
        self.data.len() as u64
    }

    fn extension(&self) -> Option<&str> {
        self.extension.as_deref()
    }

    fn file_name(&self) -> &str {
        &self.file_name
    }

    fn metadata(&self) -> &RequestMetaData {
        &self.metadata
    }

    fn close(&mut self) -> Result<()> {
        self.closed = true;
        Ok(())
    }
}

/// Open handle plus the most recently read block.
#[derive(Debug)]
struct FileState {
    file: Option<File>,
    block_start: u64,
    block: Vec<u8>,
}

/// Request over a file on disk.
///
/// The first 64 KiB are read when the request is opened; anything beyond is
/// fetched on demand through a shared handle. Dropping the request closes the
/// handle, so early returns never leak it.
#[derive(Debug)]
pub struct FileRequest {
    path: PathBuf,
    file_name: String,
    extension: Option<String>,
    metadata: RequestMetaData,
    head: Vec<u8>,
    closed: AtomicBool,
    state: Mutex<FileState>,
}

impl FileRequest {
    /// Open `path` for identification.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let mut file = File::open(&path)?;
        let fs_meta = file.metadata()?;
        let size = fs_meta.len();
        let last_modified = fs_meta.modified().ok().map(DateTime::<Utc>::from);

        let head_len = size.min(HEAD_WINDOW as u64) as usize;
        let mut head = vec![0u8; head_len];
        file.read_exact(&mut head)?;

        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let extension = extension_of(&file_name).map(str::to_string);
        let metadata = RequestMetaData {
            size,
            last_modified,
            resource_name: path.to_string_lossy().into_owned(),
        };

        Ok(Self {
            path,
            file_name,
            extension,
            metadata,
            head,
            closed: AtomicBool::new(false),
            state: Mutex::new(FileState {
                file: Some(file),
                block_start: 0,
                block: Vec::new(),
            }),
        })
    }

    /// Replace the extension derived from the file name.
    pub fn with_extension(mut self, extension: Option<&str>) -> Self {
        self.extension = extension.filter(|ext| !ext.is_empty()).map(str::to_string);
        self
    }

    /// Path the request was opened from.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn ensure_open(&self) -> Result<()> {
        if self.closed.load(Ordering::Acquire) {
            return Err(Error::ResourceClosed(self.path.display().to_string()));
        }
        Ok(())
    }

    fn read_at(state: &mut FileState, offset: u64, buf: &mut [u8]) -> Result<()> {
        let file = state.file.as_mut().ok_or_else(|| {
            Error::ResourceClosed("file handle released".to_string())
        })?;
        file.seek(SeekFrom::Start(offset))?;
        file.read_exact(buf)?;
        Ok(())
    }
}

impl IdentificationRequest for FileRequest {
    fn byte_at(&self, index: u64) -> Result<u8> {
        self.ensure_open()?;
        let size = self.metadata.size;
        if index >= size {
            return Err(Error::OutOfBounds { index, size });
        }
        if let Some(&byte) = usize::try_from(index).ok().and_then(|i| self.head.get(i)) {
            return Ok(byte);
        }

        let mut state = self.state.lock();
        let cached = index >= state.block_start
            && index < state.block_start + state.block.len() as u64;
        if !cached {
            let block_start = index - index % BLOCK_SIZE as u64;
            let block_len = (size - block_start).min(BLOCK_SIZE as u64) as usize;
            let mut block = vec![0u8; block_len];
            Self::read_at(&mut state, block_start, &mut block)?;
            state.block_start = block_start;
            state.block = block;
        }
        Ok(state.block[(index - state.block_start) as usize])
    }

    fn read_bytes(&self, offset: u64, len: usize) -> Result<Cow<'_, [u8]>> {
        self.ensure_open()?;
        let size = self.metadata.size;
        if offset >= size {
            return Ok(Cow::Owned(Vec::new()));
        }
        let end = offset.saturating_add(len as u64).min(size);
        if end <= self.head.len() as u64 {
            return Ok(Cow::Borrowed(&self.head[offset as usize..end as usize]));
        }

        let mut buf = vec![0u8; (end - offset) as usize];
        let mut state = self.state.lock();
        Self::read_at(&mut state, offset, &mut buf)?;
        Ok(Cow::Owned(buf))
    }

    fn size(&self) -> u64 {
        self.metadata.size
    }

    fn extension(&self) -> Option<&str> {
        self.extension.as_deref()
    }

    fn file_name(&self) -> &str {
        &self.file_name
    }

    fn metadata(&self) -> &RequestMetaData {
        &self.metadata
    }

    fn close(&mut self) -> Result<()> {
        self.closed.store(true, Ordering::Release);
        let state = self.state.get_mut();
        state.file = None;
        state.block = Vec::new();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_extension_of() {
        assert_eq!(extension_of("report.PDF"), Some("PDF"));
        assert_eq!(extension_of("archive.tar.gz"), Some("gz"));
        assert_eq!(extension_of("dir.d/README"), None);
        assert_eq!(extension_of("C:\\docs\\letter.doc"), Some("doc"));
        assert_eq!(extension_of("trailing."), None);
        assert_eq!(extension_of("noext"), None);
    }

    #[test]
    fn test_memory_request_access() {
        let request = MemoryRequest::new("sample.bin", vec![1u8, 2, 3, 4]);
        assert_eq!(request.size(), 4);
        assert_eq!(request.byte_at(2).unwrap(), 3);
        assert!(matches!(
            request.byte_at(4),
            Err(Error::OutOfBounds { index: 4, size: 4 })
        ));
        assert_eq!(request.read_bytes(2, 10).unwrap().as_ref(), &[3, 4]);
        assert!(request.read_bytes(9, 2).unwrap().is_empty());
        assert_eq!(request.extension(), Some("bin"));
        assert_eq!(request.metadata().size, 4);
    }

    #[test]
    fn test_memory_request_extension_override() {
        let request = MemoryRequest::new("sample.bin", Vec::new()).with_extension(Some(""));
        assert_eq!(request.extension(), None);
        let request = MemoryRequest::new("sample", Vec::new()).with_extension(Some("txt"));
        assert_eq!(request.extension(), Some("txt"));
    }

    #[test]
    fn test_closed_memory_request_fails() {
        let mut request = MemoryRequest::new("a.txt", b"abc".to_vec());
        request.close().unwrap();
        request.close().unwrap();
        assert!(matches!(request.byte_at(0), Err(Error::ResourceClosed(_))));
    }

    #[test]
    fn test_file_request_reads_past_head_window() {
        let mut tmp = tempfile::Builder::new().suffix(".dat").tempfile().unwrap();
        let mut data = vec![0u8; HEAD_WINDOW + BLOCK_SIZE + 10];
        let len = data.len();
        data[len - 1] = 0xAB;
        data[HEAD_WINDOW + 3] = 0xCD;
        tmp.write_all(&data).unwrap();
        tmp.flush().unwrap();

        let mut request = FileRequest::open(tmp.path()).unwrap();
        assert_eq!(request.size(), len as u64);
        assert_eq!(request.extension(), Some("dat"));
        assert_eq!(request.byte_at(len as u64 - 1).unwrap(), 0xAB);
        assert_eq!(request.byte_at(HEAD_WINDOW as u64 + 3).unwrap(), 0xCD);
        assert_eq!(request.read_bytes(len as u64 - 2, 8).unwrap().as_ref(), &[0, 0xAB]);

        request.close().unwrap();
        assert!(matches!(request.byte_at(0), Err(Error::ResourceClosed(_))));
    }

    #[test]
    fn test_file_request_missing_file() {
        let err = FileRequest::open("/nonexistent/definitely/missing.bin").unwrap_err();
        assert!(matches!(err, Error::Io(_)));
    }
}
