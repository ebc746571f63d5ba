//! The exchange file channel: open, read, truncate, reply.
//!
//! The exchange file is both the request and the response: the invoker writes
//! the request object, the process overwrites it with the reply envelope.
//! Faults on the channel itself are fatal because no other way to answer
//! exists; they surface as [`ChannelError`] and map onto process exit codes.

use std::fs::{File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};

use camino::{Utf8Path, Utf8PathBuf};
use serde_json::Value;
use shuttle_protocol::ExchangeReply;
use thiserror::Error;

/// A fault on the exchange file itself.
///
/// Everything here is fatal: the reply envelope only exists for faults that
/// occur once the channel is provably usable.
#[derive(Debug, Error)]
pub enum ChannelError {
    /// The exchange file could not be opened.
    #[error("failed to open exchange file `{path}`: {source}")]
    Open {
        /// Path the invoker named.
        path: Utf8PathBuf,
        /// Underlying open failure.
        #[source]
        source: io::Error,
    },
    /// The exchange path is a symbolic link.
    #[error("exchange file `{path}` is a symbolic link")]
    SymbolicLink {
        /// Path the invoker named.
        path: Utf8PathBuf,
    },
    /// The exchange file could not be read.
    #[error("failed to read exchange file `{path}`: {source}")]
    Read {
        /// Path the invoker named.
        path: Utf8PathBuf,
        /// Underlying read failure.
        #[source]
        source: io::Error,
    },
    /// The exchange file does not hold a JSON document.
    #[error("exchange file `{path}` does not hold a JSON request: {source}")]
    MalformedRequest {
        /// Path the invoker named.
        path: Utf8PathBuf,
        /// Parse failure from the document scan.
        #[source]
        source: serde_json::Error,
    },
    /// The reply envelope could not be serialised.
    #[error("failed to encode the exchange reply: {source}")]
    Serialize {
        /// Underlying encoding failure.
        #[source]
        source: serde_json::Error,
    },
    /// The reply could not be written back into the exchange file.
    #[error("failed to write exchange file `{path}`: {source}")]
    Write {
        /// Path the invoker named.
        path: Utf8PathBuf,
        /// Underlying write failure.
        #[source]
        source: io::Error,
    },
}

impl ChannelError {
    /// Process exit status for this fault.
    ///
    /// Faults before the reply is attempted exit 1; faults while writing the
    /// reply exit 2.
    #[must_use]
    pub fn exit_status(&self) -> u8 {
        match self {
            Self::Open { .. }
            | Self::SymbolicLink { .. }
            | Self::Read { .. }
            | Self::MalformedRequest { .. } => 1,
            Self::Serialize { .. } | Self::Write { .. } => 2,
        }
    }
}

/// Read+write handle on the exchange file for one request/reply round trip.
#[derive(Debug)]
pub struct ExchangeChannel {
    path: Utf8PathBuf,
    file: File,
}

impl ExchangeChannel {
    /// Opens the exchange file, refusing to follow symbolic links.
    ///
    /// The file must already exist; the invoker creates it. The metadata
    /// probe names a symlink precisely, and `O_NOFOLLOW` backstops the open
    /// when a link appears between probe and open.
    ///
    /// # Errors
    ///
    /// Returns [`ChannelError::SymbolicLink`] for a symlinked path and
    /// [`ChannelError::Open`] for any other open failure.
    pub fn open(path: &Utf8Path) -> Result<Self, ChannelError> {
        if path
            .symlink_metadata()
            .is_ok_and(|metadata| metadata.is_symlink())
        {
            return Err(ChannelError::SymbolicLink {
                path: path.to_owned(),
            });
        }
        let mut options = OpenOptions::new();
        options.read(true).write(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.custom_flags(libc::O_NOFOLLOW);
        }
        let file = options.open(path).map_err(|source| ChannelError::Open {
            path: path.to_owned(),
            source,
        })?;
        Ok(Self {
            path: path.to_owned(),
            file,
        })
    }

    /// Reads the whole request document.
    ///
    /// # Errors
    ///
    /// Returns [`ChannelError::Read`] when the file cannot be read and
    /// [`ChannelError::MalformedRequest`] when its contents are not JSON.
    pub fn read_request(&mut self) -> Result<Value, ChannelError> {
        let mut buffer = String::new();
        self.file
            .read_to_string(&mut buffer)
            .map_err(|source| ChannelError::Read {
                path: self.path.clone(),
                source,
            })?;
        serde_json::from_str(&buffer).map_err(|source| ChannelError::MalformedRequest {
            path: self.path.clone(),
            source,
        })
    }

    /// Replaces the file contents with the reply envelope.
    ///
    /// Truncates before writing so a reply shorter than the request leaves
    /// no residual bytes.
    ///
    /// # Errors
    ///
    /// Returns [`ChannelError::Serialize`] when the envelope cannot be
    /// encoded and [`ChannelError::Write`] when the file cannot be rewritten.
    pub fn write_reply(&mut self, reply: &ExchangeReply) -> Result<(), ChannelError> {
        let body =
            serde_json::to_string(reply).map_err(|source| ChannelError::Serialize { source })?;
        self.truncate_and_write(body.as_bytes())
            .map_err(|source| ChannelError::Write {
                path: self.path.clone(),
                source,
            })
    }

    fn truncate_and_write(&mut self, body: &[u8]) -> io::Result<()> {
        self.file.set_len(0)?;
        self.file.seek(SeekFrom::Start(0))?;
        self.file.write_all(body)?;
        self.file.flush()
    }
}
