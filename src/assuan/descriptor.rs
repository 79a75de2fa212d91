//! Emulated socket descriptor files
//!
//! The file starts with the decimal TCP port, followed by one whitespace byte
//! (libassuan writes `\n`) and then the nonce. libassuan writes the nonce as
//! 16 raw bytes; a hex-encoded key of any even length is accepted as well.

use crate::error::{Error, Result};
use std::fmt;
use std::io;
use std::path::Path;

/// Length of the raw nonce written by libassuan
pub const NONCE_LEN: usize = 16;

/// Descriptor files are tiny; anything bigger is not one
const MAX_DESCRIPTOR_SIZE: usize = 4096;

/// Port and secret key read from an emulated socket file
#[derive(Clone, PartialEq, Eq)]
pub struct Descriptor {
    port: u16,
    key: Vec<u8>,
}

impl Descriptor {
    /// Create a descriptor from its parts
    pub fn new(port: u16, key: impl Into<Vec<u8>>) -> Self {
        Self {
            port,
            key: key.into(),
        }
    }

    /// Loopback TCP port the host agent listens on
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Key bytes to send as the connection preamble
    pub fn key(&self) -> &[u8] {
        &self.key
    }

    /// Parse descriptor file contents
    ///
    /// Returns a human-readable reason on failure.
    pub fn parse(contents: &[u8]) -> std::result::Result<Self, String> {
        let sep = contents
            .iter()
            .position(|b| b.is_ascii_whitespace())
            .ok_or_else(|| "missing separator after port".to_string())?;

        let port = parse_port(&contents[..sep])?;
        // Files edited on the Windows side may end the port line with CRLF
        let skip = if contents[sep..].starts_with(b"\r\n") { 2 } else { 1 };
        let rest = &contents[sep + skip..];

        let key = if rest.len() == NONCE_LEN {
            rest.to_vec()
        } else {
            decode_hex_key(rest)?
        };

        Ok(Self { port, key })
    }

    /// Read and parse a descriptor file
    ///
    /// The file is read fresh on every call: the host agent rewrites it with a
    /// new port and nonce whenever it restarts.
    pub async fn read(path: &Path) -> Result<Self> {
        let contents = tokio::fs::read(path).await.map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => Error::DescriptorNotFound(path.to_path_buf()),
            _ => Error::Io(e),
        })?;

        if contents.len() > MAX_DESCRIPTOR_SIZE {
            return Err(Error::MalformedDescriptor {
                path: path.to_path_buf(),
                reason: format!("file too large ({} bytes)", contents.len()),
            });
        }

        Self::parse(&contents).map_err(|reason| Error::MalformedDescriptor {
            path: path.to_path_buf(),
            reason,
        })
    }
}

// Keep the nonce out of logs
impl fmt::Debug for Descriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Descriptor")
            .field("port", &self.port)
            .field("key_len", &self.key.len())
            .finish()
    }
}

fn parse_port(digits: &[u8]) -> std::result::Result<u16, String> {
    if digits.is_empty() || !digits.iter().all(u8::is_ascii_digit) {
        return Err(format!(
            "invalid port '{}'",
            String::from_utf8_lossy(digits)
        ));
    }

    // All ASCII digits, so the UTF-8 conversion cannot fail
    let text = std::str::from_utf8(digits).map_err(|e| e.to_string())?;
    match text.parse::<u16>() {
        Ok(0) => Err("port 0 is not a valid TCP port".to_string()),
        Ok(port) => Ok(port),
        Err(_) => Err(format!("port '{}' out of range", text)),
    }
}

fn decode_hex_key(raw: &[u8]) -> std::result::Result<Vec<u8>, String> {
    let trimmed = raw.trim_ascii();
    if trimmed.is_empty() {
        return Err("missing key".to_string());
    }
    hex::decode(trimmed).map_err(|e| {
        format!(
            "key is neither a {}-byte nonce nor valid hex ({})",
            NONCE_LEN, e
        )
    })
}
