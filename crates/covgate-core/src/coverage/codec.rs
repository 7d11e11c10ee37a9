//! On-disk codecs for execution data.
//!
//! The aggregator only ever sees decoded [`ExecutionData`]; the file format
//! is a property of the codec. Two codecs ship: a compact binary one
//! (`CGEX` magic followed by a bincode payload) and a JSON one that test
//! harnesses can emit without a serializer dependency.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::coverage::model::{ExecutionData, EXECUTION_DATA_VERSION};

const BINARY_MAGIC: &[u8; 4] = b"CGEX";

/// Errors raised while encoding or decoding execution data.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("not an execution data file (bad magic header)")]
    BadMagic,

    #[error("unsupported execution data version {found} (expected {expected})")]
    UnsupportedVersion { found: u32, expected: u32 },

    #[error("binary payload: {0}")]
    Binary(#[from] bincode::Error),

    #[error("json payload: {0}")]
    Json(#[from] serde_json::Error),

    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

/// Encodes and decodes [`ExecutionData`].
pub trait ExecutionDataCodec: Send + Sync {
    /// File extension used for artifacts written with this codec.
    fn extension(&self) -> &'static str;

    fn encode(&self, data: &ExecutionData) -> Result<Vec<u8>, CodecError>;

    fn decode(&self, bytes: &[u8]) -> Result<ExecutionData, CodecError>;

    /// Read and decode an artifact.
    fn read_file(&self, path: &Path) -> Result<ExecutionData, CodecError> {
        let bytes = fs::read(path)?;
        self.decode(&bytes)
    }

    /// Encode and write an artifact, replacing any previous file.
    fn write_file(&self, path: &Path, data: &ExecutionData) -> Result<(), CodecError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, self.encode(data)?)?;
        Ok(())
    }
}

fn check_version(data: ExecutionData) -> Result<ExecutionData, CodecError> {
    if data.format_version != EXECUTION_DATA_VERSION {
        return Err(CodecError::UnsupportedVersion {
            found: data.format_version,
            expected: EXECUTION_DATA_VERSION,
        });
    }
    Ok(data)
}

/// `CGEX` + bincode.
#[derive(Debug, Clone, Copy, Default)]
pub struct BinaryCodec;

impl ExecutionDataCodec for BinaryCodec {
    fn extension(&self) -> &'static str {
        "exec"
    }

    fn encode(&self, data: &ExecutionData) -> Result<Vec<u8>, CodecError> {
        let mut out = BINARY_MAGIC.to_vec();
        out.extend(bincode::serialize(data)?);
        Ok(out)
    }

    fn decode(&self, bytes: &[u8]) -> Result<ExecutionData, CodecError> {
        let payload = bytes
            .strip_prefix(BINARY_MAGIC.as_slice())
            .ok_or(CodecError::BadMagic)?;
        check_version(bincode::deserialize(payload)?)
    }
}

/// Plain JSON.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl ExecutionDataCodec for JsonCodec {
    fn extension(&self) -> &'static str {
        "exec.json"
    }

    fn encode(&self, data: &ExecutionData) -> Result<Vec<u8>, CodecError> {
        Ok(serde_json::to_vec_pretty(data)?)
    }

    fn decode(&self, bytes: &[u8]) -> Result<ExecutionData, CodecError> {
        check_version(serde_json::from_slice(bytes)?)
    }
}

/// Selectable execution data format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecFormat {
    #[default]
    Binary,
    Json,
}

impl ExecFormat {
    pub fn name(&self) -> &'static str {
        match self {
            ExecFormat::Binary => "binary",
            ExecFormat::Json => "json",
        }
    }

    pub fn codec(&self) -> Box<dyn ExecutionDataCodec> {
        match self {
            ExecFormat::Binary => Box::new(BinaryCodec),
            ExecFormat::Json => Box::new(JsonCodec),
        }
    }

    pub fn extension(&self) -> &'static str {
        self.codec().extension()
    }
}
