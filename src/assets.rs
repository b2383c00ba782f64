use crate::error::PlateFillError;
use base64::Engine;
use sha2::{Digest, Sha256};
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssetKind {
    Template,
    Signature,
    Font,
}

impl AssetKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AssetKind::Template => "template",
            AssetKind::Signature => "signature",
            AssetKind::Font => "font",
        }
    }
}

/// A deployment-provided byte buffer: the template PDF, the signature
/// raster, or an optional font program. Loaded before any drawing begins.
#[derive(Debug, Clone)]
pub struct Asset {
    pub name: String,
    pub kind: AssetKind,
    pub data: Vec<u8>,
}

impl Asset {
    pub fn from_bytes(kind: AssetKind, name: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            kind,
            data,
        }
    }

    pub fn from_path(kind: AssetKind, path: impl AsRef<Path>) -> Result<Self, PlateFillError> {
        let path = path.as_ref();
        let data = std::fs::read(path)?;
        let name = path
            .file_name()
            .and_then(|v| v.to_str())
            .unwrap_or(kind.as_str())
            .to_string();
        Ok(Self { name, kind, data })
    }

    /// Accepts `data:<mime>;base64,<payload>` (and the unencoded form), the
    /// shape web callers hand signatures over in.
    pub fn from_data_uri(kind: AssetKind, uri: &str) -> Result<Self, PlateFillError> {
        let Some(rest) = uri.strip_prefix("data:") else {
            return Err(PlateFillError::Asset("not a data: URI".to_string()));
        };
        let Some((header, payload)) = rest.split_once(',') else {
            return Err(PlateFillError::Asset("data: URI has no payload".to_string()));
        };
        let mime = header.split(';').next().unwrap_or("application/octet-stream");
        let data = if header.contains("base64") {
            base64::engine::general_purpose::STANDARD
                .decode(payload)
                .map_err(|err| PlateFillError::Asset(format!("invalid base64 payload: {err}")))?
        } else {
            payload.as_bytes().to_vec()
        };
        Ok(Self {
            name: mime.to_string(),
            kind,
            data,
        })
    }

    pub fn sha256_hex(&self) -> String {
        let digest = Sha256::digest(&self.data);
        let mut out = String::with_capacity(64);
        for byte in digest {
            out.push_str(&format!("{byte:02x}"));
        }
        out
    }

    /// Pins the asset bytes to a known digest. The coordinate table is
    /// hand-tuned against one exact template; a drifted template renders
    /// wrong rather than failing, so deployments should pin.
    pub fn verify_sha256(&self, expected: &str) -> Result<(), PlateFillError> {
        let actual = self.sha256_hex();
        if actual.eq_ignore_ascii_case(expected.trim()) {
            Ok(())
        } else {
            Err(PlateFillError::Asset(format!(
                "{} asset {} digest mismatch: expected {} found {}",
                self.kind.as_str(),
                self.name,
                expected.trim(),
                actual
            )))
        }
    }
}
