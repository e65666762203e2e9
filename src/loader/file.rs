use std::fs;
use std::path::Path;

use openssl::x509::X509;

use crate::error::{CertCheckError, Result};

/// Reads `path` and parses the first PEM block in it as an X.509 certificate.
///
/// Any text around the block is ignored, as is the block label.
pub fn load_pem(path: &Path) -> Result<X509> {
    let data = fs::read(path).map_err(|source| CertCheckError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_pem(&data, path)
}

pub(crate) fn parse_pem(data: &[u8], path: &Path) -> Result<X509> {
    let block = pem::parse(data).map_err(|e| CertCheckError::Decode {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;
    X509::from_der(block.contents()).map_err(|source| CertCheckError::Parse {
        origin: path.display().to_string(),
        source,
    })
}
