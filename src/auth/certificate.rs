//! Client certificates for app-only Azure AD authentication

use std::fmt;
use std::path::{Path, PathBuf};

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use p12_keystore::KeyStore;
use sha2::{Digest, Sha256};

use crate::error::{ConnectError, Result};

const RSA_ENCRYPTION_OID: &str = "1.2.840.113549.1.1.1";

/// An unlocked PKCS#12 certificate with its RSA key
#[derive(Clone)]
pub struct ClientCertificate {
    path: PathBuf,
    private_key_der: Vec<u8>,
    thumbprint: String,
}

impl ClientCertificate {
    /// Load a `.pfx` / `.p12` file and unlock it with `password`.
    ///
    /// Reads both PBES2 (AES, SHA-256 MAC) files and legacy
    /// 3DES/RC2 files with a SHA-1 MAC.
    pub fn load(path: &Path, password: &str) -> Result<Self> {
        let bytes = std::fs::read(path)
            .map_err(|e| ConnectError::certificate(path, format!("cannot read file: {}", e)))?;
        Self::from_pkcs12(path, &bytes, password)
    }

    pub fn from_pkcs12(path: &Path, bytes: &[u8], password: &str) -> Result<Self> {
        let keystore = KeyStore::from_pkcs12(bytes, password).map_err(|e| {
            ConnectError::certificate(
                path,
                format!("cannot open PKCS#12 file, wrong password or damaged file: {:?}", e),
            )
        })?;

        let (_, chain) = keystore
            .private_key_chain()
            .ok_or_else(|| ConnectError::certificate(path, "file contains no private key"))?;

        let certificate = chain
            .chain()
            .first()
            .ok_or_else(|| ConnectError::certificate(path, "file contains no certificate"))?;

        let private_key_der = unwrap_rsa_key(path, chain.key())?;
        let thumbprint = URL_SAFE_NO_PAD.encode(Sha256::digest(certificate.as_der()));

        log::debug!("Loaded certificate {:?} (x5t#S256 {})", path, thumbprint);

        Ok(Self {
            path: path.to_path_buf(),
            private_key_der,
            thumbprint,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// PKCS#1 DER encoded RSA private key
    pub fn private_key_der(&self) -> &[u8] {
        &self.private_key_der
    }

    /// Base64url SHA-256 thumbprint of the certificate (`x5t#S256`)
    pub fn thumbprint(&self) -> &str {
        &self.thumbprint
    }
}

impl fmt::Debug for ClientCertificate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientCertificate")
            .field("path", &self.path)
            .field("thumbprint", &self.thumbprint)
            .finish_non_exhaustive()
    }
}

/// PKCS#8 PrivateKeyInfo -> PKCS#1 RSAPrivateKey
fn unwrap_rsa_key(path: &Path, pkcs8_der: &[u8]) -> Result<Vec<u8>> {
    let info = pkcs8::PrivateKeyInfo::try_from(pkcs8_der)
        .map_err(|e| ConnectError::certificate(path, format!("malformed private key: {}", e)))?;

    if info.algorithm.oid.to_string() != RSA_ENCRYPTION_OID {
        return Err(ConnectError::certificate(
            path,
            format!("unsupported key algorithm {}", info.algorithm.oid),
        ));
    }

    Ok(info.private_key.to_vec())
}
