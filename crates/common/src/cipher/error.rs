use std::fmt;
use thiserror::Error;

/// Stage of the decrypt path that rejected a payload
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeStage {
    Base64,
    Cipher,
    Padding,
    Utf8,
    Json,
}

impl DecodeStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            DecodeStage::Base64 => "base64",
            DecodeStage::Cipher => "cipher",
            DecodeStage::Padding => "padding",
            DecodeStage::Utf8 => "utf8",
            DecodeStage::Json => "json",
        }
    }
}

impl fmt::Display for DecodeStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("base64 decoding failed: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("ciphertext length {0} is not a positive multiple of the block size")]
    CiphertextLength(usize),

    #[error("invalid PKCS#7 padding")]
    Padding,

    #[error("plaintext is not valid UTF-8: {0}")]
    Utf8(#[from] std::str::Utf8Error),

    #[error("plaintext is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("plaintext JSON is {0}, expected an object")]
    NotAnObject(&'static str),
}

impl DecodeError {
    pub fn stage(&self) -> DecodeStage {
        match self {
            DecodeError::Base64(_) => DecodeStage::Base64,
            DecodeError::CiphertextLength(_) => DecodeStage::Cipher,
            DecodeError::Padding => DecodeStage::Padding,
            DecodeError::Utf8(_) => DecodeStage::Utf8,
            DecodeError::Json(_) | DecodeError::NotAnObject(_) => DecodeStage::Json,
        }
    }
}
