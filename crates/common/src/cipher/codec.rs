use crate::cipher::DecodeError;
use crate::domain::{ConfigError, EncryptedPayload};
use aes::Aes128;
use base64::alphabet;
use base64::engine::general_purpose::{self, GeneralPurpose, STANDARD};
use base64::Engine;
use cbc::cipher::{block_padding::Pkcs7, BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use serde_json::{Map, Value};
use std::fmt;

type Aes128CbcEnc = cbc::Encryptor<Aes128>;
type Aes128CbcDec = cbc::Decryptor<Aes128>;

pub const BLOCK_SIZE: usize = 16;
pub const KEY_LEN: usize = 16;
pub const IV_LEN: usize = 16;

/// Standard alphabet, padding required, non-zero trailing bits tolerated
const LENIENT_BASE64: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    general_purpose::PAD.with_decode_allow_trailing_bits(true),
);

/// AES-128-CBC codec for reading payloads.
///
/// Wire format: UTF-8 JSON object, PKCS#7 padded to 16-byte blocks, encrypted
/// under a fixed key and IV, Base64 encoded. The IV never changes, so equal
/// plaintexts always produce equal ciphertexts; this matches the device
/// firmware and gives no confidentiality beyond that.
#[derive(Clone)]
pub struct CipherCodec {
    key: [u8; KEY_LEN],
    iv: [u8; IV_LEN],
}

impl CipherCodec {
    /// Build a codec from raw key material, failing fast on wrong lengths
    pub fn new(key: &[u8], iv: &[u8]) -> Result<Self, ConfigError> {
        let key: [u8; KEY_LEN] = key.try_into().map_err(|_| ConfigError::InvalidKeyLength {
            expected: KEY_LEN,
            actual: key.len(),
        })?;
        let iv: [u8; IV_LEN] = iv.try_into().map_err(|_| ConfigError::InvalidIvLength {
            expected: IV_LEN,
            actual: iv.len(),
        })?;

        Ok(Self { key, iv })
    }

    /// Decrypt a Base64 ciphertext into the JSON object it carries.
    ///
    /// Characters outside the Base64 alphabet (line breaks, spaces) are
    /// discarded before decoding.
    pub fn decrypt(&self, encoded: &str) -> Result<Map<String, Value>, DecodeError> {
        let alphabet_only: String = encoded
            .chars()
            .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '/' | '='))
            .collect();
        let mut buffer = LENIENT_BASE64.decode(alphabet_only)?;

        if buffer.is_empty() || buffer.len() % BLOCK_SIZE != 0 {
            return Err(DecodeError::CiphertextLength(buffer.len()));
        }

        let plaintext = Aes128CbcDec::new(&self.key.into(), &self.iv.into())
            .decrypt_padded_mut::<Pkcs7>(&mut buffer)
            .map_err(|_| DecodeError::Padding)?;

        let text = std::str::from_utf8(plaintext)?;

        match serde_json::from_str::<Value>(text)? {
            Value::Object(map) => Ok(map),
            other => Err(DecodeError::NotAnObject(json_type_name(&other))),
        }
    }

    /// Encrypt a JSON object into the device wire format
    pub fn encrypt(&self, payload: &Map<String, Value>) -> EncryptedPayload {
        let plaintext = Value::Object(payload.clone()).to_string();
        let ciphertext = Aes128CbcEnc::new(&self.key.into(), &self.iv.into())
            .encrypt_padded_vec_mut::<Pkcs7>(plaintext.as_bytes());

        EncryptedPayload::new(STANDARD.encode(ciphertext))
    }
}

impl fmt::Debug for CipherCodec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CipherCodec")
            .field("key", &"<redacted>")
            .field("iv", &"<redacted>")
            .finish()
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cipher::DecodeStage;
    use serde_json::json;

    const DEVICE_KEY: [u8; 16] = *b"MaCleSecreteAES1";
    const DEVICE_IV: [u8; 16] = [0, 1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12, 13, 14, 15];

    fn codec() -> CipherCodec {
        CipherCodec::new(&DEVICE_KEY, &DEVICE_IV).unwrap()
    }

    fn object(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => panic!("test fixture must be an object"),
        }
    }

    fn encrypt_raw(plaintext: &[u8]) -> String {
        let ciphertext = Aes128CbcEnc::new(&DEVICE_KEY.into(), &DEVICE_IV.into())
            .encrypt_padded_vec_mut::<Pkcs7>(plaintext);
        STANDARD.encode(ciphertext)
    }

    #[test]
    fn test_round_trip_preserves_object() {
        let codec = codec();
        let payload = object(json!({
            "heartRate": 72,
            "patientTemperature": 36.85,
            "roomTemperature": 23.4,
            "roomHumidity": 47.12,
            "o2Saturation": 97.6,
            "timestamp": "2024-05-01T10:00:00.123456+00:00",
            "collectedBy": "ESP32_SIMULATOR"
        }));

        let encrypted = codec.encrypt(&payload);
        let decrypted = codec.decrypt(encrypted.as_str()).unwrap();

        assert_eq!(decrypted, payload);
    }

    #[test]
    fn test_encrypt_is_deterministic() {
        let codec = codec();
        let payload = object(json!({"heartRate": 80}));

        assert_eq!(codec.encrypt(&payload), codec.encrypt(&payload));
    }

    #[test]
    fn test_ciphertext_is_block_aligned() {
        let codec = codec();
        let payload = object(json!({"a": "0123456789"}));

        let encrypted = codec.encrypt(&payload);
        let raw = STANDARD.decode(encrypted.as_str()).unwrap();

        assert_eq!(raw.len() % BLOCK_SIZE, 0);
        assert!(!raw.is_empty());
    }

    #[test]
    fn test_decrypts_device_style_payload() {
        let codec = codec();
        let encoded = encrypt_raw(br#"{"heartRate": 75, "collectedBy": "ESP32"}"#);

        let decrypted = codec.decrypt(&encoded).unwrap();

        assert_eq!(decrypted["heartRate"], json!(75));
        assert_eq!(decrypted["collectedBy"], json!("ESP32"));
    }

    #[test]
    fn test_rejects_non_base64() {
        let err = codec().decrypt("not base64 at all!!").unwrap_err();
        assert_eq!(err.stage(), DecodeStage::Base64);
    }

    #[test]
    fn test_ignores_line_breaks_and_spaces() {
        let codec = codec();
        let encrypted = codec.encrypt(&object(json!({"heartRate": 72, "o2Saturation": 98})));
        let wrapped: String = encrypted
            .as_str()
            .chars()
            .enumerate()
            .flat_map(|(i, c)| {
                let sep = if i > 0 && i % 16 == 0 { Some('\n') } else { None };
                sep.into_iter().chain(std::iter::once(c))
            })
            .collect();

        let decrypted = codec.decrypt(&format!(" {}\r\n", wrapped)).unwrap();

        assert_eq!(decrypted["heartRate"], json!(72));
    }

    #[test]
    fn test_tolerates_non_zero_trailing_bits() {
        const ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789+/";
        let codec = codec();
        // 7 bytes of JSON pad to one block, so the text ends in "=="
        let encrypted = codec.encrypt(&object(json!({"a": 1})));
        let mut bytes = encrypted.as_str().as_bytes().to_vec();
        assert!(encrypted.as_str().ends_with("=="));

        let last = bytes.len() - 3;
        let index = ALPHABET.iter().position(|&b| b == bytes[last]).unwrap();
        bytes[last] = ALPHABET[index | 1];
        let tweaked = String::from_utf8(bytes).unwrap();
        assert_ne!(tweaked, encrypted.as_str());

        assert_eq!(codec.decrypt(&tweaked).unwrap()["a"], json!(1));
    }

    #[test]
    fn test_rejects_truncated_ciphertext() {
        let codec = codec();
        let encrypted = codec.encrypt(&object(json!({"heartRate": 72, "o2Saturation": 98})));
        let mut raw = STANDARD.decode(encrypted.as_str()).unwrap();
        raw.truncate(raw.len() - 3);

        let err = codec.decrypt(&STANDARD.encode(raw)).unwrap_err();

        assert!(matches!(err, DecodeError::CiphertextLength(_)));
        assert_eq!(err.stage(), DecodeStage::Cipher);
    }

    #[test]
    fn test_rejects_empty_ciphertext() {
        let err = codec().decrypt("").unwrap_err();
        assert!(matches!(err, DecodeError::CiphertextLength(0)));
    }

    #[test]
    fn test_rejects_invalid_padding() {
        // 16 bytes with a final pad byte of 0 can never be valid PKCS#7
        let mut block = [b'x'; 16];
        block[15] = 0;
        let encoded = STANDARD.encode(
            Aes128CbcEnc::new(&DEVICE_KEY.into(), &DEVICE_IV.into())
                .encrypt_padded_vec_mut::<cbc::cipher::block_padding::NoPadding>(&block),
        );

        let err = codec().decrypt(&encoded).unwrap_err();

        assert!(matches!(err, DecodeError::Padding));
    }

    #[test]
    fn test_rejects_wrong_key() {
        let encrypted = codec().encrypt(&object(json!({"heartRate": 72})));
        let other = CipherCodec::new(b"AnotherKey123456", &DEVICE_IV).unwrap();

        // A mismatched key almost always breaks the padding; if the pad byte
        // happens to validate, the garbage plaintext fails later instead.
        assert!(other.decrypt(encrypted.as_str()).is_err());
    }

    #[test]
    fn test_rejects_invalid_utf8() {
        let encoded = encrypt_raw(&[0xff, 0xfe, 0xfd]);
        let err = codec().decrypt(&encoded).unwrap_err();
        assert_eq!(err.stage(), DecodeStage::Utf8);
    }

    #[test]
    fn test_rejects_non_json_plaintext() {
        let encoded = encrypt_raw(b"heartRate=72");
        let err = codec().decrypt(&encoded).unwrap_err();
        assert!(matches!(err, DecodeError::Json(_)));
    }

    #[test]
    fn test_rejects_non_object_json() {
        let encoded = encrypt_raw(b"[72, 98]");
        let err = codec().decrypt(&encoded).unwrap_err();
        assert!(matches!(err, DecodeError::NotAnObject("an array")));
        assert_eq!(err.stage(), DecodeStage::Json);
    }

    #[test]
    fn test_new_rejects_short_key() {
        let err = CipherCodec::new(b"short", &DEVICE_IV).unwrap_err();
        assert_eq!(
            err,
            ConfigError::InvalidKeyLength {
                expected: 16,
                actual: 5
            }
        );
    }

    #[test]
    fn test_new_rejects_long_iv() {
        let err = CipherCodec::new(&DEVICE_KEY, &[0u8; 24]).unwrap_err();
        assert_eq!(
            err,
            ConfigError::InvalidIvLength {
                expected: 16,
                actual: 24
            }
        );
    }

    #[test]
    fn test_debug_redacts_key_material() {
        let rendered = format!("{:?}", codec());
        assert!(!rendered.contains("MaCle"));
        assert!(rendered.contains("redacted"));
    }
}
