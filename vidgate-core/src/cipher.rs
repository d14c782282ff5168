use aes::cipher::block_padding::Pkcs7;
use aes::cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use base64::engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD};
use base64::Engine;
use serde_json::{Map, Value};
use thiserror::Error;

type Aes256CbcEnc = cbc::Encryptor<aes::Aes256>;
type Aes256CbcDec = cbc::Decryptor<aes::Aes256>;

pub const KEY_LEN: usize = 32;
pub const IV_LEN: usize = 16;

const BLOCK_LEN: usize = 16;

#[derive(Debug, Error)]
pub enum CipherError {
    #[error("decryption key is not valid base64: {0}")]
    KeyEncoding(base64::DecodeError),
    #[error("decryption key must decode to {KEY_LEN} bytes")]
    KeyLength,
    #[error("decryption iv is not valid base64: {0}")]
    IvEncoding(base64::DecodeError),
    #[error("decryption iv must decode to {IV_LEN} bytes")]
    IvLength,
    #[error("encrypted query is not valid base64: {0}")]
    BlobEncoding(#[from] base64::DecodeError),
    #[error("ciphertext length is not a multiple of the cipher block size")]
    BlockAlignment,
    #[error("ciphertext padding is invalid")]
    Padding,
    #[error("decrypted payload is not valid utf-8")]
    PayloadEncoding,
    #[error("decrypted payload is not valid json: {0}")]
    PayloadJson(#[from] serde_json::Error),
    #[error("decrypted payload is not a json object")]
    PayloadShape,
}

pub type CipherResult<T> = Result<T, CipherError>;

/// AES-256-CBC codec for the opaque `data` query blob. The wire format is
/// URL-safe base64 without padding over PKCS#7-padded compact JSON.
pub struct QueryCipher {
    key: [u8; KEY_LEN],
    iv: [u8; IV_LEN],
}

impl QueryCipher {
    pub fn from_base64(key: &str, iv: &str) -> CipherResult<Self> {
        let key_bytes = STANDARD
            .decode(key.trim())
            .map_err(CipherError::KeyEncoding)?;
        let key = <[u8; KEY_LEN]>::try_from(key_bytes).map_err(|_| CipherError::KeyLength)?;
        let iv_bytes = STANDARD.decode(iv.trim()).map_err(CipherError::IvEncoding)?;
        let iv = <[u8; IV_LEN]>::try_from(iv_bytes).map_err(|_| CipherError::IvLength)?;
        Ok(Self { key, iv })
    }

    /// Decrypts an encrypted query blob into its JSON object form. Trailing
    /// `=` padding on the blob is tolerated.
    pub fn decrypt(&self, blob: &str) -> CipherResult<Map<String, Value>> {
        let ciphertext = URL_SAFE_NO_PAD.decode(blob.trim_end_matches('='))?;
        if ciphertext.is_empty() {
            return Err(CipherError::Padding);
        }
        if ciphertext.len() % BLOCK_LEN != 0 {
            return Err(CipherError::BlockAlignment);
        }
        let plaintext = Aes256CbcDec::new(&self.key.into(), &self.iv.into())
            .decrypt_padded_vec_mut::<Pkcs7>(&ciphertext)
            .map_err(|_| CipherError::Padding)?;
        let text = String::from_utf8(plaintext).map_err(|_| CipherError::PayloadEncoding)?;
        match serde_json::from_str::<Value>(&text)? {
            Value::Object(map) => Ok(map),
            _ => Err(CipherError::PayloadShape),
        }
    }

    /// Exact inverse of [`decrypt`](Self::decrypt): compact JSON, padded to
    /// the block size, base64url-encoded with no trailing `=`.
    pub fn encrypt(&self, payload: &Map<String, Value>) -> CipherResult<String> {
        let json = serde_json::to_string(payload)?;
        let ciphertext = Aes256CbcEnc::new(&self.key.into(), &self.iv.into())
            .encrypt_padded_vec_mut::<Pkcs7>(json.as_bytes());
        Ok(URL_SAFE_NO_PAD.encode(ciphertext))
    }
}
