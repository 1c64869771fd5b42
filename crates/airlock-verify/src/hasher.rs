use sha2::Digest;

/// Incremental digest over a byte stream.
pub trait Hasher: Send {
    fn update(&mut self, data: &[u8]);
    fn finalize(self) -> Vec<u8>;
}

#[derive(Default)]
pub struct Sha256Hasher(sha2::Sha256);

impl Sha256Hasher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Lowercase hex SHA-256 of `data`.
    pub fn digest_hex(data: &[u8]) -> String {
        hex::encode(sha2::Sha256::digest(data))
    }
}

impl Hasher for Sha256Hasher {
    fn update(&mut self, data: &[u8]) {
        Digest::update(&mut self.0, data);
    }

    fn finalize(self) -> Vec<u8> {
        self.0.finalize().to_vec()
    }
}
