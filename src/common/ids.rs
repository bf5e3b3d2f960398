//! Deterministic fingerprints for feature schemas.

/// FNV-1a 64-bit hasher. Non-cryptographic; only used to detect schema drift
/// between a stored model and the data it is asked to score.
#[derive(Copy, Clone, Debug)]
pub struct SchemaHash(u64);

impl SchemaHash {
    const OFFSET_BASIS: u64 = 0xcbf2_9ce4_8422_2325;
    const PRIME: u64 = 0x0000_0100_0000_01b3;

    pub fn new() -> Self {
        Self(Self::OFFSET_BASIS)
    }

    /// Feed bytes into the hash.
    pub fn update(&mut self, bytes: &[u8]) {
        for b in bytes {
            self.0 = (self.0 ^ u64::from(*b)).wrapping_mul(Self::PRIME);
        }
    }

    /// Feed a field followed by a separator so `["ab","c"]` and `["a","bc"]` differ.
    pub fn field(&mut self, value: &str) {
        self.update(value.as_bytes());
        self.update(&[0x1f]);
    }

    /// Finalise as a 16-character lowercase hex string.
    pub fn finish_hex(&self) -> String {
        format!("{:016x}", self.0)
    }
}

impl Default for SchemaHash {
    fn default() -> Self {
        Self::new()
    }
}

/// Fingerprint of the column layout a pipeline was fitted on.
pub fn schema_fingerprint(categorical: &[String], numerical: &[String]) -> String {
    let mut hasher = SchemaHash::new();
    hasher.field("cat");
    for name in categorical {
        hasher.field(name);
    }
    hasher.field("num");
    for name in numerical {
        hasher.field(name);
    }
    hasher.finish_hex()
}
