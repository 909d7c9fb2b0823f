/// Random bytes per identifier (16 bytes = 32 hex chars)
const ID_BYTES: usize = 16;

/// Generate an opaque, URL-safe identifier (lowercase hex)
pub fn generate_id() -> String {
    let bytes: [u8; ID_BYTES] = rand::random();
    hex::encode(bytes)
}
