use rand::RngCore;
use rand::rngs::OsRng;

/// The size of the session token in bytes.
const SESSION_TOKEN_SIZE: usize = 32;

/// Generates a new random session token.
///
/// # Returns
///
/// The token as lowercase hex, twice `SESSION_TOKEN_SIZE` characters long.
pub fn generate_session_token() -> String {
    let mut token = [0u8; SESSION_TOKEN_SIZE];
    OsRng.fill_bytes(&mut token);

    hex::encode(token)
}
