use std::collections::HashSet;
use std::fmt;

use rand::Rng;
use serde::{Deserialize, Serialize};

/// Room codes are exactly this many characters.
pub const ROOM_CODE_LEN: usize = 6;

/// Characters a room code may contain. Uppercase-only keeps codes easy
/// to read back over voice chat.
pub const ROOM_CODE_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// How many random draws to attempt before giving up on finding an
/// unused code. Hitting this bound means the code space is close to
/// full and is reported as an operational error, never as a duplicate.
pub const MAX_CODE_ATTEMPTS: u32 = 100;

/// A short, human-shareable room identifier (e.g. `AB12CD`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoomCode(String);

impl RoomCode {
    /// Validate and normalize a code supplied by a client.
    /// Lowercase input is accepted and uppercased.
    pub fn parse(raw: &str) -> Result<Self, CodeError> {
        if raw.len() != ROOM_CODE_LEN {
            return Err(CodeError::InvalidLength(raw.len()));
        }
        let normalized = raw.to_ascii_uppercase();
        if let Some(bad) = normalized
            .bytes()
            .find(|b| !ROOM_CODE_ALPHABET.contains(b))
        {
            return Err(CodeError::InvalidChar(bad as char));
        }
        Ok(Self(normalized))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RoomCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, PartialEq, Eq)]
pub enum CodeError {
    /// No unused code found within [`MAX_CODE_ATTEMPTS`] draws.
    ExhaustedRetries,
    InvalidLength(usize),
    InvalidChar(char),
}

impl fmt::Display for CodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ExhaustedRetries => write!(
                f,
                "failed to generate an unused room code in {MAX_CODE_ATTEMPTS} attempts"
            ),
            Self::InvalidLength(len) => {
                write!(f, "room code must be {ROOM_CODE_LEN} characters, got {len}")
            },
            Self::InvalidChar(c) => write!(f, "room code contains invalid character: {c:?}"),
        }
    }
}

impl std::error::Error for CodeError {}

/// Draw one uniformly random code from the full code space.
fn random_code<R: Rng>(rng: &mut R) -> RoomCode {
    let code: String = (0..ROOM_CODE_LEN)
        .map(|_| ROOM_CODE_ALPHABET[rng.random_range(0..ROOM_CODE_ALPHABET.len())] as char)
        .collect();
    RoomCode(code)
}

/// Generate a room code not present in `existing`, retrying on
/// collision up to [`MAX_CODE_ATTEMPTS`] times.
pub fn generate_room_code(existing: &HashSet<RoomCode>) -> Result<RoomCode, CodeError> {
    let mut rng = rand::rng();
    for _ in 0..MAX_CODE_ATTEMPTS {
        let candidate = random_code(&mut rng);
        if !existing.contains(&candidate) {
            return Ok(candidate);
        }
    }
    tracing::error!(
        occupied = existing.len(),
        "room code generation exhausted its retry budget"
    );
    Err(CodeError::ExhaustedRetries)
}
