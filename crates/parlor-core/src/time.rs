/// Milliseconds since the Unix epoch. Used for finish timestamps in
/// player state; wall-clock skew is acceptable there.
pub fn unix_millis() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}
