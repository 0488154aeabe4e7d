/// Seed of every DAI checksum chain.
pub const CHECKSUM_SEED: u8 = 0x56;

/// Fold one byte into a running checksum: XOR, then rotate left by one.
pub fn byte_checksum(data: u8, previous: u8) -> u8 {
    (data ^ previous).rotate_left(1)
}

/// Checksum of a 16-bit length field, high byte first.
pub fn word_checksum(word: u16) -> u8 {
    let [high, low] = word.to_be_bytes();
    byte_checksum(low, byte_checksum(high, CHECKSUM_SEED))
}

/// Checksum accumulated over a whole data buffer.
pub fn data_checksum(data: &[u8]) -> u8 {
    data.iter()
        .fold(CHECKSUM_SEED, |acc, &b| byte_checksum(b, acc))
}
