#![deny(unsafe_code)]
//! Factory-programmed 96-bit device UID

/// Device UID as 24 hex characters
pub fn uid_hex() -> &'static str {
    embassy_stm32::uid::uid_hex()
}

/// Raw UID bytes
pub fn uid() -> &'static [u8; 12] {
    embassy_stm32::uid::uid()
}

/// Seed for the MQTT client identifier nonce
///
/// `entropy` comes from the hardware RNG. The UID and the boot time read
/// from the RTC are folded in too, so the seed still differs per board and
/// per boot if the RNG output is poor.
pub fn client_id_seed(boot_unix_secs: u64, entropy: u32) -> u32 {
    fold_seed(uid(), boot_unix_secs) ^ entropy
}

/// FNV-1a over the UID and boot time
fn fold_seed(uid: &[u8; 12], boot_unix_secs: u64) -> u32 {
    const FNV_OFFSET: u32 = 0x811c_9dc5;
    const FNV_PRIME: u32 = 0x0100_0193;

    uid.iter()
        .chain(boot_unix_secs.to_le_bytes().iter())
        .fold(FNV_OFFSET, |hash, &b| (hash ^ b as u32).wrapping_mul(FNV_PRIME))
}

#[cfg(test)]
mod tests {
    use super::*;

    const UID: [u8; 12] = [0x30, 0x00, 0x2f, 0x00, 0x0a, 0x51, 0x33, 0x38, 0x32, 0x38, 0x36, 0x32];

    #[test]
    fn test_seed_differs_per_boot() {
        assert_ne!(fold_seed(&UID, 1_736_975_073), fold_seed(&UID, 1_736_975_074));
    }

    #[test]
    fn test_seed_differs_per_board() {
        let mut other = UID;
        other[11] ^= 1;
        assert_ne!(fold_seed(&UID, 0), fold_seed(&other, 0));
    }
}
