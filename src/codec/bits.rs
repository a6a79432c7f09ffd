//! Bit numbering helpers.
//!
//! *Sawtooth* numbering: bit 0 is the LSB of byte 0, bit 7 its MSB, bit 8
//! the LSB of byte 1. *Network* numbering flips the index inside each
//! byte, so that bit 0 is the MSB of byte 0.

use crate::types::signal::{ByteOrder, Signal};

/// Maps a sawtooth bit index to its network index (and back: the mapping
/// is its own inverse).
pub fn sawtooth_to_network_bitnum(sawtooth: u32) -> u32 {
    8 * (sawtooth / 8) + (7 - sawtooth % 8)
}

pub fn network_to_sawtooth_bitnum(network: u32) -> u32 {
    sawtooth_to_network_bitnum(network)
}

/// First bit of the signal in its own layout view: the network index of
/// the MSB for big-endian signals, the sawtooth index of the LSB for
/// little-endian ones.
pub fn layout_start_bit(signal: &Signal) -> u32 {
    match signal.byte_order {
        ByteOrder::BigEndian => sawtooth_to_network_bitnum(signal.start),
        ByteOrder::LittleEndian => signal.start,
    }
}

/// Number of payload bytes a signal needs to be fully present.
pub fn required_bytes(signal: &Signal) -> usize {
    let end = layout_start_bit(signal) as usize + signal.length as usize;
    end.div_ceil(8)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_network_numbering_is_an_involution() {
        for n in 0..512 {
            assert_eq!(sawtooth_to_network_bitnum(sawtooth_to_network_bitnum(n)), n);
        }
        assert_eq!(sawtooth_to_network_bitnum(0), 7);
        assert_eq!(sawtooth_to_network_bitnum(7), 0);
        assert_eq!(sawtooth_to_network_bitnum(8), 15);
        assert_eq!(network_to_sawtooth_bitnum(15), 8);
    }

    #[test]
    fn test_required_bytes() {
        let mut sig = Signal::new("T", 7, 12);
        sig.byte_order = ByteOrder::BigEndian;
        // MSB at network bit 0, 12 bits -> bytes 0..=1
        assert_eq!(required_bytes(&sig), 2);

        let le = Signal::new("Fum", 16, 16);
        assert_eq!(required_bytes(&le), 4);
    }
}
