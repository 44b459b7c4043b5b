use log::{info, warn};

/// The contents of one fixed-size memory region.
///
/// Going over budget is not an error: the bytes are kept in full so callers
/// can still inspect or test them, and [Region::padded] cuts them down to
/// what actually fits.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Region {
    pub name: &'static str,
    pub capacity: usize,
    bytes: Vec<u8>,
}

impl Region {
    pub fn new(name: &'static str, capacity: usize, bytes: Vec<u8>) -> Self {
        let region = Self {
            name,
            capacity,
            bytes,
        };

        info!(
            "{name}: {}/{capacity} bytes ({}%)",
            region.used(),
            region.used() * 100 / capacity.max(1)
        );
        if region.overflow() > 0 {
            warn!(
                "{name}: exceeds {capacity} bytes by {} bytes",
                region.overflow()
            );
        }

        region
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn used(&self) -> usize {
        self.bytes.len()
    }

    pub fn overflow(&self) -> usize {
        self.bytes.len().saturating_sub(self.capacity)
    }

    pub fn fits(&self) -> bool {
        self.overflow() == 0
    }

    /// Exactly `capacity` bytes: zero padded, or truncated on overflow.
    pub fn padded(&self) -> Vec<u8> {
        let mut out = self.bytes.clone();
        out.resize(self.capacity, 0);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pads_and_truncates() {
        let small = Region::new("small", 4, vec![1, 2]);
        assert!(small.fits());
        assert_eq!(small.padded(), vec![1, 2, 0, 0]);

        let big = Region::new("big", 2, vec![1, 2, 3, 4, 5]);
        assert_eq!(big.overflow(), 3);
        assert_eq!(big.padded(), vec![1, 2]);
        assert_eq!(big.bytes(), &[1, 2, 3, 4, 5]);
    }
}
