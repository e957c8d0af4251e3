//! Per-voxel classification bits

/// One byte of classification state per voxel.
///
/// No bits set means the voxel is solid. `ON_EDGE` is only ever set together
/// with `OUTSIDE`. `ANCHORED` is scratch state for flood fills and is clear
/// outside of them.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct VoxelFlags(u8);

impl VoxelFlags {
    pub const OUTSIDE: u8 = 1 << 0;
    pub const ON_EDGE: u8 = 1 << 1;
    pub const ANCHORED: u8 = 1 << 2;
    pub const UNDER_SURFACE: u8 = 1 << 3;

    pub const SOLID: VoxelFlags = VoxelFlags(0);
    pub const EMPTY: VoxelFlags = VoxelFlags(Self::OUTSIDE);
    pub const EDGE: VoxelFlags = VoxelFlags(Self::OUTSIDE | Self::ON_EDGE);

    pub fn bits(self) -> u8 {
        self.0
    }

    #[inline]
    pub fn is_outside(self) -> bool {
        self.0 & Self::OUTSIDE != 0
    }

    #[inline]
    pub fn is_solid(self) -> bool {
        !self.is_outside()
    }

    #[inline]
    pub fn is_on_edge(self) -> bool {
        self.0 & Self::ON_EDGE != 0
    }

    #[inline]
    pub fn is_anchored(self) -> bool {
        self.0 & Self::ANCHORED != 0
    }

    #[inline]
    pub fn is_under_surface(self) -> bool {
        self.0 & Self::UNDER_SURFACE != 0
    }

    /// Blocks light: solid and above the external surface.
    #[inline]
    pub fn is_occluder(self) -> bool {
        self.is_solid() && !self.is_under_surface()
    }

    pub fn set_outside(&mut self, outside: bool) {
        self.set_bit(Self::OUTSIDE, outside);
    }

    /// Force the voxel to be an empty boundary voxel.
    pub fn mark_on_edge(&mut self) {
        self.0 |= Self::OUTSIDE | Self::ON_EDGE;
    }

    pub fn set_anchored(&mut self, anchored: bool) {
        self.set_bit(Self::ANCHORED, anchored);
    }

    pub fn set_under_surface(&mut self, under: bool) {
        self.set_bit(Self::UNDER_SURFACE, under);
    }

    #[inline]
    fn set_bit(&mut self, bit: u8, on: bool) {
        if on {
            self.0 |= bit;
        } else {
            self.0 &= !bit;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_solid() {
        let f = VoxelFlags::default();
        assert!(f.is_solid());
        assert!(!f.is_on_edge());
        assert!(f.is_occluder());
    }

    #[test]
    fn test_on_edge_implies_outside() {
        let mut f = VoxelFlags::SOLID;
        f.mark_on_edge();
        assert!(f.is_outside());
        assert!(f.is_on_edge());
        assert_eq!(f, VoxelFlags::EDGE);
    }

    #[test]
    fn test_bits_combine() {
        let mut f = VoxelFlags::SOLID;
        f.set_under_surface(true);
        f.set_anchored(true);
        assert!(f.is_solid());
        assert!(!f.is_occluder());
        f.set_anchored(false);
        assert!(!f.is_anchored());
        assert!(f.is_under_surface());
        f.set_outside(true);
        assert_eq!(f.bits(), VoxelFlags::OUTSIDE | VoxelFlags::UNDER_SURFACE);
    }
}
