//! Plain-data geometry types marshaled to and from guest memory.
//!
//! Layouts match PDFium's `FS_*` structs: consecutive 32-bit IEEE
//! floats, little-endian. Every field is written and read at its own
//! computed offset through a bounds-checked access, so a struct that
//! straddles the end of linear memory fails cleanly instead of
//! corrupting whatever sits at the base pointer.

use crate::error::Result;
use crate::vm::Vm;

macro_rules! guest_struct {
    ($(#[$attr:meta])* $name:ident { $($field:ident),+ $(,)? }) => {
        $(#[$attr])*
        #[derive(Debug, Default, Clone, Copy, PartialEq)]
        pub struct $name {
            $(pub $field: f32,)+
        }

        impl $name {
            pub(crate) const BYTE_SIZE: u64 =
                (0 $(+ { stringify!($field); 1 })+) * std::mem::size_of::<f32>() as u64;

            pub(crate) fn write_to(&self, vm: &mut Vm, base: u64) -> Result<()> {
                let mut offset = 0u64;
                $(
                    vm.write_f32(base + offset, self.$field)?;
                    offset += std::mem::size_of::<f32>() as u64;
                )+
                debug_assert_eq!(offset, Self::BYTE_SIZE);
                Ok(())
            }

            pub(crate) fn read_from(vm: &Vm, base: u64) -> Result<Self> {
                let mut offset = 0u64;
                $(
                    let $field = vm.read_f32(base + offset)?;
                    offset += std::mem::size_of::<f32>() as u64;
                )+
                debug_assert_eq!(offset, Self::BYTE_SIZE);
                Ok(Self { $($field,)+ })
            }
        }
    };
}

guest_struct! {
    /// 2-D point (`FS_POINTF`).
    PointF { x, y }
}

guest_struct! {
    /// Width/height pair (`FS_SIZEF`).
    SizeF { width, height }
}

guest_struct! {
    /// Rectangle in page coordinates (`FS_RECTF`).
    RectF { left, top, right, bottom }
}

guest_struct! {
    /// 2-D affine transform (`FS_MATRIX`): maps `(x, y)` to
    /// `(a·x + c·y + e, b·x + d·y + f)`.
    Matrix { a, b, c, d, e, f }
}

guest_struct! {
    /// Four corner points of a (possibly rotated) quadrilateral
    /// (`FS_QUADPOINTSF`).
    QuadPointsF { x1, y1, x2, y2, x3, y3, x4, y4 }
}

impl Matrix {
    /// The identity transform.
    pub const IDENTITY: Self = Self {
        a: 1.0,
        b: 0.0,
        c: 0.0,
        d: 1.0,
        e: 0.0,
        f: 0.0,
    };
}
