//! Unit conversions. All internal arithmetic is canonical (mm, mm/min,
//! mm/min^3 / 1e6); `f64` throughout per spec §9's modern-target guidance.

pub const MM_PER_INCH: f64 = 25.4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde-support", derive(serde::Serialize, serde::Deserialize))]
pub enum UnitsMode {
    #[default]
    Millimeters,
    Inches,
    Degrees,
}

pub fn to_mm(value: f64, units: UnitsMode) -> f64 {
    match units {
        UnitsMode::Inches => value * MM_PER_INCH,
        UnitsMode::Millimeters | UnitsMode::Degrees => value,
    }
}

pub fn to_inches(value_mm: f64) -> f64 {
    value_mm / MM_PER_INCH
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip_mm_inches() {
        let x = 123.456_f64;
        let back = to_inches(to_mm(x, UnitsMode::Inches));
        assert!((back - x).abs() < 1e-9);
    }
}
