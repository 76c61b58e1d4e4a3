/// Maps timeline positions to commit indices.
///
/// `index = min(floor(count * clamp(fraction, 0, 1)), count - 1)`, so both
/// ends of the track land on a real commit.
#[derive(Debug, Clone, Copy)]
pub struct SeekResolver {
    margin_px: f64,
}

impl SeekResolver {
    pub fn new(margin_px: f64) -> Self {
        Self {
            margin_px: margin_px.max(0.0),
        }
    }

    pub fn resolve(&self, fraction: f64, commits_count: usize) -> Option<usize> {
        let last = commits_count.checked_sub(1)?;
        let fraction = if fraction.is_finite() {
            fraction.clamp(0.0, 1.0)
        } else {
            0.0
        };
        let index = (commits_count as f64 * fraction).floor() as usize;
        Some(index.min(last))
    }

    /// Fraction of the usable track under pointer position `x_px`, or `None`
    /// inside the edge margins.
    pub fn fraction_at(&self, x_px: f64, track_width_px: f64) -> Option<f64> {
        let usable = track_width_px - 2.0 * self.margin_px;
        if usable <= 0.0 || !x_px.is_finite() {
            return None;
        }
        let offset = x_px - self.margin_px;
        if offset < 0.0 || offset > usable {
            return None;
        }
        Some(offset / usable)
    }

    pub fn resolve_at(
        &self,
        x_px: f64,
        track_width_px: f64,
        commits_count: usize,
    ) -> Option<usize> {
        self.fraction_at(x_px, track_width_px)
            .and_then(|fraction| self.resolve(fraction, commits_count))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_endpoints() {
        let seek = SeekResolver::new(16.0);
        assert_eq!(seek.resolve(0.0, 250), Some(0));
        assert_eq!(seek.resolve(1.0, 250), Some(249));
        assert_eq!(seek.resolve(0.5, 250), Some(125));
        assert_eq!(seek.resolve(0.999, 250), Some(249));
    }

    #[test]
    fn test_resolve_clamps_out_of_range() {
        let seek = SeekResolver::new(16.0);
        assert_eq!(seek.resolve(-0.3, 10), Some(0));
        assert_eq!(seek.resolve(7.0, 10), Some(9));
        assert_eq!(seek.resolve(f64::NAN, 10), Some(0));
        assert_eq!(seek.resolve(0.5, 0), None);
        assert_eq!(seek.resolve(1.0, 1), Some(0));
    }

    #[test]
    fn test_pointer_margins() {
        let seek = SeekResolver::new(16.0);
        assert_eq!(seek.fraction_at(10.0, 1032.0), None);
        assert_eq!(seek.fraction_at(1030.0, 1032.0), None);
        assert_eq!(seek.fraction_at(16.0, 1032.0), Some(0.0));
        assert_eq!(seek.fraction_at(516.0, 1032.0), Some(0.5));
        assert_eq!(seek.resolve_at(1016.0, 1032.0, 200), Some(199));
        assert_eq!(seek.fraction_at(10.0, 20.0), None);
    }
}
