use std::fmt::Display;

use serde::{
    Serialize,
    Serializer,
};

/// A significant contiguous region, in coordinates of the untrimmed input.
///
/// `start` and `end` are inclusive element indices.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Region {
    pub start:  usize,
    pub end:    usize,
    pub size:   usize,
    /// Raw aggregate of the region.
    pub score:  f64,
    #[serde(serialize_with = "serialize_scientific")]
    pub pvalue: f64,
}

impl Region {
    pub fn new(
        start: usize,
        end: usize,
        score: f64,
        pvalue: f64,
    ) -> Self {
        debug_assert!(start <= end, "Region start {} > end {}", start, end);
        Region {
            start,
            end,
            size: end - start + 1,
            score,
            pvalue,
        }
    }

    pub fn length(&self) -> usize { self.end - self.start + 1 }

    /// Returns `true` if the region ends right before `other` starts.
    pub fn touches(
        &self,
        other: &Self,
    ) -> bool {
        self.end + 1 == other.start
    }

    pub fn overlaps(
        &self,
        other: &Self,
    ) -> bool {
        self.start <= other.end && other.start <= self.end
    }

    /// Moves the region by `offset` elements to the right.
    pub fn shifted(
        mut self,
        offset: usize,
    ) -> Self {
        self.start += offset;
        self.end += offset;
        self
    }
}

impl Display for Region {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        write!(
            f,
            "[{}, {}] (size {}, score {:.4}, p = {:e})",
            self.start, self.end, self.size, self.score, self.pvalue
        )
    }
}

fn serialize_scientific<S>(
    x: &f64,
    serializer: S,
) -> Result<S::Ok, S::Error>
where
    S: Serializer, {
    serializer.serialize_str(&format!("{:e}", x))
}

/// Output of a single run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PeasResult {
    /// Non-overlapping regions ordered by start.
    pub regions:      Vec<Region>,
    /// Number of matrix permutations actually used. `None` for vectors.
    pub num_shuffles: Option<usize>,
    /// Number of leading elements removed before the analysis.
    pub trim_start:   usize,
    /// Resolved upper bound on region size.
    pub max_size:     usize,
}

impl PeasResult {
    pub fn is_empty(&self) -> bool { self.regions.is_empty() }

    /// Total number of elements covered by regions.
    pub fn covered(&self) -> usize {
        self.regions.iter().map(Region::length).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn region_geometry() {
        let a = Region::new(2, 4, 1.0, 0.01);
        let b = Region::new(5, 7, 1.0, 0.01);
        let c = Region::new(4, 6, 1.0, 0.01);
        assert_eq!(a.size, 3);
        assert!(a.touches(&b));
        assert!(!b.touches(&a));
        assert!(!a.overlaps(&b));
        assert!(a.overlaps(&c));
        assert_eq!(a.clone().shifted(3), Region::new(5, 7, 1.0, 0.01));
    }

    #[test]
    fn pvalue_serialized_in_scientific_notation() {
        let region = Region::new(0, 1, 2.5, 0.001);
        let json = serde_json::to_value(&region).unwrap();
        assert_eq!(json["pvalue"], "1e-3");
        assert_eq!(json["size"], 2);
    }

    #[test]
    fn result_coverage() {
        let result = PeasResult {
            regions:      vec![Region::new(0, 2, 1.0, 0.1), Region::new(5, 9, 1.0, 0.1)],
            num_shuffles: None,
            trim_start:   0,
            max_size:     5,
        };
        assert_eq!(result.covered(), 8);
        assert!(!result.is_empty());
    }
}
