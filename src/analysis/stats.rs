use serde::Serialize;

/// Size distribution of symbol bounding boxes, in pixels
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SizeStats {
    pub count: usize,
    pub mean: f64,
    pub min: u64,
    pub max: u64,
}

impl SizeStats {
    /// None when there are no sizes
    pub fn from_sizes(sizes: impl IntoIterator<Item = u64>) -> Option<Self> {
        let mut count = 0usize;
        let mut total = 0u128;
        let mut min = u64::MAX;
        let mut max = 0u64;
        for size in sizes {
            count += 1;
            total += size as u128;
            min = min.min(size);
            max = max.max(size);
        }
        if count == 0 {
            return None;
        }
        Some(Self {
            count,
            mean: total as f64 / count as f64,
            min,
            max,
        })
    }
}
