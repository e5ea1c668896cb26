use ndarray::{Array2, ArrayView1, Axis};

/// Lloyd's k-means with k-means++ seeding
#[derive(Debug, Clone)]
pub struct KMeans {
    pub n_clusters: usize,
    pub n_init: usize,
    pub max_iter: usize,
    /// Convergence threshold, relative to the mean per-feature variance
    pub tol: f64,
    pub seed: u64,
}

#[derive(Debug, Clone)]
pub struct KMeansFit {
    pub centroids: Array2<f64>,
    pub labels: Vec<usize>,
    /// Sum of squared distances of samples to their centroid
    pub inertia: f64,
    pub n_iter: usize,
}

impl KMeans {
    /// Fit on `data` (rows = samples). `n_clusters` is clamped to the
    /// number of samples.
    pub fn fit(&self, data: &Array2<f64>) -> KMeansFit {
        let n_samples = data.nrows();
        let k = self.n_clusters.clamp(1, n_samples.max(1));
        let tol = self.tol * mean_variance(data);

        let mut rng = fastrand::Rng::with_seed(self.seed);
        let mut best: Option<KMeansFit> = None;

        for _ in 0..self.n_init.max(1) {
            let centroids = kmeans_plus_plus(data, k, &mut rng);
            let fit = lloyd(data, centroids, self.max_iter, tol);
            // Strictly lower inertia replaces, so earlier runs win ties
            if best.as_ref().is_none_or(|b| fit.inertia < b.inertia) {
                best = Some(fit);
            }
        }

        best.unwrap_or_else(|| KMeansFit {
            centroids: Array2::zeros((0, data.ncols())),
            labels: Vec::new(),
            inertia: 0.0,
            n_iter: 0,
        })
    }
}

fn squared_distance(a: ArrayView1<f64>, b: ArrayView1<f64>) -> f64 {
    a.iter().zip(b.iter()).map(|(x, y)| (x - y) * (x - y)).sum()
}

fn mean_variance(data: &Array2<f64>) -> f64 {
    if data.nrows() == 0 || data.ncols() == 0 {
        return 0.0;
    }
    data.var_axis(Axis(0), 0.0).mean().unwrap_or(0.0)
}

/// Nearest centroid and squared distance; ties go to the lower index
fn nearest(point: ArrayView1<f64>, centroids: &Array2<f64>) -> (usize, f64) {
    let mut best = (0, f64::INFINITY);
    for (j, centroid) in centroids.rows().into_iter().enumerate() {
        let d = squared_distance(point, centroid);
        if d < best.1 {
            best = (j, d);
        }
    }
    best
}

fn kmeans_plus_plus(data: &Array2<f64>, k: usize, rng: &mut fastrand::Rng) -> Array2<f64> {
    let n_samples = data.nrows();
    let mut centroids = Array2::<f64>::zeros((k, data.ncols()));
    if n_samples == 0 {
        return centroids;
    }

    centroids.row_mut(0).assign(&data.row(rng.usize(..n_samples)));
    let mut closest: Vec<f64> = data
        .rows()
        .into_iter()
        .map(|row| squared_distance(row, centroids.row(0)))
        .collect();

    for c in 1..k {
        let total: f64 = closest.iter().sum();
        let chosen = if total > 0.0 {
            let target = rng.f64() * total;
            let mut acc = 0.0;
            let mut pick = n_samples - 1;
            for (i, d) in closest.iter().enumerate() {
                acc += d;
                if acc > target {
                    pick = i;
                    break;
                }
            }
            pick
        } else {
            // Every sample already coincides with a centroid
            rng.usize(..n_samples)
        };

        centroids.row_mut(c).assign(&data.row(chosen));
        for (i, row) in data.rows().into_iter().enumerate() {
            let d = squared_distance(row, centroids.row(c));
            if d < closest[i] {
                closest[i] = d;
            }
        }
    }

    centroids
}

fn lloyd(data: &Array2<f64>, mut centroids: Array2<f64>, max_iter: usize, tol: f64) -> KMeansFit {
    let (n_samples, n_features) = data.dim();
    let k = centroids.nrows();
    let mut labels = vec![0usize; n_samples];
    let mut distances = vec![0f64; n_samples];
    let mut n_iter = 0;

    for iter in 0..max_iter {
        n_iter = iter + 1;
        for (i, row) in data.rows().into_iter().enumerate() {
            let (label, d) = nearest(row, &centroids);
            labels[i] = label;
            distances[i] = d;
        }

        let mut sums = Array2::<f64>::zeros((k, n_features));
        let mut counts = vec![0usize; k];
        for (i, row) in data.rows().into_iter().enumerate() {
            let mut target = sums.row_mut(labels[i]);
            target += &row;
            counts[labels[i]] += 1;
        }

        let mut updated = centroids.clone();
        for j in 0..k {
            if counts[j] > 0 {
                let mean = sums.row(j).mapv(|v| v / counts[j] as f64);
                updated.row_mut(j).assign(&mean);
            } else {
                // Re-seed an empty cluster with the sample farthest from its centroid
                let far = distances
                    .iter()
                    .enumerate()
                    .fold(0, |best, (i, d)| if *d > distances[best] { i } else { best });
                updated.row_mut(j).assign(&data.row(far));
                distances[far] = 0.0;
            }
        }

        let shift: f64 = centroids
            .rows()
            .into_iter()
            .zip(updated.rows())
            .map(|(a, b)| squared_distance(a, b))
            .sum();
        centroids = updated;
        if shift <= tol {
            break;
        }
    }

    let mut inertia = 0.0;
    for (i, row) in data.rows().into_iter().enumerate() {
        let (label, d) = nearest(row, &centroids);
        labels[i] = label;
        inertia += d;
    }

    KMeansFit {
        centroids,
        labels,
        inertia,
        n_iter,
    }
}
