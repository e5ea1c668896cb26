use ndarray::{Array1, Array2, Axis};

/// Principal component projection fitted on a sample matrix (rows = samples)
#[derive(Debug, Clone)]
pub struct Pca {
    mean: Array1<f64>,
    /// One component per row, strongest first
    components: Array2<f64>,
    explained_variance: Array1<f64>,
    total_variance: f64,
}

impl Pca {
    /// Fit `n_components` components. The caller keeps
    /// `n_components <= min(n_samples, n_features)`.
    pub fn fit(data: &Array2<f64>, n_components: usize) -> Self {
        let (n_samples, n_features) = data.dim();
        let n_components = n_components.min(n_features).max(1);

        let mean = data
            .mean_axis(Axis(0))
            .unwrap_or_else(|| Array1::zeros(n_features));
        let centered = data - &mean;
        let denom = n_samples.saturating_sub(1).max(1) as f64;
        let covariance = centered.t().dot(&centered) / denom;

        let (eigenvalues, eigenvectors) = symmetric_eigen(covariance);

        let mut order: Vec<usize> = (0..n_features).collect();
        order.sort_by(|&a, &b| eigenvalues[b].total_cmp(&eigenvalues[a]).then(a.cmp(&b)));

        let mut components = Array2::<f64>::zeros((n_components, n_features));
        let mut explained_variance = Array1::<f64>::zeros(n_components);
        for (row, &idx) in order.iter().take(n_components).enumerate() {
            let mut vector = eigenvectors.column(idx).to_owned();
            // Sign is arbitrary; pin it so the largest loading is positive
            let pivot = vector
                .iter()
                .copied()
                .fold(0.0f64, |best, v| if v.abs() > best.abs() { v } else { best });
            if pivot < 0.0 {
                vector.mapv_inplace(|v| -v);
            }
            components.row_mut(row).assign(&vector);
            explained_variance[row] = eigenvalues[idx].max(0.0);
        }

        let total_variance = eigenvalues.iter().map(|v| v.max(0.0)).sum();
        Self {
            mean,
            components,
            explained_variance,
            total_variance,
        }
    }

    pub fn transform(&self, data: &Array2<f64>) -> Array2<f64> {
        (data - &self.mean).dot(&self.components.t())
    }

    pub fn fit_transform(data: &Array2<f64>, n_components: usize) -> (Self, Array2<f64>) {
        let pca = Self::fit(data, n_components);
        let projected = pca.transform(data);
        (pca, projected)
    }

    pub fn n_components(&self) -> usize {
        self.components.nrows()
    }

    pub fn components(&self) -> &Array2<f64> {
        &self.components
    }

    /// Share of the sample variance kept by the retained components, in `[0, 1]`.
    /// A sample set without any variance counts as fully explained.
    pub fn explained_variance_ratio(&self) -> f64 {
        if self.total_variance <= 0.0 {
            return 1.0;
        }
        (self.explained_variance.sum() / self.total_variance).min(1.0)
    }
}

/// Eigen-decomposition of a symmetric matrix by cyclic Jacobi rotations.
/// Returns eigenvalues and the matching eigenvectors as columns.
fn symmetric_eigen(mut a: Array2<f64>) -> (Array1<f64>, Array2<f64>) {
    let n = a.nrows();
    let mut v = Array2::<f64>::eye(n);

    let scale: f64 = a.iter().map(|x| x * x).sum::<f64>().max(f64::MIN_POSITIVE);

    for _sweep in 0..100 {
        let mut off = 0.0;
        for p in 0..n {
            for q in (p + 1)..n {
                off += a[[p, q]] * a[[p, q]];
            }
        }
        if off <= 1e-24 * scale {
            break;
        }

        for p in 0..n {
            for q in (p + 1)..n {
                let apq = a[[p, q]];
                if apq == 0.0 {
                    continue;
                }
                let theta = (a[[q, q]] - a[[p, p]]) / (2.0 * apq);
                let t = theta.signum() / (theta.abs() + (theta * theta + 1.0).sqrt());
                let c = 1.0 / (t * t + 1.0).sqrt();
                let s = t * c;

                for k in 0..n {
                    let (akp, akq) = (a[[k, p]], a[[k, q]]);
                    a[[k, p]] = c * akp - s * akq;
                    a[[k, q]] = s * akp + c * akq;
                }
                for k in 0..n {
                    let (apk, aqk) = (a[[p, k]], a[[q, k]]);
                    a[[p, k]] = c * apk - s * aqk;
                    a[[q, k]] = s * apk + c * aqk;
                }
                for k in 0..n {
                    let (vkp, vkq) = (v[[k, p]], v[[k, q]]);
                    v[[k, p]] = c * vkp - s * vkq;
                    v[[k, q]] = s * vkp + c * vkq;
                }
            }
        }
    }

    (a.diag().to_owned(), v)
}
