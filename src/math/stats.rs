//! Descriptive statistics over `f64` slices.
//!
//! Conventions follow the usual dataframe defaults: standard deviation is the
//! sample (n - 1) estimator, quantiles interpolate linearly between order
//! statistics. Every function returns `None` instead of NaN when its input
//! cannot support the statistic.

pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

pub fn median(values: &[f64]) -> Option<f64> {
    quantile(values, 0.5)
}

/// Linear-interpolated quantile, `q` in `[0, 1]`.
pub fn quantile(values: &[f64], q: f64) -> Option<f64> {
    if values.is_empty() || !(0.0..=1.0).contains(&q) {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);

    let pos = q * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    let frac = pos - lo as f64;
    Some(sorted[lo] + (sorted[hi] - sorted[lo]) * frac)
}

/// Sample standard deviation (n - 1 denominator).
pub fn sample_std(values: &[f64]) -> Option<f64> {
    if values.len() < 2 {
        return None;
    }
    let m = mean(values)?;
    let var = values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / (values.len() - 1) as f64;
    Some(var.sqrt())
}

pub fn min_max(values: &[f64]) -> Option<(f64, f64)> {
    let mut iter = values.iter().copied();
    let first = iter.next()?;
    Some(iter.fold((first, first), |(lo, hi), v| (lo.min(v), hi.max(v))))
}

/// Percentage change from `first` to `last`; `None` when `first` is zero.
pub fn pct_change(first: f64, last: f64) -> Option<f64> {
    if first == 0.0 || !first.is_finite() || !last.is_finite() {
        return None;
    }
    Some((last - first) / first * 100.0)
}

/// Pearson correlation over pairs where both sides are present.
///
/// `None` with fewer than two complete pairs or a constant side.
pub fn pearson(xs: &[Option<f64>], ys: &[Option<f64>]) -> Option<f64> {
    let pairs: Vec<(f64, f64)> = xs
        .iter()
        .zip(ys)
        .filter_map(|(x, y)| Some(((*x)?, (*y)?)))
        .collect();
    if pairs.len() < 2 {
        return None;
    }

    let n = pairs.len() as f64;
    let mx = pairs.iter().map(|p| p.0).sum::<f64>() / n;
    let my = pairs.iter().map(|p| p.1).sum::<f64>() / n;

    let mut sxy = 0.0;
    let mut sxx = 0.0;
    let mut syy = 0.0;
    for (x, y) in &pairs {
        sxy += (x - mx) * (y - my);
        sxx += (x - mx).powi(2);
        syy += (y - my).powi(2);
    }
    if sxx <= 0.0 || syy <= 0.0 {
        return None;
    }
    Some((sxy / (sxx.sqrt() * syy.sqrt())).clamp(-1.0, 1.0))
}

/// Centered rolling mean.
///
/// The window for position `i` covers `i - w/2 ..= i + (w-1)/2`; positions
/// whose window runs past either end keep their raw value, so the output is
/// always as long as the input.
pub fn centered_moving_average(values: &[f64], window: usize) -> Vec<f64> {
    let n = values.len();
    let w = window.max(1);
    let before = w / 2;
    let after = (w - 1) / 2;

    (0..n)
        .map(|i| {
            if i < before || i + after >= n {
                return values[i];
            }
            let slice = &values[i - before..=i + after];
            slice.iter().sum::<f64>() / slice.len() as f64
        })
        .collect()
}

/// Fill gaps by linear interpolation over position.
///
/// Leading gaps take the first present value and trailing gaps the last.
/// Returns `None` when no value is present.
pub fn interpolate_linear(values: &[Option<f64>]) -> Option<Vec<f64>> {
    let known: Vec<(usize, f64)> = values
        .iter()
        .enumerate()
        .filter_map(|(i, v)| v.filter(|x| x.is_finite()).map(|x| (i, x)))
        .collect();
    let (&(first_idx, first_val), &(last_idx, last_val)) = (known.first()?, known.last()?);

    let mut out = Vec::with_capacity(values.len());
    let mut seg = 0usize;
    for i in 0..values.len() {
        if i <= first_idx {
            out.push(first_val);
            continue;
        }
        if i >= last_idx {
            out.push(last_val);
            continue;
        }
        while known[seg + 1].0 < i {
            seg += 1;
        }
        let (x0, y0) = known[seg];
        let (x1, y1) = known[seg + 1];
        if i == x1 {
            out.push(y1);
        } else {
            let t = (i - x0) as f64 / (x1 - x0) as f64;
            out.push(y0 + (y1 - y0) * t);
        }
    }
    Some(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn median_and_quantiles_interpolate() {
        assert_eq!(median(&[3.0, 1.0, 2.0]), Some(2.0));
        assert_eq!(median(&[4.0, 1.0, 2.0, 3.0]), Some(2.5));
        assert_eq!(quantile(&[1.0, 2.0, 3.0, 4.0, 5.0], 0.25), Some(2.0));
        assert_eq!(median(&[]), None);
    }

    #[test]
    fn sample_std_uses_n_minus_one() {
        let s = sample_std(&[2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0]).unwrap();
        assert!((s - 2.138_089_935).abs() < 1e-6);
        assert_eq!(sample_std(&[1.0]), None);
    }

    #[test]
    fn pct_change_guards_zero_base() {
        assert_eq!(pct_change(0.0, 5.0), None);
        assert_eq!(pct_change(10.0, 99.0), Some(890.0));
    }

    #[test]
    fn pearson_detects_perfect_relationships() {
        let xs: Vec<Option<f64>> = (0..10).map(|i| Some(i as f64)).collect();
        let ys: Vec<Option<f64>> = (0..10).map(|i| Some(3.0 - 2.0 * i as f64)).collect();
        assert!((pearson(&xs, &ys).unwrap() + 1.0).abs() < 1e-12);

        let constant = vec![Some(1.0); 10];
        assert_eq!(pearson(&xs, &constant), None);
    }

    #[test]
    fn pearson_skips_incomplete_pairs() {
        let xs = vec![Some(1.0), None, Some(2.0), Some(3.0)];
        let ys = vec![Some(2.0), Some(100.0), Some(4.0), Some(6.0)];
        assert!((pearson(&xs, &ys).unwrap() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn moving_average_matches_centered_rolling_mean() {
        // Even window: [NaN, NaN, 1.5, 2.5, 3.5, NaN] with raw edge fill.
        let values = [0.0, 1.0, 2.0, 3.0, 4.0, 5.0];
        let ma = centered_moving_average(&values, 4);
        assert_eq!(ma, vec![0.0, 1.0, 1.5, 2.5, 3.5, 5.0]);

        let ma = centered_moving_average(&values, 3);
        assert_eq!(ma, vec![0.0, 1.0, 2.0, 3.0, 4.0, 5.0]);
        assert_eq!(centered_moving_average(&values, 1), values.to_vec());
    }

    #[test]
    fn moving_average_window_larger_than_series_keeps_raw() {
        let values = [1.0, 2.0];
        assert_eq!(centered_moving_average(&values, 7), values.to_vec());
    }

    #[test]
    fn interpolation_fills_interior_and_edges() {
        let filled = interpolate_linear(&[None, Some(1.0), None, None, Some(4.0), None]).unwrap();
        assert_eq!(filled, vec![1.0, 1.0, 2.0, 3.0, 4.0, 4.0]);
        assert_eq!(interpolate_linear(&[None, None]), None);
    }
}
