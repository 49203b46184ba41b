//! Representative frame selection by clustering sample embeddings.

use crate::segmenter::SampleEmbedding;

const MAX_ITERATIONS: usize = 50;

fn squared_distance(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| (x - y).powi(2)).sum()
}

fn nearest(point: &[f64], centroids: &[Vec<f64>]) -> usize {
    let mut best = 0;
    let mut best_dist = f64::INFINITY;
    for (i, c) in centroids.iter().enumerate() {
        let d = squared_distance(point, c);
        if d < best_dist {
            best = i;
            best_dist = d;
        }
    }
    best
}

/// Farthest-point seeding starting from the first sample.
fn initial_centroids(points: &[&[f64]], k: usize) -> Vec<Vec<f64>> {
    let mut centroids = vec![points[0].to_vec()];
    let mut min_dist: Vec<f64> = points
        .iter()
        .map(|p| squared_distance(p, points[0]))
        .collect();

    while centroids.len() < k {
        let (next, _) = min_dist
            .iter()
            .enumerate()
            .fold((0, f64::NEG_INFINITY), |(bi, bd), (i, d)| {
                if *d > bd {
                    (i, *d)
                } else {
                    (bi, bd)
                }
            });
        centroids.push(points[next].to_vec());
        for (i, p) in points.iter().enumerate() {
            min_dist[i] = min_dist[i].min(squared_distance(p, points[next]));
        }
    }
    centroids
}

/// Pick up to `k` keyframes and return their timestamps in ascending order.
///
/// Deterministic: k-means with farthest-point seeding, then the sample
/// closest to each centroid.
pub fn select_keyframes(samples: &[SampleEmbedding], k: usize) -> Vec<f64> {
    if samples.is_empty() || k == 0 {
        return Vec::new();
    }
    let k = k.min(samples.len());
    let points: Vec<&[f64]> = samples.iter().map(|s| s.embedding.as_slice()).collect();
    let dims = points[0].len();

    let mut centroids = initial_centroids(&points, k);
    let mut assignment: Vec<usize> = points.iter().map(|p| nearest(p, &centroids)).collect();

    for _ in 0..MAX_ITERATIONS {
        for (c, centroid) in centroids.iter_mut().enumerate() {
            let members: Vec<&[f64]> = points
                .iter()
                .zip(&assignment)
                .filter(|(_, a)| **a == c)
                .map(|(p, _)| *p)
                .collect();
            if members.is_empty() {
                continue;
            }
            let mut mean = vec![0.0; dims];
            for m in &members {
                for (acc, v) in mean.iter_mut().zip(m.iter()) {
                    *acc += v;
                }
            }
            for v in &mut mean {
                *v /= members.len() as f64;
            }
            *centroid = mean;
        }

        let next: Vec<usize> = points.iter().map(|p| nearest(p, &centroids)).collect();
        if next == assignment {
            break;
        }
        assignment = next;
    }

    let mut chosen: Vec<usize> = centroids
        .iter()
        .enumerate()
        .filter_map(|(c, centroid)| {
            points
                .iter()
                .enumerate()
                .filter(|(i, _)| assignment[*i] == c)
                .map(|(i, p)| (i, squared_distance(p, centroid)))
                .fold(None, |best: Option<(usize, f64)>, (i, d)| match best {
                    Some((_, bd)) if bd <= d => best,
                    _ => Some((i, d)),
                })
                .map(|(i, _)| i)
        })
        .collect();
    chosen.sort_unstable();
    chosen.dedup();

    chosen.into_iter().map(|i| samples[i].timestamp).collect()
}
