// ---------------------------------------------------------------------------
// Clustering Engine
// ---------------------------------------------------------------------------
//
// Groups users by behaviour: one row per user with message counts per
// category plus an action count, z-score standardized, then partitioned
// with seeded k-means++ / Lloyd iterations. Nothing here is cached; every
// call reads the record source afresh.
// ---------------------------------------------------------------------------

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;

use crate::config::ClusterConfig;
use crate::error::RecallError;
use crate::source::RecordSource;
use crate::types::{ActionRecord, ConversationRecord};

/// Column name of the per-user action total. Always the last column.
pub const ACTION_COUNT: &str = "action_count";

/// Standard deviations below this are treated as zero.
const MIN_SCALE: f64 = 1e-12;

// ---------------------------------------------------------------------------
// Feature table
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct FeatureTable {
	pub feature_names: Vec<String>,
	pub user_ids: Vec<String>,
	/// Raw counts, one row per entry of `user_ids`.
	pub rows: Vec<Vec<f64>>,
}

impl FeatureTable {
	/// Outer join of per-category message counts and action counts. A user
	/// seen in only one of the two inputs gets zeros for the other columns.
	pub fn build(conversations: &[ConversationRecord], actions: &[ActionRecord]) -> Self {
		let mut categories: BTreeSet<&str> = BTreeSet::new();
		let mut messages: BTreeMap<&str, BTreeMap<&str, usize>> = BTreeMap::new();
		let mut action_counts: BTreeMap<&str, usize> = BTreeMap::new();

		for record in conversations {
			categories.insert(&record.category);
			*messages
				.entry(&record.user_id)
				.or_default()
				.entry(&record.category)
				.or_default() += 1;
		}
		for record in actions {
			*action_counts.entry(&record.user_id).or_default() += 1;
		}

		let users: BTreeSet<&str> = messages.keys().chain(action_counts.keys()).copied().collect();
		if users.is_empty() {
			return Self {
				feature_names: Vec::new(),
				user_ids: Vec::new(),
				rows: Vec::new(),
			};
		}

		let mut feature_names: Vec<String> = categories.iter().map(|c| c.to_string()).collect();
		feature_names.push(ACTION_COUNT.to_string());

		let rows = users
			.iter()
			.map(|user| {
				let per_category = messages.get(user);
				let mut row: Vec<f64> = categories
					.iter()
					.map(|category| {
						per_category
							.and_then(|counts| counts.get(category))
							.copied()
							.unwrap_or(0) as f64
					})
					.collect();
				row.push(action_counts.get(user).copied().unwrap_or(0) as f64);
				row
			})
			.collect();

		Self {
			feature_names,
			user_ids: users.into_iter().map(String::from).collect(),
			rows,
		}
	}

	pub fn len(&self) -> usize {
		self.user_ids.len()
	}

	pub fn is_empty(&self) -> bool {
		self.user_ids.is_empty()
	}

	/// Every column shifted to zero mean and scaled to unit population
	/// variance. Constant columns are only centred.
	pub fn standardized(&self) -> Vec<Vec<f64>> {
		let n = self.rows.len();
		if n == 0 {
			return Vec::new();
		}
		let dims = self.feature_names.len();
		let mut mean = vec![0.0; dims];
		for row in &self.rows {
			for (m, x) in mean.iter_mut().zip(row) {
				*m += x;
			}
		}
		for m in &mut mean {
			*m /= n as f64;
		}

		let mut scale = vec![0.0; dims];
		for row in &self.rows {
			for ((s, x), m) in scale.iter_mut().zip(row).zip(&mean) {
				*s += (x - m) * (x - m);
			}
		}
		for s in &mut scale {
			let std = (*s / n as f64).sqrt();
			*s = if std < MIN_SCALE { 1.0 } else { std };
		}

		self.rows
			.iter()
			.map(|row| {
				row.iter()
					.zip(&mean)
					.zip(&scale)
					.map(|((x, m), s)| (x - m) / s)
					.collect()
			})
			.collect()
	}
}

// ---------------------------------------------------------------------------
// Results
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UserAssignment {
	pub user_id: String,
	/// Raw (unstandardized) feature values, aligned with `feature_names`.
	pub features: Vec<f64>,
	pub cluster_id: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClusterSummary {
	pub cluster_id: usize,
	pub size: usize,
	/// Mean raw value of every feature over the cluster's members.
	pub means: Vec<f64>,
	pub dominant_feature: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClusterReport {
	pub feature_names: Vec<String>,
	pub users: Vec<UserAssignment>,
	/// Non-empty clusters only, by ascending id.
	pub clusters: Vec<ClusterSummary>,
	pub k: usize,
	pub iterations: usize,
	/// Within-cluster sum of squares in standardized space.
	pub inertia: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ClusterOutcome {
	#[serde(rename = "success")]
	Clustered(ClusterReport),
	NotEnoughData { required: usize, users: usize },
	/// Nothing to cluster, or the records could not be read.
	Absent,
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

pub struct ClusterEngine {
	source: Arc<dyn RecordSource>,
	config: ClusterConfig,
}

impl ClusterEngine {
	pub fn new(source: Arc<dyn RecordSource>, config: ClusterConfig) -> Self {
		Self { source, config }
	}

	pub fn config(&self) -> &ClusterConfig {
		&self.config
	}

	/// Cluster with the configured `k`.
	pub async fn cluster(&self) -> ClusterOutcome {
		self.cluster_users(self.config.k).await
	}

	pub async fn cluster_users(&self, k: usize) -> ClusterOutcome {
		let records = async {
			let conversations = self.source.list_conversations().await?;
			let actions = self.source.list_actions().await?;
			Ok::<_, RecallError>((conversations, actions))
		};
		let (conversations, actions) = match records.await {
			Ok(records) => records,
			Err(e) => {
				tracing::warn!(code = e.code(), error = %e, "clustering skipped: records unavailable");
				return ClusterOutcome::Absent;
			}
		};

		let table = FeatureTable::build(&conversations, &actions);
		cluster_table(&table, k, &self.config)
	}
}

/// Partition the users of `table` into `k` groups (`k = 0` means 1).
pub fn cluster_table(table: &FeatureTable, k: usize, config: &ClusterConfig) -> ClusterOutcome {
	let k = k.max(1);
	if table.is_empty() {
		return ClusterOutcome::Absent;
	}
	if table.len() < k {
		return ClusterOutcome::NotEnoughData {
			required: k,
			users: table.len(),
		};
	}

	let points = table.standardized();
	let mut rng = StdRng::seed_from_u64(config.seed);
	let mut best: Option<Run> = None;
	for _ in 0..config.n_init.max(1) {
		let run = kmeans(&points, k, config.max_iterations.max(1), &mut rng);
		if best.as_ref().is_none_or(|b| run.inertia < b.inertia) {
			best = Some(run);
		}
	}
	let Some(best) = best else {
		return ClusterOutcome::Absent;
	};

	tracing::info!(
		users = table.len(),
		k,
		iterations = best.iterations,
		inertia = best.inertia,
		"users clustered"
	);
	ClusterOutcome::Clustered(report(table, k, best))
}

fn report(table: &FeatureTable, k: usize, run: Run) -> ClusterReport {
	let dims = table.feature_names.len();
	let mut sums = vec![vec![0.0; dims]; k];
	let mut sizes = vec![0usize; k];
	for (row, &cluster) in table.rows.iter().zip(&run.assignments) {
		sizes[cluster] += 1;
		for (s, x) in sums[cluster].iter_mut().zip(row) {
			*s += x;
		}
	}

	let clusters = sums
		.into_iter()
		.zip(sizes)
		.enumerate()
		.filter(|(_, (_, size))| *size > 0)
		.map(|(cluster_id, (sum, size))| {
			let means: Vec<f64> = sum.into_iter().map(|s| s / size as f64).collect();
			let mut dominant = 0;
			for (i, m) in means.iter().enumerate() {
				if *m > means[dominant] {
					dominant = i;
				}
			}
			ClusterSummary {
				cluster_id,
				size,
				dominant_feature: table.feature_names.get(dominant).cloned().unwrap_or_default(),
				means,
			}
		})
		.collect();

	let users = table
		.user_ids
		.iter()
		.zip(&table.rows)
		.zip(&run.assignments)
		.map(|((user_id, row), &cluster_id)| UserAssignment {
			user_id: user_id.clone(),
			features: row.clone(),
			cluster_id,
		})
		.collect();

	ClusterReport {
		feature_names: table.feature_names.clone(),
		users,
		clusters,
		k,
		iterations: run.iterations,
		inertia: run.inertia,
	}
}

// ---------------------------------------------------------------------------
// k-means
// ---------------------------------------------------------------------------

struct Run {
	assignments: Vec<usize>,
	iterations: usize,
	inertia: f64,
}

fn distance_squared(a: &[f64], b: &[f64]) -> f64 {
	a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum()
}

/// Index of the closest centroid; ties go to the lowest index.
fn nearest(point: &[f64], centroids: &[Vec<f64>]) -> (usize, f64) {
	let mut best = (0, f64::INFINITY);
	for (j, centroid) in centroids.iter().enumerate() {
		let d = distance_squared(point, centroid);
		if d < best.1 {
			best = (j, d);
		}
	}
	best
}

/// k-means++ seeding: the first centre uniformly, the rest with probability
/// proportional to squared distance from the nearest chosen centre.
fn seed_centroids(points: &[Vec<f64>], k: usize, rng: &mut StdRng) -> Vec<Vec<f64>> {
	let n = points.len();
	let mut centroids = Vec::with_capacity(k);
	centroids.push(points[rng.random_range(0..n)].clone());
	let mut closest: Vec<f64> = points.iter().map(|p| distance_squared(p, &centroids[0])).collect();

	while centroids.len() < k {
		let total: f64 = closest.iter().sum();
		let pick = if total > 0.0 {
			let mut target = rng.random::<f64>() * total;
			let fallback = closest.iter().rposition(|&d| d > 0.0).unwrap_or(0);
			let mut pick = fallback;
			for (i, &d) in closest.iter().enumerate() {
				if d <= 0.0 {
					continue;
				}
				if target < d {
					pick = i;
					break;
				}
				target -= d;
			}
			pick
		} else {
			// every point sits on a chosen centre
			rng.random_range(0..n)
		};

		let centroid = points[pick].clone();
		for (c, p) in closest.iter_mut().zip(points) {
			*c = c.min(distance_squared(p, &centroid));
		}
		centroids.push(centroid);
	}
	centroids
}

fn kmeans(points: &[Vec<f64>], k: usize, max_iterations: usize, rng: &mut StdRng) -> Run {
	let dims = points.first().map_or(0, Vec::len);
	let mut centroids = seed_centroids(points, k, rng);
	let mut assignments: Vec<usize> = Vec::new();
	let mut iterations = 0;

	while iterations < max_iterations {
		iterations += 1;
		let next: Vec<usize> = points.iter().map(|p| nearest(p, &centroids).0).collect();
		if next == assignments {
			break;
		}
		assignments = next;

		let mut sums = vec![vec![0.0; dims]; k];
		let mut sizes = vec![0usize; k];
		for (point, &cluster) in points.iter().zip(&assignments) {
			sizes[cluster] += 1;
			for (s, x) in sums[cluster].iter_mut().zip(point) {
				*s += x;
			}
		}
		for ((centroid, sum), size) in centroids.iter_mut().zip(sums).zip(sizes) {
			// an emptied cluster keeps its previous centre
			if size > 0 {
				*centroid = sum.into_iter().map(|s| s / size as f64).collect();
			}
		}
	}

	let inertia = points
		.iter()
		.zip(&assignments)
		.map(|(p, &cluster)| distance_squared(p, &centroids[cluster]))
		.sum();

	Run {
		assignments,
		iterations,
		inertia,
	}
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
