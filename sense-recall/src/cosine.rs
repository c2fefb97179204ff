/// A sparse document vector: `(column, weight)` pairs sorted by column.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SparseVector {
	entries: Vec<(usize, f64)>,
}

impl SparseVector {
	/// Build from unsorted pairs. Zero weights are dropped and duplicate
	/// columns are summed.
	pub fn from_pairs(mut pairs: Vec<(usize, f64)>) -> Self {
		pairs.sort_by_key(|&(col, _)| col);
		let mut entries: Vec<(usize, f64)> = Vec::with_capacity(pairs.len());
		for (col, w) in pairs {
			match entries.last_mut() {
				Some((last, acc)) if *last == col => *acc += w,
				_ => entries.push((col, w)),
			}
		}
		entries.retain(|&(_, w)| w != 0.0);
		Self { entries }
	}

	pub fn entries(&self) -> &[(usize, f64)] {
		&self.entries
	}

	pub fn is_empty(&self) -> bool {
		self.entries.is_empty()
	}

	/// Scale in place to unit L2 norm. A zero vector is left untouched.
	pub fn normalize(&mut self) {
		let mag = compute_magnitude(self);
		if mag == 0.0 || !mag.is_finite() {
			return;
		}
		for (_, w) in &mut self.entries {
			*w /= mag;
		}
	}
}

/// Compute the magnitude (L2 norm) of a sparse vector.
pub fn compute_magnitude(v: &SparseVector) -> f64 {
	v.entries.iter().map(|&(_, w)| w * w).sum::<f64>().sqrt()
}

/// Dot product by merging the two sorted column lists.
pub fn dot(a: &SparseVector, b: &SparseVector) -> f64 {
	let (mut i, mut j) = (0, 0);
	let mut sum = 0.0;
	while i < a.entries.len() && j < b.entries.len() {
		let (ca, wa) = a.entries[i];
		let (cb, wb) = b.entries[j];
		match ca.cmp(&cb) {
			std::cmp::Ordering::Less => i += 1,
			std::cmp::Ordering::Greater => j += 1,
			std::cmp::Ordering::Equal => {
				sum += wa * wb;
				i += 1;
				j += 1;
			}
		}
	}
	sum
}

/// Cosine similarity between two sparse vectors.
/// Returns 0.0 when either vector has zero magnitude. Result clamped to [-1.0, 1.0].
pub fn cosine_similarity(a: &SparseVector, b: &SparseVector) -> f64 {
	let denom = compute_magnitude(a) * compute_magnitude(b);
	if denom == 0.0 {
		return 0.0;
	}
	let result = dot(a, b) / denom;
	if !result.is_finite() {
		return 0.0;
	}
	result.clamp(-1.0, 1.0)
}

#[cfg(test)]
mod tests {
	use super::*;

	fn v(pairs: &[(usize, f64)]) -> SparseVector {
		SparseVector::from_pairs(pairs.to_vec())
	}

	#[test]
	fn identical_vectors() {
		let a = v(&[(0, 1.0), (3, 2.0), (7, 3.0)]);
		assert!((cosine_similarity(&a, &a) - 1.0).abs() < 1e-10);
	}

	#[test]
	fn disjoint_vectors() {
		let a = v(&[(0, 1.0)]);
		let b = v(&[(1, 1.0)]);
		assert!(cosine_similarity(&a, &b).abs() < 1e-10);
	}

	#[test]
	fn empty_vectors() {
		assert_eq!(cosine_similarity(&SparseVector::default(), &SparseVector::default()), 0.0);
	}

	#[test]
	fn from_pairs_sorts_and_merges() {
		let a = v(&[(5, 1.0), (2, 1.0), (5, 2.0), (9, 0.0)]);
		assert_eq!(a.entries(), &[(2, 1.0), (5, 3.0)]);
	}

	#[test]
	fn normalize_gives_unit_length() {
		let mut a = v(&[(0, 3.0), (1, 4.0)]);
		a.normalize();
		assert!((compute_magnitude(&a) - 1.0).abs() < 1e-12);
		assert!((a.entries()[0].1 - 0.6).abs() < 1e-12);
	}

	#[test]
	fn normalize_zero_vector_is_noop() {
		let mut a = SparseVector::default();
		a.normalize();
		assert!(a.is_empty());
	}

	#[test]
	fn dot_of_normalized_equals_cosine() {
		let mut a = v(&[(0, 1.0), (2, 2.0)]);
		let mut b = v(&[(0, 2.0), (1, 1.0), (2, 1.0)]);
		let cos = cosine_similarity(&a, &b);
		a.normalize();
		b.normalize();
		assert!((dot(&a, &b) - cos).abs() < 1e-12);
	}
}
