//! Center-key sorting for packed triangle ranges.
//!
//! All entry points order the records of `[from, to)` ascending by the
//! same projected key (see `PackedTriangles::compute_centers`), computed
//! once per call. The direct variant moves the packed records during
//! comparison sorting; the indirect variants sort an index permutation
//! first and then apply it with a single in-place cycle-following pass.

use crate::triangles::{PackedTriangles, GEOM_STRIDE, UV_STRIDE};

/// Default range-size crossover between comparison and radix sorting.
///
/// Empirical tuning constant; worth re-measuring on new hardware rather
/// than trusting the value carried here.
pub const SORT_CROSSOVER: usize = 2048;

/// Below this range size the comparison sort finishes with insertion.
const INSERTION_CUTOFF: usize = 16;

/// Below this range size the unstable radix recursion falls back to
/// insertion on the raw keys.
const RADIX_CUTOFF: usize = 64;

impl PackedTriangles {
    /// Sort `[from, to)` by center key along `axis`, picking the
    /// algorithm by range size with the default crossover.
    pub fn sort(&mut self, from: usize, to: usize, axis: usize) {
        self.sort_with_crossover(from, to, axis, SORT_CROSSOVER);
    }

    /// Sort `[from, to)` by center key along `axis`: comparison sorting
    /// below `crossover` elements, stable radix sorting at or above it.
    pub fn sort_with_crossover(&mut self, from: usize, to: usize, axis: usize, crossover: usize) {
        if to - from >= crossover {
            self.radix_sort_stable(from, to, axis);
        } else {
            self.quick_sort(from, to, axis);
        }
    }

    /// In-place comparison sort of `[from, to)` along `axis`.
    ///
    /// Every swap moves the packed record and its cached center key
    /// together, keeping data and keys synchronized throughout.
    pub fn quick_sort(&mut self, from: usize, to: usize, axis: usize) {
        let mut centers = self.compute_centers(from, to, axis);
        self.quick_sort_range(&mut centers, from, 0, to - from);
    }

    /// Indirect comparison sort of `[from, to)` along `axis`: sorts an
    /// index permutation without touching the records, then applies it
    /// in one permutation pass.
    pub fn quick_sort_indirect(&mut self, from: usize, to: usize, axis: usize) {
        let centers = self.compute_centers(from, to, axis);
        let mut indexes: Vec<usize> = (0..to - from).collect();
        indexes.sort_unstable_by(|&a, &b| centers[a].total_cmp(&centers[b]));
        self.permute(&mut indexes, from);
    }

    /// Indirect unstable radix sort of `[from, to)` along `axis`.
    pub fn radix_sort(&mut self, from: usize, to: usize, axis: usize) {
        let centers = self.compute_centers(from, to, axis);
        let keys: Vec<u32> = centers.iter().map(|&c| sortable_bits(c)).collect();
        let mut indexes: Vec<usize> = (0..to - from).collect();
        radix_sort_indirect(&mut indexes, &keys);
        self.permute(&mut indexes, from);
    }

    /// Indirect stable radix sort of `[from, to)` along `axis`; records
    /// with equal center keys keep their relative order.
    pub fn radix_sort_stable(&mut self, from: usize, to: usize, axis: usize) {
        let centers = self.compute_centers(from, to, axis);
        let keys: Vec<u32> = centers.iter().map(|&c| sortable_bits(c)).collect();
        let mut indexes: Vec<usize> = (0..to - from).collect();
        radix_sort_indirect_stable(&mut indexes, &keys);
        self.permute(&mut indexes, from);
    }

    /// Quicksort over `centers[lo..hi]` co-swapping the records at
    /// `base + i`. Sedgewick-style: median-of-three pivot with the
    /// outer elements as sentinels, insertion sort for small ranges.
    fn quick_sort_range(&mut self, centers: &mut [f32], base: usize, lo: usize, hi: usize) {
        if hi - lo <= INSERTION_CUTOFF {
            self.insertion_sort_range(centers, base, lo, hi);
            return;
        }
        let p = self.partition(centers, base, lo, hi);
        self.quick_sort_range(centers, base, lo, p);
        self.quick_sort_range(centers, base, p + 1, hi);
    }

    fn partition(&mut self, centers: &mut [f32], base: usize, lo: usize, hi: usize) -> usize {
        let mid = lo + (hi - lo) / 2;
        let last = hi - 1;

        // Order lo/mid/last; lo and last then act as partition sentinels.
        if centers[mid].total_cmp(&centers[lo]).is_lt() {
            self.swap_keyed(centers, base, mid, lo);
        }
        if centers[last].total_cmp(&centers[lo]).is_lt() {
            self.swap_keyed(centers, base, last, lo);
        }
        if centers[last].total_cmp(&centers[mid]).is_lt() {
            self.swap_keyed(centers, base, last, mid);
        }
        self.swap_keyed(centers, base, mid, last - 1);
        let pivot = centers[last - 1];

        let mut i = lo;
        let mut j = last - 1;
        loop {
            loop {
                i += 1;
                if centers[i].total_cmp(&pivot).is_ge() {
                    break;
                }
            }
            loop {
                j -= 1;
                if centers[j].total_cmp(&pivot).is_le() {
                    break;
                }
            }
            if i >= j {
                break;
            }
            self.swap_keyed(centers, base, i, j);
        }
        self.swap_keyed(centers, base, i, last - 1);
        i
    }

    fn insertion_sort_range(&mut self, centers: &mut [f32], base: usize, lo: usize, hi: usize) {
        for i in (lo + 1)..hi {
            let mut j = i;
            while j > lo && centers[j].total_cmp(&centers[j - 1]).is_lt() {
                self.swap_keyed(centers, base, j, j - 1);
                j -= 1;
            }
        }
    }

    fn swap_keyed(&mut self, centers: &mut [f32], base: usize, a: usize, b: usize) {
        self.swap_records(base + a, base + b);
        centers.swap(a, b);
    }

    /// Apply an index permutation in place: the record that belongs at
    /// destination slot `i` currently sits at `from + indexes[i]`.
    ///
    /// Follows each permutation cycle once, moving every record exactly
    /// one step along its cycle through a single spare temporary, and
    /// marks visited slots with a sentinel. All parallel arrays move as
    /// one unit.
    fn permute(&mut self, indexes: &mut [usize], from: usize) {
        const DONE: usize = usize::MAX;

        let mut temp = TempTriangle::default();
        let mut cursor = 0;
        while cursor < indexes.len() {
            while indexes[cursor] == DONE {
                cursor += 1;
                if cursor >= indexes.len() {
                    return;
                }
            }

            let start = indexes[cursor];
            let mut index = start;
            temp.read_from(self, index + from);
            loop {
                let previous = index;
                index = indexes[index];
                indexes[previous] = DONE;

                if index == start {
                    temp.write_to(self, previous + from);
                    break;
                }
                self.move_record(index + from, previous + from);
            }

            cursor += 1;
        }
    }
}

/// Spare record used while rotating a permutation cycle.
#[derive(Default)]
struct TempTriangle {
    points: [f32; GEOM_STRIDE],
    uv: [f32; UV_STRIDE],
    material_id: u32,
    double_sided: bool,
}

impl TempTriangle {
    fn read_from(&mut self, store: &PackedTriangles, index: usize) {
        self.points
            .copy_from_slice(&store.points[GEOM_STRIDE * index..GEOM_STRIDE * (index + 1)]);
        self.uv
            .copy_from_slice(&store.uv[UV_STRIDE * index..UV_STRIDE * (index + 1)]);
        self.material_id = store.material_ids[index];
        self.double_sided = store.double_sided[index];
    }

    fn write_to(&self, store: &mut PackedTriangles, index: usize) {
        store.points[GEOM_STRIDE * index..GEOM_STRIDE * (index + 1)].copy_from_slice(&self.points);
        store.uv[UV_STRIDE * index..UV_STRIDE * (index + 1)].copy_from_slice(&self.uv);
        store.material_ids[index] = self.material_id;
        store.double_sided[index] = self.double_sided;
    }
}

/// Map an `f32` to a `u32` whose unsigned order matches the float's
/// total order (negatives below positives, `-0.0` below `+0.0`).
fn sortable_bits(value: f32) -> u32 {
    let bits = value.to_bits();
    if bits & 0x8000_0000 != 0 {
        !bits
    } else {
        bits ^ 0x8000_0000
    }
}

/// Unstable in-place MSD byte radix over `keys[indexes[i]]`.
///
/// American-flag permutation per digit with an explicit stack of
/// sub-ranges; small ranges finish with insertion on the raw keys.
fn radix_sort_indirect(indexes: &mut [usize], keys: &[u32]) {
    let mut stack: Vec<(usize, usize, u32)> = vec![(0, indexes.len(), 24)];

    while let Some((lo, hi, shift)) = stack.pop() {
        if hi - lo < RADIX_CUTOFF {
            insertion_by_key(indexes, keys, lo, hi);
            continue;
        }

        let digit = |index: usize| ((keys[index] >> shift) & 0xFF) as usize;

        let mut counts = [0usize; 256];
        for &index in &indexes[lo..hi] {
            counts[digit(index)] += 1;
        }

        let mut starts = [0usize; 256];
        let mut ends = [0usize; 256];
        let mut position = lo;
        for d in 0..256 {
            starts[d] = position;
            position += counts[d];
            ends[d] = position;
        }

        // Swap every element into its digit bucket.
        let mut next = starts;
        for d in 0..256 {
            while next[d] < ends[d] {
                let mut index = indexes[next[d]];
                let mut target = digit(index);
                while target != d {
                    let slot = next[target];
                    next[target] += 1;
                    std::mem::swap(&mut index, &mut indexes[slot]);
                    target = digit(index);
                }
                indexes[next[d]] = index;
                next[d] += 1;
            }
        }

        if shift > 0 {
            for d in 0..256 {
                if ends[d] - starts[d] > 1 {
                    stack.push((starts[d], ends[d], shift - 8));
                }
            }
        }
    }
}

/// Stable LSD byte radix over `keys[indexes[i]]`: four counting-sort
/// passes through a scratch array, least significant digit first.
fn radix_sort_indirect_stable(indexes: &mut Vec<usize>, keys: &[u32]) {
    let mut scratch = vec![0usize; indexes.len()];

    for shift in [0u32, 8, 16, 24] {
        let mut counts = [0usize; 256];
        for &index in indexes.iter() {
            counts[((keys[index] >> shift) & 0xFF) as usize] += 1;
        }

        let mut total = 0;
        for count in counts.iter_mut() {
            let n = *count;
            *count = total;
            total += n;
        }

        for &index in indexes.iter() {
            let d = ((keys[index] >> shift) & 0xFF) as usize;
            scratch[counts[d]] = index;
            counts[d] += 1;
        }

        std::mem::swap(indexes, &mut scratch);
    }
}

fn insertion_by_key(indexes: &mut [usize], keys: &[u32], lo: usize, hi: usize) {
    for i in (lo + 1)..hi {
        let current = indexes[i];
        let key = keys[current];
        let mut j = i;
        while j > lo && keys[indexes[j - 1]] > key {
            indexes[j] = indexes[j - 1];
            j -= 1;
        }
        indexes[j] = current;
    }
}
