//! Multistage VQ beam search (C9), matching `mbest.c`.
//!
//! `MbestList` keeps the `B` best `(accumulated_cost, index_path)` candidates
//! sorted ascending by cost, exactly as `mbest_insert()` does: a linear scan
//! finds the insertion point, the tail shifts down, and anything worse than
//! the current last entry is rejected before the insert is attempted.

pub const MBEST_STAGES: usize = 4;

#[derive(Debug, Clone)]
pub struct MbestEntry {
    pub index: [usize; MBEST_STAGES],
    pub error: f32,
}

impl MbestEntry {
    fn worst() -> Self {
        Self {
            index: [0; MBEST_STAGES],
            error: f32::MAX,
        }
    }
}

/// Sorted beam of the `entries` best candidates seen so far.
#[derive(Debug, Clone)]
pub struct MbestList {
    list: Vec<MbestEntry>,
}

impl MbestList {
    pub fn new(entries: usize) -> Self {
        assert!(entries > 0);
        Self {
            list: vec![MbestEntry::worst(); entries],
        }
    }

    /// Current worst (highest) error retained in the beam.
    pub fn worst_error(&self) -> f32 {
        self.list.last().expect("non-empty beam").error
    }

    /// Insert a candidate path. Ignored if it is no better than the
    /// current worst survivor, matching `mbest_search`'s early-reject.
    pub fn insert(&mut self, index: [usize; MBEST_STAGES], error: f32) {
        if error >= self.worst_error() {
            return;
        }
        let pos = self
            .list
            .iter()
            .position(|e| error < e.error)
            .unwrap_or(self.list.len());
        self.list.insert(pos, MbestEntry { index, error });
        self.list.pop();
    }

    pub fn entries(&self) -> &[MbestEntry] {
        &self.list
    }

    pub fn best(&self) -> &MbestEntry {
        &self.list[0]
    }
}

/// Search `target` (length `k`) against a flat codebook of `m` entries
/// (each `k` floats), inserting every candidate into `mbest`. `stage`
/// selects which slot of the index path this codebook fills in; earlier
/// slots (the prefix) are supplied by the caller via `prefix`.
///
/// Weights are expected to already be folded into both `cb` and `target`
/// by the caller (pre-multiplying once), matching the comment in
/// `mbest_search()` in `mbest.c` — the hot loop here is a plain sum of
/// squared differences.
pub fn mbest_search(
    cb: &[f32],
    target: &[f32],
    k: usize,
    m: usize,
    mbest: &mut MbestList,
    stage: usize,
    prefix: [usize; MBEST_STAGES],
) {
    debug_assert_eq!(target.len(), k);
    debug_assert!(cb.len() >= m * k);
    for j in 0..m {
        let row = &cb[j * k..j * k + k];
        let mut e = 0.0f32;
        for i in 0..k {
            let diff = row[i] - target[i];
            e += diff * diff;
        }
        if e < mbest.worst_error() {
            let mut idx = prefix;
            idx[stage] = j;
            mbest.insert(idx, e);
        }
    }
}

/// Subtract the codebook row chosen at `index` from `target`, producing
/// the residual target for the next VQ stage.
pub fn residual(target: &[f32], cb: &[f32], k: usize, index: usize) -> Vec<f32> {
    let row = &cb[index * k..index * k + k];
    target.iter().zip(row).map(|(t, c)| t - c).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cb_1d(values: &[f32]) -> Vec<f32> {
        values.to_vec()
    }

    #[test]
    fn finds_exact_match_as_best() {
        let cb = cb_1d(&[0.0, 5.0, 10.0, -3.0]);
        let target = [10.0f32];
        let mut mbest = MbestList::new(2);
        mbest_search(&cb, &target, 1, 4, &mut mbest, 0, [0; MBEST_STAGES]);
        assert_eq!(mbest.best().index[0], 2);
        assert!(mbest.best().error.abs() < 1e-6);
    }

    #[test]
    fn beam_stays_sorted_ascending() {
        let cb = cb_1d(&[1.0, 2.0, 3.0, 4.0, 100.0]);
        let target = [0.0f32];
        let mut mbest = MbestList::new(3);
        mbest_search(&cb, &target, 1, 5, &mut mbest, 0, [0; MBEST_STAGES]);
        let errs: Vec<f32> = mbest.entries().iter().map(|e| e.error).collect();
        for w in errs.windows(2) {
            assert!(w[0] <= w[1]);
        }
        assert_eq!(mbest.best().index[0], 0);
    }

    #[test]
    fn two_stage_search_accumulates_residual() {
        let cb1 = cb_1d(&[0.0, 10.0]);
        let cb2 = cb_1d(&[0.0, 1.0, 2.0]);
        let target = [11.0f32];

        let mut stage1 = MbestList::new(2);
        mbest_search(&cb1, &target, 1, 2, &mut stage1, 0, [0; MBEST_STAGES]);
        let best1 = stage1.best().index[0];
        let resid = residual(&target, &cb1, 1, best1);

        let mut stage2 = MbestList::new(2);
        mbest_search(&cb2, &resid, 1, 3, &mut stage2, 1, [best1, 0, 0, 0]);
        assert_eq!(stage2.best().index[0], best1);
        assert_eq!(stage2.best().index[1], 1); // residual 1.0 matches cb2[1]
    }
}
