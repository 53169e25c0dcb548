//! Piecewise-linear spectral envelope warping
//!
//! A warp map assigns every output bin a fractional input bin. It is
//! defined by a small set of control nodes (detected formant → target
//! formant) and anchored at both spectrum edges, so resampling an
//! envelope through it moves the formant peaks onto the targets while
//! keeping the band edges fixed.

use libm::floorf;

const DST_EPS: f32 = 1e-4;

/// One control node: output bin `dst` reads from input bin `src`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WarpingPoint {
    pub src: f32,
    pub dst: f32,
}

/// Builds and applies a per-bin warp map.
pub struct FormantWarper {
    num_bins: usize,
    nodes: Vec<WarpingPoint>,
    map: Vec<f32>,
}

impl FormantWarper {
    pub fn new(num_bins: usize) -> Self {
        Self {
            num_bins,
            nodes: Vec::with_capacity(32),
            map: vec![0.0; num_bins],
        }
    }

    /// Rebuild the map from `nodes`.
    ///
    /// Anchors are inserted when the node list does not already pin the
    /// first and last output bins, so any node list (including an empty
    /// one) produces a total map. Nodes are stably sorted by `dst`;
    /// callers are expected to pass strictly increasing `dst` values.
    pub fn build_map(&mut self, nodes: &[WarpingPoint]) {
        let top = (self.num_bins - 1) as f32;

        self.nodes.clear();
        if nodes.first().is_none_or(|p| p.dst > DST_EPS) {
            self.nodes.push(WarpingPoint { src: 0.0, dst: 0.0 });
        }
        self.nodes.extend_from_slice(nodes);
        if nodes.last().is_none_or(|p| p.dst < top) {
            self.nodes.push(WarpingPoint { src: top, dst: top });
        }

        // Stable insertion sort by dst. The node count is tiny and the
        // std stable sort allocates, which the per-frame path must not.
        for i in 1..self.nodes.len() {
            let key = self.nodes[i];
            let mut j = i;
            while j > 0 && self.nodes[j - 1].dst > key.dst {
                self.nodes[j] = self.nodes[j - 1];
                j -= 1;
            }
            self.nodes[j] = key;
        }

        let mut seg = 0;
        for (i, m) in self.map.iter_mut().enumerate() {
            let pos = i as f32;
            while seg + 2 < self.nodes.len() && self.nodes[seg + 1].dst < pos {
                seg += 1;
            }
            let p0 = self.nodes[seg];
            let p1 = self.nodes[seg + 1];

            let width = p1.dst - p0.dst;
            let src = if width < DST_EPS {
                p0.src
            } else {
                p0.src + (pos - p0.dst) / width * (p1.src - p0.src)
            };
            *m = src.clamp(0.0, top);
        }
    }

    /// Resample `src_env` through the map into `dst_env` with linear
    /// interpolation.
    pub fn apply(&self, src_env: &[f32], dst_env: &mut [f32]) {
        let last = self.num_bins - 1;
        for (m, out) in self.map.iter().zip(dst_env.iter_mut()) {
            let idx = *m;
            let i0 = floorf(idx) as usize;
            let i1 = (i0 + 1).min(last);
            let frac = idx - i0 as f32;
            *out = src_env[i0] + frac * (src_env[i1] - src_env[i0]);
        }
    }

    /// The current map, one fractional input bin per output bin.
    pub fn map(&self) -> &[f32] {
        &self.map
    }
}
