//! NBA*: bidirectional best-first search (Pijls & Post) over a [`GraphIndex`].
//!
//! Both frontiers share one closed set. A node popped from one side is only
//! expanded when neither bound proves it useless against the best meeting
//! cost found so far.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use super::GraphIndex;

/// Min-heap entry.
#[derive(Clone, Copy, Debug)]
struct OpenEntry {
    node: usize,
    f_score: f32,
}

impl PartialEq for OpenEntry {
    fn eq(&self, other: &Self) -> bool {
        self.f_score.total_cmp(&other.f_score) == Ordering::Equal && self.node == other.node
    }
}

impl Eq for OpenEntry {}

impl PartialOrd for OpenEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for OpenEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reversed for min-heap: smallest f_score is "greatest".
        other
            .f_score
            .total_cmp(&self.f_score)
            .then_with(|| other.node.cmp(&self.node))
    }
}

/// One search direction.
struct Side {
    g: Vec<f32>,
    parent: Vec<Option<usize>>,
    open: BinaryHeap<OpenEntry>,
    /// Smallest f on the open list (lower bound for the other side's pruning).
    bound: f32,
    /// Node the heuristic points at.
    goal: usize,
}

impl Side {
    fn new(index: &GraphIndex, origin: usize, goal: usize) -> Self {
        let n = index.len();
        let mut g = vec![f32::INFINITY; n];
        g[origin] = 0.0;
        let h = index.distance(origin, goal);
        let mut open = BinaryHeap::new();
        open.push(OpenEntry {
            node: origin,
            f_score: h,
        });
        Self {
            g,
            parent: vec![None; n],
            open,
            bound: h,
            goal,
        }
    }

    fn chain(&self, from: usize) -> Vec<usize> {
        let mut out = vec![from];
        let mut cur = from;
        while let Some(p) = self.parent[cur] {
            out.push(p);
            cur = p;
        }
        out
    }
}

/// Lowest-cost node path from `start` to `target` (indices into `index`).
///
/// Empty when no path exists.
pub(super) fn search(index: &GraphIndex, start: usize, target: usize) -> Vec<usize> {
    if start == target {
        return vec![start];
    }
    let n = index.len();
    let mut forward = Side::new(index, start, target);
    let mut backward = Side::new(index, target, start);
    let mut closed = vec![false; n];
    let mut best = f32::INFINITY;
    let mut meeting: Option<usize> = None;

    while !forward.open.is_empty() && !backward.open.is_empty() {
        let (this, other) = if forward.open.len() <= backward.open.len() {
            (&mut forward, &backward)
        } else {
            (&mut backward, &forward)
        };

        let Some(OpenEntry { node: x, .. }) = this.open.pop() else {
            break;
        };
        if !closed[x] {
            closed[x] = true;
            let gx = this.g[x];
            let prune = gx + index.distance(x, this.goal) >= best
                || gx + other.bound - index.distance(x, other.goal) >= best;
            if !prune {
                for &(y, cost) in index.edges(x) {
                    if closed[y] {
                        continue;
                    }
                    let tentative = gx + cost;
                    if tentative < this.g[y] {
                        this.g[y] = tentative;
                        this.parent[y] = Some(x);
                        this.open.push(OpenEntry {
                            node: y,
                            f_score: tentative + index.distance(y, this.goal),
                        });
                        let through = tentative + other.g[y];
                        if through < best {
                            best = through;
                            meeting = Some(y);
                        }
                    }
                }
            }
        }
        if let Some(top) = this.open.peek() {
            this.bound = top.f_score;
        }
    }

    let Some(m) = meeting else {
        return Vec::new();
    };
    let mut path = forward.chain(m);
    path.reverse();
    path.extend(backward.chain(m).into_iter().skip(1));
    path
}
