//! Shrinking heuristic implementation
//!
//! Variables that sit at a bound and whose gradient says they would only be
//! pushed further into it are dropped from the active set. Their gradients go
//! stale while they are out; `reconstruct_gradient` rebuilds them from
//! `g_bar` before the solver declares convergence.

use crate::solver::smo::{SMOSolver, Variant};

impl<'q, 'a> SMOSolver<'q, 'a> {
    pub(crate) fn do_shrinking(&mut self) {
        match self.variant {
            Variant::Standard => self.do_shrinking_standard(),
            Variant::Nu => self.do_shrinking_nu(),
        }
    }

    fn do_shrinking_standard(&mut self) {
        // gmax1 = max { -y_i * grad(f)_i | i in I_up }
        // gmax2 = max {  y_i * grad(f)_i | i in I_low }
        let mut gmax1 = f64::NEG_INFINITY;
        let mut gmax2 = f64::NEG_INFINITY;

        for &i in &self.active {
            let g = self.g[i];
            if self.y[i] == 1 {
                if !self.is_upper_bound(i) && -g >= gmax1 {
                    gmax1 = -g;
                }
                if !self.is_lower_bound(i) && g >= gmax2 {
                    gmax2 = g;
                }
            } else {
                if !self.is_upper_bound(i) && -g >= gmax2 {
                    gmax2 = -g;
                }
                if !self.is_lower_bound(i) && g >= gmax1 {
                    gmax1 = g;
                }
            }
        }

        if !self.unshrink && gmax1 + gmax2 <= self.settings.eps * 10.0 {
            self.unshrink = true;
            self.reconstruct_gradient();
            self.activate_all();
        }

        let mut active = std::mem::take(&mut self.active);
        active.retain(|&i| !self.be_shrunk_standard(i, gmax1, gmax2));
        self.active = active;
    }

    fn be_shrunk_standard(&self, i: usize, gmax1: f64, gmax2: f64) -> bool {
        let g = self.g[i];
        if self.is_upper_bound(i) {
            if self.y[i] == 1 {
                -g > gmax1
            } else {
                -g > gmax2
            }
        } else if self.is_lower_bound(i) {
            if self.y[i] == 1 {
                g > gmax2
            } else {
                g > gmax1
            }
        } else {
            false
        }
    }

    fn do_shrinking_nu(&mut self) {
        let mut gmax1 = f64::NEG_INFINITY; // max { -y_i * grad(f)_i | y_i = +1, i in I_up }
        let mut gmax2 = f64::NEG_INFINITY; // max {  y_i * grad(f)_i | y_i = +1, i in I_low }
        let mut gmax3 = f64::NEG_INFINITY; // max { -y_i * grad(f)_i | y_i = -1, i in I_up }
        let mut gmax4 = f64::NEG_INFINITY; // max {  y_i * grad(f)_i | y_i = -1, i in I_low }

        for &i in &self.active {
            let g = self.g[i];
            if !self.is_upper_bound(i) {
                if self.y[i] == 1 {
                    gmax1 = gmax1.max(-g);
                } else {
                    gmax4 = gmax4.max(-g);
                }
            }
            if !self.is_lower_bound(i) {
                if self.y[i] == 1 {
                    gmax2 = gmax2.max(g);
                } else {
                    gmax3 = gmax3.max(g);
                }
            }
        }

        if !self.unshrink && (gmax1 + gmax2).max(gmax3 + gmax4) <= self.settings.eps * 10.0 {
            self.unshrink = true;
            self.reconstruct_gradient();
            self.activate_all();
        }

        let mut active = std::mem::take(&mut self.active);
        active.retain(|&i| !self.be_shrunk_nu(i, [gmax1, gmax2, gmax3, gmax4]));
        self.active = active;
    }

    fn be_shrunk_nu(&self, i: usize, [gmax1, gmax2, gmax3, gmax4]: [f64; 4]) -> bool {
        let g = self.g[i];
        if self.is_upper_bound(i) {
            if self.y[i] == 1 {
                -g > gmax1
            } else {
                -g > gmax4
            }
        } else if self.is_lower_bound(i) {
            if self.y[i] == 1 {
                g > gmax2
            } else {
                g > gmax3
            }
        } else {
            false
        }
    }

    /// Recompute the gradient of every inactive variable
    pub(crate) fn reconstruct_gradient(&mut self) {
        let l = self.alpha.len();
        let active_size = self.active.len();
        if active_size == l {
            return;
        }

        let mut in_active = vec![false; l];
        for &i in &self.active {
            in_active[i] = true;
        }
        let inactive: Vec<usize> = (0..l).filter(|&i| !in_active[i]).collect();

        for &j in &inactive {
            self.g[j] = self.g_bar[j] + self.p[j];
        }

        let free: Vec<usize> = self
            .active
            .iter()
            .copied()
            .filter(|&i| self.is_free(i))
            .collect();

        if 2 * free.len() < active_size {
            self.log
                .emit(format_args!("WARNING: using -h 0 may be faster"));
        }

        if free.len() * l > 2 * active_size * (l - active_size) {
            for &i in &inactive {
                let q_i = self.q.row(i);
                let sum: f64 = free.iter().map(|&j| self.alpha[j] * q_i[j]).sum();
                self.g[i] += sum;
            }
        } else {
            for &i in &free {
                let q_i = self.q.row(i);
                let alpha_i = self.alpha[i];
                for &j in &inactive {
                    self.g[j] += alpha_i * q_i[j];
                }
            }
        }
    }
}
