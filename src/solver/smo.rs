//! Sequential Minimal Optimization (SMO) solver implementation
//!
//! Each iteration picks the maximal-violating variable `i` and, among the
//! candidates that can move against it, the `j` with the largest guaranteed
//! decrease of the objective (second-order working set selection). The pair
//! is then optimized analytically and the gradient updated.
//!
//! The nu formulations carry an extra equality constraint; for them the pair
//! is always drawn from one class (`Variant::Nu`).

use crate::core::OptimizationResult;
use crate::solver::{QMatrix, SolverLog};
use std::rc::Rc;

/// Lower bound on the curvature used when a pair's quadratic coefficient is not positive
pub(crate) const TAU: f64 = 1e-12;

/// Which equality constraints the dual carries
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Variant {
    /// `y^T a = delta` only
    Standard,
    /// additionally `e^T a` fixed per class
    Nu,
}

/// Knobs for one solve
#[derive(Debug, Clone, Copy)]
pub struct SolverSettings {
    /// Upper bound for variables with `y = +1`
    pub cp: f64,
    /// Upper bound for variables with `y = -1`
    pub cn: f64,
    /// Stopping tolerance on the maximal violation
    pub eps: f64,
    pub shrinking: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum AlphaStatus {
    LowerBound,
    UpperBound,
    Free,
}

/// SMO solver state for one quadratic program
///
/// Variables are never reordered; shrinking only narrows `active`, the list of
/// indices the inner loops visit.
pub struct SMOSolver<'q, 'a> {
    pub(crate) q: &'q mut QMatrix<'a>,
    pub(crate) qd: Vec<f64>,
    pub(crate) y: Vec<i8>,
    pub(crate) p: Vec<f64>,
    pub(crate) alpha: Vec<f64>,
    pub(crate) status: Vec<AlphaStatus>,
    pub(crate) g: Vec<f64>,
    /// Gradient contribution of variables sitting at their upper bound
    pub(crate) g_bar: Vec<f64>,
    pub(crate) active: Vec<usize>,
    pub(crate) unshrink: bool,
    pub(crate) settings: SolverSettings,
    pub(crate) variant: Variant,
    pub(crate) log: &'q SolverLog,
}

impl<'q, 'a> SMOSolver<'q, 'a> {
    /// Solve the dual starting from the feasible point `alpha`.
    ///
    /// `p` is the linear term and `y` the `±1` sign of every variable.
    pub fn solve(
        q: &'q mut QMatrix<'a>,
        p: &[f64],
        y: &[i8],
        alpha: Vec<f64>,
        settings: SolverSettings,
        variant: Variant,
        log: &'q SolverLog,
    ) -> OptimizationResult {
        let l = q.len();
        debug_assert_eq!(p.len(), l);
        debug_assert_eq!(y.len(), l);
        debug_assert_eq!(alpha.len(), l);

        let qd = q.diagonal().to_vec();
        let mut solver = SMOSolver {
            q,
            qd,
            y: y.to_vec(),
            p: p.to_vec(),
            alpha,
            status: vec![AlphaStatus::LowerBound; l],
            g: p.to_vec(),
            g_bar: vec![0.0; l],
            active: (0..l).collect(),
            unshrink: false,
            settings,
            variant,
            log,
        };
        solver.initialize();
        solver.optimize()
    }

    pub(crate) fn upper_bound(&self, i: usize) -> f64 {
        if self.y[i] > 0 {
            self.settings.cp
        } else {
            self.settings.cn
        }
    }

    fn update_alpha_status(&mut self, i: usize) {
        let c = self.upper_bound(i);
        self.status[i] = if self.alpha[i] >= c {
            AlphaStatus::UpperBound
        } else if self.alpha[i] <= 0.0 {
            AlphaStatus::LowerBound
        } else {
            AlphaStatus::Free
        };
    }

    pub(crate) fn is_upper_bound(&self, i: usize) -> bool {
        self.status[i] == AlphaStatus::UpperBound
    }

    pub(crate) fn is_lower_bound(&self, i: usize) -> bool {
        self.status[i] == AlphaStatus::LowerBound
    }

    pub(crate) fn is_free(&self, i: usize) -> bool {
        self.status[i] == AlphaStatus::Free
    }

    fn initialize(&mut self) {
        let l = self.alpha.len();
        for i in 0..l {
            self.update_alpha_status(i);
        }

        for i in 0..l {
            if self.is_lower_bound(i) {
                continue;
            }
            let q_i = self.q.row(i);
            let alpha_i = self.alpha[i];
            for (g, &q) in self.g.iter_mut().zip(q_i.iter()) {
                *g += alpha_i * q;
            }
            if self.is_upper_bound(i) {
                let c_i = self.upper_bound(i);
                for (g_bar, &q) in self.g_bar.iter_mut().zip(q_i.iter()) {
                    *g_bar += c_i * q;
                }
            }
        }
    }

    fn optimize(mut self) -> OptimizationResult {
        let l = self.alpha.len();
        let max_iter = (100usize.saturating_mul(l)).max(10_000_000);
        let mut counter = l.min(1000) + 1;
        let mut iter = 0;

        while iter < max_iter {
            counter -= 1;
            if counter == 0 {
                counter = l.min(1000);
                if self.settings.shrinking {
                    self.do_shrinking();
                }
            }

            let (i, j) = match self.select_working_set() {
                Some(pair) => pair,
                None => {
                    // Converged on the shrunk problem; recheck on everything
                    self.reconstruct_gradient();
                    self.activate_all();
                    match self.select_working_set() {
                        Some(pair) => {
                            counter = 1;
                            pair
                        }
                        None => break,
                    }
                }
            };

            iter += 1;
            self.update_pair(i, j);
        }

        if iter >= max_iter {
            if self.active.len() < l {
                self.reconstruct_gradient();
                self.activate_all();
            }
            self.log
                .emit(format_args!("WARNING: reaching max number of iterations"));
        }

        let (rho, r) = self.calculate_rho();
        let objective_value = self
            .alpha
            .iter()
            .zip(self.g.iter().zip(&self.p))
            .map(|(&a, (&g, &p))| a * (g + p))
            .sum::<f64>()
            / 2.0;

        self.log
            .emit(format_args!("optimization finished, #iter = {iter}"));

        OptimizationResult {
            alpha: self.alpha,
            rho,
            objective_value,
            upper_bound_p: self.settings.cp,
            upper_bound_n: self.settings.cn,
            r,
            iterations: iter,
        }
    }

    pub(crate) fn activate_all(&mut self) {
        self.active = (0..self.alpha.len()).collect();
    }

    fn select_working_set(&mut self) -> Option<(usize, usize)> {
        match self.variant {
            Variant::Standard => self.select_working_set_standard(),
            Variant::Nu => self.select_working_set_nu(),
        }
    }

    fn select_working_set_standard(&mut self) -> Option<(usize, usize)> {
        let mut gmax = f64::NEG_INFINITY;
        let mut gmax2 = f64::NEG_INFINITY;
        let mut gmax_idx = None;

        for &t in &self.active {
            if self.y[t] == 1 {
                if !self.is_upper_bound(t) && -self.g[t] >= gmax {
                    gmax = -self.g[t];
                    gmax_idx = Some(t);
                }
            } else if !self.is_lower_bound(t) && self.g[t] >= gmax {
                gmax = self.g[t];
                gmax_idx = Some(t);
            }
        }

        let i = gmax_idx?;
        let q_i = self.q.row(i);
        let yi = f64::from(self.y[i]);

        let mut gmin_idx = None;
        let mut obj_diff_min = f64::INFINITY;

        for &j in &self.active {
            if self.y[j] == 1 {
                if !self.is_lower_bound(j) {
                    let grad_diff = gmax + self.g[j];
                    if self.g[j] >= gmax2 {
                        gmax2 = self.g[j];
                    }
                    if grad_diff > 0.0 {
                        let quad = self.qd[i] + self.qd[j] - 2.0 * yi * q_i[j];
                        let obj_diff = -(grad_diff * grad_diff) / positive_or_tau(quad);
                        if obj_diff <= obj_diff_min {
                            gmin_idx = Some(j);
                            obj_diff_min = obj_diff;
                        }
                    }
                }
            } else if !self.is_upper_bound(j) {
                let grad_diff = gmax - self.g[j];
                if -self.g[j] >= gmax2 {
                    gmax2 = -self.g[j];
                }
                if grad_diff > 0.0 {
                    let quad = self.qd[i] + self.qd[j] + 2.0 * yi * q_i[j];
                    let obj_diff = -(grad_diff * grad_diff) / positive_or_tau(quad);
                    if obj_diff <= obj_diff_min {
                        gmin_idx = Some(j);
                        obj_diff_min = obj_diff;
                    }
                }
            }
        }

        if gmax + gmax2 < self.settings.eps {
            return None;
        }
        gmin_idx.map(|j| (i, j))
    }

    fn select_working_set_nu(&mut self) -> Option<(usize, usize)> {
        let mut gmaxp = f64::NEG_INFINITY;
        let mut gmaxp2 = f64::NEG_INFINITY;
        let mut gmaxp_idx = None;
        let mut gmaxn = f64::NEG_INFINITY;
        let mut gmaxn2 = f64::NEG_INFINITY;
        let mut gmaxn_idx = None;

        for &t in &self.active {
            if self.y[t] == 1 {
                if !self.is_upper_bound(t) && -self.g[t] >= gmaxp {
                    gmaxp = -self.g[t];
                    gmaxp_idx = Some(t);
                }
            } else if !self.is_lower_bound(t) && self.g[t] >= gmaxn {
                gmaxn = self.g[t];
                gmaxn_idx = Some(t);
            }
        }

        let q_ip: Option<Rc<[f64]>> = gmaxp_idx.map(|ip| self.q.row(ip));
        let q_in: Option<Rc<[f64]>> = gmaxn_idx.map(|in_| self.q.row(in_));

        let mut gmin_idx = None;
        let mut obj_diff_min = f64::INFINITY;

        for &j in &self.active {
            if self.y[j] == 1 {
                if !self.is_lower_bound(j) {
                    let grad_diff = gmaxp + self.g[j];
                    if self.g[j] >= gmaxp2 {
                        gmaxp2 = self.g[j];
                    }
                    if let (true, Some(ip), Some(q_ip)) = (grad_diff > 0.0, gmaxp_idx, &q_ip) {
                        let quad = self.qd[ip] + self.qd[j] - 2.0 * q_ip[j];
                        let obj_diff = -(grad_diff * grad_diff) / positive_or_tau(quad);
                        if obj_diff <= obj_diff_min {
                            gmin_idx = Some(j);
                            obj_diff_min = obj_diff;
                        }
                    }
                }
            } else if !self.is_upper_bound(j) {
                let grad_diff = gmaxn - self.g[j];
                if -self.g[j] >= gmaxn2 {
                    gmaxn2 = -self.g[j];
                }
                if let (true, Some(in_), Some(q_in)) = (grad_diff > 0.0, gmaxn_idx, &q_in) {
                    let quad = self.qd[in_] + self.qd[j] - 2.0 * q_in[j];
                    let obj_diff = -(grad_diff * grad_diff) / positive_or_tau(quad);
                    if obj_diff <= obj_diff_min {
                        gmin_idx = Some(j);
                        obj_diff_min = obj_diff;
                    }
                }
            }
        }

        if (gmaxp + gmaxp2).max(gmaxn + gmaxn2) < self.settings.eps {
            return None;
        }
        let j = gmin_idx?;
        let i = if self.y[j] == 1 { gmaxp_idx? } else { gmaxn_idx? };
        Some((i, j))
    }

    /// Optimize the pair analytically and update the gradients
    fn update_pair(&mut self, i: usize, j: usize) {
        let q_i = self.q.row(i);
        let q_j = self.q.row(j);

        let c_i = self.upper_bound(i);
        let c_j = self.upper_bound(j);
        let old_alpha_i = self.alpha[i];
        let old_alpha_j = self.alpha[j];

        if self.y[i] != self.y[j] {
            let quad = positive_or_tau(self.qd[i] + self.qd[j] + 2.0 * q_i[j]);
            let delta = (-self.g[i] - self.g[j]) / quad;
            let diff = self.alpha[i] - self.alpha[j];
            self.alpha[i] += delta;
            self.alpha[j] += delta;

            if diff > 0.0 {
                if self.alpha[j] < 0.0 {
                    self.alpha[j] = 0.0;
                    self.alpha[i] = diff;
                }
            } else if self.alpha[i] < 0.0 {
                self.alpha[i] = 0.0;
                self.alpha[j] = -diff;
            }

            if diff > c_i - c_j {
                if self.alpha[i] > c_i {
                    self.alpha[i] = c_i;
                    self.alpha[j] = c_i - diff;
                }
            } else if self.alpha[j] > c_j {
                self.alpha[j] = c_j;
                self.alpha[i] = c_j + diff;
            }
        } else {
            let quad = positive_or_tau(self.qd[i] + self.qd[j] - 2.0 * q_i[j]);
            let delta = (self.g[i] - self.g[j]) / quad;
            let sum = self.alpha[i] + self.alpha[j];
            self.alpha[i] -= delta;
            self.alpha[j] += delta;

            if sum > c_i {
                if self.alpha[i] > c_i {
                    self.alpha[i] = c_i;
                    self.alpha[j] = sum - c_i;
                }
            } else if self.alpha[j] < 0.0 {
                self.alpha[j] = 0.0;
                self.alpha[i] = sum;
            }

            if sum > c_j {
                if self.alpha[j] > c_j {
                    self.alpha[j] = c_j;
                    self.alpha[i] = sum - c_j;
                }
            } else if self.alpha[i] < 0.0 {
                self.alpha[i] = 0.0;
                self.alpha[j] = sum;
            }
        }

        let delta_i = self.alpha[i] - old_alpha_i;
        let delta_j = self.alpha[j] - old_alpha_j;

        for &k in &self.active {
            self.g[k] += q_i[k] * delta_i + q_j[k] * delta_j;
        }

        let was_upper_i = self.is_upper_bound(i);
        let was_upper_j = self.is_upper_bound(j);
        self.update_alpha_status(i);
        self.update_alpha_status(j);

        if was_upper_i != self.is_upper_bound(i) {
            let c = if was_upper_i { -c_i } else { c_i };
            for (g_bar, &q) in self.g_bar.iter_mut().zip(q_i.iter()) {
                *g_bar += c * q;
            }
        }
        if was_upper_j != self.is_upper_bound(j) {
            let c = if was_upper_j { -c_j } else { c_j };
            for (g_bar, &q) in self.g_bar.iter_mut().zip(q_j.iter()) {
                *g_bar += c * q;
            }
        }
    }

    /// Offset of the decision function, plus `r` for the nu formulation
    fn calculate_rho(&self) -> (f64, f64) {
        match self.variant {
            Variant::Standard => (self.calculate_rho_standard(), 0.0),
            Variant::Nu => self.calculate_rho_nu(),
        }
    }

    fn calculate_rho_standard(&self) -> f64 {
        let mut upper = f64::INFINITY;
        let mut lower = f64::NEG_INFINITY;
        let mut nr_free = 0usize;
        let mut sum_free = 0.0;

        for &i in &self.active {
            let yg = f64::from(self.y[i]) * self.g[i];

            if self.is_upper_bound(i) {
                if self.y[i] == -1 {
                    upper = upper.min(yg);
                } else {
                    lower = lower.max(yg);
                }
            } else if self.is_lower_bound(i) {
                if self.y[i] == 1 {
                    upper = upper.min(yg);
                } else {
                    lower = lower.max(yg);
                }
            } else {
                nr_free += 1;
                sum_free += yg;
            }
        }

        if nr_free > 0 {
            sum_free / nr_free as f64
        } else {
            (upper + lower) / 2.0
        }
    }

    fn calculate_rho_nu(&self) -> (f64, f64) {
        // index 0 collects y = +1, index 1 collects y = -1
        let mut upper = [f64::INFINITY; 2];
        let mut lower = [f64::NEG_INFINITY; 2];
        let mut nr_free = [0usize; 2];
        let mut sum_free = [0.0; 2];

        for &i in &self.active {
            let side = usize::from(self.y[i] != 1);
            let g = self.g[i];

            if self.is_upper_bound(i) {
                lower[side] = lower[side].max(g);
            } else if self.is_lower_bound(i) {
                upper[side] = upper[side].min(g);
            } else {
                nr_free[side] += 1;
                sum_free[side] += g;
            }
        }

        let side_value = |side: usize| {
            if nr_free[side] > 0 {
                sum_free[side] / nr_free[side] as f64
            } else {
                (upper[side] + lower[side]) / 2.0
            }
        };
        let r1 = side_value(0);
        let r2 = side_value(1);

        ((r1 - r2) / 2.0, (r1 + r2) / 2.0)
    }
}

fn positive_or_tau(quad: f64) -> f64 {
    if quad > 0.0 {
        quad
    } else {
        TAU
    }
}
