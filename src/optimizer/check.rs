//! Parameter validation
//!
//! Mirrors the checks a libsvm-compatible engine performs before training.
//! Messages are returned verbatim to the caller, so their wording is part of
//! the public behavior.

use crate::core::{KernelType, Parameters, Problem, SVMType};
use crate::optimizer::train::group_classes;

pub(crate) fn check_parameter(problem: &Problem, params: &Parameters) -> Result<(), String> {
    let svm_type = params.svm_type;

    if params.kernel_type.uses_gamma() && params.gamma < 0.0 {
        return Err("gamma < 0".to_string());
    }
    if params.kernel_type == KernelType::Polynomial && params.degree < 0 {
        return Err("degree of polynomial kernel < 0".to_string());
    }

    if params.cache_size <= 0.0 || params.cache_size.is_nan() {
        return Err("cache_size <= 0".to_string());
    }
    if params.eps <= 0.0 || params.eps.is_nan() {
        return Err("eps <= 0".to_string());
    }

    if matches!(
        svm_type,
        SVMType::CSvc | SVMType::EpsilonSvr | SVMType::NuSvr
    ) && (params.c <= 0.0 || params.c.is_nan())
    {
        return Err("C <= 0".to_string());
    }

    if matches!(svm_type, SVMType::NuSvc | SVMType::OneClass | SVMType::NuSvr)
        && !(params.nu > 0.0 && params.nu <= 1.0)
    {
        return Err("nu <= 0 or nu > 1".to_string());
    }

    if svm_type == SVMType::EpsilonSvr && (params.p < 0.0 || params.p.is_nan()) {
        return Err("p < 0".to_string());
    }

    if params.probability && svm_type == SVMType::OneClass {
        return Err("one-class SVM probability output not supported yet".to_string());
    }

    // every pair of classes must be able to hold nu * (n_i + n_j) / 2 multipliers
    if svm_type == SVMType::NuSvc {
        let groups = group_classes(problem.labels());
        for (i, &n1) in groups.count.iter().enumerate() {
            for &n2 in &groups.count[i + 1..] {
                if params.nu * (n1 + n2) as f64 / 2.0 > n1.min(n2) as f64 {
                    return Err("specified nu is infeasible".to_string());
                }
            }
        }
    }

    Ok(())
}
