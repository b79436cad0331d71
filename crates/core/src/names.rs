//! Metric naming
//!
//! Every instrumented name `n` owns a fixed family of derived names:
//!
//! | Name | Kind |
//! |------|------|
//! | `n` | timer |
//! | `n.errors` | meter |
//! | `n.inFlight` | counter |
//! | `n.total` | meter (extended mode) |
//! | `n.success` | meter (extended mode) |
//! | `n.errors.{total,mean,m1,m5,m15}_pct` | gauge |

use crate::gauges::RateAccessor;

/// Suffix of the error meter
pub const ERRORS: &str = "errors";
/// Suffix of the in-flight counter
pub const IN_FLIGHT: &str = "inFlight";
/// Suffix of the started-calls meter
pub const TOTAL: &str = "total";
/// Suffix of the successful-calls meter
pub const SUCCESS: &str = "success";

/// Join `base` and `parts` with `.`, skipping empty segments
///
/// ```rust
/// use instrumentor_core::names;
///
/// assert_eq!(names::name("svc", &["op", "", "errors"]), "svc.op.errors");
/// ```
pub fn name(base: &str, parts: &[&str]) -> String {
    let mut joined = String::with_capacity(
        base.len() + parts.iter().map(|part| part.len() + 1).sum::<usize>(),
    );
    for segment in std::iter::once(&base).chain(parts.iter()) {
        if segment.is_empty() {
            continue;
        }
        if !joined.is_empty() {
            joined.push('.');
        }
        joined.push_str(segment);
    }
    joined
}

/// `<type path>.<method>` with `::` path separators rewritten to `.`
pub fn for_method<T: ?Sized>(method: &str) -> String {
    name(&std::any::type_name::<T>().replace("::", "."), &[method])
}

/// `<base>.errors`
pub fn errors(base: &str) -> String {
    name(base, &[ERRORS])
}

/// `<base>.inFlight`
pub fn in_flight(base: &str) -> String {
    name(base, &[IN_FLIGHT])
}

/// `<base>.total`
pub fn total(base: &str) -> String {
    name(base, &[TOTAL])
}

/// `<base>.success`
pub fn success(base: &str) -> String {
    name(base, &[SUCCESS])
}

/// Name of the error-ratio gauge for `accessor`, e.g. `svc.op.errors.m15_pct`
pub fn error_ratio(base: &str, accessor: RateAccessor) -> String {
    name(base, &[ERRORS, accessor.suffix()])
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Checkout;

    #[test]
    fn test_name_skips_empty_segments() {
        assert_eq!(name("svc.op", &[]), "svc.op");
        assert_eq!(name("", &["op"]), "op");
        assert_eq!(name("svc", &["", "op", ""]), "svc.op");
        assert_eq!(name("", &[]), "");
    }

    #[test]
    fn test_derived_names() {
        assert_eq!(errors("svc.op"), "svc.op.errors");
        assert_eq!(in_flight("svc.op"), "svc.op.inFlight");
        assert_eq!(total("svc.op"), "svc.op.total");
        assert_eq!(success("svc.op"), "svc.op.success");
        assert_eq!(error_ratio("svc.op", RateAccessor::Count), "svc.op.errors.total_pct");
        assert_eq!(
            error_ratio("svc.op", RateAccessor::FifteenMinute),
            "svc.op.errors.m15_pct"
        );
    }

    #[test]
    fn test_for_method_uses_type_path() {
        let generated = for_method::<Checkout>("submit");
        assert!(generated.ends_with(".Checkout.submit"), "{generated}");
        assert!(!generated.contains("::"));
        assert!(generated.starts_with("instrumentor_core.names"));
    }
}
