//! Row hydration: the per-type member cache, the coercion engine, and the
//! hydrator that combines them.

pub mod cache;
pub mod coerce;
pub mod fill;
pub mod record;

pub use cache::{FieldCache, Hydrate, Member, MemberMap};
pub use coerce::{Coercer, Coercible, CoercionEngine, SqlEnum};
pub use fill::Hydrator;
pub use record::Record;

/// Column and member names compare without regard to case, Unicode included.
pub(crate) fn names_match(a: &str, b: &str) -> bool {
    if a.is_ascii() && b.is_ascii() {
        return a.eq_ignore_ascii_case(b);
    }
    a.chars()
        .flat_map(char::to_lowercase)
        .eq(b.chars().flat_map(char::to_lowercase))
}

#[cfg(test)]
mod tests {
    use super::names_match;

    #[test]
    fn names_match_across_case() {
        assert!(names_match("UserName", "USERNAME"));
        assert!(names_match("Ärger", "äRGER"));
        assert!(names_match("ΣΟΦΙΑ", "σοφια"));
        assert!(!names_match("Id", "Ids"));
    }
}
