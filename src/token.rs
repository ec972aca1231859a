//! Separator tokens between adjacent keys.
//!
//! Branches do not store a full key for ordering. Instead they carry a short
//! byte string `t` with `min(a, b) < t <= max(a, b)`, where `a` is the largest
//! key of the left subtree and `b` the smallest key of the right one.

/// Returns the separator token strictly above the smaller input and at most
/// the larger one.
///
/// The result keeps the common prefix plus the first differing byte of the
/// larger input. When one input is a prefix of the other the whole longer
/// input is returned. Equal inputs come back unchanged.
///
/// The argument order never matters: `min_right_token(a, b) ==
/// min_right_token(b, a)`.
pub fn min_right_token(a: &[u8], b: &[u8]) -> Vec<u8> {
    let high = if a <= b { b } else { a };
    let low = if a <= b { a } else { b };

    match low.iter().zip(high).position(|(l, h)| l != h) {
        Some(index) => high[..=index].to_vec(),
        None => high.to_vec(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::{collection::vec, prelude::*};

    fn check(a: &str, b: &str, want: &str) {
        let forward = min_right_token(a.as_bytes(), b.as_bytes());
        let backward = min_right_token(b.as_bytes(), a.as_bytes());

        assert_eq!(forward, want.as_bytes(), "min_right_token({a:?}, {b:?})");
        assert_eq!(forward, backward);
    }

    #[test]
    fn test_first_byte_differs() {
        check("alphabet", "elephant", "e");
    }

    #[test]
    fn test_shared_prefix() {
        check("bird", "bingo", "bir");
    }

    #[test]
    fn test_strict_prefix_returns_longer() {
        check("bird", "birdy", "birdy");
    }

    #[test]
    fn test_empty_inputs() {
        check("", "", "");
        check("", "a", "a");
        check("", "abc", "abc");
    }

    #[test]
    fn test_long_suffix_is_dropped() {
        check("prefix/aaaaaaaaaa", "prefix/bzzzzzzzzz", "prefix/b");
    }

    #[test]
    fn test_equal_inputs_return_input() {
        check("same", "same", "same");
    }

    #[test_strategy::proptest]
    fn test_symmetry(
        #[strategy(vec(any::<u8>(), 0..20))] a: Vec<u8>,
        #[strategy(vec(any::<u8>(), 0..20))] b: Vec<u8>,
    ) {
        prop_assert_eq!(min_right_token(&a, &b), min_right_token(&b, &a));
    }

    #[test_strategy::proptest]
    fn test_separates(
        #[strategy(vec(any::<u8>(), 0..20))] a: Vec<u8>,
        #[strategy(vec(any::<u8>(), 0..20))] b: Vec<u8>,
    ) {
        let token = min_right_token(&a, &b);

        match a.cmp(&b) {
            std::cmp::Ordering::Less => {
                prop_assert!(a < token);
                prop_assert!(token <= b);
            }
            std::cmp::Ordering::Greater => {
                prop_assert!(b < token);
                prop_assert!(token <= a);
            }
            std::cmp::Ordering::Equal => prop_assert_eq!(&token, &a),
        }
    }

    #[test_strategy::proptest]
    fn test_is_minimal(
        #[strategy(vec(0u8..4, 0..8))] a: Vec<u8>,
        #[strategy(vec(0u8..4, 0..8))] b: Vec<u8>,
    ) {
        prop_assume!(a != b);
        let token = min_right_token(&a, &b);
        let (low, high) = if a < b { (&a, &b) } else { (&b, &a) };
        prop_assume!(!high.starts_with(low));

        // no strictly shorter prefix of the larger key separates the pair
        for len in 0..token.len() {
            let shorter = &high[..len];
            prop_assert!(shorter <= low.as_slice());
        }
    }
}
