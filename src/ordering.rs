//! Fractional ranking keys for note blocks.
//!
//! Blocks are ordered by a string key compared lexicographically. Keys are
//! base-36 fraction digits (`0-9a-z`), so `"i"` sits halfway between the
//! start and end of the keyspace and `"i" < "r" < "v"`. [`key_between`]
//! always produces a key strictly between its neighbours, growing the key
//! by one digit only when the gap is exhausted. This replaces integer
//! midpoint-and-truncate ordering, which collides after two insertions at
//! the same position.
//!
//! Generated keys never end in `'0'`, so no key is a zero-padded alias of
//! a shorter one.

const BASE: usize = 36;
const DIGITS: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";

fn digit_value(c: u8) -> usize {
    match c {
        b'0'..=b'9' => (c - b'0') as usize,
        b'a'..=b'z' => (c - b'a' + 10) as usize,
        _ => 0,
    }
}

fn encode(digits: &[usize]) -> String {
    digits.iter().map(|&d| DIGITS[d] as char).collect()
}

/// Compute a key strictly between `before` and `after`.
///
/// `None` for `before` means the start of the keyspace, `None` for `after`
/// means the end. When both bounds are given, `before` must sort strictly
/// below `after`; the result then satisfies `before < key < after` under
/// byte-wise comparison.
pub fn key_between(before: Option<&str>, after: Option<&str>) -> String {
    let a: Vec<usize> = before.unwrap_or("").bytes().map(digit_value).collect();
    let b: Option<Vec<usize>> = after.map(|s| s.bytes().map(digit_value).collect());

    let mut out: Vec<usize> = Vec::new();
    let mut i = 0;
    loop {
        let da = a.get(i).copied().unwrap_or(0);
        // Past the end of `after` (or no upper bound at all) the effective
        // digit is BASE, one above the largest real digit.
        let db = match &b {
            Some(bd) => bd.get(i).copied().unwrap_or(BASE),
            None => BASE,
        };

        if db > da + 1 {
            // Room at this position: take the midpoint digit and stop.
            out.push((da + db) / 2);
            return encode(&out);
        }
        if da == db {
            // Common prefix so far.
            out.push(da);
            i += 1;
            continue;
        }

        // Adjacent digits: keep the lower one, then find a suffix strictly
        // above the rest of `before` with no upper bound.
        out.push(da);
        i += 1;
        loop {
            let dai = a.get(i).copied().unwrap_or(0);
            if dai + 1 < BASE {
                out.push((dai + BASE) / 2);
                return encode(&out);
            }
            out.push(dai);
            i += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_key_is_mid_keyspace() {
        assert_eq!(key_between(None, None), "i");
    }

    #[test]
    fn append_produces_ascending_keys() {
        let k1 = key_between(None, None);
        let k2 = key_between(Some(&k1), None);
        let k3 = key_between(Some(&k2), None);
        assert!(k1 < k2);
        assert!(k2 < k3);
    }

    #[test]
    fn key_lands_strictly_between_neighbours() {
        let k = key_between(Some("i"), Some("r"));
        assert!("i" < k.as_str());
        assert!(k.as_str() < "r");
    }

    #[test]
    fn adjacent_digits_grow_the_key() {
        let k = key_between(Some("i"), Some("j"));
        assert!("i" < k.as_str());
        assert!(k.as_str() < "j");
        assert!(k.len() > 1);
    }

    #[test]
    fn repeated_insertion_at_same_position_never_collides() {
        // Keep inserting right after the lower bound; every key must be
        // fresh and strictly ordered. This is the case the old integer
        // scheme failed: floor(a + 0.5) collides immediately.
        let low = key_between(None, None);
        let mut high = key_between(Some(&low), None);
        let mut seen = std::collections::HashSet::new();
        seen.insert(low.clone());
        seen.insert(high.clone());
        for _ in 0..200 {
            let k = key_between(Some(&low), Some(&high));
            assert!(low < k && k < high, "{low} < {k} < {high} violated");
            assert!(seen.insert(k.clone()), "collision on {k}");
            high = k;
        }
    }

    #[test]
    fn insertion_before_first_key_works() {
        let first = key_between(None, None);
        let k = key_between(None, Some(&first));
        assert!(k.as_str() < first.as_str());
    }

    #[test]
    fn keys_never_end_in_zero() {
        let mut high = key_between(None, None);
        for _ in 0..100 {
            let k = key_between(None, Some(&high));
            assert!(!k.ends_with('0'), "{k} ends in zero");
            high = k;
        }
    }

    #[test]
    fn append_after_top_of_alphabet() {
        let k = key_between(Some("z"), None);
        assert!("z" < k.as_str());
        let k2 = key_between(Some("zz"), None);
        assert!("zz" < k2.as_str());
    }
}
