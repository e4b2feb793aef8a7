//! The "swap-or-not" shuffle used to assign validators to committees.
//!
//! Two entry points are provided:
//!
//! - `compute_shuffled_index`: shuffle a single index through all rounds.
//! - `shuffle_list`: permute a whole list, one pair-swap pass per round.
//!
//! `shuffle_list(input, rounds, seed, false)[i] == input[compute_shuffled_index(i, ..)]`
//! holds for all `i`; the committee caches rely on the un-shuffling direction.

use ethereum_hashing::hash_fixed;

/// Positions are addressed in 256-bit windows whose index must fit a `u32`.
pub const MAX_SHUFFLE_LIST_SIZE: usize = 1 << 40;

const SEED_SIZE: usize = 32;
const ROUND_SIZE: usize = 1;
const POSITION_WINDOW_SIZE: usize = 4;

fn round_hash(seed: &[u8], round: u8) -> [u8; 32] {
    let mut buf = Vec::with_capacity(SEED_SIZE + ROUND_SIZE);
    buf.extend_from_slice(seed);
    buf.push(round);
    hash_fixed(&buf)
}

fn window_hash(seed: &[u8], round: u8, window: u32) -> [u8; 32] {
    let mut buf = Vec::with_capacity(SEED_SIZE + ROUND_SIZE + POSITION_WINDOW_SIZE);
    buf.extend_from_slice(seed);
    buf.push(round);
    buf.extend_from_slice(&window.to_le_bytes());
    hash_fixed(&buf)
}

fn pivot(seed: &[u8], round: u8, list_size: u64) -> u64 {
    let digest = round_hash(seed, round);
    let mut eight = [0; 8];
    eight.copy_from_slice(&digest[0..8]);
    u64::from_le_bytes(eight) % list_size
}

/// Returns the shuffled position of `index` in a list of `list_size`
/// elements, or `None` when `index` is out of bounds or the list is too
/// large to shuffle.
pub fn compute_shuffled_index(
    index: usize,
    list_size: usize,
    seed: &[u8],
    shuffle_round_count: u8,
) -> Option<usize> {
    if list_size == 0 || index >= list_size || list_size > MAX_SHUFFLE_LIST_SIZE {
        return None;
    }

    let mut index = index as u64;
    let list_size = list_size as u64;

    for round in 0..shuffle_round_count {
        let pivot = pivot(seed, round, list_size);
        let flip = (pivot + list_size - index) % list_size;
        let position = index.max(flip);
        let source = window_hash(seed, round, (position >> 8) as u32);
        let byte = source[((position % 256) / 8) as usize];
        let bit = (byte >> (position % 8)) & 0x01;
        if bit == 1 {
            index = flip;
        }
    }

    Some(index as usize)
}

/// Permutes `input` in place.
///
/// Shuffles when `forwards == true`, un-shuffles otherwise. Each round is an
/// involution, so direction only changes the round order.
pub fn shuffle_list(mut input: Vec<usize>, rounds: u8, seed: &[u8], forwards: bool) -> Option<Vec<usize>> {
    if input.len() <= 1 || rounds == 0 {
        return Some(input);
    }
    if input.len() > MAX_SHUFFLE_LIST_SIZE {
        return None;
    }

    let list_size = input.len() as u64;
    let mut current_round = if forwards { 0 } else { rounds - 1 };

    loop {
        let pivot = pivot(seed, current_round, list_size);

        // Pairs (i, pivot - i): the decision bit lives at the higher
        // position of the pair, which is `j`.
        let mirror = (pivot + 1) >> 1;
        let mut source = window_hash(seed, current_round, (pivot >> 8) as u32);
        let (mut i, mut j) = (0u64, pivot);
        while i < mirror {
            if j & 0xff == 0xff {
                source = window_hash(seed, current_round, (j >> 8) as u32);
            }
            let byte = source[((j & 0xff) >> 3) as usize];
            let bit = (byte >> (j & 0x07)) & 0x01;
            if bit == 1 {
                input.swap(i as usize, j as usize);
            }
            i += 1;
            j -= 1;
        }

        // Pairs (i, pivot + list_size - i) for positions above the pivot.
        let mirror = (pivot + list_size + 1) >> 1;
        let end = list_size - 1;
        let mut source = window_hash(seed, current_round, (end >> 8) as u32);
        let (mut i, mut j) = (pivot + 1, end);
        while i < mirror {
            if j & 0xff == 0xff {
                source = window_hash(seed, current_round, (j >> 8) as u32);
            }
            let byte = source[((j & 0xff) >> 3) as usize];
            let bit = (byte >> (j & 0x07)) & 0x01;
            if bit == 1 {
                input.swap(i as usize, j as usize);
            }
            i += 1;
            j -= 1;
        }

        if forwards {
            current_round += 1;
            if current_round == rounds {
                break;
            }
        } else {
            if current_round == 0 {
                break;
            }
            current_round -= 1;
        }
    }

    Some(input)
}

#[cfg(test)]
mod tests {
    use super::*;

    const ROUNDS: u8 = 90;

    fn seed(byte: u8) -> Vec<u8> {
        vec![byte; 32]
    }

    #[test]
    fn out_of_bounds_index_is_none() {
        assert_eq!(compute_shuffled_index(10, 10, &seed(1), ROUNDS), None);
        assert_eq!(compute_shuffled_index(0, 0, &seed(1), ROUNDS), None);
    }

    #[test]
    fn shuffled_index_is_a_permutation() {
        let n = 257;
        let mut seen = vec![false; n];
        for i in 0..n {
            let shuffled = compute_shuffled_index(i, n, &seed(7), ROUNDS).unwrap();
            assert!(shuffled < n);
            assert!(!seen[shuffled], "index {shuffled} produced twice");
            seen[shuffled] = true;
        }
    }

    #[test]
    fn list_matches_single_index_unshuffling() {
        let n = 300;
        let input: Vec<usize> = (0..n).collect();
        let shuffled = shuffle_list(input.clone(), ROUNDS, &seed(42), false).unwrap();
        for i in 0..n {
            let expected = input[compute_shuffled_index(i, n, &seed(42), ROUNDS).unwrap()];
            assert_eq!(shuffled[i], expected, "mismatch at position {i}");
        }
    }

    #[test]
    fn forwards_inverts_backwards() {
        let input: Vec<usize> = (0..500).collect();
        let shuffled = shuffle_list(input.clone(), ROUNDS, &seed(3), false).unwrap();
        let unshuffled = shuffle_list(shuffled, ROUNDS, &seed(3), true).unwrap();
        assert_eq!(input, unshuffled);
    }

    #[test]
    fn zero_rounds_is_identity() {
        let input: Vec<usize> = (0..64).collect();
        assert_eq!(shuffle_list(input.clone(), 0, &seed(9), true).unwrap(), input);
    }

    #[test]
    fn different_seeds_disagree() {
        let input: Vec<usize> = (0..128).collect();
        let a = shuffle_list(input.clone(), ROUNDS, &seed(1), false).unwrap();
        let b = shuffle_list(input, ROUNDS, &seed(2), false).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn empty_and_singleton_lists() {
        assert_eq!(shuffle_list(vec![], ROUNDS, &seed(1), true).unwrap(), vec![]);
        assert_eq!(shuffle_list(vec![0], ROUNDS, &seed(1), true).unwrap(), vec![0]);
    }
}
