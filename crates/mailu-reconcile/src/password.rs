//! Initial mailbox credential generation.

use rand::rngs::OsRng;
use rand::seq::SliceRandom;
use rand::Rng;

/// Length of generated credentials.
pub const GENERATED_PASSWORD_LEN: usize = 20;

/// Minimum characters drawn from each class.
const MIN_PER_CLASS: usize = 2;

const LETTERS: &[u8] = b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ";
const DIGITS: &[u8] = b"0123456789";

/// Generate a random alphanumeric password from the OS RNG.
///
/// At least two letters and two digits are always present.
#[must_use]
pub fn generate_password(len: usize) -> String {
    let len = len.max(MIN_PER_CLASS * 2);
    let mut rng = OsRng;

    let mut chars: Vec<u8> = Vec::with_capacity(len);
    for _ in 0..MIN_PER_CLASS {
        chars.push(LETTERS[rng.gen_range(0..LETTERS.len())]);
        chars.push(DIGITS[rng.gen_range(0..DIGITS.len())]);
    }

    let pool: Vec<u8> = LETTERS.iter().chain(DIGITS).copied().collect();
    while chars.len() < len {
        chars.push(pool[rng.gen_range(0..pool.len())]);
    }

    chars.shuffle(&mut rng);
    chars.into_iter().map(char::from).collect()
}
