use rand::seq::SliceRandom;
use rand::Rng;

const LOWER: &[u8] = b"abcdefghijkmnpqrstuvwxyz";
const UPPER: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ";
const DIGITS: &[u8] = b"23456789";
const SYMBOLS: &[u8] = b"!@#$%^&*-_";

pub const MIN_PASSWORD_LENGTH: usize = 8;
pub const DEFAULT_PASSWORD_LENGTH: usize = 12;

/// Temporary password with at least one character from each class.
/// Look-alike glyphs (l, I, O, 0, 1) are left out since these get read off
/// an email and typed by hand.
pub fn generate_password(length: usize) -> String {
    let length = length.max(MIN_PASSWORD_LENGTH);
    let mut rng = rand::thread_rng();

    let classes = [LOWER, UPPER, DIGITS, SYMBOLS];
    let all: Vec<u8> = classes.concat();

    let mut bytes: Vec<u8> = classes
        .iter()
        .map(|class| class[rng.gen_range(0..class.len())])
        .collect();
    while bytes.len() < length {
        bytes.push(all[rng.gen_range(0..all.len())]);
    }
    bytes.shuffle(&mut rng);

    bytes.into_iter().map(char::from).collect()
}
