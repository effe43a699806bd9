//! Ordering of file names with embedded numbers.
use std::cmp::Ordering;

/// Compare two strings so that runs of digits compare by numeric value
/// and the rest compares case-insensitively.
///
/// `"slice2"` sorts before `"slice10"`,
/// and `"slice010"` after `"slice002"`.
/// Strings which only differ in case or leading zeros
/// fall back to plain byte order, so the ordering is total.
///
/// ```
/// # use dcmstack_series::natural_cmp;
/// let mut names = vec!["IM10", "im2", "IM1"];
/// names.sort_by(|a, b| natural_cmp(a, b));
/// assert_eq!(names, ["IM1", "im2", "IM10"]);
/// ```
pub fn natural_cmp(a: &str, b: &str) -> Ordering {
    let mut x = Chunks(a);
    let mut y = Chunks(b);
    loop {
        let ord = match (x.next(), y.next()) {
            (None, None) => return a.cmp(b),
            (None, Some(_)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
            (Some(Chunk::Digits(p)), Some(Chunk::Digits(q))) => cmp_digits(p, q),
            (Some(Chunk::Digits(_)), Some(Chunk::Text(_))) => Ordering::Less,
            (Some(Chunk::Text(_)), Some(Chunk::Digits(_))) => Ordering::Greater,
            (Some(Chunk::Text(p)), Some(Chunk::Text(q))) => p
                .chars()
                .flat_map(char::to_lowercase)
                .cmp(q.chars().flat_map(char::to_lowercase)),
        };
        if ord != Ordering::Equal {
            return ord;
        }
    }
}

fn cmp_digits(p: &str, q: &str) -> Ordering {
    let p = p.trim_start_matches('0');
    let q = q.trim_start_matches('0');
    p.len().cmp(&q.len()).then_with(|| p.cmp(q))
}

#[derive(Debug, PartialEq)]
enum Chunk<'a> {
    Digits(&'a str),
    Text(&'a str),
}

/// Splits a string into runs of ASCII digits and runs of anything else.
#[derive(Debug)]
struct Chunks<'a>(&'a str);

impl<'a> Iterator for Chunks<'a> {
    type Item = Chunk<'a>;

    fn next(&mut self) -> Option<Chunk<'a>> {
        let first = self.0.chars().next()?;
        let digits = first.is_ascii_digit();
        let end = self
            .0
            .find(|c: char| c.is_ascii_digit() != digits)
            .unwrap_or(self.0.len());
        let (chunk, rest) = self.0.split_at(end);
        self.0 = rest;
        Some(if digits {
            Chunk::Digits(chunk)
        } else {
            Chunk::Text(chunk)
        })
    }
}
