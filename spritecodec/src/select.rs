// Every "pick the smaller encoding" decision goes through here: build every
// candidate in full, then keep the first one of minimal size.

pub trait Encoded {
    fn encoded_len(&self) -> usize;
}

impl Encoded for Vec<u8> {
    fn encoded_len(&self) -> usize {
        self.len()
    }
}

/// Running minimum over candidates that are produced one at a time.
pub struct Smallest<E>(Option<E>);

impl<E: Encoded> Smallest<E> {
    pub fn new() -> Self {
        Self(None)
    }

    /// Replaces the current pick only if `candidate` is strictly smaller.
    pub fn offer(&mut self, candidate: E) {
        match &self.0 {
            Some(best) if best.encoded_len() <= candidate.encoded_len() => (),
            _ => self.0 = Some(candidate),
        }
    }

    pub fn into_inner(self) -> Option<E> {
        self.0
    }
}

impl<E: Encoded> Default for Smallest<E> {
    fn default() -> Self {
        Self::new()
    }
}

/// The smallest candidate. Ties keep the earliest, so callers list their
/// preferred encodings first.
pub fn smallest<E, I>(candidates: I) -> Option<E>
where
    E: Encoded,
    I: IntoIterator<Item = E>,
{
    let mut best = Smallest::new();
    candidates.into_iter().for_each(|c| best.offer(c));
    best.into_inner()
}

/// Like [smallest], for a candidate list that is known to be non-empty.
pub fn smallest_of<E, I>(first: E, rest: I) -> E
where
    E: Encoded,
    I: IntoIterator<Item = E>,
{
    rest.into_iter().fold(first, |best, candidate| {
        if candidate.encoded_len() < best.encoded_len() {
            candidate
        } else {
            best
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_minimum_wins() {
        let picked = smallest(vec![vec![1u8, 2, 3], vec![4, 5], vec![6, 7]]);
        assert_eq!(picked, Some(vec![4u8, 5]));
        assert_eq!(smallest(Vec::<Vec<u8>>::new()), None);
    }

    #[test]
    fn seeded_pick_keeps_ties() {
        assert_eq!(smallest_of(vec![1u8], [vec![2], vec![]]), Vec::<u8>::new());
        assert_eq!(smallest_of(vec![1u8], [vec![2]]), vec![1u8]);
    }
}
