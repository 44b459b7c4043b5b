use std::collections::HashMap;

/// Distinct runtime tiles, addressed by 1-based id.
#[derive(Clone, Debug, Default)]
pub struct TilePool {
    tiles: Vec<Vec<u8>>,
    flags: Vec<u8>,
    index: HashMap<Vec<u8>, usize>,
}

impl TilePool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the id for `pixels` and whether it was just added. The flags
    /// of the first insertion stick.
    pub fn insert(&mut self, pixels: Vec<u8>, flags: u8) -> (usize, bool) {
        if let Some(&id) = self.index.get(&pixels) {
            return (id, false);
        }

        self.tiles.push(pixels.clone());
        self.flags.push(flags);
        let id = self.tiles.len();
        self.index.insert(pixels, id);
        (id, true)
    }

    pub fn len(&self) -> usize {
        self.tiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tiles.is_empty()
    }

    pub fn get(&self, id: usize) -> Option<&[u8]> {
        id.checked_sub(1)
            .and_then(|i| self.tiles.get(i))
            .map(Vec::as_slice)
    }

    pub fn tiles(&self) -> &[Vec<u8>] {
        &self.tiles
    }

    pub fn flags(&self) -> &[u8] {
        &self.flags
    }
}
