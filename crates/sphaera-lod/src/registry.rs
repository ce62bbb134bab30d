use rustc_hash::FxHashSet;
use sphaera_cubesphere::PatchPath;

/// Patches that have been shown and not yet reclaimed, for one layer.
///
/// A patch stays registered while it is hidden behind its own children, so
/// "my neighbour is registered" means a same-depth neighbour exists, possibly
/// subdivided further. Owned and mutated by the render thread only.
#[derive(Clone, Debug, Default)]
pub struct VisibleRegistry {
    paths: FxHashSet<PatchPath>,
}

impl VisibleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` if the path was not registered yet.
    pub fn insert(&mut self, path: PatchPath) -> bool {
        self.paths.insert(path)
    }

    pub fn remove(&mut self, path: &PatchPath) -> bool {
        self.paths.remove(path)
    }

    pub fn contains(&self, path: &PatchPath) -> bool {
        self.paths.contains(path)
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &PatchPath> {
        self.paths.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sphaera_cubesphere::{CubeFace, Quadrant};

    #[test]
    fn test_insert_contains_remove() {
        let mut reg = VisibleRegistry::new();
        let path = PatchPath::root(CubeFace::Top).child(Quadrant::SouthEast);
        assert!(reg.is_empty());
        assert!(reg.insert(path));
        assert!(!reg.insert(path), "second insert is a no-op");
        assert!(reg.contains(&path));
        assert!(!reg.contains(&PatchPath::root(CubeFace::Top)));
        assert!(reg.remove(&path));
        assert_eq!(reg.len(), 0);
    }
}
