//! The endpoint a batch is currently bound to.

use super::Mirror;

/// A batch keeps using one mirror until that mirror fails.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum MirrorSelection {
    #[default]
    Unselected,
    Selected(Mirror),
}

impl MirrorSelection {
    pub fn current(&self) -> Option<&Mirror> {
        match self {
            MirrorSelection::Unselected => None,
            MirrorSelection::Selected(m) => Some(m),
        }
    }

    pub fn select(&mut self, mirror: Mirror) {
        *self = MirrorSelection::Selected(mirror);
    }

    /// Forget the binding after a retryable failure.
    pub fn clear_on_failure(&mut self) {
        *self = MirrorSelection::Unselected;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn select_then_clear() {
        let mut sel = MirrorSelection::default();
        assert!(sel.current().is_none());
        let m = Mirror::parse("http://a.test/").unwrap();
        sel.select(m.clone());
        assert_eq!(sel.current(), Some(&m));
        sel.clear_on_failure();
        assert_eq!(sel, MirrorSelection::Unselected);
    }
}
