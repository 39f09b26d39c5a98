//! Non-owning parent links.

use super::HandleError;
use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

/// Uncounted link from a child handle to its parent.
///
/// Detached until [`attach`](Self::attach) is called by the parent during
/// insertion. After that, [`resolve`](Self::resolve) succeeds for as long as
/// anything else keeps the parent alive; the link itself never does.
pub struct BackRef<T> {
    target: RefCell<Weak<T>>,
}

impl<T> BackRef<T> {
    /// Creates a link that resolves to nothing.
    pub fn detached() -> Self {
        Self {
            target: RefCell::new(Weak::new()),
        }
    }

    /// Points the link at `parent`.
    ///
    /// Fails if the link already resolves to a live parent. A link whose
    /// previous parent has been dropped may be re-attached.
    pub fn attach(&self, parent: &Rc<T>, label: &str) -> Result<(), HandleError> {
        let mut target = self.target.borrow_mut();
        if target.upgrade().is_some() {
            return Err(HandleError::AlreadyAttached(label.to_string()));
        }
        *target = Rc::downgrade(parent);
        Ok(())
    }

    /// Returns the parent if it is still alive.
    pub fn resolve(&self) -> Option<Rc<T>> {
        self.target.borrow().upgrade()
    }

    /// Whether the link currently resolves.
    pub fn is_attached(&self) -> bool {
        self.target.borrow().strong_count() > 0
    }
}

impl<T> Default for BackRef<T> {
    fn default() -> Self {
        Self::detached()
    }
}

impl<T> fmt::Debug for BackRef<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BackRef")
            .field("attached", &self.is_attached())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detached_does_not_resolve() {
        let link: BackRef<u32> = BackRef::detached();
        assert!(link.resolve().is_none());
        assert!(!link.is_attached());
    }

    #[test]
    fn test_resolves_while_parent_alive_elsewhere() {
        let parent = Rc::new(7u32);
        let link = BackRef::detached();
        link.attach(&parent, "layer").unwrap();

        let other_owner = Rc::clone(&parent);
        drop(parent);

        assert_eq!(link.resolve().as_deref(), Some(&7));
        drop(other_owner);
        assert!(link.resolve().is_none());
    }

    #[test]
    fn test_link_does_not_count() {
        let parent = Rc::new(1u32);
        let link = BackRef::detached();
        link.attach(&parent, "layer").unwrap();
        assert_eq!(Rc::strong_count(&parent), 1);
    }

    #[test]
    fn test_attach_twice_rejected() {
        let a = Rc::new(1u32);
        let b = Rc::new(2u32);
        let link = BackRef::detached();
        link.attach(&a, "layer").unwrap();

        assert_eq!(
            link.attach(&b, "layer"),
            Err(HandleError::AlreadyAttached("layer".to_string()))
        );
        assert_eq!(link.resolve().as_deref(), Some(&1));
    }
}
