use std::collections::BTreeSet;
use tokio::sync::watch;

/// 1-indexed page number.
pub type PageNumber = u32;

/// The set of pages marked for extraction.
///
/// Membership is the only state: iteration is always ascending, so the order
/// in which pages were toggled never leaks into an extraction. Every mutation
/// publishes the new snapshot to subscribers before returning.
#[derive(Debug)]
pub struct SelectionStore {
    pages: BTreeSet<PageNumber>,
    notify: watch::Sender<Vec<PageNumber>>,
}

impl SelectionStore {
    pub fn new() -> Self {
        let (notify, _) = watch::channel(Vec::new());
        SelectionStore {
            pages: BTreeSet::new(),
            notify,
        }
    }

    /// Flip membership of `page`. Returns whether the page is now selected.
    pub fn toggle(&mut self, page: PageNumber) -> bool {
        let selected = if self.pages.remove(&page) {
            false
        } else {
            self.pages.insert(page);
            true
        };
        self.publish();
        selected
    }

    /// Flip membership of every page in `pages`, notifying subscribers once.
    pub fn toggle_all(&mut self, pages: &[PageNumber]) {
        if pages.is_empty() {
            return;
        }
        for page in pages {
            if !self.pages.remove(page) {
                self.pages.insert(*page);
            }
        }
        self.publish();
    }

    pub fn clear(&mut self) {
        if self.pages.is_empty() {
            return;
        }
        self.pages.clear();
        self.publish();
    }

    /// Drop members above `page_count`. Returns the dropped pages.
    pub fn retain_within(&mut self, page_count: PageNumber) -> Vec<PageNumber> {
        let dropped: Vec<PageNumber> = self
            .pages
            .iter()
            .copied()
            .filter(|&p| p > page_count)
            .collect();
        if !dropped.is_empty() {
            self.pages.retain(|&p| p <= page_count);
            self.publish();
        }
        dropped
    }

    /// Current members in ascending order.
    pub fn snapshot(&self) -> Vec<PageNumber> {
        self.pages.iter().copied().collect()
    }

    pub fn contains(&self, page: PageNumber) -> bool {
        self.pages.contains(&page)
    }

    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }

    pub fn len(&self) -> usize {
        self.pages.len()
    }

    /// Receiver that always holds the latest snapshot.
    pub fn subscribe(&self) -> watch::Receiver<Vec<PageNumber>> {
        self.notify.subscribe()
    }

    fn publish(&self) {
        self.notify.send_replace(self.snapshot());
    }
}

impl Default for SelectionStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_toggle_flips_membership() {
        let mut store = SelectionStore::new();
        assert!(store.toggle(4));
        assert!(store.contains(4));
        assert!(!store.toggle(4));
        assert!(!store.contains(4));
        assert!(store.is_empty());
    }

    #[test]
    fn test_snapshot_is_ascending() {
        let mut store = SelectionStore::new();
        store.toggle(3);
        store.toggle(1);
        store.toggle(2);
        assert_eq!(store.snapshot(), vec![1, 2, 3]);
    }

    #[test]
    fn test_click_order_does_not_matter() {
        let mut a = SelectionStore::new();
        a.toggle(4);
        a.toggle(2);
        let mut b = SelectionStore::new();
        b.toggle(2);
        b.toggle(4);
        assert_eq!(a.snapshot(), vec![2, 4]);
        assert_eq!(a.snapshot(), b.snapshot());
    }

    #[test]
    fn test_clear() {
        let mut store = SelectionStore::new();
        store.toggle(1);
        store.toggle(7);
        store.clear();
        assert!(store.is_empty());
        assert!(store.snapshot().is_empty());
    }

    #[test]
    fn test_retain_within_drops_out_of_range() {
        let mut store = SelectionStore::new();
        store.toggle(2);
        store.toggle(9);
        store.toggle(12);
        assert_eq!(store.retain_within(8), vec![9, 12]);
        assert_eq!(store.snapshot(), vec![2]);
        assert!(store.retain_within(8).is_empty());
    }

    #[test]
    fn test_toggle_all_publishes_once() {
        let mut store = SelectionStore::new();
        store.toggle(2);
        let mut rx = store.subscribe();
        rx.mark_unchanged();

        store.toggle_all(&[3, 2, 1]);
        assert!(rx.has_changed().unwrap());
        assert_eq!(*rx.borrow_and_update(), vec![1, 3]);
        assert_eq!(store.len(), 2);

        store.toggle_all(&[]);
        assert!(!rx.has_changed().unwrap());
    }

    #[test]
    fn test_subscribers_see_every_mutation() {
        let mut store = SelectionStore::new();
        let rx = store.subscribe();
        store.toggle(5);
        assert_eq!(*rx.borrow(), vec![5]);
        store.toggle(3);
        assert_eq!(*rx.borrow(), vec![3, 5]);
        store.toggle(5);
        assert_eq!(*rx.borrow(), vec![3]);
        store.clear();
        assert!(rx.borrow().is_empty());
    }

    proptest! {
        #[test]
        fn prop_toggle_is_xor_fold(pages in prop::collection::vec(1u32..40, 0..200)) {
            let mut store = SelectionStore::new();
            let mut expected = BTreeSet::new();
            for &p in &pages {
                store.toggle(p);
                if !expected.remove(&p) {
                    expected.insert(p);
                }
            }
            let snapshot = store.snapshot();
            prop_assert_eq!(&snapshot, &expected.into_iter().collect::<Vec<_>>());
            prop_assert!(snapshot.windows(2).all(|w| w[0] < w[1]));
        }
    }
}
