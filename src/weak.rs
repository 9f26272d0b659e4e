use crate::{block::RawWeak, Arc};
use core::fmt;

/// [`Weak<T>`] is a non-owning version of [`Arc<T>`] that holds a reference to
/// the shared control block without keeping the inner value alive.
///
/// A [`Weak<T>`] is created with [`Arc::downgrade`] and turned back into an
/// [`Arc<T>`] with [`Weak::lock`] or [`Weak::upgrade`]. Upgrading only
/// succeeds while at least one [`Arc<T>`] to the value still exists: once the
/// value has been dropped it can never be reached again, and every later
/// upgrade fails.
///
/// A [`Weak<T>`] keeps the control block allocated (but not the value) until
/// the last weak pointer is gone, so it is cheap to hold on to one after the
/// value is dropped. It is typically used to break reference cycles or to
/// observe an object owned elsewhere.
///
/// # Examples
///
/// ```
/// use arcweak::{Arc, Weak};
///
/// let strong = Arc::new(String::from("observed"));
/// let weak: Weak<String> = Arc::downgrade(&strong);
///
/// assert_eq!(*weak.lock(), "observed");
///
/// drop(strong);
/// assert!(weak.expired());
/// assert!(weak.lock().is_null());
/// ```
pub struct Weak<T> {
    pub(crate) raw: RawWeak<T>,
}

unsafe impl<T: Sync + Send> Send for Weak<T> {}
unsafe impl<T: Sync + Send> Sync for Weak<T> {}

impl<T> Weak<T> {
    /// Constructs a null [`Weak<T>`] that observes nothing. Upgrading it always
    /// fails.
    ///
    /// # Examples
    ///
    /// ```
    /// use arcweak::Weak;
    ///
    /// let empty: Weak<i64> = Weak::new();
    /// assert!(empty.expired());
    /// assert!(empty.upgrade().is_none());
    /// ```
    #[inline]
    #[must_use]
    pub const fn new() -> Weak<T> {
        Weak {
            raw: RawWeak::null(),
        }
    }

    /// Attempts to get a strong handle to the value, returning a null
    /// [`Arc<T>`] if the value has already been dropped or this handle is
    /// null.
    ///
    /// The strong count is only incremented while it is still above zero, so a
    /// value whose last [`Arc<T>`] is being dropped concurrently is never
    /// handed out.
    ///
    /// # Examples
    ///
    /// ```
    /// use arcweak::Arc;
    ///
    /// let five = Arc::new(5);
    /// let weak_five = Arc::downgrade(&five);
    ///
    /// let strong_five = weak_five.lock();
    /// assert_eq!(strong_five, five);
    /// assert_eq!(*strong_five, 5);
    ///
    /// drop(five);
    /// drop(strong_five);
    /// assert!(weak_five.lock().is_null());
    /// ```
    #[inline]
    #[must_use]
    pub fn lock(&self) -> Arc<T> {
        Arc {
            raw: self.raw.upgrade(),
        }
    }

    /// Attempts to upgrade to an [`Arc<T>`], returning [`None`] if the value
    /// has already been dropped. This is [`Weak::lock`] with the null handle
    /// mapped to [`None`].
    ///
    /// # Examples
    ///
    /// ```
    /// use arcweak::Arc;
    ///
    /// let five = Arc::new(5);
    /// let weak_five = Arc::downgrade(&five);
    /// assert!(weak_five.upgrade().is_some());
    ///
    /// drop(five);
    /// assert!(weak_five.upgrade().is_none());
    /// ```
    #[inline]
    #[must_use]
    pub fn upgrade(&self) -> Option<Arc<T>> {
        let strong = self.lock();
        if strong.is_null() {
            None
        } else {
            Some(strong)
        }
    }

    /// Returns `true` if the value has been dropped or this handle is null.
    /// Once a [`Weak<T>`] has expired it stays expired.
    #[inline]
    #[must_use]
    pub fn expired(&self) -> bool {
        self.raw.strong_count() == 0
    }

    /// Gets the number of [`Arc<T>`] pointers to the value, 0 once it has been
    /// dropped or for a null handle.
    #[inline]
    #[must_use]
    pub fn strong_count(&self) -> usize {
        self.raw.strong_count()
    }

    /// Gets the number of [`Weak<T>`] pointers to the allocation, including
    /// this one, or 0 for a null handle. Be careful as another thread can
    /// change the count at any time.
    ///
    /// # Examples
    ///
    /// ```
    /// use arcweak::Arc;
    ///
    /// let five = Arc::new(5);
    /// let weak_five = Arc::downgrade(&five);
    /// let _also_weak = weak_five.clone();
    /// assert_eq!(weak_five.weak_count(), 2);
    ///
    /// drop(five);
    /// assert_eq!(weak_five.weak_count(), 2);
    /// ```
    #[inline]
    #[must_use]
    pub fn weak_count(&self) -> usize {
        self.raw.weak_count()
    }

    /// Gives a pointer to the value this handle observes, or a null pointer
    /// for a null handle. The pointer may dangle once the value is dropped,
    /// and must only be dereferenced while an [`Arc<T>`] keeps it alive.
    #[inline]
    #[must_use]
    pub fn as_ptr(&self) -> *const T {
        self.raw.block_ptr() as *const T
    }

    /// Returns `true` if both handles observe the same allocation, or are both
    /// null.
    ///
    /// # Examples
    ///
    /// ```
    /// use arcweak::{Arc, Weak};
    ///
    /// let first = Arc::new(());
    /// let second = Arc::new(());
    /// let weak = Arc::downgrade(&first);
    ///
    /// assert!(Weak::ptr_eq(&weak, &weak.clone()));
    /// assert!(!Weak::ptr_eq(&weak, &Arc::downgrade(&second)));
    /// assert!(Weak::ptr_eq(&Weak::<()>::new(), &Weak::new()));
    /// ```
    #[inline]
    #[must_use]
    pub fn ptr_eq(this: &Self, other: &Self) -> bool {
        this.raw.block_ptr() == other.raw.block_ptr()
    }
}

impl<T> Clone for Weak<T> {
    #[inline]
    fn clone(&self) -> Self {
        Weak {
            raw: self.raw.clone(),
        }
    }
}

impl<T> Default for Weak<T> {
    /// Creates a null [`Weak<T>`].
    #[inline]
    fn default() -> Weak<T> {
        Weak::new()
    }
}

impl<T> From<&Arc<T>> for Weak<T> {
    #[inline]
    fn from(strong: &Arc<T>) -> Self {
        Arc::downgrade(strong)
    }
}

impl<T> fmt::Debug for Weak<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("(Weak)")
    }
}
