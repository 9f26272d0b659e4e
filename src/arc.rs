use crate::{
    block::{Block, RawArc},
    AllocError, Weak,
};
use core::{
    cmp::Ordering,
    fmt,
    hash::{Hash, Hasher},
    ops::Deref,
    pin::Pin,
    ptr::NonNull,
};

/// A shared, atomically reference-counted owner of a `T`.
///
/// Every [`Arc<T>`] pointing at the same control block counts as one strong
/// reference. The value is dropped together with the last strong reference,
/// while the control block stays allocated until the last [`Weak<T>`]
/// observing it is dropped as well.
///
/// A handle can also be *null*: [`Arc::null`], [`Default::default`] and a
/// failed [`Weak::lock`] all produce one. Dereferencing a null handle panics,
/// [`Arc::get`] is the non-panicking accessor.
///
/// The value is only reachable through `&T`. Shared mutation needs interior
/// mutability inside `T`, such as a lock or atomics.
///
/// ## Thread Safety
///
/// The counters are atomic, the value is not protected. [`Arc<T>`] is
/// [Send] and [Sync] exactly when `T` is both.
///
/// ## Identity
///
/// `==`, ordering and hashing look at which control block a handle points
/// to, never at the value. Clones compare equal, two separately built
/// handles with equal values do not. Null handles are equal to each other and
/// sort first.
///
/// ```
/// use arcweak::Arc;
///
/// let first = Arc::new([1u8, 2, 3]);
/// let second = Arc::clone(&first);
/// assert_eq!(first, second);
/// assert_ne!(first, Arc::new([1u8, 2, 3]));
/// ```
pub struct Arc<T> {
    pub(crate) raw: RawArc<T>,
}

unsafe impl<T: Sync + Send> Send for Arc<T> {}
unsafe impl<T: Sync + Send> Sync for Arc<T> {}

#[cold]
#[inline(never)]
fn null_deref() -> ! {
    panic!("dereferenced a null Arc");
}

impl<T> Arc<T> {
    /// Moves `data` into a freshly allocated control block and returns the
    /// first strong handle to it.
    #[inline]
    pub fn new(data: T) -> Arc<T> {
        Arc {
            raw: RawArc::new(data),
        }
    }

    /// Fallible version of [`Arc::new`]. When the control block cannot be
    /// allocated the error is returned and `data` is dropped.
    ///
    /// ```
    /// use arcweak::Arc;
    ///
    /// let answer = Arc::try_new(42u64).unwrap();
    /// assert_eq!(*answer, 42);
    /// ```
    #[inline]
    pub fn try_new(data: T) -> Result<Arc<T>, AllocError> {
        Ok(Arc {
            raw: RawArc::try_new(data)?,
        })
    }

    /// Returns a handle that points to nothing.
    ///
    /// ```
    /// use arcweak::Arc;
    ///
    /// let nothing: Arc<u32> = Arc::null();
    /// assert!(nothing.is_null());
    /// assert_eq!(nothing.strong_count(), 0);
    /// assert_eq!(nothing.get(), None);
    /// ```
    #[inline]
    #[must_use]
    pub const fn null() -> Arc<T> {
        Arc {
            raw: RawArc::null(),
        }
    }

    /// Same as [`Arc::new`], pinned.
    #[inline]
    #[must_use]
    pub fn pin(data: T) -> Pin<Arc<T>> {
        // SAFETY: the value never moves out of its block while a strong handle exists
        unsafe { Pin::new_unchecked(Arc::new(data)) }
    }

    /// `true` if this handle has no control block.
    #[inline(always)]
    #[must_use]
    pub fn is_null(&self) -> bool {
        self.raw.is_null()
    }

    /// The value, or `None` for a null handle.
    ///
    /// ```
    /// use arcweak::Arc;
    ///
    /// assert_eq!(Arc::new('x').get(), Some(&'x'));
    /// assert_eq!(Arc::<char>::null().get(), None);
    /// ```
    #[inline(always)]
    #[must_use]
    pub fn get(&self) -> Option<&T> {
        self.raw.payload()
    }

    /// Address of the value, null for a null handle. Counts are left alone
    /// and the address is valid while some strong handle is alive.
    #[inline]
    #[must_use]
    pub fn as_ptr(&self) -> *const T {
        // SAFETY: the payload is the first field of the `repr(C)` block and both of
        // its wrappers are `repr(transparent)`
        self.raw.block_ptr() as *const T
    }

    /// Consumes the handle without giving up its strong reference. Pass the
    /// pointer back to [`Arc::from_raw`] to release it.
    ///
    /// ```
    /// use arcweak::Arc;
    ///
    /// let raw = Arc::into_raw(Arc::new(String::from("parked")));
    /// let back = unsafe { Arc::from_raw(raw) };
    /// assert_eq!(back.as_str(), "parked");
    /// assert_eq!(back.strong_count(), 1);
    /// ```
    #[inline]
    pub fn into_raw(this: Self) -> *const T {
        this.raw.into_block().map_or(core::ptr::null(), |block| {
            block.as_ptr() as *const T
        })
    }

    /// Rebuilds a handle from a pointer returned by [`Arc::into_raw`], taking
    /// back the strong reference it carried. A null pointer gives a null
    /// handle.
    ///
    /// # Safety
    ///
    /// `ptr` must be null or come from [`Arc::into_raw`] for the same `T`,
    /// and each such pointer may be turned back into a handle only once.
    #[inline]
    pub unsafe fn from_raw(ptr: *const T) -> Self {
        // the value shares its address with the block, see `as_ptr`
        Arc {
            raw: RawArc::from_block(NonNull::new(ptr as *mut Block<T>)),
        }
    }

    /// Number of strong handles to this value, 0 when null. Other threads may
    /// change it right after it is read.
    ///
    /// ```
    /// use arcweak::Arc;
    ///
    /// let one = Arc::new(());
    /// let two = one.clone();
    /// assert_eq!(two.strong_count(), 2);
    /// ```
    #[inline]
    #[must_use]
    pub fn strong_count(&self) -> usize {
        self.raw.strong_count()
    }

    /// Number of [`Weak<T>`] handles observing this value, 0 when null. Also
    /// a snapshot.
    #[inline]
    #[must_use]
    pub fn weak_count(&self) -> usize {
        self.raw.weak_count()
    }

    /// `true` when this handle is the only one of either kind. Like the
    /// counts this is a snapshot. [`Arc::get_mut`] does its own race-free
    /// check.
    ///
    /// ```
    /// use arcweak::Arc;
    ///
    /// let owner = Arc::new(0);
    /// assert!(owner.is_unique());
    ///
    /// let observer = Arc::downgrade(&owner);
    /// assert!(!owner.is_unique());
    /// drop(observer);
    ///
    /// let second = owner.clone();
    /// assert!(!owner.is_unique() && !second.is_unique());
    /// ```
    #[inline]
    #[must_use]
    pub fn is_unique(&self) -> bool {
        self.raw.is_unique()
    }

    /// Makes a [`Weak<T>`] observing the same control block. A null handle
    /// gives a null [`Weak<T>`].
    ///
    /// ```
    /// use arcweak::Arc;
    ///
    /// let owner = Arc::new(5);
    /// let observer = Arc::downgrade(&owner);
    /// assert_eq!(observer.lock(), owner);
    /// ```
    #[inline]
    #[must_use]
    pub fn downgrade(this: &Self) -> Weak<T> {
        Weak {
            raw: this.raw.downgrade(),
        }
    }

    /// `true` when both handles point to the same control block. `==` does
    /// the same.
    #[inline]
    #[must_use]
    pub fn ptr_eq(this: &Self, other: &Self) -> bool {
        this.raw.block_ptr() == other.raw.block_ptr()
    }

    /// Moves the value out if `this` is the only strong handle, otherwise
    /// hands `this` back. Weak observers don't block the unwrap, they just
    /// expire.
    ///
    /// ```
    /// use arcweak::Arc;
    ///
    /// let alone = Arc::new(3);
    /// let observer = Arc::downgrade(&alone);
    /// assert_eq!(Arc::try_unwrap(alone).ok(), Some(3));
    /// assert!(observer.expired());
    ///
    /// let shared = Arc::new(4);
    /// let _other = shared.clone();
    /// assert!(Arc::try_unwrap(shared).is_err());
    /// ```
    #[inline]
    pub fn try_unwrap(this: Self) -> Result<T, Self> {
        this.raw.try_unwrap().map_err(|raw| Arc { raw })
    }

    /// Mutable access to the value, granted only while [`Arc::is_unique`]
    /// holds. [`Arc::make_mut`] clones instead of failing.
    ///
    /// ```
    /// use arcweak::Arc;
    ///
    /// let mut counter = Arc::new(1);
    /// *Arc::get_mut(&mut counter).unwrap() += 1;
    /// assert_eq!(*counter, 2);
    ///
    /// let _observer = Arc::downgrade(&counter);
    /// assert!(Arc::get_mut(&mut counter).is_none());
    /// ```
    #[inline]
    pub fn get_mut(this: &mut Self) -> Option<&mut T> {
        this.raw.get_mut()
    }

    /// Mutable access to the value without the uniqueness check of
    /// [`Arc::get_mut`].
    ///
    /// # Safety
    ///
    /// For the lifetime of the returned borrow no other handle to the same
    /// block may read the value, be dereferenced or be upgraded.
    ///
    /// # Panics
    ///
    /// Panics if the handle is null.
    #[inline]
    pub unsafe fn get_mut_unchecked(this: &mut Self) -> &mut T {
        match this.raw.get_mut_unchecked() {
            Some(value) => value,
            None => null_deref(),
        }
    }

    /// Gives up this strong handle and returns the value if it was the last
    /// one. When every clone is passed through `into_inner`, exactly one call
    /// gets the value, even when the calls race.
    ///
    /// ```
    /// use arcweak::Arc;
    ///
    /// let left = Arc::new("payload");
    /// let right = left.clone();
    /// let a = std::thread::spawn(move || Arc::into_inner(left));
    /// let b = std::thread::spawn(move || Arc::into_inner(right));
    /// let results = [a.join().unwrap(), b.join().unwrap()];
    /// assert_eq!(results.iter().flatten().count(), 1);
    /// ```
    pub fn into_inner(this: Self) -> Option<T> {
        this.raw.into_inner()
    }
}

impl<T: Clone> Arc<T> {
    /// The value itself when `this` is the last strong handle, a clone of it
    /// otherwise.
    ///
    /// # Panics
    ///
    /// Panics if the handle is null.
    #[inline]
    pub fn unwrap_or_clone(this: Self) -> T {
        Arc::try_unwrap(this).unwrap_or_else(|shared| T::clone(&shared))
    }

    /// Clone-on-write access. If any other handle, strong or weak, shares the
    /// block, the value is cloned into a new block first and `this` is moved
    /// to it. Weak observers stay on the old block.
    ///
    /// # Panics
    ///
    /// Panics if the handle is null.
    ///
    /// ```
    /// use arcweak::Arc;
    ///
    /// let mut mine = Arc::new(vec![1]);
    /// let theirs = mine.clone();
    /// Arc::make_mut(&mut mine).push(2);
    ///
    /// assert_eq!(*mine, [1, 2]);
    /// assert_eq!(*theirs, [1]);
    /// assert!(mine.is_unique());
    /// ```
    #[inline]
    pub fn make_mut(this: &mut Arc<T>) -> &mut T {
        if !this.raw.is_exclusive() {
            *this = Arc::new(T::clone(&**this));
        }
        // SAFETY: `this` is now the only reference to its allocation
        unsafe { Self::get_mut_unchecked(this) }
    }
}

impl<T> Deref for Arc<T> {
    type Target = T;
    #[inline(always)]
    fn deref(&self) -> &T {
        match self.raw.payload() {
            Some(value) => value,
            None => null_deref(),
        }
    }
}

impl<T> From<T> for Arc<T> {
    #[inline(always)]
    fn from(value: T) -> Self {
        Arc::new(value)
    }
}

impl<T> Clone for Arc<T> {
    /// Adds a strong reference. A null handle clones into another null handle.
    #[inline]
    fn clone(&self) -> Self {
        Arc {
            raw: self.raw.clone(),
        }
    }
}

impl<T> Default for Arc<T> {
    /// A null handle.
    #[inline]
    fn default() -> Arc<T> {
        Arc::null()
    }
}

impl<T> Hash for Arc<T> {
    #[inline]
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.raw.block_ptr().hash(state);
    }
}

impl<T: fmt::Debug> fmt::Debug for Arc<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.get() {
            Some(value) => fmt::Debug::fmt(value, f),
            None => f.write_str("(null)"),
        }
    }
}

impl<T> fmt::Pointer for Arc<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Pointer::fmt(&self.as_ptr(), f)
    }
}

impl<T> PartialEq for Arc<T> {
    #[inline]
    fn eq(&self, other: &Arc<T>) -> bool {
        Arc::ptr_eq(self, other)
    }
}

impl<T> Eq for Arc<T> {}

impl<T> PartialOrd for Arc<T> {
    #[inline]
    fn partial_cmp(&self, other: &Arc<T>) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<T> Ord for Arc<T> {
    #[inline]
    fn cmp(&self, other: &Arc<T>) -> Ordering {
        self.raw.block_ptr().cmp(&other.raw.block_ptr())
    }
}

impl<T> AsRef<T> for Arc<T> {
    /// Panics on a null handle, like deref.
    #[inline(always)]
    fn as_ref(&self) -> &T {
        self
    }
}

impl<T> Unpin for Arc<T> {}
