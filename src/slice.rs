use crate::{
    block::{RawArc, RawWeak},
    AllocError,
};
use alloc::{boxed::Box, vec::Vec};
use core::{
    cmp::Ordering,
    fmt,
    hash::{Hash, Hasher},
    ops::Deref,
};

/// A thread-safe reference-counting pointer to a heap buffer of `T` elements.
///
/// [`ArcSlice<T>`] is the array form of [`Arc<T>`][crate::Arc]: the control
/// block owns a separately allocated `Box<[T]>`, whose length is fixed at
/// construction. It dereferences to `[T]`, so elements are read with the
/// usual indexing syntax and indexing past the end panics. A null
/// [`ArcSlice<T>`] dereferences to the empty slice.
///
/// Like [`Arc<T>`][crate::Arc], equality, ordering and hashing compare the
/// identity of the shared allocation, not the elements.
///
/// # Examples
///
/// ```
/// use arcweak::ArcSlice;
/// use std::sync::atomic::{AtomicI32, Ordering};
///
/// let cells: ArcSlice<AtomicI32> = ArcSlice::new(5);
/// let other = cells.clone();
///
/// cells[2].store(42, Ordering::Relaxed);
/// assert_eq!(other[2].load(Ordering::Relaxed), 42);
/// assert_eq!(other.len(), 5);
/// ```
pub struct ArcSlice<T> {
    raw: RawArc<Box<[T]>>,
}

unsafe impl<T: Sync + Send> Send for ArcSlice<T> {}
unsafe impl<T: Sync + Send> Sync for ArcSlice<T> {}

impl<T: Default> ArcSlice<T> {
    /// Constructs a new [`ArcSlice<T>`] of `len` default-initialized elements.
    ///
    /// # Examples
    ///
    /// ```
    /// use arcweak::ArcSlice;
    ///
    /// let zeros: ArcSlice<u8> = ArcSlice::new(4);
    /// assert_eq!(&*zeros, &[0, 0, 0, 0]);
    /// ```
    #[inline]
    pub fn new(len: usize) -> ArcSlice<T> {
        Self::from_fn(len, |_| T::default())
    }

    /// Constructs a new [`ArcSlice<T>`] of `len` default-initialized elements,
    /// returning an error instead of aborting if either the element buffer or
    /// the control block cannot be allocated. Nothing is leaked on failure.
    ///
    /// # Examples
    ///
    /// ```
    /// use arcweak::{AllocError, ArcSlice};
    ///
    /// let ok: ArcSlice<u64> = ArcSlice::try_new(16).unwrap();
    /// assert_eq!(ok.len(), 16);
    ///
    /// let too_big = ArcSlice::<u64>::try_new(usize::MAX);
    /// assert!(matches!(too_big, Err(AllocError::Buffer(_))));
    /// ```
    pub fn try_new(len: usize) -> Result<ArcSlice<T>, AllocError> {
        let mut buffer = Vec::new();
        buffer.try_reserve_exact(len)?;
        buffer.resize_with(len, T::default);
        Ok(ArcSlice {
            raw: RawArc::try_new(buffer.into_boxed_slice())?,
        })
    }
}

impl<T> ArcSlice<T> {
    /// Constructs a new [`ArcSlice<T>`] of `len` elements, producing element
    /// `i` with `f(i)`. If `f` panics, the elements built so far are dropped
    /// and nothing else is allocated.
    ///
    /// # Examples
    ///
    /// ```
    /// use arcweak::ArcSlice;
    ///
    /// let squares = ArcSlice::from_fn(4, |i| i * i);
    /// assert_eq!(&*squares, &[0, 1, 4, 9]);
    /// ```
    #[inline]
    pub fn from_fn<F: FnMut(usize) -> T>(len: usize, f: F) -> ArcSlice<T> {
        (0..len).map(f).collect()
    }

    /// Constructs a null [`ArcSlice<T>`] that points to nothing and
    /// dereferences to the empty slice.
    #[inline]
    #[must_use]
    pub const fn null() -> ArcSlice<T> {
        ArcSlice {
            raw: RawArc::null(),
        }
    }

    /// Returns `true` if this handle points to nothing. A non-null handle to
    /// a zero-length buffer is not null.
    #[inline(always)]
    #[must_use]
    pub fn is_null(&self) -> bool {
        self.raw.is_null()
    }

    /// Gets the number of strong pointers to the buffer, 0 for a null handle.
    #[inline]
    #[must_use]
    pub fn strong_count(&self) -> usize {
        self.raw.strong_count()
    }

    /// Gets the number of [`WeakSlice<T>`] pointers to the buffer.
    #[inline]
    #[must_use]
    pub fn weak_count(&self) -> usize {
        self.raw.weak_count()
    }

    /// Returns `true` if this is the only reference, strong or weak, to the
    /// buffer. A snapshot, like the counts.
    #[inline]
    #[must_use]
    pub fn is_unique(&self) -> bool {
        self.raw.is_unique()
    }

    /// Creates a new [`WeakSlice<T>`] pointer to this buffer.
    #[inline]
    #[must_use]
    pub fn downgrade(this: &Self) -> WeakSlice<T> {
        WeakSlice {
            raw: this.raw.downgrade(),
        }
    }

    /// Compares if two handles reference the same buffer. This is the same
    /// comparison `==` performs.
    #[inline]
    #[must_use]
    pub fn ptr_eq(this: &Self, other: &Self) -> bool {
        this.raw.block_ptr() == other.raw.block_ptr()
    }

    /// Returns a mutable view of the elements if this is the only reference,
    /// strong or weak, to the buffer.
    ///
    /// # Examples
    ///
    /// ```
    /// use arcweak::ArcSlice;
    ///
    /// let mut values: ArcSlice<i32> = ArcSlice::new(5);
    /// ArcSlice::get_mut(&mut values).unwrap()[2] = 42;
    ///
    /// let shared = values.clone();
    /// assert_eq!(shared[2], 42);
    /// assert!(ArcSlice::get_mut(&mut values).is_none());
    /// ```
    #[inline]
    pub fn get_mut(this: &mut Self) -> Option<&mut [T]> {
        this.raw.get_mut().map(|buffer| &mut **buffer)
    }
}

impl<T> Deref for ArcSlice<T> {
    type Target = [T];
    #[inline(always)]
    fn deref(&self) -> &[T] {
        match self.raw.payload() {
            Some(buffer) => &**buffer,
            None => &[],
        }
    }
}

impl<T> Clone for ArcSlice<T> {
    #[inline]
    fn clone(&self) -> Self {
        ArcSlice {
            raw: self.raw.clone(),
        }
    }
}

impl<T> Default for ArcSlice<T> {
    /// Creates a null [`ArcSlice<T>`].
    #[inline]
    fn default() -> Self {
        ArcSlice::null()
    }
}

impl<T> From<Box<[T]>> for ArcSlice<T> {
    /// Takes ownership of the buffer without copying the elements.
    #[inline]
    fn from(buffer: Box<[T]>) -> Self {
        ArcSlice {
            raw: RawArc::new(buffer),
        }
    }
}

impl<T> From<Vec<T>> for ArcSlice<T> {
    #[inline]
    fn from(elements: Vec<T>) -> Self {
        ArcSlice::from(elements.into_boxed_slice())
    }
}

impl<T> FromIterator<T> for ArcSlice<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        ArcSlice::from(iter.into_iter().collect::<Vec<T>>())
    }
}

impl<T> AsRef<[T]> for ArcSlice<T> {
    #[inline(always)]
    fn as_ref(&self) -> &[T] {
        self
    }
}

impl<T> Hash for ArcSlice<T> {
    #[inline]
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.raw.block_ptr().hash(state);
    }
}

impl<T> PartialEq for ArcSlice<T> {
    #[inline]
    fn eq(&self, other: &Self) -> bool {
        ArcSlice::ptr_eq(self, other)
    }
}

impl<T> Eq for ArcSlice<T> {}

impl<T> PartialOrd for ArcSlice<T> {
    #[inline]
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<T> Ord for ArcSlice<T> {
    #[inline]
    fn cmp(&self, other: &Self) -> Ordering {
        self.raw.block_ptr().cmp(&other.raw.block_ptr())
    }
}

impl<T: fmt::Debug> fmt::Debug for ArcSlice<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_null() {
            f.write_str("(null)")
        } else {
            fmt::Debug::fmt(&**self, f)
        }
    }
}

impl<T> Unpin for ArcSlice<T> {}

/// [`WeakSlice<T>`] is the non-owning version of [`ArcSlice<T>`]. It keeps
/// the control block alive but not the element buffer, and can be turned back
/// into an [`ArcSlice<T>`] while the buffer still exists.
///
/// # Examples
///
/// ```
/// use arcweak::ArcSlice;
///
/// let buffer = ArcSlice::from(vec![1, 2, 3]);
/// let weak = ArcSlice::downgrade(&buffer);
/// assert_eq!(weak.lock()[1], 2);
///
/// drop(buffer);
/// assert!(weak.expired());
/// assert!(weak.lock().is_null());
/// ```
pub struct WeakSlice<T> {
    raw: RawWeak<Box<[T]>>,
}

unsafe impl<T: Sync + Send> Send for WeakSlice<T> {}
unsafe impl<T: Sync + Send> Sync for WeakSlice<T> {}

impl<T> WeakSlice<T> {
    /// Constructs a null [`WeakSlice<T>`] that observes nothing.
    #[inline]
    #[must_use]
    pub const fn new() -> WeakSlice<T> {
        WeakSlice {
            raw: RawWeak::null(),
        }
    }

    /// Attempts to get a strong handle to the buffer, returning a null
    /// [`ArcSlice<T>`] if it has already been dropped.
    #[inline]
    #[must_use]
    pub fn lock(&self) -> ArcSlice<T> {
        ArcSlice {
            raw: self.raw.upgrade(),
        }
    }

    /// Attempts to upgrade to an [`ArcSlice<T>`], returning [`None`] if the
    /// buffer has already been dropped.
    #[inline]
    #[must_use]
    pub fn upgrade(&self) -> Option<ArcSlice<T>> {
        let strong = self.lock();
        if strong.is_null() {
            None
        } else {
            Some(strong)
        }
    }

    /// Returns `true` if the buffer has been dropped or this handle is null.
    #[inline]
    #[must_use]
    pub fn expired(&self) -> bool {
        self.raw.strong_count() == 0
    }

    /// Gets the number of [`ArcSlice<T>`] pointers to the buffer.
    #[inline]
    #[must_use]
    pub fn strong_count(&self) -> usize {
        self.raw.strong_count()
    }

    /// Gets the number of [`WeakSlice<T>`] pointers to the buffer, including
    /// this one.
    #[inline]
    #[must_use]
    pub fn weak_count(&self) -> usize {
        self.raw.weak_count()
    }

    /// Returns `true` if both handles observe the same buffer, or are both
    /// null.
    #[inline]
    #[must_use]
    pub fn ptr_eq(this: &Self, other: &Self) -> bool {
        this.raw.block_ptr() == other.raw.block_ptr()
    }
}

impl<T> Clone for WeakSlice<T> {
    #[inline]
    fn clone(&self) -> Self {
        WeakSlice {
            raw: self.raw.clone(),
        }
    }
}

impl<T> Default for WeakSlice<T> {
    #[inline]
    fn default() -> Self {
        WeakSlice::new()
    }
}

impl<T> From<&ArcSlice<T>> for WeakSlice<T> {
    #[inline]
    fn from(strong: &ArcSlice<T>) -> Self {
        ArcSlice::downgrade(strong)
    }
}

impl<T> fmt::Debug for WeakSlice<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("(WeakSlice)")
    }
}
