use crate::{
    atomic::{fence, spin_loop, Ordering},
    ucount, AllocError, AtomicCounter,
};
use alloc::{alloc::alloc, boxed::Box};
use branches::{likely, unlikely};
use core::{
    alloc::Layout,
    cell::UnsafeCell,
    marker::PhantomData,
    mem::ManuallyDrop,
    ptr::{self, NonNull},
};

// The barrier prevents the counters from overflowing, ensuring that dropping a
// handle won't cause an incorrect teardown of the `Block` and a dangling
// pointer for other references. The barrier leaves enough space between
// overflows for the max possible number of CPU cores in the system, so no
// amount of concurrent overflowing increments can wrap a counter back to 1.
// If a thread unwinds after the overflow panic, other threads can safely keep
// using their own references.
#[cfg(target_pointer_width = "64")]
const BARRIER: ucount = 512;
#[cfg(target_pointer_width = "32")]
const BARRIER: ucount = 64;

// Parks the weak counter while an exclusive-access check reads the strong
// counter. It is only set while no observer exists, so `add_weak` on behalf of
// an observer never sees it.
const WEAK_LOCKED: ucount = ucount::MAX;

/// Control block shared by every strong and weak handle of one object.
///
/// `strong` counts owning handles. `weak` counts observers plus one implicit
/// reference held collectively by all owning handles, which is released only
/// after the payload is destroyed. The payload is live while `strong > 0`, the
/// block memory is valid while `weak > 0`.
///
/// The payload comes first so that a pointer to the block is also a pointer to
/// the payload.
#[repr(C)]
pub(crate) struct Block<P> {
    payload: UnsafeCell<ManuallyDrop<P>>,
    strong: AtomicCounter,
    weak: AtomicCounter,
}

#[cold]
#[inline(never)]
fn overflow() -> ! {
    panic!("reference counter overflow");
}

#[cold]
#[inline(never)]
fn counter_overflow(counter: &AtomicCounter) -> ! {
    // turn back the counter as the caller will not produce a valid handle. The
    // caller still holds its own reference, so this can never reach zero.
    counter.fetch_sub(1, Ordering::Relaxed);
    overflow()
}

impl<P> Block<P> {
    #[inline]
    fn with_payload(payload: P) -> Self {
        Block {
            payload: UnsafeCell::new(ManuallyDrop::new(payload)),
            strong: AtomicCounter::new(1),
            weak: AtomicCounter::new(1),
        }
    }

    /// Allocates a block holding `payload` with one strong and one weak
    /// reference, both owned by the caller.
    #[inline]
    pub(crate) fn allocate(payload: P) -> NonNull<Self> {
        let block = Box::new(Self::with_payload(payload));
        // Safety: box is always not null
        unsafe { NonNull::new_unchecked(Box::leak(block)) }
    }

    /// Same as [`Block::allocate`] but reports allocator failure instead of
    /// aborting. `payload` is dropped on failure.
    pub(crate) fn try_allocate(payload: P) -> Result<NonNull<Self>, AllocError> {
        let layout = Layout::new::<Self>();
        // SAFETY: the layout is never zero-sized as it always carries both counters
        let raw = unsafe { alloc(layout) } as *mut Self;
        match NonNull::new(raw) {
            Some(ptr) => {
                // SAFETY: freshly allocated with the layout of `Self`, which is also the layout
                // `Box<Self>` uses when the block is freed
                unsafe { ptr.as_ptr().write(Self::with_payload(payload)) };
                Ok(ptr)
            }
            None => {
                log::warn!(
                    "control block allocation of {} bytes failed",
                    layout.size()
                );
                Err(AllocError::Block(layout))
            }
        }
    }

    /// # Safety
    ///
    /// The caller must hold a strong reference for the lifetime of the
    /// returned borrow.
    #[inline(always)]
    pub(crate) unsafe fn payload(&self) -> &P {
        &*self.payload.get()
    }

    /// # Safety
    ///
    /// The caller must hold a strong reference and guarantee that nobody else
    /// reads or writes the payload for the lifetime of the returned borrow.
    #[inline(always)]
    #[allow(clippy::mut_from_ref)]
    pub(crate) unsafe fn payload_mut(&self) -> &mut P {
        &mut *self.payload.get()
    }

    #[inline]
    pub(crate) fn add_strong(&self) {
        let count = self.strong.fetch_add(1, Ordering::Relaxed);
        if unlikely(count >= ucount::MAX - BARRIER) {
            counter_overflow(&self.strong);
        }
    }

    /// Adds an observer on behalf of an existing observer.
    #[inline]
    pub(crate) fn add_weak(&self) {
        let count = self.weak.fetch_add(1, Ordering::Relaxed);
        if unlikely(count >= ucount::MAX - BARRIER) {
            counter_overflow(&self.weak);
        }
    }

    /// Adds an observer on behalf of a strong owner. Waits while another owner
    /// holds the weak counter locked in [`Block::is_exclusive`].
    #[inline]
    pub(crate) fn downgrade(&self) {
        let mut count = self.weak.load(Ordering::Relaxed);
        loop {
            if unlikely(count == WEAK_LOCKED) {
                spin_loop();
                count = self.weak.load(Ordering::Relaxed);
                continue;
            }
            if unlikely(count >= ucount::MAX - BARRIER) {
                overflow();
            }
            // Acquire pairs with the Release store that unlocks the counter, so the
            // owner that checked exclusivity is done with its strong read.
            match self.weak.compare_exchange_weak(
                count,
                count + 1,
                Ordering::Acquire,
                Ordering::Relaxed,
            ) {
                Ok(_) => return,
                Err(actual) => count = actual,
            }
        }
    }

    /// Takes a new strong reference only if the payload is still alive.
    ///
    /// The increment is published only while the count was observed non-zero,
    /// so a payload whose last strong reference is gone is never resurrected.
    #[inline]
    pub(crate) fn try_add_strong(&self) -> bool {
        let mut count = self.strong.load(Ordering::Relaxed);
        loop {
            if count == 0 {
                return false;
            }
            if unlikely(count >= ucount::MAX - BARRIER) {
                overflow();
            }
            // Acquire pairs with the Release decrement of other strong owners, so the
            // upgraded handle observes every write made through them.
            match self.strong.compare_exchange_weak(
                count,
                count + 1,
                Ordering::Acquire,
                Ordering::Relaxed,
            ) {
                Ok(_) => return true,
                Err(actual) => count = actual,
            }
        }
    }

    /// Gives up one strong reference, returns `true` if it was the last one. The
    /// payload is left in place for the caller to drop or move out.
    #[inline]
    pub(crate) fn decrement_strong(&self) -> bool {
        if likely(self.strong.fetch_sub(1, Ordering::Release) != 1) {
            return false;
        }
        fence(Ordering::Acquire);
        true
    }

    /// Moves the strong count from 1 to 0 if this is the only strong reference.
    #[inline]
    pub(crate) fn try_claim_unique(&self) -> bool {
        if self
            .strong
            .compare_exchange(1, 0, Ordering::Relaxed, Ordering::Relaxed)
            .is_err()
        {
            return false;
        }
        fence(Ordering::Acquire);
        true
    }

    /// Gives up one strong reference, destroying the payload and releasing the
    /// implicit weak reference if it was the last one.
    ///
    /// # Safety
    ///
    /// `this` must point to a live block and the caller must own the strong
    /// reference it gives up.
    #[inline]
    pub(crate) unsafe fn release_strong(this: NonNull<Self>) {
        if this.as_ref().decrement_strong() {
            Self::drop_slow(this);
        }
    }

    // The non-inlined portion of `release_strong`. Like the counting fast paths
    // we leave it to the compiler to decide whether inlining the payload
    // destructor is cheap and necessary.
    unsafe fn drop_slow(this: NonNull<Self>) {
        ManuallyDrop::drop(&mut *(*this.as_ptr()).payload.get());
        log::trace!("payload of block {:p} destroyed", this);
        Self::release_weak(this);
    }

    /// Moves the payload out of a block whose strong count already reached
    /// zero, then releases the implicit weak reference.
    ///
    /// # Safety
    ///
    /// The caller must be the one that moved the strong count to zero, through
    /// [`Block::decrement_strong`] or [`Block::try_claim_unique`], and the
    /// payload must not have been dropped or taken yet.
    pub(crate) unsafe fn take_payload(this: NonNull<Self>) -> P {
        let payload = ManuallyDrop::take(&mut *(*this.as_ptr()).payload.get());
        Self::release_weak(this);
        payload
    }

    /// Gives up one weak reference, freeing the block if it was the last one.
    ///
    /// # Safety
    ///
    /// `this` must point to a block whose memory is still valid and the caller
    /// must own the weak reference it gives up.
    #[inline]
    pub(crate) unsafe fn release_weak(this: NonNull<Self>) {
        if likely(this.as_ref().weak.fetch_sub(1, Ordering::Release) != 1) {
            return;
        }
        fence(Ordering::Acquire);
        log::trace!("freeing control block {:p}", this);
        // the payload is wrapped in `ManuallyDrop` and was already destroyed or taken
        drop(Box::from_raw(this.as_ptr()));
    }

    #[inline]
    pub(crate) fn strong_count(&self) -> usize {
        self.strong.load(Ordering::Acquire) as usize
    }

    /// Number of observer handles, not counting the implicit reference of the
    /// strong side.
    #[inline]
    pub(crate) fn weak_count(&self) -> usize {
        let weak = self.weak.load(Ordering::Acquire);
        if weak == WEAK_LOCKED {
            // locked by an exclusivity check, which only succeeds without observers
            return 0;
        }
        if self.strong.load(Ordering::Acquire) > 0 {
            (weak as usize).saturating_sub(1)
        } else {
            weak as usize
        }
    }

    /// Advisory snapshot: `true` if there seemed to be exactly one strong and
    /// no observer reference. The two loads are separate, so the answer may be
    /// stale by the time it is returned. Never grant access based on it, use
    /// [`Block::is_exclusive`] instead.
    #[inline]
    pub(crate) fn is_unique(&self) -> bool {
        self.weak.load(Ordering::Acquire) == 1 && self.strong.load(Ordering::Acquire) == 1
    }

    /// `true` if the caller's strong reference is the only reference of any
    /// kind, in which case the caller may access the payload mutably.
    ///
    /// The weak counter is locked while strong is read, so no owner can
    /// downgrade and then drop its strong reference in between the two reads.
    #[inline]
    pub(crate) fn is_exclusive(&self) -> bool {
        // Acquire pairs with the Release decrement of dropped observers, so an
        // upgrade they made before dropping shows up in the strong read.
        if self
            .weak
            .compare_exchange(1, WEAK_LOCKED, Ordering::Acquire, Ordering::Relaxed)
            .is_err()
        {
            return false;
        }
        let unique = self.strong.load(Ordering::Relaxed) == 1;
        // Release pairs with the Acquire of `downgrade`, which waits for this store.
        self.weak.store(1, Ordering::Release);
        if unique {
            // pairs with the Release decrement of dropped strong owners
            fence(Ordering::Acquire);
        }
        unique
    }
}

/// An owning, possibly null, reference to a block. Owns one strong reference
/// when non-null.
pub(crate) struct RawArc<P> {
    ptr: Option<NonNull<Block<P>>>,
    phantom: PhantomData<Box<P>>,
}

impl<P> RawArc<P> {
    #[inline(always)]
    pub(crate) const fn null() -> Self {
        RawArc {
            ptr: None,
            phantom: PhantomData,
        }
    }

    #[inline]
    pub(crate) fn new(payload: P) -> Self {
        RawArc {
            ptr: Some(Block::allocate(payload)),
            phantom: PhantomData,
        }
    }

    #[inline]
    pub(crate) fn try_new(payload: P) -> Result<Self, AllocError> {
        Ok(RawArc {
            ptr: Some(Block::try_allocate(payload)?),
            phantom: PhantomData,
        })
    }

    /// # Safety
    ///
    /// The caller transfers ownership of one strong reference on `ptr`.
    #[inline(always)]
    pub(crate) unsafe fn from_block(ptr: Option<NonNull<Block<P>>>) -> Self {
        RawArc {
            ptr,
            phantom: PhantomData,
        }
    }

    /// Leaks the strong reference held by `self`.
    #[inline(always)]
    pub(crate) fn into_block(self) -> Option<NonNull<Block<P>>> {
        ManuallyDrop::new(self).ptr
    }

    #[inline(always)]
    pub(crate) fn block(&self) -> Option<&Block<P>> {
        // SAFETY: the block is protected by our strong reference, it will not get
        // released unless the drop of the last owner gets called.
        self.ptr.map(|ptr| unsafe { &*ptr.as_ptr() })
    }

    #[inline(always)]
    pub(crate) fn block_ptr(&self) -> *const Block<P> {
        self.ptr.map_or(ptr::null(), |ptr| ptr.as_ptr() as *const _)
    }

    #[inline(always)]
    pub(crate) fn is_null(&self) -> bool {
        self.ptr.is_none()
    }

    #[inline(always)]
    pub(crate) fn payload(&self) -> Option<&P> {
        // SAFETY: the payload is alive while we hold a strong reference
        self.block().map(|block| unsafe { block.payload() })
    }

    #[inline]
    pub(crate) fn strong_count(&self) -> usize {
        self.block().map_or(0, Block::strong_count)
    }

    #[inline]
    pub(crate) fn weak_count(&self) -> usize {
        self.block().map_or(0, Block::weak_count)
    }

    #[inline]
    pub(crate) fn is_unique(&self) -> bool {
        self.block().map_or(false, Block::is_unique)
    }

    #[inline]
    pub(crate) fn downgrade(&self) -> RawWeak<P> {
        if let Some(block) = self.block() {
            block.downgrade();
        }
        RawWeak { ptr: self.ptr }
    }

    /// `true` if `self` is the only reference of any kind to its block.
    #[inline]
    pub(crate) fn is_exclusive(&mut self) -> bool {
        self.block().map_or(false, Block::is_exclusive)
    }

    #[inline]
    pub(crate) fn get_mut(&mut self) -> Option<&mut P> {
        if self.is_exclusive() {
            // SAFETY: no other strong or weak reference exists, and none can be created
            // while `self` is mutably borrowed.
            unsafe { self.get_mut_unchecked() }
        } else {
            None
        }
    }

    /// # Safety
    ///
    /// No other handle may access the payload for the lifetime of the
    /// returned borrow.
    #[inline]
    pub(crate) unsafe fn get_mut_unchecked(&mut self) -> Option<&mut P> {
        self.block().map(|block| block.payload_mut())
    }

    pub(crate) fn try_unwrap(self) -> Result<P, Self> {
        match self.ptr {
            // SAFETY: the block is valid as we hold a strong reference
            Some(ptr) if unsafe { ptr.as_ref() }.try_claim_unique() => {
                // the strong reference was consumed by the claim
                core::mem::forget(self);
                // SAFETY: we moved the strong count to zero ourselves
                Ok(unsafe { Block::take_payload(ptr) })
            }
            _ => Err(self),
        }
    }

    pub(crate) fn into_inner(self) -> Option<P> {
        let ptr = self.into_block()?;
        // SAFETY: the strong reference leaked by `into_block` is given up here, so
        // the block is still valid for this call.
        if unsafe { ptr.as_ref() }.decrement_strong() {
            // SAFETY: we moved the strong count to zero ourselves
            Some(unsafe { Block::take_payload(ptr) })
        } else {
            None
        }
    }
}

impl<P> Clone for RawArc<P> {
    #[inline]
    fn clone(&self) -> Self {
        if let Some(block) = self.block() {
            block.add_strong();
        }
        RawArc {
            ptr: self.ptr,
            phantom: PhantomData,
        }
    }
}

impl<P> Drop for RawArc<P> {
    #[inline]
    fn drop(&mut self) {
        if let Some(ptr) = self.ptr {
            // SAFETY: we own one strong reference on a live block
            unsafe { Block::release_strong(ptr) };
        }
    }
}

/// A non-owning, possibly null, reference to a block. Owns one weak reference
/// when non-null, which keeps the block memory but not the payload alive.
pub(crate) struct RawWeak<P> {
    ptr: Option<NonNull<Block<P>>>,
}

impl<P> RawWeak<P> {
    #[inline(always)]
    pub(crate) const fn null() -> Self {
        RawWeak { ptr: None }
    }

    #[inline(always)]
    pub(crate) fn block(&self) -> Option<&Block<P>> {
        // SAFETY: the block memory is protected by our weak reference. Only the
        // counters are reachable through it without unsafe code.
        self.ptr.map(|ptr| unsafe { &*ptr.as_ptr() })
    }

    #[inline(always)]
    pub(crate) fn block_ptr(&self) -> *const Block<P> {
        self.ptr.map_or(ptr::null(), |ptr| ptr.as_ptr() as *const _)
    }

    #[inline]
    pub(crate) fn upgrade(&self) -> RawArc<P> {
        match self.block() {
            // SAFETY: `try_add_strong` just handed us a strong reference
            Some(block) if block.try_add_strong() => unsafe { RawArc::from_block(self.ptr) },
            _ => RawArc::null(),
        }
    }

    #[inline]
    pub(crate) fn strong_count(&self) -> usize {
        self.block().map_or(0, Block::strong_count)
    }

    #[inline]
    pub(crate) fn weak_count(&self) -> usize {
        self.block().map_or(0, Block::weak_count)
    }
}

impl<P> Clone for RawWeak<P> {
    #[inline]
    fn clone(&self) -> Self {
        if let Some(block) = self.block() {
            block.add_weak();
        }
        RawWeak { ptr: self.ptr }
    }
}

impl<P> Drop for RawWeak<P> {
    #[inline]
    fn drop(&mut self) {
        if let Some(ptr) = self.ptr {
            // SAFETY: we own one weak reference, the block memory is still valid
            unsafe { Block::release_weak(ptr) };
        }
    }
}
