use std::sync::atomic::{AtomicI32, AtomicUsize, Ordering};

use arcweak::{AllocError, ArcSlice, WeakSlice};

struct DropCounter<'a>(&'a AtomicUsize);

impl Drop for DropCounter<'_> {
    fn drop(&mut self) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }
}

#[test]
fn write_through_one_read_through_clone() {
    let a: ArcSlice<AtomicI32> = ArcSlice::new(5);
    let b = a.clone();
    a[2].store(42, Ordering::SeqCst);
    assert_eq!(b[2].load(Ordering::SeqCst), 42);
    assert_eq!(b.len(), 5);
    assert_eq!(b.strong_count(), 2);
}

#[test]
#[should_panic]
fn index_past_end_panics() {
    let a: ArcSlice<u32> = ArcSlice::new(5);
    let _value = a[5];
}

#[test]
fn default_initialized() {
    let a: ArcSlice<String> = ArcSlice::new(3);
    assert!(a.iter().all(String::is_empty));
    let b: ArcSlice<u64> = ArcSlice::try_new(3).unwrap();
    assert_eq!(&*b, &[0, 0, 0]);
}

#[test]
fn zero_length_is_not_null() {
    let a: ArcSlice<u8> = ArcSlice::new(0);
    assert!(!a.is_null());
    assert!(a.is_empty());
    assert_eq!(a.strong_count(), 1);
    assert_ne!(a, ArcSlice::new(0));
}

#[test]
fn null_slice_is_empty() {
    let a: ArcSlice<u8> = ArcSlice::default();
    assert!(a.is_null());
    assert!(a.is_empty());
    assert_eq!(a.get(0), None);
    assert_eq!(a.strong_count(), 0);
    assert!(ArcSlice::downgrade(&a).expired());
    assert_eq!(format!("{:?}", a), "(null)");
}

#[test]
fn elements_dropped_once_with_buffer() {
    let drops = AtomicUsize::new(0);
    let a = ArcSlice::from_fn(4, |_| DropCounter(&drops));
    let w = ArcSlice::downgrade(&a);
    let b = w.lock();
    drop(a);
    assert_eq!(drops.load(Ordering::SeqCst), 0);
    drop(b);
    assert_eq!(drops.load(Ordering::SeqCst), 4);
    assert!(w.expired());
    drop(w);
    assert_eq!(drops.load(Ordering::SeqCst), 4);
}

#[test]
fn panicking_constructor_cleans_up() {
    let drops = AtomicUsize::new(0);
    let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
        ArcSlice::from_fn(5, |i| {
            if i == 3 {
                panic!("element {} failed", i);
            }
            DropCounter(&drops)
        })
    }));
    assert!(result.is_err());
    assert_eq!(drops.load(Ordering::SeqCst), 3);
}

#[test]
fn conversions_keep_elements() {
    let from_vec = ArcSlice::from(vec![1, 2, 3]);
    assert_eq!(&*from_vec, &[1, 2, 3]);

    let boxed: Box<[u8]> = Box::new([9, 8]);
    let from_box = ArcSlice::from(boxed);
    assert_eq!(&*from_box, &[9, 8]);

    let collected: ArcSlice<char> = "abc".chars().collect();
    assert_eq!(collected.iter().collect::<String>(), "abc");
}

#[test]
fn get_mut_requires_unique() {
    let mut a: ArcSlice<i32> = ArcSlice::new(5);
    ArcSlice::get_mut(&mut a).unwrap()[2] = 42;

    let w = ArcSlice::downgrade(&a);
    assert!(ArcSlice::get_mut(&mut a).is_none());
    drop(w);

    let b = a.clone();
    assert!(ArcSlice::get_mut(&mut a).is_none());
    assert_eq!(b[2], 42);
}

#[test]
fn weak_slice_round_trip() {
    let a = ArcSlice::from(vec![1u16, 2, 3]);
    let w = WeakSlice::from(&a);
    assert_eq!(a.weak_count(), 1);
    assert_eq!(w.strong_count(), 1);

    let locked = w.upgrade().unwrap();
    assert_eq!(locked, a);
    assert!(ArcSlice::ptr_eq(&locked, &a));
    assert!(WeakSlice::ptr_eq(&w, &ArcSlice::downgrade(&a)));

    drop(a);
    drop(locked);
    assert!(w.expired());
    assert!(w.lock().is_null());
    assert!(WeakSlice::<u16>::new().upgrade().is_none());
}

#[test]
fn try_new_reports_capacity_overflow() {
    let result = ArcSlice::<u64>::try_new(usize::MAX);
    assert!(matches!(result, Err(AllocError::Buffer(_))));
    let message = result.unwrap_err().to_string();
    assert!(message.starts_with("failed to allocate element buffer"));
}

#[test]
fn shared_across_threads() {
    let a: ArcSlice<AtomicI32> = ArcSlice::new(8);
    std::thread::scope(|scope| {
        for i in 0..8 {
            let a = a.clone();
            scope.spawn(move || a[i].store(i as i32, Ordering::Relaxed));
        }
    });
    let values: Vec<i32> = a.iter().map(|v| v.load(Ordering::Relaxed)).collect();
    assert_eq!(values, (0..8).collect::<Vec<_>>());
    assert_eq!(a.strong_count(), 1);
}
