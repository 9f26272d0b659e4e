use std::{
    collections::{BTreeSet, HashSet},
    sync::atomic::{AtomicUsize, Ordering},
    thread,
};

use arcweak::Arc;

#[cfg(miri)]
const THREAD_COUNT: usize = 2;
#[cfg(not(miri))]
const THREAD_COUNT: usize = 8;

struct DropCounter<'a>(&'a AtomicUsize);

impl Drop for DropCounter<'_> {
    fn drop(&mut self) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }
}

#[test]
fn simple() {
    let a = Arc::new(!0usize);
    drop(a);
}

#[test]
fn multithread() {
    let a = Arc::new(!0usize);
    let handles: Vec<_> = (0..THREAD_COUNT)
        .map(|_| {
            let a = a.clone();
            thread::spawn(move || {
                if *a != !0 {
                    panic!("Whaaat, invalid somehow?")
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }
    assert_eq!(a.strong_count(), 1);
}

#[test]
fn multi_multithread() {
    let a = Arc::new(!0usize);
    let handles: Vec<_> = (0..THREAD_COUNT)
        .map(|_| {
            let a = a.clone();
            thread::spawn(move || {
                let inner: Vec<_> = (0..THREAD_COUNT)
                    .map(|_| {
                        let a = a.clone();
                        thread::spawn(move || {
                            if *a != !0 {
                                panic!("Whaaat, invalid somehow?")
                            }
                        })
                    })
                    .collect();
                for handle in inner {
                    handle.join().unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }
    assert_eq!(a.strong_count(), 1);
}

#[test]
fn clone_then_drop_original() {
    let a = Arc::new(42);
    let b = a.clone();
    drop(a);
    assert_eq!(*b, 42);
    assert_eq!(b.strong_count(), 1);
}

#[test]
fn payload_dropped_once_with_last_handle() {
    let drops = AtomicUsize::new(0);
    let a = Arc::new(DropCounter(&drops));
    let b = a.clone();
    let c = b.clone();
    drop(a);
    drop(c);
    assert_eq!(drops.load(Ordering::SeqCst), 0);
    drop(b);
    assert_eq!(drops.load(Ordering::SeqCst), 1);
}

#[test]
fn null_handles() {
    let empty: Arc<String> = Arc::default();
    assert!(empty.is_null());
    assert_eq!(empty.get(), None);
    assert_eq!(empty.strong_count(), 0);
    assert_eq!(empty.weak_count(), 0);
    assert!(!empty.is_unique());
    assert!(Arc::as_ptr(&empty).is_null());

    let copy = empty.clone();
    assert!(copy.is_null());
    assert_eq!(copy, empty);
    assert!(Arc::downgrade(&copy).expired());
    assert_eq!(Arc::into_inner(copy), None);
    assert_eq!(format!("{:?}", empty), "(null)");
}

#[test]
#[should_panic(expected = "dereferenced a null Arc")]
fn null_deref_panics() {
    let empty: Arc<u8> = Arc::null();
    let _value: u8 = *empty;
}

#[test]
fn take_leaves_null_behind() {
    let mut a = Arc::new(7);
    let b = std::mem::take(&mut a);
    assert!(a.is_null());
    assert_eq!(*b, 7);
    assert_eq!(b.strong_count(), 1);
}

#[test]
fn identity_comparison() {
    let a = Arc::new(5);
    let same = a.clone();
    let other = Arc::new(5);
    assert_eq!(a, same);
    assert_ne!(a, other);
    assert!(Arc::null() < a);
    assert_eq!(a.cmp(&other), Arc::as_ptr(&a).cmp(&Arc::as_ptr(&other)));

    let set: HashSet<_> = [a.clone(), same.clone(), other.clone()].into_iter().collect();
    assert_eq!(set.len(), 2);
    let ordered: BTreeSet<_> = [other.clone(), a.clone(), same].into_iter().collect();
    assert_eq!(ordered.len(), 2);
}

#[test]
fn raw_round_trip() {
    let a = Arc::new(String::from("raw"));
    let ptr = Arc::into_raw(a.clone());
    assert_eq!(a.strong_count(), 2);
    let back = unsafe { Arc::from_raw(ptr) };
    assert_eq!(back, a);
    drop(back);
    assert_eq!(a.strong_count(), 1);

    let null = unsafe { Arc::<String>::from_raw(std::ptr::null()) };
    assert!(null.is_null());
}

#[test]
fn unwrap_with_observers() {
    let drops = AtomicUsize::new(0);
    let a = Arc::new(DropCounter(&drops));
    let weak = Arc::downgrade(&a);
    let value = Arc::try_unwrap(a).ok().unwrap();
    assert!(weak.expired());
    assert!(weak.lock().is_null());
    drop(value);
    assert_eq!(drops.load(Ordering::SeqCst), 1);
    drop(weak);
    assert_eq!(drops.load(Ordering::SeqCst), 1);
}

#[test]
fn make_mut_detaches_from_observers() {
    let mut a = Arc::new(1);
    let weak = Arc::downgrade(&a);
    *Arc::make_mut(&mut a) += 1;
    assert_eq!(*a, 2);
    // the old allocation lost its last strong handle
    assert!(weak.expired());
}

#[test]
fn into_inner_races() {
    for _ in 0..100 {
        let a = Arc::new(vec![1, 2, 3]);
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let a = a.clone();
                thread::spawn(move || Arc::into_inner(a))
            })
            .collect();
        let mine = Arc::into_inner(a);
        let recovered = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .chain(std::iter::once(mine))
            .flatten()
            .count();
        assert_eq!(recovered, 1);
    }
}

#[test]
fn try_new_allocates() {
    let a = Arc::try_new([0u8; 64]).unwrap();
    assert_eq!(a.len(), 64);
    assert_eq!(a.strong_count(), 1);
}

#[test]
fn pointer_formatting() {
    let a = Arc::new(1u32);
    assert_eq!(format!("{:p}", a), format!("{:p}", Arc::as_ptr(&a)));
    assert_eq!(format!("{:?}", a), "1");
}

#[test]
fn get_mut_sees_observer_left_by_dropped_clone() {
    let mut a = Arc::new(String::from("shared"));
    let b = a.clone();
    let observer = Arc::downgrade(&b);
    drop(b);
    assert_eq!(a.strong_count(), 1);
    assert!(Arc::get_mut(&mut a).is_none());

    *Arc::make_mut(&mut a) = String::from("private");
    assert_eq!(observer.lock().get(), None);
    assert!(Arc::get_mut(&mut a).is_some());
    assert_eq!(*a, "private");
}
