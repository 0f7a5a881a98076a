use std::{
    any::{type_name, Any, TypeId},
    ffi::c_void,
    ops::{Deref, DerefMut},
    sync::atomic::{AtomicIsize, Ordering},
};

use thiserror::Error;

use crate::handle::HandleGuard;

/// Payload handed to the engine for host userdata.
///
/// The header fields come first so the destructor can be read without knowing `T`.
#[repr(C)]
pub(crate) struct Userdata<T: ?Sized> {
    pub(crate) id: TypeId,        // typeid of T
    pub(crate) borrow: AtomicIsize, // -1 while mutably borrowed, otherwise the shared borrow count
    pub(crate) dtor: unsafe fn(*mut c_void),
    pub(crate) inner: T,
}

impl<T: Any + Send + Sync> Userdata<T> {
    pub(crate) fn into_raw(value: T) -> *mut c_void {
        let boxed = Box::new(Userdata {
            id: TypeId::of::<T>(),
            borrow: AtomicIsize::new(0),
            dtor: drop_userdata::<T>,
            inner: value,
        });

        Box::into_raw(boxed).cast()
    }
}

#[derive(Debug, Error)]
pub enum UserdataBorrowError {
    #[error("Cannot borrow userdata, is already mutably borrowed.")]
    AlreadyMutable,
    #[error("Cannot mutably borrow userdata, is already borrowed.")]
    AlreadyImmutable,
    #[error("userdata is not of type {0}")]
    WrongType(&'static str),
}

/// Reads the type of a userdata payload.
///
/// # Safety
/// `ptr` must come from [`Userdata::into_raw`] and still be live.
pub(crate) unsafe fn userdata_is<T: Any>(ptr: *mut c_void) -> bool {
    (*ptr.cast::<Userdata<()>>()).id == TypeId::of::<T>()
}

/// Checks that `payload` is a live `Userdata<T>`.
///
/// # Safety
/// `payload` must be null or come from [`Userdata::into_raw`] and outlive the check.
unsafe fn check_type<T: Any>(payload: *mut c_void) -> Result<(), UserdataBorrowError> {
    if payload.is_null() || !userdata_is::<T>(payload) {
        return Err(UserdataBorrowError::WrongType(type_name::<T>()));
    }

    Ok(())
}

/// Shared borrow of a userdata value; keeps the owning handle read-locked.
pub struct UserdataRef<'a, T: Any> {
    _guard: HandleGuard<'a>,
    ud: *const Userdata<T>,
}

impl<'a, T: Any> UserdataRef<'a, T> {
    /// Borrows `payload`, which stays alive for as long as `guard` is held.
    pub(crate) fn try_from_guard(
        guard: HandleGuard<'a>,
        payload: *mut c_void,
    ) -> Result<Self, UserdataBorrowError> {
        // SAFETY: the engine only reports payloads made by Userdata::into_raw
        unsafe { check_type::<T>(payload)? };

        let ud = payload.cast::<Userdata<T>>() as *const Userdata<T>;
        let count = unsafe { &(*ud).borrow };

        let mut current = count.load(Ordering::Acquire);
        loop {
            if current == -1 {
                return Err(UserdataBorrowError::AlreadyMutable);
            }

            let next = current + 1;
            match count.compare_exchange_weak(current, next, Ordering::AcqRel, Ordering::Acquire) {
                Ok(_) => break,
                Err(actual) => current = actual,
            }
        }

        Ok(Self { _guard: guard, ud })
    }
}

impl<T: Any> Deref for UserdataRef<'_, T> {
    type Target = T;
    fn deref(&self) -> &Self::Target {
        // SAFETY: the guard keeps the payload alive and the borrow count excludes writers
        unsafe { &(*self.ud).inner }
    }
}

impl<T: Any> Drop for UserdataRef<'_, T> {
    fn drop(&mut self) {
        unsafe { (*self.ud).borrow.fetch_sub(1, Ordering::AcqRel) };
    }
}

/// Exclusive borrow of a userdata value.
pub struct UserdataRefMut<'a, T: Any> {
    _guard: HandleGuard<'a>,
    ud: *mut Userdata<T>,
}

impl<'a, T: Any> UserdataRefMut<'a, T> {
    pub(crate) fn try_from_guard(
        guard: HandleGuard<'a>,
        payload: *mut c_void,
    ) -> Result<Self, UserdataBorrowError> {
        // SAFETY: see UserdataRef::try_from_guard
        unsafe { check_type::<T>(payload)? };

        let ud = payload.cast::<Userdata<T>>();
        let count = unsafe { &(*ud).borrow };

        match count.compare_exchange(0, -1, Ordering::AcqRel, Ordering::Acquire) {
            Ok(_) => Ok(Self { _guard: guard, ud }),
            Err(-1) => Err(UserdataBorrowError::AlreadyMutable),
            Err(_) => Err(UserdataBorrowError::AlreadyImmutable),
        }
    }
}

impl<T: Any> Deref for UserdataRefMut<'_, T> {
    type Target = T;
    fn deref(&self) -> &Self::Target {
        unsafe { &(*self.ud).inner }
    }
}

impl<T: Any> DerefMut for UserdataRefMut<'_, T> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        // SAFETY: the counter is -1, no other borrow can exist
        unsafe { &mut (*self.ud).inner }
    }
}

impl<T: Any> Drop for UserdataRefMut<'_, T> {
    fn drop(&mut self) {
        unsafe { (*self.ud).borrow.store(0, Ordering::Release) }
    }
}

// Reads the payload as Userdata<()> to get at the dtor, the header layout does not depend on T.
pub(crate) unsafe extern "C-unwind" fn userdata_dtor(ptr: *mut c_void) {
    if ptr.is_null() {
        return;
    }

    let dtor = (*ptr.cast::<Userdata<()>>()).dtor;
    dtor(ptr);
}

unsafe fn drop_userdata<T>(ptr: *mut c_void) {
    drop(Box::from_raw(ptr.cast::<Userdata<T>>()));
}
