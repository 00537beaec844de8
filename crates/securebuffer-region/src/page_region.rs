// Copyright (c) 2025-2026 Federico Hoerth <memparanoid@gmail.com>
// SPDX-License-Identifier: GPL-3.0-only
// See LICENSE in the repository root for full license text.

//! PageRegion - mmap'd pages with mlock and dump exclusion.
//!
//! The mapping is rounded up to whole pages; only the requested capacity is
//! exposed. The slack after `capacity` is wiped along with everything else.

use core::ptr;

use crate::error::RegionError;
use crate::traits::{Region, RegionKind};
use crate::wipe::wipe;

/// A region backed by anonymous private pages.
pub struct PageRegion {
    ptr: *mut u8,
    capacity: usize,
    mapped_len: usize,
    locked: bool,
}

// Safety: PageRegion exclusively owns its mapping; mutation requires &mut.
unsafe impl Send for PageRegion {}
unsafe impl Sync for PageRegion {}

fn page_size() -> usize {
    let size = unsafe { libc::sysconf(libc::_SC_PAGESIZE) };

    if size <= 0 { 4096 } else { size as usize }
}

impl PageRegion {
    /// Maps a zero-initialized region of `capacity` bytes. Does NOT lock it.
    pub fn new(capacity: usize) -> Result<Self, RegionError> {
        if capacity == 0 {
            return Err(RegionError::InvalidCapacity);
        }

        let page = page_size();
        let mapped_len = capacity
            .checked_add(page - 1)
            .ok_or(RegionError::Create)?
            / page
            * page;

        let ptr = unsafe {
            libc::mmap(
                ptr::null_mut(),
                mapped_len,
                libc::PROT_READ | libc::PROT_WRITE,
                libc::MAP_PRIVATE | libc::MAP_ANONYMOUS,
                -1,
                0,
            )
        };

        if ptr == libc::MAP_FAILED {
            return Err(RegionError::Create);
        }

        let mut region = Self {
            ptr: ptr as *mut u8,
            capacity,
            mapped_len,
            locked: false,
        };

        // Anonymous mappings start zeroed; wipe anyway so the invariant does
        // not depend on the kernel.
        wipe(region.mapping_mut(), 1);

        Ok(region)
    }

    /// Bytes actually mapped (capacity rounded up to the page size).
    pub fn mapped_len(&self) -> usize {
        self.mapped_len
    }

    fn mapping(&self) -> &[u8] {
        unsafe { core::slice::from_raw_parts(self.ptr, self.mapped_len) }
    }

    fn mapping_mut(&mut self) -> &mut [u8] {
        unsafe { core::slice::from_raw_parts_mut(self.ptr, self.mapped_len) }
    }
}

impl core::fmt::Debug for PageRegion {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("PageRegion")
            .field("capacity", &self.capacity)
            .field("mapped_len", &self.mapped_len)
            .field("locked", &self.locked)
            .finish_non_exhaustive()
    }
}

impl Region for PageRegion {
    fn capacity(&self) -> usize {
        self.capacity
    }

    fn as_slice(&self) -> &[u8] {
        &self.mapping()[..self.capacity]
    }

    fn as_mut_slice(&mut self) -> &mut [u8] {
        let capacity = self.capacity;
        &mut self.mapping_mut()[..capacity]
    }

    fn as_mut_ptr(&mut self) -> *mut u8 {
        self.ptr
    }

    fn lock(&mut self) -> Result<(), RegionError> {
        if self.locked {
            return Ok(());
        }

        let failed = unsafe { libc::mlock(self.ptr as *const _, self.mapped_len) } != 0;

        if failed {
            return Err(RegionError::Lock);
        }

        self.locked = true;

        Ok(())
    }

    fn unlock(&mut self) -> Result<(), RegionError> {
        if !self.locked {
            return Ok(());
        }

        let failed = unsafe { libc::munlock(self.ptr as *const _, self.mapped_len) } != 0;

        if failed {
            return Err(RegionError::Unlock);
        }

        self.locked = false;

        Ok(())
    }

    fn is_locked(&self) -> bool {
        self.locked
    }

    #[cfg(target_os = "linux")]
    fn exclude_from_dumps(&mut self) -> Result<(), RegionError> {
        let failed = unsafe {
            libc::madvise(
                self.ptr as *mut libc::c_void,
                self.mapped_len,
                libc::MADV_DONTDUMP,
            )
        } != 0;

        if failed {
            return Err(RegionError::Madvise);
        }

        Ok(())
    }

    #[cfg(not(target_os = "linux"))]
    fn exclude_from_dumps(&mut self) -> Result<(), RegionError> {
        Err(RegionError::Unsupported)
    }

    fn kind(&self) -> RegionKind {
        RegionKind::Page
    }

    fn wipe(&mut self, passes: u8) {
        wipe(self.mapping_mut(), passes);
    }
}

impl Drop for PageRegion {
    fn drop(&mut self) {
        #[cfg(any(test, feature = "test-utils"))]
        crate::probe::on_release(self.mapping());

        wipe(self.mapping_mut(), 1);

        unsafe {
            if self.locked {
                libc::munlock(self.ptr as *const _, self.mapped_len);
            }
            libc::munmap(self.ptr as *mut libc::c_void, self.mapped_len);
        }
    }
}
