use serde::{Deserialize, Serialize};

use crate::error::{DeskError, ErrorCode, Result};

/// `size` sentinel meaning "return every match".
pub const UNPAGED: i64 = -1;

/// Default page size when a request leaves it out.
pub const DEFAULT_PAGE_SIZE: i64 = 20;

/// Largest page size a listing accepts.
pub const DEFAULT_MAX_PAGE_SIZE: i64 = 200;

/// Why a query runs. Only internal purposes may skip pagination.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryPurpose {
    Listing,
    AdvancedFilter,
    Export,
    Statistics,
}

impl QueryPurpose {
    #[must_use]
    pub const fn allows_unpaged(self) -> bool {
        matches!(self, Self::Export | Self::Statistics)
    }
}

/// Offset/limit pagination. Pages are 1-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Paging {
    pub page: i64,
    pub size: i64,
}

impl Default for Paging {
    fn default() -> Self {
        Self {
            page: 1,
            size: DEFAULT_PAGE_SIZE,
        }
    }
}

impl Paging {
    #[must_use]
    pub const fn new(page: i64, size: i64) -> Self {
        Self { page, size }
    }

    #[must_use]
    pub const fn unpaged() -> Self {
        Self {
            page: 1,
            size: UNPAGED,
        }
    }

    #[must_use]
    pub const fn is_unpaged(self) -> bool {
        self.size == UNPAGED
    }

    /// Check bounds for the given purpose.
    ///
    /// # Errors
    ///
    /// Returns a `page` or `size` validation error when the values are out
    /// of range, or when `size = -1` is requested by a caller-facing listing.
    pub fn validate(self, purpose: QueryPurpose, max_size: i64) -> Result<Self> {
        if self.page < 1 {
            return Err(DeskError::invalid(
                "page",
                ErrorCode::InvalidPaging,
                format!("page must be >= 1, got {}", self.page),
            ));
        }
        if self.is_unpaged() {
            if purpose.allows_unpaged() {
                return Ok(self);
            }
            return Err(DeskError::invalid(
                "size",
                ErrorCode::InvalidPaging,
                "size = -1 is reserved for internal aggregation",
            ));
        }
        if self.size < 1 || self.size > max_size {
            return Err(DeskError::invalid(
                "size",
                ErrorCode::InvalidPaging,
                format!("size must be between 1 and {max_size}, got {}", self.size),
            ));
        }
        if (self.page - 1).checked_mul(self.size).is_none() {
            return Err(DeskError::invalid(
                "page",
                ErrorCode::InvalidPaging,
                format!("page {} is out of range for size {}", self.page, self.size),
            ));
        }
        Ok(self)
    }

    /// `(limit, offset)` for the store, or `None` when unpaged.
    #[must_use]
    pub fn window(self) -> Option<(u64, u64)> {
        if self.is_unpaged() {
            return None;
        }
        let size = u64::try_from(self.size.max(1)).unwrap_or(1);
        let page = u64::try_from(self.page.max(1)).unwrap_or(1);
        Some((size, (page - 1).saturating_mul(size)))
    }

    /// `ceil(total / size)`, never below 1.
    #[must_use]
    pub fn total_pages(self, total: u64) -> u64 {
        match self.window() {
            None => 1,
            Some((size, _)) => total.div_ceil(size).max(1),
        }
    }
}

/// One page of results plus the counters every listing reports.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub total_page: u64,
    pub page: i64,
}

impl<T> Page<T> {
    #[must_use]
    pub fn new(items: Vec<T>, total: u64, paging: Paging) -> Self {
        Self {
            items,
            total,
            total_page: paging.total_pages(total),
            page: paging.page,
        }
    }

    #[must_use]
    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            total: self.total,
            total_page: self.total_page,
            page: self.page,
        }
    }
}
