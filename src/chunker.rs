//! Splits a requested date range into sub-ranges a provider will accept.
//!
//! Providers cap how much data a single request may cover (30 days of solar
//! data, 1000 weather results, one heat-pump day). [`chunk`] walks the range
//! greedily in `max_span` steps and lets the caller stop between chunks.

use std::fmt;
use std::ops::Add;

/// A bounded sub-range of a collection request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Interval<T> {
    pub start: T,
    pub end: T,
}

impl<T: fmt::Display> fmt::Display for Interval<T> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{} to {}", self.start, self.end)
    }
}

/// Lazily produces the intervals covering `[start, end]`.
///
/// Cloning restarts from the current position, which is how callers count
/// the remaining chunks without consuming the sequence.
#[derive(Debug, Clone)]
pub struct Chunks<T, D> {
    current: Option<T>,
    end: T,
    max_span: D,
}

/// Splits `[start, end]` into intervals no wider than `max_span`.
///
/// - `start > end` yields nothing.
/// - `start == end` yields one zero-width interval.
/// - otherwise full `max_span` intervals are emitted while
///   `current + max_span < end`, followed by a closing interval ending at
///   `end` that may be shorter but never longer.
///
/// A non-positive `max_span` cannot make progress, so the whole range is
/// returned as a single interval.
pub fn chunk<T, D>(start: T, end: T, max_span: D) -> Chunks<T, D>
where
    T: Copy + PartialOrd + Add<D, Output = T>,
    D: Copy,
{
    Chunks {
        current: if start <= end { Some(start) } else { None },
        end,
        max_span,
    }
}

impl<T, D> Iterator for Chunks<T, D>
where
    T: Copy + PartialOrd + Add<D, Output = T>,
    D: Copy,
{
    type Item = Interval<T>;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.current?;
        let next = current + self.max_span;

        if next > current && next < self.end {
            self.current = Some(next);
            Some(Interval {
                start: current,
                end: next,
            })
        } else {
            self.current = None;
            Some(Interval {
                start: current,
                end: self.end,
            })
        }
    }
}
