//! Fixed-size grouping of a (possibly lazy) sequence.
//!
//! Groups bound the working set of a single worker task (dissolve) and the
//! number of paths handed to one external tool invocation (merge).
use crate::error::{Error, Result};

/// Number of groups of `size` needed to hold `total` items.
pub fn group_count(total: usize, size: usize) -> usize {
    if size == 0 {
        return 0;
    }
    total.div_ceil(size)
}

/// Lazy iterator adapter yielding groups of exactly `size` slots.
///
/// The final group is padded with `None` when the source runs out, so callers
/// must skip absent slots (see [`real`]). The source is consumed once.
pub struct Grouper<I: Iterator> {
    source: I,
    size: usize,
    done: bool,
}

impl<I: Iterator> Grouper<I> {
    pub fn new(source: I, size: usize) -> Result<Self> {
        if size == 0 {
            return Err(Error::InvalidArgument {
                arg: "group_size",
                value: size.to_string(),
            });
        }
        Ok(Grouper {
            source,
            size,
            done: false,
        })
    }
}

impl<I: Iterator> Iterator for Grouper<I> {
    type Item = Vec<Option<I::Item>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let mut group = Vec::with_capacity(self.size);
        group.extend(self.source.by_ref().take(self.size).map(Some));
        if group.is_empty() {
            self.done = true;
            return None;
        }
        if group.len() < self.size {
            self.done = true;
            group.resize_with(self.size, || None);
        }
        Some(group)
    }
}

/// Convenience: `Grouper::new(iter.into_iter(), size)`.
pub fn grouper<I: IntoIterator>(items: I, size: usize) -> Result<Grouper<I::IntoIter>> {
    Grouper::new(items.into_iter(), size)
}

/// Drop the padding slots of a group.
pub fn real<T>(group: Vec<Option<T>>) -> Vec<T> {
    group.into_iter().flatten().collect()
}
