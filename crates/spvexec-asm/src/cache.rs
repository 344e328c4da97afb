use std::num::NonZeroUsize;
use std::sync::{Mutex, PoisonError};

use lru::LruCache;
use tracing::trace;

use crate::assembler::{Assemble, AssemblyError};
use crate::binary::BinaryModule;
use crate::version::ModuleVersion;

pub const DEFAULT_CAPACITY: usize = 256;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub entries: usize,
}

#[derive(Debug, Default)]
struct Inner {
    hits: u64,
    misses: u64,
}

/// Memoizes an assembler by `blake3(version || source)`.
///
/// Assembly is a pure function of its inputs, so a cached module is always identical to a fresh
/// one. Failed assemblies are not cached. A capacity of zero disables caching.
pub struct CachingAssembler<A> {
    inner: A,
    modules: Option<Mutex<LruCache<[u8; 32], BinaryModule>>>,
    counters: Mutex<Inner>,
}

impl<A: Assemble> CachingAssembler<A> {
    pub fn new(inner: A, capacity: usize) -> Self {
        Self {
            inner,
            modules: NonZeroUsize::new(capacity).map(|cap| Mutex::new(LruCache::new(cap))),
            counters: Mutex::new(Inner::default()),
        }
    }

    pub fn inner(&self) -> &A {
        &self.inner
    }

    pub fn stats(&self) -> CacheStats {
        let counters = self.counters.lock().unwrap_or_else(PoisonError::into_inner);
        let entries = self
            .modules
            .as_ref()
            .map(|m| m.lock().unwrap_or_else(PoisonError::into_inner).len())
            .unwrap_or(0);
        CacheStats {
            hits: counters.hits,
            misses: counters.misses,
            entries,
        }
    }
}

fn cache_key(source: &str, version: ModuleVersion) -> [u8; 32] {
    let mut hasher = blake3::Hasher::new();
    hasher.update(&[version.major, version.minor]);
    hasher.update(source.as_bytes());
    *hasher.finalize().as_bytes()
}

impl<A: Assemble> Assemble for CachingAssembler<A> {
    fn assemble(
        &self,
        source: &str,
        version: ModuleVersion,
    ) -> Result<BinaryModule, AssemblyError> {
        let Some(modules) = &self.modules else {
            return self.inner.assemble(source, version);
        };

        let key = cache_key(source, version);
        let cached = modules
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&key)
            .cloned();
        if let Some(module) = cached {
            self.counters
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .hits += 1;
            trace!(%version, "assembly cache hit");
            return Ok(module);
        }

        self.counters
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .misses += 1;
        let module = self.inner.assemble(source, version)?;
        modules
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .put(key, module.clone());
        Ok(module)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assembler::TextAssembler;
    use std::cell::Cell;

    struct Counting {
        calls: Cell<usize>,
    }

    impl Assemble for Counting {
        fn assemble(
            &self,
            source: &str,
            version: ModuleVersion,
        ) -> Result<BinaryModule, AssemblyError> {
            self.calls.set(self.calls.get() + 1);
            TextAssembler.assemble(source, version)
        }
    }

    #[test]
    fn repeated_sources_hit_the_cache() {
        let cache = CachingAssembler::new(
            Counting {
                calls: Cell::new(0),
            },
            4,
        );
        let a = cache.assemble("OpCapability Shader\n", ModuleVersion::V1_0).unwrap();
        let b = cache.assemble("OpCapability Shader\n", ModuleVersion::V1_0).unwrap();
        assert_eq!(a, b);
        assert_eq!(cache.inner().calls.get(), 1);

        // A different target version is a different key.
        cache.assemble("OpCapability Shader\n", ModuleVersion::V1_3).unwrap();
        assert_eq!(cache.inner().calls.get(), 2);
        assert_eq!(
            cache.stats(),
            CacheStats {
                hits: 1,
                misses: 2,
                entries: 2
            }
        );
    }

    #[test]
    fn failures_are_not_cached_and_zero_capacity_disables_caching() {
        let cache = CachingAssembler::new(
            Counting {
                calls: Cell::new(0),
            },
            0,
        );
        cache.assemble("OpCapability Shader\n", ModuleVersion::V1_0).unwrap();
        cache.assemble("OpCapability Shader\n", ModuleVersion::V1_0).unwrap();
        assert_eq!(cache.inner().calls.get(), 2);

        let cache = CachingAssembler::new(TextAssembler, 4);
        assert!(cache.assemble("OpBogus\n", ModuleVersion::V1_0).is_err());
        assert_eq!(cache.stats().entries, 0);
    }
}
