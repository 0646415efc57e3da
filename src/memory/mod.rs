pub(crate) mod allocator;
pub(crate) mod buffer;
pub(crate) mod diagnostic;
pub(crate) mod error;
pub(crate) mod global;
pub(crate) mod native;
pub(crate) mod pool;
pub(crate) mod size_class;
pub(crate) mod stats;

#[cfg(test)]
crate::sync::static_rwlock! {
    pub static TEST_MUTEX: crate::sync::RwLock<()> = crate::sync::RwLock::new(());
}
