use domain::UniqueId;
use rand::Rng;

/// 7 位账号编号的候选来源。唯一性由存储层约束保证，这里只负责出号。
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
pub trait UniqueIdGenerator: Send + Sync {
    fn next_candidate(&self) -> UniqueId;
}

#[derive(Debug, Default)]
pub struct RandomUniqueIds;

impl UniqueIdGenerator for RandomUniqueIds {
    fn next_candidate(&self) -> UniqueId {
        UniqueId::from_offset(rand::rng().random_range(0..UniqueId::SPAN))
    }
}
