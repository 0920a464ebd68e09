pub mod hash_ring;
pub mod intrusive_list;
pub mod shard;
pub mod slot_arena;

pub use hash_ring::{DEFAULT_REPLICAS, HashFn, HashRing, fx_hash32};
pub use intrusive_list::IntrusiveList;
pub use shard::ShardSelector;
pub use slot_arena::{SlotArena, SlotId};
