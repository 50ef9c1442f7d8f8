/// Delivery semantics for a shard: whether updates within the shard are
/// totally ordered or may be applied in arbitrary order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum DeliveryMode {
    Ordered,
    Unordered,
}
