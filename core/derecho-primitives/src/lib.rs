//! Identifiers, value types, and error definitions shared by every layer of
//! the membership and persistence core: the group admin, the view builder,
//! the persistent registry, and the persistence manager all speak in terms
//! of the types defined here.

mod error;
mod ids;
mod mode;
mod tag;
mod version;

pub use error::DerechoError;
pub use ids::{Endpoint, NodeId, SubgroupId, INVALID_NODE_ID};
pub use mode::DeliveryMode;
pub use tag::TypeTag;
pub use version::{Hlc, Version, INVALID_VERSION};
