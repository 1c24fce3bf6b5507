//! Dispatch pipeline: the generic adapter, business services, and the
//! transport-facing router.

pub mod dispatch;
pub mod domain;
pub mod router;

pub use dispatch::{dispatch, FillDefaults, DEFAULT_PAGE_SIZE};
pub use domain::{PostService, UserService, ADMIN_USERNAME};
pub use router::{healthz_response, RpcService};
