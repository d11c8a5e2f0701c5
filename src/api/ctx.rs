//! Handler context

use crate::db::Store;
use crate::query::PageLimits;

/// State shared by every handler
#[derive(Clone)]
pub struct Ctx {
    pub store: Store,
    pub limits: PageLimits,
}
