//! Request-scoped source session.

use crate::identity::{AnonymousId, Codename};

/// Who is making the current request.
///
/// Built only by [`crate::SourceService::create`] and
/// [`crate::SourceService::login`], so holding one proves the identity
/// exists. The codename stays in memory for the lifetime of the request.
#[derive(Debug, Clone)]
pub struct SourceSession {
    codename: Codename,
    id: AnonymousId,
}

impl SourceSession {
    pub(crate) fn new(codename: Codename, id: AnonymousId) -> Self {
        Self { codename, id }
    }

    pub fn codename(&self) -> &Codename {
        &self.codename
    }

    pub fn id(&self) -> &AnonymousId {
        &self.id
    }
}
