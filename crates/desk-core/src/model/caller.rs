use serde::{Deserialize, Serialize};

/// Identity of the request issuer, as delivered by the authentication layer.
///
/// Role ids are resolved to [`Role`](super::Role) definitions per request;
/// nothing here is trusted beyond the tenant and user id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Caller {
    pub tenant: String,
    pub user_id: String,
    #[serde(default)]
    pub role_ids: Vec<String>,
}

impl Caller {
    #[must_use]
    pub fn new(
        tenant: impl Into<String>,
        user_id: impl Into<String>,
        role_ids: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        Self {
            tenant: tenant.into(),
            user_id: user_id.into(),
            role_ids: role_ids.into_iter().map(Into::into).collect(),
        }
    }
}
