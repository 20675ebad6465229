use strum_macros::{Display, EnumString};

/// Role flag supplied by the identity provider.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Display, EnumString)]
#[strum(serialize_all = "lowercase")]
pub enum Role {
    User,
    Admin,
}
