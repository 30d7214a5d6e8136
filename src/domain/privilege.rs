use once_cell::sync::Lazy;

/// Identifier for an atomic permission flag held by a user account.
pub type PrivilegeId = i32;

pub const PRIV_SYSADMIN: PrivilegeId = 1;
pub const PRIV_NEWSADMIN: PrivilegeId = 2;
pub const PRIV_RESOURCEADMIN: PrivilegeId = 3;
pub const PRIV_CLASSADMIN: PrivilegeId = 4;
pub const PRIV_NAMEADMIN: PrivilegeId = 5;
pub const PRIV_RELEASEADMIN: PrivilegeId = 6;
pub const PRIV_USERADMIN: PrivilegeId = 7;
pub const PRIV_POSTCOMMENTS: PrivilegeId = 8;
pub const PRIV_USERDISABLED: PrivilegeId = 9;
pub const PRIV_COLLECTIONADMIN: PrivilegeId = 13;

static PRIVILEGE_NAMES: Lazy<Vec<(&'static str, PrivilegeId)>> = Lazy::new(|| {
    vec![
        ("PRIV_SYSADMIN", PRIV_SYSADMIN),
        ("PRIV_NEWSADMIN", PRIV_NEWSADMIN),
        ("PRIV_RESOURCEADMIN", PRIV_RESOURCEADMIN),
        ("PRIV_CLASSADMIN", PRIV_CLASSADMIN),
        ("PRIV_NAMEADMIN", PRIV_NAMEADMIN),
        ("PRIV_RELEASEADMIN", PRIV_RELEASEADMIN),
        ("PRIV_USERADMIN", PRIV_USERADMIN),
        ("PRIV_POSTCOMMENTS", PRIV_POSTCOMMENTS),
        ("PRIV_USERDISABLED", PRIV_USERDISABLED),
        ("PRIV_COLLECTIONADMIN", PRIV_COLLECTIONADMIN),
    ]
});

/// Resolves a privilege flag constant name (e.g. "PRIV_SYSADMIN") to its id.
pub fn privilege_id_for_name(name: &str) -> Option<PrivilegeId> {
    PRIVILEGE_NAMES
        .iter()
        .find(|(n, _)| *n == name)
        .map(|(_, id)| *id)
}

/// Resolves a privilege id back to its flag constant name.
pub fn privilege_name_for_id(id: PrivilegeId) -> Option<&'static str> {
    PRIVILEGE_NAMES
        .iter()
        .find(|(_, i)| *i == id)
        .map(|(n, _)| *n)
}
