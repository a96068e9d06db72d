/// Router Module Index
///
/// Routes are grouped by access level so authentication is applied as a layer on a whole
/// group rather than remembered per handler. All groups are nested under `/api`.

/// Anonymous access: health, accounts, browsing, profiles.
pub mod public;

/// Behind the `AuthUser` layer: authoring and interactions.
pub mod authenticated;

/// Behind the administrative key.
pub mod admin;
