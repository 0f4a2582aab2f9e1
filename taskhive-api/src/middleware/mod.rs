/// Middleware modules for the API server
///
/// Authentication and the admin gate are plain `from_fn` layers in
/// [`crate::app`]; this module holds the tower layers.

pub mod security;
